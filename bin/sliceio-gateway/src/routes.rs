//! HTTP handlers. Each one resolves the identity header, generates a
//! correlation id, delegates to the pipeline, and maps the error taxonomy
//! to a status code. No business logic lives here.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use sliceio_common::{Error, Identity, PhotoId, RequestId, SliceIndex, UserId, VolumeId};
use sliceio_engine::ContourSet;
use sliceio_pipeline as pipeline;
use sliceio_pipeline::ServiceContext;
use tracing::error;
use uuid::Uuid;

/// Identity is resolved upstream and forwarded in this header.
const USER_HEADER: &str = "x-user-id";

pub struct ApiError {
    error: Error,
    request: RequestId,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Infrastructure failures reach the client as a generic internal
        // error; the log line carries the detail, keyed by request id.
        let msg = if status.is_server_error() {
            error!(request = %self.request, error = %self.error, "request failed");
            "internal error".to_string()
        } else {
            self.error.to_string()
        };

        (
            status,
            Json(json!({ "msg": msg, "request_id": self.request.to_string() })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn fail(request: RequestId) -> impl FnOnce(Error) -> ApiError {
    move |error| ApiError { error, request }
}

fn identity_from(headers: &HeaderMap) -> Identity {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map_or(Identity::Anonymous, |id| {
            Identity::User(UserId::from_uuid(id))
        })
}

fn png_response(bytes: bytes::Bytes) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Whether the volume may be read by anyone; defaults to public.
    pub public: Option<bool>,
}

pub async fn upload_file(
    State(ctx): State<ServiceContext>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| fail(request)(Error::validation(format!("bad multipart body: {e}"))))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload.nii").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| fail(request)(Error::validation(format!("bad upload body: {e}"))))?;
            upload = Some((filename, data));
        }
    }
    let (filename, data) =
        upload.ok_or_else(|| fail(request)(Error::validation("missing 'file' field")))?;

    let record = pipeline::upload_volume(
        &ctx,
        &filename,
        data,
        identity,
        query.public.unwrap_or(true),
        request,
    )
    .await
    .map_err(fail(request))?;

    Ok(Json(record).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub uuid_file: VolumeId,
    pub num_images: SliceIndex,
}

pub async fn predict(
    State(ctx): State<ServiceContext>,
    headers: HeaderMap,
    Json(body): Json<PredictRequest>,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let png = pipeline::render_overlay(&ctx, body.uuid_file, body.num_images, identity, request)
        .await
        .map_err(fail(request))?;
    Ok(png_response(png))
}

pub async fn slice_image(
    State(ctx): State<ServiceContext>,
    Path((volume_id, slice)): Path<(VolumeId, SliceIndex)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let png = pipeline::slice_image(&ctx, volume_id, slice, identity, request)
        .await
        .map_err(fail(request))?;
    Ok(png_response(png))
}

pub async fn slice_contours(
    State(ctx): State<ServiceContext>,
    Path((volume_id, slice)): Path<(VolumeId, SliceIndex)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let contours = pipeline::slice_contours(&ctx, volume_id, slice, identity, request)
        .await
        .map_err(fail(request))?;
    Ok(Json(contours).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SavePhotoRequest {
    pub uuid_file: VolumeId,
    pub num_images: SliceIndex,
}

pub async fn save_photo(
    State(ctx): State<ServiceContext>,
    headers: HeaderMap,
    Json(body): Json<SavePhotoRequest>,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let record = pipeline::save_photo(&ctx, body.uuid_file, body.num_images, identity, request)
        .await
        .map_err(fail(request))?;
    Ok(Json(record).into_response())
}

pub async fn list_photos(
    State(ctx): State<ServiceContext>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let photos = pipeline::photos_for_user(&ctx, identity)
        .await
        .map_err(fail(request))?;
    Ok(Json(photos).into_response())
}

pub async fn delete_photo(
    State(ctx): State<ServiceContext>,
    Path(photo_id): Path<PhotoId>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let record = pipeline::delete_photo(&ctx, photo_id, identity, request)
        .await
        .map_err(fail(request))?;
    Ok(Json(record).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SaveContoursRequest {
    pub points: Vec<Vec<[f32; 2]>>,
}

pub async fn save_contours(
    State(ctx): State<ServiceContext>,
    Path((volume_id, slice)): Path<(VolumeId, SliceIndex)>,
    headers: HeaderMap,
    Json(body): Json<SaveContoursRequest>,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let record = pipeline::save_contours(
        &ctx,
        volume_id,
        slice,
        ContourSet {
            points: body.points,
        },
        identity,
        request,
    )
    .await
    .map_err(fail(request))?;
    Ok(Json(record).into_response())
}

pub async fn latest_contours(
    State(ctx): State<ServiceContext>,
    Path((volume_id, slice)): Path<(VolumeId, SliceIndex)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = RequestId::new();
    let identity = identity_from(&headers);
    let record = pipeline::latest_saved_contours(&ctx, volume_id, slice, identity)
        .await
        .map_err(fail(request))?;

    match record {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "msg": "no saved contours", "request_id": request.to_string() })),
        )
            .into_response()),
    }
}
