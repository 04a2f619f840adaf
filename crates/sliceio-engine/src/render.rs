//! PNG rendering of slices and contour overlays.
//!
//! Rendering is deterministic: the same slice and contours always encode
//! to byte-identical PNGs, which is what makes the result-level cache
//! idempotent across recomputations.

use crate::contour::ContourSet;
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use sliceio_volume::Slice;
use std::io::Cursor;
use thiserror::Error;

const CONTOUR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Error type for rendering failures
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("slice has no voxel data")]
    EmptySlice,

    #[error("png encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

fn to_gray(slice: &Slice) -> Result<GrayImage, RenderError> {
    if slice.width == 0 || slice.height == 0 {
        return Err(RenderError::EmptySlice);
    }
    let mut img = GrayImage::new(slice.width, slice.height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let v = slice.at(x, y).clamp(0.0, 1.0);
        pixel.0 = [(v * 255.0).round() as u8];
    }
    Ok(img)
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, RenderError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Render the base slice as a grayscale PNG.
pub fn render_slice(slice: &Slice) -> Result<Vec<u8>, RenderError> {
    encode_png(DynamicImage::ImageLuma8(to_gray(slice)?))
}

/// Render the slice with the contour polygons drawn on top.
pub fn render_overlay(slice: &Slice, contours: &ContourSet) -> Result<Vec<u8>, RenderError> {
    let gray = to_gray(slice)?;
    let mut img: RgbImage = DynamicImage::ImageLuma8(gray).into_rgb8();

    for polygon in &contours.points {
        for i in 0..polygon.len() {
            let a = polygon[i];
            let b = polygon[(i + 1) % polygon.len()];
            draw_segment(&mut img, a, b);
        }
    }

    encode_png(DynamicImage::ImageRgb8(img))
}

/// Bresenham line between two contour points.
fn draw_segment(img: &mut RgbImage, a: [f32; 2], b: [f32; 2]) {
    let (mut x0, mut y0) = (a[0].round() as i64, a[1].round() as i64);
    let (x1, y1) = (b[0].round() as i64, b[1].round() as i64);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x0 >= 0 && y0 >= 0 && x0 < i64::from(img.width()) && y0 < i64::from(img.height()) {
            img.put_pixel(x0 as u32, y0 as u32, CONTOUR_COLOR);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_slice() -> Slice {
        let mut data = vec![0.1f32; 64];
        for y in 2..6 {
            for x in 2..6 {
                data[y * 8 + x] = 0.9;
            }
        }
        Slice {
            width: 8,
            height: 8,
            data,
        }
    }

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

    #[test]
    fn test_render_slice_is_png() {
        let png = render_slice(&sample_slice()).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_render_is_byte_deterministic() {
        let slice = sample_slice();
        let contours = ContourSet {
            points: vec![vec![[2.0, 2.0], [5.0, 2.0], [5.0, 5.0], [2.0, 5.0]]],
        };
        assert_eq!(
            render_overlay(&slice, &contours).unwrap(),
            render_overlay(&slice, &contours).unwrap()
        );
    }

    #[test]
    fn test_overlay_differs_from_base() {
        let slice = sample_slice();
        let contours = ContourSet {
            points: vec![vec![[2.0, 2.0], [5.0, 2.0], [5.0, 5.0], [2.0, 5.0]]],
        };
        assert_ne!(
            render_overlay(&slice, &contours).unwrap(),
            render_slice(&slice).unwrap()
        );
    }

    #[test]
    fn test_empty_slice_is_rejected() {
        let slice = Slice {
            width: 0,
            height: 0,
            data: vec![],
        };
        assert!(matches!(render_slice(&slice), Err(RenderError::EmptySlice)));
    }

    #[test]
    fn test_out_of_bounds_contour_points_are_clipped() {
        let slice = sample_slice();
        let contours = ContourSet {
            points: vec![vec![[-10.0, -10.0], [100.0, 100.0]]],
        };
        assert!(render_overlay(&slice, &contours).is_ok());
    }
}
