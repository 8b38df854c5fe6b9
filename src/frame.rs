//! Raster frames and pixel-format normalization.
//!
//! The canonical pixel convention in this crate is **packed RGB24,
//! row-major, no padding** (`data[(y * width + x) * 3]` is the red channel).
//! Every capture source normalizes into this layout before a frame enters
//! the loop, so the overlay renderer, the JPEG encoders, and the detector
//! backends never have to care about device-native formats.
//!
//! Normalization supports the formats V4L2 webcams commonly negotiate:
//! - `Rgb24`: validated pass-through
//! - `Yuyv422`: packed YUYV 4:2:2 (two pixels per four bytes)
//! - `Nv12`: planar Y followed by interleaved UV at half resolution
//!
//! YUV conversion uses BT.601 coefficients.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// Device-native pixel layouts accepted by [`Frame::from_raw`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Yuyv422,
    Nv12,
}

/// One captured frame, normalized to packed RGB24.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB24, row-major, no padding. Length is always
    /// `width * height * 3`, enforced at construction.
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap an already-RGB24 buffer, validating its length.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Normalize a device-native buffer into a frame.
    pub fn from_raw(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let data = match format {
            PixelFormat::Rgb24 => {
                let expected = rgb_len(width, height)?;
                if pixels.len() != expected {
                    return Err(anyhow!(
                        "RGB frame length mismatch: expected {}, got {}",
                        expected,
                        pixels.len()
                    ));
                }
                pixels.to_vec()
            }
            PixelFormat::Yuyv422 => yuyv_to_rgb(pixels, width, height)?,
            PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height)?,
        };
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Copy into an `image` raster for drawing and encoding.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

fn rgb_len(width: u32, height: u32) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(3))
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frames require an even width, got {}", width));
    }
    let w = width as usize;
    let h = height as usize;
    let expected = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(2))
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; w * h * 3];
    for j in 0..h {
        for i in (0..w).step_by(2) {
            let idx = (j * w + i) * 2;
            let y0 = pixels[idx] as f32;
            let u = pixels[idx + 1] as f32 - 128.0;
            let y1 = pixels[idx + 2] as f32;
            let v = pixels[idx + 3] as f32 - 128.0;

            let offset = (j * w + i) * 3;
            write_yuv_pixel(&mut rgb[offset..offset + 3], y0, u, v);
            write_yuv_pixel(&mut rgb[offset + 3..offset + 6], y1, u, v);
        }
    }
    Ok(rgb)
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let offset = (j * w + i) * 3;
            write_yuv_pixel(&mut rgb[offset..offset + 3], y, u, v);
        }
    }
    Ok(rgb)
}

fn write_yuv_pixel(out: &mut [u8], y: f32, u: f32, v: f32) {
    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;
    out[0] = clamp_to_u8(r);
    out[1] = clamp_to_u8(g);
    out[2] = clamp_to_u8(b);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_pass_through_validates_length() -> Result<()> {
        let pixels = vec![1u8; 9];
        let frame = Frame::from_raw(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(frame.data, pixels);

        assert!(Frame::from_raw(&pixels, 2, 3, PixelFormat::Rgb24).is_err());
        Ok(())
    }

    #[test]
    fn yuyv_conversion_produces_gray() -> Result<()> {
        // Y=128, U=V=128 decodes to mid-gray for every pixel.
        let yuyv = vec![128u8; 2 * 2 * 2];
        let frame = Frame::from_raw(&yuyv, 2, 2, PixelFormat::Yuyv422)?;
        assert_eq!(frame.data, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn yuyv_rejects_odd_width() {
        let yuyv = vec![128u8; 6];
        assert!(Frame::from_raw(&yuyv, 3, 1, PixelFormat::Yuyv422).is_err());
    }

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let y_plane = vec![128u8; 4];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane, uv_plane].concat();

        let frame = Frame::from_raw(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(frame.data, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn to_rgb_image_keeps_geometry() -> Result<()> {
        let frame = Frame::from_rgb(vec![7u8; 4 * 2 * 3], 4, 2)?;
        let img = frame.to_rgb_image()?;
        assert_eq!((img.width(), img.height()), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0, [7, 7, 7]);
        Ok(())
    }
}
