//! Input image validation: format sniffing and size/dimension policy,
//! enforced before a job is admitted

use crate::error::{AppError, Result};

/// Accepted input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

/// What validation learned about the submitted bytes
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Admission policy for input images
#[derive(Debug, Clone)]
pub struct ImagePolicy {
    pub max_bytes: usize,
    pub max_dimension: u32,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_bytes: 25 * 1024 * 1024,
            max_dimension: 8192,
        }
    }
}

/// Validate raw upload bytes against the policy
pub fn validate(data: &[u8], policy: &ImagePolicy) -> Result<ImageInfo> {
    if data.len() > policy.max_bytes {
        return Err(AppError::InvalidRequest(format!(
            "image is {} bytes, limit is {}",
            data.len(),
            policy.max_bytes
        )));
    }

    let format = detect_format(data).ok_or_else(|| {
        AppError::InvalidRequest("unsupported image format, expected PNG or JPEG".to_string())
    })?;

    let (width, height) = match format {
        ImageFormat::Png => png_dimensions(data),
        ImageFormat::Jpeg => jpeg_dimensions(data),
    }
    .ok_or_else(|| AppError::InvalidRequest("malformed image header".to_string()))?;

    if width == 0 || height == 0 {
        return Err(AppError::InvalidRequest("image has zero dimension".to_string()));
    }
    if width > policy.max_dimension || height > policy.max_dimension {
        return Err(AppError::InvalidRequest(format!(
            "image is {}x{}, dimension limit is {}",
            width, height, policy.max_dimension
        )));
    }

    Ok(ImageInfo {
        format,
        width,
        height,
    })
}

/// Detect image format from magic bytes
fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(ImageFormat::Png);
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }

    None
}

/// Width and height from the IHDR chunk, which is required to come first
fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 24 || &data[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(data[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(data[20..24].try_into().ok()?);
    Some((width, height))
}

/// Width and height from the first SOF segment
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];

        // Fill bytes and standalone markers carry no length field
        if marker == 0xFF {
            i += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
            i += 2;
            continue;
        }

        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Some((width, height));
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 {
            return None;
        }
        i += 2 + length;
    }
    None
}
