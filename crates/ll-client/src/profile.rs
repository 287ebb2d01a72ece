//! Avatar handling for profile edits.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;
use ll_core::error::{AppError, Result};
use ll_core::models::UploadedFile;

/// Avatars are stored inline, so they are shrunk to fit this box first.
const AVATAR_SIZE: u32 = 200;

/// Decodes `file`, thumbnails it to 200px, and returns a PNG `data:` URL.
pub(crate) fn avatar_data_url(file: &UploadedFile) -> Result<String> {
    let img = image::load_from_memory(&file.bytes)
        .map_err(|e| AppError::Validation(format!("unsupported avatar image {}: {e}", file.name)))?;

    let thumb = img.thumbnail(AVATAR_SIZE, AVATAR_SIZE);
    let mut png = Cursor::new(Vec::new());
    thumb
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("avatar encode: {e}")))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png.into_inner())))
}
