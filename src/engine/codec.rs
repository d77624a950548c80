// Synchronous encode/decode helpers. Callers run these on a blocking-friendly thread.

use std::io::Cursor;

use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::detect::format::detect_image;

/// Decode a payload after sniffing its format from the magic bytes.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let kind = detect_image(bytes);
    let format = kind
        .image_format()
        .ok_or_else(|| anyhow!("unrecognised image payload ({} bytes)", bytes.len()))?;
    let image = image::load_from_memory_with_format(bytes, format)?;
    Ok(image)
}

/// Re-encode `image` as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut out = Cursor::new(Vec::with_capacity(rgb.as_raw().len() / 4));
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out.into_inner())
}
