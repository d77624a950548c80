mod common;

use gallery_engine::detect::format::{detect_image, ImageKind};
use image::ImageFormat;

#[test]
fn test_detect_encoded_formats() {
    let image = common::test_image(8, 8);
    let cases = [
        (ImageFormat::Png, ImageKind::Png),
        (ImageFormat::Jpeg, ImageKind::Jpeg),
        (ImageFormat::Gif, ImageKind::Gif),
        (ImageFormat::Bmp, ImageKind::Bmp),
    ];
    for (format, expected) in cases {
        let bytes = common::encode(&image, format);
        assert_eq!(detect_image(&bytes), expected, "{format:?}");
    }
}

#[test]
fn test_detect_webp_header() {
    // RIFF <size> WEBP VP8L
    let mut header = vec![0u8; 32];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&24u32.to_le_bytes());
    header[8..12].copy_from_slice(b"WEBP");
    header[12..16].copy_from_slice(b"VP8L");
    assert_eq!(detect_image(&header), ImageKind::WebP);
}

#[test]
fn test_riff_without_webp_is_unknown() {
    let mut header = vec![0u8; 32];
    header[0..4].copy_from_slice(b"RIFF");
    header[8..12].copy_from_slice(b"WAVE");
    assert_eq!(detect_image(&header), ImageKind::Unknown);
}

#[test]
fn test_detect_unknown_payloads() {
    assert_eq!(detect_image(b""), ImageKind::Unknown);
    assert_eq!(detect_image(b"<!DOCTYPE html>"), ImageKind::Unknown);
    assert_eq!(detect_image(&[0xFF, 0xD8]), ImageKind::Unknown);
    assert_eq!(ImageKind::Unknown.image_format(), None);
    assert_eq!(ImageKind::Jpeg.image_format(), Some(ImageFormat::Jpeg));
}
