/// Image encodings the decoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    WebP,
    Bmp,
    Unknown,
}

impl ImageKind {
    /// Codec to hand the payload to, if any.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            ImageKind::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageKind::Png => Some(image::ImageFormat::Png),
            ImageKind::Gif => Some(image::ImageFormat::Gif),
            ImageKind::WebP => Some(image::ImageFormat::WebP),
            ImageKind::Bmp => Some(image::ImageFormat::Bmp),
            ImageKind::Unknown => None,
        }
    }
}

/// Detect the image encoding from the leading bytes of a payload.
pub fn detect_image(header: &[u8]) -> ImageKind {
    // JPEG: SOI marker followed by another marker
    if header.len() >= 3 && header[0..3] == [0xFF, 0xD8, 0xFF] {
        return ImageKind::Jpeg;
    }

    // PNG: 8-byte signature
    if header.len() >= 8 && header[0..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return ImageKind::Png;
    }

    if header.len() >= 6 && (&header[0..6] == b"GIF87a" || &header[0..6] == b"GIF89a") {
        return ImageKind::Gif;
    }

    // WebP: RIFF container with "WEBP" form type at offset 8
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        return ImageKind::WebP;
    }

    // BMP: "BM" followed by a 4-byte file size
    if header.len() >= 6 && &header[0..2] == b"BM" {
        return ImageKind::Bmp;
    }

    ImageKind::Unknown
}
