use image::ImageFormat;
use std::path::Path;

/// Content type sent for files we can't identify; the gateway rejects it.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

pub fn is_image_file(path: &Path) -> bool {
    matches!(
        extension(path).as_deref(),
        Some("jpg" | "jpeg" | "png" | "gif" | "webp")
    )
}

/// Content type from the file's magic bytes, falling back to its extension.
pub fn content_type(path: &Path, bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(other) => {
            tracing::debug!("Unsupported image format {:?}: {}", other, path.display());
            UNKNOWN_CONTENT_TYPE
        }
        Err(_) => match extension(path).as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => UNKNOWN_CONTENT_TYPE,
        },
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}
