//! Conversion between image files and the data-URL text stored in the blob
//! store.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::storage::error::{StorageError, StorageResult};

/// Default longest edge of generated thumbnails, in pixels.
pub const DEFAULT_THUMBNAIL_EDGE: u32 = 320;

/// MIME type guessed from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Encode raw bytes as a base64 data URL.
pub fn bytes_to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 data URL into its MIME type and decoded bytes.
pub fn decode_data_url(url: &str) -> StorageResult<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| StorageError::EncodingError("not a data URL".into()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| StorageError::EncodingError("data URL is not base64".into()))?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| StorageError::EncodingError(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}

/// Read a file and convert it to a data URL. Single attempt; any failure is
/// an `EncodingError`.
pub async fn file_to_persistable_encoding(path: impl AsRef<Path>) -> StorageResult<String> {
    let path = path.as_ref();
    let bytes = read_image_file(path).await?;
    Ok(bytes_to_data_url(&bytes, mime_for_path(path)))
}

/// Read the raw bytes of an image file. Read failures are encoding errors.
pub async fn read_image_file(path: &Path) -> StorageResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| StorageError::EncodingError(format!("{}: {}", path.display(), e)))
}

/// Decode an image and re-encode it as a JPEG data URL whose longest edge is
/// at most `max_edge`. Smaller images are not upscaled.
pub fn make_thumbnail(bytes: &[u8], max_edge: u32) -> StorageResult<String> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| StorageError::EncodingError(format!("decode failed: {}", e)))?;

    let (width, height) = img.dimensions();
    let scaled = if width > max_edge || height > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());
    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .map_err(|e| StorageError::EncodingError(format!("encode failed: {}", e)))?;

    Ok(bytes_to_data_url(&out, "image/jpeg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("front.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_data_url_decode() {
        let url = bytes_to_data_url(b"hello", "text/plain");
        assert_eq!(url, "data:text/plain;base64,aGVsbG8=");

        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"hello");

        assert!(matches!(
            decode_data_url("http://example.com/x.png"),
            Err(StorageError::EncodingError(_))
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,!!!"),
            Err(StorageError::EncodingError(_))
        ));
    }

    #[test]
    fn test_thumbnail_bounds_longest_edge() {
        let thumb = make_thumbnail(&png_bytes(400, 200), 100).unwrap();
        let (mime, bytes) = decode_data_url(&thumb).unwrap();
        assert_eq!(mime, "image/jpeg");

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn test_thumbnail_does_not_upscale() {
        let thumb = make_thumbnail(&png_bytes(40, 30), 100).unwrap();
        let (_, bytes) = decode_data_url(&thumb).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_thumbnail_rejects_garbage() {
        assert!(matches!(
            make_thumbnail(b"definitely not an image", 100),
            Err(StorageError::EncodingError(_))
        ));
    }

    #[tokio::test]
    async fn test_file_to_persistable_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("side.png");
        let bytes = png_bytes(8, 8);
        std::fs::write(&path, &bytes).unwrap();

        let url = file_to_persistable_encoding(&path).await.unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap().1, bytes);

        let missing = file_to_persistable_encoding(dir.path().join("gone.jpg")).await;
        assert!(matches!(missing, Err(StorageError::EncodingError(_))));
    }
}
