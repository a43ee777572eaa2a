//! Signature and stamp images.
//!
//! Uploads are sniffed by content, not by file name. Only PNG, JPEG and GIF are accepted.
//! Stored images travel to forms as `data:` URIs.

use crate::{FormsError, FormsResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// File extensions a stored signature may carry.
pub const SIGNATURE_EXTENSIONS: [&str; 3] = ["png", "jpg", "gif"];

/// A validated signature image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureImage {
    mime: &'static str,
    extension: &'static str,
    bytes: Vec<u8>,
}

impl SignatureImage {
    /// Validates an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns `FormsError::Validation` if the file is empty, larger than `max_bytes`, or
    /// not a PNG, JPEG or GIF image.
    pub fn from_upload(bytes: Vec<u8>, max_bytes: u64) -> FormsResult<Self> {
        if bytes.is_empty() {
            return Err(FormsError::Validation("no file selected".into()));
        }
        if bytes.len() as u64 > max_bytes {
            return Err(FormsError::Validation(format!(
                "file is larger than {} bytes",
                max_bytes
            )));
        }

        let kind = infer::get(&bytes)
            .ok_or_else(|| FormsError::Validation("file is not an image".into()))?;
        let (mime, extension) = match kind.mime_type() {
            "image/png" => ("image/png", "png"),
            "image/jpeg" => ("image/jpeg", "jpg"),
            "image/gif" => ("image/gif", "gif"),
            other => {
                return Err(FormsError::Validation(format!(
                    "unsupported image type: {other}"
                )))
            }
        };

        Ok(Self {
            mime,
            extension,
            bytes,
        })
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn to_data_uri(&self) -> String {
        data_uri(self.mime, &self.bytes)
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// MIME type for a stored signature's extension.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_from_upload_detects_supported_formats() {
        for (bytes, mime, ext) in [
            (PNG, "image/png", "png"),
            (JPEG, "image/jpeg", "jpg"),
            (GIF, "image/gif", "gif"),
        ] {
            let image = SignatureImage::from_upload(bytes.to_vec(), 1024).expect("image");
            assert_eq!(image.mime(), mime);
            assert_eq!(image.extension(), ext);
        }
    }

    #[test]
    fn test_from_upload_rejects_non_images_and_oversize() {
        let err = SignatureImage::from_upload(b"%PDF-1.4 not an image".to_vec(), 1024)
            .expect_err("pdf");
        assert!(err.is_validation());

        let err = SignatureImage::from_upload(PNG.to_vec(), 4).expect_err("too large");
        assert!(err.is_validation());

        let err = SignatureImage::from_upload(Vec::new(), 1024).expect_err("empty");
        assert!(err.is_validation());
    }

    #[test]
    fn test_data_uri_embeds_mime_and_base64() {
        let image = SignatureImage::from_upload(GIF.to_vec(), 1024).expect("gif");
        let uri = image.to_data_uri();
        assert!(uri.starts_with("data:image/gif;base64,R0lGOD"));
        assert_eq!(uri, data_uri("image/gif", GIF));
    }

    #[test]
    fn test_mime_for_extension() {
        for ext in SIGNATURE_EXTENSIONS {
            assert!(mime_for_extension(ext).is_some());
        }
        assert_eq!(mime_for_extension("JPEG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("bmp"), None);
    }
}
