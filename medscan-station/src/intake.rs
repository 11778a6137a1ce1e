//! Image intake
//!
//! Validates and decodes a user-supplied image into an in-memory
//! representation. Validation failures never touch session state; the
//! caller only hands a successfully decoded image to the session.

use chrono::{DateTime, Utc};
use image::GenericImageView;
use medscan_common::config::UploadConfig;
use medscan_common::{Error, Result};
use tracing::debug;

/// A raw file-like upload, as received from the file picker or drag-drop
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A validated, decoded session image
///
/// Keeps the original encoded bytes (they become the training-record
/// attachment on submission) alongside the decoded dimensions.
#[derive(Debug, Clone)]
pub struct StationImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub loaded_at: DateTime<Utc>,
}

/// Upload validator/decoder configured with the deployment's ceiling and
/// accepted MIME types
#[derive(Debug, Clone)]
pub struct ImageIntake {
    max_bytes: usize,
    accepted_types: Vec<String>,
}

impl ImageIntake {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            max_bytes: config.max_bytes,
            accepted_types: config.accepted_types.clone(),
        }
    }

    /// Validate an upload without decoding it: MIME type first, then the
    /// size ceiling. Used on its own for comment attachments.
    pub fn validate(&self, upload: &RawUpload) -> Result<()> {
        if !self.mime_accepted(&upload.content_type) {
            return Err(Error::InvalidInput(format!(
                "unsupported file type '{}', expected an image",
                upload.content_type
            )));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(Error::PayloadTooLarge {
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Validate and decode an upload into a session image
    pub fn accept(&self, upload: RawUpload) -> Result<StationImage> {
        self.validate(&upload)?;

        let decoded = image::load_from_memory(&upload.bytes).map_err(|e| {
            Error::InvalidInput(format!("'{}' could not be decoded: {e}", upload.file_name))
        })?;
        let (width, height) = decoded.dimensions();

        debug!(
            file_name = %upload.file_name,
            width,
            height,
            size = upload.bytes.len(),
            "accepted image upload"
        );

        Ok(StationImage {
            file_name: upload.file_name,
            content_type: upload.content_type,
            bytes: upload.bytes,
            width,
            height,
            loaded_at: Utc::now(),
        })
    }

    fn mime_accepted(&self, content_type: &str) -> bool {
        self.accepted_types.iter().any(|accepted| {
            match accepted.strip_suffix("/*") {
                Some(prefix) => content_type
                    .split_once('/')
                    .is_some_and(|(main, _)| main == prefix),
                None => accepted == content_type,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    fn intake(max_bytes: usize) -> ImageIntake {
        ImageIntake::new(&UploadConfig {
            max_bytes,
            accepted_types: vec!["image/*".to_string()],
        })
    }

    /// Encode a tiny PNG in memory for decode tests
    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba([128u8, 0, 64, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn upload(content_type: &str, bytes: Vec<u8>) -> RawUpload {
        RawUpload {
            file_name: "scan.png".to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    #[test]
    fn accepts_and_decodes_valid_png() {
        let image = intake(10 * 1024 * 1024)
            .accept(upload("image/png", png_bytes(8, 4)))
            .unwrap();
        assert_eq!((image.width, image.height), (8, 4));
        assert_eq!(image.content_type, "image/png");
        assert!(!image.bytes.is_empty());
    }

    #[test]
    fn rejects_non_image_mime_type() {
        let result = intake(10 * 1024 * 1024).accept(upload("application/pdf", png_bytes(2, 2)));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rejects_oversize_upload_against_50mb_ceiling() {
        // 60 MB upload against a 50 MB ceiling; the size check runs before
        // decode so the payload content does not matter.
        let ceiling = 50 * 1024 * 1024;
        let result = intake(ceiling).accept(upload("image/png", vec![0u8; 60 * 1024 * 1024]));
        match result {
            Err(Error::PayloadTooLarge { size, limit }) => {
                assert_eq!(size, 60 * 1024 * 1024);
                assert_eq!(limit, ceiling);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn rejects_undecodable_bytes() {
        let result = intake(1024).accept(upload("image/png", b"not a png".to_vec()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn explicit_accept_list_matches_exactly() {
        let intake = ImageIntake::new(&UploadConfig {
            max_bytes: 1024 * 1024,
            accepted_types: vec!["image/png".to_string(), "image/jpeg".to_string()],
        });

        assert!(intake.validate(&upload("image/png", vec![1])).is_ok());
        assert!(intake.validate(&upload("image/webp", vec![1])).is_err());
    }

    #[test]
    fn wildcard_does_not_match_other_majors() {
        let intake = intake(1024);
        assert!(intake.validate(&upload("text/image", vec![1])).is_err());
        assert!(intake.validate(&upload("image/webp", vec![1])).is_ok());
    }
}
