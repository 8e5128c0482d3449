//! Medication box verification
//!
//! A [`Camera`] produces a still [`Frame`], a [`TextRecognizer`] reads the
//! text printed on it and the [`BoxMatcher`] decides whether the expected
//! medication name appears among the recognized fragments.

mod archive;
mod camera;
mod matcher;
mod ocr;

pub use archive::PhotoArchive;
pub use camera::CommandCamera;
pub use matcher::{BoxMatcher, partial_ratio, ratio};
pub use ocr::{TesseractOcr, VisionOcr, parse_tesseract_tsv};

use async_trait::async_trait;

use crate::Result;

/// Minimum partial-similarity score (0-100) for a box to count as verified
pub const DEFAULT_THRESHOLD: u8 = 80;

/// A captured still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Frame {
    #[must_use]
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }
}

/// One piece of recognized text
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// 0.0 to 1.0
    pub confidence: f32,
}

impl TextFragment {
    #[must_use]
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Still image capture
#[async_trait(?Send)]
pub trait Camera {
    /// Capture one frame
    ///
    /// # Errors
    ///
    /// Returns `CaptureUnavailable` if the device cannot be opened or read
    async fn capture(&mut self) -> Result<Frame>;
}

/// Text recognition over a frame
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text; an empty list is a valid result
    ///
    /// # Errors
    ///
    /// Returns error if the recognition engine fails
    async fn recognize(&self, frame: &Frame) -> Result<Vec<TextFragment>>;
}
