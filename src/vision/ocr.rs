//! Text recognition backends

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::{Frame, TextFragment, TextRecognizer};
use crate::{Error, Result};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_VISION_MODEL: &str = "claude-sonnet-4-20250514";

/// Reply the vision model is told to use when nothing is legible
const NO_TEXT_MARKER: &str = "(none)";

const TRANSCRIBE_PROMPT: &str = "Transcribe all text printed on this medication box. \
Write each separate block of text on its own line, exactly as printed, with no commentary. \
If no text is legible, reply with (none).";

/// Local `tesseract` binary
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
}

impl TesseractOcr {
    /// `language` is a tesseract language pack, e.g. "ita"
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractOcr {
    async fn recognize(&self, frame: &Frame) -> Result<Vec<TextFragment>> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("frame.jpg");
        tokio::fs::write(&input, &frame.bytes).await?;

        let output = Command::new("tesseract")
            .arg(&input)
            .arg("stdout")
            .args(["-l", &self.language, "tsv"])
            .output()
            .await
            .map_err(|e| Error::Vision(format!("tesseract: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Vision(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let fragments = parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(lines = fragments.len(), "tesseract finished");
        Ok(fragments)
    }
}

/// Group tesseract TSV word rows into one fragment per text line
///
/// Confidence is the mean word confidence scaled to 0.0-1.0. Rows without
/// text or with a negative confidence are skipped.
#[must_use]
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<TextFragment> {
    // (page, block, paragraph, line) -> (words, confidences)
    let mut lines: BTreeMap<(u32, u32, u32, u32), (Vec<String>, Vec<f32>)> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let text = cols[11].trim();
        let Ok(conf) = cols[10].trim().parse::<f32>() else {
            continue;
        };
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let key = (
            cols[1].parse().unwrap_or(0),
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        let entry = lines.entry(key).or_default();
        entry.0.push(text.to_string());
        entry.1.push(conf);
    }

    lines
        .into_values()
        .map(|(words, confs)| {
            #[allow(clippy::cast_precision_loss)]
            let mean = confs.iter().sum::<f32>() / confs.len() as f32;
            TextFragment::new(words.join(" "), (mean / 100.0).clamp(0.0, 1.0))
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

/// Anthropic vision model asked to transcribe the box
pub struct VisionOcr {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl VisionOcr {
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("Anthropic API key required for vision OCR".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
        })
    }
}

#[async_trait]
impl TextRecognizer for VisionOcr {
    async fn recognize(&self, frame: &Frame) -> Result<Vec<TextFragment>> {
        let request = MessageRequest {
            model: &self.model,
            max_tokens: 300,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: normalize_mime_type(&frame.mime_type),
                            data: base64::engine::general_purpose::STANDARD.encode(&frame.bytes),
                        },
                    },
                    ContentBlock::Text {
                        text: TRANSCRIBE_PROMPT,
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("API error {status}: {body}")));
        }

        let result: MessageResponse = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("parse error: {e}")))?;

        let transcript: String = result
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n");

        let fragments = transcript_fragments(&transcript);
        tracing::debug!(lines = fragments.len(), "vision transcription finished");
        Ok(fragments)
    }
}

/// One fragment per non-empty transcript line
fn transcript_fragments(transcript: &str) -> Vec<TextFragment> {
    transcript
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case(NO_TEXT_MARKER))
        .map(|l| TextFragment::new(l, 1.0))
        .collect()
}

fn normalize_mime_type(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "image/png" => "image/png",
        "image/gif" => "image/gif",
        "image/webp" => "image/webp",
        _ => "image/jpeg",
    }
}
