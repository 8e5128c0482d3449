//! Still capture through an external program

use async_trait::async_trait;
use tokio::process::Command;

use super::{Camera, Frame};
use crate::config::CameraConfig;
use crate::{Error, Result};

/// Runs a capture program (`fswebcam` by default) that writes one JPEG
///
/// `{device}` and `{output}` in the arguments are replaced with the device
/// index and a scratch file path.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    device: u32,
    command: String,
    args: Vec<String>,
}

impl CommandCamera {
    #[must_use]
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            device: config.device,
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }

    fn expand_args(&self, output: &str) -> Vec<String> {
        let device = self.device.to_string();
        self.args
            .iter()
            .map(|a| a.replace("{device}", &device).replace("{output}", output))
            .collect()
    }
}

#[async_trait(?Send)]
impl Camera for CommandCamera {
    async fn capture(&mut self) -> Result<Frame> {
        let scratch = tempfile::tempdir()
            .map_err(|e| Error::CaptureUnavailable(format!("scratch dir: {e}")))?;
        let path = scratch.path().join("frame.jpg");
        let args = self.expand_args(&path.to_string_lossy());

        tracing::debug!(command = %self.command, ?args, "capturing frame");
        let output = Command::new(&self.command)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::CaptureUnavailable(format!("{}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CaptureUnavailable(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::CaptureUnavailable(format!("no frame written: {e}")))?;
        if bytes.is_empty() {
            return Err(Error::CaptureUnavailable("empty frame".to_string()));
        }

        tracing::info!(bytes = bytes.len(), device = self.device, "frame captured");
        Ok(Frame::jpeg(bytes))
    }
}
