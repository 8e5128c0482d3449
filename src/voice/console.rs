//! Terminal stand-ins for the microphone and speaker
//!
//! Used with `--disable-voice`: typed lines are utterances and prompts are
//! printed instead of spoken.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use super::{Listener, Speaker, Utterance};
use crate::Result;

/// Reads utterances from stdin
pub struct ConsoleListener {
    lines: Lines<BufReader<Stdin>>,
    window: Duration,
    active: bool,
}

impl ConsoleListener {
    /// `window` bounds how long one `listen` waits for a line
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            window,
            active: false,
        }
    }
}

#[async_trait(?Send)]
impl Listener for ConsoleListener {
    fn resume(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.active = false;
    }

    async fn listen(&mut self) -> Result<Option<Utterance>> {
        if !self.active {
            return Ok(None);
        }
        // next_line is cancel safe, a partial line survives the timeout
        match tokio::time::timeout(self.window, self.lines.next_line()).await {
            Ok(Ok(Some(line))) if !line.trim().is_empty() => {
                Ok(Some(Utterance::new(line.trim())))
            }
            Ok(Ok(None)) => {
                // stdin closed; behave like silence instead of spinning
                tokio::time::sleep(self.window).await;
                Ok(None)
            }
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(Some(_))) | Err(_) => Ok(None),
        }
    }
}

/// Prints prompts to stdout
#[derive(Debug, Default)]
pub struct ConsoleSpeaker;

#[async_trait(?Send)]
impl Speaker for ConsoleSpeaker {
    #[allow(clippy::print_stdout)]
    async fn say(&mut self, text: &str) -> Result<()> {
        println!("» {text}");
        Ok(())
    }
}
