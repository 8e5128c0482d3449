//! Caregiver bot commands
//!
//! Wire forms:
//!
//! - `/start`, `/help`
//! - `/sendhelp<NAME>`
//! - `/sendrecap<NAME><bene|male><day-HH:MM>`
//!
//! The controller emits `/sendhelp` and `/sendrecap`; the bot renders every
//! command as the Italian text a caregiver reads.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;

use crate::controller::Feeling;
use crate::plan::{day_name, italian_day_name};
use crate::{Error, Result};

static SEND_HELP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/sendhelp<([\p{L}' ]+)>$").expect("valid regex")
});

static SEND_RECAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/sendrecap<([\p{L}' ]+)><(bene|male)><(monday|tuesday|wednesday|thursday|friday|saturday|sunday)-([01]?[0-9]|2[0-3]):([0-5][0-9])>$",
    )
    .expect("valid regex")
});

/// A message from the assistant (or a caregiver) to the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaregiverCommand {
    /// Greeting
    Start,
    /// Usage text
    Help,
    /// The patient asked for help
    SendHelp { patient: String },
    /// A medication round was completed
    SendRecap {
        patient: String,
        feeling: Feeling,
        /// Lowercase English weekday
        day: String,
        hour: u32,
        minute: u32,
    },
}

impl CaregiverCommand {
    #[must_use]
    pub fn help_request(patient: &str) -> Self {
        Self::SendHelp {
            patient: patient.to_string(),
        }
    }

    /// Recap stamped with `at`
    ///
    /// # Errors
    ///
    /// Returns error if the feeling was never classified
    pub fn recap(patient: &str, feeling: Feeling, at: NaiveDateTime) -> Result<Self> {
        if feeling == Feeling::Unknown {
            return Err(Error::InvalidCommand(
                "recap requires a known feeling".to_string(),
            ));
        }
        Ok(Self::SendRecap {
            patient: patient.to_string(),
            feeling,
            day: day_name(at.weekday()).to_string(),
            hour: at.hour(),
            minute: at.minute(),
        })
    }

    /// Text shown to the caregiver
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Start => "Welcome to the patient helper!".to_string(),
            Self::Help => "The bot will notify you when your assisted person needs help \
                           and when they took their medications."
                .to_string(),
            Self::SendHelp { patient } => {
                format!("{patient} ha bisogno del tuo aiuto!\nMettiti in contatto il prima possibile!")
            }
            Self::SendRecap {
                patient,
                feeling,
                day,
                hour,
                minute,
            } => {
                let day = italian_day_name(day).unwrap_or(day.as_str());
                let feeling = feeling.wire_word().unwrap_or("?");
                format!(
                    "Ecco il recap per {patient}.\nSi sente {feeling}.\n\
                     {day} alle {hour:02}:{minute:02} ha preso i seguenti farmaci:"
                )
            }
        }
    }
}

impl fmt::Display for CaregiverCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("/start"),
            Self::Help => f.write_str("/help"),
            Self::SendHelp { patient } => write!(f, "/sendhelp<{patient}>"),
            Self::SendRecap {
                patient,
                feeling,
                day,
                hour,
                minute,
            } => write!(
                f,
                "/sendrecap<{patient}><{}><{day}-{hour:02}:{minute:02}>",
                feeling.wire_word().unwrap_or("?")
            ),
        }
    }
}

impl FromStr for CaregiverCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        // Telegram appends @botname to commands in groups
        let command = s.split_once('@').map_or(s, |(head, _)| head);
        match command {
            "/start" => return Ok(Self::Start),
            "/help" => return Ok(Self::Help),
            _ => {}
        }

        if let Some(caps) = SEND_HELP.captures(s) {
            return Ok(Self::SendHelp {
                patient: caps[1].to_string(),
            });
        }

        if let Some(caps) = SEND_RECAP.captures(s) {
            let number = |i: usize| {
                caps[i]
                    .parse::<u32>()
                    .map_err(|e| Error::InvalidCommand(e.to_string()))
            };
            return Ok(Self::SendRecap {
                patient: caps[1].to_string(),
                feeling: Feeling::from_wire(&caps[2]),
                day: caps[3].to_string(),
                hour: number(4)?,
                minute: number(5)?,
            });
        }

        Err(Error::InvalidCommand(s.to_string()))
    }
}
