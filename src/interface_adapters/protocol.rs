use std::fmt;
use std::str::FromStr;

use crate::domain::entities::ContentRecord;

// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Unlock { pin: String },
    Status,
    Lock,
    Pin,
    Rotate,
    Share,
    Request { message: String },
    Feed,
    Post { text: String },
    Export,
    Import { json: String },
    Resume,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    Empty,
    Unknown(String),
    MissingArgument(&'static str),
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandParseError::Empty => write!(f, "empty command"),
            CommandParseError::Unknown(verb) => write!(f, "unknown command: {verb}"),
            CommandParseError::MissingArgument(name) => write!(f, "missing argument: {name}"),
        }
    }
}

impl std::error::Error for CommandParseError {}

impl FromStr for Command {
    type Err = CommandParseError;

    // The argument after the first space is passed through untouched; PINs are
    // compared byte for byte.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = match line.trim_start().split_once(' ') {
            Some((verb, rest)) => (verb, rest),
            None => (line.trim(), ""),
        };

        match verb {
            "" => Err(CommandParseError::Empty),
            "unlock" => Ok(Command::Unlock {
                pin: rest.to_string(),
            }),
            "status" => Ok(Command::Status),
            "lock" => Ok(Command::Lock),
            "pin" => Ok(Command::Pin),
            "rotate" => Ok(Command::Rotate),
            "share" => Ok(Command::Share),
            "request" => Ok(Command::Request {
                message: rest.trim().to_string(),
            }),
            "feed" => Ok(Command::Feed),
            "post" if rest.trim().is_empty() => Err(CommandParseError::MissingArgument("text")),
            "post" => Ok(Command::Post {
                text: rest.trim().to_string(),
            }),
            "export" => Ok(Command::Export),
            "import" if rest.trim().is_empty() => Err(CommandParseError::MissingArgument("json")),
            "import" => Ok(Command::Import {
                json: rest.to_string(),
            }),
            "resume" => Ok(Command::Resume),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandParseError::Unknown(other.to_string())),
        }
    }
}

pub const HELP_TEXT: &str = "\
commands:
  unlock <pin>       redeem a single-use PIN and open a 5 minute window
  status             show whether access is currently granted
  lock               end the current session
  pin                show the active PIN (owner)
  rotate             replace the active PIN (owner)
  share              print the profile link and rotate the PIN (owner)
  request <message>  ask the owner for a PIN
  feed               show the profile feed (requires access)
  post <text>        add a text entry to the feed (owner)
  export             print the feed as JSON (requires access)
  import <json>      replace the feed with an exported snapshot (owner)
  resume             re-check access after coming back to the client
  quit               leave";

// Output for one handled command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Unlocked { expires_at: u64, ttl_ms: u64 },
    Granted { remaining_ms: u64 },
    Locked { was_active: bool },
    ActivePin { pin: String, redeemed_count: usize },
    Rotated { pin: String },
    Shared { link: String, pin: String },
    Requested,
    Feed { records: Vec<ContentRecord> },
    Published { id: String },
    Exported { json: String },
    Imported { count: usize },
    Help,
    Error { message: String },
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}

fn format_remaining(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}m{:02}s", seconds / 60, seconds % 60)
}

fn render_record(f: &mut fmt::Formatter<'_>, record: &ContentRecord) -> fmt::Result {
    match record.payload.get("text").and_then(|text| text.as_str()) {
        Some(text) => writeln!(f, "- [{}] {text}", record.created_at),
        None => writeln!(f, "- [{}] {}", record.created_at, record.payload),
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Unlocked { ttl_ms, .. } => {
                write!(f, "unlocked for {}", format_remaining(*ttl_ms))
            }
            Reply::Granted { remaining_ms } => {
                write!(f, "access granted, {} left", format_remaining(*remaining_ms))
            }
            Reply::Locked { was_active: true } => write!(f, "session ended"),
            Reply::Locked { was_active: false } => write!(f, "no active session"),
            Reply::ActivePin {
                pin,
                redeemed_count,
            } => write!(f, "active pin: {pin} ({redeemed_count} redeemed so far)"),
            Reply::Rotated { pin } => write!(f, "new pin: {pin}"),
            Reply::Shared { link, pin } => write!(f, "share {link} with pin {pin}"),
            Reply::Requested => write!(f, "request sent; the owner has a fresh PIN for you"),
            Reply::Feed { records } if records.is_empty() => write!(f, "feed is empty"),
            Reply::Feed { records } => {
                for record in records {
                    render_record(f, record)?;
                }
                Ok(())
            }
            Reply::Published { id } => write!(f, "posted {id}"),
            Reply::Exported { json } => write!(f, "{json}"),
            Reply::Imported { count } => write!(f, "imported {count} records"),
            Reply::Help => write!(f, "{HELP_TEXT}"),
            Reply::Error { message } => write!(f, "error: {message}"),
        }
    }
}
