//! Line types for Linecast's wire format.
//!
//! Every line the relay produces is a [`ServerLine`]; its `Display`
//! impl is the exact text that goes on the wire (the outbound pump adds
//! the `\n`). Every line a client sends after the handshake parses into a
//! [`ClientLine`].

use std::fmt;

use chrono::{Local, NaiveTime};

use crate::{EXIT_COMMAND, SHUTDOWN_NOTICE};

// ---------------------------------------------------------------------------
// ServerLine
// ---------------------------------------------------------------------------

/// A line produced by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Banner queued for a newly admitted client only.
    Welcome { name: String },

    /// Someone entered the room.
    Joined { name: String },

    /// Someone left the room, by choice or because they were dropped.
    Left { name: String },

    /// Everyone currently in the room, in join order. Never empty; see
    /// [`ServerLine::roster`].
    Roster { names: Vec<String> },

    /// A chat message, stamped with the wall-clock time it was received.
    Chat {
        time: NaiveTime,
        name: String,
        text: String,
    },

    /// The relay is going away.
    Shutdown,
}

impl ServerLine {
    /// Builds a roster line, or `None` when nobody is left to list.
    pub fn roster<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            None
        } else {
            Some(Self::Roster { names })
        }
    }

    /// Builds a chat line stamped with the current local time.
    pub fn chat_now(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            time: Local::now().time(),
            name: name.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome { name } => write!(
                f,
                "=== Welcome ===\nYour username: {name}\nType '{EXIT_COMMAND}' to quit\n===\n"
            ),
            Self::Joined { name } => {
                write!(f, "*** {name} has joined the chat ***")
            }
            Self::Left { name } => write!(f, "*** {name} has left the chat ***"),
            Self::Roster { names } => {
                write!(f, "*** Online users: {} ***", names.join(", "))
            }
            Self::Chat { time, name, text } => {
                write!(f, "[{}] {name}: {text}", time.format("%H:%M:%S"))
            }
            Self::Shutdown => f.write_str(SHUTDOWN_NOTICE),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientLine
// ---------------------------------------------------------------------------

/// A decoded line received from an admitted client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// The client asked to leave.
    Exit,
    /// Nothing but whitespace. Ignored.
    Empty,
    /// Anything else: chat text to relay.
    Text(String),
}

impl ClientLine {
    /// Classifies one line of text. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            EXIT_COMMAND => Self::Exit,
            text => Self::Text(text.to_owned()),
        }
    }
}

impl From<String> for ClientLine {
    fn from(line: String) -> Self {
        Self::parse(&line)
    }
}
