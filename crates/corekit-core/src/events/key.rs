//! Event key and phase definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The phase part of an event key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The bare event (`run`, `media.upload`).
    Main,
    /// Sequential stage before the main phase of a hook.
    Pre,
    /// Sequential stage after the main phase of a hook.
    Post,
    /// A hook finished all of its phases.
    Complete,
    /// A module finished registration.
    Registered,
    /// Every in-flight registration settled.
    Resolved,
    /// A batch of modules or commands was mounted.
    Ready,
    /// A command produced a response.
    Done,
    /// A command failed.
    Error,
}

impl Phase {
    /// Returns the suffix used in the string form, `None` for [`Phase::Main`].
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Main => None,
            Self::Pre => Some("pre"),
            Self::Post => Some("post"),
            Self::Complete => Some("complete"),
            Self::Registered => Some("registered"),
            Self::Resolved => Some("resolved"),
            Self::Ready => Some("ready"),
            Self::Done => Some("done"),
            Self::Error => Some("error"),
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "pre" => Some(Self::Pre),
            "post" => Some(Self::Post),
            "complete" => Some(Self::Complete),
            "registered" => Some(Self::Registered),
            "resolved" => Some(Self::Resolved),
            "ready" => Some(Self::Ready),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Address of an event on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// What the event is about (module name, hook name, command type).
    pub subject: String,
    /// Which phase of the subject fired.
    pub phase: Phase,
}

impl EventKey {
    /// Creates a key from its parts. A [`Phase::Main`] subject is parsed,
    /// so `new("media.ready", Main)` and `parse("media.ready")` are the
    /// same key.
    pub fn new(subject: impl Into<String>, phase: Phase) -> Self {
        let subject = subject.into();
        match phase {
            Phase::Main => Self::parse(&subject),
            phase => Self { subject, phase },
        }
    }

    /// The bare event for `subject`.
    pub fn main(subject: impl Into<String>) -> Self {
        Self::new(subject, Phase::Main)
    }

    /// `<name>.registered`
    pub fn registered(name: impl Into<String>) -> Self {
        Self::new(name, Phase::Registered)
    }

    /// `<type>.done`
    pub fn done(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Phase::Done)
    }

    /// `<type>.error`
    pub fn error(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Phase::Error)
    }

    /// `modules.resolved`
    pub fn modules_resolved() -> Self {
        Self::new("modules", Phase::Resolved)
    }

    /// `modules.ready`
    pub fn modules_ready() -> Self {
        Self::new("modules", Phase::Ready)
    }

    /// `commands.ready`
    pub fn commands_ready() -> Self {
        Self::new("commands", Phase::Ready)
    }

    /// `coreplugins.ready`
    pub fn coreplugins_ready() -> Self {
        Self::new("coreplugins", Phase::Ready)
    }

    /// `closing`
    pub fn closing() -> Self {
        Self::main("closing")
    }

    /// Parses the string form. A trailing segment that is not a known
    /// phase is part of the subject.
    pub fn parse(raw: &str) -> Self {
        if let Some((subject, suffix)) = raw.rsplit_once('.') {
            if let Some(phase) = Phase::from_suffix(suffix) {
                if !subject.is_empty() {
                    return Self {
                        subject: subject.to_string(),
                        phase,
                    };
                }
            }
        }
        Self {
            subject: raw.to_string(),
            phase: Phase::Main,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase.suffix() {
            Some(suffix) => write!(f, "{}.{}", self.subject, suffix),
            None => write!(f, "{}", self.subject),
        }
    }
}

impl FromStr for EventKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for EventKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
