//! # Channel Naming
//!
//! Literal channel protocol shared by both sides of the bridge:
//!
//! | Purpose        | Channel                   |
//! |----------------|---------------------------|
//! | request        | `eventName:request:token` |
//! | worker pattern | `eventName:request:*`     |
//! | success reply  | `eventName:success:token` |
//! | failure reply  | `eventName:failed:token`  |

use crate::publisher::TransportError;
use glob::Pattern;
use std::fmt;

/// Segment separator inside channel names.
pub const SEPARATOR: char = ':';

/// Pattern wildcard.
pub const WILDCARD: char = '*';

/// Characters with a glob meaning inside subscription patterns.
pub const GLOB_META: [char; 4] = ['*', '?', '[', ']'];

/// Which leg of a request/reply exchange a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Sender → worker.
    Request,
    /// Worker → sender, handler succeeded.
    Success,
    /// Worker → sender, handler failed.
    Failed,
}

impl ChannelKind {
    /// Protocol segment for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Request => "request",
            ChannelKind::Success => "success",
            ChannelKind::Failed => "failed",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "request" => Some(ChannelKind::Request),
            "success" => Some(ChannelKind::Success),
            "failed" => Some(ChannelKind::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `eventName:request:token`
pub fn request_channel(event_name: &str, token: impl fmt::Display) -> String {
    format!("{event_name}{SEPARATOR}request{SEPARATOR}{token}")
}

/// `eventName:request:*`
pub fn request_pattern(event_name: &str) -> String {
    format!("{event_name}{SEPARATOR}request{SEPARATOR}{WILDCARD}")
}

/// `eventName:success:token`
pub fn success_channel(event_name: &str, token: impl fmt::Display) -> String {
    format!("{event_name}{SEPARATOR}success{SEPARATOR}{token}")
}

/// `eventName:failed:token`
pub fn failure_channel(event_name: &str, token: impl fmt::Display) -> String {
    format!("{event_name}{SEPARATOR}failed{SEPARATOR}{token}")
}

/// Reject event names that would make channel parsing ambiguous.
///
/// Separators and glob metacharacters are reserved, so one event's request
/// pattern can never match another event's channels.
pub fn validate_event_name(event_name: &str) -> Result<(), TransportError> {
    if event_name.is_empty() {
        return Err(TransportError::InvalidChannel("event name is empty".into()));
    }
    if let Some(reserved) = event_name
        .chars()
        .find(|c| *c == SEPARATOR || GLOB_META.contains(c) || c.is_whitespace())
    {
        return Err(TransportError::InvalidChannel(format!(
            "event name '{event_name}' contains reserved character {reserved:?}"
        )));
    }
    Ok(())
}

/// A concrete channel split into its protocol segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelName<'a> {
    pub event_name: &'a str,
    pub kind: ChannelKind,
    pub token: &'a str,
}

impl<'a> ChannelName<'a> {
    /// Parse `eventName:kind:token`. Returns `None` for anything off-protocol.
    pub fn parse(channel: &'a str) -> Option<Self> {
        let mut parts = channel.rsplitn(3, SEPARATOR);
        let token = parts.next()?;
        let kind = ChannelKind::from_segment(parts.next()?)?;
        let event_name = parts.next()?;

        if token.is_empty() || event_name.is_empty() {
            return None;
        }

        Some(Self {
            event_name,
            kind,
            token,
        })
    }
}

/// Subscription target with Redis `PSUBSCRIBE` style globbing: `*` matches
/// any run of characters, `?` one character, `[...]` a character class. A
/// pattern without metacharacters matches exactly one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelPattern {
    raw: String,
    glob: Pattern,
}

impl ChannelPattern {
    pub fn new(pattern: &str) -> Result<Self, TransportError> {
        if pattern.is_empty() {
            return Err(TransportError::InvalidChannel(
                "subscription pattern is empty".into(),
            ));
        }
        let glob = Pattern::new(pattern).map_err(|e| {
            TransportError::InvalidChannel(format!("invalid pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            glob,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_exact(&self) -> bool {
        !self.raw.contains(GLOB_META)
    }

    pub fn matches(&self, channel: &str) -> bool {
        if self.is_exact() {
            return self.raw == channel;
        }
        self.glob.matches(channel)
    }
}

impl fmt::Display for ChannelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
