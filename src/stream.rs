//! Stream event marker envelope.
//!
//! A small, stable text envelope interleaved with plain content chunks on
//! the streaming path, distinguishable from ordinary tokens and reversible
//! via [`parse`]. Grounded in the teacher's general preference for explicit
//! tagged variants over sentinel strings (`cloudllm::agent`'s `AgentEvent`,
//! `cloudllm::tool_protocol`'s `ToolError`) even though the wire format
//! itself — marker strings inside a text stream — is new surface this spec
//! requires that the teacher's typed-event system does not.

use std::fmt;

const PREFIX: &str = "\u{1}ARC_REACTOR_EVENT\u{1}";

/// A meta-event interleaved with streamed text chunks.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventMarker {
    ToolStart { name: String },
    ToolEnd { name: String },
    Error { message: String },
}

impl StreamEventMarker {
    /// Encodes this marker into its wire-level string form.
    pub fn encode(&self) -> String {
        match self {
            StreamEventMarker::ToolStart { name } => {
                format!("{PREFIX}tool_start\u{2}{name}")
            }
            StreamEventMarker::ToolEnd { name } => {
                format!("{PREFIX}tool_end\u{2}{name}")
            }
            StreamEventMarker::Error { message } => {
                format!("{PREFIX}error\u{2}{message}")
            }
        }
    }
}

impl fmt::Display for StreamEventMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Parses a chunk of stream text back into a marker, or `None` if it is
/// plain content. Total over every string: any text not carrying the marker
/// prefix is plain content.
pub fn parse(text: &str) -> Option<StreamEventMarker> {
    let rest = text.strip_prefix(PREFIX)?;
    let (event, payload) = rest.split_once('\u{2}')?;
    match event {
        "tool_start" => Some(StreamEventMarker::ToolStart { name: payload.to_string() }),
        "tool_end" => Some(StreamEventMarker::ToolEnd { name: payload.to_string() }),
        "error" => Some(StreamEventMarker::Error { message: payload.to_string() }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tool_start() {
        let marker = StreamEventMarker::ToolStart { name: "weather".into() };
        assert_eq!(parse(&marker.encode()), Some(marker));
    }

    #[test]
    fn round_trips_tool_end() {
        let marker = StreamEventMarker::ToolEnd { name: "weather".into() };
        assert_eq!(parse(&marker.encode()), Some(marker));
    }

    #[test]
    fn round_trips_error() {
        let marker = StreamEventMarker::Error { message: "boom".into() };
        assert_eq!(parse(&marker.encode()), Some(marker));
    }

    #[test]
    fn plain_content_does_not_parse() {
        assert_eq!(parse("Hello there"), None);
        assert_eq!(parse(""), None);
    }
}
