//! Domain-specific error types for the NCP protocol.
//!
//! All fallible operations return `Result<T, NcpError>`. Decode/command
//! warnings are modeled as distinct, non-fatal types emitted through the
//! `tracing` layer rather than returned as `Err`.

use thiserror::Error;

/// The canonical error type for the NCP protocol.
#[derive(Debug, Error)]
pub enum NcpError {
    // ── Identifier errors ────────────────────────────────────────
    /// A caller-supplied name does not fit the 4-byte identifier format.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    // ── Value codec errors ───────────────────────────────────────
    /// A param's type tag did not match any known `ParamValue` variant.
    #[error("unknown param type tag: {0:#x}")]
    UnknownParamType(u8),

    // ── Packet codec errors ──────────────────────────────────────
    /// The packet did not begin with the expected magic header.
    #[error("invalid packet: bad magic header")]
    BadMagic,

    /// The packet did not end with the expected magic footer.
    #[error("invalid packet: bad magic footer")]
    BadFooter,

    /// A field or param declared a size that would read past its
    /// enclosing region.
    #[error("{region} overflow by {excess} bytes")]
    Overflow {
        /// Which enclosing region overflowed (`"field"` or `"param"`).
        region: &'static str,
        /// How many bytes past the boundary the declared size reaches.
        excess: usize,
    },

    /// The buffered bytes were too short to contain a complete header
    /// or declared frame.
    #[error("truncated packet: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum byte count required to proceed.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    // ── Connection / protocol errors ────────────────────────────
    /// A reply field carried `ERRO` and/or `ERRC` and auto-erro handling
    /// is enabled.
    #[error("command error on {packet_type}/{field_name}#{field_id}: {message:?} (code {code:?})")]
    CommandError {
        /// The packet type the offending field arrived on.
        packet_type: String,
        /// The name of the field that carried the error sentinel.
        field_name: String,
        /// The field id the error was attached to.
        field_id: u32,
        /// The `ERRO` message, if present.
        message: Option<String>,
        /// The `ERRC` numeric code, if present.
        code: Option<i32>,
    },

    /// The connection was closed while a caller was awaiting a reply,
    /// or a caller tried to operate on an already-closed connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// The handshake did not complete in the expected order.
    #[error("handshake failed: {0}")]
    HandshakeFailed(&'static str),

    /// The required `CIW` identity field was missing from the client's
    /// `CCRE` field during the server-side handshake.
    #[error("CIW - This field is required")]
    MissingClientIdentity,

    // ── Transport errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

/// A non-fatal decode-time advisory: the decoder encountered the known
/// embedded-footer corruption bug and recovered by skipping it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("encountered embedded packet footer bug at offset {offset}")]
pub struct DecodeWarning {
    /// Byte offset within the field region where the bogus footer was found.
    pub offset: usize,
}

/// A non-fatal reply-time advisory: a field carried `WARN` and/or `WARC`
/// and auto-warn handling is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command warning on {packet_type}/{field_name}#{field_id}: {message:?} (code {code:?})")]
pub struct CommandWarning {
    /// The packet type the warning arrived on.
    pub packet_type: String,
    /// The name of the field that carried the warning sentinel.
    pub field_name: String,
    /// The field id the warning was attached to.
    pub field_id: u32,
    /// The `WARN` message, if present.
    pub message: Option<String>,
    /// The `WARC` numeric code, if present.
    pub code: Option<i32>,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for NcpError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        NcpError::ChannelClosed
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for NcpError {
    fn from(_: tokio::sync::broadcast::error::RecvError) -> Self {
        NcpError::ConnectionClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = NcpError::BadMagic;
        assert!(e.to_string().contains("magic header"));

        let e = NcpError::Overflow {
            region: "param",
            excess: 4,
        };
        assert!(e.to_string().contains("param"));
        assert!(e.to_string().contains('4'));
    }

    #[test]
    fn command_error_display_contains_context() {
        let e = NcpError::CommandError {
            packet_type: "X".into(),
            field_name: "CMD1".into(),
            field_id: 7,
            message: Some("bad".into()),
            code: Some(400),
        };
        let msg = e.to_string();
        assert!(msg.contains("CMD1"));
        assert!(msg.contains("400"));
        assert!(msg.contains("bad"));
    }

    #[test]
    fn command_error_display_with_code_only() {
        let e = NcpError::CommandError {
            packet_type: "X".into(),
            field_name: "CMD1".into(),
            field_id: 7,
            message: None,
            code: Some(500),
        };
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: NcpError = io_err.into();
        assert!(matches!(e, NcpError::Io(_)));
    }

    #[test]
    fn decode_warning_display() {
        let w = DecodeWarning { offset: 12 };
        assert!(w.to_string().contains("12"));
    }
}
