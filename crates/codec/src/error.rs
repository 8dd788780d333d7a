//! Error types for the codec crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding a payload.
///
/// Three kinds mark a payload that can never be handled no matter how often
/// it is redelivered; see [`CodecError::is_poison`].
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("cannot parse invalid wire-format data: {0}")]
    WireFormat(#[source] protobuf::Error),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("JSON error: {0}")]
    Json(#[source] serde_json::Error),

    #[error("protobuf JSON mapping error: {0}")]
    ProtoJson(String),

    #[error("protobuf encoding error: {0}")]
    Encode(#[source] protobuf::Error),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl CodecError {
    /// Whether the error marks a poison message.
    ///
    /// Poison messages are skipped and committed by the claim processor
    /// instead of being retried.
    pub fn is_poison(&self) -> bool {
        matches!(
            self,
            CodecError::InvalidMessage(_) | CodecError::WireFormat(_) | CodecError::UnknownField(_)
        )
    }

    /// Searches an error chain for a poison error.
    ///
    /// Besides [`CodecError`], raw parser errors that a handler propagated
    /// with `?` count too: any `protobuf::Error` is a wire-format failure and
    /// a `serde_json` data error naming an unknown field is an unknown field.
    pub fn chain_is_poison(err: &(dyn std::error::Error + 'static)) -> bool {
        let mut current = Some(err);
        while let Some(err) = current {
            if err.downcast_ref::<CodecError>().is_some_and(CodecError::is_poison)
                || err.downcast_ref::<protobuf::Error>().is_some()
                || err.downcast_ref::<serde_json::Error>().is_some_and(is_unknown_field)
            {
                return true;
            }
            current = err.source();
        }
        false
    }
}

// Third-party parsers only expose unknown-field failures through their
// messages, so the mapping into a structured kind happens here and nowhere
// else.
fn mentions_unknown_field(message: &str) -> bool {
    message.to_ascii_lowercase().contains("unknown field")
}

fn is_unknown_field(err: &serde_json::Error) -> bool {
    err.is_data() && mentions_unknown_field(&err.to_string())
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        if is_unknown_field(&err) {
            CodecError::UnknownField(err.to_string())
        } else {
            CodecError::Json(err)
        }
    }
}

impl From<protobuf_json_mapping::ParseError> for CodecError {
    fn from(err: protobuf_json_mapping::ParseError) -> Self {
        let message = err.to_string();
        if mentions_unknown_field(&message) {
            CodecError::UnknownField(message)
        } else {
            CodecError::ProtoJson(message)
        }
    }
}

impl From<protobuf_json_mapping::PrintError> for CodecError {
    fn from(err: protobuf_json_mapping::PrintError) -> Self {
        CodecError::ProtoJson(err.to_string())
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
