//! Classification of JSON body decode failures.
//!
//! Turns a `serde_json` error (plus the body it failed on) into one of a
//! closed set of causes with stable, client-facing wording.

use serde_json::error::Category;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("body contains badly-formed JSON (at character {offset})")]
    Syntax { offset: usize },

    #[error("body contains badly-formed JSON")]
    UnexpectedEof,

    #[error("body contains incorrect JSON type for field {field:?}")]
    TypeField { field: String },

    #[error("body contains incorrect JSON type (at character {offset})")]
    Type { offset: usize },

    #[error("body must not be empty")]
    Empty,

    #[error("body contains unknown key {0:?}")]
    UnknownField(String),

    #[error("body must not be larger than {limit} bytes")]
    TooLarge { limit: usize },

    #[error("body must only contain a single JSON value")]
    MultipleValues,

    /// Anything not covered above. Reported as an internal error.
    #[error("{0}")]
    Other(String),
}

impl DecodeError {
    /// Whether this failure is the client's fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DecodeError::Other(_))
    }
}

/// Classify a failure from decoding the first value in `body`.
pub fn classify(body: &[u8], err: &serde_json::Error) -> DecodeError {
    if body.iter().all(u8::is_ascii_whitespace) {
        return DecodeError::Empty;
    }

    let offset = byte_offset(body, err.line(), err.column());
    match err.classify() {
        Category::Eof => DecodeError::UnexpectedEof,
        Category::Syntax => DecodeError::Syntax { offset },
        Category::Data => {
            let message = err.to_string();
            if let Some(field) = unknown_field(&message) {
                return DecodeError::UnknownField(field);
            }
            match last_key_before(&body[..offset.min(body.len())]) {
                Some(field) => DecodeError::TypeField { field },
                None => DecodeError::Type { offset },
            }
        }
        Category::Io => DecodeError::Other(err.to_string()),
    }
}

/// Convert serde_json's 1-based line/column into a byte offset.
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    if line <= 1 {
        return column;
    }
    let mut seen = 1;
    for (i, b) in body.iter().enumerate() {
        if *b == b'\n' {
            seen += 1;
            if seen == line {
                return i + 1 + column;
            }
        }
    }
    body.len()
}

/// Pull `x` out of serde's "unknown field `x`, expected ..." message.
fn unknown_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

/// The most recent object key in `prefix`, skipping over string contents.
fn last_key_before(prefix: &[u8]) -> Option<String> {
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    let mut last_string: Option<&[u8]> = None;
    let mut last_key: Option<&[u8]> = None;

    for (i, &b) in prefix.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                last_string = Some(&prefix[start..i]);
            }
            continue;
        }
        match b {
            b'"' => {
                in_string = true;
                start = i + 1;
            }
            b':' => last_key = last_string,
            _ => {}
        }
    }

    last_key.map(|k| String::from_utf8_lossy(k).into_owned())
}
