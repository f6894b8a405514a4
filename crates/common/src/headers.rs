use thiserror::Error;

/// Operation selector header
pub const REQUEST_TYPE: &str = "Request-Type";
/// `Request-Type` value opening a session
pub const REQUEST_TYPE_INIT: &str = "init";
/// `Request-Type` value appending a chunk
pub const REQUEST_TYPE_APPEND: &str = "APPEND";

pub const FILENAME: &str = "Filename";
pub const FILETYPE: &str = "Filetype";
pub const FILESIZE: &str = "Filesize";
pub const MODEL_SIZE: &str = "Model-Size";
pub const CONFIG_SIZE: &str = "Config-Size";
pub const CODE_SIZE: &str = "Code-Size";

/// Session identifier, returned by init and echoed on every append
pub const ID: &str = "ID";
/// Cumulative bytes acknowledged, sent by the client and returned on resync
pub const OFFSET: &str = "Offset";
/// Largest chunk the data node accepts
pub const MAX_REQUEST_SIZE: &str = "Max-Request-Size";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Header {name} is not valid UTF-8")]
    NotText { name: &'static str },
    #[error("Header {name} has invalid value {value:?}: expected a non-negative integer")]
    NotANumber { name: &'static str, value: String },
}

/// Parse a decimal header value, tolerating surrounding whitespace
pub fn parse_u64_header(name: &'static str, raw: &[u8]) -> Result<u64, HeaderError> {
    let text = std::str::from_utf8(raw).map_err(|_| HeaderError::NotText { name })?;
    text.trim()
        .parse::<u64>()
        .map_err(|_| HeaderError::NotANumber {
            name,
            value: text.to_string(),
        })
}
