//! Wire vocabulary of the resumable-upload protocol spoken between the
//! client, the master coordinators and the data nodes.

pub mod file_utils;
pub mod headers;

use std::fmt;
use std::str::FromStr;

pub use headers::{parse_u64_header, HeaderError};

/// Content kind announced in the `Filetype` header of the init request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    Video,
    Model,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Video => "video",
            FileKind::Model => "model",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(FileKind::Video),
            "model" => Ok(FileKind::Model),
            other => Err(format!(
                "Invalid mode: {}. Must be 'video' or 'model'",
                other
            )),
        }
    }
}

/// Size headers sent with the init request
///
/// `parts` is only populated for model uploads, in manifest order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeHeaders {
    pub total: u64,
    pub parts: Vec<(&'static str, u64)>,
}

impl SizeHeaders {
    /// Sizes for a single video file
    pub fn video(size: u64) -> Self {
        Self {
            total: size,
            parts: Vec::new(),
        }
    }

    /// Sizes for a model bundle (model, config, code)
    pub fn model(model: u64, config: u64, code: u64) -> Self {
        Self {
            total: model + config + code,
            parts: vec![
                (headers::MODEL_SIZE, model),
                (headers::CONFIG_SIZE, config),
                (headers::CODE_SIZE, code),
            ],
        }
    }

    /// All `(header, value)` pairs, `Filesize` first
    pub fn to_header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(headers::FILESIZE, self.total.to_string())];
        pairs.extend(
            self.parts
                .iter()
                .map(|(name, size)| (*name, size.to_string())),
        );
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_round_trip_names() {
        assert_eq!("video".parse::<FileKind>(), Ok(FileKind::Video));
        assert_eq!("model".parse::<FileKind>(), Ok(FileKind::Model));
        assert!("audio".parse::<FileKind>().is_err());
        assert_eq!(FileKind::Model.to_string(), "model");
    }

    #[test]
    fn test_video_size_headers() {
        let sizes = SizeHeaders::video(1234);
        assert_eq!(
            sizes.to_header_pairs(),
            vec![("Filesize", "1234".to_string())]
        );
    }

    #[test]
    fn test_model_size_headers() {
        let sizes = SizeHeaders::model(100, 20, 3);
        assert_eq!(sizes.total, 123);
        assert_eq!(
            sizes.to_header_pairs(),
            vec![
                ("Filesize", "123".to_string()),
                ("Model-Size", "100".to_string()),
                ("Config-Size", "20".to_string()),
                ("Code-Size", "3".to_string()),
            ]
        );
    }
}
