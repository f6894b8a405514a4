use std::path::Path;
use thiserror::Error;

/// Reasons a local file name cannot be announced in the `Filename` header
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameValidationError {
    #[error("Filename cannot be empty")]
    Empty,
    #[error("Filename is not valid UTF-8")]
    NotUnicode,
    #[error("Filename cannot contain path separators (/ or \\)")]
    ContainsPathSeparator,
    #[error("Filename cannot be '.' or '..'")]
    IsSpecialDirectory,
    #[error("Filename cannot contain control characters")]
    ContainsControlCharacters,
}

/// Validate a bare file name before it is placed in a request header.
/// Rejects:
/// - empty names and the special directories "." and ".."
/// - path separators (/, \)
/// - control characters, including NUL, CR and LF, which would corrupt the header
pub fn validate_filename(filename: &str) -> Result<(), FilenameValidationError> {
    if filename.is_empty() {
        return Err(FilenameValidationError::Empty);
    }

    if filename.chars().any(char::is_control) {
        return Err(FilenameValidationError::ContainsControlCharacters);
    }

    if filename.contains('/') || filename.contains('\\') {
        return Err(FilenameValidationError::ContainsPathSeparator);
    }

    if filename == "." || filename == ".." {
        return Err(FilenameValidationError::IsSpecialDirectory);
    }

    Ok(())
}

/// Base name of `path`, validated for use as the `Filename` header
pub fn header_file_name(path: &Path) -> Result<String, FilenameValidationError> {
    let name = path
        .file_name()
        .ok_or(FilenameValidationError::Empty)?
        .to_str()
        .ok_or(FilenameValidationError::NotUnicode)?;
    validate_filename(name)?;
    Ok(name.to_string())
}
