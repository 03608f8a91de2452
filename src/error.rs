//! Error types for transcript conversion

use std::fmt;

/// Errors that can occur while turning a clipboard payload into Markdown
///
/// Every step of the pipeline is total over string input, so the only
/// failures are "nothing to work with" and "nothing usable produced".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The payload handed to the byte-level entry point was empty or blank
    EmptyInput,
    /// Conversion finished but the Markdown document is blank
    EmptyResult,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::EmptyInput => write!(f, "No HTML or text payload to convert"),
            ConversionError::EmptyResult => {
                write!(f, "Conversion produced no usable Markdown content")
            }
        }
    }
}

impl std::error::Error for ConversionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages_are_distinct() {
        let input = ConversionError::EmptyInput.to_string();
        let result = ConversionError::EmptyResult.to_string();
        assert_ne!(input, result);
        assert!(result.contains("no usable Markdown"));
    }
}
