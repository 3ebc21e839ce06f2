//! Normalizer configuration

use serde::{Deserialize, Serialize};

/// What to do with a row whose identifier or date cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorPolicy {
    /// Reject the whole batch on the first bad row
    #[default]
    FailBatch,
    /// Keep the row with null derived fields and report it
    NullAndContinue,
}

/// Normalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Handling of undecodable rows
    pub on_parse_error: ParseErrorPolicy,

    /// Fill missing tenor values with the batch median
    pub impute_missing_yields: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            on_parse_error: ParseErrorPolicy::FailBatch,
            impute_missing_yields: true,
        }
    }
}

impl NormalizerConfig {
    /// Fail on any bad row
    pub fn strict() -> Self {
        Self::default()
    }

    /// Null out bad rows and keep going
    pub fn lenient() -> Self {
        Self {
            on_parse_error: ParseErrorPolicy::NullAndContinue,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(NormalizerConfig::strict().on_parse_error, ParseErrorPolicy::FailBatch);
        assert_eq!(
            NormalizerConfig::lenient().on_parse_error,
            ParseErrorPolicy::NullAndContinue
        );
        assert!(NormalizerConfig::lenient().impute_missing_yields);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: NormalizerConfig =
            serde_json::from_str(r#"{"on_parse_error": "null_and_continue"}"#).unwrap();
        assert_eq!(config.on_parse_error, ParseErrorPolicy::NullAndContinue);
        assert!(config.impute_missing_yields);
    }
}
