//! Configuration for signing runs.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Default upper bound for the encoded signature container, in bytes.
pub const DEFAULT_MAX_SIGNATURE_SIZE: usize = 8192;

/// Signing configuration.
///
/// Everything here has a default; a run only needs a
/// [`SignatureRequest`](crate::signatures::SignatureRequest) on top.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Bytes reserved for the DER signature container.
    pub max_signature_size: usize,

    /// Directory for the output file. `None` uses the system temp dir.
    pub output_dir: Option<PathBuf>,

    /// File name prefix of the output file.
    pub output_prefix: String,

    /// Fixed signing time. `None` uses the current time.
    pub signing_time: Option<DateTime<Utc>>,

    /// `/Reason` entry of the signature dictionary.
    pub reason: Option<String>,

    /// `/Location` entry of the signature dictionary.
    pub location: Option<String>,

    /// `/ContactInfo` entry of the signature dictionary.
    pub contact_info: Option<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_signature_size: DEFAULT_MAX_SIGNATURE_SIZE,
            output_dir: None,
            output_prefix: "signed-".to_string(),
            signing_time: None,
            reason: None,
            location: None,
            contact_info: None,
        }
    }

    /// Set the signature container budget.
    pub fn with_max_signature_size(mut self, size: usize) -> Self {
        self.max_signature_size = size;
        self
    }

    /// Create output files in `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the output file name prefix.
    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    /// Pin the signing time.
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Set the signing reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the signer contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }

    /// Signing time to stamp into the document.
    pub fn effective_signing_time(&self) -> DateTime<Utc> {
        self.signing_time.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = SignerConfig::default();
        assert_eq!(config.max_signature_size, 8192);
        assert_eq!(config.output_prefix, "signed-");
        assert!(config.output_dir.is_none());
        assert!(config.reason.is_none());
    }

    #[test]
    fn test_builder() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let config = SignerConfig::new()
            .with_max_signature_size(16384)
            .with_reason("Approved")
            .with_signing_time(time);
        assert_eq!(config.max_signature_size, 16384);
        assert_eq!(config.reason.as_deref(), Some("Approved"));
        assert_eq!(config.effective_signing_time(), time);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SignerConfig =
            serde_json::from_str(r#"{"max_signature_size": 4096, "location": "Berlin"}"#).unwrap();
        assert_eq!(config.max_signature_size, 4096);
        assert_eq!(config.location.as_deref(), Some("Berlin"));
        assert_eq!(config.output_prefix, "signed-");
    }
}
