//! Job payload accepted by every reconciliation task.

use serde::{Deserialize, Serialize};

/// Errors raised while decoding or validating a [`Payload`].
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("no payload specified")]
    NoPayload,

    #[error("no query specified")]
    NoQuery,

    #[error("no component name specified")]
    NoComponentName,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_yaml::Error),
}

/// Payload of a reconciliation job.
///
/// Decoded from YAML or JSON (JSON is a subset of YAML).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// SQL query returning the orphan resources.
    #[serde(default)]
    pub query: String,

    /// Name of the component the findings are associated with.
    #[serde(default)]
    pub component_name: String,

    /// Version of the component. May be empty.
    #[serde(default)]
    pub component_version: String,
}

impl Payload {
    /// Creates a payload from its parts.
    pub fn new(
        query: impl Into<String>,
        component_name: impl Into<String>,
        component_version: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            component_name: component_name.into(),
            component_version: component_version.into(),
        }
    }

    /// Decodes and validates a raw payload.
    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(PayloadError::NoPayload);
        }

        let payload: Payload = serde_yaml::from_slice(data)?;
        payload.validate()?;
        Ok(payload)
    }

    /// Checks that the query and component name are set.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.query.trim().is_empty() {
            return Err(PayloadError::NoQuery);
        }
        if self.component_name.trim().is_empty() {
            return Err(PayloadError::NoComponentName);
        }
        Ok(())
    }
}
