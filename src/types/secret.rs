//! Workspace-scoped secrets

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named secret resolved for a stub
///
/// The value is redacted from `Debug` output so stub configs can be logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub value: String,
}

impl Secret {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// A secret referenced by name in a registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRequest {
    pub name: String,
}

impl SecretRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_value() {
        let secret = Secret::new("API_KEY", "hunter2");
        let rendered = format!("{:?}", secret);
        assert!(rendered.contains("API_KEY"));
        assert!(!rendered.contains("hunter2"));
    }
}
