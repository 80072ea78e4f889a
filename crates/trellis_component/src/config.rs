//! Tree configuration

use serde::{Deserialize, Serialize};
use trellis_core::{is_id_char, Error, Result};

/// Component tree configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Reserved naming separator joining client id segments and splitting
    /// search expressions
    pub separator: char,

    /// Maximum ancestor chain length before the tree is considered corrupt
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            separator: '/',
            max_depth: 1000,
        }
    }
}

impl TreeConfig {
    /// Configuration using the colon separator of classic markup client ids
    pub fn colon_separated() -> Self {
        Self {
            separator: ':',
            ..Default::default()
        }
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if is_id_char(self.separator) || self.separator.is_whitespace() {
            return Err(Error::InvalidArgument(format!(
                "separator {:?} collides with identifier syntax",
                self.separator
            )));
        }
        if self.max_depth == 0 {
            return Err(Error::InvalidArgument("max_depth must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TreeConfig::default().validate().is_ok());
        assert!(TreeConfig::colon_separated().validate().is_ok());
    }

    #[test]
    fn test_rejects_id_separator() {
        for separator in ['a', '7', '-', '_', ' '] {
            let config = TreeConfig {
                separator,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{separator:?} should be rejected");
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TreeConfig = serde_json::from_str(r#"{"separator":":"}"#).unwrap();
        assert_eq!(config.separator, ':');
        assert_eq!(config.max_depth, 1000);
    }
}
