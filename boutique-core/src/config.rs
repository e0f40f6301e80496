//! Dispatcher configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Toggles for dispatcher diagnostics
///
/// Every field has a default, so partial JSON is accepted:
///
/// ```
/// use boutique_core::DispatcherConfig;
///
/// let config = DispatcherConfig::from_json(r#"{ "warn_direct_handler_calls": false }"#).unwrap();
/// assert!(!config.warn_direct_handler_calls);
/// assert!(config.warn_missing_handlers);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Warn when a binding names a handler the store does not define
    pub warn_missing_handlers: bool,
    /// Warn when a bound handler is invoked directly instead of through its action
    pub warn_direct_handler_calls: bool,
    /// Emit `debug` events for each dispatch
    pub trace_dispatch: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            warn_missing_handlers: true,
            warn_direct_handler_calls: true,
            trace_dispatch: true,
        }
    }
}

impl DispatcherConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All warnings off
    pub fn quiet() -> Self {
        Self {
            warn_missing_handlers: false,
            warn_direct_handler_calls: false,
            trace_dispatch: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(
            DispatcherConfig::from_json("{}").unwrap(),
            DispatcherConfig::default()
        );
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = DispatcherConfig::from_json(r#"{ "trace_dispatch": "yes" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_round_trip_quiet() {
        let json = serde_json::to_string(&DispatcherConfig::quiet()).unwrap();
        assert_eq!(
            DispatcherConfig::from_json(&json).unwrap(),
            DispatcherConfig::quiet()
        );
    }
}
