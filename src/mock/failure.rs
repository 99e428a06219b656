//! Failure injection for mock handlers

use std::collections::HashMap;

use crate::error::HandlerError;

/// Failure configuration for a method
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Message carried by the injected error
    pub message: String,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Fail every call with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    pub fn to_error(&self) -> HandlerError {
        HandlerError::failed(self.message.clone())
    }
}

/// Per-method failure injector
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<String, FailureConfig>,
    call_counts: HashMap<String, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for a method
    pub fn inject(&mut self, method: impl Into<String>, config: FailureConfig) {
        let method = method.into();
        self.call_counts.insert(method.clone(), 0);
        self.configs.insert(method, config);
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Clear failure injection for one method
    pub fn clear_method(&mut self, method: &str) {
        self.configs.remove(method);
        self.call_counts.remove(method);
    }

    /// Returns the failure to raise for this call of `method`, if any.
    pub fn check(&mut self, method: &str) -> Option<&FailureConfig> {
        let config = self.configs.get(method)?;
        let count = self.call_counts.entry(method.to_string()).or_insert(0);
        *count += 1;

        match config.fail_count {
            Some(limit) if *count > limit => None,
            _ => Some(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failure_by_default() {
        let mut injector = FailureInjector::new();
        assert!(injector.check("log").is_none());
    }

    #[test]
    fn test_always_fails() {
        let mut injector = FailureInjector::new();
        injector.inject("save", FailureConfig::error("disk full"));

        for _ in 0..3 {
            let config = injector.check("save").unwrap();
            assert_eq!(config.to_error().to_string(), "disk full");
        }
        assert!(injector.check("load").is_none());
    }

    #[test]
    fn test_fail_count() {
        let mut injector = FailureInjector::new();
        injector.inject("save", FailureConfig::error("busy").with_fail_count(2));

        assert!(injector.check("save").is_some());
        assert!(injector.check("save").is_some());
        assert!(injector.check("save").is_none());
    }

    #[test]
    fn test_clear_method() {
        let mut injector = FailureInjector::new();
        injector.inject("save", FailureConfig::error("nope"));
        injector.clear_method("save");
        assert!(injector.check("save").is_none());
    }
}
