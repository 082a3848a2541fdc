//! Approval policy configuration.

use std::time::Duration;

/// How long a pending approval may wait before it is denied.
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// Maximum time a request stays pending before auto-denial.
    pub max_wait: Duration,
}

impl ApprovalConfig {
    /// Create a config with the given maximum wait.
    pub fn new(max_wait: Duration) -> Self {
        Self { max_wait }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        assert_eq!(ApprovalConfig::default().max_wait, Duration::from_secs(60));
    }

    #[test]
    fn custom_config() {
        let config = ApprovalConfig::new(Duration::from_millis(250));
        assert_eq!(config.max_wait, Duration::from_millis(250));
    }
}
