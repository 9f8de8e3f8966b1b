// Copyright 2025 Cowboy AI, LLC.

//! Error types for console operations

use thiserror::Error;

/// Errors that can occur while driving the console machines
#[derive(Debug, Clone, Error)]
pub enum ConsoleError {
    /// A page fetch against the management API failed
    #[error("Fetch failed for page {page}: {message}")]
    FetchFailed {
        /// Page the failed request was issued for
        page: u64,
        /// Human-readable message from the API boundary
        message: String,
    },

    /// A connector mutation (start/stop/delete) was rejected
    #[error("Mutation failed for connector {connector_id}: {reason}")]
    MutationFailed {
        /// Connector the mutation targeted
        connector_id: String,
        /// Structured reason reported by the API
        reason: String,
    },

    /// Service account creation failed during basic configuration
    #[error("Service account creation failed: {reason}")]
    ServiceAccountFailed {
        /// Structured reason reported by the API
        reason: String,
    },

    /// The dynamic configurator module could not be loaded
    #[error("Configurator load failed for connector type {type_id}: {message}")]
    ConfiguratorLoadFailed {
        /// Connector type the loader was keyed by
        type_id: String,
        /// Loader failure message
        message: String,
    },

    /// The final save/commit of a connector definition was rejected
    #[error("Save failed: {reason}")]
    SaveFailed {
        /// Structured reason reported by the API
        reason: String,
    },

    /// A configuration value failed parsing or schema validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid state transition
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Attempted target state
        to: String,
    },

    /// A guarded event was rejected because its guard did not hold
    #[error("Guard rejected {event}: {reason}")]
    GuardRejected {
        /// Event that was refused
        event: String,
        /// Which precondition was missing
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A machine mailbox or notification channel is gone
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Serialization(err.to_string())
    }
}

impl ConsoleError {
    /// Check whether retrying the originating operation can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConsoleError::FetchFailed { .. }
                | ConsoleError::MutationFailed { .. }
                | ConsoleError::ServiceAccountFailed { .. }
                | ConsoleError::ConfiguratorLoadFailed { .. }
                | ConsoleError::SaveFailed { .. }
        )
    }

    /// Check if this is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ConsoleError::InvalidConfiguration(_) | ConsoleError::Serialization(_)
        )
    }

    /// Check if this is a rejected transition or guard
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self,
            ConsoleError::InvalidTransition { .. } | ConsoleError::GuardRejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test error display messages
    ///
    /// ```mermaid
    /// graph TD
    ///     A[ConsoleError] -->|Display| B[Error Message]
    ///     A -->|Clone| C[Cloned Error]
    /// ```
    #[test]
    fn test_error_display_messages() {
        let err = ConsoleError::FetchFailed {
            page: 3,
            message: "gateway timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Fetch failed for page 3: gateway timeout");

        let err = ConsoleError::MutationFailed {
            connector_id: "c1".to_string(),
            reason: "quota exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Mutation failed for connector c1: quota exceeded"
        );

        let err = ConsoleError::ServiceAccountFailed {
            reason: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "Service account creation failed: forbidden");

        let err = ConsoleError::ConfiguratorLoadFailed {
            type_id: "slack_sink_0.1".to_string(),
            message: "module not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configurator load failed for connector type slack_sink_0.1: module not found"
        );

        let err = ConsoleError::SaveFailed {
            reason: "name already in use".to_string(),
        };
        assert_eq!(err.to_string(), "Save failed: name already in use");

        let err = ConsoleError::InvalidConfiguration("missing field `channel`".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: missing field `channel`"
        );

        let err = ConsoleError::InvalidTransition {
            from: "deleted".to_string(),
            to: "startingConnector".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition from deleted to startingConnector"
        );

        let err = ConsoleError::GuardRejected {
            event: "jumpToSelectKafka".to_string(),
            reason: "no connector type selected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Guard rejected jumpToSelectKafka: no connector type selected"
        );

        let err = ConsoleError::ChannelClosed("wizard".to_string());
        assert_eq!(err.to_string(), "Channel closed: wizard");

        let err = ConsoleError::Internal("poisoned lock".to_string());
        assert_eq!(err.to_string(), "Internal error: poisoned lock");
    }

    /// Test is_retryable helper
    #[test]
    fn test_is_retryable() {
        assert!(ConsoleError::FetchFailed {
            page: 1,
            message: "x".to_string(),
        }
        .is_retryable());
        assert!(ConsoleError::MutationFailed {
            connector_id: "c1".to_string(),
            reason: "x".to_string(),
        }
        .is_retryable());
        assert!(ConsoleError::SaveFailed {
            reason: "x".to_string(),
        }
        .is_retryable());
        assert!(ConsoleError::ConfiguratorLoadFailed {
            type_id: "t".to_string(),
            message: "x".to_string(),
        }
        .is_retryable());

        assert!(!ConsoleError::InvalidConfiguration("x".to_string()).is_retryable());
        assert!(!ConsoleError::ChannelClosed("x".to_string()).is_retryable());
    }

    /// Test is_validation_error helper
    #[test]
    fn test_is_validation_error() {
        assert!(ConsoleError::InvalidConfiguration("x".to_string()).is_validation_error());
        assert!(ConsoleError::Serialization("x".to_string()).is_validation_error());

        assert!(!ConsoleError::SaveFailed {
            reason: "x".to_string(),
        }
        .is_validation_error());
        assert!(!ConsoleError::Internal("x".to_string()).is_validation_error());
    }

    /// Test is_transition_error helper
    #[test]
    fn test_is_transition_error() {
        assert!(ConsoleError::InvalidTransition {
            from: "a".to_string(),
            to: "b".to_string(),
        }
        .is_transition_error());
        assert!(ConsoleError::GuardRejected {
            event: "e".to_string(),
            reason: "r".to_string(),
        }
        .is_transition_error());

        assert!(!ConsoleError::Internal("x".to_string()).is_transition_error());
    }

    /// Test serde_json error conversion
    #[test]
    fn test_serde_json_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{ not json }").unwrap_err();
        let err: ConsoleError = serde_err.into();

        match err {
            ConsoleError::Serialization(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Serialization, got {other:?}"),
        }
    }

    /// Test all error variants can be cloned
    #[test]
    fn test_all_errors_clone() {
        let errors: Vec<ConsoleError> = vec![
            ConsoleError::FetchFailed {
                page: 1,
                message: "m".to_string(),
            },
            ConsoleError::MutationFailed {
                connector_id: "c".to_string(),
                reason: "r".to_string(),
            },
            ConsoleError::ServiceAccountFailed {
                reason: "r".to_string(),
            },
            ConsoleError::ConfiguratorLoadFailed {
                type_id: "t".to_string(),
                message: "m".to_string(),
            },
            ConsoleError::SaveFailed {
                reason: "r".to_string(),
            },
            ConsoleError::InvalidConfiguration("c".to_string()),
            ConsoleError::InvalidTransition {
                from: "a".to_string(),
                to: "b".to_string(),
            },
            ConsoleError::GuardRejected {
                event: "e".to_string(),
                reason: "r".to_string(),
            },
            ConsoleError::Serialization("s".to_string()),
            ConsoleError::ChannelClosed("ch".to_string()),
            ConsoleError::Internal("i".to_string()),
        ];

        for error in errors {
            let cloned = error.clone();
            assert_eq!(error.to_string(), cloned.to_string());
        }
    }
}
