// Copyright 2025 Cowboy AI, LLC.

//! Configuration validation against connector type schemas
//!
//! Every connector type carries a JSON Schema for its configuration object.
//! The review step and the details page run the same check on every edit:
//! parse the text, then validate the value against the type's schema.
//! Compiled validators are cached per connector type id since a session
//! validates against the same few schemas over and over.

use crate::errors::ConsoleError;
use lru::LruCache;
use serde_json::Value;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Compiled validators kept per connector type
pub const DEFAULT_VALIDATOR_CACHE: usize = 32;

/// One schema violation, addressed by instance path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer into the configuration, `/` for the root
    pub path: String,
    /// Violation message
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors from configuration validation
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// The configuration text is not JSON
    #[error("configuration is not valid JSON: {0}")]
    Parse(String),

    /// The connector type's schema itself does not compile
    #[error("schema for connector type {type_id} does not compile: {message}")]
    SchemaCompile {
        /// Connector type the schema belongs to
        type_id: String,
        /// Compiler message
        message: String,
    },

    /// The configuration violates the schema
    #[error("configuration failed schema validation with {} violation(s)", violations.len())]
    Invalid {
        /// All violations, in schema evaluation order
        violations: Vec<Violation>,
    },
}

impl From<ValidationError> for ConsoleError {
    fn from(err: ValidationError) -> Self {
        ConsoleError::InvalidConfiguration(err.to_string())
    }
}

/// Result of checking one configuration text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationCheck {
    /// Parsed value, present whenever the text was JSON
    pub value: Option<Value>,
    /// Violations; empty means the configuration is valid
    pub violations: Vec<Violation>,
}

impl ConfigurationCheck {
    /// Whether the configuration parsed and validated cleanly
    pub fn is_valid(&self) -> bool {
        self.value.is_some() && self.violations.is_empty()
    }
}

/// Parse a configuration text into a JSON value
pub fn parse_configuration(text: &str) -> Result<Value, ValidationError> {
    serde_json::from_str(text).map_err(|err| ValidationError::Parse(err.to_string()))
}

/// A compiled schema for one connector type
#[derive(Debug)]
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    /// Compile the schema of a connector type
    pub fn compile(type_id: &str, schema: &Value) -> Result<Self, ValidationError> {
        let validator = jsonschema::options()
            .should_validate_formats(true)
            .build(schema)
            .map_err(|err| ValidationError::SchemaCompile {
                type_id: type_id.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self { validator })
    }

    /// Validate a configuration value, collecting every violation
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(value)
            .map(|err| {
                let path = err.instance_path.to_string();
                Violation {
                    path: if path.is_empty() { "/".to_string() } else { path },
                    message: err.to_string(),
                }
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Invalid { violations })
        }
    }

    /// Parse and validate a configuration text in one pass
    pub fn check_text(&self, text: &str) -> ConfigurationCheck {
        match parse_configuration(text) {
            Ok(value) => {
                let violations = match self.validate(&value) {
                    Ok(()) => Vec::new(),
                    Err(ValidationError::Invalid { violations }) => violations,
                    Err(other) => vec![Violation {
                        path: "/".to_string(),
                        message: other.to_string(),
                    }],
                };
                ConfigurationCheck {
                    value: Some(value),
                    violations,
                }
            }
            Err(err) => ConfigurationCheck {
                value: None,
                violations: vec![Violation {
                    path: "/".to_string(),
                    message: err.to_string(),
                }],
            },
        }
    }
}

/// Compiled validators, cached per connector type id
///
/// The type catalog is stable for a session, so the id is a sufficient key.
pub struct ValidatorCache {
    cache: Mutex<LruCache<String, Arc<SchemaValidator>>>,
}

impl Default for ValidatorCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_VALIDATOR_CACHE)
    }
}

impl ValidatorCache {
    /// Cache with an explicit capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get or compile the validator for a connector type
    pub fn validator_for(
        &self,
        type_id: &str,
        schema: &Value,
    ) -> Result<Arc<SchemaValidator>, ValidationError> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(validator) = cache.get(type_id) {
            return Ok(Arc::clone(validator));
        }

        let validator = Arc::new(SchemaValidator::compile(type_id, schema)?);
        cache.put(type_id.to_string(), Arc::clone(&validator));
        Ok(validator)
    }
}
