//! Declarative validation of business attributes.
//!
//! A [`ProfileSchema`] maps assertion attribute keys to target field names
//! with a requiredness flag and a primitive type. Validation is total: every
//! required field must be present and non-empty after trimming, or the login
//! is rejected before any remote call is made.
//!
//! Errors name the offending field and the asserting issuer. They never
//! carry attribute values.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::validator::RawProfile;

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Trimmed, non-empty string.
    String,
    /// `true`/`false`, as a JSON boolean or string.
    Boolean,
    /// A number, as a JSON number or numeric string.
    Number,
}

impl FieldType {
    const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
        }
    }
}

/// One attribute-to-field mapping.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Key in the raw profile (usually an attribute URN).
    pub attribute: String,
    /// Name in the validated profile.
    pub field: String,
    /// Whether absence rejects the profile.
    pub required: bool,
    /// Expected type.
    pub field_type: FieldType,
}

/// Business-schema validation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileValidationError {
    /// A required field is absent or blank.
    #[error("required field {field} ({attribute}) missing in assertion from {issuer}")]
    Missing {
        /// Target field name.
        field: String,
        /// Source attribute key.
        attribute: String,
        /// Asserting issuer.
        issuer: String,
    },

    /// A field is present but has the wrong type.
    #[error("field {field} ({attribute}) in assertion from {issuer} is not a {expected}")]
    InvalidType {
        /// Target field name.
        field: String,
        /// Source attribute key.
        attribute: String,
        /// Expected type name.
        expected: &'static str,
        /// Asserting issuer.
        issuer: String,
    },
}

impl ProfileValidationError {
    /// The offending field name.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field, .. } | Self::InvalidType { field, .. } => field,
        }
    }
}

/// A profile that passed schema validation, keyed by target field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedProfile {
    fields: Map<String, Value>,
}

impl ValidatedProfile {
    /// Returns a string field.
    #[must_use]
    pub fn str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Returns a boolean field.
    #[must_use]
    pub fn bool(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(Value::as_bool)
    }

    /// Returns a number field.
    #[must_use]
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    /// The validated fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Declarative attribute schema.
#[derive(Debug, Clone, Default)]
pub struct ProfileSchema {
    fields: Vec<FieldSpec>,
}

impl ProfileSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a required field.
    #[must_use]
    pub fn required(self, attribute: &str, field: &str, field_type: FieldType) -> Self {
        self.with(attribute, field, true, field_type)
    }

    /// Adds an optional field.
    #[must_use]
    pub fn optional(self, attribute: &str, field: &str, field_type: FieldType) -> Self {
        self.with(attribute, field, false, field_type)
    }

    fn with(mut self, attribute: &str, field: &str, required: bool, field_type: FieldType) -> Self {
        self.fields.push(FieldSpec {
            attribute: attribute.to_string(),
            field: field.to_string(),
            required,
            field_type,
        });
        self
    }

    /// The field specifications.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validates `raw` against the schema.
    ///
    /// Unknown keys are ignored. Multi-valued attributes contribute their
    /// first value. An optional field that is blank or absent is left out.
    ///
    /// # Errors
    ///
    /// Returns the first failing field in schema order.
    pub fn validate(
        &self,
        raw: &RawProfile,
        issuer: &str,
    ) -> Result<ValidatedProfile, ProfileValidationError> {
        let mut fields = Map::new();

        for spec in &self.fields {
            match coerce(raw.get(&spec.attribute), spec.field_type) {
                Coerced::Value(v) => {
                    fields.insert(spec.field.clone(), v);
                }
                Coerced::Absent if spec.required => {
                    tracing::debug!(field = %spec.field, issuer, "required profile field missing");
                    return Err(ProfileValidationError::Missing {
                        field: spec.field.clone(),
                        attribute: spec.attribute.clone(),
                        issuer: issuer.to_string(),
                    });
                }
                Coerced::Absent => {}
                Coerced::WrongType => {
                    return Err(ProfileValidationError::InvalidType {
                        field: spec.field.clone(),
                        attribute: spec.attribute.clone(),
                        expected: spec.field_type.name(),
                        issuer: issuer.to_string(),
                    });
                }
            }
        }

        Ok(ValidatedProfile { fields })
    }
}

enum Coerced {
    Value(Value),
    Absent,
    WrongType,
}

fn coerce(value: Option<&Value>, field_type: FieldType) -> Coerced {
    let value = match value {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };

    match (value, field_type) {
        (None | Some(Value::Null), _) => Coerced::Absent,
        (Some(Value::String(s)), _) if s.trim().is_empty() => Coerced::Absent,
        (Some(Value::String(s)), FieldType::String) => {
            Coerced::Value(Value::String(s.trim().to_string()))
        }
        (Some(Value::Number(n)), FieldType::String) => Coerced::Value(Value::String(n.to_string())),
        (Some(Value::Bool(b)), FieldType::Boolean) => Coerced::Value(Value::Bool(*b)),
        (Some(Value::String(s)), FieldType::Boolean) => {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" => Coerced::Value(Value::Bool(true)),
                "false" => Coerced::Value(Value::Bool(false)),
                _ => Coerced::WrongType,
            }
        }
        (Some(Value::Number(n)), FieldType::Number) => Coerced::Value(Value::Number(n.clone())),
        (Some(Value::String(s)), FieldType::Number) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or(Coerced::WrongType, |n| Coerced::Value(Value::Number(n))),
        _ => Coerced::WrongType,
    }
}
