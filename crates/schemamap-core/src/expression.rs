//! Field calculation expressions.
//!
//! Values assigned to schema fields are written the way GIS field
//! calculators take them: a quoted literal (`'NatureScot'`), a reference to
//! another field of the same record (`!SurveyKey!`), a bare number, or
//! `None` for null.
//!
//! # Examples
//!
//! ```
//! use schemamap_core::expression::FieldExpression;
//!
//! let literal: FieldExpression = "'NatureScot'".parse().unwrap();
//! assert_eq!(literal, FieldExpression::Literal("NatureScot".to_string()));
//!
//! let alias: FieldExpression = "!SurveyKey!".parse().unwrap();
//! assert_eq!(alias.referenced_field(), Some("SurveyKey"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ExpressionError, Result, SchemaMapError};

/// A value to assign to every record of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldExpression {
    /// Literal value, unquoted.
    Literal(String),
    /// The value of another field on the same record.
    Field(String),
    /// Null.
    Null,
}

impl FieldExpression {
    /// Literal expression.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        FieldExpression::Literal(value.into())
    }

    /// Field reference expression.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        FieldExpression::Field(name.into())
    }

    /// Name of the referenced field, if this is a field reference.
    #[must_use]
    pub fn referenced_field(&self) -> Option<&str> {
        match self {
            FieldExpression::Field(name) => Some(name),
            _ => None,
        }
    }

    /// Parses expression text.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::Invalid`] for empty text, unbalanced quotes,
    /// an empty field reference, or anything that is neither quoted, a field
    /// reference, a number nor `None`.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let invalid = |reason: &str| -> SchemaMapError {
            ExpressionError::Invalid {
                expression: text.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        if trimmed.is_empty() {
            return Err(invalid("expression is empty"));
        }
        if trimmed == "None" {
            return Ok(FieldExpression::Null);
        }

        let first = trimmed.chars().next().unwrap_or_default();
        match first {
            '\'' | '"' => {
                let inner = trimmed
                    .strip_prefix(first)
                    .and_then(|rest| rest.strip_suffix(first))
                    .ok_or_else(|| invalid("unterminated quoted literal"))?;
                if inner.contains(first) {
                    return Err(invalid("quote character inside literal"));
                }
                Ok(FieldExpression::Literal(inner.to_string()))
            },
            '!' => {
                let name = trimmed
                    .strip_prefix('!')
                    .and_then(|rest| rest.strip_suffix('!'))
                    .ok_or_else(|| invalid("field reference must be written as !Name!"))?;
                if name.is_empty() || name.contains('!') || name.trim() != name {
                    return Err(invalid("field reference must name a single field"));
                }
                Ok(FieldExpression::Field(name.to_string()))
            },
            // f64 parsing also accepts "inf" and "NaN"; only digit-led text counts here
            '0'..='9' | '-' | '+' | '.' if trimmed.parse::<f64>().is_ok() => {
                Ok(FieldExpression::Literal(trimmed.to_string()))
            },
            _ => Err(invalid(
                "expected a quoted literal, a !Field! reference, a number or None",
            )),
        }
    }
}

impl FromStr for FieldExpression {
    type Err = SchemaMapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldExpression::Literal(value) if value.contains('\'') => write!(f, "\"{value}\""),
            FieldExpression::Literal(value) => write!(f, "'{value}'"),
            FieldExpression::Field(name) => write!(f, "!{name}!"),
            FieldExpression::Null => f.write_str("None"),
        }
    }
}

impl Serialize for FieldExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        FieldExpression::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quoted_literal() {
        assert_eq!(
            FieldExpression::parse("'Marine Habitat Classification for Britain and Ireland v04.05'")
                .unwrap(),
            FieldExpression::literal("Marine Habitat Classification for Britain and Ireland v04.05")
        );
    }

    #[test]
    fn test_double_quoted_literal_may_hold_apostrophe() {
        let expr = FieldExpression::parse("\"St Kilda's reef\"").unwrap();
        assert_eq!(expr, FieldExpression::literal("St Kilda's reef"));
        assert_eq!(expr.to_string(), "\"St Kilda's reef\"");
    }

    #[test]
    fn test_symbol_literals() {
        assert_eq!(FieldExpression::parse("'>'").unwrap(), FieldExpression::literal(">"));
        assert_eq!(FieldExpression::parse("''").unwrap(), FieldExpression::literal(""));
    }

    #[test]
    fn test_field_reference() {
        let expr = FieldExpression::parse(" !SurveyKey! ").unwrap();
        assert_eq!(expr, FieldExpression::field("SurveyKey"));
        assert_eq!(expr.to_string(), "!SurveyKey!");
    }

    #[test]
    fn test_numbers_and_none() {
        assert_eq!(FieldExpression::parse("42").unwrap(), FieldExpression::literal("42"));
        assert_eq!(FieldExpression::parse("-1.5").unwrap(), FieldExpression::literal("-1.5"));
        assert_eq!(FieldExpression::parse("None").unwrap(), FieldExpression::Null);
    }

    #[test]
    fn test_rejects_malformed() {
        for text in ["", "   ", "'open", "NatureScot", "!!", "!Survey", "!a!b!", "'it's'"] {
            let err = FieldExpression::parse(text).unwrap_err();
            assert!(
                matches!(err, SchemaMapError::Expression(_)),
                "expected expression error for {text:?}"
            );
        }
    }

    #[test]
    fn test_serde_uses_text_form() {
        let expr: FieldExpression = serde_json::from_str(r#""!SurveyKey!""#).unwrap();
        assert_eq!(expr, FieldExpression::field("SurveyKey"));
        assert_eq!(serde_json::to_string(&FieldExpression::literal("XXX")).unwrap(), r#""'XXX'""#);
        assert!(serde_json::from_str::<FieldExpression>(r#""bare""#).is_err());
    }
}
