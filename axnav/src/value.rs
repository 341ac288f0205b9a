//! Attribute values as reported by the provider.

use std::fmt;

/// Placeholder shown for values that have no sensible textual form.
pub const COMPLEX_VALUE: &str = "Complex Value";

/// Typed value of a single element attribute.
///
/// The set is closed on purpose: every consumer matches all cases, and values
/// the provider cannot express as text end up as [`AttributeValue::Opaque`]
/// instead of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    /// Anything else (points, ranges, element references). Carries the
    /// provider's type name for debugging only.
    Opaque(String),
    Absent,
}

impl AttributeValue {
    /// Normalized display string: `true`/`false` for booleans, canonical
    /// decimal for numbers, [`COMPLEX_VALUE`] for opaque values.
    pub fn display(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Number(n) => format_number(*n),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Opaque(_) => COMPLEX_VALUE.to_string(),
            AttributeValue::Absent => String::new(),
        }
    }

    /// Text content, if this is a non-empty string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, AttributeValue::Absent)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&serde_json::Value> for AttributeValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Absent,
            serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(AttributeValue::Number)
                .unwrap_or_else(|| AttributeValue::Opaque("number".to_string())),
            serde_json::Value::String(s) => AttributeValue::String(s.clone()),
            serde_json::Value::Array(_) => AttributeValue::Opaque("array".to_string()),
            serde_json::Value::Object(_) => AttributeValue::Opaque("object".to_string()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        // Integral values print without a trailing ".0".
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_normalization() {
        assert_eq!(AttributeValue::Bool(true).display(), "true");
        assert_eq!(AttributeValue::Bool(false).display(), "false");
        assert_eq!(AttributeValue::Number(3.0).display(), "3");
        assert_eq!(AttributeValue::Number(-12.0).display(), "-12");
        assert_eq!(AttributeValue::Number(0.25).display(), "0.25");
        assert_eq!(
            AttributeValue::Opaque("AXValueCGPoint".into()).display(),
            COMPLEX_VALUE
        );
        assert_eq!(AttributeValue::Absent.display(), "");
    }

    #[test]
    fn test_from_json() {
        assert_eq!(AttributeValue::from(&json!(null)), AttributeValue::Absent);
        assert_eq!(
            AttributeValue::from(&json!("Untitled")),
            AttributeValue::String("Untitled".into())
        );
        assert_eq!(AttributeValue::from(&json!(7)), AttributeValue::Number(7.0));
        assert_eq!(AttributeValue::from(&json!(true)), AttributeValue::Bool(true));
        assert!(matches!(
            AttributeValue::from(&json!({"x": 1, "y": 2})),
            AttributeValue::Opaque(_)
        ));
    }

    #[test]
    fn test_as_text_skips_empty() {
        assert_eq!(AttributeValue::String(String::new()).as_text(), None);
        assert_eq!(AttributeValue::String("OK".into()).as_text(), Some("OK"));
        assert_eq!(AttributeValue::Number(1.0).as_text(), None);
    }
}
