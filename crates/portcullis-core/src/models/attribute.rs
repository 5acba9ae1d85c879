//! Open-ended principal attributes.
//!
//! Tenants define their own user properties, so values are a tagged
//! union rather than a static type. At the evaluator boundary the map is
//! rendered as canonical JSON: keys sorted, no insignificant whitespace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type AttributeMap = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for AttributeValue {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

/// Render an attribute map as canonical JSON.
pub fn canonical_json(attributes: &AttributeMap) -> Result<String, serde_json::Error> {
    serde_json::to_string(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys_and_nests() {
        let mut inner = BTreeMap::new();
        inner.insert("z".to_owned(), AttributeValue::from(1_i64));
        inner.insert("a".to_owned(), AttributeValue::Null);

        let mut attrs = AttributeMap::new();
        attrs.insert("region".into(), "eu".into());
        attrs.insert("active".into(), true.into());
        attrs.insert("limits".into(), AttributeValue::Map(inner));
        attrs.insert(
            "tags".into(),
            AttributeValue::List(vec!["x".into(), 2.5_f64.into()]),
        );

        assert_eq!(
            canonical_json(&attrs).unwrap(),
            r#"{"active":true,"limits":{"a":null,"z":1},"region":"eu","tags":["x",2.5]}"#
        );
    }

    #[test]
    fn deserializes_arbitrary_json() {
        let attrs: AttributeMap =
            serde_json::from_str(r#"{"level": 3, "teams": ["a", "b"], "manager": null}"#).unwrap();
        assert_eq!(attrs["level"], AttributeValue::from(3_i64));
        assert_eq!(
            attrs["teams"],
            AttributeValue::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(attrs["manager"], AttributeValue::Null);
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert_eq!(AttributeValue::from(f64::NAN), AttributeValue::Null);
    }
}
