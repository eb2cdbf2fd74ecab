//! Identifiers of objects registered in the management object store.

use super::ObjectNameError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Placeholder used when a metric key carries no `name` attribute.
const MISSING_NAME: &str = "ERROR_NAME_NOT_SET";

const NAME_KEY: &str = "name";
const RESERVED_KEY_CHARACTERS: &str = ":,=*?\n\r";
const RESERVED_VALUE_CHARACTERS: &str = ":,=\"*?\n\r";
const ESCAPED_NAME_CHARACTERS: &str = ",=:\"*?!&<>\\\n\r ";

/// Name of a managed object: `domain:key=value[,key=value]*`.
///
/// Property order is preserved as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
}

impl ObjectName {
    /// Creates an object name from a domain and ordered key properties.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectNameError::Malformed`] when the domain, a key or a
    /// value contains reserved characters, a key repeats, or no property is
    /// given.
    pub fn new<K, V>(
        domain: impl Into<String>,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ObjectNameError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let candidate = Self {
            domain: domain.into(),
            properties: properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        };
        candidate.check()?;
        Ok(candidate)
    }

    /// Parses the canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectNameError::Malformed`] when the input is not a
    /// well-formed object name.
    pub fn parse(input: &str) -> Result<Self, ObjectNameError> {
        let (domain, raw_properties) = input
            .split_once(':')
            .ok_or_else(|| ObjectNameError::malformed(input, "missing ':' after domain"))?;

        let properties = raw_properties
            .split(',')
            .map(|pair| {
                pair.split_once('=').ok_or_else(|| {
                    ObjectNameError::malformed(input, format!("'{pair}' is not key=value"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(domain, properties)
    }

    /// Builds an object name from a metric key.
    ///
    /// The key is a JSON object whose values are all strings. Key order is
    /// preserved. The `name` value has reserved characters replaced by `_`;
    /// a missing `name` is appended as `ERROR_NAME_NOT_SET`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectNameError::InvalidMetricKey`] when the key is not a
    /// JSON object of strings, or [`ObjectNameError::Malformed`] when the
    /// resulting name is not well formed.
    pub fn from_metric_key(domain: &str, key: &str) -> Result<Self, ObjectNameError> {
        let invalid = |reason: String| ObjectNameError::InvalidMetricKey {
            key: key.to_owned(),
            reason,
        };

        let parsed: Value = serde_json::from_str(key).map_err(|err| invalid(err.to_string()))?;
        let Value::Object(attributes) = parsed else {
            return Err(invalid("expected a JSON object".to_owned()));
        };

        let mut properties = Vec::with_capacity(attributes.len() + 1);
        for (attribute, value) in attributes {
            let Value::String(text) = value else {
                return Err(invalid(format!("value of '{attribute}' is not a string")));
            };
            let rendered = if attribute == NAME_KEY {
                escape_name(&text)
            } else {
                text
            };
            properties.push((attribute, rendered));
        }

        if !properties.iter().any(|(attribute, _)| attribute == NAME_KEY) {
            properties.push((NAME_KEY.to_owned(), MISSING_NAME.to_owned()));
        }

        Self::new(domain, properties)
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the key properties in order.
    #[must_use]
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Returns the value of one key property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    fn check(&self) -> Result<(), ObjectNameError> {
        let rendered = self.to_string();
        if self.domain.is_empty() || contains_any(&self.domain, RESERVED_KEY_CHARACTERS) {
            return Err(ObjectNameError::malformed(&rendered, "invalid domain"));
        }
        if self.properties.is_empty() {
            return Err(ObjectNameError::malformed(
                &rendered,
                "at least one key property is required",
            ));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.properties.len());
        for (key, value) in &self.properties {
            if key.is_empty() || contains_any(key, RESERVED_KEY_CHARACTERS) {
                return Err(ObjectNameError::malformed(
                    &rendered,
                    format!("invalid key '{key}'"),
                ));
            }
            if contains_any(value, RESERVED_VALUE_CHARACTERS) {
                return Err(ObjectNameError::malformed(
                    &rendered,
                    format!("invalid value for key '{key}'"),
                ));
            }
            if seen.contains(&key.as_str()) {
                return Err(ObjectNameError::malformed(
                    &rendered,
                    format!("duplicate key '{key}'"),
                ));
            }
            seen.push(key.as_str());
        }
        Ok(())
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.domain)?;
        for (index, (key, value)) in self.properties.iter().enumerate() {
            if index > 0 {
                formatter.write_str(",")?;
            }
            write!(formatter, "{key}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = ObjectNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectName> for String {
    fn from(value: ObjectName) -> Self {
        value.to_string()
    }
}

fn contains_any(value: &str, reserved: &str) -> bool {
    value.chars().any(|character| reserved.contains(character))
}

fn escape_name(value: &str) -> String {
    value
        .chars()
        .map(|character| {
            if ESCAPED_NAME_CHARACTERS.contains(character) {
                '_'
            } else {
                character
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn renders_properties_in_order() {
        let name = ObjectName::new("com.example", [("type", "counter"), ("name", "hits")])
            .expect("valid name");

        assert_eq!(name.to_string(), "com.example:type=counter,name=hits");
        assert_eq!(name.property("name"), Some("hits"));
    }

    #[test]
    fn parse_round_trips() {
        let input = "com.example:name=recordMetrics,type=histogram";

        let name = ObjectName::parse(input).expect("valid name");

        assert_eq!(name.domain(), "com.example");
        assert_eq!(name.to_string(), input);
    }

    #[rstest]
    #[case("no-colon")]
    #[case(":name=x")]
    #[case("domain:")]
    #[case("domain:name")]
    #[case("domain:name=a,name=b")]
    #[case("dom*ain:name=a")]
    #[case("domain:na?me=a")]
    #[case("domain:name=a\"b")]
    fn malformed_names_are_rejected(#[case] input: &str) {
        assert!(matches!(
            ObjectName::parse(input),
            Err(ObjectNameError::Malformed { .. })
        ));
    }

    #[test]
    fn metric_key_preserves_attribute_order() {
        let key = r#"{"name":"recordMetrics","type":"counter","class":"MetricsTest","method":"recordMetrics"}"#;

        let name = ObjectName::from_metric_key("com.github", key).expect("valid key");

        assert_eq!(
            name.to_string(),
            "com.github:name=recordMetrics,type=counter,class=MetricsTest,method=recordMetrics"
        );
    }

    #[test]
    fn metric_key_name_is_escaped() {
        let key = r#"{"type":"timer","name":"GET /a, b=c?"}"#;

        let name = ObjectName::from_metric_key("app", key).expect("valid key");

        assert_eq!(name.property("name"), Some("GET_/a__b_c_"));
    }

    #[test]
    fn metric_key_without_name_gets_placeholder() {
        let name =
            ObjectName::from_metric_key("app", r#"{"type":"gauge"}"#).expect("valid key");

        assert_eq!(name.to_string(), "app:type=gauge,name=ERROR_NAME_NOT_SET");
    }

    #[rstest]
    #[case("not json")]
    #[case("[\"name\"]")]
    #[case(r#"{"name": 3}"#)]
    fn invalid_metric_keys_are_rejected(#[case] key: &str) {
        assert!(matches!(
            ObjectName::from_metric_key("app", key),
            Err(ObjectNameError::InvalidMetricKey { .. })
        ));
    }

    #[test]
    fn unescaped_attribute_with_reserved_character_is_rejected() {
        let result = ObjectName::from_metric_key("app", r#"{"name":"ok","class":"a,b"}"#);

        assert!(matches!(result, Err(ObjectNameError::Malformed { .. })));
    }
}
