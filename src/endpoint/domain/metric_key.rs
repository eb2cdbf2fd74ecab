//! Structured metric keys used to name reported metrics.

use super::{ObjectName, ObjectNameError};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Attributes identifying one reported metric.
///
/// A metric reporter registers each metric under the JSON encoding of its
/// key; [`MetricKey::object_name`] turns that encoding into the identifier
/// used in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    /// Metric name.
    pub name: String,
    /// Metric kind, such as `counter` or `histogram`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Component that owns the metric.
    pub class: String,
    /// Operation being measured.
    pub method: String,
}

impl MetricKey {
    /// Creates a metric key.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        class: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            class: class.into(),
            method: method.into(),
        }
    }

    /// Returns the JSON encoding, attributes in `name, type, class, method`
    /// order.
    #[must_use]
    pub fn encode(&self) -> String {
        json!({
            "name": self.name,
            "type": self.kind,
            "class": self.class,
            "method": self.method,
        })
        .to_string()
    }

    /// Returns the object store identifier for this key in `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectNameError`] when an attribute other than `name`
    /// contains characters reserved in object names.
    pub fn object_name(&self, domain: &str) -> Result<ObjectName, ObjectNameError> {
        ObjectName::from_metric_key(domain, &self.encode())
    }
}
