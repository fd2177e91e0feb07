//! Metric sets and inventory attached to an entity.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::metric::{MetricValue, Observation};

/// Attribute holding the sample type of a metric set.
pub const EVENT_TYPE_ATTRIBUTE: &str = "event_type";
/// Attribute holding the human-readable entity name.
pub const DISPLAY_NAME_ATTRIBUTE: &str = "displayName";
/// Attribute holding the `<type>:<id>` entity name.
pub const ENTITY_NAME_ATTRIBUTE: &str = "entityName";

/// Result of a metric write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    /// The field already held a value; the new one replaced it.
    Replaced,
}

/// Named metric fields of one entity for one run.
///
/// Serialized as a flat JSON object with byte-wise sorted keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricSet {
    fields: BTreeMap<String, Value>,
}

impl MetricSet {
    /// Creates a metric set carrying the sample type and entity naming attributes.
    pub fn new(event_type: &str, display_name: &str, entity_name: &str) -> Self {
        let mut set = Self::default();
        set.set_attribute(EVENT_TYPE_ATTRIBUTE, event_type);
        set.set_attribute(DISPLAY_NAME_ATTRIBUTE, display_name);
        set.set_attribute(ENTITY_NAME_ATTRIBUTE, entity_name);
        set
    }

    /// Writes an observation. Last write wins; overwrites are logged.
    pub fn set_metric(&mut self, observation: &Observation) -> WriteOutcome {
        let value = match observation.value() {
            MetricValue::Numeric(v) => json_number(*v),
            MetricValue::Text(s) => Value::String(s.clone()),
        };
        let outcome = self.insert(observation.name(), value);
        if outcome == WriteOutcome::Replaced {
            warn!(
                metric = observation.name(),
                event_type = self.event_type().unwrap_or_default(),
                entity = self.entity_name().unwrap_or_default(),
                "metric written twice in one run, keeping the last value"
            );
        }
        outcome
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) -> WriteOutcome {
        self.insert(name, Value::String(value.to_string()))
    }

    fn insert(&mut self, name: &str, value: Value) -> WriteOutcome {
        match self.fields.insert(name.to_string(), value) {
            Some(_) => WriteOutcome::Replaced,
            None => WriteOutcome::Inserted,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.get(EVENT_TYPE_ATTRIBUTE).and_then(Value::as_str)
    }

    pub fn entity_name(&self) -> Option<&str> {
        self.get(ENTITY_NAME_ATTRIBUTE).and_then(Value::as_str)
    }

    /// Number of fields, naming attributes included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Writes integral values as JSON integers (`123`, not `123.0`).
fn json_number(v: f64) -> Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if v.fract() == 0.0 && v.abs() <= MAX_EXACT {
        Value::from(v as i64)
    } else {
        // Observation construction rejects NaN and infinities.
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

/// Inventory items of an entity: item key → field → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    items: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Inventory {
    pub fn set_item(&mut self, key: &str, field: &str, value: impl Into<Value>) {
        self.items
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
    }

    pub fn item(&self, key: &str) -> Option<&BTreeMap<String, Value>> {
        self.items.get(key)
    }

    /// Folds `other` into `self`; fields from `other` win.
    pub fn merge(&mut self, other: Inventory) {
        for (key, fields) in other.items {
            self.items.entry(key).or_default().extend(fields);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
