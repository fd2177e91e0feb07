//! Typed metric observations and their routing metadata.
//!
//! An [`Observation`] is a single named value whose shape is checked against
//! its [`MetricType`] at construction. A [`RoutedObservation`] pairs it with
//! the metadata the aggregator uses to pick the target entity.

use std::collections::BTreeMap;

use crate::integration::EntityType;

/// Routing key for observations that belong to a database instance.
pub const INSTANCE_ROUTING_KEY: &str = "instanceID";

/// Routing key for observations that belong to a tablespace.
pub const TABLESPACE_ROUTING_KEY: &str = "tablespace";

/// How a metric is aggregated and displayed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
    Counter,
    Rate,
    Attribute,
}

impl MetricType {
    /// Returns true if values of this type must be numeric.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, MetricType::Attribute)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MetricType::Gauge => "GAUGE",
            MetricType::Counter => "COUNTER",
            MetricType::Rate => "RATE",
            MetricType::Attribute => "ATTRIBUTE",
        };
        f.write_str(s)
    }
}

/// Value carried by an observation.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Numeric(f64),
    Text(String),
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Numeric(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Numeric(v as f64)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Error returned when an observation's value does not fit its type.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationError {
    /// Numeric type given text, or ATTRIBUTE given a number.
    TypeMismatch { name: String, metric_type: MetricType },
    /// NaN or infinite numeric value.
    NonFinite { name: String },
    /// Empty metric name.
    EmptyName,
}

impl std::fmt::Display for ObservationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationError::TypeMismatch { name, metric_type } => {
                write!(f, "metric {}: value does not match type {}", name, metric_type)
            }
            ObservationError::NonFinite { name } => {
                write!(f, "metric {}: value is not a finite number", name)
            }
            ObservationError::EmptyName => write!(f, "metric name is empty"),
        }
    }
}

impl std::error::Error for ObservationError {}

/// A single typed metric value prior to routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    name: String,
    metric_type: MetricType,
    value: MetricValue,
}

impl Observation {
    /// Creates an observation, rejecting values that do not match `metric_type`.
    pub fn new(
        name: impl Into<String>,
        metric_type: MetricType,
        value: impl Into<MetricValue>,
    ) -> Result<Self, ObservationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ObservationError::EmptyName);
        }
        let value = value.into();
        match (&value, metric_type.is_numeric()) {
            (MetricValue::Numeric(v), true) => {
                if !v.is_finite() {
                    return Err(ObservationError::NonFinite { name });
                }
            }
            (MetricValue::Text(_), false) => {}
            _ => return Err(ObservationError::TypeMismatch { name, metric_type }),
        }
        Ok(Self {
            name,
            metric_type,
            value,
        })
    }

    /// Shorthand for a GAUGE observation.
    pub fn gauge(name: impl Into<String>, value: f64) -> Result<Self, ObservationError> {
        Self::new(name, MetricType::Gauge, value)
    }

    /// Shorthand for an ATTRIBUTE observation.
    pub fn attribute(
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ObservationError> {
        Self::new(name, MetricType::Attribute, MetricValue::Text(value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn value(&self) -> &MetricValue {
        &self.value
    }
}

/// Why an observation could not be routed to an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingError {
    /// No routing key present.
    Missing,
    /// More than one key present.
    Ambiguous(Vec<String>),
    /// A key the aggregator does not know.
    Unknown(String),
    /// Known key with an empty value.
    EmptyValue(String),
}

impl std::fmt::Display for RoutingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingError::Missing => write!(f, "no routing key in metadata"),
            RoutingError::Ambiguous(keys) => {
                write!(f, "ambiguous routing keys: {}", keys.join(", "))
            }
            RoutingError::Unknown(key) => write!(f, "unknown routing key: {}", key),
            RoutingError::EmptyValue(key) => write!(f, "routing key {} has empty value", key),
        }
    }
}

impl std::error::Error for RoutingError {}

/// An observation plus the metadata identifying its target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedObservation {
    pub observation: Observation,
    pub metadata: BTreeMap<String, String>,
}

impl RoutedObservation {
    pub fn new(observation: Observation, metadata: BTreeMap<String, String>) -> Self {
        Self {
            observation,
            metadata,
        }
    }

    /// Routes `observation` to the instance `instance_id`.
    pub fn for_instance(observation: Observation, instance_id: impl Into<String>) -> Self {
        Self::single(observation, INSTANCE_ROUTING_KEY, instance_id.into())
    }

    /// Routes `observation` to the tablespace `name`.
    pub fn for_tablespace(observation: Observation, name: impl Into<String>) -> Self {
        Self::single(observation, TABLESPACE_ROUTING_KEY, name.into())
    }

    fn single(observation: Observation, key: &str, value: String) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(key.to_string(), value);
        Self {
            observation,
            metadata,
        }
    }

    /// Resolves the single populated routing key into an entity type and ID.
    pub fn route(&self) -> Result<(EntityType, &str), RoutingError> {
        let mut entries = self.metadata.iter();
        let Some((key, value)) = entries.next() else {
            return Err(RoutingError::Missing);
        };
        if self.metadata.len() > 1 {
            return Err(RoutingError::Ambiguous(
                self.metadata.keys().cloned().collect(),
            ));
        }
        let entity_type = match key.as_str() {
            INSTANCE_ROUTING_KEY => EntityType::Instance,
            TABLESPACE_ROUTING_KEY => EntityType::Tablespace,
            other => return Err(RoutingError::Unknown(other.to_string())),
        };
        if value.is_empty() {
            return Err(RoutingError::EmptyValue(key.clone()));
        }
        Ok((entity_type, value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_requires_text() {
        let err = Observation::new("name", MetricType::Attribute, 1.0).unwrap_err();
        assert_eq!(
            err,
            ObservationError::TypeMismatch {
                name: "name".to_string(),
                metric_type: MetricType::Attribute
            }
        );
        assert!(Observation::attribute("name", "value").is_ok());
    }

    #[test]
    fn numeric_types_reject_text_and_non_finite() {
        for metric_type in [MetricType::Gauge, MetricType::Counter, MetricType::Rate] {
            assert!(Observation::new("m", metric_type, "text").is_err());
            assert!(Observation::new("m", metric_type, 1.5).is_ok());
        }
        assert_eq!(
            Observation::gauge("m", f64::NAN).unwrap_err(),
            ObservationError::NonFinite {
                name: "m".to_string()
            }
        );
        assert!(Observation::gauge("m", f64::INFINITY).is_err());
    }

    #[test]
    fn empty_name_rejected() {
        assert_eq!(
            Observation::gauge("", 1.0).unwrap_err(),
            ObservationError::EmptyName
        );
    }

    #[test]
    fn route_resolves_known_keys() {
        let obs = Observation::gauge("m", 1.0).unwrap();
        let routed = RoutedObservation::for_instance(obs.clone(), "1");
        assert_eq!(routed.route().unwrap(), (EntityType::Instance, "1"));

        let routed = RoutedObservation::for_tablespace(obs, "USERS");
        assert_eq!(routed.route().unwrap(), (EntityType::Tablespace, "USERS"));
    }

    #[test]
    fn route_rejects_missing_unknown_and_ambiguous_keys() {
        let obs = Observation::gauge("m", 1.0).unwrap();

        let missing = RoutedObservation::new(obs.clone(), BTreeMap::new());
        assert_eq!(missing.route().unwrap_err(), RoutingError::Missing);

        let mut metadata = BTreeMap::new();
        metadata.insert("host".to_string(), "db1".to_string());
        let unknown = RoutedObservation::new(obs.clone(), metadata);
        assert_eq!(
            unknown.route().unwrap_err(),
            RoutingError::Unknown("host".to_string())
        );

        let mut metadata = BTreeMap::new();
        metadata.insert(INSTANCE_ROUTING_KEY.to_string(), "1".to_string());
        metadata.insert(TABLESPACE_ROUTING_KEY.to_string(), "USERS".to_string());
        let ambiguous = RoutedObservation::new(obs.clone(), metadata);
        assert!(matches!(
            ambiguous.route().unwrap_err(),
            RoutingError::Ambiguous(keys) if keys.len() == 2
        ));

        let empty = RoutedObservation::for_instance(obs, "");
        assert_eq!(
            empty.route().unwrap_err(),
            RoutingError::EmptyValue(INSTANCE_ROUTING_KEY.to_string())
        );
    }
}
