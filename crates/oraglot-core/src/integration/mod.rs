//! Output document consumed by the monitoring platform.
//!
//! ```json
//! {"name":"com.newrelic.oracledb","protocol_version":"2","integration_version":"0.1.0",
//!  "data":[{"entity":{"name":"1","type":"instance"},
//!           "metrics":[{"displayName":"1","entityName":"instance:1","event_type":"OracleDatabaseSample"}],
//!           "inventory":{},"events":[]}]}
//! ```
//!
//! Field names and ordering are a compatibility contract with the consumer.

mod entity;
mod metric_set;

use std::io::Write;

use serde::Serialize;

pub use entity::{Entity, EntityKey, EntityRegistry, EntityType};
pub use metric_set::{
    DISPLAY_NAME_ATTRIBUTE, ENTITY_NAME_ATTRIBUTE, EVENT_TYPE_ATTRIBUTE, Inventory, MetricSet,
    WriteOutcome,
};

/// Name the document is published under.
pub const INTEGRATION_NAME: &str = "com.newrelic.oracledb";

/// Document protocol understood by the consumer.
pub const PROTOCOL_VERSION: &str = "2";

/// The output document: metadata plus the ordered entity list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Integration {
    name: String,
    protocol_version: String,
    integration_version: String,
    #[serde(rename = "data")]
    entities: EntityRegistry,
}

impl Integration {
    pub fn new(name: impl Into<String>, integration_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            integration_version: integration_version.into(),
            entities: EntityRegistry::new(),
        }
    }

    /// Merges a worker's registry into the document.
    pub fn merge(&mut self, registry: EntityRegistry) {
        self.entities.merge(registry);
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Writes the document followed by a newline.
    pub fn publish<W: Write>(&self, mut writer: W, pretty: bool) -> std::io::Result<()> {
        let json = self.to_json(pretty)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}
