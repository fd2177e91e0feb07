//! Monitored entities and the registry that keeps them unique.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::metric_set::{Inventory, MetricSet};

/// Kind of monitored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Instance,
    Tablespace,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Instance => "instance",
            EntityType::Tablespace => "tablespace",
        }
    }

    /// Sample type of the entity's metric set.
    pub fn event_type(&self) -> &'static str {
        match self {
            EntityType::Instance => "OracleDatabaseSample",
            EntityType::Tablespace => "OracleTablespaceSample",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an entity: `(name, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityKey {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl EntityKey {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
        }
    }

    /// `"<type>:<name>"`, as written into the `entityName` attribute.
    pub fn entity_name(&self) -> String {
        format!("{}:{}", self.entity_type, self.name)
    }
}

/// A monitored object with its metric sets, inventory and events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    #[serde(rename = "entity")]
    key: EntityKey,
    metrics: Vec<MetricSet>,
    inventory: Inventory,
    /// Always empty; the array is part of the document format.
    events: Vec<Value>,
}

impl Entity {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            metrics: Vec::new(),
            inventory: Inventory::default(),
            events: Vec::new(),
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Returns the entity's sample, creating it on first use.
    ///
    /// A new sample carries `event_type` for the entity type, `displayName`
    /// set to the entity ID and `entityName` set to `"<type>:<ID>"`.
    pub fn metric_set_mut(&mut self) -> &mut MetricSet {
        if self.metrics.is_empty() {
            self.metrics.push(MetricSet::new(
                self.key.entity_type.event_type(),
                &self.key.name,
                &self.key.entity_name(),
            ));
        }
        let last = self.metrics.len() - 1;
        &mut self.metrics[last]
    }

    pub fn metric_sets(&self) -> &[MetricSet] {
        &self.metrics
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn events(&self) -> &[Value] {
        &self.events
    }

    /// Folds another entity with the same key into this one.
    fn absorb(&mut self, other: Entity) {
        debug_assert_eq!(self.key, other.key);
        self.metrics.extend(other.metrics);
        self.inventory.merge(other.inventory);
        self.events.extend(other.events);
    }
}

/// Ordered, de-duplicated collection of entities.
///
/// Owned by exactly one worker while it is being filled; registries of
/// different workers are combined with [`EntityRegistry::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    index: HashMap<EntityKey, usize>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entity for `(name, entity_type)`, creating it on first reference.
    pub fn get_or_create(&mut self, name: &str, entity_type: EntityType) -> &mut Entity {
        let key = EntityKey::new(name, entity_type);
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.entities.len();
                self.index.insert(key.clone(), idx);
                self.entities.push(Entity::new(key));
                idx
            }
        };
        &mut self.entities[idx]
    }

    pub fn get(&self, name: &str, entity_type: EntityType) -> Option<&Entity> {
        self.index
            .get(&EntityKey::new(name, entity_type))
            .map(|&idx| &self.entities[idx])
    }

    /// Appends entities of `other` in order; entities already present absorb
    /// their counterpart.
    pub fn merge(&mut self, other: EntityRegistry) {
        for entity in other.entities {
            match self.index.get(&entity.key) {
                Some(&idx) => self.entities[idx].absorb(entity),
                None => {
                    self.index.insert(entity.key.clone(), self.entities.len());
                    self.entities.push(entity);
                }
            }
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of entities of the given type.
    pub fn count(&self, entity_type: EntityType) -> usize {
        self.entities
            .iter()
            .filter(|e| e.key.entity_type == entity_type)
            .count()
    }
}

impl Serialize for EntityRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Observation;

    #[test]
    fn get_or_create_returns_same_entity() {
        let mut registry = EntityRegistry::new();
        registry
            .get_or_create("1", EntityType::Instance)
            .metric_set_mut()
            .set_metric(&Observation::gauge("disk.reads", 1.0).unwrap());
        registry
            .get_or_create("1", EntityType::Instance)
            .metric_set_mut()
            .set_metric(&Observation::gauge("disk.writes", 2.0).unwrap());

        assert_eq!(registry.len(), 1);
        let entity = registry.get("1", EntityType::Instance).unwrap();
        assert_eq!(entity.metric_sets().len(), 1);
        assert_eq!(entity.metric_sets()[0].len(), 5);
    }

    #[test]
    fn same_id_different_type_are_distinct() {
        let mut registry = EntityRegistry::new();
        registry.get_or_create("1", EntityType::Instance);
        registry.get_or_create("1", EntityType::Tablespace);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.count(EntityType::Instance), 1);
        assert_eq!(registry.count(EntityType::Tablespace), 1);
    }

    #[test]
    fn metric_set_naming_follows_entity_key() {
        let mut registry = EntityRegistry::new();
        let set = registry
            .get_or_create("USERS", EntityType::Tablespace)
            .metric_set_mut();
        assert_eq!(set.event_type(), Some("OracleTablespaceSample"));
        assert_eq!(set.entity_name(), Some("tablespace:USERS"));
        assert_eq!(
            set.get("displayName").and_then(|v| v.as_str()),
            Some("USERS")
        );
    }

    #[test]
    fn merge_folds_matching_entities_and_keeps_order() {
        let mut metrics = EntityRegistry::new();
        metrics
            .get_or_create("1", EntityType::Instance)
            .metric_set_mut()
            .set_metric(&Observation::gauge("disk.reads", 1.0).unwrap());
        metrics.get_or_create("USERS", EntityType::Tablespace);

        let mut inventory = EntityRegistry::new();
        inventory
            .get_or_create("2", EntityType::Instance)
            .inventory_mut()
            .set_item("db_name", "value", "ORCL");
        inventory
            .get_or_create("1", EntityType::Instance)
            .inventory_mut()
            .set_item("db_name", "value", "ORCL");

        metrics.merge(inventory);

        let names: Vec<String> = metrics
            .entities()
            .iter()
            .map(|e| e.key().entity_name())
            .collect();
        assert_eq!(names, vec!["instance:1", "tablespace:USERS", "instance:2"]);

        let first = metrics.get("1", EntityType::Instance).unwrap();
        assert_eq!(first.metric_sets().len(), 1);
        assert!(first.inventory().item("db_name").is_some());
    }

    #[test]
    fn entity_serializes_in_document_shape() {
        let mut registry = EntityRegistry::new();
        registry.get_or_create("1", EntityType::Instance);
        assert!(registry.entities()[0].events().is_empty());
        assert_eq!(
            serde_json::to_string(&registry).unwrap(),
            r#"[{"entity":{"name":"1","type":"instance"},"metrics":[],"inventory":{},"events":[]}]"#
        );
    }
}
