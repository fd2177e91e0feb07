//! Inventory worker: initialization parameters per instance.
//!
//! Runs on its own thread with its own registry, so it never contends with
//! the aggregator. Both registries are merged once both pipelines finished.

use std::time::Instant;

use tracing::{debug, warn};

use crate::collector::queries::PARAMETER_QUERY;
use crate::integration::{EntityRegistry, EntityType};
use crate::source::{QuerySource, RawRow};

/// Inventory field holding the parameter value.
pub const INVENTORY_VALUE_FIELD: &str = "value";

/// Counters for one inventory run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryStats {
    pub rows: usize,
    /// Parameters written as inventory items.
    pub items: usize,
    /// Rows with a `NULL` value.
    pub null_values: usize,
    /// Rows missing the instance or the parameter name.
    pub malformed: usize,
    /// The query failed; the registry holds what was read before.
    pub failed: bool,
}

/// Reads `gv$parameter` into a fresh registry of instance entities.
///
/// Each row becomes item `NAME` with field `value` on instance `INST_ID`.
/// A query failure is logged and the partial registry returned.
pub fn collect_inventory<S: QuerySource + ?Sized>(source: &S) -> (EntityRegistry, InventoryStats) {
    let started = Instant::now();
    let mut registry = EntityRegistry::new();
    let mut stats = InventoryStats::default();

    let result = source.for_each_row(PARAMETER_QUERY, &mut |row| {
        stats.rows += 1;
        apply_row(&mut registry, &mut stats, &row);
    });
    if let Err(e) = result {
        stats.failed = true;
        warn!(error = %e, items = stats.items, "inventory query failed");
    }

    debug!(
        entities = registry.len(),
        items = stats.items,
        null_values = stats.null_values,
        malformed = stats.malformed,
        duration_ms = started.elapsed().as_millis() as u64,
        "inventory collected"
    );
    (registry, stats)
}

fn apply_row(registry: &mut EntityRegistry, stats: &mut InventoryStats, row: &RawRow) {
    let instance = non_empty_text(row, "INST_ID");
    let name = non_empty_text(row, "NAME");
    let (Some(instance), Some(name)) = (instance, name) else {
        stats.malformed += 1;
        warn!(columns = row.len(), "skipping inventory row without instance or name");
        return;
    };

    let Some(value) = row.get("VALUE").and_then(|v| v.as_text()) else {
        stats.null_values += 1;
        return;
    };

    registry
        .get_or_create(&instance, EntityType::Instance)
        .inventory_mut()
        .set_item(&name, INVENTORY_VALUE_FIELD, value);
    stats.items += 1;
}

fn non_empty_text(row: &RawRow, column: &str) -> Option<String> {
    let text = row.get(column)?.as_text()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MockSource, QueryError};
    use serde_json::json;

    fn param(inst: i64, name: &str, value: Option<&str>) -> RawRow {
        RawRow::new()
            .with("INST_ID", inst)
            .with("NAME", name)
            .with("VALUE", value)
    }

    #[test]
    fn parameters_become_instance_inventory() {
        let source = MockSource::new().with_rows(
            "gv$parameter",
            vec![
                param(1, "processes", Some("300")),
                param(1, "db_block_size", Some("8192")),
                param(2, "processes", Some("150")),
            ],
        );

        let (registry, stats) = collect_inventory(&source);
        assert_eq!(stats.items, 3);
        assert!(!stats.failed);
        assert_eq!(registry.len(), 2);

        let first = registry.get("1", EntityType::Instance).unwrap();
        assert_eq!(first.inventory().len(), 2);
        assert_eq!(
            first.inventory().item("processes").unwrap().get("value"),
            Some(&json!("300"))
        );
        assert!(first.metric_sets().is_empty());

        let second = registry.get("2", EntityType::Instance).unwrap();
        assert_eq!(
            second.inventory().item("processes").unwrap().get("value"),
            Some(&json!("150"))
        );
    }

    #[test]
    fn null_values_and_malformed_rows_are_skipped() {
        let source = MockSource::new().with_rows(
            "gv$parameter",
            vec![
                param(1, "background_dump_dest", None),
                RawRow::new().with("INST_ID", 1).with("VALUE", "x"),
                RawRow::new()
                    .with("INST_ID", None::<i64>)
                    .with("NAME", "sga_target")
                    .with("VALUE", "0"),
                param(1, "open_cursors", Some("300")),
            ],
        );

        let (registry, stats) = collect_inventory(&source);
        assert_eq!(stats.rows, 4);
        assert_eq!(stats.null_values, 1);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.items, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn query_failure_keeps_partial_registry() {
        let source = MockSource::new().with_scan_failure(
            "gv$parameter",
            vec![param(1, "processes", Some("300"))],
            "ORA-03113: end-of-file on communication channel",
        );

        let (registry, stats) = collect_inventory(&source);
        assert!(stats.failed);
        assert_eq!(stats.items, 1);
        assert_eq!(registry.len(), 1);

        let source = MockSource::new().with_failure(
            "gv$parameter",
            QueryError::Execute("ORA-00942: table or view does not exist".to_string()),
        );
        let (registry, stats) = collect_inventory(&source);
        assert!(stats.failed);
        assert!(registry.is_empty());
    }
}
