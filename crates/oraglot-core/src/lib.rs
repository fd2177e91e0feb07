//! oraglot-core - Oracle database metrics and inventory collection.
//!
//! Provides:
//! - `source` - query source abstraction (Oracle sessions, scripted mock)
//! - `metric` - typed observations and routing metadata
//! - `collector` - row mapper, metric collectors, concurrent orchestration
//! - `aggregator` - single-writer consumer building the entity registry
//! - `inventory` - `gv$parameter` inventory worker
//! - `integration` - entities, metric sets and the output document
//! - `config` - connection parameters and collection options
//! - `agent` - one full collection run
//!
//! With `oracle` feature (default):
//! - `source::OracleSource` - session-pooled client on the `oracle` driver

pub mod agent;
pub mod aggregator;
pub mod collector;
pub mod config;
pub mod integration;
pub mod inventory;
pub mod metric;
pub mod source;
