//! Shared data model, State Store, configuration, error taxonomy, logging
//! and checkpoint helpers for the FPPC advice letter corpus pipeline.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod schema;
pub mod store;

pub use config::{ApiKeyConfig, PipelineConfig};
pub use error::{CoreError, CoreResult};
pub use store::StateStore;
