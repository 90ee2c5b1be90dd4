//! Shared types, error model, and configuration for Bellgrid.
//!
//! This crate is the foundation depended on by all other Bellgrid crates.
//! It provides:
//! - [`BellgridError`]: the unified error type
//! - Domain types ([`ScheduleEntry`], [`ExtractionInput`], [`TextFragment`])
//! - Configuration ([`AppConfig`], [`ScheduleConventions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CalendarConfig, DEFAULT_WEEKDAYS, DefaultsConfig, LayoutConfig, LunchRule,
    ScheduleConventions, SourceConfig, config_dir, config_file_path, data_dir, db_path,
    download_dir, init_config, load_config, load_config_from, validate_config,
};
pub use error::{BellgridError, Result};
pub use types::{
    DocumentRecord, ExtractionInput, ExtractionMode, LunchBlock, ScheduleEntry, TextFragment,
};
