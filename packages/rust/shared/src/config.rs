//! Application configuration for Bellgrid.
//!
//! User config lives at `~/.bellgrid/bellgrid.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BellgridError, Result};
use crate::types::{ExtractionMode, LunchBlock};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bellgrid.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bellgrid";

/// Database file name inside the data directory.
const DB_FILE_NAME: &str = "bellgrid.db";

/// Download directory name inside the data directory.
const DOWNLOAD_DIR_NAME: &str = "documents";

/// Weekday column headers, Monday first.
pub const DEFAULT_WEEKDAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

// ---------------------------------------------------------------------------
// Config structs (matching bellgrid.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Where schedule documents are published.
    #[serde(default)]
    pub source: SourceConfig,

    /// Academic calendar and clock conventions.
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Row geometry for layout-mode extraction.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// A/B lunch tie-break rules.
    #[serde(default = "default_lunch_rules")]
    pub lunch_rules: Vec<LunchRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            source: SourceConfig::default(),
            calendar: CalendarConfig::default(),
            layout: LayoutConfig::default(),
            lunch_rules: default_lunch_rules(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Extraction mode: stream, layout, or auto.
    #[serde(default)]
    pub mode: ExtractionMode,

    /// Directory holding the database and downloaded PDFs.
    /// Defaults to `~/.bellgrid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Auto,
            data_dir: None,
        }
    }
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Web page listing the weekly schedule PDFs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest PDF we are willing to download, in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_document_bytes() -> u64 {
    20 * 1024 * 1024
}

/// `[calendar]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Calendar year in which the academic year starts. July through
    /// December fall in this year, January through June in the next.
    #[serde(default = "default_academic_year_start")]
    pub academic_year_start: i32,

    /// Printed hours below this value are afternoon hours.
    #[serde(default = "default_pm_cutoff_hour")]
    pub pm_cutoff_hour: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            academic_year_start: default_academic_year_start(),
            pm_cutoff_hour: default_pm_cutoff_hour(),
        }
    }
}

fn default_academic_year_start() -> i32 {
    2025
}
fn default_pm_cutoff_hour() -> u32 {
    7
}

/// `[layout]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Vertical distance from a period label to its time row, in points.
    #[serde(default = "default_row_height")]
    pub row_height: f64,

    /// Allowed deviation from `row_height`, in points.
    #[serde(default = "default_row_tolerance")]
    pub row_tolerance: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_height: default_row_height(),
            row_tolerance: default_row_tolerance(),
        }
    }
}

fn default_row_height() -> f64 {
    12.0
}
fn default_row_tolerance() -> f64 {
    4.0
}

/// `[[lunch_rules]]` entry.
///
/// When a period is printed more than once for the same day, the rule picks
/// which printing wins: in the text stream, a later printing wins if it follows
/// `marker`; on the page, the printing at `layout_rank` (0 = topmost) wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunchRule {
    pub period: u8,
    pub marker: LunchBlock,
    #[serde(default)]
    pub layout_rank: usize,
}

fn default_lunch_rules() -> Vec<LunchRule> {
    vec![
        LunchRule {
            period: 3,
            marker: LunchBlock::B,
            layout_rank: 0,
        },
        LunchRule {
            period: 4,
            marker: LunchBlock::A,
            layout_rank: 1,
        },
    ]
}

// ---------------------------------------------------------------------------
// Schedule conventions (runtime, passed into the parser)
// ---------------------------------------------------------------------------

/// Immutable conventions the schedule parser needs. Built from [`AppConfig`]
/// so that different schools or years can coexist side by side.
#[derive(Debug, Clone)]
pub struct ScheduleConventions {
    /// See [`CalendarConfig::academic_year_start`].
    pub academic_year_start: i32,
    /// See [`CalendarConfig::pm_cutoff_hour`].
    pub pm_cutoff_hour: u32,
    /// Weekday header names, Monday first.
    pub weekdays: Vec<String>,
    /// Duplicate tie-break rules, keyed by period.
    pub lunch_rules: Vec<LunchRule>,
    /// Label-to-time row offset for layout mode.
    pub row_height: f64,
    /// Tolerance around `row_height`.
    pub row_tolerance: f64,
}

impl ScheduleConventions {
    /// The rule for `period`, if any.
    pub fn lunch_rule(&self, period: u8) -> Option<&LunchRule> {
        self.lunch_rules.iter().find(|r| r.period == period)
    }

    /// Same conventions with a different academic year.
    pub fn with_academic_year(mut self, year: i32) -> Self {
        self.academic_year_start = year;
        self
    }
}

impl Default for ScheduleConventions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScheduleConventions {
    fn from(config: &AppConfig) -> Self {
        Self {
            academic_year_start: config.calendar.academic_year_start,
            pm_cutoff_hour: config.calendar.pm_cutoff_hour,
            weekdays: DEFAULT_WEEKDAYS.iter().map(|d| d.to_string()).collect(),
            lunch_rules: config.lunch_rules.clone(),
            row_height: config.layout.row_height,
            row_tolerance: config.layout.row_tolerance,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bellgrid/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BellgridError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bellgrid/bellgrid.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Directory holding the database and downloads.
pub fn data_dir(config: &AppConfig) -> Result<PathBuf> {
    match &config.defaults.data_dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => config_dir(),
    }
}

/// Path of the schedule database.
pub fn db_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(data_dir(config)?.join(DB_FILE_NAME))
}

/// Directory downloaded PDFs are written to.
pub fn download_dir(config: &AppConfig) -> Result<PathBuf> {
    Ok(data_dir(config)?.join(DOWNLOAD_DIR_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BellgridError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        BellgridError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject values the parser cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.calendar.pm_cutoff_hour > 12 {
        return Err(BellgridError::config(format!(
            "calendar.pm_cutoff_hour must be between 0 and 12, got {}",
            config.calendar.pm_cutoff_hour
        )));
    }
    if config.layout.row_tolerance < 0.0 {
        return Err(BellgridError::config("layout.row_tolerance must not be negative"));
    }
    for rule in &config.lunch_rules {
        if rule.period == 0 {
            return Err(BellgridError::config("lunch_rules.period must be at least 1"));
        }
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BellgridError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BellgridError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BellgridError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
