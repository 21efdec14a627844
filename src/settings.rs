//! Program settings, read from `settings.toml` in the user's config directory.
use crate::get_bern_config_dir;
use crate::input::read_toml;
use crate::log::{DEFAULT_LOG_LEVEL, parse_log_level};
use anyhow::{Context, Result, ensure};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// The default folder in which model-specific output folders are created
const DEFAULT_RESULTS_ROOT: &str = "bern_results";

/// Upper limit for the worker thread count, to catch typos
const MAX_THREADS: usize = 1024;

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for BERN.
# Every setting is optional. Uncomment a line to change its value.
";

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    get_bern_config_dir().join(SETTINGS_FILE_NAME)
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// The default program log level (off, error, warn, info, debug or trace)
    pub log_level: String,
    /// Whether to overwrite output folders by default
    pub overwrite: bool,
    /// Number of worker threads used to step sites in parallel (0 uses all available cores)
    pub num_threads: usize,
    /// Folder in which an output folder is created for each model run without `--output-dir`
    pub results_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overwrite: false,
            num_threads: 0,
            results_root: DEFAULT_RESULTS_ROOT.into(),
        }
    }
}

impl Settings {
    /// Load the settings file from the user's config directory.
    ///
    /// Defaults are used for a missing file or missing fields.
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Load and check settings from the given path
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let settings: Settings = read_toml(file_path)?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", file_path.display()))?;

        Ok(settings)
    }

    /// Check that the settings have usable values
    fn validate(&self) -> Result<()> {
        parse_log_level(&self.log_level)?;
        ensure!(
            self.num_threads <= MAX_THREADS,
            "num_threads must be at most {MAX_THREADS}"
        );
        ensure!(
            !self.results_root.as_os_str().is_empty(),
            "results_root cannot be empty"
        );

        Ok(())
    }

    /// The contents of a placeholder settings file.
    ///
    /// Each default value is written commented out, preceded by the field's doc comment.
    pub fn default_file_contents() -> Result<String> {
        let settings_raw =
            toml::to_string(&Settings::default()).context("Could not convert settings to TOML")?;

        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };
            let field = field.trim();
            let docs = Settings::get_field_docs(field)
                .with_context(|| format!("Missing doc comment for field {field}"))?;
            writeln!(&mut out)?;
            for doc_line in docs.lines() {
                writeln!(&mut out, "# # {}", doc_line.trim())?;
            }
            writeln!(&mut out, "# {}", line.trim())?;
        }

        Ok(out)
    }
}
