//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::association::DEFAULT_GAMMA;
use crate::input::{input_err_msg, read_toml};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_dt, f64, 1.0);
define_param_default!(default_gamma, f64, DEFAULT_GAMMA);
define_param_default!(default_parallel, bool, true);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ModelParameters {
    /// Number of time steps to simulate.
    ///
    /// Defaults to the length of the driver series.
    #[serde(default)]
    pub time_step_count: Option<usize>,
    /// Length of one time step
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Model time at the first step
    #[serde(default)]
    pub start_time: f64,
    /// Gamma of the operator used to combine species possibilities.
    ///
    /// 0 is the algebraic product, 1 the algebraic sum.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Whether to step sites in parallel
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            time_step_count: None,
            dt: default_dt(),
            start_time: 0.0,
            gamma: default_gamma(),
            parallel: default_parallel(),
        }
    }
}

/// Check that the `dt` parameter is valid
fn check_dt(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "dt must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `gamma` parameter is valid
fn check_gamma(value: f64) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value),
        "gamma must be between 0 and 1"
    );

    Ok(())
}

/// Check that the `start_time` parameter is valid
fn check_start_time(value: f64) -> Result<()> {
    ensure!(value.is_finite(), "start_time must be a finite number");

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// If the file is not present, default values are used.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        if !file_path.is_file() {
            warn!("No {MODEL_PARAMETERS_FILE_NAME} provided; using default model parameters");
            return Ok(ModelParameters::default());
        }

        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        check_dt(self.dt)?;
        check_gamma(self.gamma)?;
        check_start_time(self.start_time)?;

        Ok(())
    }

    /// The model time at the given step
    #[allow(clippy::cast_precision_loss)]
    pub fn time_at(&self, step: usize) -> f64 {
        self.start_time + self.dt * step as f64
    }
}
