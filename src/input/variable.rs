//! Code for reading driver variables from a CSV file.
use super::*;
use crate::variable::{Variable, VariableSet};
use std::path::Path;

const VARIABLES_FILE_NAME: &str = "variables.csv";

/// Reads driver variables from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The variables, in the order they appear in the file
pub fn read_variables(model_dir: &Path) -> Result<VariableSet> {
    let file_path = model_dir.join(VARIABLES_FILE_NAME);
    let variables = read_csv::<Variable>(&file_path)?;
    let variables = VariableSet::new(variables).with_context(|| input_err_msg(&file_path))?;

    Ok(variables)
}
