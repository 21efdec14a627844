//! Common routines for handling input data.
use crate::catalog::SpeciesCatalog;
use crate::error::HabitatError;
use crate::id::{HasID, IDLike};
use crate::parameters::ModelParameters;
use crate::site_vector::SiteVector;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use log::info;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub mod association;
use association::read_associations;
pub mod site;
use site::read_sites;
pub mod species;
use species::read_species;
pub mod variable;
use variable::read_variables;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    let vec = read_csv_internal(file_path)?;
    if vec.is_empty() {
        Err(HabitatError::data(
            file_path.display(),
            "CSV file cannot be empty",
        ))?;
    }

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file, if it exists.
///
/// A missing file is treated the same as an empty one.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    if !file_path.is_file() {
        return Ok(Vec::new().into_iter());
    }

    Ok(read_csv_internal(file_path)?.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let to_data_error = |err: csv::Error| HabitatError::data(file_path.display(), err.to_string());
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .map_err(to_data_error)?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .map_err(to_data_error)?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read a CSV file of items with IDs.
///
/// As this function is only ever used for top-level CSV files (i.e. the ones which actually
/// define the IDs for a given type), we use an ordered map to maintain the order in the input
/// files.
pub fn read_csv_id_file<T, ID: IDLike>(file_path: &Path) -> Result<IndexMap<ID, T>>
where
    T: HasID<ID> + DeserializeOwned,
{
    fn fill_and_validate_map<T, ID: IDLike>(file_path: &Path) -> Result<IndexMap<ID, T>>
    where
        T: HasID<ID> + DeserializeOwned,
    {
        let mut map = IndexMap::new();
        for record in read_csv::<T>(file_path)? {
            let id = record.get_id().clone();
            let name = format!("ID {id}");
            if id.to_string().is_empty() {
                Err(HabitatError::data(&name, "IDs cannot be empty"))?;
            }
            if map.insert(id, record).is_some() {
                Err(HabitatError::data(name, "duplicate ID found"))?;
            }
        }

        Ok(map)
    }

    fill_and_validate_map(file_path).with_context(|| input_err_msg(file_path))
}

/// Find the [`HabitatError`] which caused a load to fail, if any
pub fn habitat_error(err: &anyhow::Error) -> Option<&HabitatError> {
    err.chain().find_map(|cause| cause.downcast_ref::<HabitatError>())
}

/// Load a model from the specified directory.
///
/// Either the whole model is loaded or an error is returned. Errors from the habitat engine can
/// be recovered with [`habitat_error`].
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The sites of the model, ready to run. The species catalog is available from
/// [`SiteVector::catalog`].
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<SiteVector> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir).map_err(|err| {
        HabitatError::config("model parameters", format!("{err:#}"))
    })?;

    let variables = Arc::new(read_variables(model_dir)?);
    let species = read_species(model_dir, &variables)?;
    let associations = read_associations(model_dir, &species)?;
    let catalog = SpeciesCatalog::new(variables.clone(), species, associations, parameters.dt)?;
    info!(
        "Loaded {} variables ({variables}), {} species and {} associations",
        variables.dims(),
        catalog.species().len(),
        catalog.associations().len()
    );

    let sites = read_sites(model_dir, &variables, catalog.associations())?;
    let site_vector = SiteVector::new(sites, catalog.into(), parameters)?;
    info!(
        "Loaded {} sites with {} time steps each",
        site_vector.sites().len(),
        site_vector.series_length()
    );

    Ok(site_vector)
}
