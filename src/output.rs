//! The module responsible for writing output data to disk.
use crate::association::{AssociationID, Possibility};
use crate::catalog::SpeciesCatalog;
use crate::site::SiteID;
use crate::site_vector::SiteVector;
use crate::species::SpeciesID;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The output file name for species trajectories
const TRAJECTORIES_FILE_NAME: &str = "trajectories.csv";

/// The output file name for community possibilities
const COMMUNITIES_FILE_NAME: &str = "communities.csv";

/// Get the default output directory for the model specified at `model_dir`, inside `results_root`
pub fn get_output_dir(model_dir: &Path, results_root: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path, checking for all possible errors
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok(results_root.join(model_name))
}

/// Create a new output directory for the model, optionally overwriting existing data.
///
/// # Arguments
///
/// * `output_dir` - The folder to create
/// * `allow_overwrite` - Whether to delete an existing, non-empty folder
///
/// # Returns
///
/// `true` if an existing folder was overwritten, `false` otherwise
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let mut overwrite = false;
    if output_dir.is_dir() {
        if output_dir.read_dir()?.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        fs::remove_dir_all(output_dir)?;
        overwrite = true;
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the trajectories CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TrajectoryRow {
    site_id: SiteID,
    step: usize,
    time: f64,
    species_id: SpeciesID,
    suitability: f64,
    state: f64,
}

/// Represents a row in the communities CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CommunityRow {
    site_id: SiteID,
    step: usize,
    time: f64,
    possibility: f64,
}

/// An object for writing simulation results to file
pub struct DataWriter {
    trajectories_writer: csv::Writer<File>,
    communities_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            trajectories_writer: new_writer(TRAJECTORIES_FILE_NAME)?,
            communities_writer: new_writer(COMMUNITIES_FILE_NAME)?,
        })
    }

    /// Write the results of a completed run, in site order.
    ///
    /// Fails if the run has not completed.
    pub fn write_results(&mut self, site_vector: &SiteVector) -> Result<()> {
        let parameters = site_vector.parameters();
        let results = site_vector.results()?;
        for (site, (site_id, trajectory)) in site_vector.sites().iter().zip(&results) {
            let species_ids = site.community().species_ids().collect::<Vec<_>>();
            for record in *trajectory {
                let time = parameters.time_at(record.step);
                for ((species_id, &suitability), &state) in species_ids
                    .iter()
                    .zip(&record.suitability)
                    .zip(&record.state)
                {
                    self.trajectories_writer.serialize(TrajectoryRow {
                        site_id: site_id.clone(),
                        step: record.step,
                        time,
                        species_id: (*species_id).clone(),
                        suitability,
                        state,
                    })?;
                }

                self.communities_writer.serialize(CommunityRow {
                    site_id: site_id.clone(),
                    step: record.step,
                    time,
                    possibility: record.possibility,
                })?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.trajectories_writer.flush()?;
        self.communities_writer.flush()?;

        Ok(())
    }
}

/// Write the optimum of every association as CSV.
///
/// Columns are the association ID and name, the possibility at the optimum and the value of each
/// variable at the optimum.
pub fn write_optima<W: Write>(
    writer: W,
    catalog: &SpeciesCatalog,
    optima: &IndexMap<AssociationID, Possibility>,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let header = ["association_id", "name", "possibility"]
        .into_iter()
        .chain(catalog.variables().ids().map(|id| &*id.0));
    writer.write_record(header)?;

    for (id, optimum) in optima {
        let association = catalog.get_association(&id.0)?;
        let record = [
            id.to_string(),
            association.name.clone(),
            optimum.value.to_string(),
        ]
        .into_iter()
        .chain(optimum.site.iter().map(ToString::to_string));
        writer.write_record(record)?;
    }
    writer.flush()?;

    Ok(())
}
