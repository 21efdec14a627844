//! Code for reading sites and their driver series from CSV files.
use super::*;
use crate::association::{AssociationID, AssociationMap};
use crate::driver::DriverVector;
use crate::error::entity;
use crate::id::{IDCollection, define_id_getter};
use crate::site::{Site, SiteID};
use crate::variable::VariableSet;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const SITES_FILE_NAME: &str = "sites.csv";
const DRIVERS_FILE_NAME: &str = "drivers.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct SiteRaw {
    id: SiteID,
    name: Option<String>,
    association_id: Option<String>,
}
define_id_getter! {SiteRaw, SiteID}

/// The value of one variable at one site and step
#[derive(Debug, Deserialize, PartialEq)]
struct DriverRaw {
    site_id: String,
    step: usize,
    variable_id: String,
    value: f64,
}

/// Driver values of one site, indexed by step and variable
type DriverTable = Vec<Vec<Option<f64>>>;

/// Read sites and their driver series.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `variables` - The driver variables of the model
/// * `associations` - The associations sites may be bound to
///
/// # Returns
///
/// The sites in the order of the sites file
pub fn read_sites(
    model_dir: &Path,
    variables: &VariableSet,
    associations: &AssociationMap,
) -> Result<Vec<Site>> {
    let sites_file = model_dir.join(SITES_FILE_NAME);
    let descriptions = read_csv_id_file::<SiteRaw, SiteID>(&sites_file)?;

    let drivers_file = model_dir.join(DRIVERS_FILE_NAME);
    let drivers = read_csv(&drivers_file)?;
    let mut drivers = read_drivers_from_iter(drivers, &descriptions, variables)
        .with_context(|| input_err_msg(&drivers_file))?;

    descriptions
        .into_values()
        .map(|raw| {
            let association = raw
                .association_id
                .as_deref()
                .map(|id| associations.get_id_by_str(id))
                .transpose()
                .map_err(|err| HabitatError::data(entity("site", &raw.id), err.to_string()))?;
            let table = drivers.remove(&raw.id).unwrap_or_default();
            let series = complete_series(&raw.id, table, variables)
                .with_context(|| input_err_msg(&drivers_file))?;

            Ok(Site::new(raw.id, raw.name, association, series))
        })
        .process_results(|iter| iter.collect())
}

fn read_drivers_from_iter<I>(
    iter: I,
    descriptions: &IndexMap<SiteID, SiteRaw>,
    variables: &VariableSet,
) -> Result<HashMap<SiteID, DriverTable>>
where
    I: Iterator<Item = DriverRaw>,
{
    let rows = iter.collect_vec();
    let mut row_counts: HashMap<&str, usize> = HashMap::new();
    for row in &rows {
        *row_counts.entry(&row.site_id).or_default() += 1;
    }

    let mut tables: HashMap<SiteID, DriverTable> = HashMap::new();
    for row in &rows {
        let site_id = descriptions.get_id_by_str(&row.site_id).map_err(|_| {
            HabitatError::data(format!("site {}", row.site_id), "unknown site")
        })?;

        // A complete series up to this step needs a row per variable at every earlier step
        let step_count = row_counts[row.site_id.as_str()].div_ceil(variables.dims().max(1));
        if row.step >= step_count {
            Err(HabitatError::data(
                entity("site", &site_id),
                format!(
                    "step {} is out of range: {step_count} steps at most for the rows given",
                    row.step
                ),
            ))?;
        }
        let index = variables.index_of(&row.variable_id).ok_or_else(|| {
            HabitatError::data(format!("variable {}", row.variable_id), "unknown variable")
        })?;
        if !row.value.is_finite() {
            Err(HabitatError::data(
                entity("site", &site_id),
                format!("non-finite value for {} at step {}", row.variable_id, row.step),
            ))?;
        }

        let table = tables.entry(site_id.clone()).or_default();
        if table.len() <= row.step {
            table.resize(step_count, vec![None; variables.dims()]);
        }
        if table[row.step][index].replace(row.value).is_some() {
            Err(HabitatError::data(
                entity("site", &site_id),
                format!(
                    "more than one value for {} at step {}",
                    row.variable_id, row.step
                ),
            ))?;
        }
    }

    Ok(tables)
}

/// Check that every variable has a value at every step
fn complete_series(
    site_id: &SiteID,
    table: DriverTable,
    variables: &VariableSet,
) -> Result<Vec<DriverVector>, HabitatError> {
    let name = entity("site", site_id);
    if table.is_empty() {
        return Err(HabitatError::data(name, "no drivers defined"));
    }

    table
        .into_iter()
        .enumerate()
        .map(|(step, values)| {
            values
                .into_iter()
                .zip(variables.iter())
                .map(|(value, variable)| {
                    value.ok_or_else(|| {
                        HabitatError::data(
                            &name,
                            format!("no value for {} at step {step}", variable.id),
                        )
                    })
                })
                .collect()
        })
        .collect()
}
