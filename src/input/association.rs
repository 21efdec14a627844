//! Code for reading plant associations and their member species from CSV files.
use super::*;
use crate::association::{Association, AssociationID, AssociationMap};
use crate::error::entity;
use crate::id::define_id_getter;
use crate::species::SpeciesMap;
use log::debug;
use serde::Deserialize;
use std::path::Path;

const ASSOCIATIONS_FILE_NAME: &str = "associations.csv";
const ASSOCIATION_SPECIES_FILE_NAME: &str = "association_species.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct AssociationRaw {
    id: AssociationID,
    name: String,
}
define_id_getter! {AssociationRaw, AssociationID}

/// Links a species to an association
#[derive(Debug, Deserialize, PartialEq)]
struct AssociationSpeciesRaw {
    association_id: String,
    species_id: String,
    /// Only species which are steady members of the association are linked (non-zero)
    steady: i32,
}

/// Read associations from the associations and association species files.
///
/// Both files are optional: a model without associations tracks every species at every site.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `species` - All species of the model
///
/// # Returns
///
/// A map of associations, with the IDs as keys, in the order of the associations file
pub fn read_associations(model_dir: &Path, species: &SpeciesMap) -> Result<AssociationMap> {
    let associations_file = model_dir.join(ASSOCIATIONS_FILE_NAME);
    if !associations_file.is_file() {
        return Ok(AssociationMap::new());
    }

    let mut associations: AssociationMap =
        read_csv_id_file::<AssociationRaw, AssociationID>(&associations_file)?
            .into_iter()
            .map(|(id, raw)| (id, Association::new(raw.id, raw.name)))
            .collect();

    let links_file = model_dir.join(ASSOCIATION_SPECIES_FILE_NAME);
    let links = read_csv_optional(&links_file)?;
    link_species_from_iter(&mut associations, links, species)
        .with_context(|| input_err_msg(&links_file))?;

    Ok(associations)
}

fn link_species_from_iter<I>(
    associations: &mut AssociationMap,
    iter: I,
    species: &SpeciesMap,
) -> Result<()>
where
    I: Iterator<Item = AssociationSpeciesRaw>,
{
    for link in iter {
        let association = associations
            .get_mut(link.association_id.as_str())
            .ok_or_else(|| {
                HabitatError::data(
                    format!("association {}", link.association_id),
                    "unknown association",
                )
            })?;
        let member = species.get(link.species_id.as_str()).ok_or_else(|| {
            HabitatError::data(format!("species {}", link.species_id), "unknown species")
        })?;

        if link.steady == 0 {
            debug!(
                "Species {} is not a steady member of association {}",
                member.id, association.id
            );
            continue;
        }

        if association.species.iter().any(|s| s.id == member.id) {
            Err(HabitatError::data(
                entity("association", &association.id),
                format!("species {} listed more than once", member.id),
            ))?;
        }

        association.add_species(member.clone());
    }

    Ok(())
}
