//! The species catalog: every species and association known to a model.
use crate::association::{Association, AssociationID, AssociationMap, Possibility};
use crate::error::{HabitatError, HabitatResult, entity};
use crate::species::{Species, SpeciesID, SpeciesMap};
use crate::variable::VariableSet;
use indexmap::IndexMap;
use log::{debug, warn};
use rayon::prelude::*;
use std::sync::Arc;

/// The species and associations of a model, together with the variables they are defined over.
///
/// The catalog is owned by the top-level simulation context and shared read-only with every
/// community which tracks its species.
#[derive(Debug)]
pub struct SpeciesCatalog {
    variables: Arc<VariableSet>,
    species: SpeciesMap,
    associations: AssociationMap,
}

impl SpeciesCatalog {
    /// Create a new catalog, validating every species.
    ///
    /// # Arguments
    ///
    /// * `variables` - The driver variables of the model
    /// * `species` - All species
    /// * `associations` - Associations, whose member species must be in `species`
    /// * `dt` - The time step length species will be simulated with
    pub fn new(
        variables: Arc<VariableSet>,
        species: SpeciesMap,
        associations: AssociationMap,
        dt: f64,
    ) -> HabitatResult<Self> {
        if species.is_empty() {
            return Err(HabitatError::data("species", "no species defined"));
        }

        for species in species.values() {
            species.validate(&variables, dt)?;
        }

        for association in associations.values() {
            for member in &association.species {
                if !species.contains_key(&member.id) {
                    return Err(HabitatError::data(
                        entity("association", &association.id),
                        format!("unknown species {}", member.id),
                    ));
                }
            }
            if association.is_empty() {
                warn!(
                    "Association {} ({}) has no species",
                    association.id, association.name
                );
            }
        }

        Ok(Self {
            variables,
            species,
            associations,
        })
    }

    /// The driver variables
    pub fn variables(&self) -> &Arc<VariableSet> {
        &self.variables
    }

    /// All species, in catalog order
    pub fn species(&self) -> &SpeciesMap {
        &self.species
    }

    /// All associations, in catalog order
    pub fn associations(&self) -> &AssociationMap {
        &self.associations
    }

    /// Look up a species
    pub fn get_species(&self, id: &str) -> HabitatResult<&Arc<Species>> {
        self.species
            .get(id)
            .ok_or_else(|| HabitatError::data(format!("species {id}"), "unknown species"))
    }

    /// Look up an association
    pub fn get_association(&self, id: &str) -> HabitatResult<&Association> {
        self.associations
            .get(id)
            .ok_or_else(|| HabitatError::data(format!("association {id}"), "unknown association"))
    }

    /// The IDs of all species
    pub fn species_ids(&self) -> impl Iterator<Item = &SpeciesID> {
        self.species.keys()
    }

    /// The IDs of all associations
    pub fn association_ids(&self) -> impl Iterator<Item = &AssociationID> {
        self.associations.keys()
    }

    /// Calculate the optimum of every association in parallel.
    ///
    /// Associations without species are skipped.
    pub fn calculate_optima(&self, gamma: f64) -> IndexMap<AssociationID, Possibility> {
        let optima: Vec<_> = self
            .associations
            .par_iter()
            .filter_map(|(id, association)| {
                association
                    .optimum(&self.variables, gamma)
                    .ok()
                    .map(|optimum| (id.clone(), optimum))
            })
            .collect();
        debug!("Calculated optima for {} associations", optima.len());

        optima.into_iter().collect()
    }
}
