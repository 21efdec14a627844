//! Fixtures for tests

use crate::association::{Association, AssociationMap};
use crate::catalog::SpeciesCatalog;
use crate::driver::{DriverRange, DriverVector};
use crate::site::Site;
use crate::species::{Species, SpeciesMap};
use crate::variable::{Variable, VariableSet};
use rstest::fixture;
use std::sync::Arc;

/// Assert that an error of the given kind occurs
macro_rules! assert_error_kind {
    ($result:expr, $kind:expr) => {
        assert_eq!($result.unwrap_err().kind(), $kind);
    };
}
pub(crate) use assert_error_kind;

fn dv(values: &[f64]) -> DriverVector {
    DriverVector::new(values.to_vec())
}

fn variable(id: &str, description: &str, min: f64, max: f64) -> Variable {
    Variable {
        id: id.into(),
        description: description.into(),
        min,
        max,
    }
}

fn niche_species(id: &str, pessimum: [&[f64]; 2], optimum: [&[f64]; 2]) -> Species {
    Species {
        id: id.into(),
        name: id.into(),
        pessimum: DriverRange::new(dv(pessimum[0]), dv(pessimum[1])),
        optimum: DriverRange::new(dv(optimum[0]), dv(optimum[1])),
        life_history: None,
        initial_state: 0.0,
    }
}

#[fixture]
pub fn variables() -> VariableSet {
    VariableSet::new([
        variable("pH", "Soil pH", 0.0, 14.0),
        variable("moisture", "Relative soil moisture", 0.0, 1.0),
    ])
    .unwrap()
}

#[fixture]
pub fn species() -> Species {
    niche_species(
        "Carex nigra",
        [&[4.0, 0.2], &[9.0, 0.9]],
        [&[6.0, 0.4], &[8.0, 0.7]],
    )
}

/// A species which only tolerates a flow of exactly 10
#[fixture]
pub fn point_species() -> Species {
    niche_species("point", [&[10.0], &[10.0]], [&[10.0], &[10.0]])
}

#[fixture]
pub fn association(species: Species) -> Association {
    let other = niche_species(
        "Caltha palustris",
        [&[5.0, 0.3], &[10.0, 0.8]],
        [&[6.5, 0.35], &[9.0, 0.75]],
    );

    let mut association = Association::new("4101".into(), "Calthion".into());
    association.add_species(species.into());
    association.add_species(other.into());
    association
}

#[fixture]
pub fn catalog(variables: VariableSet, association: Association) -> SpeciesCatalog {
    let species: SpeciesMap = association
        .species
        .iter()
        .map(|species| (species.id.clone(), species.clone()))
        .collect();
    let associations = AssociationMap::from([(association.id.clone(), association)]);

    SpeciesCatalog::new(variables.into(), species, associations, 1.0).unwrap()
}

/// A catalog with a single variable (`flow`) and a single species ([`point_species`])
#[fixture]
pub fn flow_catalog(point_species: Species) -> Arc<SpeciesCatalog> {
    let variables = VariableSet::new([variable("flow", "River flow", 0.0, 100.0)]).unwrap();
    let species = SpeciesMap::from([(point_species.id.clone(), Arc::new(point_species))]);

    SpeciesCatalog::new(variables.into(), species, AssociationMap::new(), 1.0)
        .unwrap()
        .into()
}

/// Two sites with three steps of flow: A is always suitable, B only at the second step
#[fixture]
pub fn scenario_sites() -> Vec<Site> {
    [("A", [10.0, 10.0, 10.0]), ("B", [5.0, 10.0, 5.0])]
        .into_iter()
        .map(|(id, flows)| {
            Site::new(
                id.into(),
                None,
                None,
                flows.iter().map(|&flow| dv(&[flow])).collect(),
            )
        })
        .collect()
}
