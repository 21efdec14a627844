//! Plant associations: named groups of species which characteristically occur together.
//!
//! The possibility of an association is combined from the possibilities of its member species
//! with the algebraic gamma operator, a compensatory fuzzy operator between the algebraic product
//! (`gamma = 0`) and the algebraic sum (`gamma = 1`).
use crate::driver::{DriverRange, DriverVector};
use crate::error::{HabitatError, HabitatResult, entity};
use crate::id::{define_id_getter, define_id_type};
use crate::species::Species;
use crate::variable::VariableSet;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::sync::{Arc, OnceLock};

define_id_type! {AssociationID}

/// A map of [`Association`]s, keyed by association ID
pub type AssociationMap = IndexMap<AssociationID, Association>;

/// The gamma used for BERN associations, based on expert knowledge
pub const DEFAULT_GAMMA: f64 = 0.2;

/// Initial step width of the optimum search, as a multiple of the variable error tolerances
const INITIAL_STEP_FACTOR: f64 = 1e10;

/// Combine possibilities with the algebraic gamma operator.
///
/// `A^gamma * (1 - B)^(1 - gamma)` with `A` the product of the possibilities and `B` the product
/// of their complements.
pub fn algebraic_gamma<I>(possibilities: I, gamma: f64) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (a, b) = possibilities
        .into_iter()
        .fold((1.0, 1.0), |(a, b), p| (a * p, b * (1.0 - p)));
    a.powf(gamma) * (1.0 - b).powf(1.0 - gamma)
}

/// The position and value of the highest possibility of an association
#[derive(Debug, Clone, PartialEq)]
pub struct Possibility {
    /// Site conditions at the optimum
    pub site: DriverVector,
    /// The (not normalised) possibility at the optimum
    pub value: f64,
}

/// A plant association
#[derive(Debug)]
pub struct Association {
    /// Unique identifier.
    ///
    /// By convention 2000..2999 are natural forests, 3000..3999 hayfields, 4000..4999 meadows,
    /// 5000..5999 meadows or hayfields and 6000..6999 intensively used forests.
    pub id: AssociationID,
    /// Name of the association
    pub name: String,
    /// The member species
    pub species: Vec<Arc<Species>>,
    optimum: OnceLock<Possibility>,
}
define_id_getter! {Association, AssociationID}

impl Association {
    /// Create a new association with no species
    pub fn new(id: AssociationID, name: String) -> Self {
        Self {
            id,
            name,
            species: Vec::new(),
            optimum: OnceLock::new(),
        }
    }

    /// The number of member species
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Whether the association has no species
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Add a member species, invalidating any cached optimum
    pub fn add_species(&mut self, species: Arc<Species>) {
        self.species.push(species);
        self.optimum = OnceLock::new();
    }

    fn check_not_empty(&self) -> HabitatResult<()> {
        if self.species.is_empty() {
            return Err(HabitatError::config(
                entity("association", &self.id),
                format!("{} has no species", self.name),
            ));
        }
        Ok(())
    }

    /// The range in which the possibility may be greater than zero.
    ///
    /// This is the bounding box of the pessimum ranges of all member species.
    pub fn envelope(&self) -> HabitatResult<DriverRange> {
        self.check_not_empty()?;
        let first = self.species[0].pessimum.clone();
        Ok(self.species[1..]
            .iter()
            .fold(first, |env, species| &env | &species.pessimum))
    }

    /// The centre of the intersection of the envelope with every species' optimum
    pub fn center(&self) -> HabitatResult<DriverVector> {
        let envelope = self.envelope()?;
        let inner = self
            .species
            .iter()
            .fold(envelope, |inner, species| &inner & &species.optimum);
        Ok(inner.center())
    }

    /// The possibility of the association under the given site conditions, in [0, 1]
    pub fn possibility(&self, site: &DriverVector, gamma: f64) -> HabitatResult<f64> {
        if !self.envelope()?.contains(site) {
            return Ok(0.0);
        }

        Ok(algebraic_gamma(
            self.species.iter().map(|species| species.suitability(site)),
            gamma,
        ))
    }

    /// The optimal site conditions of this association, calculated on first use
    pub fn optimum(&self, variables: &VariableSet, gamma: f64) -> HabitatResult<Possibility> {
        if let Some(optimum) = self.optimum.get() {
            return Ok(optimum.clone());
        }

        let optimum = self.calculate_optimum(variables, gamma)?;
        Ok(self.optimum.get_or_init(|| optimum).clone())
    }

    /// Whether the optimum has already been calculated
    pub fn has_optimum(&self) -> bool {
        self.optimum.get().is_some()
    }

    /// Search for the highest possibility.
    ///
    /// The possibility function is not differentiable, so a pattern search is used: starting at
    /// the centre, all `3^d` neighbours at the current step width are tested and the best one is
    /// taken. When no neighbour improves, the step width is divided by ten until it falls below
    /// the error tolerance of the variables.
    fn calculate_optimum(&self, variables: &VariableSet, gamma: f64) -> HabitatResult<Possibility> {
        let dims = variables.dims();
        let accuracy = variables.calc_accuracy();
        let combinations = 3_usize.pow(u32::try_from(dims).map_err(|_| {
            HabitatError::config("variables", "too many variables for optimum search")
        })?);
        let centre_index = (combinations - 1) / 2;

        let mut current = self.center()?;
        let mut current_value;
        let mut step_factor = INITIAL_STEP_FACTOR;
        loop {
            current_value = self.possibility(&current, gamma)?;
            if step_factor < 1.0 || current_value > 1.0 - 1e-12 {
                break;
            }

            let step_width = &accuracy * step_factor;
            let mut best = None;
            let mut best_value = current_value;
            for i in (0..combinations).filter(|&i| i != centre_index) {
                let mut test = current.clone();
                let mut rest = i;
                for d in 0..dims {
                    let direction = match rest % 3 {
                        0 => -1.0,
                        1 => 0.0,
                        _ => 1.0,
                    };
                    rest /= 3;
                    test[d] += direction * step_width[d];
                }

                let test_value = self.possibility(&test, gamma)?;
                if test_value > best_value {
                    best_value = test_value;
                    best = Some(test);
                }
            }

            match best {
                Some(best) => current = best,
                None => step_factor /= 10.0,
            }
        }

        Ok(Possibility {
            site: current,
            value: current_value,
        })
    }
}

/// The possibilities of several associations at the same site.
///
/// Associations without species yield `NaN`.
pub fn possibility(associations: &[&Association], site: &DriverVector, gamma: f64) -> Vec<f64> {
    associations
        .par_iter()
        .map(|association| association.possibility(site, gamma).unwrap_or(f64::NAN))
        .collect()
}

/// The possibilities of every association at every site.
///
/// The result is row-major by site: for 3 associations and 2 sites it is `p(a1,s1), p(a2,s1),
/// p(a3,s1), p(a1,s2), p(a2,s2), p(a3,s2)`. Associations without species yield `NaN`.
pub fn possibility_matrix(
    associations: &[&Association],
    sites: &[DriverVector],
    gamma: f64,
) -> Vec<f64> {
    sites
        .par_iter()
        .flat_map_iter(|site| {
            associations
                .iter()
                .map(move |association| association.possibility(site, gamma).unwrap_or(f64::NAN))
        })
        .collect()
}

/// The highest possibility of any association at a site, ignoring associations without species
pub fn max_possibility(associations: &[&Association], site: &DriverVector, gamma: f64) -> f64 {
    associations
        .iter()
        .filter_map(|association| association.possibility(site, gamma).ok())
        .fold(0.0, f64::max)
}
