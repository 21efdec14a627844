//! Species and their environmental response.
//!
//! The niche of a species is a fuzzy constraint of existence: for every driver variable a
//! trapezoidal possibility function is defined by four points, the minimum of the pessimum
//! (`pess_min`), the minimum of the optimum (`opt_min`), the maximum of the optimum (`opt_max`) and
//! the maximum of the pessimum (`pess_max`). Within the optimum the possibility is 1, outside the
//! pessimum it is 0 and the flanks are linear.
use crate::driver::{DriverRange, DriverVector};
use crate::error::{HabitatError, HabitatResult, entity};
use crate::id::{define_id_getter, define_id_type};
use crate::variable::VariableSet;
use indexmap::IndexMap;
use std::sync::Arc;

define_id_type! {SpeciesID}

/// A map of [`Species`], keyed by species ID
pub type SpeciesMap = IndexMap<SpeciesID, Arc<Species>>;

/// Trapezoidal possibility function
pub fn trapezoid(x: f64, pess_min: f64, opt_min: f64, opt_max: f64, pess_max: f64) -> f64 {
    if x < pess_min || x > pess_max {
        0.0
    } else if x < opt_min {
        (x - pess_min) / (opt_min - pess_min)
    } else if x > opt_max {
        (pess_max - x) / (pess_max - opt_max)
    } else {
        1.0
    }
}

/// Rates used to advance the occurrence state of a species over time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifeHistory {
    /// Rate at which suitable habitat is colonised (per unit time)
    pub growth_rate: f64,
    /// Rate at which established occurrence is lost (per unit time)
    pub mortality_rate: f64,
}

/// A single taxon
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    /// Unique identifier
    pub id: SpeciesID,
    /// Usually the scientific name
    pub name: String,
    /// The range outside of which the species cannot exist
    pub pessimum: DriverRange,
    /// The range of optimal conditions
    pub optimum: DriverRange,
    /// Life-history rates. Without them the species state simply follows its suitability.
    pub life_history: Option<LifeHistory>,
    /// State at the start of a run
    pub initial_state: f64,
}
define_id_getter! {Species, SpeciesID}

impl Species {
    /// Possibility of existence under the given conditions.
    ///
    /// Following Liebig's law of the minimum, this is the smallest possibility over all driver
    /// variables.
    pub fn suitability(&self, drivers: &DriverVector) -> f64 {
        (0..drivers.len())
            .map(|i| {
                trapezoid(
                    drivers[i],
                    self.pessimum.min[i],
                    self.optimum.min[i],
                    self.optimum.max[i],
                    self.pessimum.max[i],
                )
            })
            .fold(1.0, f64::min)
    }

    /// Advance the state of this species by one time step.
    ///
    /// # Arguments
    ///
    /// * `current` - The state at the start of the step
    /// * `suitability` - The suitability of the site during the step
    /// * `dt` - Length of the time step
    /// * `step` - Index of the step, for error reporting
    pub fn update_state(
        &self,
        current: f64,
        suitability: f64,
        dt: f64,
        step: usize,
    ) -> HabitatResult<f64> {
        let new_state = match self.life_history {
            None => suitability,
            Some(LifeHistory {
                growth_rate,
                mortality_rate,
            }) => {
                current
                    + dt * (growth_rate * suitability * (1.0 - current) - mortality_rate * current)
            }
        };

        if !(0.0..=1.0).contains(&new_state) {
            return Err(HabitatError::Numeric {
                species: self.id.clone(),
                step,
                value: new_state,
            });
        }

        Ok(new_state)
    }

    /// Check the parameters of this species against the model's variables.
    ///
    /// # Arguments
    ///
    /// * `variables` - The driver variables of the model
    /// * `dt` - The time step length the species will be simulated with
    pub fn validate(&self, variables: &VariableSet, dt: f64) -> HabitatResult<()> {
        let name = entity("species", &self.id);
        let dims = variables.dims();
        for corner in [
            &self.pessimum.min,
            &self.optimum.min,
            &self.optimum.max,
            &self.pessimum.max,
        ] {
            if corner.len() != dims {
                return Err(HabitatError::config(
                    name,
                    format!("expected {dims} niche values, got {}", corner.len()),
                ));
            }
            if !corner.is_finite() {
                return Err(HabitatError::config(name, "niche values must be finite"));
            }
        }

        for (i, variable) in variables.iter().enumerate() {
            let points = [
                self.pessimum.min[i],
                self.optimum.min[i],
                self.optimum.max[i],
                self.pessimum.max[i],
            ];
            if !points.is_sorted() {
                return Err(HabitatError::config(
                    name,
                    format!(
                        "niche for {} must satisfy pess_min <= opt_min <= opt_max <= pess_max",
                        variable.id
                    ),
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.initial_state) {
            return Err(HabitatError::config(
                name,
                "initial_state must be between 0 and 1",
            ));
        }

        if let Some(life_history) = &self.life_history {
            let LifeHistory {
                growth_rate,
                mortality_rate,
            } = *life_history;
            if !(growth_rate.is_finite() && growth_rate >= 0.0) {
                return Err(HabitatError::config(
                    name,
                    "growth_rate must be a finite, non-negative number",
                ));
            }
            if !(mortality_rate.is_finite() && mortality_rate >= 0.0) {
                return Err(HabitatError::config(
                    name,
                    "mortality_rate must be a finite, non-negative number",
                ));
            }
            // Keeps every update a convex combination of the old state and the suitability
            if dt * (growth_rate + mortality_rate) > 1.0 {
                return Err(HabitatError::config(
                    name,
                    format!("growth_rate + mortality_rate must not exceed 1/dt (dt = {dt})"),
                ));
            }
        }

        Ok(())
    }
}
