//! The community of species tracked at a single site and its evolution over time.
use crate::association::algebraic_gamma;
use crate::driver::DriverVector;
use crate::error::{HabitatError, HabitatResult};
use crate::species::{Species, SpeciesID};
use std::sync::Arc;

const ENTITY: &str = "community";

/// The lifecycle of a [`Community`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No species have been assigned yet
    Uninitialized,
    /// Species assigned and state seeded, but no step taken
    Initialized,
    /// At least one step has been taken
    Stepping {
        /// The index of the next step
        next_step: usize,
    },
    /// The run is finished and the trajectory can be reported
    Completed,
}

/// The outcome of one time step
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Index of the step
    pub step: usize,
    /// Suitability of the site for each tracked species
    pub suitability: Vec<f64>,
    /// Occurrence state of each tracked species at the end of the step
    pub state: Vec<f64>,
    /// Possibility of the whole community, combined with the algebraic gamma operator
    pub possibility: f64,
}

/// The species tracked at a site, with their current state and trajectory
#[derive(Debug, Clone)]
pub struct Community {
    species: Vec<Arc<Species>>,
    state: Vec<f64>,
    gamma: f64,
    trajectory: Vec<StepRecord>,
    lifecycle: Lifecycle,
}

impl Default for Community {
    fn default() -> Self {
        Self::new()
    }
}

impl Community {
    /// Create a community with no species
    pub fn new() -> Self {
        Self {
            species: Vec::new(),
            state: Vec::new(),
            gamma: 0.0,
            trajectory: Vec::new(),
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    /// Assign the species to track and seed their state.
    ///
    /// Any previous trajectory is discarded, so this also resets a completed community.
    ///
    /// # Arguments
    ///
    /// * `species` - The species to track; fixed until the next call
    /// * `gamma` - Gamma of the operator combining species into the community possibility
    pub fn initialize(&mut self, species: Vec<Arc<Species>>, gamma: f64) -> HabitatResult<()> {
        if species.is_empty() {
            return Err(HabitatError::config(ENTITY, "no species to track"));
        }

        self.state = species.iter().map(|species| species.initial_state).collect();
        self.species = species;
        self.gamma = gamma;
        self.trajectory.clear();
        self.lifecycle = Lifecycle::Initialized;

        Ok(())
    }

    /// Advance the community by one time step.
    ///
    /// The state is only updated if every species produces a valid value.
    ///
    /// # Arguments
    ///
    /// * `drivers` - The site conditions during this step
    /// * `dt` - Length of the time step
    pub fn step(&mut self, drivers: &DriverVector, dt: f64) -> HabitatResult<&StepRecord> {
        let step = match self.lifecycle {
            Lifecycle::Initialized => 0,
            Lifecycle::Stepping { next_step } => next_step,
            Lifecycle::Uninitialized => {
                return Err(HabitatError::state(ENTITY, "step called before initialize"));
            }
            Lifecycle::Completed => {
                return Err(HabitatError::state(ENTITY, "step called after completion"));
            }
        };

        let mut suitability = Vec::with_capacity(self.species.len());
        let mut state = Vec::with_capacity(self.species.len());
        for (species, &current) in self.species.iter().zip(&self.state) {
            let value = species.suitability(drivers);
            if !(0.0..=1.0).contains(&value) {
                return Err(HabitatError::Numeric {
                    species: species.id.clone(),
                    step,
                    value,
                });
            }
            state.push(species.update_state(current, value, dt, step)?);
            suitability.push(value);
        }

        let possibility = algebraic_gamma(suitability.iter().copied(), self.gamma);
        self.state.clone_from(&state);
        self.trajectory.push(StepRecord {
            step,
            suitability,
            state,
            possibility,
        });
        self.lifecycle = Lifecycle::Stepping {
            next_step: step + 1,
        };

        Ok(&self.trajectory[step])
    }

    /// Mark the run as finished
    pub fn complete(&mut self) -> HabitatResult<()> {
        match self.lifecycle {
            Lifecycle::Initialized | Lifecycle::Stepping { .. } => {
                self.lifecycle = Lifecycle::Completed;
                Ok(())
            }
            Lifecycle::Uninitialized => Err(HabitatError::state(
                ENTITY,
                "cannot complete an uninitialized community",
            )),
            Lifecycle::Completed => Err(HabitatError::state(ENTITY, "already completed")),
        }
    }

    /// The current lifecycle stage
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Whether the run has finished
    pub fn is_completed(&self) -> bool {
        self.lifecycle == Lifecycle::Completed
    }

    /// The tracked species
    pub fn species(&self) -> &[Arc<Species>] {
        &self.species
    }

    /// The IDs of the tracked species, in state order
    pub fn species_ids(&self) -> impl Iterator<Item = &SpeciesID> {
        self.species.iter().map(|species| &species.id)
    }

    /// The current state of each tracked species
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// All steps taken so far
    pub fn trajectory(&self) -> &[StepRecord] {
        &self.trajectory
    }

    /// The state of a single species at every step taken so far
    pub fn species_trajectory(&self, id: &str) -> Option<Vec<f64>> {
        let index = self.species.iter().position(|species| &*species.id.0 == id)?;
        Some(
            self.trajectory
                .iter()
                .map(|record| record.state[index])
                .collect(),
        )
    }
}
