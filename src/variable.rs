//! Driver variables define the dimensions of the environmental space.
//!
//! Every [`DriverVector`] holds one value per variable, in the order in which the variables were
//! defined.
use crate::driver::DriverVector;
use crate::error::{HabitatError, HabitatResult, entity};
use crate::id::{define_id_getter, define_id_type};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;

define_id_type! {VariableID}

/// Represents a single environmental driver variable (e.g. base saturation or soil moisture)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Variable {
    /// Short name of the variable (e.g. "BS")
    pub id: VariableID,
    /// A longer description (e.g. "Base saturation")
    pub description: String,
    /// Lower end of the plausible range
    pub min: f64,
    /// Upper end of the plausible range
    pub max: f64,
}
define_id_getter! {Variable, VariableID}

impl Variable {
    /// The absolute tolerance used when comparing values of this variable
    pub fn error_tolerance(&self) -> f64 {
        1e-12 * (self.max - self.min)
    }
}

/// The ordered set of driver variables of a model
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSet(IndexMap<VariableID, Variable>);

impl VariableSet {
    /// Create a new [`VariableSet`], checking that the variables are well defined
    pub fn new<I>(variables: I) -> HabitatResult<Self>
    where
        I: IntoIterator<Item = Variable>,
    {
        let mut map = IndexMap::new();
        for variable in variables {
            let name = entity("variable", &variable.id);
            if !(variable.min.is_finite() && variable.max.is_finite()) {
                return Err(HabitatError::data(name, "range must be finite"));
            }
            if variable.min >= variable.max {
                return Err(HabitatError::data(name, "min must be less than max"));
            }
            if map.insert(variable.id.clone(), variable).is_some() {
                return Err(HabitatError::data(name, "duplicate variable"));
            }
        }

        if map.is_empty() {
            return Err(HabitatError::data("variables", "no variables defined"));
        }

        Ok(Self(map))
    }

    /// The number of dimensions of a driver vector
    pub fn dims(&self) -> usize {
        self.0.len()
    }

    /// The position of the given variable in a driver vector
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.0.get_index_of(id)
    }

    /// Iterate over the variables in order
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.0.values()
    }

    /// Iterate over the variable IDs in order
    pub fn ids(&self) -> impl Iterator<Item = &VariableID> {
        self.0.keys()
    }

    /// Get a variable by its position
    pub fn get_index(&self, index: usize) -> Option<&Variable> {
        self.0.get_index(index).map(|(_, variable)| variable)
    }

    /// The per-variable error tolerances as a driver vector.
    ///
    /// This sets the resolution of the association optimum search.
    pub fn calc_accuracy(&self) -> DriverVector {
        self.iter().map(Variable::error_tolerance).collect()
    }
}

impl fmt::Display for VariableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.0.keys().map(|id| &*id.0).collect();
        write!(f, "[{}]", ids.join(","))
    }
}
