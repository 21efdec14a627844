//! Driver vectors: points in the environmental space spanned by the model's variables.
use crate::variable::VariableSet;
use float_cmp::approx_eq;
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, Div, Index, IndexMut, Mul, Sub};

/// One value per driver variable, in [`VariableSet`] order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriverVector(Vec<f64>);

impl DriverVector {
    /// Create a new driver vector from raw values
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// The number of dimensions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector has no dimensions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the values
    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    /// Whether every value is finite
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Whether two vectors are equal within the error tolerance of each variable
    pub fn approx_eq(&self, other: &Self, variables: &VariableSet) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .zip(variables.iter())
                .all(|((&a, &b), var)| approx_eq!(f64, a, b, epsilon = var.error_tolerance()))
    }

    /// The midpoint between two vectors
    pub fn center(a: &Self, b: &Self) -> Self {
        (a + b) * 0.5
    }

    /// Element-wise minimum
    pub fn min(a: &Self, b: &Self) -> Self {
        a.zip_with(b, f64::min)
    }

    /// Element-wise maximum
    pub fn max(a: &Self, b: &Self) -> Self {
        a.zip_with(b, f64::max)
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        self.iter().zip(other.iter()).map(|(&a, &b)| f(a, b)).collect()
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        self.iter().map(|&v| f(v)).collect()
    }
}

impl FromIterator<f64> for DriverVector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<f64>> for DriverVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl Index<usize> for DriverVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for DriverVector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl Add for &DriverVector {
    type Output = DriverVector;

    fn add(self, rhs: &DriverVector) -> DriverVector {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for &DriverVector {
    type Output = DriverVector;

    fn sub(self, rhs: &DriverVector) -> DriverVector {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul<f64> for &DriverVector {
    type Output = DriverVector;

    fn mul(self, scalar: f64) -> DriverVector {
        self.map(|v| v * scalar)
    }
}

impl Mul<f64> for DriverVector {
    type Output = DriverVector;

    fn mul(self, scalar: f64) -> DriverVector {
        &self * scalar
    }
}

impl Div<f64> for &DriverVector {
    type Output = DriverVector;

    fn div(self, scalar: f64) -> DriverVector {
        self.map(|v| v / scalar)
    }
}

impl fmt::Display for DriverVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", values.join(", "))
    }
}

/// An axis-aligned box in the environmental space
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRange {
    /// The lower corner
    pub min: DriverVector,
    /// The upper corner
    pub max: DriverVector,
}

impl DriverRange {
    /// Create a new range
    pub fn new(min: DriverVector, max: DriverVector) -> Self {
        Self { min, max }
    }

    /// The midpoint of the range
    pub fn center(&self) -> DriverVector {
        DriverVector::center(&self.min, &self.max)
    }

    /// Whether the point lies within the range in every dimension (bounds inclusive)
    pub fn contains(&self, point: &DriverVector) -> bool {
        point.len() == self.min.len()
            && point
                .iter()
                .zip(self.min.iter().zip(self.max.iter()))
                .all(|(v, (lo, hi))| v >= lo && v <= hi)
    }
}

/// Intersection
impl BitAnd for &DriverRange {
    type Output = DriverRange;

    fn bitand(self, rhs: &DriverRange) -> DriverRange {
        DriverRange {
            min: DriverVector::max(&self.min, &rhs.min),
            max: DriverVector::min(&self.max, &rhs.max),
        }
    }
}

/// Union (bounding box)
impl BitOr for &DriverRange {
    type Output = DriverRange;

    fn bitor(self, rhs: &DriverRange) -> DriverRange {
        DriverRange {
            min: DriverVector::min(&self.min, &rhs.min),
            max: DriverVector::max(&self.max, &rhs.max),
        }
    }
}

/// Derive a soil moisture index in [0, 1] from field capacity and groundwater depth.
///
/// Groundwater deeper than 1.5 m is not relevant for plants, and an accessible field capacity
/// above 30 % does not add further moisture. Without groundwater influence the index cannot exceed
/// 0.4.
///
/// # Arguments
///
/// * `accessible_field_capacity` - Plant accessible field capacity (%)
/// * `groundwater_table` - Depth of the groundwater table below ground (m)
pub fn calculate_wetness_index(accessible_field_capacity: f64, groundwater_table: f64) -> f64 {
    let groundwater_index = (1.0 - groundwater_table / 1.5).max(0.0);
    let capacity_index = (accessible_field_capacity / 30.0).clamp(0.0, 1.0);
    groundwater_index.max(capacity_index * 0.4)
}
