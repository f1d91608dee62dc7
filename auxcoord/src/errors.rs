use std::result;

use ndarray::ShapeError;
use thiserror::Error;

use crate::factory::Role;

#[derive(Debug, Error)]
pub enum Error {
    /// Not enough dependencies were given for the formula to produce a value.
    #[error("unable to construct {factory}: insufficient source coordinates ({reason})")]
    InsufficientDependencies {
        factory: &'static str,
        reason: &'static str,
    },

    #[error("invalid {role} coordinate: must have either 0 or 2 bounds, found {nbounds}")]
    InvalidBoundsCount { role: Role, nbounds: usize },

    /// Raised when derived bounds are materialized from a malformed operand.
    #[error("invalid {role} coordinate bounds: trailing axis has size {size}")]
    InvalidBounds { role: Role, size: usize },

    #[error("incompatible units: {0}")]
    IncompatibleUnits(String),

    #[error("invalid units: {0}")]
    InvalidUnits(String),

    #[error("{role} is not a dependency of {factory}")]
    UnknownRole { factory: &'static str, role: Role },

    #[error("failed to update dependencies: {0}")]
    Update(Box<Error>),

    #[error("no replacement given for {role} coordinate {name:?}")]
    MissingMapping { role: Role, name: String },

    #[error("coordinate {name:?} with shape {shape:?} cannot be mapped to dimensions {dims:?}")]
    DimensionMismatch {
        name: String,
        shape: Vec<usize>,
        dims: Vec<usize>,
    },

    #[error("bounds shape {bounds:?} does not match points shape {points:?}")]
    BoundsShape {
        points: Vec<usize>,
        bounds: Vec<usize>,
    },

    #[error("cannot broadcast {role} with shape {from:?} to shape {to:?}")]
    Broadcast {
        role: Role,
        from: Vec<usize>,
        to: Vec<usize>,
    },

    /// A lazy array's producer was already used up without caching a result.
    #[error("lazy array producer was released")]
    Released,

    #[error("lazy array produced shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

pub type Result<T> = result::Result<T, Error>;
