mod coord;
mod element;
mod errors;
mod factory;
mod formula;
mod lazy;
mod metadata;
pub mod remap;
mod units;

#[cfg(test)]
mod testing;

pub use coord::Coord;
pub use coord::CoordId;
pub use coord::Values;

pub use element::Element;

pub use errors::Error;
pub use errors::Result;

pub use factory::AuxCoordFactory;
pub use factory::CoordDims;
pub use factory::CoordMapping;
pub use factory::Dependencies;
pub use factory::Factory;
pub use factory::Formula;
pub use factory::Role;
pub use factory::Terms;

pub use formula::HybridHeight;
pub use formula::HybridHeightFactory;
pub use formula::HybridPressure;
pub use formula::HybridPressureFactory;

pub use lazy::LazyArray;

pub use metadata::Attributes;
pub use metadata::CoordMetadata;
pub use metadata::CoordSystem;

pub use units::Quantity;
pub use units::Unit;
