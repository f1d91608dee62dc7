//! Units of measure, as far as derived coordinates need to know about them.
//!
//! Converting values between units is not done here. Units are only classified by the physical
//! quantity they measure, which is enough to check whether a formula's inputs make sense.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The physical quantity measured by a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quantity {
    Dimensionless,
    Length,
    Pressure,

    /// Anything not recognized. Never convertible to anything but itself.
    Unknown,
}

/// Known unit symbols, with their canonical spelling and the quantity they measure.
const KNOWN: &[(&[&str], &str, Quantity)] = &[
    (&["1", "", "dimensionless", "unitless"], "1", Quantity::Dimensionless),
    (&["%", "percent"], "%", Quantity::Dimensionless),
    (&["m", "metre", "metres", "meter", "meters"], "m", Quantity::Length),
    (&["km", "kilometre", "kilometres", "kilometer", "kilometers"], "km", Quantity::Length),
    (&["cm", "centimetre", "centimetres"], "cm", Quantity::Length),
    (&["mm", "millimetre", "millimetres"], "mm", Quantity::Length),
    (&["ft", "foot", "feet"], "ft", Quantity::Length),
    (&["mi", "mile", "miles"], "mi", Quantity::Length),
    (&["Pa", "pascal", "pascals"], "Pa", Quantity::Pressure),
    (&["hPa", "hectopascal", "hectopascals"], "hPa", Quantity::Pressure),
    (&["kPa", "kilopascal", "kilopascals"], "kPa", Quantity::Pressure),
    (&["mbar", "millibar", "millibars", "mb"], "mbar", Quantity::Pressure),
    (&["bar", "bars"], "bar", Quantity::Pressure),
    (&["atm", "atmosphere", "atmospheres"], "atm", Quantity::Pressure),
];

/// A unit of measure, identified by its symbol.
///
/// Aliases of the same unit ("m", "metre", "meters") compare equal. Different units of the same
/// quantity ("m" and "ft") do not compare equal, but are convertible.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Unit {
    symbol: String,
}

impl Unit {
    pub fn new(symbol: &str) -> Self {
        let symbol = symbol.trim();
        let symbol = match lookup(symbol) {
            Some((canonical, _)) => canonical.to_string(),
            None => symbol.to_string(),
        };

        Self { symbol }
    }

    pub fn dimensionless() -> Self {
        Self::new("1")
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quantity(&self) -> Quantity {
        match lookup(&self.symbol) {
            Some((_, quantity)) => quantity,
            None => Quantity::Unknown,
        }
    }

    pub fn is_dimensionless(&self) -> bool {
        self.quantity() == Quantity::Dimensionless
    }

    /// Whether values in this unit could be converted to `other`.
    pub fn is_convertible(&self, other: &Unit) -> bool {
        match self.quantity() {
            Quantity::Unknown => self == other,
            quantity => quantity == other.quantity(),
        }
    }
}

fn lookup(symbol: &str) -> Option<(&'static str, Quantity)> {
    KNOWN
        .iter()
        .find(|(aliases, _, _)| aliases.contains(&symbol))
        .map(|&(_, canonical, quantity)| (canonical, quantity))
}

impl From<&str> for Unit {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Unit {
    fn from(symbol: String) -> Self {
        Self::new(&symbol)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.symbol
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}
