use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::units::Unit;

pub type Attributes = BTreeMap<String, String>;

/// The coordinate reference system a coordinate is expressed in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordSystem {
    pub grid_mapping_name: String,

    /// Numeric parameters of the grid mapping, eg `semi_major_axis`
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl CoordSystem {
    pub fn new(grid_mapping_name: &str) -> Self {
        Self {
            grid_mapping_name: grid_mapping_name.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }
}

/// Descriptive metadata carried by coordinates and by the factories which make them.
///
/// Field names follow the CF conventions, since serializers downstream rely on them.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordMetadata {
    pub standard_name: Option<String>,
    pub long_name: Option<String>,
    pub var_name: Option<String>,
    pub units: Unit,
    pub attributes: Attributes,
    pub coord_system: Option<CoordSystem>,
}

impl CoordMetadata {
    pub fn new(units: impl Into<Unit>) -> Self {
        Self {
            standard_name: None,
            long_name: None,
            var_name: None,
            units: units.into(),
            attributes: Attributes::new(),
            coord_system: None,
        }
    }

    pub fn with_standard_name(mut self, standard_name: &str) -> Self {
        self.standard_name = Some(standard_name.to_string());
        self
    }

    pub fn with_long_name(mut self, long_name: &str) -> Self {
        self.long_name = Some(long_name.to_string());
        self
    }

    pub fn with_var_name(mut self, var_name: &str) -> Self {
        self.var_name = Some(var_name.to_string());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_coord_system(mut self, coord_system: CoordSystem) -> Self {
        self.coord_system = Some(coord_system);
        self
    }

    /// The most descriptive name available: standard name, then long name, then variable name.
    pub fn name(&self) -> &str {
        self.standard_name
            .as_deref()
            .or(self.long_name.as_deref())
            .or(self.var_name.as_deref())
            .unwrap_or("unknown")
    }
}
