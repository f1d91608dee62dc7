use std::sync::Arc;

use ndarray::{ArrayViewMutD, Zip};

use crate::{
    coord::Coord,
    element::Element,
    errors::{Error, Result},
    factory::{Dependencies, Factory, Formula, Role, Terms},
    units::Unit,
};

/// Hybrid pressure: `p = ap + b * ps`
///
/// Derives air pressure from a pressure offset (delta, `ap`), a dimensionless pressure
/// coefficient (sigma, `b`) and the surface air pressure (`ps`). If a reference air pressure is
/// given, delta is a dimensionless coefficient instead, and `ap = delta * reference`. At least
/// one of delta or surface air pressure is needed.
///
pub struct HybridPressure;

/// A factory deriving air pressure from hybrid pressure levels
pub type HybridPressureFactory<F> = Factory<F, HybridPressure>;

impl Formula for HybridPressure {
    const NAME: &'static str = "HybridPressureFactory";
    const ROLES: &'static [Role] = &[
        Role::Delta,
        Role::Sigma,
        Role::SurfaceAirPressure,
        Role::ReferenceAirPressure,
    ];
    const STANDARD_NAME: &'static str = "air_pressure";

    fn units<F: Element>(dependencies: &Dependencies<F>) -> Result<Unit> {
        let delta = dependencies.get(Role::Delta);
        let sigma = dependencies.get(Role::Sigma);
        let surface = dependencies.get(Role::SurfaceAirPressure);
        let reference = dependencies.get(Role::ReferenceAirPressure);

        if delta.is_none() && surface.is_none() {
            return Err(Error::InsufficientDependencies {
                factory: Self::NAME,
                reason: "at least one of delta or surface_air_pressure is needed",
            });
        }

        if let Some(sigma) = sigma {
            if !sigma.units().is_dimensionless() {
                return Err(Error::InvalidUnits(format!(
                    "sigma must be dimensionless, not {}",
                    sigma.units()
                )));
            }
        }

        match reference {
            Some(reference) => {
                if let Some(delta) = delta {
                    if !delta.units().is_dimensionless() {
                        return Err(Error::InvalidUnits(format!(
                            "delta must be dimensionless when a reference pressure is given, \
                             not {}",
                            delta.units()
                        )));
                    }
                }
                if let Some(surface) = surface {
                    if surface.units() != reference.units() {
                        return Err(Error::IncompatibleUnits(format!(
                            "surface_air_pressure and reference_air_pressure must have the same \
                             units, not {} and {}",
                            surface.units(),
                            reference.units()
                        )));
                    }
                }
            }
            None => {
                if let (Some(delta), Some(surface)) = (delta, surface) {
                    if delta.units() != surface.units() {
                        return Err(Error::IncompatibleUnits(format!(
                            "delta and surface_air_pressure must have the same units, not {} \
                             and {}",
                            delta.units(),
                            surface.units()
                        )));
                    }
                }
            }
        }

        let units = reference
            .or(delta)
            .or(surface)
            .map(|coord| coord.units().clone())
            .unwrap_or_else(Unit::dimensionless);

        if !units.is_convertible(&Unit::new("Pa")) {
            return Err(Error::InvalidUnits(format!(
                "derived air pressure units must be convertible to Pa, not {units}"
            )));
        }

        Ok(units)
    }

    /// A missing reference pressure leaves delta as it is.
    fn absent<F: Element>(role: Role) -> F {
        match role {
            Role::ReferenceAirPressure => F::one(),
            _ => F::zero(),
        }
    }

    fn combine<F: Element>(out: ArrayViewMutD<F>, terms: &Terms<F>) {
        Zip::from(out)
            .and(&terms[Role::Delta])
            .and(&terms[Role::Sigma])
            .and(&terms[Role::SurfaceAirPressure])
            .and(&terms[Role::ReferenceAirPressure])
            .for_each(|p, &delta, &sigma, &surface, &reference| {
                *p = delta * reference + sigma * surface
            });
    }
}

impl<F> Factory<F, HybridPressure>
where
    F: Element,
{
    /// Create a hybrid pressure factory.
    ///
    /// Any dependency may be ``None``, as long as one of `delta` or `surface_air_pressure` is
    /// given. Sigma must be dimensionless. Without a reference pressure, delta and surface air
    /// pressure must have the same units. With one, delta must be dimensionless and the surface
    /// and reference pressures must have the same units. Either way the resulting units must be
    /// convertible to pascals.
    ///
    pub fn new(
        delta: Option<Arc<Coord<F>>>,
        sigma: Option<Arc<Coord<F>>>,
        surface_air_pressure: Option<Arc<Coord<F>>>,
        reference_air_pressure: Option<Arc<Coord<F>>>,
    ) -> Result<Self> {
        Self::from_dependencies([
            (Role::Delta, delta),
            (Role::Sigma, sigma),
            (Role::SurfaceAirPressure, surface_air_pressure),
            (Role::ReferenceAirPressure, reference_air_pressure),
        ])
    }

    pub fn delta(&self) -> Option<&Arc<Coord<F>>> {
        self.dependency(Role::Delta)
    }

    pub fn sigma(&self) -> Option<&Arc<Coord<F>>> {
        self.dependency(Role::Sigma)
    }

    pub fn surface_air_pressure(&self) -> Option<&Arc<Coord<F>>> {
        self.dependency(Role::SurfaceAirPressure)
    }

    pub fn reference_air_pressure(&self) -> Option<&Arc<Coord<F>>> {
        self.dependency(Role::ReferenceAirPressure)
    }
}
