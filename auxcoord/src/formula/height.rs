use std::sync::Arc;

use ndarray::{ArrayViewMutD, Zip};

use crate::{
    coord::Coord,
    element::Element,
    errors::{Error, Result},
    factory::{Dependencies, Factory, Formula, Role, Terms},
    metadata::Attributes,
    units::Unit,
};

/// Hybrid height: `z = a + b * orog`
///
/// Derives altitude from a height offset (delta, `a`), a dimensionless height coefficient (sigma,
/// `b`) and the height of the surface (orography). At least one of delta or orography is needed.
///
pub struct HybridHeight;

/// A factory deriving altitude from hybrid height levels
pub type HybridHeightFactory<F> = Factory<F, HybridHeight>;

impl Formula for HybridHeight {
    const NAME: &'static str = "HybridHeightFactory";
    const ROLES: &'static [Role] = &[Role::Delta, Role::Sigma, Role::Orography];
    const STANDARD_NAME: &'static str = "altitude";

    fn attributes() -> Attributes {
        Attributes::from([(String::from("positive"), String::from("up"))])
    }

    fn units<F: Element>(dependencies: &Dependencies<F>) -> Result<Unit> {
        let delta = dependencies.get(Role::Delta);
        let orography = dependencies.get(Role::Orography);

        let units = match (delta, orography) {
            (None, None) => {
                return Err(Error::InsufficientDependencies {
                    factory: Self::NAME,
                    reason: "at least one of delta or orography is needed",
                })
            }
            (Some(delta), Some(orography)) => {
                if delta.units() != orography.units() {
                    return Err(Error::IncompatibleUnits(format!(
                        "delta and orography must have the same units, not {} and {}",
                        delta.units(),
                        orography.units()
                    )));
                }
                delta.units()
            }
            (Some(coord), None) | (None, Some(coord)) => coord.units(),
        };

        if !units.is_convertible(&Unit::new("m")) {
            return Err(Error::InvalidUnits(format!(
                "derived altitude units must be convertible to m, not {units}"
            )));
        }

        Ok(units.clone())
    }

    fn combine<F: Element>(out: ArrayViewMutD<F>, terms: &Terms<F>) {
        Zip::from(out)
            .and(&terms[Role::Delta])
            .and(&terms[Role::Sigma])
            .and(&terms[Role::Orography])
            .for_each(|z, &delta, &sigma, &orography| *z = delta + sigma * orography);
    }
}

impl<F> Factory<F, HybridHeight>
where
    F: Element,
{
    /// Create a hybrid height factory.
    ///
    /// Any dependency may be ``None``, as long as one of `delta` or `orography` is given. Delta and
    /// orography must have the same units, convertible to metres. Delta and sigma may have two
    /// bounds per point or none. Bounds on orography are disregarded, with a warning.
    ///
    pub fn new(
        delta: Option<Arc<Coord<F>>>,
        sigma: Option<Arc<Coord<F>>>,
        orography: Option<Arc<Coord<F>>>,
    ) -> Result<Self> {
        Self::from_dependencies([
            (Role::Delta, delta),
            (Role::Sigma, sigma),
            (Role::Orography, orography),
        ])
    }

    pub fn delta(&self) -> Option<&Arc<Coord<F>>> {
        self.dependency(Role::Delta)
    }

    pub fn sigma(&self) -> Option<&Arc<Coord<F>>> {
        self.dependency(Role::Sigma)
    }

    pub fn orography(&self) -> Option<&Arc<Coord<F>>> {
        self.dependency(Role::Orography)
    }
}
