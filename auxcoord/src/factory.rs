//! Factories which manufacture derived coordinates on demand.
//!
//! A factory combines the values of other coordinates, its dependencies, using a formula. Each
//! dependency fills a named role in the formula. The coordinates a factory makes have lazy points
//! and bounds, which are only computed when first read.
//!
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    marker::PhantomData,
    ops::Index,
    sync::Arc,
};

use ndarray::{ArcArray, ArrayD, ArrayViewD, ArrayViewMutD, IxDyn};

use crate::{
    coord::{Coord, CoordId, Values},
    element::Element,
    errors::{Error, Result},
    lazy::LazyArray,
    metadata::{Attributes, CoordMetadata, CoordSystem},
    remap,
    units::Unit,
};

/// A named slot in a formula, filled by a dependency coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Delta,
    Sigma,
    Orography,
    SurfaceAirPressure,
    ReferenceAirPressure,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delta => "delta",
            Self::Sigma => "sigma",
            Self::Orography => "orography",
            Self::SurfaceAirPressure => "surface_air_pressure",
            Self::ReferenceAirPressure => "reference_air_pressure",
        }
    }

    /// Whether a dependency in this role has its bounds used when deriving bounds.
    ///
    /// Bounds on dependencies in other roles are disregarded.
    ///
    pub fn contributes_bounds(&self) -> bool {
        matches!(self, Self::Delta | Self::Sigma)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback a host provides to look up which of its dimensions a coordinate spans.
pub type CoordDims<'a, F> = dyn Fn(&Arc<Coord<F>>) -> Vec<usize> + 'a;

/// Replacement coordinates, keyed by the identity of the coordinates they replace.
pub type CoordMapping<F> = HashMap<CoordId, Arc<Coord<F>>>;

/// The dependencies of a factory: a fixed set of roles, each bound to a coordinate or absent.
///
#[derive(Clone)]
pub struct Dependencies<F>
where
    F: Element,
{
    slots: Vec<(Role, Option<Arc<Coord<F>>>)>,
}

impl<F> Dependencies<F>
where
    F: Element,
{
    pub(crate) fn new(roles: &[Role]) -> Self {
        Self {
            slots: roles.iter().map(|&role| (role, None)).collect(),
        }
    }

    /// Get the coordinate bound to `role`, if any.
    pub fn get(&self, role: Role) -> Option<&Arc<Coord<F>>> {
        self.slots
            .iter()
            .find(|(slot, _)| *slot == role)
            .and_then(|(_, coord)| coord.as_ref())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.slots.iter().any(|(slot, _)| *slot == role)
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.slots.iter().map(|(role, _)| *role)
    }

    /// Iterate over all roles, with their coordinates if bound
    pub fn iter(&self) -> impl Iterator<Item = (Role, Option<&Arc<Coord<F>>>)> {
        self.slots.iter().map(|(role, coord)| (*role, coord.as_ref()))
    }

    /// Iterate over bound roles only
    pub fn present(&self) -> impl Iterator<Item = (Role, &Arc<Coord<F>>)> {
        self.slots
            .iter()
            .filter_map(|(role, coord)| coord.as_ref().map(|coord| (*role, coord)))
    }

    pub(crate) fn bind(
        &mut self,
        factory: &'static str,
        role: Role,
        coord: Option<Arc<Coord<F>>>,
    ) -> Result<()> {
        match self.slots.iter_mut().find(|(slot, _)| *slot == role) {
            Some((_, slot)) => {
                *slot = coord;
                Ok(())
            }
            None => Err(Error::UnknownRole { factory, role }),
        }
    }

    /// Roles currently bound to this very coordinate object.
    pub(crate) fn roles_holding(&self, coord: &Arc<Coord<F>>) -> Vec<Role> {
        self.present()
            .filter(|(_, bound)| Arc::ptr_eq(bound, coord))
            .map(|(role, _)| role)
            .collect()
    }
}

impl<F> fmt::Debug for Dependencies<F>
where
    F: Element,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .map(|(role, coord)| (role.name(), coord.map(|coord| coord.name()))),
            )
            .finish()
    }
}

/// The operands of a formula, broadcast to the shape of the result.
///
/// There is one term for every role in the formula's ``ROLES``, present or not. Indexing by any
/// other role panics. Use ``get`` where that isn't known in advance.
///
pub struct Terms<'a, F> {
    terms: Vec<(Role, ArrayViewD<'a, F>)>,
}

impl<'a, F> Terms<'a, F> {
    pub fn get(&self, role: Role) -> Option<&ArrayViewD<'a, F>> {
        self.terms
            .iter()
            .find(|(term, _)| *term == role)
            .map(|(_, view)| view)
    }
}

impl<'a, F> Index<Role> for Terms<'a, F> {
    type Output = ArrayViewD<'a, F>;

    fn index(&self, role: Role) -> &Self::Output {
        match self.get(role) {
            Some(view) => view,
            None => panic!("No {role} term"),
        }
    }
}

/// A formula for deriving coordinate values from dependencies.
///
/// Implementations are stateless type tags; the state lives in a ``Factory``.
///
pub trait Formula: Send + Sync + 'static {
    /// Name of the factory type, used when displaying factories
    const NAME: &'static str;

    /// The roles dependencies can fill, in the formula's order
    const ROLES: &'static [Role];

    /// Standard name of derived coordinates
    const STANDARD_NAME: &'static str;

    /// Attributes of derived coordinates
    fn attributes() -> Attributes {
        Attributes::new()
    }

    /// Check formula specific preconditions on the dependencies and work out the units of derived
    /// coordinates.
    fn units<F: Element>(dependencies: &Dependencies<F>) -> Result<Unit>;

    /// Value used in place of an absent dependency.
    fn absent<F: Element>(_role: Role) -> F {
        F::zero()
    }

    /// Combine the terms elementwise, writing the result to `out`.
    ///
    /// All terms have the same shape as `out`. `terms` holds exactly the roles in ``ROLES``, so
    /// indexing it by any other role panics while values are being read.
    ///
    fn combine<F: Element>(out: ArrayViewMutD<F>, terms: &Terms<F>);
}

/// Manufactures derived coordinates on demand.
///
/// Object safe, so a host may keep factories for different formulas together.
///
pub trait AuxCoordFactory<F>: fmt::Display + Send + Sync
where
    F: Element,
{
    /// Metadata copied to every coordinate this factory makes
    fn metadata(&self) -> &CoordMetadata;

    fn dependencies(&self) -> &Dependencies<F>;

    /// Name of the coordinates this factory makes
    fn name(&self) -> &str {
        self.metadata().name()
    }

    /// The host dimensions spanned by derived coordinates: the sorted union of the dimensions
    /// spanned by the dependencies.
    ///
    /// eg If sigma -> [1] and orography -> [2, 3] then result = [1, 2, 3]
    ///
    fn derived_dims(&self, coord_dims: &CoordDims<'_, F>) -> Vec<usize> {
        let dims: BTreeSet<usize> = self
            .dependencies()
            .present()
            .flat_map(|(_, coord)| coord_dims(coord))
            .collect();

        dims.into_iter().collect()
    }

    /// Make a new derived coordinate.
    ///
    /// Points, and bounds if delta or sigma have bounds, are lazy. Fails straight away if the
    /// dimensions reported for a dependency can't describe it. Any other problem is reported when
    /// values are read.
    ///
    fn make_coord(&self, coord_dims: &CoordDims<'_, F>) -> Result<Coord<F>>;

    /// Notify the factory of the removal or replacement of a coordinate.
    ///
    /// Any dependency using `old_coord` is removed if `new_coord` is ``None``, otherwise it is
    /// updated to use `new_coord`. Coordinates that aren't dependencies are ignored. If the
    /// resulting dependencies aren't valid for the formula, an error is returned and the factory
    /// is left unchanged.
    ///
    fn update(&mut self, old_coord: &Arc<Coord<F>>, new_coord: Option<Arc<Coord<F>>>)
        -> Result<()>;

    /// Create a new factory for the same formula, with dependencies replaced according to
    /// `mapping`.
    ///
    fn updated(&self, mapping: &CoordMapping<F>) -> Result<Box<dyn AuxCoordFactory<F>>>;
}

/// A coordinate factory for formula `T`.
///
pub struct Factory<F, T>
where
    F: Element,
    T: Formula,
{
    metadata: CoordMetadata,
    dependencies: Dependencies<F>,
    formula: PhantomData<T>,
}

impl<F, T> Factory<F, T>
where
    F: Element,
    T: Formula,
{
    /// Create a factory from role bindings. Roles not mentioned are absent.
    ///
    pub fn from_dependencies<I>(bindings: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Role, Option<Arc<Coord<F>>>)>,
    {
        let mut dependencies = Dependencies::new(T::ROLES);
        for (role, coord) in bindings {
            dependencies.bind(T::NAME, role, coord)?;
        }

        Self::with_dependencies(dependencies, T::ROLES)
    }

    /// Validate `dependencies` and build a factory over them. Disregarded bounds are only
    /// reported for roles in `advise`.
    fn with_dependencies(dependencies: Dependencies<F>, advise: &[Role]) -> Result<Self> {
        let units = Self::check(&dependencies)?;
        Self::advise(&dependencies, advise);
        tracing::debug!(factory = T::NAME, %units, "created coordinate factory");

        let metadata = CoordMetadata {
            standard_name: Some(T::STANDARD_NAME.to_string()),
            long_name: None,
            var_name: None,
            units,
            attributes: T::attributes(),
            coord_system: None,
        };

        Ok(Self {
            metadata,
            dependencies,
            formula: PhantomData,
        })
    }

    /// Check dependencies against the shared rules, then the formula's own.
    fn check(dependencies: &Dependencies<F>) -> Result<Unit> {
        for (role, coord) in dependencies.present() {
            let nbounds = coord.nbounds();
            if role.contributes_bounds() && nbounds != 0 && nbounds != 2 {
                return Err(Error::InvalidBoundsCount { role, nbounds });
            }
        }

        T::units(dependencies)
    }

    /// Warn about bounds that won't be used, on dependencies in `roles`.
    fn advise(dependencies: &Dependencies<F>, roles: &[Role]) {
        for (role, coord) in dependencies.present() {
            if !role.contributes_bounds() && coord.has_bounds() && roles.contains(&role) {
                tracing::warn!(
                    factory = T::NAME,
                    "{} coordinate {:?} has bounds. These will be disregarded.",
                    role,
                    coord.name()
                );
            }
        }
    }

    /// Get the coordinate bound to `role`, if any.
    pub fn dependency(&self, role: Role) -> Option<&Arc<Coord<F>>> {
        self.dependencies.get(role)
    }

    pub fn standard_name(&self) -> &str {
        T::STANDARD_NAME
    }

    pub fn units(&self) -> &Unit {
        &self.metadata.units
    }

    pub fn attributes(&self) -> &Attributes {
        &self.metadata.attributes
    }

    /// Only affects coordinates made after the change.
    pub fn set_long_name(&mut self, long_name: Option<&str>) {
        self.metadata.long_name = long_name.map(str::to_string);
    }

    /// Only affects coordinates made after the change.
    pub fn set_var_name(&mut self, var_name: Option<&str>) {
        self.metadata.var_name = var_name.map(str::to_string);
    }

    /// Only affects coordinates made after the change.
    pub fn set_coord_system(&mut self, coord_system: Option<CoordSystem>) {
        self.metadata.coord_system = coord_system;
    }

    /// Create a new factory with dependencies replaced according to `mapping`.
    ///
    /// Every present dependency must have a replacement in `mapping`. The new factory is
    /// validated like any other and keeps this factory's names and coordinate system.
    ///
    pub fn with_remapped_dependencies(&self, mapping: &CoordMapping<F>) -> Result<Self> {
        let mut dependencies = Dependencies::new(T::ROLES);
        for (role, coord) in self.dependencies.iter() {
            let coord = match coord {
                Some(coord) => match mapping.get(&Coord::id(coord)) {
                    Some(replacement) => Some(Arc::clone(replacement)),
                    None => {
                        return Err(Error::MissingMapping {
                            role,
                            name: coord.name().to_string(),
                        })
                    }
                },
                None => None,
            };
            dependencies.bind(T::NAME, role, coord)?;
        }

        // Replacements stand in for coordinates already warned about
        let mut factory = Self::with_dependencies(dependencies, &[])?;
        factory.metadata.long_name = self.metadata.long_name.clone();
        factory.metadata.var_name = self.metadata.var_name.clone();
        factory.metadata.coord_system = self.metadata.coord_system.clone();

        Ok(factory)
    }

    /// Work out how each dependency is remapped to compute derived points, and if `bounded`,
    /// derived bounds.
    fn operands(
        &self,
        coord_dims: &CoordDims<'_, F>,
        derived_dims: &[usize],
        ndim: usize,
        bounded: bool,
    ) -> Result<Vec<Operand<F>>> {
        let mut operands = vec![];
        for (role, coord) in self.dependencies.iter() {
            let coord = match coord {
                Some(coord) => coord,
                None => {
                    operands.push(Operand {
                        role,
                        source: Source::Absent(T::absent(role)),
                        shape: vec![],
                    });
                    continue;
                }
            };

            let dims = coord_dims(coord);
            let nd_shape = remap::nd_shape(coord.shape(), &dims, ndim)
                .map_err(|_| dimension_mismatch(coord, &dims))?;

            let operand = match coord.bounds_values() {
                Some(bounds) if bounded && role.contributes_bounds() => {
                    let nd_shape = remap::nd_bounds_shape(bounds.shape(), &dims, ndim)
                        .map_err(|_| dimension_mismatch(coord, &dims))?;
                    Operand {
                        role,
                        source: Source::Bounds {
                            values: bounds.clone(),
                            dims,
                        },
                        shape: remap::narrowed_shape(
                            &nd_shape,
                            derived_dims,
                            Some(coord.nbounds()),
                        ),
                    }
                }
                bounds => {
                    if bounded && bounds.is_some() {
                        tracing::warn!(
                            factory = T::NAME,
                            "{} coordinate {:?} has bounds. These are being disregarded.",
                            role,
                            coord.name()
                        );
                    }

                    // When deriving bounds, points still need a trailing axis to line up with
                    // the bounds of other dependencies.
                    let trailing = if bounded { Some(1) } else { None };
                    Operand {
                        role,
                        source: Source::Points {
                            values: coord.points_values().clone(),
                            dims,
                        },
                        shape: remap::narrowed_shape(&nd_shape, derived_dims, trailing),
                    }
                }
            };

            operands.push(operand);
        }

        Ok(operands)
    }
}

fn dimension_mismatch<F>(coord: &Coord<F>, dims: &[usize]) -> Error
where
    F: Element,
{
    Error::DimensionMismatch {
        name: coord.name().to_string(),
        shape: coord.shape().to_vec(),
        dims: dims.to_vec(),
    }
}

impl<F, T> AuxCoordFactory<F> for Factory<F, T>
where
    F: Element,
    T: Formula,
{
    fn metadata(&self) -> &CoordMetadata {
        &self.metadata
    }

    fn dependencies(&self) -> &Dependencies<F> {
        &self.dependencies
    }

    fn make_coord(&self, coord_dims: &CoordDims<'_, F>) -> Result<Coord<F>> {
        let derived_dims = self.derived_dims(coord_dims);
        let ndim = derived_dims.last().map_or(1, |&dim| dim + 1);

        let operands = self.operands(coord_dims, &derived_dims, ndim, false)?;
        let points = Derivation::<F, T>::new(operands, ndim).into_lazy();

        let bounded = self
            .dependencies
            .present()
            .any(|(role, coord)| role.contributes_bounds() && coord.nbounds() != 0);
        let bounds = if bounded {
            let operands = self.operands(coord_dims, &derived_dims, ndim, true)?;
            Some(Derivation::<F, T>::new(operands, ndim).into_lazy())
        } else {
            None
        };

        Ok(Coord::from_parts(self.metadata.clone(), points, bounds))
    }

    fn update(
        &mut self,
        old_coord: &Arc<Coord<F>>,
        new_coord: Option<Arc<Coord<F>>>,
    ) -> Result<()> {
        let roles = self.dependencies.roles_holding(old_coord);
        if roles.is_empty() {
            return Ok(());
        }

        let mut dependencies = self.dependencies.clone();
        for &role in &roles {
            dependencies.bind(T::NAME, role, new_coord.clone())?;
        }
        let units = Self::check(&dependencies).map_err(|err| Error::Update(Box::new(err)))?;
        Self::advise(&dependencies, &roles);

        tracing::debug!(
            factory = T::NAME,
            ?roles,
            removed = new_coord.is_none(),
            "updated dependencies"
        );
        self.dependencies = dependencies;
        self.metadata.units = units;

        Ok(())
    }

    fn updated(&self, mapping: &CoordMapping<F>) -> Result<Box<dyn AuxCoordFactory<F>>> {
        Ok(Box::new(self.with_remapped_dependencies(mapping)?))
    }
}

impl<F, T> fmt::Display for Factory<F, T>
where
    F: Element,
    T: Formula,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args: Vec<(&str, String)> = self
            .dependencies
            .iter()
            .map(|(role, coord)| {
                let value = match coord {
                    Some(coord) => format!("'{}'", coord.name()),
                    None => String::from("None"),
                };
                (role.name(), value)
            })
            .collect();
        args.sort();

        let args: Vec<String> = args
            .into_iter()
            .map(|(role, value)| format!("{role}={value}"))
            .collect();

        write!(f, "<{}({})>", T::NAME, args.join(", "))
    }
}

impl<F, T> fmt::Debug for Factory<F, T>
where
    F: Element,
    T: Formula,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(T::NAME)
            .field("metadata", &self.metadata)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Where the values of one formula operand come from.
enum Source<F>
where
    F: Element,
{
    Absent(F),
    Points { values: Values<F>, dims: Vec<usize> },
    Bounds { values: Values<F>, dims: Vec<usize> },
}

/// One operand of a derivation, with its shape after remapping and narrowing.
struct Operand<F>
where
    F: Element,
{
    role: Role,
    source: Source<F>,
    shape: Vec<usize>,
}

impl<F> Operand<F>
where
    F: Element,
{
    /// Compute the remapped, narrowed array for this operand.
    ///
    /// Absent operands are single values with no dimensions at all, which broadcast to anything.
    ///
    fn realize(&self, ndim: usize) -> Result<ArcArray<F, IxDyn>> {
        match &self.source {
            Source::Absent(value) => Ok(ArcArray::from_elem(IxDyn(&[]), *value)),
            Source::Points { values, dims } => {
                let nd_points = remap::nd_points(values.shared()?, dims, ndim)?;
                remap::narrow(nd_points, &self.shape)
            }
            Source::Bounds { values, dims } => {
                let nd_bounds = remap::nd_bounds(values.shared()?, dims, ndim)?;
                remap::narrow(nd_bounds, &self.shape)
            }
        }
    }
}

/// Everything needed to compute derived values later: the operands and the formula.
struct Derivation<F, T>
where
    F: Element,
    T: Formula,
{
    operands: Vec<Operand<F>>,
    ndim: usize,
    shape: Vec<usize>,
    formula: PhantomData<T>,
}

impl<F, T> Derivation<F, T>
where
    F: Element,
    T: Formula,
{
    fn new(operands: Vec<Operand<F>>, ndim: usize) -> Self {
        let shapes: Vec<&[usize]> = operands
            .iter()
            .map(|operand| operand.shape.as_slice())
            .collect();
        let shape = remap::reconcile_shapes(&shapes);

        Self {
            operands,
            ndim,
            shape,
            formula: PhantomData,
        }
    }

    fn into_lazy(self) -> Values<F> {
        let shape = self.shape.clone();
        LazyArray::new(shape, move || self.evaluate()).into()
    }

    fn evaluate(&self) -> Result<ArrayD<F>> {
        let arrays = self
            .operands
            .iter()
            .map(|operand| operand.realize(self.ndim))
            .collect::<Result<Vec<_>>>()?;

        let mut terms = vec![];
        for (operand, array) in self.operands.iter().zip(&arrays) {
            if let Source::Bounds { .. } = operand.source {
                let size = array.shape().last().copied().unwrap_or(0);
                if size != 1 && size != 2 {
                    return Err(Error::InvalidBounds {
                        role: operand.role,
                        size,
                    });
                }
            }

            let view = array
                .broadcast(IxDyn(&self.shape))
                .ok_or_else(|| Error::Broadcast {
                    role: operand.role,
                    from: array.shape().to_vec(),
                    to: self.shape.clone(),
                })?;
            terms.push((operand.role, view));
        }

        let mut derived = ArrayD::zeros(IxDyn(&self.shape));
        T::combine(derived.view_mut(), &Terms { terms });

        Ok(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{array, Zip};

    use crate::testing::{self, capture_warnings, Cube};

    /// `delta + sigma`, in whatever units delta has
    struct Sum;

    impl Formula for Sum {
        const NAME: &'static str = "SumFactory";
        const ROLES: &'static [Role] = &[Role::Delta, Role::Sigma];
        const STANDARD_NAME: &'static str = "sum";

        fn units<F: Element>(dependencies: &Dependencies<F>) -> Result<Unit> {
            match dependencies.get(Role::Delta) {
                Some(delta) => Ok(delta.units().clone()),
                None => Err(Error::InsufficientDependencies {
                    factory: Self::NAME,
                    reason: "delta is needed",
                }),
            }
        }

        fn combine<F: Element>(out: ArrayViewMutD<F>, terms: &Terms<F>) {
            Zip::from(out)
                .and(&terms[Role::Delta])
                .and(&terms[Role::Sigma])
                .for_each(|out, &delta, &sigma| *out = delta + sigma);
        }
    }

    fn sum_cube() -> Cube<f64> {
        let mut cube = Cube::new();
        let delta = cube.add_coord(
            testing::coord(array![[1.0, 2.0, 3.0]].into_dyn(), "delta", "m"),
            &[0, 2],
        );
        let sigma = cube.add_coord(
            testing::coord(array![10.0, 20.0].into_dyn(), "sigma", "m"),
            &[3],
        );
        let factory = Factory::<f64, Sum>::from_dependencies([
            (Role::Delta, Some(delta)),
            (Role::Sigma, Some(sigma)),
        ])
        .unwrap();
        cube.add_factory(factory);

        cube
    }

    #[test]
    fn test_roles() {
        assert_eq!(Role::SurfaceAirPressure.name(), "surface_air_pressure");
        assert_eq!(Role::ReferenceAirPressure.to_string(), "reference_air_pressure");
        assert!(Role::Delta.contributes_bounds());
        assert!(Role::Sigma.contributes_bounds());
        assert!(!Role::Orography.contributes_bounds());
        assert!(!Role::SurfaceAirPressure.contributes_bounds());
    }

    #[test]
    fn test_derived_dims() {
        let cube = sum_cube();
        assert_eq!(cube.derived_dims("sum"), vec![0, 2, 3]);
    }

    #[test]
    fn test_make_coord() {
        let cube = sum_cube();
        let derived = cube.derived_coord("sum").unwrap();

        assert_eq!(derived.shape(), &[1, 3, 2]);
        assert_eq!(derived.units(), &Unit::new("m"));
        assert!(!derived.has_bounds());
        assert_eq!(
            derived.points().unwrap(),
            array![[[11.0, 21.0], [12.0, 22.0], [13.0, 23.0]]].into_dyn()
        );
    }

    #[test]
    fn test_make_coord_is_lazy() {
        let cube = sum_cube();
        let derived = cube.derived_coord("sum").unwrap();

        match derived.points_values() {
            Values::Lazy(points) => {
                assert!(!points.is_materialized());
                derived.points().unwrap();
                assert!(points.is_materialized());
            }
            Values::Real(_) => panic!("derived points should be lazy"),
        }
    }

    #[test]
    fn test_derived_values_outlive_dependencies() {
        let mut cube = sum_cube();
        let derived = cube.derived_coord("sum").unwrap();
        cube.remove_coord("sigma").unwrap();
        cube.remove_factory("sum");
        drop(cube);

        assert_eq!(derived.points().unwrap()[[0, 2, 1]], 23.0);
    }

    #[test]
    fn test_unknown_role() {
        let orography = Arc::new(testing::coord(array![1.0].into_dyn(), "orography", "m"));
        let result = Factory::<f64, Sum>::from_dependencies([(Role::Orography, Some(orography))]);

        assert!(matches!(
            result,
            Err(Error::UnknownRole {
                factory: "SumFactory",
                role: Role::Orography
            })
        ));
    }

    #[test]
    fn test_update_every_role_holding_coord() {
        let delta = Arc::new(testing::coord(array![1.0, 2.0].into_dyn(), "delta", "m"));
        let mut factory = Factory::<f64, Sum>::from_dependencies([
            (Role::Delta, Some(Arc::clone(&delta))),
            (Role::Sigma, Some(Arc::clone(&delta))),
        ])
        .unwrap();

        let replacement = Arc::new(testing::coord(array![3.0, 4.0].into_dyn(), "delta", "km"));
        factory.update(&delta, Some(Arc::clone(&replacement))).unwrap();

        assert!(Arc::ptr_eq(factory.dependency(Role::Delta).unwrap(), &replacement));
        assert!(Arc::ptr_eq(factory.dependency(Role::Sigma).unwrap(), &replacement));
        assert_eq!(factory.units(), &Unit::new("km"));
    }

    #[test]
    fn test_update_ignores_equal_values() {
        let delta = Arc::new(testing::coord(array![1.0, 2.0].into_dyn(), "delta", "m"));
        let mut factory =
            Factory::<f64, Sum>::from_dependencies([(Role::Delta, Some(Arc::clone(&delta)))])
                .unwrap();

        // Same values, but not the same coordinate
        let lookalike = Arc::new(Coord::clone(&delta));
        factory.update(&lookalike, None).unwrap();

        assert!(Arc::ptr_eq(factory.dependency(Role::Delta).unwrap(), &delta));
    }

    #[test]
    fn test_update_rejected() {
        let mut cube = sum_cube();
        let result = cube.remove_coord("delta");

        match result {
            Err(err @ Error::Update(_)) => {
                assert!(err.to_string().starts_with("failed to update dependencies"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(cube.factory("sum").dependencies().get(Role::Delta).is_some());
    }

    #[test]
    fn test_bounds_count_checked_on_update() {
        let mut cube = sum_cube();
        let sigma = Coord::clone(&cube.coord("sigma"))
            .with_bounds(array![[9.0], [19.0]].into_dyn())
            .unwrap();

        let result = cube.replace_coord(sigma);
        match result {
            Err(Error::Update(err)) => assert!(matches!(
                *err,
                Error::InvalidBoundsCount {
                    role: Role::Sigma,
                    nbounds: 1
                }
            )),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_bounds_from_one_dependency() {
        let mut cube = sum_cube();
        let sigma = Coord::clone(&cube.coord("sigma"))
            .with_bounds(array![[5.0, 15.0], [15.0, 25.0]].into_dyn())
            .unwrap();
        cube.replace_coord(sigma).unwrap();

        let (derived, warnings) = capture_warnings(|| cube.derived_coord("sum"));
        let derived = derived.unwrap();
        assert!(warnings.is_empty());

        let bounds = derived.bounds().unwrap().unwrap();
        assert_eq!(bounds.shape(), &[1, 3, 2, 2]);
        assert_eq!(bounds[[0, 0, 0, 0]], 6.0);
        assert_eq!(bounds[[0, 2, 1, 1]], 28.0);
    }

    #[test]
    fn test_terms_index() {
        let delta = array![1.0, 2.0].into_dyn();
        let terms = Terms {
            terms: vec![(Role::Delta, delta.view())],
        };

        assert_eq!(terms[Role::Delta][[1]], 2.0);
    }

    #[test]
    fn test_terms_get() {
        let delta = array![1.0, 2.0].into_dyn();
        let terms = Terms {
            terms: vec![(Role::Delta, delta.view())],
        };

        assert_eq!(terms.get(Role::Delta).unwrap()[[0]], 1.0);
        assert!(terms.get(Role::Orography).is_none());
    }

    #[test]
    #[should_panic(expected = "No sigma term")]
    fn test_terms_index_missing() {
        let delta = array![1.0, 2.0].into_dyn();
        let terms = Terms {
            terms: vec![(Role::Delta, delta.view())],
        };

        let _ = &terms[Role::Sigma];
    }

    #[test]
    fn test_dependencies_debug() {
        let cube = sum_cube();
        let dependencies = cube.factory("sum").dependencies();

        assert_eq!(
            format!("{dependencies:?}"),
            r#"{"delta": Some("delta"), "sigma": Some("sigma")}"#
        );
    }
}
