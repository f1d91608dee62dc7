use std::sync::Arc;

use ndarray::{ArcArray, ArrayD, ArrayViewD, IxDyn};

use crate::{
    element::Element,
    errors::{Error, Result},
    lazy::{self, LazyArray},
    metadata::CoordMetadata,
    units::Unit,
};

/// The values of a coordinate's points or bounds: either a real array or one computed on demand.
#[derive(Clone, Debug)]
pub enum Values<F>
where
    F: Element,
{
    Real(ArcArray<F, IxDyn>),
    Lazy(Arc<LazyArray<F>>),
}

impl<F> Values<F>
where
    F: Element,
{
    /// The shape of the values. Never forces a lazy array to be computed.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Real(array) => array.shape(),
            Self::Lazy(array) => array.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    pub fn view(&self) -> Result<ArrayViewD<F>> {
        match self {
            Self::Real(array) => Ok(array.view()),
            Self::Lazy(array) => array.view(),
        }
    }

    /// Get the values as a shared array, computing them if necessary.
    ///
    /// Cheap for real values. Lazy values are copied out of the lazy array's cache.
    ///
    pub(crate) fn shared(&self) -> Result<ArcArray<F, IxDyn>> {
        match self {
            Self::Real(array) => Ok(array.clone()),
            Self::Lazy(array) => Ok(array.materialize()?.to_shared()),
        }
    }

    /// A string identifying these values by shape and content.
    pub fn descriptor(&self) -> Result<String> {
        match self {
            Self::Real(array) => Ok(format!(
                "Array(shape={:?}, checksum={})",
                array.shape(),
                lazy::checksum(&array.view())
            )),
            Self::Lazy(array) => array.descriptor(),
        }
    }
}

impl<F> From<ArrayD<F>> for Values<F>
where
    F: Element,
{
    fn from(array: ArrayD<F>) -> Self {
        Self::Real(array.into_shared())
    }
}

impl<F> From<ArcArray<F, IxDyn>> for Values<F>
where
    F: Element,
{
    fn from(array: ArcArray<F, IxDyn>) -> Self {
        Self::Real(array)
    }
}

impl<F> From<LazyArray<F>> for Values<F>
where
    F: Element,
{
    fn from(array: LazyArray<F>) -> Self {
        Self::Lazy(Arc::new(array))
    }
}

/// Identity of a shared coordinate.
///
/// Two handles have the same id only if they point at the same coordinate object. Coordinates
/// with equal values are still distinct.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordId(usize);

/// A coordinate: points, optional bounds and descriptive metadata.
///
/// Coordinates are immutable once shared. To change a coordinate a host builds a new one (see
/// ``metadata_mut`` and ``with_bounds``) and notifies any factories depending on the old one.
///
#[derive(Clone, Debug)]
pub struct Coord<F>
where
    F: Element,
{
    metadata: CoordMetadata,
    points: Values<F>,
    bounds: Option<Values<F>>,
}

impl<F> Coord<F>
where
    F: Element,
{
    pub fn new(points: impl Into<Values<F>>, metadata: CoordMetadata) -> Self {
        Self {
            metadata,
            points: points.into(),
            bounds: None,
        }
    }

    /// Assemble a coordinate without checking bounds against points.
    ///
    /// Used for derived coordinates, whose shapes are only known to be consistent once computed.
    ///
    pub(crate) fn from_parts(
        metadata: CoordMetadata,
        points: Values<F>,
        bounds: Option<Values<F>>,
    ) -> Self {
        Self {
            metadata,
            points,
            bounds,
        }
    }

    /// Set the bounds of this coordinate.
    ///
    /// Bounds must have the same shape as the points plus one trailing axis, whose size is the
    /// number of bounds per point.
    ///
    pub fn with_bounds(mut self, bounds: impl Into<Values<F>>) -> Result<Self> {
        let bounds = bounds.into();
        let points_shape = self.points.shape();
        let bounds_shape = bounds.shape();
        if bounds_shape.len() != points_shape.len() + 1
            || &bounds_shape[..points_shape.len()] != points_shape
        {
            return Err(Error::BoundsShape {
                points: points_shape.to_vec(),
                bounds: bounds_shape.to_vec(),
            });
        }

        self.bounds = Some(bounds);

        Ok(self)
    }

    pub fn without_bounds(mut self) -> Self {
        self.bounds = None;
        self
    }

    pub fn id(this: &Arc<Self>) -> CoordId {
        CoordId(Arc::as_ptr(this) as usize)
    }

    pub fn metadata(&self) -> &CoordMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut CoordMetadata {
        &mut self.metadata
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn units(&self) -> &Unit {
        &self.metadata.units
    }

    pub fn shape(&self) -> &[usize] {
        self.points.shape()
    }

    pub fn ndim(&self) -> usize {
        self.points.ndim()
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bounds per point, 0 if the coordinate has no bounds.
    pub fn nbounds(&self) -> usize {
        match &self.bounds {
            Some(bounds) => bounds.shape().last().copied().unwrap_or(0),
            None => 0,
        }
    }

    pub fn has_bounds(&self) -> bool {
        self.bounds.is_some()
    }

    /// Get the points, computing them first if they are lazy.
    pub fn points(&self) -> Result<ArrayViewD<F>> {
        self.points.view()
    }

    /// Get the bounds, if any, computing them first if they are lazy.
    pub fn bounds(&self) -> Result<Option<ArrayViewD<F>>> {
        self.bounds.as_ref().map(Values::view).transpose()
    }

    pub fn points_values(&self) -> &Values<F> {
        &self.points
    }

    pub fn bounds_values(&self) -> Option<&Values<F>> {
        self.bounds.as_ref()
    }
}
