//! Broadcasting of coordinate values onto the dimensions of a host array.
//!
//! A coordinate spans some subset of its host's dimensions, in any order. To combine coordinates
//! spanning different dimensions, each is remapped so that its axes appear in host order, at the
//! positions of the host dimensions they span, with size 1 axes everywhere else. Arrays remapped
//! this way broadcast against each other.
//!
//! Derived coordinates only span the union of their dependencies' dimensions, so remapped arrays
//! are then narrowed, dropping the size 1 axes for host dimensions no dependency spans.
//!
//! Bounds are remapped the same way, with the bounds axis kept last.

use ndarray::{ArcArray, ErrorKind, IxDyn, ShapeError};

use crate::errors::Result;

/// Order of a coordinate's axes which puts them in ascending order of host dimension.
fn host_order(dims: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dims.len()).collect();
    order.sort_by_key(|&axis| dims[axis]);

    order
}

/// Shape, broadcastable to `ndim` dimensions, of an array with `shape` spanning host dimensions
/// `dims`.
///
/// Example:
///     shape == [4, 3]
///     dims == [3, 2]
///     ndim == 5
/// results in:
///     [1, 1, 3, 4, 1]
///
/// `dims` must either name a host dimension for every axis of `shape` or be empty, in which case
/// `shape` must describe a single value.
///
pub fn nd_shape(shape: &[usize], dims: &[usize], ndim: usize) -> Result<Vec<usize>> {
    if dims.iter().any(|&dim| dim >= ndim) {
        return Err(ShapeError::from_kind(ErrorKind::OutOfBounds).into());
    }
    if !dims.is_empty() && dims.len() != shape.len() {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }

    let mut nd_shape = vec![1; ndim];
    for (&dim, &size) in dims.iter().zip(shape) {
        nd_shape[dim] = size;
    }

    if nd_shape.iter().product::<usize>() != shape.iter().product::<usize>() {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }

    Ok(nd_shape)
}

/// Like ``nd_shape`` for a bounds array, where the last axis of `shape` holds the bounds.
///
/// Example:
///     shape == [70, 2]
///     dims == [3]
///     ndim == 5
/// results in:
///     [1, 1, 1, 70, 1, 2]
///
pub fn nd_bounds_shape(shape: &[usize], dims: &[usize], ndim: usize) -> Result<Vec<usize>> {
    match shape.split_last() {
        Some((&nbounds, shape)) => {
            let mut nd_shape = nd_shape(shape, dims, ndim)?;
            nd_shape.push(nbounds);

            Ok(nd_shape)
        }
        None => Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into()),
    }
}

/// Get a coordinate's points in host order, broadcastable to `ndim` dimensions.
///
/// Only the axes are reordered and reshaped, values are untouched.
///
pub fn nd_points<F>(
    points: ArcArray<F, IxDyn>,
    dims: &[usize],
    ndim: usize,
) -> Result<ArcArray<F, IxDyn>>
where
    F: Clone,
{
    let nd_shape = nd_shape(points.shape(), dims, ndim)?;
    let points = if dims.is_empty() {
        points
    } else {
        points.permuted_axes(host_order(dims))
    };

    reshape(points, &nd_shape)
}

/// Get a coordinate's bounds in host order, broadcastable to `ndim` dimensions plus a trailing
/// bounds axis.
///
pub fn nd_bounds<F>(
    bounds: ArcArray<F, IxDyn>,
    dims: &[usize],
    ndim: usize,
) -> Result<ArcArray<F, IxDyn>>
where
    F: Clone,
{
    let nd_shape = nd_bounds_shape(bounds.shape(), dims, ndim)?;
    let bounds = if dims.is_empty() {
        bounds
    } else {
        let mut order = host_order(dims);
        order.push(dims.len());
        bounds.permuted_axes(order)
    };

    reshape(bounds, &nd_shape)
}

/// Shape of a remapped array restricted to the dimensions relevant to a derived coordinate.
///
/// `derived_dims` are in host order, so no transposing is needed, only dropping axes. A derived
/// coordinate with no dimensions still gets a single axis, to be consistent with other
/// coordinates. When remapping for bounds, `trailing` is the size of the bounds axis, which is
/// kept last.
///
pub fn narrowed_shape(
    nd_shape: &[usize],
    derived_dims: &[usize],
    trailing: Option<usize>,
) -> Vec<usize> {
    let mut shape: Vec<usize> = derived_dims.iter().map(|&dim| nd_shape[dim]).collect();
    if shape.is_empty() {
        shape.push(1);
    }
    if let Some(size) = trailing {
        shape.push(size);
    }

    shape
}

/// Reshape a remapped array to its narrowed shape (see ``narrowed_shape``).
///
pub fn narrow<F>(nd_array: ArcArray<F, IxDyn>, shape: &[usize]) -> Result<ArcArray<F, IxDyn>>
where
    F: Clone,
{
    reshape(nd_array, shape)
}

/// Work out the shape of the result of combining several remapped arrays.
///
/// Starts from the shape with the most dimensions, then any axis with a size greater than 1 in
/// any other shape overrides the size found so far.
///
/// The only way shapes can disagree is in the number of bounds, since a host array makes sure all
/// other dimensions match. That is not checked here. It can't be reported without computing the
/// arrays, so it is left to fail when the combined array is finally computed.
///
pub fn reconcile_shapes(shapes: &[&[usize]]) -> Vec<usize> {
    let widest = shapes
        .iter()
        .enumerate()
        .max_by_key(|(_, shape)| shape.len());

    match widest {
        Some((widest, shape)) => {
            let mut reconciled = shape.to_vec();
            for (i, shape) in shapes.iter().enumerate() {
                if i == widest {
                    continue;
                }
                for (axis, &size) in shape.iter().enumerate() {
                    if size > 1 {
                        reconciled[axis] = size;
                    }
                }
            }

            reconciled
        }
        None => vec![],
    }
}

fn reshape<F>(array: ArcArray<F, IxDyn>, shape: &[usize]) -> Result<ArcArray<F, IxDyn>>
where
    F: Clone,
{
    if array.shape() == shape {
        return Ok(array);
    }

    // Reshaping follows memory order, so it has to be row-major to keep elements in place.
    let array = if array.is_standard_layout() {
        array
    } else {
        array.as_standard_layout().into_owned().into_shared()
    };

    Ok(array.into_shape(shape.to_vec())?)
}
