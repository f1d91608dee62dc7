//! An array which is only computed on demand.
//!
use std::fmt;

use crc32fast::Hasher;
use ndarray::{Array, ArrayD, ArrayViewD, IxDyn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::{
    element::Element,
    errors::{Error, Result},
};

type Producer<F> = Box<dyn Fn() -> Result<ArrayD<F>> + Send + Sync>;

/// A simplified array which is only computed on demand.
///
/// The shape is declared up front so callers can reason about the array without computing it.
/// The first call to ``materialize``, ``view``, ``reshape`` or ``descriptor`` runs the producer
/// and caches its result for any subsequent access. Once the array is cached the producer is
/// dropped, releasing anything it captured. If the producer fails, it is kept, so the next access
/// tries again and reports the failure again.
///
/// The produced array must have exactly the declared shape. Anything else is reported as a
/// ``ShapeMismatch`` on first access, even if the element count agrees and a reshape would
/// work. Producers which can't guarantee their shape should be wrapped to reshape first.
///
/// A ``LazyArray`` which is never read never runs its producer.
///
pub struct LazyArray<F>
where
    F: Element,
{
    /// The shape of the array that will be produced
    shape: Vec<usize>,

    /// Function which will be called to supply the real array. ``None`` once the array has been
    /// produced.
    producer: Mutex<Option<Producer<F>>>,

    /// The real array, once produced
    array: OnceCell<ArrayD<F>>,
}

impl<F> LazyArray<F>
where
    F: Element,
{
    /// Create a lazy array with the given shape, whose contents will be supplied by `producer`.
    ///
    pub fn new<P>(shape: impl Into<Vec<usize>>, producer: P) -> Self
    where
        P: Fn() -> Result<ArrayD<F>> + Send + Sync + 'static,
    {
        Self {
            shape: shape.into(),
            producer: Mutex::new(Some(Box::new(producer))),
            array: OnceCell::new(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements the array will hold
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_materialized(&self) -> bool {
        self.array.get().is_some()
    }

    /// Get the real array, computing it if this is the first access.
    ///
    /// Every successful call returns a reference to the same cached array.
    ///
    pub fn materialize(&self) -> Result<&ArrayD<F>> {
        self.array.get_or_try_init(|| {
            let mut slot = self.producer.lock();
            let produce = slot.take().ok_or(Error::Released)?;
            match self.produce(&produce) {
                Ok(array) => {
                    tracing::debug!(shape = ?self.shape, "materialized lazy array");
                    Ok(array)
                }
                Err(err) => {
                    *slot = Some(produce);
                    Err(err)
                }
            }
        })
    }

    fn produce(&self, produce: &Producer<F>) -> Result<ArrayD<F>> {
        let array = produce()?;
        if array.shape() != self.shape.as_slice() {
            return Err(Error::ShapeMismatch {
                expected: self.shape.clone(),
                found: array.shape().to_vec(),
            });
        }

        Ok(array)
    }

    /// Get a view of the real array.
    ///
    pub fn view(&self) -> Result<ArrayViewD<F>> {
        Ok(self.materialize()?.view())
    }

    /// Get a copy of the real array with the given shape.
    ///
    /// Elements are taken in row-major order, so this behaves the same regardless of the memory
    /// layout of the cached array.
    ///
    pub fn reshape(&self, shape: &[usize]) -> Result<ArrayD<F>> {
        let array = self.materialize()?;
        let values = array.iter().copied().collect();

        Ok(Array::from_shape_vec(IxDyn(shape), values)?)
    }

    /// Get a string describing this array, suitable for comparing arrays structurally.
    ///
    /// The checksum is a CRC-32 of the elements' bytes in row-major order.
    ///
    pub fn descriptor(&self) -> Result<String> {
        let array = self.materialize()?;

        Ok(format!(
            "LazyArray(shape={:?}, checksum={})",
            self.shape,
            checksum(&array.view())
        ))
    }
}

/// CRC-32 of an array's elements' bytes in row-major order.
pub(crate) fn checksum<F>(array: &ArrayViewD<F>) -> u32
where
    F: Element,
{
    let mut hasher = Hasher::new();
    for &value in array.iter() {
        value.checksum(&mut hasher);
    }

    hasher.finalize()
}

impl<F> fmt::Debug for LazyArray<F>
where
    F: Element,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<LazyArray(shape={:?})>", self.shape)
    }
}
