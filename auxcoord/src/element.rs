//! Element types that coordinate values may be stored as.

use std::fmt::Debug;

use crc32fast::Hasher;
use num_traits::Float;

/// A floating point type usable as coordinate values.
///
/// Derived values keep the element type of their dependencies: a factory over `f32` coordinates
/// produces `f32` values, never widened.
pub trait Element: Float + Debug + Send + Sync + 'static {
    /// Feed the native-endian bytes of this value to a running checksum.
    fn checksum(self, hasher: &mut Hasher);
}

macro_rules! impl_element {
    ($($ty:ty),*) => {
        $(
            impl Element for $ty {
                fn checksum(self, hasher: &mut Hasher) {
                    hasher.update(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_element!(f32, f64);
