mod conv;
mod dense;
mod dropout;
mod pool;
mod relu;

pub use conv::Conv2d;
pub use dense::Dense;
pub use dropout::{Dropout, Dropout2d};
pub use pool::MaxPool2d;
pub use relu::Relu;

use ndarray::{Array2, Array3};

/// Reshapes a cached buffer, reallocating only when the element count
/// actually changes (e.g. on the smaller final batch of an epoch).
///
/// Callers overwrite the whole buffer afterwards, so stale values are fine.
pub(crate) trait InplaceReshape: Sized {
    type Shape;
    fn into_reshape(self, shape: Self::Shape) -> Self;
}

impl<A: Clone + Default> InplaceReshape for Array2<A> {
    type Shape = (usize, usize);

    fn into_reshape(self, shape: Self::Shape) -> Self {
        if self.dim() == shape {
            self
        } else if self.len() == shape.0 * shape.1 {
            self.into_shape_with_order(shape).unwrap()
        } else {
            Array2::from_elem(shape, A::default())
        }
    }
}

impl<A: Clone + Default> InplaceReshape for Array3<A> {
    type Shape = (usize, usize, usize);

    fn into_reshape(self, shape: Self::Shape) -> Self {
        if self.dim() == shape {
            self
        } else if self.len() == shape.0 * shape.1 * shape.2 {
            self.into_shape_with_order(shape).unwrap()
        } else {
            Array3::from_elem(shape, A::default())
        }
    }
}
