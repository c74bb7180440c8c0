// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

General helpers for numerics.

*/

use ndarray::{Array, Dimension, IntoDimension, Ix1, Ix2, Ix3};

use crate::errors::{Error, Result};

/// Adapt a slice representing an array shape into an `ndarray::Dimension` type.
///
/// In `ndarray` array dimensionalities are statically typed, but it is often
/// the case that we are reading arrays from data files where the array
/// dimensionality may not match the expectations of the compiled code. This
/// trait makes it possible to convert a runtime-flexible array shape into one
/// of the compile-time types … if the two dimensionalities are in fact the
/// same.
pub trait DimFromShapeSlice<T>: Sized {
    /// Try to create the implementing type from the specified array shape,
    /// specified as a slice.
    ///
    /// Returns `Error::DimensionMismatch` if the slice size does not match
    /// the expected dimensionality.
    fn from_shape_slice(shape: &[T]) -> Result<Self>;
}

macro_rules! impl_dim_from_shape_slice {
    ($dimtype:ty; $ndim:expr; $($numbers:expr);*) => {
        impl DimFromShapeSlice<usize> for $dimtype {
            fn from_shape_slice(shape: &[usize]) -> Result<Self> {
                if shape.len() == $ndim {
                    Ok([$(shape[$numbers]),*].into_dimension())
                } else {
                    Err(Error::DimensionMismatch($ndim, shape.len()))
                }
            }
        }
    }
}

impl_dim_from_shape_slice! { Ix1; 1; 0 }
impl_dim_from_shape_slice! { Ix2; 2; 0;1 }
impl_dim_from_shape_slice! { Ix3; 3; 0;1;2 }

/// Build an array from a runtime shape and its elements in row-major order.
///
/// Fails if the shape has the wrong dimensionality or if the number of
/// elements does not match it.
pub fn array_from_shape_vec<A, D>(shape: &[usize], data: Vec<A>) -> Result<Array<A, D>>
where
    D: Dimension + DimFromShapeSlice<usize>,
{
    let dim = D::from_shape_slice(shape)?;
    let expected = dim.size();
    let actual = data.len();

    Array::from_shape_vec(dim, data).map_err(|_| {
        Error::Msg(format!(
            "array of shape {:?} needs {} elements but {} were provided",
            shape, expected, actual
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn shapes_must_match_dimensionality() {
        assert!(Ix2::from_shape_slice(&[2usize, 3]).is_ok());

        match Ix2::from_shape_slice(&[2usize, 3, 4]) {
            Err(Error::DimensionMismatch(2, 3)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn builds_row_major_arrays() {
        let a: Array2<f32> = array_from_shape_vec(&[2, 2], vec![1., 2., 3., 4.]).unwrap();
        assert_eq!(a[[0, 1]], 2.);
        assert_eq!(a[[1, 0]], 3.);

        let bad: Result<Array2<f32>> = array_from_shape_vec(&[2, 2], vec![1., 2., 3.]);
        assert!(bad.is_err());
    }
}
