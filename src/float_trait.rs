use std::ops::{AddAssign, MulAssign};

/// Floating-point type the lineshape kernels are generic over
///
/// It is implemented for every [num_traits::Float] supporting in-place addition and
/// multiplication: `f32`, `f64` and dual numbers, which makes it possible to differentiate the
/// primal path automatically and compare it with the analytic derivatives.
pub trait LikeFloat: num_traits::Float + AddAssign<Self> + MulAssign<Self> {
    #[inline]
    fn lit(x: f64) -> Self {
        <Self as num_traits::NumCast>::from(x).unwrap()
    }

    #[inline]
    fn half() -> Self {
        Self::lit(0.5)
    }

    #[inline]
    fn two() -> Self {
        Self::lit(2.0)
    }

    #[inline]
    fn three() -> Self {
        Self::lit(3.0)
    }

    #[inline]
    fn four() -> Self {
        Self::lit(4.0)
    }

    #[inline]
    fn pi() -> Self {
        Self::lit(std::f64::consts::PI)
    }

    #[inline]
    fn sqrt3() -> Self {
        Self::three().sqrt()
    }
}

impl<T> LikeFloat for T where T: num_traits::Float + AddAssign<Self> + MulAssign<Self> {}
