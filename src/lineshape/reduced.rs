use crate::float_trait::LikeFloat;

/// Reduced frequency `R = (w - wL) / (3 wQ)`
///
/// `w_q = 0` is outside of the physical domain and is not guarded, the result is non-finite then.
#[inline]
pub fn reduced_frequency<T>(w: T, w_l: T, w_q: T) -> T
where
    T: LikeFloat,
{
    (w - w_l) / (T::three() * w_q)
}
