pub(crate) fn within_bounds<T, const NPARAMS: usize>(
    x: &[T; NPARAMS],
    lower: &[T; NPARAMS],
    upper: &[T; NPARAMS],
) -> bool
where
    T: PartialOrd,
{
    for i in 0..NPARAMS {
        if x[i] < lower[i] || x[i] > upper[i] {
            return false;
        }
    }
    true
}

/// Project parameters onto the box given by `lower` and `upper`
pub(super) fn clamp_to_bounds<const NPARAMS: usize>(
    x: &mut [f64; NPARAMS],
    lower: &[f64; NPARAMS],
    upper: &[f64; NPARAMS],
) {
    for i in 0..NPARAMS {
        x[i] = x[i].max(lower[i]).min(upper[i]);
    }
}
