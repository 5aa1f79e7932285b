/// Relative parameter change small enough to stop an optimizer
pub(super) const PARAMETER_TOLERANCE: f64 = 1e-10;
