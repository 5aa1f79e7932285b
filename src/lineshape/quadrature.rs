use crate::float_trait::LikeFloat;
use crate::lineshape::integrals::integrals;

use std::ops::Div;

/// Number of dyadic refinement levels of the angular quadrature
///
/// The sum runs over `2^order` sub-intervals of the asymmetry angle. The scheme is non-adaptive:
/// no convergence check is performed and the `phi = 1/2` sample is not part of it, so the result
/// converges linearly with the step.
pub const QUADRATURE_ORDER: u32 = 5;

/// Smallest supported quadrature order
pub const MIN_QUADRATURE_ORDER: u32 = 2;

/// Largest supported quadrature order, `2^20` sub-intervals
pub const MAX_QUADRATURE_ORDER: u32 = 20;

/// Asymmetry parameter below which the angular integration is replaced by a single
/// `eta = 0` evaluation
pub const ETA_NEGLIGIBLE: f64 = 1e-3;

/// Branch lineshape and its partial derivatives
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivativeBundle<T> {
    pub ff: T,
    pub dfda: T,
    pub dfdr: T,
    pub dfdeta: T,
}

impl<T> DerivativeBundle<T>
where
    T: LikeFloat,
{
    fn zero() -> Self {
        Self {
            ff: T::zero(),
            dfda: T::zero(),
            dfdr: T::zero(),
            dfdeta: T::zero(),
        }
    }

    fn scale(self, factor: T) -> Self {
        Self {
            ff: factor * self.ff,
            dfda: factor * self.dfda,
            dfdr: factor * self.dfdr,
            dfdeta: factor * self.dfdeta,
        }
    }
}

impl<T> Div<T> for DerivativeBundle<T>
where
    T: LikeFloat,
{
    type Output = Self;

    fn div(self, rhs: T) -> Self {
        Self {
            ff: self.ff / rhs,
            dfda: self.dfda / rhs,
            dfdr: self.dfdr / rhs,
            dfdeta: self.dfdeta / rhs,
        }
    }
}

/// Angular sums for a single branch
struct AngularSum<T> {
    red_freq: T,
    a: T,
    eps: T,
    eta: T,
    acc: DerivativeBundle<T>,
}

impl<T> AngularSum<T>
where
    T: LikeFloat,
{
    /// Add a sample at `cos(2 phi) = c2p`
    ///
    /// Endpoint samples call the kernel without the resonance shift, so their `z2` doesn't depend
    /// on `eta`.
    fn add(&mut self, c2p: T, weight: T, shifted: bool) {
        let a = self.a;
        let ec2p = self.eta * c2p;
        let y2 = T::three() - ec2p;
        let y = y2.sqrt();
        let shift = if shifted { ec2p } else { T::zero() };
        let z2 = T::one() - self.eps * self.red_freq - shift;

        let int = integrals(self.red_freq, a, self.eps, y2, shift);

        let fac = weight * T::sqrt3() / y;
        let dz2 = z2 * int.i3 - int.i4;
        let g_y = y2 * (y2 - T::two() * z2) + a * a + z2 * z2;
        let dz2_deta = if shifted { dz2 } else { T::zero() };

        self.acc.ff += fac * int.i1 * a;
        self.acc.dfda += fac * (int.i1 - T::two() * a * a * int.i3);
        self.acc.dfdr += fac * dz2 * T::two() * a * self.eps;
        self.acc.dfdeta += T::two()
            * a
            * c2p
            * fac
            * (dz2_deta + int.i1 / (T::four() * y2) - (T::four() * y * g_y).recip());
    }
}

/// Branch lineshape `F` and its derivatives over `A`, `R` and `eta`
///
/// `eps` is the branch sign, `+1` or `-1`. Uses [QUADRATURE_ORDER] refinement levels, see
/// [f_and_derivs_with_order].
#[inline]
pub fn f_and_derivs<T>(red_freq: T, a: T, eps: T, eta: T) -> DerivativeBundle<T>
where
    T: LikeFloat,
{
    f_and_derivs_with_order(red_freq, a, eps, eta, QUADRATURE_ORDER)
}

/// Branch lineshape `F` and its derivatives with a given quadrature order
///
/// For `eta` smaller than [ETA_NEGLIGIBLE] (negative values included) the closed form for
/// `eta = 0` is used. Otherwise the kernel is integrated over the asymmetry angle with the
/// trapezoidal rule on `2^order` sub-intervals: two half-weighted endpoint samples and the odd
/// nodes of each level `N = 4, 8, ..., 2^order`.
///
/// # Panics
///
/// If `order` is out of `[MIN_QUADRATURE_ORDER, MAX_QUADRATURE_ORDER]`
pub fn f_and_derivs_with_order<T>(red_freq: T, a: T, eps: T, eta: T, order: u32) -> DerivativeBundle<T>
where
    T: LikeFloat,
{
    assert!(
        (MIN_QUADRATURE_ORDER..=MAX_QUADRATURE_ORDER).contains(&order),
        "quadrature order must be in [{MIN_QUADRATURE_ORDER}, {MAX_QUADRATURE_ORDER}], got {order}"
    );
    if eta < T::lit(ETA_NEGLIGIBLE) {
        let int = integrals(red_freq, a, eps, T::three(), T::zero());
        return DerivativeBundle {
            ff: int.i1 * a,
            dfda: int.i1 - T::two() * a * a * int.i3,
            dfdr: ((T::one() - eps * red_freq) * int.i3 - int.i4) * T::two() * a * eps,
            dfdeta: T::zero(),
        };
    }

    let mut sum = AngularSum {
        red_freq,
        a,
        eps,
        eta,
        acc: DerivativeBundle::zero(),
    };

    sum.add(T::one(), T::half(), false);
    sum.add(-T::one(), T::half(), false);

    for level in 2..=order {
        let n = 1_u64 << level;
        let dphi = T::lit(n as f64).recip();
        for i in (1..n).rev().step_by(2) {
            let c2p = (T::pi() * dphi * T::lit(i as f64)).cos();
            sum.add(c2p, T::one(), true);
        }
    }

    let dphi = T::lit((1_u64 << order) as f64).recip();
    sum.acc.scale(dphi)
}

#[cfg(test)]
#[allow(clippy::unreadable_literal)]
#[allow(clippy::excessive_precision)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hyperdual::Hyperdual;

    #[test]
    fn closed_form_reference() {
        let actual = f_and_derivs(0.2_f64, 0.05, 1.0, 0.0);
        assert_relative_eq!(actual.ff, 1.749000849341275, max_relative = 1e-10);
        assert_relative_eq!(actual.dfda, -0.19503070674318224, max_relative = 1e-8);
        assert_relative_eq!(actual.dfdr, 1.092113517497819, max_relative = 1e-8);
        assert_eq!(actual.dfdeta, 0.0);
    }

    #[test]
    fn angular_reference() {
        let actual = f_and_derivs(0.5_f64, 0.1, 1.0, 0.3);
        assert_relative_eq!(actual.ff, 2.2687306467942303, max_relative = 1e-10);
        assert_relative_eq!(actual.dfda, -1.449616504732314, max_relative = 1e-8);
        assert_relative_eq!(actual.dfdr, 2.656095788703894, max_relative = 1e-8);
        assert_relative_eq!(actual.dfdeta, 1.1700019325427018, max_relative = 1e-8);
    }

    #[test]
    fn negligible_eta_takes_closed_form() {
        for eps in [-1.0_f64, 1.0] {
            for red_freq in [-2.0, -0.7, 0.1, 0.5, 1.3] {
                let zero = f_and_derivs(red_freq, 0.03, eps, 0.0);
                let small = f_and_derivs(red_freq, 0.03, eps, 0.0005);
                let negative = f_and_derivs(red_freq, 0.03, eps, -0.02);
                assert_relative_eq!(zero.ff, small.ff, max_relative = 1e-9);
                assert_eq!(zero, negative);
            }
        }
    }

    #[test]
    fn refinement_increments_decrease() {
        for (red_freq, a, eps, eta) in [
            (0.2_f64, 0.05, 1.0, 0.1),
            (0.34, 0.03, -1.0, 0.5),
            (-0.5, 0.1, 1.0, 0.3),
        ] {
            let ff: Vec<f64> = (3..=6)
                .map(|order| f_and_derivs_with_order(red_freq, a, eps, eta, order).ff)
                .collect();
            let increments: Vec<f64> = ff.windows(2).map(|w| f64::abs(w[1] - w[0])).collect();
            for w in increments.windows(2) {
                assert!(w[1] < w[0], "increments {:?} do not decrease", increments);
            }
        }
    }

    #[test]
    fn default_order() {
        let actual = f_and_derivs(0.2_f64, 0.05, 1.0, 0.1);
        let desired = f_and_derivs_with_order(0.2_f64, 0.05, 1.0, 0.1, QUADRATURE_ORDER);
        assert_eq!(actual, desired);
    }

    #[test]
    fn derivatives_match_autodiff() {
        const CASES: [(f64, f64, f64, f64); 6] = [
            (0.2, 0.05, 1.0, 0.0),
            (-0.4, 0.05, -1.0, 0.0),
            (0.5, 0.1, 1.0, 0.3),
            (-0.3, 0.03, -1.0, 0.1),
            (0.1, 0.03, 1.0, 0.02),
            (0.34, 0.03, -1.0, 0.5),
        ];

        for (red_freq, a, eps, eta) in CASES {
            let mut hyper_red_freq = Hyperdual::<f64, 4>::from_real(red_freq);
            hyper_red_freq[1] = 1.0;
            let mut hyper_a = Hyperdual::<f64, 4>::from_real(a);
            hyper_a[2] = 1.0;
            let mut hyper_eta = Hyperdual::<f64, 4>::from_real(eta);
            hyper_eta[3] = 1.0;
            let hyper_eps = Hyperdual::<f64, 4>::from_real(eps);

            let result = f_and_derivs(hyper_red_freq, hyper_a, hyper_eps, hyper_eta);
            let ff = result.ff;

            assert_relative_eq!(result.dfdr[0], ff[1], epsilon = 1e-9, max_relative = 1e-6);
            assert_relative_eq!(result.dfda[0], ff[2], epsilon = 1e-9, max_relative = 1e-6);
            assert_relative_eq!(result.dfdeta[0], ff[3], epsilon = 1e-9, max_relative = 1e-6);
        }
    }

    #[test]
    fn division_scales_every_component() {
        let bundle = f_and_derivs(0.5_f64, 0.1, -1.0, 0.3);
        let scaled = bundle / 2.0;
        assert_eq!(scaled.ff, 0.5 * bundle.ff);
        assert_eq!(scaled.dfda, 0.5 * bundle.dfda);
        assert_eq!(scaled.dfdr, 0.5 * bundle.dfdr);
        assert_eq!(scaled.dfdeta, 0.5 * bundle.dfdeta);
    }

    #[test]
    #[should_panic(expected = "quadrature order must be in")]
    fn too_large_order_is_rejected() {
        f_and_derivs_with_order(0.2_f64, 0.05, 1.0, 0.1, 64);
    }

    #[test]
    #[should_panic(expected = "quadrature order must be in")]
    fn zero_order_is_rejected() {
        f_and_derivs_with_order(0.2_f64, 0.05, 1.0, 0.1, 0);
    }

    #[test]
    fn order_limits_are_accepted() {
        for order in [MIN_QUADRATURE_ORDER, MAX_QUADRATURE_ORDER] {
            assert!(f_and_derivs_with_order(0.2_f64, 0.05, 1.0, 0.1, order).ff.is_finite());
        }
    }
}
