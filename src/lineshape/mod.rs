//! Closed-form spin-1 lineshape kernels
//!
//! The lineshape of a deuteron NMR signal is the sum of two quadrupole-split branches, see
//! C. Dulya et al., "A line-shape analysis for spin-1 NMR signals", NIM A 398 (1997) 109-125.
//! Every branch is a product of a relaxation amplitude ([i_plus], [i_minus]) and of an integral
//! over the asymmetry angle ([f_and_derivs]) of a closed-form kernel ([integrals]). Frequencies
//! enter through the [reduced_frequency].
//!
//! All functions are pure and generic over [LikeFloat], the primal path can be differentiated
//! automatically. Analytic derivatives are returned together with the values.

mod integrals;
pub use integrals::{IntegralResult, integrals};

mod quadrature;
pub use quadrature::{
    DerivativeBundle, ETA_NEGLIGIBLE, MAX_QUADRATURE_ORDER, MIN_QUADRATURE_ORDER, QUADRATURE_ORDER,
    f_and_derivs, f_and_derivs_with_order,
};

mod reduced;
pub use reduced::reduced_frequency;

mod relaxation;
pub use relaxation::{Relaxation, i_minus, i_plus};

use crate::float_trait::LikeFloat;

/// Quadrupole-split branch
///
/// A branch binds together the sign used by the angular integral and the relaxation amplitude
/// function, these must never be mixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Branch {
    /// `eps = -1`, weighted by [i_minus]
    Minus,
    /// `eps = +1`, weighted by [i_plus]
    Plus,
}

impl Branch {
    pub const BOTH: [Self; 2] = [Self::Minus, Self::Plus];

    #[inline]
    pub fn eps<T: LikeFloat>(self) -> T {
        match self {
            Self::Minus => -T::one(),
            Self::Plus => T::one(),
        }
    }

    #[inline]
    pub fn relaxation<T: LikeFloat>(self, r: T, q: T, red_freq: T) -> Relaxation<T> {
        match self {
            Self::Minus => i_minus(r, q, red_freq),
            Self::Plus => i_plus(r, q, red_freq),
        }
    }

    #[inline]
    pub fn lineshape<T: LikeFloat>(self, red_freq: T, a: T, eta: T, order: u32) -> DerivativeBundle<T> {
        f_and_derivs_with_order(red_freq, a, self.eps(), eta, order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_signs() {
        assert_eq!(Branch::Minus.eps::<f64>(), -1.0);
        assert_eq!(Branch::Plus.eps::<f64>(), 1.0);
    }

    #[test]
    fn branch_pairs_sign_and_amplitude() {
        let (r, q, red_freq, a, eta) = (1.2_f64, 0.027 / 32.69, 0.4, 0.03, 0.1);
        assert_eq!(
            Branch::Minus.relaxation(r, q, red_freq),
            i_minus(r, q, red_freq)
        );
        assert_eq!(Branch::Plus.relaxation(r, q, red_freq), i_plus(r, q, red_freq));
        assert_eq!(
            Branch::Minus.lineshape(red_freq, a, eta, QUADRATURE_ORDER),
            f_and_derivs(red_freq, a, -1.0, eta)
        );
        assert_eq!(
            Branch::Plus.lineshape(red_freq, a, eta, QUADRATURE_ORDER),
            f_and_derivs(red_freq, a, 1.0, eta)
        );
    }
}
