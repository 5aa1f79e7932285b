use crate::float_trait::LikeFloat;

/// Relaxation amplitude of a quadrupole-split branch and its partial derivatives
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Relaxation<T> {
    /// Branch weight `I`
    pub value: T,
    /// `dI / dr`
    pub d_dr: T,
    /// `dI / dk`, where `k = 3 Q R`
    pub d_dk: T,
}

impl<T> Relaxation<T>
where
    T: LikeFloat,
{
    /// Limit of the amplitude when `r^(±k)` dominates the normalization
    fn saturated(value: T) -> Self {
        Self {
            value,
            d_dr: T::zero(),
            d_dk: T::zero(),
        }
    }
}

/// Amplitude of the "plus" branch, `I+(r, Q, R)`
///
/// `q` is `wQ / wL`, `red_freq` is the reduced frequency. When `r^(-3QR)` overflows the result
/// saturates to `I = -1` with vanishing derivatives.
pub fn i_plus<T>(r: T, q: T, red_freq: T) -> Relaxation<T>
where
    T: LikeFloat,
{
    let k = T::three() * q * red_freq;
    let x = r.powf(-k);
    let norm = r * (r + x) + T::one();
    if norm.is_infinite() {
        return Relaxation::saturated(-T::one());
    }
    let value = r * (r - x) / norm;
    Relaxation {
        value,
        d_dr: (T::two() * r * (T::one() - value) - (T::one() - k) * x * (T::one() + value)) / norm,
        d_dk: r * x * r.ln() * (T::one() + value) / norm,
    }
}

/// Amplitude of the "minus" branch, `I-(r, Q, R)`
///
/// `q` is `wQ / wL`, `red_freq` is the reduced frequency. When `r^(3QR)` overflows the result
/// saturates to `I = 1` with vanishing derivatives.
pub fn i_minus<T>(r: T, q: T, red_freq: T) -> Relaxation<T>
where
    T: LikeFloat,
{
    let k = T::three() * q * red_freq;
    let x = r.powf(k);
    let norm = r * (r + x) + T::one();
    if norm.is_infinite() {
        return Relaxation::saturated(T::one());
    }
    let value = (r * x - T::one()) / norm;
    Relaxation {
        value,
        d_dr: ((T::one() + k) * x * (T::one() - value) - T::two() * r * value) / norm,
        d_dk: r * x * r.ln() * (T::one() - value) / norm,
    }
}

#[cfg(test)]
#[allow(clippy::unreadable_literal)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hyperdual::Hyperdual;

    const CASES: [(f64, f64, f64); 6] = [
        (1.2, 0.027 / 32.69, 0.3),
        (1.2, 0.027 / 32.69, -0.9),
        (0.7, 0.001, 1.5),
        (3.5, 0.05, -2.0),
        (0.2, 0.1, 0.75),
        (1.0, 0.01, 0.4),
    ];

    #[test]
    fn population_exchange_symmetry() {
        for (r, q, red_freq) in CASES {
            let plus = i_plus(r, q, red_freq);
            let minus = i_minus(r.recip(), q, red_freq);
            assert_relative_eq!(plus.value, -minus.value, epsilon = 1e-14, max_relative = 1e-12);
        }
    }

    #[test]
    fn unpolarized_target_has_no_amplitude() {
        for red_freq in [-2.0_f64, -0.3, 0.0, 0.3, 2.0] {
            assert_relative_eq!(i_plus(1.0, 0.01, red_freq).value, 0.0, epsilon = 1e-15);
            assert_relative_eq!(i_minus(1.0, 0.01, red_freq).value, 0.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn overflow_saturates_to_limit() {
        let plus = i_plus(10.0_f64, 1.0, -200.0);
        assert_eq!(plus.value, -1.0);
        assert_eq!(plus.d_dr, 0.0);
        assert_eq!(plus.d_dk, 0.0);

        let minus = i_minus(10.0_f64, 1.0, 200.0);
        assert_eq!(minus.value, 1.0);
        assert_eq!(minus.d_dr, 0.0);
        assert_eq!(minus.d_dk, 0.0);
    }

    #[test]
    fn underflow_is_finite() {
        // r^(-3QR) underflows to zero, I+ = r^2 / (r^2 + 1)
        let plus = i_plus(10.0_f64, 1.0, 200.0);
        assert_relative_eq!(plus.value, 100.0 / 101.0, max_relative = 1e-14);
        assert!(plus.d_dr.is_finite());

        // r^(3QR) underflows to zero, I- = -1 / (r^2 + 1)
        let minus = i_minus(10.0_f64, 1.0, -200.0);
        assert_relative_eq!(minus.value, -1.0 / 101.0, max_relative = 1e-14);
        assert!(minus.d_dr.is_finite());
    }

    #[test]
    fn large_but_finite_power_approaches_limit() {
        let plus = i_plus(10.0_f64, 1.0, -50.0);
        assert_relative_eq!(plus.value, -1.0, epsilon = 1e-12);
        let minus = i_minus(10.0_f64, 1.0, 50.0);
        assert_relative_eq!(minus.value, 1.0, epsilon = 1e-12);
    }

    fn check_derivatives<F>(f: F)
    where
        F: Fn(
            Hyperdual<f64, 3>,
            Hyperdual<f64, 3>,
            Hyperdual<f64, 3>,
        ) -> Relaxation<Hyperdual<f64, 3>>,
        F: Copy,
    {
        for (r, q, red_freq) in CASES {
            let mut hyper_r = Hyperdual::<f64, 3>::from_real(r);
            hyper_r[1] = 1.0;
            let mut hyper_red_freq = Hyperdual::<f64, 3>::from_real(red_freq);
            hyper_red_freq[2] = 1.0;
            let hyper_q = Hyperdual::<f64, 3>::from_real(q);

            let result = f(hyper_r, hyper_q, hyper_red_freq);
            let desired_d_dr = result.value[1];
            // dI/dR = dI/dk * 3Q
            let desired_d_dk = result.value[2] / (3.0 * q);

            assert_relative_eq!(result.d_dr[0], desired_d_dr, epsilon = 1e-12, max_relative = 1e-9);
            assert_relative_eq!(result.d_dk[0], desired_d_dk, epsilon = 1e-12, max_relative = 1e-9);
        }
    }

    #[test]
    fn i_plus_derivatives() {
        check_derivatives(i_plus);
    }

    #[test]
    fn i_minus_derivatives() {
        check_derivatives(i_minus);
    }
}
