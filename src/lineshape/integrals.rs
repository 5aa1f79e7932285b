use crate::float_trait::LikeFloat;

/// Four closed-form integral combinations for one angular sample of one branch
///
/// `i1` and `i2` are the real and imaginary parts of the complex line integral, `i3` and `i4` are
/// `-(1 / 2A) d/dA` of them. [super::f_and_derivs] builds the lineshape and its derivatives from
/// these values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegralResult<T> {
    pub i1: T,
    pub i2: T,
    pub i3: T,
    pub i4: T,
}

/// Evaluate the integral kernel
///
/// - `red_freq`: reduced frequency `R`
/// - `a`: broadening `A`, must be positive
/// - `eps`: branch sign, `+1` or `-1`
/// - `y2`: squared upper limit `Y^2`, positive
/// - `etac2p`: angular shift `eta cos(2 phi)` of the resonance position
///
/// Arguments of square roots and of the logarithm are clamped to their domain: they leave it only
/// by rounding when `|cos a| ~ 1`.
pub fn integrals<T>(red_freq: T, a: T, eps: T, y2: T, etac2p: T) -> IntegralResult<T>
where
    T: LikeFloat,
{
    let y = y2.sqrt();
    let y_x2 = T::two() * y;
    let z2 = T::one() - eps * red_freq - etac2p;
    let a2 = a * a;
    let q4 = z2 * z2 + a2;
    let q2 = q4.sqrt();
    let qq = q2.sqrt();

    let cosa = z2 / q2;
    let cosa_2 = (T::half() * (T::one() + cosa)).max(T::zero()).sqrt();
    let sina_2 = (T::half() * (T::one() - cosa)).max(T::zero()).sqrt();

    let f_tmp = y2 + q2;
    let f_val = y_x2 * qq * cosa_2;

    // sina_2 * ln(...) vanishes when A -> 0, while the logarithm itself diverges
    let la = if sina_2 > T::zero() {
        T::half() * sina_2 * ((f_tmp + f_val) / (f_tmp - f_val).max(T::zero())).ln()
    } else {
        T::zero()
    };
    let ta = cosa_2 * (T::half() * T::pi() + (y2 - q2).atan2(y_x2 * qq * sina_2));
    let arg = y2 * (y2 - T::two() * z2) + q4;
    let y_arg = y / arg;

    let i1 = (ta + la) / (T::two() * qq * a);
    let i2 = (ta - la) * qq / (T::two() * a);
    let i3 = (z2 * i2 + (T::two() * a2 + q4) * i1 + y_arg * (y2 * z2 + T::two() * a2 - q4))
        / (T::four() * a2 * q4);
    let i4 = (y_arg * (y2 - z2) + z2 * i1 + i2) / (T::four() * a2);

    IntegralResult { i1, i2, i3, i4 }
}
