use crate::error::FitError;
use crate::float_trait::LikeFloat;
use crate::lineshape::{
    Branch, MAX_QUADRATURE_ORDER, MIN_QUADRATURE_ORDER, QUADRATURE_ORDER, reduced_frequency,
};

use macro_const::macro_const;

use ndarray::{Array1, Array2, ArrayView1, AsArray, Zip};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of the lineshape parameters
pub const NPARAMS: usize = 7;

/// Parameters of the deuteron lineshape
///
/// The optimizer sees them as `[A, G, r, wQ, wL, eta, xi]`, see [LineshapeParameters::to_array].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineshapeParameters {
    /// Broadening, positive
    #[serde(rename = "A")]
    pub a: f64,
    /// Overall gain, may be negative
    #[serde(rename = "G")]
    pub g: f64,
    /// Relaxation ratio, `r > 1` means positive polarization
    pub r: f64,
    /// Quadrupole frequency
    #[serde(rename = "wQ")]
    pub w_q: f64,
    /// Larmor frequency
    #[serde(rename = "wL")]
    pub w_l: f64,
    /// Asymmetry parameter of the electric field gradient
    pub eta: f64,
    /// False asymmetry
    pub xi: f64,
}

impl LineshapeParameters {
    pub fn names() -> [&'static str; NPARAMS] {
        ["A", "G", "r", "wQ", "wL", "eta", "xi"]
    }

    pub fn to_array(&self) -> [f64; NPARAMS] {
        [
            self.a, self.g, self.r, self.w_q, self.w_l, self.eta, self.xi,
        ]
    }

    pub fn from_array(x: &[f64; NPARAMS]) -> Self {
        let [a, g, r, w_q, w_l, eta, xi] = *x;
        Self {
            a,
            g,
            r,
            w_q,
            w_l,
            eta,
            xi,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|x| x.is_finite())
    }

    /// Vector polarization corresponding to [LineshapeParameters::r]
    #[inline]
    pub fn polarization(&self) -> f64 {
        polarization(self.r)
    }
}

impl From<[f64; NPARAMS]> for LineshapeParameters {
    fn from(x: [f64; NPARAMS]) -> Self {
        Self::from_array(&x)
    }
}

impl From<LineshapeParameters> for [f64; NPARAMS] {
    fn from(params: LineshapeParameters) -> Self {
        params.to_array()
    }
}

/// Vector polarization `P = (r^2 - 1) / (r^2 + r + 1)` of a spin-1 system with relaxation ratio `r`
///
/// `P` grows monotonically with positive `r` from `-1` at `r -> 0` to `1` at `r -> ∞` and is zero
/// for `r = 1`.
#[inline]
pub fn polarization(r: f64) -> f64 {
    (r * r - 1.0) / (r * r + r + 1.0)
}

/// Model value, branch contributions and the analytic Jacobian at a single frequency
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointEvaluation<T> {
    /// Predicted signal
    pub value: T,
    /// Contribution of the "minus" branch, `fAsym G I- F-`
    pub minus: T,
    /// Contribution of the "plus" branch, `fAsym G I+ F+`
    pub plus: T,
    /// Derivatives of `value` over `[A, G, r, wQ, wL, eta, xi]`
    pub jacobian: [T; NPARAMS],
}

/// Predicted signal split by branches
#[derive(Clone, Debug, PartialEq)]
pub struct BranchDecomposition {
    pub total: Array1<f64>,
    pub minus: Array1<f64>,
    pub plus: Array1<f64>,
}

macro_const! {
    const DOC: &str = r#"
Deuteron (spin-1) NMR lineshape

The signal at frequency $w$ is

$$
y(w) = \left(1 + \frac{\xi}{2} (1 + R)\right) G \left(I_-(r, Q, R) F_-(R) + I_+(r, Q, R) F_+(R)\right),
$$

where $R = (w - w_L) / 3 w_Q$ is the reduced frequency, $Q = w_Q / w_L$, $I_\pm$ are relaxation
amplitudes of the branches and $F_\pm$ are branch lineshapes integrated over the asymmetry angle
and divided by $w_Q$.

C. Dulya et al., "A line-shape analysis for spin-1 NMR signals", NIM A 398 (1997) 109-125

- Parameters: $A$, $G$, $r$, $w_Q$, $w_L$, $\eta$, $\xi$
- Analytic derivatives over all of them are available

"#;
}

#[doc = DOC!()]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    into = "DeuteronLineshapeParameters",
    try_from = "DeuteronLineshapeParameters"
)]
pub struct DeuteronLineshape {
    quadrature_order: u32,
}

impl DeuteronLineshape {
    /// New [DeuteronLineshape] instance
    ///
    /// `quadrature_order` is the number of dyadic refinement levels of the angular integration,
    /// the asymmetry angle is divided into `2^quadrature_order` intervals.
    ///
    /// # Panics
    ///
    /// If `quadrature_order` is out of `[MIN_QUADRATURE_ORDER, MAX_QUADRATURE_ORDER]`, see
    /// [DeuteronLineshape::try_new] for a fallible version
    pub fn new(quadrature_order: u32) -> Self {
        assert!(
            (MIN_QUADRATURE_ORDER..=MAX_QUADRATURE_ORDER).contains(&quadrature_order),
            "quadrature_order must be in [{MIN_QUADRATURE_ORDER}, {MAX_QUADRATURE_ORDER}]"
        );
        Self { quadrature_order }
    }

    /// New [DeuteronLineshape] instance, an error for an unsupported `quadrature_order`
    pub fn try_new(quadrature_order: u32) -> Result<Self, FitError> {
        if (MIN_QUADRATURE_ORDER..=MAX_QUADRATURE_ORDER).contains(&quadrature_order) {
            Ok(Self { quadrature_order })
        } else {
            Err(FitError::InvalidQuadratureOrder {
                order: quadrature_order,
                min: MIN_QUADRATURE_ORDER,
                max: MAX_QUADRATURE_ORDER,
            })
        }
    }

    #[inline]
    pub fn default_quadrature_order() -> u32 {
        QUADRATURE_ORDER
    }

    #[inline]
    pub fn quadrature_order(&self) -> u32 {
        self.quadrature_order
    }

    pub fn doc() -> &'static str {
        DOC
    }

    /// Evaluate the model and its Jacobian at frequency `w`
    ///
    /// `params` is `[A, G, r, wQ, wL, eta, xi]`. Nothing is checked: unphysical parameters give
    /// whatever the formulas produce, including NaN and infinities.
    pub fn point<T>(&self, w: T, params: &[T; NPARAMS]) -> PointEvaluation<T>
    where
        T: LikeFloat,
    {
        let [a, g, r, w_q, w_l, eta, xi] = *params;
        let red_freq = reduced_frequency(w, w_l, w_q);
        let q = w_q / w_l;

        let mut s = T::zero();
        let mut parts = [T::zero(); 2];
        let mut ds_da = T::zero();
        let mut ds_dr = T::zero();
        let mut ds_deta = T::zero();
        let mut ds_dred_freq = T::zero();
        let mut ds_dk = T::zero();
        for (branch, part) in Branch::BOTH.into_iter().zip(parts.iter_mut()) {
            let amp = branch.relaxation(r, q, red_freq);
            let f = branch.lineshape(red_freq, a, eta, self.quadrature_order) / w_q;
            *part = amp.value * f.ff;
            s += *part;
            ds_da += amp.value * f.dfda;
            ds_dr += amp.d_dr * f.ff;
            ds_deta += amp.value * f.dfdeta;
            ds_dred_freq += amp.value * f.dfdr;
            ds_dk += amp.d_dk * f.ff;
        }

        let half_xi = T::half() * xi;
        let f_asym = T::one() + half_xi * (T::one() + red_freq);
        let gain = f_asym * g;

        // k = 3 Q R = (w - wL) / wL doesn't depend on wQ, F = F(R) / wQ does
        let dred_freq_dwq = -red_freq / w_q;
        let dred_freq_dwl = -(T::three() * w_q).recip();
        let dk_dwl = T::three() * (q * dred_freq_dwl - red_freq * q / w_l);

        let jacobian = [
            gain * ds_da,
            f_asym * s,
            gain * ds_dr,
            half_xi * g * s * dred_freq_dwq + gain * (ds_dred_freq * dred_freq_dwq - s / w_q),
            half_xi * g * s * dred_freq_dwl + gain * (ds_dred_freq * dred_freq_dwl + ds_dk * dk_dwl),
            gain * ds_deta,
            T::half() * (T::one() + red_freq) * g * s,
        ];

        PointEvaluation {
            value: gain * s,
            minus: gain * parts[0],
            plus: gain * parts[1],
            jacobian,
        }
    }

    /// Model value at a single frequency
    #[inline]
    pub fn model(&self, w: f64, params: &[f64; NPARAMS]) -> f64 {
        self.point(w, params).value
    }

    /// Analytic derivatives over `[A, G, r, wQ, wL, eta, xi]` at a single frequency
    #[inline]
    pub fn derivatives(&self, w: f64, params: &[f64; NPARAMS], jac: &mut [f64; NPARAMS]) {
        *jac = self.point(w, params).jacobian;
    }

    /// Model value and its derivatives at a single frequency
    #[inline]
    pub fn value_and_derivatives(
        &self,
        w: f64,
        params: &LineshapeParameters,
    ) -> (f64, [f64; NPARAMS]) {
        let point = self.point(w, &params.to_array());
        (point.value, point.jacobian)
    }

    /// Predicted signal at every frequency, in the same order
    pub fn evaluate<'a>(
        &self,
        freq: impl AsArray<'a, f64>,
        params: &LineshapeParameters,
    ) -> Array1<f64> {
        let freq: ArrayView1<f64> = freq.into();
        let params = params.to_array();
        freq.mapv(|w| self.model(w, &params))
    }

    /// Same as [DeuteronLineshape::evaluate] but frequency points are evaluated in parallel
    pub fn evaluate_par<'a>(
        &self,
        freq: impl AsArray<'a, f64>,
        params: &LineshapeParameters,
    ) -> Array1<f64> {
        let freq: ArrayView1<f64> = freq.into();
        let params = params.to_array();
        Zip::from(&freq).par_map_collect(|&w| self.model(w, &params))
    }

    /// Predicted signal together with the contributions of both branches
    pub fn evaluate_branches<'a>(
        &self,
        freq: impl AsArray<'a, f64>,
        params: &LineshapeParameters,
    ) -> BranchDecomposition {
        let freq: ArrayView1<f64> = freq.into();
        let params = params.to_array();
        let mut total = Array1::zeros(freq.len());
        let mut minus = Array1::zeros(freq.len());
        let mut plus = Array1::zeros(freq.len());
        Zip::from(&freq)
            .and(&mut total)
            .and(&mut minus)
            .and(&mut plus)
            .for_each(|&w, total, minus, plus| {
                let point = self.point(w, &params);
                *total = point.value;
                *minus = point.minus;
                *plus = point.plus;
            });
        BranchDecomposition { total, minus, plus }
    }

    /// Jacobian matrix, a row per frequency and a column per parameter
    pub fn jacobian<'a>(
        &self,
        freq: impl AsArray<'a, f64>,
        params: &LineshapeParameters,
    ) -> Array2<f64> {
        let freq: ArrayView1<f64> = freq.into();
        let params = params.to_array();
        let mut jac = Array2::zeros((freq.len(), NPARAMS));
        Zip::from(jac.rows_mut())
            .and(&freq)
            .for_each(|mut row, &w| {
                row.assign(&ArrayView1::from(&self.point(w, &params).jacobian));
            });
        jac
    }
}

impl Default for DeuteronLineshape {
    fn default() -> Self {
        Self::new(Self::default_quadrature_order())
    }
}

impl JsonSchema for DeuteronLineshape {
    fn is_referenceable() -> bool {
        false
    }

    fn schema_name() -> String {
        DeuteronLineshapeParameters::schema_name()
    }

    fn json_schema(r#gen: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        DeuteronLineshapeParameters::json_schema(r#gen)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "DeuteronLineshape")]
struct DeuteronLineshapeParameters {
    quadrature_order: u32,
}

impl From<DeuteronLineshape> for DeuteronLineshapeParameters {
    fn from(lineshape: DeuteronLineshape) -> Self {
        Self {
            quadrature_order: lineshape.quadrature_order,
        }
    }
}

impl TryFrom<DeuteronLineshapeParameters> for DeuteronLineshape {
    type Error = FitError;

    fn try_from(parameters: DeuteronLineshapeParameters) -> Result<Self, Self::Error> {
        Self::try_new(parameters.quadrature_order)
    }
}
