use crate::data::Spectrum;
use crate::error::FitError;
use crate::model::{DeuteronLineshape, LineshapeParameters, NPARAMS, polarization};
use crate::nl_fit::bounds::within_bounds;
use crate::nl_fit::{CurveFitAlgorithm, CurveFitTrait, NormalEquations};

use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Lower and upper limits of the fitted parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "FitBoundsParameters", try_from = "FitBoundsParameters")]
pub struct FitBounds {
    lower: LineshapeParameters,
    upper: LineshapeParameters,
}

impl FitBounds {
    /// Create new [FitBounds], every lower limit must not exceed the upper one
    ///
    /// Infinite values are allowed and mean no limit.
    pub fn new(lower: LineshapeParameters, upper: LineshapeParameters) -> Result<Self, FitError> {
        let names = LineshapeParameters::names();
        for ((lo, up), name) in lower.to_array().into_iter().zip(upper.to_array()).zip(names) {
            if lo.is_nan() || up.is_nan() || lo > up {
                return Err(FitError::InvalidBounds { name });
            }
        }
        Ok(Self { lower, upper })
    }

    /// No limits at all
    pub fn unbounded() -> Self {
        Self {
            lower: [f64::NEG_INFINITY; NPARAMS].into(),
            upper: [f64::INFINITY; NPARAMS].into(),
        }
    }

    #[inline]
    pub fn lower(&self) -> &LineshapeParameters {
        &self.lower
    }

    #[inline]
    pub fn upper(&self) -> &LineshapeParameters {
        &self.upper
    }
}

impl Default for FitBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl JsonSchema for FitBounds {
    fn is_referenceable() -> bool {
        false
    }

    fn schema_name() -> String {
        FitBoundsParameters::schema_name()
    }

    fn json_schema(r#gen: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        FitBoundsParameters::json_schema(r#gen)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "FitBounds")]
struct FitBoundsParameters {
    lower: LineshapeParameters,
    upper: LineshapeParameters,
}

impl From<FitBounds> for FitBoundsParameters {
    fn from(bounds: FitBounds) -> Self {
        Self {
            lower: bounds.lower,
            upper: bounds.upper,
        }
    }
}

impl TryFrom<FitBoundsParameters> for FitBounds {
    type Error = FitError;

    fn try_from(parameters: FitBoundsParameters) -> Result<Self, Self::Error> {
        Self::new(parameters.lower, parameters.upper)
    }
}

/// Result of [DeuteronFit::fit]
#[derive(Clone, Debug, PartialEq)]
pub struct DeuteronFitResult {
    /// Best-fit parameters
    pub params: LineshapeParameters,
    /// Standard errors of the parameters, `None` if the covariance matrix can't be estimated.
    /// A parameter the model doesn't depend on at the optimum, like `eta` close to zero, gets NaN.
    pub stderr: Option<LineshapeParameters>,
    /// `χ²` divided by the number of degrees of freedom
    pub reduced_chi2: f64,
    /// Whether the optimizer reports convergence
    pub success: bool,
    /// Model evaluated at [DeuteronFitResult::params] on the spectrum frequencies
    pub best_fit: Array1<f64>,
}

impl DeuteronFitResult {
    /// Vector polarization of the best-fit relaxation ratio
    pub fn polarization(&self) -> f64 {
        polarization(self.params.r)
    }

    /// Standard error of [DeuteronFitResult::polarization] propagated from the error of `r`
    pub fn polarization_stderr(&self) -> Option<f64> {
        let r = self.params.r;
        let denominator = r * r + r + 1.0;
        let dp_dr = (r * r + 4.0 * r + 1.0) / (denominator * denominator);
        self.stderr.map(|stderr| (dp_dr * stderr.r).abs())
    }
}

/// Weighted least-squares fit of [DeuteronLineshape] to a [Spectrum]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeuteronFit {
    algorithm: CurveFitAlgorithm,
    lineshape: DeuteronLineshape,
    bounds: FitBounds,
}

impl DeuteronFit {
    pub fn new(
        algorithm: CurveFitAlgorithm,
        lineshape: DeuteronLineshape,
        bounds: FitBounds,
    ) -> Self {
        Self {
            algorithm,
            lineshape,
            bounds,
        }
    }

    #[inline]
    pub fn default_algorithm() -> CurveFitAlgorithm {
        CurveFitAlgorithm::default()
    }

    #[inline]
    pub fn default_lineshape() -> DeuteronLineshape {
        DeuteronLineshape::default()
    }

    #[inline]
    pub fn default_bounds() -> FitBounds {
        FitBounds::default()
    }

    #[inline]
    pub fn algorithm(&self) -> &CurveFitAlgorithm {
        &self.algorithm
    }

    #[inline]
    pub fn lineshape(&self) -> &DeuteronLineshape {
        &self.lineshape
    }

    #[inline]
    pub fn bounds(&self) -> &FitBounds {
        &self.bounds
    }

    /// Minimum spectrum length, one point more than the number of parameters
    #[inline]
    pub fn min_spectrum_length() -> usize {
        NPARAMS + 1
    }

    /// Fit the lineshape to `spectrum` starting from `init`
    ///
    /// `init` must be finite and within the bounds. Optimizer failures are not errors, they are
    /// reported by [DeuteronFitResult::success].
    pub fn fit(
        &self,
        spectrum: &Spectrum,
        init: &LineshapeParameters,
    ) -> Result<DeuteronFitResult, FitError> {
        if spectrum.len() < Self::min_spectrum_length() {
            return Err(FitError::ShortSpectrum {
                actual: spectrum.len(),
                minimum: Self::min_spectrum_length(),
            });
        }
        if !init.is_finite() {
            return Err(FitError::NonFiniteInitialGuess);
        }
        let x0 = init.to_array();
        let lower = self.bounds.lower.to_array();
        let upper = self.bounds.upper.to_array();
        if !within_bounds(&x0, &lower, &upper) {
            let name = LineshapeParameters::names()
                .into_iter()
                .zip(x0.iter().zip(lower.iter().zip(upper.iter())))
                .find_map(|(name, (x, (lo, up)))| (x < lo || x > up).then_some(name))
                .unwrap_or("unknown");
            return Err(FitError::InitialGuessOutOfBounds { name });
        }

        let ts = Rc::new(spectrum.to_fit_data());
        let lineshape = self.lineshape;
        let model = move |w: f64, x: &[f64; NPARAMS]| lineshape.model(w, x);
        let derivatives =
            move |w: f64, x: &[f64; NPARAMS], jac: &mut [f64; NPARAMS]| lineshape.derivatives(w, x, jac);

        let result = self.algorithm.curve_fit(
            ts.clone(),
            &x0,
            (&lower, &upper),
            model,
            derivatives,
        );
        if !result.success {
            log::warn!("lineshape fit hasn't converged, reduced chi2 = {}", result.reduced_chi2);
        }

        let stderr = NormalEquations::new(&ts, &result.x, &model, &derivatives)
            .and_then(|ne| ne.standard_errors(result.reduced_chi2))
            .map(LineshapeParameters::from);
        if stderr.is_none() {
            log::debug!("covariance matrix of the lineshape fit can't be estimated");
        }

        let params = LineshapeParameters::from(result.x);
        let best_fit = lineshape.evaluate(&ts.freq, &params);
        log::debug!(
            "lineshape fit finished: {params:?}, reduced chi2 = {}, polarization = {}",
            result.reduced_chi2,
            params.polarization()
        );

        Ok(DeuteronFitResult {
            params,
            stderr,
            reduced_chi2: result.reduced_chi2,
            success: result.success,
            best_fit,
        })
    }
}

impl Default for DeuteronFit {
    fn default() -> Self {
        Self::new(
            Self::default_algorithm(),
            Self::default_lineshape(),
            Self::default_bounds(),
        )
    }
}
