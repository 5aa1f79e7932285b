use crate::nl_fit::bounds::clamp_to_bounds;
use crate::nl_fit::constants::PARAMETER_TOLERANCE;
use crate::nl_fit::curve_fit::{CurveFitResult, CurveFitTrait};
use crate::nl_fit::data::Data;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use ordered_float::NotNan;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

/// Residual reported at points where the model isn't finite
///
/// Large enough to reject the trial step, small enough for the squared norm not to overflow.
const REJECTED_RESIDUAL: f64 = 1e100;

/// Levenberg-Marquardt non-linear least-squares fitter
///
/// A wrapper over the MINPACK-style implementation of the `levenberg-marquardt` crate, using
/// analytic derivatives of the model with the diagonal scaling of the parameters, so parameters
/// of very different magnitudes, like the Larmor frequency and the gain, are treated alike.
///
/// Trial parameters are projected onto the bounds, parameters with equal lower and upper bounds
/// are fixed. A trial point where the model isn't finite is rejected and the trust region shrinks.
/// The fit is successful if the optimizer converged and the last trial point was finite.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename = "Lm")]
pub struct LmCurveFit {
    pub patience: u32,
    pub ftol: NotNan<f64>,
    pub xtol: NotNan<f64>,
    pub gtol: NotNan<f64>,
    pub stepbound: NotNan<f64>,
}

impl LmCurveFit {
    /// Create a new [LmCurveFit].
    ///
    /// # Arguments
    /// - `patience`: the limit of model evaluations is `patience * (NPARAMS + 1)`
    /// - `ftol`: relative tolerance on `χ²`
    /// - `xtol`: relative tolerance on parameters
    /// - `gtol`: tolerance on the cosine of the angle between the residuals and the Jacobian
    ///   columns
    /// - `stepbound`: initial trust region radius relative to the scaled parameter norm
    pub fn new(patience: u32, ftol: f64, xtol: f64, gtol: f64, stepbound: f64) -> Self {
        assert!(patience > 0, "patience must be positive");
        assert!(ftol >= 0.0 && ftol.is_finite(), "ftol must be finite and non-negative");
        assert!(xtol >= 0.0 && xtol.is_finite(), "xtol must be finite and non-negative");
        assert!(gtol >= 0.0 && gtol.is_finite(), "gtol must be finite and non-negative");
        assert!(
            stepbound > 0.0 && stepbound.is_finite(),
            "stepbound must be finite and positive"
        );
        Self {
            patience,
            ftol: NotNan::new(ftol).expect("ftol must not be NaN"),
            xtol: NotNan::new(xtol).expect("xtol must not be NaN"),
            gtol: NotNan::new(gtol).expect("gtol must not be NaN"),
            stepbound: NotNan::new(stepbound).expect("stepbound must not be NaN"),
        }
    }

    #[inline]
    pub fn default_patience() -> u32 {
        100
    }

    #[inline]
    pub fn default_ftol() -> f64 {
        1e-12
    }

    #[inline]
    pub fn default_xtol() -> f64 {
        PARAMETER_TOLERANCE
    }

    #[inline]
    pub fn default_gtol() -> f64 {
        0.0
    }

    #[inline]
    pub fn default_stepbound() -> f64 {
        100.0
    }
}

impl Default for LmCurveFit {
    fn default() -> Self {
        Self::new(
            Self::default_patience(),
            Self::default_ftol(),
            Self::default_xtol(),
            Self::default_gtol(),
            Self::default_stepbound(),
        )
    }
}

/// Weighted least-squares problem with parameters projected onto a box
struct ProjectedProblem<F, DF, const NPARAMS: usize> {
    ts: Rc<Data<f64>>,
    x: [f64; NPARAMS],
    lower: [f64; NPARAMS],
    upper: [f64; NPARAMS],
    model: F,
    derivatives: DF,
    last_trial_finite: Cell<bool>,
    non_finite_trials: Cell<usize>,
}

impl<F, DF, const NPARAMS: usize> LeastSquaresProblem<f64, Dyn, Dyn>
    for ProjectedProblem<F, DF, NPARAMS>
where
    F: Fn(f64, &[f64; NPARAMS]) -> f64,
    DF: Fn(f64, &[f64; NPARAMS], &mut [f64; NPARAMS]),
{
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        for (param, &value) in self.x.iter_mut().zip(x.iter()) {
            *param = value;
        }
        clamp_to_bounds(&mut self.x, &self.lower, &self.upper);
    }

    fn params(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.x)
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let residuals = DVector::from_iterator(
            self.ts.len(),
            self.ts
                .freq
                .iter()
                .zip(self.ts.signal.iter())
                .zip(self.ts.inv_err.iter())
                .map(|((&w, &y), &inv_err)| ((self.model)(w, &self.x) - y) * inv_err),
        );
        let finite = residuals.iter().all(|r| r.is_finite());
        self.last_trial_finite.set(finite);
        if finite {
            Some(residuals)
        } else {
            self.non_finite_trials.set(self.non_finite_trials.get() + 1);
            log::debug!("Levenberg-Marquardt: rejecting a trial point, the model isn't finite there");
            Some(DVector::from_element(self.ts.len(), REJECTED_RESIDUAL))
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jacobian = DMatrix::zeros(self.ts.len(), NPARAMS);
        let mut der = [0.0; NPARAMS];
        for (i, (&w, &inv_err)) in self.ts.freq.iter().zip(self.ts.inv_err.iter()).enumerate() {
            (self.derivatives)(w, &self.x, &mut der);
            for (j, &d) in der.iter().enumerate() {
                // Fixed parameters
                if self.lower[j] == self.upper[j] {
                    continue;
                }
                jacobian[(i, j)] = d * inv_err;
            }
        }
        if jacobian.iter().all(|d| d.is_finite()) {
            Some(jacobian)
        } else {
            log::debug!("Levenberg-Marquardt: derivatives aren't finite at the current point");
            None
        }
    }
}

impl CurveFitTrait for LmCurveFit {
    fn curve_fit<F, DF, const NPARAMS: usize>(
        &self,
        ts: Rc<Data<f64>>,
        x0: &[f64; NPARAMS],
        bounds: (&[f64; NPARAMS], &[f64; NPARAMS]),
        model: F,
        derivatives: DF,
    ) -> CurveFitResult<f64, NPARAMS>
    where
        F: 'static + Clone + Fn(f64, &[f64; NPARAMS]) -> f64,
        DF: 'static + Clone + Fn(f64, &[f64; NPARAMS], &mut [f64; NPARAMS]),
    {
        let (lower, upper) = bounds;

        let mut x = *x0;
        clamp_to_bounds(&mut x, lower, upper);

        let chi2 = ts.chi2(&model, &x);
        if !chi2.is_finite() {
            log::warn!("Levenberg-Marquardt: the model isn't finite at the initial guess");
            return CurveFitResult {
                x,
                reduced_chi2: chi2,
                success: false,
            };
        }

        let problem = ProjectedProblem {
            ts: ts.clone(),
            x,
            lower: *lower,
            upper: *upper,
            model: model.clone(),
            derivatives,
            last_trial_finite: Cell::new(true),
            non_finite_trials: Cell::new(0),
        };
        let (problem, report) = LevenbergMarquardt::new()
            .with_ftol(self.ftol.into_inner())
            .with_xtol(self.xtol.into_inner())
            .with_gtol(self.gtol.into_inner())
            .with_stepbound(self.stepbound.into_inner())
            .with_patience(self.patience as usize)
            .with_scale_diag(true)
            .minimize(problem);

        let converged = report.termination.was_successful();
        let last_trial_finite = problem.last_trial_finite.get();
        if converged && !last_trial_finite {
            log::warn!("Levenberg-Marquardt stopped at a point surrounded by non-finite model values");
        }
        log::debug!(
            "Levenberg-Marquardt finished with {:?} after {} evaluations, {} of them not finite",
            report.termination,
            report.number_of_evaluations,
            problem.non_finite_trials.get(),
        );

        let x = problem.x;
        let reduced_chi2 = ts.reduced_chi2(&model, &x);
        CurveFitResult {
            x,
            reduced_chi2,
            success: converged && last_trial_finite && reduced_chi2.is_finite(),
        }
    }
}
