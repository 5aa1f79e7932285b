use crate::nl_fit::constants::PARAMETER_TOLERANCE;
use crate::nl_fit::curve_fit::{CurveFitResult, CurveFitTrait};
use crate::nl_fit::data::Data;

use ceres_solver::{CurveFitProblem1D, CurveFunctionType, LossFunction, SolverOptions};
use ordered_float::NotNan;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Ceres-Solver non-linear least-squares wrapper
///
/// Requires `ceres-source` or `ceres-system` Cargo feature
///
/// Trust-region fitter using the analytic lineshape derivatives. It supports bounds.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename = "Ceres")]
pub struct CeresCurveFit {
    niterations: u16,
    loss_factor: Option<NotNan<f64>>,
}

impl CeresCurveFit {
    /// Create a new [CeresCurveFit].
    ///
    /// # Arguments
    /// - `niterations`: number of iterations
    /// - `loss_factor`: if specified, use Cauchy loss function with the given factor to transform
    ///   the squared norm of the residuals. This is useful to reduce the influence of spikes.
    pub fn new(niterations: u16, loss_factor: Option<f64>) -> Self {
        let loss_factor = loss_factor.map(|loss_factor| {
            assert!(loss_factor > 0.0, "loss_factor must be positive");
            NotNan::new(loss_factor).expect("loss_factor must not be NaN")
        });
        Self {
            niterations,
            loss_factor,
        }
    }

    #[inline]
    pub fn default_niterations() -> u16 {
        50
    }

    #[inline]
    pub fn default_loss_factor() -> Option<f64> {
        None
    }
}

impl Default for CeresCurveFit {
    fn default() -> Self {
        Self::new(Self::default_niterations(), Self::default_loss_factor())
    }
}

impl CurveFitTrait for CeresCurveFit {
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
        let func: CurveFunctionType = {
            let model = model.clone();
            Box::new(move |w, parameters, y, jacobians| {
                let Ok(parameters) = parameters.try_into() else {
                    return false;
                };
                *y = model(w, parameters);
                if !y.is_finite() {
                    *y = f64::MAX.sqrt();
                    return false;
                }
                if let Some(jacobians) = jacobians {
                    let Ok(jacobians): Result<&mut [_; NPARAMS], _> = jacobians.try_into() else {
                        return false;
                    };
                    let der = {
                        let mut der = [0.0; NPARAMS];
                        derivatives(w, parameters, &mut der);
                        der
                    };
                    for (input, output) in der.into_iter().zip(jacobians.iter_mut()) {
                        if let Some(output) = output {
                            if !input.is_finite() {
                                return false;
                            }
                            *output = input;
                        }
                    }
                }
                true
            })
        };

        let lower_bounds: Vec<_> = bounds.0.iter().map(|&v| v.is_finite().then_some(v)).collect();
        let upper_bounds: Vec<_> = bounds.1.iter().map(|&v| v.is_finite().then_some(v)).collect();

        let options = SolverOptions::builder()
            .parameter_tolerance(PARAMETER_TOLERANCE)
            .max_num_iterations(self.niterations as i32)
            .build()
            .expect("solver options must be valid");

        let freq = ts.freq.to_vec();
        let signal = ts.signal.to_vec();
        let inv_err = ts.inv_err.to_vec();
        let mut problem_builder = CurveFitProblem1D::builder()
            .x(&freq)
            .y(&signal)
            .inverse_error(&inv_err)
            .func(func)
            .parameters(x0)
            .lower_bounds(&lower_bounds)
            .upper_bounds(&upper_bounds);
        if let Some(loss_factor) = self.loss_factor {
            problem_builder = problem_builder.loss(LossFunction::cauchy(loss_factor.into_inner()));
        };
        let x0 = *x0;
        let (x, success) = match problem_builder.build() {
            Ok(problem) => {
                let solution = problem.solve(&options);
                let success = solution.summary.is_solution_usable();
                log::debug!("Ceres finished, solution is usable: {success}");
                (solution.parameters.try_into().unwrap_or(x0), success)
            }
            Err(err) => {
                log::warn!("Ceres problem can't be built: {err}");
                (x0, false)
            }
        };

        CurveFitResult {
            x,
            reduced_chi2: ts.reduced_chi2(&model, &x),
            success,
        }
    }
}
