use crate::nl_fit::curve_fit::{CurveFitAlgorithm, CurveFitResult, CurveFitTrait};
use crate::nl_fit::data::Data;

use cobyla::{Func, RhoBeg, StopTols, minimize};
use ordered_float::NotNan;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// COBYLA (Constrained Optimization BY Linear Approximations) non-linear least-squares wrapper
///
/// Derivative-free, the lineshape derivatives are not used. Bounds are passed to COBYLA as they
/// are. The initial change of every parameter is `rhobeg` times its absolute initial value (or
/// `rhobeg` itself for a zero initial value): lineshape parameters span many orders of magnitude,
/// a single absolute step would be either too large for the gain or too small for the Larmor
/// frequency.
///
/// Optionally, if `fine_tuning_algorithm` is `Some`, the best guess from COBYLA is sent to the
/// next optimization as an initial guess and its result is returned.
///
/// M.J.D. Powell, "A direct search optimization method that models the objective and constraint
/// functions by linear interpolation" (1994)
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename = "Cobyla")]
pub struct CobylaCurveFit {
    pub niterations: u32,
    pub rhobeg: NotNan<f64>,
    pub ftol_rel: NotNan<f64>,
    pub fine_tuning_algorithm: Option<Box<CurveFitAlgorithm>>,
}

impl CobylaCurveFit {
    /// Create a new [CobylaCurveFit].
    ///
    /// # Arguments
    /// - `niterations`: maximum number of function evaluations
    /// - `rhobeg`: initial change of parameters relative to their initial values
    /// - `ftol_rel`: relative tolerance on `χ²` for convergence
    /// - `fine_tuning_algorithm`: optional algorithm to refine COBYLA's result
    pub fn new(
        niterations: u32,
        rhobeg: f64,
        ftol_rel: f64,
        fine_tuning_algorithm: Option<CurveFitAlgorithm>,
    ) -> Self {
        assert!(niterations > 0, "niterations must be positive");
        assert!(rhobeg > 0.0, "rhobeg must be positive");
        assert!(rhobeg.is_finite(), "rhobeg must be finite");
        assert!(ftol_rel >= 0.0, "ftol_rel must be non-negative");
        assert!(ftol_rel.is_finite(), "ftol_rel must be finite");
        Self {
            niterations,
            rhobeg: NotNan::new(rhobeg).expect("rhobeg must be finite and not NaN"),
            ftol_rel: NotNan::new(ftol_rel).expect("ftol_rel must be finite and not NaN"),
            fine_tuning_algorithm: fine_tuning_algorithm.map(|x| x.into()),
        }
    }

    #[inline]
    pub fn default_niterations() -> u32 {
        5000
    }

    #[inline]
    pub fn default_rhobeg() -> f64 {
        0.1
    }

    #[inline]
    pub fn default_ftol_rel() -> f64 {
        1e-10
    }

    #[inline]
    pub fn default_fine_tuning_algorithm() -> Option<CurveFitAlgorithm> {
        None
    }

    fn initial_steps(&self, x0: &[f64]) -> Vec<f64> {
        let rhobeg = self.rhobeg.into_inner();
        x0.iter()
            .map(|&x| if x == 0.0 { rhobeg } else { rhobeg * x.abs() })
            .collect()
    }
}

impl Default for CobylaCurveFit {
    fn default() -> Self {
        Self::new(
            Self::default_niterations(),
            Self::default_rhobeg(),
            Self::default_ftol_rel(),
            Self::default_fine_tuning_algorithm(),
        )
    }
}

impl CurveFitTrait for CobylaCurveFit {
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
        let objective = {
            let ts = ts.clone();
            let model = model.clone();
            move |x: &[f64], _user_data: &mut ()| -> f64 {
                let params: &[f64; NPARAMS] = match x.try_into() {
                    Ok(params) => params,
                    Err(_) => return f64::MAX.sqrt(),
                };
                let chi2 = ts.chi2(&model, params);
                if chi2.is_finite() {
                    chi2
                } else {
                    f64::MAX.sqrt()
                }
            }
        };

        let cobyla_bounds: Vec<(f64, f64)> = bounds
            .0
            .iter()
            .zip(bounds.1.iter())
            .map(|(&lower, &upper)| (lower, upper))
            .collect();

        // No constraints besides bounds
        let constraints: Vec<&dyn Func<()>> = vec![];

        let stop_tol = StopTols {
            ftol_rel: self.ftol_rel.into(),
            ..StopTols::default()
        };

        let result = minimize(
            objective,
            x0,
            &cobyla_bounds,
            &constraints,
            (),
            self.niterations as usize,
            RhoBeg::Set(self.initial_steps(x0)),
            Some(stop_tol),
        );

        match result {
            Ok((status, x_vec, _chi2)) => {
                log::debug!("COBYLA finished with status {status:?}");
                let x: [f64; NPARAMS] = x_vec.try_into().unwrap_or(*x0);
                let success = matches!(
                    status,
                    cobyla::SuccessStatus::Success
                        | cobyla::SuccessStatus::FtolReached
                        | cobyla::SuccessStatus::XtolReached
                );
                let cobyla_result = CurveFitResult {
                    x,
                    reduced_chi2: ts.reduced_chi2(&model, &x),
                    success,
                };

                match &self.fine_tuning_algorithm {
                    Some(fine_tuning_algorithm) => fine_tuning_algorithm.curve_fit(
                        ts,
                        &cobyla_result.x,
                        bounds,
                        model,
                        derivatives,
                    ),
                    None => cobyla_result,
                }
            }
            Err((status, x_vec, _chi2)) => {
                log::warn!("COBYLA failed with status {status:?}");
                let x: [f64; NPARAMS] = x_vec.try_into().unwrap_or(*x0);
                CurveFitResult {
                    x,
                    reduced_chi2: ts.reduced_chi2(&model, &x),
                    success: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::nl_fit::LmCurveFit;

    use approx::assert_abs_diff_eq;
    use ndarray::Array1;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    fn nonlinear_func(t: f64, param: &[f64; 3]) -> f64 {
        param[1] * f64::exp(-param[0] * t) * t.powi(2) + param[2]
    }

    fn nonlinear_func_derivatives(t: f64, param: &[f64; 3], derivatives: &mut [f64; 3]) {
        derivatives[0] = -param[1] * f64::exp(-param[0] * t) * t.powi(3);
        derivatives[1] = f64::exp(-param[0] * t) * t.powi(2);
        derivatives[2] = 1.0;
    }

    fn nonlinear_data(n: usize, noise: f64) -> Rc<Data<f64>> {
        let param_true = [0.75, 2.0, 0.5];
        let mut rng = StdRng::seed_from_u64(0);
        let freq = Array1::linspace(0.0, 10.0, n);
        let signal = freq.mapv(|x| {
            let eps: f64 = rng.sample(StandardNormal);
            nonlinear_func(x, &param_true) + noise * eps
        });
        let inv_err = Array1::from_elem(n, 1.0 / noise);
        Rc::new(Data {
            freq,
            signal,
            inv_err,
        })
    }

    #[test]
    fn nonlinear() {
        const N: usize = 300;
        const NOISE: f64 = 0.5;

        let fitter = CobylaCurveFit::new(2000, 0.5, 1e-6, None);
        let result = fitter.curve_fit(
            nonlinear_data(N, NOISE),
            &[1.0, 1.0, 1.0],
            (&[0.0, 0.0, -10.0], &[10.0, 10.0, 10.0]),
            nonlinear_func,
            nonlinear_func_derivatives,
        );

        assert!(result.success, "Optimization should succeed");
        assert_abs_diff_eq!(
            &result.x[..],
            &[0.75, 2.0, 0.5][..],
            epsilon = NOISE * 3.0 / (N as f64).sqrt()
        );
    }

    #[test]
    fn simple_quadratic() {
        const N: usize = 50;

        let param_true = [1.0, 2.0, 0.5];
        let param_init = [0.5, 1.0, 0.0];

        let freq = Array1::linspace(0.0, 5.0, N);
        let signal =
            freq.mapv(|x: f64| param_true[0] + param_true[1] * x + param_true[2] * x.powi(2));
        let ts = Rc::new(Data {
            freq,
            signal,
            inv_err: Array1::ones(N),
        });

        let quadratic_func = |t: f64, p: &[f64; 3]| p[0] + p[1] * t + p[2] * t.powi(2);
        let dummy_derivatives = |_t: f64, _p: &[f64; 3], _d: &mut [f64; 3]| {};

        let fitter = CobylaCurveFit::new(2000, 0.5, 1e-9, None);
        let result = fitter.curve_fit(
            ts,
            &param_init,
            (&[f64::NEG_INFINITY; 3], &[f64::INFINITY; 3]),
            quadratic_func,
            dummy_derivatives,
        );

        assert_abs_diff_eq!(&result.x[..], &param_true[..], epsilon = 0.5);
        assert!(
            result.reduced_chi2 < 0.1,
            "Chi2 should be small for perfect fit"
        );
    }

    #[test]
    fn fine_tuning() {
        const N: usize = 300;
        const NOISE: f64 = 0.5;

        let ts = nonlinear_data(N, NOISE);
        let bounds = ([0.0, 0.0, -10.0], [10.0, 10.0, 10.0]);
        let lm = LmCurveFit::default().curve_fit(
            ts.clone(),
            &[1.0, 1.0, 1.0],
            (&bounds.0, &bounds.1),
            nonlinear_func,
            nonlinear_func_derivatives,
        );
        let fitter = CobylaCurveFit::new(200, 0.5, 1e-4, Some(LmCurveFit::default().into()));
        let result = fitter.curve_fit(
            ts,
            &[1.0, 1.0, 1.0],
            (&bounds.0, &bounds.1),
            nonlinear_func,
            nonlinear_func_derivatives,
        );
        assert!(result.success);
        assert_abs_diff_eq!(&result.x[..], &lm.x[..], epsilon = 1e-6);
    }

    #[test]
    fn relative_initial_steps() {
        let fitter = CobylaCurveFit::new(10, 0.5, 1e-6, None);
        assert_eq!(fitter.initial_steps(&[30.0, -0.5, 0.0]), vec![15.0, 0.25, 0.5]);
    }
}
