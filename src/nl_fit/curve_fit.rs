use crate::nl_fit::cobyla::CobylaCurveFit;
use crate::nl_fit::data::Data;
use crate::nl_fit::lm::LmCurveFit;

#[cfg(any(feature = "ceres-source", feature = "ceres-system"))]
use crate::nl_fit::CeresCurveFit;

use enum_dispatch::enum_dispatch;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct CurveFitResult<T, const NPARAMS: usize> {
    pub x: [T; NPARAMS],
    pub reduced_chi2: T,
    pub success: bool,
}

#[enum_dispatch]
pub trait CurveFitTrait: Clone + Debug + Serialize + DeserializeOwned {
    /// Minimize `Σ ((model(w, x) - signal) inv_err)²` over `x` starting from `x0`
    ///
    /// `bounds` are lower and upper limits of every parameter, infinite values mean no limit.
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
        DF: 'static + Clone + Fn(f64, &[f64; NPARAMS], &mut [f64; NPARAMS]);
}

/// Optimization algorithm of the lineshape fit
#[enum_dispatch(CurveFitTrait)]
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CurveFitAlgorithm {
    #[cfg(any(feature = "ceres-source", feature = "ceres-system"))]
    Ceres(CeresCurveFit),
    Cobyla(CobylaCurveFit),
    Lm(LmCurveFit),
}

impl Default for CurveFitAlgorithm {
    fn default() -> Self {
        LmCurveFit::default().into()
    }
}
