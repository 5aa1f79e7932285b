//! Non-linear least-squares fitting infrastructure
//!
//! The optimizers minimize `χ² = Σ ((model(w, x) - signal) inv_err)²` over the parameter array `x`,
//! where `inv_err` is the square root of the spectrum weight. Every optimizer gets the same
//! inputs: the [Data], an initial guess, lower and upper bounds, the model and its analytic
//! derivatives, see [CurveFitTrait].
//!
//! # Curve Fit Algorithms
//!
//! - [LmCurveFit]: Levenberg-Marquardt of the `levenberg-marquardt` crate. Uses derivatives.
//! - [CobylaCurveFit]: COBYLA. Derivative-free, may be chained with another algorithm.
//! - [`CeresCurveFit`] (requires `ceres-source` or `ceres-system`): Trust-region. Uses derivatives.
//!
//! [NormalEquations] gives standard errors of the fitted parameters from the Jacobian at the
//! optimum, whichever algorithm found it.

pub(crate) mod bounds;

#[cfg(any(feature = "ceres-source", feature = "ceres-system"))]
pub mod ceres;
#[cfg(any(feature = "ceres-source", feature = "ceres-system"))]
pub use ceres::CeresCurveFit;

pub mod cobyla;
pub use cobyla::CobylaCurveFit;

mod constants;

pub mod curve_fit;
pub use curve_fit::{CurveFitAlgorithm, CurveFitResult, CurveFitTrait};

pub mod data;
pub use data::Data;

pub mod lm;
pub use lm::LmCurveFit;

pub mod normal_equations;
pub use normal_equations::NormalEquations;
