#![doc = include_str!("../README.md")]


mod data;
pub use data::Spectrum;

mod error;
pub use error::FitError;

mod fit;
pub use fit::{DeuteronFit, DeuteronFitResult, FitBounds};

mod float_trait;
pub use float_trait::LikeFloat;

pub mod lineshape;
pub use lineshape::{Branch, QUADRATURE_ORDER};

mod model;
pub use model::{
    BranchDecomposition, DeuteronLineshape, LineshapeParameters, NPARAMS, PointEvaluation,
    polarization,
};

pub mod nl_fit;
#[cfg(any(feature = "ceres-source", feature = "ceres-system"))]
pub use nl_fit::CeresCurveFit;
pub use nl_fit::{CobylaCurveFit, CurveFitAlgorithm, LmCurveFit};

mod types;

pub use ndarray;
