/// Error returned from [crate::Spectrum], [crate::FitBounds] and [crate::DeuteronLineshape]
/// constructors and [crate::DeuteronFit::fit]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FitError {
    #[error("arrays must have the same length, got frequency: {freq}, signal: {signal}, weight: {weight}")]
    LengthMismatch {
        freq: usize,
        signal: usize,
        weight: usize,
    },

    #[error("spectrum length {actual} is smaller than the minimum required length {minimum}")]
    ShortSpectrum { actual: usize, minimum: usize },

    #[error("spectrum contains non-finite values")]
    NonFiniteData,

    #[error("weights must be positive")]
    NonPositiveWeight,

    #[error("initial guess must be finite")]
    NonFiniteInitialGuess,

    #[error("initial guess for {name} is out of bounds")]
    InitialGuessOutOfBounds { name: &'static str },

    #[error("quadrature order {order} is out of the supported range [{min}, {max}]")]
    InvalidQuadratureOrder { order: u32, min: u32, max: u32 },

    #[error("lower bound for {name} is larger than the upper one, or one of them is NaN")]
    InvalidBounds { name: &'static str },
}
