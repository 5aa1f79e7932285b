use crate::error::FitError;
use crate::nl_fit::Data;
use crate::types::CowArray1;

use ndarray::{Array1, Zip};

/// Observed NMR spectrum to be fitted with [DeuteronFit](crate::DeuteronFit)
///
/// `freq` are frequencies, `signal` is the measured signal and `weight` are inverse squared
/// errors of the signal. Arrays could be owned or borrowed.
#[derive(Clone, Debug)]
pub struct Spectrum<'a> {
    freq: CowArray1<'a, f64>,
    signal: CowArray1<'a, f64>,
    weight: CowArray1<'a, f64>,
}

impl<'a> Spectrum<'a> {
    /// Construct a [Spectrum] from frequencies, signal and weights
    ///
    /// All arrays must have the same length, every value must be finite and weights must be
    /// positive.
    pub fn new(
        freq: impl Into<CowArray1<'a, f64>>,
        signal: impl Into<CowArray1<'a, f64>>,
        weight: impl Into<CowArray1<'a, f64>>,
    ) -> Result<Self, FitError> {
        let freq = freq.into();
        let signal = signal.into();
        let weight = weight.into();

        if freq.len() != signal.len() || signal.len() != weight.len() {
            return Err(FitError::LengthMismatch {
                freq: freq.len(),
                signal: signal.len(),
                weight: weight.len(),
            });
        }
        let finite = Zip::from(&freq)
            .and(&signal)
            .and(&weight)
            .all(|w, y, weight| w.is_finite() && y.is_finite() && weight.is_finite());
        if !finite {
            return Err(FitError::NonFiniteData);
        }
        if weight.iter().any(|&weight| weight <= 0.0) {
            return Err(FitError::NonPositiveWeight);
        }

        Ok(Self {
            freq,
            signal,
            weight,
        })
    }

    /// Construct a [Spectrum] with unity weights
    pub fn new_without_weight(
        freq: impl Into<CowArray1<'a, f64>>,
        signal: impl Into<CowArray1<'a, f64>>,
    ) -> Result<Self, FitError> {
        let freq = freq.into();
        let weight = Array1::ones(freq.len());
        Self::new(freq, signal, weight)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.freq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }

    #[inline]
    pub fn freq(&self) -> &CowArray1<'a, f64> {
        &self.freq
    }

    #[inline]
    pub fn signal(&self) -> &CowArray1<'a, f64> {
        &self.signal
    }

    #[inline]
    pub fn weight(&self) -> &CowArray1<'a, f64> {
        &self.weight
    }

    pub(crate) fn to_fit_data(&self) -> Data<f64> {
        Data {
            freq: self.freq.to_owned(),
            signal: self.signal.to_owned(),
            inv_err: self.weight.mapv(f64::sqrt),
        }
    }
}
