use ndarray::Array1;

/// Spectrum as the optimizers see it
///
/// `inv_err` is the square root of the spectrum weight, so that the weighted residual is
/// `(model - signal) * inv_err`.
#[derive(Clone, Debug)]
pub struct Data<T> {
    pub freq: Array1<T>,
    pub signal: Array1<T>,
    pub inv_err: Array1<T>,
}

impl Data<f64> {
    #[inline]
    pub fn len(&self) -> usize {
        self.freq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }

    /// Sum of squared weighted residuals
    ///
    /// Infinity is returned if the model gives a non-finite value at any point.
    pub fn chi2<F, const NPARAMS: usize>(&self, model: &F, x: &[f64; NPARAMS]) -> f64
    where
        F: Fn(f64, &[f64; NPARAMS]) -> f64,
    {
        let chi2 = ndarray::Zip::from(&self.freq)
            .and(&self.signal)
            .and(&self.inv_err)
            .fold(0.0, |acc, &w, &y, &inv_err| {
                acc + ((model(w, x) - y) * inv_err).powi(2)
            });
        if chi2.is_finite() {
            chi2
        } else {
            f64::INFINITY
        }
    }

    /// Number of degrees of freedom of the fit
    #[inline]
    pub fn dof<const NPARAMS: usize>(&self) -> usize {
        self.len().saturating_sub(NPARAMS)
    }

    /// [Data::chi2] divided by the number of degrees of freedom
    pub fn reduced_chi2<F, const NPARAMS: usize>(&self, model: &F, x: &[f64; NPARAMS]) -> f64
    where
        F: Fn(f64, &[f64; NPARAMS]) -> f64,
    {
        self.chi2(model, x) / self.dof::<NPARAMS>() as f64
    }
}
