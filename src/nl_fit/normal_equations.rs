use crate::nl_fit::data::Data;

use nalgebra::{DMatrix, DVector};

/// Weighted least-squares normal equations at a parameter point
///
/// Holds `JᵀJ` and `Jᵀr` for the weighted Jacobian `J` and the weighted residual vector `r`
/// together with `χ² = rᵀr`.
#[derive(Clone, Debug)]
pub struct NormalEquations<const NPARAMS: usize> {
    pub jtj: DMatrix<f64>,
    pub jtr: DVector<f64>,
    pub chi2: f64,
}

impl<const NPARAMS: usize> NormalEquations<NPARAMS> {
    /// Build the normal equations, [None] if the model or any of its derivatives is not finite
    pub fn new<F, DF>(ts: &Data<f64>, x: &[f64; NPARAMS], model: &F, derivatives: &DF) -> Option<Self>
    where
        F: Fn(f64, &[f64; NPARAMS]) -> f64,
        DF: Fn(f64, &[f64; NPARAMS], &mut [f64; NPARAMS]),
    {
        let mut jtj = DMatrix::zeros(NPARAMS, NPARAMS);
        let mut jtr = DVector::zeros(NPARAMS);
        let mut chi2 = 0.0;
        let mut der = [0.0; NPARAMS];
        for ((&w, &y), &inv_err) in ts.freq.iter().zip(ts.signal.iter()).zip(ts.inv_err.iter()) {
            let residual = (model(w, x) - y) * inv_err;
            derivatives(w, x, &mut der);
            if !residual.is_finite() || der.iter().any(|d| !d.is_finite()) {
                return None;
            }
            chi2 += residual * residual;
            for i in 0..NPARAMS {
                let j_i = der[i] * inv_err;
                jtr[i] += j_i * residual;
                for j in 0..=i {
                    jtj[(i, j)] += j_i * der[j] * inv_err;
                }
            }
        }
        for i in 0..NPARAMS {
            for j in 0..i {
                jtj[(j, i)] = jtj[(i, j)];
            }
        }
        Some(Self { jtj, jtr, chi2 })
    }

    /// Standard errors `sqrt(diag((JᵀJ)⁻¹) · χ²_red)`
    ///
    /// Parameters the model doesn't depend on here get NaN. [None] if the matrix of the rest of the
    /// parameters can't be inverted.
    pub fn standard_errors(&self, reduced_chi2: f64) -> Option<[f64; NPARAMS]> {
        let active: Vec<usize> = (0..NPARAMS).filter(|&i| self.jtj[(i, i)] > 0.0).collect();
        let scales: Vec<f64> = active.iter().map(|&i| self.jtj[(i, i)].sqrt().recip()).collect();
        let reduced = DMatrix::from_fn(active.len(), active.len(), |i, j| {
            self.jtj[(active[i], active[j])] * scales[i] * scales[j]
        });
        let covariance = reduced.cholesky()?.inverse();
        let mut stderr = [f64::NAN; NPARAMS];
        for (k, &i) in active.iter().enumerate() {
            stderr[i] = (covariance[(k, k)] * reduced_chi2).sqrt() * scales[k];
        }
        Some(stderr)
    }
}
