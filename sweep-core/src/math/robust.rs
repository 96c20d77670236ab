use anyhow::{bail, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// M-estimator used to down-weight large residuals in iteratively reweighted least squares. Residuals beyond the
/// kernel threshold lose influence on the solution but are never removed from the problem.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RobustKernel {
    /// Plain least squares
    None,
    /// Quadratic up to `delta`, linear beyond
    Huber { delta: f64 },
    /// Heavy tailed, weight `1 / (1 + (r / scale)^2)`
    Cauchy { scale: f64 },
    /// Zero weight for residuals beyond `c`
    Tukey { c: f64 },
}

impl Default for RobustKernel {
    fn default() -> Self {
        RobustKernel::Huber { delta: 0.1 }
    }
}

impl RobustKernel {
    /// IRLS weight in `[0, 1]` for the given residual
    /// ```
    /// # use sweep_core::math::RobustKernel;
    /// let huber = RobustKernel::Huber { delta: 0.1 };
    /// assert_eq!(huber.weight(0.05), 1.0);
    /// assert_eq!(huber.weight(-0.4), 0.25);
    /// ```
    pub fn weight(&self, residual: f64) -> f64 {
        let r = residual.abs();
        match *self {
            RobustKernel::None => 1.0,
            RobustKernel::Huber { delta } => {
                if r <= delta {
                    1.0
                } else {
                    delta / r
                }
            }
            RobustKernel::Cauchy { scale } => {
                let u = r / scale;
                1.0 / (1.0 + u * u)
            }
            RobustKernel::Tukey { c } => {
                if r <= c {
                    let u = r / c;
                    let v = 1.0 - u * u;
                    v * v
                } else {
                    0.0
                }
            }
        }
    }

    /// Robust cost `rho(r)` of a single residual. Equals `r^2 / 2` near zero for every kernel
    pub fn cost(&self, residual: f64) -> f64 {
        let r = residual.abs();
        match *self {
            RobustKernel::None => 0.5 * r * r,
            RobustKernel::Huber { delta } => {
                if r <= delta {
                    0.5 * r * r
                } else {
                    delta * (r - 0.5 * delta)
                }
            }
            RobustKernel::Cauchy { scale } => {
                let u = r / scale;
                0.5 * scale * scale * (1.0 + u * u).ln()
            }
            RobustKernel::Tukey { c } => {
                let c_sq_6 = c * c / 6.0;
                if r <= c {
                    let v = 1.0 - (r / c) * (r / c);
                    c_sq_6 * (1.0 - v * v * v)
                } else {
                    c_sq_6
                }
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let param = match *self {
            RobustKernel::None => return Ok(()),
            RobustKernel::Huber { delta } => delta,
            RobustKernel::Cauchy { scale } => scale,
            RobustKernel::Tukey { c } => c,
        };
        if !(param > 0.0 && param.is_finite()) {
            bail!("Robust kernel parameter must be positive and finite, got {:?}", self);
        }
        Ok(())
    }
}
