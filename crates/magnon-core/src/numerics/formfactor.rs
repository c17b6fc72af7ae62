//! Magnetic form factor evaluators.
//!
//! The standard `<j0>` parametrization is a sum of three Gaussians plus a
//! constant in `s = |Q| / 4pi`:
//! `F(s) = A exp(-a s^2) + B exp(-b s^2) + C exp(-c s^2) + D`.

use crate::common::constants::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormFactorCoefficients {
    /// (amplitude, exponent) pairs of the Gaussian terms.
    pub gaussians: [(f64, f64); 3],
    pub constant: f64,
}

impl FormFactorCoefficients {
    pub fn new(gaussians: [(f64, f64); 3], constant: f64) -> Self {
        Self { gaussians, constant }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormFactor {
    /// Q-independent scale, mostly for tests and ions without tabulated data.
    Constant(f64),
    /// Three-Gaussian `<j0>` parametrization.
    GaussianJ0(FormFactorCoefficients),
}

impl FormFactor {
    /// Evaluate at the absolute momentum transfer |Q| in inverse Angstrom.
    pub fn evaluate(&self, q_abs: f64) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::GaussianJ0(coefficients) => {
                let s = q_abs / (4.0 * PI);
                let s2 = s * s;
                let mut total = coefficients.constant;
                for (amplitude, exponent) in coefficients.gaussians {
                    total += amplitude * (-exponent * s2).exp();
                }
                total
            }
        }
    }
}
