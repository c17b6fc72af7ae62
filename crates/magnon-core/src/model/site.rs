//! Magnetic site records.
//!
//! A site carries everything the tables need that is local to one magnetic
//! atom: its position inside the magnetic supercell (fractional
//! coordinates), the ordered moment vector, an optional g-tensor and an
//! optional form-factor evaluator. The transverse local frame (eta, z) is
//! derived later by the frame builder.

use num_complex::Complex64;

use crate::numerics::formfactor::FormFactor;

pub const IDENTITY_3X3: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    position: [f64; 3],
    moment: [f64; 3],
    g_tensor: [[f64; 3]; 3],
    g_is_default: bool,
    form_factor: Option<FormFactor>,
    fourier_amplitude: Option<[Complex64; 3]>,
}

impl Site {
    pub fn new(position: [f64; 3], moment: [f64; 3]) -> Self {
        Self {
            position,
            moment,
            g_tensor: IDENTITY_3X3,
            g_is_default: true,
            form_factor: None,
            fourier_amplitude: None,
        }
    }

    pub fn with_g_tensor(mut self, g_tensor: [[f64; 3]; 3]) -> Self {
        self.g_tensor = g_tensor;
        self.g_is_default = false;
        self
    }

    pub fn with_form_factor(mut self, form_factor: FormFactor) -> Self {
        self.form_factor = Some(form_factor);
        self
    }

    /// Complex Fourier amplitude of the modulated moment; switches the frame
    /// builder to the complex-magnetisation convention for this site.
    pub fn with_fourier_amplitude(mut self, amplitude: [Complex64; 3]) -> Self {
        self.fourier_amplitude = Some(amplitude);
        self
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn moment(&self) -> [f64; 3] {
        self.moment
    }

    pub fn spin_length(&self) -> f64 {
        let [mx, my, mz] = self.moment;
        (mx * mx + my * my + mz * mz).sqrt()
    }

    pub fn g_tensor(&self) -> &[[f64; 3]; 3] {
        &self.g_tensor
    }

    pub fn g_is_default(&self) -> bool {
        self.g_is_default
    }

    pub fn form_factor(&self) -> Option<&FormFactor> {
        self.form_factor.as_ref()
    }

    pub fn fourier_amplitude(&self) -> Option<&[Complex64; 3]> {
        self.fourier_amplitude.as_ref()
    }
}
