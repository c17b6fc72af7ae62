//! Rotating-frame unfolding for incommensurate structures.
//!
//! Each Q point is tripled to (Q-k, Q, Q+k); the thirds are diagonalized
//! independently in the rotating frame and their correlation tensors are
//! projected back into the lab frame with the chirality projectors
//! `K1 = (I - nn^T - i [n]x)/2` and `K2 = nn^T`. Helical structures
//! additionally average over the arbitrary initial phase of the helix.

use num_complex::Complex64;

use crate::numerics::rotation::{outer, skew};
use crate::numerics::{tensor_right_mul, zero_tensor, CorrelationTensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Third {
    Minus,
    Center,
    Plus,
}

pub const THIRDS: [Third; 3] = [Third::Minus, Third::Center, Third::Plus];

/// The tripled extended-cell Q list for one input point, in third order.
pub fn triple_q(q_ext: &[f64; 3], propagation: &[f64; 3]) -> [[f64; 3]; 3] {
    let mut minus = [0.0; 3];
    let mut plus = [0.0; 3];
    for axis in 0..3 {
        minus[axis] = q_ext[axis] - propagation[axis];
        plus[axis] = q_ext[axis] + propagation[axis];
    }
    [minus, *q_ext, plus]
}

/// Chirality projector `K1 = (I - nn^T - i [n]x)/2`.
pub fn chirality_projector(axis: &[f64; 3]) -> [[Complex64; 3]; 3] {
    let nn = outer(axis);
    let nx = skew(axis);
    let mut out = [[Complex64::new(0.0, 0.0); 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            let identity = if row == col { 1.0 } else { 0.0 };
            out[row][col] = 0.5 * Complex64::new(identity - nn[row][col], -nx[row][col]);
        }
    }
    out
}

/// Longitudinal projector `K2 = nn^T`.
pub fn longitudinal_projector(axis: &[f64; 3]) -> [[Complex64; 3]; 3] {
    let nn = outer(axis);
    let mut out = [[Complex64::new(0.0, 0.0); 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            out[row][col] = Complex64::new(nn[row][col], 0.0);
        }
    }
    out
}

/// Project one third's rotating-frame tensor into the lab frame.
pub fn rotate_to_lab(
    tensor: &CorrelationTensor,
    third: Third,
    axis: &[f64; 3],
) -> CorrelationTensor {
    match third {
        Third::Plus => tensor_right_mul(tensor, &chirality_projector(axis)),
        Third::Center => tensor_right_mul(tensor, &longitudinal_projector(axis)),
        Third::Minus => {
            let conjugated = conjugate_matrix(&chirality_projector(axis));
            tensor_right_mul(tensor, &conjugated)
        }
    }
}

/// Average over the arbitrary initial phase of the helix:
/// `Sab <- Sab/2 - [n]x Sab [n]x / 2 + (nn^T - I) Sab nn^T / 2
///         + nn^T Sab (2 nn^T - I) / 2`.
pub fn helical_phase_average(tensor: &CorrelationTensor, axis: &[f64; 3]) -> CorrelationTensor {
    let nx = skew(axis);
    let nn = outer(axis);

    let mut identity = [[0.0; 3]; 3];
    for index in 0..3 {
        identity[index][index] = 1.0;
    }

    let mut nn_minus_identity = [[0.0; 3]; 3];
    let mut two_nn_minus_identity = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            nn_minus_identity[row][col] = nn[row][col] - identity[row][col];
            two_nn_minus_identity[row][col] = 2.0 * nn[row][col] - identity[row][col];
        }
    }

    let mut out = zero_tensor();
    let nx_s_nx = sandwich(&nx, tensor, &nx);
    let left_p = sandwich(&nn_minus_identity, tensor, &nn);
    let right_p = sandwich(&nn, tensor, &two_nn_minus_identity);
    for row in 0..3 {
        for col in 0..3 {
            out[row][col] = 0.5
                * (tensor[row][col] - nx_s_nx[row][col] + left_p[row][col] + right_p[row][col]);
        }
    }
    out
}

/// `L . S . R` with real 3x3 factors.
fn sandwich(
    left: &[[f64; 3]; 3],
    tensor: &CorrelationTensor,
    right: &[[f64; 3]; 3],
) -> CorrelationTensor {
    let mut partial = zero_tensor();
    for row in 0..3 {
        for col in 0..3 {
            for inner in 0..3 {
                partial[row][col] += left[row][inner] * tensor[inner][col];
            }
        }
    }
    let mut out = zero_tensor();
    for row in 0..3 {
        for col in 0..3 {
            for inner in 0..3 {
                out[row][col] += partial[row][inner] * right[inner][col];
            }
        }
    }
    out
}

fn conjugate_matrix(matrix: &[[Complex64; 3]; 3]) -> [[Complex64; 3]; 3] {
    let mut out = *matrix;
    for row in out.iter_mut() {
        for value in row.iter_mut() {
            *value = value.conj();
        }
    }
    out
}
