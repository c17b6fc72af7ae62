//! Shared numeric types and small dense helpers.
//!
//! The 2L x 2L Hamiltonian work runs on `faer` matrices; everything that is
//! a fixed 3-vector or 3x3 tensor stays on plain arrays with explicit
//! loops.

pub mod bilinear;
pub mod biquadratic;
pub mod bogoliubov;
pub mod correlation;
pub mod formfactor;
pub mod frames;
pub mod hamiltonian;
pub mod rotation;
pub mod unfold;
pub mod zeeman;

use faer::Mat;
use num_complex::Complex64;

pub type DenseComplexMatrix = Mat<Complex64>;

/// 3x3 complex correlation tensor S^{alpha,beta} of a single mode.
pub type CorrelationTensor = [[Complex64; 3]; 3];

pub fn zero_tensor() -> CorrelationTensor {
    [[Complex64::new(0.0, 0.0); 3]; 3]
}

pub fn dot3(lhs: &[f64; 3], rhs: &[f64; 3]) -> f64 {
    lhs[0] * rhs[0] + lhs[1] * rhs[1] + lhs[2] * rhs[2]
}

pub fn cross3(lhs: &[f64; 3], rhs: &[f64; 3]) -> [f64; 3] {
    [
        lhs[1] * rhs[2] - lhs[2] * rhs[1],
        lhs[2] * rhs[0] - lhs[0] * rhs[2],
        lhs[0] * rhs[1] - lhs[1] * rhs[0],
    ]
}

pub fn norm3(vector: &[f64; 3]) -> f64 {
    dot3(vector, vector).sqrt()
}

pub fn mat3_vec3(matrix: &[[f64; 3]; 3], vector: &[f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for row in 0..3 {
        for col in 0..3 {
            out[row] += matrix[row][col] * vector[col];
        }
    }
    out
}

pub fn mat3_cvec3(matrix: &[[f64; 3]; 3], vector: &[Complex64; 3]) -> [Complex64; 3] {
    let mut out = [Complex64::new(0.0, 0.0); 3];
    for row in 0..3 {
        for col in 0..3 {
            out[row] += matrix[row][col] * vector[col];
        }
    }
    out
}

pub fn mat3_mul(lhs: &[[f64; 3]; 3], rhs: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            for inner in 0..3 {
                out[row][col] += lhs[row][inner] * rhs[inner][col];
            }
        }
    }
    out
}

pub fn mat3_transpose(matrix: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            out[row][col] = matrix[col][row];
        }
    }
    out
}

/// Bilinear contraction `left . M . right` without conjugation; callers
/// pass conjugated vectors where the formulas require them.
pub fn contract_real(left: &[f64; 3], matrix: &[[f64; 3]; 3], right: &[f64; 3]) -> f64 {
    let mut total = 0.0;
    for row in 0..3 {
        for col in 0..3 {
            total += left[row] * matrix[row][col] * right[col];
        }
    }
    total
}

pub fn contract_complex(
    left: &[Complex64; 3],
    matrix: &[[f64; 3]; 3],
    right: &[Complex64; 3],
) -> Complex64 {
    let mut total = Complex64::new(0.0, 0.0);
    for row in 0..3 {
        for col in 0..3 {
            total += left[row] * matrix[row][col] * right[col];
        }
    }
    total
}

pub fn cdot3(lhs: &[Complex64; 3], rhs: &[Complex64; 3]) -> Complex64 {
    lhs[0] * rhs[0] + lhs[1] * rhs[1] + lhs[2] * rhs[2]
}

pub fn conj3(vector: &[Complex64; 3]) -> [Complex64; 3] {
    [vector[0].conj(), vector[1].conj(), vector[2].conj()]
}

/// `R . S` for a real 3x3 applied from the left of a complex tensor.
pub fn tensor_left_mul(rotation: &[[f64; 3]; 3], tensor: &CorrelationTensor) -> CorrelationTensor {
    let mut out = zero_tensor();
    for row in 0..3 {
        for col in 0..3 {
            for inner in 0..3 {
                out[row][col] += rotation[row][inner] * tensor[inner][col];
            }
        }
    }
    out
}

/// `S . M` for a complex 3x3 applied from the right of a complex tensor.
pub fn tensor_right_mul(
    tensor: &CorrelationTensor,
    matrix: &[[Complex64; 3]; 3],
) -> CorrelationTensor {
    let mut out = zero_tensor();
    for row in 0..3 {
        for col in 0..3 {
            for inner in 0..3 {
                out[row][col] += tensor[row][inner] * matrix[inner][col];
            }
        }
    }
    out
}

/// `R . S . R^T` for a real rotation applied to a complex tensor.
pub fn tensor_rotate(rotation: &[[f64; 3]; 3], tensor: &CorrelationTensor) -> CorrelationTensor {
    let rotated = tensor_left_mul(rotation, tensor);
    let mut out = zero_tensor();
    for row in 0..3 {
        for col in 0..3 {
            for inner in 0..3 {
                out[row][col] += rotated[row][inner] * rotation[col][inner];
            }
        }
    }
    out
}

pub fn tensor_scale(tensor: &CorrelationTensor, factor: f64) -> CorrelationTensor {
    let mut out = *tensor;
    for row in out.iter_mut() {
        for value in row.iter_mut() {
            *value *= factor;
        }
    }
    out
}

pub fn tensor_add(lhs: &CorrelationTensor, rhs: &CorrelationTensor) -> CorrelationTensor {
    let mut out = *lhs;
    for row in 0..3 {
        for col in 0..3 {
            out[row][col] += rhs[row][col];
        }
    }
    out
}

pub fn tensor_trace(tensor: &CorrelationTensor) -> Complex64 {
    tensor[0][0] + tensor[1][1] + tensor[2][2]
}

/// In-place Hermitization `h <- (h + h^dagger)/2`.
pub fn hermitize(matrix: &mut DenseComplexMatrix) {
    let n = matrix.nrows();
    for row in 0..n {
        let diagonal = matrix[(row, row)];
        matrix[(row, row)] = Complex64::new(diagonal.re, 0.0);
        for col in (row + 1)..n {
            let upper = matrix[(row, col)];
            let lower = matrix[(col, row)];
            let average = 0.5 * (upper + lower.conj());
            matrix[(row, col)] = average;
            matrix[(col, row)] = average.conj();
        }
    }
}

/// Frobenius norm of the anti-Hermitian residual `h - h^dagger`.
pub fn hermitian_defect(matrix: &DenseComplexMatrix) -> f64 {
    let n = matrix.nrows();
    let mut total = 0.0;
    for row in 0..n {
        for col in 0..n {
            let defect = matrix[(row, col)] - matrix[(col, row)].conj();
            total += defect.norm_sqr();
        }
    }
    total.sqrt()
}
