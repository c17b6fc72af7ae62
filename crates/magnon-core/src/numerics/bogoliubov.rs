//! Para-unitary diagonalization of the bosonic Hamiltonian.
//!
//! The primary path is Colpa's method: a Cholesky square root `h = L
//! L^dagger`, eigendecomposition of `W = K G K^dagger` with `K =
//! L^dagger`, and recovery of the Bogoliubov modes by a triangular solve.
//! `G = diag(+1 x L, -1 x L)` is the bosonic metric. The non-Hermitian
//! (White) path diagonalizes `G h` directly and accepts complex
//! eigenvalues.

use faer::linalg::triangular_solve::solve_upper_triangular_in_place;
use faer::{Par, Side};
use num_complex::Complex64;

use crate::domain::{SpinwaveError, SpinwaveResult, Warning};
use crate::model::HamiltonianFallback;
use crate::numerics::{hermitize, DenseComplexMatrix};

const ORTHOGONALIZATION_COLLAPSE_TOL: f64 = 1.0e-10;
const SINGULAR_SOLVE_DELTA: f64 = 1.0e-7;

#[derive(Debug, Clone, Copy)]
pub struct DiagonalizeSettings {
    pub q_index: usize,
    pub omega_tol: f64,
    pub fallback: HamiltonianFallback,
    pub fast_mode: bool,
}

#[derive(Debug, Clone)]
pub struct BogoliubovModes {
    /// Mode energies, descending; length 2L, or L in fast mode.
    pub energies: Vec<f64>,
    /// Mode matrix V, one column per retained energy.
    pub vectors: DenseComplexMatrix,
    pub warnings: Vec<Warning>,
}

/// Colpa path. `h` must be the Hermitized 2L x 2L Hamiltonian.
pub fn diagonalize_colpa(
    h: &DenseComplexMatrix,
    settings: &DiagonalizeSettings,
) -> SpinwaveResult<BogoliubovModes> {
    let dim = h.nrows();
    let n_sites = dim / 2;
    let mut warnings = Vec::new();

    let (k_lower, applied_shift) = cholesky_square_root(h, settings, &mut warnings)?;

    // W = K G K^dagger = L^dagger (G L)
    let mut g_l = k_lower.clone();
    negate_lower_rows(&mut g_l, n_sites);
    let mut w = k_lower.adjoint() * g_l;
    hermitize(&mut w);

    let eigen = w
        .self_adjoint_eigen(Side::Lower)
        .map_err(|_| SpinwaveError::EigensolverFailure {
            q_index: settings.q_index,
        })?;
    let raw_values = eigen.S().column_vector();
    let raw_vectors = eigen.U();

    // descending real part; ties keep the original order
    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&a, &b| {
        raw_values[b]
            .re
            .total_cmp(&raw_values[a].re)
            .then_with(|| a.cmp(&b))
    });

    // gapless eigenvalues are clamped to exactly zero before the square
    // root; a diagonal shift displaces them by its own size, so it widens
    // the clamp window
    let zero_window = settings.omega_tol + applied_shift;
    let energies: Vec<f64> = order
        .iter()
        .map(|&index| {
            let energy = raw_values[index].re;
            if energy.abs() <= zero_window {
                0.0
            } else {
                energy
            }
        })
        .collect();
    let mut u = DenseComplexMatrix::from_fn(dim, dim, |row, col| raw_vectors[(row, order[col])]);

    orthogonalize_degenerate_clusters(&mut u, &energies, settings, &mut warnings);

    // right-hand side U sqrt(G .* D); the metric sign makes every retained
    // square root real for a positive-definite h, and the clamped zero
    // modes carry no amplitude
    let mut rhs = DenseComplexMatrix::zeros(dim, dim);
    for col in 0..dim {
        let metric = if col < n_sites { 1.0 } else { -1.0 };
        let value = (metric * energies[col]).max(0.0);
        let amplitude = value.sqrt();
        for row in 0..dim {
            rhs[(row, col)] = u[(row, col)] * amplitude;
        }
    }

    // K V = U sqrt(G .* D) with K upper triangular
    let mut vectors = rhs.clone();
    solve_upper_triangular_in_place(k_lower.adjoint().as_ref(), vectors.as_mut(), Par::Seq);

    if has_non_finite(&vectors) {
        warnings.push(Warning::SingularModeTransform {
            q_index: settings.q_index,
        });
        let mut bumped = k_lower.clone();
        for index in 0..dim {
            bumped[(index, index)] += Complex64::new(SINGULAR_SOLVE_DELTA, 0.0);
        }
        vectors = rhs;
        solve_upper_triangular_in_place(bumped.adjoint().as_ref(), vectors.as_mut(), Par::Seq);
    }

    let (energies, vectors) = truncate_fast(energies, vectors, settings.fast_mode, n_sites);

    Ok(BogoliubovModes {
        energies,
        vectors,
        warnings,
    })
}

/// White path: direct eigendecomposition of the non-Hermitian `G h`.
pub fn diagonalize_white(
    h: &DenseComplexMatrix,
    settings: &DiagonalizeSettings,
) -> SpinwaveResult<BogoliubovModes> {
    let dim = h.nrows();
    let n_sites = dim / 2;
    let mut warnings = Vec::new();

    let mut gh = h.clone();
    negate_lower_rows(&mut gh, n_sites);

    let eigen = gh.eigen().map_err(|_| SpinwaveError::EigensolverFailure {
        q_index: settings.q_index,
    })?;
    let raw_values = eigen.S().column_vector();
    let raw_vectors = eigen.U();

    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&a, &b| {
        raw_values[b]
            .re
            .total_cmp(&raw_values[a].re)
            .then_with(|| raw_values[a].im.total_cmp(&raw_values[b].im))
            .then_with(|| a.cmp(&b))
    });

    let max_imaginary = (0..dim)
        .map(|index| raw_values[index].im.abs())
        .fold(0.0, f64::max);
    if max_imaginary > settings.omega_tol {
        warnings.push(Warning::ImaginaryModes {
            q_index: settings.q_index,
            max_imaginary,
        });
    }

    let energies: Vec<f64> = order.iter().map(|&index| raw_values[index].re).collect();
    let mut vectors =
        DenseComplexMatrix::from_fn(dim, dim, |row, col| raw_vectors[(row, order[col])]);

    // scale columns so |v^dagger G v| = 1
    for col in 0..dim {
        let mut para_norm = Complex64::new(0.0, 0.0);
        for row in 0..dim {
            let metric = if row < n_sites { 1.0 } else { -1.0 };
            para_norm += vectors[(row, col)].conj() * metric * vectors[(row, col)];
        }
        let magnitude = para_norm.norm();
        if magnitude > 0.0 {
            let scale = 1.0 / magnitude.sqrt();
            for row in 0..dim {
                vectors[(row, col)] *= scale;
            }
        }
    }

    let (energies, vectors) = truncate_fast(energies, vectors, settings.fast_mode, n_sites);

    Ok(BogoliubovModes {
        energies,
        vectors,
        warnings,
    })
}

/// Lower-triangular L with `h = L L^dagger`, through the configured
/// fallback when the plain factorization fails. Also reports the diagonal
/// shift that was applied, zero on the direct paths.
fn cholesky_square_root(
    h: &DenseComplexMatrix,
    settings: &DiagonalizeSettings,
    warnings: &mut Vec<Warning>,
) -> SpinwaveResult<(DenseComplexMatrix, f64)> {
    if let Ok(cholesky) = h.clone().llt(Side::Lower) {
        return Ok((cholesky.L().to_owned(), 0.0));
    }

    match settings.fallback {
        HamiltonianFallback::ShiftedCholesky => {
            let dim = h.nrows();
            let min_eigenvalue = smallest_eigenvalue(h, settings.q_index)?;
            let shift =
                (-min_eigenvalue).max(settings.omega_tol) * (dim as f64).sqrt() * 4.0;

            let mut shifted = h.clone();
            for index in 0..dim {
                shifted[(index, index)] += Complex64::new(shift, 0.0);
            }
            match shifted.llt(Side::Lower) {
                Ok(cholesky) => {
                    warnings.push(Warning::CholeskyShifted {
                        q_index: settings.q_index,
                        shift,
                    });
                    Ok((cholesky.L().to_owned(), shift))
                }
                Err(_) => Err(SpinwaveError::NonPosDefHamiltonian {
                    q_index: settings.q_index,
                    min_eigenvalue,
                }),
            }
        }
        HamiltonianFallback::Ldlt => {
            let decomposition =
                h.ldlt(Side::Lower)
                    .map_err(|_| SpinwaveError::NonPosDefHamiltonian {
                        q_index: settings.q_index,
                        min_eigenvalue: f64::NAN,
                    })?;
            let d = decomposition.D().column_vector().to_owned();
            let mut min_entry = f64::INFINITY;
            for index in 0..d.nrows() {
                min_entry = min_entry.min(d[index].re);
            }
            if min_entry < -settings.omega_tol {
                return Err(SpinwaveError::NonPosDefHamiltonian {
                    q_index: settings.q_index,
                    min_eigenvalue: min_entry,
                });
            }

            let dim = h.nrows();
            let l = decomposition.L().to_owned();
            let factor = DenseComplexMatrix::from_fn(dim, dim, |row, col| {
                l[(row, col)] * Complex64::new(d[col].re.max(0.0).sqrt(), 0.0)
            });
            Ok((factor, 0.0))
        }
    }
}

fn smallest_eigenvalue(h: &DenseComplexMatrix, q_index: usize) -> SpinwaveResult<f64> {
    let values = h
        .self_adjoint_eigenvalues(Side::Lower)
        .map_err(|_| SpinwaveError::EigensolverFailure { q_index })?;
    Ok(values.into_iter().fold(f64::INFINITY, f64::min))
}

fn negate_lower_rows(matrix: &mut DenseComplexMatrix, n_sites: usize) {
    let dim = matrix.nrows();
    for row in n_sites..dim {
        for col in 0..matrix.ncols() {
            matrix[(row, col)] = -matrix[(row, col)];
        }
    }
}

fn has_non_finite(matrix: &DenseComplexMatrix) -> bool {
    for row in 0..matrix.nrows() {
        for col in 0..matrix.ncols() {
            let value = matrix[(row, col)];
            if !value.re.is_finite() || !value.im.is_finite() {
                return true;
            }
        }
    }
    false
}

/// Modified Gram-Schmidt over every run of eigenvalues closer than
/// `omega_tol`; the Hermitian eigensolver returns an arbitrary basis inside
/// a degenerate subspace.
fn orthogonalize_degenerate_clusters(
    u: &mut DenseComplexMatrix,
    energies: &[f64],
    settings: &DiagonalizeSettings,
    warnings: &mut Vec<Warning>,
) {
    let dim = energies.len();
    let mut start = 0;
    while start < dim {
        let mut end = start + 1;
        while end < dim && (energies[end - 1] - energies[end]).abs() <= settings.omega_tol {
            end += 1;
        }
        if end - start > 1 && !gram_schmidt_columns(u, start, end) {
            warnings.push(Warning::DegenerateModesNotOrthogonal {
                q_index: settings.q_index,
            });
        }
        start = end;
    }
}

fn gram_schmidt_columns(u: &mut DenseComplexMatrix, start: usize, end: usize) -> bool {
    let dim = u.nrows();
    for col in start..end {
        for prior in start..col {
            let mut overlap = Complex64::new(0.0, 0.0);
            for row in 0..dim {
                overlap += u[(row, prior)].conj() * u[(row, col)];
            }
            for row in 0..dim {
                let correction = overlap * u[(row, prior)];
                u[(row, col)] -= correction;
            }
        }
        let mut norm_sq = 0.0;
        for row in 0..dim {
            norm_sq += u[(row, col)].norm_sqr();
        }
        let norm = norm_sq.sqrt();
        if norm < ORTHOGONALIZATION_COLLAPSE_TOL {
            return false;
        }
        let scale = 1.0 / norm;
        for row in 0..dim {
            u[(row, col)] *= scale;
        }
    }
    true
}

fn truncate_fast(
    energies: Vec<f64>,
    vectors: DenseComplexMatrix,
    fast_mode: bool,
    n_sites: usize,
) -> (Vec<f64>, DenseComplexMatrix) {
    if !fast_mode {
        return (energies, vectors);
    }
    let dim = vectors.nrows();
    let truncated =
        DenseComplexMatrix::from_fn(dim, n_sites, |row, col| vectors[(row, col)]);
    (energies[..n_sites].to_vec(), truncated)
}
