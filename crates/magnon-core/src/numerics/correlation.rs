//! Dynamical spin-spin correlation tensors.
//!
//! Each mode contributes a rank-one 3x3 tensor built from the rotated
//! complex basis vectors, the site phase factors `exp(-i 2 pi Q.r_i)`
//! weighted by `sqrt(S_i/2)`, and optionally the magnetic form factor and
//! g-tensor. The neutron-observable projection keeps the part transverse
//! to Q.

use num_complex::Complex64;

use crate::common::constants::TWO_PI;
use crate::numerics::frames::LocalFrame;
use crate::numerics::{dot3, zero_tensor, CorrelationTensor, DenseComplexMatrix};

/// Per-site ingredients that do not depend on the mode index.
#[derive(Debug, Clone)]
pub struct SiteWeights {
    /// `exp(-i 2 pi Q.r_i) sqrt(S_i/2) F_i(|Q|)` per site.
    pub phase: Vec<Complex64>,
}

impl SiteWeights {
    pub fn new(
        q_ext: &[f64; 3],
        positions: &[[f64; 3]],
        spins: &[f64],
        form_factors: &[f64],
    ) -> Self {
        let phase = positions
            .iter()
            .zip(spins)
            .zip(form_factors)
            .map(|((position, spin), form_factor)| {
                Complex64::from_polar(1.0, -TWO_PI * dot3(q_ext, position))
                    * (0.5 * spin).sqrt()
                    * form_factor
            })
            .collect();
        Self { phase }
    }
}

/// Contract the mode matrix into one 3x3 tensor per retained mode.
///
/// `basis` selects `z` or the g-scaled `z_tilde` per site. `n_cell` is the
/// number of structural cells in the magnetic supercell.
pub fn correlation_tensors(
    vectors: &DenseComplexMatrix,
    frames: &[LocalFrame],
    weights: &SiteWeights,
    use_g_tensor: bool,
    n_cell: f64,
) -> Vec<CorrelationTensor> {
    let n_sites = frames.len();
    let n_modes = vectors.ncols();
    let normalization = 1.0 / n_cell;

    let mut tensors = Vec::with_capacity(n_modes);
    for mode in 0..n_modes {
        let mut amplitude = [Complex64::new(0.0, 0.0); 3];
        for site in 0..n_sites {
            let basis = if use_g_tensor {
                &frames[site].z_tilde
            } else {
                &frames[site].z
            };
            let weight = weights.phase[site];
            let upper = vectors[(site, mode)];
            let lower = vectors[(site + n_sites, mode)];
            for axis in 0..3 {
                amplitude[axis] += basis[axis] * weight * upper;
                amplitude[axis] += basis[axis].conj() * weight * lower;
            }
        }

        let mut tensor = zero_tensor();
        for alpha in 0..3 {
            for beta in 0..3 {
                tensor[alpha][beta] = normalization * amplitude[alpha] * amplitude[beta].conj();
            }
        }
        tensors.push(tensor);
    }
    tensors
}

/// `S_perp = sum_ab (delta_ab - qhat_a qhat_b) (S^ab + S^ba)/2` per mode.
pub fn neutron_projection(tensors: &[CorrelationTensor], q_hat: &[f64; 3]) -> Vec<f64> {
    tensors
        .iter()
        .map(|tensor| {
            let mut total = Complex64::new(0.0, 0.0);
            for alpha in 0..3 {
                for beta in 0..3 {
                    let delta = if alpha == beta { 1.0 } else { 0.0 };
                    let projector = delta - q_hat[alpha] * q_hat[beta];
                    let symmetric = 0.5 * (tensor[alpha][beta] + tensor[beta][alpha]);
                    total += projector * symmetric;
                }
            }
            total.re
        })
        .collect()
}

/// Unit direction of Q in Cartesian coordinates. Near-zero Q falls back to
/// the direction of `next_q`, then to x.
pub fn scattering_direction(
    q_rlu: &[f64; 3],
    next_q_rlu: Option<&[f64; 3]>,
    rlu_to_cart: &[[f64; 3]; 3],
) -> [f64; 3] {
    if let Some(direction) = unit_cartesian(q_rlu, rlu_to_cart) {
        return direction;
    }
    if let Some(next) = next_q_rlu {
        if let Some(direction) = unit_cartesian(next, rlu_to_cart) {
            return direction;
        }
    }
    [1.0, 0.0, 0.0]
}

/// |Q| in inverse Angstrom for the form-factor evaluation.
pub fn absolute_momentum(q_rlu: &[f64; 3], rlu_to_cart: &[[f64; 3]; 3]) -> f64 {
    let cartesian = crate::numerics::mat3_vec3(rlu_to_cart, q_rlu);
    crate::numerics::norm3(&cartesian)
}

fn unit_cartesian(q_rlu: &[f64; 3], rlu_to_cart: &[[f64; 3]; 3]) -> Option<[f64; 3]> {
    let cartesian = crate::numerics::mat3_vec3(rlu_to_cart, q_rlu);
    let norm = crate::numerics::norm3(&cartesian);
    if norm < 1.0e-12 {
        return None;
    }
    Some([
        cartesian[0] / norm,
        cartesian[1] / norm,
        cartesian[2] / norm,
    ])
}

#[cfg(test)]
mod tests {
    use super::{
        absolute_momentum, correlation_tensors, neutron_projection, scattering_direction,
        SiteWeights,
    };
    use crate::model::Site;
    use crate::numerics::frames::build_local_frames;
    use crate::numerics::{tensor_trace, DenseComplexMatrix};
    use num_complex::Complex64;

    const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    /// Single site along z with the trivial mode matrix V = I.
    fn single_site_tensors() -> Vec<crate::numerics::CorrelationTensor> {
        let sites = [Site::new([0.0; 3], [0.0, 0.0, 1.0])];
        let frames = build_local_frames(&sites).expect("frames");
        let weights = SiteWeights::new(&[0.0; 3], &[[0.0; 3]], &[1.0], &[1.0]);
        let mut v = DenseComplexMatrix::zeros(2, 2);
        v[(0, 0)] = Complex64::new(1.0, 0.0);
        v[(1, 1)] = Complex64::new(1.0, 0.0);
        correlation_tensors(&v, &frames, &weights, false, 1.0)
    }

    #[test]
    fn single_site_modes_carry_transverse_weight() {
        let tensors = single_site_tensors();
        assert_eq!(tensors.len(), 2);

        // amplitude of the first mode is z sqrt(S/2): Sab = z (x) conj(z) / 2
        let first = &tensors[0];
        assert!((first[0][0] - Complex64::new(0.5, 0.0)).norm() < 1.0e-12);
        assert!((first[1][1] - Complex64::new(0.5, 0.0)).norm() < 1.0e-12);
        // off-diagonal chirality
        assert!((first[0][1] - Complex64::new(0.0, -0.5)).norm() < 1.0e-12);
        // nothing along the moment
        assert!(first[2][2].norm() < 1.0e-12);

        // per-mode tensors are Hermitian in (alpha, beta)
        for tensor in &tensors {
            for alpha in 0..3 {
                for beta in 0..3 {
                    assert!((tensor[alpha][beta] - tensor[beta][alpha].conj()).norm() < 1.0e-12);
                }
            }
        }
    }

    #[test]
    fn neutron_projection_removes_the_longitudinal_part() {
        let tensors = single_site_tensors();
        // q along z: both transverse axes survive, S_perp = 1
        let along_z = neutron_projection(&tensors, &[0.0, 0.0, 1.0]);
        assert!((along_z[0] - 1.0).abs() < 1.0e-12);
        // q along x: only the y axis survives
        let along_x = neutron_projection(&tensors, &[1.0, 0.0, 0.0]);
        assert!((along_x[0] - 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn projection_sum_rule_matches_the_tensor_contraction() {
        let tensors = single_site_tensors();
        let q_hat = [0.6, 0.0, 0.8];
        let projected: f64 = neutron_projection(&tensors, &q_hat).iter().sum();

        let mut contracted = Complex64::new(0.0, 0.0);
        for tensor in &tensors {
            for alpha in 0..3 {
                for beta in 0..3 {
                    let delta = if alpha == beta { 1.0 } else { 0.0 };
                    let projector = delta - q_hat[alpha] * q_hat[beta];
                    contracted += projector * tensor[alpha][beta];
                }
            }
        }
        assert!((projected - contracted.re).abs() < 1.0e-8);
    }

    #[test]
    fn form_factor_scales_the_tensor_quadratically() {
        let sites = [Site::new([0.0; 3], [0.0, 0.0, 1.0])];
        let frames = build_local_frames(&sites).expect("frames");
        let mut v = DenseComplexMatrix::zeros(2, 2);
        v[(0, 0)] = Complex64::new(1.0, 0.0);
        v[(1, 1)] = Complex64::new(1.0, 0.0);

        let plain = SiteWeights::new(&[0.0; 3], &[[0.0; 3]], &[1.0], &[1.0]);
        let halved = SiteWeights::new(&[0.0; 3], &[[0.0; 3]], &[1.0], &[0.5]);
        let reference = correlation_tensors(&v, &frames, &plain, false, 1.0);
        let scaled = correlation_tensors(&v, &frames, &halved, false, 1.0);
        let ratio = tensor_trace(&scaled[0]).re / tensor_trace(&reference[0]).re;
        assert!((ratio - 0.25).abs() < 1.0e-12);
    }

    #[test]
    fn zero_q_direction_borrows_the_next_point_then_x() {
        let from_next =
            scattering_direction(&[0.0; 3], Some(&[0.0, 2.0, 0.0]), &IDENTITY);
        assert_eq!(from_next, [0.0, 1.0, 0.0]);

        let fallback = scattering_direction(&[0.0; 3], None, &IDENTITY);
        assert_eq!(fallback, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn absolute_momentum_uses_the_basis_matrix() {
        let basis = [[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let q = absolute_momentum(&[1.0, 0.0, 0.0], &basis);
        assert!((q - 2.0).abs() < 1.0e-14);
    }
}
