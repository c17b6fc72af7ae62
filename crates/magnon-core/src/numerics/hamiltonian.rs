//! Per-Q assembly of the 2L x 2L bosonic Hamiltonian.
//!
//! The scatter works on a dense zero-initialized buffer; L is small enough
//! that the dense cost is negligible next to the O(L^3) decomposition. The
//! factor 2 on the anomalous scalar replaces explicit filling of the
//! Hermitian partner position, which the final Hermitization makes exact.

use num_complex::Complex64;

use crate::common::constants::TWO_PI;
use crate::numerics::bilinear::BilinearTable;
use crate::numerics::biquadratic::BiquadraticTable;
use crate::numerics::{dot3, hermitize, DenseComplexMatrix};

pub fn assemble_hamiltonian(
    q_ext: &[f64; 3],
    n_sites: usize,
    bilinear: &BilinearTable,
    biquadratic: Option<&BiquadraticTable>,
    zeeman: Option<&[f64]>,
) -> DenseComplexMatrix {
    let dim = 2 * n_sites;
    let mut h = DenseComplexMatrix::zeros(dim, dim);

    for entry in &bilinear.entries {
        let phase = phase_factor(q_ext, &entry.delta_r);
        let (i, j) = (entry.source, entry.target);
        h[(i, j)] += entry.ad0 * phase;
        h[(i, j + n_sites)] += 2.0 * entry.bc0 * phase;
        h[(i + n_sites, j + n_sites)] += entry.ad0.conj() * phase;
    }

    for (index, value) in bilinear.diagonal.iter().enumerate() {
        h[(index, index)] += Complex64::new(*value, 0.0);
    }

    if let Some(table) = biquadratic {
        for entry in &table.entries {
            let phase = phase_factor(q_ext, &entry.delta_r);
            let (i, j) = (entry.source, entry.target);
            h[(i, j)] += entry.a0 * phase;
            h[(i, j + n_sites)] += 2.0 * entry.b0 * phase;
            h[(i + n_sites, j + n_sites)] += entry.a0.conj() * phase;
        }
        for (site, value) in table.diagonal_c.iter().enumerate() {
            h[(site, site)] += Complex64::new(*value, 0.0);
            h[(site + n_sites, site + n_sites)] += Complex64::new(*value, 0.0);
        }
        for (site, value) in table.diagonal_d.iter().enumerate() {
            h[(site, site + n_sites)] += *value;
        }
    }

    if let Some(diagonal) = zeeman {
        for (index, value) in diagonal.iter().enumerate() {
            h[(index, index)] += Complex64::new(*value, 0.0);
        }
    }

    hermitize(&mut h);
    h
}

fn phase_factor(q_ext: &[f64; 3], delta_r: &[f64; 3]) -> Complex64 {
    Complex64::from_polar(1.0, TWO_PI * dot3(q_ext, delta_r))
}
