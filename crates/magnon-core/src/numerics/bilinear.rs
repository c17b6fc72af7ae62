//! Q-independent bilinear contribution table.
//!
//! For every directed coupling this reduces the 3x3 exchange tensor to the
//! two complex scalars that enter the per-Q scatter (`AD0`, `BC0`) and
//! accumulates the diagonal exchange field into a dense 2L vector applied
//! unchanged at every Q. For incommensurate structures the exchange tensor
//! is first symmetrized with the rotating-frame Rodrigues rotation
//! `K(n, 2 pi k.dR)`.

use num_complex::Complex64;

use crate::common::constants::TWO_PI;
use crate::model::DirectedExchange;
use crate::numerics::frames::LocalFrame;
use crate::numerics::rotation::rodrigues;
use crate::numerics::{conj3, contract_complex, contract_real, dot3, mat3_mul};

/// Rotating-frame context for incommensurate propagation.
#[derive(Debug, Clone, Copy)]
pub struct RotatingFrame {
    pub propagation: [f64; 3],
    pub axis: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct BilinearEntry {
    pub source: usize,
    pub target: usize,
    pub delta_r: [f64; 3],
    pub ad0: Complex64,
    pub bc0: Complex64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BilinearTable {
    pub entries: Vec<BilinearEntry>,
    /// Dense 2L diagonal: `-2 S_j AD` in the upper block, `-2 S_i AD` in
    /// the lower block, accumulated over all directed couplings.
    pub diagonal: Vec<f64>,
}

pub fn build_bilinear_table(
    directed: &[DirectedExchange],
    frames: &[LocalFrame],
    spins: &[f64],
    rotating: Option<&RotatingFrame>,
) -> BilinearTable {
    let n_sites = frames.len();
    let mut entries = Vec::with_capacity(directed.len());
    let mut diagonal = vec![0.0; 2 * n_sites];

    for coupling in directed {
        let matrix = match rotating {
            Some(frame) => rotating_frame_symmetrized(&coupling.matrix, frame, &coupling.delta_r),
            None => coupling.matrix,
        };

        let (i, j) = (coupling.source, coupling.target);
        let (si, sj) = (spins[i], spins[j]);
        let root = (si * sj).sqrt();

        let ad = contract_real(&frames[i].eta, &matrix, &frames[j].eta);
        // upper block anchored at the source with the target's spin, lower
        // block at the target with the source's spin; over the conjugated
        // record list both blocks accumulate the same exchange field
        diagonal[i] += -2.0 * sj * ad;
        diagonal[j + n_sites] += -2.0 * si * ad;

        let ad0 = root * contract_complex(&frames[i].z, &matrix, &conj3(&frames[j].z));
        let bc0 = root * contract_complex(&frames[i].z, &matrix, &frames[j].z);

        entries.push(BilinearEntry {
            source: i,
            target: j,
            delta_r: coupling.delta_r,
            ad0,
            bc0,
        });
    }

    BilinearTable { entries, diagonal }
}

/// `(J.K + K.J)/2` with `K = K(n, 2 pi k.dR)`.
fn rotating_frame_symmetrized(
    matrix: &[[f64; 3]; 3],
    frame: &RotatingFrame,
    delta_r: &[f64; 3],
) -> [[f64; 3]; 3] {
    let angle = TWO_PI * dot3(&frame.propagation, delta_r);
    let k = rodrigues(&frame.axis, angle);
    let jk = mat3_mul(matrix, &k);
    let kj = mat3_mul(&k, matrix);
    let mut out = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            out[row][col] = 0.5 * (jk[row][col] + kj[row][col]);
        }
    }
    out
}
