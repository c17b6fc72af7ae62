//! Q-independent biquadratic contribution table.
//!
//! Only valid for commensurate structures; the engine rejects the
//! combination with an incommensurate propagation vector before this table
//! is ever built.

use num_complex::Complex64;

use crate::model::DirectedBiquadratic;
use crate::numerics::frames::LocalFrame;
use crate::numerics::{cdot3, conj3, dot3};

#[derive(Debug, Clone, PartialEq)]
pub struct BiquadraticEntry {
    pub source: usize,
    pub target: usize,
    pub delta_r: [f64; 3],
    pub a0: Complex64,
    pub b0: Complex64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiquadraticTable {
    pub entries: Vec<BiquadraticEntry>,
    /// Real diagonal applied at (i, i) and (i + L, i + L).
    pub diagonal_c: Vec<f64>,
    /// Complex upper-right diagonal applied at (i, i + L).
    pub diagonal_d: Vec<Complex64>,
}

impl BiquadraticTable {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn build_biquadratic_table(
    directed: &[DirectedBiquadratic],
    frames: &[LocalFrame],
    spins: &[f64],
) -> BiquadraticTable {
    let n_sites = frames.len();
    let mut entries = Vec::with_capacity(directed.len());
    let mut diagonal_c = vec![0.0; n_sites];
    let mut diagonal_d = vec![Complex64::new(0.0, 0.0); n_sites];

    for coupling in directed {
        let (i, j) = (coupling.source, coupling.target);
        let (si, sj) = (spins[i], spins[j]);
        let eta_i = complexify(&frames[i].eta);
        let eta_j = complexify(&frames[j].eta);

        let m = dot3(&frames[i].eta, &frames[j].eta);
        let n = cdot3(&eta_i, &conj3(&frames[j].z));
        let o = cdot3(&frames[i].z, &conj3(&frames[j].z));
        let p = cdot3(&conj3(&frames[i].z), &frames[j].z);
        let q = cdot3(&frames[i].z, &eta_j);

        let amplitude = (si * sj).powf(1.5) * coupling.value;
        let a0 = amplitude * (m * p.conj() + q * n.conj());
        let b0 = amplitude * (m * o + q * n);

        let site_scale = si * sj * sj * coupling.value;
        diagonal_c[i] += site_scale * (q.norm_sqr() - 2.0 * m * m);
        diagonal_d[i] += site_scale * q * q;

        entries.push(BiquadraticEntry {
            source: i,
            target: j,
            delta_r: coupling.delta_r,
            a0,
            b0,
        });
    }

    BiquadraticTable {
        entries,
        diagonal_c,
        diagonal_d,
    }
}

fn complexify(vector: &[f64; 3]) -> [Complex64; 3] {
    [
        Complex64::new(vector[0], 0.0),
        Complex64::new(vector[1], 0.0),
        Complex64::new(vector[2], 0.0),
    ]
}
