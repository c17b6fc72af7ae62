//! Pairwise coupling records and their directed normalization.
//!
//! Callers supply one record per physical bond (and one per on-site
//! anisotropy, `source == target`, `delta_r == 0`). Before the
//! Q-independent tables are built every record is split into its two
//! directed halves, `(i, j, dR, J/2)` and `(j, i, -dR, J^T/2)`, so the
//! scattered Hamiltonian is Hermitian by construction and every bond is
//! seen from both of its ends.

#[derive(Debug, Clone, PartialEq)]
pub struct BilinearCoupling {
    pub source: usize,
    pub target: usize,
    pub delta_r: [i32; 3],
    pub matrix: [[f64; 3]; 3],
}

impl BilinearCoupling {
    pub fn new(source: usize, target: usize, delta_r: [i32; 3], matrix: [[f64; 3]; 3]) -> Self {
        Self {
            source,
            target,
            delta_r,
            matrix,
        }
    }

    /// Isotropic Heisenberg exchange of strength `j` (positive favors
    /// antiparallel moments).
    pub fn heisenberg(source: usize, target: usize, delta_r: [i32; 3], j: f64) -> Self {
        Self::new(
            source,
            target,
            delta_r,
            [[j, 0.0, 0.0], [0.0, j, 0.0], [0.0, 0.0, j]],
        )
    }

    /// Single-ion anisotropy expressed as an on-site coupling.
    pub fn anisotropy(site: usize, matrix: [[f64; 3]; 3]) -> Self {
        Self::new(site, site, [0, 0, 0], matrix)
    }

    pub fn is_on_site(&self) -> bool {
        self.source == self.target && self.delta_r == [0, 0, 0]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiquadraticCoupling {
    pub source: usize,
    pub target: usize,
    pub delta_r: [i32; 3],
    pub value: f64,
}

impl BiquadraticCoupling {
    pub fn new(source: usize, target: usize, delta_r: [i32; 3], value: f64) -> Self {
        Self {
            source,
            target,
            delta_r,
            value,
        }
    }
}

/// One directed half of a bilinear record after the conjugate split.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectedExchange {
    pub source: usize,
    pub target: usize,
    pub delta_r: [f64; 3],
    pub matrix: [[f64; 3]; 3],
}

/// One directed half of a biquadratic record after the conjugate split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectedBiquadratic {
    pub source: usize,
    pub target: usize,
    pub delta_r: [f64; 3],
    pub value: f64,
}

fn transpose(matrix: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            out[row][col] = matrix[col][row];
        }
    }
    out
}

fn halve(matrix: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = *matrix;
    for row in out.iter_mut() {
        for value in row.iter_mut() {
            *value *= 0.5;
        }
    }
    out
}

fn as_float(delta_r: [i32; 3]) -> [f64; 3] {
    [delta_r[0] as f64, delta_r[1] as f64, delta_r[2] as f64]
}

fn negated(delta_r: [i32; 3]) -> [f64; 3] {
    [
        -(delta_r[0] as f64),
        -(delta_r[1] as f64),
        -(delta_r[2] as f64),
    ]
}

pub fn split_bilinear(couplings: &[BilinearCoupling]) -> Vec<DirectedExchange> {
    let mut directed = Vec::with_capacity(2 * couplings.len());
    for coupling in couplings {
        let half = halve(&coupling.matrix);
        directed.push(DirectedExchange {
            source: coupling.source,
            target: coupling.target,
            delta_r: as_float(coupling.delta_r),
            matrix: half,
        });
        directed.push(DirectedExchange {
            source: coupling.target,
            target: coupling.source,
            delta_r: negated(coupling.delta_r),
            matrix: transpose(&half),
        });
    }
    directed
}

pub fn split_biquadratic(couplings: &[BiquadraticCoupling]) -> Vec<DirectedBiquadratic> {
    let mut directed = Vec::with_capacity(2 * couplings.len());
    for coupling in couplings {
        directed.push(DirectedBiquadratic {
            source: coupling.source,
            target: coupling.target,
            delta_r: as_float(coupling.delta_r),
            value: 0.5 * coupling.value,
        });
        directed.push(DirectedBiquadratic {
            source: coupling.target,
            target: coupling.source,
            delta_r: negated(coupling.delta_r),
            value: 0.5 * coupling.value,
        });
    }
    directed
}

#[cfg(test)]
mod tests {
    use super::{split_bilinear, split_biquadratic, BilinearCoupling, BiquadraticCoupling};

    #[test]
    fn split_mirrors_and_halves_each_bond() {
        let bond = BilinearCoupling::new(
            0,
            1,
            [1, 0, 0],
            [[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
        let directed = split_bilinear(&[bond]);
        assert_eq!(directed.len(), 2);

        assert_eq!(directed[0].source, 0);
        assert_eq!(directed[0].target, 1);
        assert_eq!(directed[0].delta_r, [1.0, 0.0, 0.0]);
        assert!((directed[0].matrix[0][1] - 0.25).abs() < 1.0e-15);

        assert_eq!(directed[1].source, 1);
        assert_eq!(directed[1].target, 0);
        assert_eq!(directed[1].delta_r, [-1.0, 0.0, 0.0]);
        // the reversed direction carries the transpose
        assert!((directed[1].matrix[1][0] - 0.25).abs() < 1.0e-15);
        assert!(directed[1].matrix[0][1].abs() < 1.0e-15);
    }

    #[test]
    fn split_preserves_total_exchange_strength() {
        let bond = BilinearCoupling::heisenberg(0, 1, [0, 0, 1], -2.0);
        let directed = split_bilinear(&[bond]);
        let total: f64 = directed.iter().map(|c| c.matrix[0][0]).sum();
        assert!((total - (-2.0)).abs() < 1.0e-15);
    }

    #[test]
    fn biquadratic_split_halves_the_scalar_both_ways() {
        let bond = BiquadraticCoupling::new(0, 1, [0, 0, 0], 0.5);
        let directed = split_biquadratic(&[bond]);
        assert_eq!(directed.len(), 2);
        assert!((directed[0].value - 0.25).abs() < 1.0e-15);
        assert_eq!(directed[1].source, 1);
        assert_eq!(directed[1].target, 0);
        assert!((directed[1].value - 0.25).abs() < 1.0e-15);
    }

    #[test]
    fn on_site_records_identify_themselves() {
        let aniso = BilinearCoupling::anisotropy(2, [[0.0; 3], [0.0; 3], [0.0, 0.0, -1.0]]);
        assert!(aniso.is_on_site());
        let bond = BilinearCoupling::heisenberg(0, 1, [0, 0, 0], 1.0);
        assert!(!bond.is_on_site());
    }
}
