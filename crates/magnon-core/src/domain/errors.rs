//! Error and warning taxonomy of the spin-wave core.
//!
//! Fatal conditions abort the whole computation and surface as
//! [`SpinwaveError`]; everything recoverable is collected into the
//! [`Warning`] buffer returned alongside the results.

pub type SpinwaveResult<T> = Result<T, SpinwaveError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpinwaveError {
    #[error("magnetic structure is empty: {reason}")]
    EmptyMagneticStructure { reason: String },
    #[error(
        "Hamiltonian at Q index {q_index} is not positive definite after shift retry \
         (estimated smallest eigenvalue {min_eigenvalue:.6e})"
    )]
    NonPosDefHamiltonian { q_index: usize, min_eigenvalue: f64 },
    #[error("eigendecomposition failed to converge at Q index {q_index}")]
    EigensolverFailure { q_index: usize },
    #[error("biquadratic couplings are not supported for incommensurate structures")]
    BiquadraticIncommensurate,
    #[error("dimension mismatch in '{array}': expected {expected}, got {actual}")]
    DimensionMismatch {
        array: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl SpinwaveError {
    /// Q index the error is anchored to, when it is a per-Q failure.
    /// Fatal-error selection scans for the lowest anchored index.
    pub fn q_index(&self) -> Option<usize> {
        match self {
            Self::NonPosDefHamiltonian { q_index, .. } | Self::EigensolverFailure { q_index } => {
                Some(*q_index)
            }
            _ => None,
        }
    }
}

/// Non-fatal observations collected during a computation.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The Cholesky factorization needed a diagonal shift at this Q point.
    CholeskyShifted { q_index: usize, shift: f64 },
    /// Degenerate eigenvectors could not be re-orthogonalized at this Q point.
    DegenerateModesNotOrthogonal { q_index: usize },
    /// The non-Hermitian path produced eigenvalues with imaginary parts.
    ImaginaryModes { q_index: usize, max_imaginary: f64 },
    /// The correlation transform re-solved after a singular triangular factor.
    SingularModeTransform { q_index: usize },
    /// Incommensurate modulation inside an explicit supercell is not validated.
    IncommensurateSupercell,
    /// No free-memory figure was supplied; chunking used a default budget.
    FreeMemoryUnknown { assumed_bytes: u64 },
    /// A twin carries a degenerate rotation or zero weight and was skipped
    /// in the volume average.
    TwinRotationInvalid { twin_index: usize },
    /// The g-tensor option is on but every site carries the identity tensor.
    GTensorNotSet,
}

impl Warning {
    pub fn q_index(&self) -> Option<usize> {
        match self {
            Self::CholeskyShifted { q_index, .. }
            | Self::DegenerateModesNotOrthogonal { q_index }
            | Self::ImaginaryModes { q_index, .. }
            | Self::SingularModeTransform { q_index } => Some(*q_index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SpinwaveError, Warning};

    #[test]
    fn per_q_errors_expose_their_anchor() {
        let error = SpinwaveError::NonPosDefHamiltonian {
            q_index: 7,
            min_eigenvalue: -0.25,
        };
        assert_eq!(error.q_index(), Some(7));
        assert_eq!(SpinwaveError::BiquadraticIncommensurate.q_index(), None);
    }

    #[test]
    fn error_messages_name_the_failing_array() {
        let error = SpinwaveError::DimensionMismatch {
            array: "hkl",
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            error.to_string(),
            "dimension mismatch in 'hkl': expected 3, got 2"
        );
    }

    #[test]
    fn warnings_anchor_to_q_where_applicable() {
        let warning = Warning::CholeskyShifted {
            q_index: 3,
            shift: 1.0e-6,
        };
        assert_eq!(warning.q_index(), Some(3));
        assert_eq!(Warning::GTensorNotSet.q_index(), None);
    }
}
