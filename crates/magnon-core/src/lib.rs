//! Linear spin-wave theory engine for magnetic crystals.
//!
//! Given magnetic sites with ordered moments, pairwise (and biquadratic)
//! couplings, single-ion anisotropies, an external field and a propagation
//! vector, the crate computes the magnon mode energies and the dynamical
//! spin-spin correlation tensor (or its neutron-observable projection) at
//! every requested reciprocal-space point. The per-Q work builds a 2L x 2L
//! bosonic Hamiltonian, decomposes it para-unitarily (Colpa's Cholesky
//! method with a shifted retry, or White's non-Hermitian path) and
//! contracts the modes with the rotated local bases; incommensurate
//! structures are unfolded through the rotating frame.

pub mod common;
pub mod domain;
pub mod engine;
pub mod model;
pub mod numerics;

pub use domain::{SpinwaveError, SpinwaveResult, Warning};
pub use engine::{compute_spinwave, SpinwaveInput, SpinwaveSpectra, TwinSpectrum};
pub use model::{
    BilinearCoupling, BiquadraticCoupling, CalculationOptions, CancelToken, HamiltonianFallback,
    MagneticField, MagneticState, Site, SortMode, Twin,
};
pub use numerics::formfactor::{FormFactor, FormFactorCoefficients};
pub use numerics::CorrelationTensor;
