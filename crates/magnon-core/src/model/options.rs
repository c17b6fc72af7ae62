//! Calculation options for a spin-wave computation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Final ordering of the modes of each Q point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Sort each diagonalization independently by descending energy; an
    /// incommensurate Q keeps its three per-third groups.
    #[default]
    PerDiagonalization,
    /// Re-sort the concatenated modes of each Q by descending energy.
    GlobalDescending,
    /// Stable key for reproducible comparisons across degenerate pairs:
    /// descending energy, then descending projected intensity.
    EnergyThenIntensity,
}

/// Strategy used when the Cholesky factorization of h(Q) fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HamiltonianFallback {
    /// Retry once with a diagonal shift scaled from the most negative
    /// eigenvalue estimate.
    #[default]
    ShiftedCholesky,
    /// Use an LDL^dagger factorization and absorb sqrt(D) into the factor.
    Ldlt,
}

/// Cooperative cancellation flag checked between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Use Colpa's Cholesky-based path; `false` selects the non-Hermitian
    /// (White) diagonalization of G*h.
    pub hermit: bool,
    /// Materialize only the positive-energy half of the spectrum.
    pub fast_mode: bool,
    /// Produce the neutron-observable projection S_perp instead of the
    /// full correlation tensors.
    pub neutron_output: bool,
    /// Apply per-site g-tensors to the correlation basis vectors.
    pub use_g_tensor: bool,
    /// Apply per-site magnetic form factors.
    pub use_form_factor: bool,
    /// Degeneracy window and zero-energy clamp for the diagonalizer.
    pub omega_tol: f64,
    /// Commensurability / rotation-validity tolerance.
    pub tol: f64,
    pub sort_mode: SortMode,
    pub fallback: HamiltonianFallback,
    /// Worker threads for the per-chunk Q loop; `None` uses the global pool.
    pub thread_count: Option<usize>,
    /// Fixed chunk count, bypassing the free-memory heuristic.
    pub chunk_override: Option<usize>,
    /// Free-memory budget in bytes for chunk sizing.
    pub free_memory_bytes: Option<u64>,
    /// Formula units per cell; positive values normalize the intensities.
    pub nformula: Option<u32>,
    pub save_eigenvectors: bool,
    pub save_hamiltonian: bool,
    /// Retain the rotating-frame correlation tensor of the center third.
    pub save_sab_rotating: bool,
    pub cancel: Option<CancelToken>,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            hermit: true,
            fast_mode: false,
            neutron_output: false,
            use_g_tensor: false,
            use_form_factor: false,
            omega_tol: 1.0e-5,
            tol: 1.0e-4,
            sort_mode: SortMode::default(),
            fallback: HamiltonianFallback::default(),
            thread_count: None,
            chunk_override: None,
            free_memory_bytes: None,
            nformula: None,
            save_eigenvectors: false,
            save_hamiltonian: false,
            save_sab_rotating: false,
            cancel: None,
        }
    }
}

impl CalculationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hermit(mut self, hermit: bool) -> Self {
        self.hermit = hermit;
        self
    }

    pub fn with_fast_mode(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }

    pub fn with_neutron_output(mut self, neutron_output: bool) -> Self {
        self.neutron_output = neutron_output;
        self
    }

    pub fn with_g_tensor(mut self, use_g_tensor: bool) -> Self {
        self.use_g_tensor = use_g_tensor;
        self
    }

    pub fn with_form_factor(mut self, use_form_factor: bool) -> Self {
        self.use_form_factor = use_form_factor;
        self
    }

    pub fn with_omega_tol(mut self, omega_tol: f64) -> Self {
        self.omega_tol = omega_tol;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_sort_mode(mut self, sort_mode: SortMode) -> Self {
        self.sort_mode = sort_mode;
        self
    }

    pub fn with_fallback(mut self, fallback: HamiltonianFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = Some(thread_count);
        self
    }

    pub fn with_chunk_override(mut self, chunks: usize) -> Self {
        self.chunk_override = Some(chunks);
        self
    }

    pub fn with_free_memory_bytes(mut self, bytes: u64) -> Self {
        self.free_memory_bytes = Some(bytes);
        self
    }

    pub fn with_nformula(mut self, nformula: u32) -> Self {
        self.nformula = Some(nformula);
        self
    }

    pub fn with_saved_eigenvectors(mut self) -> Self {
        self.save_eigenvectors = true;
        self
    }

    pub fn with_saved_hamiltonian(mut self) -> Self {
        self.save_hamiltonian = true;
        self
    }

    pub fn with_saved_rotating_frame(mut self) -> Self {
        self.save_sab_rotating = true;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{CalculationOptions, CancelToken, HamiltonianFallback, SortMode};

    #[test]
    fn defaults_select_the_colpa_path() {
        let options = CalculationOptions::new();
        assert!(options.hermit);
        assert!(!options.fast_mode);
        assert_eq!(options.sort_mode, SortMode::PerDiagonalization);
        assert_eq!(options.fallback, HamiltonianFallback::ShiftedCholesky);
        assert_eq!(options.omega_tol, 1.0e-5);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let options = CalculationOptions::new().with_cancel_token(token.clone());
        assert!(!options.cancel.as_ref().unwrap().is_cancelled());
        token.cancel();
        assert!(options.cancel.as_ref().unwrap().is_cancelled());
    }
}
