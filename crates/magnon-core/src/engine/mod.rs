//! Scheduling and the public compute call.
//!
//! The Q-independent tables are built once, then the Q list is cut into
//! contiguous chunks sized from the free-memory budget and processed chunk
//! by chunk; the Q points inside a chunk fan out over rayon. Cooperative
//! cancellation is tested between chunks only.

use rayon::prelude::*;

use crate::domain::{SpinwaveError, SpinwaveResult, Warning};
use crate::model::{
    split_bilinear, split_biquadratic, BilinearCoupling, BiquadraticCoupling, CalculationOptions,
    MagneticField, MagneticState, Site, SortMode, Twin,
};
use crate::numerics::bilinear::{build_bilinear_table, BilinearTable, RotatingFrame};
use crate::numerics::biquadratic::{build_biquadratic_table, BiquadraticTable};
use crate::numerics::bogoliubov::{diagonalize_colpa, diagonalize_white, DiagonalizeSettings};
use crate::numerics::correlation::{
    absolute_momentum, correlation_tensors, neutron_projection, scattering_direction, SiteWeights,
};
use crate::numerics::frames::{build_local_frames, LocalFrame};
use crate::numerics::hamiltonian::assemble_hamiltonian;
use crate::numerics::unfold::{helical_phase_average, rotate_to_lab, triple_q, THIRDS};
use crate::numerics::zeeman::zeeman_diagonal;
use crate::numerics::{
    tensor_add, tensor_rotate, tensor_scale, CorrelationTensor, DenseComplexMatrix,
};

/// Measured bytes-per-Q-element multiplier covering the Hamiltonian, mode
/// matrix, phase factors and tensor intermediates.
const BYTES_PER_Q_ELEMENT: u64 = 6912;
/// Budget assumed when the caller supplies no free-memory figure.
const DEFAULT_FREE_MEMORY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Flat numeric inputs of one spin-wave computation.
#[derive(Debug, Clone)]
pub struct SpinwaveInput {
    /// Q points, 3 x nQ in reciprocal-lattice units.
    pub hkl: Vec<[f64; 3]>,
    /// Extended (magnetic) cell size along each axis.
    pub n_ext: [u32; 3],
    /// Propagation vector (extended-cell units) and rotation axis.
    pub state: MagneticState,
    pub sites: Vec<Site>,
    pub bilinear: Vec<BilinearCoupling>,
    pub biquadratic: Vec<BiquadraticCoupling>,
    pub field: MagneticField,
    pub twins: Vec<Twin>,
    /// Basis matrix taking hkl to Cartesian inverse Angstrom.
    pub rlu_to_cart: [[f64; 3]; 3],
}

impl SpinwaveInput {
    pub fn new(hkl: Vec<[f64; 3]>, sites: Vec<Site>) -> Self {
        Self {
            hkl,
            n_ext: [1, 1, 1],
            state: MagneticState::commensurate(),
            sites,
            bilinear: Vec::new(),
            biquadratic: Vec::new(),
            field: MagneticField::new([0.0; 3]),
            twins: vec![Twin::identity()],
            rlu_to_cart: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn with_n_ext(mut self, n_ext: [u32; 3]) -> Self {
        self.n_ext = n_ext;
        self
    }

    pub fn with_state(mut self, state: MagneticState) -> Self {
        self.state = state;
        self
    }

    pub fn with_bilinear(mut self, bilinear: Vec<BilinearCoupling>) -> Self {
        self.bilinear = bilinear;
        self
    }

    pub fn with_biquadratic(mut self, biquadratic: Vec<BiquadraticCoupling>) -> Self {
        self.biquadratic = biquadratic;
        self
    }

    pub fn with_field(mut self, field: MagneticField) -> Self {
        self.field = field;
        self
    }

    pub fn with_twins(mut self, twins: Vec<Twin>) -> Self {
        self.twins = twins;
        self
    }

    pub fn with_basis(mut self, rlu_to_cart: [[f64; 3]; 3]) -> Self {
        self.rlu_to_cart = rlu_to_cart;
        self
    }
}

/// Spectrum of one twin.
#[derive(Debug, Clone)]
pub struct TwinSpectrum {
    pub rotation: [[f64; 3]; 3],
    pub weight: f64,
    /// Mode energies per Q point, `n_modes` each.
    pub omega: Vec<Vec<f64>>,
    pub sab: Option<Vec<Vec<CorrelationTensor>>>,
    pub sperp: Option<Vec<Vec<f64>>>,
    /// Mode matrices per Q, one per diagonalization (three for
    /// incommensurate structures).
    pub eigenvectors: Option<Vec<Vec<DenseComplexMatrix>>>,
    pub hamiltonians: Option<Vec<Vec<DenseComplexMatrix>>>,
    /// Rotating-frame tensors of the center third.
    pub sab_rotating: Option<Vec<Vec<CorrelationTensor>>>,
}

#[derive(Debug, Clone)]
pub struct SpinwaveSpectra {
    pub hkl: Vec<[f64; 3]>,
    /// Modes per Q point: 2L, 6L incommensurate, halved in fast mode.
    pub n_modes: usize,
    pub incommensurate: bool,
    pub helical: bool,
    pub twins: Vec<TwinSpectrum>,
    /// Volume-weighted average over valid twins.
    pub sab_average: Option<Vec<Vec<CorrelationTensor>>>,
    pub sperp_average: Option<Vec<Vec<f64>>>,
    pub warnings: Vec<Warning>,
    /// Q points fully processed before cancellation; equals nQ when the
    /// computation ran to completion.
    pub completed_q: usize,
    pub cancelled: bool,
}

struct ComputeContext<'a> {
    input: &'a SpinwaveInput,
    options: &'a CalculationOptions,
    frames: Vec<LocalFrame>,
    spins: Vec<f64>,
    positions: Vec<[f64; 3]>,
    bilinear_table: BilinearTable,
    biquadratic_table: Option<BiquadraticTable>,
    incommensurate: bool,
    helical: bool,
    axis: [f64; 3],
    n_cell: f64,
    n_sites: usize,
}

struct QPointOutput {
    omega: Vec<f64>,
    sab: Option<Vec<CorrelationTensor>>,
    sperp: Option<Vec<f64>>,
    eigenvectors: Option<Vec<DenseComplexMatrix>>,
    hamiltonians: Option<Vec<DenseComplexMatrix>>,
    sab_rotating: Option<Vec<CorrelationTensor>>,
    warnings: Vec<Warning>,
}

pub fn compute_spinwave(
    input: &SpinwaveInput,
    options: &CalculationOptions,
) -> SpinwaveResult<SpinwaveSpectra> {
    let mut warnings = Vec::new();
    let context = prepare_context(input, options, &mut warnings)?;

    match options.thread_count {
        Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| run_schedule(&context, warnings)),
            Err(_) => run_schedule(&context, warnings),
        },
        None => run_schedule(&context, warnings),
    }
}

fn prepare_context<'a>(
    input: &'a SpinwaveInput,
    options: &'a CalculationOptions,
    warnings: &mut Vec<Warning>,
) -> SpinwaveResult<ComputeContext<'a>> {
    validate_input(input)?;

    let kind = input.state.classify(options.tol);
    if kind.incommensurate && !input.biquadratic.is_empty() {
        return Err(SpinwaveError::BiquadraticIncommensurate);
    }
    if kind.incommensurate && input.n_ext != [1, 1, 1] {
        warnings.push(Warning::IncommensurateSupercell);
    }
    if options.use_g_tensor && input.sites.iter().all(Site::g_is_default) {
        warnings.push(Warning::GTensorNotSet);
    }

    let axis = match input.state.normalized_axis() {
        Some(axis) => axis,
        None if kind.incommensurate => {
            return Err(SpinwaveError::DimensionMismatch {
                array: "n",
                expected: 1,
                actual: 0,
            })
        }
        None => [0.0, 0.0, 1.0],
    };

    let frames = build_local_frames(&input.sites)?;
    let spins: Vec<f64> = input.sites.iter().map(Site::spin_length).collect();
    let positions: Vec<[f64; 3]> = input.sites.iter().map(Site::position).collect();

    let directed = split_bilinear(&input.bilinear);
    let rotating = RotatingFrame {
        propagation: input.state.propagation,
        axis,
    };
    let bilinear_table = build_bilinear_table(
        &directed,
        &frames,
        &spins,
        kind.incommensurate.then_some(&rotating),
    );

    let biquadratic_table = if input.biquadratic.is_empty() {
        None
    } else {
        let directed = split_biquadratic(&input.biquadratic);
        Some(build_biquadratic_table(&directed, &frames, &spins))
    };

    let n_cell = (input.n_ext[0] as f64) * (input.n_ext[1] as f64) * (input.n_ext[2] as f64);

    Ok(ComputeContext {
        input,
        options,
        frames,
        spins,
        positions,
        bilinear_table,
        biquadratic_table,
        incommensurate: kind.incommensurate,
        helical: kind.helical,
        axis,
        n_cell,
        n_sites: input.sites.len(),
    })
}

fn validate_input(input: &SpinwaveInput) -> SpinwaveResult<()> {
    let n_sites = input.sites.len();
    if input.n_ext.iter().any(|&extent| extent == 0) {
        return Err(SpinwaveError::DimensionMismatch {
            array: "nExt",
            expected: 1,
            actual: 0,
        });
    }
    for coupling in &input.bilinear {
        for index in [coupling.source, coupling.target] {
            if index >= n_sites {
                return Err(SpinwaveError::DimensionMismatch {
                    array: "bilinear",
                    expected: n_sites,
                    actual: index,
                });
            }
        }
    }
    for coupling in &input.biquadratic {
        for index in [coupling.source, coupling.target] {
            if index >= n_sites {
                return Err(SpinwaveError::DimensionMismatch {
                    array: "biquadratic",
                    expected: n_sites,
                    actual: index,
                });
            }
        }
    }
    Ok(())
}

fn run_schedule(
    context: &ComputeContext<'_>,
    mut warnings: Vec<Warning>,
) -> SpinwaveResult<SpinwaveSpectra> {
    let input = context.input;
    let options = context.options;
    let n_q = input.hkl.len();
    let thirds = if context.incommensurate { 3 } else { 1 };
    let modes_per_diag = if options.fast_mode {
        context.n_sites
    } else {
        2 * context.n_sites
    };
    let n_modes = thirds * modes_per_diag;

    let chunks = plan_chunks(context, n_q, thirds as u64, &mut warnings);

    let mut twins = Vec::with_capacity(input.twins.len());
    let mut cancelled = false;
    let mut completed_q = n_q;

    for (twin_index, twin) in input.twins.iter().enumerate() {
        let twin_valid = twin.is_valid(options.tol);
        if !twin_valid {
            warnings.push(Warning::TwinRotationInvalid { twin_index });
        }
        let zeeman = zeeman_diagonal(&input.field, twin, &input.sites, &context.frames);

        let mut spectrum = empty_spectrum(twin, n_q, options);

        'chunks: for chunk in &chunks {
            if let Some(token) = &options.cancel {
                if token.is_cancelled() {
                    cancelled = true;
                    completed_q = completed_q.min(chunk.start);
                    break 'chunks;
                }
            }

            let results: Vec<SpinwaveResult<QPointOutput>> = (chunk.start..chunk.end)
                .into_par_iter()
                .map(|q_index| compute_q_point(context, q_index, twin, &zeeman))
                .collect();

            // deterministic scan: the lowest Q index error aborts everything
            for result in results.into_iter() {
                let output = result?;
                store_output(&mut spectrum, output, &mut warnings);
            }
        }

        twins.push(spectrum);
        if cancelled {
            break;
        }
    }

    let (sab_average, sperp_average) = average_twins(input, &twins, options);

    Ok(SpinwaveSpectra {
        hkl: input.hkl.clone(),
        n_modes,
        incommensurate: context.incommensurate,
        helical: context.helical,
        twins,
        sab_average,
        sperp_average,
        warnings,
        completed_q: if cancelled { completed_q } else { n_q },
        cancelled,
    })
}

fn empty_spectrum(twin: &Twin, n_q: usize, options: &CalculationOptions) -> TwinSpectrum {
    TwinSpectrum {
        rotation: twin.rotation,
        weight: twin.weight,
        omega: Vec::with_capacity(n_q),
        sab: (!options.neutron_output).then(Vec::new),
        sperp: options.neutron_output.then(Vec::new),
        eigenvectors: options.save_eigenvectors.then(Vec::new),
        hamiltonians: options.save_hamiltonian.then(Vec::new),
        sab_rotating: options.save_sab_rotating.then(Vec::new),
    }
}

fn store_output(spectrum: &mut TwinSpectrum, output: QPointOutput, warnings: &mut Vec<Warning>) {
    spectrum.omega.push(output.omega);
    if let (Some(store), Some(sab)) = (spectrum.sab.as_mut(), output.sab) {
        store.push(sab);
    }
    if let (Some(store), Some(sperp)) = (spectrum.sperp.as_mut(), output.sperp) {
        store.push(sperp);
    }
    if let (Some(store), Some(vectors)) = (spectrum.eigenvectors.as_mut(), output.eigenvectors) {
        store.push(vectors);
    }
    if let (Some(store), Some(matrices)) = (spectrum.hamiltonians.as_mut(), output.hamiltonians) {
        store.push(matrices);
    }
    if let (Some(store), Some(tensors)) = (spectrum.sab_rotating.as_mut(), output.sab_rotating) {
        store.push(tensors);
    }
    warnings.extend(output.warnings);
}

#[derive(Debug, Clone)]
struct Chunk {
    start: usize,
    end: usize,
}

/// Contiguous chunking from the free-memory heuristic
/// `nSlice = ceil(L^2 nQ 6912 / F * 2)`, doubled while the projected chunk
/// footprint still exceeds the budget.
fn plan_chunks(
    context: &ComputeContext<'_>,
    n_q: usize,
    thirds: u64,
    warnings: &mut Vec<Warning>,
) -> Vec<Chunk> {
    if n_q == 0 {
        return Vec::new();
    }

    let options = context.options;
    let mut n_slice = match options.chunk_override {
        Some(chunks) => chunks.clamp(1, n_q),
        None => {
            let budget = match options.free_memory_bytes {
                Some(bytes) => bytes.max(1),
                None => {
                    warnings.push(Warning::FreeMemoryUnknown {
                        assumed_bytes: DEFAULT_FREE_MEMORY_BYTES,
                    });
                    DEFAULT_FREE_MEMORY_BYTES
                }
            };
            let l2 = (context.n_sites * context.n_sites) as u64;
            let work = l2 * (n_q as u64) * thirds * BYTES_PER_Q_ELEMENT * 2;
            let estimate = work.div_ceil(budget).max(1) as usize;
            let mut n_slice = estimate.clamp(1, n_q);
            let per_q = l2 * thirds * BYTES_PER_Q_ELEMENT;
            while n_slice < n_q && per_q * (n_q.div_ceil(n_slice) as u64) > budget {
                n_slice *= 2;
            }
            n_slice.clamp(1, n_q)
        }
    };
    n_slice = n_slice.clamp(1, n_q);

    let chunk_len = n_q.div_ceil(n_slice);
    let mut chunks = Vec::with_capacity(n_slice);
    let mut start = 0;
    while start < n_q {
        let end = (start + chunk_len).min(n_q);
        chunks.push(Chunk { start, end });
        start = end;
    }
    chunks
}

fn compute_q_point(
    context: &ComputeContext<'_>,
    q_index: usize,
    twin: &Twin,
    zeeman: &[f64],
) -> SpinwaveResult<QPointOutput> {
    let input = context.input;
    let options = context.options;
    let n_sites = context.n_sites;

    let q_rlu = input.hkl[q_index];
    let mut q_ext = [0.0; 3];
    for axis in 0..3 {
        q_ext[axis] = q_rlu[axis] * input.n_ext[axis] as f64;
    }

    // form factor and scattering direction belong to the untripled lab Q
    let form_factors: Vec<f64> = if options.use_form_factor {
        let q_abs = absolute_momentum(&q_rlu, &input.rlu_to_cart);
        input
            .sites
            .iter()
            .map(|site| site.form_factor().map_or(1.0, |ff| ff.evaluate(q_abs)))
            .collect()
    } else {
        vec![1.0; n_sites]
    };
    let q_hat = scattering_direction(
        &q_rlu,
        input.hkl.get(q_index + 1),
        &input.rlu_to_cart,
    );

    let third_qs: Vec<[f64; 3]> = if context.incommensurate {
        triple_q(&q_ext, &input.state.propagation).to_vec()
    } else {
        vec![q_ext]
    };

    let mut warnings = Vec::new();
    let mut omega = Vec::new();
    let mut tensors = Vec::new();
    let mut eigenvectors = options.save_eigenvectors.then(Vec::new);
    let mut hamiltonians = options.save_hamiltonian.then(Vec::new);
    let mut sab_rotating = options.save_sab_rotating.then(Vec::new);

    let settings = DiagonalizeSettings {
        q_index,
        omega_tol: options.omega_tol,
        fallback: options.fallback,
        fast_mode: options.fast_mode,
    };

    for (third_index, third_q) in third_qs.iter().enumerate() {
        let h = assemble_hamiltonian(
            third_q,
            n_sites,
            &context.bilinear_table,
            context.biquadratic_table.as_ref(),
            Some(zeeman),
        );
        if let Some(store) = hamiltonians.as_mut() {
            store.push(h.clone());
        }

        let modes = if options.hermit {
            diagonalize_colpa(&h, &settings)?
        } else {
            diagonalize_white(&h, &settings)?
        };
        warnings.extend(modes.warnings.iter().cloned());

        let weights = SiteWeights::new(third_q, &context.positions, &context.spins, &form_factors);
        let mut third_tensors = correlation_tensors(
            &modes.vectors,
            &context.frames,
            &weights,
            options.use_g_tensor,
            context.n_cell,
        );

        if context.incommensurate {
            if third_index == 1 {
                if let Some(store) = sab_rotating.as_mut() {
                    store.extend(third_tensors.iter().cloned());
                }
            }
            let third = THIRDS[third_index];
            for tensor in third_tensors.iter_mut() {
                let mut rotated = rotate_to_lab(tensor, third, &context.axis);
                if context.helical {
                    rotated = helical_phase_average(&rotated, &context.axis);
                }
                *tensor = rotated;
            }
        }

        if let Some(store) = eigenvectors.as_mut() {
            store.push(modes.vectors);
        }
        omega.extend(modes.energies);
        tensors.extend(third_tensors);
    }

    // intensity normalization and twin rotation of the lab-frame tensor
    if let Some(nformula) = options.nformula {
        if nformula > 0 {
            let scale = 1.0 / nformula as f64;
            for tensor in tensors.iter_mut() {
                *tensor = tensor_scale(tensor, scale);
            }
        }
    }
    for tensor in tensors.iter_mut() {
        *tensor = tensor_rotate(&twin.rotation, tensor);
    }

    let mut sperp = neutron_projection(&tensors, &q_hat);

    sort_modes(options.sort_mode, &mut omega, &mut tensors, &mut sperp);

    Ok(QPointOutput {
        omega,
        sab: (!options.neutron_output).then_some(tensors),
        sperp: options.neutron_output.then_some(sperp),
        eigenvectors,
        hamiltonians,
        sab_rotating,
        warnings,
    })
}

fn sort_modes(
    mode: SortMode,
    omega: &mut [f64],
    tensors: &mut [CorrelationTensor],
    sperp: &mut [f64],
) {
    let order: Vec<usize> = match mode {
        // each diagonalization already emitted descending energies
        SortMode::PerDiagonalization => return,
        SortMode::GlobalDescending => {
            let mut order: Vec<usize> = (0..omega.len()).collect();
            order.sort_by(|&a, &b| omega[b].total_cmp(&omega[a]).then_with(|| a.cmp(&b)));
            order
        }
        SortMode::EnergyThenIntensity => {
            let mut order: Vec<usize> = (0..omega.len()).collect();
            order.sort_by(|&a, &b| {
                omega[b]
                    .total_cmp(&omega[a])
                    .then_with(|| sperp[b].total_cmp(&sperp[a]))
                    .then_with(|| a.cmp(&b))
            });
            order
        }
    };

    apply_permutation(omega, &order);
    apply_permutation(tensors, &order);
    apply_permutation(sperp, &order);
}

fn apply_permutation<T: Clone>(values: &mut [T], order: &[usize]) {
    let snapshot: Vec<T> = values.to_vec();
    for (slot, &source) in order.iter().enumerate() {
        values[slot] = snapshot[source].clone();
    }
}

fn average_twins(
    input: &SpinwaveInput,
    twins: &[TwinSpectrum],
    options: &CalculationOptions,
) -> (
    Option<Vec<Vec<CorrelationTensor>>>,
    Option<Vec<Vec<f64>>>,
) {
    let valid: Vec<&TwinSpectrum> = twins
        .iter()
        .filter(|twin| Twin::new(twin.rotation, twin.weight).is_valid(options.tol))
        .collect();
    if valid.is_empty() {
        return (None, None);
    }
    let total_weight: f64 = valid.iter().map(|twin| twin.weight).sum();
    if total_weight <= 0.0 {
        return (None, None);
    }
    let n_q = input.hkl.len();
    // averaging only covers Q points every valid twin completed
    let common_q = valid
        .iter()
        .map(|twin| twin.omega.len())
        .min()
        .unwrap_or(0)
        .min(n_q);

    let sab_sets: Vec<(&Vec<Vec<CorrelationTensor>>, f64)> = valid
        .iter()
        .filter_map(|twin| twin.sab.as_ref().map(|sab| (sab, twin.weight)))
        .collect();
    let sab_average = if sab_sets.len() == valid.len() && !sab_sets.is_empty() {
        let mut averaged = Vec::with_capacity(common_q);
        for q_index in 0..common_q {
            let n_modes = sab_sets[0].0[q_index].len();
            let mut per_mode = vec![crate::numerics::zero_tensor(); n_modes];
            for (sab, weight) in &sab_sets {
                let share = weight / total_weight;
                for (mode, tensor) in sab[q_index].iter().enumerate() {
                    per_mode[mode] = tensor_add(&per_mode[mode], &tensor_scale(tensor, share));
                }
            }
            averaged.push(per_mode);
        }
        Some(averaged)
    } else {
        None
    };

    let sperp_sets: Vec<(&Vec<Vec<f64>>, f64)> = valid
        .iter()
        .filter_map(|twin| twin.sperp.as_ref().map(|sperp| (sperp, twin.weight)))
        .collect();
    let sperp_average = if sperp_sets.len() == valid.len() && !sperp_sets.is_empty() {
        let mut averaged = Vec::with_capacity(common_q);
        for q_index in 0..common_q {
            let n_modes = sperp_sets[0].0[q_index].len();
            let mut per_mode = vec![0.0; n_modes];
            for (sperp, weight) in &sperp_sets {
                let share = weight / total_weight;
                for (mode, value) in sperp[q_index].iter().enumerate() {
                    per_mode[mode] += share * value;
                }
            }
            averaged.push(per_mode);
        }
        Some(averaged)
    } else {
        None
    };

    (sab_average, sperp_average)
}
