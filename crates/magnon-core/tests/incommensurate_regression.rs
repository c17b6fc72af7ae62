//! Rotating-frame pipeline scenarios: helical chain and triangular
//! antiferromagnet through the tripled-Q unfolding.

use magnon_core::{
    compute_spinwave, BilinearCoupling, BiquadraticCoupling, CalculationOptions, MagneticState,
    Site, SortMode, SpinwaveError, SpinwaveInput, Warning,
};

/// J1-J2 chain stabilizing a planar helix with k = (0.2, 0, 0):
/// cos(2 pi k) = -J1 / (4 J2).
fn helical_chain(hkl: Vec<[f64; 3]>) -> SpinwaveInput {
    let j2 = 1.0 / (4.0 * (0.4 * std::f64::consts::PI).cos());
    SpinwaveInput::new(hkl, vec![Site::new([0.0; 3], [1.0, 0.0, 0.0])])
        .with_state(MagneticState::new([0.2, 0.0, 0.0], [0.0, 0.0, 1.0]))
        .with_bilinear(vec![
            BilinearCoupling::heisenberg(0, 0, [1, 0, 0], -1.0),
            BilinearCoupling::heisenberg(0, 0, [2, 0, 0], j2),
        ])
}

/// Triangular-lattice antiferromagnet in the rotating frame: one site,
/// 120-degree order at k = (1/3, 1/3, 0).
fn triangular_antiferromagnet(hkl: Vec<[f64; 3]>) -> SpinwaveInput {
    SpinwaveInput::new(hkl, vec![Site::new([0.0; 3], [1.0, 0.0, 0.0])])
        .with_state(MagneticState::new([1.0 / 3.0, 1.0 / 3.0, 0.0], [0.0, 0.0, 1.0]))
        .with_bilinear(vec![
            BilinearCoupling::heisenberg(0, 0, [1, 0, 0], 1.0),
            BilinearCoupling::heisenberg(0, 0, [0, 1, 0], 1.0),
            BilinearCoupling::heisenberg(0, 0, [1, 1, 0], 1.0),
        ])
}

#[test]
fn helical_chain_triples_the_mode_count() {
    let input = helical_chain(vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]);
    let spectra = compute_spinwave(&input, &CalculationOptions::new()).expect("spectra");

    assert!(spectra.incommensurate);
    assert!(spectra.helical);
    assert_eq!(spectra.n_modes, 6);

    for omega in &spectra.twins[0].omega {
        assert_eq!(omega.len(), 6);
        // three per-third groups of two conjugate modes
        for group in 0..3 {
            let upper = omega[2 * group];
            let lower = omega[2 * group + 1];
            assert!(
                (upper + lower).abs() < 1.0e-6,
                "group {group} not symmetric: {upper} / {lower}"
            );
            assert!(upper >= lower);
        }
    }

    // the stored Q list keeps the untripled values
    assert_eq!(spectra.hkl.len(), 2);
}

#[test]
fn helical_chain_has_gapless_phason_at_the_zone_center() {
    let input = helical_chain(vec![[0.0, 0.0, 0.0]]);
    let spectra = compute_spinwave(&input, &CalculationOptions::new()).expect("spectra");
    let omega = &spectra.twins[0].omega[0];
    let min_abs = omega.iter().map(|e| e.abs()).fold(f64::INFINITY, f64::min);
    // up to the shifted-Cholesky rescue at the Goldstone point (shift ~ sqrt(2 a tol))
    assert!(min_abs < 5.0e-2, "no gapless mode found: {omega:?}");
}

#[test]
fn helical_energies_are_symmetric_about_zero() {
    let input = helical_chain(vec![[0.13, 0.0, 0.0]]);
    let spectra = compute_spinwave(&input, &CalculationOptions::new()).expect("spectra");
    let omega = &spectra.twins[0].omega[0];

    let mut positive: Vec<f64> = omega.iter().copied().filter(|e| *e > 0.0).collect();
    let mut negated: Vec<f64> = omega.iter().copied().filter(|e| *e < 0.0).map(|e| -e).collect();
    positive.sort_by(f64::total_cmp);
    negated.sort_by(f64::total_cmp);
    assert_eq!(positive.len(), negated.len());
    for (p, n) in positive.iter().zip(&negated) {
        assert!((p - n).abs() < 1.0e-6, "asymmetric spectrum: {p} vs {n}");
    }
}

#[test]
fn triangular_antiferromagnet_is_gapless_at_gamma() {
    let input = triangular_antiferromagnet(vec![[0.0, 0.0, 0.0]]);
    let spectra = compute_spinwave(&input, &CalculationOptions::new()).expect("spectra");
    let omega = &spectra.twins[0].omega[0];
    assert_eq!(omega.len(), 6);
    let min_abs = omega.iter().map(|e| e.abs()).fold(f64::INFINITY, f64::min);
    assert!(min_abs < 5.0e-2, "no Goldstone mode: {omega:?}");
}

#[test]
fn triangular_antiferromagnet_zone_boundary_structure() {
    let input = triangular_antiferromagnet(vec![[0.5, 0.0, 0.0]]);
    let spectra = compute_spinwave(&input, &CalculationOptions::new()).expect("spectra");
    let omega = &spectra.twins[0].omega[0];
    assert_eq!(omega.len(), 6);
    for group in 0..3 {
        let upper = omega[2 * group];
        let lower = omega[2 * group + 1];
        assert!((upper + lower).abs() < 1.0e-6);
        assert!(upper.is_finite() && upper >= 0.0);
    }
}

#[test]
fn global_sort_reorders_the_concatenated_thirds() {
    let input = helical_chain(vec![[0.1, 0.0, 0.0]]);
    let options = CalculationOptions::new().with_sort_mode(SortMode::GlobalDescending);
    let spectra = compute_spinwave(&input, &options).expect("spectra");
    let omega = &spectra.twins[0].omega[0];
    for pair in omega.windows(2) {
        assert!(pair[0] >= pair[1], "not descending: {omega:?}");
    }
}

#[test]
fn rotating_frame_tensor_of_the_center_third_can_be_retained() {
    let input = helical_chain(vec![[0.1, 0.0, 0.0]]);
    let options = CalculationOptions::new().with_saved_rotating_frame();
    let spectra = compute_spinwave(&input, &options).expect("spectra");
    let rotating = spectra.twins[0]
        .sab_rotating
        .as_ref()
        .expect("rotating-frame tensors retained");
    // only the center third is stored: 2L tensors per Q
    assert_eq!(rotating[0].len(), 2);
}

#[test]
fn biquadratic_with_incommensurate_propagation_is_rejected() {
    let input = helical_chain(vec![[0.0, 0.0, 0.0]])
        .with_biquadratic(vec![BiquadraticCoupling::new(0, 0, [1, 0, 0], 0.2)]);
    let error = compute_spinwave(&input, &CalculationOptions::new()).expect_err("must fail");
    assert_eq!(error, SpinwaveError::BiquadraticIncommensurate);
}

#[test]
fn incommensurate_modulation_in_a_supercell_is_flagged_unvalidated() {
    let input = helical_chain(vec![[0.0, 0.0, 0.0]]).with_n_ext([2, 1, 1]);
    let spectra = compute_spinwave(&input, &CalculationOptions::new()).expect("spectra");
    assert!(spectra
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::IncommensurateSupercell)));
}
