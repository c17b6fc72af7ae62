//! Per-site local coordinate frames.
//!
//! Every magnetic site gets a right-handed orthonormal triad (e1, e2, e3)
//! with e3 along the ordered moment, compressed into the unit normal
//! `eta = e3` and the complex transverse basis `z = e1 + i e2`. These
//! satisfy `z.eta = 0`, `z.z = 0` and `z.conj(z) = 2`, which the
//! contribution tables rely on.

use num_complex::Complex64;

use crate::domain::{SpinwaveError, SpinwaveResult};
use crate::model::Site;
use crate::numerics::{cross3, dot3, mat3_cvec3, norm3};

const DEGENERATE_AXIS_TOL: f64 = 1.0e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalFrame {
    pub eta: [f64; 3],
    pub z: [Complex64; 3],
    /// `g . z`, equal to `z` for the default g-tensor.
    pub z_tilde: [Complex64; 3],
}

/// Build the local frames for all sites. Fails when any site carries a
/// zero-length moment.
pub fn build_local_frames(sites: &[Site]) -> SpinwaveResult<Vec<LocalFrame>> {
    if sites.is_empty() {
        return Err(SpinwaveError::EmptyMagneticStructure {
            reason: "no magnetic sites supplied".to_string(),
        });
    }

    sites
        .iter()
        .enumerate()
        .map(|(index, site)| frame_for_site(index, site))
        .collect()
}

fn frame_for_site(index: usize, site: &Site) -> SpinwaveResult<LocalFrame> {
    let (eta, e1, e2) = match site.fourier_amplitude() {
        Some(amplitude) => complex_magnetisation_frame(index, amplitude)?,
        None => moment_aligned_frame(index, site)?,
    };

    let z = [
        Complex64::new(e1[0], e2[0]),
        Complex64::new(e1[1], e2[1]),
        Complex64::new(e1[2], e2[2]),
    ];
    let z_tilde = if site.g_is_default() {
        z
    } else {
        mat3_cvec3(site.g_tensor(), &z)
    };

    Ok(LocalFrame { eta, z, z_tilde })
}

fn moment_aligned_frame(
    index: usize,
    site: &Site,
) -> SpinwaveResult<([f64; 3], [f64; 3], [f64; 3])> {
    let moment = site.moment();
    let length = site.spin_length();
    if length <= 0.0 {
        return Err(zero_moment(index));
    }

    let e3 = [moment[0] / length, moment[1] / length, moment[2] / length];
    let transverse = [0.0, e3[2], -e3[1]];
    let transverse_norm = norm3(&transverse);
    let e2 = if transverse_norm > DEGENERATE_AXIS_TOL {
        [
            transverse[0] / transverse_norm,
            transverse[1] / transverse_norm,
            transverse[2] / transverse_norm,
        ]
    } else {
        [0.0, 0.0, 1.0]
    };
    let e1 = cross3(&e2, &e3);
    Ok((e3, e1, e2))
}

fn complex_magnetisation_frame(
    index: usize,
    amplitude: &[Complex64; 3],
) -> SpinwaveResult<([f64; 3], [f64; 3], [f64; 3])> {
    let real = [amplitude[0].re, amplitude[1].re, amplitude[2].re];
    let imag = [amplitude[0].im, amplitude[1].im, amplitude[2].im];

    let real_norm = norm3(&real);
    if real_norm <= DEGENERATE_AXIS_TOL {
        return Err(zero_moment(index));
    }
    let e3 = [real[0] / real_norm, real[1] / real_norm, real[2] / real_norm];

    let projection = dot3(&imag, &e3);
    let perpendicular = [
        imag[0] - projection * e3[0],
        imag[1] - projection * e3[1],
        imag[2] - projection * e3[2],
    ];
    let perpendicular_norm = norm3(&perpendicular);

    let e1 = if perpendicular_norm > DEGENERATE_AXIS_TOL {
        [
            perpendicular[0] / perpendicular_norm,
            perpendicular[1] / perpendicular_norm,
            perpendicular[2] / perpendicular_norm,
        ]
    } else {
        // purely real amplitude: fall back to the moment-aligned transverse
        // choice around e3
        let transverse = [0.0, e3[2], -e3[1]];
        let transverse_norm = norm3(&transverse);
        let e2 = if transverse_norm > DEGENERATE_AXIS_TOL {
            [
                transverse[0] / transverse_norm,
                transverse[1] / transverse_norm,
                transverse[2] / transverse_norm,
            ]
        } else {
            [0.0, 0.0, 1.0]
        };
        let e1 = cross3(&e2, &e3);
        return Ok((e3, e1, e2));
    };

    let e2 = cross3(&e3, &e1);
    Ok((e3, e1, e2))
}

fn zero_moment(index: usize) -> SpinwaveError {
    SpinwaveError::EmptyMagneticStructure {
        reason: format!("site {index} carries a zero-length moment"),
    }
}

#[cfg(test)]
mod tests {
    use super::build_local_frames;
    use crate::model::Site;
    use crate::numerics::{cdot3, conj3};
    use num_complex::Complex64;

    fn assert_frame_invariants(frame: &super::LocalFrame) {
        let eta_c = [
            Complex64::new(frame.eta[0], 0.0),
            Complex64::new(frame.eta[1], 0.0),
            Complex64::new(frame.eta[2], 0.0),
        ];
        assert!(cdot3(&frame.z, &eta_c).norm() < 1.0e-12, "z.eta != 0");
        assert!(cdot3(&frame.z, &frame.z).norm() < 1.0e-12, "z.z != 0");
        let zzbar = cdot3(&frame.z, &conj3(&frame.z));
        assert!((zzbar - Complex64::new(2.0, 0.0)).norm() < 1.0e-12, "z.conj(z) != 2");
    }

    #[test]
    fn moment_along_z_gives_the_canonical_frame() {
        let frames = build_local_frames(&[Site::new([0.0; 3], [0.0, 0.0, 2.5])]).expect("frames");
        let frame = &frames[0];
        assert_eq!(frame.eta, [0.0, 0.0, 1.0]);
        assert!((frame.z[0] - Complex64::new(1.0, 0.0)).norm() < 1.0e-12);
        assert!((frame.z[1] - Complex64::new(0.0, 1.0)).norm() < 1.0e-12);
        assert_frame_invariants(frame);
    }

    #[test]
    fn tilted_moments_still_satisfy_the_frame_invariants() {
        let moments = [
            [1.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
            [1.0, 1.0, 1.0],
            [0.3, -0.2, 0.9],
        ];
        for moment in moments {
            let frames = build_local_frames(&[Site::new([0.0; 3], moment)]).expect("frames");
            assert_frame_invariants(&frames[0]);
        }
    }

    #[test]
    fn complex_magnetisation_convention_uses_the_fourier_amplitude() {
        let i = Complex64::new(0.0, 1.0);
        let site = Site::new([0.0; 3], [1.0, 0.0, 0.0]).with_fourier_amplitude([
            Complex64::new(1.0, 0.0),
            i,
            Complex64::new(0.0, 0.0),
        ]);
        let frames = build_local_frames(&[site]).expect("frames");
        let frame = &frames[0];
        assert_eq!(frame.eta, [1.0, 0.0, 0.0]);
        assert_frame_invariants(frame);
    }

    #[test]
    fn zero_moment_is_rejected_with_the_site_index() {
        let error = build_local_frames(&[
            Site::new([0.0; 3], [0.0, 0.0, 1.0]),
            Site::new([0.0; 3], [0.0, 0.0, 0.0]),
        ])
        .expect_err("zero moment must fail");
        assert!(error.to_string().contains("site 1"));
    }

    #[test]
    fn empty_site_list_is_rejected() {
        assert!(build_local_frames(&[]).is_err());
    }

    #[test]
    fn g_tensor_scales_the_correlation_basis() {
        let site = Site::new([0.0; 3], [0.0, 0.0, 1.0]).with_g_tensor([
            [2.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 2.0],
        ]);
        let frames = build_local_frames(&[site]).expect("frames");
        let frame = &frames[0];
        assert!((frame.z_tilde[0] - 2.0 * frame.z[0]).norm() < 1.0e-12);
    }
}
