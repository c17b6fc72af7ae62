//! Axis-angle rotations for the rotating-frame transformation and the
//! incommensurate unfolding.

use super::{cross3, dot3, norm3};

/// Skew-symmetric matrix `[n]x` with `[n]x v = n x v`.
pub fn skew(axis: &[f64; 3]) -> [[f64; 3]; 3] {
    let [x, y, z] = *axis;
    [[0.0, -z, y], [z, 0.0, -x], [-y, x, 0.0]]
}

/// Outer product `n n^T`.
pub fn outer(axis: &[f64; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            out[row][col] = axis[row] * axis[col];
        }
    }
    out
}

/// Rodrigues rotation by `angle` (radians) around the unit vector `axis`.
pub fn rodrigues(axis: &[f64; 3], angle: f64) -> [[f64; 3]; 3] {
    let (sin, cos) = angle.sin_cos();
    let nx = skew(axis);
    let nn = outer(axis);
    let mut out = [[0.0; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            let identity = if row == col { 1.0 } else { 0.0 };
            out[row][col] = cos * identity + sin * nx[row][col] + (1.0 - cos) * nn[row][col];
        }
    }
    out
}

/// Rotation taking `from` onto `to`; both must be non-zero. Antiparallel
/// inputs rotate by pi around an arbitrary perpendicular axis.
pub fn rotation_between(from: &[f64; 3], to: &[f64; 3]) -> [[f64; 3]; 3] {
    let nf = norm3(from);
    let nt = norm3(to);
    let f = [from[0] / nf, from[1] / nf, from[2] / nf];
    let t = [to[0] / nt, to[1] / nt, to[2] / nt];

    let axis = cross3(&f, &t);
    let sin = norm3(&axis);
    let cos = dot3(&f, &t);

    if sin < 1.0e-12 {
        if cos > 0.0 {
            return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        }
        let perpendicular = if f[0].abs() < 0.9 {
            cross3(&f, &[1.0, 0.0, 0.0])
        } else {
            cross3(&f, &[0.0, 1.0, 0.0])
        };
        let np = norm3(&perpendicular);
        let axis = [
            perpendicular[0] / np,
            perpendicular[1] / np,
            perpendicular[2] / np,
        ];
        return rodrigues(&axis, std::f64::consts::PI);
    }

    let axis = [axis[0] / sin, axis[1] / sin, axis[2] / sin];
    rodrigues(&axis, sin.atan2(cos))
}

#[cfg(test)]
mod tests {
    use super::{rodrigues, rotation_between, skew};
    use crate::numerics::mat3_vec3;

    #[test]
    fn quarter_turn_about_z_maps_x_to_y() {
        let r = rodrigues(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2);
        let rotated = mat3_vec3(&r, &[1.0, 0.0, 0.0]);
        assert!((rotated[0]).abs() < 1.0e-14);
        assert!((rotated[1] - 1.0).abs() < 1.0e-14);
    }

    #[test]
    fn skew_matrix_reproduces_the_cross_product() {
        let n = [0.0, 0.0, 1.0];
        let nx = skew(&n);
        let v = [1.0, 2.0, 0.0];
        let product = mat3_vec3(&nx, &v);
        assert_eq!(product, [-2.0, 1.0, 0.0]);
    }

    #[test]
    fn rotation_between_handles_parallel_and_antiparallel() {
        let identity = rotation_between(&[0.0, 0.0, 2.0], &[0.0, 0.0, 5.0]);
        assert!((identity[0][0] - 1.0).abs() < 1.0e-12);

        let flip = rotation_between(&[0.0, 0.0, 1.0], &[0.0, 0.0, -1.0]);
        let rotated = mat3_vec3(&flip, &[0.0, 0.0, 1.0]);
        assert!((rotated[2] + 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn generic_rotation_maps_source_onto_target() {
        let r = rotation_between(&[1.0, 0.0, 0.0], &[0.0, 1.0, 1.0]);
        let rotated = mat3_vec3(&r, &[1.0, 0.0, 0.0]);
        let norm = (0.5_f64).sqrt();
        assert!((rotated[1] - norm).abs() < 1.0e-12);
        assert!((rotated[2] - norm).abs() < 1.0e-12);
    }
}
