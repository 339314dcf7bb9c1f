//! Math utilities and types
//!
//! Double precision aliases over nalgebra used by the camera, the scene graph and
//! the picking code. Editor scenes mix very large and very small extents, so the
//! whole viewport works in `f64`.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, Unit, UnitQuaternion, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 4D (homogeneous) vector type
pub type Vec4 = Vector4<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f64>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f64>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f64>;

/// Unit quaternion type for rotations
pub type Quat = UnitQuaternion<f64>;

/// Math utility functions
pub mod utils {
    use super::{Mat3, Mat4, Quat, Rotation3, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees.to_radians()
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f64) -> f64 {
        radians.to_degrees()
    }

    /// Upper-left 3x3 rotation-scale block of an affine matrix
    pub fn rotation_scale(matrix: &Mat4) -> Mat3 {
        matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Replace the upper-left 3x3 rotation-scale block of an affine matrix
    pub fn set_rotation_scale(matrix: &mut Mat4, rotation_scale: &Mat3) {
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation_scale);
    }

    /// Translation column of an affine matrix
    pub fn translation(matrix: &Mat4) -> Vec3 {
        Vec3::new(matrix.m14, matrix.m24, matrix.m34)
    }

    /// Rotation whose right and up axes are the signed world axes nearest to
    /// those of `rotation`. The backward axis completes a right-handed basis.
    pub fn snap_to_axes(rotation: &Quat) -> Quat {
        let m = rotation.to_rotation_matrix().into_inner();
        let x = nearest_axis(&m.column(0).into_owned(), None);
        let y = nearest_axis(&m.column(1).into_owned(), Some(&x));
        let z = x.cross(&y);
        Quat::from_rotation_matrix(&Rotation3::from_matrix_unchecked(Mat3::from_columns(&[x, y, z])))
    }

    fn nearest_axis(v: &Vec3, taken: Option<&Vec3>) -> Vec3 {
        let mut best = None;
        for i in 0..3 {
            if taken.is_some_and(|t| t[i].abs() > 0.5) {
                continue;
            }
            if best.map_or(true, |b: usize| v[i].abs() > v[b].abs()) {
                best = Some(i);
            }
        }

        let mut axis = Vec3::zeros();
        if let Some(i) = best {
            axis[i] = if v[i] < 0.0 { -1.0 } else { 1.0 };
        }
        axis
    }

    /// Convert Euler angles in degrees to a rotation.
    ///
    /// Rotation sequence is Y, then Z, then X (`q = qy * qz * qx`), which is the
    /// order the property grid has always used for node rotations.
    pub fn euler_to_quat(euler: &Vec3) -> Quat {
        let qy = Quat::from_axis_angle(&Vec3::y_axis(), deg_to_rad(euler.y));
        let qz = Quat::from_axis_angle(&Vec3::z_axis(), deg_to_rad(euler.z));
        let qx = Quat::from_axis_angle(&Vec3::x_axis(), deg_to_rad(euler.x));
        qy * qz * qx
    }

    /// Convert a rotation to Euler angles in degrees (inverse of [`euler_to_quat`]).
    ///
    /// Near the poles of the Z rotation (attitude of +-90 degrees) the X component
    /// is folded into Y and reported as zero.
    pub fn quat_to_euler(rotation: &Quat) -> Vec3 {
        let q = rotation.quaternion();
        let (x, y, z, w) = (q.i, q.j, q.k, q.w);

        let test = x * y + z * w;
        let (heading, attitude, bank) = if test > 0.499 {
            (2.0 * x.atan2(w), std::f64::consts::FRAC_PI_2, 0.0)
        } else if test < -0.499 {
            (-2.0 * x.atan2(w), -std::f64::consts::FRAC_PI_2, 0.0)
        } else {
            let sqx = x * x;
            let sqy = y * y;
            let sqz = z * z;
            (
                (2.0 * y * w - 2.0 * x * z).atan2(1.0 - 2.0 * sqy - 2.0 * sqz),
                (2.0 * test).asin(),
                (2.0 * x * w - 2.0 * y * z).atan2(1.0 - 2.0 * sqx - 2.0 * sqz),
            )
        };

        Vec3::new(rad_to_deg(bank), rad_to_deg(heading), rad_to_deg(attitude))
    }
}

/// Extension trait for Mat4 with the projection builders the camera needs
pub trait Mat4Ext {
    /// Off-center perspective frustum (classic `glFrustum` layout)
    fn frustum(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4;

    /// Orthographic projection (classic `glOrtho` layout)
    fn orthographic(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn frustum(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4 {
        let x = (2.0 * near) / (right - left);
        let y = (2.0 * near) / (top - bottom);
        let a = (right + left) / (right - left);
        let b = (top + bottom) / (top - bottom);
        let c = -(far + near) / (far - near);
        let d = -(2.0 * far * near) / (far - near);

        Mat4::new(
            x,   0.0, a,    0.0,
            0.0, y,   b,    0.0,
            0.0, 0.0, c,    d,
            0.0, 0.0, -1.0, 0.0,
        )
    }

    fn orthographic(left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) -> Mat4 {
        let width = right - left;
        let height = top - bottom;
        let depth = far - near;

        Mat4::new(
            2.0 / width, 0.0,          0.0,          -(right + left) / width,
            0.0,         2.0 / height, 0.0,          -(top + bottom) / height,
            0.0,         0.0,          -2.0 / depth, -(far + near) / depth,
            0.0,         0.0,          0.0,          1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::utils::*;
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_euler_round_trip() {
        let samples = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
            Vec3::new(0.0, 45.0, 0.0),
            Vec3::new(0.0, 0.0, 60.0),
            Vec3::new(10.0, -20.0, 35.0),
            Vec3::new(-75.0, 120.0, -15.0),
        ];

        for euler in samples {
            let q = euler_to_quat(&euler);
            let back = quat_to_euler(&q);
            assert_relative_eq!(back, euler, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_euler_single_axis_matches_axis_angle() {
        let q = euler_to_quat(&Vec3::new(0.0, 90.0, 0.0));
        let expected = Quat::from_axis_angle(&Vec3::y_axis(), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(q, expected, epsilon = EPSILON);
    }

    #[test]
    fn test_euler_pole_singularity() {
        let q = euler_to_quat(&Vec3::new(0.0, 0.0, 90.0));
        let euler = quat_to_euler(&q);
        assert_relative_eq!(euler.z, 90.0, epsilon = 1e-6);
        assert_relative_eq!(euler.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_snap_to_axes() {
        let tilted = euler_to_quat(&Vec3::new(-20.0, 35.0, 10.0));
        let snapped = snap_to_axes(&tilted);
        assert_relative_eq!(snapped.to_rotation_matrix().into_inner(), Mat3::identity(), epsilon = EPSILON);

        // Looking mostly down -Y: backward axis snaps to +Y
        let down = Quat::from_axis_angle(&Vec3::x_axis(), (-80f64).to_radians());
        let snapped = snap_to_axes(&down);
        assert_relative_eq!(snapped * Vec3::z(), Vec3::y(), epsilon = EPSILON);
        assert_relative_eq!(snapped * Vec3::x(), Vec3::x(), epsilon = EPSILON);
    }

    #[test]
    fn test_orthographic_maps_box_to_unit_cube() {
        let m = Mat4::orthographic(-2.0, 2.0, -1.0, 1.0, 1.0, 11.0);
        let corner = m * Vec4::new(2.0, 1.0, -11.0, 1.0);
        assert_relative_eq!(corner, Vec4::new(1.0, 1.0, 1.0, 1.0), epsilon = EPSILON);
        let near = m * Vec4::new(-2.0, -1.0, -1.0, 1.0);
        assert_relative_eq!(near, Vec4::new(-1.0, -1.0, -1.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_frustum_near_plane_maps_to_minus_one() {
        let m = Mat4::frustum(-1.0, 1.0, -1.0, 1.0, 1.0, 100.0);
        let clip = m * Vec4::new(0.0, 0.0, -1.0, 1.0);
        assert_relative_eq!(clip.z / clip.w, -1.0, epsilon = EPSILON);
        let clip = m * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(clip.z / clip.w, 1.0, epsilon = EPSILON);
    }
}
