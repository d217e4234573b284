//! Math utilities and types
//!
//! Provides the matrix/vector kernel used by the hierarchy and the skin.
//! Matrices follow nalgebra's column-vector convention: translation lives in
//! the fourth column and `parent * child` applies `child` first.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// A basis is singular when its determinant falls to this fraction of the
/// product of its axis lengths.
pub const DEGENERATE_EPSILON: f32 = 1.0e-6;

/// Below this length a basis axis is considered collapsed.
const AXIS_EPSILON: f32 = 1.0e-8;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Convert to a transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose an affine matrix into position, rotation and scale
    ///
    /// Collapsed axes keep a zero scale and contribute an identity column to
    /// the rotation, so degenerate matrices never produce NaNs. A mirrored
    /// basis is reported through a negative X scale.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = matrix.translation_part();
        let mut scale = matrix.axis_scales();

        let mut basis = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if basis.determinant() < 0.0 {
            scale.x = -scale.x;
        }
        for axis in 0..3 {
            if scale[axis].abs() > AXIS_EPSILON {
                let column = basis.column(axis) / scale[axis];
                basis.set_column(axis, &column);
            } else {
                let mut unit = Vec3::zeros();
                unit[axis] = 1.0;
                basis.set_column(axis, &unit);
            }
        }
        let rotation = Quat::from_matrix(&basis);

        Self {
            position,
            rotation,
            scale,
        }
    }
}

/// Extension trait for Mat4 with the affine helpers the hierarchy needs
pub trait Mat4Ext {
    /// Create a rotation matrix around the X axis
    fn rotation_x(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Y axis
    fn rotation_y(angle: f32) -> Mat4;

    /// Create a rotation matrix around the Z axis
    fn rotation_z(angle: f32) -> Mat4;

    /// Translation stored in the fourth column
    fn translation_part(&self) -> Vec3;

    /// Overwrite the translation stored in the fourth column
    fn set_translation_part(&mut self, translation: &Vec3);

    /// Length of each basis column
    fn axis_scales(&self) -> Vec3;

    /// Determinant of the upper-left 3x3 basis
    fn basis_determinant(&self) -> f32;

    /// Whether the basis has collapsed, independent of its overall scale
    fn is_singular_basis(&self) -> bool;

    /// Inverse of the matrix, or `None` when the basis is singular
    fn affine_inverse(&self) -> Option<Mat4>;

    /// Apply rotation, scale and translation to a position
    fn rotate_and_translate(&self, v: &Vec3) -> Vec3;

    /// Apply only the 3x3 basis (no translation) to a direction
    fn rotate_only(&self, v: &Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn rotation_x(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::x_axis(), angle)
    }

    fn rotation_y(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }

    fn rotation_z(angle: f32) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::z_axis(), angle)
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }

    fn set_translation_part(&mut self, translation: &Vec3) {
        self.m14 = translation.x;
        self.m24 = translation.y;
        self.m34 = translation.z;
    }

    fn axis_scales(&self) -> Vec3 {
        Vec3::new(
            Vec3::new(self.m11, self.m21, self.m31).magnitude(),
            Vec3::new(self.m12, self.m22, self.m32).magnitude(),
            Vec3::new(self.m13, self.m23, self.m33).magnitude(),
        )
    }

    fn basis_determinant(&self) -> f32 {
        self.fixed_view::<3, 3>(0, 0).determinant()
    }

    fn is_singular_basis(&self) -> bool {
        let scales = self.axis_scales();
        let volume = scales.x * scales.y * scales.z;
        volume <= f32::MIN_POSITIVE || self.basis_determinant().abs() <= DEGENERATE_EPSILON * volume
    }

    fn affine_inverse(&self) -> Option<Mat4> {
        if self.is_singular_basis() {
            return None;
        }
        self.try_inverse()
    }

    fn rotate_and_translate(&self, v: &Vec3) -> Vec3 {
        Vec3::new(
            self.m11 * v.x + self.m12 * v.y + self.m13 * v.z + self.m14,
            self.m21 * v.x + self.m22 * v.y + self.m23 * v.z + self.m24,
            self.m31 * v.x + self.m32 * v.y + self.m33 * v.z + self.m34,
        )
    }

    fn rotate_only(&self, v: &Vec3) -> Vec3 {
        Vec3::new(
            self.m11 * v.x + self.m12 * v.y + self.m13 * v.z,
            self.m21 * v.x + self.m22 * v.y + self.m23 * v.z,
            self.m31 * v.x + self.m32 * v.y + self.m33 * v.z,
        )
    }
}

/// Rescale the basis columns of `world` so each axis keeps the length it has
/// in `local`, discarding whatever scale the parent contributed.
///
/// Collapsed axes are left untouched.
pub fn restore_axis_scales(world: &mut Mat4, local: &Mat4) {
    let current = world.axis_scales();
    let wanted = local.axis_scales();
    for axis in 0..3 {
        if current[axis] > AXIS_EPSILON {
            let factor = wanted[axis] / current[axis];
            for row in 0..3 {
                world[(row, axis)] *= factor;
            }
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}
