//! Math type re-exports and Crate-specific value types.
//!
//! Vectors, matrices and quaternions at single and double precision come from
//! `glam`. Half precision has no glam counterpart, so those are plain arrays
//! of [`f16`].

pub use glam::{
    // Single precision
    Vec2, Vec3, Vec4, Quat,
    // Double precision
    DVec2, DVec3, DVec4, DQuat,
    DMat2, DMat3, DMat4,
    // Integer
    IVec2, IVec3, IVec4,
};
pub use half::f16;

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Half precision 2-vector.
pub type Vec2h = [f16; 2];
/// Half precision 3-vector.
pub type Vec3h = [f16; 3];
/// Half precision 4-vector.
pub type Vec4h = [f16; 4];

/// Half precision quaternion, stored imaginary part first like the file.
#[derive(Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Quath {
    pub imaginary: [f16; 3],
    pub real: f16,
}

impl Quath {
    /// Create from components in file order.
    #[inline]
    pub const fn new(imaginary: [f16; 3], real: f16) -> Self {
        Self { imaginary, real }
    }

    /// Widen to a single precision quaternion.
    #[inline]
    pub fn to_quat(self) -> Quat {
        let [x, y, z] = self.imaginary;
        Quat::from_xyzw(x.to_f32(), y.to_f32(), z.to_f32(), self.real.to_f32())
    }
}

impl fmt::Debug for Quath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quath({:?}, {})", self.imaginary, self.real)
    }
}

/// Build a double matrix from row-major file data.
///
/// Rows of the file matrix become glam columns; the file uses row vectors,
/// so this is the same transform in glam's column-vector convention.
#[inline]
pub fn dmat2_from_rows(v: &[f64; 4]) -> DMat2 {
    DMat2::from_cols_array(v)
}

/// Build a 3x3 double matrix from row-major file data.
#[inline]
pub fn dmat3_from_rows(v: &[f64; 9]) -> DMat3 {
    DMat3::from_cols_array(v)
}

/// Build a 4x4 double matrix from row-major file data.
#[inline]
pub fn dmat4_from_rows(v: &[f64; 16]) -> DMat4 {
    DMat4::from_cols_array(v)
}

/// Time value (seconds or frames, as authored).
pub type TimeCode = f64;
