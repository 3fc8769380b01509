//! # Sensor Alignment
//!
//! Board orientation handling for sensors mounted at an angle to the frame.
//!
//! Standard alignments rotate in 90° steps around the Z axis, optionally
//! flipped upside down. A custom alignment carries arbitrary roll/pitch/yaw
//! angles in decidegrees and is applied through a rotation matrix.

use serde::{Deserialize, Serialize};

/// 3x3 rotation matrix, row-major
pub type RotationMatrix = [[f32; 3]; 3];

/// Identity rotation
pub const ROTATION_IDENTITY: RotationMatrix = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Sensor mounting orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorAlign {
    /// Use the driver's native orientation (same as `Cw0`)
    #[default]
    Default,
    Cw0,
    Cw90,
    Cw180,
    Cw270,
    Cw0Flip,
    Cw90Flip,
    Cw180Flip,
    Cw270Flip,
    /// Arbitrary angles from the custom alignment
    Custom,
}

impl SensorAlign {
    /// Rotate a raw sample by a standard alignment.
    ///
    /// `Custom` is returned unchanged here; it goes through the rotation
    /// matrix instead (see [`rotate`]).
    ///
    /// # Examples
    ///
    /// ```
    /// use flight_core::sensors::alignment::SensorAlign;
    ///
    /// assert_eq!(SensorAlign::Cw90.apply([1, 2, 3]), [2, -1, 3]);
    /// assert_eq!(SensorAlign::Cw0Flip.apply([1, 2, 3]), [-1, 2, -3]);
    /// ```
    #[must_use]
    pub fn apply(self, v: [i32; 3]) -> [i32; 3] {
        let [x, y, z] = v;
        match self {
            Self::Default | Self::Cw0 | Self::Custom => [x, y, z],
            Self::Cw90 => [y, -x, z],
            Self::Cw180 => [-x, -y, z],
            Self::Cw270 => [-y, x, z],
            Self::Cw0Flip => [-x, y, -z],
            Self::Cw90Flip => [y, x, -z],
            Self::Cw180Flip => [x, -y, -z],
            Self::Cw270Flip => [-y, -x, -z],
        }
    }
}

/// Custom alignment angles in decidegrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorAlignment {
    #[serde(default)]
    pub roll: i16,
    #[serde(default)]
    pub pitch: i16,
    #[serde(default)]
    pub yaw: i16,
}

fn decidegrees_to_radians(angle: i16) -> f32 {
    (f32::from(angle) / 10.0).to_radians()
}

/// Build a rotation matrix from custom alignment angles.
///
/// Rotation order is yaw (Z), then pitch (Y), then roll (X).
///
/// # Examples
///
/// ```
/// use flight_core::sensors::alignment::{
///     build_rotation_matrix_from_alignment, SensorAlignment, ROTATION_IDENTITY,
/// };
///
/// let m = build_rotation_matrix_from_alignment(&SensorAlignment::default());
/// assert_eq!(m, ROTATION_IDENTITY);
/// ```
#[must_use]
pub fn build_rotation_matrix_from_alignment(alignment: &SensorAlignment) -> RotationMatrix {
    let (sinx, cosx) = decidegrees_to_radians(alignment.roll).sin_cos();
    let (siny, cosy) = decidegrees_to_radians(alignment.pitch).sin_cos();
    let (sinz, cosz) = decidegrees_to_radians(alignment.yaw).sin_cos();

    let coszcosx = cosz * cosx;
    let sinzcosx = sinz * cosx;
    let coszsinx = sinx * cosz;
    let sinzsinx = sinx * sinz;

    [
        [cosz * cosy, -cosy * sinz, siny],
        [sinzcosx + coszsinx * siny, coszcosx - sinzsinx * siny, -sinx * cosy],
        [sinzsinx - coszcosx * siny, coszsinx + sinzcosx * siny, cosy * cosx],
    ]
}

/// Apply a rotation matrix to a vector.
#[must_use]
pub fn rotate(matrix: &RotationMatrix, v: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (row, o) in matrix.iter().zip(out.iter_mut()) {
        *o = row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
    }
    out
}
