//!
//! Math helpers for local joint transforms.
//!

use glam::{Quat, Vec3, Vec4};

/// Local transform of a joint: translation, rotation and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    #[inline]
    fn default() -> Transform {
        Transform::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[inline]
    pub const fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Transform {
        Transform {
            translation,
            rotation,
            scale,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Transform {
        Transform {
            translation,
            ..Transform::IDENTITY
        }
    }

    #[inline]
    pub fn from_rotation(rotation: Quat) -> Transform {
        Transform {
            rotation,
            ..Transform::IDENTITY
        }
    }

    /// Linear blend between two transforms. Rotations are normalized-lerped along the shortest path.
    #[inline]
    pub fn lerp(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, t),
            rotation: quat_nlerp(self.rotation, other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    /// Gets the delta that brings `reference` onto `self`.
    ///
    /// Rotation delta is expressed so that `delta * reference.rotation == self.rotation`.
    /// Scale delta is a ratio, a zero reference scale component yields a neutral ratio.
    #[inline]
    pub fn relative_to(&self, reference: &Transform) -> Transform {
        Transform {
            translation: self.translation - reference.translation,
            rotation: (self.rotation * reference.rotation.inverse()).normalize(),
            scale: Vec3::new(
                safe_ratio(self.scale.x, reference.scale.x),
                safe_ratio(self.scale.y, reference.scale.y),
                safe_ratio(self.scale.z, reference.scale.z),
            ),
        }
    }

    /// Applies a delta produced by `relative_to`, scaled by `weight`.
    #[inline]
    pub fn add_delta(&mut self, delta: &Transform, weight: f32) {
        self.translation += delta.translation * weight;

        let rotation = if delta.rotation.w >= 0.0 {
            delta.rotation
        } else {
            -delta.rotation
        };
        let interp_quat = Quat::from_xyzw(
            rotation.x * weight,
            rotation.y * weight,
            rotation.z * weight,
            (rotation.w - 1.0) * weight + 1.0,
        );
        self.rotation = (interp_quat.normalize() * self.rotation).normalize();

        let tmp_weight = Vec3::splat(1.0 - weight) + delta.scale * weight;
        self.scale *= tmp_weight;
    }

    /// Compares two transforms with a maximum difference.
    #[inline]
    pub fn abs_diff_eq(&self, other: &Transform, diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, diff)
            && quat_abs_diff_eq(self.rotation, other.rotation, diff)
            && self.scale.abs_diff_eq(other.scale, diff)
    }
}

//
// Weighted accumulation, used to mix any number of poses with normalized weights.
//

/// First accumulation pass, overwrites `output`.
#[inline]
pub(crate) fn blend_1st_pass(input: &Transform, weight: f32, output: &mut Transform) {
    output.translation = input.translation * weight;
    output.rotation = Quat::from_vec4(Vec4::from(input.rotation) * weight);
    output.scale = input.scale * weight;
}

/// Following accumulation passes. Rotations are sign-aligned with the accumulated value.
#[inline]
pub(crate) fn blend_n_pass(input: &Transform, weight: f32, output: &mut Transform) {
    output.translation += input.translation * weight;
    let dot = output.rotation.dot(input.rotation);
    let rotation = if dot >= 0.0 { input.rotation } else { -input.rotation };
    output.rotation = Quat::from_vec4(Vec4::from(output.rotation) + Vec4::from(rotation) * weight);
    output.scale += input.scale * weight;
}

/// Normalizes an accumulated transform by the accumulated weight.
#[inline]
pub(crate) fn blend_normalize(output: &mut Transform, accumulated_weight: f32) {
    let ratio = accumulated_weight.recip();
    output.translation *= ratio;
    output.scale *= ratio;
    output.rotation = if output.rotation.length_squared() > 0.0 {
        output.rotation.normalize()
    } else {
        Quat::IDENTITY
    };
}

/// Normalized lerp between two quaternions, along the shortest path.
#[inline]
pub fn quat_nlerp(a: Quat, b: Quat, t: f32) -> Quat {
    let b = if a.dot(b) >= 0.0 { b } else { -b };
    let v = Vec4::from(a).lerp(Vec4::from(b), t);
    if v.length_squared() > 0.0 {
        Quat::from_vec4(v.normalize())
    } else {
        a
    }
}

/// Compares two quaternions as rotations, `q` and `-q` are equal.
#[inline]
pub fn quat_abs_diff_eq(a: Quat, b: Quat, diff: f32) -> bool {
    a.abs_diff_eq(b, diff) || a.abs_diff_eq(-b, diff)
}

#[inline]
pub fn f32_clamp_or_max(v: f32, min: f32, max: f32) -> f32 {
    // f32::clamp() returns NaN for NaN inputs.
    if v.is_nan() {
        return max;
    }
    v.clamp(min, max)
}

#[inline]
fn safe_ratio(num: f32, den: f32) -> f32 {
    if den.abs() <= f32::EPSILON {
        1.0
    } else {
        num / den
    }
}
