//!
//! Keyframe track data structure definition.
//!

use glam::{Quat, Vec3};
use std::fmt::Debug;

use crate::base::AnimError;
use crate::math::{quat_abs_diff_eq, quat_nlerp};

/// Value type that can be stored in a `Track`.
pub trait TrackValue
where
    Self: Debug + Default + Copy + Clone + PartialEq,
{
    /// Linear interpolation between two values.
    fn lerp(a: Self, b: Self, t: f32) -> Self;

    // Compare two values with a maximum difference.
    fn abs_diff_eq(a: Self, b: Self, diff: f32) -> bool;
}

impl TrackValue for f32 {
    #[inline]
    fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    #[inline]
    fn abs_diff_eq(a: f32, b: f32, diff: f32) -> bool {
        (a - b).abs() <= diff
    }
}

impl TrackValue for Vec3 {
    #[inline]
    fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
        Vec3::lerp(a, b, t)
    }

    #[inline]
    fn abs_diff_eq(a: Vec3, b: Vec3, diff: f32) -> bool {
        Vec3::abs_diff_eq(a, b, diff)
    }
}

impl TrackValue for Quat {
    #[inline]
    fn lerp(a: Quat, b: Quat, t: f32) -> Quat {
        quat_nlerp(a, b, t)
    }

    #[inline]
    fn abs_diff_eq(a: Quat, b: Quat, diff: f32) -> bool {
        quat_abs_diff_eq(a, b, diff)
    }
}

/// Runtime keyframe track.
///
/// Keyframe times and values are stored as separate buffers in order to access the cache
/// coherently. Times are usually accessed alone, to look up the keyframes to interpolate.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track<V: TrackValue> {
    times: Vec<f32>,
    values: Vec<V>,
}

impl<V: TrackValue> Track<V> {
    /// Builds a track from keyframe values and their times, in seconds.
    ///
    /// Times must be sorted in ascending order.
    pub fn from_raw(values: &[V], times: &[f32]) -> Result<Track<V>, AnimError> {
        if values.len() != times.len() {
            return Err(AnimError::custom("Track values and times mismatch"));
        }
        if times.windows(2).any(|w| !(w[0] <= w[1])) {
            return Err(AnimError::custom("Track times are not sorted"));
        }
        Ok(Track {
            times: times.to_vec(),
            values: values.to_vec(),
        })
    }

    /// Builds a single key track.
    pub fn constant(value: V) -> Track<V> {
        Track {
            times: vec![0.0],
            values: vec![value],
        }
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    #[inline]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Gets the time of the last key.
    #[inline]
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Samples the track at `time`. Times out of the key range clamp to the first or last key.
    ///
    /// Returns `None` for an empty track.
    pub fn sample(&self, time: f32) -> Option<V> {
        if self.times.is_empty() {
            return None;
        }

        let id1 = self.times.iter().position(|&x| time < x).unwrap_or(self.key_count());
        if id1 == 0 {
            return Some(self.values[0]);
        }
        let id0 = id1 - 1;
        if id1 == self.key_count() {
            return Some(self.values[id0]);
        }

        let tk0 = self.times[id0];
        let tk1 = self.times[id1];
        let t = if tk1 > tk0 { (time - tk0) / (tk1 - tk0) } else { 0.0 };
        Some(V::lerp(self.values[id0], self.values[id1], t))
    }
}
