//!
//! Clip sampling job.
//!

use std::sync::Arc;

use crate::base::AnimError;
use crate::clip::Clip;
use crate::math::{f32_clamp_or_max, Transform};
use crate::skeleton::Skeleton;

/// Samples a clip at a given time into a skeleton ordered local pose.
///
/// Joint tracks are bound to skeleton joints by path the first time the job runs with a clip,
/// so that the per-frame work is index based only. Joints not animated by the clip receive their
/// rest pose.
#[derive(Debug, Default, Clone)]
pub struct SamplingJob {
    clip: Option<Arc<Clip>>,
    time: f32,

    binding: Vec<Option<usize>>,
    bound: bool,
}

impl SamplingJob {
    /// Gets clip of `SamplingJob`.
    #[inline]
    pub fn clip(&self) -> Option<&Arc<Clip>> {
        self.clip.as_ref()
    }

    /// Sets clip of `SamplingJob`.
    ///
    /// The track binding is rebuilt at the next run.
    #[inline]
    pub fn set_clip(&mut self, clip: Arc<Clip>) {
        self.clip = Some(clip);
        self.bound = false;
    }

    /// Clears clip of `SamplingJob`.
    #[inline]
    pub fn clear_clip(&mut self) {
        self.clip = None;
        self.bound = false;
    }

    /// Gets time of `SamplingJob`.
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Sets time of `SamplingJob`.
    ///
    /// Time used to sample the clip, in seconds, clamped to the clip duration before job execution.
    #[inline]
    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Forces the track binding to be rebuilt, needed when the skeleton changes.
    #[inline]
    pub fn reset_binding(&mut self) {
        self.bound = false;
    }

    /// Validates `SamplingJob` parameters.
    pub fn validate(&self, skeleton: &Skeleton, output: &[Transform]) -> bool {
        self.clip.is_some() && output.len() >= skeleton.num_joints()
    }

    /// Runs clip sampling job's task.
    /// The validate job before any operation is performed.
    pub fn run(&mut self, skeleton: &Skeleton, output: &mut [Transform]) -> Result<(), AnimError> {
        if !self.validate(skeleton, output) {
            return Err(AnimError::InvalidJob);
        }
        let clip = match &self.clip {
            Some(clip) => clip.clone(),
            None => return Err(AnimError::InvalidJob),
        };

        if !self.bound || self.binding.len() != skeleton.num_joints() {
            self.bind(&clip, skeleton);
        }

        let time = f32_clamp_or_max(self.time, 0.0, clip.duration());
        let rest_poses = skeleton.joint_rest_poses();
        for (idx, out) in output.iter_mut().take(skeleton.num_joints()).enumerate() {
            *out = match self.binding[idx] {
                Some(track) => clip.tracks()[track].sample(time, &rest_poses[idx]),
                None => rest_poses[idx],
            };
        }
        Ok(())
    }

    fn bind(&mut self, clip: &Clip, skeleton: &Skeleton) {
        self.binding.clear();
        self.binding.resize(skeleton.num_joints(), None);
        for (track_idx, track) in clip.tracks().iter().enumerate() {
            match skeleton.joint_by_path(track.path()) {
                Some(joint) => self.binding[joint as usize] = Some(track_idx),
                None => log::trace!("clip {} animates unknown joint {}", clip.name(), track.path()),
            }
        }
        self.bound = true;
    }
}
