//!
//! Animation layers: a state machine, its weight, blend mode and bone mask.
//!

use std::sync::Arc;

use crate::base::{split_path, AnimError};
use crate::blending_job::{BlendMode, BlendingLayer};
use crate::clip::Clip;
use crate::controller::LayerController;
use crate::mask::BoneMask;
use crate::math::Transform;
use crate::skeleton::Skeleton;
use crate::state::AnimState;

/// A layer of an animation component.
///
/// The first layer of a component is its base layer: it always overwrites the whole skeleton at
/// full weight, so blend mode and mask changes are ignored on it and its weight is only stored.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    weight: f32,
    blend_mode: BlendMode,
    mask: Option<BoneMask>,
    base: bool,
    controller: LayerController,

    joint_weights: Vec<f32>,
    mask_dirty: bool,
    pose: Vec<Transform>,
    coverage: f32,
}

impl Layer {
    pub fn new<S: Into<String>>(name: S) -> Layer {
        let name = name.into();
        Layer {
            controller: LayerController::new(name.clone()),
            name,
            weight: 1.0,
            blend_mode: BlendMode::Overwrite,
            mask: None,
            base: false,
            joint_weights: Vec::new(),
            mask_dirty: false,
            pose: Vec::new(),
            coverage: 0.0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Layer {
        self.set_weight(weight);
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Layer {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_mask(mut self, mask: BoneMask) -> Layer {
        self.mask = Some(mask);
        self.mask_dirty = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_base(&self) -> bool {
        self.base
    }

    pub(crate) fn set_base(&mut self) {
        self.base = true;
        if self.blend_mode != BlendMode::Overwrite || self.mask.is_some() {
            log::warn!("base layer {} always overwrites the whole skeleton", self.name);
        }
        self.blend_mode = BlendMode::Overwrite;
        self.mask = None;
        self.joint_weights.clear();
        self.mask_dirty = false;
    }

    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Sets the layer weight, clamped to `[0, 1]`.
    #[inline]
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
    }

    #[inline]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        if self.base {
            log::warn!("ignored blend mode change of base layer {}", self.name);
            return;
        }
        self.blend_mode = blend_mode;
    }

    #[inline]
    pub fn mask(&self) -> Option<&BoneMask> {
        self.mask.as_ref()
    }

    /// Sets or clears the mask. It is resolved against the skeleton at the next update.
    pub fn set_mask(&mut self, mask: Option<BoneMask>) {
        if self.base {
            log::warn!("ignored mask change of base layer {}", self.name);
            return;
        }
        self.mask = mask;
        self.mask_dirty = true;
    }

    /// Gets the per-joint weights of the resolved mask, empty for the whole skeleton.
    #[inline]
    pub fn joint_weights(&self) -> &[f32] {
        &self.joint_weights
    }

    #[inline]
    pub fn controller(&self) -> &LayerController {
        &self.controller
    }

    #[inline]
    pub fn controller_mut(&mut self) -> &mut LayerController {
        &mut self.controller
    }

    /// Gets the layer pose computed by the last update.
    #[inline]
    pub fn pose(&self) -> &[Transform] {
        &self.pose
    }

    /// Gets the coverage of the layer pose computed by the last update.
    #[inline]
    pub fn coverage(&self) -> f32 {
        self.coverage
    }

    #[inline]
    pub fn active_state(&self) -> Option<&str> {
        self.controller.active_state()
    }

    #[inline]
    pub fn previous_state(&self) -> Option<&str> {
        self.controller.previous_state()
    }

    #[inline]
    pub fn active_state_progress(&self) -> f32 {
        self.controller.active_state_progress()
    }

    #[inline]
    pub fn active_state_duration(&self) -> f32 {
        self.controller.active_state_duration()
    }

    #[inline]
    pub fn transitioning(&self) -> bool {
        self.controller.transitioning()
    }

    #[inline]
    pub fn transition_progress(&self) -> f32 {
        self.controller.transition_progress()
    }

    #[inline]
    pub fn playing(&self) -> bool {
        self.controller.playing()
    }

    pub fn play(&mut self, state: Option<&str>) -> Result<(), AnimError> {
        self.controller.play(state)
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn reset(&mut self) {
        self.controller.reset();
    }

    /// Transitions to `state` over `duration` seconds, regardless of conditions.
    pub fn transition(&mut self, state: &str, duration: f32, offset: Option<f32>) -> Result<(), AnimError> {
        self.controller.force_transition(state, duration, offset)
    }

    /// Binds `clip` to the state or blend tree child at `path` (`State` or `State.Child`).
    ///
    /// A missing single segment state is created as a single clip state.
    pub fn assign_animation(&mut self, path: &str, clip: Arc<Clip>, speed: Option<f32>) -> Result<(), AnimError> {
        let segments = split_path(path);
        let (state_name, child) = match segments.as_slice() {
            [state] => (*state, None),
            [state, child] => (*state, Some(*child)),
            _ => return Err(AnimError::UnknownNode(format!("{}.{}", self.name, path))),
        };

        match self.controller.state_mut(state_name) {
            Some(state) => {
                state.assign_clip(child, clip)?;
                if let Some(speed) = speed {
                    state.set_speed(speed);
                }
            }
            None if child.is_none() => {
                log::debug!("{}: created state {} for clip {}", self.name, state_name, clip.name());
                let mut state = AnimState::single(state_name, clip.name())
                    .with_loop(clip.looping())
                    .with_speed(speed.unwrap_or(1.0));
                state.assign_clip(None, clip)?;
                self.controller.add_state(state)?;
            }
            None => {
                return Err(AnimError::UnknownState {
                    layer: self.name.clone(),
                    state: state_name.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Unbinds every clip of `state`.
    pub fn remove_state_animations(&mut self, state: &str) -> Result<(), AnimError> {
        match self.controller.state_mut(state) {
            Some(state) if !state.is_empty() => {
                state.clear_clips();
                Ok(())
            }
            _ => Err(AnimError::UnknownState {
                layer: self.name.clone(),
                state: state.to_string(),
            }),
        }
    }

    /// Resolves the mask against `skeleton` if it changed. Returns the unknown bone paths.
    pub(crate) fn resolve_mask(&mut self, skeleton: &Skeleton) -> Vec<AnimError> {
        if !self.mask_dirty {
            return Vec::new();
        }
        self.mask_dirty = false;

        let mask = match &self.mask {
            Some(mask) => mask,
            None => {
                self.joint_weights.clear();
                return Vec::new();
            }
        };
        let unknown = mask.resolve(skeleton, &mut self.joint_weights);
        for path in &unknown {
            log::warn!("{}: unknown mask bone path {}", self.name, path);
        }
        if !unknown.is_empty() && unknown.len() == mask.entries().len() {
            log::warn!("{}: no mask entry resolved, masking the whole skeleton in", self.name);
        }
        unknown
            .into_iter()
            .map(|path| AnimError::UnknownBonePath {
                layer: self.name.clone(),
                path,
            })
            .collect()
    }

    /// Samples the layer pose for the current frame.
    pub(crate) fn evaluate(&mut self, skeleton: &Skeleton) {
        self.pose.resize(skeleton.num_joints(), Transform::IDENTITY);
        self.coverage = self.controller.evaluate(skeleton, &mut self.pose);
    }

    /// Gets the weight the layer is composed with, before coverage.
    #[inline]
    pub fn effective_weight(&self) -> f32 {
        if self.base {
            1.0
        } else {
            self.weight
        }
    }

    /// Gets the compositor input of the layer.
    pub(crate) fn blending_layer(&self) -> BlendingLayer<'_> {
        let weight = self.effective_weight() * self.coverage;
        if self.base || self.mask.is_none() {
            BlendingLayer::new(&self.pose, weight, self.blend_mode)
        } else {
            BlendingLayer::with_joint_weights(&self.pose, weight, self.blend_mode, &self.joint_weights)
        }
    }
}
