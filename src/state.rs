//!
//! Animation states of a layer state machine.
//!

use std::sync::Arc;

use crate::base::AnimError;
use crate::blend_tree::{BlendTreeNode, ClipSlot};
use crate::clip::{Clip, ClipProvider};
use crate::math::{blend_1st_pass, blend_n_pass, blend_normalize, f32_clamp_or_max, Transform};
use crate::parameter::ParameterStore;
use crate::skeleton::Skeleton;

/// What a state plays.
#[derive(Debug, Clone)]
pub enum StateKind {
    /// Marker state, never sampled.
    Empty,
    /// A single clip.
    Single(ClipSlot),
    /// A blend tree.
    Tree(BlendTreeNode),
}

/// Normalized progress of a state before and after its last advance, both unwrapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressWindow {
    pub before: f32,
    pub after: f32,
    pub looping: bool,
}

impl ProgressWindow {
    /// Whether the last advance reached the exit point `exit_time`.
    ///
    /// Looping states exit each loop when `exit_time < 1`, at the frame crossing it. Later exit
    /// points are crossed once. Non looping states stop at their end and exit any time after the
    /// point. A zero advance only matches a progress exactly on the point.
    pub fn reached(&self, exit_time: f32) -> bool {
        let (before, after) = (self.before, self.after);
        if !self.looping {
            return after >= exit_time;
        }

        if exit_time < 1.0 {
            if after > before {
                (after - exit_time).floor() > (before - exit_time).floor()
            } else if after < before {
                (before - exit_time).ceil() > (after - exit_time).ceil()
            } else {
                after - after.floor() == exit_time
            }
        } else if after > before {
            before < exit_time && exit_time <= after
        } else if after < before {
            after <= exit_time && exit_time < before
        } else {
            after == exit_time
        }
    }
}

/// A node of a layer state machine.
///
/// The state time is the unwrapped play time scaled by the state speed, used for exit time
/// progress. Each clip of the state keeps its own wrapped cursor.
#[derive(Debug, Clone)]
pub struct AnimState {
    name: String,
    kind: StateKind,
    speed: f32,
    looping: bool,
    time: f32,
    time_before: f32,

    weights: Vec<f32>,
    rates: Vec<f32>,
}

impl AnimState {
    fn new(name: String, kind: StateKind) -> AnimState {
        AnimState {
            name,
            kind,
            speed: 1.0,
            looping: true,
            time: 0.0,
            time_before: 0.0,
            weights: Vec::new(),
            rates: Vec::new(),
        }
    }

    /// Creates a marker state.
    pub fn empty<S: Into<String>>(name: S) -> AnimState {
        AnimState::new(name.into(), StateKind::Empty)
    }

    /// Creates a single clip state, its clip is resolved by `clip_name`.
    pub fn single<S: Into<String>, C: Into<String>>(name: S, clip_name: C) -> AnimState {
        AnimState::new(name.into(), StateKind::Single(ClipSlot::new(clip_name)))
    }

    pub fn tree<S: Into<String>>(name: S, tree: BlendTreeNode) -> AnimState {
        AnimState::new(name.into(), StateKind::Tree(tree))
    }

    pub fn with_speed(mut self, speed: f32) -> AnimState {
        self.speed = speed;
        self
    }

    pub fn with_loop(mut self, looping: bool) -> AnimState {
        self.looping = looping;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut StateKind {
        &mut self.kind
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, StateKind::Empty)
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    #[inline]
    pub fn looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Gets the state duration: the clip duration, the longest child of a tree, 0 for markers.
    pub fn duration(&self) -> f32 {
        match &self.kind {
            StateKind::Empty => 0.0,
            StateKind::Single(slot) => slot.duration(),
            StateKind::Tree(tree) => tree.duration(),
        }
    }

    /// Gets the unwrapped state time, in seconds.
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Gets the normalized progress, `time / duration`. It goes past 1 for looping states.
    ///
    /// States without duration are considered complete.
    pub fn progress(&self) -> f32 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 1.0;
        }
        self.time / duration
    }

    /// Gets the progress covered by the last advance.
    pub fn progress_window(&self) -> ProgressWindow {
        let duration = self.duration();
        if duration <= 0.0 {
            return ProgressWindow {
                before: 1.0,
                after: 1.0,
                looping: false,
            };
        }
        ProgressWindow {
            before: self.time_before / duration,
            after: self.time / duration,
            looping: self.looping,
        }
    }

    /// Gets the weight of each clip computed by the last advance.
    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Whether the state has at least one resolved clip.
    pub fn has_clips(&self) -> bool {
        match &self.kind {
            StateKind::Empty => false,
            StateKind::Single(slot) => slot.is_resolved(),
            StateKind::Tree(tree) => tree.children().iter().any(|c| c.slot().is_resolved()),
        }
    }

    /// Resolves clips by name. Returns the names that could not be found.
    pub fn resolve_clips(&mut self, provider: &dyn ClipProvider) -> Vec<String> {
        match &mut self.kind {
            StateKind::Empty => Vec::new(),
            StateKind::Single(slot) => {
                if slot.resolve(provider) {
                    Vec::new()
                } else {
                    vec![slot.clip_name().to_string()]
                }
            }
            StateKind::Tree(tree) => tree.resolve_clips(provider),
        }
    }

    /// Binds a clip to the state, or to the tree child named `child`.
    pub fn assign_clip(&mut self, child: Option<&str>, clip: Arc<Clip>) -> Result<(), AnimError> {
        match (&mut self.kind, child) {
            (StateKind::Single(slot), None) => slot.set_clip(clip),
            (StateKind::Tree(tree), Some(name)) => match tree.child_mut(name) {
                Some(child) => child.slot_mut().set_clip(clip),
                None => return Err(AnimError::UnknownNode(format!("{}.{}", self.name, name))),
            },
            (StateKind::Tree(BlendTreeNode::Leaf(child)), None) => child.slot_mut().set_clip(clip),
            (_, Some(name)) => return Err(AnimError::UnknownNode(format!("{}.{}", self.name, name))),
            (_, None) => return Err(AnimError::UnknownNode(self.name.clone())),
        }
        Ok(())
    }

    /// Unbinds every clip of the state.
    pub fn clear_clips(&mut self) {
        match &mut self.kind {
            StateKind::Empty => {}
            StateKind::Single(slot) => slot.clear_clip(),
            StateKind::Tree(tree) => tree.children_mut().iter_mut().for_each(|c| c.slot_mut().clear_clip()),
        }
    }

    /// Rewinds the state at `offset`, a fraction of the duration.
    pub fn reset(&mut self, offset: f32) {
        let offset = f32_clamp_or_max(offset, 0.0, 1.0);
        self.time = offset * self.duration();
        self.time_before = self.time;
        match &mut self.kind {
            StateKind::Empty => {}
            StateKind::Single(slot) => {
                let duration = slot.duration();
                slot.reset(offset * duration);
            }
            StateKind::Tree(tree) => {
                for child in tree.children_mut() {
                    let duration = child.slot().duration();
                    child.slot_mut().reset(offset * duration);
                }
            }
        }
    }

    /// Advances the state by `dt` seconds, scaled by the state speed.
    ///
    /// Blend tree weights are computed from `params` and cached for sampling and events.
    pub fn advance(&mut self, dt: f32, params: &ParameterStore) {
        let delta = dt * self.speed;
        self.time_before = self.time;
        self.time += delta;
        if !self.looping {
            self.time = f32_clamp_or_max(self.time, 0.0, self.duration());
        }

        match &mut self.kind {
            StateKind::Empty => self.weights.clear(),
            StateKind::Single(slot) => {
                self.weights.clear();
                self.weights.push(if slot.is_resolved() { 1.0 } else { 0.0 });
                slot.advance(delta, self.looping);
            }
            StateKind::Tree(tree) => {
                tree.compute_weights(params, &mut self.weights);
                tree.playback_rates(&self.weights, &mut self.rates);
                for (child, rate) in tree.children_mut().iter_mut().zip(self.rates.iter()) {
                    child.slot_mut().advance(delta * rate, self.looping);
                }
            }
        }
    }

    /// Samples the state into `output`, mixing tree children by their weights.
    ///
    /// Returns the coverage of the pose: 1 when at least one clip contributed, 0 otherwise, in
    /// which case `output` content is unspecified.
    pub fn sample(&mut self, skeleton: &Skeleton, scratch: &mut Vec<Transform>, output: &mut [Transform]) -> f32 {
        let AnimState { kind, weights, .. } = self;
        match kind {
            StateKind::Empty => 0.0,
            StateKind::Single(slot) => {
                if slot.sample(skeleton, output) {
                    1.0
                } else {
                    0.0
                }
            }
            StateKind::Tree(tree) => {
                let num_joints = skeleton.num_joints();
                scratch.resize(num_joints, Transform::IDENTITY);

                let mut accumulated = 0.0;
                for (child, &weight) in tree.children_mut().iter_mut().zip(weights.iter()) {
                    if weight <= 0.0 || !child.slot_mut().sample(skeleton, scratch) {
                        continue;
                    }
                    if accumulated == 0.0 {
                        for (input, out) in scratch.iter().zip(output.iter_mut()).take(num_joints) {
                            blend_1st_pass(input, weight, out);
                        }
                    } else {
                        for (input, out) in scratch.iter().zip(output.iter_mut()).take(num_joints) {
                            blend_n_pass(input, weight, out);
                        }
                    }
                    accumulated += weight;
                }

                if accumulated <= 0.0 {
                    return 0.0;
                }
                for out in output.iter_mut().take(num_joints) {
                    blend_normalize(out, accumulated);
                }
                1.0
            }
        }
    }

    /// Calls `f` with every clip slot of the state and its weight.
    pub fn for_each_slot<F>(&self, mut f: F)
    where
        F: FnMut(&ClipSlot, f32),
    {
        match &self.kind {
            StateKind::Empty => {}
            StateKind::Single(slot) => f(slot, self.weights.first().copied().unwrap_or(0.0)),
            StateKind::Tree(tree) => {
                for (idx, child) in tree.children().iter().enumerate() {
                    f(child.slot(), self.weights.get(idx).copied().unwrap_or(0.0));
                }
            }
        }
    }
}
