//!
//! Blend trees mixing several clips from parameter values.
//!
//! A blend tree computes one weight per child clip from the parameter store. Weights of the
//! children sum to 1, or to 0 when nothing contributes. Children whose clip could not be resolved
//! are zeroed before the weights are renormalized.
//!

use glam::Vec2;
use std::sync::Arc;

use crate::clip::{Clip, ClipProvider};
use crate::math::{f32_clamp_or_max, Transform};
use crate::parameter::ParameterStore;
use crate::sampling_job::SamplingJob;
use crate::skeleton::Skeleton;

const POINT_EPSILON: f32 = 1e-5;

/// Playback cursor of one clip inside a state.
///
/// The slot keeps the wrapped local time used for sampling, and the unwrapped window covered by
/// the last advance, used to detect crossed event markers.
#[derive(Debug, Default, Clone)]
pub struct ClipSlot {
    clip_name: String,
    clip: Option<Arc<Clip>>,
    time: f32,
    from: f32,
    to: f32,
    sampler: SamplingJob,
}

impl ClipSlot {
    pub fn new<S: Into<String>>(clip_name: S) -> ClipSlot {
        ClipSlot {
            clip_name: clip_name.into(),
            ..Default::default()
        }
    }

    /// Gets the name the clip is resolved by.
    #[inline]
    pub fn clip_name(&self) -> &str {
        &self.clip_name
    }

    #[inline]
    pub fn clip(&self) -> Option<&Arc<Clip>> {
        self.clip.as_ref()
    }

    /// Binds a clip to the slot and rewinds it.
    pub fn set_clip(&mut self, clip: Arc<Clip>) {
        self.sampler.set_clip(clip.clone());
        self.clip = Some(clip);
        self.reset(0.0);
    }

    pub fn clear_clip(&mut self) {
        self.sampler.clear_clip();
        self.clip = None;
        self.reset(0.0);
    }

    /// Resolves the clip by name through `provider`. Returns false if it could not be found.
    pub fn resolve(&mut self, provider: &dyn ClipProvider) -> bool {
        match provider.resolve_clip(&self.clip_name) {
            Some(clip) => {
                self.set_clip(clip);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.clip.is_some()
    }

    /// Gets the clip duration, 0 for an unresolved slot.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.clip.as_ref().map_or(0.0, |c| c.duration())
    }

    /// Gets the local sampling time, in `[0, duration]`.
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Gets the unwrapped `(from, to)` window covered by the last advance.
    #[inline]
    pub fn window(&self) -> (f32, f32) {
        (self.from, self.to)
    }

    pub(crate) fn sampler_mut(&mut self) -> &mut SamplingJob {
        &mut self.sampler
    }

    /// Moves the cursor to `time` without covering any window.
    pub fn reset(&mut self, time: f32) {
        self.time = f32_clamp_or_max(time, 0.0, self.duration());
        self.from = self.time;
        self.to = self.time;
    }

    /// Advances the cursor by `delta` seconds of clip time, negative values play backward.
    pub fn advance(&mut self, delta: f32, looping: bool) {
        let duration = self.duration();
        self.from = self.time;
        if duration <= 0.0 {
            self.to = self.time;
            return;
        }

        let next = self.time + delta;
        if looping {
            self.to = next;
            self.time = next.rem_euclid(duration);
            if self.time >= duration {
                self.time = 0.0;
            }
        } else {
            self.time = f32_clamp_or_max(next, 0.0, duration);
            self.to = self.time;
        }
    }

    /// Samples the clip at the current time. Returns false, leaving `output` untouched, if the
    /// slot is unresolved.
    pub fn sample(&mut self, skeleton: &Skeleton, output: &mut [Transform]) -> bool {
        if self.clip.is_none() {
            return false;
        }
        self.sampler.set_time(self.time);
        match self.sampler.run(skeleton, output) {
            Ok(()) => true,
            Err(err) => {
                log::trace!("sampling {} failed: {}", self.clip_name, err);
                false
            }
        }
    }
}

/// One child of a blend tree.
#[derive(Debug, Default, Clone)]
pub struct BlendChild {
    name: String,
    point: Vec2,
    speed: f32,
    parameter: Option<String>,
    slot: ClipSlot,
}

impl BlendChild {
    /// Creates a child. Its clip is resolved by `name`.
    pub fn new<S: Into<String>>(name: S) -> BlendChild {
        let name = name.into();
        BlendChild {
            slot: ClipSlot::new(name.clone()),
            name,
            point: Vec2::ZERO,
            speed: 1.0,
            parameter: None,
        }
    }

    /// Sets the position of the child in a 1D tree.
    pub fn with_threshold(mut self, x: f32) -> BlendChild {
        self.point = Vec2::new(x, 0.0);
        self
    }

    /// Sets the position of the child in a 2D tree.
    pub fn with_point(mut self, point: Vec2) -> BlendChild {
        self.point = point;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> BlendChild {
        self.speed = speed;
        self
    }

    /// Sets the parameter driving the child weight in a direct tree.
    pub fn with_parameter<S: Into<String>>(mut self, parameter: S) -> BlendChild {
        self.parameter = Some(parameter.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn point(&self) -> Vec2 {
        self.point
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    #[inline]
    pub fn slot(&self) -> &ClipSlot {
        &self.slot
    }

    #[inline]
    pub fn slot_mut(&mut self) -> &mut ClipSlot {
        &mut self.slot
    }
}

/// Blend tree node.
#[derive(Debug, Clone)]
pub enum BlendTreeNode {
    /// A single clip.
    Leaf(BlendChild),
    /// Children placed on a line, blended by the bracketing pair.
    OneD {
        parameter: String,
        children: Vec<BlendChild>,
        sync_durations: bool,
    },
    /// Children placed on a plane of directions, blended in polar space.
    Directional2D {
        parameter_x: String,
        parameter_y: String,
        children: Vec<BlendChild>,
        sync_durations: bool,
    },
    /// Children placed on a plane, blended in cartesian space.
    Cartesian2D {
        parameter_x: String,
        parameter_y: String,
        children: Vec<BlendChild>,
        sync_durations: bool,
    },
    /// Each child weighted by its own parameter.
    Direct { children: Vec<BlendChild> },
}

impl BlendTreeNode {
    pub fn leaf(child: BlendChild) -> BlendTreeNode {
        BlendTreeNode::Leaf(child)
    }

    /// Creates a 1D tree. Children are sorted by threshold.
    pub fn one_d<S: Into<String>>(parameter: S, mut children: Vec<BlendChild>) -> BlendTreeNode {
        children.sort_by(|a, b| a.point.x.total_cmp(&b.point.x));
        BlendTreeNode::OneD {
            parameter: parameter.into(),
            children,
            sync_durations: false,
        }
    }

    pub fn directional_2d<X: Into<String>, Y: Into<String>>(
        parameter_x: X,
        parameter_y: Y,
        children: Vec<BlendChild>,
    ) -> BlendTreeNode {
        BlendTreeNode::Directional2D {
            parameter_x: parameter_x.into(),
            parameter_y: parameter_y.into(),
            children,
            sync_durations: false,
        }
    }

    pub fn cartesian_2d<X: Into<String>, Y: Into<String>>(
        parameter_x: X,
        parameter_y: Y,
        children: Vec<BlendChild>,
    ) -> BlendTreeNode {
        BlendTreeNode::Cartesian2D {
            parameter_x: parameter_x.into(),
            parameter_y: parameter_y.into(),
            children,
            sync_durations: false,
        }
    }

    pub fn direct(children: Vec<BlendChild>) -> BlendTreeNode {
        BlendTreeNode::Direct { children }
    }

    /// Enables duration synchronization. Ignored by leaves and direct trees.
    pub fn with_sync_durations(mut self, sync: bool) -> BlendTreeNode {
        match &mut self {
            BlendTreeNode::OneD { sync_durations, .. }
            | BlendTreeNode::Directional2D { sync_durations, .. }
            | BlendTreeNode::Cartesian2D { sync_durations, .. } => *sync_durations = sync,
            _ => {}
        }
        self
    }

    #[inline]
    pub fn sync_durations(&self) -> bool {
        match self {
            BlendTreeNode::OneD { sync_durations, .. }
            | BlendTreeNode::Directional2D { sync_durations, .. }
            | BlendTreeNode::Cartesian2D { sync_durations, .. } => *sync_durations,
            _ => false,
        }
    }

    pub fn children(&self) -> &[BlendChild] {
        match self {
            BlendTreeNode::Leaf(child) => std::slice::from_ref(child),
            BlendTreeNode::OneD { children, .. }
            | BlendTreeNode::Directional2D { children, .. }
            | BlendTreeNode::Cartesian2D { children, .. }
            | BlendTreeNode::Direct { children } => children,
        }
    }

    pub fn children_mut(&mut self) -> &mut [BlendChild] {
        match self {
            BlendTreeNode::Leaf(child) => std::slice::from_mut(child),
            BlendTreeNode::OneD { children, .. }
            | BlendTreeNode::Directional2D { children, .. }
            | BlendTreeNode::Cartesian2D { children, .. }
            | BlendTreeNode::Direct { children } => children,
        }
    }

    #[inline]
    pub fn child(&self, name: &str) -> Option<&BlendChild> {
        self.children().iter().find(|c| c.name == name)
    }

    #[inline]
    pub fn child_mut(&mut self, name: &str) -> Option<&mut BlendChild> {
        self.children_mut().iter_mut().find(|c| c.name == name)
    }

    /// Gets every parameter name read by the tree.
    pub fn parameters(&self) -> Vec<&str> {
        match self {
            BlendTreeNode::Leaf(_) => Vec::new(),
            BlendTreeNode::OneD { parameter, .. } => vec![parameter.as_str()],
            BlendTreeNode::Directional2D {
                parameter_x,
                parameter_y,
                ..
            }
            | BlendTreeNode::Cartesian2D {
                parameter_x,
                parameter_y,
                ..
            } => vec![parameter_x.as_str(), parameter_y.as_str()],
            BlendTreeNode::Direct { children } => children.iter().filter_map(|c| c.parameter()).collect(),
        }
    }

    /// Resolves every child clip through `provider`. Returns the names that could not be found.
    pub fn resolve_clips(&mut self, provider: &dyn ClipProvider) -> Vec<String> {
        let mut missing = Vec::new();
        for child in self.children_mut() {
            if !child.slot.resolve(provider) {
                missing.push(child.slot.clip_name().to_string());
            }
        }
        missing
    }

    /// Gets the longest child clip duration.
    pub fn duration(&self) -> f32 {
        self.children().iter().map(|c| c.slot.duration()).fold(0.0, f32::max)
    }

    /// Computes one weight per child from `params`.
    ///
    /// Weights sum to 1 when at least one resolved child contributes, to 0 otherwise.
    pub fn compute_weights(&self, params: &ParameterStore, weights: &mut Vec<f32>) {
        weights.clear();
        weights.resize(self.children().len(), 0.0);
        if weights.is_empty() {
            return;
        }

        match self {
            BlendTreeNode::Leaf(_) => weights[0] = 1.0,
            BlendTreeNode::OneD {
                parameter, children, ..
            } => {
                let points: Vec<f32> = children.iter().map(|c| c.point.x).collect();
                one_d_weights(&points, params.value_f32(parameter), weights);
            }
            BlendTreeNode::Directional2D {
                parameter_x,
                parameter_y,
                children,
                ..
            } => {
                let points: Vec<Vec2> = children.iter().map(|c| c.point).collect();
                let query = Vec2::new(params.value_f32(parameter_x), params.value_f32(parameter_y));
                directional_weights(&points, query, weights);
            }
            BlendTreeNode::Cartesian2D {
                parameter_x,
                parameter_y,
                children,
                ..
            } => {
                let points: Vec<Vec2> = children.iter().map(|c| c.point).collect();
                let query = Vec2::new(params.value_f32(parameter_x), params.value_f32(parameter_y));
                gradient_band_weights(&points, query, false, weights);
                if weights.iter().sum::<f32>() <= 0.0 {
                    weights[nearest_point(&points, query)] = 1.0;
                }
            }
            BlendTreeNode::Direct { children } => {
                for (weight, child) in weights.iter_mut().zip(children.iter()) {
                    *weight = child.parameter().map_or(0.0, |p| params.value_f32(p).max(0.0));
                }
            }
        }

        for (weight, child) in weights.iter_mut().zip(self.children().iter()) {
            if !child.slot.is_resolved() {
                *weight = 0.0;
            }
        }
        normalize_weights(weights);
    }

    /// Computes one playback rate per child, a multiplier of the state speed.
    ///
    /// Without duration synchronization a child plays at its own speed. With it, every
    /// contributing child is scaled so that all of them complete a cycle in the weighted average
    /// cycle time of the contributing children, keeping their normalized times aligned.
    pub fn playback_rates(&self, weights: &[f32], rates: &mut Vec<f32>) {
        let children = self.children();
        rates.clear();
        rates.extend(children.iter().map(|c| c.speed));
        if !self.sync_durations() {
            return;
        }

        let mut reference = 0.0;
        let mut total = 0.0;
        for (child, &weight) in children.iter().zip(weights.iter()) {
            let duration = child.slot.duration();
            if weight > 0.0 && duration > 0.0 && child.speed != 0.0 {
                reference += weight * duration / child.speed.abs();
                total += weight;
            }
        }
        if total <= 0.0 || reference <= 0.0 {
            return;
        }
        reference /= total;

        for (rate, child) in rates.iter_mut().zip(children.iter()) {
            let duration = child.slot.duration();
            if duration > 0.0 && child.speed != 0.0 {
                *rate = child.speed.signum() * duration / reference;
            }
        }
    }
}

/// Renormalizes weights to sum to 1. All zero weights are kept as is.
pub(crate) fn normalize_weights(weights: &mut [f32]) {
    let total: f32 = weights.iter().sum();
    if total > 0.0 {
        let ratio = total.recip();
        weights.iter_mut().for_each(|w| *w *= ratio);
    }
}

fn one_d_weights(points: &[f32], query: f32, weights: &mut [f32]) {
    let last = points.len() - 1;
    if query <= points[0] {
        weights[0] = 1.0;
        return;
    }
    if query >= points[last] {
        weights[last] = 1.0;
        return;
    }
    for idx in 0..last {
        let (p0, p1) = (points[idx], points[idx + 1]);
        if query <= p1 {
            let t = if p1 - p0 > 0.0 { (query - p0) / (p1 - p0) } else { 0.0 };
            weights[idx] = 1.0 - t;
            weights[idx + 1] = t;
            return;
        }
    }
}

fn directional_weights(points: &[Vec2], query: Vec2, weights: &mut [f32]) {
    if query.length_squared() <= POINT_EPSILON * POINT_EPSILON {
        let idx = points
            .iter()
            .position(|p| p.length_squared() <= POINT_EPSILON * POINT_EPSILON)
            .unwrap_or_else(|| nearest_point(points, query));
        weights[idx] = 1.0;
        return;
    }

    gradient_band_weights(points, query, true, weights);
    if weights.iter().sum::<f32>() <= 0.0 {
        weights[nearest_point(points, query)] = 1.0;
    }
}

/// Gradient band interpolation.
///
/// The weight of a child is the minimum over every other child of how far the query stands from
/// the child toward the other one, clamped to `[0, 1]`. In polar space the radial axis is the
/// magnitude difference over the mean magnitude, and the angular axis is twice the signed angle.
fn gradient_band_weights(points: &[Vec2], query: Vec2, polar: bool, weights: &mut [f32]) {
    for (i, pi) in points.iter().enumerate() {
        let mut weight = 1.0f32;
        for (j, pj) in points.iter().enumerate() {
            if i == j || pi.abs_diff_eq(*pj, POINT_EPSILON) {
                continue;
            }

            let (pip, pipj) = if polar {
                let len_i = pi.length();
                let len_j = pj.length();
                let mean = (len_i + len_j) * 0.5;
                (
                    Vec2::new((query.length() - len_i) / mean, signed_angle(*pi, query) * 2.0),
                    Vec2::new((len_j - len_i) / mean, signed_angle(*pi, *pj) * 2.0),
                )
            } else {
                (query - *pi, *pj - *pi)
            };

            let len2 = pipj.length_squared();
            if len2 <= 0.0 {
                continue;
            }
            let h = (1.0 - pip.dot(pipj) / len2).clamp(0.0, 1.0);
            weight = weight.min(h);
        }
        weights[i] = weight;
    }
    normalize_weights(weights);
}

#[inline]
fn signed_angle(a: Vec2, b: Vec2) -> f32 {
    f32::atan2(a.perp_dot(b), a.dot(b))
}

fn nearest_point(points: &[Vec2], query: Vec2) -> usize {
    let mut nearest = 0;
    let mut nearest_dist = f32::MAX;
    for (idx, point) in points.iter().enumerate() {
        let dist = point.distance_squared(query);
        if dist < nearest_dist {
            nearest = idx;
            nearest_dist = dist;
        }
    }
    nearest
}
