use crate::base::AnimError;
use crate::math::Transform;
use crate::skeleton::Skeleton;

/// How a layer is combined with the layers below it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum BlendMode {
    /// The layer pose replaces the accumulated pose, proportionally to its weight.
    #[default]
    Overwrite,
    /// The layer pose difference to the rest pose is added to the accumulated pose.
    Additive,
}

/// Defines a layer of blending input data (local space transforms) and parameters (weights).
#[derive(Debug, Clone)]
pub struct BlendingLayer<'t> {
    /// Set of local space transforms to blend, ordered like the skeleton joints.
    pub input: &'t [Transform],

    /// Blending weight of this layer. Layers with a weight less or equal to 0 are skipped.
    pub weight: f32,

    pub mode: BlendMode,

    /// Optional set of per-joint weights, multiplied with the layer weight.
    /// An empty slice means every joint has a weight of 1.
    pub joint_weights: &'t [f32],
}

impl<'t> BlendingLayer<'t> {
    /// Creates a new `BlendingLayer` with full skeleton coverage.
    pub fn new(input: &'t [Transform], weight: f32, mode: BlendMode) -> BlendingLayer<'t> {
        BlendingLayer {
            input,
            weight,
            mode,
            joint_weights: &[],
        }
    }

    /// Creates a new `BlendingLayer` with per-joint weights.
    pub fn with_joint_weights(
        input: &'t [Transform],
        weight: f32,
        mode: BlendMode,
        joint_weights: &'t [f32],
    ) -> BlendingLayer<'t> {
        BlendingLayer {
            input,
            weight,
            mode,
            joint_weights,
        }
    }

    #[inline]
    fn joint_weight(&self, joint: usize) -> f32 {
        match self.joint_weights.get(joint) {
            Some(w) => self.weight * w.max(0.0),
            None => self.weight,
        }
    }
}

///
/// `BlendingJob` is in charge of composing layers of local transforms into one output pose.
///
/// Unlike a normalized blend, layers are applied in order on top of each other. The output starts
/// from the skeleton rest pose. Overwrite layers interpolate from the accumulated pose toward
/// their input, additive layers add the difference between their input and the rest pose.
///
/// A layer whose weight is less or equal to 0 is skipped entirely, so the output is the same as
/// if it were absent. An overwrite joint weight of 1 or more copies the input exactly.
///
#[derive(Debug, Default)]
pub struct BlendingJob<'t> {
    layers: Vec<BlendingLayer<'t>>,
}

impl<'t> BlendingJob<'t> {
    /// Gets layers of `BlendingJob`.
    #[inline]
    pub fn layers(&self) -> &[BlendingLayer<'t>] {
        &self.layers
    }

    /// Gets mutable layers of `BlendingJob`.
    ///
    /// Layers are composed in order, the first one being applied first.
    #[inline]
    pub fn layers_mut(&mut self) -> &mut Vec<BlendingLayer<'t>> {
        &mut self.layers
    }

    /// Validates `BlendingJob` parameters.
    pub fn validate(&self, skeleton: &Skeleton, output: &[Transform]) -> bool {
        let num_joints = skeleton.num_joints();
        if output.len() < num_joints {
            return false;
        }
        self.layers
            .iter()
            .all(|l| l.input.len() >= num_joints && (l.joint_weights.is_empty() || l.joint_weights.len() >= num_joints))
    }

    /// Runs blending job's task.
    /// The validate job before any operation is performed.
    pub fn run(&self, skeleton: &Skeleton, output: &mut [Transform]) -> Result<(), AnimError> {
        if !self.validate(skeleton, output) {
            return Err(AnimError::InvalidJob);
        }

        let rest_poses = skeleton.joint_rest_poses();
        output[..rest_poses.len()].copy_from_slice(rest_poses);

        for layer in &self.layers {
            if layer.weight <= 0.0 {
                continue;
            }
            match layer.mode {
                BlendMode::Overwrite => Self::blend_overwrite(layer, output, rest_poses.len()),
                BlendMode::Additive => Self::blend_additive(layer, rest_poses, output),
            }
        }
        Ok(())
    }

    fn blend_overwrite(layer: &BlendingLayer, output: &mut [Transform], num_joints: usize) {
        for idx in 0..num_joints {
            let weight = layer.joint_weight(idx);
            if weight <= 0.0 {
                continue;
            }
            if weight >= 1.0 {
                output[idx] = layer.input[idx];
            } else {
                output[idx] = output[idx].lerp(&layer.input[idx], weight);
            }
        }
    }

    fn blend_additive(layer: &BlendingLayer, rest_poses: &[Transform], output: &mut [Transform]) {
        for (idx, rest) in rest_poses.iter().enumerate() {
            let weight = layer.joint_weight(idx).min(1.0);
            if weight <= 0.0 {
                continue;
            }
            let delta = layer.input[idx].relative_to(rest);
            output[idx].add_delta(&delta, weight);
        }
    }
}
