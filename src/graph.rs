//!
//! Animation graph documents and their loading into layers.
//!
//! A graph document declares parameters and layers, each layer holding states and transitions.
//! Loading never fails as a whole: invalid elements are reported in a `LoadReport` and skipped.
//!

use glam::Vec2;
use std::collections::BTreeMap;

use crate::base::{AnimError, STATE_ANY, STATE_END, STATE_START};
use crate::blend_tree::{BlendChild, BlendTreeNode};
use crate::blending_job::BlendMode;
use crate::clip::ClipProvider;
use crate::layer::Layer;
use crate::mask::BoneMask;
use crate::parameter::{ParamKind, ParamValue, ParameterStore};
use crate::skeleton::Skeleton;
use crate::state::{AnimState, StateKind};
use crate::transition::{Condition, ConditionOp, InterruptionSource, Transition};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Scalar value of a parameter or a condition.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ScalarDoc {
    Bool(bool),
    Number(f32),
}

impl Default for ScalarDoc {
    fn default() -> ScalarDoc {
        ScalarDoc::Number(0.0)
    }
}

impl ScalarDoc {
    #[inline]
    pub fn as_f32(&self) -> f32 {
        match *self {
            ScalarDoc::Bool(v) => v as i32 as f32,
            ScalarDoc::Number(v) => v,
        }
    }
}

/// Position of a blend tree child, a number in 1D trees and a pair in 2D trees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PointDoc {
    Scalar(f32),
    Pair([f32; 2]),
}

impl PointDoc {
    #[inline]
    pub fn to_vec2(self) -> Vec2 {
        match self {
            PointDoc::Scalar(x) => Vec2::new(x, 0.0),
            PointDoc::Pair([x, y]) => Vec2::new(x, y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlendTreeType {
    #[cfg_attr(feature = "serde", serde(rename = "1D"))]
    OneD,
    #[cfg_attr(feature = "serde", serde(rename = "2D_DIRECTIONAL"))]
    Directional2D,
    #[cfg_attr(feature = "serde", serde(rename = "2D_CARTESIAN"))]
    Cartesian2D,
    #[cfg_attr(feature = "serde", serde(rename = "DIRECT"))]
    Direct,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BlendChildDoc {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub point: Option<PointDoc>,
    #[cfg_attr(feature = "serde", serde(default = "default_one"))]
    pub speed: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parameter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BlendTreeDoc {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: BlendTreeType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parameter: Option<String>,
    /// Tree parameters. 2D trees read `[x, y]`, direct trees one per child.
    #[cfg_attr(feature = "serde", serde(default))]
    pub parameters: Vec<String>,
    pub children: Vec<BlendChildDoc>,
    #[cfg_attr(feature = "serde", serde(default, alias = "syncAnimations"))]
    pub sync_durations: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct StateDoc {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default = "default_one"))]
    pub speed: f32,
    #[cfg_attr(feature = "serde", serde(default = "default_true", rename = "loop"))]
    pub looping: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub blend_tree: Option<BlendTreeDoc>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ConditionDoc {
    pub parameter_name: String,
    pub predicate: ConditionOp,
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: ScalarDoc,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TransitionDoc {
    pub from: String,
    pub to: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub conditions: Vec<ConditionDoc>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub exit_time: Option<f32>,
    /// Blend duration, in seconds.
    #[cfg_attr(feature = "serde", serde(default, alias = "duration"))]
    pub time: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: Option<i32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub interruptible: bool,
    /// Takes precedence over `interruptible`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub interruption_source: Option<InterruptionSource>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub transition_offset: Option<f32>,
}

/// Mask entry of a bone path: `true`, `false` or `{ "value": bool, "children": bool }`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MaskEntryDoc {
    Flag(bool),
    Entry {
        #[cfg_attr(feature = "serde", serde(default = "default_true"))]
        value: bool,
        #[cfg_attr(feature = "serde", serde(default))]
        children: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct LayerDoc {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default = "default_one"))]
    pub weight: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub blend_type: BlendMode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mask: Option<BTreeMap<String, MaskEntryDoc>>,
    pub states: Vec<StateDoc>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub transitions: Vec<TransitionDoc>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterDoc {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: ParamKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: ScalarDoc,
}

/// Animation graph document.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnimGraphDoc {
    pub layers: Vec<LayerDoc>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parameters: BTreeMap<String, ParameterDoc>,
}

/// Issues found while loading a graph.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    /// Configuration errors. The elements concerned were skipped.
    pub errors: Vec<AnimError>,
    /// Clip names no provider could resolve. They sample as zero weight contributions.
    pub unresolved_clips: Vec<String>,
}

impl LoadReport {
    /// Whether the graph loaded without configuration error.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn report(&mut self, err: AnimError) {
        log::warn!("graph: {}", err);
        self.errors.push(err);
    }
}

/// Loaded graph, ready to be installed in a component.
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub layers: Vec<Layer>,
    pub parameters: ParameterStore,
    pub report: LoadReport,
}

impl AnimGraphDoc {
    /// Parses a JSON graph document.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<AnimGraphDoc, AnimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a JSON graph document from a `serde_json::Value`.
    #[cfg(feature = "serde")]
    pub fn from_value(value: serde_json::Value) -> Result<AnimGraphDoc, AnimError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Builds the layers and parameters of the graph.
    ///
    /// Clips are resolved by name through `provider`: single clip states by state name, blend
    /// tree children by child name. Masks are resolved against `skeleton`.
    pub fn load(&self, skeleton: &Skeleton, provider: &dyn ClipProvider) -> LoadedGraph {
        let mut report = LoadReport::default();

        let mut parameters = ParameterStore::new();
        for (name, doc) in &self.parameters {
            let value = match doc.value {
                ScalarDoc::Bool(v) => ParamValue::Boolean(v),
                ScalarDoc::Number(v) => ParamValue::Float(v),
            };
            parameters.declare(name.as_str(), value.coerce(doc.kind));
        }

        let mut layers: Vec<Layer> = Vec::with_capacity(self.layers.len());
        for layer_doc in &self.layers {
            if layers.iter().any(|l| l.name() == layer_doc.name) {
                report.report(AnimError::DuplicateLayer(layer_doc.name.clone()));
                continue;
            }
            let mut layer = load_layer(layer_doc, &parameters, provider, &mut report);
            if layers.is_empty() {
                layer.set_base();
            }
            for err in layer.resolve_mask(skeleton) {
                report.report(err);
            }
            layers.push(layer);
        }

        LoadedGraph {
            layers,
            parameters,
            report,
        }
    }
}

fn load_layer(doc: &LayerDoc, parameters: &ParameterStore, provider: &dyn ClipProvider, report: &mut LoadReport) -> Layer {
    let mut layer = Layer::new(doc.name.as_str())
        .with_weight(doc.weight)
        .with_blend_mode(doc.blend_type);
    if let Some(mask_doc) = &doc.mask {
        let mut mask = BoneMask::new();
        for (path, entry) in mask_doc {
            match *entry {
                MaskEntryDoc::Flag(value) => mask.set(path.as_str(), value, false),
                MaskEntryDoc::Entry { value, children } => mask.set(path.as_str(), value, children),
            }
        }
        layer = layer.with_mask(mask);
    }

    for state_doc in &doc.states {
        if state_doc.name == STATE_ANY {
            continue;
        }
        let owner = format!("{}.{}", doc.name, state_doc.name);
        let state = match &state_doc.blend_tree {
            _ if state_doc.name == STATE_START || state_doc.name == STATE_END => AnimState::empty(state_doc.name.as_str()),
            Some(tree_doc) => AnimState::tree(state_doc.name.as_str(), load_tree(tree_doc, &owner, report)),
            None => AnimState::single(state_doc.name.as_str(), state_doc.name.as_str()),
        };
        let mut state = state.with_speed(state_doc.speed).with_loop(state_doc.looping);

        if let StateKind::Tree(tree) = state.kind() {
            for parameter in tree.parameters() {
                if !parameter.is_empty() && !parameters.contains(parameter) {
                    report.report(AnimError::UnknownParameter {
                        owner: owner.clone(),
                        parameter: parameter.to_string(),
                    });
                }
            }
        }

        for name in state.resolve_clips(provider) {
            log::warn!("graph: unresolved clip {} in {}", name, owner);
            report.unresolved_clips.push(name);
        }
        if let Err(err) = layer.controller_mut().add_state(state) {
            report.report(err);
        }
    }

    for transition_doc in &doc.transitions {
        let mut transition = Transition::new(&transition_doc.from, transition_doc.to.as_str())
            .with_duration(transition_doc.time)
            .with_interruption_source(
                transition_doc
                    .interruption_source
                    .unwrap_or_else(|| InterruptionSource::from_interruptible(transition_doc.interruptible)),
            )
            .with_priority(transition_doc.priority.unwrap_or(0))
            .with_offset(transition_doc.transition_offset.unwrap_or(0.0));
        if let Some(exit_time) = transition_doc.exit_time {
            transition = transition.with_exit_time(exit_time);
        }
        for condition in &transition_doc.conditions {
            if !parameters.contains(&condition.parameter_name) {
                report.report(AnimError::UnknownParameter {
                    owner: format!("{}.{} => {}", doc.name, transition_doc.from, transition_doc.to),
                    parameter: condition.parameter_name.clone(),
                });
            }
            transition = transition.with_condition(Condition::new(
                condition.parameter_name.as_str(),
                condition.predicate,
                condition.value.as_f32(),
            ));
        }
        if let Err(err) = layer.controller_mut().add_transition(transition) {
            report.report(err);
        }
    }

    for err in layer.controller().validate() {
        report.report(err);
    }
    layer
}

fn load_tree(doc: &BlendTreeDoc, owner: &str, report: &mut LoadReport) -> BlendTreeNode {
    let mut parameter = |idx: usize| -> String {
        match (idx, &doc.parameter) {
            (0, Some(parameter)) => parameter.clone(),
            _ => doc.parameters.get(idx).cloned().unwrap_or_else(|| {
                report.report(AnimError::MissingParameter {
                    owner: owner.to_string(),
                    index: idx,
                });
                String::new()
            }),
        }
    };

    let children: Vec<BlendChild> = doc
        .children
        .iter()
        .enumerate()
        .map(|(idx, child)| {
            let mut blend_child = BlendChild::new(child.name.as_str())
                .with_point(child.point.map_or(Vec2::ZERO, |p| p.to_vec2()))
                .with_speed(child.speed);
            if doc.kind == BlendTreeType::Direct {
                if let Some(parameter) = child.parameter.clone().or_else(|| doc.parameters.get(idx).cloned()) {
                    blend_child = blend_child.with_parameter(parameter);
                }
            }
            blend_child
        })
        .collect();

    let tree = match doc.kind {
        BlendTreeType::OneD => BlendTreeNode::one_d(parameter(0), children),
        BlendTreeType::Directional2D => BlendTreeNode::directional_2d(parameter(0), parameter(1), children),
        BlendTreeType::Cartesian2D => BlendTreeNode::cartesian_2d(parameter(0), parameter(1), children),
        BlendTreeType::Direct => {
            for (idx, child) in children.iter().enumerate().filter(|(_, c)| c.parameter().is_none()) {
                report.report(AnimError::MissingParameter {
                    owner: format!("{}.{}", owner, child.name()),
                    index: idx,
                });
            }
            BlendTreeNode::direct(children)
        }
    };
    tree.with_sync_durations(doc.sync_durations)
}
