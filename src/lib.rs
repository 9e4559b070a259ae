mod base;
mod blend_tree;
mod blending_job;
mod clip;
mod component;
mod controller;
mod event;
mod event_triggering_job;
mod graph;
mod layer;
mod mask;
mod math;
mod parameter;
mod sampling_job;
mod skeleton;
mod state;
mod track;
mod transition;

pub use base::*;
pub use blend_tree::{BlendChild, BlendTreeNode, ClipSlot};
pub use blending_job::{BlendMode, BlendingJob, BlendingLayer};
pub use clip::{Clip, ClipEvent, ClipLibrary, ClipProvider, JointTrack};
pub use component::{AnimComponent, DEFAULT_LAYER};
pub use controller::LayerController;
pub use event::{AnimEvent, EventDispatcher, EventHandle};
pub use event_triggering_job::{EventTriggeringIter, EventTriggeringJob, TriggeredEvent};
pub use graph::{
    AnimGraphDoc, BlendChildDoc, BlendTreeDoc, BlendTreeType, ConditionDoc, LayerDoc, LoadReport, LoadedGraph,
    MaskEntryDoc, ParameterDoc, PointDoc, ScalarDoc, StateDoc, TransitionDoc,
};
pub use layer::Layer;
pub use mask::{BoneMask, MaskEntry};
pub use math::{f32_clamp_or_max, quat_abs_diff_eq, quat_nlerp, Transform};
pub use parameter::{ParamKind, ParamValue, ParameterStore};
pub use sampling_job::SamplingJob;
pub use skeleton::{RawJoint, Skeleton};
pub use state::{AnimState, ProgressWindow, StateKind};
pub use track::{Track, TrackValue};
pub use transition::{Condition, ConditionOp, InterruptionSource, Transition, TransitionSource};
