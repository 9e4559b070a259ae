//!
//! Base types, errors and utils.
//!

use std::collections::hash_map::DefaultHasher;
use std::hash::BuildHasher;
use thiserror::Error;

/// Anim graph error type.
///
/// Configuration errors are collected into a [`crate::LoadReport`] while a graph is loaded, and
/// misuse errors are returned from the component API. None of them are ever raised from the
/// per-frame update.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimError {
    /// Validates job failed.
    #[error("Invalid job")]
    InvalidJob,

    /// Skeleton joints are not stored parents first, or a joint path is duplicated.
    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),

    /// A layer with the same name already exists.
    #[error("Duplicate layer: {0}")]
    DuplicateLayer(String),
    /// A layer name could not be found.
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// A state with the same name already exists in the layer.
    #[error("Duplicate state: {layer}.{state}")]
    DuplicateState { layer: String, state: String },
    /// A state name could not be found in the layer.
    #[error("Unknown state: {layer}.{state}")]
    UnknownState { layer: String, state: String },
    /// An empty marker state has no way out.
    #[error("Empty state without outgoing transition: {layer}.{state}")]
    DeadEndState { layer: String, state: String },
    /// A blend tree child could not be found.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A mask entry references a bone path missing from the skeleton.
    #[error("Unknown bone path: {layer} => {path}")]
    UnknownBonePath { layer: String, path: String },
    /// A blend tree or a condition references a parameter that was never declared.
    #[error("Unknown parameter: {owner} => {parameter}")]
    UnknownParameter { owner: String, parameter: String },
    /// A blend tree axis or a direct tree child has no parameter.
    #[error("Missing parameter: {owner} => #{index}")]
    MissingParameter { owner: String, index: usize },

    /// Graph document parsing errors.
    #[error("Json error: {0}")]
    Json(String),

    /// Custom errors.
    #[error("Custom error: {0}")]
    Custom(String),
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for AnimError {
    fn from(err: serde_json::Error) -> Self {
        AnimError::Json(err.to_string())
    }
}

impl AnimError {
    pub fn custom<S: Into<String>>(s: S) -> AnimError {
        AnimError::Custom(s.into())
    }

    pub fn is_invalid_job(&self) -> bool {
        matches!(self, AnimError::InvalidJob)
    }

    pub fn is_invalid_skeleton(&self) -> bool {
        matches!(self, AnimError::InvalidSkeleton(_))
    }

    pub fn is_duplicate_layer(&self) -> bool {
        matches!(self, AnimError::DuplicateLayer(_))
    }

    pub fn is_unknown_layer(&self) -> bool {
        matches!(self, AnimError::UnknownLayer(_))
    }

    pub fn is_duplicate_state(&self) -> bool {
        matches!(self, AnimError::DuplicateState { .. })
    }

    pub fn is_unknown_state(&self) -> bool {
        matches!(self, AnimError::UnknownState { .. })
    }

    pub fn is_dead_end_state(&self) -> bool {
        matches!(self, AnimError::DeadEndState { .. })
    }

    pub fn is_unknown_node(&self) -> bool {
        matches!(self, AnimError::UnknownNode(_))
    }

    pub fn is_unknown_bone_path(&self) -> bool {
        matches!(self, AnimError::UnknownBonePath { .. })
    }

    pub fn is_unknown_parameter(&self) -> bool {
        matches!(self, AnimError::UnknownParameter { .. })
    }

    pub fn is_missing_parameter(&self) -> bool {
        matches!(self, AnimError::MissingParameter { .. })
    }

    pub fn is_json(&self) -> bool {
        matches!(self, AnimError::Json(_))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, AnimError::Custom(_))
    }
}

/// Defines the maximum number of joints.
/// Joint indices are stored as `i16` in the skeleton parent table.
pub const SKELETON_MAX_JOINTS: i32 = 1024;

/// Defines the index of the parent of the root joint (which has no parent in fact)
pub const SKELETON_NO_PARENT: i16 = -1;

/// Name of the entry marker state.
pub const STATE_START: &str = "START";

/// Name of the exit marker state. Transitions into it restart the graph.
pub const STATE_END: &str = "END";

/// Name of the pseudo-state usable as a transition source only.
pub const STATE_ANY: &str = "ANY";

/// A hasher builder that creates `DefaultHasher` with default keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicState;

impl DeterministicState {
    /// Creates a new `DeterministicState` that builds `DefaultHasher` with default keys.
    pub const fn new() -> DeterministicState {
        DeterministicState
    }
}

impl BuildHasher for DeterministicState {
    type Hasher = DefaultHasher;

    fn build_hasher(&self) -> DefaultHasher {
        DefaultHasher::default()
    }
}

/// Splits a dotted node path (`Layer.State.Child`) into its segments.
#[inline]
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}
