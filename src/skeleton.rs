use bimap::BiHashMap;

use crate::base::{AnimError, SKELETON_MAX_JOINTS, SKELETON_NO_PARENT};
use crate::math::Transform;

/// Joint description used to build a `Skeleton`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawJoint {
    /// Slash delimited hierarchy path, for example `Hips/Spine/Chest`.
    pub path: String,
    /// Index of the parent joint, `SKELETON_NO_PARENT` for roots.
    pub parent: i16,
    /// Local rest pose of the joint.
    pub rest_pose: Transform,
}

impl RawJoint {
    pub fn new<S: Into<String>>(path: S, parent: i16, rest_pose: Transform) -> RawJoint {
        RawJoint {
            path: path.into(),
            parent,
            rest_pose,
        }
    }
}

///
/// This runtime skeleton data structure provides a const-only access to joint
/// hierarchy, joint paths and rest-pose.
///
/// Joint paths, rest-poses and hierarchy information are all stored in separate
/// arrays of data, in order to closely match with the way runtime algorithms use
/// them. Joint hierarchy is packed as an array of parent joint indices, stored
/// with parents before children. This is enough to traverse the whole joint
/// hierarchy. Use iter_depth_first() to implement a depth-first traversal utility.
///
/// The path table is built once, so that bone masks and clip tracks resolve to
/// joint indices without string matching at runtime.
///
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Skeleton {
    joint_rest_poses: Vec<Transform>,
    joint_parents: Vec<i16>,
    joint_paths: BiHashMap<String, i16>,
}

impl Skeleton {
    /// Builds a `Skeleton` from raw joints.
    ///
    /// Parents must be declared before their children, and paths must be unique.
    pub fn from_raw(joints: &[RawJoint]) -> Result<Skeleton, AnimError> {
        if joints.len() > SKELETON_MAX_JOINTS as usize {
            return Err(AnimError::InvalidSkeleton(format!("too many joints: {}", joints.len())));
        }

        let mut joint_rest_poses = Vec::with_capacity(joints.len());
        let mut joint_parents = Vec::with_capacity(joints.len());
        let mut joint_paths = BiHashMap::with_capacity(joints.len());
        for (idx, joint) in joints.iter().enumerate() {
            if joint.parent != SKELETON_NO_PARENT && (joint.parent < 0 || joint.parent as usize >= idx) {
                return Err(AnimError::InvalidSkeleton(format!(
                    "joint {} has invalid parent {}",
                    joint.path, joint.parent
                )));
            }
            if joint_paths.insert_no_overwrite(joint.path.clone(), idx as i16).is_err() {
                return Err(AnimError::InvalidSkeleton(format!("duplicate joint {}", joint.path)));
            }
            joint_rest_poses.push(joint.rest_pose);
            joint_parents.push(joint.parent);
        }

        return Ok(Skeleton {
            joint_rest_poses,
            joint_parents,
            joint_paths,
        });
    }

    /// Builds a `Skeleton` from slash delimited paths, with identity rest poses.
    ///
    /// The parent of `a/b/c` is the joint `a/b`, which must come first.
    pub fn from_paths(paths: &[&str]) -> Result<Skeleton, AnimError> {
        let mut joints: Vec<RawJoint> = Vec::with_capacity(paths.len());
        for path in paths {
            let parent = match path.rfind('/') {
                None => SKELETON_NO_PARENT,
                Some(pos) => {
                    let parent_path = &path[..pos];
                    match joints.iter().position(|j| j.path == parent_path) {
                        Some(idx) => idx as i16,
                        None => {
                            return Err(AnimError::InvalidSkeleton(format!("missing parent of {}", path)));
                        }
                    }
                }
            };
            joints.push(RawJoint::new(*path, parent, Transform::IDENTITY));
        }
        return Skeleton::from_raw(&joints);
    }

    /// Replaces the rest pose of a joint. Used by tools building skeletons incrementally.
    pub fn with_rest_pose(mut self, path: &str, rest_pose: Transform) -> Result<Skeleton, AnimError> {
        let idx = self
            .joint_by_path(path)
            .ok_or_else(|| AnimError::InvalidSkeleton(format!("unknown joint {}", path)))?;
        self.joint_rest_poses[idx as usize] = rest_pose;
        return Ok(self);
    }
}

impl Skeleton {
    /// Gets the number of joints of `Skeleton`.
    #[inline]
    pub fn num_joints(&self) -> usize {
        return self.joint_parents.len();
    }

    /// Gets joint's rest poses.
    #[inline]
    pub fn joint_rest_poses(&self) -> &[Transform] {
        return &self.joint_rest_poses;
    }

    /// Gets joint's parent indices range.
    #[inline]
    pub fn joint_parents(&self) -> &[i16] {
        return &self.joint_parents;
    }

    /// Gets joint's parent by index.
    #[inline]
    pub fn joint_parent(&self, idx: usize) -> i16 {
        return self.joint_parents[idx];
    }

    /// Gets joint's path table.
    #[inline]
    pub fn joint_paths(&self) -> &BiHashMap<String, i16> {
        return &self.joint_paths;
    }

    /// Gets joint's index by path.
    #[inline]
    pub fn joint_by_path(&self, path: &str) -> Option<i16> {
        return self.joint_paths.get_by_left(path).copied();
    }

    /// Gets joint's path by index.
    #[inline]
    pub fn joint_path(&self, idx: usize) -> Option<&str> {
        return self.joint_paths.get_by_right(&(idx as i16)).map(|s| s.as_str());
    }

    /// Test if a joint is a leaf.
    ///
    /// * `joint` - `joint` must be in range [0, num joints].
    ///   Joint is a leaf if it's the last joint, or next joint's parent isn't `joint`.
    #[inline]
    pub fn is_leaf(&self, joint: usize) -> bool {
        let next = joint + 1;
        return next == self.num_joints() || (self.joint_parents()[next] as usize != joint);
    }

    /// Test if `joint` is `ancestor` or one of its descendants.
    pub fn is_descendant(&self, joint: usize, ancestor: usize) -> bool {
        let mut current = joint as i16;
        while current != SKELETON_NO_PARENT {
            if current as usize == ancestor {
                return true;
            }
            current = self.joint_parents[current as usize];
        }
        return false;
    }

    /// Iterates through the joint hierarchy in depth-first order.
    ///
    /// * `from` - The joint index to start from. If negative, the iteration starts from the root.
    /// * `f` - The function to call for each joint. The function takes arguments `(joint: i16, parent: i16)`.
    pub fn iter_depth_first<F>(&self, from: i16, mut f: F)
    where
        F: FnMut(i16, i16),
    {
        let mut i = if from < 0 { 0 } else { from as usize };
        let mut process = i < self.num_joints();
        while process {
            f(i as i16, self.joint_parent(i));
            i += 1;
            process = i < self.num_joints() && (from < 0 || self.is_descendant(i, from as usize));
        }
    }
}
