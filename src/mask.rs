//!
//! Bone masks restricting a layer to a subset of the skeleton.
//!

use crate::skeleton::Skeleton;

/// Mask entry of one bone path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskEntry {
    /// Whether the bone itself is included.
    pub included: bool,
    /// Whether descendants without their own entry inherit `included`.
    pub include_children: bool,
}

/// Bone path to `MaskEntry` table.
///
/// A joint is included when its own path has an included entry, or when the nearest ancestor
/// whose entry has `include_children` set is included. Joints matched by no entry are excluded.
///
/// Masks are resolved once per skeleton into a per-joint weight table (1.0 or 0.0), consumed by
/// `BlendingJob` as joint weights.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BoneMask {
    entries: Vec<(String, MaskEntry)>,
}

impl BoneMask {
    pub fn new() -> BoneMask {
        BoneMask::default()
    }

    /// Sets the entry of `path`, replacing the previous one.
    pub fn set<S: Into<String>>(&mut self, path: S, included: bool, include_children: bool) {
        let path = path.into();
        let entry = MaskEntry {
            included,
            include_children,
        };
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some((_, e)) => *e = entry,
            None => self.entries.push((path, entry)),
        }
    }

    /// Includes a single bone.
    pub fn with_bone<S: Into<String>>(mut self, path: S) -> BoneMask {
        self.set(path, true, false);
        self
    }

    /// Includes a bone and all its descendants.
    pub fn with_branch<S: Into<String>>(mut self, path: S) -> BoneMask {
        self.set(path, true, true);
        self
    }

    /// Excludes a bone and all its descendants.
    pub fn without_branch<S: Into<String>>(mut self, path: S) -> BoneMask {
        self.set(path, false, true);
        self
    }

    #[inline]
    pub fn entries(&self) -> &[(String, MaskEntry)] {
        &self.entries
    }

    #[inline]
    pub fn entry(&self, path: &str) -> Option<MaskEntry> {
        self.entries.iter().find(|(p, _)| p == path).map(|(_, e)| *e)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the mask against `skeleton` into `joint_weights`.
    ///
    /// Returns the paths missing from the skeleton. They are skipped, and if no entry resolves at
    /// all the whole skeleton is included.
    pub fn resolve(&self, skeleton: &Skeleton, joint_weights: &mut Vec<f32>) -> Vec<String> {
        let num_joints = skeleton.num_joints();
        let mut own: Vec<Option<MaskEntry>> = vec![None; num_joints];
        let mut unknown = Vec::new();
        for (path, entry) in &self.entries {
            match skeleton.joint_by_path(path) {
                Some(joint) => own[joint as usize] = Some(*entry),
                None => unknown.push(path.clone()),
            }
        }

        joint_weights.clear();
        if unknown.len() == self.entries.len() {
            joint_weights.resize(num_joints, 1.0);
            return unknown;
        }

        // value inherited by the children of each joint, parents are stored first
        let mut inherited: Vec<Option<bool>> = vec![None; num_joints];
        joint_weights.reserve(num_joints);
        for joint in 0..num_joints {
            let parent = skeleton.joint_parent(joint);
            let from_parent = if parent < 0 { None } else { inherited[parent as usize] };
            let included = match own[joint] {
                Some(entry) => {
                    inherited[joint] = if entry.include_children {
                        Some(entry.included)
                    } else {
                        from_parent
                    };
                    entry.included
                }
                None => {
                    inherited[joint] = from_parent;
                    from_parent.unwrap_or(false)
                }
            };
            joint_weights.push(if included { 1.0 } else { 0.0 });
        }
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_skeleton() -> Skeleton {
        Skeleton::from_paths(&[
            "Hips",
            "Hips/Spine",
            "Hips/Spine/Head",
            "Hips/Spine/LeftArm",
            "Hips/Spine/LeftArm/LeftHand",
            "Hips/LeftLeg",
        ])
        .unwrap()
    }

    #[test]
    fn test_branch() {
        let skeleton = new_skeleton();
        let mut weights = Vec::new();
        let unknown = BoneMask::new().with_branch("Hips/Spine").resolve(&skeleton, &mut weights);
        assert!(unknown.is_empty());
        assert_eq!(weights, vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_single_bone() {
        let skeleton = new_skeleton();
        let mut weights = Vec::new();
        BoneMask::new().with_bone("Hips/Spine/LeftArm").resolve(&skeleton, &mut weights);
        assert_eq!(weights, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_nearest_ancestor() {
        let skeleton = new_skeleton();
        let mut weights = Vec::new();
        BoneMask::new()
            .with_branch("Hips")
            .without_branch("Hips/Spine/LeftArm")
            .resolve(&skeleton, &mut weights);
        assert_eq!(weights, vec![1.0, 1.0, 1.0, 0.0, 0.0, 1.0]);

        // an entry without include_children doesn't stop inheritance
        let mut mask = BoneMask::new().with_branch("Hips/Spine");
        mask.set("Hips/Spine/LeftArm", false, false);
        mask.resolve(&skeleton, &mut weights);
        assert_eq!(weights, vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unknown_paths() {
        let skeleton = new_skeleton();
        let mut weights = Vec::new();
        let unknown = BoneMask::new()
            .with_branch("Hips/Spine/Head")
            .with_bone("Hips/Tail")
            .resolve(&skeleton, &mut weights);
        assert_eq!(unknown, vec!["Hips/Tail".to_string()]);
        assert_eq!(weights, vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);

        let unknown = BoneMask::new().with_bone("Tail").resolve(&skeleton, &mut weights);
        assert_eq!(unknown.len(), 1);
        assert_eq!(weights, vec![1.0; 6]);
    }
}
