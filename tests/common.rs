#![allow(unused_imports)]
#![allow(dead_code)]

use anim_graph_rs::*;
use glam::{Quat, Vec3};
use std::sync::Arc;

pub const JOINT_PATHS: [&str; 5] = ["Hips", "Hips/Spine", "Hips/Spine/Head", "Hips/Spine/Arm", "Hips/Leg"];

pub const HIPS: usize = 0;
pub const SPINE: usize = 1;
pub const HEAD: usize = 2;
pub const ARM: usize = 3;
pub const LEG: usize = 4;

/// Five joints biped, with non identity rest translations on the hips and the spine.
pub fn skeleton() -> Arc<Skeleton> {
    let joints = [
        RawJoint::new("Hips", -1, Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
        RawJoint::new("Hips/Spine", 0, Transform::from_translation(Vec3::new(0.0, 0.5, 0.0))),
        RawJoint::new("Hips/Spine/Head", 1, Transform::IDENTITY),
        RawJoint::new("Hips/Spine/Arm", 1, Transform::IDENTITY),
        RawJoint::new("Hips/Leg", 0, Transform::IDENTITY),
    ];
    Arc::new(Skeleton::from_raw(&joints).unwrap())
}

/// Clip holding every joint at translation `(x, 0, 0)`.
pub fn constant_clip(name: &str, duration: f32, x: f32) -> Clip {
    let mut clip = Clip::new(name, duration);
    for path in JOINT_PATHS {
        clip = clip.with_track(JointTrack::new(path).with_translations(Track::constant(Vec3::new(x, 0.0, 0.0))));
    }
    clip
}

/// Clip moving every joint from `(0, 0, 0)` to `(duration, 0, 0)`.
pub fn ramp_clip(name: &str, duration: f32) -> Clip {
    let mut clip = Clip::new(name, duration);
    for path in JOINT_PATHS {
        let track = Track::from_raw(&[Vec3::ZERO, Vec3::new(duration, 0.0, 0.0)], &[0.0, duration]).unwrap();
        clip = clip.with_track(JointTrack::new(path).with_translations(track));
    }
    clip
}

pub fn translation_x(pose: &[Transform], joint: usize) -> f32 {
    pose[joint].translation.x
}

pub fn assert_x(pose: &[Transform], joint: usize, x: f32) {
    let actual = translation_x(pose, joint);
    assert!((actual - x).abs() < 1e-5, "joint {} x: {} != {}", joint, actual, x);
}

pub fn assert_weights(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{:?} != {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
    }
}
