use anim_graph_rs::*;
use glam::{Quat, Vec3};
use std::sync::Arc;

mod common;
use common::*;

fn rotating_clip(name: &str, x: f32) -> Arc<Clip> {
    let mut clip = Clip::new(name, 1.0);
    for path in JOINT_PATHS {
        clip = clip.with_track(
            JointTrack::new(path)
                .with_translations(Track::constant(Vec3::new(x, 0.0, 0.0)))
                .with_rotations(Track::constant(Quat::from_rotation_y(x))),
        );
    }
    clip.into_arc()
}

#[test]
fn test_additive_upper_body() {
    let mut base = Clip::new("Base", 1.0);
    for path in ["Hips", "Hips/Spine", "Hips/Spine/Head", "Hips/Leg"] {
        base = base.with_track(JointTrack::new(path).with_translations(Track::constant(Vec3::new(2.0, 0.0, 0.0))));
    }
    let wave = Clip::new("Wave", 1.0)
        .with_track(JointTrack::new("Hips/Spine/Arm").with_translations(Track::constant(Vec3::new(0.0, 0.0, 4.0))))
        .with_track(JointTrack::new("Hips/Spine/Head").with_translations(Track::constant(Vec3::new(9.0, 0.0, 0.0))));

    let mut component = AnimComponent::new(skeleton());
    component.add_layer("Base", 0.5, None, BlendMode::Overwrite).unwrap();
    component.assign_animation("Idle", base.into_arc(), None, None).unwrap();
    let mask = BoneMask::new().with_bone("Hips/Spine/Arm");
    component.add_layer("Upper", 0.5, Some(mask), BlendMode::Additive).unwrap();
    component.assign_animation("Upper.Wave", wave.into_arc(), None, None).unwrap();

    let pose = component.update(0.1);
    assert!(pose[ARM].abs_diff_eq(&Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)), 1e-6));
    assert_eq!(pose[HEAD], Transform::from_translation(Vec3::new(2.0, 0.0, 0.0)));
    assert_eq!(pose[LEG], Transform::from_translation(Vec3::new(2.0, 0.0, 0.0)));
}

#[test]
fn test_mask_exclusivity() {
    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Idle", constant_clip("Idle", 1.0, 1.0).into_arc(), None, None).unwrap();
    let mask = BoneMask::new().with_branch("Hips/Spine");
    component.add_layer("Upper", 1.0, Some(mask), BlendMode::Overwrite).unwrap();
    component.assign_animation("Upper.Aim", constant_clip("Aim", 1.0, 5.0).into_arc(), None, None).unwrap();

    let pose = component.update(0.1);
    for (joint, x) in [(HIPS, 1.0), (SPINE, 5.0), (HEAD, 5.0), (ARM, 5.0), (LEG, 1.0)] {
        assert_x(pose, joint, x);
    }

    let mask = BoneMask::new().with_branch("Hips/Spine").without_branch("Hips/Spine/Arm");
    component.layer_mut("Upper").unwrap().set_mask(Some(mask));
    let pose = component.update(0.1);
    for (joint, x) in [(HIPS, 1.0), (SPINE, 5.0), (HEAD, 5.0), (ARM, 1.0), (LEG, 1.0)] {
        assert_x(pose, joint, x);
    }

    // No entry resolves, the whole skeleton is masked in.
    component.layer_mut("Upper").unwrap().set_mask(Some(BoneMask::new().with_bone("Hips/Tail")));
    let pose = component.update(0.1);
    for joint in [HIPS, SPINE, HEAD, ARM, LEG] {
        assert_x(pose, joint, 5.0);
    }
}

#[test]
fn test_zero_weight_layer() {
    let idle = rotating_clip("Idle", 1.0);
    let mut expected = AnimComponent::new(skeleton());
    expected.assign_animation("Idle", idle.clone(), None, None).unwrap();

    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Idle", idle, None, None).unwrap();
    component.add_layer("Over", 0.0, None, BlendMode::Overwrite).unwrap();
    component.assign_animation("Over.Aim", rotating_clip("Aim", 2.0), None, None).unwrap();
    let mask = BoneMask::new().with_branch("Hips/Spine");
    component.add_layer("Add", 0.0, Some(mask), BlendMode::Additive).unwrap();
    component.assign_animation("Add.Breath", rotating_clip("Breath", 0.5), None, None).unwrap();

    for _ in 0..3 {
        let pose = component.update(0.1).to_vec();
        assert_eq!(pose.as_slice(), expected.update(0.1));
    }

    component.layer_mut("Over").unwrap().set_weight(0.25);
    let pose = component.update(0.1);
    assert_x(pose, SPINE, 1.25);
}

#[test]
fn test_layer_queries() {
    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Idle", constant_clip("Idle", 2.0, 1.0).into_arc(), None, None).unwrap();
    component.update(0.5);

    let layer = component.base_layer().unwrap();
    assert!(layer.is_base());
    assert_eq!(layer.active_state(), Some("Idle"));
    assert_eq!(layer.active_state_duration(), 2.0);
    assert!((layer.active_state_progress() - 0.25).abs() < 1e-6);

    let layer = component.base_layer_mut().unwrap();
    layer.pause();
    component.update(0.5);
    let layer = component.base_layer().unwrap();
    assert!(!layer.playing());
    assert!((layer.active_state_progress() - 0.25).abs() < 1e-6);

    assert!(component.layer("Upper").is_none());
    assert!(component
        .assign_animation("Idle.Child", constant_clip("Child", 1.0, 0.0).into_arc(), None, None)
        .unwrap_err()
        .is_unknown_node());
}
