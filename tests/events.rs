use anim_graph_rs::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

mod common;
use common::*;

fn walk_clip() -> Arc<Clip> {
    constant_clip("walk", 1.0, 1.0)
        .with_event(ClipEvent::new(0.25, "left", "L"))
        .with_event(ClipEvent::new(0.75, "right", "R"))
        .into_arc()
}

fn record(component: &mut AnimComponent) -> Rc<RefCell<Vec<String>>> {
    let names = Rc::new(RefCell::new(Vec::new()));
    let names1 = names.clone();
    component.subscribe(move |e| names1.borrow_mut().push(e.name.clone()));
    names
}

#[test]
fn test_loop_wrap() {
    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Walk", walk_clip(), None, None).unwrap();
    let names = record(&mut component);

    component.update(0.5);
    assert_eq!(*names.borrow(), vec!["left"]);

    component.update(1.0);
    assert_eq!(*names.borrow(), vec!["left", "right", "left"]);
    let events = component.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].payload, "R");
    assert_eq!(events[0].clip, "walk");
    assert_eq!(events[0].layer, "Base");
    assert_eq!(events[0].state, "Walk");
    assert_eq!(events[0].time, 0.75);

    component.update(0.0);
    assert!(component.events().is_empty());

    // Several wraps in one frame fire once per wrap.
    component.update(2.0);
    assert_eq!(component.events().len(), 4);
}

#[test]
fn test_backward_playback() {
    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Walk", walk_clip(), None, Some(-1.0)).unwrap();
    let names = record(&mut component);

    component.update(0.5);
    assert_eq!(*names.borrow(), vec!["right"]);
    component.update(0.5);
    assert_eq!(*names.borrow(), vec!["right", "left"]);
}

#[test]
fn test_subscription_order() {
    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Walk", walk_clip(), None, None).unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let log1 = log.clone();
    let first = component.subscribe(move |e| log1.borrow_mut().push(format!("first:{}", e.name)));
    let log2 = log.clone();
    component.subscribe_named("right", move |e| log2.borrow_mut().push(format!("second:{}", e.name)));

    component.update(1.0);
    assert_eq!(*log.borrow(), vec!["first:left", "first:right", "second:right"]);

    assert!(component.unsubscribe(first));
    assert!(!component.unsubscribe(first));
    component.update(1.0);
    assert_eq!(log.borrow().len(), 4);
    assert_eq!(log.borrow()[3], "second:right");
}

#[test]
fn test_paused_component() {
    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Walk", walk_clip(), None, None).unwrap();
    let names = record(&mut component);

    component.update(0.5);
    component.pause();
    component.update(0.5);
    component.update(0.5);
    assert_eq!(names.borrow().len(), 1);

    component.play();
    component.update(0.5);
    assert_eq!(*names.borrow(), vec!["left", "right"]);
}

#[test]
fn test_weight_threshold() {
    let library = ClipLibrary::new()
        .with_clip(constant_clip("A", 1.0, 0.0).with_event(ClipEvent::new(0.5, "a", "")))
        .with_clip(constant_clip("B", 1.0, 1.0).with_event(ClipEvent::new(0.5, "b", "")));
    let mut tree = BlendTreeNode::one_d(
        "x",
        vec![BlendChild::new("A").with_threshold(0.0), BlendChild::new("B").with_threshold(1.0)],
    );
    assert!(tree.resolve_clips(&library).is_empty());

    let mut component = AnimComponent::new(skeleton());
    let layer = component.add_layer("Base", 1.0, None, BlendMode::Overwrite).unwrap();
    layer.controller_mut().add_state(AnimState::tree("Blend", tree)).unwrap();
    component.set_float("x", 0.75);
    let names = record(&mut component);

    component.update(0.6);
    assert_eq!(*names.borrow(), vec!["a", "b"]);

    component.set_event_threshold(0.5);
    assert_eq!(component.event_threshold(), 0.5);
    component.update(1.0);
    assert_eq!(*names.borrow(), vec!["a", "b", "b"]);
}

#[test]
fn test_zero_weight_layer_fires() {
    let mut component = AnimComponent::new(skeleton());
    component.assign_animation("Idle", constant_clip("Idle", 1.0, 0.0).into_arc(), None, None).unwrap();
    component.add_layer("Upper", 0.0, None, BlendMode::Overwrite).unwrap();
    let wave = constant_clip("Wave", 1.0, 3.0).with_event(ClipEvent::new(0.5, "footstep", "")).into_arc();
    component.assign_animation("Upper.Wave", wave, None, None).unwrap();
    let names = record(&mut component);

    let pose = component.update(0.6);
    assert_x(pose, SPINE, 0.0);
    assert_eq!(*names.borrow(), vec!["footstep"]);

    // A raised threshold gates on the layer weight.
    component.set_event_threshold(0.1);
    component.update(1.0);
    assert_eq!(names.borrow().len(), 1);
}
