//!
//! Animation component: the layers, parameters and event subscribers of one animated skeleton.
//!
//! `AnimComponent::update` runs the whole frame. Controllers advance, layer poses are sampled and
//! composed into the output pose, crossed event markers are dispatched and triggers are cleared.
//!

use std::sync::Arc;

use crate::base::{split_path, AnimError};
use crate::blending_job::{BlendMode, BlendingJob};
use crate::clip::{Clip, ClipProvider};
use crate::event::{AnimEvent, EventDispatcher, EventHandle};
use crate::graph::{AnimGraphDoc, LoadReport};
use crate::layer::Layer;
use crate::mask::BoneMask;
use crate::math::Transform;
use crate::parameter::{ParamValue, ParameterStore};
use crate::skeleton::Skeleton;

/// Name of the layer created when a clip is assigned to a component without layer.
pub const DEFAULT_LAYER: &str = "Base";

#[derive(Debug)]
pub struct AnimComponent {
    skeleton: Arc<Skeleton>,
    layers: Vec<Layer>,
    parameters: ParameterStore,
    default_parameters: ParameterStore,
    dispatcher: EventDispatcher,
    speed: f32,
    playing: bool,

    pose: Vec<Transform>,
    events: Vec<AnimEvent>,
}

impl AnimComponent {
    /// Creates a component without layer. The output pose is the skeleton rest pose.
    pub fn new(skeleton: Arc<Skeleton>) -> AnimComponent {
        let pose = skeleton.joint_rest_poses().to_vec();
        AnimComponent {
            skeleton,
            layers: Vec::new(),
            parameters: ParameterStore::new(),
            default_parameters: ParameterStore::new(),
            dispatcher: EventDispatcher::new(),
            speed: 1.0,
            playing: true,
            pose,
            events: Vec::new(),
        }
    }

    /// Creates a component running `graph`.
    pub fn from_graph(
        skeleton: Arc<Skeleton>,
        graph: &AnimGraphDoc,
        provider: &dyn ClipProvider,
    ) -> (AnimComponent, LoadReport) {
        let mut component = AnimComponent::new(skeleton);
        let report = component.load_graph(graph, provider);
        (component, report)
    }

    /// Replaces the layers and parameters of the component with the ones of `graph`.
    ///
    /// Subscribers are kept.
    pub fn load_graph(&mut self, graph: &AnimGraphDoc, provider: &dyn ClipProvider) -> LoadReport {
        let loaded = graph.load(&self.skeleton, provider);
        self.layers = loaded.layers;
        self.default_parameters = loaded.parameters.clone();
        self.parameters = loaded.parameters;
        log::debug!(
            "loaded graph: {} layers, {} parameters, {} errors",
            self.layers.len(),
            self.parameters.len(),
            loaded.report.errors.len()
        );
        loaded.report
    }

    #[inline]
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// Appends a layer. The first layer of the component is its base layer.
    pub fn add_layer<S: Into<String>>(
        &mut self,
        name: S,
        weight: f32,
        mask: Option<BoneMask>,
        blend_mode: BlendMode,
    ) -> Result<&mut Layer, AnimError> {
        let name = name.into();
        if self.layer(&name).is_some() {
            log::warn!("duplicate layer {}", name);
            return Err(AnimError::DuplicateLayer(name));
        }
        let mut layer = Layer::new(name).with_weight(weight).with_blend_mode(blend_mode);
        if let Some(mask) = mask {
            layer = layer.with_mask(mask);
        }
        if self.layers.is_empty() {
            layer.set_base();
        }
        if !self.playing {
            layer.pause();
        }
        self.layers.push(layer);
        let idx = self.layers.len() - 1;
        Ok(&mut self.layers[idx])
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name() == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name() == name)
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    #[inline]
    pub fn base_layer(&self) -> Option<&Layer> {
        self.layers.first()
    }

    #[inline]
    pub fn base_layer_mut(&mut self) -> Option<&mut Layer> {
        self.layers.first_mut()
    }

    #[inline]
    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    #[inline]
    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.parameters
    }

    #[inline]
    pub fn set_parameter(&mut self, name: &str, value: ParamValue) {
        self.parameters.set(name, value);
    }

    #[inline]
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.parameters.set_float(name, value);
    }

    #[inline]
    pub fn set_integer(&mut self, name: &str, value: i32) {
        self.parameters.set_integer(name, value);
    }

    #[inline]
    pub fn set_boolean(&mut self, name: &str, value: bool) {
        self.parameters.set_boolean(name, value);
    }

    #[inline]
    pub fn set_trigger(&mut self, name: &str) {
        self.parameters.set_trigger(name);
    }

    #[inline]
    pub fn reset_trigger(&mut self, name: &str) {
        self.parameters.reset_trigger(name);
    }

    #[inline]
    pub fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        self.parameters.get(name)
    }

    #[inline]
    pub fn get_float(&self, name: &str) -> Option<f32> {
        self.parameters.get_float(name)
    }

    #[inline]
    pub fn get_integer(&self, name: &str) -> Option<i32> {
        self.parameters.get_integer(name)
    }

    #[inline]
    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        self.parameters.get_boolean(name)
    }

    /// Binds `clip` to the node at `path`: `State`, `State.Child`, `Layer.State` or
    /// `Layer.State.Child`.
    ///
    /// Paths not starting with a layer name address the base layer, created if the component has
    /// no layer. A given `mask` replaces the mask of the addressed layer.
    pub fn assign_animation(
        &mut self,
        path: &str,
        clip: Arc<Clip>,
        mask: Option<BoneMask>,
        speed: Option<f32>,
    ) -> Result<(), AnimError> {
        if self.layers.is_empty() {
            self.add_layer(DEFAULT_LAYER, 1.0, None, BlendMode::Overwrite)?;
        }

        let segments = split_path(path);
        let (idx, node_path) = match segments.split_first() {
            Some((first, rest)) if !rest.is_empty() => match self.layers.iter().position(|l| l.name() == *first) {
                Some(idx) => (idx, rest.join(".")),
                None => (0, path.to_string()),
            },
            _ => (0, path.to_string()),
        };

        let layer = &mut self.layers[idx];
        if let Some(mask) = mask {
            layer.set_mask(Some(mask));
        }
        if let Err(err) = layer.assign_animation(&node_path, clip, speed) {
            log::warn!("assign animation {}: {}", path, err);
            return Err(err);
        }
        Ok(())
    }

    /// Unbinds every clip of `state`, a state name optionally prefixed by a layer name.
    pub fn remove_state_animations(&mut self, state: &str) -> Result<(), AnimError> {
        let (idx, state_name) = self.address(state)?;
        let res = self.layers[idx].remove_state_animations(state_name);
        if let Err(err) = &res {
            log::warn!("remove state animations {}: {}", state, err);
        }
        res
    }

    /// Transitions the base layer to `state` over `duration` seconds, regardless of conditions.
    pub fn transition(&mut self, state: &str, duration: f32, offset: Option<f32>) -> Result<(), AnimError> {
        let layer = self
            .layers
            .first_mut()
            .ok_or_else(|| AnimError::UnknownLayer(DEFAULT_LAYER.to_string()))?;
        let res = layer.transition(state, duration, offset);
        if let Err(err) = &res {
            log::warn!("transition to {}: {}", state, err);
        }
        res
    }

    fn address<'p>(&self, path: &'p str) -> Result<(usize, &'p str), AnimError> {
        if self.layers.is_empty() {
            return Err(AnimError::UnknownLayer(DEFAULT_LAYER.to_string()));
        }
        if let Some((layer, state)) = path.split_once('.') {
            if let Some(idx) = self.layers.iter().position(|l| l.name() == layer) {
                return Ok((idx, state));
            }
        }
        Ok((0, path))
    }

    #[inline]
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Resumes playback of the component and of every layer.
    pub fn play(&mut self) {
        self.playing = true;
        for layer in self.layers.iter_mut() {
            // Layers only fail to play an unknown state.
            let _ = layer.play(None);
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Restores the default parameters and rewinds every layer to its initial state.
    pub fn reset(&mut self) {
        self.parameters = self.default_parameters.clone();
        for layer in self.layers.iter_mut() {
            layer.reset();
            if self.playing {
                let _ = layer.play(None);
            }
        }
        self.pose.clear();
        self.pose.extend_from_slice(self.skeleton.joint_rest_poses());
        self.events.clear();
    }

    /// Gets playback speed of `AnimComponent`.
    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Sets playback speed of `AnimComponent`, multiplying every update delta time.
    #[inline]
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn subscribe<F>(&mut self, callback: F) -> EventHandle
    where
        F: FnMut(&AnimEvent) + 'static,
    {
        self.dispatcher.subscribe(callback)
    }

    pub fn subscribe_named<S, F>(&mut self, name: S, callback: F) -> EventHandle
    where
        S: Into<String>,
        F: FnMut(&AnimEvent) + 'static,
    {
        self.dispatcher.subscribe_named(name, callback)
    }

    pub fn unsubscribe(&mut self, handle: EventHandle) -> bool {
        self.dispatcher.unsubscribe(handle)
    }

    #[inline]
    pub fn event_threshold(&self) -> f32 {
        self.dispatcher.threshold()
    }

    #[inline]
    pub fn set_event_threshold(&mut self, threshold: f32) {
        self.dispatcher.set_threshold(threshold);
    }

    /// Gets the events fired by the last update.
    #[inline]
    pub fn events(&self) -> &[AnimEvent] {
        &self.events
    }

    /// Gets the output pose of the last update, local transforms ordered like skeleton joints.
    #[inline]
    pub fn pose(&self) -> &[Transform] {
        &self.pose
    }

    /// Runs one frame of `dt` seconds and returns the output pose.
    pub fn update(&mut self, dt: f32) -> &[Transform] {
        self.pose.resize(self.skeleton.num_joints(), Transform::IDENTITY);
        self.events.clear();

        if self.playing {
            let dt = dt * self.speed;
            for layer in self.layers.iter_mut() {
                layer.controller_mut().advance(dt, &mut self.parameters);
            }
        }

        for layer in self.layers.iter_mut() {
            layer.resolve_mask(&self.skeleton);
            layer.evaluate(&self.skeleton);
        }

        let mut job = BlendingJob::default();
        job.layers_mut().extend(self.layers.iter().map(|l| l.blending_layer()));
        if let Err(err) = job.run(&self.skeleton, &mut self.pose) {
            log::error!("pose composition failed: {}", err);
        }

        if self.playing {
            let threshold = self.dispatcher.threshold();
            for layer in &self.layers {
                layer.controller().collect_events(layer.effective_weight(), threshold, &mut self.events);
            }
            self.dispatcher.dispatch(&self.events);
        }

        self.parameters.clear_triggers();
        &self.pose
    }
}
