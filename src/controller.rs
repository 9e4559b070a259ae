//!
//! Layer state machine.
//!
//! A `LayerController` owns the states and transitions of one layer, advances them every frame
//! and blends the pose of the current state with the poses of the states it is transitioning
//! from.
//!

use crate::base::{AnimError, STATE_END, STATE_START};
use crate::event::AnimEvent;
use crate::event_triggering_job::EventTriggeringJob;
use crate::math::Transform;
use crate::parameter::ParameterStore;
use crate::skeleton::Skeleton;
use crate::state::AnimState;
use crate::transition::{InterruptionSource, Transition, TransitionSource};

#[derive(Debug, Clone)]
struct ResolvedTransition {
    transition: Transition,
    from: Option<usize>,
    to: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveTransition {
    duration: f32,
    elapsed: f32,
    source: InterruptionSource,
}

impl ActiveTransition {
    #[inline]
    fn factor(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }
}

/// A state being transitioned from, `weight` being its share of the outgoing pose.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PreviousState {
    index: usize,
    weight: f32,
}

/// State machine instance of a layer.
///
/// An interrupted transition keeps its outgoing states, weighted by how far it went. Only the
/// most recent of them keeps playing.
#[derive(Debug, Clone)]
pub struct LayerController {
    layer: String,
    states: Vec<AnimState>,
    transitions: Vec<ResolvedTransition>,

    current: usize,
    previous: Vec<PreviousState>,
    active: Option<ActiveTransition>,
    playing: bool,
    started: bool,

    scratch: Vec<Transform>,
    sampled: Vec<Transform>,
}

impl LayerController {
    pub fn new<S: Into<String>>(layer: S) -> LayerController {
        LayerController {
            layer: layer.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            current: 0,
            previous: Vec::new(),
            active: None,
            playing: true,
            started: false,
            scratch: Vec::new(),
            sampled: Vec::new(),
        }
    }

    /// Gets the name of the layer owning the controller.
    #[inline]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Adds a state. Returns its index.
    ///
    /// Until the controller first runs, the current state follows the initial state: `START` if
    /// declared, otherwise the first declared state.
    pub fn add_state(&mut self, state: AnimState) -> Result<usize, AnimError> {
        if self.find_state(state.name()).is_some() {
            return Err(AnimError::DuplicateState {
                layer: self.layer.clone(),
                state: state.name().to_string(),
            });
        }
        self.states.push(state);
        if !self.started {
            self.current = self.initial_state();
        }
        Ok(self.states.len() - 1)
    }

    /// Adds a transition between declared states.
    ///
    /// Transitions are kept sorted by priority, declaration order breaking ties.
    pub fn add_transition(&mut self, transition: Transition) -> Result<(), AnimError> {
        let from = match transition.from() {
            TransitionSource::Any => None,
            TransitionSource::State(name) => Some(self.state_index(name)?),
        };
        let to = self.state_index(transition.to())?;
        self.transitions.push(ResolvedTransition { transition, from, to });
        self.transitions.sort_by_key(|t| t.transition.priority());
        Ok(())
    }

    /// Checks that every marker state can be left. `END` is exempt since it is redirected.
    pub fn validate(&self) -> Vec<AnimError> {
        let mut errors = Vec::new();
        for (idx, state) in self.states.iter().enumerate() {
            if state.is_empty() && state.name() != STATE_END && !self.transitions.iter().any(|t| t.from == Some(idx)) {
                errors.push(AnimError::DeadEndState {
                    layer: self.layer.clone(),
                    state: state.name().to_string(),
                });
            }
        }
        errors
    }

    fn state_index(&self, name: &str) -> Result<usize, AnimError> {
        self.find_state(name).ok_or_else(|| AnimError::UnknownState {
            layer: self.layer.clone(),
            state: name.to_string(),
        })
    }

    fn initial_state(&self) -> usize {
        self.find_state(STATE_START).unwrap_or(0)
    }

    #[inline]
    pub fn find_state(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name() == name)
    }

    #[inline]
    pub fn state(&self, name: &str) -> Option<&AnimState> {
        self.states.iter().find(|s| s.name() == name)
    }

    #[inline]
    pub fn state_mut(&mut self, name: &str) -> Option<&mut AnimState> {
        self.states.iter_mut().find(|s| s.name() == name)
    }

    #[inline]
    pub fn states(&self) -> &[AnimState] {
        &self.states
    }

    #[inline]
    pub fn states_mut(&mut self) -> &mut [AnimState] {
        &mut self.states
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().map(|t| &t.transition)
    }
}

impl LayerController {
    /// Gets the name of the current state.
    pub fn active_state(&self) -> Option<&str> {
        self.states.get(self.current).map(|s| s.name())
    }

    /// Gets the name of the state most recently transitioned from.
    pub fn previous_state(&self) -> Option<&str> {
        self.previous.last().map(|p| self.states[p.index].name())
    }

    /// Gets the states being transitioned from with their share of the outgoing pose, oldest
    /// first.
    pub fn previous_states(&self) -> impl Iterator<Item = (&str, f32)> {
        self.previous.iter().map(|p| (self.states[p.index].name(), p.weight))
    }

    /// Gets the normalized progress of the current state.
    pub fn active_state_progress(&self) -> f32 {
        self.states.get(self.current).map_or(0.0, |s| s.progress())
    }

    /// Gets the duration of the current state, in seconds.
    pub fn active_state_duration(&self) -> f32 {
        self.states.get(self.current).map_or(0.0, |s| s.duration())
    }

    #[inline]
    pub fn transitioning(&self) -> bool {
        self.active.is_some()
    }

    /// Gets the blend factor of the running transition, 1 when not transitioning.
    #[inline]
    pub fn transition_progress(&self) -> f32 {
        self.active.map_or(1.0, |a| a.factor())
    }

    #[inline]
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Resumes playback, first jumping to `state` if given.
    pub fn play(&mut self, state: Option<&str>) -> Result<(), AnimError> {
        if let Some(name) = state {
            let to = self.state_index(name)?;
            self.started = true;
            self.jump(to, 0.0, InterruptionSource::None, 0.0);
        }
        self.playing = true;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Rewinds the controller to its initial state and stops playback.
    pub fn reset(&mut self) {
        self.current = self.initial_state();
        self.previous.clear();
        self.active = None;
        self.playing = false;
        self.started = false;
        for state in self.states.iter_mut() {
            state.reset(0.0);
        }
    }

    /// Starts a transition to `to` over `duration` seconds, regardless of conditions.
    ///
    /// `offset` is the start point of the destination, as a fraction of its duration.
    pub fn force_transition(&mut self, to: &str, duration: f32, offset: Option<f32>) -> Result<(), AnimError> {
        let to = self.state_index(to)?;
        self.started = true;
        self.jump(to, duration, InterruptionSource::None, offset.unwrap_or(0.0));
        Ok(())
    }

    /// Advances the state machine by `dt` seconds.
    ///
    /// The current state and the state most recently transitioned from both advance. Then the
    /// first transition able to fire is taken, among the ones the running transition's
    /// interruption source allows.
    pub fn advance(&mut self, dt: f32, params: &mut ParameterStore) {
        if !self.playing || self.states.is_empty() {
            return;
        }
        self.started = true;

        self.states[self.current].advance(dt, params);
        if let Some(previous) = self.previous.last() {
            self.states[previous.index].advance(dt, params);
        }

        if let Some(idx) = self.find_transition(params) {
            let resolved = &self.transitions[idx];
            resolved.transition.consume_triggers(params);
            let (to, duration, source, offset) = (
                resolved.to,
                resolved.transition.duration(),
                resolved.transition.interruption_source(),
                resolved.transition.offset(),
            );
            self.jump(to, duration, source, offset);
            // Blend weights of the new state for this frame.
            self.states[self.current].advance(0.0, params);
        }

        if let Some(active) = &mut self.active {
            active.elapsed += dt.abs();
            if active.elapsed >= active.duration {
                log::debug!("{}: transition to {} completed", self.layer, self.states[self.current].name());
                self.active = None;
                self.previous.clear();
            }
        }
    }

    /// Source states searched for a transition, in order. `None` stands for `ANY`.
    fn transition_sources(&self) -> Vec<Option<usize>> {
        let current = Some(self.current);
        let previous = self.previous.last().map(|p| p.index);
        let source = match self.active {
            None => return vec![current, None],
            Some(active) => active.source,
        };
        match (source, previous) {
            (InterruptionSource::None, _) => Vec::new(),
            (InterruptionSource::PrevState, Some(_)) => vec![previous, None],
            (InterruptionSource::PrevStateNextState, Some(_)) => vec![previous, current, None],
            (InterruptionSource::NextStatePrevState, Some(_)) => vec![current, previous, None],
            _ => vec![current, None],
        }
    }

    fn find_transition(&self, params: &ParameterStore) -> Option<usize> {
        for source in self.transition_sources() {
            // Exit times of ANY transitions follow the current state.
            let progress = self.states[source.unwrap_or(self.current)].progress_window();
            for (idx, resolved) in self.transitions.iter().enumerate() {
                if resolved.from != source || self.redirect_end(resolved.to) == self.current {
                    continue;
                }
                if resolved.transition.can_fire(params, &progress) {
                    return Some(idx);
                }
            }
        }
        None
    }

    /// Maps `END` onto the target of the first `START` transition, or the initial state.
    fn redirect_end(&self, to: usize) -> usize {
        let state = &self.states[to];
        if !state.is_empty() || state.name() != STATE_END {
            return to;
        }
        match self.find_state(STATE_START) {
            Some(start) => self
                .transitions
                .iter()
                .find(|t| t.from == Some(start))
                .map_or(to, |t| t.to),
            None => self.initial_state(),
        }
    }

    fn jump(&mut self, to: usize, duration: f32, source: InterruptionSource, offset: f32) {
        let to = self.redirect_end(to);
        if to == self.current {
            log::trace!("{}: ignored transition to current state {}", self.layer, self.states[to].name());
            return;
        }

        let from = self.current;
        log::debug!(
            "{}: {} => {} over {}s",
            self.layer,
            self.states[from].name(),
            self.states[to].name(),
            duration
        );

        self.states[to].reset(offset);
        if self.states[from].is_empty() || duration <= 0.0 {
            self.previous.clear();
            self.active = None;
        } else {
            match self.active {
                Some(active) => {
                    let factor = active.factor();
                    for previous in self.previous.iter_mut() {
                        previous.weight *= 1.0 - factor;
                    }
                    self.previous.push(PreviousState { index: from, weight: factor });
                }
                None => {
                    self.previous.clear();
                    self.previous.push(PreviousState { index: from, weight: 1.0 });
                }
            }
            // The destination restarts, it cannot also be sampled as an outgoing state.
            self.previous.retain(|p| p.index != to);
            let total: f32 = self.previous.iter().map(|p| p.weight).sum();
            if total > 0.0 {
                self.previous.iter_mut().for_each(|p| p.weight /= total);
            }
            self.active = Some(ActiveTransition {
                duration,
                elapsed: 0.0,
                source,
            });
        }
        self.current = to;
    }

    /// Samples the layer pose into `output`.
    ///
    /// Returns the coverage of the pose in `[0, 1]`: the share of the layer actually produced by
    /// clips. A state without contributing clip only covers its side of a transition.
    pub fn evaluate(&mut self, skeleton: &Skeleton, output: &mut [Transform]) -> f32 {
        if self.states.is_empty() {
            return 0.0;
        }
        let num_joints = skeleton.num_joints();
        let LayerController {
            states,
            scratch,
            sampled,
            current,
            previous,
            active,
            ..
        } = self;

        let factor = match active {
            Some(active) if !previous.is_empty() => active.factor(),
            _ => return states[*current].sample(skeleton, scratch, output),
        };

        sampled.resize(num_joints, Transform::IDENTITY);
        let mut total = 0.0;
        let mut mix = |share: f32, sampled: &[Transform], output: &mut [Transform]| {
            if share <= 0.0 {
                return;
            }
            total += share;
            if total == share {
                output[..num_joints].copy_from_slice(&sampled[..num_joints]);
            } else {
                let t = share / total;
                for (out, input) in output.iter_mut().zip(sampled.iter()).take(num_joints) {
                    *out = out.lerp(input, t);
                }
            }
        };

        for entry in previous.iter() {
            let coverage = states[entry.index].sample(skeleton, scratch, sampled);
            mix((1.0 - factor) * entry.weight * coverage, sampled, output);
        }
        let coverage = states[*current].sample(skeleton, scratch, sampled);
        mix(factor * coverage, sampled, output);
        total
    }

    /// Collects the event markers crossed by the last advance.
    ///
    /// Every clip with a positive blend weight fires its markers. Once `threshold` is raised
    /// above 0, a clip fires only if its share of the layer, `weight` included, is above it.
    pub fn collect_events(&self, weight: f32, threshold: f32, events: &mut Vec<AnimEvent>) {
        if !self.playing || self.states.is_empty() {
            return;
        }
        let factor = self.transition_progress();
        match self.previous.last() {
            Some(previous) if self.active.is_some() => {
                self.collect_state_events(self.current, weight * factor, threshold, events);
                let share = weight * (1.0 - factor) * previous.weight;
                self.collect_state_events(previous.index, share, threshold, events);
            }
            _ => self.collect_state_events(self.current, weight, threshold, events),
        }
    }

    fn collect_state_events(&self, idx: usize, share: f32, threshold: f32, events: &mut Vec<AnimEvent>) {
        let state = &self.states[idx];
        let mut job = EventTriggeringJob::default();
        state.for_each_slot(|slot, slot_weight| {
            let gate = if threshold > 0.0 { share * slot_weight } else { slot_weight };
            let clip = match slot.clip() {
                Some(clip) if gate > threshold => clip,
                _ => return,
            };
            let (from, to) = slot.window();
            job.set_clip(clip.clone());
            job.set_from(from);
            job.set_to(to);
            if let Ok(iter) = job.run() {
                for triggered in iter {
                    events.push(AnimEvent {
                        name: triggered.event.name.clone(),
                        payload: triggered.event.payload.clone(),
                        clip: clip.name().to_string(),
                        layer: self.layer.clone(),
                        state: state.name().to_string(),
                        time: triggered.event.time,
                    });
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::clip::{Clip, ClipEvent, ClipLibrary, JointTrack};
    use crate::parameter::ParamValue;
    use crate::track::Track;
    use crate::transition::{Condition, ConditionOp};

    fn library() -> ClipLibrary {
        ClipLibrary::new()
            .with_clip(
                Clip::new("Idle", 1.0)
                    .with_track(JointTrack::new("root").with_translations(Track::constant(Vec3::ZERO)))
                    .with_event(ClipEvent::new(0.5, "breath", "")),
            )
            .with_clip(
                Clip::new("Walk", 1.0)
                    .with_track(JointTrack::new("root").with_translations(Track::constant(Vec3::new(2.0, 0.0, 0.0)))),
            )
    }

    fn new_controller() -> LayerController {
        let library = library();
        let mut controller = LayerController::new("Base");
        for mut state in [
            AnimState::empty("START"),
            AnimState::single("Idle", "Idle"),
            AnimState::single("Walk", "Walk"),
            AnimState::empty("END"),
        ] {
            state.resolve_clips(&library);
            controller.add_state(state).unwrap();
        }
        controller.add_transition(Transition::new("START", "Idle")).unwrap();
        controller
            .add_transition(
                Transition::new("Idle", "Walk")
                    .with_condition(Condition::new("speed", ConditionOp::GreaterThan, 0.5))
                    .with_duration(0.5),
            )
            .unwrap();
        controller
            .add_transition(
                Transition::new("Walk", "Idle")
                    .with_condition(Condition::new("speed", ConditionOp::LessThanEqualTo, 0.5))
                    .with_duration(0.5),
            )
            .unwrap();
        controller
    }

    fn new_params() -> ParameterStore {
        let mut params = ParameterStore::new();
        params.declare("speed", ParamValue::Float(0.0));
        params
    }

    #[test]
    fn test_build_errors() {
        let mut controller = new_controller();
        assert!(controller.add_state(AnimState::single("Idle", "Idle")).unwrap_err().is_duplicate_state());
        assert!(controller.add_transition(Transition::new("Idle", "Run")).unwrap_err().is_unknown_state());
        assert!(controller.add_transition(Transition::new("Fly", "Idle")).unwrap_err().is_unknown_state());
        assert!(controller.validate().is_empty());

        let mut dead = LayerController::new("Upper");
        dead.add_state(AnimState::empty("START")).unwrap();
        dead.add_state(AnimState::single("Wave", "Wave")).unwrap();
        let errors = dead.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_dead_end_state());
    }

    #[test]
    fn test_start_fires_immediately() {
        let mut controller = new_controller();
        let mut params = new_params();
        assert_eq!(controller.active_state(), Some("START"));
        controller.advance(0.0, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
        assert!(!controller.transitioning());
    }

    #[test]
    fn test_initial_without_start() {
        let mut controller = LayerController::new("Base");
        controller.add_state(AnimState::single("Idle", "Idle")).unwrap();
        controller.add_state(AnimState::single("Walk", "Walk")).unwrap();
        assert_eq!(controller.active_state(), Some("Idle"));
    }

    #[test]
    fn test_transition_blend() {
        let skeleton = Skeleton::from_paths(&["root"]).unwrap();
        let mut controller = new_controller();
        let mut params = new_params();
        let mut output = vec![Transform::IDENTITY; 1];
        controller.advance(0.1, &mut params);

        params.set_float("speed", 1.0);
        controller.advance(0.25, &mut params);
        assert_eq!(controller.active_state(), Some("Walk"));
        assert_eq!(controller.previous_state(), Some("Idle"));
        assert!(controller.transitioning());
        assert!((controller.transition_progress() - 0.5).abs() < 1e-6);

        assert_eq!(controller.evaluate(&skeleton, &mut output), 1.0);
        assert!(output[0].translation.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));

        controller.advance(0.25, &mut params);
        assert!(!controller.transitioning());
        assert_eq!(controller.previous_state(), None);
        controller.evaluate(&skeleton, &mut output);
        assert_eq!(output[0].translation, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_not_interruptible() {
        let mut controller = new_controller();
        let mut params = new_params();
        controller.advance(0.1, &mut params);
        params.set_float("speed", 1.0);
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("Walk"));

        params.set_float("speed", 0.0);
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("Walk"));
        controller.advance(0.4, &mut params);
        assert!(!controller.transitioning());
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
    }

    #[test]
    fn test_interruptible() {
        let mut controller = new_controller();
        controller
            .add_transition(
                Transition::new("ANY", "Idle")
                    .with_condition(Condition::new("speed", ConditionOp::LessThan, 0.0))
                    .with_duration(0.2),
            )
            .unwrap();
        controller.transitions.iter_mut().for_each(|t| {
            t.transition = t.transition.clone().with_interruptible(true);
        });

        let mut params = new_params();
        controller.advance(0.1, &mut params);
        params.set_float("speed", 1.0);
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("Walk"));

        params.set_float("speed", -1.0);
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
        assert_eq!(controller.previous_state(), Some("Walk"));
    }

    #[test]
    fn test_priority() {
        let library = library();
        let mut controller = LayerController::new("Base");
        for name in ["Idle", "Walk", "Run"] {
            let mut state = AnimState::single(name, "Idle");
            state.resolve_clips(&library);
            controller.add_state(state).unwrap();
        }
        controller.add_transition(Transition::new("Idle", "Walk").with_priority(2)).unwrap();
        controller.add_transition(Transition::new("Idle", "Run").with_priority(1)).unwrap();

        let mut params = new_params();
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("Run"));
    }

    #[test]
    fn test_exit_time() {
        let mut controller = new_controller();
        controller.add_transition(Transition::new("Idle", "END").with_exit_time(0.8)).unwrap();
        let mut params = new_params();
        controller.advance(0.0, &mut params);
        controller.advance(0.5, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
        assert!((controller.active_state_progress() - 0.5).abs() < 1e-6);

        // END is redirected to the START target, the current state, so nothing fires
        controller.advance(0.5, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
    }

    #[test]
    fn test_end_redirect() {
        let mut controller = new_controller();
        controller.add_transition(Transition::new("Walk", "END").with_exit_time(1.0)).unwrap();
        let mut params = new_params();
        params.set_float("speed", 1.0);
        controller.force_transition("Walk", 0.0, None).unwrap();
        assert_eq!(controller.active_state(), Some("Walk"));
        controller.advance(1.0, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
    }

    #[test]
    fn test_trigger_consumed() {
        let mut controller = new_controller();
        controller
            .add_transition(Transition::new("Idle", "Walk").with_condition(Condition::is_set("go")).with_priority(-1))
            .unwrap();
        controller
            .add_transition(Transition::new("Walk", "Idle").with_condition(Condition::is_set("go")).with_priority(-1))
            .unwrap();

        let mut params = new_params();
        params.set_float("speed", 1.0);
        controller.advance(0.0, &mut params);
        params.set_trigger("go");
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("Walk"));
        assert_eq!(params.get_boolean("go"), Some(false));
        controller.advance(0.6, &mut params);
        assert_eq!(controller.active_state(), Some("Walk"));
    }

    #[test]
    fn test_force_and_offset() {
        let mut controller = new_controller();
        assert!(controller.force_transition("Run", 0.1, None).unwrap_err().is_unknown_state());
        controller.force_transition("Walk", 0.0, Some(0.5)).unwrap();
        assert_eq!(controller.active_state(), Some("Walk"));
        assert!(!controller.transitioning());
        assert!((controller.active_state_progress() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_play_pause_reset() {
        let mut controller = new_controller();
        let mut params = new_params();
        params.set_float("speed", 1.0);
        controller.pause();
        controller.advance(0.1, &mut params);
        assert_eq!(controller.active_state(), Some("START"));

        controller.play(Some("Walk")).unwrap();
        assert!(controller.playing());
        controller.advance(0.25, &mut params);
        assert!((controller.active_state_progress() - 0.25).abs() < 1e-6);

        controller.reset();
        assert!(!controller.playing());
        assert_eq!(controller.active_state(), Some("START"));
    }

    #[test]
    fn test_events() {
        let mut controller = new_controller();
        let mut params = new_params();
        let mut events = Vec::new();
        controller.advance(0.0, &mut params);
        controller.advance(0.4, &mut params);
        controller.collect_events(1.0, 0.0, &mut events);
        assert!(events.is_empty());

        controller.advance(0.2, &mut params);
        controller.collect_events(1.0, 0.0, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "breath");
        assert_eq!(events[0].clip, "Idle");
        assert_eq!(events[0].state, "Idle");

        // Layer weight does not gate markers unless a threshold is set.
        events.clear();
        controller.advance(1.0, &mut params);
        controller.collect_events(0.0, 0.0, &mut events);
        assert_eq!(events.len(), 1);

        events.clear();
        controller.advance(1.0, &mut params);
        controller.collect_events(0.25, 0.5, &mut events);
        assert!(events.is_empty());
        controller.advance(1.0, &mut params);
        controller.collect_events(1.0, 0.5, &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_exit_time_each_loop() {
        let mut controller = new_controller();
        controller
            .add_transition(Transition::new("Idle", "Walk").with_exit_time(0.75).with_condition(Condition::is_set("go")))
            .unwrap();
        let mut params = new_params();
        params.set_boolean("go", false);
        controller.advance(0.0, &mut params);
        controller.advance(1.25, &mut params);

        // Past the exit point of the second loop, the condition alone does not fire.
        params.set_boolean("go", true);
        controller.advance(0.125, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
        controller.advance(0.25, &mut params);
        assert_eq!(controller.active_state(), Some("Idle"));
        controller.advance(0.25, &mut params);
        assert_eq!(controller.active_state(), Some("Walk"));
    }

    fn interruption_controller(source: InterruptionSource) -> LayerController {
        let clip = |name: &str, x: f32| {
            Clip::new(name, 1.0).with_track(JointTrack::new("root").with_translations(Track::constant(Vec3::new(x, 0.0, 0.0))))
        };
        let library = ClipLibrary::new()
            .with_clip(clip("A", 0.0))
            .with_clip(clip("B", 4.0))
            .with_clip(clip("C", 2.0))
            .with_clip(clip("D", 8.0));

        let mut controller = LayerController::new("Base");
        for name in ["A", "B", "C", "D"] {
            let mut state = AnimState::single(name, name);
            state.resolve_clips(&library);
            controller.add_state(state).unwrap();
        }
        for transition in [
            Transition::new("A", "B")
                .with_condition(Condition::is_set("to_b"))
                .with_duration(1.0)
                .with_interruption_source(source),
            Transition::new("A", "C").with_condition(Condition::is_set("to_c")).with_duration(1.0),
            Transition::new("B", "D").with_condition(Condition::is_set("to_d")).with_duration(1.0),
            Transition::new("ANY", "C").with_condition(Condition::is_set("any")),
        ] {
            controller.add_transition(transition).unwrap();
        }
        controller
    }

    fn interrupt(source: InterruptionSource, set: &[&str]) -> LayerController {
        let mut controller = interruption_controller(source);
        let mut params = ParameterStore::new();
        for name in ["to_b", "to_c", "to_d", "any"] {
            params.set_boolean(name, false);
        }
        params.set_boolean("to_b", true);
        controller.advance(0.25, &mut params);
        assert_eq!(controller.active_state(), Some("B"));
        assert!(controller.transitioning());

        params.set_boolean("to_b", false);
        for name in set {
            params.set_boolean(name, true);
        }
        controller.advance(0.25, &mut params);
        controller
    }

    #[test]
    fn test_interruption_none() {
        let controller = interrupt(InterruptionSource::None, &["to_c", "to_d", "any"]);
        assert_eq!(controller.active_state(), Some("B"));
        assert_eq!(controller.previous_state(), Some("A"));
    }

    #[test]
    fn test_interruption_prev() {
        let controller = interrupt(InterruptionSource::PrevState, &["to_c", "to_d"]);
        assert_eq!(controller.active_state(), Some("C"));
        assert_eq!(controller.previous_state(), Some("B"));
        let controller = interrupt(InterruptionSource::PrevState, &["to_d"]);
        assert_eq!(controller.active_state(), Some("B"));
        let controller = interrupt(InterruptionSource::PrevState, &["any"]);
        assert_eq!(controller.active_state(), Some("C"));
    }

    #[test]
    fn test_interruption_next() {
        let controller = interrupt(InterruptionSource::NextState, &["to_c", "to_d"]);
        assert_eq!(controller.active_state(), Some("D"));
        let controller = interrupt(InterruptionSource::NextState, &["to_c"]);
        assert_eq!(controller.active_state(), Some("B"));
    }

    #[test]
    fn test_interruption_ordered() {
        let controller = interrupt(InterruptionSource::PrevStateNextState, &["to_c", "to_d"]);
        assert_eq!(controller.active_state(), Some("C"));
        let controller = interrupt(InterruptionSource::PrevStateNextState, &["to_d"]);
        assert_eq!(controller.active_state(), Some("D"));
        let controller = interrupt(InterruptionSource::NextStatePrevState, &["to_c", "to_d"]);
        assert_eq!(controller.active_state(), Some("D"));
        let controller = interrupt(InterruptionSource::NextStatePrevState, &["to_c"]);
        assert_eq!(controller.active_state(), Some("C"));
    }

    #[test]
    fn test_interrupted_blend() {
        let skeleton = Skeleton::from_paths(&["root"]).unwrap();
        let mut controller = interrupt(InterruptionSource::NextState, &["to_d"]);
        assert_eq!(controller.active_state(), Some("D"));
        let previous: Vec<_> = controller.previous_states().collect();
        assert_eq!(previous, vec![("A", 0.75), ("B", 0.25)]);
        assert!((controller.transition_progress() - 0.25).abs() < 1e-6);

        // A 0.5625, B 0.1875, D 0.25
        let mut output = vec![Transform::IDENTITY; 1];
        assert!((controller.evaluate(&skeleton, &mut output) - 1.0).abs() < 1e-6);
        assert!((output[0].translation.x - 2.75).abs() < 1e-5);

        let mut params = ParameterStore::new();
        controller.advance(0.75, &mut params);
        assert!(!controller.transitioning());
        assert_eq!(controller.previous_states().count(), 0);
        controller.evaluate(&skeleton, &mut output);
        assert_eq!(output[0].translation.x, 8.0);
    }
}
