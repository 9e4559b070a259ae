//!
//! Transitions between the states of a layer.
//!

use crate::base::STATE_ANY;
use crate::parameter::{ParamKind, ParameterStore};
use crate::state::ProgressWindow;

/// Comparison applied by a `Condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ConditionOp {
    GreaterThan,
    LessThan,
    GreaterThanEqualTo,
    LessThanEqualTo,
    EqualTo,
    NotEqualTo,
    IsSet,
    IsClear,
}

/// Compares a parameter against a constant.
///
/// Values are compared as numbers, booleans being 0.0 or 1.0. `IsSet` and `IsClear` ignore
/// `value`. Conditions on unknown parameters never hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub parameter: String,
    pub op: ConditionOp,
    pub value: f32,
}

impl Condition {
    pub fn new<S: Into<String>>(parameter: S, op: ConditionOp, value: f32) -> Condition {
        Condition {
            parameter: parameter.into(),
            op,
            value,
        }
    }

    pub fn is_set<S: Into<String>>(parameter: S) -> Condition {
        Condition::new(parameter, ConditionOp::IsSet, 0.0)
    }

    pub fn is_clear<S: Into<String>>(parameter: S) -> Condition {
        Condition::new(parameter, ConditionOp::IsClear, 0.0)
    }

    pub fn evaluate(&self, params: &ParameterStore) -> bool {
        let value = match params.get(&self.parameter) {
            Some(value) => value,
            None => return false,
        };
        let lhs = value.as_f32();
        match self.op {
            ConditionOp::GreaterThan => lhs > self.value,
            ConditionOp::LessThan => lhs < self.value,
            ConditionOp::GreaterThanEqualTo => lhs >= self.value,
            ConditionOp::LessThanEqualTo => lhs <= self.value,
            ConditionOp::EqualTo => lhs == self.value,
            ConditionOp::NotEqualTo => lhs != self.value,
            ConditionOp::IsSet => value.as_bool(),
            ConditionOp::IsClear => !value.as_bool(),
        }
    }
}

/// Source of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionSource {
    State(String),
    /// Any state of the layer.
    Any,
}

impl TransitionSource {
    /// Parses a source name, `ANY` standing for any state.
    pub fn from_name(name: &str) -> TransitionSource {
        if name == STATE_ANY {
            TransitionSource::Any
        } else {
            TransitionSource::State(name.to_string())
        }
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, TransitionSource::Any)
    }
}

/// States whose transitions may interrupt a running transition.
///
/// `Prev` is the state being transitioned from, `Next` the destination. Except with `None`,
/// transitions from `ANY` are evaluated after the listed states.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum InterruptionSource {
    #[default]
    None,
    PrevState,
    NextState,
    PrevStateNextState,
    NextStatePrevState,
}

impl InterruptionSource {
    /// Maps the plain interruptible flag: an interruptible transition yields to its destination.
    pub fn from_interruptible(interruptible: bool) -> InterruptionSource {
        if interruptible {
            InterruptionSource::NextState
        } else {
            InterruptionSource::None
        }
    }
}

/// Edge of a layer state machine.
///
/// A transition fires when all its conditions hold and, if it has an exit time, the last advance
/// of the source state reached it. The destination then blends in over `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    from: TransitionSource,
    to: String,
    conditions: Vec<Condition>,
    exit_time: Option<f32>,
    duration: f32,
    interruption_source: InterruptionSource,
    priority: i32,
    offset: f32,
}

impl Transition {
    pub fn new<S: Into<String>>(from: &str, to: S) -> Transition {
        Transition {
            from: TransitionSource::from_name(from),
            to: to.into(),
            conditions: Vec::new(),
            exit_time: None,
            duration: 0.0,
            interruption_source: InterruptionSource::None,
            priority: 0,
            offset: 0.0,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Transition {
        self.conditions.push(condition);
        self
    }

    pub fn with_exit_time(mut self, exit_time: f32) -> Transition {
        self.exit_time = Some(exit_time);
        self
    }

    /// Sets the blend duration, in seconds.
    pub fn with_duration(mut self, duration: f32) -> Transition {
        self.duration = duration;
        self
    }

    pub fn with_interruptible(mut self, interruptible: bool) -> Transition {
        self.interruption_source = InterruptionSource::from_interruptible(interruptible);
        self
    }

    pub fn with_interruption_source(mut self, source: InterruptionSource) -> Transition {
        self.interruption_source = source;
        self
    }

    /// Sets the priority. Lower values are evaluated first.
    pub fn with_priority(mut self, priority: i32) -> Transition {
        self.priority = priority;
        self
    }

    /// Sets the start point of the destination, as a fraction of its duration.
    pub fn with_offset(mut self, offset: f32) -> Transition {
        self.offset = offset;
        self
    }

    #[inline]
    pub fn from(&self) -> &TransitionSource {
        &self.from
    }

    #[inline]
    pub fn to(&self) -> &str {
        &self.to
    }

    #[inline]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[inline]
    pub fn exit_time(&self) -> Option<f32> {
        self.exit_time
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn interruptible(&self) -> bool {
        self.interruption_source != InterruptionSource::None
    }

    #[inline]
    pub fn interruption_source(&self) -> InterruptionSource {
        self.interruption_source
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Whether the transition may fire, `progress` being the last advance of the source.
    pub fn can_fire(&self, params: &ParameterStore, progress: &ProgressWindow) -> bool {
        if let Some(exit_time) = self.exit_time {
            if !progress.reached(exit_time) {
                return false;
            }
        }
        self.conditions.iter().all(|c| c.evaluate(params))
    }

    /// Clears the triggers read by the conditions.
    pub fn consume_triggers(&self, params: &mut ParameterStore) {
        for condition in &self.conditions {
            if params.kind(&condition.parameter) == Some(ParamKind::Trigger) {
                params.consume_trigger(&condition.parameter);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions() {
        let mut params = ParameterStore::new();
        params.set_float("speed", 0.5);
        params.set_integer("ammo", 3);
        params.set_boolean("grounded", true);

        assert!(Condition::new("speed", ConditionOp::GreaterThan, 0.1).evaluate(&params));
        assert!(!Condition::new("speed", ConditionOp::LessThan, 0.5).evaluate(&params));
        assert!(Condition::new("speed", ConditionOp::LessThanEqualTo, 0.5).evaluate(&params));
        assert!(Condition::new("ammo", ConditionOp::GreaterThanEqualTo, 3.0).evaluate(&params));
        assert!(Condition::new("ammo", ConditionOp::NotEqualTo, 0.0).evaluate(&params));
        assert!(Condition::new("grounded", ConditionOp::EqualTo, 1.0).evaluate(&params));
        assert!(Condition::is_set("grounded").evaluate(&params));
        assert!(!Condition::is_clear("grounded").evaluate(&params));

        assert!(!Condition::is_clear("missing").evaluate(&params));
        assert!(!Condition::new("missing", ConditionOp::NotEqualTo, 1.0).evaluate(&params));
    }

    fn window(before: f32, after: f32, looping: bool) -> ProgressWindow {
        ProgressWindow { before, after, looping }
    }

    #[test]
    fn test_can_fire() {
        let mut params = ParameterStore::new();
        params.set_float("speed", 1.0);
        let transition = Transition::new("Idle", "Walk")
            .with_condition(Condition::new("speed", ConditionOp::GreaterThan, 0.5))
            .with_exit_time(0.75);
        assert!(!transition.can_fire(&params, &window(0.25, 0.5, true)));
        assert!(transition.can_fire(&params, &window(0.5, 0.75, true)));
        assert!(!transition.can_fire(&params, &window(0.75, 0.875, true)));

        params.set_float("speed", 0.0);
        assert!(!transition.can_fire(&params, &window(0.5, 1.0, true)));
        assert!(Transition::new("Idle", "Walk").can_fire(&params, &window(0.1, 0.2, true)));
    }

    #[test]
    fn test_exit_time_each_loop() {
        let params = ParameterStore::new();
        let transition = Transition::new("Idle", "Walk").with_exit_time(0.75);
        // Past the first loop, only the frame crossing 0.75 of a loop fires.
        assert!(!transition.can_fire(&params, &window(1.8, 2.1, true)));
        assert!(!transition.can_fire(&params, &window(2.1, 2.2, true)));
        assert!(transition.can_fire(&params, &window(2.5, 2.75, true)));
        assert!(transition.can_fire(&params, &window(1.9, 2.8, true)));
        assert!(transition.can_fire(&params, &window(0.875, 1.875, true)));
        assert!(transition.can_fire(&params, &window(-0.1, -0.3, true)));
        assert!(transition.can_fire(&params, &window(1.75, 1.75, true)));
        assert!(!transition.can_fire(&params, &window(1.5, 1.5, true)));

        let end = Transition::new("Idle", "Walk").with_exit_time(1.0);
        assert!(end.can_fire(&params, &window(0.9, 1.1, true)));
        assert!(!end.can_fire(&params, &window(1.9, 2.1, true)));
        assert!(end.can_fire(&params, &window(1.0, 1.0, false)));
        assert!(transition.can_fire(&params, &window(0.5, 0.8, false)));
        assert!(!transition.can_fire(&params, &window(0.5, 0.6, false)));
    }

    #[test]
    fn test_interruption_source() {
        let transition = Transition::new("Idle", "Walk");
        assert_eq!(transition.interruption_source(), InterruptionSource::None);
        assert!(!transition.interruptible());

        let transition = transition.with_interruptible(true);
        assert_eq!(transition.interruption_source(), InterruptionSource::NextState);
        let transition = transition.with_interruption_source(InterruptionSource::PrevStateNextState);
        assert!(transition.interruptible());
    }

    #[test]
    fn test_source() {
        assert!(Transition::new("ANY", "Jump").from().is_any());
        assert_eq!(
            Transition::new("Idle", "Jump").from(),
            &TransitionSource::State("Idle".to_string())
        );
    }

    #[test]
    fn test_consume_triggers() {
        let mut params = ParameterStore::new();
        params.set_trigger("jump");
        params.set_boolean("grounded", true);
        let transition = Transition::new("ANY", "Jump")
            .with_condition(Condition::is_set("jump"))
            .with_condition(Condition::is_set("grounded"));
        let progress = window(0.0, 0.1, true);
        assert!(transition.can_fire(&params, &progress));
        transition.consume_triggers(&mut params);
        assert!(!transition.can_fire(&params, &progress));
        assert_eq!(params.get_boolean("grounded"), Some(true));
    }
}
