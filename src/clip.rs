//!
//! Animation clip data structure definition.
//!

use glam::{Quat, Vec3};
use static_assertions::assert_impl_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::base::DeterministicState;
use crate::math::Transform;
use crate::skeleton::Skeleton;
use crate::track::Track;

/// Keyframes animating one joint, addressed by its hierarchy path.
///
/// A component without keys leaves the matching component of the reference transform untouched.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointTrack {
    path: String,
    translations: Track<Vec3>,
    rotations: Track<Quat>,
    scales: Track<Vec3>,
}

impl JointTrack {
    pub fn new<S: Into<String>>(path: S) -> JointTrack {
        JointTrack {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_translations(mut self, track: Track<Vec3>) -> JointTrack {
        self.translations = track;
        self
    }

    pub fn with_rotations(mut self, track: Track<Quat>) -> JointTrack {
        self.rotations = track;
        self
    }

    pub fn with_scales(mut self, track: Track<Vec3>) -> JointTrack {
        self.scales = track;
        self
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn translations(&self) -> &Track<Vec3> {
        &self.translations
    }

    #[inline]
    pub fn rotations(&self) -> &Track<Quat> {
        &self.rotations
    }

    #[inline]
    pub fn scales(&self) -> &Track<Vec3> {
        &self.scales
    }

    /// Samples the track at `time`, missing components are taken from `reference`.
    #[inline]
    pub fn sample(&self, time: f32, reference: &Transform) -> Transform {
        Transform {
            translation: self.translations.sample(time).unwrap_or(reference.translation),
            rotation: self.rotations.sample(time).unwrap_or(reference.rotation),
            scale: self.scales.sample(time).unwrap_or(reference.scale),
        }
    }
}

/// Authored event marker of a clip.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClipEvent {
    /// Time of the marker, in seconds.
    pub time: f32,
    pub name: String,
    /// Free form payload, usually a bone path or a sound name.
    pub payload: String,
}

impl ClipEvent {
    pub fn new<N: Into<String>, P: Into<String>>(time: f32, name: N, payload: P) -> ClipEvent {
        ClipEvent {
            time,
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// Decoded animation clip: keyframe tracks over bone paths and event markers.
///
/// Clips are immutable once built and shared between states, layers and components through `Arc`.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clip {
    name: String,
    duration: f32,
    looping: bool,
    tracks: Vec<JointTrack>,
    events: Vec<ClipEvent>,
}

assert_impl_all!(Clip: Send, Sync);
assert_impl_all!(Skeleton: Send, Sync);

impl Clip {
    pub fn new<S: Into<String>>(name: S, duration: f32) -> Clip {
        Clip {
            name: name.into(),
            duration: f32::max(duration, 0.0),
            looping: true,
            tracks: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_loop(mut self, looping: bool) -> Clip {
        self.looping = looping;
        self
    }

    pub fn with_track(mut self, track: JointTrack) -> Clip {
        self.tracks.retain(|t| t.path != track.path);
        self.tracks.push(track);
        self
    }

    /// Adds several tracks. A track replaces any earlier one of the same joint.
    pub fn with_tracks<I: IntoIterator<Item = JointTrack>>(mut self, tracks: I) -> Clip {
        self.tracks.extend(tracks);
        let mut seen = HashSet::with_capacity_and_hasher(self.tracks.len(), DeterministicState::new());
        let mut kept: Vec<JointTrack> = self.tracks.drain(..).rev().filter(|t| seen.insert(t.path.clone())).collect();
        kept.reverse();
        self.tracks = kept;
        self
    }

    /// Adds an event marker. Markers are kept sorted by time.
    pub fn with_event(mut self, event: ClipEvent) -> Clip {
        let idx = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(idx, event);
        self
    }

    /// Wraps the clip for sharing.
    pub fn into_arc(self) -> Arc<Clip> {
        Arc::new(self)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the duration of the clip, in seconds.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Gets the authored loop flag, used as the default of states created for this clip.
    #[inline]
    pub fn looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn tracks(&self) -> &[JointTrack] {
        &self.tracks
    }

    #[inline]
    pub fn events(&self) -> &[ClipEvent] {
        &self.events
    }

    #[inline]
    pub fn track_by_path(&self, path: &str) -> Option<&JointTrack> {
        self.tracks.iter().find(|t| t.path == path)
    }

    /// Samples one bone path at `time`, or `None` if the clip doesn't animate it.
    pub fn sample_path(&self, path: &str, time: f32) -> Option<Transform> {
        self.track_by_path(path).map(|t| t.sample(time, &Transform::IDENTITY))
    }
}

/// Resolves clips by name. Implemented by asset layers feeding decoded clips to the engine.
pub trait ClipProvider {
    fn resolve_clip(&self, name: &str) -> Option<Arc<Clip>>;
}

/// A simple name indexed set of clips.
#[derive(Debug, Default, Clone)]
pub struct ClipLibrary {
    clips: HashMap<String, Arc<Clip>, DeterministicState>,
}

impl ClipLibrary {
    pub fn new() -> ClipLibrary {
        ClipLibrary::default()
    }

    /// Adds a clip, replacing any clip with the same name.
    pub fn insert(&mut self, clip: Arc<Clip>) -> Option<Arc<Clip>> {
        self.clips.insert(clip.name().to_string(), clip)
    }

    pub fn with_clip(mut self, clip: Clip) -> ClipLibrary {
        self.insert(Arc::new(clip));
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<Clip>> {
        self.clips.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl ClipProvider for ClipLibrary {
    fn resolve_clip(&self, name: &str) -> Option<Arc<Clip>> {
        self.clips.get(name).cloned()
    }
}

impl<F> ClipProvider for F
where
    F: Fn(&str) -> Option<Arc<Clip>>,
{
    fn resolve_clip(&self, name: &str) -> Option<Arc<Clip>> {
        self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_sorted() {
        let clip = Clip::new("walk", 1.0)
            .with_event(ClipEvent::new(0.5, "step", "RightFoot"))
            .with_event(ClipEvent::new(0.0, "start", ""))
            .with_event(ClipEvent::new(0.25, "step", "LeftFoot"));
        let times: Vec<f32> = clip.events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5]);
    }

    #[test]
    fn test_sample_path() {
        let clip = Clip::new("wave", 2.0).with_track(
            JointTrack::new("Hips/Spine").with_translations(
                Track::from_raw(&[Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)], &[0.0, 2.0]).unwrap(),
            ),
        );
        let sample = clip.sample_path("Hips/Spine", 1.0).unwrap();
        assert!(sample.translation.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
        assert_eq!(sample.rotation, Quat::IDENTITY);
        assert!(clip.sample_path("Hips", 1.0).is_none());
    }

    #[test]
    fn test_library() {
        let library = ClipLibrary::new().with_clip(Clip::new("idle", 1.0)).with_clip(Clip::new("walk", 0.8));
        assert_eq!(library.len(), 2);
        assert_eq!(library.resolve_clip("walk").unwrap().duration(), 0.8);
        assert!(library.resolve_clip("run").is_none());

        let provider = |name: &str| library.get(name).cloned();
        assert!(provider.resolve_clip("idle").is_some());
    }

    #[test]
    fn test_negative_duration() {
        assert_eq!(Clip::new("bad", -1.0).duration(), 0.0);
    }
}
