use crate::marker::{Detection, PoseTransform};

/// Marker visibility as seen by the render layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// No marker in view.
    #[default]
    NotFound,
    /// Marker tracked.
    Found,
}

/// Visibility edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// `NotFound -> Found`.
    Found,
    /// `Found -> NotFound`.
    Lost,
}

/// Playback command a transition asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackEffect {
    /// Start or resume the video.
    Play,
    /// Pause the video.
    Pause,
}

/// How marker visibility drives playback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackMode {
    /// Play on found, pause on lost.
    #[default]
    MarkerDriven,
    /// Video pinned to playing from session start; transitions issue no commands.
    Autoplay,
}

impl PlaybackMode {
    /// Mode for a session's `autoplay` flag.
    pub fn from_autoplay(autoplay: bool) -> Self {
        if autoplay {
            Self::Autoplay
        } else {
            Self::MarkerDriven
        }
    }
}

/// Outcome of feeding one frame's detection to the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    /// State after the frame.
    pub state: Visibility,
    /// Edge crossed by this frame, if any.
    pub transition: Option<Transition>,
    /// Command to apply before this frame renders.
    pub effect: Option<PlaybackEffect>,
}

/// Pure transition function of the bridge.
pub fn step(state: Visibility, found: bool, mode: PlaybackMode) -> Step {
    let (next, transition) = match (state, found) {
        (Visibility::NotFound, true) => (Visibility::Found, Some(Transition::Found)),
        (Visibility::Found, false) => (Visibility::NotFound, Some(Transition::Lost)),
        (s, _) => (s, None),
    };
    let effect = match (mode, transition) {
        (PlaybackMode::Autoplay, _) | (_, None) => None,
        (PlaybackMode::MarkerDriven, Some(Transition::Found)) => Some(PlaybackEffect::Play),
        (PlaybackMode::MarkerDriven, Some(Transition::Lost)) => Some(PlaybackEffect::Pause),
    };
    Step {
        state: next,
        transition,
        effect,
    }
}

/// Holds the visibility state and the anchor pose between frames.
#[derive(Clone, Debug, Default)]
pub struct PoseBridge {
    state: Visibility,
    mode: PlaybackMode,
    anchor: Option<PoseTransform>,
}

impl PoseBridge {
    /// Fresh bridge in `NotFound`.
    pub fn new(mode: PlaybackMode) -> Self {
        Self {
            state: Visibility::NotFound,
            mode,
            anchor: None,
        }
    }

    /// Feed one detection. The anchor follows every found frame and is cleared on loss.
    pub fn update(&mut self, detection: &Detection) -> Step {
        let out = step(self.state, detection.is_found(), self.mode);
        self.state = out.state;
        self.anchor = detection.pose().copied();
        if let Some(t) = out.transition {
            tracing::debug!(transition = ?t, effect = ?out.effect, "marker visibility changed");
        }
        out
    }

    /// Current visibility.
    pub fn visibility(&self) -> Visibility {
        self.state
    }

    /// Anchor pose for this frame; `None` while the marker is not tracked.
    pub fn anchor(&self) -> Option<&PoseTransform> {
        self.anchor.as_ref()
    }

    /// Playback mode.
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tracking/bridge.rs"]
mod tests;
