/// Platform rule deciding whether playback may start without a user gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoplayPolicy {
    /// Any playback may start.
    Allowed,
    /// Only muted playback may start without a gesture.
    #[default]
    MutedOnly,
    /// Nothing plays before a user gesture.
    GestureRequired,
}

impl AutoplayPolicy {
    /// Whether a `play()` request is honored.
    pub fn permits(self, muted: bool, had_gesture: bool) -> bool {
        match self {
            Self::Allowed => true,
            Self::MutedOnly => muted || had_gesture,
            Self::GestureRequired => had_gesture,
        }
    }
}
