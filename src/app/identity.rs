use std::fmt;

/// Names one playable unit. Absent components are stored as empty strings,
/// which is what anonymous and restored sessions carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct PlaybackIdentity {
    pub(crate) user_id: String,
    pub(crate) show_id: String,
    pub(crate) season_id: String,
    pub(crate) episode_id: String,
}

impl PlaybackIdentity {
    pub(crate) fn new(
        user_id: impl Into<String>,
        show_id: impl Into<String>,
        season_id: impl Into<String>,
        episode_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            show_id: show_id.into(),
            season_id: season_id.into(),
            episode_id: episode_id.into(),
        }
    }

    pub(crate) fn anonymous() -> Self {
        Self::default()
    }

    pub(crate) fn is_placeholder(&self) -> bool {
        self.show_id.is_empty() && self.season_id.is_empty() && self.episode_id.is_empty()
    }
}

impl fmt::Display for PlaybackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |value: &str| if value.is_empty() { "-".to_string() } else { value.to_string() };
        write!(
            f,
            "user={} show={} season={} episode={}",
            part(&self.user_id),
            part(&self.show_id),
            part(&self.season_id),
            part(&self.episode_id)
        )
    }
}

/// Everything a producer hands over when it wants something played.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaybackTarget {
    pub(crate) identity: PlaybackIdentity,
    pub(crate) audio_url: String,
    pub(crate) episode_title: String,
    /// Offset to resume from instead of the per-identity stored offset.
    pub(crate) resume_hint: Option<f64>,
}

impl PlaybackTarget {
    pub(crate) fn new(
        identity: PlaybackIdentity,
        audio_url: impl Into<String>,
        episode_title: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            audio_url: audio_url.into(),
            episode_title: episode_title.into(),
            resume_hint: None,
        }
    }

    /// Target rebuilt from the last-played pointer: only the URL and offset survive a restart.
    pub(crate) fn restored(audio_url: impl Into<String>, offset_seconds: f64) -> Self {
        Self {
            identity: PlaybackIdentity::anonymous(),
            audio_url: audio_url.into(),
            episode_title: String::new(),
            resume_hint: (offset_seconds > 0.0).then_some(offset_seconds),
        }
    }
}
