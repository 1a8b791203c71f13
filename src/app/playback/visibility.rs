use crate::app::identity::{PlaybackIdentity, PlaybackTarget};

/// What the app shell reads to decide whether a player is mounted.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PlayerVisibilityState {
    pub(crate) visible: bool,
    pub(crate) audio_url: String,
    pub(crate) user_id: String,
    pub(crate) show_id: String,
    pub(crate) season_id: String,
    pub(crate) episode_id: String,
    pub(crate) episode_title: String,
    pub(crate) resume_hint: Option<f64>,
}

impl PlayerVisibilityState {
    fn from_target(target: PlaybackTarget) -> Self {
        let PlaybackTarget {
            identity,
            audio_url,
            episode_title,
            resume_hint,
        } = target;
        Self {
            visible: true,
            audio_url,
            user_id: identity.user_id,
            show_id: identity.show_id,
            season_id: identity.season_id,
            episode_id: identity.episode_id,
            episode_title,
            resume_hint,
        }
    }

    pub(crate) fn identity(&self) -> PlaybackIdentity {
        PlaybackIdentity::new(
            self.user_id.clone(),
            self.show_id.clone(),
            self.season_id.clone(),
            self.episode_id.clone(),
        )
    }

    /// The target to mount, if the player should be showing at all.
    pub(crate) fn target(&self) -> Option<PlaybackTarget> {
        if !self.visible || self.audio_url.is_empty() {
            return None;
        }
        Some(PlaybackTarget {
            identity: self.identity(),
            audio_url: self.audio_url.clone(),
            episode_title: self.episode_title.clone(),
            resume_hint: self.resume_hint,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum VisibilityChange {
    Opened,
    Retargeted { previous: PlaybackIdentity },
    Hidden,
    Unchanged,
}

/// The narrow surface handed to anything that wants to start playback.
pub(crate) trait PlaybackOpener {
    fn open(&mut self, target: PlaybackTarget) -> VisibilityChange;
}

/// Sole owner of [`PlayerVisibilityState`]. Every mutation bumps the
/// revision so the shell can tell when the mounted player is out of date.
#[derive(Debug, Default)]
pub(crate) struct VisibilityCoordinator {
    state: PlayerVisibilityState,
    revision: u64,
}

impl VisibilityCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> &PlayerVisibilityState {
        &self.state
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn is_visible(&self) -> bool {
        self.state.visible
    }

    /// Points the already visible player at a different episode. There is no
    /// confirmation step: the new target wins immediately.
    pub(crate) fn retarget(&mut self, target: PlaybackTarget) -> VisibilityChange {
        if target.audio_url.trim().is_empty() {
            log::warn!("ignoring retarget to {} without an audio url", target.identity);
            return VisibilityChange::Unchanged;
        }
        let previous = self.state.identity();
        self.state = PlayerVisibilityState::from_target(target);
        self.revision += 1;
        VisibilityChange::Retargeted { previous }
    }

    /// User-confirmed close. Only the shell calls this, after checking the
    /// confirmation token.
    pub(super) fn close(&mut self) -> VisibilityChange {
        self.hide()
    }

    /// Programmatic reset of the whole player state; needs no confirmation.
    pub(crate) fn reset(&mut self) -> VisibilityChange {
        self.hide()
    }

    pub(crate) fn hide(&mut self) -> VisibilityChange {
        if self.state == PlayerVisibilityState::default() {
            return VisibilityChange::Unchanged;
        }
        self.state = PlayerVisibilityState::default();
        self.revision += 1;
        VisibilityChange::Hidden
    }
}

impl PlaybackOpener for VisibilityCoordinator {
    fn open(&mut self, target: PlaybackTarget) -> VisibilityChange {
        if target.audio_url.trim().is_empty() {
            log::warn!("ignoring play request for {} without an audio url", target.identity);
            return VisibilityChange::Unchanged;
        }
        if self.state.visible {
            return self.retarget(target);
        }
        self.state = PlayerVisibilityState::from_target(target);
        self.revision += 1;
        VisibilityChange::Opened
    }
}
