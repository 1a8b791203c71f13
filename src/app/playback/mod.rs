mod controller;
mod process;
mod restore;
mod shell;
mod transport;
mod visibility;

use anyhow::Result;

use crate::app::identity::PlaybackIdentity;
use crate::db::{Database, LastPlayed};

pub(crate) use controller::PlaybackController;
#[cfg(test)]
pub(crate) use controller::SEEK_TOLERANCE_SECONDS;
pub(crate) use process::with_sigint_ignored;
pub(crate) use restore::restore_last_played;
pub(crate) use shell::{CloseRequest, PlayerShell};
pub(crate) use transport::{MediaTransport, MpvTransport};
#[cfg(test)]
pub(crate) use transport::parse_player_event;
pub(crate) use visibility::{PlaybackOpener, VisibilityChange, VisibilityCoordinator};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PlaybackState {
    Idle,
    Loading,
    Seeking { target: f64 },
    Playing,
    Ended,
    /// The player process went away without reaching the end.
    Stopped,
    Closed,
}

impl PlaybackState {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Loading => "LOADING",
            Self::Seeking { .. } => "SEEKING",
            Self::Playing => "PLAYING",
            Self::Ended => "ENDED",
            Self::Stopped => "STOPPED",
            Self::Closed => "CLOSED",
        }
    }

    /// States in which transport ticks are persisted or a load is in flight.
    pub(crate) fn is_live(self) -> bool {
        matches!(self, Self::Loading | Self::Seeking { .. } | Self::Playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TransportEventKind {
    TimeUpdate(f64),
    /// The player finished loading or seeking and is positioned for playback.
    Restarted,
    Ended,
    Exited,
}

/// Transport signal tagged with the load it belongs to; events from an
/// earlier load are stale once the controller has moved on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TransportEvent {
    pub(crate) generation: u64,
    pub(crate) kind: TransportEventKind,
}

/// The only path through which playback state reaches durable storage.
pub(crate) trait ProgressStore {
    fn get_progress(&self, identity: &PlaybackIdentity) -> Result<Option<f64>>;
    fn set_progress(&self, identity: &PlaybackIdentity, offset_seconds: f64) -> Result<()>;
    fn get_completion(&self, identity: &PlaybackIdentity) -> Result<bool>;
    fn set_completion(&self, identity: &PlaybackIdentity) -> Result<()>;
    fn reset_completion(&self, identity: &PlaybackIdentity) -> Result<bool>;
    fn get_last_played(&self) -> Result<Option<LastPlayed>>;
    fn set_last_played(&self, url: &str, offset_seconds: f64) -> Result<bool>;
    fn clear_all(&self) -> Result<()>;
}

impl ProgressStore for Database {
    fn get_progress(&self, identity: &PlaybackIdentity) -> Result<Option<f64>> {
        Database::get_progress(self, identity)
    }

    fn set_progress(&self, identity: &PlaybackIdentity, offset_seconds: f64) -> Result<()> {
        Database::set_progress(self, identity, offset_seconds)
    }

    fn get_completion(&self, identity: &PlaybackIdentity) -> Result<bool> {
        Database::get_completion(self, identity)
    }

    fn set_completion(&self, identity: &PlaybackIdentity) -> Result<()> {
        Database::set_completion(self, identity)
    }

    fn reset_completion(&self, identity: &PlaybackIdentity) -> Result<bool> {
        Database::reset_completion(self, identity)
    }

    fn get_last_played(&self) -> Result<Option<LastPlayed>> {
        Database::get_last_played(self)
    }

    fn set_last_played(&self, url: &str, offset_seconds: f64) -> Result<bool> {
        Database::set_last_played(self, url, offset_seconds)
    }

    fn clear_all(&self) -> Result<()> {
        Database::clear_all(self)
    }
}
