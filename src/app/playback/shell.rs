use anyhow::Result;

use crate::app::identity::PlaybackTarget;

use super::{
    MediaTransport, PlaybackController, PlaybackOpener, ProgressStore, TransportEvent,
    VisibilityChange, VisibilityCoordinator, restore_last_played,
};

/// Proof that the user answered "yes" to closing the player. Only
/// [`PlayerShell::request_close`] hands these out.
#[derive(Debug)]
pub(crate) struct CloseRequest {
    _confirmed: (),
}

/// Application-level owner of the visibility state and the one controller
/// it mounts.
pub(crate) struct PlayerShell<'a, S: ProgressStore + ?Sized, T: MediaTransport> {
    store: &'a S,
    visibility: VisibilityCoordinator,
    controller: PlaybackController<'a, S, T>,
    mounted_revision: Option<u64>,
    restored: bool,
}

impl<'a, S: ProgressStore + ?Sized, T: MediaTransport> PlayerShell<'a, S, T> {
    pub(crate) fn new(store: &'a S, transport: T) -> Self {
        Self {
            store,
            visibility: VisibilityCoordinator::new(),
            controller: PlaybackController::new(store, transport),
            mounted_revision: None,
            restored: false,
        }
    }

    pub(crate) fn visibility(&self) -> &VisibilityCoordinator {
        &self.visibility
    }

    pub(crate) fn controller(&self) -> &PlaybackController<'a, S, T> {
        &self.controller
    }

    /// Producers write through this; call [`Self::sync`] afterwards.
    pub(crate) fn opener(&mut self) -> &mut dyn PlaybackOpener {
        &mut self.visibility
    }

    pub(crate) fn open(&mut self, target: PlaybackTarget) -> VisibilityChange {
        let change = self.visibility.open(target);
        self.sync();
        change
    }

    /// Runs session restore the first time it is called and never again.
    pub(crate) fn restore_once(&mut self) -> bool {
        if self.restored {
            return false;
        }
        self.restored = true;
        let resumed = restore_last_played(self.store, &mut self.visibility);
        self.sync();
        resumed
    }

    /// Brings the mounted controller in line with the visibility state.
    pub(crate) fn sync(&mut self) {
        let revision = self.visibility.revision();
        if self.mounted_revision == Some(revision) {
            return;
        }
        match self.visibility.state().target() {
            Some(target) if self.controller.is_mounted() => self.controller.retarget(target),
            Some(target) => self.controller.mount(target),
            None => self.controller.unmount(),
        }
        self.mounted_revision = Some(revision);
    }

    pub(crate) fn handle_event(&mut self, event: TransportEvent) {
        self.controller.handle_event(event);
    }

    pub(crate) fn request_close(&self) -> Option<CloseRequest> {
        self.visibility
            .is_visible()
            .then_some(CloseRequest { _confirmed: () })
    }

    pub(crate) fn confirm_close(&mut self, request: CloseRequest) {
        let CloseRequest { _confirmed } = request;
        self.visibility.close();
        self.sync();
    }

    /// Closes without asking, for app-level resets.
    pub(crate) fn reset(&mut self) {
        self.visibility.reset();
        self.sync();
    }

    pub(crate) fn reset_completion(&mut self) -> bool {
        self.controller.reset_completion()
    }

    /// Wipes durable playback state. In-memory state is reset with it since
    /// nothing about the mounted session is consistent afterwards.
    pub(crate) fn clear_storage(&mut self) -> Result<()> {
        self.reset();
        self.store.clear_all()
    }
}
