use crate::app::identity::PlaybackTarget;

use super::{MediaTransport, PlaybackState, ProgressStore, TransportEvent, TransportEventKind};

/// Ticks this far below the seek target still count as "arrived".
pub(crate) const SEEK_TOLERANCE_SECONDS: f64 = 1.0;

/// Drives the single audio resource: resume from the stored offset, persist
/// every tick, mark completion at end of stream.
pub(crate) struct PlaybackController<'a, S: ProgressStore + ?Sized, T: MediaTransport> {
    store: &'a S,
    transport: T,
    target: Option<PlaybackTarget>,
    state: PlaybackState,
    generation: u64,
    offset_seconds: f64,
    completed: bool,
    last_error: Option<String>,
}

impl<'a, S: ProgressStore + ?Sized, T: MediaTransport> PlaybackController<'a, S, T> {
    pub(crate) fn new(store: &'a S, transport: T) -> Self {
        Self {
            store,
            transport,
            target: None,
            state: PlaybackState::Idle,
            generation: 0,
            offset_seconds: 0.0,
            completed: false,
            last_error: None,
        }
    }

    pub(crate) fn state(&self) -> PlaybackState {
        self.state
    }

    pub(crate) fn target(&self) -> Option<&PlaybackTarget> {
        self.target.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn offset_seconds(&self) -> f64 {
        self.offset_seconds
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// True between a mount and the matching unmount.
    pub(crate) fn is_mounted(&self) -> bool {
        self.target.is_some() && self.state != PlaybackState::Closed
    }

    pub(crate) fn mount(&mut self, target: PlaybackTarget) {
        log::debug!("mounting player for {} ({})", target.identity, target.audio_url);
        self.load(target);
    }

    /// Switches the mounted player to a new identity and resource. Progress
    /// for the previous identity stops being written immediately.
    pub(crate) fn retarget(&mut self, target: PlaybackTarget) {
        if let Some(previous) = &self.target {
            log::info!("retargeting player from {} to {}", previous.identity, target.identity);
        }
        self.transport.stop();
        self.load(target);
    }

    pub(crate) fn unmount(&mut self) {
        if self.target.is_none() {
            return;
        }
        self.transport.stop();
        // Ticks from the stopped load must not land after close.
        self.generation += 1;
        self.state = PlaybackState::Closed;
        self.target = None;
        log::debug!("player unmounted");
    }

    pub(crate) fn handle_event(&mut self, event: TransportEvent) {
        if event.generation != self.generation {
            log::trace!(
                "dropping stale transport event from load {} (current {})",
                event.generation,
                self.generation
            );
            return;
        }
        match event.kind {
            TransportEventKind::TimeUpdate(offset) => self.on_time_update(offset),
            TransportEventKind::Restarted => self.on_restarted(),
            TransportEventKind::Ended => self.on_ended(),
            TransportEventKind::Exited => self.on_exited(),
        }
    }

    pub(crate) fn on_time_update(&mut self, offset_seconds: f64) {
        if !offset_seconds.is_finite() || offset_seconds < 0.0 {
            return;
        }
        match self.state {
            PlaybackState::Seeking { target } => {
                if offset_seconds + SEEK_TOLERANCE_SECONDS < target {
                    return;
                }
                log::debug!("seek to {target:.1}s settled at {offset_seconds:.1}s");
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Loading => self.state = PlaybackState::Playing,
            PlaybackState::Playing => {}
            PlaybackState::Idle
            | PlaybackState::Ended
            | PlaybackState::Stopped
            | PlaybackState::Closed => return,
        }
        self.offset_seconds = offset_seconds;
        self.persist_tick();
    }

    /// The player is positioned wherever it actually landed. A start offset
    /// the player could not honor must not hold ticks back for good.
    fn on_restarted(&mut self) {
        match self.state {
            PlaybackState::Seeking { target } => {
                log::debug!("player restarted while seeking to {target:.1}s");
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Loading => self.state = PlaybackState::Playing,
            _ => {}
        }
    }

    pub(crate) fn on_ended(&mut self) {
        if !self.state.is_live() {
            return;
        }
        let Some(target) = &self.target else {
            return;
        };
        self.state = PlaybackState::Ended;
        self.completed = true;
        if let Err(err) = self.store.set_completion(&target.identity) {
            log::warn!("failed to record completion for {}: {err:#}", target.identity);
        }
        log::info!("finished {}", target.identity);
    }

    /// Clears the completed flag of the mounted episode on explicit request.
    pub(crate) fn reset_completion(&mut self) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        match self.store.reset_completion(&target.identity) {
            Ok(changed) => {
                self.completed = false;
                changed
            }
            Err(err) => {
                log::warn!("failed to reset completion for {}: {err:#}", target.identity);
                false
            }
        }
    }

    fn on_exited(&mut self) {
        if self.state.is_live() {
            log::debug!("player exited before the end of the resource");
            self.state = PlaybackState::Stopped;
        }
    }

    fn load(&mut self, target: PlaybackTarget) {
        self.generation += 1;
        self.state = PlaybackState::Loading;
        self.last_error = None;

        let stored = match self.store.get_progress(&target.identity) {
            Ok(stored) => stored,
            Err(err) => {
                log::warn!("failed to read progress for {}: {err:#}", target.identity);
                None
            }
        };
        self.completed = match self.store.get_completion(&target.identity) {
            Ok(completed) => completed,
            Err(err) => {
                log::warn!("failed to read completion for {}: {err:#}", target.identity);
                false
            }
        };
        let resume_at = target
            .resume_hint
            .or(stored)
            .filter(|offset| offset.is_finite() && *offset > 0.0);
        self.offset_seconds = resume_at.unwrap_or(0.0);

        if let Err(err) = self
            .transport
            .load(self.generation, &target.audio_url, resume_at)
        {
            log::warn!("failed to load {}: {err:#}", target.audio_url);
            self.last_error = Some(format!("{err:#}"));
            self.state = PlaybackState::Idle;
            self.target = Some(target);
            return;
        }

        self.state = match resume_at {
            Some(offset) => PlaybackState::Seeking { target: offset },
            None => PlaybackState::Playing,
        };
        if let Err(err) = self.transport.play() {
            log::warn!("failed to start playback: {err:#}");
            self.last_error = Some(format!("{err:#}"));
        }
        self.target = Some(target);
    }

    fn persist_tick(&self) {
        let Some(target) = &self.target else {
            return;
        };
        if let Err(err) = self.store.set_progress(&target.identity, self.offset_seconds) {
            log::warn!("failed to persist progress for {}: {err:#}", target.identity);
        }
        if let Err(err) = self
            .store
            .set_last_played(&target.audio_url, self.offset_seconds)
        {
            log::warn!("failed to persist last played pointer: {err:#}");
        }
    }
}

impl<S: ProgressStore + ?Sized, T: MediaTransport> Drop for PlaybackController<'_, S, T> {
    fn drop(&mut self) {
        self.transport.stop();
    }
}
