use crate::app::identity::PlaybackTarget;

use super::{PlaybackOpener, ProgressStore, VisibilityCoordinator};

/// Reopens the last played resource after a restart. Only the URL and the
/// global offset are recoverable, so the identity is the anonymous placeholder.
pub(crate) fn restore_last_played<S: ProgressStore + ?Sized>(
    store: &S,
    visibility: &mut VisibilityCoordinator,
) -> bool {
    match store.get_last_played() {
        Ok(Some(last)) => {
            log::info!(
                "resuming {} at {:.1}s",
                last.url,
                last.offset_seconds
            );
            visibility.open(PlaybackTarget::restored(last.url, last.offset_seconds));
            true
        }
        Ok(None) => {
            visibility.hide();
            false
        }
        Err(err) => {
            log::warn!("failed to read last played pointer: {err:#}");
            visibility.hide();
            false
        }
    }
}
