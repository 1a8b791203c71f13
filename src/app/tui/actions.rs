use std::sync::mpsc;

use ratatui::widgets::TableState;

use super::super::favorites::{FavoriteEntry, Selection, generate_share_link};
use super::super::format::truncate;
use super::super::identity::PlaybackIdentity;
use super::super::playback::{PlaybackState, TransportEvent};
use super::super::remote::{CatalogClient, ShowDetail};
use super::{DetailState, EpisodeRow, PendingConfirm, PendingNotice, ShowFetchResult, TuiState, View};

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

/// What a batch of player events changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PlayerActivity {
    Quiet,
    /// Only the offset moved.
    Progress,
    /// The playback state changed at least once.
    Transition,
}

/// Feeds player events to the shell.
pub(super) fn drain_player_events(
    rx: &mpsc::Receiver<TransportEvent>,
    state: &mut TuiState<'_>,
) -> PlayerActivity {
    let mut activity = PlayerActivity::Quiet;
    while let Ok(event) = rx.try_recv() {
        let before = state.shell.controller().state();
        state.shell.handle_event(event);
        let after = state.shell.controller().state();
        if before != after {
            match after {
                PlaybackState::Ended => state.status = status_info("Finished. Marked as completed."),
                PlaybackState::Stopped => state.status = status_error("Player exited."),
                _ => {}
            }
            activity = PlayerActivity::Transition;
        } else if activity == PlayerActivity::Quiet {
            activity = PlayerActivity::Progress;
        }
    }
    activity
}

/// Copies the live offset of `identity` into its row, if the row belongs to
/// `show_id`. Returns whether a row was updated.
fn apply_live_progress(
    rows: &mut [EpisodeRow],
    show_id: &str,
    identity: &PlaybackIdentity,
    offset_seconds: f64,
    completed: bool,
) -> bool {
    if identity.show_id != show_id {
        return false;
    }
    let Some(row) = rows.iter_mut().find(|row| {
        row.season_number.to_string() == identity.season_id && row.episode_id == identity.episode_id
    }) else {
        return false;
    };
    row.offset_seconds = Some(offset_seconds);
    row.completed = completed;
    true
}

/// Applies finished show fetches. A result for a show the user has since
/// left is dropped.
pub(super) fn drain_show_fetch_results(
    rx: &mpsc::Receiver<ShowFetchResult>,
    state: &mut TuiState<'_>,
) {
    while let Ok(result) = rx.try_recv() {
        let awaited = matches!(
            &state.detail,
            Some(DetailState::Loading { show_id }) if *show_id == result.show_id
        );
        if !awaited {
            log::debug!("discarding stale fetch for show {}", result.show_id);
            continue;
        }
        state.detail = Some(match result.detail {
            Ok(detail) => DetailState::Ready(detail),
            Err(message) => {
                state.status = status_error(&message);
                DetailState::Failed {
                    show_id: result.show_id,
                    message,
                }
            }
        });
        state.refresh_episode_rows();
        select_clamped(&mut state.episode_table, state.episodes.len());
    }
}

fn spawn_show_fetch(
    catalog: CatalogClient,
    show_id: String,
    tx: &mpsc::Sender<ShowFetchResult>,
) {
    let tx = tx.clone();
    std::thread::spawn(move || {
        let detail = catalog
            .fetch_show_detail(&show_id)
            .map_err(|err| format!("{err:#}"));
        if let Err(message) = &detail {
            log::warn!("{message}");
        }
        let _ = tx.send(ShowFetchResult { show_id, detail });
    });
}

fn select_clamped(table_state: &mut TableState, len: usize) {
    if len == 0 {
        table_state.select(None);
        return;
    }
    let idx = table_state.selected().unwrap_or(0);
    table_state.select(Some(idx.min(len - 1)));
}

impl TuiState<'_> {
    fn user_id(&self) -> String {
        self.user.as_ref().map(|user| user.id.clone()).unwrap_or_default()
    }

    fn selected_show_detail(&self) -> Option<&ShowDetail> {
        self.detail.as_ref().and_then(DetailState::detail)
    }

    fn selected_episode(&self) -> Option<&EpisodeRow> {
        self.episode_table
            .selected()
            .and_then(|idx| self.episodes.get(idx))
    }

    fn selected_favorite(&self) -> Option<&FavoriteEntry> {
        let favorites = self.favorites.as_ref()?;
        self.favorites_table
            .selected()
            .and_then(|idx| favorites.entries().get(idx))
    }

    fn active_table(&mut self) -> (&mut TableState, usize) {
        match self.view {
            View::Shows => (&mut self.show_table, self.shows.len()),
            View::Episodes => (&mut self.episode_table, self.episodes.len()),
            View::Favorites => {
                let len = self.favorites.as_ref().map_or(0, |f| f.entries().len());
                (&mut self.favorites_table, len)
            }
        }
    }

    pub(super) fn move_selection(&mut self, delta: isize) {
        let (table, len) = self.active_table();
        if len == 0 {
            return;
        }
        let current = table.selected().unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(len - 1);
        table.select(Some(next));
    }

    /// Rebuilds the episode list from the loaded show and the progress store.
    pub(super) fn refresh_episode_rows(&mut self) {
        let Some(detail) = self.selected_show_detail() else {
            self.episodes.clear();
            return;
        };
        let user_id = self.user_id();
        let mut rows = Vec::new();
        for season in &detail.seasons {
            for episode in &season.episodes {
                let identity = PlaybackIdentity::new(
                    user_id.clone(),
                    detail.id.clone(),
                    season.season.to_string(),
                    episode.id.clone(),
                );
                let offset_seconds = self.db.get_progress(&identity).unwrap_or_else(|err| {
                    log::warn!("failed to read progress for {identity}: {err:#}");
                    None
                });
                let completed = self.db.get_completion(&identity).unwrap_or_else(|err| {
                    log::warn!("failed to read completion for {identity}: {err:#}");
                    false
                });
                rows.push(EpisodeRow {
                    season_number: season.season,
                    season_title: season.title.clone(),
                    episode_id: episode.id.clone(),
                    title: episode.title.clone(),
                    offset_seconds,
                    completed,
                });
            }
        }
        self.episodes = rows;
    }

    /// Mirrors the mounted episode's offset into the visible rows without
    /// going back to the store.
    pub(super) fn sync_playing_row(&mut self) {
        let controller = self.shell.controller();
        let Some(target) = controller.target() else {
            return;
        };
        if target.identity.user_id != self.user_id() {
            return;
        }
        let Some(show_id) = self
            .detail
            .as_ref()
            .and_then(DetailState::detail)
            .map(|detail| detail.id.as_str())
        else {
            return;
        };
        apply_live_progress(
            &mut self.episodes,
            show_id,
            &target.identity,
            controller.offset_seconds(),
            controller.is_completed(),
        );
    }

    fn refresh_favorites(&mut self) {
        let Some(favorites) = self.favorites.as_mut() else {
            self.status = status_error("Favorites are disabled: Supabase is not configured.");
            return;
        };
        if self.user.is_none() {
            self.status = status_info("Sign in with `podtrack login` to see favorites.");
        }
        let len = favorites.list(self.user.as_ref()).len();
        select_clamped(&mut self.favorites_table, len);
    }

    pub(super) fn switch_view(&mut self, view: View) {
        self.view = view;
        match view {
            View::Favorites => self.refresh_favorites(),
            View::Episodes => self.refresh_episode_rows(),
            View::Shows => {}
        }
    }

    pub(super) fn back(&mut self) {
        if self.view != View::Shows {
            self.view = View::Shows;
        }
    }

    pub(super) fn refresh_view(&mut self) {
        match self.view {
            View::Shows => {
                let catalog = CatalogClient::new(&self.config.catalog_url, self.config.timeouts);
                let mut shows = catalog.shows_or_empty();
                self.show_order.sort(&mut shows);
                self.shows = shows;
                select_clamped(&mut self.show_table, self.shows.len());
                self.status = if self.shows.is_empty() {
                    status_error("Catalog is empty or unreachable.")
                } else {
                    status_info(&format!("Loaded {} shows.", self.shows.len()))
                };
            }
            View::Episodes => self.refresh_episode_rows(),
            View::Favorites => self.refresh_favorites(),
        }
    }

    pub(super) fn activate(&mut self, fetch_tx: &mpsc::Sender<ShowFetchResult>) {
        match self.view {
            View::Shows => self.open_selected_show(fetch_tx),
            View::Episodes => self.play_selected_episode(),
            View::Favorites => self.play_selected_favorite(),
        }
    }

    fn open_selected_show(&mut self, fetch_tx: &mpsc::Sender<ShowFetchResult>) {
        let Some(show) = self.show_table.selected().and_then(|idx| self.shows.get(idx)) else {
            return;
        };
        let show_id = show.id.clone();
        let title = show.title.clone();
        self.view = View::Episodes;
        let already_loaded = matches!(
            &self.detail,
            Some(state @ (DetailState::Ready(_) | DetailState::Loading { .. })) if state.show_id() == show_id
        );
        if already_loaded {
            self.refresh_episode_rows();
            return;
        }

        self.detail = Some(DetailState::Loading {
            show_id: show_id.clone(),
        });
        self.episodes.clear();
        self.episode_table.select(None);
        self.status = status_info(&format!("Loading {}...", truncate(&title, 40)));
        let catalog = CatalogClient::new(&self.config.catalog_url, self.config.timeouts);
        spawn_show_fetch(catalog, show_id, fetch_tx);
    }

    fn play_selected_episode(&mut self) {
        let Some(row) = self.selected_episode() else {
            return;
        };
        let (season_number, episode_id) = (row.season_number, row.episode_id.clone());
        let user_id = self.user_id();
        let Some(target) = self
            .selected_show_detail()
            .and_then(|detail| detail.play_target(&user_id, season_number, &episode_id))
        else {
            self.status = status_error("Episode is no longer available.");
            return;
        };
        if target.audio_url.trim().is_empty() {
            self.status = status_error("Episode has no audio file.");
            return;
        }
        let title = target.episode_title.clone();
        self.shell.open(target);
        self.status = self.playback_status(&title);
    }

    fn play_selected_favorite(&mut self) {
        let Some(entry) = self.selected_favorite().cloned() else {
            return;
        };
        let Some(favorites) = self.favorites.as_ref() else {
            return;
        };
        if favorites
            .open(&entry, self.user.as_ref(), self.shell.opener())
            .is_none()
        {
            self.status = status_error("Favorite is missing its season id or audio file.");
            return;
        }
        self.shell.sync();
        self.status = self.playback_status(&entry.episode_title);
    }

    fn playback_status(&self, title: &str) -> String {
        match self.shell.controller().last_error() {
            Some(err) => status_error(&format!("Playback failed: {err}")),
            None => status_info(&format!("Playing {}", truncate(title, 50))),
        }
    }

    pub(super) fn save_selected(&mut self) {
        if self.view != View::Episodes {
            self.status = status_info("Open a show and pick an episode to save.");
            return;
        }
        let Some(favorites) = self.favorites.as_ref() else {
            self.status = status_error("Favorites are disabled: Supabase is not configured.");
            return;
        };
        let Some(detail) = self.selected_show_detail() else {
            self.status = status_error("Show is still loading.");
            return;
        };
        let selection = self
            .selected_episode()
            .map(|row| Selection::new(row.season_number, row.episode_id.clone()))
            .unwrap_or_default();
        self.status = match favorites.save(&selection, detail, self.user.as_ref()) {
            Ok(entry) => status_info(&format!("Saved {}", truncate(&entry.episode_title, 50))),
            Err(err) => status_error(&format!("Save failed: {err}")),
        };
    }

    pub(super) fn ask_remove(&mut self) {
        if self.view != View::Favorites {
            return;
        }
        let Some(entry) = self.selected_favorite() else {
            self.status = status_error("Remove failed: no favorite selected.");
            return;
        };
        self.pending_confirm = Some(PendingConfirm::RemoveFavorite {
            season_id: entry.season_id.clone(),
            title: entry.episode_title.clone(),
        });
        self.status = status_info("Confirm remove: y/Enter to remove, n/Esc to cancel.");
    }

    pub(super) fn share_selected(&mut self) {
        if self.view != View::Favorites {
            return;
        }
        let Some(entry) = self.selected_favorite() else {
            self.status = status_error("Share failed: no favorite selected.");
            return;
        };
        let link = generate_share_link(&self.config.share_origin, entry, self.user.as_ref());
        self.pending_notice = Some(PendingNotice {
            title: "Share Link",
            message: format!(
                "{}\n\n{link}\n\nPress any key to continue.",
                truncate(&entry.episode_title, 50)
            ),
        });
        self.status = status_info("Share link ready.");
    }

    pub(super) fn cycle_order(&mut self) {
        match self.view {
            View::Shows => {
                self.show_order = self.show_order.next();
                self.show_order.sort(&mut self.shows);
                self.status = status_info(&format!("Shows sorted by {}.", self.show_order.label()));
            }
            View::Favorites => {
                let Some(favorites) = self.favorites.as_mut() else {
                    return;
                };
                let order = favorites.order().next();
                favorites.set_order(order);
                let len = favorites.entries().len();
                select_clamped(&mut self.favorites_table, len);
                self.status = status_info(&format!("Favorites sorted by {}.", order.label()));
            }
            View::Episodes => {}
        }
    }

    pub(super) fn reset_completion(&mut self) {
        if self.shell.reset_completion() {
            self.status = status_info("Completion cleared for the current episode.");
            self.refresh_episode_rows();
        } else {
            self.status = status_info("Current episode was not marked completed.");
        }
    }

    pub(super) fn ask_close(&mut self) {
        match self.shell.request_close() {
            Some(request) => {
                self.pending_confirm = Some(PendingConfirm::ClosePlayer(request));
                self.status = status_info("Confirm close: y/Enter to close, n/Esc to cancel.");
            }
            None => self.status = status_info("Player is not open."),
        }
    }

    pub(super) fn confirm_pending(&mut self) {
        let Some(pending) = self.pending_confirm.take() else {
            return;
        };
        match pending {
            PendingConfirm::RemoveFavorite { season_id, title } => {
                let Some(favorites) = self.favorites.as_mut() else {
                    return;
                };
                if favorites.remove(self.user.as_ref(), &season_id) {
                    let len = favorites.entries().len();
                    select_clamped(&mut self.favorites_table, len);
                    self.status = status_info(&format!("Removed favorite: {title}"));
                } else {
                    self.status = status_error("Remove failed. See the log for details.");
                }
            }
            PendingConfirm::ClosePlayer(request) => {
                self.shell.confirm_close(request);
                self.status = status_info("Player closed.");
            }
            PendingConfirm::ClearStorage => match self.shell.clear_storage() {
                Ok(()) => {
                    self.refresh_episode_rows();
                    self.status = status_info("Stored progress cleared.");
                }
                Err(err) => self.status = status_error(&format!("Clear failed: {err:#}")),
            },
        }
    }
}
