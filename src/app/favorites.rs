use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identity::{PlaybackIdentity, PlaybackTarget};
use super::playback::{PlaybackOpener, VisibilityChange};
use super::remote::{AuthUser, FavoritesStore, ShowDetail, lenient_opt_string, lenient_string, null_as_default};

const SHARE_ROUTE: &str = "shared-favorites";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SeasonTitle {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) title: String,
}

/// A saved episode. Rows are created and deleted, never edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct FavoriteEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub(crate) season_id: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) episode_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) season_number: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) episode_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) season_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) season_image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) date_saved: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) mp3_file: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) seasons_titles: Vec<SeasonTitle>,
}

impl FavoriteEntry {
    /// Share links and removal address an entry by its season id.
    pub(crate) fn id(&self) -> &str {
        &self.season_id
    }

    /// Rebuilds the identity a catalog play of the same episode would use.
    pub(crate) fn play_target(&self, user: Option<&AuthUser>) -> Result<PlaybackTarget, String> {
        if self.season_id.trim().is_empty() {
            return Err(format!(
                "favorite \"{}\" has no season id",
                self.episode_title
            ));
        }
        if self.mp3_file.trim().is_empty() {
            return Err(format!(
                "favorite \"{}\" has no audio file",
                self.episode_title
            ));
        }
        let season = self
            .season_number
            .map(|number| number.to_string())
            .unwrap_or_else(|| self.season_id.clone());
        let episode = self
            .episode_id
            .clone()
            .unwrap_or_else(|| self.season_id.clone());
        let identity = PlaybackIdentity::new(
            user.map(|user| user.id.clone()).unwrap_or_default(),
            self.season_id.clone(),
            season,
            episode,
        );
        Ok(PlaybackTarget::new(identity, &self.mp3_file, &self.episode_title))
    }
}

/// Row written to the remote store.
#[derive(Debug, Serialize)]
pub(crate) struct FavoriteRecord<'a> {
    pub(crate) user_id: &'a str,
    #[serde(flatten)]
    pub(crate) entry: &'a FavoriteEntry,
}

#[derive(Debug, Error)]
pub(crate) enum SaveError {
    #[error("sign in to save favorites")]
    Unauthenticated,
    #[error("select a season and an episode first")]
    IncompleteSelection,
    #[error("episode {episode} not found in season {season}")]
    EpisodeNotFound { season: u32, episode: String },
    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

/// The season/episode currently picked in a show view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Selection {
    pub(crate) season: Option<u32>,
    pub(crate) episode: Option<String>,
}

impl Selection {
    pub(crate) fn new(season: u32, episode: impl Into<String>) -> Self {
        Self {
            season: Some(season),
            episode: Some(episode.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FavoritesOrder {
    #[default]
    SavedNewest,
    SavedOldest,
    TitleAsc,
    TitleDesc,
    BySeason,
}

impl FavoritesOrder {
    pub(crate) fn next(self) -> Self {
        match self {
            Self::SavedNewest => Self::SavedOldest,
            Self::SavedOldest => Self::TitleAsc,
            Self::TitleAsc => Self::TitleDesc,
            Self::TitleDesc => Self::BySeason,
            Self::BySeason => Self::SavedNewest,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::SavedNewest => "newest first",
            Self::SavedOldest => "oldest first",
            Self::TitleAsc => "title A-Z",
            Self::TitleDesc => "title Z-A",
            Self::BySeason => "grouped by season",
        }
    }

    /// Title orders drop untitled entries from the view.
    pub(crate) fn apply(self, entries: &mut Vec<FavoriteEntry>) {
        match self {
            Self::SavedNewest => entries.sort_by(|a, b| saved_at(b).cmp(&saved_at(a))),
            Self::SavedOldest => entries.sort_by_key(saved_at),
            Self::TitleAsc => {
                entries.retain(|entry| !entry.season_title.trim().is_empty());
                entries.sort_by(|a, b| {
                    a.season_title
                        .to_lowercase()
                        .cmp(&b.season_title.to_lowercase())
                });
            }
            Self::TitleDesc => {
                entries.retain(|entry| !entry.season_title.trim().is_empty());
                entries.sort_by(|a, b| {
                    b.season_title
                        .to_lowercase()
                        .cmp(&a.season_title.to_lowercase())
                });
            }
            Self::BySeason => group_by_season(entries),
        }
    }
}

fn saved_at(entry: &FavoriteEntry) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&entry.date_saved)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Keeps groups in first-seen order, seasons ascending inside a group.
fn group_by_season(entries: &mut [FavoriteEntry]) {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        first_seen.entry(entry.season_title.clone()).or_insert(idx);
    }
    entries.sort_by_key(|entry| {
        (
            first_seen.get(&entry.season_title).copied().unwrap_or(usize::MAX),
            entry.season_number.unwrap_or(u32::MAX),
        )
    });
}

/// Bridges the remote favorites table with the player.
pub(crate) struct Favorites<'a, R: FavoritesStore + ?Sized> {
    remote: &'a R,
    entries: Vec<FavoriteEntry>,
    order: FavoritesOrder,
}

impl<'a, R: FavoritesStore + ?Sized> Favorites<'a, R> {
    pub(crate) fn new(remote: &'a R) -> Self {
        Self {
            remote,
            entries: Vec::new(),
            order: FavoritesOrder::default(),
        }
    }

    pub(crate) fn entries(&self) -> &[FavoriteEntry] {
        &self.entries
    }

    pub(crate) fn order(&self) -> FavoritesOrder {
        self.order
    }

    pub(crate) fn save(
        &self,
        selection: &Selection,
        show: &ShowDetail,
        user: Option<&AuthUser>,
    ) -> Result<FavoriteEntry, SaveError> {
        let result = self.try_save(selection, show, user);
        if let Err(err) = &result {
            log::warn!("favorite not saved: {err:#}");
        }
        result
    }

    fn try_save(
        &self,
        selection: &Selection,
        show: &ShowDetail,
        user: Option<&AuthUser>,
    ) -> Result<FavoriteEntry, SaveError> {
        let user = user.ok_or(SaveError::Unauthenticated)?;
        let (Some(season_number), Some(episode_id)) = (selection.season, selection.episode.as_deref())
        else {
            return Err(SaveError::IncompleteSelection);
        };
        let (season, episode) =
            show.episode(season_number, episode_id)
                .ok_or_else(|| SaveError::EpisodeNotFound {
                    season: season_number,
                    episode: episode_id.to_string(),
                })?;

        let entry = FavoriteEntry {
            season_id: show.id.clone(),
            episode_id: Some(episode.id.clone()),
            season_number: Some(season.season),
            episode_title: episode.title.clone(),
            season_title: show.title.clone(),
            season_image: show.image.clone(),
            date_saved: Utc::now().to_rfc3339(),
            mp3_file: episode.file.clone(),
            seasons_titles: show
                .seasons
                .iter()
                .map(|season| SeasonTitle {
                    title: season.title.clone(),
                })
                .collect(),
        };
        self.remote.insert_favorite(&FavoriteRecord {
            user_id: &user.id,
            entry: &entry,
        })?;
        log::info!("saved favorite \"{}\"", entry.episode_title);
        Ok(entry)
    }

    /// Refreshes from the remote store. Signed-out users and failed fetches
    /// both end up with an empty list.
    pub(crate) fn list(&mut self, user: Option<&AuthUser>) -> &[FavoriteEntry] {
        self.entries = match user {
            Some(user) => match self.remote.select_favorites(&user.id) {
                Ok(entries) => entries,
                Err(err) => {
                    log::warn!("{err:#}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.order.apply(&mut self.entries);
        &self.entries
    }

    pub(crate) fn set_order(&mut self, order: FavoritesOrder) {
        self.order = order;
        self.order.apply(&mut self.entries);
    }

    pub(crate) fn remove(&mut self, user: Option<&AuthUser>, season_id: &str) -> bool {
        let Some(user) = user else {
            log::warn!("sign in to remove favorites");
            return false;
        };
        match self.remote.delete_favorite(&user.id, season_id) {
            Ok(()) => {
                self.entries.retain(|entry| entry.season_id != season_id);
                true
            }
            Err(err) => {
                log::warn!("{err:#}");
                false
            }
        }
    }

    /// Hands the entry to the player exactly as a catalog play would.
    /// A malformed entry is logged and skipped.
    pub(crate) fn open(
        &self,
        entry: &FavoriteEntry,
        user: Option<&AuthUser>,
        opener: &mut dyn PlaybackOpener,
    ) -> Option<VisibilityChange> {
        match entry.play_target(user) {
            Ok(target) => Some(opener.open(target)),
            Err(err) => {
                log::error!("cannot open favorite: {err}");
                None
            }
        }
    }
}

/// Signed-in links are stable per user; anonymous ones embed the current
/// time and differ between calls.
pub(crate) fn generate_share_link(
    origin: &str,
    entry: &FavoriteEntry,
    user: Option<&AuthUser>,
) -> String {
    let token = match user {
        Some(user) => user.id.clone(),
        None => Utc::now().timestamp_millis().to_string(),
    };
    format!(
        "{}/{SHARE_ROUTE}/{token}/{}",
        origin.trim_end_matches('/'),
        entry.id()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SharedLink {
    pub(crate) user_token: String,
    pub(crate) entry_id: String,
}

pub(crate) fn parse_share_link(url: &str) -> Option<SharedLink> {
    let path = url.split(['?', '#']).next()?;
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    segments.by_ref().find(|segment| *segment == SHARE_ROUTE)?;
    let user_token = segments.next()?.to_string();
    let entry_id = segments.next()?.to_string();
    if segments.next().is_some() {
        return None;
    }
    Some(SharedLink {
        user_token,
        entry_id,
    })
}

/// Everything the sharing user has saved; no session needed.
pub(crate) fn shared_favorites<R: FavoritesStore + ?Sized>(
    remote: &R,
    link: &SharedLink,
) -> Vec<FavoriteEntry> {
    match remote.select_favorites(&link.user_token) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("{err:#}");
            Vec::new()
        }
    }
}
