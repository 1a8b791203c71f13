use std::cmp::Ordering;

use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use super::{lenient_string, null_as_default};
use crate::app::identity::{PlaybackIdentity, PlaybackTarget};
use crate::config::HttpTimeouts;
use crate::http::{HttpRequest, Method, send_text};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Show {
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) seasons: u32,
    #[serde(default, deserialize_with = "genre_ids")]
    pub(crate) genres: Vec<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) updated: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Episode {
    #[serde(default, alias = "episode", deserialize_with = "lenient_string")]
    pub(crate) id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) file: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Season {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) season: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) episodes: Vec<Episode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ShowDetail {
    #[serde(deserialize_with = "lenient_string")]
    pub(crate) id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) seasons: Vec<Season>,
}

impl ShowDetail {
    /// Looks a season up by its number, falling back to its 1-based position.
    pub(crate) fn season(&self, number: u32) -> Option<&Season> {
        self.seasons
            .iter()
            .find(|season| season.season == number)
            .or_else(|| {
                number
                    .checked_sub(1)
                    .and_then(|idx| self.seasons.get(idx as usize))
            })
    }

    pub(crate) fn episode(&self, season_number: u32, episode_id: &str) -> Option<(&Season, &Episode)> {
        let season = self.season(season_number)?;
        let episode = season
            .episodes
            .iter()
            .find(|episode| episode.id == episode_id)?;
        Some((season, episode))
    }

    /// The identity and resource a catalog play action hands to the player.
    pub(crate) fn play_target(
        &self,
        user_id: &str,
        season_number: u32,
        episode_id: &str,
    ) -> Option<PlaybackTarget> {
        let (season, episode) = self.episode(season_number, episode_id)?;
        Some(PlaybackTarget::new(
            PlaybackIdentity::new(user_id, &self.id, season_identity(season), &episode.id),
            &episode.file,
            &episode.title,
        ))
    }
}

pub(crate) fn season_identity(season: &Season) -> String {
    season.season.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ShowOrder {
    #[default]
    TitleAsc,
    TitleDesc,
    UpdatedNewest,
    UpdatedOldest,
}

impl ShowOrder {
    pub(crate) fn next(self) -> Self {
        match self {
            Self::TitleAsc => Self::TitleDesc,
            Self::TitleDesc => Self::UpdatedNewest,
            Self::UpdatedNewest => Self::UpdatedOldest,
            Self::UpdatedOldest => Self::TitleAsc,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::TitleAsc => "title A-Z",
            Self::TitleDesc => "title Z-A",
            Self::UpdatedNewest => "recently updated",
            Self::UpdatedOldest => "least recently updated",
        }
    }

    pub(crate) fn sort(self, shows: &mut [Show]) {
        match self {
            Self::TitleAsc => shows.sort_by(|a, b| compare_titles(&a.title, &b.title)),
            Self::TitleDesc => shows.sort_by(|a, b| compare_titles(&b.title, &a.title)),
            Self::UpdatedNewest => shows.sort_by(|a, b| compare_updated(&b.updated, &a.updated)),
            Self::UpdatedOldest => shows.sort_by(|a, b| compare_updated(&a.updated, &b.updated)),
        }
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn compare_updated(a: &str, b: &str) -> Ordering {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Case-insensitive title match; an empty query keeps everything.
pub(crate) fn filter_shows(shows: &[Show], query: &str) -> Vec<Show> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return shows.to_vec();
    }
    shows
        .iter()
        .filter(|show| show.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

pub(crate) fn genre_name(id: u32) -> Option<&'static str> {
    match id {
        1 => Some("Personal Growth"),
        2 => Some("True Crime and Investigative Journalism"),
        3 => Some("History"),
        4 => Some("Comedy"),
        5 => Some("Entertainment"),
        6 => Some("Business"),
        7 => Some("Fiction"),
        8 => Some("News"),
        9 => Some("Kids and Family"),
        _ => None,
    }
}

/// "A, B and C" the way the show cards list genres.
pub(crate) fn genre_list(ids: &[u32]) -> String {
    let names: Vec<&str> = ids.iter().filter_map(|id| genre_name(*id)).collect();
    match names.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [rest @ .., last] => format!("{} and {last}", rest.join(", ")),
    }
}

fn genre_ids<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<Value> = null_as_default(deserializer)?;
    Ok(values
        .iter()
        .filter_map(|value| match value {
            Value::Number(number) => number.as_u64().and_then(|id| u32::try_from(id).ok()),
            Value::String(text) => text.trim().parse::<u32>().ok(),
            _ => None,
        })
        .collect())
}

pub(crate) struct CatalogClient {
    base_url: String,
    timeouts: HttpTimeouts,
}

impl CatalogClient {
    pub(crate) fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Self {
        Self {
            base_url: base_url.into(),
            timeouts,
        }
    }

    pub(crate) fn fetch_all_shows(&self) -> Result<Vec<Show>> {
        let url = format!("{}/shows", self.base_url);
        let body = send_text(HttpRequest::new(Method::Get, &url), self.timeouts)
            .map_err(|err| anyhow!(err))
            .context("failed to fetch shows")?;
        serde_json::from_str(&body).context("failed to parse show list")
    }

    pub(crate) fn fetch_show_detail(&self, show_id: &str) -> Result<ShowDetail> {
        let url = format!("{}/id/{}", self.base_url, show_id.trim());
        let body = send_text(HttpRequest::new(Method::Get, &url), self.timeouts)
            .map_err(|err| anyhow!(err))
            .with_context(|| format!("failed to fetch show {show_id}"))?;
        serde_json::from_str(&body).with_context(|| format!("failed to parse show {show_id}"))
    }

    /// Catalog listing for views: a failed fetch shows up as an empty list.
    pub(crate) fn shows_or_empty(&self) -> Vec<Show> {
        match self.fetch_all_shows() {
            Ok(shows) => shows,
            Err(err) => {
                log::warn!("{err:#}");
                Vec::new()
            }
        }
    }
}
