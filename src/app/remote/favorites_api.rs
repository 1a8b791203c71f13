use anyhow::{Context, Result, anyhow};

use crate::app::favorites::{FavoriteEntry, FavoriteRecord};
use crate::config::{HttpTimeouts, SupabaseConfig};
use crate::http::{HttpRequest, Method, send_text};

const FAVORITE_COLUMNS: &str = "season_id,episode_id,season_number,episode_title,season_title,season_image,date_saved,mp3_file,seasons_titles";

/// Row storage for favorites, keyed by user and season.
pub(crate) trait FavoritesStore {
    fn insert_favorite(&self, record: &FavoriteRecord<'_>) -> Result<()>;
    fn delete_favorite(&self, user_id: &str, season_id: &str) -> Result<()>;
    fn select_favorites(&self, user_id: &str) -> Result<Vec<FavoriteEntry>>;
}

/// `favorites` table behind Supabase's REST interface.
pub(crate) struct SupabaseFavorites {
    config: SupabaseConfig,
    timeouts: HttpTimeouts,
    access_token: Option<String>,
}

impl SupabaseFavorites {
    pub(crate) fn new(
        config: SupabaseConfig,
        timeouts: HttpTimeouts,
        access_token: Option<String>,
    ) -> Self {
        Self {
            config,
            timeouts,
            access_token,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/favorites", self.config.url)
    }

    fn authorized<'a>(&self, request: HttpRequest<'a>) -> HttpRequest<'a> {
        let bearer = self
            .access_token
            .as_deref()
            .unwrap_or(self.config.anon_key.as_str());
        request
            .header("apikey", self.config.anon_key.clone())
            .header("Authorization", format!("Bearer {bearer}"))
    }
}

impl FavoritesStore for SupabaseFavorites {
    fn insert_favorite(&self, record: &FavoriteRecord<'_>) -> Result<()> {
        let url = self.table_url();
        let body = serde_json::to_string(&[record]).context("failed to encode favorite")?;
        let request = self
            .authorized(HttpRequest::new(Method::Post, &url))
            .header("Prefer", "return=minimal")
            .json_body(body);
        send_text(request, self.timeouts)
            .map_err(|err| anyhow!(err))
            .context("failed to insert favorite")?;
        Ok(())
    }

    fn delete_favorite(&self, user_id: &str, season_id: &str) -> Result<()> {
        let url = self.table_url();
        let request = self
            .authorized(HttpRequest::new(Method::Delete, &url))
            .query("user_id", format!("eq.{user_id}"))
            .query("season_id", format!("eq.{season_id}"));
        send_text(request, self.timeouts)
            .map_err(|err| anyhow!(err))
            .with_context(|| format!("failed to delete favorite {season_id}"))?;
        Ok(())
    }

    fn select_favorites(&self, user_id: &str) -> Result<Vec<FavoriteEntry>> {
        let url = self.table_url();
        let request = self
            .authorized(HttpRequest::new(Method::Get, &url))
            .query("select", FAVORITE_COLUMNS)
            .query("user_id", format!("eq.{user_id}"));
        let body = send_text(request, self.timeouts)
            .map_err(|err| anyhow!(err))
            .context("failed to fetch favorites")?;
        serde_json::from_str(&body).context("failed to parse favorites")
    }
}

#[cfg(test)]
mod tests {
    use super::{FavoritesStore, SupabaseFavorites};
    use crate::app::favorites::{FavoriteEntry, FavoriteRecord};
    use crate::config::SupabaseConfig;
    use crate::http::tests::{Behavior, TestServer, fast_timeouts};

    fn client(server: &TestServer, token: Option<&str>) -> SupabaseFavorites {
        SupabaseFavorites::new(
            SupabaseConfig {
                url: server.base_url.clone(),
                anon_key: "anon".to_string(),
            },
            fast_timeouts(),
            token.map(str::to_string),
        )
    }

    #[test]
    fn delete_filters_by_user_and_season() {
        let server = TestServer::spawn(vec![Behavior::Respond(204, String::new())]);

        client(&server, Some("jwt"))
            .delete_favorite("u1", "10")
            .expect("delete should succeed");

        let request = &server.requests()[0];
        assert!(
            request.starts_with("DELETE /rest/v1/favorites?user_id=eq.u1&season_id=eq.10 "),
            "unexpected request line: {request}"
        );
        assert!(request.to_ascii_lowercase().contains("authorization: bearer jwt"));
    }

    #[test]
    fn insert_sends_one_flat_row_with_user() {
        let server = TestServer::spawn(vec![Behavior::Respond(201, String::new())]);
        let entry = FavoriteEntry {
            season_id: "10".to_string(),
            episode_id: Some("5".to_string()),
            season_number: Some(2),
            episode_title: "Fifth".to_string(),
            mp3_file: "https://audio.example/10-2-5.mp3".to_string(),
            ..FavoriteEntry::default()
        };

        client(&server, None)
            .insert_favorite(&FavoriteRecord {
                user_id: "u1",
                entry: &entry,
            })
            .expect("insert should succeed");

        let request = &server.requests()[0];
        assert!(request.starts_with("POST /rest/v1/favorites "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer anon"));
        let body = request.split("\r\n\r\n").nth(1).expect("request body");
        let rows: serde_json::Value = serde_json::from_str(body).expect("body is json");
        let rows = rows.as_array().expect("body is an array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], "u1");
        assert_eq!(rows[0]["season_id"], "10");
        assert_eq!(rows[0]["episode_id"], "5");
        assert!(rows[0].get("entry").is_none());
    }

    #[test]
    fn select_parses_rows_and_surfaces_errors() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(
                200,
                r#"[{"season_id": 10, "episode_title": "Fifth", "mp3_file": null}]"#.to_string(),
            ),
            Behavior::Respond(401, r#"{"message":"JWT expired"}"#.to_string()),
        ]);
        let remote = client(&server, Some("jwt"));

        let rows = remote.select_favorites("u1").expect("select should succeed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].season_id, "10");
        assert_eq!(rows[0].mp3_file, "");
        assert!(server.requests()[0].contains("user_id=eq.u1"));

        let err = remote.select_favorites("u1").expect_err("401 should fail");
        assert!(format!("{err:#}").contains("JWT expired"), "unexpected error: {err:#}");
    }
}
