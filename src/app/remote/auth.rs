use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::lenient_opt_string;
use crate::config::{HttpTimeouts, SupabaseConfig};
use crate::db::{Database, StoredSession};
use crate::http::{HttpRequest, Method, send_text};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct AuthUser {
    pub(crate) id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub(crate) email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// The signed-in user cached by the last successful login, if any.
pub(crate) fn current_user(db: &Database) -> Option<AuthUser> {
    match db.current_session() {
        Ok(session) => session.map(|session| AuthUser {
            id: session.user_id,
            email: session.email,
        }),
        Err(err) => {
            log::warn!("failed to read cached login: {err:#}");
            None
        }
    }
}

/// Password auth against Supabase. The session is cached locally so later
/// runs know who is signed in.
pub(crate) struct AuthClient<'a> {
    config: &'a SupabaseConfig,
    timeouts: HttpTimeouts,
    db: &'a Database,
}

impl<'a> AuthClient<'a> {
    pub(crate) fn new(config: &'a SupabaseConfig, timeouts: HttpTimeouts, db: &'a Database) -> Self {
        Self {
            config,
            timeouts,
            db,
        }
    }

    pub(crate) fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        let url = format!("{}/auth/v1/signup", self.config.url);
        let body = json!({ "email": email, "password": password }).to_string();
        let request = HttpRequest::new(Method::Post, &url)
            .header("apikey", self.config.anon_key.clone())
            .json_body(body);
        send_text(request, self.timeouts)
            .map_err(|err| anyhow!(err))
            .context("sign up failed")?;
        Ok(())
    }

    pub(crate) fn log_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let url = format!("{}/auth/v1/token", self.config.url);
        let body = json!({ "email": email, "password": password }).to_string();
        let request = HttpRequest::new(Method::Post, &url)
            .query("grant_type", "password")
            .header("apikey", self.config.anon_key.clone())
            .json_body(body);
        let raw = send_text(request, self.timeouts)
            .map_err(|err| anyhow!(err))
            .context("log in failed")?;
        let token: TokenResponse =
            serde_json::from_str(&raw).context("failed to parse login response")?;
        self.db.save_session(&StoredSession {
            user_id: token.user.id.clone(),
            email: token.user.email.clone(),
            access_token: token.access_token,
        })?;
        Ok(token.user)
    }

    /// Drops the local session even when the server call fails.
    pub(crate) fn log_out(&self) -> Result<()> {
        let session = self.db.current_session()?;
        self.db.clear_session()?;
        let Some(session) = session else {
            return Ok(());
        };
        let url = format!("{}/auth/v1/logout", self.config.url);
        let request = HttpRequest::new(Method::Post, &url)
            .header("apikey", self.config.anon_key.clone())
            .header("Authorization", format!("Bearer {}", session.access_token));
        if let Err(err) = send_text(request, self.timeouts) {
            log::warn!("server-side logout failed: {err}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthClient, current_user};
    use crate::config::SupabaseConfig;
    use crate::db::{Database, StoredSession};
    use crate::http::tests::{Behavior, TestServer, fast_timeouts};

    fn config(server: &TestServer) -> SupabaseConfig {
        SupabaseConfig {
            url: server.base_url.clone(),
            anon_key: "anon".to_string(),
        }
    }

    #[test]
    fn log_in_caches_the_session() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            200,
            r#"{"access_token":"jwt","user":{"id":"u1","email":"listener@example.com"}}"#
                .to_string(),
        )]);
        let db = Database::open_in_memory().expect("db");
        let config = config(&server);
        let auth = AuthClient::new(&config, fast_timeouts(), &db);

        let user = auth
            .log_in("listener@example.com", "secret")
            .expect("login should succeed");

        assert_eq!(user.id, "u1");
        assert_eq!(current_user(&db), Some(user));
        let session = db.current_session().expect("read").expect("session cached");
        assert_eq!(session.access_token, "jwt");
        assert!(server.requests()[0].starts_with("POST /auth/v1/token?grant_type=password "));
    }

    #[test]
    fn failed_log_in_caches_nothing() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            400,
            r#"{"error":"invalid_grant"}"#.to_string(),
        )]);
        let db = Database::open_in_memory().expect("db");
        let config = config(&server);
        let auth = AuthClient::new(&config, fast_timeouts(), &db);

        assert!(auth.log_in("listener@example.com", "wrong").is_err());
        assert_eq!(current_user(&db), None);
    }

    #[test]
    fn log_out_clears_session_even_when_server_fails() {
        let server = TestServer::spawn(vec![Behavior::Respond(500, "boom".to_string())]);
        let db = Database::open_in_memory().expect("db");
        db.save_session(&StoredSession {
            user_id: "u1".to_string(),
            email: None,
            access_token: "jwt".to_string(),
        })
        .expect("seed session");
        let config = config(&server);
        let auth = AuthClient::new(&config, fast_timeouts(), &db);

        auth.log_out().expect("logout should succeed");

        assert_eq!(current_user(&db), None);
        let request = &server.requests()[0];
        assert!(request.starts_with("POST /auth/v1/logout "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer jwt"));
    }
}
