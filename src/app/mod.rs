mod favorites;
mod format;
pub(crate) mod identity;
mod playback;
mod remote;
mod tui;


use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use dialoguer::{Confirm, Input, Password, console::Term};

use crate::cli::{Cli, Command, EpisodeArgs};
use crate::config::{Config, SupabaseConfig};
use crate::db::Database;

use self::favorites::{
    Favorites, Selection, generate_share_link, parse_share_link, shared_favorites,
};
use self::format::{format_offset, format_timestamp_display, or_dash, truncate};
use self::playback::{MpvTransport, PlaybackState, PlayerShell, TransportEvent, with_sigint_ignored};
use self::remote::{
    AuthClient, AuthUser, CatalogClient, SupabaseFavorites, current_user, filter_shows, genre_list,
};

pub(crate) use self::favorites::FavoritesOrder;
pub(crate) use self::remote::ShowOrder;

type ForegroundShell<'a> = PlayerShell<'a, Database, MpvTransport>;

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let db = open_db(&config)?;

    match cli.command {
        Some(Command::Shows { search, sort }) => run_shows(&config, search.as_deref(), sort),
        Some(Command::Play(args)) => run_play(&config, &db, &args)?,
        Some(Command::Resume) => run_resume(&config, &db)?,
        Some(Command::History) => run_history(&db)?,
        Some(Command::Favorites { sort }) => run_favorites(&config, &db, sort)?,
        Some(Command::Save(args)) => run_save(&config, &db, &args)?,
        Some(Command::Remove { season_id }) => run_remove(&config, &db, &season_id)?,
        Some(Command::Share { season_id }) => run_share(&config, &db, &season_id)?,
        Some(Command::Shared { url }) => run_shared(&config, &url)?,
        Some(Command::Login) => run_login(&config, &db)?,
        Some(Command::Signup) => run_signup(&config, &db)?,
        Some(Command::Logout) => run_logout(&config, &db)?,
        Some(Command::Clear) => run_clear(&db)?,
        Some(Command::Tui) | None => tui::run_tui(&config, &db)?,
    }

    Ok(())
}

fn open_db(config: &Config) -> Result<Database> {
    let db = Database::open(&config.database_path)?;
    db.migrate()?;
    Ok(db)
}

fn run_shows(config: &Config, search: Option<&str>, sort: ShowOrder) {
    let catalog = CatalogClient::new(&config.catalog_url, config.timeouts);
    let mut shows = filter_shows(&catalog.shows_or_empty(), search.unwrap_or_default());
    if shows.is_empty() {
        println!("No shows found.");
        return;
    }
    sort.sort(&mut shows);

    println!(
        "{:<8} {:<40} {:<8} {:<32} {:<24}",
        "ID", "TITLE", "SEASONS", "GENRES", "UPDATED"
    );
    for show in shows {
        println!(
            "{:<8} {:<40} {:<8} {:<32} {:<24}",
            truncate(&show.id, 8),
            truncate(&show.title, 40),
            show.seasons,
            truncate(or_dash(&genre_list(&show.genres)), 32),
            format_timestamp_display(&show.updated)
        );
    }
}

fn run_play(config: &Config, db: &Database, args: &EpisodeArgs) -> Result<()> {
    let catalog = CatalogClient::new(&config.catalog_url, config.timeouts);
    let detail = catalog.fetch_show_detail(&args.show)?;
    let user_id = current_user(db).map(|user| user.id).unwrap_or_default();
    let target = detail
        .play_target(&user_id, args.season, &args.episode)
        .ok_or_else(|| {
            anyhow!(
                "episode {} not found in season {} of {}",
                args.episode,
                args.season,
                detail.title
            )
        })?;

    println!("Playing:");
    println!("  Show: {}", detail.title);
    println!("  Season: {}", args.season);
    println!("  Episode: {}", target.episode_title);
    run_foreground(config, db, |shell| {
        shell.open(target);
        true
    })
}

fn run_resume(config: &Config, db: &Database) -> Result<()> {
    run_foreground(config, db, |shell| {
        let resumed = shell.restore_once();
        if let Some(target) = shell.controller().target() {
            println!("Resuming {}", target.audio_url);
            if let Some(offset) = target.resume_hint {
                println!("  From: {}", format_offset(offset));
            }
        }
        resumed
    })
}

/// Plays in the foreground with the terminal handed to the player, until it
/// finishes or exits. `start` opens the player and reports whether anything
/// was mounted.
fn run_foreground<F>(config: &Config, db: &Database, start: F) -> Result<()>
where
    F: FnOnce(&mut ForegroundShell<'_>) -> bool,
{
    let (tx, rx) = mpsc::channel::<TransportEvent>();
    let transport = MpvTransport::new(config.player_bin.clone(), tx, true);
    let mut shell = PlayerShell::new(db, transport);

    with_sigint_ignored(|| {
        if !start(&mut shell) {
            println!("Nothing to resume yet. Play an episode first.");
            return Ok(());
        }
        if let Some(err) = shell.controller().last_error() {
            println!("Player launch failed: {err}");
            println!("Progress not updated.");
            return Ok(());
        }
        while shell.controller().state().is_live() {
            match rx.recv_timeout(Duration::from_millis(500)) {
                Ok(event) => shell.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    })?;

    let controller = shell.controller();
    match controller.state() {
        PlaybackState::Ended => println!("Finished. Marked as completed."),
        PlaybackState::Stopped => println!(
            "Stopped at {}. Progress saved.",
            format_offset(controller.offset_seconds())
        ),
        _ => {}
    }
    Ok(())
}

fn run_history(db: &Database) -> Result<()> {
    let records = db.list_progress()?;
    if records.is_empty() {
        println!("No stored progress yet. Run `podtrack play` first.");
        return Ok(());
    }

    println!(
        "{:<10} {:<10} {:<8} {:<10} {:<9} {:<5} {:<28}",
        "USER", "SHOW", "SEASON", "EPISODE", "OFFSET", "DONE", "UPDATED"
    );
    for record in records {
        let identity = &record.identity;
        println!(
            "{:<10} {:<10} {:<8} {:<10} {:<9} {:<5} {:<28}",
            truncate(or_dash(&identity.user_id), 10),
            truncate(or_dash(&identity.show_id), 10),
            truncate(or_dash(&identity.season_id), 8),
            truncate(or_dash(&identity.episode_id), 10),
            format_offset(record.offset_seconds),
            if record.completed { "yes" } else { "no" },
            format_timestamp_display(&record.updated_at)
        );
    }
    Ok(())
}

fn require_supabase(config: &Config) -> Result<&SupabaseConfig> {
    config.supabase.as_ref().context(
        "favorites and accounts need PODTRACK_SUPABASE_URL and PODTRACK_SUPABASE_ANON_KEY",
    )
}

fn favorites_remote(config: &Config, db: &Database) -> Result<SupabaseFavorites> {
    let supabase = require_supabase(config)?.clone();
    let token = db.current_session()?.map(|session| session.access_token);
    Ok(SupabaseFavorites::new(supabase, config.timeouts, token))
}

fn run_favorites(config: &Config, db: &Database, sort: FavoritesOrder) -> Result<()> {
    let remote = favorites_remote(config, db)?;
    let Some(user) = current_user(db) else {
        println!("Not signed in. Run `podtrack login` first.");
        return Ok(());
    };
    let mut favorites = Favorites::new(&remote);
    favorites.set_order(sort);
    let entries = favorites.list(Some(&user));
    if entries.is_empty() {
        println!("No favorites yet.");
        return Ok(());
    }
    print_favorites(entries, None);
    Ok(())
}

fn print_favorites(entries: &[favorites::FavoriteEntry], highlight: Option<&str>) {
    println!(
        "  {:<10} {:<32} {:<36} {:<24}",
        "SEASON ID", "SHOW", "EPISODE", "SAVED"
    );
    for entry in entries {
        let marker = if highlight == Some(entry.id()) { "*" } else { " " };
        println!(
            "{marker} {:<10} {:<32} {:<36} {:<24}",
            truncate(&entry.season_id, 10),
            truncate(or_dash(&entry.season_title), 32),
            truncate(or_dash(&entry.episode_title), 36),
            format_timestamp_display(&entry.date_saved)
        );
    }
}

fn run_save(config: &Config, db: &Database, args: &EpisodeArgs) -> Result<()> {
    let remote = favorites_remote(config, db)?;
    let user = current_user(db);
    let catalog = CatalogClient::new(&config.catalog_url, config.timeouts);
    let detail = catalog.fetch_show_detail(&args.show)?;

    let favorites = Favorites::new(&remote);
    match favorites.save(
        &Selection::new(args.season, args.episode.clone()),
        &detail,
        user.as_ref(),
    ) {
        Ok(entry) => println!(
            "Saved: {} ({})",
            entry.episode_title,
            or_dash(&entry.season_title)
        ),
        Err(err) => println!("Not saved: {err}"),
    }
    Ok(())
}

fn run_remove(config: &Config, db: &Database, season_id: &str) -> Result<()> {
    let remote = favorites_remote(config, db)?;
    let user = current_user(db);
    let mut favorites = Favorites::new(&remote);
    if favorites.remove(user.as_ref(), season_id) {
        println!("Removed favorite {season_id}.");
    } else {
        println!("Favorite {season_id} was not removed.");
    }
    Ok(())
}

fn run_share(config: &Config, db: &Database, season_id: &str) -> Result<()> {
    let remote = favorites_remote(config, db)?;
    let user = current_user(db);
    let mut favorites = Favorites::new(&remote);
    let Some(entry) = favorites
        .list(user.as_ref())
        .iter()
        .find(|entry| entry.id() == season_id)
    else {
        println!("No favorite with season id {season_id}.");
        return Ok(());
    };
    println!("{}", generate_share_link(&config.share_origin, entry, user.as_ref()));
    Ok(())
}

fn run_shared(config: &Config, url: &str) -> Result<()> {
    let Some(link) = parse_share_link(url) else {
        bail!("not a share link: {url}");
    };
    let supabase = require_supabase(config)?.clone();
    let remote = SupabaseFavorites::new(supabase, config.timeouts, None);
    let entries = shared_favorites(&remote, &link);
    if entries.is_empty() {
        println!("Nothing shared here.");
        return Ok(());
    }
    print_favorites(&entries, Some(&link.entry_id));
    Ok(())
}

fn prompt_credentials() -> Result<(String, String)> {
    let email: String = Input::new()
        .with_prompt("Email")
        .validate_with(|input: &String| required_email(input))
        .interact_text()
        .context("prompt failed")?;
    let password = Password::new()
        .with_prompt("Password")
        .interact()
        .context("prompt failed")?;
    credentials(&email, password)
}

fn required_email(input: &str) -> Result<(), &'static str> {
    if input.trim().is_empty() || !input.contains('@') {
        return Err("enter an email address");
    }
    Ok(())
}

/// Normalizes prompted credentials; the password is taken as typed.
fn credentials(email: &str, password: String) -> Result<(String, String)> {
    let email = email.trim();
    if required_email(email).is_err() || password.is_empty() {
        bail!("email and password are required");
    }
    Ok((email.to_string(), password))
}

fn run_login(config: &Config, db: &Database) -> Result<()> {
    let auth = AuthClient::new(require_supabase(config)?, config.timeouts, db);
    let (email, password) = prompt_credentials()?;
    match auth.log_in(&email, &password) {
        Ok(user) => println!("Signed in as {}.", display_user(&user)),
        Err(err) => {
            log::warn!("{err:#}");
            println!("Sign in failed: {err:#}");
        }
    }
    Ok(())
}

fn run_signup(config: &Config, db: &Database) -> Result<()> {
    let auth = AuthClient::new(require_supabase(config)?, config.timeouts, db);
    let (email, password) = prompt_credentials()?;
    match auth.sign_up(&email, &password) {
        Ok(()) => println!("Account created. Confirm your email, then run `podtrack login`."),
        Err(err) => {
            log::warn!("{err:#}");
            println!("Sign up failed: {err:#}");
        }
    }
    Ok(())
}

fn run_logout(config: &Config, db: &Database) -> Result<()> {
    let auth = AuthClient::new(require_supabase(config)?, config.timeouts, db);
    auth.log_out()?;
    println!("Signed out.");
    Ok(())
}

fn run_clear(db: &Database) -> Result<()> {
    let confirmed = Confirm::new()
        .with_prompt("Clear all stored progress and the last played episode?")
        .default(false)
        .interact_on(&Term::stderr())
        .context("prompt failed")?;
    if !confirmed {
        println!("Clear canceled.");
        return Ok(());
    }
    db.clear_all()?;
    println!("Stored progress cleared.");
    Ok(())
}

fn display_user(user: &AuthUser) -> &str {
    user.email.as_deref().unwrap_or(&user.id)
}
