mod actions;
mod render;
mod session;

use std::io;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::config::Config;
use crate::db::Database;

use super::favorites::Favorites;
use super::playback::{CloseRequest, MpvTransport, PlayerShell, TransportEvent};
use super::remote::{AuthUser, CatalogClient, Show, ShowDetail, ShowOrder, SupabaseFavorites, current_user};

use self::actions::{
    PlayerActivity, drain_player_events, drain_show_fetch_results, status_error, status_info,
};
use self::render::draw_tui;
use self::session::TuiSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum View {
    Shows,
    Episodes,
    Favorites,
}

impl View {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Shows => "SHOWS",
            Self::Episodes => "EPISODES",
            Self::Favorites => "FAVORITES",
        }
    }

    pub(super) fn next(self) -> Self {
        match self {
            Self::Shows => Self::Episodes,
            Self::Episodes => Self::Favorites,
            Self::Favorites => Self::Shows,
        }
    }
}

pub(super) enum PendingConfirm {
    RemoveFavorite { season_id: String, title: String },
    ClosePlayer(CloseRequest),
    ClearStorage,
}

#[derive(Debug, Clone)]
pub(super) struct PendingNotice {
    pub(super) title: &'static str,
    pub(super) message: String,
}

#[derive(Debug)]
pub(super) struct ShowFetchResult {
    pub(super) show_id: String,
    pub(super) detail: Result<ShowDetail, String>,
}

#[derive(Debug, Clone)]
pub(super) enum DetailState {
    Loading { show_id: String },
    Ready(ShowDetail),
    Failed { show_id: String, message: String },
}

impl DetailState {
    pub(super) fn show_id(&self) -> &str {
        match self {
            Self::Loading { show_id } | Self::Failed { show_id, .. } => show_id,
            Self::Ready(detail) => &detail.id,
        }
    }

    pub(super) fn detail(&self) -> Option<&ShowDetail> {
        match self {
            Self::Ready(detail) => Some(detail),
            _ => None,
        }
    }
}

/// One playable line of the episodes view, with what the store knows about it.
#[derive(Debug, Clone)]
pub(super) struct EpisodeRow {
    pub(super) season_number: u32,
    pub(super) season_title: String,
    pub(super) episode_id: String,
    pub(super) title: String,
    pub(super) offset_seconds: Option<f64>,
    pub(super) completed: bool,
}

pub(super) struct TuiState<'a> {
    config: &'a Config,
    db: &'a Database,
    user: Option<AuthUser>,
    view: View,
    shows: Vec<Show>,
    show_order: ShowOrder,
    show_table: TableState,
    detail: Option<DetailState>,
    episodes: Vec<EpisodeRow>,
    episode_table: TableState,
    favorites: Option<Favorites<'a, SupabaseFavorites>>,
    favorites_table: TableState,
    shell: PlayerShell<'a, Database, MpvTransport>,
    pending_confirm: Option<PendingConfirm>,
    pending_notice: Option<PendingNotice>,
    status: String,
}

pub(crate) fn run_tui(config: &Config, db: &Database) -> Result<()> {
    let remote = match &config.supabase {
        Some(supabase) => {
            let token = db.current_session()?.map(|session| session.access_token);
            Some(SupabaseFavorites::new(supabase.clone(), config.timeouts, token))
        }
        None => None,
    };
    let (player_tx, player_rx) = mpsc::channel::<TransportEvent>();
    let shell = PlayerShell::new(
        db,
        MpvTransport::new(config.player_bin.clone(), player_tx, false),
    );
    let mut shows = CatalogClient::new(&config.catalog_url, config.timeouts).shows_or_empty();
    let show_order = ShowOrder::default();
    show_order.sort(&mut shows);

    let mut show_table = TableState::default();
    show_table.select((!shows.is_empty()).then_some(0));
    let status = if shows.is_empty() {
        status_error("Catalog is empty or unreachable. Press r to retry.")
    } else {
        status_info("Ready.")
    };
    let mut state = TuiState {
        config,
        db,
        user: current_user(db),
        view: View::Shows,
        shows,
        show_order,
        show_table,
        detail: None,
        episodes: Vec::new(),
        episode_table: TableState::default(),
        favorites: remote.as_ref().map(Favorites::new),
        favorites_table: TableState::default(),
        shell,
        pending_confirm: None,
        pending_notice: None,
        status,
    };
    if state.shell.restore_once() {
        state.status = status_info("Resumed the last played episode.");
    }

    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;
    let (fetch_tx, fetch_rx) = mpsc::channel::<ShowFetchResult>();

    loop {
        match drain_player_events(&player_rx, &mut state) {
            PlayerActivity::Transition => state.refresh_episode_rows(),
            PlayerActivity::Progress => state.sync_playing_row(),
            PlayerActivity::Quiet => {}
        }
        drain_show_fetch_results(&fetch_rx, &mut state);
        terminal.draw(|frame| draw_tui(frame, &mut state))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.pending_notice.is_some() {
            state.pending_notice = None;
            continue;
        }

        if state.pending_confirm.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => state.confirm_pending(),
                KeyCode::Esc | KeyCode::Char('n') => {
                    state.pending_confirm = None;
                    state.status = status_info("Canceled.");
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Up => state.move_selection(-1),
            KeyCode::Down => state.move_selection(1),
            KeyCode::Tab => state.switch_view(state.view.next()),
            KeyCode::Char('f') => state.switch_view(View::Favorites),
            KeyCode::Esc => state.back(),
            KeyCode::Enter => state.activate(&fetch_tx),
            KeyCode::Char('s') => state.save_selected(),
            KeyCode::Char('d') => state.ask_remove(),
            KeyCode::Char('x') => state.share_selected(),
            KeyCode::Char('o') => state.cycle_order(),
            KeyCode::Char('u') => state.reset_completion(),
            KeyCode::Char('r') => state.refresh_view(),
            KeyCode::Char('c') => state.ask_close(),
            KeyCode::Char('C') => {
                state.pending_confirm = Some(PendingConfirm::ClearStorage);
                state.status = status_info("Confirm clear: y/Enter to clear, n/Esc to cancel.");
            }
            _ => {}
        }
    }

    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}
