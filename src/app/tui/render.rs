use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Padding, Paragraph, Row, Table, TableState, Wrap,
};

use super::super::favorites::FavoriteEntry;
use super::super::format::{format_offset, format_timestamp_display_tui, or_dash, truncate};
use super::super::playback::PlaybackState;
use super::super::remote::{Show, genre_list};
use super::{DetailState, EpisodeRow, PendingConfirm, PendingNotice, TuiState, View};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const TEXT: Color = Color::Rgb(230, 230, 230);

pub(super) fn draw_tui(frame: &mut Frame, state: &mut TuiState<'_>) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(header(state), chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[1]);
    match state.view {
        View::Shows => {
            render_shows(frame, body_chunks[0], &state.shows, &mut state.show_table);
            let selected = state.show_table.selected().and_then(|idx| state.shows.get(idx));
            render_details(frame, body_chunks[1], show_details(selected));
        }
        View::Episodes => {
            render_episodes(frame, body_chunks[0], &state.episodes, &mut state.episode_table);
            let selected = state
                .episode_table
                .selected()
                .and_then(|idx| state.episodes.get(idx));
            render_details(frame, body_chunks[1], episode_details(state.detail.as_ref(), selected));
        }
        View::Favorites => {
            let entries = state
                .favorites
                .as_ref()
                .map(|favorites| favorites.entries())
                .unwrap_or_default();
            render_favorites(frame, body_chunks[0], entries, &mut state.favorites_table);
            let selected = state.favorites_table.selected().and_then(|idx| entries.get(idx));
            render_details(frame, body_chunks[1], favorite_details(selected, state.user.is_some()));
        }
    }

    frame.render_widget(player_bar(state), chunks[2]);

    let command_bar = Paragraph::new(controls_line(state.view))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[3]);

    let status_widget = Paragraph::new(state.status.clone())
        .style(status_style(&state.status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[4]);

    if let Some(pending) = state.pending_confirm.as_ref() {
        let (title, text) = confirm_text(pending);
        render_modal(frame, title, &text);
    } else if let Some(PendingNotice { title, message }) = state.pending_notice.as_ref() {
        render_modal(frame, *title, message);
    }
}

fn header(state: &TuiState<'_>) -> Paragraph<'static> {
    let account = match &state.user {
        Some(user) => user.email.clone().unwrap_or_else(|| user.id.clone()),
        None => "signed out".to_string(),
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            "PODTRACK",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        view_pill(View::Shows, state.view),
        Span::styled(" ", Style::default()),
        view_pill(View::Episodes, state.view),
        Span::styled(" ", Style::default()),
        view_pill(View::Favorites, state.view),
        Span::styled("   ", Style::default()),
        Span::styled(account, Style::default().fg(MUTED)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"))
}

fn render_shows(frame: &mut Frame, area: Rect, shows: &[Show], table_state: &mut TableState) {
    let rows: Vec<Row> = shows
        .iter()
        .map(|show| {
            Row::new(vec![
                Cell::from(show.title.clone()),
                Cell::from(show.seasons.to_string()),
                Cell::from(format_timestamp_display_tui(&show.updated)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(60),
            Constraint::Length(8),
            Constraint::Length(18),
        ],
    )
    .header(header_row(&["Title", "Seasons", "Updated"]));
    render_table(frame, area, table, "Shows", table_state);
}

fn render_episodes(
    frame: &mut Frame,
    area: Rect,
    episodes: &[EpisodeRow],
    table_state: &mut TableState,
) {
    let rows: Vec<Row> = episodes
        .iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.season_number.to_string()),
                Cell::from(row.episode_id.clone()),
                Cell::from(row.title.clone()),
                Cell::from(row.offset_seconds.map(format_offset).unwrap_or_else(|| "-".to_string())),
                Cell::from(if row.completed { "✓" } else { "" }),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Percentage(60),
            Constraint::Length(9),
            Constraint::Length(4),
        ],
    )
    .header(header_row(&["Season", "Ep", "Title", "Position", "Done"]));
    render_table(frame, area, table, "Episodes", table_state);
}

fn render_favorites(
    frame: &mut Frame,
    area: Rect,
    entries: &[FavoriteEntry],
    table_state: &mut TableState,
) {
    let rows: Vec<Row> = entries
        .iter()
        .map(|entry| {
            Row::new(vec![
                Cell::from(or_dash(&entry.season_title).to_string()),
                Cell::from(or_dash(&entry.episode_title).to_string()),
                Cell::from(format_timestamp_display_tui(&entry.date_saved)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(38),
            Constraint::Percentage(40),
            Constraint::Length(18),
        ],
    )
    .header(header_row(&["Show", "Episode", "Saved"]));
    render_table(frame, area, table, "Favorites", table_state);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.to_vec()).style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
}

fn render_table(
    frame: &mut Frame,
    area: Rect,
    table: Table<'_>,
    title: &'static str,
    table_state: &mut TableState,
) {
    let table = table
        .block(panel_block(title))
        .row_highlight_style(
            Style::default()
                .bg(ACCENT)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, table_state);
}

fn render_details(frame: &mut Frame, area: Rect, text: String) {
    let details = Paragraph::new(text)
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: true })
        .block(panel_block("Selected"))
        .alignment(Alignment::Left);
    frame.render_widget(details, area);
}

fn show_details(show: Option<&Show>) -> String {
    let Some(show) = show else {
        return "No shows loaded.\n\nPress r to retry the catalog.".to_string();
    };
    format!(
        "Title\n{}\n\nGenres\n{}\n\nSeasons\n{}\n\nUpdated\n{}\n\n{}",
        truncate(&show.title, 40),
        or_dash(&genre_list(&show.genres)),
        show.seasons,
        format_timestamp_display_tui(&show.updated),
        truncate(&show.description, 280),
    )
}

fn episode_details(detail: Option<&DetailState>, row: Option<&EpisodeRow>) -> String {
    match detail {
        None => "Pick a show and press Enter.".to_string(),
        Some(DetailState::Loading { .. }) => "Loading episodes...".to_string(),
        Some(DetailState::Failed { message, .. }) => format!("Could not load show.\n\n{message}"),
        Some(DetailState::Ready(show)) => match row {
            Some(row) => format!(
                "Show\n{}\n\nSeason\n{}\n\nEpisode\n{}\n\nPosition\n{}\n\nCompleted\n{}",
                truncate(&show.title, 40),
                truncate(or_dash(&row.season_title), 40),
                truncate(&row.title, 40),
                row.offset_seconds
                    .map(format_offset)
                    .unwrap_or_else(|| "not started".to_string()),
                if row.completed { "yes" } else { "no" },
            ),
            None => format!("{}\n\nNo episodes.", truncate(&show.title, 40)),
        },
    }
}

fn favorite_details(entry: Option<&FavoriteEntry>, signed_in: bool) -> String {
    match entry {
        Some(entry) => format!(
            "Show\n{}\n\nEpisode\n{}\n\nSeason id\n{}\n\nSaved\n{}",
            truncate(or_dash(&entry.season_title), 40),
            truncate(or_dash(&entry.episode_title), 40),
            or_dash(&entry.season_id),
            format_timestamp_display_tui(&entry.date_saved),
        ),
        None if signed_in => "No favorites yet.\n\nPress s on an episode to save it.".to_string(),
        None => "Signed out.\n\nRun `podtrack login` to use favorites.".to_string(),
    }
}

fn player_bar(state: &TuiState<'_>) -> Paragraph<'static> {
    let controller = state.shell.controller();
    let playback = controller.state();
    let line = match controller.target() {
        Some(target) if state.shell.visibility().is_visible() => {
            let name = if target.episode_title.is_empty() {
                target.audio_url.clone()
            } else {
                target.episode_title.clone()
            };
            let mut spans = vec![
                Span::styled(format!(" {} ", playback.label()), playback_pill(playback)),
                Span::styled("  ", Style::default()),
                Span::styled(truncate(&name, 60), Style::default().fg(TEXT)),
                Span::styled("  ", Style::default()),
                Span::styled(
                    format_offset(controller.offset_seconds()),
                    Style::default().fg(MUTED),
                ),
            ];
            if controller.is_completed() {
                spans.push(Span::styled("  ✓ completed", Style::default().fg(MUTED)));
            }
            if target.identity.is_placeholder() {
                spans.push(Span::styled("  (restored)", Style::default().fg(MUTED)));
            }
            Line::from(spans)
        }
        _ => Line::from(Span::styled("Nothing playing.", Style::default().fg(MUTED))),
    };
    Paragraph::new(line)
        .alignment(Alignment::Left)
        .block(panel_block("Player"))
}

fn playback_pill(playback: PlaybackState) -> Style {
    match playback {
        PlaybackState::Playing | PlaybackState::Ended => pill_active(),
        _ => pill_inactive(),
    }
}

fn confirm_text(pending: &PendingConfirm) -> (&'static str, String) {
    match pending {
        PendingConfirm::RemoveFavorite { title, .. } => (
            "Confirm Remove",
            format!(
                "Remove favorite?\n\n{}\n\n[y / Enter] Remove   [n / Esc] Cancel",
                truncate(title, 56)
            ),
        ),
        PendingConfirm::ClosePlayer(_) => (
            "Confirm Close",
            "Close the player?\n\nProgress so far is kept.\n\n[y / Enter] Close   [n / Esc] Cancel"
                .to_string(),
        ),
        PendingConfirm::ClearStorage => (
            "Confirm Clear",
            "Clear all stored progress?\n\nThis cannot be undone.\n\n[y / Enter] Clear   [n / Esc] Cancel"
                .to_string(),
        ),
    }
}

fn render_modal(frame: &mut Frame, title: &'static str, text: &str) {
    let popup_area = popup_rect_for_text(frame.area(), text);
    render_popup_shadow(frame, popup_area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(text.to_string())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(title));
    frame.render_widget(popup, popup_area);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_active() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn view_pill(view: View, current: View) -> Span<'static> {
    let style = if view == current {
        pill_active()
    } else {
        pill_inactive()
    };
    Span::styled(format!(" {} ", view.label()), style)
}

fn controls_line(view: View) -> Line<'static> {
    let keys = match view {
        View::Shows => "↑/↓ move  Enter open  o sort  r reload  Tab view  c close  C clear  q quit",
        View::Episodes => "↑/↓ move  Enter play  s save  u unmark  Esc back  c close  C clear  q quit",
        View::Favorites => {
            "↑/↓ move  Enter play  d remove  x share  o sort  Esc back  c close  q quit"
        }
    };
    Line::from(Span::styled(keys, Style::default().fg(MUTED)))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 48.min(available_width);
    let max_width = 88.min(available_width);
    let desired_width = max_line_width.saturating_add(12);
    let width = desired_width.clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 10.min(available_height);
    let max_height = 18.min(available_height);
    let desired_height = line_count.saturating_add(6);
    let height = desired_height.clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
