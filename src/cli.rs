use clap::{Args, Parser, Subcommand};

use crate::app::{FavoritesOrder, ShowOrder};

#[derive(Debug, Parser)]
#[command(
    name = "podtrack",
    version,
    about = "Browse podcasts, play episodes through mpv and remember where you stopped"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// No subcommand starts the TUI as well.
    pub fn runs_tui(&self) -> bool {
        matches!(self.command, None | Some(Command::Tui))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive terminal UI (default).
    Tui,
    /// List catalog shows.
    Shows {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t)]
        sort: ShowOrder,
    },
    /// Play one episode, resuming from its stored offset.
    Play(EpisodeArgs),
    /// Reopen the last played audio at the last recorded offset.
    Resume,
    /// Stored progress, most recent first.
    History,
    /// Favorites of the signed-in user.
    Favorites {
        #[arg(long, value_enum, default_value_t)]
        sort: FavoritesOrder,
    },
    /// Save an episode to favorites.
    Save(EpisodeArgs),
    /// Remove a favorite by season id.
    Remove { season_id: String },
    /// Print the share link for a favorite.
    Share { season_id: String },
    /// List the favorites behind a share link.
    Shared { url: String },
    Login,
    Signup,
    Logout,
    /// Wipe stored progress and the last played pointer.
    Clear,
}

#[derive(Debug, Args)]
pub struct EpisodeArgs {
    pub show: String,
    pub season: u32,
    pub episode: String,
}
