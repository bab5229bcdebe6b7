//! Terminal rendering module
//!
//! Layout maps the percentage playfield to cells; drawing is done with
//! crossterm commands queued on any `Write`.

pub mod layout;
pub mod terminal;

pub use layout::Layout;
pub use terminal::{
    GameOverView, LeaderboardView, MenuView, RenderOptions, render_game, render_game_over,
    render_leaderboard, render_menu,
};
