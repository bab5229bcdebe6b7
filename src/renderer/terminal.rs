//! Crossterm drawing
//!
//! Each function takes a writer and an immutable view of what to show,
//! queues terminal commands and flushes once. No game logic happens here.

use std::io::{self, Write};

use crossterm::{
    QueueableCommand, cursor,
    style::{self, Attribute, Color, Print},
    terminal,
};

use super::layout::{Layout, centered, label, sprite};
use crate::leaderboard::{Leaderboard, LeaderboardFilter, format_date, format_player};
use crate::settings::Settings;
use crate::sim::{FinalScore, GameState, ItemKind, PenaltyPolicy};
use crate::tuning::Difficulty;

// Palette
const C_BORDER: Color = Color::DarkBlue;
const C_FLASH: Color = Color::Red;
const C_SCORE: Color = Color::Yellow;
const C_LIVES: Color = Color::Red;
const C_TIMER: Color = Color::Cyan;
const C_TIMER_LOW: Color = Color::Red;
const C_BAND: Color = Color::DarkGrey;
const C_HINT: Color = Color::DarkGrey;
const C_DONE: Color = Color::Green;
const C_TITLE: Color = Color::Cyan;

/// Timer at or below this many seconds is drawn as a warning
const TIMER_WARN_SECS: u32 = 10;

fn item_color(kind: ItemKind) -> Color {
    match kind {
        ItemKind::Snowball => Color::White,
        ItemKind::Coal => Color::DarkGrey,
        ItemKind::Carrot => Color::DarkYellow,
        ItemKind::Hat => Color::Blue,
        ItemKind::Scarf => Color::Magenta,
    }
}

fn difficulty_color(difficulty: Difficulty) -> Color {
    match difficulty {
        Difficulty::Easy => Color::Green,
        Difficulty::Medium => Color::Yellow,
        Difficulty::Hard => Color::Red,
    }
}

/// Display switches taken from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub color: bool,
    pub show_next_hint: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: true,
            show_next_hint: true,
        }
    }
}

impl From<&Settings> for RenderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            color: settings.color,
            show_next_hint: settings.show_next_hint,
        }
    }
}

/// Writer wrapper that drops colour commands when colour is off
struct Pen<'a, W: Write> {
    out: &'a mut W,
    color: bool,
}

impl<'a, W: Write> Pen<'a, W> {
    fn new(out: &'a mut W, opts: &RenderOptions) -> Self {
        Self {
            out,
            color: opts.color,
        }
    }

    fn fg(&mut self, color: Color) -> io::Result<&mut Self> {
        if self.color {
            self.out.queue(style::SetForegroundColor(color))?;
        }
        Ok(self)
    }

    fn bold(&mut self, on: bool) -> io::Result<&mut Self> {
        if self.color {
            let attr = if on {
                Attribute::Bold
            } else {
                Attribute::NormalIntensity
            };
            self.out.queue(style::SetAttribute(attr))?;
        }
        Ok(self)
    }

    fn at(&mut self, col: u16, row: u16) -> io::Result<&mut Self> {
        self.out.queue(cursor::MoveTo(col, row))?;
        Ok(self)
    }

    fn text(&mut self, text: &str) -> io::Result<&mut Self> {
        self.out.queue(Print(text))?;
        Ok(self)
    }

    fn clear(&mut self) -> io::Result<()> {
        self.out.queue(terminal::Clear(terminal::ClearType::All))?;
        Ok(())
    }

    fn finish(&mut self, park_row: u16) -> io::Result<()> {
        if self.color {
            self.out.queue(style::ResetColor)?;
            self.out.queue(style::SetAttribute(Attribute::Reset))?;
        }
        self.out.queue(cursor::MoveTo(0, park_row))?;
        self.out.flush()
    }
}

/// Render one frame of a running (or just finished) session
pub fn render_game<W: Write>(
    out: &mut W,
    layout: &Layout,
    state: &GameState,
    opts: &RenderOptions,
) -> io::Result<()> {
    let mut pen = Pen::new(out, opts);
    pen.clear()?;
    draw_hud(&mut pen, layout, state)?;
    draw_progress(&mut pen, layout, state, opts)?;
    draw_frame(&mut pen, layout, state.penalty_flash)?;
    draw_band(&mut pen, layout)?;
    draw_items(&mut pen, layout, state, opts)?;
    if state.penalty_flash {
        let msg = "!! PENALTY !!";
        pen.fg(C_FLASH)?
            .bold(true)?
            .at(centered(layout.width, msg), layout.field.y)?
            .text(msg)?
            .bold(false)?;
    }
    draw_footer(
        &mut pen,
        layout,
        "Click items to catch   N: next part   R: restart   Q: quit",
    )?;
    pen.finish(layout.footer_row())
}

fn draw_hud<W: Write>(pen: &mut Pen<'_, W>, layout: &Layout, state: &GameState) -> io::Result<()> {
    let left = format!("Score: {}  Combo: x{}", state.score, state.combo);
    pen.fg(C_SCORE)?.at(1, 0)?.text(&left)?;

    let tier = format!("[ {} ]", state.difficulty.as_str().to_uppercase());
    pen.fg(difficulty_color(state.difficulty))?
        .at(centered(layout.width, &tier), 0)?
        .text(&tier)?;

    let hearts = "♥".repeat(state.lives as usize);
    let lives = format!("Lives: {:<5}", hearts);
    let timer = format!("Time: {:>2}s  ", state.timer_secs);
    let right_len = (timer.chars().count() + lives.chars().count()) as u16;
    let col = layout.width.saturating_sub(right_len + 1);
    let timer_color = if state.timer_secs <= TIMER_WARN_SECS {
        C_TIMER_LOW
    } else {
        C_TIMER
    };
    pen.fg(timer_color)?.at(col, 0)?.text(&timer)?;
    pen.fg(C_LIVES)?.text(&lives)?;
    Ok(())
}

fn draw_progress<W: Write>(
    pen: &mut Pen<'_, W>,
    layout: &Layout,
    state: &GameState,
    opts: &RenderOptions,
) -> io::Result<()> {
    pen.fg(C_HINT)?.at(1, 1)?.text("Snowman:")?;
    for kind in ItemKind::ORDERED {
        let color = if state.snowman.has(kind) {
            C_DONE
        } else {
            C_HINT
        };
        pen.fg(color)?.text(" ")?.text(label(kind))?;
    }
    let scarf = if state.snowman.has_scarf() {
        C_DONE
    } else {
        C_HINT
    };
    pen.fg(C_HINT)?.text("  +")?;
    pen.fg(scarf)?.text(label(ItemKind::Scarf))?;

    let built = format!("Built: {}", state.snowmen_built);
    let right = match state.next_needed() {
        Some(next) if opts.show_next_hint => format!("Next: {:<8}  {}", label(next), built),
        _ => built,
    };
    let col = layout.width.saturating_sub(right.chars().count() as u16 + 1);
    pen.fg(C_SCORE)?.at(col, 1)?.text(&right)?;
    Ok(())
}

fn draw_frame<W: Write>(pen: &mut Pen<'_, W>, layout: &Layout, flash: bool) -> io::Result<()> {
    let frame = layout.frame;
    let inner = "─".repeat(frame.w.saturating_sub(2) as usize);
    pen.fg(if flash { C_FLASH } else { C_BORDER })?;
    pen.at(frame.x, frame.y)?.text(&format!("┌{inner}┐"))?;
    pen.at(frame.x, frame.bottom())?.text(&format!("└{inner}┘"))?;
    for row in frame.y + 1..frame.bottom() {
        pen.at(frame.x, row)?.text("│")?;
        pen.at(frame.right(), row)?.text("│")?;
    }
    Ok(())
}

fn draw_band<W: Write>(pen: &mut Pen<'_, W>, layout: &Layout) -> io::Result<()> {
    let (top, bottom) = layout.band_rows();
    let line = "·".repeat(layout.field.w as usize);
    pen.fg(C_BAND)?;
    pen.at(layout.field.x, top)?.text(&line)?;
    if bottom != top {
        pen.at(layout.field.x, bottom)?.text(&line)?;
    }
    Ok(())
}

fn draw_items<W: Write>(
    pen: &mut Pen<'_, W>,
    layout: &Layout,
    state: &GameState,
    opts: &RenderOptions,
) -> io::Result<()> {
    let next = state.next_needed();
    for item in &state.items {
        let Some((col, row)) = layout.item_cell(item) else {
            continue;
        };
        let highlight = opts.show_next_hint && Some(item.kind) == next;
        pen.fg(item_color(item.kind))?
            .bold(highlight)?
            .at(layout.sprite_col(col), row)?
            .text(sprite(item.kind))?;
    }
    pen.bold(false)?;
    Ok(())
}

fn draw_footer<W: Write>(pen: &mut Pen<'_, W>, layout: &Layout, hint: &str) -> io::Result<()> {
    pen.fg(C_HINT)?.at(1, layout.footer_row())?.text(hint)?;
    Ok(())
}

/// What the start menu shows
#[derive(Debug, Clone)]
pub struct MenuView<'a> {
    pub difficulty: Difficulty,
    pub penalty: PenaltyPolicy,
    pub player: &'a str,
    /// Best raw score per tier, in `Difficulty::ALL` order
    pub best: [Option<u64>; 3],
    pub notice: Option<&'a str>,
}

/// Render the start menu
pub fn render_menu<W: Write>(
    out: &mut W,
    layout: &Layout,
    view: &MenuView<'_>,
    opts: &RenderOptions,
) -> io::Result<()> {
    let mut pen = Pen::new(out, opts);
    pen.clear()?;

    let cx = layout.width / 2;
    let cy = layout.height / 2;
    let left = cx.saturating_sub(22);

    let title = "*  S N O W M O T I O N  *";
    pen.fg(C_TITLE)?
        .bold(true)?
        .at(centered(layout.width, title), cy.saturating_sub(7))?
        .text(title)?
        .bold(false)?;
    let tagline = "Catch Snowball, Coal, Carrot, Hat - in that order";
    pen.fg(C_HINT)?
        .at(centered(layout.width, tagline), cy.saturating_sub(6))?
        .text(tagline)?;

    pen.fg(Color::White)?
        .at(left, cy.saturating_sub(4))?
        .text("Select difficulty:")?;
    for (i, difficulty) in Difficulty::ALL.iter().enumerate() {
        let profile = difficulty.profile();
        let row = cy.saturating_sub(3) + i as u16;
        let marker = if *difficulty == view.difficulty { ">" } else { " " };
        pen.fg(Color::White)?
            .at(left, row)?
            .text(&format!("{marker} [{}] ", i + 1))?;
        pen.fg(difficulty_color(*difficulty))?
            .bold(*difficulty == view.difficulty)?
            .text(&format!("{:<7}", profile.label))?
            .bold(false)?;
        pen.fg(C_HINT)?.text(&format!(" x{:.1}  {}", profile.score_multiplier, profile.description))?;
        if let Some(best) = view.best[i] {
            pen.fg(C_SCORE)?.text(&format!("  best {best}"))?;
        }
    }

    let penalty = match view.penalty {
        PenaltyPolicy::TimePenalty => "wrong item costs 10 seconds",
        PenaltyPolicy::LoseLife => "wrong item costs a life",
    };
    pen.fg(Color::White)?
        .at(left, cy + 1)?
        .text(&format!("[P] Penalty: {penalty}"))?;
    pen.fg(Color::White)?
        .at(left, cy + 2)?
        .text(&format!("Player: {}", format_player(view.player)))?;

    let legend = [
        "Enter: play   1-3: difficulty   P: penalty",
        "L: leaderboard   Q: quit",
        "Scarf is a bonus: a snowman wearing one scores double",
    ];
    for (i, line) in legend.iter().enumerate() {
        pen.fg(C_HINT)?.at(left, cy + 4 + i as u16)?.text(line)?;
    }

    if let Some(notice) = view.notice {
        pen.fg(C_SCORE)?
            .at(centered(layout.width, notice), (cy + 8).min(layout.footer_row()))?
            .text(notice)?;
    }
    pen.finish(layout.footer_row())
}

/// What the game-over overlay shows
#[derive(Debug, Clone)]
pub struct GameOverView<'a> {
    pub result: FinalScore,
    pub snowmen_built: u32,
    /// Outcome of score submission
    pub message: Option<&'a str>,
}

/// Draw the game-over box over the last game frame
pub fn render_game_over<W: Write>(
    out: &mut W,
    layout: &Layout,
    state: &GameState,
    view: &GameOverView<'_>,
    opts: &RenderOptions,
) -> io::Result<()> {
    render_game(out, layout, state, opts)?;
    let mut pen = Pen::new(out, opts);

    let score_line = format!(
        "Final Score: {}  ({})",
        view.result.score, view.result.difficulty
    );
    let built_line = format!("Snowmen built: {}", view.snowmen_built);
    let message = view.message.unwrap_or("");
    let lines: [(&str, Color); 7] = [
        ("╔══════════════════════╗", C_FLASH),
        ("║      GAME  OVER      ║", C_FLASH),
        ("╚══════════════════════╝", C_FLASH),
        (&score_line, C_SCORE),
        (&built_line, Color::White),
        (message, C_HINT),
        ("R: play again   L: leaderboard   M: menu   Q: quit", Color::White),
    ];

    let start = (layout.height / 2).saturating_sub(lines.len() as u16 / 2);
    for (i, (msg, color)) in lines.iter().enumerate() {
        if msg.is_empty() {
            continue;
        }
        pen.fg(*color)?
            .at(centered(layout.width, msg), start + i as u16)?
            .text(msg)?;
    }
    pen.finish(layout.footer_row())
}

/// What the leaderboard screen shows
#[derive(Debug, Clone)]
pub struct LeaderboardView<'a> {
    pub board: &'a Leaderboard,
    pub filter: LeaderboardFilter,
    /// Unix ms used for relative dates
    pub now: u64,
    /// Player whose rows get highlighted
    pub player: Option<&'a str>,
}

/// Render the leaderboard
pub fn render_leaderboard<W: Write>(
    out: &mut W,
    layout: &Layout,
    view: &LeaderboardView<'_>,
    opts: &RenderOptions,
) -> io::Result<()> {
    let mut pen = Pen::new(out, opts);
    pen.clear()?;

    let title = "LEADERBOARD";
    pen.fg(C_TITLE)?
        .bold(true)?
        .at(centered(layout.width, title), 1)?
        .text(title)?
        .bold(false)?;

    // Filter tabs
    let tabs = [
        LeaderboardFilter::All,
        LeaderboardFilter::Only(Difficulty::Easy),
        LeaderboardFilter::Only(Difficulty::Medium),
        LeaderboardFilter::Only(Difficulty::Hard),
    ];
    pen.at(2, 3)?;
    for tab in tabs {
        let selected = tab == view.filter;
        let text = if selected {
            format!("[{}] ", tab.label())
        } else {
            format!(" {}  ", tab.label())
        };
        pen.fg(if selected { Color::White } else { C_HINT })?
            .bold(selected)?
            .text(&text)?;
    }
    pen.bold(false)?;

    let score_heading = match view.filter {
        LeaderboardFilter::All => "Points",
        LeaderboardFilter::Only(_) => "Score",
    };
    let header = format!(
        "{:>4}  {:<14} {:>7}  {:<8} {}",
        "#", "Player", score_heading, "Level", "When"
    );
    pen.fg(C_HINT)?.at(2, 5)?.text(&header)?;

    let rows = view.board.ranked(view.filter);
    let capacity = layout.height.saturating_sub(9) as usize;
    if rows.is_empty() {
        pen.fg(Color::White)?
            .at(2, 7)?
            .text("No scores yet. Be the first to submit!")?;
    }
    for (i, row) in rows.iter().take(capacity).enumerate() {
        let entry = row.entry;
        let mine = view
            .player
            .is_some_and(|p| p.eq_ignore_ascii_case(&entry.player));
        let line = format!(
            "{:>4}  {:<14} {:>7}  {:<8} {}",
            row.rank,
            format_player(&entry.player),
            row.ranking_score,
            entry.difficulty.profile().label,
            format_date(entry.timestamp, view.now)
        );
        let color = if mine {
            C_SCORE
        } else {
            difficulty_color(entry.difficulty)
        };
        pen.fg(color)?.bold(mine)?.at(2, 6 + i as u16)?.text(&line)?;
    }
    pen.bold(false)?;

    if view.filter == LeaderboardFilter::All {
        let note = "All ranks by points: score x difficulty multiplier";
        pen.fg(C_HINT)?
            .at(2, layout.footer_row().saturating_sub(1))?
            .text(note)?;
    }
    draw_footer(&mut pen, layout, "Tab: change filter   Esc/Enter: back   Q: quit")?;
    pen.finish(layout.footer_row())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::LeaderboardEntry;
    use crate::renderer::layout::{MIN_HEIGHT, MIN_WIDTH};
    use crate::sim::GamePhase;

    const PLAIN: RenderOptions = RenderOptions {
        color: false,
        show_next_hint: true,
    };

    fn rendered(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn playing_state() -> GameState {
        let mut state = GameState::new(Difficulty::Hard, PenaltyPolicy::TimePenalty);
        state.start();
        state.score = 3;
        state.combo = 2;
        state.spawn_item(ItemKind::Carrot, 50.0, 0.5);
        state.items[0].y = 40.0;
        state
    }

    #[test]
    fn test_game_frame_shows_hud() {
        let layout = Layout::new(80, 24);
        let state = playing_state();
        let text = rendered(|out| render_game(out, &layout, &state, &PLAIN));
        assert!(text.contains("Score: 3  Combo: x2"));
        assert!(text.contains("[ HARD ]"));
        assert!(text.contains("Time: 30s"));
        assert!(text.contains("♥♥♥♥♥"));
        assert!(text.contains("Next: Snowball"));
        assert!(text.contains(sprite(ItemKind::Carrot)));
        assert!(!text.contains("PENALTY"));
    }

    #[test]
    fn test_plain_output_has_no_colour() {
        let layout = Layout::new(80, 24);
        let state = playing_state();
        let plain = rendered(|out| render_game(out, &layout, &state, &PLAIN));
        let coloured = rendered(|out| render_game(out, &layout, &state, &RenderOptions::default()));
        assert!(coloured.len() > plain.len());
    }

    #[test]
    fn test_flash_is_drawn() {
        let layout = Layout::new(80, 24);
        let mut state = playing_state();
        state.raise_flash();
        let text = rendered(|out| render_game(out, &layout, &state, &PLAIN));
        assert!(text.contains("PENALTY"));
    }

    #[test]
    fn test_next_hint_can_be_hidden() {
        let layout = Layout::new(80, 24);
        let state = playing_state();
        let opts = RenderOptions {
            color: false,
            show_next_hint: false,
        };
        let text = rendered(|out| render_game(out, &layout, &state, &opts));
        assert!(!text.contains("Next:"));
        assert!(text.contains("Built: 0"));
    }

    #[test]
    fn test_game_over_overlay() {
        let layout = Layout::new(80, 24);
        let mut state = playing_state();
        state.phase = GamePhase::GameOver;
        let view = GameOverView {
            result: FinalScore {
                score: 3,
                difficulty: Difficulty::Hard,
            },
            snowmen_built: 2,
            message: Some("Score submitted! Rank #1"),
        };
        let text = rendered(|out| render_game_over(out, &layout, &state, &view, &PLAIN));
        assert!(text.contains("GAME  OVER"));
        assert!(text.contains("Final Score: 3  (Hard)"));
        assert!(text.contains("Snowmen built: 2"));
        assert!(text.contains("Rank #1"));
    }

    #[test]
    fn test_menu_marks_selection() {
        let layout = Layout::new(80, 24);
        let view = MenuView {
            difficulty: Difficulty::Easy,
            penalty: PenaltyPolicy::LoseLife,
            player: "frosty",
            best: [Some(12), None, None],
            notice: None,
        };
        let text = rendered(|out| render_menu(out, &layout, &view, &PLAIN));
        assert!(text.contains("> [1] "));
        assert!(text.contains("best 12"));
        assert!(text.contains("wrong item costs a life"));
        assert!(text.contains("Player: frosty"));
    }

    #[test]
    fn test_menu_notice_stays_on_small_screen() {
        let layout = Layout::new(MIN_WIDTH, MIN_HEIGHT);
        let notice = "Submission off";
        let view = MenuView {
            difficulty: Difficulty::Medium,
            penalty: PenaltyPolicy::TimePenalty,
            player: "frosty",
            best: [None, None, None],
            notice: Some(notice),
        };
        let text = rendered(|out| render_menu(out, &layout, &view, &PLAIN));
        // MoveTo is 1-based on the wire
        let expected = format!(
            "\x1b[{};{}H{}",
            layout.footer_row() + 1,
            centered(layout.width, notice) + 1,
            notice
        );
        assert!(text.contains(&expected));
    }

    #[test]
    fn test_leaderboard_rows() {
        let layout = Layout::new(80, 24);
        let mut board = Leaderboard::new();
        board.add(LeaderboardEntry {
            player: "frosty".into(),
            score: 4,
            difficulty: Difficulty::Hard,
            timestamp: 0,
        });
        let view = LeaderboardView {
            board: &board,
            filter: LeaderboardFilter::All,
            now: 90_000,
            player: Some("frosty"),
        };
        let text = rendered(|out| render_leaderboard(out, &layout, &view, &PLAIN));
        assert!(text.contains("[All]"));
        assert!(text.contains("frosty"));
        assert!(text.contains("1 min ago"));
        // Hard multiplier doubles the points in the combined view
        assert!(text.contains("      8"));

        let empty = Leaderboard::new();
        let view = LeaderboardView {
            board: &empty,
            filter: LeaderboardFilter::Only(Difficulty::Easy),
            now: 0,
            player: None,
        };
        let text = rendered(|out| render_leaderboard(out, &layout, &view, &PLAIN));
        assert!(text.contains("No scores yet"));
    }
}
