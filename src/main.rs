//! SnowMotion entry point
//!
//! Parses flags, sets up logging and the terminal, then runs the
//! menu -> game -> game over -> leaderboard loop.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write, stdout};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    ExecutableCommand, cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    terminal,
};

use snow_motion::leaderboard::{Leaderboard, LeaderboardFilter};
use snow_motion::persistence;
use snow_motion::renderer::{
    GameOverView, LeaderboardView, Layout, MenuView, RenderOptions, render_game,
    render_game_over, render_leaderboard, render_menu,
};
use snow_motion::settings::Settings;
use snow_motion::sim::{FinalScore, FrameInput, GameLoop, PenaltyPolicy};
use snow_motion::submit::{FallbackLog, LocalLedger, ScoreSubmitter, submit_final_score};
use snow_motion::tuning::Difficulty;

/// Longest wall-clock gap fed to the simulation in one frame (ms)
const MAX_FRAME_STEP_MS: u64 = 250;
/// Virtual time a headless demo may run before it is stopped (ms)
const HEADLESS_LIMIT_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Parser)]
#[command(author, version, about = "Catch falling parts in order to build snowmen", long_about = None)]
struct Cli {
    /// Difficulty tier: easy, medium or hard
    #[arg(short, long, value_name = "TIER")]
    difficulty: Option<Difficulty>,

    /// Fixed RNG seed for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,

    /// Player name recorded with submitted scores
    #[arg(short, long, value_name = "NAME")]
    player: Option<String>,

    /// What a wrong item costs: time or life
    #[arg(long, value_name = "POLICY")]
    penalty: Option<PenaltyPolicy>,

    /// Let the autopilot play
    #[arg(long)]
    demo: bool,

    /// Run the demo without a terminal UI and print the result
    #[arg(long, requires = "demo")]
    headless: bool,

    /// Store the given options as the new defaults
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(difficulty) = self.difficulty {
            settings.difficulty = difficulty;
        }
        if let Some(seed) = self.seed {
            settings.seed = Some(seed);
        }
        if let Some(player) = &self.player {
            settings.player = player.clone();
        }
        if let Some(penalty) = self.penalty {
            settings.penalty = penalty;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.headless {
        env_logger::init();
    } else {
        init_file_logging();
    }
    log::info!("SnowMotion starting...");

    let mut settings = Settings::load();
    cli.apply(&mut settings);
    if cli.save {
        settings.save().context("saving settings")?;
    }

    if cli.headless {
        return run_headless(&settings);
    }

    let raw_out = stdout();
    let mut out = BufWriter::new(raw_out);

    terminal::enable_raw_mode()?;
    out.execute(terminal::EnterAlternateScreen)?;
    out.execute(EnableMouseCapture)?;
    out.execute(cursor::Hide)?;

    // Blocking reads happen on their own thread so the frame loop never stalls
    let (tx, rx) = mpsc::channel::<Event>();
    thread::spawn(move || {
        while let Ok(ev) = event::read() {
            if tx.send(ev).is_err() {
                break;
            }
        }
    });

    let result = App::new(settings, cli.demo).run(&mut out, &rx);

    // Always restore the terminal
    let _ = out.execute(cursor::Show);
    let _ = out.execute(DisableMouseCapture);
    let _ = out.execute(terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

/// The terminal belongs to the UI, so logs go to a file in the data directory
fn init_file_logging() {
    let Ok(path) = persistence::data_file(persistence::LOG_FILE) else {
        return;
    };
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
}

/// Autopilot session on the virtual clock, no terminal needed
fn run_headless(settings: &Settings) -> Result<()> {
    let seed = settings.session_seed();
    let mut game = GameLoop::new(settings.difficulty, settings.penalty, seed);
    game.start();

    let input = FrameInput {
        taps: Vec::new(),
        autopilot: true,
    };
    let step = settings.frame_ms();
    while game.state().is_playing() && game.clock_ms() < HEADLESS_LIMIT_MS {
        game.update(step, &input);
        for event in game.drain_events() {
            log::debug!("{:?}", event);
        }
    }

    let state = game.state();
    let ended = if state.is_game_over() {
        "game over"
    } else {
        "time limit"
    };
    println!(
        "seed {} | {} | score {} | snowmen {} | lives {} | {:.1}s played ({})",
        seed,
        state.difficulty,
        state.score,
        state.snowmen_built,
        state.lives,
        game.clock_ms() as f64 / 1000.0,
        ended
    );
    game.stop();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scene {
    Menu,
    Playing,
    GameOver,
    Leaderboard { from_game_over: bool },
}

enum Flow {
    Continue,
    Quit,
}

struct App {
    settings: Settings,
    settings_dirty: bool,
    opts: RenderOptions,
    demo: bool,
    game: GameLoop,
    scene: Scene,
    board: Leaderboard,
    filter: LeaderboardFilter,
    fallback: FallbackLog,
    /// Local records shown while the leaderboard screen is open and the shared board is empty
    fallback_board: Option<Leaderboard>,
    submitter: Option<LocalLedger>,
    notice: Option<String>,
    last_result: Option<FinalScore>,
    submit_message: Option<String>,
}

impl App {
    fn new(settings: Settings, demo: bool) -> Self {
        let submitter = match LocalLedger::open_default() {
            Ok(ledger) => Some(ledger),
            Err(e) => {
                log::warn!("Score submission disabled: {:#}", e);
                None
            }
        };
        let notice = submitter
            .is_none()
            .then(|| "Score submission is off - scores are kept locally".to_string());
        let fallback = FallbackLog::open_default().unwrap_or_else(|e| {
            log::warn!("{:#} - fallback scores go to the temp dir", e);
            FallbackLog::new(std::env::temp_dir().join(persistence::FALLBACK_FILE))
        });
        let game = GameLoop::new(settings.difficulty, settings.penalty, settings.session_seed());
        log::info!("Session seed: {}", game.seed());

        Self {
            opts: RenderOptions::from(&settings),
            settings,
            settings_dirty: false,
            demo,
            game,
            scene: Scene::Menu,
            board: Leaderboard::load(),
            filter: LeaderboardFilter::All,
            fallback,
            fallback_board: None,
            submitter,
            notice,
            last_result: None,
            submit_message: None,
        }
    }

    fn run<W: Write>(&mut self, out: &mut W, rx: &mpsc::Receiver<Event>) -> Result<()> {
        let frame = Duration::from_millis(self.settings.frame_ms());
        let mut last = Instant::now();

        loop {
            let frame_start = Instant::now();
            let (width, height) = terminal::size()?;
            let layout = Layout::new(width, height);

            let mut input = FrameInput {
                taps: Vec::new(),
                autopilot: self.demo,
            };
            while let Ok(ev) = rx.try_recv() {
                if let Flow::Quit = self.handle_event(ev, &layout, &mut input) {
                    self.game.stop();
                    self.save_settings();
                    return Ok(());
                }
            }

            if self.scene == Scene::Playing {
                let elapsed = (frame_start - last).as_millis() as u64;
                self.game.update(elapsed.min(MAX_FRAME_STEP_MS), &input);
                for event in self.game.drain_events() {
                    log::debug!("{:?}", event);
                }
                if let Some(result) = self.game.state().final_score() {
                    self.finish(result);
                    self.scene = Scene::GameOver;
                }
            }
            last = frame_start;

            self.draw(out, &layout)?;

            let spent = frame_start.elapsed();
            if spent < frame {
                thread::sleep(frame - spent);
            }
        }
    }

    fn handle_event(&mut self, ev: Event, layout: &Layout, input: &mut FrameInput) -> Flow {
        match ev {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) => {
                if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
                    return Flow::Quit;
                }
                self.handle_key(code, input)
            }
            Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column,
                row,
                ..
            }) if self.scene == Scene::Playing => {
                if let Some(id) = layout.item_at(&self.game.state().items, column, row) {
                    input.taps.push(id);
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    fn handle_key(&mut self, code: KeyCode, input: &mut FrameInput) -> Flow {
        if matches!(code, KeyCode::Char('q') | KeyCode::Char('Q')) {
            return Flow::Quit;
        }
        match self.scene {
            Scene::Menu => match code {
                KeyCode::Char(c @ '1'..='3') => {
                    let index = c as u8 - b'1';
                    if let Some(difficulty) = Difficulty::from_index(index) {
                        self.set_difficulty(difficulty);
                    }
                }
                KeyCode::Char('p') | KeyCode::Char('P') => {
                    let penalty = match self.settings.penalty {
                        PenaltyPolicy::TimePenalty => PenaltyPolicy::LoseLife,
                        PenaltyPolicy::LoseLife => PenaltyPolicy::TimePenalty,
                    };
                    self.settings.penalty = penalty;
                    self.game.set_penalty(penalty);
                    self.settings_dirty = true;
                }
                KeyCode::Char('l') | KeyCode::Char('L') => {
                    self.open_leaderboard(false);
                }
                KeyCode::Enter | KeyCode::Char(' ') => self.start(),
                KeyCode::Esc => return Flow::Quit,
                _ => {}
            },
            Scene::Playing => match code {
                KeyCode::Char('n') | KeyCode::Char('N') => {
                    if let Some(id) = self.game.autopilot_target() {
                        input.taps.push(id);
                    }
                }
                KeyCode::Char('r') | KeyCode::Char('R') => self.game.restart(),
                KeyCode::Char('m') | KeyCode::Char('M') | KeyCode::Esc => {
                    self.game.stop();
                    self.scene = Scene::Menu;
                }
                _ => {}
            },
            Scene::GameOver => match code {
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    self.game.restart();
                    self.scene = Scene::Playing;
                }
                KeyCode::Char('l') | KeyCode::Char('L') => {
                    self.open_leaderboard(true);
                }
                KeyCode::Char('m') | KeyCode::Char('M') | KeyCode::Enter | KeyCode::Esc => {
                    self.scene = Scene::Menu;
                }
                _ => {}
            },
            Scene::Leaderboard { from_game_over } => match code {
                KeyCode::Tab => self.filter = self.filter.next(),
                KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace => {
                    self.fallback_board = None;
                    self.scene = if from_game_over {
                        Scene::GameOver
                    } else {
                        Scene::Menu
                    };
                }
                _ => {}
            },
        }
        Flow::Continue
    }

    fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.settings.difficulty = difficulty;
        self.game.set_difficulty(difficulty);
        self.settings_dirty = true;
    }

    fn start(&mut self) {
        self.save_settings();
        self.game.start();
        self.notice = None;
        self.scene = Scene::Playing;
        log::info!(
            "Playing {} ({} penalty){}",
            self.settings.difficulty,
            self.settings.penalty.as_str(),
            if self.demo { " on autopilot" } else { "" }
        );
    }

    fn save_settings(&mut self) {
        if !self.settings_dirty {
            return;
        }
        match self.settings.save() {
            Ok(()) => self.settings_dirty = false,
            Err(e) => log::warn!("Could not save settings: {:#}", e),
        }
    }

    /// Hand the final score to the submitter and keep the leaderboard on disk
    fn finish(&mut self, result: FinalScore) {
        self.last_result = Some(result);
        if self.demo {
            self.submit_message = Some("Demo run - score not submitted".to_string());
            return;
        }

        let submitter = self
            .submitter
            .as_mut()
            .map(|ledger| ledger as &mut dyn ScoreSubmitter);
        let report = submit_final_score(
            submitter,
            &self.fallback,
            &mut self.board,
            &self.settings.player,
            result,
        );
        if report.accepted() {
            if let Err(e) = self.board.save() {
                log::warn!("Could not save leaderboard: {:#}", e);
            }
        }
        self.submit_message = Some(report.message);
    }

    fn open_leaderboard(&mut self, from_game_over: bool) {
        self.fallback_board = self.fallback.board_for(&self.board);
        self.scene = Scene::Leaderboard { from_game_over };
    }

    fn draw<W: Write>(&self, out: &mut W, layout: &Layout) -> Result<()> {
        match self.scene {
            Scene::Menu => {
                let best = Difficulty::ALL.map(|d| self.board.top_score(d));
                let view = MenuView {
                    difficulty: self.settings.difficulty,
                    penalty: self.settings.penalty,
                    player: &self.settings.player,
                    best,
                    notice: self.notice.as_deref(),
                };
                render_menu(out, layout, &view, &self.opts)?;
            }
            Scene::Playing => render_game(out, layout, self.game.state(), &self.opts)?,
            Scene::GameOver => {
                let state = self.game.state();
                let result = self.last_result.unwrap_or(FinalScore {
                    score: state.score,
                    difficulty: state.difficulty,
                });
                let view = GameOverView {
                    result,
                    snowmen_built: state.snowmen_built,
                    message: self.submit_message.as_deref(),
                };
                render_game_over(out, layout, state, &view, &self.opts)?;
            }
            Scene::Leaderboard { .. } => {
                let board = self.fallback_board.as_ref().unwrap_or(&self.board);
                let view = LeaderboardView {
                    board,
                    filter: self.filter,
                    now: snow_motion::now_millis(),
                    player: Some(&self.settings.player),
                };
                render_leaderboard(out, layout, &view, &self.opts)?;
            }
        }
        Ok(())
    }
}
