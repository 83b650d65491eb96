mod input;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{
        self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io::{self, stdout, Stdout, Write},
    time::{Duration, Instant},
};

use input::InputState;
use puyo::danger::DANGER_WARNING_LEVEL;
use puyo::score::format_score;
use puyo::{
    Color as CellColor, GameEvent, GameState, Position, SimConfig, SimulationClock, Snapshot,
    GRID_HEIGHT, GRID_WIDTH,
};

// ============================================================================
// Command Line
// ============================================================================

/// Falling-pair color matching puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "puyo",
    version,
    about = "Falling-pair color matching puzzle in the terminal.",
    long_about = "Steer falling pairs of colored blobs. Four or more of one color touching \
        up, down, left or right pop; whatever sat above them falls and may set off a chain.\n\n\
        CONTROLS:\n  Left/Right  Move      Down        Drop faster\n  \
        Up / X      Rotate CW Z           Rotate CCW\n  Enter/Space Start     R           Restart\n  \
        Q / Esc     Quit\n\n\
        With --debug: G gravity, C connection report, E elimination, A chain banner."
)]
struct Args {
    /// Frames between one-row drops.
    #[arg(long, default_value = "40", value_name = "FRAMES")]
    fall_interval: u32,

    /// Frames between drops while Down is held.
    #[arg(long, default_value = "1", value_name = "FRAMES")]
    fast_fall_interval: u32,

    /// Frames between gravity passes after an elimination.
    #[arg(long, default_value = "5", value_name = "FRAMES")]
    gravity_interval: u32,

    /// Frames matched groups flash before they are erased.
    #[arg(long, default_value = "30", value_name = "FRAMES")]
    elimination_interval: u32,

    /// Frames the chain banner stays up.
    #[arg(long, default_value = "60", value_name = "FRAMES")]
    chain_display_duration: u32,

    /// 0.0 (easy) to 1.0 (hard). Affects same-color pairs and obstacle frequency.
    #[arg(short, long, default_value = "0.5", value_name = "LEVEL")]
    difficulty: f32,

    /// Seed for the pair generator, for reproducible games.
    #[arg(short, long, value_name = "N")]
    seed: Option<u64>,

    /// Simulation frames per second.
    #[arg(long, default_value = "60", value_name = "RATE", value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Enable the debug keys (G, C, E, A).
    #[arg(long)]
    debug: bool,

    /// Do not ring the terminal bell on clears and game over.
    #[arg(long)]
    no_bell: bool,
}

impl Args {
    fn sim_config(&self) -> SimConfig {
        SimConfig {
            fall_interval: self.fall_interval,
            fast_fall_interval: self.fast_fall_interval,
            gravity_interval: self.gravity_interval,
            elimination_interval: self.elimination_interval,
            chain_display_duration: self.chain_display_duration,
            difficulty: self.difficulty,
            seed: self.seed,
            debug: self.debug,
        }
    }
}

// ============================================================================
// Visual Constants
// ============================================================================

const CELL_WIDTH: u16 = 2;
const BLOCK_CHAR: &str = "██";
const FADED_CHAR: &str = "▒▒";
const EMPTY_CHAR: &str = "  ";

fn cell_color(color: CellColor) -> Color {
    match color {
        CellColor::Red => Color::Red,
        CellColor::Orange => Color::Rgb(255, 165, 0),
        CellColor::Green => Color::Green,
        CellColor::Blue => Color::Blue,
        CellColor::Obstacle => Color::Gray,
    }
}

// ============================================================================
// Event Feedback
// ============================================================================

fn describe(event: &GameEvent) -> Option<String> {
    let message = match event {
        GameEvent::GroupCleared { cells, points } => {
            format!("Cleared {cells} (+{})", format_score(*points))
        }
        GameEvent::ChainCleared { level, points, .. } => {
            format!("{level} chain! (+{})", format_score(*points))
        }
        GameEvent::ChainEnded { level, total } => {
            format!("{level}-chain total {}", format_score(*total))
        }
        GameEvent::GameOver(reason) => format!("Game over: {reason}"),
        GameEvent::GameRestarted => "New game".to_string(),
        GameEvent::ConnectionReport { groups, erasable } => {
            format!("{groups} groups, {erasable} erasable")
        }
        _ => return None,
    };
    Some(message)
}

fn rings_bell(event: &GameEvent) -> bool {
    matches!(
        event,
        GameEvent::GroupCleared { .. } | GameEvent::ChainCleared { .. } | GameEvent::GameOver(_)
    )
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, snapshot: &Snapshot, status: &str) {
    let area = frame.size();

    match snapshot.state {
        GameState::Menu => render_menu(frame, area),
        GameState::Playing => render_game(frame, snapshot, status, area),
        GameState::GameOver => render_game_over(frame, snapshot, status, area),
    }
}

fn render_menu(frame: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "P U Y O",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(CellColor::Red))),
            Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(CellColor::Orange))),
            Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(CellColor::Green))),
            Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(CellColor::Blue))),
        ]),
        Line::from(""),
        Line::from("Enter/Space: Start"),
        Line::from(Span::styled(
            "Q/ESC: Quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title_alignment(Alignment::Center),
    );
    frame.render_widget(paragraph, centered_rect(28, 10, area));
}

fn render_game(frame: &mut Frame, snapshot: &Snapshot, status: &str, area: Rect) {
    let grid_display_width = (GRID_WIDTH as u16 * CELL_WIDTH) + 2;
    let grid_display_height = GRID_HEIGHT as u16 + 2;
    let preview_width = 10;
    let info_width = 18;
    let total_width = grid_display_width + preview_width + info_width + 4;
    let total_height = grid_display_height + 4;

    let main_area = centered_rect(total_width, total_height, area);

    let vertical = Layout::vertical([
        Constraint::Length(grid_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let game_row = vertical[0];

    // [Grid][Next][Info]
    let horizontal = Layout::horizontal([
        Constraint::Length(grid_display_width),
        Constraint::Length(preview_width),
        Constraint::Length(info_width),
    ])
    .split(game_row);

    render_grid(frame, snapshot, horizontal[0]);
    render_preview(frame, snapshot, horizontal[1]);
    render_info(frame, snapshot, horizontal[2]);

    let footer_area = Rect {
        x: area.x,
        y: game_row.y + game_row.height,
        width: area.width,
        height: 2,
    };

    if footer_area.y + 1 < area.height {
        let footer = Paragraph::new(vec![
            Line::from(Span::styled(
                status.to_string(),
                Style::default().fg(Color::Yellow),
            )),
            Line::from(Span::styled(
                "←→: Move | ↓: Drop | ↑/X Z: Rotate | R: Restart | Q/ESC: Quit",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(footer, footer_area);
    }
}

fn render_grid(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let border_style = if snapshot.danger_level >= DANGER_WARNING_LEVEL {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(" Puyo ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut visual = snapshot.cells;
    if let Some(piece) = &snapshot.piece {
        for (pos, color) in piece {
            if (0..GRID_WIDTH as i16).contains(&pos.x) && (0..GRID_HEIGHT as i16).contains(&pos.y) {
                visual[pos.y as usize][pos.x as usize] = Some(*color);
            }
        }
    }

    let mut lines: Vec<Line> = Vec::new();

    for (y, row) in visual.iter().enumerate() {
        let mut spans: Vec<Span> = Vec::new();

        for (x, cell) in row.iter().enumerate() {
            let flashing = snapshot
                .flashing
                .contains(&Position::new(x as i16, y as i16));
            let span = match cell {
                None => Span::raw(EMPTY_CHAR),
                Some(_) if flashing && snapshot.flash_on => {
                    Span::styled(BLOCK_CHAR, Style::default().fg(Color::White))
                }
                Some(color) if flashing => {
                    Span::styled(FADED_CHAR, Style::default().fg(cell_color(*color)))
                }
                Some(color) => Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(*color))),
            };
            spans.push(span);
        }

        lines.push(Line::from(spans));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_preview(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Next ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Spawns with the satellite under the pivot.
    let (pivot, satellite) = snapshot.next;
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(pivot)))),
        Line::from(Span::styled(BLOCK_CHAR, Style::default().fg(cell_color(satellite)))),
    ];

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn render_info(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("Score", Style::default().fg(Color::Yellow))),
        Line::from(format_score(snapshot.score)),
    ];

    if snapshot.score_popup_active {
        lines.push(Line::from(Span::styled(
            format!("+{}", format_score(snapshot.score_gain)),
            Style::default().fg(Color::Green),
        )));
    } else {
        lines.push(Line::from(""));
    }

    lines.push(Line::from(""));
    if snapshot.chain_visible {
        let color = if snapshot.chain_animation_phase.sin() >= 0.0 {
            Color::Yellow
        } else {
            Color::Magenta
        };
        lines.push(Line::from(Span::styled(
            format!("{} CHAIN!", snapshot.chain_level),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
    } else {
        lines.push(Line::from(""));
    }

    lines.push(Line::from(""));
    if snapshot.danger_level >= DANGER_WARNING_LEVEL {
        lines.push(Line::from(Span::styled(
            "DANGER",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn render_game_over(frame: &mut Frame, snapshot: &Snapshot, status: &str, area: Rect) {
    render_game(frame, snapshot, status, area);

    let reason = snapshot
        .game_over_reason
        .map(|reason| reason.to_string())
        .unwrap_or_default();
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(Span::styled(reason, Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from(format!("Score: {}", format_score(snapshot.score))),
        Line::from(""),
        Line::from(Span::styled(
            "R: Restart | Q: Menu",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Game Over ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    frame.render_widget(paragraph, centered_rect(34, 10, area));
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Main Loop
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    clock: &mut SimulationClock,
    input: &mut InputState,
    frame_duration: Duration,
    bell: bool,
) -> Result<()> {
    let mut status = String::new();
    let mut last_tick = Instant::now();

    loop {
        let snapshot = clock.snapshot();
        terminal.draw(|frame| render(frame, &snapshot, &status))?;

        let timeout = frame_duration
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            loop {
                if let Event::Key(key) = event::read()? {
                    input.handle_key(key);
                }
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }

        if last_tick.elapsed() < frame_duration {
            continue;
        }
        last_tick = Instant::now();

        for event in clock.tick(&input.frame()) {
            if event == GameEvent::QuitRequested {
                return Ok(());
            }
            if let Some(message) = describe(&event) {
                status = message;
            }
            if bell && rings_bell(&event) {
                let mut out = io::stdout();
                out.write_all(b"\x07")?;
                out.flush()?;
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.sim_config().validate()?;
    let frame_duration = Duration::from_secs_f64(1.0 / f64::from(args.fps));

    let mut clock = SimulationClock::new(config);
    clock.return_to_menu();

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let release_events = supports_keyboard_enhancement().unwrap_or(false);
    if release_events {
        stdout().execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
        ))?;
    }
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut input = InputState::new(release_events);

    let result = run(
        &mut terminal,
        &mut clock,
        &mut input,
        frame_duration,
        !args.no_bell,
    );

    // Restore terminal
    if release_events {
        let _ = stdout().execute(PopKeyboardEnhancementFlags);
    }
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}
