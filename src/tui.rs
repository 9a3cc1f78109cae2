use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

use crate::builder::{ProgressEvent, ProgressSink};
use crate::error::KiraError;

const EVENTS_MAX: usize = 12;
const IDLE_LABEL: &str = "Build Offline Library";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Select,
    Image,
    Article,
    Render,
    Package,
    Save,
    Cancel,
}

impl Phase {
    const ALL: [Phase; 7] = [
        Phase::Select,
        Phase::Image,
        Phase::Article,
        Phase::Render,
        Phase::Package,
        Phase::Save,
        Phase::Cancel,
    ];

    fn label(self) -> &'static str {
        match self {
            Phase::Select => "Select",
            Phase::Image => "Image",
            Phase::Article => "Article",
            Phase::Render => "Render",
            Phase::Package => "Package",
            Phase::Save => "Save",
            Phase::Cancel => "Cancel",
        }
    }
}

#[derive(Debug)]
struct BuildState {
    status: String,
    phase: Phase,
    percent: u8,
    current: Option<String>,
    events: VecDeque<String>,
    started: Instant,
    active: bool,
    cancel_requested: bool,
}

impl BuildState {
    fn new() -> Self {
        Self {
            status: "starting".to_string(),
            phase: Phase::Select,
            percent: 0,
            current: None,
            events: VecDeque::new(),
            started: Instant::now(),
            active: false,
            cancel_requested: false,
        }
    }

    fn apply(&mut self, event: &ProgressEvent) {
        let message = event.message.trim().to_string();
        if let Some((phase, payload)) = parse_phase(&message) {
            self.phase = phase;
            self.status = payload.to_string();
            if matches!(phase, Phase::Image | Phase::Article | Phase::Render) {
                self.current = Some(payload.to_string());
            }
        } else {
            self.status = message.clone();
        }
        let line = match event.elapsed {
            Some(elapsed) => format!("[{}] {message} ({} ms)", timestamp(), elapsed.as_millis()),
            None => format!("[{}] {message}", timestamp()),
        };
        push_event(&mut self.events, line);
    }

    fn set_percent(&mut self, percent: u8) {
        self.percent = self.percent.max(percent.min(100));
    }
}

/// Full-screen progress view for a build running on a worker thread.
pub struct Tui {
    state: Arc<Mutex<BuildState>>,
    cancel: Arc<AtomicBool>,
}

struct TuiProgress {
    state: Arc<Mutex<BuildState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            state.apply(&event);
        }
    }

    fn progress(&self, percent: u8) {
        if let Ok(mut state) = self.state.lock() {
            state.set_percent(percent);
        }
    }
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

impl Tui {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BuildState::new())),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag raised when the user presses Esc; hand it to the builder.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs `f` on a worker thread while drawing its progress. Cancelling
    /// only raises the flag; the screen stays up until the worker returns.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, KiraError> + Send + 'static,
        R: Send + 'static,
    {
        self.set_active(true);

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        let result = loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, &state, tick))
                    .into_diagnostic()?;
            }

            if let Some(result) = poll_worker(&rx) {
                break result;
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()?
                && let Event::Key(key) = event::read().into_diagnostic()?
            {
                self.handle_key(key);
            }

            tick = tick.wrapping_add(1);
        };

        self.set_active(false);
        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        handle.join().ok();
        result
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let cancel = match key.code {
            KeyCode::Esc | KeyCode::Char('q') => true,
            KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
            _ => false,
        };
        if cancel && !self.cancel.swap(true, Ordering::SeqCst) {
            if let Ok(mut state) = self.state.lock() {
                state.cancel_requested = true;
                state.status = "cancelling after current record".to_string();
            }
        }
    }

    fn set_active(&self, active: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
            if active {
                state.started = Instant::now();
            }
        }
    }
}

/// One non-blocking look at the worker channel. `None` while the worker is
/// still running; a dropped sender without a result means the worker died.
fn poll_worker<R>(rx: &Receiver<Result<R, KiraError>>) -> Option<miette::Result<R>> {
    match rx.try_recv() {
        Ok(result) => Some(result.map_err(miette::Report::new)),
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Disconnected) => {
            Some(Err(miette::miette!("build worker stopped without a result")))
        }
    }
}

/// Label of the build action: disabled with the running percent while a
/// build is in progress.
pub fn action_label(active: bool, percent: u8) -> String {
    if active {
        format!("Building… {percent}%")
    } else {
        IDLE_LABEL.to_string()
    }
}

fn draw_ui(frame: &mut ratatui::Frame, state: &BuildState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(state, tick), chunks[0]);

    let gauge_color = if state.cancel_requested {
        Color::Yellow
    } else {
        Color::Cyan
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(gauge_color).bg(Color::Black))
        .percent(u16::from(state.percent))
        .label(action_label(state.active, state.percent));
    frame.render_widget(gauge, chunks[1]);

    frame.render_widget(draw_status(state), chunks[2]);
    frame.render_widget(draw_events(state), chunks[3]);

    let footer = if state.cancel_requested {
        "Cancelling: the archive will hold the records finished so far"
    } else {
        "Esc cancel"
    };
    frame.render_widget(
        Paragraph::new(Span::styled(footer, Style::default().fg(Color::Gray))),
        chunks[4],
    );
}

fn draw_header(state: &BuildState, tick: usize) -> Paragraph<'static> {
    let hb = if tick % 2 == 0 { "*" } else { " " };
    let elapsed = state.started.elapsed().as_secs();
    let line = Line::from(vec![
        Span::styled(
            "KIRA-SL",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw(format!(
            "   Op: Build   Elapsed: {:02}:{:02}   ",
            elapsed / 60,
            elapsed % 60
        )),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]);
    Paragraph::new(line)
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_status(state: &BuildState) -> Paragraph<'static> {
    let phases = Phase::ALL
        .iter()
        .filter(|phase| **phase != Phase::Cancel || state.cancel_requested)
        .flat_map(|phase| {
            let style = if *phase == state.phase {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            [Span::styled(phase.label(), style), Span::raw("  ")]
        })
        .collect::<Vec<_>>();
    let lines = vec![
        Line::from(phases),
        Line::from(vec![
            Span::styled("Species: ", Style::default().fg(Color::Gray)),
            Span::raw(state.current.clone().unwrap_or_else(|| "--".to_string())),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.clone()),
        ]),
    ];
    Paragraph::new(lines).wrap(Wrap { trim: true })
}

fn draw_events(state: &BuildState) -> Paragraph<'static> {
    let lines = state
        .events
        .iter()
        .rev()
        .map(|event| Line::from(format!("- {event}")))
        .collect::<Vec<_>>();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::TOP).title("Recent events"))
        .wrap(Wrap { trim: true })
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    let rest = message.strip_prefix("phase=")?;
    let (name, payload) = rest.split_once(';')?;
    let phase = Phase::ALL
        .into_iter()
        .find(|phase| phase.label() == name.trim())?;
    Some((phase, payload.trim()))
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
