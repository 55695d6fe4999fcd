use std::any::Any;
use std::fs::OpenOptions;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use docqa::{
    Config, ConversationTurn, IndexState, Orchestrator, PersistOutcome, PersistReport, Response,
    Session, UploadedFile, classify, is_allowed_format,
};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    init_logging(&cfg.log_file)?;

    // Refuse to start without credentials, before the terminal is taken over.
    let orchestrator = Orchestrator::from_config(&cfg).context("cannot start DocAgent")?;
    let initial_upload: Vec<String> = std::env::args().skip(1).collect();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(Arc::new(orchestrator), cfg.upload_exts.clone());
    let res = run_app(&mut terminal, &mut app, initial_upload).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

struct App {
    input: String,
    cursor: usize,
    orchestrator: Arc<Orchestrator>,
    upload_exts: Vec<String>,
    session: Option<Session>,
    transcript: String,
    reports: String,
    pending_query: Option<String>,
    input_mode: InputMode,
    scroll: usize,
    content_len: usize,
    view_height: usize,
    auto_scroll: bool,
    is_loading: bool,
    spinner_idx: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputMode {
    Question,
    Upload,
}

enum Outcome {
    Answered(Session),
    Uploaded {
        result: Result<(Session, PersistReport), String>,
        rejected: Vec<String>,
    },
}

impl App {
    fn new(orchestrator: Arc<Orchestrator>, upload_exts: Vec<String>) -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            orchestrator,
            upload_exts,
            session: None,
            transcript: "Upload report files to begin (Tab switches to Upload).".to_string(),
            reports: "No reports uploaded.".to_string(),
            pending_query: None,
            input_mode: InputMode::Upload,
            scroll: 0,
            content_len: 0,
            view_height: 0,
            auto_scroll: false,
            is_loading: false,
            spinner_idx: 0,
        }
    }

    fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    fn delete_char(&mut self) {
        if let Some(c) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= c.len_utf8();
            self.input.remove(self.cursor);
        }
    }

    fn move_left(&mut self) {
        if let Some(c) = self.input[..self.cursor].chars().next_back() {
            self.cursor -= c.len_utf8();
        }
    }

    fn move_right(&mut self) {
        if let Some(c) = self.input[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    fn submit(&mut self, tx: mpsc::UnboundedSender<Outcome>) {
        if self.input.trim().is_empty() || self.is_loading {
            return;
        }
        let input = std::mem::take(&mut self.input);
        self.cursor = 0;

        match self.input_mode {
            InputMode::Question => self.ask(input.trim().to_string(), tx),
            InputMode::Upload => {
                let paths = input.split_whitespace().map(str::to_string).collect();
                self.upload(paths, tx);
            }
        }
    }

    fn ask(&mut self, query: String, tx: mpsc::UnboundedSender<Outcome>) {
        // One question at a time: the session travels to the worker and back.
        let Some(mut session) = self.session.take() else {
            self.reports = "Upload report files before asking questions.".to_string();
            return;
        };
        self.is_loading = true;
        self.auto_scroll = true;
        self.pending_query = Some(query.clone());
        let orchestrator = self.orchestrator.clone();
        tokio::task::spawn_blocking(move || {
            answer_guarded(&mut session, &query, |s| {
                orchestrator.handle_query(&query, s);
            });
            let _ = tx.send(Outcome::Answered(session));
        });
    }

    fn upload(&mut self, paths: Vec<String>, tx: mpsc::UnboundedSender<Outcome>) {
        let (accepted, rejected): (Vec<String>, Vec<String>) = paths
            .into_iter()
            .partition(|p| is_allowed_format(Some(p.as_str()), &self.upload_exts));
        if accepted.is_empty() {
            self.reports = format!(
                "Nothing to upload. Rejected: {}. Accepted types: {}",
                rejected.join(" "),
                self.upload_exts.join(", ")
            );
            return;
        }
        self.is_loading = true;
        self.reports = "Uploading files and creating embeddings...".to_string();
        let orchestrator = self.orchestrator.clone();
        tokio::task::spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                read_batch(&accepted)
                    .and_then(|files| orchestrator.start_session(files).map_err(|e| e.to_string()))
            }))
            .unwrap_or_else(|payload| Err(format!("upload worker panicked: {}", panic_message(&*payload))));
            let _ = tx.send(Outcome::Uploaded { result, rejected });
        });
    }

    fn apply(&mut self, outcome: Outcome) {
        self.is_loading = false;
        self.pending_query = None;
        match outcome {
            Outcome::Answered(session) => {
                self.transcript = render_transcript(&session);
                self.session = Some(session);
            }
            Outcome::Uploaded { result, rejected } => match result {
                Ok((session, report)) => {
                    info!(files = session.files().len(), "upload batch ready");
                    self.reports = render_reports(&session, &report, &rejected);
                    self.transcript = render_transcript(&session);
                    self.session = Some(session);
                    self.input_mode = InputMode::Question;
                }
                Err(err) => {
                    error!(error = %err, "upload failed");
                    self.reports = format!("Upload failed: {}", err);
                }
            },
        }
        self.auto_scroll = true;
    }

    fn scroll_up(&mut self, by: usize) {
        self.scroll = self.scroll.saturating_sub(by);
    }

    fn scroll_down(&mut self, by: usize) {
        let max_scroll = self.content_len.saturating_sub(self.view_height);
        self.scroll = (self.scroll + by).min(max_scroll);
    }

    fn scroll_to_end(&mut self) {
        self.scroll = self.content_len.saturating_sub(self.view_height);
    }
}

/// Runs `answer` against the session. A panic becomes an error turn, so the
/// session always comes back holding a turn for `query`.
fn answer_guarded(session: &mut Session, query: &str, answer: impl FnOnce(&mut Session)) {
    let before = session.turns().len();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| answer(session)));
    if let Err(payload) = outcome {
        let message = panic_message(&*payload);
        error!(%message, "query worker panicked");
        if session.turns().len() == before {
            session.push_turn(ConversationTurn {
                query: query.to_string(),
                route: classify(query),
                response: Response::Error(format!("internal error: {}", message)),
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn read_batch(paths: &[String]) -> Result<Vec<UploadedFile>, String> {
    paths
        .iter()
        .map(|p| UploadedFile::from_path(Path::new(p)).map_err(|e| format!("{}: {}", p, e)))
        .collect()
}

fn render_reports(session: &Session, report: &PersistReport, rejected: &[String]) -> String {
    let mut lines = Vec::new();
    for file in &report.files {
        let status = match &file.outcome {
            PersistOutcome::Written(_) => "document".to_string(),
            PersistOutcome::NotDocument => "image".to_string(),
            PersistOutcome::Failed(err) => format!("not saved: {}", err),
        };
        lines.push(format!("{} ({})", file.name, status));
    }
    for path in rejected {
        lines.push(format!("{} (rejected: unsupported type)", path));
    }
    if let IndexState::Failed(err) = session.index() {
        lines.push(format!("Indexing failed: {}", err));
    }
    lines.join("\n")
}

fn render_transcript(session: &Session) -> String {
    let mut out = vec![format!("DocAgent: {}", session.greeting())];
    for turn in session.turns() {
        out.push(String::new());
        out.push(format!("You: {}", turn.query));
        match &turn.response {
            Response::Text(answer) => out.push(format!("DocAgent: {}", answer)),
            Response::Images(images) if images.is_empty() => {
                out.push("DocAgent: No report images to search.".to_string());
            }
            Response::Images(images) => {
                out.push("DocAgent: Report images".to_string());
                for (i, img) in images.iter().enumerate() {
                    out.push(format!("  [{}] {} ({} bytes)", i + 1, img.name, img.data.len()));
                }
            }
            Response::Error(err) => out.push(format!("DocAgent: Error: {}", err)),
        }
    }
    out.join("\n")
}

fn inner_width(area: ratatui::layout::Rect) -> usize {
    area.width.saturating_sub(2) as usize
}

fn inner_height(area: ratatui::layout::Rect) -> usize {
    area.height.saturating_sub(2) as usize
}

/// Visible slice of the input around the cursor, plus the cursor column in it.
fn input_view(input: &str, cursor: usize, max_width: usize) -> (String, usize) {
    if max_width == 0 {
        return (String::new(), 0);
    }
    let chars: Vec<char> = input.chars().collect();
    let cursor = input[..cursor].chars().count();
    let len = chars.len();
    if len <= max_width {
        return (input.to_string(), cursor);
    }
    let mut start = cursor.saturating_sub(max_width / 2);
    if start + max_width > len {
        start = len - max_width;
    }
    let view = chars[start..start + max_width].iter().collect();
    (view, cursor.saturating_sub(start).min(max_width))
}

fn line_count(text: &str) -> usize {
    let count = text.lines().count();
    if count == 0 { 1 } else { count }
}

fn draw_ui(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let spinner = ["|", "/", "-", "\\"];

    terminal.draw(|frame| {
        let title_style = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
        let info_border = Style::default().fg(Color::Black);
        let input_border = Style::default().fg(Color::DarkGray);
        let info_text_style = Style::default().fg(Color::Blue);
        let help_text_style = Style::default().fg(Color::DarkGray);

        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);
        let output_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(25), Constraint::Percentage(75)])
            .split(chunks[0]);

        let reports = Paragraph::new(app.reports.clone())
            .style(info_text_style)
            .wrap(Wrap { trim: true })
            .block(
                Block::bordered()
                    .title("Reports")
                    .title_style(title_style)
                    .border_style(info_border),
            );
        frame.render_widget(reports, output_chunks[0]);

        let mut conversation = app.transcript.clone();
        if let Some(query) = &app.pending_query {
            conversation.push_str(&format!("\n\nYou: {}\nDocAgent: Analysing the reports...", query));
        }
        let conversation_title = if app.is_loading {
            format!("Conversation {}", spinner[app.spinner_idx])
        } else {
            "Conversation".to_string()
        };

        app.content_len = line_count(&conversation);
        app.view_height = inner_height(output_chunks[1]);
        let max_scroll = app.content_len.saturating_sub(app.view_height);
        if app.auto_scroll {
            app.scroll = max_scroll;
            app.auto_scroll = false;
        } else if app.scroll > max_scroll {
            app.scroll = max_scroll;
        }

        let conversation_view = Paragraph::new(conversation)
            .style(info_text_style)
            .scroll((app.scroll as u16, 0))
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title(conversation_title)
                    .title_style(title_style)
                    .border_style(info_border),
            );
        frame.render_widget(conversation_view, output_chunks[1]);

        let mut scrollbar = ScrollbarState::new(app.content_len).position(app.scroll);
        let scrollbar_widget = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .track_style(Style::default().fg(Color::DarkGray))
            .thumb_style(Style::default().fg(Color::Blue));
        frame.render_stateful_widget(
            scrollbar_widget,
            output_chunks[1].inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar,
        );

        let input_title = match app.input_mode {
            InputMode::Question => "Question",
            InputMode::Upload => "Upload (space-separated file paths)",
        };
        let input_block = Block::bordered()
            .title(input_title)
            .title_style(title_style)
            .border_style(input_border);
        let (view, cursor_x) = input_view(&app.input, app.cursor, inner_width(chunks[1]));
        let input = Paragraph::new(view).style(help_text_style).block(input_block);
        frame.render_widget(input, chunks[1]);
        frame.set_cursor_position((chunks[1].x + 1 + cursor_x as u16, chunks[1].y + 1));

        let help_text = match app.input_mode {
            InputMode::Question => {
                "Enter: Ask | Tab: Upload mode | Up/Down/PgUp/PgDn/End: Scroll | Esc/Ctrl+C: Quit"
            }
            InputMode::Upload => {
                "Enter: Upload batch (replaces reports and conversation) | Tab: Question mode | Esc/Ctrl+C: Quit"
            }
        };
        let help = Paragraph::new(help_text)
            .style(help_text_style)
            .wrap(Wrap { trim: true })
            .block(
                Block::bordered()
                    .title("Controls")
                    .title_style(title_style)
                    .border_style(input_border),
            );
        frame.render_widget(help, chunks[2]);
    })?;

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    initial_upload: Vec<String>,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
    let mut events = EventStream::new();
    let mut spinner_tick = tokio::time::interval(Duration::from_millis(100));
    spinner_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    if !initial_upload.is_empty() {
        app.upload(initial_upload, tx.clone());
    }
    draw_ui(terminal, app)?;

    loop {
        tokio::select! {
            _ = spinner_tick.tick() => {
                if app.is_loading {
                    app.spinner_idx = (app.spinner_idx + 1) % 4;
                    draw_ui(terminal, app)?;
                }
            }
            maybe_outcome = rx.recv() => {
                if let Some(outcome) = maybe_outcome {
                    app.apply(outcome);
                    draw_ui(terminal, app)?;
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                            KeyCode::Esc => return Ok(()),
                            KeyCode::Enter => app.submit(tx.clone()),
                            KeyCode::Up => app.scroll_up(1),
                            KeyCode::Down => app.scroll_down(1),
                            KeyCode::PageUp => app.scroll_up(app.view_height.max(1)),
                            KeyCode::PageDown => app.scroll_down(app.view_height.max(1)),
                            KeyCode::Home => app.scroll = 0,
                            KeyCode::End => app.scroll_to_end(),
                            KeyCode::Tab => {
                                app.input_mode = match app.input_mode {
                                    InputMode::Question => InputMode::Upload,
                                    InputMode::Upload => InputMode::Question,
                                };
                                app.input.clear();
                                app.cursor = 0;
                            }
                            KeyCode::Left => app.move_left(),
                            KeyCode::Right => app.move_right(),
                            KeyCode::Backspace => app.delete_char(),
                            KeyCode::Char(ch) => app.insert_char(ch),
                            _ => {}
                        }
                        draw_ui(terminal, app)?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {}
                    None => return Ok(()),
                }
            }
        }
    }
}
