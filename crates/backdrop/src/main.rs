mod hosts;
mod scene;

use std::cell::RefCell;
use std::fs::{self, File};
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Duration;

use backdrop_config::Config;
use backdrop_core::RendererKind;
use backdrop_engine::{Clock, Engine, PacedScheduler, RunState, Surface, SystemClock};
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use directories::ProjectDirs;
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout},
    style::Stylize,
    text::Line,
    widgets::Paragraph,
};

use hosts::{SharedScene, TerminalCanvasHost, TerminalContainer, TerminalSignals};
use scene::{Scene, cell_center, viewport_for};

/// Roughly 30 frames per second.
const POLL_INTERVAL: Duration = Duration::from_millis(33);

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_logging();

    let config = Config::load()?;
    let options = Options::from_env();

    let mut terminal = ratatui::init();
    execute!(std::io::stdout(), EnableMouseCapture, EnableFocusChange)?;
    let result = App::new(config, options).run(&mut terminal);
    execute!(std::io::stdout(), DisableFocusChange, DisableMouseCapture)?;
    ratatui::restore();
    result
}

/// Log to a file in the data directory; the terminal belongs to the UI.
///
/// `BACKDROP_LOG` sets the level (`error` to `trace`, default `info`).
fn init_logging() {
    let Some(dirs) = ProjectDirs::from("", "", "backdrop") else {
        return;
    };
    let dir = dirs.data_dir();
    if fs::create_dir_all(dir).is_err() {
        return;
    }
    let Ok(file) = File::create(dir.join("backdrop.log")) else {
        return;
    };
    let level = std::env::var("BACKDROP_LOG")
        .ok()
        .and_then(|value| value.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

/// Switches read from the environment.
#[derive(Debug, Clone, Copy, Default)]
struct Options {
    /// `BACKDROP_REDUCED_MOTION=1` stands in for the host preference.
    reduced_motion: bool,
    /// `BACKDROP_DISABLE_POINTS=1` makes the point backend fail to load.
    disable_points: bool,
}

impl Options {
    fn from_env() -> Self {
        let flag = |name| std::env::var(name).is_ok_and(|value| value == "1");
        Self {
            reduced_motion: flag("BACKDROP_REDUCED_MOTION"),
            disable_points: flag("BACKDROP_DISABLE_POINTS"),
        }
    }
}

/// The main application which holds the state and logic of the application.
pub struct App {
    /// Is the application running?
    running: bool,
    /// Paused with `p`; focus changes leave it alone.
    paused: bool,
    /// Mode currently on screen.
    mode: RendererKind,
    config: Config,
    options: Options,
    scene: SharedScene,
    clock: SystemClock,
    engine: Option<Engine>,
}

impl App {
    /// Construct a new instance of [`App`].
    fn new(config: Config, options: Options) -> Self {
        Self {
            running: false,
            paused: false,
            mode: config.mode,
            config,
            options,
            scene: Rc::new(RefCell::new(Scene::new(0, 0))),
            clock: SystemClock::new(),
            engine: None,
        }
    }

    /// Run the application's main loop.
    pub fn run(mut self, terminal: &mut DefaultTerminal) -> color_eyre::Result<()> {
        let size = terminal.size()?;
        self.scene
            .borrow_mut()
            .resize(size.width, size.height.saturating_sub(1));
        self.rebuild_engine()?;

        self.running = true;
        while self.running {
            self.complete_point_load();
            if let Some(engine) = self.engine.as_mut() {
                engine.pump();
            }
            terminal.draw(|frame| self.render(frame))?;
            self.handle_crossterm_events()?;
        }
        Ok(())
    }

    /// Build an engine for the current mode and start it.
    fn rebuild_engine(&mut self) -> color_eyre::Result<()> {
        // Dropping the old engine stops it and releases its elements.
        self.engine = None;
        self.paused = false;
        self.scene.borrow_mut().clear();

        let config = self.config.engine_config(self.mode)?;
        let surface = match self.mode {
            RendererKind::Bubbles => Surface::Container(Box::new(TerminalContainer::new(
                Rc::clone(&self.scene),
                self.clock,
            ))),
            RendererKind::Particles | RendererKind::Points => {
                Surface::Canvas(Box::new(TerminalCanvasHost::new(Rc::clone(&self.scene))))
            }
        };
        let (cols, rows) = self.scene.borrow().size();
        let signals = TerminalSignals {
            viewport: viewport_for(cols, rows),
            reduced_motion: self.options.reduced_motion,
        };

        let mut engine = Engine::new(
            config,
            Some(surface),
            &signals,
            PacedScheduler::new(),
            self.clock,
            Box::new(StdRng::from_entropy()),
        )?;
        engine.start();
        tracing::info!(
            mode = self.mode.name(),
            renderer = engine.renderer_name().unwrap_or("none"),
            "engine started"
        );
        self.engine = Some(engine);
        Ok(())
    }

    /// Answer a point backend load the canvas host asked for.
    fn complete_point_load(&mut self) {
        if !self.scene.borrow_mut().take_point_request() {
            return;
        }
        let outcome = hosts::load_points(&self.scene, self.options.disable_points);
        if let Some(engine) = self.engine.as_mut() {
            engine.complete_backend_load(outcome);
        }
    }

    /// Renders the user interface.
    fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).split(frame.area());

        let lines = self.scene.borrow().lines(self.clock.now());
        frame.render_widget(Paragraph::new(lines), chunks[0]);

        let (renderer, population, state) = match &self.engine {
            Some(engine) => (
                engine.renderer_name().unwrap_or("inert"),
                engine.population(),
                engine.run_state(),
            ),
            None => ("inert", 0, RunState::Idle),
        };
        let help = Line::from(vec![
            "q".bold().cyan(),
            " quit  ".dark_gray(),
            "m".bold().cyan(),
            " cycle mode  ".dark_gray(),
            "p".bold().cyan(),
            " pause  ".dark_gray(),
            format!("{renderer} ").cyan(),
            format!("{population} elements ").dark_gray(),
            format!("{state:?}").dark_gray(),
        ])
        .centered();
        frame.render_widget(help, chunks[1]);
    }

    /// Reads the crossterm events and updates the state of [`App`].
    fn handle_crossterm_events(&mut self) -> color_eyre::Result<()> {
        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.on_key_event(key)?,
                Event::Mouse(mouse) => self.on_mouse_event(mouse),
                Event::Resize(cols, rows) => self.on_resize(cols, rows),
                Event::FocusLost => self.on_focus_change(false),
                Event::FocusGained => self.on_focus_change(true),
                _ => {}
            }
        }
        Ok(())
    }

    /// Handles the key events and updates the state of [`App`].
    fn on_key_event(&mut self, key: KeyEvent) -> color_eyre::Result<()> {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc | KeyCode::Char('q'))
            | (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            (_, KeyCode::Char('m')) => self.cycle_mode()?,
            (_, KeyCode::Char('p')) => self.toggle_pause(),
            _ => {}
        }
        Ok(())
    }

    fn on_mouse_event(&mut self, mouse: MouseEvent) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                let at = cell_center(mouse.column, mouse.row);
                engine.on_pointer_move(at.x, at.y);
            }
            _ => {}
        }
    }

    /// Losing focus hides the backdrop; regaining it shows it again unless
    /// the user paused.
    fn on_focus_change(&mut self, focused: bool) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if !focused {
            engine.on_pointer_leave();
        }
        engine.on_visibility_change(!focused);
        if focused && self.paused {
            engine.pause();
        }
    }

    fn on_resize(&mut self, cols: u16, rows: u16) {
        let rows = rows.saturating_sub(1);
        self.scene.borrow_mut().resize(cols, rows);
        if let Some(engine) = self.engine.as_mut() {
            engine.on_resize(viewport_for(cols, rows));
        }
    }

    /// Switch to the next mode with a fresh engine.
    fn cycle_mode(&mut self) -> color_eyre::Result<()> {
        self.mode = self.mode.next();
        self.rebuild_engine()
    }

    fn toggle_pause(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        self.paused = !self.paused;
        if self.paused {
            engine.pause();
        } else {
            engine.resume();
        }
    }

    /// Set running to false to quit the application.
    fn quit(&mut self) {
        self.running = false;
    }
}
