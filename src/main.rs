mod app;
mod config;
mod controller;
mod domain;
mod error;
mod events;
mod input;
mod notifications;
mod persistence;
mod ticker;
mod ui;

use anyhow::{Context, Result};
use app::AppState;
use chrono::Local;
use clap::{Parser, Subcommand};
use config::Config;
use controller::TaskController;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use domain::{format_clock, task_rows};
use persistence::{ensure_dir, TaskStore};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use ticker::TimerEngine;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "etime")]
#[command(about = "A terminal task timer with estimates, ambitious targets and escalating alarms", long_about = None)]
struct Cli {
    /// Data directory. Defaults to $ETIME_DIR, then ~/.etime
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the active tasks
    Status,
    /// Print recently completed tasks
    History {
        /// How many entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.data_dir)?;

    match cli.command {
        Some(Commands::Status) => {
            init_logging(None);
            print_status(&config);
            Ok(())
        }
        Some(Commands::History { limit }) => {
            init_logging(None);
            print_history(&config, limit);
            Ok(())
        }
        None => {
            ensure_dir(&config.data_dir)?;
            init_logging(Some(&config.log_file()));
            run_tui(config)
        }
    }
}

/// RUST_LOG filter (default info); to a log file while the TUI owns the screen
fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_file.and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Could not open log file {}: {}", path.display(), e))
            .ok()
    });

    let result = match file {
        Some(file) => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
            .with(filter)
            .try_init(),
        None if log_file.is_some() => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::sink))
            .with(filter)
            .try_init(),
        None => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr))
            .with(filter)
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging disabled: {}", e);
    }
}

fn print_status(config: &Config) {
    let store = TaskStore::from_config(config);
    let tasks = store.load_active();

    if tasks.is_empty() {
        println!("No active tasks.");
        return;
    }

    for row in task_rows(&tasks, Local::now()) {
        let indent = if row.is_subtask { "  └ " } else { "" };
        let marker = if row.is_over_estimate() { " ⏰" } else { "" };
        println!(
            "{:>3}. {}{}  {}  {}{}",
            row.index + 1,
            indent,
            row.name,
            row.time_label(),
            row.state.badge(),
            marker
        );
    }
}

fn print_history(config: &Config, limit: usize) {
    let store = TaskStore::from_config(config);
    let history = store.load_history();

    if history.is_empty() {
        println!("No completed tasks yet.");
        return;
    }

    let skip = history.len().saturating_sub(limit);
    for task in &history[skip..] {
        let finished = task
            .completed_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let target = if task.within_ambitious() { " 🎯" } else { "" };
        println!(
            "{}  {}  {} / {}{}",
            finished,
            task.name,
            format_clock(task.elapsed_seconds),
            format_clock(task.estimated_seconds as f64),
            target
        );
    }
}

fn run_tui(config: Config) -> Result<()> {
    tracing::info!("Using data directory: {}", config.data_dir.display());

    let store = TaskStore::from_config(&config);
    let controller = TaskController::load(store, TimerEngine::from_settings(&config.settings));
    let mut app = AppState::new(controller, config.settings.clone());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &mut app, &config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Save on exit
    if let Err(e) = app.controller.save() {
        tracing::error!("Final save failed: {}", e);
        eprintln!("Error saving state: {}", e);
    }

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut AppState, config: &Config) -> Result<()> {
    let tick_rate = config.settings.tick_duration();
    let mut last_tick = Instant::now();

    loop {
        app.process_events();

        // Render
        terminal.draw(|f| ui::render(f, app)).context("Failed to draw")?;

        // Wait for input until the next tick is due
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                // Only process key press events (ignore key release)
                if key.kind == KeyEventKind::Press && input::handle_key(app, key)? {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }
    }
}
