// src/main.rs  -  scan-wedge entry point
mod audio;
mod tui;

use anyhow::Result;
use clap::Parser;
use scan_wedge::config::{self, AppConfig, Cli};
use scan_wedge::source::{self, keyboard};
use scan_wedge::{KeyHub, KeystrokeAggregator, RawKeyEvent, TerminationMode};
use std::io::{IsTerminal, Write};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Most recent tokens kept for display
const TOKEN_HISTORY: usize = 200;

// ── UI state (passed to TUI draw) ────────────────────────────────────────────
#[derive(Default, Clone)]
pub struct AppState {
    pub source:    String,
    pub mode:      String,
    pub window_ms: u64,
    pub phase:     String,
    /// (time since start, token)
    pub tokens:    Vec<(String, String)>,
    pub scans:     usize,
    pub pending:   String,
    pub status:    String,
    pub text_mode: bool,
    pub demo:      bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // ── --print-config  ───────────────────────────────────────────────────────
    if cli.print_config {
        print!("{}", config::DEFAULT_CONFIG_TOML);
        return Ok(());
    }

    // ── --write-config  ───────────────────────────────────────────────────────
    if cli.write_config {
        let path = AppConfig::write_default_config(&cli)?;
        println!("Config written to: {}", path.display());
        println!("Edit it to set the scan window, mode and source.");
        return Ok(());
    }

    // ── --list-devices  ───────────────────────────────────────────────────────
    if cli.list_devices {
        let devices = source::list_devices();
        if devices.is_empty() {
            println!("No input devices or serial ports found.");
        } else {
            println!("Available devices:");
            for d in &devices { println!("  {d}"); }
        }
        return Ok(());
    }

    // ── Load config ───────────────────────────────────────────────────────────
    let cfg = AppConfig::load(&cli)?;
    let scan_cfg = cfg.scan_config();

    // ── Source ────────────────────────────────────────────────────────────────
    let (source, is_keyboard) = source::create_source(&cfg)?;
    let source_name = source.name().to_string();

    // ── Hub + aggregator ──────────────────────────────────────────────────────
    // Tokens leave the callback over a channel so the loop below owns all UI state.
    let hub = KeyHub::new();
    let (tx_token, rx_token) = mpsc::channel::<String>();
    let mut aggregator = KeystrokeAggregator::new(scan_cfg.clone(), hub.clone());
    aggregator.start(move |token| { let _ = tx_token.send(token); });

    // ── Beep ──────────────────────────────────────────────────────────────────
    let mut beep  = audio::create_audio(cfg.beep, cfg.volume);
    let chirp     = audio::scan_chirp(cfg.tone_hz as f32);

    // ── Source polling thread ─────────────────────────────────────────────────
    // Stamps each transition when it is read; the hub keeps that stamp so
    // window timing doesn't depend on how often the main loop runs.
    let (tx_key, rx_key) = mpsc::channel::<(RawKeyEvent, Instant)>();
    let mut source = source;
    thread::spawn(move || loop {
        while let Some(ev) = source.poll() {
            if tx_key.send((ev, Instant::now())).is_err() {
                return;
            }
        }
        thread::sleep(Duration::from_millis(1));
    });

    // ── Terminal ──────────────────────────────────────────────────────────────
    let mut tui = if cfg.plain {
        crossterm::terminal::enable_raw_mode()?;
        None
    } else {
        Some(tui::Tui::new()?)
    };
    let release_events = is_keyboard && keyboard::enable_release_events();

    let mut state = AppState {
        source:    source_name,
        mode:      match scan_cfg.mode {
            TerminationMode::CountThreshold => format!("count > {}", scan_cfg.min_len),
            TerminationMode::TerminatorChar => format!("terminator {:?}", scan_cfg.terminator),
        },
        window_ms: scan_cfg.window.as_millis() as u64,
        phase:     if scan_cfg.use_key_down { "down".into() } else { "up".into() },
        status:    "Waiting for a scan…".into(),
        text_mode: is_keyboard,
        demo:      cfg.source == config::SourceType::Demo,
        ..Default::default()
    };
    if is_keyboard && !release_events && !scan_cfg.use_key_down && !state.demo {
        log::warn!("terminal does not report key releases; keystrokes will be ignored without --key-down");
        state.status = "This terminal does not report key releases: restart with --key-down".into();
    }

    let stdout_is_tty = std::io::stdout().is_terminal();

    // ── Main loop ─────────────────────────────────────────────────────────────
    let started   = Instant::now();
    let tick      = Duration::from_millis(5);
    let redraw    = Duration::from_millis(250);
    let mut last_draw: Option<Instant> = None;

    'main: loop {
        let mut dirty = false;

        // Terminal keys and source events are stamped when read, then
        // dispatched together in time order.
        let mut batch: Vec<(RawKeyEvent, Instant)> = Vec::new();

        // ── Single crossterm event reader ─────────────────────────────────────
        {
            use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
            while event::poll(Duration::from_millis(0))? {
                if let Event::Key(k) = event::read()? {
                    let read_at = Instant::now();
                    if k.kind != KeyEventKind::Release {
                        // Escape or Ctrl+C always quit
                        if k.code == KeyCode::Esc
                            || (k.code == KeyCode::Char('c')
                                && k.modifiers.contains(KeyModifiers::CONTROL))
                        {
                            break 'main;
                        }
                        if !is_keyboard && matches!(k.code, KeyCode::Char('q' | 'Q')) {
                            break 'main;
                        }
                    }
                    if is_keyboard {
                        if let Some(raw) = keyboard::translate(&k) {
                            batch.push((raw, read_at));
                        }
                    }
                }
            }
        }

        batch.extend(rx_key.try_iter());
        hub.dispatch_batch(batch);

        aggregator.pump();

        while let Ok(token) = rx_token.try_recv() {
            if let Err(e) = beep.chirp(&chirp) {
                log::warn!("beep failed: {e}");
            }
            if tui.is_none() {
                // Raw mode is on: a bare \n would not return the cursor
                let eol = if stdout_is_tty { "\r\n" } else { "\n" };
                let mut so = std::io::stdout().lock();
                write!(so, "{token}{eol}")?;
                so.flush()?;
            }
            state.status = format!("Last scan: {} chars", token.chars().count());
            state.tokens.push((format!("+{:.1}s", started.elapsed().as_secs_f32()), token));
            if state.tokens.len() > TOKEN_HISTORY { state.tokens.remove(0); }
            state.scans += 1;
            dirty = true;
        }

        let pending = aggregator.pending();
        if pending != state.pending {
            state.pending = pending;
            dirty = true;
        }

        // Draw TUI
        if let Some(t) = tui.as_mut() {
            if dirty || last_draw.map_or(true, |d| d.elapsed() >= redraw) {
                t.draw(&state)?;
                last_draw = Some(Instant::now());
            }
        }

        thread::sleep(tick);
    }

    // ── Cleanup ───────────────────────────────────────────────────────────────
    aggregator.stop();
    if release_events { keyboard::disable_release_events(); }
    match tui.as_mut() {
        Some(t) => t.cleanup(),
        None    => { let _ = crossterm::terminal::disable_raw_mode(); }
    }

    if !cfg.plain {
        println!("\n{} scan(s) this session.\n", state.scans);
    }
    Ok(())
}
