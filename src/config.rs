// src/config.rs  -  Runtime configuration (CLI + TOML)
use crate::scan::{ScanConfig, TerminationMode};
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The example config is embedded directly in the binary at compile time.
/// Users can write it out with:  scan-wedge --write-config
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml.example");

// ── CLI ───────────────────────────────────────────────────────────────────────
#[derive(Parser, Debug, Default)]
#[command(
    name    = "scan-wedge",
    about   = "Keyboard-wedge barcode scanner listener",
    version,
)]
pub struct Cli {
    /// Config file path (default: ~/.config/scan-wedge/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Longest quiet gap between keystrokes of one scan, in ms (default: 100)
    #[arg(long)]
    pub window_ms: Option<u64>,

    /// Read characters from key-press events instead of key-release events
    #[arg(long, action)]
    pub key_down: bool,

    /// End-of-scan rule: count-threshold | terminator-char
    #[arg(long)]
    pub mode: Option<TerminationMode>,

    /// count-threshold: report only tokens longer than this (default: 3)
    #[arg(long)]
    pub min_len: Option<usize>,

    /// terminator-char: sentinel that ends a scan (default: m)
    #[arg(long)]
    pub terminator: Option<char>,

    /// Key source: auto | keyboard | evdev | serial | demo
    #[arg(long)]
    pub source: Option<SourceType>,

    /// Input device for the evdev source (e.g. /dev/input/by-id/usb-…-event-kbd)
    #[arg(long)]
    pub device: Option<String>,

    /// Grab the evdev device so its keystrokes stop reaching other programs
    #[arg(long, action)]
    pub grab: bool,

    /// Serial port for the serial source (e.g. /dev/ttyACM0, COM3)
    #[arg(long)]
    pub port: Option<String>,

    /// Serial baud rate (default: 9600)
    #[arg(long)]
    pub baud: Option<u32>,

    /// Print one token per line on stdout instead of drawing the TUI
    #[arg(long, action)]
    pub plain: bool,

    /// Disable the confirmation beep
    #[arg(long, action)]
    pub no_beep: bool,

    /// List input devices and serial ports, then exit
    #[arg(long, action)]
    pub list_devices: bool,

    /// Write the built-in default config.toml to the config path and exit.
    /// Use --config <PATH> to write to a custom location.
    #[arg(long, action)]
    pub write_config: bool,

    /// Print the built-in default config.toml to stdout and exit
    #[arg(long, action)]
    pub print_config: bool,

    /// Demo mode: a simulated scanner types codes (same as --source demo)
    #[arg(long, action)]
    pub demo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Serial scanner if one is found, otherwise the terminal keyboard
    Auto,
    /// Terminal keyboard (the scanner types into this terminal)
    Keyboard,
    /// Linux input device (/dev/input/event*)
    #[cfg_attr(not(all(feature = "source-evdev", target_os = "linux")), value(skip))]
    Evdev,
    /// Scanner in USB-COM / RS-232 mode
    #[cfg_attr(not(feature = "source-serial"), value(skip))]
    Serial,
    /// Simulated scanner
    Demo,
}

// ── TOML file structure ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    pub scan:   Option<ScanCfg>,
    pub source: Option<SourceCfg>,
    pub output: Option<OutputCfg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanCfg {
    pub window_ms:  Option<u64>,
    pub key_down:   Option<bool>,
    pub mode:       Option<TerminationMode>,
    pub min_len:    Option<usize>,
    pub terminator: Option<char>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCfg {
    pub kind:   Option<SourceType>,
    pub device: Option<String>,
    pub grab:   Option<bool>,
    pub port:   Option<String>,
    pub baud:   Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputCfg {
    pub beep:    Option<bool>,
    pub tone_hz: Option<u32>,
    pub volume:  Option<f32>,
    pub plain:   Option<bool>,
}

// ── Resolved / merged config ──────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub window_ms:  u64,
    pub key_down:   bool,
    pub mode:       TerminationMode,
    pub min_len:    usize,
    pub terminator: char,
    pub source:     SourceType,
    /// evdev device path; empty = first device that looks like a scanner
    pub device:     String,
    pub grab:       bool,
    /// Serial port; empty = autodetect
    pub port:       String,
    pub baud:       u32,
    pub beep:       bool,
    pub tone_hz:    u32,
    pub volume:     f32,
    pub plain:      bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let scan = ScanConfig::default();
        Self {
            window_ms:  scan.window.as_millis() as u64,
            key_down:   scan.use_key_down,
            mode:       scan.mode,
            min_len:    scan.min_len,
            terminator: scan.terminator,
            source:     SourceType::Auto,
            device:     String::new(),
            grab:       false,
            port:       String::new(),
            baud:       9600,
            beep:       true,
            tone_hz:    1800,
            volume:     0.4,
            plain:      false,
        }
    }
}

// ── Config loader ─────────────────────────────────────────────────────────────
impl AppConfig {
    /// Write the embedded default config to disk.
    /// Returns the path it was written to.
    pub fn write_default_config(cli: &Cli) -> Result<PathBuf> {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating config directory {:?}", parent))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Writing config to {:?}", path))?;
        Ok(path)
    }

    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = Self::default();

        // 1. Load TOML file
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading config {:?}", path))?;
            cfg.apply_toml(&raw)
                .with_context(|| format!("Parsing config {:?}", path))?;
        } else {
            log::info!("No config file at {} → using defaults", path.display());
        }

        // 2. Apply CLI overrides
        cfg.apply_cli(cli);
        Ok(cfg)
    }

    pub fn apply_toml(&mut self, raw: &str) -> Result<()> {
        let fc: FileConfig = toml::from_str(raw)?;
        self.apply_file(&fc);
        Ok(())
    }

    fn apply_file(&mut self, fc: &FileConfig) {
        if let Some(s) = &fc.scan {
            if let Some(v) = s.window_ms  { self.window_ms  = v; }
            if let Some(v) = s.key_down   { self.key_down   = v; }
            if let Some(v) = s.mode       { self.mode       = v; }
            if let Some(v) = s.min_len    { self.min_len    = v; }
            if let Some(v) = s.terminator { self.terminator = v; }
        }
        if let Some(s) = &fc.source {
            if let Some(v) = s.kind        { self.source = v; }
            if let Some(v) = &s.device     { self.device = v.clone(); }
            if let Some(v) = s.grab        { self.grab   = v; }
            if let Some(v) = &s.port       { self.port   = v.clone(); }
            if let Some(v) = s.baud        { self.baud   = v; }
        }
        if let Some(o) = &fc.output {
            if let Some(v) = o.beep    { self.beep    = v; }
            if let Some(v) = o.tone_hz { self.tone_hz = v; }
            if let Some(v) = o.volume  { self.volume  = v; }
            if let Some(v) = o.plain   { self.plain   = v; }
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = cli.window_ms   { self.window_ms  = v; }
        if cli.key_down                  { self.key_down   = true; }
        if let Some(v) = cli.mode        { self.mode       = v; }
        if let Some(v) = cli.min_len     { self.min_len    = v; }
        if let Some(v) = cli.terminator  { self.terminator = v; }
        if let Some(v) = cli.source      { self.source     = v; }
        if let Some(v) = &cli.device     { self.device     = v.clone(); }
        if cli.grab                      { self.grab       = true; }
        if let Some(v) = &cli.port       { self.port       = v.clone(); }
        if let Some(v) = cli.baud        { self.baud       = v; }
        if cli.plain                     { self.plain      = true; }
        if cli.no_beep                   { self.beep       = false; }
        if cli.demo                      { self.source     = SourceType::Demo; }
    }

    /// Aggregator settings derived from this config
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            window:       Duration::from_millis(self.window_ms.max(1)),
            use_key_down: self.key_down,
            mode:         self.mode,
            min_len:      self.min_len,
            terminator:   self.terminator,
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs_next().join("scan-wedge").join("config.toml")
}

fn dirs_next() -> PathBuf {
    if let Ok(v) = std::env::var("XDG_CONFIG_HOME") { return PathBuf::from(v); }
    if let Ok(v) = std::env::var("APPDATA")          { return PathBuf::from(v); }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();
    PathBuf::from(home).join(".config")
}
