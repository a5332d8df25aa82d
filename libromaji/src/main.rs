use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use libromaji::{create_engine, DisplayInfo, Keystroke, Phrase, RomajiConfig};

/// Type kana phrases in romaji from the terminal.
///
/// Each stdin line is a burst of keystrokes for the current phrase.
#[derive(Parser, Debug)]
#[command(name = "romaji-drill", version, about)]
struct Cli {
    /// TOML config file (RomajiConfig keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-phrase time budget in milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Replay keystroke bookkeeping on the offload worker
    #[arg(long)]
    offload: bool,

    /// Name used for the leaderboard submission
    #[arg(long)]
    username: Option<String>,

    /// Space keystrokes this many ms apart instead of using the wall clock
    #[arg(long, default_value_t = 0)]
    key_interval_ms: u64,

    /// Print telemetry events as JSON lines
    #[arg(long)]
    events: bool,

    /// Phrases as `display=kana`, or bare kana
    #[arg(required = true)]
    phrases: Vec<String>,
}

/// Wall clock, or a synthetic one advancing a fixed step per keystroke.
struct Clock {
    start: Instant,
    step_ms: u64,
    synthetic_ms: u64,
}

impl Clock {
    fn new(step_ms: u64) -> Self {
        Self {
            start: Instant::now(),
            step_ms,
            synthetic_ms: 0,
        }
    }

    fn now(&self) -> u64 {
        if self.step_ms > 0 {
            self.synthetic_ms
        } else {
            self.start.elapsed().as_millis() as u64
        }
    }

    fn tick(&mut self) -> u64 {
        self.synthetic_ms += self.step_ms;
        self.now()
    }
}

fn parse_phrase(arg: &str) -> Phrase {
    match arg.split_once('=') {
        Some((display, kana)) => Phrase::new(display, kana),
        None => Phrase::new(arg, arg),
    }
}

fn render(info: &DisplayInfo) -> String {
    let typed: String = info.canonical_text.chars().take(info.typed_length).collect();
    let rest: String = info.canonical_text.chars().skip(info.typed_length).collect();
    let next = info
        .next_expected_char
        .map_or_else(|| "-".to_string(), |c| c.to_string());
    format!(
        "[{typed}|{rest}] next={next} partial={:?} {:.0}% combo={}{}",
        info.current_partial_input,
        info.progress_percent,
        info.combo,
        if info.is_error { " (miss)" } else { "" }
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RomajiConfig::load_toml(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RomajiConfig::default(),
    };
    if cli.time_limit_ms.is_some() {
        config.base_mut().time_limit_ms = cli.time_limit_ms;
    }
    if cli.offload {
        config.base_mut().offload_enabled = true;
    }
    if let Some(name) = &cli.username {
        config.base_mut().username = name.clone();
    }
    tracing::info!(?config, "configuration loaded");

    let phrases: Vec<Phrase> = cli.phrases.iter().map(|p| parse_phrase(p)).collect();
    if phrases.iter().all(|p| p.script_text.trim().is_empty()) {
        bail!("no phrase has any text to type");
    }

    let mut engine = create_engine(config).context("starting typing engine")?;
    let mut clock = Clock::new(cli.key_interval_ms);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();

    'phrases: for phrase in &phrases {
        let start = engine.load_phrase(phrase, clock.now())?;
        if cli.events {
            writeln!(stdout, "{}", start.to_json()?)?;
        }
        writeln!(stdout, "{}", phrase.display_text)?;
        if let Some(info) = engine.display() {
            writeln!(stdout, "{}", render(&info))?;
        }

        while engine.session().is_some_and(|s| !s.is_completed()) {
            let Some(line) = lines.next() else {
                break 'phrases;
            };
            let line = line?;
            for ch in line.chars().filter(|c| !c.is_whitespace() || *c == ' ') {
                let result = engine.handle_key(Keystroke::new(ch, clock.tick()));
                if result.completes_session {
                    break;
                }
            }
            engine.update(clock.now());
            engine.poll_offload();
            if let Some(info) = engine.display() {
                writeln!(stdout, "{}", render(&info))?;
            }
        }

        if cli.events {
            for event in engine.take_events() {
                writeln!(stdout, "{}", event.to_json()?)?;
            }
        }
    }

    if engine.is_offloading() {
        engine.wait_offload(Duration::from_millis(500));
    }

    let record = engine.score();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&record)?)?;
    writeln!(stdout, "{}", serde_json::to_string_pretty(&engine.submission())?)?;
    Ok(())
}
