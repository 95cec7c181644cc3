//! Binary entrypoint: read one JSON object from stdin, write one to stdout.
//!
//! Always exits 0. Bad arguments, unreadable input, internal errors and
//! panics all produce `{}`; diagnostics go to stderr via tracing.

use std::env;
use std::io::{self, Read, Write};
use std::panic;
use std::path::PathBuf;

use chrono::Utc;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use signal_engine::{Hook, HookResponse};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "signal-engine", version, about = "Classify agent tool events and flag recurring problems")]
struct Cli {
  /// Project directory holding the `.claude/` stores.
  #[arg(long, env = "SIGNAL_ENGINE_ROOT", global = true)]
  project_root: Option<PathBuf>,

  #[command(subcommand)]
  hook: HookCommand,
}

#[derive(Subcommand, Clone, Copy)]
enum HookCommand {
  /// Fingerprint error output and remind on recurrence.
  ErrorDetector,
  /// Track skill success/failure and flag struggling skills.
  SkillMonitor,
}

impl From<HookCommand> for Hook {
  fn from(cmd: HookCommand) -> Self {
    match cmd {
      HookCommand::ErrorDetector => Hook::ErrorDetector,
      HookCommand::SkillMonitor => Hook::SkillMonitor,
    }
  }
}

fn main() {
  init_tracing();

  let response = match Cli::try_parse() {
    Ok(cli) => respond(cli),
    Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
    Err(e) => {
      tracing::warn!(error = %e, "bad arguments, allowing");
      HookResponse::empty()
    }
  };

  emit(&response);
}

fn init_tracing() {
  let filter = EnvFilter::try_from_env("SIGNAL_ENGINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .with_ansi(false)
    .try_init();
}

fn respond(cli: Cli) -> HookResponse {
  let mut raw = String::new();
  if let Err(e) = io::stdin().lock().read_to_string(&mut raw) {
    tracing::warn!(error = %e, "stdin read failed, allowing");
    return HookResponse::empty();
  }

  let root = cli
    .project_root
    .or_else(|| env::current_dir().ok())
    .unwrap_or_else(|| PathBuf::from("."));
  let hook = Hook::from(cli.hook);

  panic::catch_unwind(move || signal_engine::run(hook, &raw, &root, Utc::now())).unwrap_or_else(|_| {
    tracing::warn!("signal engine panicked, allowing");
    HookResponse::empty()
  })
}

fn emit(response: &HookResponse) {
  let json = serde_json::to_string(response).unwrap_or_else(|_| "{}".to_string());
  let mut out = io::stdout().lock();
  let _ = writeln!(out, "{}", json);
  let _ = out.flush();
}
