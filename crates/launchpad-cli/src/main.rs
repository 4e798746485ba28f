//! `launchpad`: command-line client for the Launchpad submission API.
//!
//! # Usage
//!
//! ```
//! launchpad --url http://localhost:8080 --user alice --password secret list
//! launchpad --config ~/.config/launchpad/config.toml show <distribution-id>
//! launchpad rollout <submission-id> --platform android 50
//! ```

mod client;
mod render;

use std::{
  io::Read as _,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, ListFilter};
use launchpad_core::{platform::Platform, signal::StoreStatusSignal, submission::Submission};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "launchpad", about = "Drive store submissions and staged rollouts")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the launchpad server (default: http://localhost:8080).
  #[arg(long, env = "LAUNCHPAD_URL")]
  url: Option<String>,

  /// API username; recorded as the actor of every change.
  #[arg(long, env = "LAUNCHPAD_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "LAUNCHPAD_PASSWORD", hide_env_values = true)]
  password: Option<String>,

  /// Print raw JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List distributions.
  List {
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    tenant: Option<String>,
    #[arg(long)]
    limit:  Option<usize>,
  },
  /// Show a distribution and its current submissions.
  Show { distribution_id: Uuid },
  /// Show a submission with its action history.
  Submission { submission_id: Uuid },
  /// Submit a PENDING submission for review. The payload is a JSON file
  /// (`-` for stdin) with the platform's submit fields.
  Submit {
    submission_id: Uuid,
    #[arg(long, value_parser = parse_platform)]
    platform:      Platform,
    #[arg(long, value_name = "FILE")]
    payload:       PathBuf,
  },
  /// Create a new submission after a rejection or cancellation. The payload
  /// must include `platform`.
  Resubmit {
    distribution_id: Uuid,
    #[arg(long, value_name = "FILE")]
    payload:         PathBuf,
  },
  /// Release an APPROVED submission.
  Release {
    submission_id: Uuid,
    #[arg(long, value_parser = parse_platform)]
    platform:      Platform,
    /// Initial rollout percentage: the Android staged rollout, or the
    /// starting phase of an iOS phased release (below 100).
    #[arg(long)]
    percent:       Option<f64>,
  },
  /// Raise the rollout percentage of a LIVE submission.
  Rollout {
    submission_id: Uuid,
    #[arg(long, value_parser = parse_platform)]
    platform:      Platform,
    percent:       f64,
  },
  /// Pause a LIVE rollout.
  Pause {
    submission_id: Uuid,
    #[arg(long, value_parser = parse_platform)]
    platform:      Platform,
    #[arg(long)]
    reason:        String,
  },
  /// Halt an Android rollout.
  Halt {
    submission_id: Uuid,
    #[arg(long)]
    reason:        String,
  },
  /// Resume a PAUSED or HALTED rollout.
  Resume {
    submission_id: Uuid,
    #[arg(long, value_parser = parse_platform)]
    platform:      Platform,
  },
  /// Withdraw an iOS submission from review.
  Cancel {
    submission_id: Uuid,
    #[arg(long)]
    reason:        String,
  },
  /// Report what the store console currently shows.
  Report {
    submission_id: Uuid,
    #[arg(long, value_parser = parse_platform)]
    platform:      Platform,
    /// IN_REVIEW, APPROVED, REJECTED, LIVE, PAUSED, HALTED or CANCELLED.
    #[arg(long)]
    status:        String,
    #[arg(long)]
    percent:       Option<f64>,
    #[arg(long)]
    reason:        Option<String>,
  },
  /// Print a time-limited download URL for the submission's artifact.
  Artifact {
    submission_id: Uuid,
    #[arg(long, value_parser = parse_platform)]
    platform:      Platform,
    #[arg(long)]
    tenant:        String,
  },
}

fn parse_platform(s: &str) -> Result<Platform, String> {
  s.to_ascii_uppercase()
    .parse()
    .map_err(|_| format!("unknown platform `{s}`; expected android or ios"))
}

fn parse_signal(status: &str, percent: Option<f64>, reason: Option<String>) -> Result<StoreStatusSignal> {
  let require_reason =
    || reason.clone().with_context(|| format!("--reason is required for {status}"));
  Ok(match status.to_ascii_uppercase().replace('-', "_").as_str() {
    "IN_REVIEW" => StoreStatusSignal::InReview,
    "APPROVED" => StoreStatusSignal::Approved,
    "REJECTED" => StoreStatusSignal::Rejected { reason: require_reason()? },
    "LIVE" => StoreStatusSignal::Live { rollout_percentage: percent },
    "PAUSED" => StoreStatusSignal::Paused,
    "HALTED" => StoreStatusSignal::Halted,
    "CANCELLED" => StoreStatusSignal::Cancelled { reason: require_reason()? },
    other => bail!("unknown store status `{other}`"),
  })
}

fn read_payload(path: &Path) -> Result<serde_json::Value> {
  let raw = if path.as_os_str() == "-" {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).context("reading payload from stdin")?;
    buf
  } else {
    std::fs::read_to_string(path).with_context(|| format!("reading payload {}", path.display()))?
  };
  serde_json::from_str(&raw).context("payload is not valid JSON")
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .clone()
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: args
      .user
      .clone()
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .clone()
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };
  tracing::debug!(url = %api_config.base_url, user = %api_config.username, "connecting");

  let client = ApiClient::new(api_config)?;
  run(&client, args.command, args.json).await
}

async fn run(client: &ApiClient, command: Command, json: bool) -> Result<()> {
  match command {
    Command::List { status, tenant, limit } => {
      let filter = ListFilter { status, tenant_id: tenant, limit };
      let rows = client.list_distributions(&filter).await?;
      emit(json, &rows, |rows| render::distributions(rows))
    }
    Command::Show { distribution_id } => {
      let view = client.get_distribution(distribution_id).await?;
      emit(json, &view, render::distribution)
    }
    Command::Submission { submission_id } => {
      let details = client.get_submission(submission_id).await?;
      emit(json, &details, render::submission_details)
    }
    Command::Submit { submission_id, platform, payload } => {
      let body = read_payload(&payload)?;
      done(json, client.submit(submission_id, platform, body).await?)
    }
    Command::Resubmit { distribution_id, payload } => {
      let body = read_payload(&payload)?;
      done(json, client.resubmit(distribution_id, body).await?)
    }
    Command::Release { submission_id, platform, percent } => {
      done(json, client.release(submission_id, platform, percent).await?)
    }
    Command::Rollout { submission_id, platform, percent } => {
      done(json, client.update_rollout(submission_id, platform, percent).await?)
    }
    Command::Pause { submission_id, platform, reason } => {
      done(json, client.pause(submission_id, platform, &reason).await?)
    }
    Command::Halt { submission_id, reason } => {
      done(json, client.halt(submission_id, Platform::Android, &reason).await?)
    }
    Command::Resume { submission_id, platform } => {
      done(json, client.resume(submission_id, platform).await?)
    }
    Command::Cancel { submission_id, reason } => {
      done(json, client.cancel(submission_id, Platform::Ios, &reason).await?)
    }
    Command::Report { submission_id, platform, status, percent, reason } => {
      let signal = parse_signal(&status, percent, reason)?;
      done(json, client.report_status(submission_id, platform, &signal).await?)
    }
    Command::Artifact { submission_id, platform, tenant } => {
      let url = client.artifact_url(submission_id, platform, &tenant).await?;
      emit(json, &url, |u| format!("{}\n(expires {})\n", u.url, u.expires_at))
    }
  }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(value).context("encoding output")?);
  } else {
    print!("{}", text(value));
  }
  Ok(())
}

fn done(json: bool, submission: Submission) -> Result<()> {
  emit(json, &submission, |s| format!("{}\n", render::submission(s)))
}
