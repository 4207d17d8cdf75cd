#![forbid(unsafe_code)]

use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use respgate_core::config::{EvidenceTimeoutConfig, GateSettings};
use respgate_core::reference::ReferenceData;
use respgate_core::request::DecisionRequest;
use respgate_engine::matrix::{resolve_matrix_path, Matrix, DEFAULT_MATRIX};
use respgate_engine::Gate;

#[derive(Parser)]
#[command(
    name = "rgate",
    version,
    about = "AI responsibility gate: decide ALLOW / ONLY_SUGGEST / HITL / DENY for a request."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run one request through the gate and print the decision JSON.
    Decide {
        /// Path to a request .json (or "-" / omit for stdin).
        #[arg(default_value = "-")]
        file: String,

        /// Matrix path; overrides profile selection.
        #[arg(long)]
        matrix: Option<String>,

        /// Directory relative matrix paths resolve against.
        #[arg(long, default_value = ".")]
        root: String,

        /// Directory with reference-data overrides.
        #[arg(long)]
        config_dir: Option<String>,

        /// Evidence-timeout configuration file.
        #[arg(long)]
        timeouts: Option<String>,

        /// Pretty-print the response.
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a matrix file: schema, duplicate rule ids, unreachable rules.
    CheckMatrix {
        /// Path to matrix .json file.
        file: String,

        /// Output structured JSON report.
        #[arg(long)]
        json: bool,
    },

    /// Validate an evidence-timeout configuration file.
    CheckTimeouts {
        /// Path to timeout .json file.
        file: String,
    },

    /// Print the matrix path a profile resolves to.
    ResolveProfile {
        /// Profile name; omit for the default matrix.
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Decide {
            file,
            matrix,
            root,
            config_dir,
            timeouts,
            pretty,
        } => {
            cmd_decide(
                &file,
                matrix.as_deref(),
                &root,
                config_dir.as_deref(),
                timeouts.as_deref(),
                pretty,
            )
            .await
        }

        Cmd::CheckMatrix { file, json } => cmd_check_matrix(&file, json),

        Cmd::CheckTimeouts { file } => cmd_check_timeouts(&file),

        Cmd::ResolveProfile { name } => {
            println!("{}", resolve_matrix_path(name.as_deref(), DEFAULT_MATRIX));
            Ok(())
        }
    }
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("cannot read {file}"))
    }
}

async fn cmd_decide(
    file: &str,
    matrix: Option<&str>,
    root: &str,
    config_dir: Option<&str>,
    timeouts: Option<&str>,
    pretty: bool,
) -> Result<()> {
    let req: DecisionRequest = serde_json::from_str(&read_input(file)?)
        .with_context(|| format!("{file}: not a decision request"))?;

    let reference = match config_dir {
        Some(dir) => ReferenceData::load_dir(Path::new(dir))?,
        None => ReferenceData::builtin()?,
    };
    let timeouts = match timeouts {
        Some(path) => EvidenceTimeoutConfig::load(Path::new(path))?,
        None => EvidenceTimeoutConfig::default(),
    };
    let gate = Gate::builder(Arc::new(reference))
        .root(root)
        .timeouts(timeouts)
        .settings(GateSettings::from_env())
        .build()?;

    let resp = match matrix {
        Some(path) => gate.decide_with_matrix(req, path).await?,
        None => gate.decide(req).await?,
    };
    let out = if pretty {
        serde_json::to_string_pretty(&resp)?
    } else {
        serde_json::to_string(&resp)?
    };
    println!("{out}");
    Ok(())
}

fn cmd_check_matrix(file: &str, json_out: bool) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("cannot read {file}"))?;
    let data: serde_json::Value =
        serde_json::from_slice(&bytes).with_context(|| format!("{file}: invalid JSON"))?;

    let mut report = respgate_core::schema::check_matrix(&data, file);
    if report.pass {
        report.digest = Matrix::from_slice(&bytes, file)
            .ok()
            .map(|m| m.digest().to_string());
    }

    if json_out {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if report.pass {
            eprintln!("  ok  {file} ({})", report.version);
        } else {
            eprintln!("  FAIL {file} ({})", report.version);
        }
        for e in &report.errors {
            eprintln!(
                "  error {}: {} {}",
                e.code,
                e.message,
                e.path.as_deref().unwrap_or("")
            );
        }
        for w in &report.warnings {
            eprintln!(
                "  warn  {}: {} {}",
                w.code,
                w.message,
                w.path.as_deref().unwrap_or("")
            );
        }
    }

    if !report.pass {
        bail!("check failed for {file}");
    }
    Ok(())
}

fn cmd_check_timeouts(file: &str) -> Result<()> {
    let cfg = EvidenceTimeoutConfig::load(Path::new(file))?;
    eprintln!(
        "  ok  {file} (provider_timeout_ms={}, overall_deadline_ms={})",
        cfg.provider_timeout_ms, cfg.overall_deadline_ms
    );
    Ok(())
}
