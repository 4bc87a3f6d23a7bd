use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use growth::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::SubscriberBuilder;

mod config;
mod export;
mod provenance;

use config::BranchesConfig;
use provenance::Payload;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Run growth engines and write their layers")]
struct Cmd {
    /// Optional run label; propagated to outputs and logs
    #[arg(long)]
    tag: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Args)]
struct RunArgs {
    /// JSON params file; missing fields fall back to defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed override
    #[arg(long)]
    seed: Option<u64>,
    /// Output file (.json, .csv or .parquet)
    #[arg(long)]
    out: PathBuf,
}

#[derive(Subcommand)]
enum Action {
    /// Tree-branch growth from a start polyline
    Branches(RunArgs),
    /// Terrace (ziggurat) growth from a base U outline
    Terrace(RunArgs),
    /// Attractor paths from seed points toward a center
    Attractor(RunArgs),
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Branches(args) => branches(args, cmd.tag),
        Action::Terrace(args) => terrace(args, cmd.tag),
        Action::Attractor(args) => attractor(args, cmd.tag),
        Action::Report => report(cmd.tag),
    }
}

fn branches(args: RunArgs, tag: Option<String>) -> Result<()> {
    let mut cfg: BranchesConfig = config::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        cfg.params.seed = seed;
    }
    tracing::info!(out = %args.out.display(), tag = ?tag, seed = cfg.params.seed, "branches");
    let BranchesConfig { start, params } = cfg;
    let run = BranchGrowth::new(Polyline::new(start.clone()), params)?;
    let recorded = serde_json::to_value(BranchesConfig {
        start,
        params: run.params().clone(),
    })?;
    let grown = run.grow();
    log_outcome("branches", &grown);
    export::write_layers(&args.out, &grown.history)?;
    finish(&args.out, "branches", recorded, tag)
}

fn terrace(args: RunArgs, tag: Option<String>) -> Result<()> {
    let mut params: TerraceParams = config::load(args.config.as_deref())?;
    if args.seed.is_some() {
        params.seed = args.seed;
    }
    tracing::info!(out = %args.out.display(), tag = ?tag, seed = ?params.seed, "terrace");
    let run = TerraceGrowth::new(params)?;
    let recorded = serde_json::to_value(run.params())?;
    let grown = run.grow();
    log_outcome("terrace", &grown);
    export::write_layers(&args.out, &grown.history)?;
    finish(&args.out, "terrace", recorded, tag)
}

fn attractor(args: RunArgs, tag: Option<String>) -> Result<()> {
    let mut params: AttractorParams = config::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    tracing::info!(out = %args.out.display(), tag = ?tag, seed = params.seed, "attractor");
    let run = AttractorGrowth::new(params)?;
    let recorded = serde_json::to_value(run.params())?;
    let paths = run.grow();
    let curves = paths.curves();
    tracing::info!(
        paths = curves.len(),
        points = curves.iter().map(Polyline::point_count).sum::<usize>(),
        "attractor grown"
    );
    export::write_layers(&args.out, &curves)?;
    finish(&args.out, "attractor", recorded, tag)
}

fn log_outcome(kind: &str, grown: &Growth) {
    let layers = grown.history.len();
    match &grown.stop {
        StopReason::Completed => tracing::info!(kind, layers, "growth completed"),
        StopReason::Aborted { iteration, error } => {
            tracing::warn!(kind, layers, iteration, %error, "growth stopped early")
        }
    }
}

fn finish(out: &Path, engine: &str, params: serde_json::Value, tag: Option<String>) -> Result<()> {
    let mut payload = Payload::new(engine, params);
    payload.tags.extend(tag);
    let sidecar = provenance::write_sidecar(out, payload)?;
    tracing::info!(sidecar = %sidecar.display(), "provenance written");
    Ok(())
}

fn report(tag: Option<String>) -> Result<()> {
    let obj = serde_json::json!({
        "code_rev": provenance::current_git_rev(),
        "version": growth::VERSION,
        "tags": tag.into_iter().collect::<Vec<_>>(),
        "params": {},
        "outputs": []
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
