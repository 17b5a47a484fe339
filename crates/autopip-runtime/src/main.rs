//! autopip: scenario replay and config inspection for the PiP runtime.

use std::path::{Path, PathBuf};

use anyhow::Context;
use autopip_runtime::AutopipConfig;
use autopip_runtime::replay::{Scenario, run_scenario};
use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("AUTOPIP_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = AutopipConfig::load_or_default(args.config.as_deref())?;

    match args.command {
        cli::Command::Replay(opts) => {
            let mut failed = 0usize;
            for path in scenario_files(&opts.paths)? {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let scenario = Scenario::from_json(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?;
                let report = run_scenario(&scenario, &config).await?;
                let mismatches = report.check(&scenario.expect);
                println!("{}", serde_json::to_string_pretty(&report)?);
                for m in &mismatches {
                    tracing::error!(scenario = %scenario.name, "{m}");
                }
                if !mismatches.is_empty() {
                    failed += 1;
                }
            }
            if opts.check && failed > 0 {
                anyhow::bail!("{failed} scenario(s) did not meet expectations");
            }
        }
        cli::Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Expand directories into their `*.json` files, sorted for stable output.
fn scenario_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("listing {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_json(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}
