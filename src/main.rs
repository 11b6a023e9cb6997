mod cli_main;

use anyhow::Context;
use clap::Parser;
use cli_main::{Cli, Commands};
use helix::config::Stage;
use helix::io::fasta::write_graph_edges;
use helix::io::gfa::write_graph_gfa;
use helix::pipeline::{self, checkpoint::load_checkpoint};
use helix::stats::GraphStats;
use std::path::Path;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting tracing default failed")?;

    match cli.command {
        Commands::Assemble(args) => {
            let config = args.to_config().context("Invalid assembly configuration")?;
            let start = std::time::Instant::now();
            let (mut streams, mut paired) =
                pipeline::open_read_streams(&config).context("Failed to open read files")?;
            let output = pipeline::run(&config, &mut streams, &mut paired).context("Assembly failed")?;
            if let Some(report) = &output.simplification {
                info!("Simplification: {}", report);
            }
            println!("{}", output.stats());
            println!("Assembly completed in {:.2}s", start.elapsed().as_secs_f32());
        }
        Commands::Stats { dir, stage, k, json } => {
            let stats = checkpoint_stats(&dir, stage, k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", stats);
            }
        }
        Commands::Export {
            dir,
            stage,
            k,
            fasta,
            gfa,
        } => {
            let checkpoint = load_checkpoint(&dir, stage, k)
                .with_context(|| format!("Cannot load checkpoint '{}' from {:?}", stage, dir))?;
            if let Some(path) = fasta {
                let n = write_graph_edges(&checkpoint.graph, &path)
                    .with_context(|| format!("Cannot write {:?}", path))?;
                info!("Wrote {} edges to {:?}", n, path);
            }
            if let Some(path) = gfa {
                write_graph_gfa(&checkpoint.graph, &path).with_context(|| format!("Cannot write {:?}", path))?;
                info!("Wrote GFA to {:?}", path);
            }
        }
    }
    Ok(())
}

fn checkpoint_stats(dir: &Path, stage: Stage, k: usize) -> anyhow::Result<GraphStats> {
    let checkpoint = load_checkpoint(dir, stage, k)
        .with_context(|| format!("Cannot load checkpoint '{}' from {:?}", stage, dir))?;
    Ok(GraphStats::from_graph(&checkpoint.graph))
}
