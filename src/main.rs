mod cli;
mod config;
mod errors;
mod generate;
mod normalize;
mod pipeline;
mod record;
mod schema;
mod server;
mod store;

use crate::cli::{Cli, Commands};
use crate::errors::PipelineResult;
use crate::normalize::source::SeededSource;
use crate::schema::SchemaRegistry;
use crate::store::Dataset;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, cfg).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cfg: config::AppConfig) -> PipelineResult<()> {
    let registry = SchemaRegistry::builtin()?;
    tracing::debug!(views = registry.len(), "schema registry loaded");
    let data_path = cli.data_path.unwrap_or_else(|| cfg.data_path.clone());

    match cli.command {
        Commands::Generate(args) => {
            let mut source = seeded(args.seed.or(cfg.seed));
            let opts = generate::GenerateOptions {
                individual: args.individual,
                combinations: args.combinations,
            };
            let raw = generate::generate(opts, &mut source)?;
            let report = pipeline::run_and_publish(raw, &registry, &mut source, &data_path)?;
            log_report(&report);
        }

        Commands::Normalize { seed } => {
            let raw = Dataset::load(&data_path)?;
            let mut source = seeded(seed.or(cfg.seed));
            let report = pipeline::run_and_publish(raw, &registry, &mut source, &data_path)?;
            log_report(&report);
        }

        Commands::Check => {
            let dataset = Dataset::load(&data_path)?;
            let counts = pipeline::check_dataset(&dataset, &registry)?;
            for (view, rows) in &counts {
                println!("{view:<34} {rows:>5}");
            }
            tracing::info!(path = %data_path.display(), views = counts.len(), "document conforms");
        }

        Commands::Serve { port, dir } => {
            let state = Arc::new(server::ServerState {
                data_path,
                registry,
            });
            let dir = dir.unwrap_or(cfg.serve_dir);
            server::serve(state, dir, port.unwrap_or(cfg.server_port)).await?;
        }

        Commands::Views => print_views(&registry),
    }

    Ok(())
}

fn seeded(seed: Option<u64>) -> SeededSource {
    let source = SeededSource::new(seed);
    match source.seed() {
        Some(s) => tracing::info!(seed = s, "sampling with fixed seed"),
        None => tracing::info!("sampling with entropy seed"),
    }
    source
}

fn log_report(report: &pipeline::RunReport) {
    let records: usize = report.values().map(|s| s.records).sum();
    let synthesized: usize = report.values().map(|s| s.synthesized).sum();
    tracing::info!(views = report.len(), records, synthesized, "pipeline run complete");
}

fn print_views(registry: &SchemaRegistry) {
    for schema in registry.views() {
        println!("{} (label: {})", schema.view, schema.label_field);
        for f in &schema.fields {
            let mut line = format!(
                "  {:<22} {:<9} {}",
                f.name,
                f.kind.to_string(),
                if f.required { "required" } else { "optional" }
            );
            if !f.aliases.is_empty() {
                line.push_str(&format!("  aliases: {}", f.aliases.join(", ")));
            }
            if let Some(d) = &f.derive {
                line.push_str(&format!("  derived from: {}", d.inputs.join(", ")));
            }
            if let Some(rule) = &f.default {
                line.push_str(&format!("  default: {rule}"));
            }
            println!("{line}");
        }
    }
}
