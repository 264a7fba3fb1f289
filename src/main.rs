mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use cli::{split_path_tag, Cli, Commands};
use mkp_core::config::ScanRoot;
use mkp_core::{Config, ProfileSet};
use mkp_engine::RemuxOptions;
use mkp_server::{build_coordinator, Outcome, ProcessOptions, ProcessRequest};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise derive the filter from -v.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mkvpriority=trace,mkp_core=trace,mkp_engine=trace,mkp_av=debug,mkp_db=debug,mkp_server=trace".to_string()
        } else {
            "mkvpriority=info,mkp_av=info,mkp_server=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Run {
            paths,
            dry_run,
            restore,
            prune,
            reorder,
            strip,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_batch(
                &paths,
                cli.config.as_deref(),
                ProcessOptions {
                    dry_run,
                    remux: RemuxOptions { reorder, strip },
                },
                restore,
                prune,
            ))
        }
        Commands::Serve { host, port } => {
            let mut config = Config::load_or_default(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            for warning in config.validate() {
                tracing::warn!("config: {warning}");
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async { mkp_server::serve(config).await.map_err(Into::into) })
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { config } => {
            let path = config.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mkvpriority {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_batch(
    paths: &[String],
    config_path: Option<&Path>,
    options: ProcessOptions,
    restore: bool,
    prune: bool,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    let profiles = ProfileSet::load(&config.profiles)?;
    let coordinator = Arc::new(build_coordinator(&config, profiles)?);

    if prune {
        let pruned = coordinator.prune()?;
        println!("Pruned {pruned} archive entries");
    }

    let mut failures = 0usize;
    for arg in paths {
        let (path, tag) = split_path_tag(arg);

        if path.is_dir() {
            let roots = [ScanRoot { path, tag }];
            let summary =
                mkp_server::scan(coordinator.clone(), &roots, options, config.server.workers)
                    .await;
            failures += summary.failed;
            continue;
        }

        if restore {
            match coordinator.restore(&path).await {
                Ok(()) => println!("Restored: {}", path.display()),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "restore failed");
                    failures += 1;
                }
            }
            continue;
        }

        let mut req = ProcessRequest::new(&path);
        req.tags = tag.into_iter().collect();
        req.options = options;

        match coordinator.handle(&req).await {
            Ok(Outcome::Applied(plan)) => {
                println!("Applied {} flag changes: {}", plan.deltas.len(), path.display())
            }
            Ok(Outcome::Unchanged) => println!("Unchanged: {}", path.display()),
            Ok(Outcome::DryRun(plan)) => println!(
                "Dry run, {} flag changes pending: {}",
                plan.deltas.len(),
                path.display()
            ),
            Ok(Outcome::Skipped { reason }) => println!("Skipped ({reason}): {}", path.display()),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "processing failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} file(s) failed");
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let registry = mkp_av::ToolRegistry::discover(&config.tools);

    println!("Checking external tools...\n");
    let mut all_ok = true;
    for tool in registry.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };
        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install mkvtoolnix to enable processing.");
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load_or_default(Some(p))?;
            for warning in config.validate() {
                println!("  warning: {warning}");
            }
            let profiles = ProfileSet::load(&config.profiles)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Archive: {}", config.archive.db_path.display());
            println!("  Scan roots: {}", config.scan.roots.len());
            println!("  Schedule enabled: {}", config.schedule.enabled);
            println!("  Arr integrations: {}", config.arrs.len());
            println!(
                "  Profiles: default + {} tagged ({})",
                profiles.tags().count(),
                profiles.tags().collect::<Vec<_>>().join(", ")
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Archive: {}", config.archive.db_path.display());
        }
    }
    Ok(())
}
