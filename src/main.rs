use clap::Parser;
use app_explorer::cli::commands::{cmd_explore, cmd_generate};
use app_explorer::cli::config::{Cli, Commands, load_config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Explore(args) => {
            let clean = cmd_explore(&args, &config)?;
            if !clean {
                std::process::exit(1);
            }
        }
        Commands::Generate { graph, output_dir } => {
            cmd_generate(&graph, &output_dir)?;
        }
    }

    Ok(())
}
