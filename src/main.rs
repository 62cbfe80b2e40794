use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use deskrig::cli::{Cli, Commands};
use deskrig::commands;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with env-filter support.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            service,
            bridge_port,
            startup_timeout,
            restart_delay,
            data_dir,
        } => {
            commands::run::run(
                service,
                bridge_port,
                startup_timeout,
                restart_delay,
                data_dir,
            )
            .await
        }
        Commands::Doctor { service } => commands::doctor::run(&service),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "deskrig", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
