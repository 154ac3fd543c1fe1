use clap::{CommandFactory, Parser};
use console::style;
use data_waster::{cli::Cli, engine::Engine, logging, models::RunConfig, report::ConsoleReporter};
use tracing::trace;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = match RunConfig::try_from(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    logging::init(config.verbose)?;

    if config.verbose {
        println!("{}", style("data-waster").bold().cyan());
        println!("URL: {}", config.url);
        println!("Workers: {}", config.workers);
        println!("Stop after: {} bytes", config.threshold_bytes);
        println!();
    }

    let engine = Engine::new(config)?;
    let summary = engine.run(ConsoleReporter::stdout()).await;
    trace!(outcome = ?summary.outcome, total = summary.snapshot.total(), "exiting");

    Ok(())
}
