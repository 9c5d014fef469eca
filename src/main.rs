use colored::Colorize;
use wsrelay::{
    cli::Cli,
    config::Config,
    init_logging,
    relay::{Console, ConsoleInput, Relay, RelayOutcome, RelaySettings},
};

fn report_fatal(error: &dyn std::fmt::Display) {
    eprintln!("{} {}", "error:".red().bold(), error);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // Load configuration
    let config = match Config::load(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            report_fatal(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_guard = match init_logging(&cli.effective_log_level(&config), config.log_file()) {
        Ok(guard) => guard,
        Err(e) => {
            report_fatal(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    tracing::debug!("CLI arguments: {:?}", cli);

    let code = match run(&cli, &config).await {
        Ok(outcome) => {
            tracing::info!("Relay finished: {:?}", outcome);
            0
        }
        Err(e) => {
            report_fatal(&e);
            1
        }
    };

    // Flush the file log before the process exits.
    drop(log_guard);
    std::process::exit(code);
}

async fn run(cli: &Cli, config: &Config) -> Result<RelayOutcome, wsrelay::relay::RelayError> {
    let settings = RelaySettings::from_cli(cli, config)?;
    let console = Console::stdout(config.console.enable_colors && !cli.no_color);

    let relay = Relay::connect(&settings, console).await?;
    relay.shutdown_controller().spawn_interrupt_listener();

    let input = ConsoleInput::spawn_stdin()?;
    relay.run(input).await
}
