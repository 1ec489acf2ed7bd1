use clap::Parser;
use semlayer::commands::{self, parser::Cli};
use semlayer::interaction::DialoguerInput;
use semlayer::session::{SessionContext, Settings};
use semlayer::utils::logger::init_logger;
use semlayer::{ConfigSyncManager, QueryEngineClient, SemLayerError};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logger(cli.log_level.as_deref(), cli.log_file.clone()) {
        eprintln!("Failed to initialize logging: {err}");
        return ExitCode::from(1);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<SemLayerError>() {
            Some(sem_err) => {
                eprintln!("{}", sem_err.user_message());
                ExitCode::from(sem_err.exit_code())
            }
            None => {
                eprintln!("{err:#}");
                ExitCode::from(1)
            }
        },
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let working_dir = std::env::current_dir()?;
    let settings = Settings::load(cli.config.as_deref())?;
    let session = SessionContext::from_settings(settings, &working_dir)?;
    tracing::debug!("Session: {:?}", session);

    let client = QueryEngineClient::new(&session)?;
    let manager = ConfigSyncManager::new(&session, client);

    let mut stdout = console::Term::stdout();
    commands::execute(cli.command, &manager, &DialoguerInput, &mut stdout)
}
