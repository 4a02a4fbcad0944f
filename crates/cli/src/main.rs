mod bootstrap;
mod chat;
mod cli;
mod config_cmd;
mod doctor;
mod run;
mod turn;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bootstrap::App;
use cli::{load_config, Cli, Command, ConfigCommand};

/// Exit codes per spec §6.
const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_ERROR: i32 = 1;
const EXIT_VALIDATION_ERROR: i32 = 2;
const EXIT_CONFIG_ERROR: i32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let code = dispatch(cli.command).await;
    std::process::exit(code);
}

async fn dispatch(command: Option<Command>) -> i32 {
    match command {
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = match load_config() {
                Ok(v) => v,
                Err(e) => return config_error(e),
            };
            if config_cmd::validate(&config, &config_path) {
                EXIT_SUCCESS
            } else {
                EXIT_CONFIG_ERROR
            }
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _path) = match load_config() {
                Ok(v) => v,
                Err(e) => return config_error(e),
            };
            match config_cmd::show(&config) {
                Ok(()) => EXIT_SUCCESS,
                Err(e) => runtime_error(e),
            }
        }
        Some(Command::Version) => {
            println!("serialagent {}", env!("CARGO_PKG_VERSION"));
            EXIT_SUCCESS
        }
        Some(Command::Doctor) => {
            let (config, config_path) = match load_config() {
                Ok(v) => v,
                Err(e) => return config_error(e),
            };
            let app = match App::build(config.clone()).await {
                Ok(app) => app,
                Err(e) => return config_error(e),
            };
            if doctor::doctor(&config, &config_path, &app) {
                EXIT_SUCCESS
            } else {
                EXIT_CONFIG_ERROR
            }
        }
        Some(Command::Run { message, session, json }) => {
            let (config, _path) = match load_config() {
                Ok(v) => v,
                Err(e) => return config_error(e),
            };
            let app = match App::build(config).await {
                Ok(app) => app,
                Err(e) => return config_error(e),
            };
            match run::run(&app, message, session, json).await {
                Ok(()) => EXIT_SUCCESS,
                Err(e) => classify_error(&e),
            }
        }
        Some(Command::Chat { session }) => {
            let (config, _path) = match load_config() {
                Ok(v) => v,
                Err(e) => return config_error(e),
            };
            let app = match App::build(config).await {
                Ok(app) => app,
                Err(e) => return config_error(e),
            };
            match chat::chat(&app, session).await {
                Ok(()) => EXIT_SUCCESS,
                Err(e) => classify_error(&e),
            }
        }
        None => {
            let (config, _path) = match load_config() {
                Ok(v) => v,
                Err(e) => return config_error(e),
            };
            let app = match App::build(config).await {
                Ok(app) => app,
                Err(e) => return config_error(e),
            };
            match chat::chat(&app, "cli:chat".to_string()).await {
                Ok(()) => EXIT_SUCCESS,
                Err(e) => classify_error(&e),
            }
        }
    }
}

fn config_error(e: anyhow::Error) -> i32 {
    eprintln!("config error: {e:#}");
    EXIT_CONFIG_ERROR
}

fn runtime_error(e: anyhow::Error) -> i32 {
    eprintln!("error: {e:#}");
    EXIT_RUNTIME_ERROR
}

/// Maps a pipeline failure to its exit code: an underlying
/// `sa_domain::error::Error::Validation` is a caller mistake (bad input),
/// everything else is a runtime failure.
fn classify_error(e: &anyhow::Error) -> i32 {
    eprintln!("error: {e:#}");
    match e.downcast_ref::<sa_domain::error::Error>() {
        Some(sa_domain::error::Error::Validation(_)) => EXIT_VALIDATION_ERROR,
        Some(sa_domain::error::Error::Configuration(_)) => EXIT_CONFIG_ERROR,
        _ => EXIT_RUNTIME_ERROR,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sa_cli=debug")))
        .json()
        .init();
}
