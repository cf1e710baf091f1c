//! storegate - command-line front end for storegate account management.
//!
//! Each command maps onto one session store operation. The session token
//! is persisted by the configured backend, so `login` in one run carries
//! over to `profile` in the next.

mod command;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use storegate_core::{
    Account, ApiError, ClientSessionStore, Config, FileTokenStore, SessionTokenStore, TokenBackend,
};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use command::{Cli, Command};

/// Environment variable naming a directory for daily log files
const ENV_LOG_DIR: &str = "STOREGATE_LOG_DIR";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "storegate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli { password, command } = cli;
    let mut config = Config::load()?;
    let store = storegate_core::connect(&config)?;
    info!(command = command.name(), "Running command");

    match command {
        Command::Register { email } => {
            let password = read_password(password, "Choose a password: ")?;
            let account = store.register(&email, &password).await?;
            println!("Registered {}. Check your email for the activation link.", account.email);
        }
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = read_password(password, "Password: ")?;
            let account = store.login(&email, &password).await?;

            config.last_email = Some(email);
            config.save()?;
            println!("Logged in as {}", account.email);
        }
        Command::Activate { token } => {
            let account = store.activate(&token).await?;
            println!("Activated {}", account.email);
        }
        Command::Logout => {
            store.logout();
            println!("Logged out");
        }
        Command::Profile => {
            let account = store.load_profile().await?;
            print_account(&account)?;
        }
        Command::ResetPassword { email } => {
            store.request_password_reset(&email).await?;
            println!("Password reset requested for {}", email);
        }
        Command::ChangePassword { token } => {
            let password = read_password(password, "New password: ")?;
            let account = store.change_password(&token, &password).await?;
            println!("Password changed for {}", account.email);
        }
        Command::DeleteAccount => delete_account(&store).await?,
        Command::Status => print_status(&config, &store)?,
    }

    Ok(())
}

/// Deletion needs the account id, so load the profile first
async fn delete_account(store: &ClientSessionStore) -> Result<()> {
    let account = store.load_profile().await?;
    let answer = prompt(&format!("Delete account {} permanently? [y/N]: ", account.email))?;
    if !answer.eq_ignore_ascii_case("y") {
        println!("Cancelled");
        return Ok(());
    }
    store.delete_account().await?;
    println!("Account deleted");
    Ok(())
}

fn print_status(config: &Config, store: &ClientSessionStore) -> Result<()> {
    let state = if store.token_store().get().is_some() {
        "signed in"
    } else {
        "signed out"
    };
    println!("API:     {}", store.api().base_url());
    println!("Backend: {}", config.token_backend);
    println!("Session: {}", state);

    if config.token_backend == TokenBackend::File {
        if let Some(stored) = FileTokenStore::new(config.session_dir()?).load()? {
            println!("Saved:   {}m ago", stored.age_minutes());
        }
    }
    Ok(())
}

fn print_account(account: &Account) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(account)?);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Use `--password` / `STOREGATE_PASSWORD` when given, otherwise prompt
fn read_password(given: Option<String>, label: &str) -> Result<String> {
    match given.filter(|p| !p.is_empty()) {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password(label)?),
    }
}

/// Provide user-friendly error messages based on error type
fn describe_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ApiError>() {
        Some(api) if api.is_unauthorized() => {
            "Not signed in, or the session expired. Run `storegate login`.".to_string()
        }
        Some(ApiError::NoAccount) => "No account loaded for this session".to_string(),
        Some(ApiError::NetworkError(inner)) if inner.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        Some(ApiError::NetworkError(inner)) if inner.is_connect() => {
            "Unable to connect to server. Check the API URL and your connection.".to_string()
        }
        Some(api) => api.to_string(),
        None => format!("{:#}", e),
    }
}
