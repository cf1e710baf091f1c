use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "storegate", about = "Account management for a storegate backend", version)]
pub struct Cli {
    /// Password for commands that need one (prompted for when absent)
    #[arg(long, global = true, env = "STOREGATE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create an account (activation required)
    Register { email: String },
    /// Log in and persist the session token
    Login {
        /// Defaults to the last email used
        email: Option<String>,
    },
    /// Activate an account and log in
    Activate { token: String },
    /// Forget the session token
    Logout,
    /// Show the signed-in account
    Profile,
    /// Request a password reset email
    ResetPassword { email: String },
    /// Set a new password using a reset token
    ChangePassword {
        #[arg(value_name = "RESET_TOKEN")]
        token: String,
    },
    /// Permanently delete the signed-in account
    DeleteAccount,
    /// Show configuration and session state
    Status,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::Login { .. } => "login",
            Command::Activate { .. } => "activate",
            Command::Logout => "logout",
            Command::Profile => "profile",
            Command::ResetPassword { .. } => "reset-password",
            Command::ChangePassword { .. } => "change-password",
            Command::DeleteAccount => "delete-account",
            Command::Status => "status",
        }
    }
}
