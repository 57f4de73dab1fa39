//! OxiNews CLI - drive the session controller against the hosted auth service.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oxinews_config::{init_logging, Config, Paths};
use oxinews_session::OAuthProvider;

/// OxiNews command-line interface.
#[derive(Parser)]
#[command(name = "oxinews")]
#[command(about = "Sign in to OxiNews and inspect session routing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.oxinews
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Also log to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

/// Email and password for commands that sign in first.
#[derive(clap::Args, Clone)]
struct Credentials {
    #[arg(long, env = "OXINEWS_EMAIL")]
    email: String,

    #[arg(long, env = "OXINEWS_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(clap::Args, Clone)]
struct OptionalCredentials {
    #[arg(long, env = "OXINEWS_EMAIL", requires = "password")]
    email: Option<String>,

    #[arg(long, env = "OXINEWS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the controller and print the settled auth state
    Status {
        /// Route the app starts on
        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Sign in with email and password
    Login {
        #[command(flatten)]
        credentials: Credentials,

        /// Route the app starts on
        #[arg(long, default_value = "/login")]
        path: String,

        /// Sign out again once signed in
        #[arg(long)]
        sign_out: bool,
    },
    /// Create an account
    Signup {
        #[command(flatten)]
        credentials: Credentials,

        /// Display name stored as profile metadata
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the provider URL for an OAuth sign-in
    Oauth {
        #[arg(long, default_value = "google")]
        provider: OAuthProvider,
    },
    /// Sign out and land on the login page
    Logout {
        #[command(flatten)]
        credentials: OptionalCredentials,
    },
    /// Evaluate the route guard for a request path
    Guard {
        #[arg(long)]
        path: String,

        #[command(flatten)]
        credentials: OptionalCredentials,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, &paths, cli.verbose);

    let app = commands::App::new(&config);
    let output = match cli.command {
        Commands::Status { path } => app.status(&path).await?,
        Commands::Login {
            credentials,
            path,
            sign_out,
        } => {
            app.login(&credentials.email, &credentials.password, &path, sign_out)
                .await?
        }
        Commands::Signup { credentials, name } => {
            app.signup(&credentials.email, &credentials.password, name)
                .await?
        }
        Commands::Oauth { provider } => app.oauth(provider).await?,
        Commands::Logout { credentials } => app.logout(credentials.pair()).await?,
        Commands::Guard { path, credentials } => app.guard(&path, credentials.pair()).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

impl OptionalCredentials {
    fn pair(&self) -> Option<(&str, &str)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}
