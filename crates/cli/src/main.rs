use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "satchel",
    about = "Sync courses, assignments, and grades from your LMS accounts",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "satchel.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Initialize the Satchel data directory, key, and configuration
    Init {
        /// Data directory path
        #[arg(long, default_value = "/var/lib/satchel")]
        data_dir: String,
    },
    /// Manage users
    #[command(subcommand)]
    User(UserCommands),
    /// Sync one platform for a user
    Sync {
        /// User id
        #[arg(long)]
        user: i64,
        /// Platform identifier (canvas, webassign, gradescope, piazza, moodle, owlv2)
        #[arg(long)]
        platform: String,
        /// Credential field as key=value; repeat for each field. Omit to reuse stored credentials.
        #[arg(long = "cred", value_name = "KEY=VALUE")]
        creds: Vec<String>,
    },
    /// Show recent sync runs for a user
    Status {
        /// User id
        #[arg(long)]
        user: i64,
        /// Number of runs to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// List registered platforms and their credential fields
    Platforms {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send reminders for assignments due soon
    Remind {
        /// User id
        #[arg(long)]
        user: i64,
        /// Look-ahead window in hours
        #[arg(long, default_value = "48")]
        hours: i64,
    },
}

#[derive(clap::Subcommand)]
enum UserCommands {
    /// Add a user
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => {
            commands::init::run(&data_dir).await?;
        }
        Commands::User(UserCommands::Add { email, name }) => {
            commands::user::add(&cli.config, &email, name).await?;
        }
        Commands::Sync {
            user,
            platform,
            creds,
        } => {
            commands::sync::run(&cli.config, user, &platform, &creds).await?;
        }
        Commands::Status { user, limit } => {
            commands::status::run(&cli.config, user, limit).await?;
        }
        Commands::Platforms { json } => {
            commands::platforms::run(&cli.config, json)?;
        }
        Commands::Remind { user, hours } => {
            commands::remind::run(&cli.config, user, hours).await?;
        }
    }

    Ok(())
}
