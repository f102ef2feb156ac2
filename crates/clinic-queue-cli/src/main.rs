// Clinic Queue CLI
//
// Design Decision: Use clap derive with env fallbacks; flags override the environment.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Logs go to stderr so stdout stays machine-readable.

mod app;
mod commands;
mod credentials;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_queue_core::SyncConfig;
use clinic_queue_http::ApiConfig;

use crate::app::App;
use crate::commands::tokens::EditArgs;
use crate::credentials::FileCredentialStore;

#[derive(Parser)]
#[command(name = "clinic-queue")]
#[command(about = "Clinic queue CLI - Request tokens, call patients, manage the reception list")]
#[command(version)]
pub struct Cli {
    /// API base URL
    #[arg(long, env = "CLINIC_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Where the signed-in credential is kept
    #[arg(long, env = "CLINIC_CREDENTIALS_PATH")]
    pub credentials: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    /// Log synchronizer activity to stderr
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in through the doctor or reception portal
    Login {
        /// Portal to sign in through
        #[arg(value_parser = ["doctor", "reception"])]
        portal: String,

        #[arg(long, short)]
        username: String,

        #[arg(long, short, env = "CLINIC_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored credential
    Logout,

    /// Show who is being served and who is waiting
    Status,

    /// List every token (reception)
    Tokens,

    /// Request a new token for a patient
    Request {
        /// Patient name
        #[arg(long, short)]
        name: String,

        /// Phone number
        #[arg(long, short)]
        phone: String,
    },

    /// Call the next patient (doctor)
    Next,

    /// Skip a patient (doctor); defaults to the one being served
    Skip {
        /// Token ID
        id: Option<String>,
    },

    /// Change a token's fields (reception)
    Edit {
        /// Token ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long, value_parser = ["waiting", "serving", "skipped", "done"])]
        status: Option<String>,

        #[arg(long)]
        vip: Option<bool>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Flip a token's VIP flag (reception)
    Vip {
        /// Token ID
        id: String,
    },

    /// Delete a token (reception)
    Delete {
        /// Token ID
        id: String,
    },

    /// Follow a screen live until Ctrl-C
    Watch {
        #[arg(value_parser = ["patient", "doctor", "reception"], default_value = "patient")]
        view: String,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "clinic_queue=info"
    } else {
        "clinic_queue=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = App {
        api: ApiConfig::from_env().with_base_url(cli.api_url),
        sync: SyncConfig::from_env(),
        store: Arc::new(FileCredentialStore::new(
            cli.credentials.unwrap_or_else(credentials::default_path),
        )),
        output: output::OutputFormat::parse(&cli.output),
        quiet: cli.quiet,
    };
    tracing::debug!(api_url = %app.api.base_url, "Using clinic backend");

    match cli.command {
        Commands::Login {
            portal,
            username,
            password,
        } => commands::auth::login(&app, &portal, &username, &password).await,
        Commands::Logout => commands::auth::logout(&app),
        Commands::Status => commands::queue::status(&app).await,
        Commands::Tokens => commands::tokens::list(&app).await,
        Commands::Request { name, phone } => commands::queue::request(&app, name, phone).await,
        Commands::Next => commands::queue::next(&app).await,
        Commands::Skip { id } => commands::queue::skip(&app, id).await,
        Commands::Edit {
            id,
            name,
            phone,
            status,
            vip,
            notes,
        } => {
            let args = EditArgs {
                name,
                phone,
                status,
                vip,
                notes,
            };
            commands::tokens::edit(&app, id, args).await
        }
        Commands::Vip { id } => commands::tokens::toggle_vip(&app, id).await,
        Commands::Delete { id } => commands::tokens::delete(&app, id).await,
        Commands::Watch { view } => commands::watch::run(&app, &view).await,
    }
}
