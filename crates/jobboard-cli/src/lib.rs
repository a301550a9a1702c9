use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use jobboard_client_core::config::{env_non_empty, normalize_base_url};
use jobboard_client_core::{
    ClientConfig, ClientCore, FileStore, GatewayError, KeyValueStore, MemoryStore,
};
use jobboard_messaging::settings::parse_data_source_mode;
use jobboard_messaging::{MessagingError, MessagingService, MessagingSettings};
use tracing_subscriber::EnvFilter;

mod messaging_cli;
mod session_cli;

pub const ENV_LOG_FILTER: &str = "JOBBOARD_LOG_FILTER";
pub const DEFAULT_LOG_FILTER: &str = "info";
const SOURCE_CLI_FLAG: &str = "--base-url";

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Job board API client: sessions and messaging")]
pub struct JobboardCli {
    /// Backend base URL (overrides JOBBOARD_API_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Messaging data source: live, fixture, or auto (overrides JOBBOARD_DATA_SOURCE)
    #[arg(long, global = true, value_parser = parse_source_flag)]
    pub source: Option<jobboard_messaging::DataSourceMode>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Sign in and store the token pair
    Login(session_cli::LoginArgs),
    /// Revoke the session and forget stored tokens
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List conversations
    Conversations,
    /// List messages in a conversation
    Messages(messaging_cli::MessagesArgs),
    /// Send a message
    Send(messaging_cli::SendArgs),
    /// Mark a conversation as read
    MarkRead(messaging_cli::MarkReadArgs),
}

fn parse_source_flag(raw: &str) -> Result<jobboard_messaging::DataSourceMode, String> {
    parse_data_source_mode(raw).ok_or_else(|| format!("unknown data source '{raw}'"))
}

/// Everything a command needs, wired from env and flags.
pub struct App {
    pub core: ClientCore,
    pub messaging: MessagingService,
    pub json: bool,
}

impl App {
    pub fn from_cli(cli: &JobboardCli) -> anyhow::Result<Self> {
        let mut config = ClientConfig::from_env().context("resolve client configuration")?;
        if let Some(base_url) = cli.base_url.as_deref() {
            config.base_url = normalize_base_url(base_url).context("invalid --base-url")?;
            config.base_url_source = SOURCE_CLI_FLAG.to_string();
        }
        let (credentials, session_store) = open_stores(config.token_store_path.clone());

        let mut settings = MessagingSettings::from_env();
        if let Some(mode) = cli.source {
            settings.mode = mode;
            settings.mode_source = "--source".to_string();
        }

        let core = ClientCore::new(config, credentials, session_store)
            .context("build http client")?;
        let messaging = MessagingService::from_core(&core, settings);
        Ok(Self {
            core,
            messaging,
            json: cli.json,
        })
    }
}

/// Credentials persist in a JSON file; return-to state lives in a sibling
/// file so it survives until the next login.
fn open_stores(
    configured: Option<PathBuf>,
) -> (Arc<dyn KeyValueStore>, Arc<dyn KeyValueStore>) {
    let path = configured.or_else(|| {
        dirs::config_dir().map(|dir| dir.join("jobboard").join("credentials.json"))
    });
    match path {
        Some(path) => {
            let session_path = path.with_file_name("session.json");
            tracing::debug!(target: "jobboard.store", path = %path.display(), "using file credential store");
            let credentials: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(path));
            let session_store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(session_path));
            (credentials, session_store)
        }
        None => {
            tracing::warn!(
                target: "jobboard.store",
                "no config directory; credentials will not outlive this process",
            );
            let credentials: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
            let session_store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
            (credentials, session_store)
        }
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(
                env_non_empty(ENV_LOG_FILTER).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            )
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run(cli: JobboardCli) -> anyhow::Result<()> {
    let app = App::from_cli(&cli)?;
    match cli.command {
        Commands::Login(args) => session_cli::login(&app, args).await,
        Commands::Logout => session_cli::logout(&app).await,
        Commands::Whoami => session_cli::whoami(&app).await,
        Commands::Conversations => messaging_cli::conversations(&app).await,
        Commands::Messages(args) => messaging_cli::messages(&app, args).await,
        Commands::Send(args) => messaging_cli::send(&app, args).await,
        Commands::MarkRead(args) => messaging_cli::mark_read(&app, args).await,
    }
}

/// Login URL for errors that mean "sign in again".
pub fn reauth_redirect(error: &anyhow::Error) -> Option<String> {
    error.chain().find_map(|cause| {
        cause
            .downcast_ref::<GatewayError>()
            .and_then(GatewayError::login_redirect_url)
            .or_else(|| {
                cause
                    .downcast_ref::<MessagingError>()
                    .and_then(MessagingError::login_redirect_url)
            })
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use clap::error::ErrorKind;
    use jobboard_client_core::ReauthReason;
    use jobboard_messaging::DataSourceMode;

    use super::*;

    #[test]
    fn cli_requires_subcommand() {
        let err = match JobboardCli::try_parse_from(["jobboard"]) {
            Ok(_) => panic!("expected missing subcommand parse error"),
            Err(err) => err,
        };
        assert_eq!(
            err.kind(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        let err = match JobboardCli::try_parse_from(["jobboard", "apply-to-everything"]) {
            Ok(_) => panic!("expected invalid subcommand parse error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn send_parses_system_flag_and_global_options() {
        let cli = JobboardCli::try_parse_from([
            "jobboard",
            "send",
            "42",
            "Offer attached",
            "--system",
            "--json",
            "--source",
            "fixture",
        ])
        .expect("valid send invocation");
        assert!(cli.json);
        assert_eq!(cli.source, Some(DataSourceMode::Fixture));
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.recipient, "42");
                assert_eq!(args.content, "Offer attached");
                assert!(args.system);
            }
            _ => panic!("expected send command"),
        }
    }

    #[test]
    fn unknown_source_is_a_parse_error() {
        let err = match JobboardCli::try_parse_from(["jobboard", "conversations", "--source", "pigeon"]) {
            Ok(_) => panic!("expected invalid source"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn login_requires_email_and_password() {
        let err = match JobboardCli::try_parse_from(["jobboard", "login", "--email", "a@b.c"]) {
            Ok(_) => panic!("expected missing password"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn reauth_redirect_finds_wrapped_errors() {
        let gateway = GatewayError::ReauthRequired {
            reason: ReauthReason::AuthenticationRequired,
            return_to: "/messages".to_string(),
        };
        let wrapped = anyhow::Error::new(MessagingError::Reauth(gateway)).context("list conversations");
        assert_eq!(
            reauth_redirect(&wrapped).as_deref(),
            Some("/login?next=%2Fmessages")
        );
        assert_eq!(reauth_redirect(&anyhow::anyhow!("disk full")), None);
    }
}
