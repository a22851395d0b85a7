use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use adsync::config::{Configuration, DEFAULT_CONFIG_PATH};
use adsync::database::mem::{MemorySettings, MemoryUsers};
use adsync::database::{SettingsRepository, UserRepository};
use adsync::{Directory, DirectorySettings, ErrorKind, Ldap3Connector, telemetry};
use clap::{Parser, Subcommand};
use serde_json::json;

type CommandResult = Result<ExitCode, Box<dyn Error>>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the configuration file.
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Bind to every configured directory and print its capabilities.
    Check,
    /// Copy persons of every configured directory, printed as JSON lines.
    Sync,
    /// Print persons of one configured directory, as JSON lines.
    Search {
        #[arg(long, short)]
        domain: String,
    },
    /// Check a user's credentials.
    Login {
        #[arg(long, short)]
        domain: String,
        /// `user@domain` or `DOMAIN\user`.
        #[arg(long, short)]
        username: String,
        #[arg(long, env = "ADSYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let (config, load_error) =
        Configuration::default().path(args.config).read_or_default();

    let provider = match telemetry::init_logging(
        &config.log_level,
        config.telemetry.otlp_endpoint.as_deref(),
    ) {
        Ok(provider) => provider,
        Err(err) => {
            eprintln!("cannot initialize logging: {err}");
            return ExitCode::FAILURE;
        },
    };

    if let Some(err) = load_error {
        tracing::error!(error = %err, "cannot read configuration, using defaults");
    }

    let metrics = match config.telemetry.metrics_path {
        Some(_) => telemetry::setup_metrics_recorder()
            .inspect_err(|err| {
                tracing::warn!(error = %err, "metrics recorder not installed")
            })
            .ok(),
        None => None,
    };

    let settings = MemorySettings::default();
    for directory in config.directories.iter().cloned() {
        let domain = directory.domain.clone();
        if let Err(err) = settings.save(directory).await {
            tracing::error!(%domain, error = %err, "invalid directory settings, skipped");
        }
    }

    let directory = Directory::new(Ldap3Connector::new(config.connection.options()));

    let result = match args.cmd {
        Commands::Check => check(&directory, &settings).await,
        Commands::Sync => sync(&directory, &settings, &config).await,
        Commands::Search { domain } => {
            search(&directory, &settings, &config, &domain).await
        },
        Commands::Login {
            domain,
            username,
            password,
        } => login(&directory, &settings, &domain, &username, &password).await,
    };

    if let (Some(handle), Some(path)) = (&metrics, &config.telemetry.metrics_path) {
        if let Err(err) = telemetry::write_metrics(handle, path) {
            tracing::error!(path = %path.display(), error = %err, "cannot write metrics");
        }
    }

    if let Some(provider) = provider {
        if let Err(err) = provider.shutdown() {
            eprintln!("cannot flush logs: {err}");
        }
    }

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        },
    }
}

async fn check(
    directory: &Directory<Ldap3Connector>,
    settings: &MemorySettings,
) -> CommandResult {
    let mut code = ExitCode::SUCCESS;

    for server in settings.list().await? {
        match directory.open(&server, None).await {
            Ok(connection) => {
                let line = json!({
                    "domain": server.domain,
                    "principal": connection.principal().as_str(),
                    "search_base": connection.search_base()?,
                    "server": connection.server_info(),
                });
                connection.close().await;
                println!("{line}");
            },
            Err(err) => {
                tracing::error!(domain = %server.domain, error = %err, "check failed");
                code = ExitCode::FAILURE;
            },
        }
    }

    Ok(code)
}

async fn sync(
    directory: &Directory<Ldap3Connector>,
    settings: &MemorySettings,
    config: &Configuration,
) -> CommandResult {
    let accounts = config.sync.accounts()?;
    let users = MemoryUsers::default();
    let mut code = ExitCode::SUCCESS;

    for server in settings.list().await? {
        if let Err(err) = directory.sync_users(&server, None, &accounts, &users).await {
            tracing::error!(domain = %server.domain, error = %err, "sync failed");
            code = ExitCode::FAILURE;
        }
    }

    for user in users.list().await? {
        println!("{}", serde_json::to_string(&user)?);
    }

    Ok(code)
}

async fn search(
    directory: &Directory<Ldap3Connector>,
    settings: &MemorySettings,
    config: &Configuration,
    domain: &str,
) -> CommandResult {
    let Some(server) = settings.get(domain).await? else {
        tracing::error!(%domain, "directory is not configured");
        return Ok(ExitCode::FAILURE);
    };

    let mut search = directory
        .search_users_matching(
            &server,
            None,
            config.sync.accounts.as_ref(),
            &config.sync.attributes,
        )
        .await?;

    while let Some(entry) = search.next().await? {
        println!("{}", serde_json::to_string(&entry)?);
    }

    Ok(ExitCode::SUCCESS)
}

async fn login(
    directory: &Directory<Ldap3Connector>,
    settings: &MemorySettings,
    domain: &str,
    username: &str,
    password: &str,
) -> CommandResult {
    let server = settings
        .get(domain)
        .await?
        .unwrap_or_else(|| DirectorySettings::new(domain));

    match directory.authenticate(&server, username, password).await {
        Ok(principal) => {
            println!("{}", json!({ "authenticated": true, "principal": principal.as_str() }));
            Ok(ExitCode::SUCCESS)
        },
        Err(err) if err.kind() == ErrorKind::Authentication => {
            tracing::info!(%username, error = %err, "login rejected");
            println!("{}", json!({ "authenticated": false }));
            Ok(ExitCode::FAILURE)
        },
        Err(err) => Err(err.into()),
    }
}
