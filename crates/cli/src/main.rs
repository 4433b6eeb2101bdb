//! SPTF command line client.
//!
//! Headless front end over the client library: account commands, one-shot
//! transfers and an interactive directory browser.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use client::navigation::join_path;
use client::{
    ApiClient, Browser, ClientConfig, ClientError, DirectorySnapshot, EntryKind,
    HttpDownloadLauncher, NavigationUpdate, Session, SystemKeychain,
};
use protocol::Locale;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// SPTF - browse and transfer files on an SPTF server.
#[derive(Parser, Debug)]
#[command(name = "sptf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server URL, overriding the configuration
    #[arg(short, long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Log in and remember the credential
    Login {
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored credential
    Logout,

    /// List a remote directory
    Ls {
        /// Directory to list (defaults to the configured start path)
        path: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Browse interactively
    Browse,

    /// Upload local files into a remote directory
    Upload {
        /// Remote destination directory
        dir: String,

        /// Local files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Download remote files (several are fetched as one archive)
    Download {
        /// Remote paths
        #[arg(required = true)]
        paths: Vec<String>,

        /// Local directory (defaults to the configured download directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Create a remote directory
    Mkdir {
        /// Full remote path
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => ClientConfig::load(config_path)?,
        None => ClientConfig::load_default()?,
    };
    config.apply_env_overrides();
    if let Some(server) = &cli.server {
        config.server.url = server.clone();
    }

    // Initialize tracing
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.ui.log_level.clone()
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(config_path) = &cli.config {
        tracing::info!("Using config file: {:?}", config_path);
    }
    config.validate()?;
    tracing::debug!(server = %config.server.url, "configuration loaded");
    let locale = config.ui.locale;

    let download_dir = match &cli.command {
        Commands::Download {
            output: Some(output),
            ..
        } => output.clone(),
        _ => config.transfer.download_dir.clone(),
    };
    let launcher = Arc::new(HttpDownloadLauncher::new(
        &ApiClient::new(&config)?,
        download_dir,
    ));
    let mut session = Session::new(config, SystemKeychain, launcher.clone())?;

    let outcome = run(cli.command, &mut session, &launcher).await;
    if let Err(e) = &outcome {
        if let Some(client_error) = e.downcast_ref::<ClientError>() {
            tracing::debug!(code = client_error.code(), "command failed");
            eprintln!("Error: {}", describe(client_error, locale));
            if client_error.is_credential_failure() {
                let _ = session.invalidate();
                eprintln!("Log in again with: sptf login <username>");
            }
            std::process::exit(1);
        }
    }
    outcome
}

async fn run(
    command: Commands,
    session: &mut Session<SystemKeychain>,
    launcher: &HttpDownloadLauncher,
) -> anyhow::Result<()> {
    match command {
        Commands::Login { username, password } => {
            tracing::info!("Logging in as {}", username);
            let password = resolve_password(password).await?;
            session.login(&username, &password).await?;
            println!("Logged in as {}", username);
        }
        Commands::Signup { username, password } => {
            tracing::info!("Creating account {}", username);
            let password = resolve_password(password).await?;
            session.signup(&username, &password).await?;
            println!("Account {} created; log in with: sptf login {}", username, username);
        }
        Commands::Logout => {
            if let Err(e) = session.restore().await {
                tracing::debug!(error = %e, "could not revalidate before logout");
            }
            session.logout().await?;
            println!("Logged out");
        }
        Commands::Ls { path, json } => {
            require_login(session).await?;
            let mut browser = session.open_browser().await?;
            if let Some(path) = path {
                // supersedes the start directory request
                browser.navigate(&path)?;
            }
            let update = browser.settle().await?;
            browser.close().await;
            match update {
                NavigationUpdate::Synced(snapshot) if json => {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                NavigationUpdate::Synced(snapshot) => print_snapshot(&snapshot),
                NavigationUpdate::Rejected { error, .. } | NavigationUpdate::SessionFailed(error) => {
                    return Err(error.into());
                }
                NavigationUpdate::Notice(category) => {
                    anyhow::bail!("{}", category.message(session.locale()));
                }
            }
        }
        Commands::Browse => {
            require_login(session).await?;
            tracing::info!("Starting interactive browser");
            browse(session).await?;
        }
        Commands::Upload { dir, files } => {
            require_login(session).await?;
            tracing::info!("Uploading {} file(s) to {}", files.len(), dir);
            session.transfers()?.upload_paths(&dir, &files).await?;
            println!("Uploaded {} file(s) to {}", files.len(), dir);
        }
        Commands::Download { paths, .. } => {
            require_login(session).await?;
            tracing::info!("Downloading {:?}", paths);
            session.transfers()?.download(&paths)?;
            launcher.wait_all().await;
        }
        Commands::Mkdir { path } => {
            require_login(session).await?;
            session.transfers()?.make_directory(&path).await?;
            println!("Created {}", path);
        }
    }
    Ok(())
}

/// Restore the stored credential or fail with a hint.
async fn require_login(session: &mut Session<SystemKeychain>) -> anyhow::Result<()> {
    if session.restore().await? {
        Ok(())
    } else {
        anyhow::bail!("Not logged in. Run: sptf login <username>")
    }
}

async fn resolve_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines.next_line().await?.unwrap_or_default();
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn describe(error: &ClientError, locale: Locale) -> String {
    match error {
        ClientError::Server(_) => error.user_message(locale).to_string(),
        other => format!("{} ({})", other.user_message(locale), other),
    }
}

fn print_snapshot(snapshot: &DirectorySnapshot) {
    println!("{}:", snapshot.path);
    if snapshot.entries.is_empty() {
        println!("  (empty)");
        return;
    }
    for entry in &snapshot.entries {
        match entry.kind {
            EntryKind::Directory => println!("  {:>12}  {}/", "-", entry.name),
            EntryKind::File => println!("  {:>12}  {}", entry.size, entry.name),
        }
    }
}

// ============================================================================
// Interactive browser
// ============================================================================

/// One line of input in `browse` mode.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BrowseCommand {
    Cd(String),
    Up,
    Refresh,
    Mkdir(String),
    Download(Vec<String>),
    Help,
    Quit,
}

fn parse_browse_command(line: &str) -> Result<BrowseCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(String::new());
    };
    let rest: Vec<String> = words.map(str::to_string).collect();

    match (verb, rest.as_slice()) {
        ("cd", [path]) => Ok(BrowseCommand::Cd(path.clone())),
        ("cd", []) => Ok(BrowseCommand::Cd("/".to_string())),
        ("up" | "..", []) => Ok(BrowseCommand::Up),
        ("refresh" | "ls", []) => Ok(BrowseCommand::Refresh),
        ("mkdir", [name]) => Ok(BrowseCommand::Mkdir(name.clone())),
        ("get", names) if !names.is_empty() => Ok(BrowseCommand::Download(names.to_vec())),
        ("help" | "?", []) => Ok(BrowseCommand::Help),
        ("quit" | "exit" | "q", []) => Ok(BrowseCommand::Quit),
        _ => Err(format!("unrecognized command: {}", line.trim())),
    }
}

const BROWSE_HELP: &str = "commands: cd <dir>, up, ls, mkdir <name>, get <name>..., quit";

async fn browse(session: &mut Session<SystemKeychain>) -> anyhow::Result<()> {
    let locale = session.locale();
    let mut browser = session.open_browser().await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match show(&mut browser, locale).await? {
        SessionStatus::Alive => println!("{}", BROWSE_HELP),
        SessionStatus::Closed => return Ok(()),
        SessionStatus::CredentialRejected => {
            session.invalidate()?;
            return Ok(());
        }
    }

    loop {
        eprint!("{}> ", browser.current_path().unwrap_or("?"));
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match parse_browse_command(&line) {
            Ok(command) => command,
            Err(message) if message.is_empty() => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        let base = browser.target_path().to_string();
        let sent = match command {
            BrowseCommand::Quit => break,
            BrowseCommand::Help => {
                println!("{}", BROWSE_HELP);
                continue;
            }
            BrowseCommand::Cd(name) => browser.navigate(&join_path(&base, &name)).map(Some),
            BrowseCommand::Up => browser.go_up(),
            BrowseCommand::Refresh => browser.refresh(),
            BrowseCommand::Mkdir(name) => {
                let path = join_path(&base, &name);
                match session.transfers()?.make_directory(&path).await {
                    Ok(()) => browser.refresh(),
                    Err(e) => Err(e),
                }
            }
            BrowseCommand::Download(names) => {
                let paths: Vec<String> = names.iter().map(|n| join_path(&base, n)).collect();
                if let Err(e) = session.transfers()?.download(&paths) {
                    println!("{}", describe(&e, locale));
                } else {
                    println!("download started");
                }
                continue;
            }
        };

        match sent {
            Ok(Some(_)) => match show(&mut browser, locale).await? {
                SessionStatus::Alive => {}
                SessionStatus::Closed => break,
                SessionStatus::CredentialRejected => {
                    session.invalidate()?;
                    break;
                }
            },
            Ok(None) => println!("nothing to do here"),
            Err(e) => {
                println!("{}", describe(&e, locale));
                if e.is_credential_failure() {
                    session.invalidate()?;
                    break;
                }
            }
        }
    }

    browser.close().await;
    Ok(())
}

/// What is left of the session after a request settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Alive,
    Closed,
    CredentialRejected,
}

/// Wait for the pending request and print its outcome.
async fn show(browser: &mut Browser, locale: Locale) -> anyhow::Result<SessionStatus> {
    match browser.settle().await {
        Ok(NavigationUpdate::Synced(snapshot)) => print_snapshot(&snapshot),
        Ok(NavigationUpdate::Rejected { path, error, .. }) => {
            println!("{}: {}", path, describe(&error, locale));
        }
        Ok(NavigationUpdate::Notice(category)) => println!("{}", category.message(locale)),
        Ok(update @ NavigationUpdate::SessionFailed(_)) => {
            if let NavigationUpdate::SessionFailed(error) = &update {
                println!("{}", describe(error, locale));
            }
            return Ok(if Browser::failed_on_credential(&update) {
                SessionStatus::CredentialRejected
            } else {
                SessionStatus::Closed
            });
        }
        Err(ClientError::ConnectionClosed) => return Ok(SessionStatus::Closed),
        Err(e) => return Err(e.into()),
    }
    Ok(SessionStatus::Alive)
}
