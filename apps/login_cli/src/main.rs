use std::{io::IsTerminal, process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::Parser;
use login_core::{
    CoordinatorDeps, CoordinatorOptions, HttpAuthClient, HttpStatusFeed, LoginCoordinator,
    LoginEvent, LoginState, SqliteCredentialStore,
};
use shared::domain::CredentialProfile;
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};

mod config;
mod prompt;
mod session;

#[derive(Parser, Debug)]
#[command(about = "Sign in to the server from a terminal")]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    status_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    /// Credential slot to load from and save to.
    #[arg(long)]
    profile: Option<String>,
    #[arg(long)]
    username: Option<String>,
    /// Remember the password after a successful login.
    #[arg(long, conflicts_with = "forget")]
    remember: bool,
    /// Do not keep a password after login, clearing any stored one.
    #[arg(long)]
    forget: bool,
    /// Zero waits indefinitely.
    #[arg(long)]
    login_timeout_seconds: Option<u64>,
    /// Delete the stored credentials for the profile and exit.
    #[arg(long)]
    forget_credentials: bool,
}

impl Args {
    fn apply_to(&self, settings: &mut config::Settings) {
        if let Some(v) = &self.server_url {
            settings.server_url = v.clone();
        }
        if let Some(v) = &self.status_url {
            settings.status_url = Some(v.clone());
        }
        if let Some(v) = &self.database_url {
            settings.database_url = v.clone();
        }
        if let Some(v) = &self.profile {
            settings.profile = v.clone();
        }
        if let Some(v) = self.login_timeout_seconds {
            settings.login_timeout_seconds = v;
        }
    }
}

type StdinLines = Lines<BufReader<Stdin>>;

async fn prompt(lines: &mut StdinLines, label: &str) -> Result<Option<String>> {
    eprint!("{label}");
    Ok(lines.next_line().await?.map(|line| line.trim_end().to_string()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    args.apply_to(&mut settings);

    let storage = Storage::new(&config::database_url(&settings.database_url)).await?;
    let profile = CredentialProfile::new(settings.profile.clone());

    if args.forget_credentials {
        match storage.saved_credentials_meta(&profile).await? {
            Some(meta) => {
                storage.clear_credentials(&profile).await?;
                let password_note = if meta.has_password {
                    ", including the remembered password"
                } else {
                    ""
                };
                println!(
                    "Removed credentials for '{}' saved {} in profile '{profile}'{password_note}.",
                    meta.username,
                    meta.updated_at.format("%Y-%m-%d %H:%M UTC"),
                );
            }
            None => println!("No stored credentials for profile '{profile}'."),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let server_url = settings.server_url()?;
    let status_feed = HttpStatusFeed::new(settings.status_url()?)?
        .with_poll_interval(settings.status_poll_interval());
    let deps = CoordinatorDeps {
        credential_store: Arc::new(SqliteCredentialStore::new(storage, profile)),
        status_feed: Arc::new(status_feed),
        auth_client: Arc::new(HttpAuthClient::new(&server_url)?),
        session_initializer: Arc::new(session::ConsoleSession::new(server_url.clone())),
    };
    let coordinator = LoginCoordinator::new(
        deps,
        CoordinatorOptions {
            login_timeout: settings.login_timeout(),
        },
    );

    let mut events = coordinator.subscribe_events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LoginEvent::StatusUpdated(text)) if !text.is_empty() => {
                    println!("[server status] {text}");
                }
                Ok(LoginEvent::AttemptStarted { username }) => {
                    println!("Logging in as {username}...");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("cli: skipped {skipped} login events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    coordinator.activate().await?;
    let exit = run_login(&coordinator, &args).await;
    coordinator.deactivate().await;
    printer.abort();
    exit
}

async fn run_login(coordinator: &Arc<LoginCoordinator>, args: &Args) -> Result<ExitCode> {
    let stored = coordinator.snapshot().credentials;

    if let Some(username) = args.username.as_deref() {
        if username != stored.username {
            // A remembered password belongs to the stored account only.
            coordinator.set_password(String::new()).await;
        }
        coordinator.set_username(username).await;
    }
    if args.remember {
        coordinator.set_remember_password(true).await;
    } else if args.forget {
        coordinator.set_remember_password(false).await;
    }

    if args.username.is_none() && stored.remember_password && stored.has_password() {
        info!(username = %stored.username, "cli: using remembered credentials");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if !coordinator.snapshot().credentials.can_submit() {
        eprintln!("[Use Ctrl+D to cancel]");
        match prompt(&mut lines, "Username or Email: ").await? {
            Some(username) => coordinator.set_username(username).await,
            None => return cancelled(),
        }
    }
    if !coordinator.snapshot().credentials.has_password() {
        let password = if std::io::stdin().is_terminal() {
            tokio::task::spawn_blocking(|| prompt::read_hidden_line("Password: ")).await??
        } else {
            prompt(&mut lines, "Password: ").await?
        };
        match password {
            Some(password) => coordinator.set_password(password).await,
            None => return cancelled(),
        }
    }

    let mut state = coordinator.subscribe_state();
    coordinator.submit_login().await?;

    let finished = tokio::select! {
        finished = state.wait_for(|s| matches!(s.login_state, LoginState::LoggedIn | LoginState::Failed)) => {
            finished?.clone()
        }
        _ = tokio::signal::ctrl_c() => return cancelled(),
    };

    if finished.logged_in {
        println!("Logged in as {}.", finished.credentials.username);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(alert) = &finished.alert {
        eprintln!("{}", alert.message);
    }
    if let Some(failure) = &finished.last_failure {
        warn!("cli: login failed: {failure}");
    }
    Ok(ExitCode::FAILURE)
}

fn cancelled() -> Result<ExitCode> {
    eprintln!("Login cancelled.");
    Ok(ExitCode::FAILURE)
}
