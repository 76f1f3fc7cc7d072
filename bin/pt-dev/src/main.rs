//! Portico Development Binary
//!
//! Boots the portal the way the browser shell does:
//! - Composes the feature modules into a route tree and sidebar
//! - Restores the persisted session, or logs in with the given credentials
//! - Resolves `--path` for the current user and prints what would render
//!
//! With `--watch` the session stays alive (token checks, permission
//! refreshes) until Ctrl+C.

mod modules;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pt_common::logging::{init_logging_with_format, LogFormat};
use pt_common::{MemoryNavigator, Navigator};
use pt_config::ConfigLoader;
use pt_session::{
    AuthSessionManager, Credentials, FileStore, HttpAuthBackend, SessionState, SessionStore,
};
use pt_shell::{ModuleRegistry, NavigationBuilder, Resolution, RouteComposer};
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "pt-dev")]
#[command(about = "Portico development shell")]
struct Args {
    /// Configuration file
    #[arg(long, env = "PORTICO_CONFIG")]
    config: Option<String>,

    /// Username to log in with when no session is persisted
    #[arg(long, env = "PORTICO_USERNAME")]
    username: Option<String>,

    /// Password for --username
    #[arg(long, env = "PORTICO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to resolve for the current user
    #[arg(long, default_value = "/")]
    path: String,

    /// Keep the session running until Ctrl+C
    #[arg(long)]
    watch: bool,

    /// Log out and clear the persisted session before exiting
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load()?;
    init_logging_with_format("pt-dev", LogFormat::parse(&config.log_format));

    info!("Starting Portico development shell");

    let registry = ModuleRegistry::register(modules::portal_modules())?;
    let tree = RouteComposer::compose(&registry, config.routes.clone())?;
    let navigation = NavigationBuilder::new(&registry);

    let store = match config.storage.kind.as_str() {
        "memory" => SessionStore::memory(),
        _ => SessionStore::new(Arc::new(FileStore::open(&config.storage.path).await?)),
    };
    info!(store = store.backend_name(), "Session store ready");

    let backend = Arc::new(HttpAuthBackend::new(config.backend.clone())?);
    let navigator = Arc::new(MemoryNavigator::new(args.path.clone(), config.routes.clone()));
    let manager = AuthSessionManager::new(
        config.session.clone(),
        backend,
        store,
        navigator.clone(),
    );

    let mut state = manager.restore().await?;
    if !state.is_active() {
        if let (Some(username), Some(password)) = (&args.username, &args.password) {
            match manager.login(Credentials::new(username.clone(), password.clone())).await {
                Ok(session) => {
                    info!(username = %session.user.username, "Logged in");
                }
                Err(e) => warn!(error = %e, "Login failed"),
            }
            state = manager.state();
        }
    }
    info!(state = %state, "Session state");

    let user = manager.access_context();
    let current = navigator.current_path();

    let sidebar = navigation.build(user.as_ref());
    println!("Sidebar:\n{}", serde_json::to_string_pretty(&sidebar)?);
    println!(
        "Breadcrumbs for {}:\n{}",
        current,
        serde_json::to_string_pretty(&navigation.breadcrumbs(&current))?
    );

    match tree.enforce(navigator.as_ref(), user.as_ref()) {
        Resolution::Render { route, params } => {
            println!(
                "Render {} from module {} (layout {}) params {}",
                route.route.view.as_str(),
                route.module,
                route.route.layout,
                serde_json::to_string(&params)?
            );
        }
        Resolution::Redirect(redirect) => {
            println!("Redirect to {}", redirect.location(tree.paths()));
        }
        Resolution::NotFound => println!("No route matches {}", current),
    }

    println!(
        "Initial state:\n{}",
        serde_json::to_string_pretty(&registry.root_reducer().initial_state())?
    );

    if args.watch && manager.state().is_active() {
        info!("Watching session, press Ctrl+C to stop");
        let mut states = manager.subscribe();
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = async {
                while states.changed().await.is_ok() {
                    let state = *states.borrow_and_update();
                    info!(state = %state, "Session state changed");
                    if state == SessionState::Expired {
                        break;
                    }
                }
            } => {}
        }
    }

    if args.logout {
        manager.logout().await;
        info!("Logged out");
    }

    manager.shutdown();
    info!("Portico development shell stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
