mod background;
mod config;
mod handlers;
mod server;
mod state;

#[cfg(test)]
mod tests;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rustls::crypto::ring::default_provider;
use rustls::crypto::CryptoProvider;
use tokio::net::TcpListener;
use tracing::{info, warn};

use contest_rank_sync::util::parse_flag;
use contest_rank_sync::{ContestStatus, HttpRankClient, JsonFilePreferences};

use crate::background::{run_contest_status_watcher, run_subscriber_metrics};
use crate::config::Config;
use crate::server::build_router;
use crate::state::AppState;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contest_rank_sync=info".into()),
        )
        .init();

    CryptoProvider::install_default(default_provider())
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let config = Config::from_env()?;
    let client = HttpRankClient::new(
        &config.base_url,
        config.session_id.as_deref(),
        config.request_timeout,
    )
    .context("Failed to build backend client")?;

    let disable_background = env::var("DISABLE_BACKGROUND_TASKS")
        .map(|value| parse_flag(&value))
        .unwrap_or(false);

    let (rule, status) = if disable_background {
        (config.rule_type, ContestStatus::Underway)
    } else {
        match client.get_contest(&config.contest_id).await {
            Ok(contest) => {
                info!(
                    contest_id = contest.id,
                    title = %contest.title,
                    rule = ?contest.rule_type,
                    status = ?contest.status,
                    "loaded contest"
                );
                (contest.rule_type, contest.status)
            }
            Err(err) => {
                warn!(?err, "failed to load contest; using configured rule type");
                (config.rule_type, ContestStatus::Underway)
            }
        }
    };

    let preferences = Arc::new(JsonFilePreferences::new(config.preferences_path.clone()));
    let state = AppState::new(config.clone(), client, rule, status, preferences);

    if disable_background {
        warn!("background tasks disabled via DISABLE_BACKGROUND_TASKS");
    } else {
        state.ranking.change_page(1);
        if config.auto_refresh {
            if state.ranking.store().is_refresh_disabled() {
                warn!("contest has ended; ignoring AUTO_REFRESH");
            } else {
                state.ranking.set_auto_refresh(true);
            }
        }
        tokio::spawn(run_contest_status_watcher(Arc::clone(&state)));
        tokio::spawn(run_subscriber_metrics(Arc::clone(&state)));
    }

    let app = build_router(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("contest-rank-sync listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
    .await
    .context("server error")?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    #[cfg(unix)]
    {
        let ctrl_c = tokio::signal::ctrl_c();
        let terminate = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!(?err, "failed to install SIGTERM handler");
                None
            }
        };
        let quit = match signal(SignalKind::quit()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!(?err, "failed to install SIGQUIT handler");
                None
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = async {
                if let Some(mut signal) = terminate {
                    signal.recv().await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(mut signal) = quit {
                    signal.recv().await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    state.shutdown();
}
