//! Presence Client - Main entry point
//!
//! Connects as one user and logs every change in who is online.
//!
//! Usage: `presence-client [USER_ID]` (or set `PRESENCE_USER_ID`).

use anyhow::Context;
use presence_client::ws::{TungsteniteTransport, WsManager};
use presence_client::{log_info, logging, ClientConfig};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    let user_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PRESENCE_USER_ID").ok())
        .filter(|id| !id.is_empty())
        .context("no user id: pass one as the first argument or set PRESENCE_USER_ID")?;

    log_info!(
        user_id = %user_id,
        host = %config.endpoint.host,
        scheme = config.endpoint.scheme(),
        "starting presence client"
    );

    let (_identity_tx, identity_rx) = watch::channel(Some(user_id));
    let (manager, mut binding) = WsManager::spawn(&config, TungsteniteTransport::new(), identity_rx);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log_info!("interrupted, shutting down");
                break;
            }
            view = binding.changed() => match view {
                Some(view) => {
                    let online: Vec<&str> = view.online_users.iter().map(String::as_str).collect();
                    log_info!(
                        state = ?view.state,
                        connecting = view.is_connecting(),
                        retry_exhausted = view.retry_exhausted,
                        online = ?online,
                        "presence view changed"
                    );
                }
                None => break,
            },
        }
    }

    manager.shutdown().await;
    Ok(())
}
