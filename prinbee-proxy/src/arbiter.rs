/*
 * This file is part of Prinbee, a distributed database system.
 *
 * Copyright (c) 2026, The Prinbee Authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Service bring-up and shutdown for the proxy: spawn the client listener
//! and one reconnecting task per configured daemon, run the stale-
//! connection scanner (spec.md §4.4), and unregister everything in the
//! same order `prinbeed`'s arbiter uses on `SIGINT`/`SIGTERM`.

use crate::listener::{maintain_daemon_connection, run_client_listener};
use crate::state::ProxyState;
use prinbee_core::protocol::HANDSHAKE_TIMEOUT;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[cfg(unix)]
async fn terminate_signal() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await
}

pub async fn run(state: Arc<ProxyState>) -> std::io::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let client_listener = tokio::spawn({
        let state = state.clone();
        let addr = state.config.client_listen;
        let shutdown_rx = shutdown_rx.clone();
        async move {
            if let Err(e) = run_client_listener(addr, state, shutdown_rx).await {
                log::error!("client listener on {addr} exited: {e}");
            }
        }
    });

    let daemon_tasks: Vec<_> = state
        .config
        .daemons
        .iter()
        .copied()
        .map(|addr| {
            let state = state.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(maintain_daemon_connection(addr, state, shutdown_rx))
        })
        .collect();

    let stale_scanner = tokio::spawn(scan_stale_clients(state.clone(), shutdown_rx.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => log::info!("received SIGINT"),
        _ = terminate_signal() => log::info!("received SIGTERM"),
    }

    log::info!("shutting down: stopping listener and daemon connections");
    let _ = shutdown_tx.send(true);
    let _ = client_listener.await;
    for task in daemon_tasks {
        let _ = task.await;
    }
    let _ = stale_scanner.await;

    log::info!("shutting down: closing client connections");
    let clients: Vec<_> = state.client_peers.lock().values().map(|s| s.peer.clone()).collect();
    for peer in clients {
        peer.close();
    }

    log::info!("shutting down: journal left durable on disk, nothing further to flush");
    Ok(())
}

/// A registered timer (spec.md §4.4) that drops client connections with no
/// completed `REG` handshake older than the handshake timeout.
async fn scan_stale_clients(state: Arc<ProxyState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }

        let now = Instant::now();
        let stale: Vec<_> = state
            .client_peers
            .lock()
            .values()
            .filter(|slot| slot.conn_ref.lock().is_stale_handshake(HANDSHAKE_TIMEOUT, now))
            .map(|slot| slot.peer.clone())
            .collect();
        for peer in stale {
            log::debug!("dropping stale unregistered client connection {}", peer.remote_addr);
            peer.close();
        }
    }
}
