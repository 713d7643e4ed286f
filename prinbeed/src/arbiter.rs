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

//! Service bring-up and graceful shutdown, grounded on
//! `server/src/arbiter.rs`'s `ctrl_c` + unix `SIGTERM` race and its
//! broadcast-signal teardown, generalized to this daemon's readiness-gated
//! listener startup (spec.md §4.3) and the unregister ordering spec.md §5
//! requires: bus, then the interrupt itself, then listeners, then peer
//! clients, then journals.

use crate::listener::{self, connect_to_peer};
use crate::payload::{ConnectionKind, Payload};
use crate::state::DaemonState;
use prinbee_core::cluster::{BusMessage, BusMessageName, MembershipAction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

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

/// Drive the daemon until `SIGINT`/`SIGTERM` is observed, then tear
/// everything down in the order spec.md §5 specifies.
pub async fn run(state: Arc<DaemonState>) -> std::io::Result<()> {
    let (payload_tx, payload_rx) = mpsc::channel::<Payload>(1024);
    let worker_pool = crate::worker::WorkerPool::spawn(state.config.workers, payload_rx, state.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let gate_task = tokio::spawn(readiness_pump(state.clone(), payload_tx.clone(), shutdown_rx.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => log::info!("received SIGINT"),
        _ = terminate_signal() => log::info!("received SIGTERM"),
    }

    log::info!("shutting down: publishing STOP on the bus");
    state.bus.publish(BusMessage::new(BusMessageName::Stop));

    log::info!("shutting down: stopping listeners");
    let _ = shutdown_tx.send(true);
    let _ = gate_task.await;

    log::info!("shutting down: closing peer connections");
    let peers: Vec<_> = state.node_peers.lock().values().cloned().collect();
    for peer in peers {
        peer.close();
    }

    log::info!("shutting down: draining worker FIFO");
    drop(payload_tx);
    worker_pool.join().await;

    log::info!("shutting down: journal left durable on disk, nothing further to flush");
    Ok(())
}

/// While the readiness gate is closed, only this task (the bus messenger)
/// runs. Once every gate is satisfied, it spawns the three listeners and
/// then continues driving bus-originated membership changes for the rest
/// of the process's life, per spec.md §4.3's "transient loss does not
/// close listeners" rule.
async fn readiness_pump(state: Arc<DaemonState>, payload_tx: mpsc::Sender<Payload>, shutdown_rx: watch::Receiver<bool>) {
    let mut listeners_spawned = false;
    let mut poll = tokio::time::interval(Duration::from_millis(50));
    loop {
        poll.tick().await;
        if *shutdown_rx.borrow() {
            return;
        }

        while let Some(msg) = state.bus.poll() {
            apply_bus_message(&state, &msg, &payload_tx);
        }

        {
            let mut readiness = state.readiness.lock();
            readiness.fluid_settings_ready = true;
            readiness.address_valid = true;
            readiness.lock_ready = state.lock.is_lock_ready();
            if !listeners_spawned && readiness.poll_opened() {
                listeners_spawned = true;
                spawn_listeners(&state, &payload_tx, shutdown_rx.clone());
                let broadcast = state.membership.lock().status_broadcast(&state.config.node_name, true);
                state.bus.publish(broadcast);
            }
        }
    }
}

fn apply_bus_message(state: &Arc<DaemonState>, msg: &BusMessage, payload_tx: &mpsc::Sender<Payload>) {
    match msg.name {
        Some(BusMessageName::ClockStable) => state.readiness.lock().clock_stable = true,
        Some(BusMessageName::ClockUnstable) => {
            // transient loss after opening must not close listeners (spec §4.3)
            if !state.readiness.lock().is_open() {
                state.readiness.lock().clock_stable = false;
            }
        }
        Some(BusMessageName::IpwallCurrentStatus) => {
            let up = msg.param("status") == Some("up");
            let mut readiness = state.readiness.lock();
            if up || !readiness.is_open() {
                readiness.ipwall_up = up;
            }
        }
        Some(BusMessageName::PrinbeeCurrentStatus) => {
            if msg.param("status") != Some("up") {
                return;
            }
            let (Some(ip), Some(name)) = (msg.param("node_ip"), msg.param("node_name")) else { return };
            let Ok(ip) = ip.parse() else { return };
            let action = state.membership.lock().on_peer_up(ip, name);
            if let MembershipAction::Connect(addr) = action {
                let state = state.clone();
                let payload_tx = payload_tx.clone();
                let port = state.config.node_listen.port();
                tokio::spawn(async move {
                    let socket_addr = std::net::SocketAddr::new(addr, port);
                    if let Err(e) = connect_to_peer(socket_addr, state, payload_tx).await {
                        log::warn!("failed to connect to peer node {socket_addr}: {e}");
                    }
                });
            }
        }
        Some(BusMessageName::PrinbeeGetStatus) => {
            let up = state.readiness.lock().is_open();
            let broadcast = state.membership.lock().status_broadcast(&state.config.node_name, up);
            state.bus.publish(broadcast);
        }
        _ => {}
    }
}

fn spawn_listeners(state: &Arc<DaemonState>, payload_tx: &mpsc::Sender<Payload>, shutdown_rx: watch::Receiver<bool>) {
    let specs = [
        (ConnectionKind::Node, state.config.node_listen),
        (ConnectionKind::Proxy, state.config.proxy_listen),
        (ConnectionKind::Direct, state.config.client_listen),
    ];
    for (kind, addr) in specs {
        let state = state.clone();
        let payload_tx = payload_tx.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = listener::run_listener(kind, addr, state, payload_tx, shutdown_rx).await {
                log::error!("{kind:?} listener on {addr} exited: {e}");
            }
        });
    }
}
