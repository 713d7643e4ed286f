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

//! A bounded pool of blocking workers draining the single FIFO every
//! connection task feeds `Payload`s into. `tokio::task::spawn_blocking`
//! is used (rather than a plain async task) so a slow context-manager
//! lock or lock-service round trip in one worker never stalls the
//! Tokio reactor driving the connection tasks.

use crate::dispatch;
use crate::payload::Payload;
use crate::state::DaemonState;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

pub struct WorkerPool {
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers, all pulling from the same `rx`. `mpsc`'s
    /// receiver isn't `Clone`, so it's shared behind an async mutex: at
    /// most one worker is ever actually waiting on `recv` at a time, which
    /// is exactly the single-FIFO, multiple-consumer semantics wanted
    /// here.
    pub fn spawn(
        count: usize,
        rx: mpsc::Receiver<Payload>,
        state: Arc<DaemonState>,
    ) -> Self {
        let rx = Arc::new(AsyncMutex::new(rx));
        let mut workers = Vec::with_capacity(count);
        for _ in 0..count {
            let rx = rx.clone();
            let state = state.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                let handle = tokio::runtime::Handle::current();
                loop {
                    let next = handle.block_on(async {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    });
                    match next {
                        Some(payload) => dispatch::handle(&state, payload),
                        None => break,
                    }
                }
            }));
        }
        Self { workers }
    }

    pub async fn join(self) {
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
