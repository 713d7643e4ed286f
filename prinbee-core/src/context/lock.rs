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

//! The `cluck` distributed lock contract: `is_lock_ready`, `acquire`,
//! `release`, named by an opaque lock name (`context::<name>` for schema
//! changes). No concrete distributed implementation ships here, only the
//! trait and an in-memory single-process double for tests.

use std::collections::HashSet;
use std::sync::Mutex;

pub trait ClusterLock: Send {
    fn is_lock_ready(&self) -> bool;
    /// Attempt to acquire `name`. Returns `true` if this call won the
    /// lock, `false` if it's already held by someone else.
    fn acquire(&self, name: &str) -> bool;
    fn release(&self, name: &str);
}

/// In-memory lock double: always ready, enforces mutual exclusion within
/// one process.
#[derive(Debug, Default)]
pub struct InMemoryClusterLock {
    held: Mutex<HashSet<String>>,
}

impl InMemoryClusterLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClusterLock for InMemoryClusterLock {
    fn is_lock_ready(&self) -> bool {
        true
    }

    fn acquire(&self, name: &str) -> bool {
        self.held.lock().unwrap().insert(name.to_string())
    }

    fn release(&self, name: &str) {
        self.held.lock().unwrap().remove(name);
    }
}

/// The lock name `SET_CONTEXT` requests for namespace `name`.
pub fn context_lock_name(context_name: &str) -> String {
    format!("context::{context_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive() {
        let lock = InMemoryClusterLock::new();
        assert!(lock.acquire("context::orders"));
        assert!(!lock.acquire("context::orders"));
        lock.release("context::orders");
        assert!(lock.acquire("context::orders"));
    }

    #[test]
    fn lock_name_matches_convention() {
        assert_eq!(context_lock_name("orders"), "context::orders");
    }
}
