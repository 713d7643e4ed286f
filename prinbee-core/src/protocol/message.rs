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

//! The closed message-name vocabulary and the reply-state enum
//! used to report correlation outcomes to callers.

use super::header::tag;

macro_rules! message_names {
    ($($variant:ident => $bytes:expr),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageName {
            $($variant,)*
            /// an interned id outside the closed set this build knows about
            Unknown(u32),
        }

        impl MessageName {
            pub fn as_u32(self) -> u32 {
                match self {
                    $(Self::$variant => tag($bytes),)*
                    Self::Unknown(v) => v,
                }
            }

            pub fn from_u32(v: u32) -> Self {
                $(if v == tag($bytes) { return Self::$variant; })*
                Self::Unknown(v)
            }
        }
    };
}

message_names! {
    Reg => b"REG\0",
    Ack => b"ACK\0",
    Err => b"ERR\0",
    Ping => b"PING",
    Pong => b"PONG",
    ListContexts => b"LSCX",
    GetContext => b"GTCX",
    SetContext => b"STCX",
    Sync => b"SYNC",
}

/// Routing reports one of these for a correlated message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    /// an arbitrary (non-ACK/ERR) reply was received
    Received,
    /// ACK
    Succeeded,
    /// ERR
    Failed,
}

impl ReplyState {
    pub fn from_name(name: MessageName) -> Self {
        match name {
            MessageName::Ack => Self::Succeeded,
            MessageName::Err => Self::Failed,
            _ => Self::Received,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u32() {
        for n in [
            MessageName::Reg,
            MessageName::Ack,
            MessageName::Err,
            MessageName::Ping,
            MessageName::Pong,
            MessageName::ListContexts,
            MessageName::GetContext,
            MessageName::SetContext,
            MessageName::Sync,
        ] {
            assert_eq!(MessageName::from_u32(n.as_u32()), n);
        }
    }

    #[test]
    fn unknown_name_preserved() {
        let v = tag(b"XYZZ");
        assert_eq!(MessageName::from_u32(v), MessageName::Unknown(v));
    }

    #[test]
    fn reply_state_classification() {
        assert_eq!(ReplyState::from_name(MessageName::Ack), ReplyState::Succeeded);
        assert_eq!(ReplyState::from_name(MessageName::Err), ReplyState::Failed);
        assert_eq!(ReplyState::from_name(MessageName::Ping), ReplyState::Received);
    }
}
