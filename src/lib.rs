// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Gym Ledger
//!
//! This library provides the payment settlement engine for a membership gym:
//! client-submitted payment claims held in a pending state, deterministic
//! admin approval or rejection, and atomic subscription-window extension with
//! a consistent admin notification feed.
//!
//! ## Core Components
//!
//! - [`Engine`]: Submission and review services plus admin overrides
//! - [`LedgerStore`]: Versioned document collections with optimistic transactions
//! - [`Payment`] / [`PaymentStatus`]: The claim and its settlement state machine
//! - [`Subscription`]: The member's subscription window and flags
//! - [`SettlementError`]: Error taxonomy for settlement failures
//!
//! ## Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use gym_ledger_rs::{ClientProfile, Engine, PaymentMethod, Tier, UserId};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let member = ClientProfile {
//!     uid: UserId(1),
//!     display_name: "Ana".to_owned(),
//!     email: "ana@example.com".to_owned(),
//! };
//!
//! let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
//! engine.register_at(&member, now).unwrap();
//!
//! // Client claims a transfer; an admin approves it.
//! let payment_id = engine
//!     .submit_at(&member, Tier::Pro, dec!(45.00), PaymentMethod::Card, "", "plan-ppl", now)
//!     .unwrap();
//! engine.approve_at(payment_id, None, now).unwrap();
//!
//! let sub = engine.subscription(&member.uid).unwrap();
//! assert_eq!(sub.membership_tier, Some(Tier::Pro));
//! ```
//!
//! ## Thread Safety
//!
//! Every mutating operation is a single optimistic ledger transaction, so
//! concurrent admins racing on one payment settle it exactly once; the loser
//! observes [`SettlementError::AlreadyProcessed`].

pub mod base;
mod clock;
mod engine;
pub mod error;
pub mod member;
pub mod notification;
pub mod payment;
mod store;

pub use base::{NotificationId, PaymentId, UserId};
pub use clock::{extend, shift};
pub use engine::{Engine, MonthDelta};
pub use error::SettlementError;
pub use member::{ClientProfile, MemberStatus, Subscription};
pub use notification::Notification;
pub use payment::{Payment, PaymentMethod, PaymentStatus, Tier};
pub use store::{LedgerStore, Txn};
