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

//! Payment claims and their settlement state machine.
//!
//! A payment follows a two-step lifecycle:
//! - [`Pending`] → [`Completed`] (via approve)
//! - [`Pending`] → [`Rejected`] (via reject)
//!
//! Both outcomes are terminal; a settled payment never re-enters `Pending`
//! and is never deleted by the engine.
//!
//! [`Pending`]: PaymentStatus::Pending
//! [`Completed`]: PaymentStatus::Completed
//! [`Rejected`]: PaymentStatus::Rejected

use crate::base::{PaymentId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement state of a payment claim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Submitted by the client, awaiting admin review.
    Pending,
    /// Approved by an admin; the subscription extension has been applied.
    Completed,
    /// Rejected by an admin; no subscription side effects.
    Rejected,
}

impl PaymentStatus {
    /// Returns `true` for the terminal states (`Completed`, `Rejected`).
    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// How the client claims to have transferred the money.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Card,
    MobileTransfer,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Card => "card",
            PaymentMethod::MobileTransfer => "mobile-transfer",
        };
        write!(f, "{s}")
    }
}

/// Membership tier the payment buys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Pro,
    Elite,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Elite => "elite",
        };
        write!(f, "{s}")
    }
}

/// One claimed transfer from a member.
///
/// Created by the submission service (always `Pending`) and mutated exactly
/// once by the review service. Amounts are stored in the base currency unit;
/// display conversion happens outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub user_name: String,
    /// Claimed amount, always positive.
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Free text, method-specific (e.g. a transfer reference number).
    pub details: String,
    pub tier: Tier,
    pub plan_id: String,
    pub submitted_at: DateTime<Utc>,
    pub status: PaymentStatus,
}
