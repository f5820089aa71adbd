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

//! Admin-facing notifications mirroring payment events.

use crate::base::{NotificationId, PaymentId, UserId};
use crate::payment::{Payment, PaymentMethod, PaymentStatus, Tier};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Administrator-facing mirror of a payment claim.
///
/// Notifications and payments are independent records correlated by
/// `payment_id` (a weak reference, lookup only). A review transaction that
/// touches the payment also touches its notification, so `payment_status`
/// never diverges from the payment's `status` after a successful review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub amount: Decimal,
    pub tier: Tier,
    pub plan_id: String,
    pub method: PaymentMethod,
    pub details: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    /// Mirror of the referenced payment's status, `Pending` on creation.
    pub payment_status: PaymentStatus,
}

impl Notification {
    /// Builds the unread mirror record for a freshly submitted payment.
    pub fn for_payment(id: NotificationId, payment: &Payment, user_email: &str) -> Self {
        Notification {
            id,
            payment_id: payment.id,
            user_id: payment.user_id,
            user_name: payment.user_name.clone(),
            user_email: user_email.to_owned(),
            amount: payment.amount,
            tier: payment.tier,
            plan_id: payment.plan_id.clone(),
            method: payment.method,
            details: payment.details.clone(),
            created_at: payment.submitted_at,
            read: false,
            payment_status: PaymentStatus::Pending,
        }
    }
}
