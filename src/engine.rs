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

//! Payment settlement engine.
//!
//! The [`Engine`] is the central component: it accepts client payment claims,
//! lets an admin approve or reject them, and applies the subscription side
//! effects of an approval. Every mutation runs as one ledger transaction, so
//! a crash or a lost race leaves the pre-operation state entirely.
//!
//! # Review state machine
//!
//! A payment is `Pending` until exactly one review settles it:
//!
//! | Operation | Transition | Subscription side effects |
//! |-----------|------------|---------------------------|
//! | [`approve`](Engine::approve) | `Pending` → `Completed` | tier/plan adopted, end extended one calendar month, status active, cancellation cleared |
//! | [`reject`](Engine::reject) | `Pending` → `Rejected` | none |
//!
//! Settling an already-settled payment fails with
//! [`AlreadyProcessed`](SettlementError::AlreadyProcessed), which makes
//! retries after a timeout safe: a re-issued approval can never apply the
//! extension twice.
//!
//! # Thread safety
//!
//! Operations may be called from any number of threads. When two admins race
//! on the same pending payment, the store's optimistic validation lets
//! exactly one transaction win; the loser re-reads and observes the settled
//! state.

use crate::base::{NotificationId, PaymentId, UserId};
use crate::clock;
use crate::error::SettlementError;
use crate::member::{ClientProfile, MemberStatus, Subscription};
use crate::notification::Notification;
use crate::payment::{Payment, PaymentMethod, PaymentStatus, Tier};
use crate::store::LedgerStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Direction of the manual admin subscription adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthDelta {
    /// "+1 month": extends from `max(now, current end)` and reactivates.
    Add,
    /// "-1 month": unconditional shift, may move the expiry into the past.
    Subtract,
}

/// Bound on transparent retries of a conflicted transaction. A retry
/// re-reads, so a lost race surfaces `AlreadyProcessed` rather than burning
/// all attempts.
const MAX_COMMIT_ATTEMPTS: u32 = 8;

/// Payment settlement engine over an in-process ledger store.
pub struct Engine {
    store: LedgerStore,
}

impl Engine {
    /// Creates an engine with an empty ledger.
    pub fn new() -> Self {
        Engine {
            store: LedgerStore::new(),
        }
    }

    // === Member lifecycle ===

    /// Registers a member, seeding the subscription window at one calendar
    /// month from `now`.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::DuplicateUser`] - the member already has a record.
    pub fn register_at(
        &self,
        profile: &ClientProfile,
        now: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut txn = self.store.begin();
            if txn.subscription(profile.uid).is_some() {
                return Err(SettlementError::DuplicateUser);
            }
            txn.put_subscription(Subscription {
                user_id: profile.uid,
                subscription_end: clock::extend(now, now, 1),
                status: MemberStatus::Active,
                membership_tier: None,
                plan_id: None,
                cancel_at_end: false,
            });
            match txn.commit() {
                Err(SettlementError::TransactionConflict) => continue,
                other => return other,
            }
        }
        Err(SettlementError::TransactionConflict)
    }

    /// [`register_at`](Engine::register_at) with the current time.
    pub fn register(&self, profile: &ClientProfile) -> Result<(), SettlementError> {
        self.register_at(profile, Utc::now())
    }

    // === Submission service ===

    /// Accepts a client payment claim.
    ///
    /// Atomically creates one `Pending` payment and one unread notification
    /// sharing its fields; both commit together or not at all. A member may
    /// hold at most one pending payment at a time, enforced here rather than
    /// trusted to the UI's read-before-submit check.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`SettlementError::DuplicatePending`] - the member already has a
    ///   payment awaiting review; nothing is created.
    /// - [`SettlementError::SubmissionFailed`] - the transaction could not
    ///   commit. The client may retry explicitly.
    pub fn submit_at(
        &self,
        profile: &ClientProfile,
        tier: Tier,
        amount: Decimal,
        method: PaymentMethod,
        details: &str,
        plan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentId, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount);
        }

        let payment = Payment {
            id: self.store.allocate_payment_id(),
            user_id: profile.uid,
            user_name: profile.display_name.clone(),
            amount,
            method,
            details: details.to_owned(),
            tier,
            plan_id: plan_id.to_owned(),
            submitted_at: now,
            status: PaymentStatus::Pending,
        };
        let notification =
            Notification::for_payment(self.store.allocate_notification_id(), &payment, &profile.email);

        let payment_id = payment.id;
        let mut txn = self.store.begin();
        txn.claim_pending(profile.uid, payment_id);
        txn.push_feed(notification.id);
        txn.put_payment(payment);
        txn.put_notification(notification);
        match txn.commit() {
            Ok(()) => Ok(payment_id),
            Err(SettlementError::DuplicatePending) => Err(SettlementError::DuplicatePending),
            // The create path reads nothing, so any other commit failure is a
            // submission failure from the caller's point of view.
            Err(_) => Err(SettlementError::SubmissionFailed),
        }
    }

    /// [`submit_at`](Engine::submit_at) with the current time.
    pub fn submit(
        &self,
        profile: &ClientProfile,
        tier: Tier,
        amount: Decimal,
        method: PaymentMethod,
        details: &str,
        plan_id: &str,
    ) -> Result<PaymentId, SettlementError> {
        self.submit_at(profile, tier, amount, method, details, plan_id, Utc::now())
    }

    // === Review service ===

    /// Approves a pending payment.
    ///
    /// In one transaction: the payment becomes `Completed`, the member adopts
    /// the payment's tier and plan, the subscription end moves to
    /// `max(now, current end) + 1 month`, the member becomes active, and a
    /// pending cancellation is cleared. If `notification_id` is given, the
    /// notification is marked read with its status mirror set to `Completed`.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::NotFound`] - payment, member, or the named
    ///   notification is missing.
    /// - [`SettlementError::AlreadyProcessed`] - the payment was settled by
    ///   another actor; no side effects are applied again.
    /// - [`SettlementError::TransactionConflict`] - contention persisted
    ///   through all retries; the operation can be retried as a whole.
    pub fn approve_at(
        &self,
        payment_id: PaymentId,
        notification_id: Option<NotificationId>,
        now: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut txn = self.store.begin();

            let mut payment = txn.payment(payment_id).ok_or(SettlementError::NotFound)?;
            if payment.status.is_settled() {
                return Err(SettlementError::AlreadyProcessed);
            }
            let mut subscription = txn
                .subscription(payment.user_id)
                .ok_or(SettlementError::NotFound)?;

            subscription.subscription_end =
                clock::extend(subscription.subscription_end, now, 1);
            subscription.membership_tier = Some(payment.tier);
            subscription.plan_id = Some(payment.plan_id.clone());
            subscription.status = MemberStatus::Active;
            subscription.cancel_at_end = false;

            let user_id = payment.user_id;
            payment.status = PaymentStatus::Completed;

            txn.put_payment(payment);
            txn.put_subscription(subscription);
            txn.release_pending(user_id, payment_id);
            if let Some(id) = notification_id {
                let mut notification = txn.notification(id).ok_or(SettlementError::NotFound)?;
                notification.read = true;
                notification.payment_status = PaymentStatus::Completed;
                txn.put_notification(notification);
            }

            match txn.commit() {
                Err(SettlementError::TransactionConflict) => continue,
                other => return other,
            }
        }
        Err(SettlementError::TransactionConflict)
    }

    /// [`approve_at`](Engine::approve_at) with the current time.
    pub fn approve(
        &self,
        payment_id: PaymentId,
        notification_id: Option<NotificationId>,
    ) -> Result<(), SettlementError> {
        self.approve_at(payment_id, notification_id, Utc::now())
    }

    /// Rejects a pending payment.
    ///
    /// The payment becomes `Rejected` and the member may submit again;
    /// subscription fields are untouched. The same idempotency guard as
    /// [`approve`](Engine::approve) applies: a payment settled by another
    /// actor fails with `AlreadyProcessed` instead of being overwritten.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`approve_at`](Engine::approve_at).
    pub fn reject(
        &self,
        payment_id: PaymentId,
        notification_id: Option<NotificationId>,
    ) -> Result<(), SettlementError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut txn = self.store.begin();

            let mut payment = txn.payment(payment_id).ok_or(SettlementError::NotFound)?;
            if payment.status.is_settled() {
                return Err(SettlementError::AlreadyProcessed);
            }

            let user_id = payment.user_id;
            payment.status = PaymentStatus::Rejected;

            txn.put_payment(payment);
            txn.release_pending(user_id, payment_id);
            if let Some(id) = notification_id {
                let mut notification = txn.notification(id).ok_or(SettlementError::NotFound)?;
                notification.read = true;
                notification.payment_status = PaymentStatus::Rejected;
                txn.put_notification(notification);
            }

            match txn.commit() {
                Err(SettlementError::TransactionConflict) => continue,
                other => return other,
            }
        }
        Err(SettlementError::TransactionConflict)
    }

    // === Admin overrides ===

    /// Manually shifts a member's subscription window by one month.
    ///
    /// This bypasses the approval flow. Adding a month uses the renewal rule
    /// (`max(now, current end) + 1 month`) and reactivates the member;
    /// subtracting shifts the current expiry unconditionally and leaves the
    /// status alone.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::NotFound`] - no record for `user_id`.
    pub fn adjust_at(
        &self,
        user_id: UserId,
        delta: MonthDelta,
        now: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut txn = self.store.begin();
            let mut subscription =
                txn.subscription(user_id).ok_or(SettlementError::NotFound)?;

            match delta {
                MonthDelta::Add => {
                    subscription.subscription_end =
                        clock::extend(subscription.subscription_end, now, 1);
                    subscription.status = MemberStatus::Active;
                }
                MonthDelta::Subtract => {
                    subscription.subscription_end =
                        clock::shift(subscription.subscription_end, -1);
                }
            }

            txn.put_subscription(subscription);
            match txn.commit() {
                Err(SettlementError::TransactionConflict) => continue,
                other => return other,
            }
        }
        Err(SettlementError::TransactionConflict)
    }

    /// [`adjust_at`](Engine::adjust_at) with the current time.
    pub fn adjust(&self, user_id: UserId, delta: MonthDelta) -> Result<(), SettlementError> {
        self.adjust_at(user_id, delta, Utc::now())
    }

    /// Flags the member to lapse at the current expiry.
    ///
    /// Flag-only: `subscription_end` and `status` keep their values, so the
    /// member retains access through the paid window. The flag is cleared
    /// only by a later successful approval.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::NotFound`] - no record for `user_id`.
    pub fn request_cancel_at_end(&self, user_id: UserId) -> Result<(), SettlementError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut txn = self.store.begin();
            let mut subscription =
                txn.subscription(user_id).ok_or(SettlementError::NotFound)?;
            subscription.cancel_at_end = true;
            txn.put_subscription(subscription);
            match txn.commit() {
                Err(SettlementError::TransactionConflict) => continue,
                other => return other,
            }
        }
        Err(SettlementError::TransactionConflict)
    }

    // === Read paths ===

    /// Snapshot of a payment.
    pub fn payment(&self, id: &PaymentId) -> Option<Payment> {
        self.store.payment(id)
    }

    /// Snapshot of a notification.
    pub fn notification(&self, id: &NotificationId) -> Option<Notification> {
        self.store.notification(id)
    }

    /// Snapshot of a member's subscription record.
    pub fn subscription(&self, id: &UserId) -> Option<Subscription> {
        self.store.subscription(id)
    }

    /// Id of the member's payment awaiting review, if any.
    pub fn pending_payment(&self, user_id: &UserId) -> Option<PaymentId> {
        self.store.pending_payment(user_id)
    }

    /// All subscription records, ordered by member id.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.store.subscriptions()
    }

    /// Drains the admin notification feed in submission order.
    pub fn drain_feed(&self) -> Vec<Notification> {
        self.store.drain_feed()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
