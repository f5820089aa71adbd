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

//! Ledger store: versioned collections with optimistic transactions.
//!
//! The store holds the three settlement collections (`payments`,
//! `notifications`, `users`) as [`DashMap`]s of versioned documents. A
//! [`Txn`] records a read stamp for every document it reads and stages writes
//! without applying them; `commit` re-validates every stamp under a
//! store-wide commit gate and applies the staged writes only if no document
//! changed since it was read. A concurrent conflicting commit therefore
//! forces a retry instead of a silent lost update.
//!
//! Dropping a transaction without committing has no effect on the store.

use crate::base::{NotificationId, PaymentId, UserId};
use crate::error::SettlementError;
use crate::member::Subscription;
use crate::notification::Notification;
use crate::payment::Payment;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

/// A document plus its commit version.
#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    doc: T,
}

/// Version of a document as observed by a transactional read.
///
/// `None` means the document was observed absent; a commit that later finds
/// it present (or at a different version) conflicts.
type Observed = Option<u64>;

#[derive(Debug, Clone, Copy)]
enum ReadStamp {
    Payment(PaymentId, Observed),
    Notification(NotificationId, Observed),
    User(UserId, Observed),
}

enum Op {
    PutPayment(Payment),
    PutNotification(Notification),
    PutUser(Subscription),
    /// Reserve the one-pending-payment-per-member slot.
    ClaimPending(UserId, PaymentId),
    /// Free the slot when the claim settles.
    ReleasePending(UserId, PaymentId),
    PushFeed(NotificationId),
}

/// In-process document store for the settlement collections.
#[derive(Debug, Default)]
pub struct LedgerStore {
    payments: DashMap<PaymentId, Versioned<Payment>>,
    notifications: DashMap<NotificationId, Versioned<Notification>>,
    users: DashMap<UserId, Versioned<Subscription>>,

    /// At most one `Pending` payment per member; maintained at commit time.
    pending: DashMap<UserId, PaymentId>,

    /// Notification ids in submission order, drained by report paths.
    feed: SegQueue<NotificationId>,

    /// Commit gate: commits validate and apply under the write half, snapshot
    /// readers take the read half so they never observe a half-applied
    /// transaction.
    gate: RwLock<()>,

    next_payment_id: AtomicU32,
    next_notification_id: AtomicU32,
}

impl LedgerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints the next payment id.
    pub fn allocate_payment_id(&self) -> PaymentId {
        PaymentId(self.next_payment_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Mints the next notification id.
    pub fn allocate_notification_id(&self) -> NotificationId {
        NotificationId(self.next_notification_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Opens a transaction.
    pub fn begin(&self) -> Txn<'_> {
        Txn {
            store: self,
            reads: Vec::new(),
            ops: Vec::new(),
        }
    }

    // === Snapshot read paths (outside transactions) ===

    /// Returns a snapshot of a payment.
    pub fn payment(&self, id: &PaymentId) -> Option<Payment> {
        let _read = self.gate.read();
        self.payments.get(id).map(|v| v.doc.clone())
    }

    /// Returns a snapshot of a notification.
    pub fn notification(&self, id: &NotificationId) -> Option<Notification> {
        let _read = self.gate.read();
        self.notifications.get(id).map(|v| v.doc.clone())
    }

    /// Returns a snapshot of a member's subscription record.
    pub fn subscription(&self, id: &UserId) -> Option<Subscription> {
        let _read = self.gate.read();
        self.users.get(id).map(|v| v.doc.clone())
    }

    /// Returns the id of the member's pending payment, if any.
    pub fn pending_payment(&self, user_id: &UserId) -> Option<PaymentId> {
        let _read = self.gate.read();
        self.pending.get(user_id).map(|p| *p)
    }

    /// Returns all subscription records, ordered by member id.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let _read = self.gate.read();
        let mut subs: Vec<Subscription> =
            self.users.iter().map(|entry| entry.doc.clone()).collect();
        subs.sort_by_key(|s| s.user_id.0);
        subs
    }

    /// Drains the notification feed in submission order.
    pub fn drain_feed(&self) -> Vec<Notification> {
        let _read = self.gate.read();
        let mut out = Vec::new();
        while let Some(id) = self.feed.pop() {
            if let Some(entry) = self.notifications.get(&id) {
                out.push(entry.doc.clone());
            }
        }
        out
    }

    // === Commit internals (called under the write gate) ===

    fn stamp_valid(&self, stamp: &ReadStamp) -> bool {
        match stamp {
            ReadStamp::Payment(id, observed) => {
                self.payments.get(id).map(|v| v.version) == *observed
            }
            ReadStamp::Notification(id, observed) => {
                self.notifications.get(id).map(|v| v.version) == *observed
            }
            ReadStamp::User(id, observed) => self.users.get(id).map(|v| v.version) == *observed,
        }
    }

    fn apply(&self, op: Op) {
        match op {
            Op::PutPayment(doc) => put(&self.payments, doc.id, doc),
            Op::PutNotification(doc) => put(&self.notifications, doc.id, doc),
            Op::PutUser(doc) => put(&self.users, doc.user_id, doc),
            Op::ClaimPending(user_id, payment_id) => {
                // Vacancy was validated before any op was applied.
                self.pending.insert(user_id, payment_id);
            }
            Op::ReleasePending(user_id, payment_id) => {
                self.pending.remove_if(&user_id, |_, p| *p == payment_id);
            }
            Op::PushFeed(id) => self.feed.push(id),
        }
    }
}

fn put<K, V>(map: &DashMap<K, Versioned<V>>, key: K, doc: V)
where
    K: Eq + std::hash::Hash,
{
    match map.entry(key) {
        Entry::Occupied(mut entry) => {
            let version = entry.get().version + 1;
            entry.insert(Versioned { version, doc });
        }
        Entry::Vacant(entry) => {
            entry.insert(Versioned { version: 1, doc });
        }
    }
}

/// An open transaction against the store.
///
/// Reads return committed snapshots and record the observed version; writes
/// are staged and take effect only on a successful [`commit`](Txn::commit).
pub struct Txn<'a> {
    store: &'a LedgerStore,
    reads: Vec<ReadStamp>,
    ops: Vec<Op>,
}

impl Txn<'_> {
    /// Reads a payment, recording its version for commit-time validation.
    pub fn payment(&mut self, id: PaymentId) -> Option<Payment> {
        let entry = self.store.payments.get(&id);
        self.reads
            .push(ReadStamp::Payment(id, entry.as_ref().map(|v| v.version)));
        entry.map(|v| v.doc.clone())
    }

    /// Reads a notification, recording its version.
    pub fn notification(&mut self, id: NotificationId) -> Option<Notification> {
        let entry = self.store.notifications.get(&id);
        self.reads
            .push(ReadStamp::Notification(id, entry.as_ref().map(|v| v.version)));
        entry.map(|v| v.doc.clone())
    }

    /// Reads a member's subscription record, recording its version.
    pub fn subscription(&mut self, id: UserId) -> Option<Subscription> {
        let entry = self.store.users.get(&id);
        self.reads
            .push(ReadStamp::User(id, entry.as_ref().map(|v| v.version)));
        entry.map(|v| v.doc.clone())
    }

    /// Stages a full payment write.
    pub fn put_payment(&mut self, doc: Payment) {
        self.ops.push(Op::PutPayment(doc));
    }

    /// Stages a full notification write.
    pub fn put_notification(&mut self, doc: Notification) {
        self.ops.push(Op::PutNotification(doc));
    }

    /// Stages a full subscription write.
    pub fn put_subscription(&mut self, doc: Subscription) {
        self.ops.push(Op::PutUser(doc));
    }

    /// Stages a claim on the member's single pending-payment slot.
    ///
    /// The commit fails with [`SettlementError::DuplicatePending`] if the
    /// member already holds a pending payment at commit time.
    pub fn claim_pending(&mut self, user_id: UserId, payment_id: PaymentId) {
        self.ops.push(Op::ClaimPending(user_id, payment_id));
    }

    /// Stages the release of the member's pending-payment slot.
    ///
    /// A no-op at apply time unless the slot still names `payment_id`.
    pub fn release_pending(&mut self, user_id: UserId, payment_id: PaymentId) {
        self.ops.push(Op::ReleasePending(user_id, payment_id));
    }

    /// Stages a notification feed entry.
    pub fn push_feed(&mut self, id: NotificationId) {
        self.ops.push(Op::PushFeed(id));
    }

    /// Validates all reads and applies all staged writes atomically.
    ///
    /// # Errors
    ///
    /// - [`SettlementError::TransactionConflict`] - a document read by this
    ///   transaction was committed by another transaction in the meantime.
    /// - [`SettlementError::DuplicatePending`] - a staged claim found the
    ///   member's pending slot occupied.
    ///
    /// On error nothing is applied; the store is exactly as it was.
    pub fn commit(mut self) -> Result<(), SettlementError> {
        let _write = self.store.gate.write();

        for stamp in &self.reads {
            if !self.store.stamp_valid(stamp) {
                return Err(SettlementError::TransactionConflict);
            }
        }
        for op in &self.ops {
            if let Op::ClaimPending(user_id, _) = op {
                if self.store.pending.contains_key(user_id) {
                    return Err(SettlementError::DuplicatePending);
                }
            }
        }

        for op in self.ops.drain(..) {
            self.store.apply(op);
        }
        Ok(())
    }
}
