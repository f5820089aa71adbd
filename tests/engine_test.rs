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

//! Engine public API integration tests.

use chrono::{DateTime, TimeZone, Utc};
use gym_ledger_rs::{
    ClientProfile, Engine, MemberStatus, MonthDelta, NotificationId, PaymentId, PaymentMethod,
    PaymentStatus, SettlementError, Tier, UserId,
};
use rust_decimal_macros::dec;

fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn profile(uid: u32) -> ClientProfile {
    ClientProfile {
        uid: UserId(uid),
        display_name: format!("Member {uid}"),
        email: format!("member{uid}@example.com"),
    }
}

/// Registers a member and submits one pro-tier claim, returning its id.
fn submit_claim(engine: &Engine, uid: u32, now: DateTime<Utc>) -> PaymentId {
    let member = profile(uid);
    engine.register_at(&member, now).unwrap();
    engine
        .submit_at(&member, Tier::Pro, dec!(45.00), PaymentMethod::Card, "", "plan-ppl", now)
        .unwrap()
}

// === Submission service ===

#[test]
fn submit_creates_pending_payment_and_unread_notification() {
    let engine = Engine::new();
    let member = profile(1);
    let now = utc(2024, 2, 1);
    engine.register_at(&member, now).unwrap();

    let payment_id = engine
        .submit_at(
            &member,
            Tier::Elite,
            dec!(60.00),
            PaymentMethod::MobileTransfer,
            "ref 4411",
            "plan-x",
            now,
        )
        .unwrap();

    let payment = engine.payment(&payment_id).unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.user_id, UserId(1));
    assert_eq!(payment.amount, dec!(60.00));
    assert_eq!(payment.tier, Tier::Elite);
    assert_eq!(payment.details, "ref 4411");
    assert_eq!(payment.submitted_at, now);

    let feed = engine.drain_feed();
    assert_eq!(feed.len(), 1);
    let notification = &feed[0];
    assert_eq!(notification.payment_id, payment_id);
    assert_eq!(notification.user_email, "member1@example.com");
    assert_eq!(notification.amount, dec!(60.00));
    assert_eq!(notification.payment_status, PaymentStatus::Pending);
    assert!(!notification.read);
}

#[test]
fn submit_rejects_non_positive_amounts() {
    let engine = Engine::new();
    let member = profile(1);
    engine.register(&member).unwrap();

    for amount in [dec!(0.00), dec!(-10.00)] {
        let result = engine.submit(&member, Tier::Basic, amount, PaymentMethod::Card, "", "p");
        assert_eq!(result, Err(SettlementError::InvalidAmount));
    }
    assert!(engine.drain_feed().is_empty());
}

#[test]
fn second_pending_submission_is_refused() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let first = submit_claim(&engine, 1, now);

    let result = engine.submit_at(
        &profile(1),
        Tier::Basic,
        dec!(30.00),
        PaymentMethod::Card,
        "",
        "plan-a",
        now,
    );
    assert_eq!(result, Err(SettlementError::DuplicatePending));

    // Only the first claim exists; the feed holds a single entry.
    assert_eq!(engine.pending_payment(&UserId(1)), Some(first));
    assert_eq!(engine.drain_feed().len(), 1);
}

#[test]
fn settled_payment_frees_the_pending_slot() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let first = submit_claim(&engine, 1, now);

    engine.reject(first, None).unwrap();
    assert_eq!(engine.pending_payment(&UserId(1)), None);

    // A fresh claim is accepted after rejection.
    let second = engine
        .submit_at(&profile(1), Tier::Pro, dec!(45.00), PaymentMethod::Card, "", "plan-ppl", now)
        .unwrap();
    assert_ne!(first, second);
}

// === Review service: approve ===

#[test]
fn approval_of_lapsed_subscription_extends_from_now() {
    // Scenario A: expiry 2024-01-10 is past, now is 2024-02-01.
    let engine = Engine::new();
    let member = profile(1);
    engine.register_at(&member, utc(2023, 12, 10)).unwrap(); // end = 2024-01-10

    let now = utc(2024, 2, 1);
    let payment_id = engine
        .submit_at(&member, Tier::Pro, dec!(45.00), PaymentMethod::Card, "", "plan-ppl", now)
        .unwrap();
    engine.approve_at(payment_id, None, now).unwrap();

    let sub = engine.subscription(&UserId(1)).unwrap();
    assert_eq!(sub.subscription_end, utc(2024, 3, 1));
    assert_eq!(sub.membership_tier, Some(Tier::Pro));
    assert_eq!(sub.status, MemberStatus::Active);
    assert_eq!(sub.plan_id.as_deref(), Some("plan-ppl"));
}

#[test]
fn approval_of_active_subscription_extends_from_expiry() {
    // Scenario B: expiry 2024-03-15 is in the future, now is 2024-02-01.
    let engine = Engine::new();
    let member = profile(1);
    engine.register_at(&member, utc(2024, 2, 15)).unwrap(); // end = 2024-03-15

    let now = utc(2024, 2, 1);
    let payment_id = engine
        .submit_at(&member, Tier::Pro, dec!(45.00), PaymentMethod::Card, "", "plan-ppl", now)
        .unwrap();
    engine.approve_at(payment_id, None, now).unwrap();

    let sub = engine.subscription(&UserId(1)).unwrap();
    assert_eq!(sub.subscription_end, utc(2024, 4, 15));
}

#[test]
fn approve_marks_payment_completed() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);

    engine.approve_at(payment_id, None, now).unwrap();
    assert_eq!(
        engine.payment(&payment_id).unwrap().status,
        PaymentStatus::Completed
    );
}

#[test]
fn approve_updates_notification_mirror() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);
    let notification_id = NotificationId(1); // first minted id

    engine.approve_at(payment_id, Some(notification_id), now).unwrap();

    let notification = engine.notification(&notification_id).unwrap();
    assert!(notification.read);
    assert_eq!(notification.payment_status, PaymentStatus::Completed);
    assert_eq!(
        notification.payment_status,
        engine.payment(&payment_id).unwrap().status
    );
}

#[test]
fn second_approval_is_refused() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);

    engine.approve_at(payment_id, None, now).unwrap();
    let before = engine.subscription(&UserId(1)).unwrap();

    let result = engine.approve_at(payment_id, None, now);
    assert_eq!(result, Err(SettlementError::AlreadyProcessed));

    // The extension was not applied twice.
    assert_eq!(engine.subscription(&UserId(1)).unwrap(), before);
}

#[test]
fn approve_after_reject_is_refused() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);
    let before = engine.subscription(&UserId(1)).unwrap();

    engine.reject(payment_id, None).unwrap();
    let result = engine.approve_at(payment_id, None, now);

    assert_eq!(result, Err(SettlementError::AlreadyProcessed));
    assert_eq!(engine.payment(&payment_id).unwrap().status, PaymentStatus::Rejected);
    assert_eq!(engine.subscription(&UserId(1)).unwrap(), before);
}

#[test]
fn approve_unknown_payment_fails() {
    let engine = Engine::new();
    let result = engine.approve(PaymentId(99), None);
    assert_eq!(result, Err(SettlementError::NotFound));
}

#[test]
fn approve_with_unknown_notification_commits_nothing() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);

    let result = engine.approve_at(payment_id, Some(NotificationId(99)), now);
    assert_eq!(result, Err(SettlementError::NotFound));

    // The payment is still pending and the subscription untouched.
    assert_eq!(engine.payment(&payment_id).unwrap().status, PaymentStatus::Pending);
    assert_eq!(
        engine.subscription(&UserId(1)).unwrap().membership_tier,
        None
    );
}

#[test]
fn approval_clears_cancellation_flag() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);

    engine.request_cancel_at_end(UserId(1)).unwrap();
    assert!(engine.subscription(&UserId(1)).unwrap().cancel_at_end);

    engine.approve_at(payment_id, None, now).unwrap();
    assert!(!engine.subscription(&UserId(1)).unwrap().cancel_at_end);
}

// === Review service: reject ===

#[test]
fn reject_is_inert_on_subscription_fields() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);

    engine.request_cancel_at_end(UserId(1)).unwrap();
    let before = engine.subscription(&UserId(1)).unwrap();

    engine.reject(payment_id, None).unwrap();

    assert_eq!(engine.payment(&payment_id).unwrap().status, PaymentStatus::Rejected);
    assert_eq!(engine.subscription(&UserId(1)).unwrap(), before);
}

#[test]
fn second_rejection_is_refused() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);

    engine.reject(payment_id, None).unwrap();
    assert_eq!(
        engine.reject(payment_id, None),
        Err(SettlementError::AlreadyProcessed)
    );
}

#[test]
fn reject_updates_notification_mirror() {
    let engine = Engine::new();
    let now = utc(2024, 2, 1);
    let payment_id = submit_claim(&engine, 1, now);

    engine.reject(payment_id, Some(NotificationId(1))).unwrap();

    let notification = engine.notification(&NotificationId(1)).unwrap();
    assert!(notification.read);
    assert_eq!(notification.payment_status, PaymentStatus::Rejected);
}

#[test]
fn reject_unknown_payment_fails() {
    let engine = Engine::new();
    assert_eq!(engine.reject(PaymentId(7), None), Err(SettlementError::NotFound));
}

// === Admin overrides ===

#[test]
fn manual_extension_uses_renewal_rule_and_reactivates() {
    let engine = Engine::new();
    engine.register_at(&profile(1), utc(2023, 12, 10)).unwrap(); // end = 2024-01-10

    // Lapsed by 2024-02-01: the month counts from now.
    engine.adjust_at(UserId(1), MonthDelta::Add, utc(2024, 2, 1)).unwrap();

    let sub = engine.subscription(&UserId(1)).unwrap();
    assert_eq!(sub.subscription_end, utc(2024, 3, 1));
    assert_eq!(sub.status, MemberStatus::Active);
}

#[test]
fn manual_subtraction_shifts_unconditionally() {
    let engine = Engine::new();
    engine.register_at(&profile(1), utc(2024, 1, 1)).unwrap(); // end = 2024-02-01

    // Subtraction has no now-floor: the expiry moves into the past.
    engine.adjust_at(UserId(1), MonthDelta::Subtract, utc(2024, 6, 1)).unwrap();

    let sub = engine.subscription(&UserId(1)).unwrap();
    assert_eq!(sub.subscription_end, utc(2024, 1, 1));
}

#[test]
fn adjust_unknown_member_fails() {
    let engine = Engine::new();
    assert_eq!(
        engine.adjust(UserId(5), MonthDelta::Add),
        Err(SettlementError::NotFound)
    );
    assert_eq!(
        engine.request_cancel_at_end(UserId(5)),
        Err(SettlementError::NotFound)
    );
}

#[test]
fn cancellation_is_flag_only() {
    let engine = Engine::new();
    engine.register_at(&profile(1), utc(2024, 1, 1)).unwrap();
    let before = engine.subscription(&UserId(1)).unwrap();

    engine.request_cancel_at_end(UserId(1)).unwrap();

    let after = engine.subscription(&UserId(1)).unwrap();
    assert!(after.cancel_at_end);
    assert_eq!(after.subscription_end, before.subscription_end);
    assert_eq!(after.status, before.status);
}

// === Member lifecycle ===

#[test]
fn register_seeds_one_month_window() {
    let engine = Engine::new();
    engine.register_at(&profile(1), utc(2024, 1, 15)).unwrap();

    let sub = engine.subscription(&UserId(1)).unwrap();
    assert_eq!(sub.subscription_end, utc(2024, 2, 15));
    assert_eq!(sub.status, MemberStatus::Active);
    assert_eq!(sub.membership_tier, None);
    assert!(!sub.cancel_at_end);
}

#[test]
fn duplicate_registration_is_refused() {
    let engine = Engine::new();
    engine.register(&profile(1)).unwrap();
    assert_eq!(engine.register(&profile(1)), Err(SettlementError::DuplicateUser));
}

#[test]
fn subscriptions_report_is_ordered_by_member_id() {
    let engine = Engine::new();
    for uid in [3u32, 1, 2] {
        engine.register_at(&profile(uid), utc(2024, 1, 1)).unwrap();
    }

    let ids: Vec<u32> = engine.subscriptions().iter().map(|s| s.user_id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}
