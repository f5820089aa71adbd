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

//! Member subscription state.
//!
//! This is the engine's view of the `users` collection: only the fields the
//! settlement path is allowed to mutate. All writes to these fields funnel
//! through the engine's transactional operations; no caller writes them
//! directly.

use crate::base::UserId;
use crate::payment::Tier;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;

/// Whether the member currently holds an active subscription.
#[derive(Debug, Clone, Copy, serde::Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
}

/// Authenticated client profile, the submission service's input.
///
/// Issued by the auth collaborator; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub uid: UserId,
    pub display_name: String,
    pub email: String,
}

/// Subscription window and membership fields for one member.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Subscription {
    pub user_id: UserId,
    /// End of the paid window. Only advances on the settlement path; the
    /// manual admin adjustment may move it backwards.
    pub subscription_end: DateTime<Utc>,
    pub status: MemberStatus,
    pub membership_tier: Option<Tier>,
    pub plan_id: Option<String>,
    /// Member asked to lapse at the current expiry. Cleared only by a
    /// subsequent successful approval.
    pub cancel_at_end: bool,
}

impl Subscription {
    /// Returns `true` if the paid window covers `now`.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.subscription_end >= now
    }
}

impl Serialize for Subscription {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Flat report row: timestamps as RFC 3339, optional fields as "".
        let mut state = serializer.serialize_struct("Subscription", 6)?;
        state.serialize_field("user", &self.user_id)?;
        state.serialize_field(
            "subscription_end",
            &self.subscription_end.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        state.serialize_field(
            "status",
            match self.status {
                MemberStatus::Active => "active",
                MemberStatus::Inactive => "inactive",
            },
        )?;
        state.serialize_field(
            "tier",
            &self.membership_tier.map(|t| t.to_string()).unwrap_or_default(),
        )?;
        state.serialize_field("plan", &self.plan_id.clone().unwrap_or_default())?;
        state.serialize_field("cancel_at_end", &self.cancel_at_end)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn subscription() -> Subscription {
        Subscription {
            user_id: UserId(7),
            subscription_end: Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
            status: MemberStatus::Active,
            membership_tier: Some(Tier::Pro),
            plan_id: Some("plan-ppl".to_owned()),
            cancel_at_end: false,
        }
    }

    #[test]
    fn serializer_emits_flat_report_row() {
        let json = serde_json::to_string(&subscription()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["user"], 7);
        assert_eq!(parsed["subscription_end"], "2024-03-15T12:00:00Z");
        assert_eq!(parsed["status"], "active");
        assert_eq!(parsed["tier"], "pro");
        assert_eq!(parsed["plan"], "plan-ppl");
        assert_eq!(parsed["cancel_at_end"], false);
    }

    #[test]
    fn serializer_blanks_missing_tier_and_plan() {
        let mut sub = subscription();
        sub.membership_tier = None;
        sub.plan_id = None;
        sub.status = MemberStatus::Inactive;

        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&sub).unwrap()).unwrap();

        assert_eq!(parsed["tier"], "");
        assert_eq!(parsed["plan"], "");
        assert_eq!(parsed["status"], "inactive");
    }

    #[test]
    fn is_current_checks_expiry_inclusive() {
        let sub = subscription();
        assert!(sub.is_current(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()));
        assert!(sub.is_current(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));
        assert!(!sub.is_current(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 1).unwrap()));
    }
}
