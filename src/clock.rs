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

//! Subscription clock: calendar-month date arithmetic.
//!
//! Subscription periods are calendar months, not fixed 30-day spans, so all
//! arithmetic goes through chrono's [`Months`] (which clamps end-of-month
//! dates, e.g. Jan 31 + 1 month = Feb 28/29).

use chrono::{DateTime, Months, Utc};

/// Computes the new subscription end for a renewal.
///
/// The base date is `max(current_end, now)`: an active subscription extends
/// from its existing expiry (active time is never lost), a lapsed one extends
/// from now (lapsed time is never backfilled).
pub fn extend(current_end: DateTime<Utc>, now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let base = current_end.max(now);
    // Month arithmetic only fails at the representable datetime bounds;
    // saturate rather than panic.
    base.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Applies an unconditional signed month shift to `current_end`.
///
/// Used by the manual admin adjustment path. Unlike [`extend`] there is no
/// `max(now, ..)` floor: subtracting may deliberately move the expiry into
/// the past.
pub fn shift(current_end: DateTime<Utc>, delta_months: i32) -> DateTime<Utc> {
    if delta_months >= 0 {
        current_end
            .checked_add_months(Months::new(delta_months as u32))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    } else {
        current_end
            .checked_sub_months(Months::new(delta_months.unsigned_abs()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn lapsed_subscription_extends_from_now() {
        // Expiry in the past: the month is counted from now.
        let end = extend(utc(2024, 1, 10), utc(2024, 2, 1), 1);
        assert_eq!(end, utc(2024, 3, 1));
    }

    #[test]
    fn active_subscription_extends_from_expiry() {
        // Expiry in the future: remaining paid time is preserved.
        let end = extend(utc(2024, 3, 15), utc(2024, 2, 1), 1);
        assert_eq!(end, utc(2024, 4, 15));
    }

    #[test]
    fn extend_on_exact_expiry_instant() {
        let t = utc(2024, 2, 1);
        assert_eq!(extend(t, t, 1), utc(2024, 3, 1));
    }

    #[test]
    fn extend_clamps_end_of_month() {
        assert_eq!(extend(utc(2024, 1, 31), utc(2024, 1, 1), 1), utc(2024, 2, 29));
        assert_eq!(extend(utc(2023, 1, 31), utc(2023, 1, 1), 1), utc(2023, 2, 28));
        assert_eq!(extend(utc(2024, 8, 31), utc(2024, 8, 1), 1), utc(2024, 9, 30));
    }

    #[test]
    fn extend_preserves_time_of_day() {
        let end = Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 45).unwrap();
        let now = utc(2024, 2, 1);
        assert_eq!(
            extend(end, now, 1),
            Utc.with_ymd_and_hms(2024, 4, 15, 18, 30, 45).unwrap()
        );
    }

    #[test]
    fn shift_subtracts_without_now_floor() {
        // Manual "-1 month" can move the expiry into the past.
        assert_eq!(shift(utc(2024, 2, 15), -1), utc(2024, 1, 15));
        assert_eq!(shift(utc(2024, 3, 31), -1), utc(2024, 2, 29));
    }

    #[test]
    fn shift_adds_plain_months() {
        assert_eq!(shift(utc(2024, 1, 15), 1), utc(2024, 2, 15));
        assert_eq!(shift(utc(2024, 1, 15), 0), utc(2024, 1, 15));
    }

    #[test]
    fn extend_across_year_boundary() {
        assert_eq!(extend(utc(2024, 12, 10), utc(2024, 11, 1), 1), utc(2025, 1, 10));
    }
}
