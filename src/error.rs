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

//! Error types for payment settlement.

use thiserror::Error;

/// Settlement errors.
///
/// All variants are recoverable at the caller boundary; none should crash the
/// process. A failed operation leaves the ledger in its pre-operation state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Referenced payment, notification, or member record does not exist
    #[error("record not found")]
    NotFound,

    /// Payment was already settled by another actor; not re-applied
    #[error("payment already processed")]
    AlreadyProcessed,

    /// A concurrent transaction won; safe to retry the whole operation
    #[error("transaction conflict, retry")]
    TransactionConflict,

    /// The submission transaction could not commit; client may retry explicitly
    #[error("payment submission failed")]
    SubmissionFailed,

    /// Member already has a payment awaiting review
    #[error("a pending payment already exists for this member")]
    DuplicatePending,

    /// Member record already exists
    #[error("member already registered")]
    DuplicateUser,

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,
}
