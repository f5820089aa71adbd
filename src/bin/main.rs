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

use chrono::{DateTime, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use gym_ledger_rs::{
    ClientProfile, Engine, MonthDelta, NotificationId, PaymentId, PaymentMethod, Tier, UserId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Settlement Engine - Replay an operation log CSV
///
/// Reads settlement operations from a CSV file and outputs the member
/// subscription report (or the admin notification feed) to stdout.
/// Supports register, submit, approve, reject, extend, subtract, and cancel.
#[derive(Parser, Debug)]
#[command(name = "gym-ledger-rs")]
#[command(about = "A settlement engine that replays operation log CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,at,user,name,email,tier,amount,method,details,plan,payment,notification
    /// Example: cargo run -- operations.csv > members.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print the admin notification feed instead of the member report
    #[arg(long)]
    feed: bool,
}

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Replay operations from CSV
    let engine = match process_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    // Write results to stdout
    let result = if args.feed {
        write_feed(&engine, std::io::stdout())
    } else {
        write_members(&engine, std::io::stdout())
    };
    if let Err(e) = result {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, at, user, name, email, tier, amount, method, details, plan,
/// payment, notification`. Columns that an operation does not use may be
/// left empty.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    /// Operation timestamp (RFC 3339). Empty means "now".
    #[serde(default, deserialize_with = "csv::invalid_option")]
    at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    user: Option<u32>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    tier: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    method: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    plan: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    payment: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    notification: Option<u32>,
}

/// One settlement operation replayed against the engine.
#[derive(Debug)]
enum Operation {
    Register(ClientProfile),
    Submit {
        profile: ClientProfile,
        tier: Tier,
        amount: Decimal,
        method: PaymentMethod,
        details: String,
        plan_id: String,
    },
    Approve(PaymentId, Option<NotificationId>),
    Reject(PaymentId, Option<NotificationId>),
    Extend(UserId),
    Subtract(UserId),
    Cancel(UserId),
}

impl CsvRecord {
    /// Converts a CSV record to an operation.
    ///
    /// Returns `None` for unknown operations or missing required fields.
    fn into_operation(self) -> Option<(Operation, Option<DateTime<Utc>>)> {
        let at = self.at;
        let profile = |record: &CsvRecord| {
            Some(ClientProfile {
                uid: UserId(record.user?),
                display_name: record.name.clone(),
                email: record.email.clone(),
            })
        };

        let op = match self.op.to_lowercase().as_str() {
            "register" => Operation::Register(profile(&self)?),
            "submit" => {
                let tier = match self.tier.as_str() {
                    "basic" => Tier::Basic,
                    "pro" => Tier::Pro,
                    "elite" => Tier::Elite,
                    _ => return None,
                };
                let method = match self.method.as_str() {
                    "card" => PaymentMethod::Card,
                    "mobile-transfer" => PaymentMethod::MobileTransfer,
                    _ => return None,
                };
                Operation::Submit {
                    profile: profile(&self)?,
                    tier,
                    amount: self.amount?,
                    method,
                    details: self.details,
                    plan_id: self.plan,
                }
            }
            "approve" => Operation::Approve(
                PaymentId(self.payment?),
                self.notification.map(NotificationId),
            ),
            "reject" => Operation::Reject(
                PaymentId(self.payment?),
                self.notification.map(NotificationId),
            ),
            "extend" => Operation::Extend(UserId(self.user?)),
            "subtract" => Operation::Subtract(UserId(self.user?)),
            "cancel" => Operation::Cancel(UserId(self.user?)),
            _ => return None,
        };
        Some((op, at))
    }
}

/// Replays operations from a CSV reader.
///
/// Streaming: arbitrarily long logs are handled without loading the file into
/// memory. Malformed rows and failed operations are skipped; a settlement
/// failure on one row never stops the replay.
///
/// # CSV Format
///
/// Expected columns:
/// `op, at, user, name, email, tier, amount, method, details, plan, payment, notification`
///
/// # Example
///
/// ```csv
/// op,at,user,name,email,tier,amount,method,details,plan,payment,notification
/// register,2024-01-01T00:00:00Z,1,Ana,ana@example.com,,,,,,,
/// submit,2024-02-01T00:00:00Z,1,Ana,ana@example.com,pro,45.00,card,,plan-ppl,,
/// approve,2024-02-02T00:00:00Z,,,,,,,,,1,1
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(reader: R) -> Result<Engine, csv::Error> {
    let engine = Engine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true) // Allow trailing unused columns to be omitted
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some((op, at)) = record.into_operation() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record");
                    continue;
                };
                let now = at.unwrap_or_else(Utc::now);

                // Replay, ignoring settlement failures (silent skip)
                let outcome = match op {
                    Operation::Register(profile) => engine.register_at(&profile, now),
                    Operation::Submit {
                        profile,
                        tier,
                        amount,
                        method,
                        details,
                        plan_id,
                    } => engine
                        .submit_at(&profile, tier, amount, method, &details, &plan_id, now)
                        .map(|_| ()),
                    Operation::Approve(payment, notification) => {
                        engine.approve_at(payment, notification, now)
                    }
                    Operation::Reject(payment, notification) => {
                        engine.reject(payment, notification)
                    }
                    Operation::Extend(user) => engine.adjust_at(user, MonthDelta::Add, now),
                    Operation::Subtract(user) => {
                        engine.adjust_at(user, MonthDelta::Subtract, now)
                    }
                    Operation::Cancel(user) => engine.request_cancel_at_end(user),
                };
                if let Err(_e) = outcome {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping operation: {}", _e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(engine)
}

/// Writes the member subscription report to a CSV writer.
///
/// # CSV Format
///
/// Columns: `user, subscription_end, status, tier, plan, cancel_at_end`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_members<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for subscription in engine.subscriptions() {
        wtr.serialize(&subscription)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Drains and writes the admin notification feed to a CSV writer, in
/// submission order.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_feed<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for notification in engine.drain_feed() {
        wtr.serialize(&notification)?;
    }

    wtr.flush()?;
    Ok(())
}
