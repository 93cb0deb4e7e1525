// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Arcana reading service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, the reading job state machine
//! (conditional claim, idempotent terminal writes), and the append-only
//! credit ledger with derived balances.

pub mod database;
pub mod ledger;
pub mod migrations;
pub mod readings;

pub use database::Database;
pub use ledger::{CreditLedger, CreditTransaction};
pub use readings::{ReadingStore, StatusCounts, SubmitReceipt};
