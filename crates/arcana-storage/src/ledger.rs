// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit ledger: append-only transaction rows plus derived balances.
//!
//! Debits are written by [`ReadingStore::submit`] and
//! [`ReadingStore::retry`] so they commit together with the job row; this
//! module owns grants, refunds, and the read side. Every balance mutation
//! shares a transaction with its ledger row, so `balance == SUM(delta)`
//! holds for every user at all times.
//!
//! [`ReadingStore::submit`]: crate::readings::ReadingStore::submit
//! [`ReadingStore::retry`]: crate::readings::ReadingStore::retry

use arcana_core::ArcanaError;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use tracing::info;

use crate::database::{Database, map_tr_err, now_ts};

/// One immutable ledger row.
///
/// `reason` is `'debit'` for the initial submission charge, `'retry-N'`
/// for the Nth explicit retry charge, `'refund:attempt-N'` for refunds,
/// and free-form (default `'grant'`) for grants. Grants carry no
/// `reading_id`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub id: i64,
    pub user_id: String,
    pub reading_id: Option<String>,
    pub delta: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

enum RefundOutcome {
    Refunded { amount: i64, new_balance: i64 },
    NotFailed(String),
    NoOutstandingDebit,
    Missing,
}

/// Typed access to the `credit_ledger` and `balances` tables.
#[derive(Clone)]
pub struct CreditLedger {
    db: Database,
}

impl CreditLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Current balance; users with no ledger history have zero.
    pub async fn balance(&self, user_id: &str) -> Result<i64, ArcanaError> {
        let user = user_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COALESCE(
                        (SELECT balance FROM balances WHERE user_id = ?1), 0)",
                    params![user],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Sum of all ledger deltas for a user. Always equals [`balance`];
    /// exposed for audit checks.
    ///
    /// [`balance`]: CreditLedger::balance
    pub async fn ledger_sum(&self, user_id: &str) -> Result<i64, ArcanaError> {
        let user = user_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COALESCE(SUM(delta), 0) FROM credit_ledger WHERE user_id = ?1",
                    params![user],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Credit a user's account. Returns the new balance.
    pub async fn grant(
        &self,
        user_id: &str,
        amount: i64,
        reason: Option<&str>,
    ) -> Result<i64, ArcanaError> {
        if amount <= 0 {
            return Err(ArcanaError::Validation(format!(
                "grant amount must be positive, got {amount}"
            )));
        }
        let user = user_id.to_string();
        let note = reason.unwrap_or("grant").to_string();
        let ts = now_ts();
        let new_balance = self
            .db
            .connection()
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO credit_ledger (user_id, reading_id, delta, reason, created_at)
                     VALUES (?1, NULL, ?2, ?3, ?4)",
                    params![user, amount, note, ts],
                )?;
                tx.execute(
                    "INSERT INTO balances (user_id, balance, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_id) DO UPDATE
                     SET balance = balance + excluded.balance, updated_at = excluded.updated_at",
                    params![user, amount, ts],
                )?;
                let balance: i64 = tx.query_row(
                    "SELECT balance FROM balances WHERE user_id = ?1",
                    params![user],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                Ok(balance)
            })
            .await
            .map_err(map_tr_err)?;

        info!(user_id = %user_id, amount, new_balance, "credits granted");
        Ok(new_balance)
    }

    /// Refund the outstanding debit of a failed reading. Returns the
    /// refunded amount.
    ///
    /// Valid only for readings whose current state is `failed` and whose
    /// per-reading deltas still sum negative; anything else is a
    /// `RefundConflict`, so duplicate deliveries restore the money at most
    /// once.
    pub async fn refund(
        &self,
        user_id: &str,
        reading_id: &str,
        reason: &str,
    ) -> Result<i64, ArcanaError> {
        let user = user_id.to_string();
        let id = reading_id.to_string();
        let note = reason.to_string();
        let ts = now_ts();
        let outcome = self
            .db
            .connection()
            .call(move |conn| -> Result<RefundOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                let status: Option<String> = match tx.query_row(
                    "SELECT status FROM readings WHERE id = ?1 AND user_id = ?2",
                    params![id, user],
                    |row| row.get(0),
                ) {
                    Ok(s) => Some(s),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                };
                let outcome = match status.as_deref() {
                    None => RefundOutcome::Missing,
                    Some("failed") => {
                        let sum: i64 = tx.query_row(
                            "SELECT COALESCE(SUM(delta), 0) FROM credit_ledger
                             WHERE reading_id = ?1",
                            params![id],
                            |row| row.get(0),
                        )?;
                        let outstanding = -sum;
                        if outstanding <= 0 {
                            RefundOutcome::NoOutstandingDebit
                        } else {
                            tx.execute(
                                "INSERT INTO credit_ledger
                                     (user_id, reading_id, delta, reason, created_at)
                                 VALUES (?1, ?2, ?3, ?4, ?5)",
                                params![user, id, outstanding, note, ts],
                            )?;
                            tx.execute(
                                "UPDATE balances SET balance = balance + ?1, updated_at = ?2
                                 WHERE user_id = ?3",
                                params![outstanding, ts, user],
                            )?;
                            let new_balance: i64 = tx.query_row(
                                "SELECT balance FROM balances WHERE user_id = ?1",
                                params![user],
                                |row| row.get(0),
                            )?;
                            RefundOutcome::Refunded {
                                amount: outstanding,
                                new_balance,
                            }
                        }
                    }
                    Some(other) => RefundOutcome::NotFailed(other.to_string()),
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            RefundOutcome::Refunded {
                amount,
                new_balance,
            } => {
                info!(
                    user_id = %user_id,
                    reading_id = %reading_id,
                    amount,
                    new_balance,
                    reason = %reason,
                    "debit refunded"
                );
                Ok(amount)
            }
            RefundOutcome::NotFailed(status) => {
                info!(
                    reading_id = %reading_id,
                    status = %status,
                    "refund rejected: reading is not failed"
                );
                Err(ArcanaError::RefundConflict {
                    reading_id: reading_id.to_string(),
                })
            }
            RefundOutcome::NoOutstandingDebit => Err(ArcanaError::RefundConflict {
                reading_id: reading_id.to_string(),
            }),
            RefundOutcome::Missing => Err(ArcanaError::NotFound {
                reading_id: reading_id.to_string(),
            }),
        }
    }

    /// Most recent transactions for a user, newest first.
    pub async fn transactions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<CreditTransaction>, ArcanaError> {
        let user = user_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<CreditTransaction>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, reading_id, delta, reason, created_at
                     FROM credit_ledger
                     WHERE user_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![user, limit], |row| {
                    let created_at: String = row.get(5)?;
                    Ok(CreditTransaction {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        reading_id: row.get(2)?,
                        delta: row.get(3)?,
                        reason: row.get(4)?,
                        created_at: DateTime::parse_from_rfc3339(&created_at)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(
                                    5,
                                    rusqlite::types::Type::Text,
                                    Box::new(e),
                                )
                            })?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }
}
