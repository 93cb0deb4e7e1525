// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading job rows and their status state machine.
//!
//! Transitions are monotonic: pending -> processing -> {completed|failed}.
//! Entry into `processing` goes through a conditional claim so two workers
//! can never both own the same job. Terminal writes are idempotent no-ops
//! on already-terminal rows (first write wins).

use arcana_core::{ArcanaError, Reading, ReadingStatus};
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::{debug, info, warn};

use crate::database::{Database, map_tr_err, now_ts};

/// Row counts per status, for the stats surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Outcome of a successful submit or retry: the fresh job row plus its
/// 1-based position in the pending queue, counted inside the same
/// transaction so it is race-free.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub reading: Reading,
    pub queue_position: u64,
}

enum SubmitOutcome {
    Created { queue_position: u64 },
    ShortBalance { available: i64 },
}

enum ClaimOutcome {
    Claimed(Reading),
    Lost,
    Missing,
}

enum TerminalOutcome {
    Applied,
    AlreadyTerminal(String),
    NeverClaimed,
    Missing,
}

enum RetryOutcome {
    Accepted {
        reading: Reading,
        queue_position: u64,
    },
    Missing,
    NotFailed(String),
    LimitReached {
        retry_count: u32,
    },
    Cooling {
        remaining_secs: u64,
    },
    ShortBalance {
        available: i64,
    },
}

fn parse_ts(idx: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_status(idx: usize, value: &str) -> Result<ReadingStatus, rusqlite::Error> {
    value.parse::<ReadingStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn reading_from_row(row: &rusqlite::Row<'_>) -> Result<Reading, rusqlite::Error> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(8)?;
    let started_at: Option<String> = row.get(9)?;
    let completed_at: Option<String> = row.get(10)?;
    Ok(Reading {
        id: row.get(0)?,
        user_id: row.get(1)?,
        question: row.get(2)?,
        card_count: row.get(3)?,
        status: parse_status(4, &status)?,
        retry_count: row.get(5)?,
        error_message: row.get(6)?,
        result_payload: row.get(7)?,
        created_at: parse_ts(8, &created_at)?,
        processing_started_at: started_at.as_deref().map(|s| parse_ts(9, s)).transpose()?,
        processing_completed_at: completed_at
            .as_deref()
            .map(|s| parse_ts(10, s))
            .transpose()?,
    })
}

/// Ensure a balance row exists, then debit it and append the matching
/// ledger entry. Errors with the current balance if it cannot cover `cost`.
///
/// Runs inside the caller's transaction so the debit commits (or rolls
/// back) together with the job-row write.
fn debit_in_tx(
    tx: &rusqlite::Transaction<'_>,
    user_id: &str,
    reading_id: &str,
    cost: i64,
    reason: &str,
    ts: &str,
) -> Result<Result<(), i64>, rusqlite::Error> {
    tx.execute(
        "INSERT INTO balances (user_id, balance, updated_at) VALUES (?1, 0, ?2)
         ON CONFLICT(user_id) DO NOTHING",
        params![user_id, ts],
    )?;
    let available: i64 = tx.query_row(
        "SELECT balance FROM balances WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    if available < cost {
        return Ok(Err(available));
    }
    tx.execute(
        "UPDATE balances SET balance = balance - ?1, updated_at = ?2 WHERE user_id = ?3",
        params![cost, ts, user_id],
    )?;
    tx.execute(
        "INSERT INTO credit_ledger (user_id, reading_id, delta, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, reading_id, -cost, reason, ts],
    )?;
    Ok(Ok(()))
}

fn queue_position_in_tx(
    tx: &rusqlite::Transaction<'_>,
    created_at: &str,
    id: &str,
) -> Result<u64, rusqlite::Error> {
    let position: i64 = tx.query_row(
        "SELECT COUNT(*) FROM readings
         WHERE status = 'pending'
           AND (created_at < ?1 OR (created_at = ?1 AND id <= ?2))",
        params![created_at, id],
        |row| row.get(0),
    )?;
    Ok(position.max(1) as u64)
}

/// Typed access to the `readings` table.
#[derive(Clone)]
pub struct ReadingStore {
    db: Database,
}

impl ReadingStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a pending reading and debit its cost in one transaction.
    ///
    /// The debit writes a `delta = -cost, reason = 'debit'` ledger row and
    /// decrements the balance; if the balance cannot cover the cost the
    /// whole transaction rolls back and no trace of the request remains.
    pub async fn submit(
        &self,
        user_id: &str,
        question: &str,
        card_count: u32,
        cost: i64,
    ) -> Result<SubmitReceipt, ArcanaError> {
        let id = uuid::Uuid::new_v4().to_string();
        let ts = now_ts();

        let c_id = id.clone();
        let c_ts = ts.clone();
        let c_user = user_id.to_string();
        let c_question = question.to_string();
        let outcome = self
            .db
            .connection()
            .call(move |conn| -> Result<SubmitOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                if let Err(available) = debit_in_tx(&tx, &c_user, &c_id, cost, "debit", &c_ts)? {
                    // Roll back the transaction by dropping it uncommitted.
                    return Ok(SubmitOutcome::ShortBalance { available });
                }
                tx.execute(
                    "INSERT INTO readings (id, user_id, question, card_count, status,
                                           retry_count, created_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5)",
                    params![c_id, c_user, c_question, card_count, c_ts],
                )?;
                let queue_position = queue_position_in_tx(&tx, &c_ts, &c_id)?;
                tx.commit()?;
                Ok(SubmitOutcome::Created { queue_position })
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            SubmitOutcome::Created { queue_position } => {
                info!(
                    reading_id = %id,
                    user_id = %user_id,
                    card_count,
                    cost,
                    queue_position,
                    "reading submitted"
                );
                let created_at = parse_ts(0, &ts).map_err(|e| ArcanaError::Storage {
                    source: Box::new(e),
                })?;
                Ok(SubmitReceipt {
                    reading: Reading {
                        id,
                        user_id: user_id.to_string(),
                        question: question.to_string(),
                        card_count,
                        status: ReadingStatus::Pending,
                        retry_count: 0,
                        error_message: None,
                        result_payload: None,
                        created_at,
                        processing_started_at: None,
                        processing_completed_at: None,
                    },
                    queue_position,
                })
            }
            SubmitOutcome::ShortBalance { available } => Err(ArcanaError::InsufficientCredits {
                required: cost,
                available,
            }),
        }
    }

    /// Fetch a reading by id.
    pub async fn get(&self, reading_id: &str) -> Result<Option<Reading>, ArcanaError> {
        let id = reading_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<Reading>, rusqlite::Error> {
                let result = conn.query_row(
                    "SELECT id, user_id, question, card_count, status, retry_count,
                            error_message, result_payload, created_at,
                            processing_started_at, processing_completed_at
                     FROM readings WHERE id = ?1",
                    params![id],
                    reading_from_row,
                );
                match result {
                    Ok(reading) => Ok(Some(reading)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    /// Conditionally claim a pending reading for processing.
    ///
    /// Issues `UPDATE ... WHERE id = ? AND status = 'pending'`; zero affected
    /// rows on an existing reading means another worker won the race and the
    /// caller gets `ClaimConflict`.
    pub async fn claim(&self, reading_id: &str) -> Result<Reading, ArcanaError> {
        let id = reading_id.to_string();
        let ts = now_ts();
        let outcome = self
            .db
            .connection()
            .call(move |conn| -> Result<ClaimOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    "UPDATE readings SET status = 'processing', processing_started_at = ?1
                     WHERE id = ?2 AND status = 'pending'",
                    params![ts, id],
                )?;
                let outcome = if changed == 0 {
                    let exists: i64 = tx.query_row(
                        "SELECT COUNT(*) FROM readings WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )?;
                    if exists > 0 {
                        ClaimOutcome::Lost
                    } else {
                        ClaimOutcome::Missing
                    }
                } else {
                    let reading = tx.query_row(
                        "SELECT id, user_id, question, card_count, status, retry_count,
                                error_message, result_payload, created_at,
                                processing_started_at, processing_completed_at
                         FROM readings WHERE id = ?1",
                        params![id],
                        reading_from_row,
                    )?;
                    ClaimOutcome::Claimed(reading)
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            ClaimOutcome::Claimed(reading) => {
                debug!(reading_id = %reading_id, "reading claimed");
                Ok(reading)
            }
            ClaimOutcome::Lost => Err(ArcanaError::ClaimConflict {
                reading_id: reading_id.to_string(),
            }),
            ClaimOutcome::Missing => Err(ArcanaError::NotFound {
                reading_id: reading_id.to_string(),
            }),
        }
    }

    /// Terminal success write. Returns `Ok(false)` when the reading is
    /// already terminal (duplicate delivery; the first payload wins).
    pub async fn complete(
        &self,
        reading_id: &str,
        result_payload: &str,
    ) -> Result<bool, ArcanaError> {
        let id = reading_id.to_string();
        let payload = result_payload.to_string();
        let ts = now_ts();
        let outcome = self
            .db
            .connection()
            .call(move |conn| -> Result<TerminalOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                let status = current_status(&tx, &id)?;
                let outcome = match status.as_deref() {
                    None => TerminalOutcome::Missing,
                    Some("processing") => {
                        tx.execute(
                            "UPDATE readings SET status = 'completed', result_payload = ?1,
                                    error_message = NULL, processing_completed_at = ?2
                             WHERE id = ?3",
                            params![payload, ts, id],
                        )?;
                        TerminalOutcome::Applied
                    }
                    Some("completed") | Some("failed") => {
                        TerminalOutcome::AlreadyTerminal(status.unwrap_or_default())
                    }
                    Some(_) => TerminalOutcome::NeverClaimed,
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await
            .map_err(map_tr_err)?;

        self.finish_terminal(reading_id, "completed", outcome)
    }

    /// Terminal failure write. Same idempotency contract as [`complete`].
    ///
    /// [`complete`]: ReadingStore::complete
    pub async fn fail(&self, reading_id: &str, error_message: &str) -> Result<bool, ArcanaError> {
        let id = reading_id.to_string();
        let message = error_message.to_string();
        let ts = now_ts();
        let outcome = self
            .db
            .connection()
            .call(move |conn| -> Result<TerminalOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                let status = current_status(&tx, &id)?;
                let outcome = match status.as_deref() {
                    None => TerminalOutcome::Missing,
                    Some("processing") => {
                        tx.execute(
                            "UPDATE readings SET status = 'failed', error_message = ?1,
                                    processing_completed_at = ?2
                             WHERE id = ?3",
                            params![message, ts, id],
                        )?;
                        TerminalOutcome::Applied
                    }
                    Some("completed") | Some("failed") => {
                        TerminalOutcome::AlreadyTerminal(status.unwrap_or_default())
                    }
                    Some(_) => TerminalOutcome::NeverClaimed,
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await
            .map_err(map_tr_err)?;

        self.finish_terminal(reading_id, "failed", outcome)
    }

    fn finish_terminal(
        &self,
        reading_id: &str,
        target: &str,
        outcome: TerminalOutcome,
    ) -> Result<bool, ArcanaError> {
        match outcome {
            TerminalOutcome::Applied => {
                info!(reading_id = %reading_id, status = target, "reading finished");
                Ok(true)
            }
            TerminalOutcome::AlreadyTerminal(current) => {
                warn!(
                    reading_id = %reading_id,
                    current = %current,
                    attempted = target,
                    "duplicate terminal write ignored"
                );
                Ok(false)
            }
            TerminalOutcome::NeverClaimed => Err(ArcanaError::Internal(format!(
                "terminal write on reading {reading_id} that was never claimed"
            ))),
            TerminalOutcome::Missing => Err(ArcanaError::NotFound {
                reading_id: reading_id.to_string(),
            }),
        }
    }

    /// Up to `limit` pending readings, oldest first. FIFO order prevents
    /// starvation of early submissions.
    pub async fn fetch_pending(&self, limit: u32) -> Result<Vec<Reading>, ArcanaError> {
        self.db
            .connection()
            .call(move |conn| -> Result<Vec<Reading>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, question, card_count, status, retry_count,
                            error_message, result_payload, created_at,
                            processing_started_at, processing_completed_at
                     FROM readings
                     WHERE status = 'pending'
                     ORDER BY created_at ASC, id ASC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], reading_from_row)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Row counts per status for `/stats`.
    pub async fn status_counts(&self) -> Result<StatusCounts, ArcanaError> {
        self.db
            .connection()
            .call(|conn| -> Result<StatusCounts, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT status, COUNT(*) FROM readings GROUP BY status")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                let mut counts = StatusCounts::default();
                for row in rows {
                    let (status, count) = row?;
                    match status.as_str() {
                        "pending" => counts.pending = count,
                        "processing" => counts.processing = count,
                        "completed" => counts.completed = count,
                        "failed" => counts.failed = count,
                        _ => {}
                    }
                }
                Ok(counts)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Reset readings stuck in `processing` back to `pending`.
    ///
    /// Called once at startup, before the poller starts: a crash between
    /// claim and terminal write leaves rows that no worker owns any more.
    /// This is one of the two deliberate exceptions to transition
    /// monotonicity (the other being explicit retry).
    pub async fn recover_stalled(&self) -> Result<usize, ArcanaError> {
        let recovered = self
            .db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE readings SET status = 'pending', processing_started_at = NULL
                     WHERE status = 'processing'",
                    [],
                )
            })
            .await
            .map_err(map_tr_err)?;
        if recovered > 0 {
            warn!(recovered, "stalled processing readings reset to pending");
        }
        Ok(recovered)
    }

    /// Re-queue a failed reading at the user's explicit request.
    ///
    /// Charges a fresh debit (`reason = 'retry-N'`), enforces the retry
    /// budget and cooldown, and resets the row to `pending` with
    /// `retry_count` incremented. All checks and writes share one
    /// transaction.
    pub async fn retry(
        &self,
        reading_id: &str,
        user_id: &str,
        cost: i64,
        max_retries: u32,
        cooldown_secs: u64,
    ) -> Result<SubmitReceipt, ArcanaError> {
        let id = reading_id.to_string();
        let caller = user_id.to_string();
        let now = Utc::now();
        let ts = now_ts();
        let outcome = self
            .db
            .connection()
            .call(move |conn| -> Result<RetryOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                let row = tx.query_row(
                    "SELECT id, user_id, question, card_count, status, retry_count,
                            error_message, result_payload, created_at,
                            processing_started_at, processing_completed_at
                     FROM readings WHERE id = ?1",
                    params![id],
                    reading_from_row,
                );
                let current = match row {
                    Ok(reading) => reading,
                    Err(rusqlite::Error::QueryReturnedNoRows) => {
                        return Ok(RetryOutcome::Missing);
                    }
                    Err(e) => return Err(e),
                };
                // Readings are private to their submitter.
                if current.user_id != caller {
                    return Ok(RetryOutcome::Missing);
                }
                if current.status != ReadingStatus::Failed {
                    return Ok(RetryOutcome::NotFailed(current.status.to_string()));
                }
                if current.retry_count >= max_retries {
                    return Ok(RetryOutcome::LimitReached {
                        retry_count: current.retry_count,
                    });
                }
                if let Some(failed_at) = current.processing_completed_at {
                    let elapsed = (now - failed_at).num_seconds().max(0) as u64;
                    if elapsed < cooldown_secs {
                        return Ok(RetryOutcome::Cooling {
                            remaining_secs: cooldown_secs - elapsed,
                        });
                    }
                }
                let attempt = current.retry_count + 1;
                let reason = format!("retry-{attempt}");
                if let Err(available) = debit_in_tx(&tx, &caller, &id, cost, &reason, &ts)? {
                    return Ok(RetryOutcome::ShortBalance { available });
                }
                tx.execute(
                    "UPDATE readings SET status = 'pending', retry_count = ?1,
                            error_message = NULL, result_payload = NULL,
                            processing_started_at = NULL, processing_completed_at = NULL
                     WHERE id = ?2",
                    params![attempt, id],
                )?;
                let reading = tx.query_row(
                    "SELECT id, user_id, question, card_count, status, retry_count,
                            error_message, result_payload, created_at,
                            processing_started_at, processing_completed_at
                     FROM readings WHERE id = ?1",
                    params![id],
                    reading_from_row,
                )?;
                let created = reading
                    .created_at
                    .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                    .to_string();
                let queue_position = queue_position_in_tx(&tx, &created, &reading.id)?;
                tx.commit()?;
                Ok(RetryOutcome::Accepted {
                    reading,
                    queue_position,
                })
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            RetryOutcome::Accepted {
                reading,
                queue_position,
            } => {
                info!(
                    reading_id = %reading.id,
                    user_id = %reading.user_id,
                    retry = reading.retry_count,
                    cost,
                    "failed reading re-queued by explicit retry"
                );
                Ok(SubmitReceipt {
                    reading,
                    queue_position,
                })
            }
            RetryOutcome::Missing => Err(ArcanaError::NotFound {
                reading_id: reading_id.to_string(),
            }),
            RetryOutcome::NotFailed(status) => Err(ArcanaError::Validation(format!(
                "only failed readings can be retried (current status: {status})"
            ))),
            RetryOutcome::LimitReached { retry_count } => Err(ArcanaError::RetryLimit {
                reading_id: reading_id.to_string(),
                retry_count,
            }),
            RetryOutcome::Cooling { remaining_secs } => {
                Err(ArcanaError::RetryCooldown { remaining_secs })
            }
            RetryOutcome::ShortBalance { available } => Err(ArcanaError::InsufficientCredits {
                required: cost,
                available,
            }),
        }
    }
}

fn current_status(
    tx: &rusqlite::Transaction<'_>,
    id: &str,
) -> Result<Option<String>, rusqlite::Error> {
    match tx.query_row(
        "SELECT status FROM readings WHERE id = ?1",
        params![id],
        |row| row.get::<_, String>(0),
    ) {
        Ok(status) => Ok(Some(status)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
