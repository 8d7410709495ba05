//! SQLite-backed implementation of the backend collaborator
//!
//! Reads go straight to the pool. Writes (the ingest side) run in a transaction
//! and publish a change event per affected row once committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lifeline_common::db::rows::{CALLER_COLUMNS, CALL_COLUMNS};
use lifeline_common::db::{CallRow, CallerRow};
use lifeline_common::events::{ChangeEvent, ChangeKind, ChangeRow, EventBus, Table};
use lifeline_common::models::{Call, Caller, CallerProfile, NewCall};
use lifeline_common::time::to_millis;
use lifeline_common::{Error, Result};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use super::{Backend, ChangeFilter, Subscription};

#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    bus: EventBus,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool, bus: EventBus) -> Self {
        Self { pool, bus }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Create or update a caller's profile
    ///
    /// Profile fields replace the stored ones. `last_call` is only changed when
    /// given; new callers without one start at "now".
    pub async fn upsert_caller(&self, phone_number: &str, profile: CallerProfile) -> Result<Caller> {
        let phone_number = validate_phone(phone_number)?;
        let mut tx = self.pool.begin().await?;

        let existing = fetch_caller_tx(&mut tx, phone_number).await?;
        let kind = match existing {
            Some(current) => {
                let last_call = profile.last_call.unwrap_or(current.last_call);
                sqlx::query(
                    "UPDATE callers SET name = ?, previous_history = ?, sexual_orientation = ?, last_call_ms = ? WHERE phone_number = ?",
                )
                .bind(&profile.name)
                .bind(&profile.previous_history)
                .bind(&profile.sexual_orientation)
                .bind(to_millis(last_call))
                .bind(phone_number)
                .execute(&mut *tx)
                .await?;
                ChangeKind::Update
            }
            None => {
                let last_call = profile.last_call.unwrap_or_else(Utc::now);
                sqlx::query(
                    "INSERT INTO callers (phone_number, name, previous_history, sexual_orientation, last_call_ms) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(phone_number)
                .bind(&profile.name)
                .bind(&profile.previous_history)
                .bind(&profile.sexual_orientation)
                .bind(to_millis(last_call))
                .execute(&mut *tx)
                .await?;
                ChangeKind::Insert
            }
        };

        let caller = fetch_caller_tx(&mut tx, phone_number)
            .await?
            .ok_or_else(|| Error::Internal(format!("caller {} vanished during upsert", phone_number)))?;
        tx.commit().await?;

        self.publish(Table::Callers, kind, ChangeRow::Caller(caller.clone()));
        Ok(caller)
    }

    /// Delete a caller row; returns false when there was nothing to delete
    ///
    /// The caller's calls are left in place.
    pub async fn delete_caller(&self, phone_number: &str) -> Result<bool> {
        let phone_number = validate_phone(phone_number)?;
        let result = sqlx::query("DELETE FROM callers WHERE phone_number = ?")
            .bind(phone_number)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        self.publish(
            Table::Callers,
            ChangeKind::Delete,
            ChangeRow::CallerRemoved {
                phone_number: phone_number.to_string(),
            },
        );
        Ok(true)
    }

    /// Record a new call and advance the caller's `last_call`
    ///
    /// A caller row is created if the number is new. Publishes the call insert
    /// followed by the caller insert/update.
    pub async fn insert_call(&self, new_call: NewCall) -> Result<Call> {
        let phone_number = validate_phone(&new_call.phone_number)?.to_string();
        let flags: Vec<&str> = new_call.flags.iter().map(|f| f.as_str()).collect();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO calls (phone_number, call_time_ms, duration_secs, source, urgency, transcript, summary, emotions, sentiment, flags) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&phone_number)
        .bind(to_millis(new_call.call_time))
        .bind(new_call.duration_secs)
        .bind(new_call.source.map(|s| s.as_str()))
        .bind(new_call.urgency.map(|u| u.as_str()))
        .bind(&new_call.transcript)
        .bind(&new_call.summary)
        .bind(to_json(new_call.emotions.as_ref())?)
        .bind(to_json(new_call.sentiment.as_ref())?)
        .bind(to_json(Some(&flags))?)
        .execute(&mut *tx)
        .await?;
        let call_id = result.last_insert_rowid();

        let existing = fetch_caller_tx(&mut tx, &phone_number).await?;
        let caller_kind = touch_last_call(&mut tx, &phone_number, existing.as_ref(), new_call.call_time).await?;

        let row: CallRow = sqlx::query_as(&format!("SELECT {} FROM calls WHERE id = ?", CALL_COLUMNS))
            .bind(call_id)
            .fetch_one(&mut *tx)
            .await?;
        let call = Call::try_from(row)?;
        let caller = fetch_caller_tx(&mut tx, &phone_number).await?;

        tx.commit().await?;

        self.publish(Table::Calls, ChangeKind::Insert, ChangeRow::Call(call.clone()));
        if let (Some(kind), Some(caller)) = (caller_kind, caller) {
            self.publish(Table::Callers, kind, ChangeRow::Caller(caller));
        }

        Ok(call)
    }

    fn publish(&self, table: Table, kind: ChangeKind, row: ChangeRow) {
        let event = ChangeEvent::new(table, kind, row);
        debug!("Publishing change {}", event.event_type());
        self.bus.emit_lossy(event);
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn fetch_callers(&self) -> Result<Vec<Caller>> {
        let rows: Vec<CallerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM callers ORDER BY last_call_ms DESC",
            CALLER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Fetch(format!("callers: {}", e)))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match Caller::try_from(row) {
                Ok(caller) => Some(caller),
                Err(e) => {
                    warn!("Skipping unreadable caller row: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn fetch_calls(&self, phone_number: &str, limit: Option<u32>) -> Result<Vec<Call>> {
        // LIMIT -1 means "no limit" in SQLite
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows: Vec<CallRow> = sqlx::query_as(&format!(
            "SELECT {} FROM calls WHERE phone_number = ? ORDER BY call_time_ms DESC LIMIT ?",
            CALL_COLUMNS
        ))
        .bind(phone_number)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Fetch(format!("calls for {}: {}", phone_number, e)))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match Call::try_from(row) {
                Ok(call) => Some(call),
                Err(e) => {
                    warn!("Skipping unreadable call row: {}", e);
                    None
                }
            })
            .collect())
    }

    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription::new(self.bus.subscribe(), filter)
    }
}

fn validate_phone(phone_number: &str) -> Result<&str> {
    let trimmed = phone_number.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("phone_number must not be empty".to_string()));
    }
    Ok(trimmed)
}

fn to_json<T: Serialize>(value: Option<&T>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("cannot encode column: {}", e)))
}

async fn fetch_caller_tx(
    tx: &mut Transaction<'_, Sqlite>,
    phone_number: &str,
) -> Result<Option<Caller>> {
    let row: Option<CallerRow> = sqlx::query_as(&format!(
        "SELECT {} FROM callers WHERE phone_number = ?",
        CALLER_COLUMNS
    ))
    .bind(phone_number)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(Caller::try_from).transpose()
}

/// Make sure the caller exists and `last_call` is no older than `call_time`
///
/// Returns the change kind to publish, or `None` when nothing changed.
async fn touch_last_call(
    tx: &mut Transaction<'_, Sqlite>,
    phone_number: &str,
    existing: Option<&Caller>,
    call_time: DateTime<Utc>,
) -> Result<Option<ChangeKind>> {
    match existing {
        None => {
            sqlx::query("INSERT INTO callers (phone_number, last_call_ms) VALUES (?, ?)")
                .bind(phone_number)
                .bind(to_millis(call_time))
                .execute(&mut **tx)
                .await?;
            Ok(Some(ChangeKind::Insert))
        }
        Some(caller) if caller.last_call < call_time => {
            sqlx::query("UPDATE callers SET last_call_ms = ? WHERE phone_number = ?")
                .bind(to_millis(call_time))
                .bind(phone_number)
                .execute(&mut **tx)
                .await?;
            Ok(Some(ChangeKind::Update))
        }
        Some(_) => Ok(None),
    }
}
