use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, Transaction};

use reviva_core::booking::{TicketRepository, TicketStoreError};
use reviva_core::domain::catalog::{DeviceId, RepairTypeId};
use reviva_core::domain::quote::{Quote, UrgencyLevel};
use reviva_core::domain::ticket::{
    ActorId, CustomerId, RepairTicket, StatusHistoryEntry, TicketId, TicketStatus,
};

use super::catalog::{parse_optional_timestamp, parse_timestamp};
use super::RepositoryError;
use crate::DbPool;

pub struct SqlTicketRepository {
    pool: DbPool,
}

impl SqlTicketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Header and history are read inside one transaction so both come from
    /// the same snapshot.
    async fn load(&self, id: &TicketId) -> Result<Option<RepairTicket>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT
                id,
                customer_id,
                device_id,
                repair_type_id,
                urgency,
                current_status,
                active_quote_json,
                version,
                created_at,
                updated_at,
                actual_completion_at
             FROM repair_ticket
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let history = sqlx::query(
            "SELECT status, previous_status, changed_by, notes, changed_at
             FROM ticket_status_history
             WHERE ticket_id = ?
             ORDER BY sequence ASC",
        )
        .bind(&id.0)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(history_from_row)
        .collect::<Result<Vec<_>, _>>()?;
        tx.commit().await?;

        ticket_from_row(&row, history).map(Some)
    }

    async fn insert_ticket(&self, ticket: &RepairTicket) -> Result<(), RepositoryError> {
        let quote_json = encode_quote(ticket.active_quote.as_ref())?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO repair_ticket (
                id,
                customer_id,
                device_id,
                repair_type_id,
                urgency,
                current_status,
                active_quote_json,
                version,
                created_at,
                updated_at,
                actual_completion_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&ticket.id.0)
        .bind(&ticket.customer_id.0)
        .bind(&ticket.device_id.0)
        .bind(&ticket.repair_type_id.0)
        .bind(ticket.urgency.as_str())
        .bind(ticket.current_status.as_str())
        .bind(quote_json)
        .bind(i64::from(ticket.version))
        .bind(ticket.created_at.to_rfc3339())
        .bind(ticket.updated_at.to_rfc3339())
        .bind(ticket.actual_completion_at.map(|value| value.to_rfc3339()))
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(error)) = &inserted {
            if error.is_unique_violation() {
                return Err(TicketStoreError::Duplicate(ticket.id.clone()).into());
            }
        }
        inserted?;

        append_history(&mut tx, &ticket.id, &ticket.status_history, 0).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_ticket(
        &self,
        ticket: &RepairTicket,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let quote_json = encode_quote(ticket.active_quote.as_ref())?;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE repair_ticket
             SET urgency = ?,
                 current_status = ?,
                 active_quote_json = ?,
                 version = ?,
                 updated_at = ?,
                 actual_completion_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(ticket.urgency.as_str())
        .bind(ticket.current_status.as_str())
        .bind(quote_json)
        .bind(i64::from(ticket.version))
        .bind(ticket.updated_at.to_rfc3339())
        .bind(ticket.actual_completion_at.map(|value| value.to_rfc3339()))
        .bind(&ticket.id.0)
        .bind(i64::from(expected_version))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let stored: Option<i64> =
                sqlx::query_scalar("SELECT version FROM repair_ticket WHERE id = ?")
                    .bind(&ticket.id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            let error = match stored {
                None => TicketStoreError::Missing(ticket.id.clone()),
                Some(actual) => TicketStoreError::VersionConflict {
                    ticket_id: ticket.id.clone(),
                    expected: expected_version,
                    actual: parse_u32("version", actual)?,
                },
            };
            return Err(error.into());
        }

        let stored_entries: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM ticket_status_history WHERE ticket_id = ?")
                .bind(&ticket.id.0)
                .fetch_one(&mut *tx)
                .await?;
        let stored_entries = usize::try_from(stored_entries).map_err(|_| {
            RepositoryError::Decode(format!("invalid history length: {stored_entries}"))
        })?;
        if stored_entries > ticket.status_history.len() {
            tx.rollback().await?;
            return Err(RepositoryError::Decode(format!(
                "ticket {} would drop {} history entries",
                ticket.id,
                stored_entries - ticket.status_history.len()
            )));
        }

        append_history(&mut tx, &ticket.id, &ticket.status_history, stored_entries).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for SqlTicketRepository {
    async fn find_by_id(&self, id: &TicketId) -> Result<Option<RepairTicket>, TicketStoreError> {
        Ok(self.load(id).await?)
    }

    async fn insert(&self, ticket: &RepairTicket) -> Result<(), TicketStoreError> {
        Ok(self.insert_ticket(ticket).await?)
    }

    async fn update(
        &self,
        ticket: &RepairTicket,
        expected_version: u32,
    ) -> Result<(), TicketStoreError> {
        Ok(self.update_ticket(ticket, expected_version).await?)
    }
}

async fn append_history(
    tx: &mut Transaction<'_, Sqlite>,
    ticket_id: &TicketId,
    history: &[StatusHistoryEntry],
    from_sequence: usize,
) -> Result<(), RepositoryError> {
    for (sequence, entry) in history.iter().enumerate().skip(from_sequence) {
        let sequence = i64::try_from(sequence)
            .map_err(|_| RepositoryError::Decode(format!("history too long: {sequence}")))?;
        sqlx::query(
            "INSERT INTO ticket_status_history (
                ticket_id,
                sequence,
                status,
                previous_status,
                changed_by,
                notes,
                changed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&ticket_id.0)
        .bind(sequence)
        .bind(entry.status.as_str())
        .bind(entry.previous_status.map(|status| status.as_str()))
        .bind(&entry.changed_by.0)
        .bind(entry.notes.as_deref())
        .bind(entry.timestamp.to_rfc3339())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn encode_quote(quote: Option<&Quote>) -> Result<Option<String>, RepositoryError> {
    quote
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("could not encode quote: {error}")))
}

fn ticket_from_row(
    row: &SqliteRow,
    status_history: Vec<StatusHistoryEntry>,
) -> Result<RepairTicket, RepositoryError> {
    let urgency: String = row.try_get("urgency")?;
    let quote_json: Option<String> = row.try_get("active_quote_json")?;
    let active_quote = quote_json
        .map(|json| serde_json::from_str::<Quote>(&json))
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("invalid active_quote_json: {error}")))?;

    Ok(RepairTicket {
        id: TicketId(row.try_get("id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        device_id: DeviceId(row.try_get("device_id")?),
        repair_type_id: RepairTypeId(row.try_get("repair_type_id")?),
        urgency: urgency
            .parse::<UrgencyLevel>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        current_status: parse_status("current_status", row.try_get("current_status")?)?,
        status_history,
        active_quote,
        version: parse_u32("version", row.try_get("version")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        actual_completion_at: parse_optional_timestamp(
            "actual_completion_at",
            row.try_get("actual_completion_at")?,
        )?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<StatusHistoryEntry, RepositoryError> {
    let previous: Option<String> = row.try_get("previous_status")?;
    Ok(StatusHistoryEntry {
        status: parse_status("status", row.try_get("status")?)?,
        previous_status: previous.map(|value| parse_status("previous_status", value)).transpose()?,
        changed_by: ActorId(row.try_get("changed_by")?),
        notes: row.try_get("notes")?,
        timestamp: parse_timestamp("changed_at", row.try_get("changed_at")?)?,
    })
}

fn parse_status(column: &str, value: String) -> Result<TicketStatus, RepositoryError> {
    TicketStatus::parse(&value).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid ticket status in `{column}`: `{value}`"))
    })
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}
