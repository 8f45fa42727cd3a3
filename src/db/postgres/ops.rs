use log::error;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use tokio_postgres::Row;

use crate::{
    db::{
        models::{Event, Operator, RosterEntry, SyncCheckpoint, UpsertOutcome},
        postgres::PostgresClient,
        CheckpointStore, LogStore, OperatorStore,
    },
    error::SyncError,
    utils::{decimal_to_bigint, NULL_OPERATOR},
};

/// Sanitize a string for PostgreSQL by removing null bytes (0x00)
/// which are invalid in UTF-8 text columns
fn sanitize_string(s: &str) -> String {
    s.replace('\0', "")
}

/// Map `RETURNING (xmax = 0) AS created` onto an upsert outcome.
/// No row means the conditional update matched nothing to change.
fn classify(row: Option<Row>) -> UpsertOutcome {
    match row {
        Some(row) if row.get::<_, bool>("created") => UpsertOutcome::Created,
        Some(_) => UpsertOutcome::Changed,
        None => UpsertOutcome::Unchanged,
    }
}

impl LogStore for PostgresClient {
    // ==================== EVENTS ====================

    /// Insert, overwrite or skip an event in one statement.
    ///
    /// The conflict target is the natural key and the update only fires when
    /// a non-key column differs, so racing writers for the same key coalesce.
    async fn upsert_event(&self, event: &Event) -> Result<UpsertOutcome, SyncError> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO staking.events (
                block_number, tx_index, log_index, event_type,
                tx_hash, block_hash, block_timestamp, amount,
                guardian_address, operator_address, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8::TEXT::NUMERIC, $9, $10, NOW())
            ON CONFLICT (block_number, tx_index, log_index, event_type) DO UPDATE SET
                tx_hash = EXCLUDED.tx_hash,
                block_hash = EXCLUDED.block_hash,
                block_timestamp = EXCLUDED.block_timestamp,
                amount = EXCLUDED.amount,
                guardian_address = EXCLUDED.guardian_address,
                operator_address = EXCLUDED.operator_address,
                updated_at = EXCLUDED.updated_at
            WHERE (
                staking.events.tx_hash, staking.events.block_hash, staking.events.block_timestamp,
                staking.events.amount, staking.events.guardian_address, staking.events.operator_address
            ) IS DISTINCT FROM (
                EXCLUDED.tx_hash, EXCLUDED.block_hash, EXCLUDED.block_timestamp,
                EXCLUDED.amount, EXCLUDED.guardian_address, EXCLUDED.operator_address
            )
            RETURNING (xmax = 0) AS created
        "#;

        let amount = event.amount.to_string();
        let row = client
            .query_opt(
                query,
                &[
                    &(event.block_number as i64),
                    &(event.tx_index as i64),
                    &(event.log_index as i64),
                    &event.event_type.as_str(),
                    &sanitize_string(&event.tx_hash),
                    &sanitize_string(&event.block_hash),
                    &(event.block_timestamp as i64),
                    &amount,
                    &event.guardian_address,
                    &event.operator_address,
                ],
            )
            .await
            .map_err(|e| {
                error!("[DB] Failed to upsert event {}: {:?}", event.key(), e);
                e
            })?;

        Ok(classify(row))
    }

    async fn delegation_totals(&self) -> Result<FxHashMap<String, BigInt>, SyncError> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                operator_address,
                SUM(CASE WHEN event_type = 'delegate' THEN amount ELSE -amount END)::TEXT AS net
            FROM staking.events
            WHERE event_type IN ('delegate', 'undelegate') AND operator_address <> $1
            GROUP BY operator_address
        "#;

        let rows = client.query(query, &[&NULL_OPERATOR]).await?;
        let mut totals = FxHashMap::default();
        for row in rows {
            let operator_address: String = row.get("operator_address");
            let net: String = row.get("net");
            let net = decimal_to_bigint(&net).ok_or_else(|| {
                SyncError::StoreUnavailable(format!(
                    "non-integer delegation total {} for {}",
                    net, operator_address
                ))
            })?;
            totals.insert(operator_address, net);
        }

        Ok(totals)
    }
}

impl CheckpointStore for PostgresClient {
    // ==================== CHECKPOINT ====================

    async fn get_checkpoint(&self) -> Result<Option<SyncCheckpoint>, SyncError> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT last_synced_height, previous_height, updated_at
            FROM staking.sync_checkpoint
            WHERE id
        "#;

        let row = client.query_opt(query, &[]).await?;
        Ok(row.map(|row| SyncCheckpoint {
            last_synced_height: row.get::<_, i64>("last_synced_height") as u64,
            previous_height: row.get::<_, i64>("previous_height") as u64,
            updated_at: row.get("updated_at"),
        }))
    }

    /// Write the checkpoint. A lower height than the stored one is ignored
    /// so the checkpoint never moves backwards.
    async fn set_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), SyncError> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO staking.sync_checkpoint (id, last_synced_height, previous_height, updated_at)
            VALUES (TRUE, $1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                last_synced_height = EXCLUDED.last_synced_height,
                previous_height = EXCLUDED.previous_height,
                updated_at = EXCLUDED.updated_at
            WHERE staking.sync_checkpoint.last_synced_height <= EXCLUDED.last_synced_height
        "#;

        client
            .execute(
                query,
                &[
                    &(checkpoint.last_synced_height as i64),
                    &(checkpoint.previous_height as i64),
                    &checkpoint.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "[DB] Failed to write checkpoint at height {}: {:?}",
                    checkpoint.last_synced_height, e
                );
                e
            })?;

        Ok(())
    }
}

impl OperatorStore for PostgresClient {
    // ==================== OPERATORS ====================

    async fn get_operators(&self) -> Result<Vec<Operator>, SyncError> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                operator_address, delegated_count::TEXT AS delegated_count,
                active, rewards, fee, uptime, updated_at
            FROM staking.operators
            ORDER BY operator_address
        "#;

        let rows = client.query(query, &[]).await?;
        rows.iter().map(row_to_operator).collect()
    }

    async fn upsert_roster_entry(&self, entry: &RosterEntry) -> Result<UpsertOutcome, SyncError> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO staking.operators (
                operator_address, active, rewards, fee, uptime, updated_at
            ) VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (operator_address) DO UPDATE SET
                -- delegated_count is owned by the aggregate recomputer
                active = EXCLUDED.active,
                rewards = EXCLUDED.rewards,
                fee = EXCLUDED.fee,
                uptime = EXCLUDED.uptime,
                updated_at = EXCLUDED.updated_at
            WHERE (
                staking.operators.active, staking.operators.rewards,
                staking.operators.fee, staking.operators.uptime
            ) IS DISTINCT FROM (
                EXCLUDED.active, EXCLUDED.rewards, EXCLUDED.fee, EXCLUDED.uptime
            )
            RETURNING (xmax = 0) AS created
        "#;

        let row = client
            .query_opt(
                query,
                &[
                    &entry.operator_address,
                    &entry.active,
                    &sanitize_string(&entry.rewards),
                    &entry.fee,
                    &entry.uptime,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "[DB] Failed to upsert roster entry {}: {:?}",
                    entry.operator_address, e
                );
                e
            })?;

        Ok(classify(row))
    }

    async fn set_delegated_count(
        &self,
        operator_address: &str,
        delegated_count: &BigInt,
    ) -> Result<(), SyncError> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO staking.operators (operator_address, delegated_count, updated_at)
            VALUES ($1, $2::TEXT::NUMERIC, NOW())
            ON CONFLICT (operator_address) DO UPDATE SET
                delegated_count = EXCLUDED.delegated_count,
                updated_at = EXCLUDED.updated_at
        "#;

        let count = delegated_count.to_string();
        client
            .execute(query, &[&operator_address, &count])
            .await
            .map_err(|e| {
                error!(
                    "[DB] Failed to set delegated count for {}: {:?}",
                    operator_address, e
                );
                e
            })?;

        Ok(())
    }
}

fn row_to_operator(row: &Row) -> Result<Operator, SyncError> {
    let operator_address: String = row.get("operator_address");
    let delegated_count: String = row.get("delegated_count");
    let delegated_count = decimal_to_bigint(&delegated_count).ok_or_else(|| {
        SyncError::StoreUnavailable(format!(
            "non-integer delegated_count {} for {}",
            delegated_count, operator_address
        ))
    })?;

    Ok(Operator {
        operator_address,
        delegated_count,
        active: row.get("active"),
        rewards: row.get("rewards"),
        fee: row.get("fee"),
        uptime: row.get("uptime"),
        updated_at: row.get("updated_at"),
    })
}
