// =================================================================
// data/repository.rs - Relational Constraint Storage (PostgreSQL)
// =================================================================

use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{info, warn};

use super::snapshot::ExchangeSnapshot;
use super::types::{CoinConstraint, DataError, ExchangeName, PairConstraint};

/// Tables used by [`ConstraintRepository`]
pub const SCHEMA: [&str; 2] = [COIN_TABLE, PAIR_TABLE];

const COIN_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS coin_constraint (
    exchange      TEXT             NOT NULL,
    coin_id       INTEGER          NOT NULL,
    ex_symbol     TEXT             NOT NULL,
    tx_fee        DOUBLE PRECISION NOT NULL DEFAULT 0,
    withdraw      BOOLEAN          NOT NULL DEFAULT FALSE,
    deposit       BOOLEAN          NOT NULL DEFAULT FALSE,
    confirmation  INTEGER          NOT NULL DEFAULT 0,
    PRIMARY KEY (exchange, coin_id)
)"#;

const PAIR_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS pair_constraint (
    exchange      TEXT             NOT NULL,
    pair_id       INTEGER          NOT NULL,
    ex_symbol     TEXT             NOT NULL,
    taker_fee     DOUBLE PRECISION NOT NULL DEFAULT 0,
    maker_fee     DOUBLE PRECISION NOT NULL DEFAULT 0,
    lot_size      DOUBLE PRECISION NOT NULL DEFAULT 0,
    price_filter  DOUBLE PRECISION NOT NULL DEFAULT 0,
    PRIMARY KEY (exchange, pair_id)
)"#;

/// Connection settings for the relational store
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub url: String,
    pub max_connections: u32,
}

/// Reads and writes exchange constraints in PostgreSQL
#[derive(Debug, Clone)]
pub struct ConstraintRepository {
    pool: PgPool,
}

impl ConstraintRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a repository whose pool connects on first use
    pub fn connect_lazy(options: &DatabaseOptions) -> Result<Self, DataError> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .connect_lazy(&options.url)?;
        Ok(Self::new(pool))
    }

    pub async fn ensure_schema(&self) -> Result<(), DataError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn load_coin_constraints(
        &self,
        exchange: ExchangeName,
    ) -> Result<Vec<CoinConstraint>, DataError> {
        let rows = sqlx::query(
            r#"SELECT coin_id, ex_symbol, tx_fee, withdraw, deposit, confirmation
               FROM coin_constraint WHERE exchange = $1 ORDER BY coin_id"#,
        )
        .bind(exchange.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(|row| coin_from_row(exchange, row)).collect())
    }

    pub async fn load_pair_constraints(
        &self,
        exchange: ExchangeName,
    ) -> Result<Vec<PairConstraint>, DataError> {
        let rows = sqlx::query(
            r#"SELECT pair_id, ex_symbol, taker_fee, maker_fee, lot_size, price_filter
               FROM pair_constraint WHERE exchange = $1 ORDER BY pair_id"#,
        )
        .bind(exchange.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(|row| pair_from_row(exchange, row)).collect())
    }

    /// Upsert every record of `snapshot` in one transaction
    pub async fn save_snapshot(&self, snapshot: &ExchangeSnapshot) -> Result<(), DataError> {
        let exchange = snapshot.exchange.as_str();
        let mut tx = self.pool.begin().await?;

        for cc in snapshot.coin_constraint.values() {
            sqlx::query(
                r#"INSERT INTO coin_constraint
                       (exchange, coin_id, ex_symbol, tx_fee, withdraw, deposit, confirmation)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (exchange, coin_id) DO UPDATE SET
                       ex_symbol = EXCLUDED.ex_symbol,
                       tx_fee = EXCLUDED.tx_fee,
                       withdraw = EXCLUDED.withdraw,
                       deposit = EXCLUDED.deposit,
                       confirmation = EXCLUDED.confirmation"#,
            )
            .bind(exchange)
            .bind(cc.coin_id as i32)
            .bind(&cc.ex_symbol)
            .bind(cc.tx_fee)
            .bind(cc.withdraw)
            .bind(cc.deposit)
            .bind(cc.confirmation as i32)
            .execute(&mut *tx)
            .await?;
        }

        for pc in snapshot.pair_constraint.values() {
            sqlx::query(
                r#"INSERT INTO pair_constraint
                       (exchange, pair_id, ex_symbol, taker_fee, maker_fee, lot_size, price_filter)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (exchange, pair_id) DO UPDATE SET
                       ex_symbol = EXCLUDED.ex_symbol,
                       taker_fee = EXCLUDED.taker_fee,
                       maker_fee = EXCLUDED.maker_fee,
                       lot_size = EXCLUDED.lot_size,
                       price_filter = EXCLUDED.price_filter"#,
            )
            .bind(exchange)
            .bind(pc.pair_id as i32)
            .bind(&pc.ex_symbol)
            .bind(pc.taker_fee)
            .bind(pc.maker_fee)
            .bind(pc.lot_size)
            .bind(pc.price_filter)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "Stored {} constraints: {} coins, {} pairs",
            exchange,
            snapshot.coin_constraint.len(),
            snapshot.pair_constraint.len()
        );
        Ok(())
    }
}

fn coin_from_row(exchange: ExchangeName, row: &PgRow) -> Option<CoinConstraint> {
    let coin_id: i32 = row.get("coin_id");
    let confirmation: i32 = row.get("confirmation");
    let Some(coin_id) = non_negative(coin_id) else {
        warn!("{}: skipping coin_constraint row with negative id {}", exchange, coin_id);
        return None;
    };
    Some(CoinConstraint {
        coin_id,
        ex_symbol: row.get("ex_symbol"),
        tx_fee: row.get("tx_fee"),
        withdraw: row.get("withdraw"),
        deposit: row.get("deposit"),
        confirmation: non_negative(confirmation).unwrap_or(0),
    })
}

fn pair_from_row(exchange: ExchangeName, row: &PgRow) -> Option<PairConstraint> {
    let pair_id: i32 = row.get("pair_id");
    let Some(pair_id) = non_negative(pair_id) else {
        warn!("{}: skipping pair_constraint row with negative id {}", exchange, pair_id);
        return None;
    };
    Some(PairConstraint {
        pair_id,
        ex_symbol: row.get("ex_symbol"),
        taker_fee: row.get("taker_fee"),
        maker_fee: row.get("maker_fee"),
        lot_size: row.get("lot_size"),
        price_filter: row.get("price_filter"),
    })
}

fn non_negative(value: i32) -> Option<u32> {
    u32::try_from(value).ok()
}
