//! Batch store contract and the SeaORM implementation

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

use shared::entity::{historical_klines, listing_analysis, symbols};
use shared::models::{DataStatus, Kline, TargetSymbol};

/// One write batch, committed as a single transaction by the queue's drain
/// loop.
#[derive(Debug)]
pub enum StoreBatch {
    /// Upsert monitored symbols (insert or refresh status/updated_at).
    Symbols(Vec<TargetSymbol>),
    /// Upsert the single analysis row for a symbol; the unique constraint on
    /// symbol_id makes the retry path an update with retry_count + 1.
    Listing {
        symbol_id: i64,
        listing_date: Option<i64>,
        status: DataStatus,
        error_message: Option<String>,
    },
    /// Idempotent candle insert: conflicting (symbol_id, open_time) rows are
    /// skipped, never an error.
    Klines { symbol_id: i64, klines: Vec<Kline> },
}

/// Prior analysis state read back by the pipeline.
#[derive(Debug, Clone)]
pub struct ListingRecord {
    pub listing_date: Option<i64>,
    pub data_status: String,
    pub retry_count: i32,
}

/// The storage collaborator as the pipeline sees it: one atomic commit per
/// batch plus the reads needed to make reruns idempotent.
#[async_trait]
pub trait CollectorStore: Send + Sync + 'static {
    /// Commit one batch atomically; returns rows written.
    async fn commit(&self, batch: StoreBatch) -> Result<u64>;

    async fn symbol_id(&self, symbol: &str) -> Result<Option<i64>>;

    async fn listing(&self, symbol_id: i64) -> Result<Option<ListingRecord>>;

    /// Open time of the newest stored candle, for resuming a partial
    /// backfill.
    async fn latest_open_time(&self, symbol_id: i64) -> Result<Option<i64>>;
}

pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Symbols the discovery step has queued for collection.
    pub async fn monitored_targets(&self) -> Result<Vec<TargetSymbol>> {
        let rows = symbols::Entity::find()
            .filter(symbols::Column::Status.eq("monitoring"))
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| TargetSymbol {
                symbol: row.symbol,
                base_asset: row.base_asset,
                quote_asset: row.quote_asset,
                listing_hint: None,
            })
            .collect())
    }
}

#[async_trait]
impl CollectorStore for SeaOrmStore {
    async fn commit(&self, batch: StoreBatch) -> Result<u64> {
        let txn = self.db.begin().await?;
        let written = match batch {
            StoreBatch::Symbols(targets) => {
                let now = Utc::now();
                let mut written = 0u64;
                for target in targets {
                    let row = symbols::ActiveModel {
                        symbol: ActiveValue::Set(target.symbol.clone()),
                        base_asset: ActiveValue::Set(target.base_asset.clone()),
                        quote_asset: ActiveValue::Set(target.quote_asset.clone()),
                        status: ActiveValue::Set("monitoring".to_string()),
                        created_at: ActiveValue::Set(now),
                        updated_at: ActiveValue::Set(now),
                        ..Default::default()
                    };
                    symbols::Entity::insert(row)
                        .on_conflict(
                            OnConflict::column(symbols::Column::Symbol)
                                .update_columns([symbols::Column::Status, symbols::Column::UpdatedAt])
                                .to_owned(),
                        )
                        .exec_without_returning(&txn)
                        .await?;
                    written += 1;
                }
                written
            }
            StoreBatch::Listing { symbol_id, listing_date, status, error_message } => {
                let row = listing_analysis::ActiveModel {
                    symbol_id: ActiveValue::Set(symbol_id),
                    listing_date: ActiveValue::Set(listing_date),
                    data_status: ActiveValue::Set(status.as_str().to_string()),
                    error_message: ActiveValue::Set(error_message),
                    analysis_date: ActiveValue::Set(Utc::now()),
                    retry_count: ActiveValue::Set(0),
                    ..Default::default()
                };
                listing_analysis::Entity::insert(row)
                    .on_conflict(
                        OnConflict::column(listing_analysis::Column::SymbolId)
                            .update_columns([
                                listing_analysis::Column::ListingDate,
                                listing_analysis::Column::DataStatus,
                                listing_analysis::Column::ErrorMessage,
                                listing_analysis::Column::AnalysisDate,
                            ])
                            .value(
                                listing_analysis::Column::RetryCount,
                                Expr::col(listing_analysis::Column::RetryCount).add(1),
                            )
                            .to_owned(),
                    )
                    .exec_without_returning(&txn)
                    .await?;
                1
            }
            StoreBatch::Klines { symbol_id, klines } => {
                if klines.is_empty() {
                    0
                } else {
                    let rows: Vec<historical_klines::ActiveModel> = klines
                        .iter()
                        .map(|k| historical_klines::ActiveModel {
                            symbol_id: ActiveValue::Set(symbol_id),
                            open_time: ActiveValue::Set(k.open_time),
                            close_time: ActiveValue::Set(k.close_time),
                            open_price: ActiveValue::Set(k.open),
                            high_price: ActiveValue::Set(k.high),
                            low_price: ActiveValue::Set(k.low),
                            close_price: ActiveValue::Set(k.close),
                            volume: ActiveValue::Set(k.volume),
                            quote_asset_volume: ActiveValue::Set(k.quote_volume),
                            number_of_trades: ActiveValue::Set(k.trade_count),
                            taker_buy_base_asset_volume: ActiveValue::Set(k.taker_buy_base_volume),
                            taker_buy_quote_asset_volume: ActiveValue::Set(k.taker_buy_quote_volume),
                            ..Default::default()
                        })
                        .collect();
                    historical_klines::Entity::insert_many(rows)
                        .on_conflict(
                            OnConflict::columns([
                                historical_klines::Column::SymbolId,
                                historical_klines::Column::OpenTime,
                            ])
                            .do_nothing()
                            .to_owned(),
                        )
                        .exec_without_returning(&txn)
                        .await?
                }
            }
        };
        txn.commit().await?;
        Ok(written)
    }

    async fn symbol_id(&self, symbol: &str) -> Result<Option<i64>> {
        let row = symbols::Entity::find()
            .filter(symbols::Column::Symbol.eq(symbol))
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.id))
    }

    async fn listing(&self, symbol_id: i64) -> Result<Option<ListingRecord>> {
        let row = listing_analysis::Entity::find()
            .filter(listing_analysis::Column::SymbolId.eq(symbol_id))
            .one(&self.db)
            .await?;
        Ok(row.map(|r| ListingRecord {
            listing_date: r.listing_date,
            data_status: r.data_status,
            retry_count: r.retry_count,
        }))
    }

    async fn latest_open_time(&self, symbol_id: i64) -> Result<Option<i64>> {
        let row = historical_klines::Entity::find()
            .filter(historical_klines::Column::SymbolId.eq(symbol_id))
            .order_by_desc(historical_klines::Column::OpenTime)
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.open_time))
    }
}
