use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Symbols under monitoring, written once per discovered pair
        manager
            .create_table(
                Table::create()
                    .table(Symbols::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Symbols::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Symbols::Symbol).string().not_null().unique_key())
                    .col(ColumnDef::new(Symbols::BaseAsset).string().not_null())
                    .col(ColumnDef::new(Symbols::QuoteAsset).string().not_null())
                    .col(ColumnDef::new(Symbols::Status).string().not_null().default("monitoring"))
                    .col(ColumnDef::new(Symbols::CreatedAt).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Symbols::UpdatedAt).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .to_owned(),
            )
            .await?;

        // Listing analysis outcome, exactly one row per symbol
        manager
            .create_table(
                Table::create()
                    .table(ListingAnalysis::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ListingAnalysis::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(ListingAnalysis::SymbolId).big_integer().not_null())
                    .col(ColumnDef::new(ListingAnalysis::ListingDate).big_integer().null()) // epoch ms
                    .col(ColumnDef::new(ListingAnalysis::DataStatus).string().not_null().default("pending"))
                    .col(ColumnDef::new(ListingAnalysis::ErrorMessage).text().null())
                    .col(ColumnDef::new(ListingAnalysis::AnalysisDate).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(ListingAnalysis::RetryCount).integer().not_null().default(0))
                    .index(
                        Index::create()
                            .name("idx_listing_analysis_symbol")
                            .table(ListingAnalysis::Table)
                            .col(ListingAnalysis::SymbolId)
                            .unique()
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listing_analysis_symbol")
                            .from(ListingAnalysis::Table, ListingAnalysis::SymbolId)
                            .to(Symbols::Table, Symbols::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await?;

        // Minute candles, insert-only, unique per (symbol_id, open_time)
        manager
            .create_table(
                Table::create()
                    .table(HistoricalKlines::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(HistoricalKlines::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(HistoricalKlines::SymbolId).big_integer().not_null())
                    .col(ColumnDef::new(HistoricalKlines::OpenTime).big_integer().not_null())
                    .col(ColumnDef::new(HistoricalKlines::CloseTime).big_integer().not_null())
                    .col(ColumnDef::new(HistoricalKlines::OpenPrice).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(HistoricalKlines::HighPrice).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(HistoricalKlines::LowPrice).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(HistoricalKlines::ClosePrice).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(HistoricalKlines::Volume).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(HistoricalKlines::QuoteAssetVolume).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(HistoricalKlines::NumberOfTrades).big_integer().not_null())
                    .col(ColumnDef::new(HistoricalKlines::TakerBuyBaseAssetVolume).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(HistoricalKlines::TakerBuyQuoteAssetVolume).decimal_len(20, 8).not_null())
                    .index(
                        Index::create()
                            .name("idx_klines_symbol_open_time")
                            .table(HistoricalKlines::Table)
                            .col(HistoricalKlines::SymbolId)
                            .col(HistoricalKlines::OpenTime)
                            .unique()
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_klines_symbol")
                            .from(HistoricalKlines::Table, HistoricalKlines::SymbolId)
                            .to(Symbols::Table, Symbols::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HistoricalKlines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ListingAnalysis::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Symbols::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Symbols {
    Table,
    Id,
    Symbol,
    BaseAsset,
    QuoteAsset,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ListingAnalysis {
    Table,
    Id,
    SymbolId,
    ListingDate,
    DataStatus,
    ErrorMessage,
    AnalysisDate,
    RetryCount,
}

#[derive(DeriveIden)]
enum HistoricalKlines {
    Table,
    Id,
    SymbolId,
    OpenTime,
    CloseTime,
    OpenPrice,
    HighPrice,
    LowPrice,
    ClosePrice,
    Volume,
    QuoteAssetVolume,
    NumberOfTrades,
    TakerBuyBaseAssetVolume,
    TakerBuyQuoteAssetVolume,
}
