//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "historical_klines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub symbol_id: i64,
    /// Bucket open, epoch milliseconds. Unique together with symbol_id.
    pub open_time: i64,
    pub close_time: i64,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub open_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub high_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub low_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub close_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub volume: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub quote_asset_volume: Decimal,
    pub number_of_trades: i64,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub taker_buy_base_asset_volume: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub taker_buy_quote_asset_volume: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::symbols::Entity",
        from = "Column::SymbolId",
        to = "super::symbols::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Symbols,
}

impl Related<super::symbols::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Symbols.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
