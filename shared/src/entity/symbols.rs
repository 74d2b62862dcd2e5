//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "symbols")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub status: String, // "monitoring", "archived"
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::listing_analysis::Entity")]
    ListingAnalysis,
    #[sea_orm(has_many = "super::historical_klines::Entity")]
    HistoricalKlines,
}

impl Related<super::listing_analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ListingAnalysis.def()
    }
}

impl Related<super::historical_klines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HistoricalKlines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
