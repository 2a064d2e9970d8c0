use sea_orm::entity::prelude::*;

/// Durable "what is this terminal showing right now" row, one per
/// (tenant_id, terminal_id). Upserted last-writer-wins; readers treat a
/// `show` row whose expiry has passed as idle.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "terminal_displays")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub terminal_id: Uuid,
    pub state: String,
    pub order_id: Option<Uuid>,
    pub amount: Option<i64>,
    pub reference: Option<String>,
    pub qr_code: Option<String>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
