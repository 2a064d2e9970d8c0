use sea_orm::entity::prelude::*;

/// Ephemeral event log driving push notifications and late-subscriber
/// catch-up. Never authoritative; the terminal_displays row is the truth.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "broadcast_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub terminal_id: Uuid,
    pub event_type: String,
    pub order_id: Option<Uuid>,
    pub payload: Option<Json>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
