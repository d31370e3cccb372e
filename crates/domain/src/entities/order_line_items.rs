use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::order_line_items;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = order_line_items)]
pub struct OrderLineItemEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub label: String,
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = order_line_items)]
pub struct InsertOrderLineItemEntity {
    pub order_id: Uuid,
    pub label: String,
    pub amount_minor: i64,
}
