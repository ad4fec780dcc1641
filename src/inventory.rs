use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::effective_price,
};

/// A store item row read under `FOR UPDATE`. Holding one of these means the
/// enclosing transaction owns the row lock until commit/rollback, so its
/// `stock` cannot go stale across the check-then-act gap.
#[derive(Debug, FromRow)]
pub struct LockedItem {
    pub id: Uuid,
    pub product_name: String,
    pub stock: i32,
    pub price: i64,
    pub discount_price: i64,
    pub is_active: bool,
}

impl LockedItem {
    pub fn effective_price(&self) -> i64 {
        effective_price(self.price, self.discount_price)
    }
}

/// Acquire an exclusive row lock on a store item and return its current
/// state. Tombstoned listings are invisible here.
pub async fn lock_item(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
) -> AppResult<Option<LockedItem>> {
    let item = sqlx::query_as::<_, LockedItem>(
        r#"
        SELECT si.id, p.name AS product_name, si.stock, si.price, si.discount_price, si.is_active
        FROM store_items si
        JOIN products p ON p.id = si.product_id
        WHERE si.id = $1 AND si.is_deleted = FALSE
        FOR UPDATE OF si
        "#,
    )
    .bind(item_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(item)
}

/// Decrement stock for a purchase. The caller must hold the row lock via
/// [`lock_item`]; the quantity is re-checked against the locked read.
pub async fn reserve(
    tx: &mut Transaction<'_, Postgres>,
    item: &LockedItem,
    quantity: i32,
) -> AppResult<()> {
    if quantity > item.stock {
        return Err(AppError::InsufficientStock {
            item: Some(item.product_name.clone()),
            available: item.stock as i64,
        });
    }

    sqlx::query("UPDATE store_items SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
        .bind(item.id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Return stock to a listing, e.g. when an order is cancelled. The UPDATE
/// itself takes the row lock.
pub async fn release(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    sqlx::query("UPDATE store_items SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(item_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
