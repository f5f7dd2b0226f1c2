//! Products and the stock pair (`stock`, `reserved_qty`).
//!
//! All stock arithmetic is a single conditional `UPDATE`, so two transactions racing for the last unit cannot both
//! win: the loser's update matches zero rows.
use chrono::Utc;
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewProduct, PreOrderConfig, Product},
    traits::EngineError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, EngineError> {
    if product.stock < 0 {
        return Err(EngineError::Validation("Stock cannot be negative".into()));
    }
    let now = Utc::now();
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (sku, name, price, cost_price, weight_grams, stock, preorder, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(product.sku)
    .bind(product.name)
    .bind(product.price)
    .bind(product.cost_price)
    .bind(product.weight_grams)
    .bind(product.stock)
    .bind(product.preorder.map(Json))
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product {} ({}) created with id {}", product.sku, product.name, product.id);
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_product_by_sku(sku: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE sku = $1").bind(sku).fetch_optional(conn).await
}

/// Holds `quantity` units of a product, but only if `stock - reserved_qty >= quantity`.
///
/// Returns [`EngineError::SoldOut`] when there is not enough available stock.
pub async fn reserve_stock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<(), EngineError> {
    let result = sqlx::query(
        r#"
            UPDATE products SET reserved_qty = reserved_qty + $1, updated_at = $2
            WHERE id = $3 AND stock - reserved_qty >= $1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 1 {
        trace!("🗃️ Reserved {quantity} units of product {product_id}");
        return Ok(());
    }
    let product = fetch_product(product_id, conn).await?.ok_or(EngineError::ProductNotFound(product_id))?;
    debug!("🗃️ Product {product_id} has {} available. Cannot reserve {quantity}.", product.available());
    Err(EngineError::SoldOut { product_id, requested: quantity, available: product.available().max(0) })
}

/// Converts a reservation into a permanent deduction. Returns false if fewer than `quantity` units were reserved.
pub async fn commit_reserved_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE products SET stock = stock - $1, reserved_qty = reserved_qty - $1, updated_at = $2
            WHERE id = $3 AND reserved_qty >= $1 AND stock >= $1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Gives reserved units back to the available pool. Returns false if fewer than `quantity` units were reserved.
pub async fn release_reserved_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE products SET reserved_qty = reserved_qty - $1, updated_at = $2
            WHERE id = $3 AND reserved_qty >= $1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Puts units back on the shelf, e.g. when an order whose stock was already deducted is cancelled.
pub async fn restock(product_id: i64, quantity: i64, conn: &mut SqliteConnection) -> Result<Product, EngineError> {
    if quantity <= 0 {
        return Err(EngineError::Validation(format!("Cannot restock {quantity} units")));
    }
    let product: Option<Product> =
        sqlx::query_as("UPDATE products SET stock = stock + $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(quantity)
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    product.ok_or(EngineError::ProductNotFound(product_id))
}

pub async fn set_preorder_config(
    product_id: i64,
    config: Option<PreOrderConfig>,
    conn: &mut SqliteConnection,
) -> Result<Product, EngineError> {
    let product: Option<Product> =
        sqlx::query_as("UPDATE products SET preorder = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(config.map(Json))
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    product.ok_or(EngineError::ProductNotFound(product_id))
}
