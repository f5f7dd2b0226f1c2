use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DiscountCode, Money, NewDiscountCode},
    helpers::discount_amount,
    traits::EngineError,
};

pub async fn insert_discount_code(
    code: NewDiscountCode,
    conn: &mut SqliteConnection,
) -> Result<DiscountCode, EngineError> {
    let code: DiscountCode = sqlx::query_as(
        r#"
            INSERT INTO discount_codes
                (code, kind, value, min_order, max_discount, usage_limit, starts_at, ends_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(code.code.to_uppercase())
    .bind(code.kind)
    .bind(code.value)
    .bind(code.min_order)
    .bind(code.max_discount)
    .bind(code.usage_limit)
    .bind(code.starts_at)
    .bind(code.ends_at)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Discount code {} created", code.code);
    Ok(code)
}

pub async fn fetch_discount_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<DiscountCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM discount_codes WHERE code = $1").bind(code.to_uppercase()).fetch_optional(conn).await
}

/// Validates the code against `subtotal` and records one use of it. Client-supplied discount amounts are never
/// trusted; the amount returned here is the only one applied.
///
/// The usage counter is bumped with a conditional update, so a code with a usage limit cannot be over-redeemed by
/// concurrent checkouts.
pub async fn redeem_discount_code(
    code: &str,
    subtotal: Money,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(DiscountCode, Money), EngineError> {
    let discount = fetch_discount_code(code, &mut *conn)
        .await?
        .ok_or_else(|| EngineError::DiscountRejected(format!("Code {code} does not exist")))?;
    let amount = discount_amount(&discount, subtotal, now).map_err(EngineError::DiscountRejected)?;
    let result = sqlx::query(
        r#"
            UPDATE discount_codes SET used_count = used_count + 1
            WHERE id = $1 AND active AND (usage_limit IS NULL OR used_count < usage_limit)
        "#,
    )
    .bind(discount.id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(EngineError::DiscountRejected(format!("Code {} has been used up", discount.code)));
    }
    debug!("🗃️ Discount code {} applied for {amount}", discount.code);
    Ok((discount, amount))
}
