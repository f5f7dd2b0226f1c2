//! Ready-made catalog entries and checkout requests.
use crate::{
    db_types::{
        Address,
        DepositRule,
        Money,
        NewOrder,
        NewOrderItem,
        NewProduct,
        PaymentMethod,
        PreOrderConfig,
        Product,
    },
    traits::CatalogManagement,
};

pub fn customer_address() -> Address {
    Address {
        name: "Sari Wulandari".into(),
        email: Some("sari@example.com".into()),
        phone: Some("+6281200000000".into()),
        line1: "Jl. Melati 12".into(),
        line2: None,
        city: "Bandung".into(),
        province: Some("Jawa Barat".into()),
        postal_code: "40115".into(),
        country: "ID".into(),
    }
}

/// A product in stock, with a cost price of 60% of its selling price.
pub async fn stocked_product<B: CatalogManagement>(db: &B, sku: &str, price: i64, stock: i64) -> Product {
    let product = NewProduct::new(sku, sku, Money::from(price), stock)
        .with_cost_price(Money::from(price).percent(60))
        .with_weight(500);
    db.create_product(product).await.expect("Error creating product")
}

/// A pre-order product. `deposit_percent` overrides the store-wide deposit when given.
pub async fn preorder_product<B: CatalogManagement>(
    db: &B,
    sku: &str,
    price: i64,
    stock: i64,
    deposit_percent: Option<u32>,
) -> Product {
    let config = PreOrderConfig {
        deposit: deposit_percent.map(|percent| DepositRule::Percentage { percent }),
        balance_due_days: None,
        estimated_arrival: Some("next month".into()),
    };
    let product = NewProduct::new(sku, sku, Money::from(price), stock)
        .with_cost_price(Money::from(price).percent(60))
        .with_weight(1000)
        .as_preorder(config);
    db.create_product(product).await.expect("Error creating pre-order product")
}

/// An online order for `quantity` units of one product, paid by bank transfer, with free shipping.
pub fn order_for(user: Option<&str>, product_id: i64, quantity: i64) -> NewOrder {
    NewOrder::new(user.map(String::from), vec![NewOrderItem::new(product_id, quantity)], PaymentMethod::from("bca_va"))
        .with_shipping(customer_address(), Money::zero())
}
