use cucumber::given;
use shopkeep_engine::test_utils::fixtures::{preorder_product, stocked_product};

use crate::{cucumber::ShopWorld, support::Shop};

#[given("a fresh install")]
async fn fresh_database(world: &mut ShopWorld) {
    world.system = Some(Shop::new().await);
}

#[given(expr = "a product '{word}' priced at {int} with {int} in stock")]
async fn regular_product(world: &mut ShopWorld, sku: String, price: i64, stock: i64) {
    let product = stocked_product(&world.shop().db, &sku, price, stock).await;
    world.products.insert(sku, product);
}

#[given(expr = "a pre-order product '{word}' priced at {int} with a {int}% deposit")]
async fn pre_order_product(world: &mut ShopWorld, sku: String, price: i64, deposit: u32) {
    let product = preorder_product(&world.shop().db, &sku, price, 10, Some(deposit)).await;
    world.products.insert(sku, product);
}
