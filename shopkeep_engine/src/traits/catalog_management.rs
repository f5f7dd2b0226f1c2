use crate::{
    db_types::{DiscountCode, NewDiscountCode, NewProduct, PreOrderConfig, Product},
    traits::EngineError,
};

/// The slice of the catalog the engine needs: products with their stock pair, and discount codes.
///
/// Catalog editing proper happens elsewhere. These methods exist so that the engine can be seeded and so that stock
/// can be received into the warehouse.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn create_product(&self, product: NewProduct) -> Result<Product, EngineError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, EngineError>;

    async fn fetch_product_by_sku(&self, sku: &str) -> Result<Option<Product>, EngineError>;

    /// Adds `quantity` units to the physical stock of a product.
    async fn receive_stock(&self, product_id: i64, quantity: i64) -> Result<Product, EngineError>;

    /// Turns a product into a pre-order product (`Some`) or back into a regular one (`None`).
    async fn set_preorder_config(
        &self,
        product_id: i64,
        config: Option<PreOrderConfig>,
    ) -> Result<Product, EngineError>;

    async fn create_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode, EngineError>;

    async fn fetch_discount_code(&self, code: &str) -> Result<Option<DiscountCode>, EngineError>;
}
