use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use shopkeep_engine::{
    db_types::{Invoice, InvoiceStatus, Order, OrderNumber, Product},
    EngineError,
};

use crate::support::Shop;

#[derive(Default, World)]
pub struct ShopWorld {
    pub system: Option<Shop>,
    /// Products by SKU
    pub products: HashMap<String, Product>,
    /// Orders by the name a scenario gave them
    pub orders: HashMap<String, OrderNumber>,
    /// The merchant reference of the last payment started for each named order
    pub attempts: HashMap<String, String>,
    pub last_error: Option<EngineError>,
}

impl Debug for ShopWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShopWorld ({} products, {} orders)", self.products.len(), self.orders.len())
    }
}

impl ShopWorld {
    pub fn shop(&self) -> &Shop {
        self.system.as_ref().expect("Shop not initialised. Start the scenario with 'a fresh install'")
    }

    pub fn product(&self, sku: &str) -> &Product {
        self.products.get(sku).unwrap_or_else(|| panic!("No product with SKU {sku} in this scenario"))
    }

    pub fn order_number(&self, name: &str) -> &OrderNumber {
        self.orders.get(name).unwrap_or_else(|| panic!("No order called {name} in this scenario"))
    }

    pub async fn order(&self, name: &str) -> Order {
        let number = self.order_number(name);
        self.shop().orders.fetch_order(number).await.expect("Error fetching order")
    }

    /// The invoice a customer of the named order should pay next.
    pub async fn open_invoice(&self, name: &str) -> Invoice {
        let number = self.order_number(name);
        let invoices = self.shop().invoices.invoices_for_order(number).await.expect("Error fetching invoices");
        invoices
            .into_iter()
            .find(|i| i.status == InvoiceStatus::Unpaid)
            .unwrap_or_else(|| panic!("Order {name} has no unpaid invoice"))
    }
}
