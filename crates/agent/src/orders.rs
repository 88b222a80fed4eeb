use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use boutiq_core::domain::customer::Customer;
use boutiq_core::domain::merchant::{Merchant, MerchantId};
use boutiq_core::domain::order::{
    generate_order_number, Order, OrderId, OrderLine, OrderStatus, PaymentStatus,
};
use boutiq_core::domain::product::ProductId;
use boutiq_db::repositories::{
    CustomerRepository, OrderRepository, ProductRepository, RepositoryError,
};

const DEFAULT_PAYMENT_METHOD: &str = "mobile_money";

/// Turns a cart into a persisted order. The cart is advisory: every
/// quantity is clamped to what the guarded stock claim actually grants,
/// and lines that claim nothing are dropped.
pub struct OrderWriter {
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    customers: Arc<dyn CustomerRepository>,
}

impl OrderWriter {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        customers: Arc<dyn CustomerRepository>,
    ) -> Self {
        Self { products, orders, customers }
    }

    /// Returns `None` without writing anything when the cart is empty or
    /// no line survives the stock claim.
    pub async fn create_order_from_cart(
        &self,
        merchant: &Merchant,
        customer: &mut Customer,
        cart: &BTreeMap<ProductId, u32>,
        delivery_address: &str,
        payment_method: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        if cart.is_empty() {
            return Ok(None);
        }

        let mut items = Vec::new();
        let mut total_amount = Decimal::ZERO;

        for (product_id, requested) in cart {
            let Some(product) = self.products.find_by_id(&merchant.id, product_id).await? else {
                warn!(
                    event_name = "order.line.skipped",
                    merchant_id = %merchant.id.0,
                    product_id = %product_id.0,
                    "cart references an unknown product"
                );
                continue;
            };
            if !product.is_available {
                continue;
            }

            let claimed = self.products.claim_stock(&merchant.id, product_id, *requested).await?;
            if claimed == 0 {
                continue;
            }

            let line_total = product.price * Decimal::from(claimed);
            total_amount += line_total;
            items.push(OrderLine {
                product_id: product_id.clone(),
                name: product.name,
                quantity: claimed,
                unit_price: product.price,
                total: line_total,
            });
        }

        if items.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId(uuid::Uuid::new_v4().to_string()),
            order_number: generate_order_number(now),
            merchant_id: merchant.id.clone(),
            customer_id: customer.id.clone(),
            items,
            total_amount,
            status: OrderStatus::Pending,
            delivery_address: delivery_address.to_string(),
            payment_method: if payment_method.is_empty() {
                DEFAULT_PAYMENT_METHOD.to_string()
            } else {
                payment_method.to_string()
            },
            payment_status: PaymentStatus::Pending,
            notes: String::new(),
            created_at: now,
        };
        // A failed insert would otherwise strand the claimed units.
        if let Err(error) = self.orders.insert(order.clone()).await {
            self.release_claims(&merchant.id, &order.items).await;
            return Err(error);
        }

        customer.total_orders += 1;
        customer.total_spent += total_amount;
        customer.last_order_at = Some(now);
        self.customers.save(customer.clone()).await?;

        info!(
            event_name = "order.created",
            merchant_id = %merchant.id.0,
            order_number = %order.order_number,
            line_count = order.items.len(),
            "order created from cart"
        );
        Ok(Some(order))
    }

    async fn release_claims(&self, merchant_id: &MerchantId, items: &[OrderLine]) {
        for line in items {
            if let Err(error) =
                self.products.release_stock(merchant_id, &line.product_id, line.quantity).await
            {
                warn!(
                    event_name = "order.stock_release_failed",
                    merchant_id = %merchant_id.0,
                    product_id = %line.product_id.0,
                    quantity = line.quantity,
                    %error,
                    "could not return claimed units after a failed order write"
                );
            }
        }
    }
}
