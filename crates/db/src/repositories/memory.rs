use std::collections::HashMap;

use tokio::sync::RwLock;

use boutiq_core::domain::customer::{Customer, CustomerId};
use boutiq_core::domain::merchant::{Merchant, MerchantId, PhoneNumberId};
use boutiq_core::domain::order::{Order, OrderId, OrderStatus};
use boutiq_core::domain::product::{Product, ProductId};
use boutiq_core::domain::session::ConversationSession;

use super::{
    CustomerRepository, MerchantRepository, MessageUsageRepository, OrderRepository,
    ProductRepository, RepositoryError, SessionRepository,
};

#[derive(Default)]
pub struct InMemoryMerchantRepository {
    merchants: RwLock<HashMap<String, Merchant>>,
}

#[async_trait::async_trait]
impl MerchantRepository for InMemoryMerchantRepository {
    async fn find_active_by_phone_number_id(
        &self,
        phone_number_id: &PhoneNumberId,
    ) -> Result<Option<Merchant>, RepositoryError> {
        let merchants = self.merchants.read().await;
        Ok(merchants
            .values()
            .find(|m| m.phone_number_id == *phone_number_id && m.is_active)
            .cloned())
    }

    async fn find_by_id(&self, id: &MerchantId) -> Result<Option<Merchant>, RepositoryError> {
        let merchants = self.merchants.read().await;
        Ok(merchants.get(&id.0).cloned())
    }

    async fn save(&self, merchant: Merchant) -> Result<(), RepositoryError> {
        let mut merchants = self.merchants.write().await;
        merchants.insert(merchant.id.0.clone(), merchant);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<(String, String), Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list_available(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut listed: Vec<Product> = products
            .values()
            .filter(|p| p.merchant_id == *merchant_id && p.is_available && p.stock > 0)
            .cloned()
            .collect();
        listed.sort_by(|a, b| (a.category.as_str(), a.name.as_str())
            .cmp(&(b.category.as_str(), b.name.as_str())));
        Ok(listed)
    }

    async fn find_by_id(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&(merchant_id.0.clone(), id.0.clone())).cloned())
    }

    async fn search(
        &self,
        merchant_id: &MerchantId,
        query: &str,
    ) -> Result<Vec<Product>, RepositoryError> {
        let needle = query.to_lowercase();
        let products = self.products.read().await;
        Ok(products
            .values()
            .filter(|p| {
                p.merchant_id == *merchant_id
                    && p.is_available
                    && (p.name.to_lowercase().contains(&needle)
                        || p.description.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }

    async fn count_for_merchant(&self, merchant_id: &MerchantId) -> Result<u32, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.values().filter(|p| p.merchant_id == *merchant_id).count() as u32)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert((product.merchant_id.0.clone(), product.id.0.clone()), product);
        Ok(())
    }

    async fn claim_stock(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
        requested: u32,
    ) -> Result<u32, RepositoryError> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&(merchant_id.0.clone(), id.0.clone())) else {
            return Ok(0);
        };
        if !product.is_available || product.stock == 0 {
            return Ok(0);
        }
        let claimed = requested.min(product.stock);
        product.stock -= claimed;
        product.is_available = product.stock > 0;
        Ok(claimed)
    }

    async fn release_stock(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        if quantity == 0 {
            return Ok(());
        }
        let mut products = self.products.write().await;
        if let Some(product) = products.get_mut(&(merchant_id.0.clone(), id.0.clone())) {
            product.stock += quantity;
            product.is_available = true;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_whatsapp_number(
        &self,
        merchant_id: &MerchantId,
        whatsapp_number: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers
            .values()
            .find(|c| c.merchant_id == *merchant_id && c.whatsapp_number == whatsapp_number)
            .cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_active(
        &self,
        merchant_id: &MerchantId,
        customer_id: &CustomerId,
    ) -> Result<Option<ConversationSession>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| {
                s.merchant_id == *merchant_id && s.customer_id == *customer_id && s.is_active
            })
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn save(&self, session: ConversationSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.0.clone(), session);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    async fn find_by_id(
        &self,
        merchant_id: &MerchantId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).filter(|o| o.merchant_id == *merchant_id).cloned())
    }

    async fn list_for_merchant(
        &self,
        merchant_id: &MerchantId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut listed: Vec<Order> = orders
            .values()
            .filter(|o| o.merchant_id == *merchant_id)
            .filter(|o| status.map_or(true, |wanted| o.status == wanted))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn update_status(
        &self,
        merchant_id: &MerchantId,
        id: &OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id.0)
            .filter(|o| o.merchant_id == *merchant_id)
            .ok_or_else(|| RepositoryError::Decode(format!("order `{}` not found", id.0)))?;
        order.transition_to(next)?;
        Ok(order.clone())
    }
}

#[derive(Default)]
pub struct InMemoryMessageUsageRepository {
    counters: RwLock<HashMap<(String, String), u32>>,
}

#[async_trait::async_trait]
impl MessageUsageRepository for InMemoryMessageUsageRepository {
    async fn assistant_messages_for_month(
        &self,
        merchant_id: &MerchantId,
        month: &str,
    ) -> Result<u32, RepositoryError> {
        let counters = self.counters.read().await;
        Ok(counters
            .get(&(merchant_id.0.clone(), month.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn record_assistant_message(
        &self,
        merchant_id: &MerchantId,
        month: &str,
    ) -> Result<(), RepositoryError> {
        let mut counters = self.counters.write().await;
        *counters
            .entry((merchant_id.0.clone(), month.to_string()))
            .or_insert(0) += 1;
        Ok(())
    }
}
