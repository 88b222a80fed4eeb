//! Repository seams over the persistent store. Every method takes the
//! tenant id as a mandatory parameter: a query that cannot name its
//! merchant does not compile.

use async_trait::async_trait;
use thiserror::Error;

use boutiq_core::domain::customer::Customer;
use boutiq_core::domain::merchant::{Merchant, MerchantId, PhoneNumberId};
use boutiq_core::domain::order::{Order, OrderId, OrderStatus};
use boutiq_core::domain::product::{Product, ProductId};
use boutiq_core::domain::session::ConversationSession;
use boutiq_core::errors::DomainError;

pub mod customer;
pub mod memory;
pub mod merchant;
pub mod order;
pub mod product;
mod row;
pub mod session;
pub mod usage;

pub use customer::SqlCustomerRepository;
pub use memory::{
    InMemoryCustomerRepository, InMemoryMerchantRepository, InMemoryMessageUsageRepository,
    InMemoryOrderRepository, InMemoryProductRepository, InMemorySessionRepository,
};
pub use merchant::SqlMerchantRepository;
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;
pub use session::SqlSessionRepository;
pub use usage::SqlMessageUsageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[async_trait]
pub trait MerchantRepository: Send + Sync {
    /// Tenant resolution for inbound traffic: only active merchants are
    /// addressable.
    async fn find_active_by_phone_number_id(
        &self,
        phone_number_id: &PhoneNumberId,
    ) -> Result<Option<Merchant>, RepositoryError>;

    async fn find_by_id(&self, id: &MerchantId) -> Result<Option<Merchant>, RepositoryError>;

    async fn save(&self, merchant: Merchant) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_available(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn find_by_id(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn search(
        &self,
        merchant_id: &MerchantId,
        query: &str,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn count_for_merchant(&self, merchant_id: &MerchantId) -> Result<u32, RepositoryError>;

    async fn save(&self, product: Product) -> Result<(), RepositoryError>;

    /// Guarded conditional stock decrement. Returns the quantity actually
    /// claimed, clamped to what was in stock: `0` when the product is
    /// missing, unavailable, or sold out. Stock never goes negative and a
    /// unit is never granted twice, even under concurrent claims.
    async fn claim_stock(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
        requested: u32,
    ) -> Result<u32, RepositoryError>;

    /// Returns previously claimed units to stock, e.g. when the order
    /// write that motivated the claim did not go through.
    async fn release_stock(
        &self,
        merchant_id: &MerchantId,
        id: &ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_whatsapp_number(
        &self,
        merchant_id: &MerchantId,
        whatsapp_number: &str,
    ) -> Result<Option<Customer>, RepositoryError>;

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_active(
        &self,
        merchant_id: &MerchantId,
        customer_id: &boutiq_core::domain::customer::CustomerId,
    ) -> Result<Option<ConversationSession>, RepositoryError>;

    async fn save(&self, session: ConversationSession) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        merchant_id: &MerchantId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    async fn list_for_merchant(
        &self,
        merchant_id: &MerchantId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Loads, applies the forward-only domain transition, and persists
    /// the new status. Invalid transitions surface as domain errors.
    async fn update_status(
        &self,
        merchant_id: &MerchantId,
        id: &OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError>;
}

#[async_trait]
pub trait MessageUsageRepository: Send + Sync {
    /// Assistant replies already sent for the given `YYYY-MM` bucket.
    async fn assistant_messages_for_month(
        &self,
        merchant_id: &MerchantId,
        month: &str,
    ) -> Result<u32, RepositoryError>;

    async fn record_assistant_message(
        &self,
        merchant_id: &MerchantId,
        month: &str,
    ) -> Result<(), RepositoryError>;
}
