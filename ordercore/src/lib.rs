//! `ordercore` - order-management backend core
//!
//! This library implements the basket/order engine of an e-commerce
//! backend: a single mutable basket per user, inventory-aware item adds,
//! the one-time basket-to-order confirmation, and the staff-gated order
//! state machine, together with the read-mostly catalog and the per-user
//! contact directory the engine draws on.
//!
//! Persistence and notification delivery are pluggable: the engine is
//! generic over the store traits in [`store`] and the dispatcher trait in
//! [`notify`]. The `ordercore-memory` crate provides a thread-safe
//! in-memory store for tests and development, `ordercore-postgres` the
//! production adapter.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod catalog;
pub mod contact;
pub mod engine;
pub mod errors;
pub mod notify;
pub mod order;
pub mod store;
pub mod types;
pub mod views;

pub use auth::{AuthError, Authenticator, Credentials, Principal};
pub use catalog::{
    CatalogListing, CatalogQuery, CatalogSort, Category, Parameter, Product, ProductInfo,
    ProductName, ProductParameter, Shop,
};
pub use contact::{Contact, ContactUpdate, NewContact};
pub use engine::OrderEngine;
pub use errors::{ErrorClass, OrderError, OrderResult, StoreError, StoreResult};
pub use notify::{DispatchError, Notification, NotificationDispatcher, NotificationKind};
pub use order::{Order, OrderItem, OrderState, UnknownOrderState};
pub use store::{CatalogStore, ContactStore, OrderStore};
pub use types::{
    CategoryId, ContactId, DiscountPercent, Money, MoneyError, OrderId, ParameterId, ProductId,
    ProductInfoId, Quantity, ShopId, Timestamp, UserId,
};
pub use views::{BasketView, ListingParameter, OrderLine, OrderView};
