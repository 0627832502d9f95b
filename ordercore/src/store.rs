//! Store traits the engine is generic over.
//!
//! Adapters implement all three traits on a single store type (see the
//! `ordercore-memory` and `ordercore-postgres` crates). The atomicity
//! requirements called out on individual methods are the adapter's
//! responsibility: the in-memory store serializes them behind one write
//! lock, the postgres store uses unique constraints and upserts.

use async_trait::async_trait;

use crate::catalog::{
    CatalogListing, CatalogQuery, Parameter, Product, ProductInfo, ProductParameter, Shop,
};
use crate::contact::Contact;
use crate::errors::StoreResult;
use crate::order::{Order, OrderItem, OrderState};
use crate::types::{ContactId, OrderId, ProductId, ProductInfoId, Quantity, ShopId, UserId};

/// Read-only access to the catalog.
///
/// Catalog writes happen through external import tooling, so the engine
/// never mutates it.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Looks up a shop listing by id.
    async fn product_info(&self, id: ProductInfoId) -> StoreResult<Option<ProductInfo>>;

    /// Looks up a product by id.
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    /// Looks up a shop by id.
    async fn shop(&self, id: ShopId) -> StoreResult<Option<Shop>>;

    /// Browses listings joined with product and shop data, filtered,
    /// searched and sorted per the query.
    async fn search(&self, query: &CatalogQuery) -> StoreResult<Vec<CatalogListing>>;

    /// All named product characteristics, sorted by name.
    async fn parameters(&self) -> StoreResult<Vec<Parameter>>;

    /// Parameter values recorded on one listing.
    async fn parameter_values(
        &self,
        product_info: ProductInfoId,
    ) -> StoreResult<Vec<ProductParameter>>;
}

/// Persistence for orders and their items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns the user's open basket, creating one if none exists.
    ///
    /// Must be atomic per user: concurrent calls never produce two baskets.
    async fn get_or_create_basket(&self, user: UserId) -> StoreResult<Order>;

    /// Returns the user's open basket without creating one.
    async fn find_basket(&self, user: UserId) -> StoreResult<Option<Order>>;

    /// Looks up any order by id, basket included.
    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    /// Lists the user's confirmed orders (basket excluded), newest first.
    async fn list_confirmed(&self, user: UserId) -> StoreResult<Vec<Order>>;

    /// All line items of an order.
    async fn items(&self, order: OrderId) -> StoreResult<Vec<OrderItem>>;

    /// The line for one listing within an order, if present.
    async fn find_item(&self, order: OrderId, product_info: ProductInfoId)
        -> StoreResult<Option<OrderItem>>;

    /// Adds `quantity` of a listing to an order, merging into an existing
    /// line when one exists. Must be atomic: a concurrent merge on the same
    /// line never loses an increment. Returns the post-merge line.
    async fn merge_item(
        &self,
        order: OrderId,
        product_info: ProductInfoId,
        quantity: Quantity,
    ) -> StoreResult<OrderItem>;

    /// Deletes the line for one listing; returns whether a line was there.
    async fn remove_item(&self, order: OrderId, product_info: ProductInfoId) -> StoreResult<bool>;

    /// Deletes an order and any remaining items.
    async fn delete_order(&self, id: OrderId) -> StoreResult<()>;

    /// Attaches the contact and moves the order to [`OrderState::New`] in
    /// one step.
    async fn confirm_basket(&self, id: OrderId, contact: ContactId) -> StoreResult<Order>;

    /// Persists a new state on an order, returning the updated header.
    async fn set_state(&self, id: OrderId, state: OrderState) -> StoreResult<Order>;
}

/// Persistence for shipping contacts.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Stores a new contact.
    async fn insert_contact(&self, contact: Contact) -> StoreResult<Contact>;

    /// Looks up a contact by id, regardless of owner.
    async fn find_contact(&self, id: ContactId) -> StoreResult<Option<Contact>>;

    /// All contacts owned by a user.
    async fn contacts_for(&self, owner: UserId) -> StoreResult<Vec<Contact>>;

    /// Overwrites a contact. The caller has already checked ownership.
    async fn update_contact(&self, contact: Contact) -> StoreResult<Contact>;

    /// Deletes a contact by id. Fails with a missing-row error when no
    /// such contact exists.
    async fn delete_contact(&self, id: ContactId) -> StoreResult<()>;
}
