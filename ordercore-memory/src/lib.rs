//! In-memory adapter for the `ordercore` engine.
//!
//! This crate provides a thread-safe in-memory implementation of the
//! `CatalogStore`, `OrderStore` and `ContactStore` traits, useful for
//! tests and development scenarios where persistence is not required, plus
//! small notification dispatchers for asserting on dispatch behavior.
//!
//! Atomicity of `get_or_create_basket` and `merge_item` comes from taking
//! the single write lock for the whole operation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use ordercore::{
    CatalogListing, CatalogQuery, CatalogStore, Category, Contact, ContactStore, DispatchError,
    Notification, NotificationDispatcher, Order, OrderItem, OrderState, OrderStore, Parameter,
    Product, ProductInfo, ProductParameter, Shop, StoreError, StoreResult,
};
use ordercore::{
    CategoryId, ContactId, OrderId, ParameterId, ProductId, ProductInfoId, Quantity, ShopId,
    UserId,
};

#[derive(Debug, Default)]
struct State {
    shops: HashMap<ShopId, Shop>,
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    infos: HashMap<ProductInfoId, ProductInfo>,
    parameters: HashMap<ParameterId, Parameter>,
    product_parameters: Vec<ProductParameter>,
    contacts: HashMap<ContactId, Contact>,
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
}

/// Thread-safe in-memory store implementing all three store traits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a shop.
    pub fn insert_shop(&self, shop: Shop) {
        let mut state = self.state.write().expect("RwLock poisoned");
        state.shops.insert(shop.id, shop);
    }

    /// Seeds a category.
    pub fn insert_category(&self, category: Category) {
        let mut state = self.state.write().expect("RwLock poisoned");
        state.categories.insert(category.id, category);
    }

    /// Seeds a product. Fails on a duplicate `external_id`.
    pub fn insert_product(&self, product: Product) -> StoreResult<()> {
        let mut state = self.state.write().expect("RwLock poisoned");
        if state
            .products
            .values()
            .any(|p| p.external_id == product.external_id)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate product external_id {:?}",
                product.external_id
            )));
        }
        state.products.insert(product.id, product);
        Ok(())
    }

    /// Seeds a shop listing. Fails when the `(product, shop)` pair or the
    /// `external_id` is already taken.
    pub fn insert_product_info(&self, info: ProductInfo) -> StoreResult<()> {
        let mut state = self.state.write().expect("RwLock poisoned");
        if state
            .infos
            .values()
            .any(|i| i.product == info.product && i.shop == info.shop)
        {
            return Err(StoreError::Conflict(format!(
                "listing for product {} in shop {} already exists",
                info.product, info.shop
            )));
        }
        if state.infos.values().any(|i| i.external_id == info.external_id) {
            return Err(StoreError::Conflict(format!(
                "duplicate listing external_id {:?}",
                info.external_id
            )));
        }
        state.infos.insert(info.id, info);
        Ok(())
    }

    /// Seeds a parameter.
    pub fn insert_parameter(&self, parameter: Parameter) {
        let mut state = self.state.write().expect("RwLock poisoned");
        state.parameters.insert(parameter.id, parameter);
    }

    /// Seeds a parameter value. Fails on a duplicate
    /// `(product_info, parameter)` pair.
    pub fn insert_product_parameter(&self, value: ProductParameter) -> StoreResult<()> {
        let mut state = self.state.write().expect("RwLock poisoned");
        if state
            .product_parameters
            .iter()
            .any(|v| v.product_info == value.product_info && v.parameter == value.parameter)
        {
            return Err(StoreError::Conflict(format!(
                "parameter {} already valued on listing {}",
                value.parameter, value.product_info
            )));
        }
        state.product_parameters.push(value);
        Ok(())
    }

    /// Overwrites the stock level on a listing.
    pub fn set_stock(&self, id: ProductInfoId, quantity: u32) -> StoreResult<()> {
        let mut state = self.state.write().expect("RwLock poisoned");
        let info = state
            .infos
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRow(format!("product listing {id}")))?;
        info.quantity = quantity;
        Ok(())
    }

    /// Number of orders currently held, baskets included. Test helper.
    pub fn order_count(&self) -> usize {
        self.state.read().expect("RwLock poisoned").orders.len()
    }

    /// Number of baskets a user currently has. Test helper for the
    /// singleton invariant.
    pub fn basket_count(&self, user: UserId) -> usize {
        self.state
            .read()
            .expect("RwLock poisoned")
            .orders
            .values()
            .filter(|o| o.user == user && o.state == OrderState::Basket)
            .count()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn product_info(&self, id: ProductInfoId) -> StoreResult<Option<ProductInfo>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.infos.get(&id).cloned())
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.products.get(&id).cloned())
    }

    async fn shop(&self, id: ShopId) -> StoreResult<Option<Shop>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.shops.get(&id).cloned())
    }

    async fn search(&self, query: &CatalogQuery) -> StoreResult<Vec<CatalogListing>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut listings = Vec::new();
        for info in state.infos.values() {
            let Some(product) = state.products.get(&info.product) else {
                continue;
            };
            let Some(shop) = state.shops.get(&info.shop) else {
                continue;
            };
            let listing = CatalogListing {
                info: info.clone(),
                product_name: product.name.clone(),
                description: product.description.clone(),
                category: product.category,
                shop_name: shop.name.clone(),
            };
            if query.matches(&listing) {
                listings.push(listing);
            }
        }
        query.apply_sort(&mut listings);
        Ok(listings)
    }

    async fn parameters(&self) -> StoreResult<Vec<Parameter>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut parameters: Vec<Parameter> = state.parameters.values().cloned().collect();
        parameters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parameters)
    }

    async fn parameter_values(
        &self,
        product_info: ProductInfoId,
    ) -> StoreResult<Vec<ProductParameter>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state
            .product_parameters
            .iter()
            .filter(|v| v.product_info == product_info)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get_or_create_basket(&self, user: UserId) -> StoreResult<Order> {
        // Single write lock for the whole check-then-insert: concurrent
        // callers serialize here, so the basket stays a singleton.
        let mut state = self.state.write().expect("RwLock poisoned");
        if let Some(existing) = state
            .orders
            .values()
            .find(|o| o.user == user && o.state == OrderState::Basket)
        {
            return Ok(existing.clone());
        }
        let basket = Order::new_basket(user);
        state.orders.insert(basket.id, basket.clone());
        Ok(basket)
    }

    async fn find_basket(&self, user: UserId) -> StoreResult<Option<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state
            .orders
            .values()
            .find(|o| o.user == user && o.state == OrderState::Basket)
            .cloned())
    }

    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.orders.get(&id).cloned())
    }

    async fn list_confirmed(&self, user: UserId) -> StoreResult<Vec<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user == user && o.state != OrderState::Basket)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_ref().cmp(a.id.as_ref()))
        });
        Ok(orders)
    }

    async fn items(&self, order: OrderId) -> StoreResult<Vec<OrderItem>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.items.get(&order).cloned().unwrap_or_default())
    }

    async fn find_item(
        &self,
        order: OrderId,
        product_info: ProductInfoId,
    ) -> StoreResult<Option<OrderItem>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state
            .items
            .get(&order)
            .and_then(|items| items.iter().find(|i| i.product_info == product_info))
            .cloned())
    }

    async fn merge_item(
        &self,
        order: OrderId,
        product_info: ProductInfoId,
        quantity: Quantity,
    ) -> StoreResult<OrderItem> {
        // Write lock spans lookup and increment, so merges never race.
        let mut state = self.state.write().expect("RwLock poisoned");
        if !state.orders.contains_key(&order) {
            return Err(StoreError::MissingRow(format!("order {order}")));
        }
        let items = state.items.entry(order).or_default();
        if let Some(existing) = items.iter_mut().find(|i| i.product_info == product_info) {
            existing.quantity = existing
                .quantity
                .merged_with(quantity)
                .ok_or_else(|| StoreError::Conflict("line quantity overflow".to_string()))?;
            return Ok(existing.clone());
        }
        let item = OrderItem {
            order,
            product_info,
            quantity,
        };
        items.push(item.clone());
        Ok(item)
    }

    async fn remove_item(&self, order: OrderId, product_info: ProductInfoId) -> StoreResult<bool> {
        let mut state = self.state.write().expect("RwLock poisoned");
        let Some(items) = state.items.get_mut(&order) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|i| i.product_info != product_info);
        Ok(items.len() < before)
    }

    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        let mut state = self.state.write().expect("RwLock poisoned");
        state.orders.remove(&id);
        state.items.remove(&id);
        Ok(())
    }

    async fn confirm_basket(&self, id: OrderId, contact: ContactId) -> StoreResult<Order> {
        let mut state = self.state.write().expect("RwLock poisoned");
        let order = state
            .orders
            .get_mut(&id)
            .filter(|o| o.state == OrderState::Basket)
            .ok_or_else(|| StoreError::MissingRow(format!("no open basket with id {id}")))?;
        order.contact = Some(contact);
        order.state = OrderState::New;
        Ok(order.clone())
    }

    async fn set_state(&self, id: OrderId, new_state: OrderState) -> StoreResult<Order> {
        let mut state = self.state.write().expect("RwLock poisoned");
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRow(format!("order {id}")))?;
        order.state = new_state;
        Ok(order.clone())
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn insert_contact(&self, contact: Contact) -> StoreResult<Contact> {
        let mut state = self.state.write().expect("RwLock poisoned");
        state.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn find_contact(&self, id: ContactId) -> StoreResult<Option<Contact>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.contacts.get(&id).cloned())
    }

    async fn contacts_for(&self, owner: UserId) -> StoreResult<Vec<Contact>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut contacts: Vec<Contact> = state
            .contacts
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        contacts.sort_by(|a, b| a.id.as_ref().cmp(b.id.as_ref()));
        Ok(contacts)
    }

    async fn update_contact(&self, contact: Contact) -> StoreResult<Contact> {
        let mut state = self.state.write().expect("RwLock poisoned");
        if !state.contacts.contains_key(&contact.id) {
            return Err(StoreError::MissingRow(format!("contact {}", contact.id)));
        }
        state.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn delete_contact(&self, id: ContactId) -> StoreResult<()> {
        let mut state = self.state.write().expect("RwLock poisoned");
        state
            .contacts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingRow(format!("contact {id}")))
    }
}

/// Dispatcher that records every notification it is handed.
#[derive(Debug, Clone, Default)]
pub struct CollectingDispatcher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl CollectingDispatcher {
    /// Creates an empty recording dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued so far, in order.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("Mutex poisoned").clone()
    }
}

#[async_trait]
impl NotificationDispatcher for CollectingDispatcher {
    async fn enqueue(&self, notification: Notification) -> Result<(), DispatchError> {
        self.sent.lock().expect("Mutex poisoned").push(notification);
        Ok(())
    }
}

/// Dispatcher that rejects every notification, for asserting that engine
/// operations survive dispatch failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingDispatcher;

#[async_trait]
impl NotificationDispatcher for FailingDispatcher {
    async fn enqueue(&self, _notification: Notification) -> Result<(), DispatchError> {
        Err(DispatchError("queue unavailable".to_string()))
    }
}
