//! The basket/order engine: the write side of the backend.
//!
//! [`OrderEngine`] owns every state transition the system performs:
//! basket access and mutation, the one-time basket-to-order confirmation a
//! buyer may trigger, and the staff-only status updates afterwards. It is
//! generic over a store implementing the three store traits and over the
//! notification dispatcher, so the same logic runs against the in-memory
//! adapter in tests and postgres in production.
//!
//! Stock checks are advisory: they validate against the stock recorded at
//! call time and reserve nothing. Two concurrent baskets can therefore
//! both pass the check against the same pool; this is an accepted and
//! documented property, not a bug to fix silently here.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use crate::auth::Principal;
use crate::catalog::{CatalogListing, CatalogQuery, Parameter, ProductInfo};
use crate::contact::{Contact, ContactUpdate, NewContact};
use crate::errors::{OrderError, OrderResult, StoreError};
use crate::notify::{Notification, NotificationDispatcher};
use crate::order::{Order, OrderItem, OrderState};
use crate::store::{CatalogStore, ContactStore, OrderStore};
use crate::types::{ContactId, Money, MoneyError, OrderId, ProductInfoId, Quantity, UserId};
use crate::views::{BasketView, ListingParameter, OrderLine, OrderView};

/// The basket/order engine.
///
/// Cheap to share behind an `Arc`; all operations take `&self`.
#[derive(Debug)]
pub struct OrderEngine<S, D> {
    store: S,
    dispatcher: D,
}

impl<S, D> OrderEngine<S, D>
where
    S: CatalogStore + OrderStore + ContactStore,
    D: NotificationDispatcher,
{
    /// Creates an engine over a store and a notification dispatcher.
    pub const fn new(store: S, dispatcher: D) -> Self {
        Self { store, dispatcher }
    }

    /// Returns the user's open basket, creating an empty one if needed.
    ///
    /// The store guarantees at most one basket per user even under
    /// concurrent calls.
    #[instrument(skip(self))]
    pub async fn get_or_create_basket(&self, user: UserId) -> OrderResult<Order> {
        Ok(OrderStore::get_or_create_basket(&self.store, user).await?)
    }

    /// Read access to the underlying store, for adapters layered on top.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Renders the user's basket with one line per listing, creating the
    /// basket if none exists.
    #[instrument(skip(self))]
    pub async fn basket(&self, user: UserId) -> OrderResult<BasketView> {
        let basket = self.get_or_create_basket(user).await?;
        let items = self.store.items(basket.id).await?;
        let lines = self.render_lines(&items).await?;
        let total = sum_lines(&lines)?;
        Ok(BasketView {
            order: basket.id,
            user: basket.user,
            created_at: basket.created_at,
            lines,
            total,
        })
    }

    /// Adds `quantity` units of a listing to the user's basket, merging
    /// into an existing line when one is present.
    ///
    /// The stock check is cumulative: the basket's existing quantity for
    /// the listing plus the requested amount must not exceed the stock
    /// currently recorded on the listing.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user: UserId,
        product_info: ProductInfoId,
        quantity: u32,
    ) -> OrderResult<OrderItem> {
        let requested = Quantity::try_new(quantity).map_err(|_| {
            OrderError::InvalidQuantity(format!(
                "quantity must be a positive integer, got {quantity}"
            ))
        })?;

        let info = self
            .store
            .product_info(product_info)
            .await?
            .ok_or(OrderError::ProductNotFound(product_info))?;

        let basket = self.get_or_create_basket(user).await?;

        let in_basket = self
            .store
            .find_item(basket.id, product_info)
            .await?
            .map_or(0, |item| u32::from(item.quantity));
        let cumulative = in_basket.checked_add(quantity).ok_or_else(|| {
            OrderError::InvalidQuantity("basket quantity overflow".to_string())
        })?;
        if cumulative > info.quantity {
            return Err(OrderError::InsufficientStock {
                product_info,
                requested: cumulative,
                available: info.quantity,
            });
        }

        let item = self.store.merge_item(basket.id, product_info, requested).await?;
        debug!(
            order = %basket.id,
            listing = %product_info,
            quantity = u32::from(item.quantity),
            "basket line merged"
        );
        Ok(item)
    }

    /// Removes a listing's line from the user's basket. A basket left with
    /// no lines is deleted outright; it does not persist empty.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user: UserId, product_info: ProductInfoId) -> OrderResult<()> {
        let basket = self
            .store
            .find_basket(user)
            .await?
            .ok_or(OrderError::BasketNotFound)?;

        let removed = self.store.remove_item(basket.id, product_info).await?;
        if !removed {
            return Err(OrderError::ItemNotFound(product_info));
        }

        if self.store.items(basket.id).await?.is_empty() {
            self.store.delete_order(basket.id).await?;
            debug!(order = %basket.id, "empty basket deleted");
        }
        Ok(())
    }

    /// Confirms the user's basket into a `new` order with the given
    /// shipping contact.
    ///
    /// The contact must belong to the user and the basket must hold at
    /// least one line. This is the only transition a buyer may trigger;
    /// everything afterwards is staff territory. The confirmation email is
    /// enqueued best-effort and never rolls back the transition.
    #[instrument(skip(self))]
    pub async fn confirm(&self, user: UserId, contact: ContactId) -> OrderResult<Order> {
        let contact = self
            .store
            .find_contact(contact)
            .await?
            .filter(|c| c.owner == user)
            .ok_or(OrderError::ContactNotFound(contact))?;

        let basket = self
            .store
            .find_basket(user)
            .await?
            .ok_or(OrderError::BasketNotFound)?;

        if self.store.items(basket.id).await?.is_empty() {
            return Err(OrderError::EmptyBasket);
        }

        let order = self.store.confirm_basket(basket.id, contact.id).await?;
        debug!(order = %order.id, "basket confirmed");
        self.dispatch(Notification::OrderConfirmed {
            order: order.id,
            user,
        })
        .await;
        Ok(order)
    }

    /// Sets a new state on an order. Staff only.
    ///
    /// The privilege check runs before anything else, so a non-staff actor
    /// always sees `PermissionDenied` whatever the payload. The state name
    /// must be one of the seven canonical names; an order that has left
    /// `basket` can never be moved back into it. An actual change notifies
    /// the order's owner best-effort; setting the state an order already
    /// has is a no-op.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        actor: Principal,
        order: OrderId,
        new_state: &str,
    ) -> OrderResult<Order> {
        if !actor.staff {
            return Err(OrderError::PermissionDenied(
                "staff privilege required to change order status".to_string(),
            ));
        }

        let target: OrderState = new_state
            .parse()
            .map_err(|err: crate::order::UnknownOrderState| OrderError::InvalidState(err.to_string()))?;

        let current = self
            .store
            .find_order(order)
            .await?
            .ok_or(OrderError::OrderNotFound(order))?;

        if !current.state.allows_transition_to(target) {
            return Err(OrderError::InvalidState(format!(
                "order in state {} cannot return to {}",
                current.state, target
            )));
        }
        if current.state == target {
            return Ok(current);
        }

        let updated = self.store.set_state(order, target).await?;
        debug!(order = %updated.id, state = %target, "order state changed");
        self.dispatch(Notification::OrderStatusChanged {
            order: updated.id,
            user: updated.user,
            state: target,
        })
        .await;
        Ok(updated)
    }

    /// Lists the user's confirmed orders, newest first. The open basket is
    /// not an order yet and is excluded.
    #[instrument(skip(self))]
    pub async fn orders(&self, user: UserId) -> OrderResult<Vec<Order>> {
        Ok(self.store.list_confirmed(user).await?)
    }

    /// Renders one order with lines and contact, scoped to its owner.
    #[instrument(skip(self))]
    pub async fn order(&self, user: UserId, order: OrderId) -> OrderResult<OrderView> {
        let header = self
            .store
            .find_order(order)
            .await?
            .filter(|o| o.user == user)
            .ok_or(OrderError::OrderNotFound(order))?;

        let items = self.store.items(header.id).await?;
        let lines = self.render_lines(&items).await?;
        let total = sum_lines(&lines)?;
        let contact = match header.contact {
            Some(id) => self.store.find_contact(id).await?,
            None => None,
        };
        Ok(OrderView {
            order: header,
            contact,
            lines,
            total,
        })
    }

    /// Read-only catalog browse.
    #[instrument(skip(self, query))]
    pub async fn products(&self, query: &CatalogQuery) -> OrderResult<Vec<CatalogListing>> {
        Ok(self.store.search(query).await?)
    }

    /// Lists the catalog's named product characteristics.
    #[instrument(skip(self))]
    pub async fn parameters(&self) -> OrderResult<Vec<Parameter>> {
        Ok(self.store.parameters().await?)
    }

    /// Parameter values recorded on a listing, with names resolved.
    ///
    /// Fails with `ProductNotFound` when no such listing exists.
    #[instrument(skip(self))]
    pub async fn listing_parameters(
        &self,
        product_info: ProductInfoId,
    ) -> OrderResult<Vec<ListingParameter>> {
        self.store
            .product_info(product_info)
            .await?
            .ok_or(OrderError::ProductNotFound(product_info))?;
        let values = self.store.parameter_values(product_info).await?;
        let parameters = self.store.parameters().await?;
        let by_id: HashMap<_, _> = parameters.iter().map(|p| (p.id, p)).collect();
        values
            .into_iter()
            .map(|v| {
                let parameter = by_id
                    .get(&v.parameter)
                    .ok_or_else(|| missing(format!("parameter {}", v.parameter)))?;
                Ok(ListingParameter {
                    name: parameter.name.clone(),
                    unit: parameter.unit.clone(),
                    value: v.value,
                })
            })
            .collect()
    }

    /// Creates a shipping contact owned by the user.
    #[instrument(skip(self, contact))]
    pub async fn add_contact(&self, user: UserId, contact: NewContact) -> OrderResult<Contact> {
        Ok(self.store.insert_contact(contact.into_contact(user)).await?)
    }

    /// Lists the user's shipping contacts.
    #[instrument(skip(self))]
    pub async fn contacts(&self, user: UserId) -> OrderResult<Vec<Contact>> {
        Ok(self.store.contacts_for(user).await?)
    }

    /// Applies a partial update to a contact the user owns.
    #[instrument(skip(self, update))]
    pub async fn update_contact(
        &self,
        user: UserId,
        contact: ContactId,
        update: ContactUpdate,
    ) -> OrderResult<Contact> {
        let mut existing = self
            .store
            .find_contact(contact)
            .await?
            .filter(|c| c.owner == user)
            .ok_or(OrderError::ContactNotFound(contact))?;
        update.apply_to(&mut existing);
        Ok(self.store.update_contact(existing).await?)
    }

    /// Deletes a contact the user owns.
    #[instrument(skip(self))]
    pub async fn delete_contact(&self, user: UserId, contact: ContactId) -> OrderResult<()> {
        self.store
            .find_contact(contact)
            .await?
            .filter(|c| c.owner == user)
            .ok_or(OrderError::ContactNotFound(contact))?;
        Ok(self.store.delete_contact(contact).await?)
    }

    /// Enqueues a notification, logging and swallowing any failure.
    async fn dispatch(&self, notification: Notification) {
        let kind = notification.kind();
        let recipient = notification.recipient();
        if let Err(err) = self.dispatcher.enqueue(notification).await {
            warn!(?kind, %recipient, %err, "notification enqueue failed, dropping");
        }
    }

    /// Joins order items with their listings, products and shops into
    /// rendered lines.
    async fn render_lines(&self, items: &[OrderItem]) -> OrderResult<Vec<OrderLine>> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let info = self.require_info(item.product_info).await?;
            let product = self
                .store
                .product(info.product)
                .await?
                .ok_or_else(|| missing(format!("product {}", info.product)))?;
            let shop = self
                .store
                .shop(info.shop)
                .await?
                .ok_or_else(|| missing(format!("shop {}", info.shop)))?;

            let unit_price = info.effective_unit_price();
            let line_total = info.total_price(item.quantity).map_err(money_internal)?;
            lines.push(OrderLine {
                product_info: item.product_info,
                product_name: product.name,
                shop_name: shop.name,
                unit_price,
                quantity: item.quantity,
                line_total,
            });
        }
        Ok(lines)
    }

    async fn require_info(&self, id: ProductInfoId) -> OrderResult<ProductInfo> {
        self.store
            .product_info(id)
            .await?
            .ok_or_else(|| missing(format!("product listing {id}")))
    }
}

fn sum_lines(lines: &[OrderLine]) -> OrderResult<Money> {
    let mut total = Money::zero();
    for line in lines {
        total = total.plus(line.line_total).map_err(money_internal)?;
    }
    Ok(total)
}

/// A row the engine just validated has vanished underneath it; surfaced as
/// an internal store fault rather than a caller-facing 404.
fn missing(what: String) -> OrderError {
    OrderError::Store(StoreError::MissingRow(what))
}

fn money_internal(err: MoneyError) -> OrderError {
    OrderError::Store(StoreError::Internal(format!("money arithmetic: {err}")))
}
