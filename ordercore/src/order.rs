//! Orders, order items and the order state machine.
//!
//! An [`Order`] is either the user's single open basket (state `basket`) or
//! a confirmed order working its way through fulfilment. The basket is a
//! lazily created scratch object: it is deleted when its last item is
//! removed and recreated on the next access. Once an order leaves `basket`
//! it becomes a historical record whose only mutable parts are its state
//! and the contact attached at confirmation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ContactId, OrderId, ProductInfoId, Quantity, Timestamp, UserId};

/// The seven canonical order states.
///
/// No forward-only ordering is enforced between the confirmed states: any
/// staff actor may move an order between them freely. The single
/// constrained edge is that an order which has left [`OrderState::Basket`]
/// can never return to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    /// The mutable pre-checkout basket.
    Basket,
    /// Confirmed by the buyer, awaiting shop confirmation.
    New,
    /// Confirmed by the shop.
    Confirmed,
    /// Picked and packed.
    Assembled,
    /// Handed to delivery.
    Sent,
    /// Received by the buyer.
    Delivered,
    /// Canceled.
    Canceled,
}

/// Error returned when parsing an unknown state name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order state: {0:?}")]
pub struct UnknownOrderState(pub String);

impl OrderState {
    /// The canonical wire name of the state.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basket => "basket",
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Assembled => "assembled",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        }
    }

    /// Whether a staff-driven transition from `self` to `target` is
    /// permitted. Everything is allowed except reverting a confirmed order
    /// back into a basket.
    #[must_use]
    pub fn allows_transition_to(self, target: Self) -> bool {
        self == Self::Basket || target != Self::Basket
    }
}

impl FromStr for OrderState {
    type Err = UnknownOrderState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basket" => Ok(Self::Basket),
            "new" => Ok(Self::New),
            "confirmed" => Ok(Self::Confirmed),
            "assembled" => Ok(Self::Assembled),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            other => Err(UnknownOrderState(other.to_string())),
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order header: either the open basket or a confirmed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order id.
    pub id: OrderId,
    /// The owning user.
    pub user: UserId,
    /// Creation time; listings are newest-first on this field.
    pub created_at: Timestamp,
    /// Current lifecycle state.
    pub state: OrderState,
    /// Shipping contact, attached at confirmation. `None` while the order
    /// is still a basket.
    pub contact: Option<ContactId>,
}

impl Order {
    /// Creates a fresh open basket for a user.
    pub fn new_basket(user: UserId) -> Self {
        Self {
            id: OrderId::generate(),
            user,
            created_at: Timestamp::now(),
            state: OrderState::Basket,
            contact: None,
        }
    }

    /// Whether this order is the user's open basket.
    #[must_use]
    pub fn is_basket(&self) -> bool {
        self.state == OrderState::Basket
    }
}

/// A line item: one listing and a positive quantity within one order.
///
/// `(order, product_info)` is unique — adding the same listing again merges
/// quantities rather than creating a second line. The unit price is read
/// from the referenced listing at render time, not snapshotted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The owning order.
    pub order: OrderId,
    /// The listing being bought.
    pub product_info: ProductInfoId,
    /// Units of the listing, always positive.
    pub quantity: Quantity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_roundtrip() {
        for state in [
            OrderState::Basket,
            OrderState::New,
            OrderState::Confirmed,
            OrderState::Assembled,
            OrderState::Sent,
            OrderState::Delivered,
            OrderState::Canceled,
        ] {
            assert_eq!(state.as_str().parse::<OrderState>().unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_names_fail_to_parse() {
        assert!("shipped".parse::<OrderState>().is_err());
        assert!("Basket".parse::<OrderState>().is_err());
        assert!("".parse::<OrderState>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&OrderState::Assembled).unwrap();
        assert_eq!(json, "\"assembled\"");
        let back: OrderState = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(back, OrderState::Canceled);
    }

    #[test]
    fn no_reverting_to_basket_after_confirmation() {
        assert!(!OrderState::New.allows_transition_to(OrderState::Basket));
        assert!(!OrderState::Delivered.allows_transition_to(OrderState::Basket));
        assert!(!OrderState::Canceled.allows_transition_to(OrderState::Basket));
    }

    #[test]
    fn all_other_transitions_are_permitted() {
        // The state machine is deliberately unconstrained beyond the basket
        // edge: staff may move orders backwards and forwards.
        assert!(OrderState::New.allows_transition_to(OrderState::Delivered));
        assert!(OrderState::Delivered.allows_transition_to(OrderState::New));
        assert!(OrderState::Sent.allows_transition_to(OrderState::Canceled));
        assert!(OrderState::Basket.allows_transition_to(OrderState::Basket));
        assert!(OrderState::Basket.allows_transition_to(OrderState::Canceled));
    }

    #[test]
    fn new_basket_is_open_and_contactless() {
        let basket = Order::new_basket(UserId::generate());
        assert!(basket.is_basket());
        assert!(basket.contact.is_none());
    }
}
