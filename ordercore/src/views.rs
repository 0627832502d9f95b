//! Read-side representations returned by the engine.
//!
//! Unit prices here are computed from the referenced listings at render
//! time; nothing is snapshotted onto the order.

use serde::{Deserialize, Serialize};

use crate::catalog::ProductName;
use crate::contact::Contact;
use crate::order::Order;
use crate::types::{Money, OrderId, ProductInfoId, Quantity, Timestamp, UserId};

/// A parameter value on a listing, with the parameter name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingParameter {
    /// Parameter name.
    pub name: String,
    /// Optional unit of measure.
    pub unit: Option<String>,
    /// Free-form value.
    pub value: String,
}

/// One rendered line of a basket or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The listing behind the line.
    pub product_info: ProductInfoId,
    /// Product display name.
    pub product_name: ProductName,
    /// Name of the selling shop.
    pub shop_name: String,
    /// Discounted unit price, as of render time.
    pub unit_price: Money,
    /// Units on the line.
    pub quantity: Quantity,
    /// `unit_price * quantity`.
    pub line_total: Money,
}

/// The user's open basket with rendered lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketView {
    /// Id of the basket order.
    pub order: OrderId,
    /// The basket owner.
    pub user: UserId,
    /// When the basket was created.
    pub created_at: Timestamp,
    /// Rendered lines, one per listing.
    pub lines: Vec<OrderLine>,
    /// Sum of all line totals.
    pub total: Money,
}

/// A confirmed order with rendered lines and its shipping contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    /// The order header.
    pub order: Order,
    /// The attached shipping contact, if any.
    pub contact: Option<Contact>,
    /// Rendered lines, one per listing.
    pub lines: Vec<OrderLine>,
    /// Sum of all line totals.
    pub total: Money,
}
