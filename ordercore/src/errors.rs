//! Error types for the order-management backend.
//!
//! Two layers of errors exist:
//!
//! - [`OrderError`]: business-level failures returned by engine operations.
//!   Each variant carries an [`ErrorClass`] so that a transport boundary can
//!   translate it to a status code without matching on every variant.
//! - [`StoreError`]: persistence-level failures raised by store adapters and
//!   wrapped into [`OrderError::Store`] when they cross into the engine.
//!
//! Notification dispatch failures deliberately do not appear here: they are
//! logged and swallowed by the engine, never surfaced to the caller.

use thiserror::Error;

use crate::types::{ContactId, OrderId, ProductInfoId};

/// Coarse classification of an [`OrderError`], used by boundaries to pick a
/// response status.
///
/// The intended mapping is `Validation` and `Conflict` to 400, `NotFound`
/// to 404, `PermissionDenied` to 403 and `Internal` to 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed input: bad quantity, unknown state name.
    Validation,
    /// A referenced entity does not exist or is not visible to the caller.
    NotFound,
    /// The actor lacks the privilege for the operation.
    PermissionDenied,
    /// A business rule blocked the operation.
    Conflict,
    /// An unexpected failure in the persistence layer.
    Internal,
}

/// Business-level failures of engine operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested quantity was not a positive integer.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// The requested order state is unknown, or the transition is not
    /// permitted (an order that has left the basket can never return to it).
    #[error("invalid order state: {0}")]
    InvalidState(String),

    /// No shop listing exists with the given id.
    #[error("product listing {0} not found")]
    ProductNotFound(ProductInfoId),

    /// The user has no open basket.
    #[error("no open basket")]
    BasketNotFound,

    /// The basket holds no line for the given listing.
    #[error("no basket line for listing {0}")]
    ItemNotFound(ProductInfoId),

    /// The contact does not exist or does not belong to the caller.
    #[error("contact {0} not found")]
    ContactNotFound(ContactId),

    /// The order does not exist or is not visible to the caller.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The actor lacks staff privilege.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The cumulative basket quantity would exceed the available stock.
    #[error("insufficient stock for listing {product_info}: requested {requested}, available {available}")]
    InsufficientStock {
        /// The listing that ran short.
        product_info: ProductInfoId,
        /// Total quantity the basket would hold after the add.
        requested: u32,
        /// Stock currently recorded on the listing.
        available: u32,
    },

    /// A basket with no items cannot be confirmed.
    #[error("basket is empty")]
    EmptyBasket,

    /// The persistence layer failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Classifies the error for boundary translation.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidQuantity(_) | Self::InvalidState(_) => ErrorClass::Validation,
            Self::ProductNotFound(_)
            | Self::BasketNotFound
            | Self::ItemNotFound(_)
            | Self::ContactNotFound(_)
            | Self::OrderNotFound(_) => ErrorClass::NotFound,
            Self::PermissionDenied(_) => ErrorClass::PermissionDenied,
            Self::InsufficientStock { .. } | Self::EmptyBasket => ErrorClass::Conflict,
            Self::Store(_) => ErrorClass::Internal,
        }
    }
}

/// Persistence-layer failures raised by store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection to the backing store failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A row referenced by an engine-validated operation was gone by the
    /// time the store touched it.
    #[error("missing row: {0}")]
    MissingRow(String),

    /// A uniqueness or consistency constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded into its domain type.
    #[error("decode failed: {0}")]
    Decode(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for engine operations.
pub type OrderResult<T> = Result<T, OrderError>;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
