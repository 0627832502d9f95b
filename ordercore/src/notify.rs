//! Notification dispatch: explicit, asynchronous, best-effort.
//!
//! State changes notify the order's owner by email through an external
//! dispatcher (a task queue in production). The engine calls
//! [`NotificationDispatcher::enqueue`] explicitly from `confirm` and
//! `update_status` — there is no implicit triggering on persistence. The
//! contract is at-least-once and fire-and-forget: the engine logs a failed
//! enqueue and returns success to the caller regardless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderState;
use crate::types::{OrderId, UserId};

/// Kinds of notification the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A basket was confirmed into a new order.
    OrderConfirmed,
    /// A staff actor changed an order's state.
    OrderStatusChanged,
}

/// A notification to be delivered to an order's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// Emitted once when a basket becomes a `new` order.
    OrderConfirmed {
        /// The confirmed order.
        order: OrderId,
        /// The recipient.
        user: UserId,
    },
    /// Emitted on every actual state change after confirmation.
    OrderStatusChanged {
        /// The order that moved.
        order: OrderId,
        /// The recipient.
        user: UserId,
        /// The state the order moved into.
        state: OrderState,
    },
}

impl Notification {
    /// The notification's kind.
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::OrderConfirmed { .. } => NotificationKind::OrderConfirmed,
            Self::OrderStatusChanged { .. } => NotificationKind::OrderStatusChanged,
        }
    }

    /// The user the notification is addressed to.
    pub const fn recipient(&self) -> UserId {
        match self {
            Self::OrderConfirmed { user, .. } | Self::OrderStatusChanged { user, .. } => *user,
        }
    }
}

/// Failure to enqueue a notification.
///
/// Never propagated to engine callers; logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to enqueue notification: {0}")]
pub struct DispatchError(pub String);

/// External notification collaborator: enqueues a notification task.
///
/// Implementations return as soon as the task is queued; delivery ordering
/// relative to the triggering call is unspecified.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Enqueues a notification for asynchronous delivery.
    async fn enqueue(&self, notification: Notification) -> Result<(), DispatchError>;
}
