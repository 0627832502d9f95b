//! Core validated types for the order-management backend.
//!
//! All types use smart constructors so that validity is established at
//! construction time, following the "parse, don't validate" principle.
//! Identifiers are UUIDv7 so that freshly generated ids sort by creation
//! time.

use chrono::{DateTime, Utc};
use nutype::nutype;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a registered user (buyer or staff).
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct UserId(Uuid);

impl UserId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifier of a shop.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct ShopId(Uuid);

impl ShopId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifier of a product category.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct CategoryId(Uuid);

impl CategoryId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifier of a product in the catalog.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct ProductId(Uuid);

impl ProductId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifier of a shop-scoped product listing (`ProductInfo`).
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct ProductInfoId(Uuid);

impl ProductInfoId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifier of a named product parameter.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct ParameterId(Uuid);

impl ParameterId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifier of a shipping contact.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct ContactId(Uuid);

impl ContactId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifier of an order (including the open basket).
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize
))]
pub struct OrderId(Uuid);

impl OrderId {
    /// Generates a fresh time-ordered id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// A line-item quantity.
///
/// Quantities are always positive; a line with zero units does not exist.
/// Stock levels, which may legitimately be zero, are plain `u32` values on
/// the catalog side.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Quantity(u32);

impl Quantity {
    /// Returns the sum of two quantities, or `None` on overflow.
    ///
    /// Used when merging a new request into an existing basket line.
    #[must_use]
    pub fn merged_with(self, other: Self) -> Option<Self> {
        let sum = u32::from(self).checked_add(u32::from(other))?;
        Self::try_new(sum).ok()
    }
}

/// A percentage discount applied to a shop listing, 1 to 100.
#[nutype(
    validate(greater = 0, less_or_equal = 100),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct DiscountPercent(u32);

/// Errors that can occur when constructing or combining [`Money`] values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// The amount was negative.
    #[error("money amount cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount carried more than two decimal places.
    #[error("money amount cannot have more than 2 decimal places: {0}")]
    TooPrecise(Decimal),
    /// The amount did not fit the representable range.
    #[error("money amount out of range: {0}")]
    OutOfRange(String),
}

/// A non-negative monetary amount with at most two decimal places.
///
/// Backed by [`Decimal`] for exact arithmetic; convertible to and from
/// integer cents for storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Creates a money value from a decimal amount.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.scale() > 2 {
            return Err(MoneyError::TooPrecise(amount));
        }
        Ok(Self(amount))
    }

    /// Creates a money value from integer cents.
    pub fn from_cents(cents: u64) -> Result<Self, MoneyError> {
        let signed =
            i64::try_from(cents).map_err(|_| MoneyError::OutOfRange(cents.to_string()))?;
        Self::new(Decimal::new(signed, 2))
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal amount.
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Converts to integer cents, rounding half-up at the cent boundary.
    pub fn to_cents(&self) -> i64 {
        (self.0 * Decimal::from(100))
            .round()
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Adds two amounts.
    pub fn plus(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .ok_or_else(|| MoneyError::OutOfRange("addition overflow".to_string()))
            .map(Self)
    }

    /// Multiplies by a line quantity.
    pub fn times(self, quantity: Quantity) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(u32::from(quantity)))
            .ok_or_else(|| MoneyError::OutOfRange("multiplication overflow".to_string()))
            .map(Self)
    }

    /// Reduces the amount by a percentage discount, rounded to whole
    /// cents so the result stays within the two-decimal invariant.
    #[must_use]
    pub fn less_percent(self, discount: DiscountPercent) -> Self {
        let factor = Decimal::from(100 - u32::from(discount)) / Decimal::from(100);
        Self((self.0 * factor).round_dp(2))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A point in time, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Wraps a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// The current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Converts into the underlying `DateTime`.
    pub const fn into_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
