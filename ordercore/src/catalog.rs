//! Catalog data model: products, categories, shops and shop listings.
//!
//! The catalog is read-mostly from the engine's point of view; writes happen
//! through external import tooling. Price and stock live exclusively on
//! [`ProductInfo`] — a product carries no quantity of its own, it is the
//! shop-scoped listing that is purchasable.

use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::types::{
    CategoryId, DiscountPercent, Money, MoneyError, ParameterId, ProductId, ProductInfoId,
    Quantity, ShopId,
};

/// Display name of a product, non-empty, at most 80 characters.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 80),
    derive(
        Debug, Clone, PartialEq, Eq, Hash, AsRef, Deref, Display, Serialize, Deserialize, TryFrom
    )
)]
pub struct ProductName(String);

/// A shop selling through the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Unique shop id.
    pub id: ShopId,
    /// Shop display name.
    pub name: String,
    /// Optional link to the shop's own site.
    pub url: Option<String>,
    /// Whether the shop currently accepts orders.
    pub accepts_orders: bool,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique category id.
    pub id: CategoryId,
    /// Category display name.
    pub name: String,
}

/// A product in the catalog.
///
/// Created by catalog import; stock and price live on the per-shop
/// [`ProductInfo`] listings, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product id.
    pub id: ProductId,
    /// Display name.
    pub name: ProductName,
    /// Manufacturer model designation, may be empty.
    pub model: String,
    /// Import-side identifier, unique across the catalog.
    pub external_id: String,
    /// Brand name, may be empty.
    pub brand: String,
    /// Owning category.
    pub category: CategoryId,
    /// Free-form description.
    pub description: String,
}

/// A named product characteristic, such as "diagonal" or "weight".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Unique parameter id.
    pub id: ParameterId,
    /// Parameter name.
    pub name: String,
    /// Optional unit of measure.
    pub unit: Option<String>,
}

/// A parameter value attached to a shop listing.
///
/// At most one value per `(product_info, parameter)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductParameter {
    /// The listing the value belongs to.
    pub product_info: ProductInfoId,
    /// The parameter being valued.
    pub parameter: ParameterId,
    /// Free-form value.
    pub value: String,
}

/// One shop's listing of one product: the purchasable unit of the catalog.
///
/// Invariant: at most one listing per `(product, shop)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Unique listing id.
    pub id: ProductInfoId,
    /// The product being listed.
    pub product: ProductId,
    /// The shop listing it.
    pub shop: ShopId,
    /// Shop-side model designation, may be empty.
    pub model: String,
    /// Import-side identifier, unique across all listings.
    pub external_id: String,
    /// Units currently in stock. Zero means sold out, not delisted.
    pub quantity: u32,
    /// Unit price charged by the shop.
    pub price: Money,
    /// Recommended retail price.
    pub price_rrc: Money,
    /// Optional percentage discount on the shop price.
    pub discount: Option<DiscountPercent>,
}

impl ProductInfo {
    /// Unit price with the listing discount applied, if any.
    #[must_use]
    pub fn effective_unit_price(&self) -> Money {
        match self.discount {
            Some(discount) => self.price.less_percent(discount),
            None => self.price,
        }
    }

    /// Total price for `quantity` units: `price * quantity`, reduced by the
    /// listing discount when one is present.
    pub fn total_price(&self, quantity: Quantity) -> Result<Money, MoneyError> {
        self.effective_unit_price().times(quantity)
    }
}

/// Sort order for catalog browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogSort {
    /// Cheapest first.
    PriceAsc,
    /// Most expensive first.
    PriceDesc,
    /// Product name, A to Z.
    NameAsc,
    /// Product name, Z to A.
    NameDesc,
    /// Lowest stock first.
    StockAsc,
    /// Highest stock first.
    StockDesc,
}

/// Read-only catalog query: filter, search and sort over listings joined
/// with their products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Restrict to products in one category.
    pub category: Option<CategoryId>,
    /// Restrict to listings with at least this much stock.
    pub min_stock: Option<u32>,
    /// Case-insensitive substring match on product name or description.
    pub search: Option<String>,
    /// Result ordering; unspecified order when `None`.
    pub sort: Option<CatalogSort>,
}

/// A catalog browse row: one listing joined with its product and shop names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogListing {
    /// The shop listing.
    pub info: ProductInfo,
    /// Name of the listed product.
    pub product_name: ProductName,
    /// Description of the listed product.
    pub description: String,
    /// Category of the listed product.
    pub category: CategoryId,
    /// Name of the listing shop.
    pub shop_name: String,
}

impl CatalogQuery {
    /// Whether a joined listing row satisfies the filter and search parts
    /// of the query. Sorting is applied separately.
    #[must_use]
    pub fn matches(&self, listing: &CatalogListing) -> bool {
        if let Some(category) = self.category {
            if listing.category != category {
                return false;
            }
        }
        if let Some(min_stock) = self.min_stock {
            if listing.info.quantity < min_stock {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_name = listing
                .product_name
                .as_ref()
                .to_lowercase()
                .contains(&needle);
            let in_description = listing.description.to_lowercase().contains(&needle);
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }

    /// Sorts listing rows in place according to the query's sort order.
    pub fn apply_sort(&self, listings: &mut [CatalogListing]) {
        let Some(sort) = self.sort else { return };
        match sort {
            CatalogSort::PriceAsc => listings.sort_by_key(|l| l.info.price),
            CatalogSort::PriceDesc => {
                listings.sort_by_key(|l| std::cmp::Reverse(l.info.price));
            }
            CatalogSort::NameAsc => listings.sort_by(|a, b| a.product_name.cmp(&b.product_name)),
            CatalogSort::NameDesc => listings.sort_by(|a, b| b.product_name.cmp(&a.product_name)),
            CatalogSort::StockAsc => listings.sort_by_key(|l| l.info.quantity),
            CatalogSort::StockDesc => {
                listings.sort_by_key(|l| std::cmp::Reverse(l.info.quantity));
            }
        }
    }
}
