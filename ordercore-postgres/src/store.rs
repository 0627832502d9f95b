//! Store trait implementations and row mapping.
//!
//! Each domain read goes through a private row struct: `TryFrom<PgRow>`
//! pulls the columns out, a second conversion step parses them into the
//! validated domain types. Anything the database hands back that fails
//! that parse surfaces as [`StoreError::Decode`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{query, Row};
use tracing::instrument;
use uuid::Uuid;

use ordercore::{
    CatalogListing, CatalogQuery, CatalogStore, CategoryId, Contact, ContactId, ContactStore,
    DiscountPercent, Money, Order, OrderId, OrderItem, OrderState, OrderStore, Parameter,
    ParameterId, Product, ProductId, ProductInfo, ProductInfoId, ProductName, ProductParameter,
    Quantity, Shop, ShopId, StoreError, StoreResult, Timestamp, UserId,
};

use crate::PostgresStore;

/// Translates a sqlx failure into the adapter-neutral store error.
///
/// Constraint violations carry postgres SQLSTATE codes: unique violations
/// (23505) become conflicts, foreign key violations (23503) become missing
/// rows, matching what the engine expects when a referenced order or
/// listing disappeared mid-operation.
fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::RowNotFound => StoreError::MissingRow(error.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::ConnectionFailed(error.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(error.to_string())
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => StoreError::Conflict(error.to_string()),
            Some("23503") => StoreError::MissingRow(error.to_string()),
            _ => StoreError::Internal(error.to_string()),
        },
        _ => StoreError::Internal(error.to_string()),
    }
}

fn row_u32(context: &str, value: i64) -> StoreResult<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Decode(format!("{context} out of range: {value}")))
}

fn row_money(context: &str, cents: i64) -> StoreResult<Money> {
    let cents = u64::try_from(cents)
        .map_err(|_| StoreError::Decode(format!("{context} is negative: {cents}")))?;
    Money::from_cents(cents).map_err(|e| StoreError::Decode(format!("{context}: {e}")))
}

fn row_quantity(context: &str, value: i64) -> StoreResult<Quantity> {
    let value = row_u32(context, value)?;
    Quantity::try_new(value).map_err(|e| StoreError::Decode(format!("{context}: {e}")))
}

/// Database row for the `orders` table.
#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    state: String,
    contact_id: Option<Uuid>,
}

impl TryFrom<PgRow> for OrderRow {
    type Error = sqlx::Error;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            state: row.try_get("state")?,
            contact_id: row.try_get("contact_id")?,
        })
    }
}

impl OrderRow {
    fn into_order(self) -> StoreResult<Order> {
        let state: OrderState = self
            .state
            .parse()
            .map_err(|e| StoreError::Decode(format!("order {}: {e}", self.id)))?;
        Ok(Order {
            id: OrderId::new(self.id),
            user: UserId::new(self.user_id),
            created_at: Timestamp::new(self.created_at),
            state,
            contact: self.contact_id.map(ContactId::new),
        })
    }
}

#[derive(Debug)]
struct ItemRow {
    order_id: Uuid,
    product_info_id: Uuid,
    quantity: i64,
}

impl TryFrom<PgRow> for ItemRow {
    type Error = sqlx::Error;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: row.try_get("order_id")?,
            product_info_id: row.try_get("product_info_id")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

impl ItemRow {
    fn into_item(self) -> StoreResult<OrderItem> {
        Ok(OrderItem {
            order: OrderId::new(self.order_id),
            product_info: ProductInfoId::new(self.product_info_id),
            quantity: row_quantity("order item quantity", self.quantity)?,
        })
    }
}

/// Database row for the `product_infos` table.
#[derive(Debug)]
struct InfoRow {
    id: Uuid,
    product_id: Uuid,
    shop_id: Uuid,
    model: String,
    external_id: String,
    quantity: i64,
    price_cents: i64,
    price_rrc_cents: i64,
    discount_percent: Option<i32>,
}

impl TryFrom<PgRow> for InfoRow {
    type Error = sqlx::Error;

    fn try_from(row: PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            shop_id: row.try_get("shop_id")?,
            model: row.try_get("model")?,
            external_id: row.try_get("external_id")?,
            quantity: row.try_get("quantity")?,
            price_cents: row.try_get("price_cents")?,
            price_rrc_cents: row.try_get("price_rrc_cents")?,
            discount_percent: row.try_get("discount_percent")?,
        })
    }
}

impl InfoRow {
    fn into_info(self) -> StoreResult<ProductInfo> {
        let discount = self
            .discount_percent
            .map(|d| {
                let d = u32::try_from(d)
                    .map_err(|_| StoreError::Decode(format!("discount out of range: {d}")))?;
                DiscountPercent::try_new(d)
                    .map_err(|e| StoreError::Decode(format!("discount: {e}")))
            })
            .transpose()?;
        Ok(ProductInfo {
            id: ProductInfoId::new(self.id),
            product: ProductId::new(self.product_id),
            shop: ShopId::new(self.shop_id),
            model: self.model,
            external_id: self.external_id,
            quantity: row_u32("listing stock", self.quantity)?,
            price: row_money("listing price", self.price_cents)?,
            price_rrc: row_money("listing rrc price", self.price_rrc_cents)?,
            discount,
        })
    }
}

fn listing_from_row(row: PgRow) -> StoreResult<CatalogListing> {
    let product_name: String = row.try_get("product_name").map_err(map_sqlx_error)?;
    let description: String = row.try_get("description").map_err(map_sqlx_error)?;
    let category: Uuid = row.try_get("category_id").map_err(map_sqlx_error)?;
    let shop_name: String = row.try_get("shop_name").map_err(map_sqlx_error)?;
    let info = InfoRow::try_from(row).map_err(map_sqlx_error)?.into_info()?;
    Ok(CatalogListing {
        info,
        product_name: ProductName::try_new(product_name)
            .map_err(|e| StoreError::Decode(format!("product name: {e}")))?,
        description,
        category: CategoryId::new(category),
        shop_name,
    })
}

fn contact_from_row(row: &PgRow) -> StoreResult<Contact> {
    let read = |name: &str| row.try_get::<String, _>(name).map_err(map_sqlx_error);
    let read_opt = |name: &str| {
        row.try_get::<Option<String>, _>(name)
            .map_err(map_sqlx_error)
    };
    Ok(Contact {
        id: ContactId::new(row.try_get("id").map_err(map_sqlx_error)?),
        owner: UserId::new(row.try_get("owner_id").map_err(map_sqlx_error)?),
        city: read("city")?,
        street: read("street")?,
        house: read_opt("house")?,
        structure: read_opt("structure")?,
        building: read_opt("building")?,
        apartment: read_opt("apartment")?,
        phone: read("phone")?,
    })
}

const SELECT_ORDER: &str = "SELECT id, user_id, created_at, state, contact_id FROM orders";

const SELECT_LISTING: &str = "SELECT pi.id, pi.product_id, pi.shop_id, pi.model, pi.external_id, \
     pi.quantity, pi.price_cents, pi.price_rrc_cents, pi.discount_percent, \
     p.name AS product_name, p.description, p.category_id, s.name AS shop_name \
     FROM product_infos pi \
     JOIN products p ON p.id = pi.product_id \
     JOIN shops s ON s.id = pi.shop_id";

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self))]
    async fn product_info(&self, id: ProductInfoId) -> StoreResult<Option<ProductInfo>> {
        let row = query(
            "SELECT id, product_id, shop_id, model, external_id, quantity, \
             price_cents, price_rrc_cents, discount_percent \
             FROM product_infos WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(|r| InfoRow::try_from(r).map_err(map_sqlx_error)?.into_info())
            .transpose()
    }

    #[instrument(skip(self))]
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = query(
            "SELECT id, name, model, external_id, brand, category_id, description \
             FROM products WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(|r| {
            let name: String = r.try_get("name").map_err(map_sqlx_error)?;
            Ok(Product {
                id: ProductId::new(r.try_get("id").map_err(map_sqlx_error)?),
                name: ProductName::try_new(name)
                    .map_err(|e| StoreError::Decode(format!("product name: {e}")))?,
                model: r.try_get("model").map_err(map_sqlx_error)?,
                external_id: r.try_get("external_id").map_err(map_sqlx_error)?,
                brand: r.try_get("brand").map_err(map_sqlx_error)?,
                category: CategoryId::new(r.try_get("category_id").map_err(map_sqlx_error)?),
                description: r.try_get("description").map_err(map_sqlx_error)?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn shop(&self, id: ShopId) -> StoreResult<Option<Shop>> {
        let row = query("SELECT id, name, url, accepts_orders FROM shops WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| {
            Ok(Shop {
                id: ShopId::new(r.try_get("id").map_err(map_sqlx_error)?),
                name: r.try_get("name").map_err(map_sqlx_error)?,
                url: r.try_get("url").map_err(map_sqlx_error)?,
                accepts_orders: r.try_get("accepts_orders").map_err(map_sqlx_error)?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, catalog_query))]
    async fn search(&self, catalog_query: &CatalogQuery) -> StoreResult<Vec<CatalogListing>> {
        // Category and stock narrow the result set in SQL; the search and
        // sort semantics stay in the domain query so both adapters agree.
        let sql = format!(
            "{SELECT_LISTING} WHERE ($1::uuid IS NULL OR p.category_id = $1) \
             AND ($2::bigint IS NULL OR pi.quantity >= $2)"
        );
        let min_stock = catalog_query.min_stock.map(i64::from);
        let rows = query(&sql)
            .bind(catalog_query.category.map(CategoryId::into_inner))
            .bind(min_stock)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut listings = rows
            .into_iter()
            .map(listing_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        listings.retain(|l| catalog_query.matches(l));
        catalog_query.apply_sort(&mut listings);
        Ok(listings)
    }

    #[instrument(skip(self))]
    async fn parameters(&self) -> StoreResult<Vec<Parameter>> {
        let rows = query("SELECT id, name, unit FROM parameters ORDER BY name")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.iter()
            .map(|r| {
                Ok(Parameter {
                    id: ParameterId::new(r.try_get("id").map_err(map_sqlx_error)?),
                    name: r.try_get("name").map_err(map_sqlx_error)?,
                    unit: r.try_get("unit").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn parameter_values(
        &self,
        product_info: ProductInfoId,
    ) -> StoreResult<Vec<ProductParameter>> {
        let rows = query(
            "SELECT product_info_id, parameter_id, value FROM product_parameters \
             WHERE product_info_id = $1",
        )
        .bind(product_info.into_inner())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter()
            .map(|r| {
                Ok(ProductParameter {
                    product_info: ProductInfoId::new(
                        r.try_get("product_info_id").map_err(map_sqlx_error)?,
                    ),
                    parameter: ParameterId::new(r.try_get("parameter_id").map_err(map_sqlx_error)?),
                    value: r.try_get("value").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get_or_create_basket(&self, user: UserId) -> StoreResult<Order> {
        // Concurrent creates race on the partial unique index: exactly one
        // insert wins, the others read the winner back. A second attempt
        // covers the winner being emptied and deleted in between.
        for _ in 0..2 {
            let candidate = Order::new_basket(user);
            let inserted = query(
                "INSERT INTO orders (id, user_id, created_at, state, contact_id) \
                 VALUES ($1, $2, $3, 'basket', NULL) \
                 ON CONFLICT (user_id) WHERE state = 'basket' DO NOTHING",
            )
            .bind(candidate.id.into_inner())
            .bind(user.into_inner())
            .bind(candidate.created_at.into_datetime())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
            if inserted.rows_affected() == 1 {
                return Ok(candidate);
            }
            if let Some(existing) = self.find_basket(user).await? {
                return Ok(existing);
            }
        }
        Err(StoreError::Internal(
            "basket creation kept racing concurrent deletes".to_string(),
        ))
    }

    #[instrument(skip(self))]
    async fn find_basket(&self, user: UserId) -> StoreResult<Option<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE user_id = $1 AND state = 'basket'");
        let row = query(&sql)
            .bind(user.into_inner())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| OrderRow::try_from(r).map_err(map_sqlx_error)?.into_order())
            .transpose()
    }

    #[instrument(skip(self))]
    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE id = $1");
        let row = query(&sql)
            .bind(id.into_inner())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| OrderRow::try_from(r).map_err(map_sqlx_error)?.into_order())
            .transpose()
    }

    #[instrument(skip(self))]
    async fn list_confirmed(&self, user: UserId) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "{SELECT_ORDER} WHERE user_id = $1 AND state <> 'basket' ORDER BY created_at DESC"
        );
        let rows = query(&sql)
            .bind(user.into_inner())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|r| OrderRow::try_from(r).map_err(map_sqlx_error)?.into_order())
            .collect()
    }

    #[instrument(skip(self))]
    async fn items(&self, order: OrderId) -> StoreResult<Vec<OrderItem>> {
        let rows = query(
            "SELECT order_id, product_info_id, quantity FROM order_items WHERE order_id = $1",
        )
        .bind(order.into_inner())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|r| ItemRow::try_from(r).map_err(map_sqlx_error)?.into_item())
            .collect()
    }

    #[instrument(skip(self))]
    async fn find_item(
        &self,
        order: OrderId,
        product_info: ProductInfoId,
    ) -> StoreResult<Option<OrderItem>> {
        let row = query(
            "SELECT order_id, product_info_id, quantity FROM order_items \
             WHERE order_id = $1 AND product_info_id = $2",
        )
        .bind(order.into_inner())
        .bind(product_info.into_inner())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(|r| ItemRow::try_from(r).map_err(map_sqlx_error)?.into_item())
            .transpose()
    }

    #[instrument(skip(self))]
    async fn merge_item(
        &self,
        order: OrderId,
        product_info: ProductInfoId,
        quantity: Quantity,
    ) -> StoreResult<OrderItem> {
        let row = query(
            "INSERT INTO order_items (order_id, product_info_id, quantity) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (order_id, product_info_id) \
             DO UPDATE SET quantity = order_items.quantity + EXCLUDED.quantity \
             RETURNING order_id, product_info_id, quantity",
        )
        .bind(order.into_inner())
        .bind(product_info.into_inner())
        .bind(i64::from(u32::from(quantity)))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        ItemRow::try_from(row).map_err(map_sqlx_error)?.into_item()
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, order: OrderId, product_info: ProductInfoId) -> StoreResult<bool> {
        let result = query(
            "DELETE FROM order_items WHERE order_id = $1 AND product_info_id = $2",
        )
        .bind(order.into_inner())
        .bind(product_info.into_inner())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        query("DELETE FROM orders WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn confirm_basket(&self, id: OrderId, contact: ContactId) -> StoreResult<Order> {
        let sql = "UPDATE orders SET state = 'new', contact_id = $2 \
                   WHERE id = $1 AND state = 'basket' \
                   RETURNING id, user_id, created_at, state, contact_id";
        let row = query(sql)
            .bind(id.into_inner())
            .bind(contact.into_inner())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| StoreError::MissingRow(format!("no open basket with id {id}")))?;
        OrderRow::try_from(row).map_err(map_sqlx_error)?.into_order()
    }

    #[instrument(skip(self))]
    async fn set_state(&self, id: OrderId, state: OrderState) -> StoreResult<Order> {
        let sql = "UPDATE orders SET state = $2 WHERE id = $1 \
                   RETURNING id, user_id, created_at, state, contact_id";
        let row = query(sql)
            .bind(id.into_inner())
            .bind(state.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| StoreError::MissingRow(format!("no order with id {id}")))?;
        OrderRow::try_from(row).map_err(map_sqlx_error)?.into_order()
    }
}

#[async_trait]
impl ContactStore for PostgresStore {
    #[instrument(skip(self, contact))]
    async fn insert_contact(&self, contact: Contact) -> StoreResult<Contact> {
        query(
            "INSERT INTO contacts \
             (id, owner_id, city, street, house, structure, building, apartment, phone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(contact.id.into_inner())
        .bind(contact.owner.into_inner())
        .bind(&contact.city)
        .bind(&contact.street)
        .bind(&contact.house)
        .bind(&contact.structure)
        .bind(&contact.building)
        .bind(&contact.apartment)
        .bind(&contact.phone)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(contact)
    }

    #[instrument(skip(self))]
    async fn find_contact(&self, id: ContactId) -> StoreResult<Option<Contact>> {
        let row = query(
            "SELECT id, owner_id, city, street, house, structure, building, apartment, phone \
             FROM contacts WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        row.map(|r| contact_from_row(&r)).transpose()
    }

    #[instrument(skip(self))]
    async fn contacts_for(&self, owner: UserId) -> StoreResult<Vec<Contact>> {
        let rows = query(
            "SELECT id, owner_id, city, street, house, structure, building, apartment, phone \
             FROM contacts WHERE owner_id = $1 ORDER BY city, street",
        )
        .bind(owner.into_inner())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(contact_from_row).collect()
    }

    #[instrument(skip(self, contact))]
    async fn update_contact(&self, contact: Contact) -> StoreResult<Contact> {
        let result = query(
            "UPDATE contacts SET city = $2, street = $3, house = $4, structure = $5, \
             building = $6, apartment = $7, phone = $8 WHERE id = $1",
        )
        .bind(contact.id.into_inner())
        .bind(&contact.city)
        .bind(&contact.street)
        .bind(&contact.house)
        .bind(&contact.structure)
        .bind(&contact.building)
        .bind(&contact.apartment)
        .bind(&contact.phone)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow(format!(
                "no contact with id {}",
                contact.id
            )));
        }
        Ok(contact)
    }

    #[instrument(skip(self))]
    async fn delete_contact(&self, id: ContactId) -> StoreResult<()> {
        let result = query("DELETE FROM contacts WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRow(format!("no contact with id {id}")));
        }
        Ok(())
    }
}
