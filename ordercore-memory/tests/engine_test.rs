//! Behavioral tests for the basket/order engine, driven end to end against
//! the in-memory store.

use std::sync::Arc;

use ordercore::{
    CatalogQuery, CatalogSort, Category, CategoryId, DiscountPercent, ErrorClass, Money,
    NewContact, Notification, OrderEngine, OrderError, OrderState, Parameter, ParameterId,
    Principal, Product, ProductId, ProductInfo, ProductInfoId, ProductName, ProductParameter,
    Shop, ShopId, UserId,
};
use ordercore_memory::{CollectingDispatcher, FailingDispatcher, InMemoryStore};

type Engine = OrderEngine<InMemoryStore, CollectingDispatcher>;

struct Fixture {
    store: InMemoryStore,
    dispatcher: CollectingDispatcher,
    engine: Engine,
    user: UserId,
    category: CategoryId,
    shop: ShopId,
}

impl Fixture {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let dispatcher = CollectingDispatcher::new();
        let engine = OrderEngine::new(store.clone(), dispatcher.clone());

        let shop = ShopId::generate();
        store.insert_shop(Shop {
            id: shop,
            name: "connected-shop".to_string(),
            url: None,
            accepts_orders: true,
        });
        let category = CategoryId::generate();
        store.insert_category(Category {
            id: category,
            name: "electronics".to_string(),
        });

        Self {
            store,
            dispatcher,
            engine,
            user: UserId::generate(),
            category,
            shop,
        }
    }

    /// Seeds one product with one listing carrying the given stock and
    /// price, returning the listing id.
    fn seed_listing(&self, name: &str, stock: u32, price_cents: u64) -> ProductInfoId {
        self.seed_listing_with(name, stock, price_cents, None)
    }

    fn seed_listing_with(
        &self,
        name: &str,
        stock: u32,
        price_cents: u64,
        discount: Option<DiscountPercent>,
    ) -> ProductInfoId {
        let product = ProductId::generate();
        self.store
            .insert_product(Product {
                id: product,
                name: ProductName::try_new(name.to_string()).unwrap(),
                model: String::new(),
                external_id: format!("prod-{product}"),
                brand: "acme".to_string(),
                category: self.category,
                description: format!("{name} description"),
            })
            .unwrap();

        let listing = ProductInfoId::generate();
        self.store
            .insert_product_info(ProductInfo {
                id: listing,
                product,
                shop: self.shop,
                model: String::new(),
                external_id: format!("info-{listing}"),
                quantity: stock,
                price: Money::from_cents(price_cents).unwrap(),
                price_rrc: Money::from_cents(price_cents).unwrap(),
                discount,
            })
            .unwrap();
        listing
    }

    async fn seed_contact(&self) -> ordercore::ContactId {
        self.engine
            .add_contact(
                self.user,
                NewContact {
                    city: "Moscow".to_string(),
                    street: "Arbat".to_string(),
                    house: Some("10".to_string()),
                    structure: None,
                    building: None,
                    apartment: None,
                    phone: "+7 900 000-00-00".to_string(),
                },
            )
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn basket_stays_singleton_under_concurrent_adds() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 100, 1000);
    let engine = Arc::new(fx.engine);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        let user = fx.user;
        handles.push(tokio::spawn(async move {
            engine.add_item(user, listing, 1).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fx.store.basket_count(fx.user), 1);
    let view = engine.basket(fx.user).await.unwrap();
    assert_eq!(view.lines.len(), 1);
    assert_eq!(u32::from(view.lines[0].quantity), 10);
}

#[tokio::test]
async fn adding_the_same_listing_twice_merges_into_one_line() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);

    fx.engine.add_item(fx.user, listing, 2).await.unwrap();
    let merged = fx.engine.add_item(fx.user, listing, 3).await.unwrap();

    assert_eq!(u32::from(merged.quantity), 5);
    let view = fx.engine.basket(fx.user).await.unwrap();
    assert_eq!(view.lines.len(), 1);
}

#[tokio::test]
async fn removing_the_last_item_deletes_the_basket() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);

    let first = fx.engine.get_or_create_basket(fx.user).await.unwrap();
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    fx.engine.remove_item(fx.user, listing).await.unwrap();

    // The emptied basket is gone; the next access creates a fresh one.
    assert_eq!(fx.store.basket_count(fx.user), 0);
    let second = fx.engine.get_or_create_basket(fx.user).await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn removing_from_a_missing_basket_or_line_fails() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);

    let no_basket = fx.engine.remove_item(fx.user, listing).await;
    assert!(matches!(no_basket, Err(OrderError::BasketNotFound)));

    let other = fx.seed_listing("phone", 10, 1000);
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let no_line = fx.engine.remove_item(fx.user, other).await;
    assert!(matches!(no_line, Err(OrderError::ItemNotFound(id)) if id == other));
}

#[tokio::test]
async fn add_rejects_zero_and_missing_listing() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);

    let zero = fx.engine.add_item(fx.user, listing, 0).await;
    assert!(matches!(zero, Err(OrderError::InvalidQuantity(_))));
    assert_eq!(zero.unwrap_err().class(), ErrorClass::Validation);

    let ghost = ProductInfoId::generate();
    let missing = fx.engine.add_item(fx.user, ghost, 1).await;
    assert!(matches!(missing, Err(OrderError::ProductNotFound(id)) if id == ghost));
}

#[tokio::test]
async fn stock_boundary_allows_exact_stock_and_rejects_one_more() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 3, 1000);

    // Exactly the available stock is fine.
    fx.engine.add_item(fx.user, listing, 3).await.unwrap();
    fx.engine.remove_item(fx.user, listing).await.unwrap();

    // One more than stock is not.
    let too_many = fx.engine.add_item(fx.user, listing, 4).await;
    match too_many {
        Err(OrderError::InsufficientStock {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, 4);
            assert_eq!(available, 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
}

#[tokio::test]
async fn stock_check_is_cumulative_over_the_basket() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 3, 1000);

    // 2 + 2 would put the basket at 4 against a stock of 3: the second add
    // is rejected even though each call alone fits.
    fx.engine.add_item(fx.user, listing, 2).await.unwrap();
    let second = fx.engine.add_item(fx.user, listing, 2).await;
    match second {
        Err(OrderError::InsufficientStock {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, 4);
            assert_eq!(available, 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // The basket keeps its pre-rejection quantity.
    let view = fx.engine.basket(fx.user).await.unwrap();
    assert_eq!(u32::from(view.lines[0].quantity), 2);
}

#[tokio::test]
async fn basket_view_renders_names_prices_and_totals() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 100_000);
    // 10% off the 50.00 mouse
    let discount = DiscountPercent::try_new(10).unwrap();
    let discounted = fx.seed_listing_with("mouse", 10, 5_000, Some(discount));

    fx.engine.add_item(fx.user, listing, 2).await.unwrap();
    fx.engine.add_item(fx.user, discounted, 1).await.unwrap();

    let view = fx.engine.basket(fx.user).await.unwrap();
    assert_eq!(view.lines.len(), 2);

    let laptop = view
        .lines
        .iter()
        .find(|l| l.product_info == listing)
        .unwrap();
    assert_eq!(laptop.product_name.as_str(), "laptop");
    assert_eq!(laptop.shop_name, "connected-shop");
    assert_eq!(laptop.unit_price.to_cents(), 100_000);
    assert_eq!(laptop.line_total.to_cents(), 200_000);

    let mouse = view
        .lines
        .iter()
        .find(|l| l.product_info == discounted)
        .unwrap();
    assert_eq!(mouse.unit_price.to_cents(), 4_500);
    assert_eq!(mouse.line_total.to_cents(), 4_500);

    assert_eq!(view.total.to_cents(), 204_500);
}

#[tokio::test]
async fn confirm_requires_basket_items_and_owned_contact() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;

    // No basket at all.
    let no_basket = fx.engine.confirm(fx.user, contact).await;
    assert!(matches!(no_basket, Err(OrderError::BasketNotFound)));

    // Empty basket.
    fx.engine.get_or_create_basket(fx.user).await.unwrap();
    let empty = fx.engine.confirm(fx.user, contact).await;
    assert!(matches!(empty, Err(OrderError::EmptyBasket)));
    assert_eq!(empty.unwrap_err().class(), ErrorClass::Conflict);

    // A contact owned by somebody else is invisible.
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let stranger = UserId::generate();
    let foreign = fx
        .engine
        .add_contact(
            stranger,
            NewContact {
                city: "Kazan".to_string(),
                street: "Bauman".to_string(),
                house: None,
                structure: None,
                building: None,
                apartment: None,
                phone: "+7 901 111-11-11".to_string(),
            },
        )
        .await
        .unwrap();
    let not_owned = fx.engine.confirm(fx.user, foreign.id).await;
    assert!(matches!(not_owned, Err(OrderError::ContactNotFound(id)) if id == foreign.id));
}

#[tokio::test]
async fn confirm_moves_to_new_and_keeps_quantities() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;

    fx.engine.add_item(fx.user, listing, 3).await.unwrap();
    let order = fx.engine.confirm(fx.user, contact).await.unwrap();

    assert_eq!(order.state, OrderState::New);
    assert_eq!(order.contact, Some(contact));

    let view = fx.engine.order(fx.user, order.id).await.unwrap();
    assert_eq!(view.lines.len(), 1);
    assert_eq!(u32::from(view.lines[0].quantity), 3);
    assert_eq!(view.contact.as_ref().map(|c| c.id), Some(contact));

    // Exactly one confirmation notification for the owner.
    let sent = fx.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0],
        Notification::OrderConfirmed { order: o, user } if *o == order.id && *user == fx.user
    ));

    // The open basket is gone: the next access yields a fresh empty one.
    let basket = fx.engine.basket(fx.user).await.unwrap();
    assert_ne!(basket.order, order.id);
    assert!(basket.lines.is_empty());
}

#[tokio::test]
async fn non_staff_actors_can_never_change_status() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let order = fx.engine.confirm(fx.user, contact).await.unwrap();

    let buyer = Principal::buyer(fx.user);
    for state in ["confirmed", "shipped", "basket", ""] {
        let result = fx.engine.update_status(buyer, order.id, state).await;
        assert!(
            matches!(result, Err(OrderError::PermissionDenied(_))),
            "state {state:?} should be gated before anything else"
        );
    }
}

#[tokio::test]
async fn staff_status_updates_validate_state_names() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let order = fx.engine.confirm(fx.user, contact).await.unwrap();

    let staff = Principal::staff(UserId::generate());
    let bogus = fx.engine.update_status(staff, order.id, "shipped").await;
    assert!(matches!(bogus, Err(OrderError::InvalidState(_))));
    assert_eq!(bogus.unwrap_err().class(), ErrorClass::Validation);
}

#[tokio::test]
async fn staff_cannot_revert_a_confirmed_order_to_basket() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let order = fx.engine.confirm(fx.user, contact).await.unwrap();

    let staff = Principal::staff(UserId::generate());
    let revert = fx.engine.update_status(staff, order.id, "basket").await;
    assert!(matches!(revert, Err(OrderError::InvalidState(_))));
}

#[tokio::test]
async fn staff_may_move_orders_in_any_direction_and_owner_is_notified() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let order = fx.engine.confirm(fx.user, contact).await.unwrap();

    let staff = Principal::staff(UserId::generate());
    for state in ["confirmed", "assembled", "sent", "delivered", "new", "canceled"] {
        let updated = fx.engine.update_status(staff, order.id, state).await.unwrap();
        assert_eq!(updated.state.as_str(), state);
    }

    // One OrderConfirmed plus one OrderStatusChanged per actual move.
    let sent = fx.dispatcher.sent();
    let changes: Vec<_> = sent
        .iter()
        .filter_map(|n| match n {
            Notification::OrderStatusChanged { state, user, .. } => {
                assert_eq!(*user, fx.user);
                Some(*state)
            }
            Notification::OrderConfirmed { .. } => None,
        })
        .collect();
    assert_eq!(changes.len(), 6);
    assert_eq!(changes.last(), Some(&OrderState::Canceled));
}

#[tokio::test]
async fn setting_the_current_state_again_does_not_notify() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let order = fx.engine.confirm(fx.user, contact).await.unwrap();
    let already_sent = fx.dispatcher.sent().len();

    let staff = Principal::staff(UserId::generate());
    let unchanged = fx.engine.update_status(staff, order.id, "new").await.unwrap();
    assert_eq!(unchanged.state, OrderState::New);
    assert_eq!(fx.dispatcher.sent().len(), already_sent);
}

#[tokio::test]
async fn a_failing_dispatcher_never_fails_the_operation() {
    let store = InMemoryStore::new();
    let engine = OrderEngine::new(store.clone(), FailingDispatcher);

    let shop = ShopId::generate();
    store.insert_shop(Shop {
        id: shop,
        name: "shop".to_string(),
        url: None,
        accepts_orders: true,
    });
    let category = CategoryId::generate();
    store.insert_category(Category {
        id: category,
        name: "stuff".to_string(),
    });
    let product = ProductId::generate();
    store
        .insert_product(Product {
            id: product,
            name: ProductName::try_new("widget".to_string()).unwrap(),
            model: String::new(),
            external_id: "w-1".to_string(),
            brand: String::new(),
            category,
            description: String::new(),
        })
        .unwrap();
    let listing = ProductInfoId::generate();
    store
        .insert_product_info(ProductInfo {
            id: listing,
            product,
            shop,
            model: String::new(),
            external_id: "wi-1".to_string(),
            quantity: 5,
            price: Money::from_cents(100).unwrap(),
            price_rrc: Money::from_cents(100).unwrap(),
            discount: None,
        })
        .unwrap();

    let user = UserId::generate();
    let contact = engine
        .add_contact(
            user,
            NewContact {
                city: "Tver".to_string(),
                street: "Lenina".to_string(),
                house: None,
                structure: None,
                building: None,
                apartment: None,
                phone: "+7 902 222-22-22".to_string(),
            },
        )
        .await
        .unwrap();

    engine.add_item(user, listing, 1).await.unwrap();
    let order = engine.confirm(user, contact.id).await.unwrap();
    assert_eq!(order.state, OrderState::New);

    let staff = Principal::staff(UserId::generate());
    let updated = engine.update_status(staff, order.id, "sent").await.unwrap();
    assert_eq!(updated.state, OrderState::Sent);
}

#[tokio::test]
async fn order_listing_excludes_the_basket_and_is_newest_first() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 100, 1000);
    let contact = fx.seed_contact().await;

    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let first = fx.engine.confirm(fx.user, contact).await.unwrap();
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let second = fx.engine.confirm(fx.user, contact).await.unwrap();

    // Leave an open basket around; it must not show up.
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();

    let orders = fx.engine.orders(fx.user).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, second.id);
    assert_eq!(orders[1].id, first.id);
    assert!(orders.iter().all(|o| o.state != OrderState::Basket));
}

#[tokio::test]
async fn order_detail_is_scoped_to_the_owner() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 10, 1000);
    let contact = fx.seed_contact().await;
    fx.engine.add_item(fx.user, listing, 1).await.unwrap();
    let order = fx.engine.confirm(fx.user, contact).await.unwrap();

    let stranger = UserId::generate();
    let result = fx.engine.order(stranger, order.id).await;
    assert!(matches!(result, Err(OrderError::OrderNotFound(id)) if id == order.id));
    assert_eq!(result.unwrap_err().class(), ErrorClass::NotFound);
}

#[tokio::test]
async fn contact_updates_and_deletes_are_owner_scoped() {
    let fx = Fixture::new();
    let contact = fx.seed_contact().await;
    let stranger = UserId::generate();

    let foreign_update = fx
        .engine
        .update_contact(stranger, contact, ordercore::ContactUpdate::default())
        .await;
    assert!(matches!(foreign_update, Err(OrderError::ContactNotFound(_))));

    let foreign_delete = fx.engine.delete_contact(stranger, contact).await;
    assert!(matches!(foreign_delete, Err(OrderError::ContactNotFound(_))));

    let update = ordercore::ContactUpdate {
        city: Some("Sochi".to_string()),
        ..ordercore::ContactUpdate::default()
    };
    let updated = fx.engine.update_contact(fx.user, contact, update).await.unwrap();
    assert_eq!(updated.city, "Sochi");

    fx.engine.delete_contact(fx.user, contact).await.unwrap();
    assert!(fx.engine.contacts(fx.user).await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_parameters_resolve_names_and_units() {
    let fx = Fixture::new();
    let listing = fx.seed_listing("laptop", 5, 100_000);
    let other = fx.seed_listing("phone", 5, 50_000);

    let diagonal = ParameterId::generate();
    fx.store.insert_parameter(Parameter {
        id: diagonal,
        name: "diagonal".to_string(),
        unit: Some("inch".to_string()),
    });
    let weight = ParameterId::generate();
    fx.store.insert_parameter(Parameter {
        id: weight,
        name: "weight".to_string(),
        unit: Some("kg".to_string()),
    });
    fx.store
        .insert_product_parameter(ProductParameter {
            product_info: listing,
            parameter: diagonal,
            value: "15.6".to_string(),
        })
        .unwrap();
    fx.store
        .insert_product_parameter(ProductParameter {
            product_info: other,
            parameter: weight,
            value: "0.2".to_string(),
        })
        .unwrap();

    let all = fx.engine.parameters().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "diagonal");
    assert_eq!(all[1].name, "weight");

    // Only the listing's own values come back, names resolved.
    let resolved = fx.engine.listing_parameters(listing).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].name, "diagonal");
    assert_eq!(resolved[0].unit.as_deref(), Some("inch"));
    assert_eq!(resolved[0].value, "15.6");

    let ghost = ProductInfoId::generate();
    let unknown = fx.engine.listing_parameters(ghost).await;
    assert!(matches!(unknown, Err(OrderError::ProductNotFound(id)) if id == ghost));
}

#[tokio::test]
async fn catalog_browse_filters_and_sorts_through_the_engine() {
    let fx = Fixture::new();
    fx.seed_listing("laptop", 5, 300);
    fx.seed_listing("phone", 0, 100);
    fx.seed_listing("cable", 50, 200);

    let in_stock = fx
        .engine
        .products(&CatalogQuery {
            min_stock: Some(1),
            sort: Some(CatalogSort::PriceAsc),
            ..CatalogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(in_stock.len(), 2);
    assert_eq!(in_stock[0].product_name.as_str(), "cable");
    assert_eq!(in_stock[1].product_name.as_str(), "laptop");

    let searched = fx
        .engine
        .products(&CatalogQuery {
            search: Some("LAPTOP".to_string()),
            ..CatalogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
}
