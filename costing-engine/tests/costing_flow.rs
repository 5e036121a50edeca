//! End-to-end engine flow against the in-memory store: catalog → recipe
//! save → price push → order deduction → ledger history.

use costing_engine::db::{CostingStore, MemoryStore};
use costing_engine::notify::RecordingNotifier;
use costing_engine::services::dish_cost::{DishPricingPatch, RecipeSaveInput};
use costing_engine::services::recipe_cost::RecipeLineInput;
use costing_engine::services::{DishCostService, IngredientCatalog, OrderDeductor, StockLedger};
use costing_engine::{CostingError, DeductionPolicy};
use shared::models::{FoodItem, IngredientCreate, TransactionType};
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    catalog: IngredientCatalog,
    dishes: DishCostService,
    ledger: StockLedger,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        Self {
            catalog: IngredientCatalog::new(store.clone()),
            dishes: DishCostService::new(store.clone(), notifier.clone()),
            ledger: StockLedger::new(store.clone(), notifier.clone()),
            store,
            notifier,
        }
    }

    fn deductor(&self, policy: DeductionPolicy) -> OrderDeductor {
        OrderDeductor::new(self.store.clone(), self.notifier.clone(), policy)
    }

    async fn add_food_item(&self, id: i64, name: &str) {
        self.store
            .insert_food_item(FoodItem {
                id,
                name: name.to_string(),
                cost: 0.0,
                price: 0.0,
                is_active: true,
            })
            .await
            .unwrap();
    }

    async fn add_ingredient(&self, name: &str, unit_cost: f64, stock: f64, reorder: f64) -> i64 {
        self.catalog
            .create(IngredientCreate {
                name: name.to_string(),
                unit: "kg".to_string(),
                unit_cost,
                stock_quantity: Some(stock),
                reorder_level: Some(reorder),
            })
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn full_costing_and_deduction_flow() {
    let h = Harness::new();
    h.add_food_item(1, "Margherita").await;
    let dough = h.add_ingredient("Dough", 1.2, 20.0, 5.0).await;
    let tomato = h.add_ingredient("Tomato base", 2.5, 8.0, 2.0).await;
    let mozzarella = h.add_ingredient("Mozzarella", 6.0, 4.0, 1.0).await;

    // Recipe for 2 pizzas
    let summary = h
        .dishes
        .save_recipe(RecipeSaveInput {
            food_item_id: 1,
            name: "Margherita".to_string(),
            serves: 2,
            lines: vec![
                RecipeLineInput { ingredient_id: dough, quantity: 0.5, unit: None },
                RecipeLineInput { ingredient_id: tomato, quantity: 0.2, unit: None },
                RecipeLineInput { ingredient_id: mozzarella, quantity: 0.25, unit: None },
            ],
        })
        .await
        .unwrap();

    // 0.6 + 0.5 + 1.5 = 2.6, per serving 1.3
    assert_eq!(summary.total_cost, 2.6);
    assert_eq!(summary.cost_per_serving, 1.3);

    // Default margin 70 -> 2.6 / 0.3 = 8.67, pushed to the catalog entry
    let item = h.store.food_item(1).await.unwrap().unwrap();
    assert_eq!(item.cost, 2.6);
    assert_eq!(item.price, 8.67);

    // Sell 3 pizzas: every line scales by 3/2
    let report = h
        .deductor(DeductionPolicy::BestEffort)
        .deduct(1, 3)
        .await
        .unwrap();
    assert!(report.recipe_found);
    assert_eq!(report.failures.len(), 0);

    for (id, expected) in [(dough, 19.25), (tomato, 7.7), (mozzarella, 3.625)] {
        let ingredient = h.store.ingredient(id).await.unwrap().unwrap();
        assert_eq!(ingredient.stock_quantity, expected);
    }

    // Every movement hit the ledger with the right bounds
    let history = h.ledger.history(mozzarella, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].transaction_type, TransactionType::Consumption);
    assert_eq!(history[0].previous_quantity, 4.0);
    assert_eq!(history[0].new_quantity, 3.625);
    assert_eq!(history[0].reference_id, Some(1));
}

#[tokio::test]
async fn deduction_failure_keeps_other_lines_best_effort() {
    let h = Harness::new();
    h.add_food_item(1, "Stew").await;
    let beef = h.add_ingredient("Beef", 9.0, 10.0, 2.0).await;
    let wine = h.add_ingredient("Red wine", 4.0, 0.3, 1.0).await;

    h.dishes
        .save_recipe(RecipeSaveInput {
            food_item_id: 1,
            name: "Stew".to_string(),
            serves: 4,
            lines: vec![
                RecipeLineInput { ingredient_id: beef, quantity: 1.0, unit: None },
                RecipeLineInput { ingredient_id: wine, quantity: 0.5, unit: None },
            ],
        })
        .await
        .unwrap();

    // 4 servings need 0.5 wine but only 0.3 in stock
    let report = h
        .deductor(DeductionPolicy::BestEffort)
        .deduct(1, 4)
        .await
        .unwrap();
    assert_eq!(report.deducted.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].ingredient_id, wine);

    // Beef deducted, wine untouched, one error notification
    assert_eq!(h.store.ingredient(beef).await.unwrap().unwrap().stock_quantity, 9.0);
    assert_eq!(h.store.ingredient(wine).await.unwrap().unwrap().stock_quantity, 0.3);
    assert_eq!(h.notifier.error_messages().len(), 1);
}

#[tokio::test]
async fn insufficient_stock_raises_and_leaves_state() {
    let h = Harness::new();
    let flour = h.add_ingredient("Flour", 2.0, 10.0, 2.0).await;

    let err = h
        .ledger
        .waste(flour, 12.0, Some("burnt batch".to_string()))
        .await
        .unwrap_err();
    match err {
        CostingError::NegativeStock { ingredient_id, requested, available } => {
            assert_eq!(ingredient_id, flour);
            assert_eq!(requested, 12.0);
            assert_eq!(available, 10.0);
        }
        other => panic!("expected NegativeStock, got {other:?}"),
    }
    assert_eq!(h.store.ingredient(flour).await.unwrap().unwrap().stock_quantity, 10.0);
    assert!(h.ledger.history(flour, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_deductions_never_lose_updates() {
    let h = Harness::new();
    let flour = h.add_ingredient("Flour", 2.0, 5.0, 0.0).await;

    let l1 = h.ledger.clone();
    let l2 = h.ledger.clone();
    let a = tokio::spawn(async move {
        l1.adjust(flour, -2.0, TransactionType::Consumption, None, None).await
    });
    let b = tokio::spawn(async move {
        l2.adjust(flour, -2.0, TransactionType::Consumption, None, None).await
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Both decrements must land: 5 - 2 - 2 = 1
    assert_eq!(h.store.ingredient(flour).await.unwrap().unwrap().stock_quantity, 1.0);
    assert_eq!(h.ledger.history(flour, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn low_stock_report_after_consumption() {
    let h = Harness::new();
    h.add_food_item(1, "Toast").await;
    let butter = h.add_ingredient("Butter", 8.0, 3.0, 2.5).await;

    h.dishes
        .save_recipe(RecipeSaveInput {
            food_item_id: 1,
            name: "Toast".to_string(),
            serves: 1,
            lines: vec![RecipeLineInput { ingredient_id: butter, quantity: 0.05, unit: None }],
        })
        .await
        .unwrap();

    assert!(h.catalog.low_stock().await.unwrap().is_empty());

    h.deductor(DeductionPolicy::BestEffort).deduct(1, 12).await.unwrap();

    // 3.0 - 0.6 = 2.4 ≤ reorder 2.5
    let low = h.catalog.low_stock().await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].id, butter);
}

#[tokio::test]
async fn referenced_ingredient_cannot_be_removed() {
    let h = Harness::new();
    h.add_food_item(1, "Soup").await;
    let onion = h.add_ingredient("Onion", 0.9, 5.0, 1.0).await;

    h.dishes
        .save_recipe(RecipeSaveInput {
            food_item_id: 1,
            name: "Soup".to_string(),
            serves: 2,
            lines: vec![RecipeLineInput { ingredient_id: onion, quantity: 0.4, unit: None }],
        })
        .await
        .unwrap();

    assert!(matches!(
        h.catalog.remove(onion).await,
        Err(CostingError::Validation(_))
    ));
    assert!(h.store.ingredient(onion).await.unwrap().is_some());
}

#[tokio::test]
async fn manual_price_survives_recipe_resave() {
    let h = Harness::new();
    h.add_food_item(1, "Cake").await;
    let sugar = h.add_ingredient("Sugar", 1.5, 10.0, 1.0).await;

    let input = RecipeSaveInput {
        food_item_id: 1,
        name: "Cake".to_string(),
        serves: 8,
        lines: vec![RecipeLineInput { ingredient_id: sugar, quantity: 0.4, unit: None }],
    };
    h.dishes.save_recipe(input.clone()).await.unwrap();
    h.dishes
        .update_pricing(
            1,
            DishPricingPatch {
                use_manual_price: Some(true),
                manual_price: Some(12.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Re-saving the recipe keeps the pinned price on the food item
    h.dishes.save_recipe(input).await.unwrap();
    assert_eq!(h.store.food_item(1).await.unwrap().unwrap().price, 12.0);
}
