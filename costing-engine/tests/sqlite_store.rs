//! SQLite adapter behavior: migrations, atomic stock guard, transactional
//! recipe commits. Uses a scratch database per test.

use costing_engine::Config;
use costing_engine::db::{CostingStore, DbService, SqliteStore, StoreError};
use costing_engine::notify::RecordingNotifier;
use costing_engine::services::dish_cost::RecipeSaveInput;
use costing_engine::services::recipe_cost::RecipeLineInput;
use costing_engine::services::{DishCostService, Services, StockLedger};
use shared::models::{FoodItem, Ingredient, TransactionType};
use shared::util::snowflake_id;
use std::sync::Arc;
use tempfile::TempDir;

async fn open_store() -> (Arc<SqliteStore>, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("costing-test.db");
    let db = DbService::new(path.to_str().expect("utf8 path"))
        .await
        .expect("open db");
    (Arc::new(SqliteStore::new(db.pool)), dir)
}

fn ingredient(id: i64, name: &str, unit_cost: f64, stock: f64) -> Ingredient {
    Ingredient {
        id,
        name: name.to_string(),
        unit: "kg".to_string(),
        unit_cost,
        stock_quantity: stock,
        reorder_level: 1.0,
        is_active: true,
    }
}

#[tokio::test]
async fn ingredient_roundtrip_and_batched_get() -> anyhow::Result<()> {
    let (store, _dir) = open_store().await;
    store.insert_ingredient(ingredient(1, "Flour", 2.0, 10.0)).await?;
    store.insert_ingredient(ingredient(2, "Salt", 1.0, 5.0)).await?;

    let one = store.ingredient(1).await?.expect("flour");
    assert_eq!(one.name, "Flour");
    assert_eq!(one.stock_quantity, 10.0);

    // Batched get skips unknown ids instead of failing
    let batch = store.ingredients_by_ids(&[1, 2, 99]).await?;
    assert_eq!(batch.len(), 2);

    Ok(())
}

#[tokio::test]
async fn stock_delta_is_guarded_and_atomic() -> anyhow::Result<()> {
    let (store, _dir) = open_store().await;
    store.insert_ingredient(ingredient(1, "Flour", 2.0, 5.0)).await?;

    let movement = store.apply_stock_delta(1, -2.0).await?;
    assert_eq!(movement.previous_quantity, 5.0);
    assert_eq!(movement.new_quantity, 3.0);

    // Driving below zero is rejected without mutation
    let err = store.apply_stock_delta(1, -4.0).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock { available, .. } if available == 3.0
    ));
    assert_eq!(store.ingredient(1).await?.expect("flour").stock_quantity, 3.0);

    // Unknown ingredient is NotFound, not InsufficientStock
    assert!(matches!(
        store.apply_stock_delta(99, -1.0).await.unwrap_err(),
        StoreError::NotFound(_)
    ));

    Ok(())
}

#[tokio::test]
async fn concurrent_deltas_serialize_in_the_store() -> anyhow::Result<()> {
    let (store, _dir) = open_store().await;
    store.insert_ingredient(ingredient(1, "Flour", 2.0, 5.0)).await?;

    let s1 = store.clone();
    let s2 = store.clone();
    let a = tokio::spawn(async move { s1.apply_stock_delta(1, -2.0).await });
    let b = tokio::spawn(async move { s2.apply_stock_delta(1, -2.0).await });
    a.await??;
    b.await??;

    assert_eq!(store.ingredient(1).await?.expect("flour").stock_quantity, 1.0);
    Ok(())
}

#[tokio::test]
async fn recipe_save_commits_all_tables() -> anyhow::Result<()> {
    // Wire the whole engine the way the application does, from a config
    let dir = TempDir::new()?;
    let config = Config {
        database_path: dir
            .path()
            .join("costing.db")
            .to_str()
            .expect("utf8 path")
            .to_string(),
        ..Config::default()
    };
    let notifier = Arc::new(RecordingNotifier::new());
    let services = Services::open_sqlite(&config, notifier.clone()).await?;
    let dishes = services.dishes;
    let store = services.store;

    store
        .insert_food_item(FoodItem {
            id: 7,
            name: "Bread".to_string(),
            cost: 0.0,
            price: 0.0,
            is_active: true,
        })
        .await?;
    store.insert_ingredient(ingredient(1, "Flour", 2.0, 10.0)).await?;
    store.insert_ingredient(ingredient(2, "Salt", 1.0, 5.0)).await?;

    let input = RecipeSaveInput {
        food_item_id: 7,
        name: "Bread".to_string(),
        serves: 4,
        lines: vec![
            RecipeLineInput { ingredient_id: 1, quantity: 0.5, unit: None },
            RecipeLineInput { ingredient_id: 2, quantity: 0.01, unit: None },
        ],
    };
    let summary = dishes.save_recipe(input.clone()).await?;
    assert_eq!(summary.total_cost, 1.01);
    assert_eq!(summary.cost_per_serving, 0.2525);

    let recipe = store.recipe_by_food_item(7).await?.expect("recipe");
    assert_eq!(recipe.serves, 4);
    assert_eq!(store.recipe_ingredients(recipe.id).await?.len(), 2);

    let dish = store.dish_cost_by_food_item(7).await?.expect("dish cost");
    assert_eq!(dish.profit_margin, 70.0);
    assert_eq!(store.dish_ingredients(dish.id).await?.len(), 2);

    let item = store.food_item(7).await?.expect("food item");
    assert_eq!(item.cost, 1.01);
    assert_eq!(item.price, 3.37);

    // Replace-all on a second save: same recipe id, still two lines
    let again = dishes.save_recipe(input).await?;
    assert_eq!(again.recipe_id, recipe.id);
    assert_eq!(store.recipe_ingredients(recipe.id).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn recipe_save_for_unknown_dish_leaves_nothing_behind() -> anyhow::Result<()> {
    let (store, _dir) = open_store().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let dishes = DishCostService::new(store.clone(), notifier);
    store.insert_ingredient(ingredient(1, "Flour", 2.0, 10.0)).await?;

    let result = dishes
        .save_recipe(RecipeSaveInput {
            food_item_id: 404,
            name: "Ghost dish".to_string(),
            serves: 2,
            lines: vec![RecipeLineInput { ingredient_id: 1, quantity: 1.0, unit: None }],
        })
        .await;
    assert!(result.is_err());
    assert!(store.recipe_by_food_item(404).await?.is_none());
    assert!(store.dish_cost_by_food_item(404).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn ledger_appends_survive_roundtrip() -> anyhow::Result<()> {
    let (store, _dir) = open_store().await;
    let notifier = Arc::new(RecordingNotifier::new());
    let ledger = StockLedger::new(store.clone(), notifier);
    store.insert_ingredient(ingredient(1, "Flour", 2.0, 10.0)).await?;

    ledger.purchase(1, 5.0, Some("weekly delivery".to_string())).await?;
    ledger.waste(1, 0.5, Some("spilled".to_string())).await?;

    let history = ledger.history(1, 10).await?;
    assert_eq!(history.len(), 2);

    let purchase = history
        .iter()
        .find(|t| t.transaction_type == TransactionType::Purchase)
        .expect("purchase entry");
    assert_eq!(purchase.quantity, 5.0);
    assert_eq!(purchase.previous_quantity, 10.0);
    assert_eq!(purchase.new_quantity, 15.0);
    assert_eq!(purchase.notes.as_deref(), Some("weekly delivery"));

    let waste = history
        .iter()
        .find(|t| t.transaction_type == TransactionType::Waste)
        .expect("waste entry");
    assert_eq!(waste.quantity, -0.5);
    assert_eq!(waste.new_quantity, 14.5);

    Ok(())
}

#[tokio::test]
async fn snowflake_ids_fit_sqlite_integers() {
    // Sanity: generated ids are positive 53-bit values (safe as INTEGER
    // PRIMARY KEY and as a JavaScript number)
    for _ in 0..100 {
        let id = snowflake_id();
        assert!(id > 0);
        assert!(id < (1_i64 << 53));
    }
}
