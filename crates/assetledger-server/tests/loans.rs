//! Invariant-focused tests against [`LoanEngine`] driven directly (not over
//! HTTP, unlike `tests/scenarios.rs`) so each assertion can inspect engine
//! return values precisely: A1/A2 (asset item status tracks loan membership)
//! and L2 (a line is exactly one of asset-item or stock).

mod common;

use assetledger_core::authz::{Identity, Role};
use assetledger_core::audit::RequestContext;
use assetledger_core::loans::{LineSpec, LoanEngine};
use common::{seed_asset_item, seed_asset_model, seed_employee, seed_stock_item};
use sqlx::PgPool;
use uuid::Uuid;

fn ctx() -> RequestContext {
    RequestContext {
        ip: None,
        user_agent: None,
    }
}

fn admin(user_id: Uuid) -> Identity {
    Identity {
        user_id,
        role: Role::Admin,
        token_issued_at: chrono::Utc::now(),
    }
}

#[sqlx::test]
async fn asset_item_line_flips_status_and_blocks_double_loan(pool: PgPool) {
    let model = seed_asset_model(&pool, "laptop", "Dell", "Latitude").await;
    let asset_item = seed_asset_item(&pool, model.id, "TAG-100").await;
    let employee = seed_employee(&pool, "Robin", "Yu", None).await;

    let engine = LoanEngine::new(pool.clone());
    let actor = admin(Uuid::new_v4());

    let loan = engine
        .create(
            &actor,
            employee.id,
            vec![LineSpec::Asset {
                asset_item_id: asset_item.id,
            }],
            &ctx(),
        )
        .await
        .expect("first loan on an IN_STOCK item succeeds");

    assert_eq!(loan.lines.len(), 1);

    let mut conn = pool.acquire().await.unwrap();
    let refreshed = assetledger_core::store::asset_items::find_by_id(&mut conn, asset_item.id)
        .await
        .unwrap();
    assert_eq!(refreshed.status, "LENT");

    let second = engine
        .create(
            &actor,
            employee.id,
            vec![LineSpec::Asset {
                asset_item_id: asset_item.id,
            }],
            &ctx(),
        )
        .await;
    assert!(second.is_err(), "a LENT asset item cannot start a second open loan (A1)");
}

#[sqlx::test]
async fn close_reverses_asset_and_stock_effects(pool: PgPool) {
    let model = seed_asset_model(&pool, "phone", "Apple", "iPhone").await;
    let asset_item = seed_asset_item(&pool, model.id, "TAG-200").await;
    let stock_item = seed_stock_item(&pool, model.id, 10, 0).await;
    let employee = seed_employee(&pool, "Sam", "Okafor", None).await;

    let engine = LoanEngine::new(pool.clone());
    let actor = admin(Uuid::new_v4());

    let loan = engine
        .create(
            &actor,
            employee.id,
            vec![
                LineSpec::Asset {
                    asset_item_id: asset_item.id,
                },
                LineSpec::Stock {
                    asset_model_id: model.id,
                    quantity: 3,
                },
            ],
            &ctx(),
        )
        .await
        .unwrap();

    engine
        .sign(
            &actor,
            loan.loan.id,
            assetledger_core::loans::SignatureKind::Pickup,
            "https://example.com/p.png",
            chrono::Utc::now(),
            &ctx(),
        )
        .await
        .unwrap();
    engine
        .sign(
            &actor,
            loan.loan.id,
            assetledger_core::loans::SignatureKind::Return,
            "https://example.com/r.png",
            chrono::Utc::now(),
            &ctx(),
        )
        .await
        .unwrap();

    engine.close(&actor, loan.loan.id, &ctx()).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let refreshed_item = assetledger_core::store::asset_items::find_by_id(&mut conn, asset_item.id)
        .await
        .unwrap();
    assert_eq!(refreshed_item.status, "IN_STOCK");

    let refreshed_stock = assetledger_core::store::stock_items::find_by_id(&mut conn, stock_item.id)
        .await
        .unwrap();
    assert_eq!(refreshed_stock.loaned, 0);
}

#[sqlx::test]
async fn soft_delete_reverses_open_line_effects(pool: PgPool) {
    let model = seed_asset_model(&pool, "monitor", "Dell", "U2720Q").await;
    let asset_item = seed_asset_item(&pool, model.id, "TAG-300").await;
    let employee = seed_employee(&pool, "Lee", "Park", None).await;

    let engine = LoanEngine::new(pool.clone());
    let actor = admin(Uuid::new_v4());

    let loan = engine
        .create(
            &actor,
            employee.id,
            vec![LineSpec::Asset {
                asset_item_id: asset_item.id,
            }],
            &ctx(),
        )
        .await
        .unwrap();

    engine.soft_delete(&actor, loan.loan.id, &ctx()).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let refreshed = assetledger_core::store::asset_items::find_by_id(&mut conn, asset_item.id)
        .await
        .unwrap();
    assert_eq!(
        refreshed.status,
        "IN_STOCK",
        "soft-deleting an open loan must reverse its line effects (A1/A2/S1 preserved)"
    );
}
