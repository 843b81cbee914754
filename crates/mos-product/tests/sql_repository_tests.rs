//! Product module against a real SQLite database.

use std::sync::Arc;

use async_trait::async_trait;
use mos_core::{
    InProcessEventBus, RequestContext, SqlUnitOfWork, Transactional, UnitOfWork, UnitOfWorkExt,
    USER_ID,
};
use mos_product::{
    AclError, NewProduct, OwnerDirectory, Product, ProductError, ProductRepository,
    ProductService, SqlProductRepository,
};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

struct EveryoneActive;

#[async_trait]
impl OwnerDirectory for EveryoneActive {
    async fn is_active_user(
        &self,
        _ctx: &mut RequestContext,
        _user_id: &str,
    ) -> Result<bool, AclError> {
        Ok(true)
    }
}

struct Fixture {
    _dir: TempDir,
    repo: Arc<SqlProductRepository>,
    service: ProductService,
    bus: Arc<InProcessEventBus>,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("products.db").display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();

    let uow: Arc<dyn UnitOfWork> = Arc::new(SqlUnitOfWork::new(pool.clone()));
    let repo = Arc::new(SqlProductRepository::new(pool, uow));
    repo.init_schema().await.unwrap();

    let bus = Arc::new(InProcessEventBus::new());
    let service = ProductService::new(repo.clone(), Arc::new(EveryoneActive), bus.clone());
    Fixture {
        _dir: dir,
        repo,
        service,
        bus,
    }
}

fn owner_ctx() -> RequestContext {
    RequestContext::for_request("req-sql").with(USER_ID, "owner-1".to_string())
}

fn new_product(sku: &str, stock: i64) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: format!("Item {}", sku),
        description: None,
        price_cents: 1250,
        stock,
    }
}

#[tokio::test]
async fn test_create_and_find_by_sku() {
    let fx = fixture().await;
    let mut rx = fx.bus.subscribe();
    let mut ctx = owner_ctx();

    let created = fx
        .service
        .create_product(&mut ctx, new_product("mug-1", 10))
        .await
        .unwrap();
    let loaded = fx.repo.find_by_sku(&mut ctx, "MUG-1").await.unwrap().unwrap();

    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.stock, 10);
    assert_eq!(loaded.owner_id, "owner-1");
    assert_eq!(rx.try_recv().unwrap().name, "product.created");
}

#[tokio::test]
async fn test_unique_sku_violation_maps_to_conflict() {
    let fx = fixture().await;
    let mut ctx = RequestContext::new();
    fx.repo
        .insert(&mut ctx, &Product::new("CUP-1", "Cup", 300, "owner-1"))
        .await
        .unwrap();

    let err = fx
        .repo
        .insert(&mut ctx, &Product::new("CUP-1", "Other cup", 400, "owner-2"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
    assert!(matches!(ProductError::from(err), ProductError::Conflict(_)));
}

#[tokio::test]
async fn test_failed_adjustment_leaves_stock_untouched() {
    let fx = fixture().await;
    let mut ctx = owner_ctx();
    let product = fx
        .service
        .create_product(&mut ctx, new_product("pen-1", 2))
        .await
        .unwrap();

    let err = fx
        .service
        .adjust_stock(&mut ctx, &product.id, -5)
        .await
        .unwrap_err();
    assert!(matches!(err, ProductError::InsufficientStock { .. }));

    let stored = fx.repo.find_by_id(&mut ctx, &product.id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 2);
}

#[tokio::test]
async fn test_outer_rollback_discards_stock_change() {
    let fx = fixture().await;
    let mut ctx = owner_ctx();
    let product = fx
        .service
        .create_product(&mut ctx, new_product("ink-1", 4))
        .await
        .unwrap();

    let uow = fx.repo.unit_of_work();
    uow.start_context(&mut ctx).await.unwrap();
    let mut changed = product.clone();
    changed.stock = 0;
    assert!(fx.repo.update(&mut ctx, &changed).await.unwrap());

    let outer: Result<(), ProductError> = Err(ProductError::Validation("order rejected".into()));
    let result = uow.defer_error_context(&mut ctx, outer).await;
    assert!(result.is_err());

    let stored = fx.repo.find_by_id(&mut ctx, &product.id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 4);
}

#[tokio::test]
async fn test_list_by_owner_and_delete() {
    let fx = fixture().await;
    let mut ctx = owner_ctx();
    for sku in ["A-1", "A-2", "A-3"] {
        fx.service
            .create_product(&mut ctx, new_product(sku, 1))
            .await
            .unwrap();
    }
    fx.repo
        .insert(&mut ctx, &Product::new("B-1", "Foreign", 100, "owner-2"))
        .await
        .unwrap();

    let mine = fx
        .service
        .list_products(&mut ctx, Some("owner-1"), 0, 10)
        .await
        .unwrap();
    assert_eq!(mine.len(), 3);
    assert!(mine.windows(2).all(|pair| pair[0].id < pair[1].id));

    let all = fx.service.list_products(&mut ctx, None, 0, 10).await.unwrap();
    assert_eq!(all.len(), 4);

    fx.service.delete_product(&mut ctx, &mine[0].id).await.unwrap();
    assert!(fx.repo.find_by_id(&mut ctx, &mine[0].id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_past_signed_range_is_empty() {
    let fx = fixture().await;
    let mut ctx = owner_ctx();
    fx.service
        .create_product(&mut ctx, new_product("A-1", 1))
        .await
        .unwrap();

    let page = fx.repo.list(&mut ctx, None, u64::MAX, 10).await.unwrap();
    assert!(page.is_empty());
    let page = fx.repo.list(&mut ctx, Some("owner-1"), 0, u64::MAX).await.unwrap();
    assert_eq!(page.len(), 1);
}
