//! Integration tests for catalog, profile and checkout services over HTTP.

#![allow(clippy::unwrap_used)]

use tienda_core::{CategoryId, OrderId, OrderStatus, Price, ProductId};
use tienda_integration_tests::FakeBackendServer;
use tienda_storefront::checkout::SIMULATED_PAYMENT_TOKEN;
use tienda_storefront::{ErrorKind, Storefront};

async fn logged_in(server: &FakeBackendServer) -> Storefront {
    let store = Storefront::connect(&server.config()).unwrap();
    store.login("a@b.com", "x").await.unwrap();
    server.clear_requests();
    store
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_is_public_and_cached() {
    let server = FakeBackendServer::start().await;
    let store = Storefront::connect(&server.config()).unwrap();

    let products = store.catalog().products().await.unwrap();
    store.catalog().products().await.unwrap();

    assert_eq!(products.len(), 3);
    assert_eq!(products[0].price, Price::from_cents(1999));
    assert_eq!(products[0].category.as_ref().unwrap().name, "Ropa");
    assert_eq!(server.request_lines(), vec!["GET /api/productos"]);
    assert!(server.requests()[0].authorization.is_none());
}

#[tokio::test]
async fn test_products_by_category() {
    let server = FakeBackendServer::start().await;
    let store = Storefront::connect(&server.config()).unwrap();

    let hogar = store
        .catalog()
        .products_by_category(CategoryId::new(2))
        .await
        .unwrap();
    let product = store.catalog().product(ProductId::new(3)).await.unwrap();
    let categories = store.catalog().categories().await.unwrap();

    assert_eq!(hogar.len(), 2);
    assert_eq!(product.name, "Póster");
    assert_eq!(categories.len(), 2);
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_update_name_refreshes_identity() {
    let server = FakeBackendServer::start().await;
    let store = logged_in(&server).await;

    store.profile().update_name("Ana Lucía").await.unwrap();

    assert_eq!(store.identity().unwrap().display_name(), "Ana Lucía");
    assert_eq!(
        server.requests()[0].json(),
        serde_json::json!({ "nombre": "Ana Lucía" })
    );
}

#[tokio::test]
async fn test_photo_upload_is_multipart_and_sets_avatar() {
    let server = FakeBackendServer::start().await;
    let store = logged_in(&server).await;

    let claims = store
        .profile()
        .upload_photo("yo.png", vec![0x89, 0x50, 0x4e, 0x47], "image/png")
        .await
        .unwrap();

    assert_eq!(claims.avatar_url.as_deref(), Some("/uploads/perfil/1.png"));
    let request = &server.requests()[0];
    assert_eq!(request.line(), "POST /api/perfil/foto");
    assert!(
        request
            .content_type
            .as_deref()
            .unwrap()
            .starts_with("multipart/form-data")
    );

    let claims = store.profile().delete_photo().await.unwrap();
    assert!(claims.avatar_url.is_none());
}

#[tokio::test]
async fn test_change_password() {
    let server = FakeBackendServer::start().await;
    let store = logged_in(&server).await;

    let text = store
        .profile()
        .change_password("secreto", "nuevo123")
        .await
        .unwrap();
    assert_eq!(text, "Contraseña actualizada correctamente");

    let err = store
        .profile()
        .change_password("wrong", "nuevo123")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.message, "La contraseña actual no es correcta");
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_pay_and_order_history() {
    let server = FakeBackendServer::start().await;
    let store = logged_in(&server).await;

    let before = store.checkout().order_history().await.unwrap();
    assert_eq!(before[0].status, OrderStatus::Pending);

    let text = store
        .checkout()
        .pay(OrderId::new(1), SIMULATED_PAYMENT_TOKEN)
        .await
        .unwrap();
    assert_eq!(text, "Pago procesado para el pedido 1");
    assert_eq!(
        server.requests()[1].json(),
        serde_json::json!({ "pedidoId": 1, "token": SIMULATED_PAYMENT_TOKEN })
    );

    let after = store.checkout().order_history().await.unwrap();
    assert_eq!(after[0].status, OrderStatus::Paid);
    assert_eq!(after[0].total, Price::from_cents(17797));
}
