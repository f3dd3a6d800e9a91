//! Checkout and order history.

use std::sync::Arc;

use tracing::{info, instrument};

use tienda_core::{Order, OrderId};

use crate::api::{Backend, PaymentRequest};
use crate::error::{self, Result, StoreError};
use crate::session::Session;

/// Payment token used while payments are simulated.
pub const SIMULATED_PAYMENT_TOKEN: &str = "tok_stripe_simulado";

/// Payment submission and order listing.
pub struct Checkout {
    backend: Arc<dyn Backend>,
    session: Arc<Session>,
}

impl Checkout {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, session: Arc<Session>) -> Self {
        Self { backend, session }
    }

    /// Pay an order. Returns the backend's plain-text result.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out or when the payment token is blank.
    #[instrument(skip(self, payment_token))]
    pub async fn pay(&self, order_id: OrderId, payment_token: &str) -> Result<String> {
        self.require_session()?;
        if payment_token.trim().is_empty() {
            return Err(StoreError::invalid("A payment method is required."));
        }

        let order = order_id.to_string();
        error::add_breadcrumb("checkout", "Submitted payment", Some(&[("order_id", order.as_str())]));

        let result = self
            .backend
            .pay(&PaymentRequest {
                order_id,
                token: payment_token.to_string(),
            })
            .await?;
        info!(%order_id, "Payment accepted");
        Ok(result)
    }

    /// Orders placed by the current user.
    ///
    /// # Errors
    ///
    /// Rejected locally when logged out. Backend failures are classified.
    #[instrument(skip(self))]
    pub async fn order_history(&self) -> Result<Vec<Order>> {
        self.require_session()?;
        Ok(self.backend.orders().await?)
    }

    fn require_session(&self) -> Result<()> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(StoreError::not_logged_in())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tienda_core::OrderStatus;

    use super::*;
    use crate::error::ErrorKind;
    use crate::session::TokenStore;
    use crate::storage::MemoryStorage;
    use crate::test_support::{FakeBackend, fake_token};

    fn setup(logged_in: bool) -> (Arc<FakeBackend>, Checkout) {
        let backend = Arc::new(FakeBackend::new());
        let session = Arc::new(Session::new(TokenStore::new(Arc::new(MemoryStorage::new()))));
        if logged_in {
            session
                .set_credential(&fake_token("ana@tienda.es", "Ana"))
                .unwrap();
        }
        (backend.clone(), Checkout::new(backend, session))
    }

    #[tokio::test]
    async fn test_pay_returns_backend_text() {
        let (backend, checkout) = setup(true);

        let text = checkout
            .pay(OrderId::new(1), SIMULATED_PAYMENT_TOKEN)
            .await
            .unwrap();

        assert_eq!(text, "Pago del pedido 1 completado");
        assert_eq!(backend.calls(), vec!["POST /checkout/pagar"]);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let (_backend, checkout) = setup(true);

        let err = checkout
            .pay(OrderId::new(42), SIMULATED_PAYMENT_TOKEN)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_requires_session() {
        let (backend, checkout) = setup(false);

        assert_eq!(
            checkout.order_history().await.unwrap_err().kind,
            ErrorKind::Auth
        );
        assert_eq!(
            checkout
                .pay(OrderId::new(1), SIMULATED_PAYMENT_TOKEN)
                .await
                .unwrap_err()
                .kind,
            ErrorKind::Auth
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_order_history() {
        let (_backend, checkout) = setup(true);

        let orders = checkout.order_history().await.unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Paid);
    }
}
