//! Request and response bodies exchanged with the backend.

use serde::{Deserialize, Serialize};

use tienda_core::{Cart, Email, OrderId, ProductId};

/// `{token}` body returned by login, registration and profile updates.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: Email,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /auth/register`.
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: Email,
    pub password: String,
    #[serde(rename = "direccion")]
    pub address: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("address", &self.address)
            .finish()
    }
}

/// Body of `POST /carrito`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemRequest {
    #[serde(rename = "idProducto")]
    pub product_id: ProductId,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
}

/// Body of `PUT /carrito/items/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    #[serde(rename = "cantidad")]
    pub quantity: i32,
}

/// Outcome of a quantity update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartUpdate {
    /// 204: the line is gone; the remaining cart must be fetched.
    Removed,
    /// The updated cart.
    Updated(Cart),
}

/// Body of `PUT /api/perfil/nombre`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNameRequest {
    #[serde(rename = "nombre")]
    pub name: String,
}

/// Body of `PUT /api/perfil/contrasena`.
#[derive(Clone, Serialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "actual")]
    pub current: String,
    #[serde(rename = "nueva")]
    pub new: String,
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChangePasswordRequest { .. }")
    }
}

/// Profile photo sent as `multipart/form-data` to `POST /api/perfil/foto`.
#[derive(Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PhotoUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Body of `POST /checkout/pagar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "pedidoId")]
    pub order_id: OrderId,
    /// Payment provider token.
    pub token: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_add_item_wire_format() {
        let body = AddItemRequest {
            product_id: ProductId::new(5),
            quantity: 2,
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({ "idProducto": 5, "cantidad": 2 })
        );
    }

    #[test]
    fn test_register_wire_format() {
        let body = RegisterRequest {
            name: "Ana".to_string(),
            email: Email::parse("a@b.com").unwrap(),
            password: "secreto".to_string(),
            address: "Calle Mayor 1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "nombre": "Ana",
                "email": "a@b.com",
                "password": "secreto",
                "direccion": "Calle Mayor 1"
            })
        );
        assert!(!format!("{body:?}").contains("secreto"));
    }

    #[test]
    fn test_payment_wire_format() {
        let body = PaymentRequest {
            order_id: OrderId::new(1),
            token: "tok_simulated".to_string(),
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({ "pedidoId": 1, "token": "tok_simulated" })
        );
    }
}
