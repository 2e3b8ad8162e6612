//! In-memory stores and request helpers shared by the handler tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::build_app;
use crate::auth::{
    repo::UserRepo,
    repo_types::{NewUser, Role, User},
    services::register_user,
};
use crate::config::{AppConfig, JwtConfig, PaymentConfig};
use crate::error::StoreError;
use crate::orders::{
    repo::{replay, OrderRepo},
    repo_types::{order_total, NewOrder, Order, OrderItem, Placed},
    status::OrderStatus,
};
use crate::payment::gateway::{CreateGatewayOrder, GatewayError, PaymentGateway};
use crate::products::repo::ProductRepo;
use crate::products::repo_types::{NewProduct, Product, ProductPatch};
use crate::state::AppState;

pub const GATEWAY_KEY_ID: &str = "rzp_test_key";
pub const GATEWAY_SECRET: &str = "rzp_test_secret";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    orders: Vec<Order>,
}

/// Single-lock store mirroring the transactional behaviour of `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl ProductRepo for MemoryStore {
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.lock().products.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, StoreError> {
        let created = Product {
            id: Uuid::new_v4(),
            name: product.name,
            price: product.price,
            image: product.image,
            category: product.category,
            stock: product.stock,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().products.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product, StoreError> {
        let mut t = self.lock();
        let p = t
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(name) = patch.name {
            p.name = name;
        }
        if let Some(price) = patch.price {
            p.price = price;
        }
        if let Some(image) = patch.image {
            p.image = image;
        }
        if let Some(category) = patch.category {
            p.category = category;
        }
        if let Some(stock) = patch.stock {
            p.stock = stock;
        }
        Ok(p.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.lock();
        let before = t.products.len();
        t.products.retain(|p| p.id != id);
        if t.products.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepo for MemoryStore {
    async fn place(&self, new: NewOrder) -> Result<Placed, StoreError> {
        let mut t = self.lock();

        if let Some(key) = new.idempotency_key.as_deref() {
            let existing = t
                .orders
                .iter()
                .find(|o| o.user_id == new.user_id && o.idempotency_key.as_deref() == Some(key));
            if let Some(order) = existing {
                return replay(&new, order.clone());
            }
        }
        if let Some(payment_id) = new.payment_id.as_deref() {
            if t.orders.iter().any(|o| o.payment_id.as_deref() == Some(payment_id)) {
                return Err(StoreError::PaymentReused(payment_id.to_string()));
            }
        }

        // Check every line before touching stock so a failure reserves nothing.
        let mut items = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let product = t
                .products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or(StoreError::UnknownProduct(line.product_id))?;
            if product.stock < line.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: product.id,
                    name: product.name.clone(),
                });
            }
            items.push(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                quantity: line.quantity,
                image: product.image.clone(),
            });
        }
        for line in &new.lines {
            if let Some(p) = t.products.iter_mut().find(|p| p.id == line.product_id) {
                p.stock -= line.quantity;
            }
        }

        let now = OffsetDateTime::now_utc();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            total: order_total(&items),
            items,
            status: new.status,
            payment_method: new.payment_method,
            payment_id: new.payment_id,
            shipping: new.shipping,
            idempotency_key: new.idempotency_key,
            created_at: now,
            updated_at: now,
        };
        t.orders.push(order.clone());
        Ok(Placed::Created(order))
    }

    async fn list(&self, user_id: Option<Uuid>) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .filter(|o| user_id.map_or(true, |uid| o.user_id == uid))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn transition(&self, id: Uuid, to: OrderStatus) -> Result<Order, StoreError> {
        let mut t = self.lock();
        let idx = t
            .orders
            .iter()
            .position(|o| o.id == id)
            .ok_or(StoreError::NotFound)?;
        let (from, method) = (t.orders[idx].status, t.orders[idx].payment_method);
        if !from.can_transition(to, method) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        if to == OrderStatus::Cancelled {
            let items = t.orders[idx].items.clone();
            for item in items {
                if let Some(p) = t.products.iter_mut().find(|p| p.id == item.product_id) {
                    p.stock += item.quantity;
                }
            }
        }

        let order = &mut t.orders[idx];
        order.status = to;
        order.updated_at = OffsetDateTime::now_utc();
        Ok(order.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut t = self.lock();
        let before = t.orders.len();
        t.orders.retain(|o| o.id != id);
        if t.orders.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Echoes the request back the way the gateway's order object would.
struct FakeGateway;

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, order: CreateGatewayOrder) -> Result<Value, GatewayError> {
        Ok(json!({
            "id": format!("order_{}", Uuid::new_v4().simple()),
            "amount": order.amount,
            "currency": order.currency,
            "receipt": order.receipt,
            "status": "created",
        }))
    }
}

fn test_config(with_gateway: bool) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        jwt: JwtConfig {
            secret: "test-jwt-secret".into(),
            issuer: "storefront".into(),
            audience: "storefront-users".into(),
            ttl_minutes: 60,
        },
        payment: PaymentConfig {
            key_id: with_gateway.then(|| GATEWAY_KEY_ID.to_string()),
            key_secret: with_gateway.then(|| GATEWAY_SECRET.to_string()),
            api_base: "http://gateway.invalid".into(),
        },
        admin: None,
    }
}

pub struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(true)
    }

    pub fn without_gateway() -> Self {
        Self::build(false)
    }

    fn build(with_gateway: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = with_gateway.then(|| Arc::new(FakeGateway) as Arc<dyn PaymentGateway>);
        let state = AppState::from_parts(
            Arc::new(test_config(with_gateway)),
            store.clone(),
            store.clone(),
            store.clone(),
            gateway,
        );
        Self {
            router: build_app(state),
            store,
        }
    }

    pub async fn seed_product(&self, name: &str, price: f64, stock: i32) -> Product {
        ProductRepo::create(
            self.store.as_ref(),
            NewProduct {
                name: name.into(),
                price,
                image: None,
                category: "General".into(),
                stock,
            },
        )
        .await
        .unwrap()
    }

    pub async fn stock_of(&self, id: Uuid) -> i32 {
        ProductRepo::get(self.store.as_ref(), id)
            .await
            .unwrap()
            .map(|p| p.stock)
            .unwrap()
    }
}

pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let headers: Vec<(&str, &str)> = auth.map(|a| ("authorization", a)).into_iter().collect();
    send_with_headers(app, method, uri, &headers, body).await
}

pub async fn send_with_headers(
    app: &TestApp,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let req = match body {
        Some(json) => req
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let res = app.router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn shipping_json() -> Value {
    json!({
        "name": "Asha Rao",
        "phone": "9876543210",
        "address": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "pincode": "560001",
        "locality": "Ashok Nagar",
        "landmark": "Opp. metro station",
    })
}

/// Registers through the API and returns the issued token with the response body.
pub async fn signup_user(app: &TestApp, name: &str, email: &str, password: &str) -> (String, Value) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    let token = body["token"].as_str().unwrap().to_string();
    (token, body)
}

pub async fn admin_token(app: &TestApp) -> String {
    register_user(
        app.store.as_ref(),
        "Admin",
        "admin@shop.test",
        "admin-pass",
        Role::Admin,
    )
    .await
    .unwrap();

    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "admin@shop.test", "password": "admin-pass", "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
    body["token"].as_str().unwrap().to_string()
}
