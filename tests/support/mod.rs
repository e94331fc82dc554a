//! In-process fake of the finance API for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use finance_tracker_client::session::MemoryStorage;
use finance_tracker_client::{ApiClient, Config, Endpoint, SessionStore};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "secret";

#[derive(Default)]
struct Inner {
    tokens: HashMap<String, Value>,
    login_omits_user: bool,
    reject_all: bool,
    calls: HashMap<&'static str, usize>,
    delays: HashMap<&'static str, Duration>,
    failures: HashMap<&'static str, StatusCode>,
    transactions: Vec<Value>,
    budgets: Vec<Value>,
    categories: Vec<Value>,
    goals: Vec<Value>,
    next_id: u32,
}

#[derive(Clone, Default)]
pub struct Backend {
    inner: Arc<Mutex<Inner>>,
}

pub struct ApiErr(StatusCode, String);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiErr>;

impl Backend {
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut inner = backend.inner.lock();
            inner.categories = vec![
                json!({"id": "food", "name": "Food & Dining", "type": "expense", "icon": "🍽️", "color": "#ef4444"}),
                json!({"id": "salary", "name": "Salary", "type": "income", "icon": "💰", "color": "#10b981"}),
            ];
            inner.transactions = vec![
                json!({"id": "t1", "amount": 50.0, "description": "Grocery Shopping", "type": "expense",
                       "category_id": "food", "date": "2025-01-13T00:00:00"}),
                json!({"id": "t2", "amount": 2500.0, "description": "Monthly Salary", "type": "income",
                       "category_id": "salary", "date": "2025-01-12T00:00:00"}),
            ];
            inner.budgets = vec![
                json!({"id": "b1", "name": "Groceries", "amount": 400.0, "spent": 340.0, "period": "monthly",
                       "category_id": "food"}),
            ];
            inner.goals = vec![
                json!({"id": "g1", "title": "Emergency Fund", "description": "", "target_amount": 10000.0,
                       "current_amount": 8500.0, "target_date": "2025-12-31", "category": "emergency",
                       "status": "active"}),
            ];
        }
        backend
    }

    pub fn calls(&self, key: &str) -> usize {
        self.inner.lock().calls.get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner.lock().calls.values().sum()
    }

    pub fn delay(&self, key: &'static str, delay: Duration) {
        self.inner.lock().delays.insert(key, delay);
    }

    pub fn fail(&self, key: &'static str, status: StatusCode) {
        self.inner.lock().failures.insert(key, status);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    pub fn reject_all_tokens(&self, reject: bool) {
        self.inner.lock().reject_all = reject;
    }

    pub fn revoke(&self, token: &str) {
        self.inner.lock().tokens.remove(token);
    }

    pub fn omit_user_on_login(&self) {
        self.inner.lock().login_omits_user = true;
    }

    pub fn budget_count(&self) -> usize {
        self.inner.lock().budgets.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.lock().transactions.len()
    }

    /// Counts the call, applies injected delay/failure, and checks the bearer token.
    async fn enter(&self, key: &'static str, headers: Option<&HeaderMap>) -> Result<(), ApiErr> {
        let (delay, failure) = {
            let mut inner = self.inner.lock();
            *inner.calls.entry(key).or_default() += 1;
            (inner.delays.get(key).copied(), inner.failures.get(key).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(headers) = headers {
            let token = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .unwrap_or_default();
            let inner = self.inner.lock();
            if inner.reject_all || !inner.tokens.contains_key(token) {
                return Err(ApiErr(StatusCode::UNAUTHORIZED, "Could not validate credentials".into()));
            }
        }
        if let Some(status) = failure {
            return Err(ApiErr(status, format!("injected failure for {key}")));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        format!("{prefix}-{}", inner.next_id)
    }

    fn issue(&self, token: &str, user: Value) -> Value {
        let mut inner = self.inner.lock();
        inner.tokens.insert(token.to_string(), user.clone());
        if inner.login_omits_user {
            json!({ "access_token": token, "token_type": "bearer" })
        } else {
            json!({ "access_token": token, "token_type": "bearer", "user": user })
        }
    }
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(State(b): State<Backend>, Form(form): Form<LoginForm>) -> ApiResult {
    b.enter("login", None).await?;
    if form.password != PASSWORD {
        return Err(ApiErr(StatusCode::UNAUTHORIZED, "Incorrect email or password".into()));
    }
    let user = json!({ "id": "u1", "email": form.username, "full_name": "Test User" });
    Ok(Json(b.issue("T1", user)))
}

async fn register(State(b): State<Backend>, Json(body): Json<Value>) -> ApiResult {
    b.enter("register", None).await?;
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if email == EMAIL {
        return Err(ApiErr(StatusCode::BAD_REQUEST, "Email already registered".into()));
    }
    let user = json!({ "id": "u2", "email": email, "name": body["name"] });
    Ok(Json(b.issue("T2", user)))
}

async fn me(State(b): State<Backend>, headers: HeaderMap) -> ApiResult {
    b.enter("me", Some(&headers)).await?;
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    let user = b.inner.lock().tokens.get(token).cloned().unwrap_or(Value::Null);
    Ok(Json(user))
}

async fn list_transactions(State(b): State<Backend>, headers: HeaderMap) -> ApiResult {
    b.enter("transactions.list", Some(&headers)).await?;
    let list = b.inner.lock().transactions.clone();
    Ok(Json(Value::Array(list)))
}

async fn create_transaction(State(b): State<Backend>, headers: HeaderMap, Json(mut body): Json<Value>) -> ApiResult {
    b.enter("transactions.create", Some(&headers)).await?;
    body["id"] = json!(b.next_id("txn"));
    b.inner.lock().transactions.push(body.clone());
    Ok(Json(body))
}

async fn get_transaction(State(b): State<Backend>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult {
    b.enter("transactions.get", Some(&headers)).await?;
    let found = b
        .inner
        .lock()
        .transactions
        .iter()
        .find(|t| t["id"] == id.as_str())
        .cloned();
    found
        .map(Json)
        .ok_or_else(|| ApiErr(StatusCode::NOT_FOUND, "Transaction not found".into()))
}

async fn update_transaction(
    State(b): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    b.enter("transactions.update", Some(&headers)).await?;
    let mut inner = b.inner.lock();
    let txn = inner
        .transactions
        .iter_mut()
        .find(|t| t["id"] == id.as_str())
        .ok_or_else(|| ApiErr(StatusCode::NOT_FOUND, "Transaction not found".into()))?;
    if let (Some(target), Some(patch)) = (txn.as_object_mut(), body.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
    Ok(Json(txn.clone()))
}

async fn delete_transaction(State(b): State<Backend>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult {
    b.enter("transactions.delete", Some(&headers)).await?;
    let mut inner = b.inner.lock();
    let result = remove(&mut inner.transactions, &id, "Transaction");
    result
}

async fn list_budgets(State(b): State<Backend>, headers: HeaderMap) -> ApiResult {
    b.enter("budgets.list", Some(&headers)).await?;
    let list = b.inner.lock().budgets.clone();
    Ok(Json(Value::Array(list)))
}

async fn create_budget(State(b): State<Backend>, headers: HeaderMap, Json(mut body): Json<Value>) -> ApiResult {
    b.enter("budgets.create", Some(&headers)).await?;
    body["id"] = json!(b.next_id("budget"));
    body["spent"] = json!(0.0);
    b.inner.lock().budgets.push(body.clone());
    Ok(Json(body))
}

async fn delete_budget(State(b): State<Backend>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult {
    b.enter("budgets.delete", Some(&headers)).await?;
    let mut inner = b.inner.lock();
    let result = remove(&mut inner.budgets, &id, "Budget");
    result
}

async fn list_categories(State(b): State<Backend>, headers: HeaderMap) -> ApiResult {
    b.enter("categories.list", Some(&headers)).await?;
    let list = b.inner.lock().categories.clone();
    Ok(Json(Value::Array(list)))
}

async fn list_goals(State(b): State<Backend>, headers: HeaderMap) -> ApiResult {
    b.enter("goals.list", Some(&headers)).await?;
    let list = b.inner.lock().goals.clone();
    Ok(Json(Value::Array(list)))
}

async fn create_goal(State(b): State<Backend>, headers: HeaderMap, Json(mut body): Json<Value>) -> ApiResult {
    b.enter("goals.create", Some(&headers)).await?;
    body["id"] = json!(b.next_id("goal"));
    body["current_amount"] = json!(0.0);
    body["status"] = json!("active");
    b.inner.lock().goals.push(body.clone());
    Ok(Json(body))
}

async fn update_goal(
    State(b): State<Backend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    b.enter("goals.update", Some(&headers)).await?;
    let mut inner = b.inner.lock();
    let goal = inner
        .goals
        .iter_mut()
        .find(|g| g["id"] == id.as_str())
        .ok_or_else(|| ApiErr(StatusCode::NOT_FOUND, "Goal not found".into()))?;
    if let (Some(target), Some(patch)) = (goal.as_object_mut(), body.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
    Ok(Json(goal.clone()))
}

async fn delete_goal(State(b): State<Backend>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult {
    b.enter("goals.delete", Some(&headers)).await?;
    let mut inner = b.inner.lock();
    let result = remove(&mut inner.goals, &id, "Goal");
    result
}

#[derive(Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

async fn dashboard(State(b): State<Backend>, headers: HeaderMap, Query(q): Query<PeriodQuery>) -> ApiResult {
    b.enter("dashboard", Some(&headers)).await?;
    let income = match q.period.as_deref() {
        Some("quarter") => 9000.0,
        Some("year") => 36000.0,
        _ => 3000.0,
    };
    Ok(Json(json!({
        "monthly_summary": { "income": income, "expenses": 1200.0, "savings": income - 1200.0, "savings_rate": 60.0 },
        "total_summary": { "income": income, "expenses": 1200.0, "net_worth": income - 1200.0 },
        "recent_transactions": [
            { "id": "t1", "amount": 50.0, "description": "Grocery Shopping", "type": "expense", "date": "2025-01-13T00:00:00" }
        ],
        "category_breakdown": [ { "name": "Food & Dining", "icon": "🍽️", "color": "#ef4444", "amount": 1200.0 } ]
    })))
}

#[derive(Deserialize)]
struct MonthsQuery {
    months: Option<u32>,
}

async fn trends(State(b): State<Backend>, headers: HeaderMap, Query(q): Query<MonthsQuery>) -> ApiResult {
    b.enter("trends", Some(&headers)).await?;
    Ok(Json(json!({
        "monthly_trends": {
            "2024-12": { "income": 3000.0, "expenses": 1500.0 },
            "2025-01": { "income": 3000.0, "expenses": 1200.0 }
        },
        "period_months": q.months.unwrap_or(6)
    })))
}

fn remove(list: &mut Vec<Value>, id: &str, what: &str) -> ApiResult {
    let pos = list
        .iter()
        .position(|v| v["id"] == id)
        .ok_or_else(|| ApiErr(StatusCode::NOT_FOUND, format!("{what} not found")))?;
    list.remove(pos);
    Ok(Json(json!({ "message": format!("{what} deleted successfully") })))
}

fn router(backend: Backend) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/transactions/", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/:id",
            get(get_transaction).put(update_transaction).delete(delete_transaction),
        )
        .route("/budgets/", get(list_budgets).post(create_budget))
        .route("/budgets/:id", axum::routing::delete(delete_budget))
        .route("/categories/", get(list_categories))
        .route("/goals/", get(list_goals).post(create_goal))
        .route("/goals/:id", put(update_goal).delete(delete_goal))
        .route("/analytics/dashboard", get(dashboard))
        .route("/analytics/trends", get(trends))
        .with_state(backend)
}

/// Serves `backend` on an ephemeral local port and returns its base URL.
pub async fn serve(backend: Backend) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn endpoint(base: &str) -> Endpoint {
    let config = Config::with_api_url(base, std::env::temp_dir()).unwrap();
    Endpoint::with_timeout(config.api_url, Duration::from_secs(5)).unwrap()
}

pub fn store(base: &str) -> SessionStore {
    SessionStore::new(endpoint(base), MemoryStorage::new())
}

pub async fn signed_in(base: &str) -> (SessionStore, ApiClient) {
    let session = store(base);
    session.login(EMAIL, PASSWORD).await.unwrap();
    let api = ApiClient::new(session.clone());
    (session, api)
}

/// Spawns a fresh backend and signs a client into it.
pub async fn setup() -> (Backend, SessionStore, ApiClient) {
    let backend = Backend::new();
    let base = serve(backend.clone()).await;
    let (session, api) = signed_in(&base).await;
    (backend, session, api)
}
