use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::http;
use crate::models::{
    AnalyticsPeriod, BudgetDto, CategoryDto, CreateBudgetReq, CreateGoalReq, CreateTxnReq,
    DashboardDto, GoalDto, TransactionDto, TrendsDto, TxnQuery, UpdateGoalReq, UpdateTxnReq,
};
use crate::session::SessionStore;

/// Authenticated access to the finance API.
///
/// The bearer token is read from the session store at dispatch time, so a
/// clone made before a login still sends the new token afterwards.
#[derive(Debug, Clone)]
pub struct ApiClient {
    session: SessionStore,
}

impl ApiClient {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, ClientError> {
        let Some(token) = self.session.token() else {
            debug!(%method, path, "not signed in, request not sent");
            return Err(ClientError::NotAuthenticated);
        };

        debug!(%method, path, "request");
        let request = build(self.session.endpoint().request(method, path)?).bearer_auth(&token);
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "token rejected by backend");
            self.session.expire(&token);
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            return Err(http::status_error(response).await);
        }
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.dispatch(Method::GET, path, |req| req).await?;
        http::decode(response).await
    }

    async fn get_with<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self.dispatch(Method::GET, path, |req| req.query(query)).await?;
        http::decode(response).await
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.dispatch(method, path, |req| req.json(body)).await?;
        http::decode(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        // Body (if any) is a confirmation message we have no use for.
        self.dispatch(Method::DELETE, path, |req| req).await?;
        Ok(())
    }

    // ============= Transactions =============

    pub async fn list_transactions(&self, query: &TxnQuery) -> Result<Vec<TransactionDto>, ClientError> {
        self.get_with("transactions/", query).await
    }

    pub async fn get_transaction(&self, id: &str) -> Result<TransactionDto, ClientError> {
        self.get(&format!("transactions/{id}")).await
    }

    pub async fn create_transaction(&self, req: &CreateTxnReq) -> Result<TransactionDto, ClientError> {
        self.send_json(Method::POST, "transactions/", req).await
    }

    pub async fn update_transaction(
        &self,
        id: &str,
        req: &UpdateTxnReq,
    ) -> Result<TransactionDto, ClientError> {
        self.send_json(Method::PUT, &format!("transactions/{id}"), req)
            .await
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("transactions/{id}")).await
    }

    // ============= Budgets =============

    pub async fn list_budgets(&self) -> Result<Vec<BudgetDto>, ClientError> {
        self.get("budgets/").await
    }

    pub async fn create_budget(&self, req: &CreateBudgetReq) -> Result<BudgetDto, ClientError> {
        self.send_json(Method::POST, "budgets/", req).await
    }

    pub async fn delete_budget(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("budgets/{id}")).await
    }

    // ============= Categories =============

    pub async fn list_categories(&self) -> Result<Vec<CategoryDto>, ClientError> {
        self.get("categories/").await
    }

    // ============= Goals =============

    pub async fn list_goals(&self) -> Result<Vec<GoalDto>, ClientError> {
        self.get("goals/").await
    }

    pub async fn create_goal(&self, req: &CreateGoalReq) -> Result<GoalDto, ClientError> {
        self.send_json(Method::POST, "goals/", req).await
    }

    pub async fn update_goal(&self, id: &str, req: &UpdateGoalReq) -> Result<GoalDto, ClientError> {
        self.send_json(Method::PUT, &format!("goals/{id}"), req).await
    }

    pub async fn delete_goal(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("goals/{id}")).await
    }

    // ============= Analytics =============

    pub async fn dashboard(&self, period: AnalyticsPeriod) -> Result<DashboardDto, ClientError> {
        self.get_with("analytics/dashboard", &[("period", period.as_str())])
            .await
    }

    pub async fn trends(&self, months: u32) -> Result<TrendsDto, ClientError> {
        self.get_with("analytics/trends", &[("months", months)]).await
    }
}
