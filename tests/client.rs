mod support;

use axum::http::StatusCode;
use finance_tracker_client::models::TxnQuery;
use finance_tracker_client::session::MemoryStorage;
use finance_tracker_client::{ApiClient, ClientError, Session, SessionEvent, SessionStore};
use support::{endpoint, serve, store, unreachable_url, Backend, EMAIL, PASSWORD};

#[tokio::test]
async fn sends_the_current_bearer_token() {
    let (backend, _, api) = support::setup().await;

    let txns = api.list_transactions(&TxnQuery::default()).await.unwrap();

    assert_eq!(txns.len(), 2);
    assert_eq!(backend.calls("transactions.list"), 1);
}

#[tokio::test]
async fn client_made_before_login_picks_up_the_token() {
    let base = serve(Backend::new()).await;
    let session = store(&base);
    let api = ApiClient::new(session.clone());

    session.login(EMAIL, PASSWORD).await.unwrap();

    assert!(api.list_budgets().await.is_ok());
}

#[tokio::test]
async fn without_token_nothing_is_sent() {
    let backend = Backend::new();
    let base = serve(backend.clone()).await;
    let api = ApiClient::new(store(&base));

    let err = api.list_goals().await.unwrap_err();

    assert!(matches!(err, ClientError::NotAuthenticated));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn concurrent_401s_sign_out_once() {
    let (backend, session, api) = support::setup().await;
    let mut events = session.subscribe();
    backend.reject_all_tokens(true);

    let query = TxnQuery::default();
    let (a, b, c) = tokio::join!(
        api.list_transactions(&query),
        api.list_budgets(),
        api.list_goals()
    );

    assert!(matches!(a, Err(ClientError::Unauthorized)));
    assert!(matches!(b, Err(ClientError::Unauthorized)));
    assert!(matches!(c, Err(ClientError::Unauthorized)));
    assert_eq!(session.snapshot(), Session::default());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedOut);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn stale_401_does_not_end_a_newer_session() {
    let (backend, session, api) = support::setup().await;
    backend.revoke("T1");
    session.logout();
    session.register("New", "new@example.com", PASSWORD).await.unwrap();

    // T1 is gone; expiring it must leave the T2 session alone.
    assert!(!session.expire("T1"));
    assert_eq!(session.token().as_deref(), Some("T2"));
    assert!(api.list_categories().await.is_ok());
}

#[tokio::test]
async fn maps_status_codes() {
    let (backend, session, api) = support::setup().await;

    let err = api.get_transaction("missing").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(ref m) if m == "Transaction not found"));

    backend.fail("budgets.list", StatusCode::INTERNAL_SERVER_ERROR);
    let err = api.list_budgets().await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 500, .. }));

    backend.fail("goals.list", StatusCode::CONFLICT);
    assert!(matches!(api.list_goals().await, Err(ClientError::Conflict(_))));

    // Only a 401 touches the session.
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let stored = Session {
        user: None,
        token: Some("T1".into()),
        is_authenticated: true,
    };
    let session = SessionStore::new(
        endpoint(&unreachable_url()),
        MemoryStorage::with_session(stored),
    );
    let api = ApiClient::new(session.clone());

    let err = api.list_budgets().await.unwrap_err();

    assert!(err.is_network());
    assert!(session.is_authenticated());
}
