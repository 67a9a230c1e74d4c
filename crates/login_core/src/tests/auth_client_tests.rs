use super::*;
use axum::{
    http::StatusCode as HttpStatus,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tokio::net::TcpListener;

async fn handle_login(Json(request): Json<LoginRequest>) -> Response {
    match (request.username.as_str(), request.password.as_str()) {
        ("alice", "hunter2") => Json(LoginResponse { result_code: 0 }).into_response(),
        ("banned", _) => (
            HttpStatus::FORBIDDEN,
            Json(ApiError::new(Some(38), "account banned")),
        )
            .into_response(),
        ("locked", _) => (
            HttpStatus::UNAUTHORIZED,
            Json(ApiError::new(None, "locked out")),
        )
            .into_response(),
        ("broken", _) => (HttpStatus::INTERNAL_SERVER_ERROR, "oops").into_response(),
        _ => Json(LoginResponse { result_code: 20 }).into_response(),
    }
}

async fn spawn_login_server() -> Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/login", post(handle_login));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("http://{addr}/"))?)
}

#[test]
fn login_url_is_appended_to_server_url() {
    let client = HttpAuthClient::new(&Url::parse("https://auth.example.org/api/").expect("url"))
        .expect("client");
    assert_eq!(
        client.login_url().as_str(),
        "https://auth.example.org/api/login"
    );
}

#[tokio::test]
async fn accepted_credentials_return_success() {
    let server_url = spawn_login_server().await.expect("server");
    let client = HttpAuthClient::new(&server_url).expect("client");
    let code = client
        .attempt_login(&Credentials::new("alice", "hunter2", false))
        .await;
    assert!(code.is_success());
}

#[tokio::test]
async fn wrong_password_returns_service_code() {
    let server_url = spawn_login_server().await.expect("server");
    let client = HttpAuthClient::new(&server_url).expect("client");
    let code = client
        .attempt_login(&Credentials::new("alice", "nope", false))
        .await;
    assert_eq!(code, AuthErrorCode::AuthenticationFailed.code());
}

#[tokio::test]
async fn error_body_code_is_honoured() {
    let server_url = spawn_login_server().await.expect("server");
    let client = HttpAuthClient::new(&server_url).expect("client");
    let code = client
        .attempt_login(&Credentials::new("banned", "x", false))
        .await;
    assert_eq!(AuthErrorCode::from_code(code), AuthErrorCode::AccountBanned);
}

#[tokio::test]
async fn http_status_is_used_when_body_has_no_code() {
    let server_url = spawn_login_server().await.expect("server");
    let client = HttpAuthClient::new(&server_url).expect("client");

    let locked = client
        .attempt_login(&Credentials::new("locked", "x", false))
        .await;
    assert_eq!(locked, AuthErrorCode::AuthenticationFailed.code());

    let broken = client
        .attempt_login(&Credentials::new("broken", "x", false))
        .await;
    assert_eq!(broken, AuthErrorCode::ServerError.code());
}

#[tokio::test]
async fn unreachable_server_maps_to_connect_failed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client =
        HttpAuthClient::new(&Url::parse(&format!("http://{addr}")).expect("url")).expect("client");
    let code = client
        .attempt_login(&Credentials::new("alice", "hunter2", false))
        .await;
    assert_eq!(code, AuthErrorCode::ConnectFailed.code());
}
