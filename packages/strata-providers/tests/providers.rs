use std::net::SocketAddr;

use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tokio::net::TcpListener;

use strata_config::Identity;
use strata_providers::identity;

async fn introspect(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
	let token = body.get("token").and_then(Value::as_str).unwrap_or_default();
	let bearer = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());

	if bearer != Some(format!("Bearer {token}").as_str()) {
		return (StatusCode::BAD_REQUEST, Json(serde_json::json!({})));
	}

	match token {
		"admin-token" => (
			StatusCode::OK,
			Json(serde_json::json!({
				"active": true,
				"roles": ["sysadmin", "public"],
				"display_name": "Admin",
			})),
		),
		"expired-token" => (StatusCode::OK, Json(serde_json::json!({ "active": false }))),
		_ => (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "invalid token" }))),
	}
}

async fn spawn_identity_service() -> SocketAddr {
	let app = Router::new().route("/introspect", post(introspect));
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind listener.");
	let addr = listener.local_addr().expect("Failed to read listener address.");

	tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	});

	addr
}

fn identity_cfg(addr: SocketAddr) -> Identity {
	Identity {
		api_base: format!("http://{addr}"),
		path: "/introspect".to_string(),
		timeout_ms: 2_000,
		default_headers: Map::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		strata_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut default_headers = Map::new();

	default_headers.insert("X-Trace".to_string(), serde_json::json!(7));

	assert!(strata_providers::auth_headers("secret", &default_headers).is_err());
}

#[tokio::test]
async fn resolves_tokens_against_identity_service() {
	let cfg = identity_cfg(spawn_identity_service().await);
	let admin = identity::resolve(&cfg, "admin-token").await.expect("Failed to resolve token.");

	assert!(admin.is_authenticated);
	assert_eq!(admin.roles, vec!["sysadmin".to_string(), "public".to_string()]);

	let expired = identity::resolve(&cfg, "expired-token").await.expect("Failed to resolve token.");

	assert!(!expired.is_authenticated);

	let unknown = identity::resolve(&cfg, "forged").await.expect("Failed to resolve token.");

	assert!(!unknown.is_authenticated);
	assert!(unknown.roles.is_empty());
}
