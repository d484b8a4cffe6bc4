use std::time::Duration as StdDuration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Caller identity as reported by the identity service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	pub is_authenticated: bool,
	pub roles: Vec<String>,
	pub display_name: Option<String>,
}
impl Identity {
	pub fn anonymous() -> Self {
		Self::default()
	}
}

/// Verifies a bearer token against the identity service.
///
/// A token the service refuses (HTTP 401/403 or `active: false`) yields an unauthenticated
/// identity; transport failures and malformed replies are errors.
pub async fn resolve(cfg: &strata_config::Identity, token: &str) -> Result<Identity> {
	let client = Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "token": token });
	let res = client
		.post(url)
		.headers(crate::auth_headers(token, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;

	if matches!(res.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
		return Ok(Identity::anonymous());
	}

	let json: Value = res.error_for_status()?.json().await?;

	parse_identity_response(json)
}

fn parse_identity_response(json: Value) -> Result<Identity> {
	let active = json.get("active").and_then(Value::as_bool).ok_or_else(|| {
		Error::InvalidResponse { message: "Identity response is missing active flag.".to_string() }
	})?;

	if !active {
		return Ok(Identity::anonymous());
	}

	let roles = json
		.get("roles")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Identity response is missing roles array.".to_string(),
		})?
		.iter()
		.filter_map(Value::as_str)
		.map(str::to_string)
		.collect();
	let display_name = json.get("display_name").and_then(Value::as_str).map(str::to_string);

	Ok(Identity { is_authenticated: true, roles, display_name })
}

#[cfg(test)]
mod tests {
	use crate::identity::{Identity, parse_identity_response};

	#[test]
	fn reads_active_identity() {
		let json = serde_json::json!({
			"active": true,
			"roles": ["sysadmin", 7, "public"],
			"display_name": "Inspector",
		});
		let identity = parse_identity_response(json).expect("parse failed");

		assert!(identity.is_authenticated);
		assert_eq!(identity.roles, vec!["sysadmin".to_string(), "public".to_string()]);
		assert_eq!(identity.display_name.as_deref(), Some("Inspector"));
	}

	#[test]
	fn inactive_tokens_are_anonymous() {
		let json = serde_json::json!({ "active": false, "roles": ["sysadmin"] });

		assert_eq!(parse_identity_response(json).expect("parse failed"), Identity::anonymous());
	}

	#[test]
	fn rejects_malformed_replies() {
		assert!(parse_identity_response(serde_json::json!({ "roles": [] })).is_err());
		assert!(parse_identity_response(serde_json::json!({ "active": true })).is_err());
	}
}
