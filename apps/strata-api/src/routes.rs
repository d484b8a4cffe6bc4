use axum::{
	Json, Router,
	extract::{Path, Query, State, rejection::QueryRejection},
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;
use strata_service::{
	AttachDocumentRequest, Caller, DocumentSetResponse, Error, SearchOutcome, SearchRequest,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", get(search))
		.route("/v1/public/search", get(public_search))
		.route("/v1/records/{record_id}/documents", post(attach_document))
		.route("/v1/records/{record_id}/documents/{document_id}", delete(detach_document))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	query: Result<Query<SearchRequest>, QueryRejection>,
) -> Result<Json<SearchOutcome>, ApiError> {
	let Query(req) = query?;
	let caller = caller_from_headers(&state, &headers).await?;
	let response = state.service.search(&caller, req).await?;

	Ok(Json(response))
}

async fn public_search(
	State(state): State<AppState>,
	query: Result<Query<SearchRequest>, QueryRejection>,
) -> Result<Json<SearchOutcome>, ApiError> {
	let Query(req) = query?;
	let caller = state.service.public_caller();
	let response = state.service.search(&caller, req).await?;

	Ok(Json(response))
}

async fn attach_document(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(record_id): Path<Uuid>,
	Json(payload): Json<AttachDocumentRequest>,
) -> Result<Json<DocumentSetResponse>, ApiError> {
	let caller = caller_from_headers(&state, &headers).await?;
	let response = state.service.attach_document(&caller, record_id, payload).await?;

	Ok(Json(response))
}

async fn detach_document(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path((record_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DocumentSetResponse>, ApiError> {
	let caller = caller_from_headers(&state, &headers).await?;
	let response = state.service.detach_document(&caller, record_id, document_id).await?;

	Ok(Json(response))
}

async fn caller_from_headers(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
	let Some(value) = headers.get(header::AUTHORIZATION) else {
		return Ok(state.service.resolve_caller(None).await?);
	};
	let token = value
		.to_str()
		.ok()
		.and_then(|raw| raw.trim().strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.ok_or_else(|| {
			json_error(
				StatusCode::UNAUTHORIZED,
				"UNAUTHENTICATED",
				"Authorization header must carry a bearer token.",
				Some(vec!["Authorization".to_string()]),
			)
		})?;

	Ok(state.service.resolve_caller(Some(token)).await?)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
	retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
	retryable: bool,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self {
			status,
			error_code: error_code.into(),
			message: message.into(),
			fields,
			retryable: false,
		}
	}

	fn retryable(mut self) -> Self {
		self.retryable = true;

		self
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None),
			Error::UnknownSchemaKind { kind } => json_error(
				StatusCode::BAD_REQUEST,
				"UNKNOWN_SCHEMA_KIND",
				format!("Unknown schema kind: {kind}."),
				Some(vec!["dataset".to_string()]),
			),
			Error::Unauthenticated { message } =>
				json_error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message, None),
			Error::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
			Error::QueryTooBroad { .. } => json_error(
				StatusCode::UNPROCESSABLE_ENTITY,
				"QUERY_TOO_BROAD",
				err.to_string(),
				None,
			),
			Error::StoreUnavailable { .. } | Error::StoreTimeout { .. } => {
				tracing::warn!(error = %err, "Document store unavailable.");

				let code = match err {
					Error::StoreTimeout { .. } => "STORE_TIMEOUT",
					_ => "STORE_UNAVAILABLE",
				};

				json_error(
					StatusCode::SERVICE_UNAVAILABLE,
					code,
					"The document store is unavailable. Retry later.",
					None,
				)
				.retryable()
			},
			Error::Storage { .. } | Error::Provider { .. } => {
				tracing::error!(error = %err, "Request failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "Internal error.", None)
			},
		}
	}
}

impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", rejection.body_text(), None)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code,
			message: self.message,
			fields: self.fields,
			retryable: self.retryable,
		};

		(self.status, Json(body)).into_response()
	}
}
