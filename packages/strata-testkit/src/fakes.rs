use std::{collections::HashMap, sync::Mutex};

use strata_service::{
	BoxFuture, Identity, IdentityProvider, QueryDiagnostics, QueryEvent, Result, SearchAudit,
};

/// Identity provider answering from a fixed token table. Unknown tokens are rejected.
#[derive(Default)]
pub struct StaticIdentity {
	tokens: HashMap<String, Identity>,
}
impl StaticIdentity {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_token<I, S>(mut self, token: &str, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tokens.insert(
			token.to_string(),
			Identity {
				is_authenticated: true,
				roles: roles.into_iter().map(Into::into).collect(),
				display_name: None,
			},
		);

		self
	}

	pub fn with_display_name(mut self, token: &str, display_name: &str) -> Self {
		if let Some(identity) = self.tokens.get_mut(token) {
			identity.display_name = Some(display_name.to_string());
		}

		self
	}
}
impl IdentityProvider for StaticIdentity {
	fn resolve<'a>(
		&'a self,
		_cfg: &'a strata_config::Identity,
		token: &'a str,
	) -> BoxFuture<'a, Result<Identity>> {
		let identity = self.tokens.get(token).cloned().unwrap_or_else(Identity::anonymous);

		Box::pin(async move { Ok(identity) })
	}
}

/// Keeps every query event and search audit for later inspection.
#[derive(Default)]
pub struct RecordingDiagnostics {
	events: Mutex<Vec<QueryEvent>>,
	audits: Mutex<Vec<SearchAudit>>,
}
impl RecordingDiagnostics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<QueryEvent> {
		self.events.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn last(&self) -> Option<QueryEvent> {
		self.events.lock().unwrap_or_else(|err| err.into_inner()).last().cloned()
	}

	pub fn audits(&self) -> Vec<SearchAudit> {
		self.audits.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl QueryDiagnostics for RecordingDiagnostics {
	fn record(&self, event: &QueryEvent) {
		self.events.lock().unwrap_or_else(|err| err.into_inner()).push(event.clone());
	}

	fn audit(&self, audit: &SearchAudit) {
		self.audits.lock().unwrap_or_else(|err| err.into_inner()).push(audit.clone());
	}
}
