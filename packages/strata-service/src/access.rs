use strata_domain::roles::RoleSet;

use crate::{Error, Result, StrataService};

/// Who is asking, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
	pub roles: RoleSet,
	pub is_authenticated: bool,
	pub display_name: Option<String>,
}
impl Caller {
	pub fn public(public_roles: &[String]) -> Self {
		Self { roles: RoleSet::public(public_roles), is_authenticated: false, display_name: None }
	}
}

impl StrataService {
	pub fn public_caller(&self) -> Caller {
		Caller::public(&self.cfg.security.public_roles)
	}

	/// Resolves the caller from an optional bearer token.
	///
	/// No token means the public role set. A token the identity service does not accept is an
	/// error rather than a silent downgrade. Verified callers keep the public roles as well.
	pub async fn resolve_caller(&self, bearer: Option<&str>) -> Result<Caller> {
		let Some(token) = bearer.map(str::trim).filter(|token| !token.is_empty()) else {
			return Ok(self.public_caller());
		};
		let identity = self.providers.identity.resolve(&self.cfg.identity, token).await?;

		if !identity.is_authenticated {
			return Err(Error::Unauthenticated {
				message: "Bearer token was not accepted.".to_string(),
			});
		}

		let roles = RoleSet::new(
			identity.roles.into_iter().chain(self.cfg.security.public_roles.iter().cloned()),
		);

		Ok(Caller { roles, is_authenticated: true, display_name: identity.display_name })
	}
}
