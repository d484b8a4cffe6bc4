use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Roles of the caller for one request. Never empty: anonymous callers carry the public roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);
impl RoleSet {
	pub fn new<I, S>(roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(roles.into_iter().map(Into::into).filter(|role: &String| !role.is_empty()).collect())
	}

	/// Role set for callers without a verified identity.
	pub fn public(public_roles: &[String]) -> Self {
		Self::new(public_roles.iter().cloned())
	}

	pub fn contains(&self, role: &str) -> bool {
		self.0.contains(role)
	}

	pub fn intersects<'a, I>(&self, roles: I) -> bool
	where
		I: IntoIterator<Item = &'a str>,
	{
		roles.into_iter().any(|role| self.contains(role))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}
