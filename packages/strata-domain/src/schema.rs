use std::{
	collections::HashMap,
	fmt::{Display, Formatter},
};

use strata_config::SchemaKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSchemaKind {
	pub kind: String,
}
impl Display for UnknownSchemaKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "unknown schema kind {:?}", self.kind)
	}
}

impl std::error::Error for UnknownSchemaKind {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindRole {
	/// Canonical record; may own flavour records.
	Master { flavours: Vec<String> },
	/// Audience-specific view linked to a master of the named kind.
	Flavour { master: String },
}

/// Which schema kinds exist and how masters relate to flavours.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
	kinds: HashMap<String, KindRole>,
}
impl SchemaRegistry {
	pub fn from_config(kinds: &[SchemaKind]) -> Self {
		let mut registry = Self::default();

		for kind in kinds {
			registry
				.kinds
				.insert(kind.name.clone(), KindRole::Master { flavours: kind.flavours.clone() });

			for flavour in &kind.flavours {
				registry
					.kinds
					.insert(flavour.clone(), KindRole::Flavour { master: kind.name.clone() });
			}
		}

		registry
	}

	pub fn role(&self, kind: &str) -> Result<&KindRole, UnknownSchemaKind> {
		self.kinds.get(kind).ok_or_else(|| UnknownSchemaKind { kind: kind.to_string() })
	}

	/// Checks every requested kind and reports whether the set needs the master join.
	pub fn resolve<'a>(&self, kinds: &'a [String]) -> Result<ResolvedKinds<'a>, UnknownSchemaKind> {
		let mut includes_flavour = false;

		for kind in kinds {
			if let KindRole::Flavour { .. } = self.role(kind)? {
				includes_flavour = true;
			}
		}

		Ok(ResolvedKinds { kinds, includes_flavour })
	}
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedKinds<'a> {
	pub kinds: &'a [String],
	pub includes_flavour: bool,
}

#[cfg(test)]
mod tests {
	use strata_config::SchemaKind;

	use crate::schema::{KindRole, SchemaRegistry};

	fn registry() -> SchemaRegistry {
		SchemaRegistry::from_config(&[
			SchemaKind {
				name: "Order".to_string(),
				flavours: vec!["OrderLNG".to_string(), "OrderNRCED".to_string()],
			},
			SchemaKind { name: "MineBCMI".to_string(), flavours: Vec::new() },
		])
	}

	#[test]
	fn maps_masters_and_flavours() {
		let registry = registry();

		assert_eq!(
			registry.role("OrderLNG").expect("known kind"),
			&KindRole::Flavour { master: "Order".to_string() }
		);
		assert_eq!(
			registry.role("Order").expect("known kind"),
			&KindRole::Master {
				flavours: vec!["OrderLNG".to_string(), "OrderNRCED".to_string()]
			}
		);
		assert_eq!(
			registry.role("MineBCMI").expect("known kind"),
			&KindRole::Master { flavours: Vec::new() }
		);
	}

	#[test]
	fn resolve_detects_flavour_kinds_and_unknown_kinds() {
		let registry = registry();
		let kinds = vec!["Order".to_string(), "OrderLNG".to_string()];

		assert!(registry.resolve(&kinds).expect("known kinds").includes_flavour);

		let kinds = vec!["Order".to_string()];

		assert!(!registry.resolve(&kinds).expect("known kinds").includes_flavour);

		let kinds = vec!["Order".to_string(), "Permit".to_string()];
		let err = registry.resolve(&kinds).expect_err("unknown kind");

		assert_eq!(err.kind, "Permit");
	}
}
