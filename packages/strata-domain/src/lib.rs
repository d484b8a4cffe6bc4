pub mod document;
pub mod filter;
pub mod pipeline;
pub mod predicate;
pub mod record;
pub mod redaction;
pub mod roles;
pub mod schema;
pub mod text;
