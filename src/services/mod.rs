pub mod credential_service;
pub mod query_resolver;
pub mod user_service;
