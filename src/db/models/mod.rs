//! Request/response structs for the database layer.
//!
//! `*DBRequest` types carry validated input into the handlers in
//! [`crate::db::handlers`]; `*DBResponse` types are what rows deserialize
//! into. API-facing serialization shapes live in [`crate::api::models`].

pub mod agencies;
pub mod attendance;
pub mod lessons;
pub mod payments;
pub mod tokens;
pub mod users;
