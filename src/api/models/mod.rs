//! Serialization shapes for the HTTP API.

pub mod agencies;
pub mod attendance;
pub mod lessons;
pub mod payments;
pub mod users;
