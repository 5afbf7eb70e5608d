//! Authentication: JWT sessions, password hashing, request extraction.

pub mod current_user;
pub mod password;
pub mod session;
