//! HTTP API surface.
//!
//! Functional areas:
//! - authentication and password resets (`/auth`)
//! - lesson catalog and enrollment (`/lessons`, `/students`)
//! - the student payment flow (`/payments`)
//! - tutor sessions, attendance and earnings (`/tutors`)
//! - agency profile, tenant configuration and settlement (`/agencies`)
//!
//! Handlers live in [`handlers`], request/response types in [`models`].

pub mod handlers;
pub mod models;
