//! A mock Canvas LMS OAuth2 authorization server.
//!
//! Emulates the authorization-code flow an LMS integration expects so that
//! downstream applications can be developed and tested without a real identity
//! provider. Two synthetic identities (instructor and student) are bound to
//! static tokens taken from configuration.

pub mod api;
pub mod config;
pub mod error;
pub mod oauth2;
pub mod registry;
pub mod session;
