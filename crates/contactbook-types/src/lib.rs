//! Shared types for contactbook: domain snapshots handed out by the stores
//! and the request/response shapes of the HTTP surface.

pub mod api;
pub mod models;
