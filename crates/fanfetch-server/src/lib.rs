//! HTTP server: admission gate, routes, DTOs and OpenAPI documentation.

pub mod admission;
pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;
