//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the transcode, subtitle and playback-state endpoints
//! - Streaming engine output as chunked fMP4 responses
//! - JSON side-channel endpoints (tracks, positions, history, adjacency)
//! - Health, version, debug and metrics endpoints
//! - Request logging and CORS middleware

pub mod api;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod stream;

pub use routes::create_router;
