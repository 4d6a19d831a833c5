//! Product Image Batch Compression Service
//!
//! Accepts CSV batches of products with source image URLs, recompresses each
//! image to JPEG in the background, stores the results in S3-compatible
//! object storage and reports per-product outcomes through a status API and
//! an outbound webhook.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
