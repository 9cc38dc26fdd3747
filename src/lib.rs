//! Media ingestion service for the studio website.
//!
//! Uploaded images are normalized to WebP, stored alongside a ladder of
//! downscaled variants and an on-demand social crop, and can be listed,
//! checked for name collisions, traced back to the content that uses them,
//! and deleted as a whole family.

pub mod config;
pub mod error;
pub mod image_processing;
pub mod library;
pub mod logging;
pub mod naming;
pub mod routes;
pub mod store;
pub mod usage;
pub mod variants;

pub use config::{ImageSettings, MediaConfig};
pub use error::{MediaError, MediaResult};
pub use library::MediaLibrary;
pub use routes::{AppState, router};
