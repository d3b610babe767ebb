//! # Songforge Common Library
//!
//! Shared code for Songforge services including:
//! - Event types (SongforgeEvent enum) and the EventBus
//! - Configuration loading and root folder resolution
//! - Title slug generation for the artifact naming contract
//! - Utility functions

pub mod config;
pub mod error;
pub mod events;
pub mod slug;
pub mod time;

pub use error::{Error, Result};
pub use slug::slugify;
