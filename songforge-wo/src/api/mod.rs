//! HTTP API handlers for songforge-wo
//!
//! REST endpoints plus an SSE stream of workflow progress.

pub mod debug;
pub mod health;
pub mod songs;
pub mod sse;
pub mod workflow;

pub use debug::debug_routes;
pub use health::health_routes;
pub use songs::song_routes;
pub use sse::workflow_event_stream;
pub use workflow::workflow_routes;
