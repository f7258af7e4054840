//! Process-level wiring: configuration, the construction root ("app
//! runtime"), and the HTTP submission/listing surface. Everything
//! queue-specific (broker, store, registry, engine, worker loop) lives in
//! its own workspace crate; this crate only assembles them into a running
//! process.

pub mod app;
pub mod http;

pub use app::{AppConfig, AppContext, AppRuntime};
