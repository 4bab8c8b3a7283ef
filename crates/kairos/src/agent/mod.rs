//! Agent runtime: the window/decide loop and its supporting modules.
//!
//! - [`runner::Agent`]: owns the pipeline for one process. Start here.
//! - [`config::AgentConfig`]: every tunable, with validation and file loading.
//! - [`events`]: [`EventHandler`] trait and [`AgentEvent`] enum for observing
//!   the loop. Includes [`LoggingHandler`], [`CompositeEventHandler`] and
//!   [`FnEventHandler`].

pub mod config;
pub mod events;
pub mod runner;

pub use config::AgentConfig;
pub use events::{
    AgentEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
};
pub use runner::{Agent, SampleSource, spawn_pipeline};
