//! Runtime core: composition root and lifecycle.
//!
//! - [`Manager`] owns the informer and controller registries, the event bus
//!   and the subscribers; it is the process's composition root.
//! - [`run_informers_and_controllers`] is the run loop (sync, start, wait,
//!   drain within grace).
//! - [`Config`] and [`RunArguments`] carry the settings.
//!
//! Internal modules:
//! - `shutdown`: stop token / OS signal wait.

mod builder;
mod config;
mod manager;
mod runner;
mod shutdown;

pub use builder::ManagerBuilder;
pub use config::Config;
pub use manager::Manager;
pub use runner::{RunArguments, run_informers_and_controllers};
