//! External command execution
//!
//! - [`ShellExecutor`]: capability to spawn a process and capture its output
//! - [`RealShellExecutor`]: `tokio::process` implementation, killed on cancel
//! - [`LoggingShellExecutor`]: decorator logging every call
//! - [`MockShellExecutor`]: canned responses and a call log for tests
//! - [`CommandBuilder`]: fluent argv assembly resolved against a tool context

pub mod cache;
pub mod command;
pub mod executor;
pub mod logging;
pub mod mock;

pub use cache::OutputCache;
pub use command::CommandBuilder;
pub use executor::{CommandOutput, ExecError, Invocation, RealShellExecutor, ShellExecutor};
pub use logging::LoggingShellExecutor;
pub use mock::{CommandCall, MockShellExecutor};
