//! Tool execution for SerialAgent: built-in exec/process/file-ops tools,
//! and the dispatch layer that routes declared [`sa_domain::model::ToolAction`]s
//! to their HTTP or stdio (MCP) transport.
//!
//! - `exec`/`process`: run commands foreground or auto-background, manage
//!   background sessions (list/poll/log/write/kill/clear/remove).
//! - `file_ops`: workspace-root-constrained file I/O, usable as a built-in
//!   local tool alongside declared remote/stdio actions.
//! - `registry`/`router`/`circuit_breaker`: resolve a `"plugin.action"` name,
//!   validate its arguments, and dispatch it with retry/backoff/timeout and
//!   per-action circuit breaking.

pub mod circuit_breaker;
pub mod exec;
pub mod file_ops;
pub mod manager;
pub mod process;
pub mod registry;
pub mod router;

pub use circuit_breaker::CircuitBreakerRegistry;
pub use manager::ProcessManager;
pub use registry::ToolRegistry;
pub use router::ToolRouter;
