//! # System Interaction Layer
//!
//! The boundary between the routing engine and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: Spawns external processes, captures their output and kills
//!   them when the invocation is cancelled (`Ctrl+C`).
//! - **`script`**: Handlers and middleware backed by a shell line, with
//!   `{placeholder}` expansion and `CLIROUTE_*` environment variables.
//! - **`loader`**: Resolves middleware by name from memory or from the
//!   program's `middleware/` directory.

pub mod executor;
pub mod loader;
pub mod script;
