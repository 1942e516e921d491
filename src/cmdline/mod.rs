//! Turning `Exec` templates into argument vectors and shell commands.

pub mod assemble;
pub mod exec_key;
pub mod quote;

pub use assemble::{application_command, FieldValues, LaunchSettings};
pub use exec_key::{validate_exec_key, ExecError, Quirks};
