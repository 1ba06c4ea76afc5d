//! exec 层：注册表、调用上下文、参数解析、带超时的执行器与内置 exec

pub mod args;
pub mod builtin;
pub mod executor;
pub mod info;
pub mod registry;

pub use args::ParsedArgs;
pub use builtin::register_builtins;
pub use executor::{ExecOutcome, ExecRunner};
pub use info::ExecInfo;
pub use registry::{Exec, ExecRegistry, FnExec};
