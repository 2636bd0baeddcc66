//! Interpose - method interception with per-call timing records
//!
//! Operations are registered in a [`dispatch::DispatchTable`] and always called
//! through it. A [`interceptor::MethodInterceptor`] swaps an operation's
//! implementation for a trampoline that runs optional before/replace/after
//! hooks, forwards to the captured original, and hands an
//! [`record::InstrumentationRecord`] to the after-hook.

pub mod cli;
pub mod collector;
pub mod config;
pub mod demo;
pub mod dispatch;
pub mod error;
pub mod instrumentation;
pub mod interceptor;
pub mod invocation;
pub mod json_output;
pub mod operation;
pub mod record;
pub mod stats;

pub use dispatch::DispatchTable;
pub use error::{HookKind, InterceptError};
pub use interceptor::MethodInterceptor;
pub use invocation::{Invocation, Receiver};
pub use operation::{OperationKey, OperationKind};
pub use record::InstrumentationRecord;
