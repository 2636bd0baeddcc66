//! Method interceptor: before/replace/after hooks around a dispatched operation
//!
//! A [`MethodInterceptor`] names one operation (`type`, `operation`, kind) and
//! holds three independently optional hooks plus an `enabled` flag. Installing
//! it captures the operation's current implementation and routes every call
//! through a trampoline:
//!
//! ```text
//! call ─► trampoline ─┬─ disabled ──────────────────────────► original ─► result
//!                     └─ enabled ─► before ─► [start] replace | original [end]
//!                                                  ─► record ─► after ─► result
//! ```
//!
//! Only the replaced/original segment is timed. A failing before-hook aborts
//! the call with no record. A failing original or replacement propagates
//! immediately, also without a record. A failing after-hook propagates after
//! its record has been handed over.
//!
//! # Example
//! ```
//! use interpose::dispatch::DispatchTable;
//! use interpose::interceptor::MethodInterceptor;
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! let table = Arc::new(DispatchTable::new());
//! table.define_instance("Calculator", "compute", |inv| {
//!     Ok(json!(inv.argument_i64(0).unwrap_or(0) + 1))
//! })?;
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let sink = log.clone();
//! let interceptor = MethodInterceptor::for_instance_method(table.clone(), "Calculator", "compute");
//! interceptor.set_before_hook(|inv| {
//!     let doubled = inv.argument_i64(0).unwrap_or(0) * 2;
//!     inv.set_argument(0, doubled);
//!     Ok(())
//! });
//! interceptor.set_after_hook(move |_inv, record| {
//!     sink.lock().unwrap().push(record.duration());
//!     Ok(())
//! });
//! interceptor.install()?;
//!
//! let result = table.call_instance("Calculator", "compute", json!({}), vec![json!(5)])?;
//! assert_eq!(result, json!(11));
//! assert_eq!(log.lock().unwrap().len(), 1);
//! # Ok::<(), interpose::error::InterceptError>(())
//! ```

use crate::dispatch::{DispatchTable, Implementation};
use crate::error::{HookKind, InterceptError, Result};
use crate::invocation::Invocation;
use crate::operation::{OperationKey, OperationKind};
use crate::record::{InstrumentationRecord, SegmentTimer};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Runs before the operation; may rewrite arguments in place
pub type BeforeHook = Arc<dyn Fn(&mut Invocation) -> anyhow::Result<()> + Send + Sync>;

/// Runs instead of the original; its return value is the call's result
pub type ReplaceHook = Arc<dyn Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync>;

/// Runs after the operation with the call's timing record; cannot alter the result
pub type AfterHook =
    Arc<dyn Fn(&Invocation, InstrumentationRecord) -> anyhow::Result<()> + Send + Sync>;

static NEXT_INTERCEPTOR_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Default)]
struct Hooks {
    before: Option<BeforeHook>,
    replace: Option<ReplaceHook>,
    after: Option<AfterHook>,
}

/// State shared between the interceptor handle and its installed trampoline
struct InterceptorState {
    key: OperationKey,
    enabled: AtomicBool,
    hooks: RwLock<Hooks>,
}

impl InterceptorState {
    fn hook_error(&self, hook: HookKind, source: anyhow::Error) -> anyhow::Error {
        anyhow::Error::new(InterceptError::HookExecution {
            key: self.key.clone(),
            hook,
            source,
        })
    }

    /// Trampoline body
    fn route(&self, original: &Implementation, invocation: &mut Invocation) -> anyhow::Result<Value> {
        if !self.enabled.load(Ordering::Acquire) {
            return original(invocation);
        }

        // One consistent hook set per call, lock released before any hook runs
        let hooks = self.hooks.read().clone();

        if let Some(before) = &hooks.before {
            before(invocation).map_err(|e| self.hook_error(HookKind::Before, e))?;
        }

        let timer = SegmentTimer::start();
        let result = match &hooks.replace {
            Some(replace) => replace(invocation).map_err(|e| self.hook_error(HookKind::Replace, e))?,
            None => original(invocation)?,
        };
        let record = timer.finish(&self.key);

        tracing::trace!(
            operation = %self.key,
            duration_us = record.duration_us(),
            replaced = hooks.replace.is_some(),
            "intercepted call"
        );

        if let Some(after) = &hooks.after {
            after(invocation, record).map_err(|e| self.hook_error(HookKind::After, e))?;
        }

        Ok(result)
    }
}

/// Intercepts a single operation in a [`DispatchTable`]
///
/// Hooks and the enabled flag can be changed at any time, including while
/// other threads are calling through the trampoline. Dropping an installed
/// interceptor removes it.
pub struct MethodInterceptor {
    id: u64,
    table: Arc<DispatchTable>,
    state: Arc<InterceptorState>,
}

impl MethodInterceptor {
    /// Create an interceptor for `key` in `table`. Enabled, no hooks, not installed.
    pub fn new(table: Arc<DispatchTable>, key: OperationKey) -> Self {
        Self {
            id: NEXT_INTERCEPTOR_ID.fetch_add(1, Ordering::Relaxed),
            table,
            state: Arc::new(InterceptorState {
                key,
                enabled: AtomicBool::new(true),
                hooks: RwLock::new(Hooks::default()),
            }),
        }
    }

    pub fn for_instance_method(table: Arc<DispatchTable>, type_name: &str, operation: &str) -> Self {
        Self::new(table, OperationKey::instance(type_name, operation))
    }

    pub fn for_type_method(table: Arc<DispatchTable>, type_name: &str, operation: &str) -> Self {
        Self::new(table, OperationKey::type_level(type_name, operation))
    }

    /// Interceptor bound to the process-wide table
    pub fn global(key: OperationKey) -> Self {
        Self::new(DispatchTable::global(), key)
    }

    pub fn key(&self) -> &OperationKey {
        &self.state.key
    }

    pub fn target_type(&self) -> &str {
        &self.state.key.type_name
    }

    pub fn operation_name(&self) -> &str {
        &self.state.key.operation
    }

    pub fn kind(&self) -> OperationKind {
        self.state.key.kind
    }

    pub fn is_instance_level(&self) -> bool {
        self.state.key.is_instance_level()
    }

    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::Release);
    }

    pub fn set_before_hook<F>(&self, hook: F)
    where
        F: Fn(&mut Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.state.hooks.write().before = Some(Arc::new(hook));
    }

    pub fn set_replace_hook<F>(&self, hook: F)
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.state.hooks.write().replace = Some(Arc::new(hook));
    }

    pub fn set_after_hook<F>(&self, hook: F)
    where
        F: Fn(&Invocation, InstrumentationRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.state.hooks.write().after = Some(Arc::new(hook));
    }

    /// Install an already shared after-hook (e.g. a collector's)
    pub fn set_shared_after_hook(&self, hook: AfterHook) {
        self.state.hooks.write().after = Some(hook);
    }

    pub fn clear_before_hook(&self) {
        self.state.hooks.write().before = None;
    }

    pub fn clear_replace_hook(&self) {
        self.state.hooks.write().replace = None;
    }

    pub fn clear_after_hook(&self) {
        self.state.hooks.write().after = None;
    }

    pub fn has_before_hook(&self) -> bool {
        self.state.hooks.read().before.is_some()
    }

    pub fn has_replace_hook(&self) -> bool {
        self.state.hooks.read().replace.is_some()
    }

    pub fn has_after_hook(&self) -> bool {
        self.state.hooks.read().after.is_some()
    }

    /// Whether this interceptor currently owns its operation's slot
    pub fn is_installed(&self) -> bool {
        self.table.interceptor_of(&self.state.key) == Some(self.id)
    }

    /// Capture the original implementation and route calls through this interceptor.
    ///
    /// # Errors
    /// - `TargetNotFound` if the operation is not defined; nothing is changed.
    /// - `AlreadyInstalled` if this interceptor is already installed.
    /// - `TargetAlreadyIntercepted` if another interceptor owns the operation.
    pub fn install(&self) -> Result<()> {
        let state = self.state.clone();
        self.table.intercept(&self.state.key, self.id, move |original| {
            let trampoline: Implementation =
                Arc::new(move |invocation: &mut Invocation| state.route(&original, invocation));
            trampoline
        })
    }

    /// Restore the original implementation. No-op when not installed.
    ///
    /// Returns whether anything was restored. Hooks and the enabled flag are kept.
    pub fn remove(&self) -> bool {
        self.table.restore(&self.state.key, self.id)
    }
}

impl Drop for MethodInterceptor {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for MethodInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.state.hooks.read();
        f.debug_struct("MethodInterceptor")
            .field("id", &self.id)
            .field("key", &self.state.key)
            .field("enabled", &self.is_enabled())
            .field("before", &hooks.before.is_some())
            .field("replace", &hooks.replace.is_some())
            .field("after", &hooks.after.is_some())
            .finish()
    }
}
