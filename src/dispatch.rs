//! Dispatch table: the indirection layer every intercepted call goes through
//!
//! Rust has no open, mutable method tables, so operations are registered in a
//! `DispatchTable` keyed by [`OperationKey`] and always invoked through it.
//! Swapping the `Arc` held in a slot is the equivalent of patching an
//! implementation pointer in place.
//!
//! # Locking
//!
//! - `slots`: read-mostly map; a read lock is held only long enough to clone
//!   the slot's `Arc`.
//! - `Slot::implementation`: read lock held only to clone the current
//!   implementation. Calls run with **no** lock held, so implementations and
//!   hooks may call back into the table.
//! - `patch`: serializes capture-and-swap (intercept/restore/exchange) so two
//!   installs can never interleave and lose an original.
//!
//! # Global state
//!
//! [`DispatchTable::global`] is created empty on first use.
//! [`DispatchTable::reset`] restores every intercepted slot and clears all
//! definitions; tests that share the global table call it between cases.

use crate::error::{InterceptError, Result};
use crate::invocation::{Invocation, Receiver};
use crate::operation::OperationKey;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// An operation body: takes the invocation, returns the call's result
pub type Implementation = Arc<dyn Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync>;

/// Wrap a closure as an [`Implementation`]
pub fn implementation<F>(f: F) -> Implementation
where
    F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Bookkeeping for a slot currently owned by an interceptor
struct Interception {
    owner: u64,
    original: Implementation,
}

struct Slot {
    implementation: RwLock<Implementation>,
    interception: Mutex<Option<Interception>>,
}

impl Slot {
    fn new(implementation: Implementation) -> Self {
        Self {
            implementation: RwLock::new(implementation),
            interception: Mutex::new(None),
        }
    }

    fn current(&self) -> Implementation {
        self.implementation.read().clone()
    }

    fn swap(&self, new: Implementation) -> Implementation {
        std::mem::replace(&mut *self.implementation.write(), new)
    }
}

/// Registry of operation implementations, keyed by `(type, operation, kind)`
#[derive(Default)]
pub struct DispatchTable {
    slots: RwLock<HashMap<OperationKey, Arc<Slot>>>,
    patch: Mutex<()>,
}

static GLOBAL: OnceLock<Arc<DispatchTable>> = OnceLock::new();

impl DispatchTable {
    /// Create an empty, isolated table
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide table, empty on first access
    pub fn global() -> Arc<DispatchTable> {
        GLOBAL.get_or_init(|| Arc::new(DispatchTable::new())).clone()
    }

    /// Define an operation.
    ///
    /// # Errors
    /// `DuplicateOperation` if the key already has an implementation.
    pub fn define(&self, key: OperationKey, implementation: Implementation) -> Result<()> {
        let mut slots = self.slots.write();
        if slots.contains_key(&key) {
            return Err(InterceptError::DuplicateOperation { key });
        }
        tracing::debug!(operation = %key, "defined operation");
        slots.insert(key, Arc::new(Slot::new(implementation)));
        Ok(())
    }

    /// Define an instance-level operation from a closure
    pub fn define_instance<F>(&self, type_name: &str, operation: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.define(OperationKey::instance(type_name, operation), Arc::new(f))
    }

    /// Define a type-level operation from a closure
    pub fn define_type<F>(&self, type_name: &str, operation: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.define(OperationKey::type_level(type_name, operation), Arc::new(f))
    }

    pub fn contains(&self, key: &OperationKey) -> bool {
        self.slots.read().contains_key(key)
    }

    /// All defined operations, sorted by display name
    pub fn operations(&self) -> Vec<OperationKey> {
        let mut keys: Vec<_> = self.slots.read().keys().cloned().collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    /// Operations currently routed through an interceptor
    pub fn intercepted(&self) -> Vec<OperationKey> {
        let mut keys: Vec<_> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.interception.lock().is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    fn slot(&self, key: &OperationKey) -> Result<Arc<Slot>> {
        self.slots
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| InterceptError::TargetNotFound { key: key.clone() })
    }

    /// Current implementation bound to `key` (a trampoline while intercepted)
    pub fn lookup(&self, key: &OperationKey) -> Result<Implementation> {
        Ok(self.slot(key)?.current())
    }

    /// Atomically substitute the implementation bound to `key`, returning the previous one
    ///
    /// # Errors
    /// - `TargetNotFound` if `key` is not defined.
    /// - `TargetAlreadyIntercepted` while an interceptor owns the slot. Its
    ///   trampoline and captured original stay in place.
    pub fn exchange(&self, key: &OperationKey, new: Implementation) -> Result<Implementation> {
        let _patch = self.patch.lock();
        let slot = self.slot(key)?;
        let interception = slot.interception.lock();
        if interception.is_some() {
            return Err(InterceptError::TargetAlreadyIntercepted { key: key.clone() });
        }
        tracing::debug!(operation = %key, "exchanged implementation");
        Ok(slot.swap(new))
    }

    /// Call `key` with an explicit receiver and arguments
    pub fn invoke(&self, receiver: Receiver, key: OperationKey, arguments: Vec<Value>) -> Result<Value> {
        let implementation = self.lookup(&key)?;
        let mut invocation = Invocation::new(receiver, key, arguments);
        implementation(&mut invocation).map_err(InterceptError::from_operation)
    }

    /// Call an instance-level operation on an instance with the given state
    pub fn call_instance(
        &self,
        type_name: &str,
        operation: &str,
        state: Value,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        self.invoke(
            Receiver::Instance(state),
            OperationKey::instance(type_name, operation),
            arguments,
        )
    }

    /// Call a type-level operation
    pub fn call_type(&self, type_name: &str, operation: &str, arguments: Vec<Value>) -> Result<Value> {
        self.invoke(
            Receiver::Type,
            OperationKey::type_level(type_name, operation),
            arguments,
        )
    }

    /// Capture the current implementation of `key` and route calls through
    /// the trampoline built from it, on behalf of interceptor `owner`.
    pub(crate) fn intercept<F>(&self, key: &OperationKey, owner: u64, make_trampoline: F) -> Result<()>
    where
        F: FnOnce(Implementation) -> Implementation,
    {
        let _patch = self.patch.lock();
        let slot = self.slot(key)?;
        let mut interception = slot.interception.lock();

        match interception.as_ref() {
            Some(existing) if existing.owner == owner => {
                return Err(InterceptError::AlreadyInstalled { key: key.clone() });
            }
            Some(_) => {
                return Err(InterceptError::TargetAlreadyIntercepted { key: key.clone() });
            }
            None => {}
        }

        let original = slot.current();
        let trampoline = make_trampoline(original.clone());
        slot.swap(trampoline);
        *interception = Some(Interception { owner, original });

        tracing::debug!(operation = %key, interceptor = owner, "installed interceptor");
        Ok(())
    }

    /// Put back the original implementation if `owner` holds the slot.
    ///
    /// Returns `false` when there was nothing to restore.
    pub(crate) fn restore(&self, key: &OperationKey, owner: u64) -> bool {
        let _patch = self.patch.lock();
        let Ok(slot) = self.slot(key) else {
            return false;
        };
        let mut interception = slot.interception.lock();

        match interception.take() {
            Some(held) if held.owner == owner => {
                slot.swap(held.original);
                tracing::debug!(operation = %key, interceptor = owner, "removed interceptor");
                true
            }
            other => {
                *interception = other;
                false
            }
        }
    }

    /// Id of the interceptor currently owning `key`, if any
    pub(crate) fn interceptor_of(&self, key: &OperationKey) -> Option<u64> {
        let slot = self.slot(key).ok()?;
        let owner = slot.interception.lock().as_ref().map(|i| i.owner);
        owner
    }

    /// Restore every intercepted operation, keeping definitions
    pub fn remove_all_interceptors(&self) -> usize {
        let _patch = self.patch.lock();
        self.restore_all_locked()
    }

    /// Teardown: remove all interceptors, then drop every definition
    pub fn reset(&self) {
        let _patch = self.patch.lock();
        let restored = self.restore_all_locked();
        let mut slots = self.slots.write();
        tracing::debug!(operations = slots.len(), restored, "reset dispatch table");
        slots.clear();
    }

    fn restore_all_locked(&self) -> usize {
        let slots = self.slots.read();
        let mut restored = 0;
        for (key, slot) in slots.iter() {
            if let Some(held) = slot.interception.lock().take() {
                slot.swap(held.original);
                tracing::debug!(operation = %key, interceptor = held.owner, "removed interceptor");
                restored += 1;
            }
        }
        restored
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("operations", &self.operations())
            .field("intercepted", &self.intercepted())
            .finish()
    }
}
