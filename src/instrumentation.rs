//! Per-type instrumentation helpers
//!
//! `Instrumentation` groups the interceptors installed on one type so they can
//! be toggled and removed together. [`time_targets`] wires every configured
//! target to a [`RecordCollector`].

use crate::collector::RecordCollector;
use crate::config::InstrumentationConfig;
use crate::dispatch::DispatchTable;
use crate::error::Result;
use crate::interceptor::MethodInterceptor;
use crate::invocation::Invocation;
use crate::operation::{OperationKey, OperationKind};
use crate::record::InstrumentationRecord;
use serde_json::Value;
use std::sync::Arc;

/// Interceptors installed on a single type
#[derive(Debug)]
pub struct Instrumentation {
    table: Arc<DispatchTable>,
    type_name: String,
    interceptors: Vec<MethodInterceptor>,
}

impl Instrumentation {
    pub fn for_type(table: Arc<DispatchTable>, type_name: impl Into<String>) -> Self {
        Self {
            table,
            type_name: type_name.into(),
            interceptors: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn interceptors(&self) -> &[MethodInterceptor] {
        &self.interceptors
    }

    /// Interceptor previously attached for `operation`/`kind`
    pub fn interceptor(&self, operation: &str, kind: OperationKind) -> Option<&MethodInterceptor> {
        self.interceptors
            .iter()
            .find(|i| i.operation_name() == operation && i.kind() == kind)
    }

    fn key(&self, operation: &str, kind: OperationKind) -> OperationKey {
        OperationKey::new(self.type_name.clone(), operation, kind)
    }

    /// Install a configured interceptor and keep it
    fn attach<F>(&mut self, operation: &str, kind: OperationKind, configure: F) -> Result<&MethodInterceptor>
    where
        F: FnOnce(&MethodInterceptor),
    {
        let interceptor = MethodInterceptor::new(self.table.clone(), self.key(operation, kind));
        configure(&interceptor);
        interceptor.install()?;
        self.interceptors.push(interceptor);
        Ok(&self.interceptors[self.interceptors.len() - 1])
    }

    /// Run `before` ahead of every call to the instance-level `operation`
    pub fn intercept_instance_method<F>(&mut self, operation: &str, before: F) -> Result<&MethodInterceptor>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.attach(operation, OperationKind::Instance, |i| i.set_before_hook(before))
    }

    /// Run `before` ahead of every call to the type-level `operation`
    pub fn intercept_type_method<F>(&mut self, operation: &str, before: F) -> Result<&MethodInterceptor>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.attach(operation, OperationKind::Type, |i| i.set_before_hook(before))
    }

    /// Replace the instance-level `operation` entirely
    pub fn replace_instance_method<F>(&mut self, operation: &str, replace: F) -> Result<&MethodInterceptor>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.attach(operation, OperationKind::Instance, |i| i.set_replace_hook(replace))
    }

    /// Replace the type-level `operation` entirely
    pub fn replace_type_method<F>(&mut self, operation: &str, replace: F) -> Result<&MethodInterceptor>
    where
        F: Fn(&mut Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.attach(operation, OperationKind::Type, |i| i.set_replace_hook(replace))
    }

    /// Hand the timing record of every call to `after`
    pub fn instrument_for_timing<F>(
        &mut self,
        operation: &str,
        kind: OperationKind,
        after: F,
    ) -> Result<&MethodInterceptor>
    where
        F: Fn(&Invocation, InstrumentationRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.attach(operation, kind, |i| i.set_after_hook(after))
    }

    /// Enable or disable every interceptor of this type
    pub fn set_enabled(&self, enabled: bool) {
        for interceptor in &self.interceptors {
            interceptor.set_enabled(enabled);
        }
    }

    /// Remove and discard every interceptor; returns how many were installed
    pub fn remove_all(&mut self) -> usize {
        let removed = self.interceptors.iter().filter(|i| i.remove()).count();
        self.interceptors.clear();
        tracing::debug!(type_name = %self.type_name, removed, "removed instrumentation");
        removed
    }
}

/// Install a timing interceptor for each configured target, feeding `collector`.
///
/// All-or-nothing: if any target fails to install, the interceptors already
/// installed are dropped (and thereby removed) before the error is returned.
pub fn time_targets(
    table: &Arc<DispatchTable>,
    config: &InstrumentationConfig,
    collector: &Arc<RecordCollector>,
) -> Result<Vec<MethodInterceptor>> {
    let mut installed = Vec::with_capacity(config.targets.len());
    for key in &config.targets {
        let interceptor = MethodInterceptor::new(table.clone(), key.clone());
        interceptor.set_enabled(config.enabled_by_default);
        interceptor.set_shared_after_hook(collector.after_hook());
        interceptor.install()?;
        installed.push(interceptor);
    }
    tracing::debug!(targets = installed.len(), "timing instrumentation installed");
    Ok(installed)
}
