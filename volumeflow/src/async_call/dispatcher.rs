//! Binds a resume handler and its context to a pending external call.

use super::completion::Completion;
use super::result::OperationResult;
use crate::metrics::RuntimeMetricsStorage;
use std::time::Instant;
use ulid::Ulid;

/// Opaque handle a collaborator invokes exactly once when its async work ends.
pub type CallbackHandle = Completion<OperationResult>;

/// Per-invocation context: the originating caller's continuation plus whatever
/// the next step needs.
///
/// Owned by the pending call until resumed, then taken apart by the handler.
/// Never shared between two pending calls.
pub struct WorkflowContext<T, S> {
    parent: Completion<T>,
    state: S,
}

impl<T: 'static, S> WorkflowContext<T, S> {
    pub fn new(parent: Completion<T>, state: S) -> Self {
        Self { parent, state }
    }

    pub fn into_parts(self) -> (Completion<T>, S) {
        (self.parent, self.state)
    }
}

/// Issues async calls on collaborators and routes their completion back into
/// a resume handler.
///
/// No thread affinity: the handler runs wherever the collaborator completes
/// the handle. A handler must either complete the caller's continuation or
/// issue another call; dangling chains are not detected.
#[derive(Clone, Debug, Default)]
pub struct AsyncCallbackDispatcher {
    metrics: RuntimeMetricsStorage,
}

impl AsyncCallbackDispatcher {
    pub fn new(metrics: RuntimeMetricsStorage) -> Self {
        Self { metrics }
    }

    /// Submit an operation and return without waiting for it.
    ///
    /// `submit` receives the callback handle and must pass it to the
    /// collaborator's async entry point. When the collaborator invokes the
    /// handle, `resume(result, context)` runs.
    pub fn issue<Ctx, R, Op>(&self, operation: &'static str, context: Ctx, resume: R, submit: Op)
    where
        Ctx: Send + 'static,
        R: FnOnce(OperationResult, Ctx) + Send + 'static,
        Op: FnOnce(CallbackHandle),
    {
        let call_id = Ulid::new();
        let issued_at = Instant::now();
        let metrics = self.metrics.clone();

        tracing::debug!(%call_id, operation, "Issuing async call");
        metrics.call_issued();

        let handle = Completion::new(move |result: OperationResult| {
            metrics.call_resumed();
            tracing::debug!(
                %call_id,
                operation,
                success = result.success,
                elapsed_ms = issued_at.elapsed().as_millis() as u64,
                "Resuming async call"
            );
            resume(result, context);
        });

        submit(handle);
    }
}
