//! Continuation-passing dispatch for external async calls.
//!
//! ## Architecture
//!
//! ```text
//! caller ──issue(op, ctx, resume)──► collaborator.xxx_async(.., handle)
//!    │                                          │
//!    └── returns immediately                    └── later, any thread:
//!                                                   handle.complete(OperationResult)
//!                                                        │
//!                                                        ▼
//!                                             resume(result, ctx)
//!                                               ├─ parent.complete(..)   (done)
//!                                               └─ issue(next, ..)       (chain)
//! ```
//!
//! Every multi-step workflow is written as ordinary resumable functions: the
//! context owns the caller's [`Completion`] and whatever entities the next
//! step needs, and ownership moves forward with each hop.

mod completion;
mod dispatcher;
mod result;

pub use completion::Completion;
pub use dispatcher::{AsyncCallbackDispatcher, CallbackHandle, WorkflowContext};
pub use result::OperationResult;
