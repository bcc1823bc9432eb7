//! `agv-kernel`: the discrete-event simulation kernel.
//!
//! # Execution model
//!
//! ```text
//! loop:
//!   ① Pop:    take the earliest (due_time, sequence) event from EventQueue.
//!   ② Clock:  advance `now` to the event's due time.
//!   ③ Resume: poll the owning process until it next suspends:
//!                handle.timeout(Δt).await   → event at now + Δt
//!                store.get().await (no item) → parked, no event
//!                store.put(x) wakes a parked → event at *now*
//!   ④ Repeat until the stop condition holds or no events remain.
//! ```
//!
//! Processes are ordinary `async` blocks.  The kernel is their executor:
//! exactly one process runs at a time, and the event queue is the only source
//! of resumptions, so two runs over the same inputs interleave identically.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                 |
//! |------------|----------------------------------------------------------|
//! | [`queue`]  | `EventQueue` (`BTreeMap<(SimTime, seq), ProcessId>`)      |
//! | [`kernel`] | `Kernel`, `SimHandle`, `Timeout`, `StopCondition`, trace  |
//! | [`store`]  | `Store<T>` with blocking `get` and non-blocking helpers  |
//! | [`error`]  | `KernelError`, `KernelResult<T>`                          |

pub mod error;
pub mod kernel;
pub mod queue;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{KernelError, KernelResult};
pub use kernel::{
    Kernel, ProcessFault, ProcessState, RunOutcome, SimHandle, StepOutcome, StopCondition,
    Timeout, TraceEntry,
};
pub use queue::EventQueue;
pub use store::{Get, Store};
