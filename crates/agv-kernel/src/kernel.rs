//! The `Kernel` executor and the `SimHandle` processes use to talk to it.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use agv_core::{ProcessId, SimClock, SimTime};
use tracing::{error, trace, warn};

use crate::{EventQueue, KernelError, KernelResult, Store};

type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), String>>>>;

// ── Process bookkeeping ───────────────────────────────────────────────────────

/// Lifecycle of a spawned process.
///
/// A process is never runnable "on its own": it is `Scheduled` exactly when
/// an event for it sits in the queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// An event for this process is pending in the queue.
    Scheduled,
    /// Currently being polled.
    Running,
    /// Suspended on a [`Timeout`]; its resumption event is queued.
    WaitingTimeout,
    /// Parked on a store `get`; no event until a matching `put`.
    WaitingStore,
    /// Returned `Ok(())`.
    Terminated,
    /// Returned `Err(_)` (or suspended on a foreign future).
    Faulted,
}

impl ProcessState {
    pub fn is_finished(self) -> bool {
        matches!(self, ProcessState::Terminated | ProcessState::Faulted)
    }
}

struct ProcessSlot {
    name:  String,
    state: ProcessState,
}

/// A process that ended with an error.  Faults stop only the offending
/// process; they are collected here so callers can assert on them.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessFault {
    pub process: ProcessId,
    pub name:    String,
    pub time:    SimTime,
    pub message: String,
}

impl fmt::Display for ProcessFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' faulted at {}: {}", self.process, self.name, self.time, self.message)
    }
}

/// What happened to the process resumed by one [`Kernel::step`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Suspended,
    Terminated,
    Faulted,
    /// The event belonged to a process that had already finished.
    Skipped,
}

/// One resumption, recorded when tracing is enabled.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceEntry {
    pub time:    SimTime,
    pub process: ProcessId,
    pub outcome: StepOutcome,
}

// ── Shared kernel state ───────────────────────────────────────────────────────

pub(crate) struct KernelState {
    clock:   SimClock,
    queue:   EventQueue,
    current: ProcessId,
    procs:   Vec<ProcessSlot>,
}

impl KernelState {
    fn schedule(&mut self, due: SimTime, pid: ProcessId, state: ProcessState) {
        self.queue.schedule(due, pid);
        if let Some(slot) = self.procs.get_mut(pid.index()) {
            slot.state = state;
        }
    }

    fn set_state(&mut self, pid: ProcessId, state: ProcessState) {
        if let Some(slot) = self.procs.get_mut(pid.index()) {
            slot.state = state;
        }
    }
}

// ── SimHandle ─────────────────────────────────────────────────────────────────

/// Cheap, cloneable handle onto the kernel, held by every process and store.
///
/// Never hold a borrow obtained through a handle across an `.await`: the
/// handle itself never does, which is what lets any number of processes share
/// one kernel without locks.
#[derive(Clone)]
pub struct SimHandle {
    state: Rc<RefCell<KernelState>>,
}

impl SimHandle {
    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.state.borrow().clock.now()
    }

    /// The process currently being resumed, or `ProcessId::INVALID` outside
    /// of a resumption.
    pub fn current_process(&self) -> ProcessId {
        self.state.borrow().current
    }

    /// Suspend the calling process for `delay` simulated seconds.
    ///
    /// A zero delay yields: the process resumes at the same instant, after
    /// every event already queued for that instant.
    pub fn timeout(&self, delay: f64) -> Timeout {
        let delay = if delay.is_finite() && delay >= 0.0 {
            delay
        } else {
            warn!(delay, "invalid timeout delay clamped to zero");
            0.0
        };
        Timeout { handle: self.clone(), delay, due: None }
    }

    /// Create an empty store bound to this kernel.
    pub fn store<T: 'static>(&self, name: &str) -> Store<T> {
        Store::new(self.clone(), name)
    }

    pub fn process_state(&self, pid: ProcessId) -> Option<ProcessState> {
        self.state.borrow().procs.get(pid.index()).map(|p| p.state)
    }

    pub fn process_name(&self, pid: ProcessId) -> Option<String> {
        self.state.borrow().procs.get(pid.index()).map(|p| p.name.clone())
    }

    /// Make a parked process runnable at the current instant.
    pub(crate) fn wake(&self, pid: ProcessId) {
        let mut st = self.state.borrow_mut();
        let now = st.clock.now();
        st.schedule(now, pid, ProcessState::Scheduled);
    }

    pub(crate) fn park_current(&self) -> ProcessId {
        let mut st = self.state.borrow_mut();
        let pid = st.current;
        st.set_state(pid, ProcessState::WaitingStore);
        pid
    }
}

// ── Timeout ───────────────────────────────────────────────────────────────────

/// Future returned by [`SimHandle::timeout`].
///
/// The first poll arms the timer (queues an event at `now + delay`); the
/// kernel polls again once that event pops.
pub struct Timeout {
    handle: SimHandle,
    delay:  f64,
    due:    Option<SimTime>,
}

impl Future for Timeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.due {
            None => {
                let mut st = self.handle.state.borrow_mut();
                let due = st.clock.now() + self.delay;
                let pid = st.current;
                st.schedule(due, pid, ProcessState::WaitingTimeout);
                drop(st);
                self.due = Some(due);
                Poll::Pending
            }
            Some(due) if self.handle.now() >= due => Poll::Ready(()),
            Some(_) => Poll::Pending,
        }
    }
}

// ── Kernel ────────────────────────────────────────────────────────────────────

/// When [`Kernel::run_until`] should return.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StopCondition {
    /// Run until the event queue is empty.
    Exhausted,
    /// Run until the given process has terminated or faulted.
    Finished(ProcessId),
    /// Process every event due strictly before `t`, then set the clock to `t`.
    Time(SimTime),
}

/// Why [`Kernel::run_until`] returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stop condition was met.
    Stopped,
    /// No events remain but the condition was not met (a hang, if the
    /// condition was a process finishing).
    Exhausted,
}

/// Single-threaded cooperative executor over simulated time.
pub struct Kernel {
    handle:    SimHandle,
    processes: Vec<Option<ProcessFuture>>,
    faults:    Vec<ProcessFault>,
    watchdog:  Option<SimTime>,
    trace:     Option<Vec<TraceEntry>>,
}

impl Kernel {
    pub fn new() -> Self {
        let state = KernelState {
            clock:   SimClock::new(),
            queue:   EventQueue::new(),
            current: ProcessId::INVALID,
            procs:   Vec::new(),
        };
        Self {
            handle:    SimHandle { state: Rc::new(RefCell::new(state)) },
            processes: Vec::new(),
            faults:    Vec::new(),
            watchdog:  None,
            trace:     None,
        }
    }

    /// Abort any run whose next event lies beyond `limit` simulated seconds.
    pub fn with_watchdog(mut self, limit: SimTime) -> Self {
        self.watchdog = Some(limit);
        self
    }

    /// Record every resumption as a [`TraceEntry`].
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Vec::new);
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    pub fn now(&self) -> SimTime {
        self.handle.now()
    }

    /// Register a process.  It first runs at the current instant, after any
    /// events already queued for it.
    pub fn spawn<F, E>(&mut self, name: impl Into<String>, process: F) -> ProcessId
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: fmt::Display + 'static,
    {
        let pid = ProcessId(self.processes.len() as u32);
        let boxed: ProcessFuture = Box::pin(async move { process.await.map_err(|e| e.to_string()) });
        self.processes.push(Some(boxed));

        let mut st = self.handle.state.borrow_mut();
        st.procs.push(ProcessSlot { name: name.into(), state: ProcessState::Scheduled });
        let now = st.clock.now();
        st.schedule(now, pid, ProcessState::Scheduled);
        pid
    }

    pub fn process_state(&self, pid: ProcessId) -> KernelResult<ProcessState> {
        self.handle.process_state(pid).ok_or(KernelError::UnknownProcess(pid))
    }

    pub fn is_finished(&self, pid: ProcessId) -> bool {
        self.handle.process_state(pid).is_some_and(ProcessState::is_finished)
    }

    /// Faults recorded so far, in the order they occurred.
    pub fn faults(&self) -> &[ProcessFault] {
        &self.faults
    }

    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    /// Due time of the next event, if any.
    pub fn peek_next_time(&self) -> Option<SimTime> {
        self.handle.state.borrow().queue.peek_time()
    }

    pub fn pending_events(&self) -> usize {
        self.handle.state.borrow().queue.len()
    }

    /// Pop one event, advance the clock, and resume its process until it
    /// suspends or finishes.  Returns `Ok(None)` once the queue is empty.
    pub fn step(&mut self) -> KernelResult<Option<StepOutcome>> {
        let (time, pid) = {
            let mut st = self.handle.state.borrow_mut();
            let Some(next) = st.queue.peek_time() else {
                return Ok(None);
            };
            if let Some(limit) = self.watchdog.filter(|&limit| next > limit) {
                return Err(KernelError::WatchdogExpired { limit, next });
            }
            let Some((time, pid)) = st.queue.pop() else {
                return Ok(None);
            };
            st.clock.advance_to(time);
            (time, pid)
        };

        let outcome = self.resume(time, pid);
        if let Some(trace) = self.trace.as_mut() {
            trace.push(TraceEntry { time, process: pid, outcome });
        }
        Ok(Some(outcome))
    }

    fn resume(&mut self, time: SimTime, pid: ProcessId) -> StepOutcome {
        let Some(Some(process)) = self.processes.get_mut(pid.index()) else {
            return StepOutcome::Skipped;
        };
        {
            let mut st = self.handle.state.borrow_mut();
            st.current = pid;
            st.set_state(pid, ProcessState::Running);
        }

        let mut cx = Context::from_waker(Waker::noop());
        let polled = process.as_mut().poll(&mut cx);

        let state_after = {
            let mut st = self.handle.state.borrow_mut();
            st.current = ProcessId::INVALID;
            st.procs[pid.index()].state
        };

        let result = match polled {
            Poll::Pending if state_after == ProcessState::Running => {
                Err("suspended on a future not driven by the kernel".to_string())
            }
            Poll::Pending => {
                trace!(%time, process = %pid, state = ?state_after, "process suspended");
                return StepOutcome::Suspended;
            }
            Poll::Ready(result) => result,
        };

        self.processes[pid.index()] = None;
        match result {
            Ok(()) => {
                self.handle.state.borrow_mut().set_state(pid, ProcessState::Terminated);
                trace!(%time, process = %pid, "process terminated");
                StepOutcome::Terminated
            }
            Err(message) => {
                let name = self.handle.process_name(pid).unwrap_or_default();
                error!(%time, process = %pid, name = %name, %message, "process faulted");
                self.handle.state.borrow_mut().set_state(pid, ProcessState::Faulted);
                self.faults.push(ProcessFault { process: pid, name, time, message });
                StepOutcome::Faulted
            }
        }
    }

    /// Step until `condition` holds or no events remain.
    pub fn run_until(&mut self, condition: StopCondition) -> KernelResult<RunOutcome> {
        loop {
            match condition {
                StopCondition::Finished(pid) if self.is_finished(pid) => {
                    return Ok(RunOutcome::Stopped);
                }
                StopCondition::Time(t) => match self.peek_next_time() {
                    Some(next) if next < t => {}
                    _ => {
                        self.handle.state.borrow_mut().clock.advance_to(t);
                        return Ok(RunOutcome::Stopped);
                    }
                },
                _ => {}
            }
            if self.step()?.is_none() {
                return Ok(match condition {
                    StopCondition::Exhausted => RunOutcome::Stopped,
                    _ => RunOutcome::Exhausted,
                });
            }
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
