//! Unit tests for agv-kernel.

#[cfg(test)]
mod helpers {
    use std::cell::RefCell;
    use std::rc::Rc;

    use agv_core::SimTime;

    pub type Log = Rc<RefCell<Vec<(SimTime, &'static str)>>>;

    pub fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    pub fn labels(log: &Log) -> Vec<&'static str> {
        log.borrow().iter().map(|(_, l)| *l).collect()
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod queue {
    use agv_core::{ProcessId, SimTime};

    use crate::EventQueue;

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule(SimTime(5.0), ProcessId(0));
        q.schedule(SimTime(1.0), ProcessId(1));
        q.schedule(SimTime(3.0), ProcessId(2));
        assert_eq!(q.peek_time(), Some(SimTime(1.0)));
        assert_eq!(q.pop(), Some((SimTime(1.0), ProcessId(1))));
        assert_eq!(q.pop(), Some((SimTime(3.0), ProcessId(2))));
        assert_eq!(q.pop(), Some((SimTime(5.0), ProcessId(0))));
        assert!(q.pop().is_none());
    }

    #[test]
    fn equal_times_are_fifo() {
        let mut q = EventQueue::new();
        for p in [4, 2, 9, 0] {
            q.schedule(SimTime(2.0), ProcessId(p));
        }
        let order: Vec<_> = std::iter::from_fn(|| q.pop()).map(|(_, p)| p.0).collect();
        assert_eq!(order, vec![4, 2, 9, 0]);
        assert_eq!(q.scheduled_total(), 4);
        assert!(q.is_empty());
    }
}

// ── Kernel: timeouts, ordering, lifecycle ────────────────────────────────────

#[cfg(test)]
mod kernel {
    use std::future::pending;

    use agv_core::SimTime;

    use super::helpers::{labels, log};
    use crate::{Kernel, KernelError, ProcessState, RunOutcome, StepOutcome, StopCondition};

    #[test]
    fn timeouts_advance_the_clock() {
        let mut kernel = Kernel::new();
        let h = kernel.handle();
        let events = log();
        let ev = events.clone();
        kernel.spawn("sleeper", async move {
            ev.borrow_mut().push((h.now(), "start"));
            h.timeout(2.5).await;
            ev.borrow_mut().push((h.now(), "woke"));
            h.timeout(1.0).await;
            ev.borrow_mut().push((h.now(), "done"));
            Ok::<(), String>(())
        });
        assert_eq!(kernel.run_until(StopCondition::Exhausted).unwrap(), RunOutcome::Stopped);
        let times: Vec<_> = events.borrow().iter().map(|(t, _)| t.secs()).collect();
        assert_eq!(times, vec![0.0, 2.5, 3.5]);
        assert_eq!(kernel.now(), SimTime(3.5));
    }

    #[test]
    fn equal_time_resumptions_follow_schedule_order() {
        let mut kernel = Kernel::new();
        let events = log();
        for label in ["a", "b", "c"] {
            let h = kernel.handle();
            let ev = events.clone();
            kernel.spawn(label, async move {
                h.timeout(1.0).await;
                ev.borrow_mut().push((h.now(), label));
                Ok::<(), String>(())
            });
        }
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&events), vec!["a", "b", "c"]);
    }

    #[test]
    fn zero_timeout_yields_to_same_instant_events() {
        let mut kernel = Kernel::new();
        let events = log();
        let (h1, ev1) = (kernel.handle(), events.clone());
        kernel.spawn("yielder", async move {
            ev1.borrow_mut().push((h1.now(), "y1"));
            h1.timeout(0.0).await;
            ev1.borrow_mut().push((h1.now(), "y2"));
            Ok::<(), String>(())
        });
        let (h2, ev2) = (kernel.handle(), events.clone());
        kernel.spawn("other", async move {
            ev2.borrow_mut().push((h2.now(), "o"));
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&events), vec!["y1", "o", "y2"]);
        assert_eq!(kernel.now(), SimTime::ZERO);
    }

    #[test]
    fn fault_stops_only_the_faulting_process() {
        let mut kernel = Kernel::new();
        let h = kernel.handle();
        let bad = kernel.spawn("bad", async move {
            h.timeout(1.0).await;
            Err::<(), _>("malformed line 3")
        });
        let h = kernel.handle();
        let events = log();
        let ev = events.clone();
        let good = kernel.spawn("good", async move {
            h.timeout(5.0).await;
            ev.borrow_mut().push((h.now(), "good"));
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();

        assert_eq!(kernel.process_state(bad).unwrap(), ProcessState::Faulted);
        assert_eq!(kernel.process_state(good).unwrap(), ProcessState::Terminated);
        assert_eq!(labels(&events), vec!["good"]);
        let faults = kernel.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].process, bad);
        assert_eq!(faults[0].time, SimTime(1.0));
        assert_eq!(faults[0].message, "malformed line 3");
        assert_eq!(kernel.now(), SimTime(5.0));
    }

    #[test]
    fn foreign_future_is_reported_as_a_fault() {
        let mut kernel = Kernel::new();
        let pid = kernel.spawn("stuck", async {
            pending::<()>().await;
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert!(kernel.is_finished(pid));
        assert_eq!(kernel.faults().len(), 1);
    }

    #[test]
    fn run_until_finished_leaves_other_events_queued() {
        let mut kernel = Kernel::new();
        let h = kernel.handle();
        let end = kernel.spawn("end", async move {
            h.timeout(3.0).await;
            Ok::<(), String>(())
        });
        let h = kernel.handle();
        kernel.spawn("ticker", async move {
            while h.now() < SimTime(1e9) {
                h.timeout(1.0).await;
            }
            Ok::<(), String>(())
        });
        assert_eq!(kernel.run_until(StopCondition::Finished(end)).unwrap(), RunOutcome::Stopped);
        assert_eq!(kernel.now(), SimTime(3.0));
        assert!(kernel.pending_events() > 0);
    }

    #[test]
    fn run_until_time_stops_before_events_at_that_time() {
        let mut kernel = Kernel::new();
        let events = log();
        let (h, ev) = (kernel.handle(), events.clone());
        kernel.spawn("p", async move {
            h.timeout(2.0).await;
            ev.borrow_mut().push((h.now(), "at2"));
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Time(SimTime(2.0))).unwrap();
        assert!(events.borrow().is_empty());
        assert_eq!(kernel.now(), SimTime(2.0));
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&events), vec!["at2"]);
    }

    #[test]
    fn exhausted_before_condition_is_reported() {
        let mut kernel = Kernel::new();
        let h = kernel.handle();
        let store = h.store::<u32>("never");
        let waiter = kernel.spawn("waiter", async move {
            store.get().await;
            Ok::<(), String>(())
        });
        let outcome = kernel.run_until(StopCondition::Finished(waiter)).unwrap();
        assert_eq!(outcome, RunOutcome::Exhausted);
        assert_eq!(kernel.process_state(waiter).unwrap(), ProcessState::WaitingStore);
    }

    #[test]
    fn watchdog_aborts_runaway_runs() {
        let mut kernel = Kernel::new().with_watchdog(SimTime(10.0));
        let h = kernel.handle();
        kernel.spawn("forever", async move {
            while h.now() < SimTime(1e9) {
                h.timeout(3.0).await;
            }
            Ok::<(), String>(())
        });
        match kernel.run_until(StopCondition::Exhausted) {
            Err(KernelError::WatchdogExpired { limit, next }) => {
                assert_eq!(limit, SimTime(10.0));
                assert_eq!(next, SimTime(12.0));
            }
            other => panic!("expected watchdog expiry, got {other:?}"),
        }
        assert_eq!(kernel.now(), SimTime(9.0));
    }

    #[test]
    fn trace_records_every_resumption() {
        let mut kernel = Kernel::new();
        kernel.enable_trace();
        let h = kernel.handle();
        let pid = kernel.spawn("p", async move {
            h.timeout(1.0).await;
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();
        let trace = kernel.trace().unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].outcome, StepOutcome::Suspended);
        assert_eq!(trace[1].outcome, StepOutcome::Terminated);
        assert!(trace.iter().all(|e| e.process == pid));
        assert_eq!(trace[1].time, SimTime(1.0));
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod store {
    use agv_core::SimTime;

    use super::helpers::{labels, log};
    use crate::{Kernel, StopCondition};

    #[test]
    fn non_blocking_operations() {
        let kernel = Kernel::new();
        let store = kernel.handle().store::<u32>("s");
        store.put(1);
        store.put(2);
        store.put(3);
        store.put_front(0);
        assert_eq!(store.snapshot(), vec![0, 1, 2, 3]);
        assert_eq!(store.remove(|&x| x == 2), Some(2));
        assert_eq!(store.remove(|&x| x == 2), None);
        store.replace(|&x| x == 1, 10);
        assert_eq!(store.snapshot(), vec![0, 10, 3]);
        assert_eq!(store.remove_all(|&x| x != 10), vec![0, 3]);
        assert_eq!(store.snapshot(), vec![10]);
        assert!(store.contains(|&x| x == 10));
        assert_eq!(store.find(|&x| x > 5), Some(10));
    }

    #[test]
    fn get_takes_first_in_insertion_order() {
        let mut kernel = Kernel::new();
        let store = kernel.handle().store::<u32>("s");
        for x in [5, 8, 6, 9] {
            store.put(x);
        }
        let got = log();
        let (s, g) = (store.clone(), got.clone());
        let h = kernel.handle();
        kernel.spawn("reader", async move {
            let even = s.get_filtered(|x| x % 2 == 0).await;
            let any = s.get().await;
            g.borrow_mut().push((h.now(), if even == 8 && any == 5 { "ok" } else { "bad" }));
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&got), vec!["ok"]);
        assert_eq!(store.snapshot(), vec![6, 9]);
    }

    #[test]
    fn store_wakeup_does_not_advance_the_clock() {
        let mut kernel = Kernel::new();
        let store = kernel.handle().store::<&'static str>("inbox");
        let events = log();

        let (s, ev, h) = (store.clone(), events.clone(), kernel.handle());
        kernel.spawn("consumer", async move {
            let item = s.get().await;
            ev.borrow_mut().push((h.now(), item));
            Ok::<(), String>(())
        });
        let (s, h) = (store.clone(), kernel.handle());
        kernel.spawn("producer", async move {
            h.timeout(4.0).await;
            s.put("parcel");
            h.timeout(3.0).await;
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(*events.borrow(), vec![(SimTime(4.0), "parcel")]);
        assert!(store.is_empty());
    }

    #[test]
    fn one_put_wakes_at_most_one_waiter() {
        let mut kernel = Kernel::new();
        let store = kernel.handle().store::<u32>("s");
        let events = log();
        for label in ["first", "second"] {
            let (s, ev, h) = (store.clone(), events.clone(), kernel.handle());
            kernel.spawn(label, async move {
                s.get().await;
                ev.borrow_mut().push((h.now(), label));
                Ok::<(), String>(())
            });
        }
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(store.waiting(), 2);

        store.put(1);
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&events), vec!["first"]);
        assert_eq!(store.waiting(), 1);

        store.put(2);
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&events), vec!["first", "second"]);
        assert!(store.is_empty());
    }

    #[test]
    fn put_skips_waiters_whose_filter_rejects() {
        let mut kernel = Kernel::new();
        let store = kernel.handle().store::<u32>("s");
        let events = log();
        let (s, ev, h) = (store.clone(), events.clone(), kernel.handle());
        kernel.spawn("wants-7", async move {
            s.get_filtered(|&x| x == 7).await;
            ev.borrow_mut().push((h.now(), "7"));
            Ok::<(), String>(())
        });
        let (s, ev, h) = (store.clone(), events.clone(), kernel.handle());
        kernel.spawn("wants-any", async move {
            s.get().await;
            ev.borrow_mut().push((h.now(), "any"));
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();

        store.put(3);
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&events), vec!["any"]);

        store.put(3);
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(store.snapshot(), vec![3]);
        store.put(7);
        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(labels(&events), vec!["any", "7"]);
    }

    #[test]
    fn handed_item_is_in_transit_until_the_waiter_resumes() {
        let mut kernel = Kernel::new();
        let store = kernel.handle().store::<u32>("s");
        let s = store.clone();
        kernel.spawn("consumer", async move {
            s.get().await;
            Ok::<(), String>(())
        });
        kernel.run_until(StopCondition::Exhausted).unwrap();

        store.put(9);
        assert!(store.is_empty());
        assert_eq!(store.in_transit(), 1);
        assert_eq!(store.count(|&x| x == 9), 1);
        assert!(!store.is_settled());

        kernel.run_until(StopCondition::Exhausted).unwrap();
        assert_eq!(store.in_transit(), 0);
        assert!(store.is_settled());
    }

    #[test]
    fn dropped_get_returns_its_item() {
        let kernel = Kernel::new();
        let store = kernel.handle().store::<u32>("s");
        drop(store.get());
        store.put(4);
        assert_eq!(store.snapshot(), vec![4]);
        assert_eq!(store.waiting(), 0);
    }
}

// ── Store invariant (property) ────────────────────────────────────────────────

#[cfg(test)]
mod store_props {
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    use proptest::prelude::*;

    use crate::{Kernel, StopCondition};

    proptest! {
        /// Producers put unique items at random times, consumers get with
        /// random delays: every item is delivered at most once, and every
        /// delivered item was put before it was got.
        #[test]
        fn no_double_withdrawal(
            puts in proptest::collection::vec(0.0f64..20.0, 1..30),
            consumers in 1usize..5,
            gets_each in 1usize..10,
        ) {
            let mut kernel = Kernel::new();
            let store = kernel.handle().store::<(u32, f64)>("s");
            let delivered: Rc<RefCell<Vec<(u32, f64, f64)>>> = Rc::default();

            for (i, &at) in puts.iter().enumerate() {
                let (s, h) = (store.clone(), kernel.handle());
                kernel.spawn("producer", async move {
                    h.timeout(at).await;
                    s.put((i as u32, h.now().secs()));
                    Ok::<(), String>(())
                });
            }
            for c in 0..consumers {
                let (s, h, d) = (store.clone(), kernel.handle(), delivered.clone());
                kernel.spawn("consumer", async move {
                    for g in 0..gets_each {
                        h.timeout(((c + g) % 3) as f64).await;
                        let (id, put_at) = s.get().await;
                        d.borrow_mut().push((id, put_at, h.now().secs()));
                    }
                    Ok::<(), String>(())
                });
            }
            kernel.run_until(StopCondition::Exhausted).unwrap();

            let delivered = delivered.borrow();
            let unique: BTreeSet<u32> = delivered.iter().map(|d| d.0).collect();
            prop_assert_eq!(unique.len(), delivered.len());
            for &(id, put_at, got_at) in delivered.iter() {
                prop_assert!((id as usize) < puts.len());
                prop_assert!(got_at >= put_at);
            }
            prop_assert_eq!(delivered.len() + store.len(), puts.len());
        }
    }
}
