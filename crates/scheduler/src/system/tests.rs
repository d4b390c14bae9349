#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::{FaultPolicy, SchedulerConfig};
    use crate::error::JobSystemError;
    use crate::job::{CompletionPolicy, Job, JobContext};
    use crate::system::JobSystem;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Poll until `cond` holds; metrics are recorded just after `execute` returns.
    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = std::time::Instant::now() + TIMEOUT;
        while std::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn single_worker() -> SchedulerConfig {
        SchedulerConfig {
            worker_threads: 1,
            ..Default::default()
        }
    }

    /// Occupies a worker until released.
    struct Gate {
        started: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl Job for Gate {
        fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
            let _ = self.started.send(());
            let _ = self.release.recv_timeout(TIMEOUT);
            CompletionPolicy::Complete
        }
    }

    /// Submit a gate and wait until the (single) worker is inside it.
    fn hold_worker(system: &JobSystem) -> mpsc::Sender<()> {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        system.submit(
            Gate {
                started: started_tx,
                release: release_rx,
            },
            0,
        );
        started_rx.recv_timeout(TIMEOUT).expect("gate never started");
        release_tx
    }

    /// Counts executions and drops.
    struct Counted {
        executed: Arc<AtomicUsize>,
        dropped: Arc<AtomicUsize>,
    }

    impl Job for Counted {
        fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
            self.executed.fetch_add(1, Ordering::SeqCst);
            CompletionPolicy::Complete
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Reports the tier of every execution; reschedules `remaining` times.
    struct Repeat {
        remaining: u32,
        policy: CompletionPolicy,
        tiers: mpsc::Sender<usize>,
    }

    impl Job for Repeat {
        fn execute(&mut self, ctx: &JobContext<'_>) -> CompletionPolicy {
            let _ = self.tiers.send(ctx.tier());
            if self.remaining == 0 {
                return CompletionPolicy::Complete;
            }
            self.remaining -= 1;
            self.policy
        }
    }

    #[test]
    fn starts_configured_workers() {
        let config = SchedulerConfig {
            worker_threads: 3,
            priority_levels: 5,
            ..Default::default()
        };
        let system = JobSystem::new(config).unwrap();
        assert_eq!(system.worker_count(), 3);
        assert_eq!(system.priority_levels(), 5);
        assert_eq!(system.pending(), vec![0; 5]);
        system.shutdown().unwrap();
    }

    #[test]
    fn auto_worker_count_is_at_least_one() {
        let system = JobSystem::with_defaults().unwrap();
        assert!(system.worker_count() >= 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SchedulerConfig {
            priority_levels: 0,
            ..single_worker()
        };
        let err = JobSystem::new(config).unwrap_err();
        assert!(matches!(err, JobSystemError::Config(_)), "got: {err}");
    }

    #[test]
    fn submit_fn_runs_once() {
        let system = JobSystem::new(single_worker()).unwrap();
        let (tx, rx) = mpsc::channel();
        system.submit_fn(move || tx.send("preloaded").unwrap(), 2);

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "preloaded");
    }

    #[test]
    fn out_of_range_priority_is_clamped() {
        let system = JobSystem::new(single_worker()).unwrap();
        let release = hold_worker(&system);

        system.submit_fn(|| {}, 99);
        assert_eq!(system.pending(), vec![0, 0, 0, 1]);

        release.send(()).unwrap();
    }

    #[test]
    fn reschedule_returns_to_tier_zero() {
        let system = JobSystem::new(single_worker()).unwrap();
        let (tx, rx) = mpsc::channel();
        system.submit(
            Repeat {
                remaining: 2,
                policy: CompletionPolicy::Reschedule,
                tiers: tx,
            },
            2,
        );

        let tiers: Vec<usize> = (0..3).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
        assert_eq!(tiers, vec![2, 0, 0]);
        // the job completed and was dropped, so the channel closes
        assert!(rx.recv_timeout(TIMEOUT).is_err());

        let snapshot = system.metrics();
        assert_eq!(snapshot.metrics.rescheduled, 2);
        assert_eq!(snapshot.metrics.completed, 1);
        assert_eq!(snapshot.metrics.tiers[0].executed, 2);
        assert_eq!(snapshot.metrics.tiers[2].executed, 1);
    }

    #[test]
    fn job_can_submit_follow_up_work() {
        struct Spawner {
            done: mpsc::Sender<usize>,
        }

        impl Job for Spawner {
            fn execute(&mut self, ctx: &JobContext<'_>) -> CompletionPolicy {
                let done = self.done.clone();
                ctx.submitter().submit_fn(move || done.send(42).unwrap(), 3);
                CompletionPolicy::Complete
            }
        }

        let system = JobSystem::new(SchedulerConfig {
            worker_threads: 2,
            ..Default::default()
        })
        .unwrap();
        let (tx, rx) = mpsc::channel();
        system.submit(Spawner { done: tx }, 0);

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 42);
    }

    #[test]
    fn parked_job_runs_once_ready() {
        struct Latched {
            open: Arc<AtomicBool>,
            ran_at: mpsc::Sender<usize>,
        }

        impl Job for Latched {
            fn ready_for_execution(&self) -> bool {
                self.open.load(Ordering::SeqCst)
            }

            fn execute(&mut self, ctx: &JobContext<'_>) -> CompletionPolicy {
                let _ = self.ran_at.send(ctx.tier());
                CompletionPolicy::Complete
            }
        }

        let system = JobSystem::new(SchedulerConfig {
            worker_threads: 1,
            priority_levels: 2,
            parked_backoff_us: 200,
            ..Default::default()
        })
        .unwrap();
        let open = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        system.submit(
            Latched {
                open: Arc::clone(&open),
                ran_at: tx,
            },
            0,
        );

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        open.store(true, Ordering::SeqCst);

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 1);
        assert!(system.metrics().metrics.tiers[1].demoted >= 1);
    }

    #[test]
    fn finish_remaining_drops_queued_jobs_unexecuted() {
        let system = JobSystem::new(single_worker()).unwrap();
        let release = hold_worker(&system);

        let executed = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        for tier in 0..10 {
            system.submit(
                Counted {
                    executed: Arc::clone(&executed),
                    dropped: Arc::clone(&dropped),
                },
                tier % 4,
            );
        }

        system.finish_remaining();
        assert!(!system.submitter().is_running());
        release.send(()).unwrap();
        system.shutdown().unwrap();

        assert_eq!(executed.load(Ordering::SeqCst), 0);
        assert_eq!(dropped.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn admission_after_shutdown_is_dropped() {
        let system = JobSystem::new(single_worker()).unwrap();
        system.finish_remaining();

        let executed = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        system.submit(
            Counted {
                executed: Arc::clone(&executed),
                dropped: Arc::clone(&dropped),
            },
            0,
        );

        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert_eq!(executed.load(Ordering::SeqCst), 0);
        assert_eq!(system.metrics().metrics.rejected, 1);
        assert_eq!(system.pending(), vec![0; 4]);
    }

    #[test]
    fn submitter_outliving_the_system_drops_jobs() {
        let system = JobSystem::new(single_worker()).unwrap();
        let submitter = system.submitter();
        drop(system);

        let executed = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        submitter.submit(
            Counted {
                executed: Arc::clone(&executed),
                dropped: Arc::clone(&dropped),
            },
            1,
        );
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn isolated_panic_keeps_worker_alive() {
        struct Boom;

        impl Job for Boom {
            fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
                panic!("boom");
            }
        }

        let system = JobSystem::new(SchedulerConfig {
            worker_threads: 1,
            fault_policy: FaultPolicy::Isolate,
            ..Default::default()
        })
        .unwrap();
        system.submit(Boom, 0);
        let (tx, rx) = mpsc::channel();
        system.submit_fn(move || tx.send(()).unwrap(), 0);

        rx.recv_timeout(TIMEOUT).expect("worker died with the panicking job");
        assert!(wait_until(|| system.metrics().metrics.completed == 1));
        assert_eq!(system.metrics().metrics.faulted, 1);
        system.shutdown().unwrap();
    }

    #[test]
    fn isolated_panic_in_readiness_check_keeps_worker_alive() {
        struct BadReadiness;

        impl Job for BadReadiness {
            fn ready_for_execution(&self) -> bool {
                panic!("readiness check blew up");
            }

            fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
                unreachable!("never ready");
            }
        }

        let system = JobSystem::new(SchedulerConfig {
            worker_threads: 1,
            fault_policy: FaultPolicy::Isolate,
            ..Default::default()
        })
        .unwrap();
        system.submit(BadReadiness, 0);
        let (tx, rx) = mpsc::channel();
        system.submit_fn(move || tx.send(()).unwrap(), 0);

        rx.recv_timeout(TIMEOUT).expect("worker died in the readiness check");
        assert!(wait_until(|| system.metrics().metrics.completed == 1));
        let snapshot = system.metrics();
        assert_eq!(snapshot.metrics.faulted, 1);
        assert_eq!(snapshot.metrics.demoted(), 0);
        assert_eq!(snapshot.pending, vec![0; 4]);
        system.shutdown().unwrap();
    }

    #[test]
    fn demotion_rejected_at_shutdown_is_not_counted() {
        /// Blocks inside its readiness check until released, then reports not ready.
        struct SlowReadiness {
            checking: mpsc::Sender<()>,
            release: std::sync::Mutex<mpsc::Receiver<()>>,
        }

        impl Job for SlowReadiness {
            fn ready_for_execution(&self) -> bool {
                let _ = self.checking.send(());
                let _ = self.release.lock().unwrap().recv_timeout(TIMEOUT);
                false
            }

            fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
                CompletionPolicy::Complete
            }
        }

        let system = JobSystem::new(single_worker()).unwrap();
        let (checking_tx, checking_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        system.submit(
            SlowReadiness {
                checking: checking_tx,
                release: std::sync::Mutex::new(release_rx),
            },
            0,
        );

        checking_rx.recv_timeout(TIMEOUT).expect("readiness check never ran");
        system.finish_remaining();
        release_tx.send(()).unwrap();

        assert!(wait_until(|| system.metrics().metrics.rejected == 1));
        assert_eq!(system.metrics().metrics.demoted(), 0);
        system.shutdown().unwrap();
    }

    #[test]
    fn snapshots_never_show_more_executed_than_admitted() {
        let system = JobSystem::new(SchedulerConfig {
            worker_threads: 4,
            ..Default::default()
        })
        .unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..2_000 {
            let done = Arc::clone(&done);
            system.submit_fn(
                move || {
                    done.fetch_add(1, Ordering::SeqCst);
                },
                i % 4,
            );
        }

        let deadline = std::time::Instant::now() + TIMEOUT;
        while done.load(Ordering::SeqCst) < 2_000 {
            assert!(std::time::Instant::now() < deadline, "workload never drained");
            let snapshot = system.metrics();
            for (tier, t) in snapshot.metrics.tiers.iter().enumerate() {
                assert!(
                    t.admitted >= t.executed,
                    "tier {tier}: admitted {} < executed {}",
                    t.admitted,
                    t.executed
                );
            }
        }
        system.shutdown().unwrap();
    }
}
