//! Periodic scheduler
//!
//! Owns the real-time parameters and the release/wait/invoke cadence, and
//! brackets the real-time phase with explicit mode transitions:
//!
//! ```text
//! Unregistered ──submit──► Registered ──enter──► RealTime ──exit──► Background
//! ```
//!
//! `Background` is terminal for one run; re-entry requires a fresh
//! scheduler. Releases sit on the grid `epoch + n * period`; when a job
//! runs past one or more grid points the scheduler skips what it can no
//! longer honor and fires on the most recent missed point, so release
//! timestamps stay strictly monotonic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::job::{Job, JobOutcome};

use super::clock::{Clock, MonotonicClock};
use super::error::{ModeTransitionError, SchedulingError, TimingError};
use super::params::{BudgetPolicy, TaskParams};
use super::plugin::SchedulingPlugin;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Execution phase of the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskMode {
    /// Not deadline-constrained; setup and teardown happen here.
    #[default]
    Background,
    /// Deadline-constrained; only bounded job bodies run here.
    RealTime,
}

/// Opaque handle returned by a successful `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    id: u64,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Counters from one completed real-time phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    /// Jobs released (and invoked) by the loop.
    pub jobs_released: u64,
    /// Budget overruns observed, whether or not the policy enforced them.
    pub overruns: u64,
}

/// Internal registration state. `TaskMode` is the public projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unregistered,
    Registered,
    RealTime,
    Background,
}

/// Single-thread periodic scheduler.
pub struct PeriodicScheduler<C: Clock = MonotonicClock> {
    clock: C,
    plugin: Box<dyn SchedulingPlugin>,
    state: State,
    params: Option<TaskParams>,
    /// Next grid point; set when entering real-time mode.
    next_release: Option<Instant>,
    /// Timestamp of the most recent release.
    last_release: Option<Instant>,
    /// When the previous `wait_for_next_period` returned, for budget
    /// accounting of the job that ran since.
    job_started: Option<Instant>,
    released: u64,
    overruns: u64,
}

impl PeriodicScheduler<MonotonicClock> {
    /// Scheduler on the production clock with the given plugin.
    pub fn new(plugin: Box<dyn SchedulingPlugin>) -> Self {
        Self::with_clock(MonotonicClock, plugin)
    }
}

impl<C: Clock> PeriodicScheduler<C> {
    pub fn with_clock(clock: C, plugin: Box<dyn SchedulingPlugin>) -> Self {
        Self {
            clock,
            plugin,
            state: State::Unregistered,
            params: None,
            next_release: None,
            last_release: None,
            job_started: None,
            released: 0,
            overruns: 0,
        }
    }

    /// Register the calling thread's real-time parameters.
    ///
    /// Validates the parameter invariants and asks the scheduling plugin
    /// to admit the task. Parameters are immutable once submitted.
    pub fn submit(&mut self, params: TaskParams) -> Result<TaskHandle, SchedulingError> {
        if self.state != State::Unregistered {
            return Err(SchedulingError::AlreadyRegistered);
        }

        params.validate()?;
        self.plugin
            .admit(&params)
            .map_err(|reason| SchedulingError::PluginRejected {
                plugin: self.plugin.name().to_string(),
                reason,
            })?;

        let handle = TaskHandle {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
        };
        info!(
            task = handle.id,
            cost = ?params.exec_cost,
            period = ?params.period,
            deadline = ?params.relative_deadline,
            class = params.class.as_str(),
            "task registered"
        );

        self.params = Some(params);
        self.state = State::Registered;
        Ok(handle)
    }

    /// Transition `Background -> RealTime`. Exactly once, after a
    /// successful `submit`. The first release is due immediately; it
    /// defines the grid for all subsequent releases.
    pub fn enter_real_time(&mut self) -> Result<(), ModeTransitionError> {
        match self.state {
            State::Unregistered => Err(ModeTransitionError::NotSubmitted),
            State::RealTime => Err(ModeTransitionError::AlreadyRealTime),
            State::Background => Err(ModeTransitionError::TransitionRejected(
                "real-time phase already completed; re-entry requires a fresh submit".to_string(),
            )),
            State::Registered => {
                // params is always Some once Registered
                let params = self.params.ok_or(ModeTransitionError::NotSubmitted)?;
                self.plugin
                    .enter(&params)
                    .map_err(ModeTransitionError::TransitionRejected)?;

                let epoch = self.clock.now();
                self.next_release = Some(epoch);
                self.job_started = None;
                self.state = State::RealTime;
                info!("entered real-time mode");
                Ok(())
            }
        }
    }

    /// Suspend until the next periodic release.
    ///
    /// Reports `Overrun` when the job that ran since the previous release
    /// exceeded its budget under `BudgetPolicy::Enforce`; the release grid
    /// still advances, so the caller may tolerate the report and keep
    /// looping.
    pub fn wait_for_next_period(&mut self) -> Result<(), TimingError> {
        if self.state != State::RealTime {
            return Err(TimingError::NotRealTime);
        }
        let params = match self.params {
            Some(p) => p,
            None => return Err(TimingError::NotRealTime),
        };

        let now = self.clock.now();

        let mut overrun = None;
        if let Some(started) = self.job_started {
            let observed = now.saturating_duration_since(started);
            if observed > params.exec_cost {
                self.overruns += 1;
                if params.budget_policy == BudgetPolicy::Enforce {
                    overrun = Some(TimingError::Overrun {
                        budget: params.exec_cost,
                        observed,
                    });
                }
            }
        }

        let mut release = self.next_release.unwrap_or(now);
        if release > now {
            self.clock.sleep_until(release);
        } else {
            // Running behind: skip the grid points that can no longer be
            // honored and fire on the most recent missed one.
            let behind = now.duration_since(release).as_nanos();
            let missed = (behind / params.period.as_nanos()).min(u32::MAX as u128) as u32;
            if missed > 0 {
                release += params.period.saturating_mul(missed);
            }
        }

        self.next_release = Some(release + params.period);
        self.last_release = Some(release);
        self.released += 1;
        self.job_started = Some(self.clock.now());

        match overrun {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Transition back to `Background`. A no-op returning success when the
    /// thread is not in real-time mode, so cleanup paths stay uniform.
    pub fn exit_real_time(&mut self) -> Result<(), ModeTransitionError> {
        if self.state != State::RealTime {
            return Ok(());
        }
        if let Some(params) = self.params {
            self.plugin.exit(&params);
        }
        self.job_started = None;
        self.state = State::Background;
        info!(released = self.released, overruns = self.overruns, "left real-time mode");
        Ok(())
    }

    /// Drive the release/wait/invoke loop until the job signals `Stop`.
    ///
    /// Enters real-time mode, tolerates (logs and counts) overrun reports,
    /// and always transitions back to background before returning.
    pub fn run<J: Job>(&mut self, job: &mut J) -> Result<RunReport, ModeTransitionError> {
        self.enter_real_time()?;
        let report = self.drive(job);
        self.exit_real_time()?;
        Ok(report)
    }

    fn drive<J: Job>(&mut self, job: &mut J) -> RunReport {
        let mut jobs = 0u64;
        loop {
            match self.wait_for_next_period() {
                Ok(()) => {}
                Err(TimingError::Overrun { budget, observed }) => {
                    warn!(?budget, ?observed, "budget overrun");
                }
                Err(TimingError::NotRealTime) => break,
            }
            jobs += 1;
            match job.run() {
                JobOutcome::Continue => {}
                JobOutcome::Stop => break,
            }
        }
        RunReport {
            jobs_released: jobs,
            overruns: self.overruns,
        }
    }

    /// Current execution phase of the thread.
    pub fn mode(&self) -> TaskMode {
        match self.state {
            State::RealTime => TaskMode::RealTime,
            _ => TaskMode::Background,
        }
    }

    /// Timestamp of the most recent release, if any.
    pub fn last_release(&self) -> Option<Instant> {
        self.last_release
    }

    /// Total releases so far.
    pub fn released_jobs(&self) -> u64 {
        self.released
    }

    /// Budget overruns observed so far.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::clock::test_clock::TestClock;
    use crate::rt::params::{Priority, TaskClass};
    use crate::rt::plugin::NativePlugin;
    use std::time::Duration;

    /// Plugin that refuses every task at admission.
    struct RejectingPlugin;

    impl SchedulingPlugin for RejectingPlugin {
        fn name(&self) -> &'static str {
            "rejecting"
        }
        fn admit(&mut self, _params: &TaskParams) -> Result<(), String> {
            Err("capacity exceeded".to_string())
        }
        fn enter(&mut self, _params: &TaskParams) -> Result<(), String> {
            Ok(())
        }
        fn exit(&mut self, _params: &TaskParams) {}
    }

    /// Plugin that counts enter/exit pairs.
    #[derive(Default)]
    struct CountingPlugin {
        enters: std::rc::Rc<std::cell::Cell<u32>>,
        exits: std::rc::Rc<std::cell::Cell<u32>>,
    }

    impl SchedulingPlugin for CountingPlugin {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn admit(&mut self, _params: &TaskParams) -> Result<(), String> {
            Ok(())
        }
        fn enter(&mut self, _params: &TaskParams) -> Result<(), String> {
            self.enters.set(self.enters.get() + 1);
            Ok(())
        }
        fn exit(&mut self, _params: &TaskParams) {
            self.exits.set(self.exits.get() + 1);
        }
    }

    /// Job that runs a fixed number of times, then stops.
    struct FiniteJob {
        remaining: u32,
    }

    impl Job for FiniteJob {
        fn run(&mut self) -> JobOutcome {
            if self.remaining == 0 {
                return JobOutcome::Stop;
            }
            self.remaining -= 1;
            JobOutcome::Continue
        }
    }

    fn params_ms(cost: u64, period: u64, deadline: u64) -> TaskParams {
        TaskParams::new(
            Duration::from_millis(cost),
            Duration::from_millis(period),
            Duration::from_millis(deadline),
        )
    }

    fn scheduler(clock: TestClock) -> PeriodicScheduler<TestClock> {
        PeriodicScheduler::with_clock(clock, Box::new(NativePlugin::new()))
    }

    #[test]
    fn submit_rejects_invalid_parameters() {
        let mut sched = scheduler(TestClock::new());
        let err = sched.submit(params_ms(10, 0, 100)).unwrap_err();
        assert!(matches!(err, SchedulingError::InvalidParameters(_)));
    }

    #[test]
    fn submit_twice_is_rejected() {
        let mut sched = scheduler(TestClock::new());
        sched.submit(params_ms(10, 10, 100)).unwrap();
        assert_eq!(
            sched.submit(params_ms(10, 10, 100)),
            Err(SchedulingError::AlreadyRegistered)
        );
    }

    #[test]
    fn plugin_rejection_surfaces_as_plugin_rejected() {
        let mut sched =
            PeriodicScheduler::with_clock(TestClock::new(), Box::new(RejectingPlugin));
        let err = sched.submit(params_ms(10, 10, 100)).unwrap_err();
        assert!(matches!(err, SchedulingError::PluginRejected { .. }));
    }

    #[test]
    fn enter_without_submit_fails() {
        let mut sched = scheduler(TestClock::new());
        assert_eq!(
            sched.enter_real_time(),
            Err(ModeTransitionError::NotSubmitted)
        );
    }

    #[test]
    fn enter_twice_fails() {
        let mut sched = scheduler(TestClock::new());
        sched.submit(params_ms(10, 10, 100)).unwrap();
        sched.enter_real_time().unwrap();
        assert_eq!(
            sched.enter_real_time(),
            Err(ModeTransitionError::AlreadyRealTime)
        );
    }

    #[test]
    fn exit_is_idempotent() {
        let mut sched = scheduler(TestClock::new());
        // already-clean path: nothing submitted yet
        assert!(sched.exit_real_time().is_ok());

        sched.submit(params_ms(10, 10, 100)).unwrap();
        sched.enter_real_time().unwrap();
        assert!(sched.exit_real_time().is_ok());
        assert_eq!(sched.mode(), TaskMode::Background);
        // and again, once already in background
        assert!(sched.exit_real_time().is_ok());
    }

    #[test]
    fn background_is_terminal_for_the_run() {
        let mut sched = scheduler(TestClock::new());
        sched.submit(params_ms(10, 10, 100)).unwrap();
        sched.enter_real_time().unwrap();
        sched.exit_real_time().unwrap();
        assert!(matches!(
            sched.enter_real_time(),
            Err(ModeTransitionError::TransitionRejected(_))
        ));
    }

    #[test]
    fn wait_outside_real_time_fails() {
        let mut sched = scheduler(TestClock::new());
        assert_eq!(sched.wait_for_next_period(), Err(TimingError::NotRealTime));
    }

    #[test]
    fn releases_are_strictly_monotonic_on_the_period_grid() {
        let clock = TestClock::new();
        let mut sched = scheduler(clock.clone());
        sched.submit(params_ms(5, 10, 100)).unwrap();
        sched.enter_real_time().unwrap();

        let mut releases = Vec::new();
        for _ in 0..5 {
            sched.wait_for_next_period().unwrap();
            releases.push(sched.last_release().unwrap());
            clock.advance(Duration::from_millis(3)); // job within budget
        }

        let epoch = releases[0];
        for (n, pair) in releases.windows(2).enumerate() {
            assert!(pair[1] > pair[0], "release {} not after release {}", n + 1, n);
        }
        for (n, release) in releases.iter().enumerate() {
            assert_eq!(
                *release,
                epoch + Duration::from_millis(10) * n as u32,
                "release {} off the grid",
                n
            );
        }
    }

    #[test]
    fn skew_correction_skips_missed_grid_points() {
        let clock = TestClock::new();
        let mut sched = scheduler(clock.clone());
        sched.submit(params_ms(5, 10, 100)).unwrap();
        sched.enter_real_time().unwrap();

        sched.wait_for_next_period().unwrap();
        let first = sched.last_release().unwrap();

        // Job blows through two full periods
        clock.advance(Duration::from_millis(25));
        sched.wait_for_next_period().unwrap();
        let second = sched.last_release().unwrap();

        assert!(second > first);
        // fired on the most recent missed grid point: epoch + 20ms
        assert_eq!(second, first + Duration::from_millis(20));

        // and the grid continues from there
        clock.advance(Duration::from_millis(3));
        sched.wait_for_next_period().unwrap();
        assert_eq!(sched.last_release().unwrap(), first + Duration::from_millis(30));
    }

    #[test]
    fn enforced_budget_reports_overrun() {
        // Scenario: cost 10ms, period 10ms, job synthetically takes 15ms
        let clock = TestClock::new();
        let mut sched = scheduler(clock.clone());
        let mut params = params_ms(10, 10, 100);
        params.budget_policy = BudgetPolicy::Enforce;
        sched.submit(params).unwrap();
        sched.enter_real_time().unwrap();

        sched.wait_for_next_period().unwrap();
        clock.advance(Duration::from_millis(15));

        let err = sched.wait_for_next_period().unwrap_err();
        match err {
            TimingError::Overrun { budget, observed } => {
                assert_eq!(budget, Duration::from_millis(10));
                assert_eq!(observed, Duration::from_millis(15));
            }
            other => panic!("expected overrun, got {:?}", other),
        }

        // the report is a signal, not a wedge: the grid advanced and the
        // loop may keep going
        clock.advance(Duration::from_millis(2));
        assert!(sched.wait_for_next_period().is_ok());
    }

    #[test]
    fn unenforced_budget_counts_but_does_not_report() {
        let clock = TestClock::new();
        let mut sched = scheduler(clock.clone());
        sched.submit(params_ms(10, 10, 100)).unwrap();
        sched.enter_real_time().unwrap();

        sched.wait_for_next_period().unwrap();
        clock.advance(Duration::from_millis(15));
        assert!(sched.wait_for_next_period().is_ok());
        assert_eq!(sched.overruns(), 1);
    }

    #[test]
    fn run_drives_until_stop_and_leaves_real_time_mode() {
        let clock = TestClock::new();
        let enters = std::rc::Rc::new(std::cell::Cell::new(0));
        let exits = std::rc::Rc::new(std::cell::Cell::new(0));
        let plugin = CountingPlugin {
            enters: enters.clone(),
            exits: exits.clone(),
        };
        let mut sched = PeriodicScheduler::with_clock(clock, Box::new(plugin));
        sched.submit(params_ms(5, 10, 100)).unwrap();

        let mut job = FiniteJob { remaining: 4 };
        let report = sched.run(&mut job).unwrap();

        // 4 Continue invocations plus the final Stop invocation
        assert_eq!(report.jobs_released, 5);
        assert_eq!(sched.mode(), TaskMode::Background);
        assert_eq!(enters.get(), 1);
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn hard_class_params_round_trip_through_submit() {
        let mut sched = scheduler(TestClock::new());
        let mut params = params_ms(5, 10, 100);
        params.class = TaskClass::Hard;
        params.priority = Priority::Fixed(42);
        // admission does not depend on class or priority
        assert!(sched.submit(params).is_ok());
    }
}
