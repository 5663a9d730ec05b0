//! Scheduler core: the priority queue, the tick loop, and the public task
//! operations.
//!
//! The durable store is the source of truth. The heap and the live-handle
//! table are derived state owned by the scheduler; every decision re-reads the
//! task and every state change is a compare-and-set through
//! [`TaskStore::transition`], so `cancel` and the tick loop may interleave
//! freely.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::SchedulerConfig;
use crate::core::admission::evaluate;
use crate::core::{
    preset, presets, EventKind, MetricsProvider, PolicyRecord, ProcessHandle, ProcessLauncher,
    QueueItem, Rules, ScheduleEvent, SchedulerError, Spawn, StateFilter, SystemSnapshot, Task,
    TaskQueue, TaskSpec, TaskState,
};
use crate::infra::queue::InMemoryQueue;
use crate::infra::store::TaskStore;
use crate::util::clock::{local_now, utc_now};
use crate::util::ids::task_id;

/// Result note for tasks found `running` with no live process at startup.
pub const ORPHAN_NOTE: &str = "process lost across scheduler restart";

/// Counts from one launch+reap cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Processes launched.
    pub started: usize,
    /// Tasks denied admission and re-queued.
    pub deferred: usize,
    /// Tasks reaped with exit code 0.
    pub finished: usize,
    /// Tasks reaped non-zero or failed to launch.
    pub failed: usize,
    /// Heap entries discarded because the task had left `queued`.
    pub dropped: usize,
}

/// Cumulative counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Completed ticks.
    pub ticks: u64,
    /// Ticks that returned an error or panicked.
    pub failed_ticks: u64,
    /// Processes launched.
    pub started: u64,
    /// Admission denials.
    pub deferred: u64,
    /// Successful exits.
    pub finished: u64,
    /// Non-zero exits and launch failures.
    pub failed: u64,
    /// Stale heap entries dropped.
    pub dropped: u64,
}

impl SchedulerStats {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.started += report.started as u64;
        self.deferred += report.deferred as u64;
        self.finished += report.finished as u64;
        self.failed += report.failed as u64;
        self.dropped += report.dropped as u64;
    }
}

/// Hypothetical overrides for [`Scheduler::simulate`]. Unset fields keep the
/// live reading, the active rules, or the current time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatIf {
    /// Total CPU utilization.
    pub cpu_total_pct: Option<f64>,
    /// Memory in use, in bytes.
    pub mem_used_bytes: Option<u64>,
    /// External power.
    pub plugged: Option<bool>,
    /// Battery charge.
    pub battery_pct: Option<f64>,
    /// GPU presence.
    pub gpu_available: Option<bool>,
    /// GPU utilization.
    pub gpu_util_pct: Option<f64>,
    /// Rule set to evaluate instead of the active policy.
    pub rules: Option<Rules>,
    /// Local time to evaluate quiet hours at.
    pub at: Option<DateTime<Local>>,
}

impl WhatIf {
    fn apply(&self, snapshot: &mut SystemSnapshot) {
        if let Some(cpu) = self.cpu_total_pct {
            snapshot.cpu_total_pct = cpu;
        }
        if let Some(used) = self.mem_used_bytes {
            snapshot.mem_used_bytes = used;
        }
        if let Some(plugged) = self.plugged {
            snapshot.power.plugged = plugged;
        }
        if let Some(battery) = self.battery_pct {
            snapshot.power.battery_pct = Some(battery);
        }
        if let Some(available) = self.gpu_available {
            snapshot.gpu.available = available;
        }
        if let Some(util) = self.gpu_util_pct {
            snapshot.gpu.util_pct = Some(util);
        }
    }
}

/// Per-task immediate-start recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Task id.
    pub task_id: String,
    /// Display name.
    pub name: String,
    /// Current priority number.
    pub priority: i64,
    /// Admission would pass.
    pub start_now: bool,
    /// Evaluation time when `start_now`.
    pub start_at: Option<DateTime<Utc>>,
    /// `"Ok to start now"` or the denial reasons.
    pub why: String,
}

/// Dry-run result of [`Scheduler::simulate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationPlan {
    /// When the plan was computed.
    pub generated_at: DateTime<Utc>,
    /// Policy the plan was evaluated under.
    pub policy: String,
    /// Queued tasks in dequeue order.
    pub entries: Vec<PlanEntry>,
}

/// Heap entry taken for one launch attempt. Dropping it without
/// [`Popped::settle`] puts it back on the heap, which covers early error
/// returns and unwinding alike.
struct Popped<'a> {
    queue: &'a Mutex<Box<dyn TaskQueue>>,
    item: QueueItem,
    settled: bool,
}

impl<'a> Popped<'a> {
    fn take(queue: &'a Mutex<Box<dyn TaskQueue>>) -> Option<Self> {
        let item = queue.lock().dequeue()?;
        Some(Self {
            queue,
            item,
            settled: false,
        })
    }

    fn task_id(&self) -> &str {
        &self.item.task_id
    }

    /// The attempt reached an outcome; keep the entry off the heap.
    fn settle(mut self) -> QueueItem {
        self.settled = true;
        self.item.clone()
    }
}

impl Drop for Popped<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.queue.lock().enqueue(self.item.clone());
        }
    }
}

enum LaunchOutcome {
    Started,
    Deferred,
    Failed,
    Dropped,
}

/// Admission-controlled local process scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn TaskStore>,
    metrics: Arc<dyn MetricsProvider>,
    launcher: Arc<dyn ProcessLauncher>,
    queue: Mutex<Box<dyn TaskQueue>>,
    handles: Mutex<HashMap<String, Box<dyn ProcessHandle>>>,
    tick_lock: Mutex<()>,
    seq: AtomicU64,
    active: AtomicBool,
    wake: Notify,
    stats: Mutex<SchedulerStats>,
}

impl Scheduler {
    /// Build a scheduler over `store`, failing orphaned `running` tasks and
    /// rebuilding the heap from every `queued` task.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn TaskStore>,
        metrics: Arc<dyn MetricsProvider>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::Config)?;
        let scheduler = Self {
            config,
            store,
            metrics,
            launcher,
            queue: Mutex::new(Box::new(InMemoryQueue::new())),
            handles: Mutex::new(HashMap::new()),
            tick_lock: Mutex::new(()),
            seq: AtomicU64::new(0),
            active: AtomicBool::new(false),
            wake: Notify::new(),
            stats: Mutex::new(SchedulerStats::default()),
        };
        scheduler.recover_orphans()?;
        scheduler.rebuild_queue()?;
        Ok(scheduler)
    }

    fn recover_orphans(&self) -> Result<(), SchedulerError> {
        for task in self.store.tasks(StateFilter::Only(TaskState::Running))? {
            let now = utc_now();
            let moved = self.transition(
                &task.id,
                &[TaskState::Running],
                &mut |t: &mut Task| {
                    t.state = TaskState::Failed;
                    t.result = Some(ORPHAN_NOTE.to_string());
                    t.ended_at = Some(now);
                },
                ScheduleEvent::at(now, EventKind::Failed, &task.id, ORPHAN_NOTE),
            )?;
            if moved.is_some() {
                tracing::warn!(task_id = %task.id, pid = ?task.pid, "recovered orphaned task");
            }
        }
        Ok(())
    }

    fn rebuild_queue(&self) -> Result<(), SchedulerError> {
        let queued = self.store.tasks(StateFilter::Only(TaskState::Queued))?;
        let mut queue = self.queue.lock();
        queue.clear();
        for task in &queued {
            queue.enqueue(self.queue_item(task));
        }
        tracing::info!(queued = queued.len(), "rebuilt task queue");
        Ok(())
    }

    fn queue_item(&self, task: &Task) -> QueueItem {
        QueueItem {
            priority: task.priority,
            enqueued_at: task.created_at,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            task_id: task.id.clone(),
        }
    }

    fn requeue(&self, item: QueueItem) {
        self.queue.lock().enqueue(item);
    }

    /// Store transition that mirrors the event to tracing once committed.
    fn transition(
        &self,
        id: &str,
        allowed_from: &[TaskState],
        apply: &mut dyn FnMut(&mut Task),
        event: ScheduleEvent,
    ) -> Result<Option<Task>, SchedulerError> {
        let mirror = event.clone();
        let moved = self.store.transition(id, allowed_from, apply, event)?;
        if moved.is_some() {
            mirror.trace();
        }
        Ok(moved)
    }

    /// Configuration in effect.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate and persist a new `queued` task, then push it onto the heap.
    pub fn enqueue(&self, spec: TaskSpec) -> Result<Task, SchedulerError> {
        spec.validate()?;
        let now = utc_now();
        let task = Task::from_spec(task_id(now), spec, now);
        let event = ScheduleEvent::at(now, EventKind::Enqueued, &task.id, task.name.as_str());
        self.store.insert_task(&task, event.clone())?;
        event.trace();
        self.queue.lock().enqueue(self.queue_item(&task));
        Ok(task)
    }

    /// Tasks matching `filter`, in creation order.
    pub fn list(&self, filter: StateFilter) -> Result<Vec<Task>, SchedulerError> {
        self.store.tasks(filter)
    }

    /// Load one task.
    pub fn task(&self, id: &str) -> Result<Option<Task>, SchedulerError> {
        self.store.task(id)
    }

    /// Audit events, optionally for one task.
    pub fn events(&self, task_id: Option<&str>) -> Result<Vec<ScheduleEvent>, SchedulerError> {
        self.store.events(task_id)
    }

    /// Cancel a task.
    ///
    /// A `queued` task is canceled and `true` returned. A `running` task gets a
    /// best-effort terminate request and is canceled regardless; the return
    /// value says whether the request was delivered. Unknown and terminal
    /// tasks return `false` untouched.
    pub fn cancel(&self, id: &str) -> Result<bool, SchedulerError> {
        loop {
            let Some(task) = self.store.task(id)? else {
                return Ok(false);
            };
            let now = utc_now();
            let mut mark = |t: &mut Task| {
                t.state = TaskState::Canceled;
                t.ended_at = Some(now);
            };
            match task.state {
                TaskState::Queued => {
                    let event =
                        ScheduleEvent::at(now, EventKind::Canceled, id, "Canceled while queued");
                    if self.transition(id, &[TaskState::Queued], &mut mark, event)?.is_some() {
                        return Ok(true);
                    }
                }
                TaskState::Running => {
                    let signaled = self
                        .handles
                        .lock()
                        .get_mut(id)
                        .is_some_and(|handle| handle.terminate());
                    let note = if signaled { "Terminated" } else { "Terminate not delivered" };
                    let event = ScheduleEvent::at(now, EventKind::Canceled, id, note);
                    if self.transition(id, &[TaskState::Running], &mut mark, event)?.is_some() {
                        return Ok(signaled);
                    }
                }
                TaskState::Done | TaskState::Failed | TaskState::Canceled => return Ok(false),
            }
            // Lost a race with the tick loop; the state only moves forward, so re-read.
        }
    }

    /// Deactivate every policy and make `name` active with `rules`.
    pub fn policy_set(&self, name: &str, rules: Rules) -> Result<String, SchedulerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchedulerError::Validation("policy name must not be empty".into()));
        }
        rules.validate()?;
        let record = self.store.activate_policy(name, &rules)?;
        tracing::info!(policy = %record.name, "activated policy");
        Ok(record.name)
    }

    /// Activate a built-in preset.
    pub fn apply_preset(&self, name: &str) -> Result<PolicyRecord, SchedulerError> {
        let rules = preset(name).ok_or_else(|| SchedulerError::UnknownPreset(name.to_string()))?;
        let record = self.store.activate_policy(name, &rules)?;
        tracing::info!(policy = %record.name, "activated preset");
        Ok(record)
    }

    /// Built-in presets.
    pub fn presets(&self) -> Vec<(&'static str, Rules)> {
        presets()
    }

    /// The active policy, if any has been set or seeded.
    pub fn active_policy(&self) -> Result<Option<PolicyRecord>, SchedulerError> {
        self.store.active_policy()
    }

    /// Every stored policy.
    pub fn policies(&self) -> Result<Vec<PolicyRecord>, SchedulerError> {
        self.store.policies()
    }

    /// Active policy, seeding the configured default preset when none is.
    fn active_rules(&self) -> Result<PolicyRecord, SchedulerError> {
        if let Some(record) = self.store.active_policy()? {
            return Ok(record);
        }
        let name = &self.config.default_policy;
        let rules = preset(name).ok_or_else(|| SchedulerError::UnknownPreset(name.clone()))?;
        let record = self.store.activate_policy(name, &rules)?;
        tracing::info!(policy = %name, "seeded default policy");
        Ok(record)
    }

    /// Entries currently in the heap, including stale ones not yet dropped.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Tracked processes that have not exited yet.
    pub fn running_count(&self) -> usize {
        self.handles
            .lock()
            .values_mut()
            .map(|handle| handle.poll())
            .filter(|polled| !matches!(polled, Ok(Some(_))))
            .count()
    }

    /// Cumulative counters.
    pub fn stats(&self) -> SchedulerStats {
        *self.stats.lock()
    }

    /// Evaluate every queued task against one fresh snapshot without changing
    /// any state. When no policy is active the configured default is used
    /// without being persisted.
    pub fn simulate(&self, what_if: &WhatIf) -> Result<SimulationPlan, SchedulerError> {
        let mut snapshot = self.metrics.snapshot()?;
        what_if.apply(&mut snapshot);

        let (policy, rules) = match &what_if.rules {
            Some(rules) => {
                rules.validate()?;
                ("what-if".to_string(), rules.clone())
            }
            None => match self.store.active_policy()? {
                Some(record) => (record.name, record.rules),
                None => {
                    let name = self.config.default_policy.clone();
                    let rules =
                        preset(&name).ok_or_else(|| SchedulerError::UnknownPreset(name.clone()))?;
                    (name, rules)
                }
            },
        };

        let at = what_if.at.unwrap_or_else(local_now);
        let start_at = at.with_timezone(&Utc);
        let mut queued = self.store.tasks(StateFilter::Only(TaskState::Queued))?;
        queued.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.created_at.cmp(&b.created_at)));

        let entries = queued
            .into_iter()
            .map(|task| {
                let decision = evaluate(&snapshot, &task.envelope(), &rules, at.time());
                PlanEntry {
                    start_now: decision.allowed,
                    start_at: decision.allowed.then_some(start_at),
                    why: if decision.allowed {
                        "Ok to start now".to_string()
                    } else {
                        decision.summary()
                    },
                    task_id: task.id,
                    name: task.name,
                    priority: task.priority,
                }
            })
            .collect();

        Ok(SimulationPlan {
            generated_at: utc_now(),
            policy,
            entries,
        })
    }

    /// Run one launch+reap cycle at the current local time.
    ///
    /// With [`LocalProcessRunner`](crate::runtime::LocalProcessRunner) as the
    /// launcher this must be called from within a tokio runtime.
    pub fn tick(&self) -> Result<TickReport, SchedulerError> {
        self.tick_at(local_now())
    }

    /// Run one launch+reap cycle, judging quiet hours and stamping
    /// transitions with `now`.
    ///
    /// Launches go in strict heap order; the first admission denial ends the
    /// launch phase for this cycle. Same runtime requirement as [`Self::tick`].
    pub fn tick_at(&self, now: DateTime<Local>) -> Result<TickReport, SchedulerError> {
        let _tick = self.tick_lock.lock();
        let mut report = TickReport::default();

        let mut running = self.running_count();
        while running < self.config.max_parallel {
            let Some(popped) = Popped::take(&self.queue) else {
                break;
            };
            match self.try_launch(popped, now, &mut report)? {
                LaunchOutcome::Started => running += 1,
                LaunchOutcome::Deferred => break,
                LaunchOutcome::Failed | LaunchOutcome::Dropped => {}
            }
        }

        self.reap(now, &mut report)?;
        self.stats.lock().record(&report);
        if report != TickReport::default() {
            tracing::debug!(?report, "tick complete");
        }
        Ok(report)
    }

    fn try_launch(
        &self,
        popped: Popped<'_>,
        now: DateTime<Local>,
        report: &mut TickReport,
    ) -> Result<LaunchOutcome, SchedulerError> {
        let id = popped.task_id().to_string();
        let task = match self.store.task(&id)? {
            Some(task) if task.state == TaskState::Queued => task,
            _ => {
                tracing::debug!(task_id = %id, "dropping stale queue entry");
                popped.settle();
                report.dropped += 1;
                return Ok(LaunchOutcome::Dropped);
            }
        };
        let snapshot = self.metrics.snapshot()?;
        let policy = self.active_rules()?;

        let stamp = now.with_timezone(&Utc);
        let decision = evaluate(&snapshot, &task.envelope(), &policy.rules, now.time());
        if !decision.allowed {
            let event = ScheduleEvent::at(stamp, EventKind::Deferred, &id, decision.summary());
            let mut nudge = |t: &mut Task| t.priority = t.priority.saturating_add(1);
            let deferred = self.transition(&id, &[TaskState::Queued], &mut nudge, event)?;
            let item = popped.settle();
            return Ok(match deferred {
                Some(task) => {
                    tracing::debug!(
                        task_id = %id,
                        policy = %policy.name,
                        reasons = ?decision.reasons,
                        "admission denied"
                    );
                    self.requeue(QueueItem {
                        priority: task.priority,
                        ..item
                    });
                    report.deferred += 1;
                    LaunchOutcome::Deferred
                }
                None => {
                    report.dropped += 1;
                    LaunchOutcome::Dropped
                }
            });
        }

        let handle = match self.launcher.start(&id, &task.command, &self.config.log_dir) {
            Ok(handle) => handle,
            Err(e) => {
                let message = e.to_string();
                let event = ScheduleEvent::at(stamp, EventKind::Failed, &id, message.as_str());
                let mut mark = |t: &mut Task| {
                    t.state = TaskState::Failed;
                    t.result = Some(message.clone());
                    t.ended_at = Some(stamp);
                };
                let moved = self.transition(&id, &[TaskState::Queued], &mut mark, event)?;
                popped.settle();
                return Ok(if moved.is_some() {
                    report.failed += 1;
                    LaunchOutcome::Failed
                } else {
                    report.dropped += 1;
                    LaunchOutcome::Dropped
                });
            }
        };

        let pid = handle.pid();
        let log_path = handle.log_path().display().to_string();
        self.handles.lock().insert(id.clone(), handle);

        let event = ScheduleEvent::at(stamp, EventKind::Started, &id, task.command.as_str());
        let mut mark = |t: &mut Task| {
            t.state = TaskState::Running;
            t.started_at = Some(stamp);
            t.pid = Some(pid);
            t.log_path = Some(log_path.clone());
        };
        let moved = match self.transition(&id, &[TaskState::Queued], &mut mark, event) {
            Ok(moved) => moved,
            Err(e) => {
                self.terminate_tracked(&id);
                return Err(e);
            }
        };
        popped.settle();
        match moved {
            Some(_) => {
                tracing::info!(task_id = %id, pid, log_path = %log_path, "task started");
                report.started += 1;
                Ok(LaunchOutcome::Started)
            }
            None => {
                // Canceled between admission and launch; the handle stays
                // tracked until the process is reaped.
                self.terminate_tracked(&id);
                tracing::info!(task_id = %id, pid, "terminated process of task canceled during launch");
                report.dropped += 1;
                Ok(LaunchOutcome::Dropped)
            }
        }
    }

    fn terminate_tracked(&self, id: &str) {
        if let Some(handle) = self.handles.lock().get_mut(id) {
            handle.terminate();
        }
    }

    fn reap(&self, now: DateTime<Local>, report: &mut TickReport) -> Result<(), SchedulerError> {
        let exited: Vec<(String, i32)> = self
            .handles
            .lock()
            .iter_mut()
            .filter_map(|(id, handle)| match handle.poll() {
                Ok(Some(code)) => Some((id.clone(), code)),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "failed to poll process");
                    None
                }
            })
            .collect();

        let stamp = now.with_timezone(&Utc);
        for (id, code) in exited {
            let (state, kind) = if code == 0 {
                (TaskState::Done, EventKind::Finished)
            } else {
                (TaskState::Failed, EventKind::Failed)
            };
            let event = ScheduleEvent::at(stamp, kind, &id, format!("rc={code}"));
            let mut mark = |t: &mut Task| {
                t.state = state;
                t.return_code = Some(code);
                t.ended_at = Some(stamp);
            };
            match self.transition(&id, &[TaskState::Running], &mut mark, event)? {
                Some(_) if code == 0 => report.finished += 1,
                Some(_) => report.failed += 1,
                None => tracing::debug!(task_id = %id, code, "process exited after task left running"),
            }
            self.handles.lock().remove(&id);
        }
        Ok(())
    }

    /// Spawn the tick loop. Returns `false` if it is already running.
    pub fn start<S: Spawn>(self: &Arc<Self>, spawner: &S) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }
        let this = Arc::clone(self);
        spawner.spawn(async move { this.run_loop().await });
        true
    }

    /// Ask the tick loop to exit after its current cycle.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.wake.notify_one();
            tracing::info!("scheduler loop stopping");
        }
    }

    /// Whether the tick loop is active.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn run_loop(self: Arc<Self>) {
        let interval = self.config.tick_interval();
        tracing::info!(
            interval_secs = interval.as_secs(),
            max_parallel = self.config.max_parallel,
            "scheduler loop started"
        );
        while self.is_running() {
            // Ticks block on store writes and process spawns.
            let this = Arc::clone(&self);
            let failed = match tokio::task::spawn_blocking(move || this.tick()).await {
                Ok(Ok(_)) => false,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "scheduler tick failed");
                    true
                }
                Err(join) if join.is_panic() => {
                    let panic = join.into_panic();
                    tracing::error!(panic = %panic_message(panic.as_ref()), "scheduler tick panicked");
                    true
                }
                Err(join) => {
                    tracing::error!(error = %join, "scheduler tick aborted");
                    true
                }
            };
            if failed {
                self.stats.lock().failed_ticks += 1;
                self.pause(interval).await;
            }
            if self.is_running() {
                self.pause(interval).await;
            }
        }
        tracing::info!("scheduler loop stopped");
    }

    async fn pause(&self, interval: Duration) {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = self.wake.notified() => {}
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
