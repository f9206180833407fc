use crate::registry::JobRegistry;
use crate::runner::JobRunner;
use crate::timer::{JobTimer, Timer};
use parking_lot::{Condvar, Mutex, RwLock};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tempo_core::{Duration, Error, ErrorStateHandle, Lifecycle, Result, Timestamp};
use tempo_ports::{ClockType, EventSink, Logger, TimeSource};

/// Longest a timer thread sleeps before re-reading the time source
const MAX_WAIT: std::time::Duration = std::time::Duration::from_millis(10);

/// Point every timer is scheduled relative to; `epoch` counts resets
#[derive(Debug, Clone, Copy)]
struct Base {
    time: Timestamp,
    epoch: u64,
}

struct Schedule {
    next_due: Timestamp,
    epoch: u64,
}

struct TimerSlot {
    timer: Arc<dyn Timer>,
    cycle_time: Duration,
    delay: Duration,
    order: u64,
    schedule: Mutex<Schedule>,
}

impl TimerSlot {
    /// Re-base onto a reset this slot has not seen yet
    fn catch_up(&self, schedule: &mut Schedule, base: Base) {
        if schedule.epoch != base.epoch {
            schedule.next_due = base.time + self.delay;
            schedule.epoch = base.epoch;
        }
    }

    /// Latest nominal tick at or before `time`, if the timer is due
    fn due_tick(&self, schedule: &Schedule, time: Timestamp) -> Option<Timestamp> {
        if time < schedule.next_due {
            return None;
        }
        let cycle = self.cycle_time.as_nanos();
        let skipped = (time - schedule.next_due).as_nanos() / cycle;
        Some(schedule.next_due + Duration::from_nanos(skipped * cycle))
    }

    /// Fire at `tick` with the schedule lock held by the caller
    fn fire(&self, schedule: &mut Schedule, tick: Timestamp) -> Result<()> {
        schedule.next_due = tick + self.cycle_time;
        self.timer.wakeup(tick)
    }
}

struct Control {
    mode: Option<ClockType>,
    base: Base,
    /// Bumped on every start and stop; timer threads of an older run exit
    run: u64,
    workers_spawned: bool,
    workers: Vec<JoinHandle<()>>,
    next_order: u64,
}

struct SchedulerInner {
    time_source: Arc<dyn TimeSource>,
    lifecycle: Lifecycle,
    slots: RwLock<Vec<Arc<TimerSlot>>>,
    control: Mutex<Control>,
    changed: Condvar,
}

/// Fires registered timers at their nominal ticks
///
/// With a discrete time source the due timers fire synchronously inside
/// `time_updating`, ordered by nominal tick and then registration order. With
/// a continuous time source every timer gets its own thread, spawned on the
/// first reset after `start` and joined by `stop`. Either way a timer fires at
/// most once per call: missed ticks collapse into the latest one.
pub struct TimerScheduler {
    inner: Arc<SchedulerInner>,
}

impl TimerScheduler {
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                time_source,
                lifecycle: Lifecycle::new(),
                slots: RwLock::new(Vec::new()),
                control: Mutex::new(Control {
                    mode: None,
                    base: Base {
                        time: Timestamp::ZERO,
                        epoch: 0,
                    },
                    run: 0,
                    workers_spawned: false,
                    workers: Vec::new(),
                    next_order: 0,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Scheduler with one [`JobTimer`] per registered job
    pub fn from_jobs(
        time_source: Arc<dyn TimeSource>,
        registry: &JobRegistry,
        logger: Arc<dyn Logger>,
        error_state: ErrorStateHandle,
    ) -> Result<Self> {
        let scheduler = Self::new(time_source);
        scheduler.add_job_timers(registry, logger, error_state)?;
        Ok(scheduler)
    }

    /// Add one [`JobTimer`] per registry entry, in registration order
    pub fn add_job_timers(
        &self,
        registry: &JobRegistry,
        logger: Arc<dyn Logger>,
        error_state: ErrorStateHandle,
    ) -> Result<Vec<Arc<JobTimer>>> {
        let mut timers = Vec::new();
        for (name, entry) in registry.jobs() {
            let config = &entry.info.config;
            let runner = JobRunner::new(
                name,
                config.violation_strategy,
                config.max_runtime,
                logger.clone(),
                error_state.clone(),
            );
            let timer = Arc::new(JobTimer::new(entry.job.clone(), runner));
            self.add_timer(timer.clone(), config.cycle_time, config.start_delay)?;
            timers.push(timer);
        }
        Ok(timers)
    }

    pub fn add_timer(
        &self,
        timer: Arc<dyn Timer>,
        cycle_time: Duration,
        delay: Duration,
    ) -> Result<()> {
        self.inner.lifecycle.ensure_stopped("adding a timer")?;
        if !cycle_time.is_positive() {
            return Err(Error::InvalidArg(format!(
                "cycle time of timer '{}' must be positive, got {cycle_time}",
                timer.name()
            )));
        }
        if delay.is_negative() {
            return Err(Error::InvalidArg(format!(
                "delay of timer '{}' must not be negative, got {delay}",
                timer.name()
            )));
        }

        let (base, order) = {
            let mut control = self.inner.control.lock();
            control.next_order += 1;
            (control.base, control.next_order)
        };
        let mut slots = self.inner.slots.write();
        if slots.iter().any(|slot| same_timer(&slot.timer, &timer)) {
            return Err(Error::ResourceInUse(format!(
                "timer '{}' is already scheduled",
                timer.name()
            )));
        }
        log::debug!(
            "timer '{}' scheduled every {cycle_time} after {delay}",
            timer.name()
        );
        slots.push(Arc::new(TimerSlot {
            timer,
            cycle_time,
            delay,
            order,
            schedule: Mutex::new(Schedule {
                next_due: base.time + delay,
                epoch: base.epoch,
            }),
        }));
        Ok(())
    }

    pub fn remove_timer(&self, timer: &Arc<dyn Timer>) -> Result<()> {
        self.inner.lifecycle.ensure_stopped("removing a timer")?;
        let mut slots = self.inner.slots.write();
        let index = slots
            .iter()
            .position(|slot| same_timer(&slot.timer, timer))
            .ok_or_else(|| Error::NotFound(format!("timer '{}'", timer.name())))?;
        slots.remove(index);
        Ok(())
    }

    pub fn timer_count(&self) -> usize {
        self.inner.slots.read().len()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.is_running()
    }

    /// Run mode picked at `start` from the time source's clock type
    pub fn mode(&self) -> Option<ClockType> {
        self.inner.control.lock().mode
    }

    pub fn start(&self) -> Result<()> {
        self.inner.lifecycle.start("timer scheduler")?;
        let mode = self.inner.time_source.clock_type();
        let mut control = self.inner.control.lock();
        control.mode = Some(mode);
        control.run += 1;
        control.workers_spawned = false;
        log::info!(
            "timer scheduler started in {mode:?} mode with {} timer(s)",
            self.inner.slots.read().len()
        );
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.inner.lifecycle.stop("timer scheduler")?;
        let workers = self.inner.halt();
        for handle in workers {
            if handle.thread().id() == thread::current().id() {
                continue;
            }
            if handle.join().is_err() {
                log::error!("timer thread panicked");
            }
        }
        log::info!("timer scheduler stopped");
        Ok(())
    }

    /// Fire every timer due at `time`; returns how many fired
    pub fn execute(&self, time: Timestamp) -> usize {
        self.inner.execute(time)
    }
}

impl SchedulerInner {
    fn execute(&self, time: Timestamp) -> usize {
        let base = self.control.lock().base;
        let slots = self.slots.read().clone();

        let mut due = PriorityQueue::new();
        for (index, slot) in slots.iter().enumerate() {
            let mut schedule = slot.schedule.lock();
            slot.catch_up(&mut schedule, base);
            if let Some(tick) = slot.due_tick(&schedule, time) {
                due.push(index, Reverse((tick, slot.order)));
            }
        }

        let mut fired = 0;
        while let Some((index, Reverse((tick, _)))) = due.pop() {
            let slot = &slots[index];
            let mut schedule = slot.schedule.lock();
            // Fired by a timer thread or re-based in the meantime
            if schedule.epoch != base.epoch || schedule.next_due > tick {
                continue;
            }
            if let Err(e) = slot.fire(&mut schedule, tick) {
                log::debug!("timer '{}' at {tick}: {e}", slot.timer.name());
            }
            fired += 1;
        }
        fired
    }

    /// Signal every timer thread to exit and hand over their handles
    fn halt(&self) -> Vec<JoinHandle<()>> {
        let mut control = self.control.lock();
        control.mode = None;
        control.run += 1;
        self.changed.notify_all();
        mem::take(&mut control.workers)
    }

    fn spawn_workers(self: &Arc<Self>, control: &mut Control) {
        control.workers_spawned = true;
        for slot in self.slots.read().iter() {
            let inner = self.clone();
            let thread_slot = slot.clone();
            let run = control.run;
            let spawned = thread::Builder::new()
                .name(format!("timer-{}", slot.timer.name()))
                .spawn(move || inner.run_timer(thread_slot, run));
            match spawned {
                Ok(handle) => control.workers.push(handle),
                Err(e) => log::error!(
                    "failed to spawn thread for timer '{}': {e}",
                    slot.timer.name()
                ),
            }
        }
        log::debug!("spawned {} timer thread(s)", control.workers.len());
    }

    fn run_timer(&self, slot: Arc<TimerSlot>, run: u64) {
        loop {
            let base = {
                let control = self.control.lock();
                if control.run != run {
                    return;
                }
                control.base
            };

            let mut schedule = slot.schedule.lock();
            slot.catch_up(&mut schedule, base);
            let now = self.time_source.time();
            if let Some(tick) = slot.due_tick(&schedule, now) {
                match slot.fire(&mut schedule, tick) {
                    Err(Error::Cancelled(reason)) => {
                        log::info!("timer '{}' retired: {reason}", slot.timer.name());
                        return;
                    }
                    Err(e) => log::debug!("timer '{}' at {tick}: {e}", slot.timer.name()),
                    Ok(()) => {}
                }
                continue;
            }
            let wait = (schedule.next_due - now).to_std().min(MAX_WAIT);
            drop(schedule);

            let mut control = self.control.lock();
            if control.run != run || control.base.epoch != base.epoch {
                continue;
            }
            self.changed.wait_for(&mut control, wait);
        }
    }

    fn on_reset(self: &Arc<Self>, new_time: Timestamp) {
        let mut control = self.control.lock();
        control.base = Base {
            time: new_time,
            epoch: control.base.epoch + 1,
        };
        let continuous = control.mode == Some(ClockType::Continuous);
        if continuous && !control.workers_spawned {
            self.spawn_workers(&mut control);
        }
        self.changed.notify_all();
    }
}

impl EventSink for TimerScheduler {
    fn time_update_begin(&self, _old_time: Timestamp, _new_time: Timestamp) {}

    fn time_updating(&self, new_time: Timestamp) {
        if self.mode() == Some(ClockType::Discrete) {
            self.inner.execute(new_time);
        }
    }

    fn time_update_end(&self, _new_time: Timestamp) {}

    fn time_reset_begin(&self, _old_time: Timestamp, _new_time: Timestamp) {}

    fn time_reset_end(&self, new_time: Timestamp) {
        self.inner.on_reset(new_time);
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.inner.halt();
    }
}

fn same_timer(a: &Arc<dyn Timer>, b: &Arc<dyn Timer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
