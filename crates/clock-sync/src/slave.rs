use crate::connection::MasterConnection;
use crate::interpolation::InterpolationTime;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tempo_clock::{ContinuousClock, ContinuousTimeSource, DiscreteClock, StopSignal};
use tempo_core::{Duration, Error, Result, Timestamp};
use tempo_ports::{Clock, ClockEventId, ClockEventMask, ClockType, EventSink};

/// Name of the interpolating continuous slave clock
pub const SLAVE_MASTER_ON_DEMAND: &str = "slave_master_on_demand";

/// Name of the stepped discrete slave clock
pub const SLAVE_MASTER_ON_DEMAND_DISCRETE: &str = "slave_master_on_demand_discrete";

/// Receiver of the events a timing master relays
pub trait SyncEventTarget: Send + Sync {
    /// Apply one relayed event; returns the slave's time afterwards
    fn on_sync_event(
        &self,
        event: ClockEventId,
        old_time: Timestamp,
        new_time: Timestamp,
    ) -> Result<Timestamp>;
}

/// Discrete clock following the master's steps one by one
pub struct DiscreteSlaveClock {
    clock: DiscreteClock,
    connection: MasterConnection,
}

impl DiscreteSlaveClock {
    pub const EVENT_MASK: ClockEventMask =
        ClockEventMask::UPDATING.union(ClockEventMask::RESET_BEGIN);

    pub fn new(connection: MasterConnection) -> Self {
        Self {
            clock: DiscreteClock::new(SLAVE_MASTER_ON_DEMAND_DISCRETE),
            connection,
        }
    }
}

impl Clock for DiscreteSlaveClock {
    fn name(&self) -> &str {
        self.clock.name()
    }

    fn clock_type(&self) -> ClockType {
        ClockType::Discrete
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn reset(&self) {
        self.clock.reset();
    }

    fn start(&self, sink: Weak<dyn EventSink>) -> Result<()> {
        self.clock.start(sink)?;
        if let Err(e) = self.connection.register(Self::EVENT_MASK) {
            self.clock.stop()?;
            return Err(e);
        }
        if announce(&self.connection) == Some(ClockType::Continuous) {
            log::warn!(
                "timing master '{}' samples its time; {SLAVE_MASTER_ON_DEMAND_DISCRETE} only follows its resets",
                self.connection.master_name()
            );
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Err(e) = self.connection.unregister() {
            log::warn!(
                "'{}' failed to unregister from '{}': {e}",
                self.connection.participant_name(),
                self.connection.master_name()
            );
        }
        self.clock.stop()
    }
}

impl SyncEventTarget for DiscreteSlaveClock {
    fn on_sync_event(
        &self,
        event: ClockEventId,
        _old_time: Timestamp,
        new_time: Timestamp,
    ) -> Result<Timestamp> {
        if !self.clock.is_started() {
            return Err(Error::InvalidState(format!(
                "{SLAVE_MASTER_ON_DEMAND_DISCRETE} is not started"
            )));
        }
        match event {
            ClockEventId::Updating => self.clock.set_new_time(new_time, true),
            ClockEventId::ResetBegin => self.clock.set_reset_time(new_time),
            ClockEventId::UpdateBegin | ClockEventId::UpdateEnd | ClockEventId::ResetEnd => {}
        }
        Ok(self.clock.now())
    }
}

/// Log the master being followed and return its clock type, if it answers
fn announce(connection: &MasterConnection) -> Option<ClockType> {
    match connection.master_type() {
        Ok(clock_type) => {
            log::info!(
                "'{}' following timing master '{}' ({clock_type:?} clock)",
                connection.participant_name(),
                connection.master_name()
            );
            Some(clock_type)
        }
        Err(e) => {
            log::warn!(
                "'{}' could not query the clock type of '{}': {e}",
                connection.participant_name(),
                connection.master_name()
            );
            None
        }
    }
}

/// Time source reading the interpolated master time
struct InterpolatedSource {
    interpolation: Arc<InterpolationTime>,
}

impl ContinuousTimeSource for InterpolatedSource {
    fn new_time(&self) -> Timestamp {
        self.interpolation.time()
    }

    fn reset_time(&self) -> Timestamp {
        self.interpolation.time()
    }
}

struct Poller {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

/// Continuous clock tracking the master by periodic polling
///
/// A polling thread samples `getMasterTime` every sync cycle and feeds the
/// round-trip corrected value into the interpolation; between polls the clock
/// advances with the local monotonic clock. Master resets are applied
/// immediately.
pub struct ContinuousSlaveClock {
    clock: ContinuousClock<InterpolatedSource>,
    interpolation: Arc<InterpolationTime>,
    connection: Arc<MasterConnection>,
    sync_cycle: Duration,
    poller: Mutex<Option<Poller>>,
}

impl ContinuousSlaveClock {
    pub const EVENT_MASK: ClockEventMask =
        ClockEventMask::RESET_BEGIN.union(ClockEventMask::RESET_END);

    pub fn new(connection: MasterConnection, sync_cycle: Duration) -> Result<Self> {
        if !sync_cycle.is_positive() {
            return Err(Error::InvalidArg(format!(
                "sync cycle time must be positive, got {sync_cycle}"
            )));
        }
        let interpolation = Arc::new(InterpolationTime::new());
        let source = InterpolatedSource {
            interpolation: interpolation.clone(),
        };
        Ok(Self {
            clock: ContinuousClock::new(SLAVE_MASTER_ON_DEMAND, source),
            interpolation,
            connection: Arc::new(connection),
            sync_cycle,
            poller: Mutex::new(None),
        })
    }

    pub fn interpolation(&self) -> &InterpolationTime {
        &self.interpolation
    }

    /// Sample the master once, feed the interpolation and report the result
    fn poll(connection: &MasterConnection, interpolation: &InterpolationTime) -> Result<()> {
        let generation = interpolation.generation();
        let sent_at = Instant::now();
        let master_time = connection.master_time()?;
        let round_trip = Duration::from_std(sent_at.elapsed());
        if !interpolation.set_time_since(generation, master_time, round_trip) {
            log::debug!("dropped master sample {master_time} taken before a reset");
            return Ok(());
        }
        connection.report_synced(interpolation.time())
    }

    fn run(
        connection: Arc<MasterConnection>,
        interpolation: Arc<InterpolationTime>,
        signal: Arc<StopSignal>,
        sync_cycle: std::time::Duration,
    ) {
        while !signal.wait_for(sync_cycle) {
            if let Err(e) = Self::poll(&connection, &interpolation) {
                log::warn!(
                    "'{}' failed to poll timing master '{}': {e}",
                    connection.participant_name(),
                    connection.master_name()
                );
            }
        }
    }
}

impl Clock for ContinuousSlaveClock {
    fn name(&self) -> &str {
        self.clock.name()
    }

    fn clock_type(&self) -> ClockType {
        ClockType::Continuous
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn reset(&self) {
        self.clock.reset();
    }

    fn start(&self, sink: Weak<dyn EventSink>) -> Result<()> {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return Err(Error::InvalidState(format!(
                "{SLAVE_MASTER_ON_DEMAND} is already started"
            )));
        }

        self.connection.register(Self::EVENT_MASK)?;
        announce(&self.connection);
        // Start from the master's current time when it answers
        if let Err(e) = Self::poll(&self.connection, &self.interpolation) {
            log::warn!("initial poll of timing master failed: {e}");
        }
        self.clock.start(sink)?;

        let signal = Arc::new(StopSignal::new());
        let connection = self.connection.clone();
        let interpolation = self.interpolation.clone();
        let thread_signal = signal.clone();
        let sync_cycle = self.sync_cycle.to_std();
        let handle = thread::Builder::new()
            .name(SLAVE_MASTER_ON_DEMAND.to_string())
            .spawn(move || Self::run(connection, interpolation, thread_signal, sync_cycle))
            .map_err(|e| Error::Failed(format!("failed to spawn polling thread: {e}")))?;

        *poller = Some(Poller { signal, handle });
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let poller = self.poller.lock().take();
        if let Some(Poller { signal, handle }) = poller {
            signal.stop();
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::error!("{SLAVE_MASTER_ON_DEMAND} polling thread panicked");
            }
            if let Err(e) = self.connection.unregister() {
                log::warn!(
                    "'{}' failed to unregister from '{}': {e}",
                    self.connection.participant_name(),
                    self.connection.master_name()
                );
            }
        }
        self.clock.stop()
    }
}

impl SyncEventTarget for ContinuousSlaveClock {
    fn on_sync_event(
        &self,
        event: ClockEventId,
        _old_time: Timestamp,
        new_time: Timestamp,
    ) -> Result<Timestamp> {
        if event == ClockEventId::ResetBegin {
            self.interpolation.reset_time(new_time);
            self.clock.reset();
        }
        Ok(self.clock.now())
    }
}

impl Drop for ContinuousSlaveClock {
    fn drop(&mut self) {
        if let Some(Poller { signal, .. }) = self.poller.get_mut().take() {
            signal.stop();
        }
    }
}
