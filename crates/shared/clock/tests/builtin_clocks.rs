use std::sync::Arc;
use std::thread;
use std::time::{Duration as StdDuration, Instant};
use tempo_clock::{
    Clock, ClockEvent, ClockRegistry, EventRecorder, LOCAL_SYSTEM_REALTIME, LOCAL_SYSTEM_SIMTIME,
    LocalSystemSimClock,
};
use tempo_core::{Duration, Lifecycle, Timestamp};
use tempo_ports::{ClockType, EventSink};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn recorder_sink() -> (Arc<EventRecorder>, Arc<dyn EventSink>) {
    let recorder = Arc::new(EventRecorder::new());
    let sink: Arc<dyn EventSink> = recorder.clone();
    (recorder, sink)
}

#[test]
fn test_builtin_clock_types() {
    let registry = ClockRegistry::with_builtin_clocks(Lifecycle::new());

    let realtime = registry.find_clock(LOCAL_SYSTEM_REALTIME).unwrap();
    let simtime = registry.find_clock(LOCAL_SYSTEM_SIMTIME).unwrap();
    assert_eq!(realtime.clock_type(), ClockType::Continuous);
    assert_eq!(simtime.clock_type(), ClockType::Discrete);
    assert!(registry.find_clock("missing").is_none());
}

#[test]
fn test_realtime_clock_is_monotonic_between_resets() {
    init_logging();
    let registry = ClockRegistry::with_builtin_clocks(Lifecycle::new());
    let clock = registry.find_clock(LOCAL_SYSTEM_REALTIME).unwrap();
    let (recorder, sink) = recorder_sink();
    clock.start(Arc::downgrade(&sink)).unwrap();

    let mut previous = clock.now();
    for _ in 0..100 {
        let time = clock.now();
        assert!(time >= previous);
        previous = time;
    }
    clock.stop().unwrap();

    // start() reset plus the first sample
    assert_eq!(recorder.reset_count(), 2);
}

#[test]
fn test_configured_simulation_clock_drives_sink() {
    init_logging();
    let registry = ClockRegistry::with_builtin_clocks(Lifecycle::new());
    let stepped = LocalSystemSimClock::new(Duration::from_millis(2), 0.0).unwrap();
    registry.replace_simulation_clock(stepped).unwrap();

    let clock = registry.find_clock(LOCAL_SYSTEM_SIMTIME).unwrap();
    let (recorder, sink) = recorder_sink();
    clock.start(Arc::downgrade(&sink)).unwrap();

    let deadline = Instant::now() + StdDuration::from_secs(5);
    while clock.now() < Timestamp::from_millis(20) && Instant::now() < deadline {
        thread::sleep(StdDuration::from_millis(1));
    }
    clock.stop().unwrap();

    let stopped_at = clock.now();
    assert!(stopped_at >= Timestamp::from_millis(20));
    thread::sleep(StdDuration::from_millis(10));
    assert_eq!(clock.now(), stopped_at);

    let last_update = recorder
        .events()
        .into_iter()
        .rev()
        .find_map(|event| match event {
            ClockEvent::UpdateEnd { new } => Some(new),
            _ => None,
        });
    assert_eq!(last_update, Some(stopped_at));
}
