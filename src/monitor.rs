use crate::model::TemperatureReading;
use crate::output::OutputSink;
use crate::platform::SensorReader;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// One-shot cancellation token. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Sets the flag. Returns `true` only for the call that flipped it.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl MonitorState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => MonitorState::Idle,
            1 => MonitorState::Running,
            2 => MonitorState::Stopping,
            _ => MonitorState::Stopped,
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MonitorState::Idle => "idle",
            MonitorState::Running => "running",
            MonitorState::Stopping => "stopping",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(MonitorState::Idle as u8)))
    }

    fn get(&self) -> MonitorState {
        MonitorState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: MonitorState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("temperature monitor panicked")]
    Panicked,
    #[error("temperature monitor task was cancelled by its runtime")]
    Cancelled,
    #[error("join requested before the stop signal was set")]
    NotStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    pub samples: usize,
    pub final_state: MonitorState,
}

pub struct TemperatureMonitor {
    sensors: Arc<dyn SensorReader>,
    sink: Arc<dyn OutputSink>,
    interval: Duration,
    state: SharedState,
}

impl TemperatureMonitor {
    pub fn new(
        sensors: Arc<dyn SensorReader>,
        sink: Arc<dyn OutputSink>,
        interval: Duration,
    ) -> Self {
        Self {
            sensors,
            sink,
            interval,
            state: SharedState::new(),
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state.get()
    }

    pub fn start(self, runtime: &Handle, stop: &StopSignal) -> MonitorHandle {
        self.state.set(MonitorState::Running);
        self.sink
            .print("[MONITOR] Starting temperature monitoring...");
        debug!(interval_ms = self.interval.as_millis() as u64, "monitor started");

        let state = self.state.clone();
        let stop_rx = stop.subscribe();
        let task = runtime.spawn(sample_loop(
            self.sensors,
            self.sink,
            self.interval,
            stop_rx,
            self.state,
        ));

        MonitorHandle {
            runtime: runtime.clone(),
            task: Some(task),
            stop: stop.clone(),
            state,
        }
    }
}

async fn sample_loop(
    sensors: Arc<dyn SensorReader>,
    sink: Arc<dyn OutputSink>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
    state: SharedState,
) -> usize {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut samples = 0_usize;

    loop {
        if *stop_rx.borrow_and_update() {
            break;
        }
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    warn!("stop signal dropped without being set, stopping monitor");
                    break;
                }
            }
            _ = ticker.tick() => {
                let cpu = sensors.read_cpu_temperature();
                let gpu = sensors.read_gpu_temperature();
                sink.print(&format_sample(&cpu, &gpu));
                samples += 1;
            }
        }
    }

    state.set(MonitorState::Stopping);
    sink.print("[MONITOR] Temperature monitoring stopped");
    state.set(MonitorState::Stopped);
    samples
}

fn format_sample(cpu: &TemperatureReading, gpu: &TemperatureReading) -> String {
    format!("[TEMP] CPU: {cpu} | GPU: {gpu}")
}

/// Dropping an unjoined handle stops the monitor and waits for it.
pub struct MonitorHandle {
    runtime: Handle,
    task: Option<JoinHandle<usize>>,
    stop: StopSignal,
    state: SharedState,
}

impl MonitorHandle {
    pub fn state(&self) -> MonitorState {
        self.state.get()
    }

    /// The stop signal must already be set.
    pub fn join(mut self) -> Result<MonitorSummary, MonitorError> {
        if !self.stop.is_stopped() {
            return Err(MonitorError::NotStopped);
        }
        let Some(task) = self.task.take() else {
            return Err(MonitorError::Cancelled);
        };
        let samples = self.runtime.block_on(task).map_err(|err| {
            if err.is_panic() {
                MonitorError::Panicked
            } else {
                MonitorError::Cancelled
            }
        })?;
        Ok(MonitorSummary {
            samples,
            final_state: self.state.get(),
        })
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.stop.stop();
            if let Err(err) = self.runtime.block_on(task) {
                warn!(error = %err, "temperature monitor ended abnormally during cleanup");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::RecordingSink;
    use crate::platform::testing::FixedSensors;
    use std::time::Instant;
    use tokio::runtime::{Builder, Runtime};

    fn runtime() -> Runtime {
        Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .expect("test runtime")
    }

    fn monitor(sink: &Arc<RecordingSink>, interval: Duration) -> TemperatureMonitor {
        TemperatureMonitor::new(Arc::new(FixedSensors::new(50.0, 60.0)), sink.clone(), interval)
    }

    #[test]
    fn stop_flips_exactly_once() {
        let stop = StopSignal::new();
        let other = stop.clone();
        assert!(!stop.is_stopped());
        assert!(other.stop());
        assert!(!stop.stop());
        assert!(stop.is_stopped());
    }

    #[test]
    fn signals_of_separate_runs_are_independent() {
        let first = StopSignal::new();
        let second = StopSignal::new();
        first.stop();
        assert!(!second.is_stopped());
    }

    #[test]
    fn state_machine_runs_idle_to_stopped() {
        let rt = runtime();
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(&sink, Duration::from_millis(10));
        assert_eq!(monitor.state(), MonitorState::Idle);

        let stop = StopSignal::new();
        let handle = monitor.start(rt.handle(), &stop);
        assert_eq!(handle.state(), MonitorState::Running);
        std::thread::sleep(Duration::from_millis(35));
        stop.stop();

        let summary = handle.join().expect("join");
        assert_eq!(summary.final_state, MonitorState::Stopped);
        assert!(summary.samples >= 1);
        assert_eq!(sink.count_prefixed("[TEMP]"), summary.samples);

        let lines = sink.lines();
        assert_eq!(lines.first().map(String::as_str), Some("[MONITOR] Starting temperature monitoring..."));
        assert_eq!(lines.last().map(String::as_str), Some("[MONITOR] Temperature monitoring stopped"));
        assert_eq!(lines[1], "[TEMP] CPU: 50.0°C | GPU: 60.0°C");
    }

    #[test]
    fn join_completes_within_one_interval_of_stop() {
        let rt = runtime();
        let sink = Arc::new(RecordingSink::default());
        let stop = StopSignal::new();
        let handle = monitor(&sink, Duration::from_millis(50)).start(rt.handle(), &stop);
        std::thread::sleep(Duration::from_millis(75));

        let stopped_at = Instant::now();
        stop.stop();
        handle.join().expect("join");
        let latency = stopped_at.elapsed();
        assert!(latency <= Duration::from_millis(60), "join took {latency:?}");
    }

    #[test]
    fn join_before_stop_is_rejected_and_drop_cleans_up() {
        let rt = runtime();
        let sink = Arc::new(RecordingSink::default());
        let stop = StopSignal::new();
        let handle = monitor(&sink, Duration::from_millis(10)).start(rt.handle(), &stop);

        assert!(matches!(handle.join(), Err(MonitorError::NotStopped)));
        assert!(stop.is_stopped());
        assert_eq!(
            sink.lines().last().map(String::as_str),
            Some("[MONITOR] Temperature monitoring stopped")
        );
    }

    #[test]
    fn simulated_readings_are_labelled_in_samples() {
        let cpu = TemperatureReading::simulated(41.0);
        let gpu = TemperatureReading::measured(66.5);
        assert_eq!(
            format_sample(&cpu, &gpu),
            "[TEMP] CPU: 41.0°C (simulated) | GPU: 66.5°C"
        );
    }

    #[test]
    fn panicking_sensor_surfaces_as_monitor_error() {
        struct Broken;
        impl SensorReader for Broken {
            fn read_cpu_temperature(&self) -> TemperatureReading {
                panic!("sensor exploded");
            }
            fn read_gpu_temperature(&self) -> TemperatureReading {
                TemperatureReading::measured(0.0)
            }
        }

        let rt = runtime();
        let sink = Arc::new(RecordingSink::default());
        let stop = StopSignal::new();
        let handle = TemperatureMonitor::new(Arc::new(Broken), sink, Duration::from_millis(5))
            .start(rt.handle(), &stop);
        std::thread::sleep(Duration::from_millis(20));
        stop.stop();
        assert!(matches!(handle.join(), Err(MonitorError::Panicked)));
    }
}
