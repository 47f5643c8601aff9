use crate::sensor::motion_filter::{FilterOutput, MotionFilter};
use crate::sensor::orientation_source::{OrientationSource, RawOrientation};
use crate::sensor::sensor_config::SensorConfig;
use crate::sensor::sensor_event::{SensorEvent, SensorStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tilt_core::MotionError;
use tokio::sync::{OnceCell, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type CalibrationReply = oneshot::Sender<Result<(), MotionError>>;

enum SensorCommand {
    Calibrate { reply: Option<CalibrationReply> },
    Destroy,
}

struct Running {
    cmd_tx: mpsc::UnboundedSender<SensorCommand>,
    task: JoinHandle<()>,
}

struct ManagerInner {
    source: Arc<dyn OrientationSource>,
    config: SensorConfig,
    supported: OnceCell<bool>,
    running: Mutex<Option<Running>>,
    /// Bumped by every `destroy`. An `init` that sees it move gives up.
    epoch: AtomicU64,
    status_tx: Arc<watch::Sender<SensorStatus>>,
    events_tx: mpsc::UnboundedSender<SensorEvent>,
}

/// Handle to the sensor pipeline.
///
/// Owns nothing but channels: the sampling loop runs in its own task once
/// `init` succeeds and is stopped by `destroy`.
#[derive(Clone)]
pub struct SensorManager {
    inner: Arc<ManagerInner>,
}

impl SensorManager {
    pub fn new(
        source: Arc<dyn OrientationSource>,
        config: SensorConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SensorEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(SensorStatus::default());
        let manager = Self {
            inner: Arc::new(ManagerInner {
                source,
                config,
                supported: OnceCell::new(),
                running: Mutex::new(None),
                epoch: AtomicU64::new(0),
                status_tx: Arc::new(status_tx),
                events_tx,
            }),
        };
        (manager, events_rx)
    }

    pub fn config(&self) -> &SensorConfig {
        &self.inner.config
    }

    /// Capability check. The first call waits for the source to answer, so it
    /// is safe to ask right after construction.
    pub async fn is_supported(&self) -> bool {
        *self
            .inner
            .supported
            .get_or_init(|| async { self.inner.source.detect().await })
            .await
    }

    /// Request permission and start sampling. Calling it again while running is a no-op.
    ///
    /// A `destroy` issued while this is still waiting on support detection or the
    /// permission prompt wins: the listener is released and `Cancelled` is returned.
    pub async fn init(&self) -> Result<(), MotionError> {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        if self.is_running() {
            return Ok(());
        }

        if !self.is_supported().await {
            return Err(self.fail(MotionError::unsupported(
                "device orientation is not available",
            )));
        }

        if let Err(e) = self.inner.source.request_permission().await {
            return Err(self.fail(e));
        }

        let samples_rx = match self.inner.source.subscribe() {
            Ok(rx) => rx,
            Err(e) => return Err(self.fail(e)),
        };

        let mut running = self.lock_running();
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            drop(samples_rx);
            debug!("Sensor init aborted by destroy");
            return Err(MotionError::cancelled("sensor destroyed during init"));
        }
        if running.is_some() {
            // Another init won the race while permission was pending.
            return Ok(());
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let sensor_loop = SensorLoop {
            filter: MotionFilter::new(self.inner.config.clone()),
            config: self.inner.config.clone(),
            samples_rx,
            cmd_rx,
            events_tx: self.inner.events_tx.clone(),
            status_tx: self.inner.status_tx.clone(),
            calibration: None,
            last_raw: None,
        };

        self.inner.status_tx.send_modify(|s| {
            *s = SensorStatus {
                is_initialized: true,
                ..SensorStatus::default()
            }
        });

        if self.inner.config.auto_calibrate {
            let _ = cmd_tx.send(SensorCommand::Calibrate { reply: None });
        }

        let task = tokio::spawn(sensor_loop.run());
        *running = Some(Running { cmd_tx, task });
        info!("Sensor pipeline started");
        Ok(())
    }

    /// Capture a new baseline over the calibration window.
    ///
    /// Resolves once the window has elapsed. A calibration superseded by a
    /// later call, or interrupted by `destroy`, resolves with `Cancelled`.
    pub async fn calibrate(&self) -> Result<(), MotionError> {
        let cmd_tx = self
            .lock_running()
            .as_ref()
            .map(|r| r.cmd_tx.clone())
            .ok_or_else(|| MotionError::not_ready("sensor has not been initialised"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(SensorCommand::Calibrate {
                reply: Some(reply_tx),
            })
            .map_err(|_| MotionError::cancelled("sensor pipeline stopped"))?;

        reply_rx
            .await
            .unwrap_or_else(|_| Err(MotionError::cancelled("sensor pipeline stopped")))
    }

    /// Stop sampling and release the source listener. Idempotent.
    pub fn destroy(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let Some(running) = self.lock_running().take() else {
            return;
        };
        let _ = running.cmd_tx.send(SensorCommand::Destroy);
        drop(running.task);
        self.inner
            .status_tx
            .send_modify(|s| *s = SensorStatus::default());
        info!("Sensor pipeline destroyed");
    }

    pub fn status(&self) -> SensorStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SensorStatus> {
        self.inner.status_tx.subscribe()
    }

    fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail(&self, error: MotionError) -> MotionError {
        warn!("Sensor error: {}", error);
        let _ = self.inner.events_tx.send(SensorEvent::Error(error.clone()));
        error
    }
}

struct Calibration {
    deadline: Instant,
    beta_sum: f64,
    gamma_sum: f64,
    count: u32,
    reply: Option<CalibrationReply>,
}

struct SensorLoop {
    filter: MotionFilter,
    config: SensorConfig,
    samples_rx: mpsc::Receiver<RawOrientation>,
    cmd_rx: mpsc::UnboundedReceiver<SensorCommand>,
    events_tx: mpsc::UnboundedSender<SensorEvent>,
    status_tx: Arc<watch::Sender<SensorStatus>>,
    calibration: Option<Calibration>,
    last_raw: Option<RawOrientation>,
}

impl SensorLoop {
    async fn run(mut self) {
        loop {
            let deadline = self.calibration.as_ref().map(|c| c.deadline);

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(SensorCommand::Calibrate { reply }) => self.start_calibration(reply),
                        Some(SensorCommand::Destroy) | None => break,
                    }
                }

                sample = self.samples_rx.recv() => {
                    match sample {
                        Some(raw) => self.on_sample(raw),
                        None => {
                            warn!("Orientation stream ended");
                            let _ = self.events_tx.send(SensorEvent::Error(
                                MotionError::unsupported("orientation stream ended"),
                            ));
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.finish_calibration();
                }
            }
        }

        if let Some(reply) = self.calibration.take().and_then(|c| c.reply) {
            let _ = reply.send(Err(MotionError::cancelled("sensor destroyed")));
        }
        debug!("Sensor loop finished");
    }

    fn on_sample(&mut self, raw: RawOrientation) {
        self.last_raw = Some(raw);

        if let Some(calibration) = self.calibration.as_mut() {
            calibration.beta_sum += raw.beta;
            calibration.gamma_sum += raw.gamma;
            calibration.count += 1;
            return;
        }

        let out = self.filter.process(raw);
        self.publish(out);
    }

    fn start_calibration(&mut self, reply: Option<CalibrationReply>) {
        if let Some(previous) = self.calibration.take().and_then(|c| c.reply) {
            let _ = previous.send(Err(MotionError::cancelled(
                "superseded by a newer calibration",
            )));
        }

        debug!(
            "Calibrating for {} ms",
            self.config.calibration_window().as_millis()
        );
        self.calibration = Some(Calibration {
            deadline: Instant::now() + self.config.calibration_window(),
            beta_sum: 0.0,
            gamma_sum: 0.0,
            count: 0,
            reply,
        });
        self.status_tx.send_modify(|s| s.is_calibrated = false);
    }

    fn finish_calibration(&mut self) {
        let Some(calibration) = self.calibration.take() else {
            return;
        };

        let baseline = if calibration.count > 0 {
            let n = f64::from(calibration.count);
            RawOrientation::new(calibration.beta_sum / n, calibration.gamma_sum / n)
        } else {
            self.last_raw.unwrap_or_default()
        };

        let out = self.filter.recalibrate(baseline);
        self.publish(out);

        info!(
            "Calibration complete (beta {:.2}, gamma {:.2}, {} samples)",
            baseline.beta, baseline.gamma, calibration.count
        );
        self.status_tx.send_modify(|s| s.is_calibrated = true);
        let _ = self.events_tx.send(SensorEvent::CalibrationComplete);

        if let Some(reply) = calibration.reply {
            let _ = reply.send(Ok(()));
        }
    }

    fn publish(&self, out: FilterOutput) {
        if out.is_empty() {
            return;
        }
        self.status_tx.send_modify(|s| {
            if let Some(v) = out.vector {
                s.coordinates = v;
            }
            if let Some(d) = out.direction {
                s.direction = d;
            }
        });
        if let Some(v) = out.vector {
            let _ = self.events_tx.send(SensorEvent::CoordinateChange(v));
        }
        if let Some(d) = out.direction {
            let _ = self.events_tx.send(SensorEvent::DirectionChange(d));
        }
    }
}
