use std::time::Duration;
use tilt::sensor::{RawFeeder, RawOrientation};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};

const SAMPLE_PERIOD: Duration = Duration::from_millis(20);
/// Held still first so calibration sees a level device.
const REST: Duration = Duration::from_millis(1500);
const AMPLITUDE: f64 = 20.0;

/// Reading of a hand slowly rocking the device, `elapsed` after start.
pub fn sway(elapsed: Duration) -> RawOrientation {
    if elapsed < REST {
        return RawOrientation::default();
    }
    let t = (elapsed - REST).as_secs_f64();
    RawOrientation::new(AMPLITUDE * (t * 0.7).sin(), AMPLITUDE * (t * 0.4).sin())
}

/// Feed [`sway`] into `feeder` until the returned task is aborted.
pub fn spawn(feeder: RawFeeder) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut tick = interval(SAMPLE_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            feeder.push(sway(started.elapsed()));
        }
    })
}
