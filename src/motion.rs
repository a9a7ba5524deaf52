use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;

/// Standard gravity, m/s².
pub const G_EARTH: f64 = 9.80665;

/// One 3-axis accelerometer reading, m/s² per axis.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AccelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: f64,
}

impl AccelSample {
    /// Instantaneous magnitude expressed in g.
    pub fn g_force(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt() / G_EARTH
    }
}

/// Raised once per monitoring session when the g-force threshold is crossed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ImpactEvent {
    pub g_force: f64,
    pub timestamp: f64,
    pub detected_at: DateTime<Utc>,
}

/// Threshold classifier over the raw accelerometer stream.
///
/// A single sample above the threshold trips it; once tripped it ignores
/// every further sample until a new monitoring session resets it, so one
/// physical impact produces exactly one countdown. No smoothing or
/// debounce window is applied; a single instantaneous crossing is enough.
pub struct MotionClassifier {
    threshold_g: f64,
    tripped: bool,
}

impl MotionClassifier {
    pub fn new(threshold_g: f64) -> Self {
        MotionClassifier {
            threshold_g,
            tripped: false,
        }
    }

    /// Feed one sample. Returns the impact event on the first crossing,
    /// `None` for everything else (including all samples after tripping).
    pub fn on_sample(&mut self, sample: &AccelSample) -> Option<ImpactEvent> {
        if self.tripped {
            return None;
        }

        let g = sample.g_force();
        if g > self.threshold_g {
            self.tripped = true;
            return Some(ImpactEvent {
                g_force: g,
                timestamp: sample.timestamp,
                detected_at: Utc::now(),
            });
        }

        None
    }

    pub fn tripped(&self) -> bool {
        self.tripped
    }

    /// Begin a new monitoring session.
    pub fn reset(&mut self) {
        self.tripped = false;
    }
}

/// Drain the sample channel until an impact is classified or the sensor
/// side hangs up. Dropping the receiver on return releases the listener.
///
/// Returns `None` when the stream ends without an impact (monitoring
/// stopped, or the sensor was never available, in which case the channel
/// closes immediately and no countdown starts).
pub async fn monitor(mut samples: Receiver<AccelSample>, threshold_g: f64) -> Option<ImpactEvent> {
    let mut classifier = MotionClassifier::new(threshold_g);
    let mut sample_count = 0u64;

    while let Some(sample) = samples.recv().await {
        sample_count += 1;
        if let Some(impact) = classifier.on_sample(&sample) {
            log::info!(
                "impact classified at {:.1} g after {} samples",
                impact.g_force,
                sample_count
            );
            return Some(impact);
        }
    }

    log::info!("monitoring stopped after {} samples, no impact", sample_count);
    None
}
