use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration};

use roadguard::animator::{halt_flag, AnimatorExit, Frame, FrameSink};
use roadguard::contacts::{Contact, ContactDirectory, InMemoryDirectory};
use roadguard::coords::GeoPoint;
use roadguard::motion::{self, AccelSample, G_EARTH};
use roadguard::pipeline::{
    animator_for, launch_dispatch, settle_arrival, EmergencyPipeline, LogNotices, PipelineOutcome,
};
use roadguard::route::{NominatimClient, OsrmClient, RouteProvider};
use roadguard::sos::{LocationFix, MessageTransport, TransportError};
use roadguard::{Config, SessionState};

#[derive(Parser, Debug)]
#[command(name = "roadguard")]
#[command(about = "Crash detection demo - impact, countdown, SOS and ambulance simulation", long_about = None)]
struct Args {
    /// Simulated impact magnitude in g
    #[arg(long, default_value = "6.2")]
    impact_g: f64,

    /// Milliseconds of normal driving before the simulated impact
    #[arg(long, default_value = "2000")]
    impact_after_ms: u64,

    /// Incident latitude reported by the simulated GPS
    #[arg(long, default_value = "44.4268")]
    lat: f64,

    /// Incident longitude reported by the simulated GPS
    #[arg(long, default_value = "26.1025")]
    lon: f64,

    /// Countdown before automatic escalation, milliseconds
    #[arg(long, default_value = "5000")]
    countdown_ms: u64,

    /// Cancel the countdown after this many milliseconds (operator abort)
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Assumed responder speed, km/h
    #[arg(long, default_value = "50.0")]
    speed_kmh: f64,
}

/// Prints each alert instead of handing it to a carrier.
struct ConsoleTransport;

impl MessageTransport for ConsoleTransport {
    fn send_text(&mut self, phone_number: &str, body: &str) -> Result<(), TransportError> {
        println!("[{}] SMS to {}: {}", ts_now(), phone_number, body);
        Ok(())
    }
}

/// Single-shot fix standing in for the platform location service.
struct SimulatedGps(GeoPoint);

impl LocationFix for SimulatedGps {
    async fn current_location(&self) -> Option<GeoPoint> {
        Some(self.0)
    }
}

/// Logs roughly one frame per second of the ~60 fps stream.
struct ConsoleSink {
    frames: u64,
}

impl FrameSink for ConsoleSink {
    fn is_live(&self) -> bool {
        true
    }

    fn draw(&mut self, frame: &Frame) {
        if self.frames % 60 == 0 {
            println!(
                "[{}] ambulance at {:.5},{:.5} heading {:.0}° ({:.0}%)",
                ts_now(),
                frame.position.lat,
                frame.position.lon,
                frame.heading_deg,
                frame.t * 100.0
            );
        }
        self.frames += 1;
    }
}

fn demo_contacts() -> Vec<Contact> {
    InMemoryDirectory::new(vec![
        Contact {
            id: "c1".to_string(),
            name: "Maria".to_string(),
            phone_number: "0761873242".to_string(),
            relationship: "spouse".to_string(),
            priority: 1,
            address: None,
        },
        Contact {
            id: "c2".to_string(),
            name: "Andrei".to_string(),
            phone_number: "0712345678".to_string(),
            relationship: "brother".to_string(),
            priority: 2,
            address: None,
        },
    ])
    .ordered_contacts()
}

/// Feeds quiet 1 g samples at game rate, then one spike.
async fn simulated_accel_feed(tx: mpsc::Sender<AccelSample>, impact_after_ms: u64, impact_g: f64) {
    let mut ticker = interval(Duration::from_millis(20));
    let quiet_samples = impact_after_ms / 20;

    for i in 0..=quiet_samples {
        ticker.tick().await;
        let sample = if i == quiet_samples {
            AccelSample {
                x: 0.0,
                y: 0.0,
                z: impact_g * G_EARTH,
                timestamp: now_secs(),
            }
        } else {
            AccelSample {
                x: 0.1,
                y: 0.05,
                z: G_EARTH,
                timestamp: now_secs(),
            }
        };
        if tx.send(sample).await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config {
        countdown_ms: args.countdown_ms,
        assumed_speed_kmh: args.speed_kmh,
        ..Config::default()
    };
    let incident = GeoPoint::new(args.lat, args.lon);

    println!("[{}] roadguard starting", ts_now());
    println!("  impact: {:.1} g after {} ms", args.impact_g, args.impact_after_ms);
    println!("  incident: {:.4},{:.4}", incident.lat, incident.lon);
    println!("  countdown: {} ms", config.countdown_ms);

    // Driving mode: watch the (simulated) accelerometer.
    let (accel_tx, accel_rx) = mpsc::channel::<AccelSample>(500);
    tokio::spawn(simulated_accel_feed(
        accel_tx,
        args.impact_after_ms,
        args.impact_g,
    ));

    let impact = match motion::monitor(accel_rx, config.crash_threshold_g).await {
        Some(impact) => impact,
        None => {
            println!("[{}] no impact detected, exiting", ts_now());
            return Ok(());
        }
    };
    println!("[{}] CRASH DETECTED at {:.1} g", ts_now(), impact.g_force);

    // Operator cancel channel.
    let (cancel_tx, mut cancel_rx) = mpsc::channel::<()>(1);
    if let Some(after_ms) = args.cancel_after_ms {
        tokio::spawn(async move {
            sleep(Duration::from_millis(after_ms)).await;
            let _ = cancel_tx.send(()).await;
        });
    }

    let mut session = SessionState::new();
    let mut notices = LogNotices;
    let mut pipeline =
        EmergencyPipeline::new(config.clone(), SimulatedGps(incident), ConsoleTransport);

    let outcome = pipeline
        .respond_to_impact(
            &impact,
            &demo_contacts(),
            &mut cancel_rx,
            &mut session,
            &mut notices,
        )
        .await;

    match outcome {
        PipelineOutcome::Cancelled => {
            println!("[{}] alert cancelled by operator, back to idle", ts_now());
            return Ok(());
        }
        PipelineOutcome::Escalated { location, report } => {
            println!(
                "[{}] escalated (location known: {}), alert report: {:?}",
                ts_now(),
                location.known,
                report
            );
        }
    }

    // Visual layer: resolve a real route and play the dispatch.
    let routes = RouteProvider::new(NominatimClient::new(), OsrmClient::new(), &config);
    let resolved = match launch_dispatch(&mut session, &routes, &mut notices).await {
        Some(resolved) => resolved,
        None => {
            println!("[{}] no dispatch started", ts_now());
            return Ok(());
        }
    };

    println!(
        "[{}] route: {} points, {:.2} km, ETA {}",
        ts_now(),
        resolved.route.points.len(),
        resolved.route.length_km,
        resolved.eta
    );

    let mut animator = animator_for(&resolved, &config)?;
    let mut sink = ConsoleSink { frames: 0 };
    let halt = halt_flag();

    match animator.run(&mut sink, 0, &halt).await {
        AnimatorExit::Arrived => {
            settle_arrival(&mut session, &mut notices, config.arrival_grace_ms).await;
            println!("[{}] ambulance arrived, session reset", ts_now());
        }
        AnimatorExit::SinkGone { elapsed_ms } | AnimatorExit::Halted { elapsed_ms } => {
            session.suspend(elapsed_ms);
            println!("[{}] animation suspended at {} ms", ts_now(), elapsed_ms);
        }
    }

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
