#![warn(clippy::all)]

use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Result};
use clap::{value_t, App, Arg};
use log::{info, warn};
use sweep_algorithms::{
    odometry::{Odometry, SweepOutcome},
    slot::OfferResult,
    worker::OdometryWorker,
};
use sweep_core::{config::OdometryConfig, message::SweepMessage, pose::StampedPose};
use sweep_io::{
    config::{load_config, save_config},
    trajectory::{write_trajectory, TrajectoryFormat},
};
use sweep_tools::{
    plot_sink::PlotSink,
    sources::{FileSweeps, SensorLayout, SimulatedSweeps},
};

enum Input {
    Files(PathBuf),
    Simulation { sweeps: usize, seed: u64 },
}

struct Args {
    pub input: Input,
    pub config_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub format: TrajectoryFormat,
    pub times_file: Option<PathBuf>,
    pub period: f64,
    pub layout: SensorLayout,
    pub plot_dir: Option<PathBuf>,
    pub realtime: bool,
    pub save_config_file: Option<PathBuf>,
}

fn get_args() -> Result<Args> {
    let matches = App::new("sweep odometry")
        .version("0.1")
        .author("Pascal Bormann <pascal.bormann@igd.fraunhofer.de>")
        .about("Estimates the sensor trajectory of a sequence of LiDAR sweeps")
        .arg(
            Arg::with_name("INPUT")
                .short("i")
                .long("input")
                .takes_value(true)
                .value_name("INPUT")
                .help("Sweep file or directory containing one sweep file per sweep")
                .required_unless("SIMULATE"),
        )
        .arg(
            Arg::with_name("SIMULATE")
                .long("simulate")
                .takes_value(true)
                .value_name("N")
                .conflicts_with("INPUT")
                .help("Run on N simulated sweeps of a synthetic room instead of reading files"),
        )
        .arg(
            Arg::with_name("SEED")
                .long("seed")
                .takes_value(true)
                .default_value("7")
                .help("Random seed of the simulation"),
        )
        .arg(
            Arg::with_name("CONFIG")
                .short("c")
                .long("config")
                .takes_value(true)
                .value_name("CONFIG")
                .help("JSON odometry configuration. Missing fields keep their default values"),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Output trajectory file"),
        )
        .arg(
            Arg::with_name("FORMAT")
                .long("format")
                .takes_value(true)
                .possible_values(&["kitti", "tum"])
                .default_value("tum")
                .help("Format of the output trajectory"),
        )
        .arg(
            Arg::with_name("TIMES")
                .long("times")
                .takes_value(true)
                .value_name("TIMES")
                .help("File with one timestamp per sweep, like the KITTI times.txt"),
        )
        .arg(
            Arg::with_name("PERIOD")
                .long("period")
                .takes_value(true)
                .default_value("0.1")
                .help("Sweep period in seconds, used for timestamps if no times file is given and for pacing"),
        )
        .arg(
            Arg::with_name("RINGS")
                .long("rings")
                .takes_value(true)
                .default_value("16")
                .help("Number of rings, used for files that store no ring indices"),
        )
        .arg(
            Arg::with_name("MIN_ELEVATION")
                .long("min-elevation")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-15")
                .help("Elevation of the lowest ring in degrees"),
        )
        .arg(
            Arg::with_name("MAX_ELEVATION")
                .long("max-elevation")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("15")
                .help("Elevation of the highest ring in degrees"),
        )
        .arg(
            Arg::with_name("PLOT")
                .long("plot")
                .takes_value(true)
                .value_name("DIR")
                .help("Write a bird's-eye plot of every sweep and its features into DIR"),
        )
        .arg(
            Arg::with_name("REALTIME")
                .long("realtime")
                .help("Process sweeps on a background worker while they are fed at the sweep period. Sweeps that arrive while the worker is busy are dropped"),
        )
        .arg(
            Arg::with_name("SAVE_CONFIG")
                .long("save-config")
                .takes_value(true)
                .value_name("FILE")
                .help("Write the effective configuration as JSON into FILE"),
        )
        .get_matches();

    let input = if matches.is_present("SIMULATE") {
        Input::Simulation {
            sweeps: value_t!(matches, "SIMULATE", usize)?,
            seed: value_t!(matches, "SEED", u64)?,
        }
    } else {
        Input::Files(PathBuf::from(
            matches
                .value_of("INPUT")
                .ok_or_else(|| anyhow!("Either an input path or --simulate is required"))?,
        ))
    };

    let period = value_t!(matches, "PERIOD", f64)?;
    if !period.is_finite() || period <= 0.0 {
        bail!("Sweep period must be positive, got {}", period);
    }

    Ok(Args {
        input,
        config_file: matches.value_of("CONFIG").map(PathBuf::from),
        output_file: matches.value_of("OUTPUT").map(PathBuf::from),
        format: value_t!(matches, "FORMAT", TrajectoryFormat)?,
        times_file: matches.value_of("TIMES").map(PathBuf::from),
        period,
        layout: SensorLayout {
            num_rings: value_t!(matches, "RINGS", usize)?,
            min_elevation_deg: value_t!(matches, "MIN_ELEVATION", f64)?,
            max_elevation_deg: value_t!(matches, "MAX_ELEVATION", f64)?,
        },
        plot_dir: matches.value_of("PLOT").map(PathBuf::from),
        realtime: matches.is_present("REALTIME"),
        save_config_file: matches.value_of("SAVE_CONFIG").map(PathBuf::from),
    })
}

fn log_outcome(index: usize, outcome: &SweepOutcome) {
    match outcome {
        SweepOutcome::Skipped(why) => warn!("Sweep {} skipped: {}", index, why),
        SweepOutcome::Initialized => info!("Sweep {} initialized the trajectory", index),
        SweepOutcome::Updated(report) | SweepOutcome::Fallback(report) => info!(
            "Sweep {} {:?}: {:?} after {} iterations, {}+{} correspondences, moved {:.3}m / {:.2}deg, took {:.1}ms",
            index,
            report.confidence(),
            report.status,
            report.iterations,
            report.edge_correspondences,
            report.planar_correspondences,
            report.increment.translation_norm(),
            report.increment.rotation_angle().to_degrees(),
            report.elapsed.as_secs_f64() * 1000.0
        ),
    }
}

/// Processes all sweeps one after another on the calling thread
fn run_sequential<I>(mut odometry: Odometry, sweeps: I) -> Result<Odometry>
where
    I: Iterator<Item = Result<SweepMessage>>,
{
    for (index, sweep) in sweeps.enumerate() {
        let outcome = odometry.process(sweep?);
        log_outcome(index, &outcome);
    }
    Ok(odometry)
}

/// Feeds the sweeps at the sweep period into a background worker, like a sensor driver would
fn run_realtime<I>(odometry: Odometry, sweeps: I, period: f64) -> Result<Odometry>
where
    I: Iterator<Item = Result<SweepMessage>>,
{
    let worker = OdometryWorker::spawn(odometry)?;
    let period = Duration::from_secs_f64(period);
    let mut offered = 0;
    for sweep in sweeps {
        let next_deadline = Instant::now() + period;
        match worker.offer(sweep?) {
            OfferResult::Accepted => {}
            OfferResult::Replaced => warn!("Worker is busy, replaced the pending sweep"),
            OfferResult::Dropped => warn!("Worker is busy, dropped sweep {}", offered),
        }
        offered += 1;

        let snapshot = worker.snapshot();
        if let Some(outcome) = snapshot.last_outcome.as_ref() {
            log_outcome(snapshot.sweeps_processed, outcome);
        }
        let now = Instant::now();
        if next_deadline > now {
            thread::sleep(next_deadline - now);
        }
    }

    let dropped = worker.snapshot().sweeps_dropped;
    let odometry = worker.shutdown()?;
    info!(
        "Offered {} sweeps, processed {}, dropped {}",
        offered,
        odometry.sweeps_processed(),
        dropped
    );
    Ok(odometry)
}

fn run<I>(odometry: Odometry, sweeps: I, args: &Args) -> Result<Odometry>
where
    I: Iterator<Item = Result<SweepMessage>>,
{
    if args.realtime {
        run_realtime(odometry, sweeps, args.period)
    } else {
        run_sequential(odometry, sweeps)
    }
}

/// Translation and rotation error of the final estimated pose, relative to the first true pose
fn report_drift(estimated: &[StampedPose], truth: &[StampedPose]) {
    let (first_truth, last_estimate) = match (truth.first(), estimated.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return,
    };
    let last_truth = match truth
        .iter()
        .find(|t| (t.timestamp - last_estimate.timestamp).abs() < 1e-9)
    {
        Some(t) => t,
        None => return,
    };
    let relative_truth = first_truth.pose.inverse().compose(&last_truth.pose);
    let error = relative_truth.inverse().compose(&last_estimate.pose);
    info!(
        "Final pose error against ground truth: {:.3}m / {:.2}deg over {:.3}m travelled",
        error.translation_norm(),
        error.rotation_angle().to_degrees(),
        relative_truth.translation_norm()
    );
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = get_args()?;
    args.layout.validate()?;

    let config = match args.config_file.as_ref() {
        Some(path) => load_config(path)?,
        None => OdometryConfig::default(),
    };
    if let Some(path) = args.save_config_file.as_ref() {
        save_config(path, &config)?;
        info!("Wrote configuration to {}", path.display());
    }

    let mut odometry = Odometry::new(config)?;
    if let Some(dir) = args.plot_dir.as_ref() {
        odometry = odometry.with_sink(Box::new(PlotSink::new(dir)?));
    }

    let t_start = Instant::now();
    let odometry = match &args.input {
        Input::Files(path) => {
            let sweeps = FileSweeps::open(
                path,
                args.times_file.as_deref(),
                args.period,
                args.layout,
            )?;
            info!("Processing {} sweeps from {}", sweeps.len(), path.display());
            run(odometry, sweeps, &args)?
        }
        Input::Simulation { sweeps, seed } => {
            info!("Processing {} simulated sweeps", sweeps);
            let mut simulation = SimulatedSweeps::new(*sweeps, args.period, *seed);
            let odometry = run(odometry, simulation.by_ref(), &args)?;
            report_drift(odometry.trajectory(), simulation.truth());
            odometry
        }
    };

    let trajectory = odometry.trajectory();
    info!(
        "Processed {} sweeps in {:.2}s",
        odometry.sweeps_processed(),
        t_start.elapsed().as_secs_f64()
    );
    if let Some(last) = trajectory.last() {
        let t = last.pose.translation;
        info!(
            "Final pose at {:.3}: translation ({:.3}, {:.3}, {:.3}), rotated by {:.2}deg",
            last.timestamp,
            t.x,
            t.y,
            t.z,
            last.pose.rotation_angle().to_degrees()
        );
    }

    if let Some(path) = args.output_file.as_ref() {
        write_trajectory(path, trajectory, args.format)?;
        info!("Wrote {} poses to {}", trajectory.len(), path.display());
    }

    Ok(())
}
