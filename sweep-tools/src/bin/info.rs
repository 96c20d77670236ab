#![warn(clippy::all)]

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{value_t, App, Arg};
use sweep_algorithms::{features::extract_features, ground::mark_ground, organize::organize};
use sweep_core::{config::OdometryConfig, message::SweepMessage, Point};
use sweep_io::{
    base::{GenericSweepReader, SweepReader},
    config::load_config,
};
use sweep_tools::sources::SensorLayout;

struct Args {
    pub input_file: PathBuf,
    pub detailed: bool,
    pub config_file: Option<PathBuf>,
    pub layout: SensorLayout,
}

fn get_args() -> Result<Args> {
    let matches = App::new("sweep info")
        .version("0.1")
        .author("Pascal Bormann <pascal.bormann@igd.fraunhofer.de>")
        .about("Prints information about the given sweep file")
        .arg(
            Arg::with_name("INPUT")
                .short("i")
                .takes_value(true)
                .value_name("INPUT")
                .help("Input sweep file")
                .required(true),
        )
        .arg(
            Arg::with_name("DETAILED")
                .short("d")
                .long("detailed")
                .help("Run ground marking and feature extraction on the sweep and report the results"),
        )
        .arg(
            Arg::with_name("CONFIG")
                .short("c")
                .long("config")
                .takes_value(true)
                .value_name("CONFIG")
                .help("JSON odometry configuration used for the detailed analysis"),
        )
        .arg(
            Arg::with_name("RINGS")
                .long("rings")
                .takes_value(true)
                .default_value("16")
                .help("Number of rings, used if the file stores no ring indices"),
        )
        .arg(
            Arg::with_name("MIN_ELEVATION")
                .long("min-elevation")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-15")
                .help("Elevation of the lowest ring in degrees, used if the file stores no ring indices"),
        )
        .arg(
            Arg::with_name("MAX_ELEVATION")
                .long("max-elevation")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("15")
                .help("Elevation of the highest ring in degrees, used if the file stores no ring indices"),
        )
        .get_matches();

    let input_file = PathBuf::from(
        matches
            .value_of("INPUT")
            .ok_or_else(|| anyhow!("Missing input file"))?,
    );
    let layout = SensorLayout {
        num_rings: value_t!(matches, "RINGS", usize)?,
        min_elevation_deg: value_t!(matches, "MIN_ELEVATION", f64)?,
        max_elevation_deg: value_t!(matches, "MAX_ELEVATION", f64)?,
    };
    layout.validate()?;

    Ok(Args {
        input_file,
        detailed: matches.is_present("DETAILED"),
        config_file: matches.value_of("CONFIG").map(PathBuf::from),
        layout,
    })
}

fn print_summary(points: &[Point]) {
    println!("\tPoints:                 {}", points.len());
    if points.is_empty() {
        return;
    }

    let mut rings = points.iter().map(|p| p.ring).collect::<Vec<_>>();
    rings.sort_unstable();
    rings.dedup();
    println!(
        "\tRings:                  {} ({}..={})",
        rings.len(),
        rings[0],
        rings[rings.len() - 1]
    );

    let (min_range, max_range) = points
        .iter()
        .map(|p| p.range())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), r| {
            (min.min(r), max.max(r))
        });
    println!("\tRange:                  {:.3}  {:.3}", min_range, max_range);

    let (min_time, max_time) = points
        .iter()
        .map(|p| p.rel_time)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), t| {
            (min.min(t), max.max(t))
        });
    println!("\tRelative time:          {:.4}  {:.4}", min_time, max_time);

    let non_finite = points.iter().filter(|p| !p.is_finite()).count();
    if non_finite > 0 {
        println!("\tNon-finite points:      {}", non_finite);
    }
}

fn analyze_sweep(points: Vec<Point>, config: &OdometryConfig) -> Result<()> {
    println!("Feature analysis");
    let message = SweepMessage::new(0.0, points);
    let scan = match organize(&message, &config.organize) {
        Ok(scan) => scan,
        Err(why) => {
            println!("\tSweep would be skipped: {}", why);
            return Ok(());
        }
    };
    println!("\tUsable points:          {}", scan.len());
    println!("\tNon-empty rings:        {}", scan.rings().len());

    let ground = mark_ground(&scan, &config.ground);
    println!("\tGround points:          {}", ground.count());

    let features = extract_features(&scan, &config.features, Some(&ground));
    println!(
        "\tEdge features:          {} (reference {})",
        features.edge.len(),
        features.reference_edge.len()
    );
    println!(
        "\tPlanar features:        {} (reference {})",
        features.planar.len(),
        features.reference_planar.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = get_args()?;

    let mut reader = GenericSweepReader::open_file(&args.input_file)?;
    let has_timing = reader.has_sensor_timing();
    let mut points = reader.read_points()?;
    println!("sweep info report for {}", args.input_file.display());
    if !has_timing {
        println!("\tFile stores no rings or relative times, reconstructing them from the sensor layout");
        args.layout.reconstruct_sensor_timing(&mut points);
    }
    print_summary(&points);

    if args.detailed {
        let config = match args.config_file.as_ref() {
            Some(path) => load_config(path)?,
            None => OdometryConfig::default(),
        };
        analyze_sweep(points, &config)?;
    }

    Ok(())
}
