use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::info;
use sweep_core::config::OdometryConfig;

/// Parses an [OdometryConfig] from JSON. Missing sections and fields take their default values. The parsed
/// configuration is validated
/// ```
/// # use sweep_io::config::config_from_str;
/// let config = config_from_str(r#"{ "registration": { "association_rounds": 2 } }"#).unwrap();
/// assert_eq!(2, config.registration.association_rounds);
/// assert_eq!(16, config.organize.num_rings);
/// ```
pub fn config_from_str(json: &str) -> Result<OdometryConfig> {
    let config: OdometryConfig =
        serde_json::from_str(json).context("Could not parse odometry configuration")?;
    config.validate()?;
    Ok(config)
}

/// Reads an [OdometryConfig] from JSON, see [config_from_str]
pub fn read_config<R: Read>(read: R) -> Result<OdometryConfig> {
    let config: OdometryConfig =
        serde_json::from_reader(read).context("Could not parse odometry configuration")?;
    config.validate()?;
    Ok(config)
}

/// Loads an [OdometryConfig] from the JSON file at `path`, see [config_from_str]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<OdometryConfig> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Could not open config file {}", path.as_ref().display()))?;
    let config = read_config(BufReader::new(file))
        .with_context(|| format!("Invalid config file {}", path.as_ref().display()))?;
    info!("Loaded configuration from {}", path.as_ref().display());
    Ok(config)
}

/// Writes `config` as pretty-printed JSON
pub fn write_config<W: Write>(write: W, config: &OdometryConfig) -> Result<()> {
    serde_json::to_writer_pretty(write, config).context("Could not serialize odometry configuration")
}

/// Writes `config` as pretty-printed JSON into a new file at `path`
pub fn save_config<P: AsRef<Path>>(path: P, config: &OdometryConfig) -> Result<()> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("Could not create config file {}", path.as_ref().display()))?;
    let mut writer = BufWriter::new(file);
    write_config(&mut writer, config)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_core::config::{DeskewTarget, OverflowPolicy, RobustKernel};

    #[test]
    fn test_empty_object_gives_defaults() -> Result<()> {
        assert_eq!(OdometryConfig::default(), config_from_str("{}")?);
        Ok(())
    }

    #[test]
    fn test_enums_and_options() -> Result<()> {
        let json = r#"{
            "solver": { "robust_kernel": { "Tukey": { "c": 0.3 } }, "time_budget_ms": 50 },
            "deskew": { "target": "SweepStart" },
            "pipeline": { "overflow_policy": "DropIncoming" }
        }"#;
        let config = config_from_str(json)?;
        assert_eq!(RobustKernel::Tukey { c: 0.3 }, config.solver.robust_kernel);
        assert_eq!(Some(50), config.solver.time_budget_ms);
        assert_eq!(DeskewTarget::SweepStart, config.deskew.target);
        assert_eq!(OverflowPolicy::DropIncoming, config.pipeline.overflow_policy);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from_str(r#"{ "organize": { "num_rings": 0 } }"#).is_err());
        assert!(config_from_str(r#"{ "organize": { "num_rings": "many" } }"#).is_err());
        assert!(config_from_str("not json").is_err());
    }

    #[test]
    fn test_written_config_reads_back() -> Result<()> {
        let mut config = OdometryConfig::default();
        config.features.sectors = 8;
        config.solver.robust_kernel = RobustKernel::None;
        let mut bytes = Vec::<u8>::new();
        write_config(&mut bytes, &config)?;
        assert_eq!(config, read_config(bytes.as_slice())?);
        Ok(())
    }
}
