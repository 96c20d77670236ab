use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use sweep_core::Point;

use crate::{ascii::AsciiSweepReader, kitti::KittiSweepReader};

use super::SweepReader;

/// Column format that [GenericSweepReader] assumes for ASCII files
pub const DEFAULT_ASCII_FORMAT: &str = "xyzirt";
/// Column delimiter that [GenericSweepReader] assumes for ASCII files
pub const DEFAULT_ASCII_DELIMITER: &str = " ";

#[derive(Debug)]
enum SupportedFileExtensions {
    Ascii,
    Kitti,
}

/// Returns a lookup value for the file extension of the given file path
fn get_extension_lookup(path: &Path) -> Result<Option<SupportedFileExtensions>> {
    let extension = match path.extension() {
        Some(ex) => ex,
        None => return Ok(None),
    };
    let extension_str = extension.to_str().ok_or_else(|| {
        anyhow!(
            "File extension of path {} is no valid Unicode string",
            path.display()
        )
    })?;
    match extension_str.to_lowercase().as_str() {
        "txt" | "xyz" | "asc" | "csv" => Ok(Some(SupportedFileExtensions::Ascii)),
        "bin" => Ok(Some(SupportedFileExtensions::Kitti)),
        _ => Ok(None),
    }
}

/// Reads a sweep file in any supported format, chosen by file extension
pub enum GenericSweepReader {
    Ascii(AsciiSweepReader<BufReader<File>>),
    Kitti(KittiSweepReader<BufReader<File>>),
}

impl GenericSweepReader {
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let extension = get_extension_lookup(path.as_ref())?;
        match extension {
            Some(SupportedFileExtensions::Ascii) => {
                let reader = AsciiSweepReader::from_path(
                    path,
                    DEFAULT_ASCII_FORMAT,
                    DEFAULT_ASCII_DELIMITER,
                )?;
                Ok(Self::Ascii(reader))
            }
            Some(SupportedFileExtensions::Kitti) => {
                let reader = KittiSweepReader::from_path(path)?;
                Ok(Self::Kitti(reader))
            }
            None => bail!(
                "Unsupported file format of file {}",
                path.as_ref().display()
            ),
        }
    }

    /// Checks whether the given `path` has the extension of a supported sweep file. `Err` is returned only if the
    /// extension can't be read
    pub fn is_supported_file<P: AsRef<Path>>(path: P) -> Result<bool> {
        Ok(get_extension_lookup(path.as_ref())?.is_some())
    }

    /// Whether the file carries ring indices and relative times, or only positions and intensities
    pub fn has_sensor_timing(&self) -> bool {
        match self {
            GenericSweepReader::Ascii(reader) => reader.has_rings() && reader.has_relative_times(),
            GenericSweepReader::Kitti(_) => false,
        }
    }
}

impl SweepReader for GenericSweepReader {
    fn read_points(&mut self) -> Result<Vec<Point>> {
        match self {
            GenericSweepReader::Ascii(reader) => reader.read_points(),
            GenericSweepReader::Kitti(reader) => reader.read_points(),
        }
    }
}

/// All supported sweep files in `dir`, sorted by file name
pub fn list_sweep_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = vec![];
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Could not read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && GenericSweepReader::is_supported_file(&path)? {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() -> Result<()> {
        assert!(GenericSweepReader::is_supported_file("000000.bin")?);
        assert!(GenericSweepReader::is_supported_file("sweep.TXT")?);
        assert!(GenericSweepReader::is_supported_file("sweep.xyz")?);
        assert!(!GenericSweepReader::is_supported_file("sweep.las")?);
        assert!(!GenericSweepReader::is_supported_file("sweep")?);
        Ok(())
    }

    #[test]
    fn test_open_unsupported_file_fails() {
        assert!(GenericSweepReader::open_file("sweep.las").is_err());
    }
}
