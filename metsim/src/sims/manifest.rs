//! Plain-text list of accepted simulations and the instrument draws used

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::camera::{CameraProfile, InstrumentParams};

pub const MANIFEST_HEADER: &str = "# File name, lim mag, lim mag length, length delay (s)";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// One accepted simulation
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Path of the saved container, relative to the manifest directory
    pub file: String,
    pub instrument: InstrumentParams,
}

/// `lm{mean lim mag}_mintime{t}s_good_files.txt` for a profile
pub fn manifest_file_name(profile: &CameraProfile) -> String {
    format!(
        "lm{:+04.1}_mintime{:.3}s_good_files.txt",
        profile.mean_lim_mag(),
        profile.min_track_time()
    )
}

pub fn write_manifest<W: Write>(mut writer: W, entries: &[ManifestEntry]) -> io::Result<()> {
    writeln!(writer, "{MANIFEST_HEADER}")?;
    for entry in entries {
        writeln!(
            writer,
            "{}, {:.8}, {:.8}, {:.8}",
            entry.file,
            entry.instrument.starting_lim_mag,
            entry.instrument.ending_lim_mag,
            entry.instrument.len_delay
        )?;
    }
    writer.flush()
}

pub fn save_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<(), ManifestError> {
    let file = File::create(path)?;
    write_manifest(BufWriter::new(file), entries)?;
    Ok(())
}

/// Parse manifest lines; blank lines and `#` comments are skipped
pub fn parse_manifest<R: BufRead>(reader: R) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parse_error = |reason: String| ManifestError::Parse {
            line: index + 1,
            reason,
        };

        // File names may contain commas; the numbers are always the last three fields
        let fields: Vec<&str> = trimmed.rsplitn(4, ',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(parse_error(format!(
                "expected 4 comma-separated fields, got {}",
                fields.len()
            )));
        }

        let number = |s: &str| {
            s.parse::<f64>()
                .map_err(|e| parse_error(format!("invalid number '{s}': {e}")))
        };

        entries.push(ManifestEntry {
            file: fields[3].to_string(),
            instrument: InstrumentParams {
                starting_lim_mag: number(fields[2])?,
                ending_lim_mag: number(fields[1])?,
                len_delay: number(fields[0])?,
            },
        });
    }

    Ok(entries)
}

pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    parse_manifest(BufReader::new(File::open(path)?))
}
