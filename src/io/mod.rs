use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::config::NUM_DIMENSIONS;
use crate::dimension::component;
use crate::dimension::from_fn;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::particle::SphParticle;

/// The particle arrays a snapshot carries; the engine neither knows nor
/// cares how a format lays them out on disk.
#[derive(Clone, Debug, Default)]
pub struct SnapshotData {
    pub time: f64,
    pub positions: Vec<MVec>,
    pub velocities: Vec<MVec>,
    pub masses: Vec<f64>,
    pub smoothing_lengths: Vec<f64>,
    pub internal_energies: Vec<f64>,
}

impl SnapshotData {
    pub fn from_particles(time: f64, particles: &[SphParticle]) -> Self {
        let real = particles.iter().filter(|p| p.is_real());
        let mut data = Self {
            time,
            ..Default::default()
        };
        for particle in real {
            data.positions.push(particle.pos);
            data.velocities.push(particle.vel);
            data.masses.push(particle.mass);
            data.smoothing_lengths.push(particle.h);
            data.internal_energies.push(particle.internal_energy);
        }
        data
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn to_particles(&self) -> Vec<SphParticle> {
        use crate::particle::ParticleId;
        (0..self.len())
            .map(|index| {
                let mut particle = SphParticle::new(
                    ParticleId(index as u64),
                    self.positions[index],
                    self.velocities[index],
                    self.masses[index],
                    self.internal_energies[index],
                );
                particle.h = self.smoothing_lengths[index];
                particle
            })
            .collect()
    }
}

pub trait SnapshotFormat: Send + Sync {
    fn write(&self, path: &Path, data: &SnapshotData) -> Result<()>;
    fn read(&self, path: &Path) -> Result<SnapshotData>;
    fn extension(&self) -> &'static str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormatChoice {
    #[default]
    Column,
}

pub fn build_format(choice: SnapshotFormatChoice) -> Box<dyn SnapshotFormat> {
    match choice {
        SnapshotFormatChoice::Column => Box::new(ColumnFormat),
    }
}

/// The `output:` parameter section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputParameters {
    /// Physical time between snapshots; none disables output.
    #[serde(default)]
    pub snapshot_every: Option<f64>,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: SnapshotFormatChoice,
}

fn default_directory() -> PathBuf {
    "output".into()
}

impl Default for OutputParameters {
    fn default() -> Self {
        Self {
            snapshot_every: None,
            directory: default_directory(),
            format: SnapshotFormatChoice::default(),
        }
    }
}

/// Whitespace separated columns (positions, velocities, mass, h, u),
/// one particle per line, with the time in a comment header.
pub struct ColumnFormat;

impl SnapshotFormat for ColumnFormat {
    fn write(&self, path: &Path, data: &SnapshotData) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        writeln!(file, "# time = {:.16e}", data.time)?;
        for index in 0..data.len() {
            for axis in 0..NUM_DIMENSIONS {
                write!(file, "{:.16e} ", component(&data.positions[index], axis))?;
            }
            for axis in 0..NUM_DIMENSIONS {
                write!(file, "{:.16e} ", component(&data.velocities[index], axis))?;
            }
            writeln!(
                file,
                "{:.16e} {:.16e} {:.16e}",
                data.masses[index], data.smoothing_lengths[index], data.internal_energies[index]
            )?;
        }
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<SnapshotData> {
        let contents = fs::read_to_string(path)?;
        let mut data = SnapshotData::default();
        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("# time =") {
                data.time = rest
                    .trim()
                    .parse()
                    .map_err(|e| Error::config(format!("bad snapshot time: {e}")))?;
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            let values: Vec<f64> = line
                .split_whitespace()
                .map(|token| {
                    token
                        .parse()
                        .map_err(|e| Error::config(format!("bad snapshot value: {e}")))
                })
                .collect::<Result<_>>()?;
            let expected = 2 * NUM_DIMENSIONS + 3;
            if values.len() != expected {
                return Err(Error::config(format!(
                    "snapshot line has {} columns, expected {expected}",
                    values.len()
                )));
            }
            data.positions.push(from_fn(|axis| values[axis]));
            data.velocities
                .push(from_fn(|axis| values[NUM_DIMENSIONS + axis]));
            data.masses.push(values[2 * NUM_DIMENSIONS]);
            data.smoothing_lengths.push(values[2 * NUM_DIMENSIONS + 1]);
            data.internal_energies.push(values[2 * NUM_DIMENSIONS + 2]);
        }
        Ok(data)
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}
