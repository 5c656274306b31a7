use std::path::Path;

use log::{debug, warn};

use crate::error::VisError;
use crate::model::RigidBodyModel;

/// Time-stamped joint configurations. Row `i` holds `q` at `times[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Column names after the time column, when the file declares them.
    pub columns: Vec<String>,
    pub times: Vec<f64>,
    pub frames: Vec<Vec<f64>>,
}

enum Section {
    Header,
    Columns,
    Data,
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl AnimationClip {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VisError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VisError::new("animation-read")
                .with_arg("path", path.display())
                .push_std(e)
        })?;
        let mut clip = Self::parse(&text).map_err(|e| e.with_arg("path", path.display()))?;
        clip.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(
            "animation '{}': {} frames, {} dofs, {:.3}s",
            clip.name,
            clip.frames.len(),
            clip.dof_count(),
            clip.duration()
        );
        Ok(clip)
    }

    /// Reads `COLUMNS:` / `DATA:` sections, or bare rows of numbers.
    pub fn parse(text: &str) -> Result<Self, VisError> {
        let mut clip = Self::default();
        let mut section = Section::Header;
        let mut header_columns: Vec<String> = Vec::new();
        let mut width: Option<usize> = None;

        for (n, raw) in text.lines().enumerate() {
            let line_no = n + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let upper = line.to_ascii_uppercase();
            if upper.starts_with("COLUMNS:") {
                section = Section::Columns;
                header_columns.extend(split_fields(&line["COLUMNS:".len()..]).map(str::to_string));
                continue;
            }
            if upper.starts_with("DATA:") {
                section = Section::Data;
                continue;
            }

            match section {
                Section::Columns => {
                    header_columns.extend(split_fields(line).map(str::to_string));
                }
                Section::Header | Section::Data => {
                    let row = split_fields(line)
                        .map(|field| {
                            field.parse::<f64>().map_err(|_| {
                                VisError::new("animation-bad-value")
                                    .with_arg("line", line_no)
                                    .with_arg("value", field)
                            })
                        })
                        .collect::<Result<Vec<f64>, VisError>>()?;
                    if row.is_empty() {
                        continue;
                    }
                    match width {
                        None => width = Some(row.len()),
                        Some(w) if w != row.len() => {
                            return Err(VisError::new("animation-ragged-row")
                                .with_arg("line", line_no)
                                .with_arg("expected", w)
                                .with_arg("got", row.len()));
                        }
                        Some(_) => {}
                    }
                    let time = row[0];
                    if clip.times.last().is_some_and(|&prev| time < prev) {
                        return Err(VisError::new("animation-time-decreasing")
                            .with_arg("line", line_no)
                            .with_arg("time", time));
                    }
                    clip.times.push(time);
                    clip.frames.push(row[1..].to_vec());
                }
            }
        }

        if clip.times.is_empty() {
            return Err(VisError::new("animation-empty"));
        }
        if !header_columns.is_empty() {
            let first = header_columns.remove(0);
            if !first.eq_ignore_ascii_case("time") {
                warn!("first animation column is '{first}', treating it as time");
            }
            if header_columns.len() != clip.dof_count() {
                warn!(
                    "animation declares {} columns but rows carry {} values",
                    header_columns.len(),
                    clip.dof_count()
                );
            }
            clip.columns = header_columns;
        }
        Ok(clip)
    }

    pub fn dof_count(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    pub fn start_time(&self) -> f64 {
        self.times.first().copied().unwrap_or(0.0)
    }

    /// Time of the last row. Playback runs from 0 to here.
    pub fn duration(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Configuration at time `t`, clamped to the first and last rows and
    /// linearly interpolated in between.
    pub fn sample(&self, t: f64) -> Vec<f64> {
        let Some(last) = self.times.len().checked_sub(1) else {
            return Vec::new();
        };
        if t <= self.times[0] {
            return self.frames[0].clone();
        }
        if t >= self.times[last] {
            return self.frames[last].clone();
        }
        let upper = self.times.partition_point(|&time| time <= t);
        let lower = upper - 1;
        let span = self.times[upper] - self.times[lower];
        let alpha = if span > 0.0 {
            (t - self.times[lower]) / span
        } else {
            0.0
        };
        self.frames[lower]
            .iter()
            .zip(&self.frames[upper])
            .map(|(a, b)| a + (b - a) * alpha)
            .collect()
    }

    pub fn check_compatible(&self, model: &RigidBodyModel) -> Result<(), VisError> {
        if self.dof_count() != model.q_size() {
            return Err(VisError::new("animation-model-mismatch")
                .with_arg("animation_dofs", self.dof_count())
                .with_arg("model_dofs", model.q_size()));
        }
        Ok(())
    }
}
