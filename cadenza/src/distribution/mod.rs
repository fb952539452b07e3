/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Discrete probability distributions over a bounded integer support.
//!
//! Two value types model the two forms a timing distribution takes inside
//! the solver pipeline:
//!
//! * [`Pmf`], the probability mass function: the form distributions are loaded
//!   and resampled in.
//! * [`Cdf`], the cumulative distribution function: the form the transition
//!   matrix builder consumes.
//!
//! Both are dense vectors of `size` probabilities indexed by
//! `value + offset`, so a (rarely needed) negative support is representable.
//! They track `min`/`max` (the smallest and largest value carrying
//! non-negligible probability) and a numeric tolerance `epsilon` used by
//! every validity check.
//!
//! # Lifecycle
//! A `Pmf` is created by [`Pmf::load`] (file) or [`Pmf::from_entries`],
//! optionally coarsened with [`Pmf::resample`] to cap the size of the
//! matrices built from it, converted to a [`Cdf`] with [`Pmf::to_cdf`], and
//! from then on consumed read-only. The builder never mutates a
//! caller-owned distribution: resampling returns a freshly owned copy.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// Default tolerance for sum/monotonicity checks.
pub const DEFAULT_EPSILON: f64 = 1e-5;

/// Probabilities at or below this threshold do not move `min`/`max`.
const NEGLIGIBLE: f64 = 1e-10;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures raised by distribution construction, lookup and loading.
///
/// Every variant carries enough context (value, bounds, file, line) for the
/// caller to report the fault without re-deriving it.
#[derive(Debug, Error)]
pub enum DistributionError {
    /// A `set` targeted a value outside the backing vector.
    #[error("value {value} is outside the backing range (size {size}, offset {offset})")]
    ValueOutOfRange {
        value: i64,
        size: usize,
        offset: i64,
    },

    /// A cdf was queried before any point was set.
    #[error("lookup on an empty cdf: no point has been set")]
    EmptyCdf,

    /// The terminal cdf value is not within `epsilon` of 1, so extrapolating
    /// beyond `max` is meaningless.
    #[error("ill-formed cdf: terminal value {terminal} at {max} is not within {epsilon} of 1")]
    BadTerminal {
        terminal: f64,
        max: i64,
        epsilon: f64,
    },

    /// A cdf insertion or conversion violated monotonicity.
    #[error("ill-formed cdf: value {probability} at {value} breaks monotonicity")]
    NotMonotonic { value: i64, probability: f64 },

    /// A formed pmf failed its sum/negativity check.
    #[error("ill-formed pmf: {check:?} (sum = {sum})")]
    FailedCheck { check: PmfCheck, sum: f64 },

    /// The distribution file could not be opened or read.
    #[error("cannot read distribution file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the distribution file did not parse as `value probability`.
    #[error("malformed line {line} in distribution file {path}: {detail}")]
    Parse {
        path: PathBuf,
        line: usize,
        detail: String,
    },
}

/// Outcome of [`Pmf::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmfCheck {
    Ok,
    NegativeProbability,
    SumTooSmall,
    SumTooLarge,
}

/// Outcome of [`Cdf::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdfCheck {
    Ok,
    BadMax,
    BadMin,
    NonIncreasing,
}

// ── Pmf ───────────────────────────────────────────────────────────────────────

/// Probability mass function over a bounded integer support.
#[derive(Debug, Clone)]
pub struct Pmf {
    elems: Vec<f64>,
    offset: i64,
    min: i64,
    max: i64,
    epsilon: f64,
}

impl Pmf {
    /// Create an all-zero pmf able to hold values in
    /// `[-offset, size - offset)`.
    pub fn new(size: usize, offset: i64) -> Self {
        Self::with_epsilon(size, offset, DEFAULT_EPSILON)
    }

    /// Like [`Pmf::new`] with an explicit tolerance.
    pub fn with_epsilon(size: usize, offset: i64, epsilon: f64) -> Self {
        Self {
            elems: vec![0.0; size],
            offset,
            // min above max marks "no point set yet"; the first set() with
            // non-negligible mass collapses them onto the real support.
            min: size as i64 - offset,
            max: -offset,
            epsilon,
        }
    }

    /// Build a pmf from `(value, probability)` pairs, sized to fit them.
    ///
    /// # Errors
    /// Fails if the entry list is empty or the resulting pmf does not sum to
    /// 1 within tolerance.
    pub fn from_entries(entries: &[(i64, f64)]) -> Result<Self, DistributionError> {
        Self::from_entries_anchored(entries, 0)
    }

    fn from_entries_anchored(
        entries: &[(i64, f64)],
        anchor: i64,
    ) -> Result<Self, DistributionError> {
        let max_value = entries.iter().map(|&(v, _)| v + anchor).max().unwrap_or(0);
        let min_value = entries.iter().map(|&(v, _)| v + anchor).min().unwrap_or(0);
        let offset = if min_value < 0 { -min_value } else { 0 };
        let size = (max_value + offset) as usize + 1;
        let mut pmf = Pmf::new(size, offset);
        for &(value, probability) in entries {
            pmf.set(value + anchor, probability)?;
        }
        let check = pmf.check();
        if check != PmfCheck::Ok {
            return Err(DistributionError::FailedCheck {
                check,
                sum: pmf.sum(),
            });
        }
        Ok(pmf)
    }

    /// Load a pmf from a distribution file and validate it.
    ///
    /// File format: whitespace-separated `value probability` pairs, one per
    /// line; `#` starts a comment; a blank line or EOF terminates; a first
    /// non-comment line holding a single integer supplies an anchor offset
    /// added to every subsequent value.
    ///
    /// # Errors
    /// Malformed lines are fatal, with filename and line context; so is a
    /// pmf that fails its [`check`](Self::check) once loaded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DistributionError> {
        let (entries, anchor) = read_distribution_file(path.as_ref())?;
        Self::from_entries_anchored(&entries, anchor)
    }

    /// Smallest value with non-negligible probability.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Largest value with non-negligible probability.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Size of the backing vector.
    pub fn size(&self) -> usize {
        self.elems.len()
    }

    /// Index offset applied to stored values.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Numeric tolerance used by validity checks.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Store a point mass.
    ///
    /// `min`/`max` move only when `probability` is non-negligible, so
    /// writing explicit zeros does not widen the support.
    ///
    /// # Errors
    /// A value outside the backing range is a fatal input error.
    pub fn set(&mut self, value: i64, probability: f64) -> Result<(), DistributionError> {
        let index = value + self.offset;
        if index < 0 || index >= self.elems.len() as i64 {
            return Err(DistributionError::ValueOutOfRange {
                value,
                size: self.elems.len(),
                offset: self.offset,
            });
        }
        if probability > NEGLIGIBLE {
            if value > self.max {
                self.max = value;
            }
            if value < self.min {
                self.min = value;
            }
        }
        self.elems[index as usize] = probability;
        Ok(())
    }

    /// Probability mass at `value`; 0 outside `[min, max]`.
    pub fn get(&self, value: i64) -> f64 {
        if value < self.min || value > self.max {
            return 0.0;
        }
        self.elems[(value + self.offset) as usize]
    }

    /// Total stored probability.
    pub fn sum(&self) -> f64 {
        self.elems.iter().sum()
    }

    /// Classify the pmf as valid or name the anomaly.
    pub fn check(&self) -> PmfCheck {
        for value in self.min..=self.max {
            if self.get(value) < -self.epsilon {
                return PmfCheck::NegativeProbability;
            }
        }
        let sum = self.sum();
        if sum < 1.0 - self.epsilon {
            return PmfCheck::SumTooSmall;
        }
        if sum > 1.0 + self.epsilon {
            return PmfCheck::SumTooLarge;
        }
        PmfCheck::Ok
    }

    /// Mean of the distribution.
    pub fn avg(&self) -> f64 {
        self.elems
            .iter()
            .enumerate()
            .map(|(i, p)| (i as i64 - self.offset) as f64 * p)
            .sum()
    }

    /// Variance of the distribution.
    pub fn var(&self) -> f64 {
        let avg = self.avg();
        self.elems
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let d = (i as i64 - self.offset) as f64 - avg;
                d * d * p
            })
            .sum()
    }

    /// Standard deviation of the distribution.
    pub fn std(&self) -> f64 {
        self.var().sqrt()
    }

    /// Block-aggregate onto a coarser grid of stride `q`.
    ///
    /// Each run of `q` consecutive atoms ending at a multiple of `q` maps to
    /// one coarse atom, which rounds the distribution towards larger values
    /// (one-sided conservatism). `resample(1)` is the identity.
    pub fn resample(&self, q: u32) -> Result<Pmf, DistributionError> {
        if q <= 1 {
            return Ok(self.clone());
        }
        let q = q as i64;
        let mut coarse = Pmf::with_epsilon(self.elems.len(), self.offset / q, self.epsilon);
        let mut acc = 0.0;
        let mut value = self.min;
        let top = (self.max / q) * q + q;
        while value <= top {
            acc += self.get(value);
            if value % q == 0 {
                coarse.set(value / q, acc)?;
                acc = 0.0;
            }
            value += 1;
        }
        Ok(coarse)
    }

    /// Convert to a cdf by prefix sums.
    ///
    /// A terminal value that undershoots 1 (a truncated tail) is clamped to
    /// 1 with a warning; any other malformation of the result is an error.
    pub fn to_cdf(&self) -> Result<Cdf, DistributionError> {
        let mut cdf = Cdf::with_epsilon(self.elems.len(), self.offset, self.epsilon);
        let mut sum = 0.0;
        for value in self.min..=self.max {
            sum += self.get(value);
            cdf.set(value, sum)?;
        }
        let terminal = cdf.get(cdf.max())?;
        if terminal < 1.0 - cdf.epsilon {
            warn!(
                terminal,
                "pmf does not sum to 1, clamping terminal cdf value"
            );
            cdf.set(cdf.max(), 1.0)?;
        }
        match cdf.check()? {
            CdfCheck::Ok => Ok(cdf),
            CdfCheck::NonIncreasing => Err(DistributionError::NotMonotonic {
                value: cdf.max(),
                probability: terminal,
            }),
            CdfCheck::BadMax => Err(DistributionError::BadTerminal {
                terminal,
                max: cdf.max(),
                epsilon: cdf.epsilon,
            }),
            CdfCheck::BadMin => Err(DistributionError::NotMonotonic {
                value: cdf.min(),
                probability: cdf.get(cdf.min())?,
            }),
        }
    }
}

// ── Cdf ───────────────────────────────────────────────────────────────────────

/// Cumulative distribution function over a bounded integer support.
///
/// Invariants: non-decreasing, 0 below `min`, 1 at `max` (within
/// `epsilon`). A malformed cdf corrupts every transition-matrix entry
/// derived from it, so anomalies here are hard errors rather than the
/// warnings a pmf gets.
#[derive(Debug, Clone)]
pub struct Cdf {
    elems: Vec<f64>,
    offset: i64,
    min: i64,
    max: i64,
    epsilon: f64,
    empty: bool,
}

impl Cdf {
    /// Create an empty cdf able to hold values in `[-offset, size - offset)`.
    pub fn new(size: usize, offset: i64) -> Self {
        Self::with_epsilon(size, offset, DEFAULT_EPSILON)
    }

    /// Like [`Cdf::new`] with an explicit tolerance.
    pub fn with_epsilon(size: usize, offset: i64, epsilon: f64) -> Self {
        Self {
            elems: vec![0.0; size],
            offset,
            min: size as i64 - offset,
            max: -offset,
            epsilon,
            empty: true,
        }
    }

    /// Load a cdf from a distribution file (same format as [`Pmf::load`]).
    ///
    /// # Errors
    /// Any check anomaly is fatal here, unlike the pmf loader.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DistributionError> {
        let (entries, anchor) = read_distribution_file(path.as_ref())?;
        let max_value = entries.iter().map(|&(v, _)| v + anchor).max().unwrap_or(0);
        let min_value = entries.iter().map(|&(v, _)| v + anchor).min().unwrap_or(0);
        let offset = if min_value < 0 { -min_value } else { 0 };
        let size = (max_value + offset) as usize + 1;
        let mut cdf = Cdf::new(size, offset);
        for &(value, probability) in &entries {
            cdf.set(value + anchor, probability)?;
        }
        match cdf.check()? {
            CdfCheck::Ok => Ok(cdf),
            CdfCheck::NonIncreasing | CdfCheck::BadMin => Err(DistributionError::NotMonotonic {
                value: cdf.min(),
                probability: cdf.get(cdf.min())?,
            }),
            CdfCheck::BadMax => Err(DistributionError::BadTerminal {
                terminal: cdf.elems[(cdf.max + cdf.offset) as usize],
                max: cdf.max,
                epsilon: cdf.epsilon,
            }),
        }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn size(&self) -> usize {
        self.elems.len()
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Store a cumulative value, keeping the cdf monotone.
    ///
    /// # Errors
    /// Out-of-range values and insertions that would break monotonicity at
    /// the current `min`/`max` are fatal.
    pub fn set(&mut self, value: i64, probability: f64) -> Result<(), DistributionError> {
        let index = value + self.offset;
        if index < 0 || index >= self.elems.len() as i64 {
            return Err(DistributionError::ValueOutOfRange {
                value,
                size: self.elems.len(),
                offset: self.offset,
            });
        }
        if value > self.max {
            if !self.empty && self.elems[(self.max + self.offset) as usize] > probability {
                return Err(DistributionError::NotMonotonic { value, probability });
            }
            self.max = value;
        }
        if value < self.min {
            if !self.empty && self.elems[(self.min + self.offset) as usize] < probability {
                return Err(DistributionError::NotMonotonic { value, probability });
            }
            self.min = value;
        }
        self.empty = false;
        self.elems[index as usize] = probability;
        Ok(())
    }

    /// Cumulative probability at `value`.
    ///
    /// Extrapolates to 1 above `max` when the stored terminal value is
    /// within `epsilon` of 1, and to 0 below `min`.
    ///
    /// # Errors
    /// Querying an empty cdf, or extrapolating above the `max` of a cdf
    /// whose terminal value is short of 1.
    pub fn get(&self, value: i64) -> Result<f64, DistributionError> {
        if self.empty {
            return Err(DistributionError::EmptyCdf);
        }
        if value > self.max {
            let terminal = self.elems[(self.max + self.offset) as usize];
            if terminal > 1.0 - self.epsilon {
                return Ok(1.0);
            }
            return Err(DistributionError::BadTerminal {
                terminal,
                max: self.max,
                epsilon: self.epsilon,
            });
        }
        if value < self.min {
            return Ok(0.0);
        }
        Ok(self.elems[(value + self.offset) as usize])
    }

    /// Classify the cdf as valid or name the anomaly.
    ///
    /// # Errors
    /// Checking an empty cdf is itself an error.
    pub fn check(&self) -> Result<CdfCheck, DistributionError> {
        if self.empty {
            return Err(DistributionError::EmptyCdf);
        }
        let terminal = self.elems[(self.max + self.offset) as usize];
        if terminal > 1.0 + self.epsilon || terminal < 1.0 - self.epsilon {
            return Ok(CdfCheck::BadMax);
        }
        let below_min = self.min + self.offset - 1;
        if below_min >= 0 && self.elems[below_min as usize] > self.epsilon {
            return Ok(CdfCheck::BadMin);
        }
        for value in self.min + 1..=self.max {
            if self.get(value - 1)? > self.get(value)? {
                return Ok(CdfCheck::NonIncreasing);
            }
        }
        Ok(CdfCheck::Ok)
    }

    /// Convert back to a pmf by first differences.
    ///
    /// The result is checked; anomalies are reported as warnings since they
    /// reflect tolerable numeric noise already present in the cdf.
    pub fn to_pmf(&self) -> Result<Pmf, DistributionError> {
        let mut pmf = Pmf::with_epsilon(self.elems.len(), self.offset, self.epsilon);
        let mut previous = 0.0;
        for value in self.min..=self.max {
            let current = self.get(value)?;
            pmf.set(value, current - previous)?;
            previous = current;
        }
        let check = pmf.check();
        if check != PmfCheck::Ok {
            warn!(?check, sum = pmf.sum(), "pmf derived from cdf fails check");
        }
        Ok(pmf)
    }
}

// ── File loader ───────────────────────────────────────────────────────────────

/// Read `(value, probability)` pairs from a distribution file.
///
/// Returns the pairs and the anchor offset (0 unless the first non-comment
/// line held a single integer).
fn read_distribution_file(path: &Path) -> Result<(Vec<(i64, f64)>, i64), DistributionError> {
    let file = File::open(path).map_err(|source| DistributionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut anchor = 0i64;
    let mut first_data_line = true;

    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line.map_err(|source| DistributionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            if line.trim().is_empty() && !entries.is_empty() {
                // blank line terminates the data section
                break;
            }
            continue;
        }

        let tokens: Vec<&str> = content.split_whitespace().collect();
        match tokens.as_slice() {
            [single] if first_data_line => {
                anchor = single
                    .parse::<i64>()
                    .map_err(|e| DistributionError::Parse {
                        path: path.to_path_buf(),
                        line: number,
                        detail: format!("anchor point '{single}' is not an integer: {e}"),
                    })?;
            }
            [value, probability] => {
                let value = value.parse::<i64>().map_err(|e| DistributionError::Parse {
                    path: path.to_path_buf(),
                    line: number,
                    detail: format!("value '{value}' is not an integer: {e}"),
                })?;
                let probability =
                    probability
                        .parse::<f64>()
                        .map_err(|e| DistributionError::Parse {
                            path: path.to_path_buf(),
                            line: number,
                            detail: format!("probability '{probability}' is not a number: {e}"),
                        })?;
                entries.push((value, probability));
            }
            _ => {
                return Err(DistributionError::Parse {
                    path: path.to_path_buf(),
                    line: number,
                    detail: format!("expected 'value probability', got '{content}'"),
                });
            }
        }
        first_data_line = false;
    }

    if entries.is_empty() {
        return Err(DistributionError::Parse {
            path: path.to_path_buf(),
            line: 0,
            detail: "file holds no distribution points".to_string(),
        });
    }

    Ok((entries, anchor))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn two_point() -> Pmf {
        Pmf::from_entries(&[(10, 0.5), (40, 0.5)]).unwrap()
    }

    // ── Pmf basics ────────────────────────────────────────────────────────────

    #[test]
    fn set_and_get_round_trip() {
        let pmf = two_point();
        assert_eq!(pmf.get(10), 0.5);
        assert_eq!(pmf.get(40), 0.5);
        assert_eq!(pmf.get(25), 0.0);
    }

    #[test]
    fn min_max_track_non_negligible_mass_only() {
        let mut pmf = Pmf::new(100, 0);
        pmf.set(50, 0.0).unwrap();
        // an explicit zero must not widen the support
        assert!(pmf.min() > pmf.max());
        pmf.set(10, 0.4).unwrap();
        pmf.set(20, 0.6).unwrap();
        assert_eq!(pmf.min(), 10);
        assert_eq!(pmf.max(), 20);
    }

    #[test]
    fn set_out_of_range_is_fatal() {
        let mut pmf = Pmf::new(10, 0);
        let err = pmf.set(10, 0.5).unwrap_err();
        assert!(matches!(err, DistributionError::ValueOutOfRange { .. }));
        assert!(pmf.set(-1, 0.5).is_err());
    }

    #[test]
    fn negative_offset_supports_negative_values() {
        let mut pmf = Pmf::new(10, 5);
        pmf.set(-5, 0.5).unwrap();
        pmf.set(4, 0.5).unwrap();
        assert_eq!(pmf.min(), -5);
        assert_eq!(pmf.get(-5), 0.5);
    }

    #[test]
    fn check_classifies_anomalies() {
        let mut pmf = Pmf::new(10, 0);
        pmf.set(1, 0.5).unwrap();
        assert_eq!(pmf.check(), PmfCheck::SumTooSmall);
        pmf.set(2, 0.7).unwrap();
        assert_eq!(pmf.check(), PmfCheck::SumTooLarge);
        pmf.set(2, 0.5).unwrap();
        assert_eq!(pmf.check(), PmfCheck::Ok);
    }

    #[test]
    fn moments_of_two_point_distribution() {
        let pmf = two_point();
        assert!((pmf.avg() - 25.0).abs() < 1e-12);
        assert!((pmf.var() - 225.0).abs() < 1e-9);
        assert!((pmf.std() - 15.0).abs() < 1e-9);
    }

    // ── Resampling ────────────────────────────────────────────────────────────

    #[test]
    fn resample_stride_one_is_identity() {
        let pmf = two_point();
        let same = pmf.resample(1).unwrap();
        assert_eq!(same.min(), pmf.min());
        assert_eq!(same.max(), pmf.max());
        for v in pmf.min()..=pmf.max() {
            assert_eq!(same.get(v), pmf.get(v));
        }
    }

    #[test]
    fn resample_aggregates_blocks_conservatively() {
        // uniform over 1..=10, stride 5: block (1..=5) → 5/10, block (6..=10) → 5/10
        let entries: Vec<(i64, f64)> = (1..=10).map(|v| (v, 0.1)).collect();
        let pmf = Pmf::from_entries(&entries).unwrap();
        let coarse = pmf.resample(5).unwrap();
        assert!((coarse.get(1) - 0.5).abs() < 1e-12);
        assert!((coarse.get(2) - 0.5).abs() < 1e-12);
        assert!((coarse.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn resample_preserves_total_mass() {
        let pmf = two_point();
        let coarse = pmf.resample(3).unwrap();
        assert!((coarse.sum() - 1.0).abs() < 1e-12);
        // 10 → ceil grid: mass lands at 12/3 = 4; 40 lands at 42/3 = 14
        assert!((coarse.get(4) - 0.5).abs() < 1e-12);
        assert!((coarse.get(14) - 0.5).abs() < 1e-12);
    }

    // ── Conversions ───────────────────────────────────────────────────────────

    #[test]
    fn pmf_cdf_pmf_round_trips() {
        let pmf = two_point();
        let cdf = pmf.to_cdf().unwrap();
        let back = cdf.to_pmf().unwrap();
        for v in pmf.min()..=pmf.max() {
            assert!(
                (back.get(v) - pmf.get(v)).abs() < DEFAULT_EPSILON,
                "mismatch at {v}"
            );
        }
    }

    #[test]
    fn cdf_terminal_value_is_one() {
        let cdf = two_point().to_cdf().unwrap();
        assert!((cdf.get(cdf.max()).unwrap() - 1.0).abs() < DEFAULT_EPSILON);
    }

    #[test]
    fn cdf_extrapolates_beyond_support() {
        let cdf = two_point().to_cdf().unwrap();
        assert_eq!(cdf.get(1000).unwrap(), 1.0);
        assert_eq!(cdf.get(5).unwrap(), 0.0);
        assert_eq!(cdf.get(-3).unwrap(), 0.0);
    }

    #[test]
    fn cdf_with_truncated_tail_is_clamped() {
        // sums to 0.999, one epsilon short of 1 at default tolerance 1e-5
        let pmf = Pmf::from_entries(&[(1, 0.5), (2, 0.499)], );
        // loader rejects it as a pmf, so build by hand
        assert!(pmf.is_err());
        let mut raw = Pmf::new(4, 0);
        raw.set(1, 0.5).unwrap();
        raw.set(2, 0.499).unwrap();
        let cdf = raw.to_cdf().unwrap();
        assert_eq!(cdf.get(2).unwrap(), 1.0);
    }

    #[test]
    fn empty_cdf_lookup_is_an_error() {
        let cdf = Cdf::new(10, 0);
        assert!(matches!(cdf.get(3), Err(DistributionError::EmptyCdf)));
        assert!(matches!(cdf.check(), Err(DistributionError::EmptyCdf)));
    }

    #[test]
    fn cdf_set_rejects_non_monotone_insertions() {
        let mut cdf = Cdf::new(10, 0);
        cdf.set(2, 0.5).unwrap();
        let err = cdf.set(5, 0.3).unwrap_err();
        assert!(matches!(err, DistributionError::NotMonotonic { .. }));
    }

    // ── File loading ──────────────────────────────────────────────────────────

    fn distribution_file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn load_two_point_file() {
        let f = distribution_file("10 0.5\n40 0.5\n");
        let pmf = Pmf::load(f.path()).unwrap();
        assert_eq!(pmf.get(10), 0.5);
        assert_eq!(pmf.get(40), 0.5);
    }

    #[test]
    fn load_skips_comments_and_stops_at_blank_line() {
        let f = distribution_file("# computation time\n10 0.5\n40 0.5\n\n99 1.0\n");
        let pmf = Pmf::load(f.path()).unwrap();
        assert_eq!(pmf.get(99), 0.0);
        assert_eq!(pmf.max(), 40);
    }

    #[test]
    fn load_honours_anchor_line() {
        // anchor 100 shifts both values
        let f = distribution_file("100\n0 0.5\n10 0.5\n");
        let pmf = Pmf::load(f.path()).unwrap();
        assert_eq!(pmf.get(100), 0.5);
        assert_eq!(pmf.get(110), 0.5);
    }

    #[test]
    fn load_malformed_line_reports_position() {
        let f = distribution_file("10 0.5\nnot-a-number 0.5\n");
        let err = Pmf::load(f.path()).unwrap_err();
        match err {
            DistributionError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn load_rejects_pmf_not_summing_to_one() {
        let f = distribution_file("10 0.5\n40 0.3\n");
        let err = Pmf::load(f.path()).unwrap_err();
        assert!(matches!(err, DistributionError::FailedCheck { .. }));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Pmf::load("/nonexistent/dist.txt").unwrap_err();
        assert!(matches!(err, DistributionError::Io { .. }));
    }
}
