//! Notated duration values and decomposition of tick lengths into them.

use serde::{Deserialize, Serialize};

/// Legal note/rest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationType {
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    #[serde(rename = "16th")]
    D16th,
    #[serde(rename = "32nd")]
    D32nd,
    #[serde(rename = "64th")]
    D64th,
    #[serde(rename = "128th")]
    D128th,
    #[serde(rename = "256th")]
    D256th,
    /// Whole-measure rest; length is whatever the measure holds
    Measure,
}

impl DurationType {
    /// Value types from longest to shortest (excludes `Measure`).
    pub const VALUES: [DurationType; 11] = [
        DurationType::Long,
        DurationType::Breve,
        DurationType::Whole,
        DurationType::Half,
        DurationType::Quarter,
        DurationType::Eighth,
        DurationType::D16th,
        DurationType::D32nd,
        DurationType::D64th,
        DurationType::D128th,
        DurationType::D256th,
    ];

    /// Length as a fraction of a quarter note: (numerator, denominator).
    fn quarters(&self) -> Option<(u64, u64)> {
        Some(match self {
            Self::Long => (16, 1),
            Self::Breve => (8, 1),
            Self::Whole => (4, 1),
            Self::Half => (2, 1),
            Self::Quarter => (1, 1),
            Self::Eighth => (1, 2),
            Self::D16th => (1, 4),
            Self::D32nd => (1, 8),
            Self::D64th => (1, 16),
            Self::D128th => (1, 32),
            Self::D256th => (1, 64),
            Self::Measure => return None,
        })
    }

    /// Ticks at `division` per quarter, if the value is a whole number of ticks.
    pub fn ticks(&self, division: u64) -> Option<u64> {
        let (num, den) = self.quarters()?;
        let scaled = division * num;
        (scaled % den == 0).then_some(scaled / den)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Breve => "breve",
            Self::Whole => "whole",
            Self::Half => "half",
            Self::Quarter => "quarter",
            Self::Eighth => "eighth",
            Self::D16th => "16th",
            Self::D32nd => "32nd",
            Self::D64th => "64th",
            Self::D128th => "128th",
            Self::D256th => "256th",
            Self::Measure => "measure",
        }
    }
}

/// A duration value with augmentation dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotatedDuration {
    pub ty: DurationType,
    pub dots: u8,
}

impl NotatedDuration {
    pub const fn plain(ty: DurationType) -> Self {
        NotatedDuration { ty, dots: 0 }
    }

    pub const fn dotted(ty: DurationType, dots: u8) -> Self {
        NotatedDuration { ty, dots }
    }

    /// Ticks including dots; None for `Measure` or non-integral lengths.
    pub fn ticks(&self, division: u64) -> Option<u64> {
        let base = self.ty.ticks(division)?;
        // each dot adds half of the previous addition
        let mut total = base;
        let mut add = base;
        for _ in 0..self.dots {
            if add % 2 != 0 {
                return None;
            }
            add /= 2;
            total += add;
        }
        Some(total)
    }
}

impl std::fmt::Display for NotatedDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ty.name())?;
        for _ in 0..self.dots {
            f.write_str(".")?;
        }
        Ok(())
    }
}

/// Candidate values for decomposition, longest first.
fn candidates(division: u64, use_dots: bool) -> Vec<(NotatedDuration, u64)> {
    let max_dots = if use_dots { 2 } else { 0 };
    let mut out: Vec<(NotatedDuration, u64)> = DurationType::VALUES
        .iter()
        .flat_map(|&ty| (0..=max_dots).map(move |dots| NotatedDuration::dotted(ty, dots)))
        .filter_map(|d| d.ticks(division).map(|t| (d, t)))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.dots.cmp(&b.0.dots)));
    out
}

/// Decompose `len` ticks into legal values, longest first.
///
/// Greedy: repeatedly takes the longest value that still fits. A remainder
/// shorter than the shortest legal value is left over; callers compare
/// [`total_ticks`] against `len` to detect it. Returns an empty list when
/// nothing fits at all.
pub fn to_duration_list(len: u64, division: u64, use_dots: bool) -> Vec<NotatedDuration> {
    let mut list = Vec::new();
    let mut remaining = len;

    for (d, ticks) in candidates(division, use_dots) {
        while ticks > 0 && remaining >= ticks {
            list.push(d);
            remaining -= ticks;
        }
        if remaining == 0 {
            break;
        }
    }

    list
}

/// Sum of a duration list in ticks.
pub fn total_ticks(list: &[NotatedDuration], division: u64) -> u64 {
    list.iter().filter_map(|d| d.ticks(division)).sum()
}
