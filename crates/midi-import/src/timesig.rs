//! Time signature map and measure boundaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A time signature, e.g. 6/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSig {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSig {
    pub const fn new(numerator: u8, denominator: u8) -> Self {
        TimeSig {
            numerator,
            denominator,
        }
    }

    /// Zero numerators/denominators can't describe a measure.
    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Length of one measure at `division` ticks per quarter note.
    pub fn measure_ticks(&self, division: u64) -> u64 {
        division * 4 * self.numerator as u64 / self.denominator as u64
    }
}

impl Default for TimeSig {
    fn default() -> Self {
        TimeSig::new(4, 4)
    }
}

impl std::fmt::Display for TimeSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// One measure: `[start, end)` in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureSpan {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    pub sig: TimeSig,
}

impl MeasureSpan {
    pub fn ticks(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, tick: u64) -> bool {
        tick >= self.start && tick < self.end
    }
}

/// Ordered `tick -> signature` map. Always has an entry at tick 0.
///
/// A signature change starts a new measure at its tick. If the change
/// falls mid-measure, the measure running at that point is cut short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSigMap {
    division: u64,
    entries: BTreeMap<u64, TimeSig>,
}

impl TimeSigMap {
    /// A map holding only the default 4/4 at tick 0.
    pub fn new(division: u64) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(0, TimeSig::default());
        TimeSigMap { division, entries }
    }

    pub fn division(&self) -> u64 {
        self.division
    }

    /// Add or replace the signature at `tick`. Returns false for invalid
    /// signatures, which are ignored.
    pub fn add(&mut self, tick: u64, sig: TimeSig) -> bool {
        if !sig.is_valid() {
            return false;
        }
        self.entries.insert(tick, sig);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, TimeSig)> + '_ {
        self.entries.iter().map(|(&tick, &sig)| (tick, sig))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Signature in effect at `tick`.
    pub fn timesig_at(&self, tick: u64) -> TimeSig {
        self.entries
            .range(..=tick)
            .next_back()
            .map(|(_, &sig)| sig)
            .unwrap_or_default()
    }

    /// Segments of constant signature: (start, end or None for the last, sig).
    fn segments(&self) -> impl Iterator<Item = (u64, Option<u64>, TimeSig)> + '_ {
        let mut iter = self.entries.iter().peekable();
        std::iter::from_fn(move || {
            let (&start, &sig) = iter.next()?;
            let end = iter.peek().map(|(&t, _)| t);
            Some((start, end, sig))
        })
    }

    /// Measure containing `tick`.
    pub fn measure_at(&self, tick: u64) -> MeasureSpan {
        let mut index = 0usize;

        for (start, end, sig) in self.segments() {
            let len = sig.measure_ticks(self.division).max(1);
            let in_segment = end.map_or(true, |end| tick < end);

            if in_segment {
                let n = (tick.saturating_sub(start)) / len;
                let m_start = start + n * len;
                let m_end = end.map_or(m_start + len, |end| (m_start + len).min(end));
                return MeasureSpan {
                    index: index + n as usize,
                    start: m_start,
                    end: m_end,
                    sig,
                };
            }

            let seg_len = end.unwrap_or(start) - start;
            index += seg_len.div_ceil(len) as usize;
        }

        // entries always contains tick 0, so the loop returns
        let sig = TimeSig::default();
        MeasureSpan {
            index: 0,
            start: 0,
            end: sig.measure_ticks(self.division),
            sig,
        }
    }

    /// Start tick of measure `bar` (zero-based).
    pub fn bar2tick(&self, bar: usize) -> u64 {
        let mut index = 0usize;

        for (start, end, sig) in self.segments() {
            let len = sig.measure_ticks(self.division).max(1);
            let bars_here = end.map(|end| (end - start).div_ceil(len) as usize);

            match bars_here {
                Some(n) if bar >= index + n => index += n,
                _ => return start + (bar - index) as u64 * len,
            }
        }

        0
    }

    /// All measures needed to hold material up to `last_tick`.
    ///
    /// A `last_tick` exactly on a barline adds no further measure; a
    /// `last_tick` of zero yields no measures.
    pub fn measures_until(&self, last_tick: u64) -> Vec<MeasureSpan> {
        let mut measures = Vec::new();
        let mut tick = 0;

        while tick < last_tick {
            let m = self.measure_at(tick);
            tick = m.end;
            measures.push(m);
        }

        measures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_common_time() {
        let map = TimeSigMap::new(480);
        let m = map.measure_at(2000);

        assert_eq!(m.index, 1);
        assert_eq!(m.start, 1920);
        assert_eq!(m.end, 3840);
        assert_eq!(m.sig, TimeSig::new(4, 4));
    }

    #[test]
    fn test_measure_ticks_for_compound_meter() {
        assert_eq!(TimeSig::new(6, 8).measure_ticks(480), 1440);
        assert_eq!(TimeSig::new(3, 4).measure_ticks(480), 1440);
        assert_eq!(TimeSig::new(7, 16).measure_ticks(480), 840);
    }

    #[test]
    fn test_bar2tick_across_signature_change() {
        let mut map = TimeSigMap::new(480);
        // two bars of 4/4, then 3/4
        map.add(3840, TimeSig::new(3, 4));

        assert_eq!(map.bar2tick(0), 0);
        assert_eq!(map.bar2tick(1), 1920);
        assert_eq!(map.bar2tick(2), 3840);
        assert_eq!(map.bar2tick(3), 5280);

        let m = map.measure_at(5300);
        assert_eq!(m.index, 3);
        assert_eq!(m.sig, TimeSig::new(3, 4));
    }

    #[test]
    fn test_mid_measure_change_shortens_measure() {
        let mut map = TimeSigMap::new(480);
        map.add(2880, TimeSig::new(2, 4));

        let cut = map.measure_at(2000);
        assert_eq!(cut.start, 1920);
        assert_eq!(cut.end, 2880);

        let next = map.measure_at(2880);
        assert_eq!(next.index, 2);
        assert_eq!(next.ticks(), 960);
        assert_eq!(map.bar2tick(2), 2880);
    }

    #[test]
    fn test_invalid_signature_ignored() {
        let mut map = TimeSigMap::new(480);
        assert!(!map.add(0, TimeSig::new(0, 4)));
        assert_eq!(map.timesig_at(0), TimeSig::new(4, 4));
    }

    #[test]
    fn test_measures_until_rounds_up_to_barline() {
        let map = TimeSigMap::new(480);

        assert!(map.measures_until(0).is_empty());
        assert_eq!(map.measures_until(1920).len(), 1);
        assert_eq!(map.measures_until(1921).len(), 2);
    }
}
