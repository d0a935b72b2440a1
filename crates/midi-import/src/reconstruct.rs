//! Duration reconstruction: turn quantized chords into notated chords,
//! rests and ties.
//!
//! Each voice is walked with a cursor. Chords starting at the same tick
//! become pending together; pending chords are emitted one notated value
//! at a time, never past the shortest pending remainder, the next onset
//! or the barline. Whatever is left carries on as a tied continuation.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::drumset::{DrumMap, StemDirection};
use crate::duration::{to_duration_list, DurationType, NotatedDuration};
use crate::note::{Chord, Track};
use crate::score::{MeasureIndex, NotatedChord, NotatedNote, NotatedRest, NoteId, ScoreSink, StaffId};

/// Voices reconstructed per staff.
pub const VOICES: u8 = 4;

/// Shared settings for one conversion.
pub struct ReconstructContext<'a> {
    pub measures: &'a dyn MeasureIndex,
    /// Where the final flush and rest fill stop
    pub end_tick: u64,
    pub division: u64,
    pub use_dots: bool,
}

/// What was emitted for one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructStats {
    pub chords: usize,
    pub rests: usize,
    pub ties: usize,
}

struct Pending<'c> {
    chord: &'c Chord,
    remaining: u64,
    /// Notes of the previous segment, to tie from
    prev: Option<Vec<NoteId>>,
}

struct VoiceWriter<'a, 'c, S: ScoreSink + ?Sized> {
    ctx: &'a ReconstructContext<'a>,
    sink: &'a mut S,
    diags: &'a mut Diagnostics,
    drums: Option<&'a DrumMap>,
    staff: StaffId,
    voice: u8,
    cursor: u64,
    pending: Vec<Pending<'c>>,
    stats: ReconstructStats,
}

impl<'a, 'c, S: ScoreSink + ?Sized> VoiceWriter<'a, 'c, S> {
    fn stem(&self, pitch: u8) -> StemDirection {
        self.drums.map_or(StemDirection::Auto, |d| d.stem(pitch))
    }

    /// Emit pending chords up to `until`. Stops early once nothing is pending.
    fn flush(&mut self, until: u64) {
        while !self.pending.is_empty() && self.cursor < until {
            let Some(measure) = self.ctx.measures.measure_at(self.cursor) else {
                self.diags.report(
                    DiagnosticKind::BeyondLastMeasure,
                    self.cursor,
                    format!("{} pending chord(s) past the last measure", self.pending.len()),
                );
                self.pending.clear();
                return;
            };

            let shortest = self.pending.iter().map(|p| p.remaining).min().unwrap_or(0);
            let len = (until - self.cursor).min(shortest).min(measure.end - self.cursor);

            let list = to_duration_list(len, self.ctx.division, self.ctx.use_dots);
            let Some((duration, ticks)) = list
                .first()
                .and_then(|d| d.ticks(self.ctx.division).map(|t| (*d, t)))
            else {
                self.diags.report(
                    DiagnosticKind::UndecomposableDuration,
                    self.cursor,
                    format!("chord segment of {len} ticks has no notated value"),
                );
                self.skip_pending(len);
                continue;
            };

            self.emit_segment(duration, ticks);
        }
    }

    /// Drop `len` ticks from every pending chord without notating them.
    fn skip_pending(&mut self, len: u64) {
        for p in &mut self.pending {
            p.remaining = p.remaining.saturating_sub(len);
            p.prev = None;
        }
        self.pending.retain(|p| p.remaining > 0);
        self.cursor += len;
    }

    fn emit_segment(&mut self, duration: NotatedDuration, ticks: u64) {
        let notes: Vec<NotatedNote> = self
            .pending
            .iter()
            .flat_map(|p| p.chord.notes.iter())
            .map(|n| NotatedNote {
                pitch: n.pitch,
                velocity: n.velocity,
                stem: self.stem(n.pitch),
            })
            .collect();

        let ids = self.sink.add_chord(
            self.staff,
            NotatedChord {
                tick: self.cursor,
                voice: self.voice,
                duration,
                ticks,
                notes,
            },
        );
        self.stats.chords += 1;

        let mut offset = 0;
        for p in &mut self.pending {
            let n = p.chord.notes.len();
            let new_ids: Vec<NoteId> = ids
                .get(offset..offset + n)
                .map(<[NoteId]>::to_vec)
                .unwrap_or_default();
            offset += n;

            if let Some(prev) = &p.prev {
                for (&start, &end) in prev.iter().zip(&new_ids) {
                    self.sink.add_tie(start, end);
                    self.stats.ties += 1;
                }
            }

            p.remaining -= ticks;
            p.prev = Some(new_ids);
        }

        self.pending.retain(|p| p.remaining > 0);
        self.cursor += ticks;
    }

    /// Fill `[cursor, until)` with rests. A span covering a whole measure
    /// becomes one measure rest.
    fn fill_rests(&mut self, until: u64) {
        while self.cursor < until {
            let Some(measure) = self.ctx.measures.measure_at(self.cursor) else {
                self.diags.report(
                    DiagnosticKind::BeyondLastMeasure,
                    self.cursor,
                    "rest past the last measure",
                );
                self.cursor = until;
                return;
            };

            let end = until.min(measure.end);
            let len = end - self.cursor;

            if self.cursor == measure.start && len == measure.ticks() {
                self.rest(NotatedDuration::plain(DurationType::Measure), len);
                continue;
            }

            for d in to_duration_list(len, self.ctx.division, self.ctx.use_dots) {
                if let Some(ticks) = d.ticks(self.ctx.division) {
                    self.rest(d, ticks);
                }
            }

            if self.cursor < end {
                self.diags.report(
                    DiagnosticKind::UndecomposableDuration,
                    self.cursor,
                    format!("rest gap of {} ticks has no notated value", end - self.cursor),
                );
                self.cursor = end;
            }
        }
    }

    fn rest(&mut self, duration: NotatedDuration, ticks: u64) {
        self.sink.add_rest(
            self.staff,
            NotatedRest {
                tick: self.cursor,
                voice: self.voice,
                duration,
                ticks,
            },
        );
        self.stats.rests += 1;
        self.cursor += ticks;
    }

    fn run(&mut self, chords: &[&'c Chord]) {
        let mut i = 0;
        while i < chords.len() {
            let tick = chords[i].onset;

            self.flush(tick);
            if self.voice == 0 {
                self.fill_rests(tick);
            }
            self.cursor = self.cursor.max(tick);

            while i < chords.len() && chords[i].onset == tick {
                self.pending.push(Pending {
                    chord: chords[i],
                    remaining: chords[i].duration,
                    prev: None,
                });
                i += 1;
            }
        }

        self.flush(self.ctx.end_tick);
        if !self.pending.is_empty() {
            self.diags.report(
                DiagnosticKind::BeyondLastMeasure,
                self.cursor,
                "chord continues past the end of the score",
            );
            self.pending.clear();
        }
        if self.voice == 0 {
            self.fill_rests(self.ctx.end_tick);
        }
    }
}

/// Reconstruct every voice of `track` onto `staff`.
///
/// Voice 0 is always written and gaps in it are filled with rests. Other
/// voices are written only when they hold chords, and their gaps stay empty.
pub fn reconstruct_track(
    track: &Track,
    staff: StaffId,
    drums: Option<&DrumMap>,
    ctx: &ReconstructContext<'_>,
    sink: &mut dyn ScoreSink,
    diags: &mut Diagnostics,
) -> ReconstructStats {
    let mut total = ReconstructStats::default();

    for voice in 0..VOICES {
        let chords: Vec<&Chord> = track.chords.iter().filter(|c| c.voice == voice).collect();
        if voice > 0 && chords.is_empty() {
            continue;
        }

        let mut writer = VoiceWriter {
            ctx,
            sink: &mut *sink,
            diags: &mut *diags,
            drums: if track.is_drum { drums } else { None },
            staff,
            voice,
            cursor: 0,
            pending: Vec::new(),
            stats: ReconstructStats::default(),
        };
        writer.run(&chords);

        total.chords += writer.stats.chords;
        total.rests += writer.stats.rests;
        total.ties += writer.stats.ties;
    }

    let dropped = track.chords.iter().filter(|c| c.voice >= VOICES).count();
    if dropped > 0 {
        diags.push(Diagnostic::new(
            DiagnosticKind::DroppedChord,
            format!("{dropped} chord(s) in voices above {}", VOICES - 1),
        ));
    }

    tracing::debug!(
        track = track.index,
        staff,
        chords = total.chords,
        rests = total.rests,
        ties = total.ties,
        "reconstructed track"
    );
    total
}
