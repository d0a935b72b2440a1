//! Standard MIDI File writer for building test inputs.

#![allow(dead_code)]

/// Events for one MTrk chunk, at absolute ticks.
#[derive(Default)]
pub struct TrackBuilder {
    events: Vec<(u64, Vec<u8>)>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn text_meta(mut self, tick: u64, ty: u8, text: &str) -> Self {
        let mut data = vec![0xFF, ty];
        write_vlq(&mut data, text.len() as u32);
        data.extend_from_slice(text.as_bytes());
        self.events.push((tick, data));
        self
    }

    pub fn name(self, name: &str) -> Self {
        self.text_meta(0, 0x03, name)
    }

    pub fn lyric(self, tick: u64, text: &str) -> Self {
        self.text_meta(tick, 0x05, text)
    }

    pub fn copyright(self, text: &str) -> Self {
        self.text_meta(0, 0x02, text)
    }

    pub fn title(self, text: &str) -> Self {
        self.text_meta(0, 0x08, text)
    }

    pub fn composer(self, text: &str) -> Self {
        self.text_meta(0, 0x0A, text)
    }

    pub fn tempo(mut self, tick: u64, usec: u32) -> Self {
        self.events.push((
            tick,
            vec![0xFF, 0x51, 0x03, (usec >> 16) as u8, (usec >> 8) as u8, usec as u8],
        ));
        self
    }

    pub fn time_sig(mut self, tick: u64, numerator: u8, denominator: u8) -> Self {
        let denom_pow = denominator.trailing_zeros() as u8;
        self.events
            .push((tick, vec![0xFF, 0x58, 0x04, numerator, denom_pow, 0x18, 0x08]));
        self
    }

    pub fn key_sig(mut self, tick: u64, accidentals: i8) -> Self {
        self.events
            .push((tick, vec![0xFF, 0x59, 0x02, accidentals as u8, 0x00]));
        self
    }

    pub fn program(mut self, channel: u8, program: u8) -> Self {
        self.events.push((0, vec![0xC0 | (channel & 0x0F), program]));
        self
    }

    pub fn note(mut self, onset: u64, len: u64, pitch: u8, channel: u8) -> Self {
        self.events
            .push((onset, vec![0x90 | (channel & 0x0F), pitch, 100]));
        self.events
            .push((onset + len, vec![0x80 | (channel & 0x0F), pitch, 0]));
        self
    }

    /// Track chunk payload, including end of track.
    pub fn build(mut self) -> Vec<u8> {
        // Sort by tick, with note-offs before note-ons at the same tick
        self.events.sort_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| {
                let a_is_off = a.1.first().is_some_and(|b| b & 0xF0 == 0x80);
                let b_is_off = b.1.first().is_some_and(|b| b & 0xF0 == 0x80);
                b_is_off.cmp(&a_is_off)
            })
        });

        let mut track_data = Vec::new();
        let mut last_tick = 0u64;

        for (tick, data) in self.events {
            write_vlq(&mut track_data, (tick - last_tick) as u32);
            track_data.extend_from_slice(&data);
            last_tick = tick;
        }

        write_vlq(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
        track_data
    }
}

/// Assemble a format 1 file.
pub fn smf(ppq: u16, tracks: Vec<TrackBuilder>) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track in tracks {
        let data = track.build();
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&data);
    }

    buf
}

pub fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
