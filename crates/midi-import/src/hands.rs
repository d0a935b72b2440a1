//! Left/right hand separation for single-track piano parts.

use crate::note::{Chord, ChordMap, Track};

/// Which hand a cluster member went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

/// Assign each chord of one cluster to a hand.
///
/// Members are sorted by lowest pitch. If the cluster spans more than
/// `interval` semitones, everything rooted within `interval` of the lowest
/// pitch goes left and the rest right. Otherwise only the top chord goes
/// right.
pub fn assign_cluster(cluster: &mut [Chord], interval: u8) -> Vec<Hand> {
    cluster.sort_by_key(|c| (c.lowest_pitch(), c.highest_pitch()));

    let Some(first) = cluster.first() else {
        return Vec::new();
    };
    let min_pitch = first.lowest_pitch();
    let max_pitch = cluster.iter().map(Chord::highest_pitch).max().unwrap_or(min_pitch);

    if max_pitch - min_pitch > interval {
        let split = min_pitch as u16 + interval as u16;
        cluster
            .iter()
            .map(|c| {
                if c.lowest_pitch() as u16 <= split {
                    Hand::Left
                } else {
                    Hand::Right
                }
            })
            .collect()
    } else {
        let top = cluster.len() - 1;
        (0..cluster.len())
            .map(|i| if i == top { Hand::Right } else { Hand::Left })
            .collect()
    }
}

/// Split one track's chords into (right, left).
///
/// Clusters collect chords whose onset lies within the shortest note
/// length of the cluster's first onset.
pub fn split_chords(chords: &ChordMap, interval: u8) -> (ChordMap, ChordMap) {
    let tolerance = chords.notes().map(|n| n.len).min().unwrap_or(0);

    let mut right = ChordMap::new();
    let mut left = ChordMap::new();
    let mut cluster: Vec<Chord> = Vec::new();

    let mut close = |cluster: &mut Vec<Chord>| {
        let hands = assign_cluster(cluster, interval);
        for (chord, hand) in cluster.drain(..).zip(hands) {
            match hand {
                Hand::Right => right.insert(chord),
                Hand::Left => left.insert(chord),
            }
        }
    };

    for chord in chords.iter() {
        if let Some(reference) = cluster.first().map(|c| c.onset) {
            if chord.onset - reference > tolerance {
                close(&mut cluster);
            }
        }
        cluster.push(chord.clone());
    }
    close(&mut cluster);

    (right, left)
}

/// Replace every track marked for separation with its right hand, followed
/// by its left hand. Empty halves are left out.
///
/// Builds a fresh list; nothing is inserted while iterating.
pub fn separate_hands(tracks: Vec<Track>, interval: u8) -> Vec<Track> {
    let mut out = Vec::with_capacity(tracks.len());

    for track in tracks {
        if !track.options.do_lh_rh_separation || track.is_drum || track.chords.is_empty() {
            out.push(track);
            continue;
        }

        let (right, left) = split_chords(&track.chords, interval);
        tracing::debug!(
            track = track.index,
            right = right.len(),
            left = left.len(),
            "separated hands"
        );

        let mut lh = Track {
            chords: left,
            meta: Vec::new(),
            ..track.clone()
        };
        lh.update_stats();

        if !right.is_empty() {
            let mut rh = Track {
                chords: right,
                ..track
            };
            rh.update_stats();
            out.push(rh);
        }
        if !lh.chords.is_empty() {
            out.push(lh);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackOptions;
    use crate::note::Note;

    fn singles(specs: &[(u64, u64, u8)]) -> ChordMap {
        ChordMap::from_notes(
            specs
                .iter()
                .map(|&(onset, len, pitch)| Note::new(pitch, 100, onset, len)),
        )
    }

    fn pitches(map: &ChordMap) -> Vec<u8> {
        map.notes().map(|n| n.pitch).collect()
    }

    #[test]
    fn test_octave_rule_then_top_note_rule() {
        // cluster 1 spans 24: split by register; cluster 2 spans exactly 12
        let chords = singles(&[(0, 240, 40), (0, 240, 64), (480, 240, 52), (480, 240, 64)]);
        let (right, left) = split_chords(&chords, 12);

        assert_eq!(pitches(&right), vec![64, 64]);
        assert_eq!(pitches(&left), vec![40, 52]);
    }

    #[test]
    fn test_octave_rule_keeps_low_register_left() {
        let chords = singles(&[(0, 240, 36), (0, 240, 43), (0, 240, 48), (0, 240, 60), (0, 240, 67)]);
        let (right, left) = split_chords(&chords, 12);

        // 48 is exactly an octave above 36, still left
        assert_eq!(pitches(&left), vec![36, 43, 48]);
        assert_eq!(pitches(&right), vec![60, 67]);
    }

    #[test]
    fn test_melody_alone_goes_right() {
        let chords = singles(&[(0, 240, 72), (480, 240, 74), (960, 240, 76)]);
        let (right, left) = split_chords(&chords, 12);
        assert_eq!(right.len(), 3);
        assert!(left.is_empty());
    }

    #[test]
    fn test_cluster_window_is_shortest_note() {
        // shortest note 120: onsets 0 and 100 share a cluster, 240 does not
        let chords = singles(&[(0, 480, 48), (100, 120, 50), (240, 480, 47)]);
        let (right, left) = split_chords(&chords, 12);

        assert_eq!(pitches(&right), vec![50, 47]);
        assert_eq!(pitches(&left), vec![48]);
    }

    #[test]
    fn test_every_chord_lands_in_exactly_one_hand() {
        let chords = singles(&[
            (0, 240, 36),
            (0, 240, 55),
            (0, 240, 79),
            (240, 240, 60),
            (240, 240, 62),
            (480, 120, 41),
            (500, 120, 77),
            (960, 480, 64),
        ]);
        let (right, left) = split_chords(&chords, 12);

        let mut all = pitches(&right);
        all.extend(pitches(&left));
        all.sort();
        let mut expected = pitches(&chords);
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_separate_hands_splices_tracks() {
        let mut piano = Track::new(0, 0);
        piano.options = TrackOptions {
            do_import: true,
            do_lh_rh_separation: true,
        };
        piano.chords = singles(&[(0, 480, 40), (0, 480, 64)]);

        let mut flute = Track::new(1, 1);
        flute.chords = singles(&[(0, 480, 40), (0, 480, 64)]);

        let out = separate_hands(vec![piano, flute], 12);

        assert_eq!(out.len(), 3);
        assert_eq!(pitches(&out[0].chords), vec![64]);
        assert_eq!(pitches(&out[1].chords), vec![40]);
        assert_eq!(out[1].channel, 0);
        assert!(out[1].options.do_lh_rh_separation);
        assert_eq!(out[2].index, 1);
        assert_eq!(out[2].chords.len(), 2);
    }

    #[test]
    fn test_empty_left_hand_not_created() {
        let mut track = Track::new(0, 0);
        track.options.do_lh_rh_separation = true;
        track.chords = singles(&[(0, 480, 72)]);

        let out = separate_hands(vec![track], 12);
        assert_eq!(out.len(), 1);
    }
}
