//! End-to-end imports from generated Standard MIDI Files.

mod fixtures;

use fixtures::{smf, TrackBuilder};
use midi_import::{
    import_bytes, import_midi, list_tracks, Clef, DiagnosticKind, Element, Error, ImportConfig,
    NoteId, Score, StemDirection, TextKind, TimeSig, TrackOptions,
};
use pretty_assertions::assert_eq;
use std::io::Write;

fn import(bytes: &[u8], config: &ImportConfig) -> (Score, midi_import::ImportReport) {
    let mut score = Score::new();
    let report = import_bytes(bytes, config, &mut score).expect("import failed");
    (score, report)
}

/// (tick, ticks, pitches) of every chord in one voice.
fn chords_of(score: &Score, staff: usize, voice: u8) -> Vec<(u64, u64, Vec<u8>)> {
    let staff = &score.staves[staff];
    staff
        .voice(voice)
        .into_iter()
        .filter_map(|e| match e {
            Element::Chord {
                tick, ticks, notes, ..
            } => Some((
                *tick,
                *ticks,
                notes.iter().map(|&i| staff.notes[i].pitch).collect(),
            )),
            Element::Rest { .. } => None,
        })
        .collect()
}

#[test]
fn test_empty_path_is_file_not_found() {
    let mut score = Score::new();
    let err = import_midi("", &ImportConfig::default(), &mut score).unwrap_err();

    assert!(matches!(err, Error::FileNotFound));
    assert!(score.is_empty());
}

#[test]
fn test_unreadable_path_leaves_score_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.mid");

    let mut score = Score::new();
    let err = import_midi(&missing, &ImportConfig::default(), &mut score).unwrap_err();

    match err {
        Error::FileOpen { path, .. } => assert_eq!(path, missing),
        other => panic!("expected FileOpen, got {other:?}"),
    }
    assert!(score.is_empty());
}

#[test]
fn test_garbage_is_bad_format() {
    let mut score = Score::new();
    let err = import_bytes(b"not a midi file", &ImportConfig::default(), &mut score).unwrap_err();

    assert!(matches!(err, Error::BadFormat(_)));
    assert!(score.is_empty());
}

#[test]
fn test_import_from_file() {
    let bytes = smf(
        480,
        vec![TrackBuilder::new().name("Lead").note(0, 480, 72, 0)],
    );
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let mut score = Score::new();
    let report = import_midi(file.path(), &ImportConfig::default(), &mut score).unwrap();

    assert_eq!(report.tracks, 1);
    assert_eq!(report.measures, 1);
    assert_eq!(score.parts[0].name.as_deref(), Some("Lead"));
    assert_eq!(chords_of(&score, 0, 0), vec![(0, 480, vec![72])]);
}

#[test]
fn test_conductor_track_meta() {
    let conductor = TrackBuilder::new()
        .tempo(0, 500_000)
        .time_sig(0, 3, 4)
        .key_sig(0, -2)
        .title("Etude")
        .composer("Anon")
        .copyright("(c) nobody");
    let melody = TrackBuilder::new()
        .note(0, 480, 70, 0)
        .note(480, 480, 72, 0)
        .note(960, 480, 74, 0)
        .note(1440, 480, 75, 0);

    let (score, report) = import(&smf(480, vec![conductor, melody]), &ImportConfig::default());

    assert_eq!(report.tracks, 1);
    assert_eq!(report.measures, 2);
    assert_eq!(score.measures[0].end, 1440);
    assert_eq!(score.measures[1].start, 1440);

    let staff = &score.staves[0];
    assert_eq!(staff.key_signatures, vec![(0, -2)]);
    assert_eq!(staff.time_signatures, vec![(0, TimeSig::new(3, 4))]);

    assert_eq!(score.tempo, vec![(0, 2.0)]);
    assert!(score
        .texts
        .contains(&(TextKind::Title, "Etude".to_string())));
    assert!(score
        .texts
        .contains(&(TextKind::Composer, "Anon".to_string())));
    assert_eq!(
        score.meta_tags.get("copyright").map(String::as_str),
        Some("(c) nobody")
    );
}

#[test]
fn test_resolution_is_normalized() {
    let bytes = smf(96, vec![TrackBuilder::new().note(96, 96, 60, 0)]);
    let (score, _) = import(&bytes, &ImportConfig::default());

    assert_eq!(chords_of(&score, 0, 0), vec![(480, 480, vec![60])]);
}

#[test]
fn test_voice_zero_is_filled_to_the_barline() {
    let bytes = smf(480, vec![TrackBuilder::new().note(480, 480, 67, 0)]);
    let (score, _) = import(&bytes, &ImportConfig::default());

    let voice: Vec<(u64, u64)> = score.staves[0]
        .voice(0)
        .iter()
        .map(|e| (e.tick(), e.ticks()))
        .collect();
    let total: u64 = voice.iter().map(|&(_, t)| t).sum();

    assert_eq!(voice.first(), Some(&(0, 480)));
    assert_eq!(total, 1920);
    for pair in voice.windows(2) {
        assert_eq!(pair[0].0 + pair[0].1, pair[1].0);
    }
}

#[test]
fn test_chord_across_barline_is_tied() {
    // The eighth in bar one keeps the raster fine enough for onset 1680
    let track = TrackBuilder::new()
        .note(0, 240, 79, 0)
        .note(1680, 720, 60, 0);
    let (score, report) = import(&smf(480, vec![track]), &ImportConfig::default());

    assert_eq!(report.measures, 2);
    assert_eq!(score.ties.len(), 1);
    assert_eq!((report.chords, report.ties), (3, 1));
    assert_eq!(report.rests, score.staves[0].rests().count());

    let staff = &score.staves[0];
    let head = staff
        .notes
        .iter()
        .position(|n| n.pitch == 60 && n.tie_back.is_none())
        .unwrap();
    let head = NoteId {
        staff: 0,
        index: head,
    };

    let chain = score.tie_chain(head);
    assert_eq!(chain.len(), 2);

    let first = score.note(chain[0]).unwrap();
    let second = score.note(chain[1]).unwrap();
    assert_eq!((first.tick, first.ticks), (1680, 240));
    assert_eq!((second.tick, second.ticks), (1920, 480));
    assert_eq!(first.tick + first.ticks, second.tick);
    assert_eq!(second.tie_back, Some(chain[0]));
    assert_eq!(second.tie_forward, None);
}

#[test]
fn test_hand_separation_makes_piano_pair() {
    let track = TrackBuilder::new()
        .name("Piano")
        .note(0, 480, 40, 0)
        .note(0, 480, 64, 0)
        .note(960, 480, 52, 0)
        .note(960, 480, 64, 0);
    let bytes = smf(480, vec![track]);

    let mut config = ImportConfig::default();
    config.set_track_options(
        0,
        TrackOptions {
            do_import: true,
            do_lh_rh_separation: true,
        },
    );
    let (score, report) = import(&bytes, &config);

    assert_eq!(report.tracks, 2);
    assert_eq!(score.parts.len(), 1);
    assert!(score.parts[0].braced);
    assert_eq!(score.parts[0].staves, vec![0, 1]);
    assert_eq!(score.staves[0].clef, Clef::Treble);
    assert_eq!(score.staves[1].clef, Clef::Bass);

    // first cluster spans two octaves: split by register
    // second spans exactly one: only the top note goes right
    assert_eq!(
        chords_of(&score, 0, 0),
        vec![(0, 480, vec![64]), (960, 480, vec![64])]
    );
    assert_eq!(
        chords_of(&score, 1, 0),
        vec![(0, 480, vec![40]), (960, 480, vec![52])]
    );
}

#[test]
fn test_without_separation_pitches_form_chords() {
    let track = TrackBuilder::new()
        .note(0, 480, 40, 0)
        .note(0, 480, 64, 0);
    let (score, report) = import(&smf(480, vec![track]), &ImportConfig::default());

    assert_eq!(report.tracks, 1);
    assert_eq!(chords_of(&score, 0, 0), vec![(0, 480, vec![40, 64])]);
}

#[test]
fn test_skipped_track_is_not_imported() {
    let first = TrackBuilder::new().name("Skip me").note(0, 480, 60, 0);
    let second = TrackBuilder::new()
        .name("Keep me")
        .program(1, 33)
        .note(0, 480, 40, 1);

    let mut config = ImportConfig::default();
    config.set_track_options(
        0,
        TrackOptions {
            do_import: false,
            do_lh_rh_separation: false,
        },
    );
    let (score, report) = import(&smf(480, vec![first, second]), &config);

    assert_eq!(report.tracks, 1);
    assert_eq!(score.parts.len(), 1);
    assert_eq!(score.parts[0].name.as_deref(), Some("Keep me"));
    assert_eq!(score.parts[0].program, 33);
    assert_eq!(score.staves[0].clef, Clef::Bass);
}

#[test]
fn test_channels_split_into_parts() {
    let track = TrackBuilder::new()
        .note(0, 480, 72, 0)
        .note(0, 480, 36, 1);
    let (score, report) = import(&smf(480, vec![track]), &ImportConfig::default());

    assert_eq!(report.tracks, 2);
    assert_eq!(score.parts.len(), 2);
    assert_eq!(chords_of(&score, 0, 0), vec![(0, 480, vec![72])]);
    assert_eq!(chords_of(&score, 1, 0), vec![(0, 480, vec![36])]);
}

#[test]
fn test_drum_track_uses_percussion_voices() {
    let track = TrackBuilder::new()
        .key_sig(0, 3)
        .note(0, 480, 36, 9)
        .note(0, 480, 42, 9);
    let (score, _) = import(&smf(480, vec![track]), &ImportConfig::default());

    assert!(score.parts[0].is_drum);
    let staff = &score.staves[0];
    assert_eq!(staff.clef, Clef::Percussion);
    assert!(staff.key_signatures.is_empty());

    // bass drum sits in the second voice, stem down
    assert_eq!(chords_of(&score, 0, 0), vec![(0, 480, vec![42])]);
    assert_eq!(chords_of(&score, 0, 1), vec![(0, 480, vec![36])]);

    let kick = staff.notes.iter().find(|n| n.pitch == 36).unwrap();
    assert_eq!(kick.stem, StemDirection::Down);
    let hat = staff.notes.iter().find(|n| n.pitch == 42).unwrap();
    assert_eq!(hat.stem, StemDirection::Up);
}

#[test]
fn test_lyrics_land_on_first_staff() {
    let track = TrackBuilder::new()
        .note(0, 480, 67, 0)
        .lyric(0, "la")
        .note(480, 480, 69, 0)
        .lyric(480, "di");
    let (score, _) = import(&smf(480, vec![track]), &ImportConfig::default());

    assert_eq!(
        score.staves[0].lyrics,
        vec![(0, "la".to_string()), (480, "di".to_string())]
    );
}

#[test]
fn test_unterminated_note_is_reported() {
    let mut bytes = smf(480, vec![TrackBuilder::new().note(0, 480, 60, 0)]);
    // drop the note-off: rewrite it as a note-on at velocity 1 on another pitch
    let pos = bytes
        .windows(3)
        .position(|w| w == [0x80, 60, 0])
        .unwrap();
    bytes[pos..pos + 3].copy_from_slice(&[0x90, 61, 1]);

    let (_, report) = import(&bytes, &ImportConfig::default());

    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::UnterminatedNote));
}

#[test]
fn test_list_tracks_summarizes() {
    let conductor = TrackBuilder::new().tempo(0, 600_000);
    let lead = TrackBuilder::new()
        .name("Lead")
        .program(0, 73)
        .note(0, 480, 72, 0)
        .note(480, 480, 79, 0);
    let drums = TrackBuilder::new().note(0, 240, 38, 9);

    let summaries = list_tracks(&smf(480, vec![conductor, lead, drums])).unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name.as_deref(), Some("Lead"));
    assert_eq!(summaries[0].program, 73);
    assert_eq!(summaries[0].note_count, 2);
    assert_eq!((summaries[0].pitch_min, summaries[0].pitch_max), (72, 79));
    assert!(summaries[1].is_drum);
    assert_eq!(summaries[1].index, 1);
}
