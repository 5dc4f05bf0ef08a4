//! Track location and classification
//!
//! Primary strategy: channel-strip records, found by a bounded-gap pattern
//! that captures the strip name between two field markers. Strips are
//! deduplicated, the hardware I/O section is dropped, and types come from
//! channel type-identifier strings assigned by offset proximity.
//!
//! Older project revisions have no channel strips at all; those fall back
//! to per-track-type event markers with UTF-16LE names.

use std::collections::HashMap;

use log::debug;

use crate::model::{Track, TrackType};
use crate::scan::{self, Pattern};

use super::{wide_name_near, LocatedTrack, IO_SECTION_GAP, STRIP_DEDUP_WINDOW};

/// Channel type-identifier prefixes carried in the binary data. These are
/// internal engine identifiers, stable across program language and version.
const TYPE_ID_PREFIXES: &[&str] = &[
    "GroupChannel",
    "FxChannel",
    "Audio",
    "SamplerChannel",
    "Synth",
    "MidiChannel",
    "InputChannel",
    "OutputChannel",
];

/// Legacy per-track-type event markers, used when no strips exist.
const LEGACY_TRACK_MARKERS: &[(&[u8], TrackType)] = &[
    (b"MAudioTrackEvent", TrackType::Audio),
    (b"MInstrumentTrackEvent", TrackType::Instrument),
    (b"MMidiTrackEvent", TrackType::Midi),
    (b"MFXChannelTrackEvent", TrackType::Fx),
    (b"MGroupChannelTrackEvent", TrackType::Group),
    (b"MVCATrackEvent", TrackType::Vca),
    (b"MMixerTrackEvent", TrackType::Master),
    (b"MFolderTrackEvent", TrackType::Folder),
    (b"MMarkerTrackEvent", TrackType::Unknown),
    (b"MSamplerTrackEvent", TrackType::Instrument),
];

/// Single-word names that denote group/folder busses in real sessions.
const GROUP_NAMES: &[&str] = &[
    "drums", "bass", "keys", "gitarre", "guitar", "guitars", "vocals", "vox", "sinti", "strings",
    "synths", "pads", "samples", "percussion", "perc", "horns", "brass", "woodwinds", "fx",
    "effects", "master",
];

pub(crate) fn is_master_name(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "stereo out" | "master" | "main out"
    )
}

/// Locate all tracks, in ascending offset order, with types assigned.
pub fn locate(data: &[u8]) -> Vec<LocatedTrack> {
    let strips = channel_strips(data);
    if strips.is_empty() {
        return legacy_tracks(data);
    }
    let mut located = filter_io_section(deduplicate(strips));
    classify(data, &mut located);
    located
}

/// Channel-strip records: `Name` field, `String` field, the captured strip
/// name, then the `Type`/`InputFilter` fields that every mixer channel
/// carries.
fn channel_strips(data: &[u8]) -> Vec<LocatedTrack> {
    let pattern = Pattern::lit(b"Name\x00")
        .gap(20)
        .then_lit(b"String\x00")
        .gap(10)
        .printable(2, 50)
        .then_lit(b"\x00")
        .gap(30)
        .then_lit(b"Type\x00")
        .gap(20)
        .then_lit(b"InputFilter");

    let mut strips = Vec::new();
    for hit in pattern.find_iter(data) {
        let name = String::from_utf8_lossy(hit.cap(data, 0)).trim().to_string();
        if name.len() < 2 {
            continue;
        }
        strips.push(LocatedTrack {
            track: Track {
                name,
                ..Default::default()
            },
            offset: hit.start,
        });
    }
    debug!("found {} channel strip records", strips.len());
    strips
}

/// Strip definitions are stored twice in places: a repeat of the same name
/// within [`STRIP_DEDUP_WINDOW`] of the kept record is the same logical
/// track. Same-named records farther apart stay distinct, since they carry
/// different chains.
fn deduplicate(strips: Vec<LocatedTrack>) -> Vec<LocatedTrack> {
    let mut kept: Vec<LocatedTrack> = Vec::new();
    let mut last_kept: HashMap<String, usize> = HashMap::new();
    for strip in strips {
        if let Some(&prev) = last_kept.get(&strip.track.name) {
            if strip.offset - prev < STRIP_DEDUP_WINDOW {
                continue;
            }
        }
        last_kept.insert(strip.track.name.clone(), strip.offset);
        kept.push(strip);
    }
    kept
}

/// Everything after the first [`IO_SECTION_GAP`] jump between consecutive
/// strips is the hardware I/O section; only the master bus survives it.
fn filter_io_section(strips: Vec<LocatedTrack>) -> Vec<LocatedTrack> {
    if strips.len() < 2 {
        return strips;
    }
    let io_start = strips
        .windows(2)
        .position(|pair| pair[1].offset - pair[0].offset > IO_SECTION_GAP);
    let Some(io_start) = io_start.map(|i| i + 1) else {
        return strips;
    };

    let mut kept: Vec<LocatedTrack> = strips[..io_start].to_vec();
    for strip in &strips[io_start..] {
        if is_master_name(&strip.track.name) {
            kept.push(strip.clone());
        }
    }
    kept
}

/// All channel type-identifier hits, ascending by offset.
fn type_identifiers(data: &[u8]) -> Vec<(usize, String)> {
    let pattern = Pattern::lit(b"IDString\x00").gap(8).printable(3, 40);
    pattern
        .find_iter(data)
        .filter_map(|hit| {
            let value = String::from_utf8_lossy(hit.cap(data, 0)).into_owned();
            TYPE_ID_PREFIXES
                .iter()
                .any(|p| value.starts_with(p))
                .then_some((hit.start, value))
        })
        .collect()
}

/// Assign a type to every strip.
///
/// Each identifier belongs to the nearest preceding strip, bounded by the
/// next strip's offset; the first identifier in a window wins. Strips with
/// no identifier inherit from the next classified strip, then the previous
/// one. Master-named strips are Master regardless.
fn classify(data: &[u8], strips: &mut [LocatedTrack]) {
    let ids = type_identifiers(data);
    if ids.is_empty() {
        for strip in strips.iter_mut() {
            strip.track.track_type = classify_name(&strip.track.name);
        }
        return;
    }

    // Strips are already offset-sorted; map strip offset -> identifier.
    let offsets: Vec<usize> = strips.iter().map(|s| s.offset).collect();
    let mut by_offset: HashMap<usize, String> = HashMap::new();
    let mut id_idx = 0;
    for (i, &offset) in offsets.iter().enumerate() {
        let next_offset = offsets.get(i + 1).copied().unwrap_or(usize::MAX);
        while id_idx < ids.len() && ids[id_idx].0 <= offset {
            id_idx += 1;
        }
        if let Some((id_pos, id_val)) = ids.get(id_idx) {
            if *id_pos < next_offset {
                by_offset.insert(offset, id_val.clone());
            }
        }
    }

    // Neighbor inference for unmapped strips: a boundary strip belongs to
    // the section that follows it, so the forward neighbor wins.
    for i in 0..offsets.len() {
        if by_offset.contains_key(&offsets[i]) {
            continue;
        }
        let forward = offsets[i + 1..]
            .iter()
            .find_map(|o| by_offset.get(o).cloned());
        let backward = offsets[..i]
            .iter()
            .rev()
            .find_map(|o| by_offset.get(o).cloned());
        if let Some(val) = forward.or(backward) {
            by_offset.insert(offsets[i], val);
        }
    }

    for strip in strips.iter_mut() {
        if is_master_name(&strip.track.name) {
            strip.track.track_type = TrackType::Master;
            continue;
        }
        let id_val = by_offset.get(&strip.offset).map(String::as_str).unwrap_or("");
        strip.track.track_type = if id_val.starts_with("GroupChannel") {
            TrackType::Group
        } else if id_val.starts_with("FxChannel") {
            TrackType::Fx
        } else if id_val.starts_with("SamplerChannel") || id_val.starts_with("Synth") {
            TrackType::Instrument
        } else if id_val.starts_with("OutputChannel") {
            TrackType::Master
        } else if id_val.starts_with("MidiChannel") {
            TrackType::Midi
        } else if id_val.starts_with("Audio") {
            TrackType::Audio
        } else {
            classify_name(&strip.track.name)
        };
    }
}

/// Name-keyword classification, the last resort when no identifier exists
/// in a strip's window (or anywhere in the file).
pub(crate) fn classify_name(name: &str) -> TrackType {
    let lower = name.to_lowercase();
    if is_master_name(name) {
        return TrackType::Master;
    }
    if lower == "stereo in" || lower == "mono in" || is_numbered_mono_in(&lower) {
        return TrackType::Audio;
    }
    if lower.starts_with("group") {
        return TrackType::Group;
    }
    if ["grp", "gruppe", "bus", " ny"].iter().any(|kw| lower.contains(kw)) {
        return TrackType::Group;
    }
    if lower.ends_with(" vocal") || lower.ends_with(" vocals") {
        return TrackType::Group;
    }
    if ["hall", "verb", "delay", "flanger", "chorus", "fx ", "breit", "parallel"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return TrackType::Fx;
    }
    if ["kontakt", "omnisphere", "diva", "retrologue", "beep", "omnivocal"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return TrackType::Instrument;
    }
    if !name.contains(' ') && GROUP_NAMES.contains(&lower.as_str()) {
        return TrackType::Group;
    }
    TrackType::Audio
}

fn is_numbered_mono_in(lower: &str) -> bool {
    lower
        .strip_prefix("mono in ")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Fallback for older formats without channel strips: per-type event
/// markers with a nearby UTF-16LE name. Event markers imply actual track
/// content.
fn legacy_tracks(data: &[u8]) -> Vec<LocatedTrack> {
    let mut raw: Vec<(usize, TrackType, usize)> = Vec::new();
    for (marker, track_type) in LEGACY_TRACK_MARKERS {
        for pos in scan::find_all(data, marker) {
            raw.push((pos, *track_type, marker.len()));
        }
    }
    raw.sort_by_key(|&(pos, _, _)| pos);

    let mut located = Vec::new();
    for (pos, track_type, marker_len) in raw {
        let index = located.len();
        let name = wide_name_near(data, pos + marker_len)
            .unwrap_or_else(|| format!("{} {}", type_label(track_type), index + 1));
        located.push(LocatedTrack {
            track: Track {
                name,
                track_type,
                index,
                has_content: true,
                ..Default::default()
            },
            offset: pos,
        });
    }
    if !located.is_empty() {
        debug!("legacy fallback found {} tracks", located.len());
    }
    located
}

fn type_label(track_type: TrackType) -> &'static str {
    match track_type {
        TrackType::Audio => "Audio",
        TrackType::Instrument => "Instrument",
        TrackType::Midi => "Midi",
        TrackType::Fx => "Fx",
        TrackType::Group => "Group",
        TrackType::Vca => "Vca",
        TrackType::Master => "Master",
        TrackType::Folder => "Folder",
        TrackType::Unknown => "Unknown",
    }
}
