//! Version, sample rate, and tempo extraction
//!
//! All three live in fixed marker neighborhoods. These are heuristic
//! best-effort lookups: a missing marker leaves the field at its default
//! (sample rate 44100, tempo 120.0, empty version string).

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::model::Project;
use crate::scan;

use super::{SAMPLE_RATE_WINDOW, TEMPO_WINDOW, VERSION_WINDOW};

/// Version markers, newest first so the most specific string wins.
const VERSION_MARKERS: &[&[u8]] = &[
    b"Cubase 15",
    b"Cubase 14",
    b"Cubase 13",
    b"Cubase 12",
    b"Cubase 11",
    b"Cubase 10",
];

const SAMPLE_RATE_MARKERS: &[&[u8]] = &[b"SampleRate", b"Record Format", b"SRateForAudioIO"];

/// Rates worth believing; anything else in the window is noise.
const KNOWN_SAMPLE_RATES: &[u32] = &[44100, 48000, 88200, 96000, 176400, 192000];

const TEMPO_MARKERS: &[&[u8]] = &[b"TempoEvent", b"MTempoTrackEvent"];

/// Plausible tempo range in BPM, exclusive on both ends.
const TEMPO_MIN: f64 = 30.0;
const TEMPO_MAX: f64 = 300.0;

pub fn extract(data: &[u8], project: &mut Project) {
    extract_version(data, project);
    extract_sample_rate(data, project);
    extract_tempo(data, project);
}

/// The version string runs from its marker to the next NUL, which must
/// appear within [`VERSION_WINDOW`] bytes.
fn extract_version(data: &[u8], project: &mut Project) {
    for marker in VERSION_MARKERS {
        let Some(pos) = scan::find_first(data, marker) else {
            continue;
        };
        if let Some(nul) = scan::find_first(&data[pos..], b"\x00") {
            if nul < VERSION_WINDOW {
                project.version = String::from_utf8_lossy(&data[pos..pos + nul]).into_owned();
                return;
            }
        }
    }
}

/// The rate appears as a 4-byte integer, little- or big-endian depending on
/// the field, somewhere within the window after a marker. First known rate
/// wins.
fn extract_sample_rate(data: &[u8], project: &mut Project) {
    for marker in SAMPLE_RATE_MARKERS {
        let Some(pos) = scan::find_first(data, marker) else {
            continue;
        };
        let region = &data[pos..(pos + SAMPLE_RATE_WINDOW).min(data.len())];
        for &rate in KNOWN_SAMPLE_RATES {
            let mut le = [0u8; 4];
            LittleEndian::write_u32(&mut le, rate);
            let mut be = [0u8; 4];
            BigEndian::write_u32(&mut be, rate);
            if scan::find_first(region, &le).is_some() || scan::find_first(region, &be).is_some() {
                project.sample_rate = rate;
                return;
            }
        }
    }
}

/// Tempo is a little-endian double on a 4-byte alignment somewhere in the
/// window after a tempo-event marker. The first value in the plausible BPM
/// range wins, rounded to two decimals.
fn extract_tempo(data: &[u8], project: &mut Project) {
    for marker in TEMPO_MARKERS {
        let Some(pos) = scan::find_first(data, marker) else {
            continue;
        };
        let region = &data[pos..(pos + TEMPO_WINDOW).min(data.len())];
        if region.len() < 8 {
            continue;
        }
        for offset in (0..=region.len() - 8).step_by(4) {
            let value = LittleEndian::read_f64(&region[offset..offset + 8]);
            if value > TEMPO_MIN && value < TEMPO_MAX {
                project.tempo = (value * 100.0).round() / 100.0;
                return;
            }
        }
    }
}
