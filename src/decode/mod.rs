//! Decoding pipeline
//!
//! One synchronous pass over an immutable byte buffer. Each stage scans the
//! buffer independently and hands explicit intermediate collections to the
//! next stage; nothing is mutated across stages except the accumulating
//! model. Every stage is skippable: missing evidence falls back to defaults
//! or empty collections.
//!
//! Stage order follows the dependency chain: metadata and track location
//! first, then plugin evidence (needs strip offsets), then routing (needs
//! the bus table and strip offsets), then global postprocessing.

pub mod audio;
pub mod markers;
pub mod metadata;
pub mod params;
pub mod plugins;
pub mod postprocess;
pub mod routing;
pub mod tracks;

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{CprError, Result};
use crate::model::{Project, Track};
use crate::scan;

// Heuristic window sizes and gap thresholds, tuned empirically against
// sample projects. Offsets are in bytes of the raw buffer.

/// Version string must terminate (NUL) within this many bytes of its marker.
pub const VERSION_WINDOW: usize = 50;
/// Sample-rate integers are searched within this window after a marker.
pub const SAMPLE_RATE_WINDOW: usize = 100;
/// Tempo doubles are searched within this window after a marker.
pub const TEMPO_WINDOW: usize = 200;
/// Same-named channel strips closer than this are one logical track.
pub const STRIP_DEDUP_WINDOW: usize = 40_000;
/// A gap this large between consecutive strips starts the hardware I/O
/// section.
pub const IO_SECTION_GAP: usize = 1_000_000;
/// Bytes of a parameter-chunk block scanned for embedded tags.
pub const CHUNK_REGION: usize = 5_000;
/// Maximum distance between a processor-name record and the chunk block it
/// merges with.
pub const CHUNK_MERGE_WINDOW: usize = 5_000;
/// Same-named plugin evidence closer than this collapses to one entry.
pub const PLUGIN_DEDUP_WINDOW: usize = 20_000;
/// A slot designator this close before a processor-name record marks an
/// insert.
pub const INSERT_LOOKBACK: usize = 300;
/// Bytes of a bus-definition record scanned for name and identifier.
pub const BUS_RECORD_REGION: usize = 500;
/// Upper bound on one track's search region.
pub const TRACK_REGION_LIMIT: usize = 200_000;
/// Bytes of a send section covering up to [`MAX_SENDS`] slots.
pub const SEND_REGION: usize = 10_240;
/// Send slots per track.
pub const MAX_SENDS: usize = 8;
/// Region searched for a name near a legacy marker.
pub const NEARBY_NAME_WINDOW: usize = 500;
/// Audio filenames this short (bytes, extension included) are noise.
pub const MIN_AUDIO_NAME_LEN: usize = 5;

/// A track paired with the byte offset of the record that produced it.
/// Offsets are the positional key for every later stage: plugin
/// assignment, routing regions, per-track audio references.
#[derive(Debug, Clone)]
pub struct LocatedTrack {
    pub track: Track,
    pub offset: usize,
}

/// Decode an in-memory project buffer. Infallible: a buffer with no
/// recognizable structure decodes to an empty project with defaults.
pub fn decode_bytes(data: &[u8], name: &str) -> Project {
    let mut project = Project::new(name);
    project.file_size = data.len();

    metadata::extract(data, &mut project);

    let mut located = tracks::locate(data);
    debug!("located {} tracks", located.len());

    audio::collect_references(data, &mut project);
    plugins::extract_and_assign(data, &mut located);
    markers::extract(data, &mut project);

    let buses = routing::bus_table(data);
    debug!("bus table has {} entries", buses.len());
    routing::resolve_outputs(data, &buses, &mut located);
    routing::resolve_sends(data, &buses, &mut located);

    audio::assign_per_track(data, &mut located);

    project.tracks = located.into_iter().map(|lt| lt.track).collect();
    postprocess::run(&mut project);

    debug!(
        "decoded project: {} tracks, {} plugins",
        project.track_count(),
        project.plugin_count()
    );
    project
}

/// Read and decode a project file. The read is the only fallible step.
pub fn decode_file(path: &Path) -> Result<Project> {
    let data = fs::read(path).map_err(|source| CprError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(decode_bytes(&data, &name))
}

/// Nearest plausible UTF-16LE name after `pos`: a wide run of 2..=80
/// characters containing a letter and not echoing a track-event marker.
/// Shared by the legacy track fallback and marker extraction.
pub(crate) fn wide_name_near(data: &[u8], pos: usize) -> Option<String> {
    let end = (pos + NEARBY_NAME_WINDOW).min(data.len());
    if pos >= end {
        return None;
    }
    const MARKER_ECHOES: &[&str] = &[
        "MTrack", "MAudio", "MInstr", "MSampl", "MMidi", "MFX", "MGroup",
    ];
    for run in scan::wide_runs(&data[pos..end], 3, 50, scan::is_wide_name_byte) {
        let text = run.text.trim().to_string();
        if text.len() < 2 || text.len() > 80 {
            continue;
        }
        if MARKER_ECHOES.iter().any(|m| text.starts_with(m)) {
            continue;
        }
        if text.chars().any(|c| c.is_alphabetic()) {
            return Some(text);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_decodes_to_defaults() {
        let project = decode_bytes(&[], "empty");
        assert_eq!(project.name, "empty");
        assert_eq!(project.file_size, 0);
        assert!(project.tracks.is_empty());
        assert!(project.markers.is_empty());
        assert_eq!(project.sample_rate, Project::DEFAULT_SAMPLE_RATE);
        assert_eq!(project.tempo, Project::DEFAULT_TEMPO);
    }

    #[test]
    fn test_nul_buffer_decodes_to_defaults() {
        let project = decode_bytes(&[0u8; 4096], "nuls");
        assert!(project.tracks.is_empty());
        assert_eq!(project.file_size, 4096);
        assert!(project.referenced_audio.is_empty());
    }

    #[test]
    fn test_decode_is_deterministic() {
        let mut data = Vec::new();
        data.extend_from_slice(b"Cubase 14\x00");
        data.extend_from_slice(b"some_take.wav\x00");
        data.resize(2000, 0);
        let a = decode_bytes(&data, "p");
        let b = decode_bytes(&data, "p");
        assert_eq!(a, b);
    }

    #[test]
    fn test_wide_name_near_skips_marker_echo() {
        let mut data = vec![0u8; 8];
        for &c in b"MTrackX" {
            data.push(c);
            data.push(0);
        }
        for &c in b"Lead" {
            data.push(c);
            data.push(0);
        }
        data.push(1);
        // The echo run and the name run are contiguous wide pairs, so they
        // decode as one run starting with the echo prefix; only a split run
        // yields the name.
        assert_eq!(wide_name_near(&data, 0), None);

        let mut data = vec![0u8; 8];
        for &c in b"MTrackX" {
            data.push(c);
            data.push(0);
        }
        data.push(1);
        data.push(1);
        for &c in b"Lead" {
            data.push(c);
            data.push(0);
        }
        assert_eq!(wide_name_near(&data, 0).as_deref(), Some("Lead"));
    }
}
