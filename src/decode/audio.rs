//! Audio file references
//!
//! Filenames appear in the buffer as plain ASCII and as UTF-16LE wide
//! strings. The global pass fills the project-wide lower-cased reference
//! set used for case-insensitive matching against files on disk; the
//! per-track pass attributes `.wav` names to the track region they appear
//! in, stopping at the media pool area.

use std::collections::BTreeSet;

use crate::model::Project;
use crate::scan;

use super::{LocatedTrack, MIN_AUDIO_NAME_LEN};

/// Extensions matched in ASCII, `.wav` first as the overwhelmingly common
/// case; wide-string matching is `.wav`-only, as in real project files.
const AUDIO_EXTENSIONS: &[&str] = &[".wav", ".mp3", ".flac", ".aif", ".aiff", ".ogg", ".m4a"];

/// Marker that opens the media pool; per-track regions never cross it.
const POOL_MARKER: &[u8] = b"Pool\x00";

/// Maximal runs of filename characters in `data`, as (start, end) pairs.
fn filename_runs(data: &[u8]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &b) in data.iter().enumerate() {
        match (scan::is_filename_byte(b), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, data.len()));
    }
    runs
}

/// Case-insensitive position of the last occurrence of `needle` in `hay`.
fn rfind_nocase(hay: &str, needle: &str) -> Option<usize> {
    hay.to_ascii_lowercase().rfind(&needle.to_ascii_lowercase())
}

pub fn collect_references(data: &[u8], project: &mut Project) {
    let mut referenced: BTreeSet<String> = BTreeSet::new();

    // ASCII names: within each filename-character run, each extension
    // claims up to its last occurrence.
    for (start, end) in filename_runs(data) {
        let text = String::from_utf8_lossy(&data[start..end]);
        for ext in AUDIO_EXTENSIONS {
            if let Some(idx) = rfind_nocase(&text, ext) {
                let name = text[..idx + ext.len()].trim();
                if name.len() >= MIN_AUDIO_NAME_LEN {
                    referenced.insert(name.to_lowercase());
                }
            }
        }
    }

    // UTF-16LE names: wide runs of filename characters ending in "wav".
    for run in scan::wide_runs(data, 4, 256, scan::is_filename_byte) {
        if let Some(idx) = rfind_nocase(&run.text, "wav") {
            let name = run.text[..idx + 3].trim();
            if name.len() >= MIN_AUDIO_NAME_LEN {
                referenced.insert(name.to_lowercase());
            }
        }
    }

    project.referenced_audio = referenced;
}

/// Attribute `.wav` references to tracks by data region: [strip offset,
/// next strip offset), clamped to before the pool. Names keep their
/// original casing here; only the global set is lower-cased.
pub fn assign_per_track(data: &[u8], located: &mut [LocatedTrack]) {
    if located.is_empty() {
        return;
    }
    let pool_pos = scan::find_first(data, POOL_MARKER).unwrap_or(data.len());

    let offsets: Vec<usize> = located.iter().map(|t| t.offset).collect();
    for (i, entry) in located.iter_mut().enumerate() {
        if entry.offset >= pool_pos {
            continue;
        }
        let next = offsets.get(i + 1).copied().unwrap_or(pool_pos);
        let region_end = next.min(pool_pos).min(data.len());
        let region = &data[entry.offset..region_end];

        let mut files: Vec<String> = Vec::new();
        for (start, end) in filename_runs(region) {
            // the name must end exactly at ".wav" with a NUL terminator
            if region.get(end) != Some(&0u8) {
                continue;
            }
            let text = String::from_utf8_lossy(&region[start..end]);
            let lower = text.to_ascii_lowercase();
            if !lower.ends_with(".wav") {
                continue;
            }
            let name = text.trim().to_string();
            if name.len() >= MIN_AUDIO_NAME_LEN && !files.contains(&name) {
                files.push(name);
            }
        }
        entry.track.audio_files = files;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;

    fn wide(text: &str) -> Vec<u8> {
        text.bytes().flat_map(|b| [b, 0]).collect()
    }

    #[test]
    fn test_ascii_wav_reference() {
        let mut data = vec![0u8; 20];
        data.extend_from_slice(b"vocal_take_01.wav");
        data.resize(60, 0);
        let mut project = Project::new("p");
        collect_references(&data, &mut project);
        assert!(project.referenced_audio.contains("vocal_take_01.wav"));
    }

    #[test]
    fn test_reference_is_lowercased() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(b"Kick IN.WAV");
        data.push(0);
        let mut project = Project::new("p");
        collect_references(&data, &mut project);
        assert!(project.referenced_audio.contains("kick in.wav"));
    }

    #[test]
    fn test_short_names_excluded() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(b".wav");
        data.push(0);
        data.extend_from_slice(b"a.mp3");
        data.push(0);
        let mut project = Project::new("p");
        collect_references(&data, &mut project);
        assert!(project.referenced_audio.contains("a.mp3"));
        assert_eq!(project.referenced_audio.len(), 1);
    }

    #[test]
    fn test_wide_wav_reference() {
        let mut data = vec![0u8; 10];
        data.extend_from_slice(&wide("guitar dbl.wav"));
        data.push(1);
        let mut project = Project::new("p");
        collect_references(&data, &mut project);
        assert!(project.referenced_audio.contains("guitar dbl.wav"));
    }

    #[test]
    fn test_other_extensions() {
        let mut data = vec![0u8; 2];
        for name in ["loop.flac", "ref mix.mp3", "bounce.aiff"] {
            data.extend_from_slice(name.as_bytes());
            data.push(0);
        }
        let mut project = Project::new("p");
        collect_references(&data, &mut project);
        for name in ["loop.flac", "ref mix.mp3", "bounce.aiff"] {
            assert!(project.referenced_audio.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_per_track_assignment_stops_at_pool() {
        let mut data = vec![0u8; 8];
        let first = data.len();
        data.extend_from_slice(b"\x01\x01");
        data.extend_from_slice(b"kick.wav\x00");
        data.resize(200, 0);
        let second = data.len();
        data.extend_from_slice(b"snare.wav\x00");
        data.resize(400, 0);
        data.extend_from_slice(b"Pool\x00");
        data.extend_from_slice(b"pooled.wav\x00");
        let mut located = vec![
            LocatedTrack {
                track: Track::default(),
                offset: first,
            },
            LocatedTrack {
                track: Track::default(),
                offset: second,
            },
        ];
        assign_per_track(&data, &mut located);
        assert_eq!(located[0].track.audio_files, vec!["kick.wav"]);
        assert_eq!(located[1].track.audio_files, vec!["snare.wav"]);
    }

    #[test]
    fn test_per_track_requires_nul_terminator() {
        let mut data = b"\x02\x02mix.wavX".to_vec();
        data.resize(64, 0);
        let mut located = vec![LocatedTrack {
            track: Track::default(),
            offset: 0,
        }];
        assign_per_track(&data, &mut located);
        assert!(located[0].track.audio_files.is_empty());
    }
}
