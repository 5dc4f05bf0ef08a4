//! Global postprocessing
//!
//! Runs after all per-region extraction: drop self-reference plugin
//! artifacts, collapse same-named tracks onto the richest entry, filter
//! binary-artifact names, flag content, and reindex the survivors into a
//! contiguous 0-based sequence.

use std::collections::{HashMap, HashSet};

use crate::model::{Project, Track, TrackType};

/// Reversed 4-byte field tags and container names that surface as fake
/// track names in damaged windows.
const ARTIFACT_NAMES: &[&str] = &[
    "aLoC", "daPN", "shtE", "DILT", "braF", "dpxE", "oloS", "sklC", "iCVT", "BuTT", "BlTT",
    "kcoL", "adcn", "Pler", "GLFX", "TDRH", "IVffO", "CmArray", "CmContainer", "BaSE", "mAsT",
];

/// Minimum chars for a plugin-less track name to be believable.
const MIN_NAME_LEN: usize = 3;

/// How much useful data a track carries; the richer duplicate survives.
fn track_score(track: &Track) -> usize {
    let mut score = track.plugins.len();
    for plugin in &track.plugins {
        score += plugin.eq_bands.len();
        score += plugin.parameters.len();
        if plugin.compressor.is_some() {
            score += 2;
        }
    }
    score
}

fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_NAMES.contains(&name)
}

pub fn run(project: &mut Project) {
    // A plugin named after its own track is a scan artifact, not a plugin.
    for track in &mut project.tracks {
        let track_name = track.name.to_lowercase();
        track
            .plugins
            .retain(|p| p.name.to_lowercase() != track_name);
    }

    // Collapse exact-name duplicates, keeping the richer entry in the
    // original position. Equal nonzero scores merge plugin lists instead.
    let mut order: Vec<Track> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    for track in project.tracks.drain(..) {
        match index_by_name.get(&track.name) {
            None => {
                index_by_name.insert(track.name.clone(), order.len());
                order.push(track);
            }
            Some(&at) => {
                let existing_score = track_score(&order[at]);
                let new_score = track_score(&track);
                if new_score > existing_score {
                    order[at] = track;
                } else if new_score == existing_score && new_score > 0 {
                    let existing: HashSet<String> =
                        order[at].plugins.iter().map(|p| p.name.clone()).collect();
                    for plugin in track.plugins {
                        if !existing.contains(&plugin.name) {
                            order[at].plugins.push(plugin);
                        }
                    }
                }
            }
        }
    }

    let mut survivors: Vec<Track> = Vec::new();
    for mut track in order {
        // binary artifacts: no letters, implausibly short, or a known token
        if !track.name.chars().any(|c| c.is_alphabetic()) {
            continue;
        }
        if track.name.chars().count() < MIN_NAME_LEN && track.plugins.is_empty() {
            continue;
        }
        if is_artifact_name(&track.name) {
            continue;
        }

        track.has_content = track.has_content
            || !track.audio_files.is_empty()
            || matches!(
                track.track_type,
                // generative or structural tracks carry content by nature
                TrackType::Instrument
                    | TrackType::Midi
                    | TrackType::Group
                    | TrackType::Fx
                    | TrackType::Master
            );
        if !track.has_content && track.plugins.is_empty() {
            continue;
        }
        survivors.push(track);
    }

    for (i, track) in survivors.iter_mut().enumerate() {
        track.index = i;
        for (j, plugin) in track.plugins.iter_mut().enumerate() {
            plugin.slot_index = j;
        }
    }
    project.tracks = survivors;
}
