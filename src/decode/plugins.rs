//! Plugin extraction and merging
//!
//! Two independent evidence sources:
//!
//! 1. Parameter-chunk blocks (`PresetChunkXMLTree`): embedded XML-ish
//!    sub-documents carrying a plugin name and saved parameter state.
//! 2. Processor-name records (`Plugin Name`): one per plugin the mixer
//!    knows about, including secondary references.
//!
//! Records are merged with nearby chunk data, deduplicated by normalized
//! name and proximity, and assigned to the nearest preceding track strip.

use std::collections::BTreeMap;

use log::debug;

use crate::model::{PluginInstance, Track, TrackType};
use crate::scan::{self, Pattern};

use super::{params, LocatedTrack, CHUNK_MERGE_WINDOW, CHUNK_REGION, INSERT_LOOKBACK, PLUGIN_DEDUP_WINDOW};

/// Host-internal channel components that are not user plugins.
const BUILTIN_COMPONENTS: &[&str] = &[
    "Standard Panner",
    "Stereo Combined Panner",
    "Input Filter",
    "EQ",
    "Mono Panner",
    "Surround Panner",
    "Sampler Track",
];

const CHUNK_MARKER: &[u8] = b"PresetChunkXMLTree";
const RECORD_MARKER: &[u8] = b"Plugin Name\x00";
/// Slot designators that mark a processor-name record as an insert.
const SLOT_MARKERS: &[&[u8]] = &[b"Slot\x00", b"Bay Program\x00"];

/// Plugin evidence tied to its byte offset.
#[derive(Debug, Clone)]
struct Evidence {
    plugin: PluginInstance,
    offset: usize,
    insert: bool,
}

/// Extract all plugin evidence and attach it to the located tracks.
/// Synthesizes a Master track when evidence exists but no track does.
pub fn extract_and_assign(data: &[u8], located: &mut Vec<LocatedTrack>) {
    let chunks = index_chunks(data);
    let records = name_records(data, &chunks);
    let deduped = deduplicate(records);
    if deduped.is_empty() {
        return;
    }
    debug!(
        "{} plugins after dedup ({} inserts)",
        deduped.len(),
        deduped.iter().filter(|e| e.insert).count()
    );

    if located.is_empty() {
        located.push(LocatedTrack {
            track: Track {
                name: "Master".to_string(),
                track_type: TrackType::Master,
                ..Default::default()
            },
            offset: 0,
        });
    }

    // Nearest preceding strip wins; evidence before the first strip goes to
    // the first track. `located` is offset-sorted.
    for evidence in deduped {
        let idx = match located.iter().rposition(|t| t.offset <= evidence.offset) {
            Some(i) => i,
            None => 0,
        };
        let track = &mut located[idx].track;
        let mut plugin = evidence.plugin;
        plugin.slot_index = track.plugins.len();
        track.plugins.push(plugin);
    }
}

/// Strip mono/stereo channel-count suffixes for name comparison.
fn normalized(name: &str) -> String {
    name.replace(" Mono/Stereo", "")
        .replace(" Mono", "")
        .replace(" Stereo", "")
}

/// Richness of one piece of evidence; the fuller entry survives dedup.
fn payload_score(plugin: &PluginInstance) -> usize {
    plugin.eq_bands.len()
        + plugin.parameters.len()
        + if plugin.compressor.is_some() { 2 } else { 0 }
}

// === Parameter-chunk blocks ===

/// Parse every parameter-chunk block, keyed by ascending offset.
fn index_chunks(data: &[u8]) -> BTreeMap<usize, PluginInstance> {
    let mut chunks = BTreeMap::new();
    for pos in scan::find_all(data, CHUNK_MARKER) {
        let region = &data[pos..(pos + CHUNK_REGION).min(data.len())];
        let Some(name) = text_between(region, b"<PluginName>", b"</PluginName>") else {
            continue;
        };
        let preset = quoted_after(region, b"<Preset Name=\"").unwrap_or_default();

        let mut plugin = PluginInstance::named(&name);
        if let Some(raw) = realworld_text(region) {
            let values = params::parse_vector(&raw);
            params::interpret_vector(&mut plugin, &name, &values, &preset);
        }

        // Fallback: attribute-style name/value pairs
        if plugin.parameters.is_empty()
            && plugin.eq_bands.is_empty()
            && plugin.compressor.is_none()
        {
            for (key, value) in attribute_params(region) {
                plugin.parameters.insert(key, value);
            }
            if !plugin.parameters.is_empty() {
                params::interpret_named(&mut plugin);
            }
        }

        chunks.insert(pos, plugin);
    }
    if !chunks.is_empty() {
        debug!("indexed {} parameter-chunk blocks", chunks.len());
    }
    chunks
}

/// UTF-8 text between two tags, if both appear in order.
fn text_between(region: &[u8], open: &[u8], close: &[u8]) -> Option<String> {
    let start = scan::find_first(region, open)? + open.len();
    let len = scan::find_first(&region[start..], close)?;
    Some(String::from_utf8_lossy(&region[start..start + len]).into_owned())
}

/// Quoted attribute value following `marker` (which ends with `="`).
fn quoted_after(region: &[u8], marker: &[u8]) -> Option<String> {
    let start = scan::find_first(region, marker)? + marker.len();
    let len = scan::find_first(&region[start..], b"\"")?;
    Some(String::from_utf8_lossy(&region[start..start + len]).into_owned())
}

/// The RealWorld parameter text of the active A setup: the `<Parameters
/// Type="RealWorld">` payload following `Setup="SETUP_A"`.
fn realworld_text(region: &[u8]) -> Option<String> {
    let setup = scan::find_first(region, b"Setup=\"SETUP_A\"")?;
    let tail = &region[setup..];
    let open = scan::find_first(tail, b"Type=\"RealWorld\">")? + b"Type=\"RealWorld\">".len();
    let len = scan::find_first(&tail[open..], b"<")?;
    Some(
        String::from_utf8_lossy(&tail[open..open + len])
            .trim()
            .to_string(),
    )
}

/// Attribute-style `name="..." value="..."` pairs, either capitalization.
fn attribute_params(region: &[u8]) -> Vec<(String, f64)> {
    let mut pairs = Vec::new();
    for name_marker in [&b"name=\""[..], &b"Name=\""[..]] {
        for pos in scan::find_all(region, name_marker) {
            let tail = &region[pos + name_marker.len()..];
            let Some(key_len) = scan::find_first(tail, b"\"") else {
                continue;
            };
            let key = String::from_utf8_lossy(&tail[..key_len]).into_owned();
            // the value attribute must follow within the same tag
            let rest = &tail[key_len..];
            let tag_end = scan::find_first(rest, b">").unwrap_or(rest.len());
            let in_tag = &rest[..tag_end];
            let value_at = scan::find_first(in_tag, b"value=\"")
                .or_else(|| scan::find_first(in_tag, b"Value=\""));
            let Some(value_at) = value_at else { continue };
            let vtail = &in_tag[value_at + 7..];
            let Some(value_len) = scan::find_first(vtail, b"\"") else {
                continue;
            };
            let text = String::from_utf8_lossy(&vtail[..value_len]);
            if let Ok(value) = text.parse::<f64>() {
                pairs.push((key, value));
            }
        }
    }
    pairs
}

// === Processor-name records ===

/// All processor-name records, merged with nearby chunk data when the
/// normalized names agree.
fn name_records(data: &[u8], chunks: &BTreeMap<usize, PluginInstance>) -> Vec<Evidence> {
    let pattern = Pattern::lit(RECORD_MARKER).gap(8).printable(2, 50);
    let mut records = Vec::new();
    for hit in pattern.find_iter(data) {
        let name = String::from_utf8_lossy(hit.cap(data, 0)).trim().to_string();
        if name.is_empty() || BUILTIN_COMPONENTS.contains(&name.as_str()) {
            continue;
        }

        let before = &data[hit.start.saturating_sub(INSERT_LOOKBACK)..hit.start];
        let insert = SLOT_MARKERS
            .iter()
            .any(|m| scan::find_first(before, m).is_some());

        let plugin = merge_chunk(&name, hit.start, chunks)
            .unwrap_or_else(|| PluginInstance::named(&name));
        records.push(Evidence {
            plugin,
            offset: hit.start,
            insert,
        });
    }
    records
}

/// Adopt a nearby chunk's payload while keeping the record's display name.
fn merge_chunk(
    name: &str,
    offset: usize,
    chunks: &BTreeMap<usize, PluginInstance>,
) -> Option<PluginInstance> {
    let base = normalized(name);
    for (&chunk_pos, chunk) in chunks {
        if chunk_pos.abs_diff(offset) > CHUNK_MERGE_WINDOW {
            continue;
        }
        if normalized(&chunk.name) == base {
            return Some(PluginInstance {
                name: name.to_string(),
                eq_bands: chunk.eq_bands.clone(),
                compressor: chunk.compressor.clone(),
                parameters: chunk.parameters.clone(),
                bypassed: chunk.bypassed,
                ..Default::default()
            });
        }
    }
    None
}

/// Collapse runs of same-normalized-name evidence within
/// [`PLUGIN_DEDUP_WINDOW`], keeping the richest payload. Ties keep the
/// earlier offset.
fn deduplicate(mut records: Vec<Evidence>) -> Vec<Evidence> {
    records.sort_by_key(|e| e.offset);
    let mut deduped: Vec<Evidence> = Vec::new();
    let mut i = 0;
    while i < records.len() {
        let base = normalized(&records[i].plugin.name);
        let start_offset = records[i].offset;
        let mut best = i;
        let mut j = i + 1;
        while j < records.len() {
            if records[j].offset - start_offset > PLUGIN_DEDUP_WINDOW {
                break;
            }
            if normalized(&records[j].plugin.name) != base {
                break;
            }
            if payload_score(&records[j].plugin) > payload_score(&records[best].plugin) {
                best = j;
            }
            j += 1;
        }
        deduped.push(records[best].clone());
        i = if j > i + 1 { j } else { i + 1 };
    }
    deduped
}
