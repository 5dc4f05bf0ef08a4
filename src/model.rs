//! Project model
//!
//! The immutable aggregate produced by one decoding pass. All entities are
//! created during decoding and never mutated afterwards; collaborators (UI,
//! exporters, cleanup tools) only read through the query methods here.
//!
//! Serializes to a field-for-field JSON mirror with enums rendered as
//! lowercase strings.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Semantic track type, derived from channel type identifiers in the binary
/// data with a name-based fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Audio,
    Instrument,
    Midi,
    Fx,
    Group,
    Vca,
    Master,
    Folder,
    #[default]
    Unknown,
}

/// Equalizer band shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandShape {
    LowCut,
    LowShelf,
    #[default]
    Peak,
    HighShelf,
    HighCut,
    Notch,
}

/// One equalizer band recovered from plugin parameter data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EQBand {
    pub enabled: bool,
    pub shape: BandShape,
    /// Center/corner frequency in Hz
    pub frequency: f64,
    /// Gain in dB
    pub gain: f64,
    pub q: f64,
}

impl Default for EQBand {
    fn default() -> Self {
        Self {
            enabled: true,
            shape: BandShape::Peak,
            frequency: 1000.0,
            gain: 0.0,
            q: 1.0,
        }
    }
}

/// Compressor settings recovered from plugin parameter data.
///
/// The `raw` map keeps every parameter that fed these fields, for
/// provenance; nothing is discarded during interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorSettings {
    pub plugin_name: String,
    /// Threshold in dB
    pub threshold: f64,
    /// Ratio, conventionally >= 1
    pub ratio: f64,
    /// Attack in ms
    pub attack: f64,
    /// Release in ms
    pub release: f64,
    /// Knee in dB
    pub knee: f64,
    pub makeup_gain: f64,
    pub input_gain: f64,
    pub output_gain: f64,
    #[serde(default)]
    pub raw: BTreeMap<String, f64>,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            plugin_name: String::new(),
            threshold: 0.0,
            ratio: 1.0,
            attack: 10.0,
            release: 100.0,
            knee: 0.0,
            makeup_gain: 0.0,
            input_gain: 0.0,
            output_gain: 0.0,
            raw: BTreeMap::new(),
        }
    }
}

impl CompressorSettings {
    /// Create settings attributed to the given plugin, other fields default.
    pub fn for_plugin(name: &str) -> Self {
        Self {
            plugin_name: name.to_string(),
            ..Default::default()
        }
    }
}

/// One send slot on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendSlot {
    /// Resolved target bus name
    pub target: String,
    /// Send level in dB
    pub level_db: f64,
    pub enabled: bool,
}

/// A plugin instance in a track's insert chain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginInstance {
    pub name: String,
    /// Position in the chain (signal order)
    pub slot_index: usize,
    pub bypassed: bool,
    #[serde(default)]
    pub eq_bands: Vec<EQBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressor: Option<CompressorSettings>,
    /// Interpreted and generic numeric parameters by name.
    /// Insertion order is irrelevant; a sorted map keeps output stable.
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl PluginInstance {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// One track or bus in the project.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub track_type: TrackType,
    pub index: usize,
    #[serde(default)]
    pub plugins: Vec<PluginInstance>,
    /// Audio files referenced within this track's data region
    #[serde(default)]
    pub audio_files: Vec<String>,
    /// Resolved output routing target, when one was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bus: Option<String>,
    #[serde(default)]
    pub sends: Vec<SendSlot>,
    /// True when the track carries events or is a structural bus
    pub has_content: bool,
}

/// A cycle/position marker. Positions are rarely resolvable from the binary
/// layout and default to 0.0 beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    /// Position in beats, 0.0 when unresolved
    pub position: f64,
    pub id: usize,
}

/// Root aggregate for one decoded project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Cubase version string, empty when no version marker was found
    pub version: String,
    pub sample_rate: u32,
    /// Tempo in beats per minute
    pub tempo: f64,
    /// Size of the decoded buffer in bytes
    pub file_size: usize,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// All referenced audio filenames, lower-cased for case-insensitive
    /// matching against files on disk
    #[serde(default)]
    pub referenced_audio: BTreeSet<String>,
}

impl Project {
    /// Default sample rate when no marker is found.
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
    /// Default tempo when no tempo event is found.
    pub const DEFAULT_TEMPO: f64 = 120.0;

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: String::new(),
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            tempo: Self::DEFAULT_TEMPO,
            file_size: 0,
            tracks: Vec::new(),
            markers: Vec::new(),
            referenced_audio: BTreeSet::new(),
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn plugin_count(&self) -> usize {
        self.tracks.iter().map(|t| t.plugins.len()).sum()
    }

    pub fn audio_track_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.track_type == TrackType::Audio)
            .count()
    }

    /// All (track, plugin) pairs in track and slot order.
    pub fn all_plugins(&self) -> Vec<(&Track, &PluginInstance)> {
        self.tracks
            .iter()
            .flat_map(|t| t.plugins.iter().map(move |p| (t, p)))
            .collect()
    }

    /// Plugins grouped by display name, in track and slot order.
    pub fn plugins_by_name(&self) -> BTreeMap<&str, Vec<(&Track, &PluginInstance)>> {
        let mut by_name: BTreeMap<&str, Vec<(&Track, &PluginInstance)>> = BTreeMap::new();
        for (track, plugin) in self.all_plugins() {
            by_name.entry(plugin.name.as_str()).or_default().push((track, plugin));
        }
        by_name
    }
}
