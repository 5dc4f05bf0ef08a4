//! Parameter interpretation
//!
//! Maps raw numeric parameter data to musically meaningful EQ bands and
//! compressor settings for a closed catalog of known plugins, with a
//! generic fallback. Two paths:
//!
//! - the numeric-vector path for RealWorld parameter arrays found in
//!   parameter-chunk blocks (positional index maps per plugin identity)
//! - the named-key path for attribute-style parameter blocks (canonical
//!   key spellings per semantic field)
//!
//! Both paths are lossless: values not covered by a mapping stay reachable
//! as generic parameters.

use std::collections::BTreeMap;

use crate::model::{BandShape, CompressorSettings, EQBand, PluginInstance};

/// Vector positions kept as generic parameters for unknown plugins.
const GENERIC_VECTOR_LIMIT: usize = 20;

/// Interpretation strategy, resolved from the plugin identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorCatalog {
    /// Four-band parametric channel EQ
    ChannelEq,
    /// Channel-strip compressor + EQ combo
    ChannelStrip,
    /// FET-style compressor emulation, fixed 4:1 ratio
    FetCompressor,
    /// Opto-style leveling compressor emulation
    OptoCompressor,
    /// Broadband compressor with high parameter indices
    BandCompressor,
    DeEsser,
    Generic,
}

fn vector_catalog(name: &str) -> VectorCatalog {
    match name {
        "SSLEQ" => VectorCatalog::ChannelEq,
        "SSLChannel" => VectorCatalog::ChannelStrip,
        "CLA-76" | "CLA76" => VectorCatalog::FetCompressor,
        "CLA-2A" | "CLA2A" => VectorCatalog::OptoCompressor,
        "C1Comp" => VectorCatalog::BandCompressor,
        "DeEsser" => VectorCatalog::DeEsser,
        _ => VectorCatalog::Generic,
    }
}

/// Parse a RealWorld parameter string: space-separated floats where `*`
/// means unset. Unparseable tokens are unset, not errors.
pub fn parse_vector(raw: &str) -> Vec<Option<f64>> {
    raw.split_whitespace()
        .map(|token| {
            if token == "*" {
                None
            } else {
                token.parse::<f64>().ok()
            }
        })
        .collect()
}

/// Value at `idx`, or the catalog default for that position.
fn rw(values: &[Option<f64>], idx: usize, default: f64) -> f64 {
    values.get(idx).copied().flatten().unwrap_or(default)
}

/// Interpret a RealWorld vector for the named plugin.
pub fn interpret_vector(
    plugin: &mut PluginInstance,
    name: &str,
    values: &[Option<f64>],
    preset_name: &str,
) {
    match vector_catalog(name) {
        VectorCatalog::ChannelEq => {
            let bands = [
                EQBand {
                    enabled: rw(values, 0, 0.0) > 0.5,
                    shape: if rw(values, 1, 0.0) > 0.5 {
                        BandShape::Peak
                    } else {
                        BandShape::LowShelf
                    },
                    frequency: rw(values, 2, 60.0),
                    gain: rw(values, 4, 0.0),
                    q: 1.0,
                },
                EQBand {
                    enabled: true,
                    shape: BandShape::Peak,
                    frequency: rw(values, 5, 200.0),
                    gain: rw(values, 8, 0.0),
                    q: rw(values, 9, 0.5),
                },
                EQBand {
                    enabled: true,
                    shape: BandShape::Peak,
                    frequency: rw(values, 14, 3.5) * 1000.0,
                    gain: rw(values, 13, 0.0),
                    q: rw(values, 10, 2.5),
                },
                EQBand {
                    enabled: rw(values, 16, 0.0) > 0.5,
                    shape: BandShape::HighShelf,
                    frequency: rw(values, 18, 8.0) * 1000.0,
                    gain: rw(values, 17, 0.0),
                    q: 1.0,
                },
            ];
            plugin.eq_bands = bands
                .into_iter()
                .filter(|b| b.gain != 0.0 || b.enabled)
                .collect();
            plugin
                .parameters
                .insert("Output Trim".to_string(), rw(values, 19, 0.0));
        }
        VectorCatalog::ChannelStrip => {
            if values.len() > 24 {
                let bands = [
                    EQBand {
                        enabled: true,
                        shape: BandShape::LowShelf,
                        frequency: rw(values, 15, 60.0),
                        gain: rw(values, 16, 0.0),
                        q: 1.0,
                    },
                    EQBand {
                        enabled: true,
                        shape: BandShape::Peak,
                        frequency: rw(values, 18, 2.5) * 1000.0,
                        gain: rw(values, 19, 0.0),
                        q: rw(values, 17, 0.5),
                    },
                    EQBand {
                        enabled: true,
                        shape: BandShape::Peak,
                        frequency: rw(values, 20, 3.5) * 1000.0,
                        gain: rw(values, 22, 0.0),
                        q: rw(values, 21, 1.5),
                    },
                    EQBand {
                        enabled: true,
                        shape: BandShape::HighShelf,
                        frequency: rw(values, 24, 8.0) * 1000.0,
                        gain: rw(values, 23, 0.0),
                        q: 1.0,
                    },
                ];
                plugin.eq_bands = bands.into_iter().filter(|b| b.gain != 0.0).collect();
            }
            let threshold = rw(values, 0, 0.0);
            if threshold < 0.0 {
                plugin.compressor = Some(CompressorSettings {
                    threshold,
                    release: rw(values, 3, 0.0),
                    ..CompressorSettings::for_plugin(name)
                });
            }
        }
        VectorCatalog::FetCompressor => {
            let mut comp = CompressorSettings {
                input_gain: rw(values, 0, 0.0),
                output_gain: rw(values, 1, 0.0),
                attack: rw(values, 2, 0.0),
                release: rw(values, 3, 0.0),
                ratio: 4.0,
                ..CompressorSettings::for_plugin(name)
            };
            if !preset_name.is_empty() {
                plugin.parameters.insert("Preset".to_string(), 0.0);
                comp.raw.insert("preset".to_string(), 0.0);
            }
            plugin.compressor = Some(comp);
        }
        VectorCatalog::OptoCompressor => {
            plugin.compressor = Some(CompressorSettings {
                threshold: rw(values, 0, 0.0),
                output_gain: rw(values, 1, 0.0),
                ..CompressorSettings::for_plugin(name)
            });
        }
        VectorCatalog::BandCompressor => {
            plugin.compressor = Some(CompressorSettings {
                threshold: rw(values, 17, 0.0),
                ratio: rw(values, 18, 1.0),
                attack: rw(values, 0, 0.01),
                ..CompressorSettings::for_plugin(name)
            });
        }
        VectorCatalog::DeEsser => {
            plugin
                .parameters
                .insert("Frequency".to_string(), rw(values, 0, 5500.0));
            plugin
                .parameters
                .insert("Threshold".to_string(), rw(values, 2, 0.0));
        }
        VectorCatalog::Generic => {
            for (i, value) in values.iter().take(GENERIC_VECTOR_LIMIT).enumerate() {
                if let Some(v) = value {
                    plugin.parameters.insert(format!("Param_{i}"), *v);
                }
            }
        }
    }
}

// === Named-key path ===

/// Find a parameter by trying multiple key spellings, exact first, then
/// case-insensitive.
fn match_param(params: &BTreeMap<String, f64>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(&v) = params.get(*key) {
            return Some(v);
        }
        for (name, &v) in params {
            if name.eq_ignore_ascii_case(key) {
                return Some(v);
            }
        }
    }
    None
}

fn name_matches(plugin_name: &str, patterns: &[&str]) -> bool {
    let lower = plugin_name.to_lowercase();
    patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
}

/// Interpret already-collected named parameters based on plugin identity.
pub fn interpret_named(plugin: &mut PluginInstance) {
    let name = plugin.name.clone();
    if name_matches(&name, &["SSL", "Channel Strip", "E-Channel", "G-Channel"]) {
        interpret_strip_named(plugin);
    } else if name_matches(&name, &["CLA-76", "CLA76"]) {
        interpret_fet_named(plugin);
    } else if name_matches(&name, &["CLA-2A", "CLA2A"]) {
        interpret_opto_named(plugin);
    } else if name_matches(&name, &["Pro-Q", "ProQ"]) {
        interpret_numbered_bands(plugin);
    } else {
        interpret_generic_eq(plugin);
        interpret_generic_compressor(plugin);
    }
}

/// Channel-strip band layout: (label, shape, default frequency, on key,
/// freq key, gain key, q key).
#[allow(clippy::type_complexity)]
const STRIP_BANDS: &[(&str, BandShape, f64, &str, &str, &str, Option<&str>)] = &[
    ("LF", BandShape::LowShelf, 60.0, "LF Bell", "LF Freq", "LF Gain", None),
    ("LMF", BandShape::Peak, 400.0, "LMF On", "LMF Freq", "LMF Gain", Some("LMF Q")),
    ("HMF", BandShape::Peak, 3000.0, "HMF On", "HMF Freq", "HMF Gain", Some("HMF Q")),
    ("HF", BandShape::HighShelf, 12000.0, "HF Bell", "HF Freq", "HF Gain", None),
];

const STRIP_THRESHOLD_KEYS: &[&str] = &["Comp Threshold", "CompThresh", "Threshold"];
const STRIP_RATIO_KEYS: &[&str] = &["Comp Ratio", "CompRatio", "Ratio"];
const STRIP_ATTACK_KEYS: &[&str] = &["Comp Attack", "CompAttack", "Attack"];
const STRIP_RELEASE_KEYS: &[&str] = &["Comp Release", "CompRelease", "Release"];

fn interpret_strip_named(plugin: &mut PluginInstance) {
    let params = plugin.parameters.clone();

    for &(_, shape, default_freq, on_key, freq_key, gain_key, q_key) in STRIP_BANDS {
        let mut band = EQBand {
            shape,
            frequency: default_freq,
            ..Default::default()
        };
        if let Some(&on) = params.get(on_key) {
            band.enabled = on > 0.5;
        }
        let freq = match_param(&params, &[freq_key]);
        if let Some(f) = freq {
            band.frequency = f;
        }
        let gain = match_param(&params, &[gain_key]);
        if let Some(g) = gain {
            band.gain = g;
        }
        if let Some(q_key) = q_key {
            if let Some(q) = match_param(&params, &[q_key]) {
                band.q = q;
            }
        }
        // a band with neither frequency nor gain data is not real
        if gain.is_some() || freq.is_some() {
            plugin.eq_bands.push(band);
        }
    }

    if let Some(threshold) = match_param(&params, STRIP_THRESHOLD_KEYS) {
        let mut comp = CompressorSettings::for_plugin(&plugin.name);
        comp.threshold = threshold;
        if let Some(ratio) = match_param(&params, STRIP_RATIO_KEYS) {
            comp.ratio = ratio;
        }
        if let Some(attack) = match_param(&params, STRIP_ATTACK_KEYS) {
            comp.attack = attack;
        }
        if let Some(release) = match_param(&params, STRIP_RELEASE_KEYS) {
            comp.release = release;
        }
        comp.raw = params
            .iter()
            .filter(|(k, _)| k.contains("Comp") || k.contains("comp"))
            .map(|(k, &v)| (k.clone(), v))
            .collect();
        plugin.compressor = Some(comp);
    }
}

fn interpret_fet_named(plugin: &mut PluginInstance) {
    let params = plugin.parameters.clone();
    let mut comp = CompressorSettings::for_plugin(&plugin.name);
    if let Some(v) = match_param(&params, &["Input", "input"]) {
        comp.input_gain = v;
    }
    if let Some(v) = match_param(&params, &["Output", "output"]) {
        comp.output_gain = v;
    }
    if let Some(v) = match_param(&params, &["Attack", "attack"]) {
        comp.attack = v;
    }
    if let Some(v) = match_param(&params, &["Release", "release"]) {
        comp.release = v;
    }
    if let Some(v) = match_param(&params, &["Ratio", "ratio"]) {
        comp.ratio = v;
    }
    comp.raw = params;
    plugin.compressor = Some(comp);
}

fn interpret_opto_named(plugin: &mut PluginInstance) {
    let params = plugin.parameters.clone();
    let mut comp = CompressorSettings::for_plugin(&plugin.name);
    if let Some(v) = match_param(&params, &["Peak Reduction", "PeakReduction"]) {
        comp.threshold = v;
    }
    if let Some(v) = match_param(&params, &["Output Gain", "Gain"]) {
        comp.output_gain = v;
    }
    comp.raw = params;
    plugin.compressor = Some(comp);
}

/// Band shape codes used by numbered-band EQs.
fn shape_from_code(code: i64) -> BandShape {
    match code {
        1 => BandShape::LowShelf,
        2 => BandShape::LowCut,
        3 => BandShape::HighShelf,
        4 => BandShape::HighCut,
        5 => BandShape::Notch,
        _ => BandShape::Peak,
    }
}

/// Numbered-band EQs store parameters as `Band 1 Freq`, `Band 1 Gain`, ...
fn interpret_numbered_bands(plugin: &mut PluginInstance) {
    let params = plugin.parameters.clone();
    let mut band_nums: Vec<u32> = params
        .keys()
        .filter_map(|key| {
            let rest = key
                .strip_prefix("Band ")
                .or_else(|| key.strip_prefix("band "))?;
            rest.split(' ').next()?.parse().ok()
        })
        .collect();
    band_nums.sort_unstable();
    band_nums.dedup();

    for num in band_nums {
        let mut band = EQBand::default();
        let freq_keys = [format!("Band {num} Freq"), format!("Band {num} Frequency")];
        if let Some(f) = match_param(&params, &[freq_keys[0].as_str(), freq_keys[1].as_str()]) {
            band.frequency = f;
        }
        let gain_key = format!("Band {num} Gain");
        if let Some(g) = match_param(&params, &[gain_key.as_str()]) {
            band.gain = g;
        }
        let q_key = format!("Band {num} Q");
        if let Some(q) = match_param(&params, &[q_key.as_str()]) {
            band.q = q;
        }
        let shape_keys = [format!("Band {num} Shape"), format!("Band {num} Type")];
        if let Some(shape) = match_param(&params, &[shape_keys[0].as_str(), shape_keys[1].as_str()])
        {
            band.shape = shape_from_code(shape as i64);
        }
        let enabled_key = format!("Band {num} Enabled");
        if let Some(enabled) = match_param(&params, &[enabled_key.as_str()]) {
            band.enabled = enabled > 0.5;
        }
        plugin.eq_bands.push(band);
    }
}

/// Generic compressor inference from keyword substrings.
fn interpret_generic_compressor(plugin: &mut PluginInstance) {
    let params = plugin.parameters.clone();
    const KEYWORDS: &[&str] = &["threshold", "ratio", "attack", "release", "knee", "makeup"];
    let has_comp = params
        .keys()
        .any(|k| KEYWORDS.iter().any(|kw| k.to_lowercase().contains(kw)));
    if !has_comp {
        return;
    }

    let mut comp = CompressorSettings::for_plugin(&plugin.name);
    for (key, &value) in &params {
        let kl = key.to_lowercase();
        if kl.contains("thresh") {
            comp.threshold = value;
        } else if kl.contains("ratio") {
            comp.ratio = value;
        } else if kl.contains("attack") {
            comp.attack = value;
        } else if kl.contains("release") {
            comp.release = value;
        } else if kl.contains("knee") {
            comp.knee = value;
        } else if kl.contains("makeup") || kl.contains("make-up") {
            comp.makeup_gain = value;
        }
    }
    comp.raw = params;
    plugin.compressor = Some(comp);
}

/// Generic EQ inference from `band N` / `eq N` numbered parameter names.
fn interpret_generic_eq(plugin: &mut PluginInstance) {
    let params = plugin.parameters.clone();
    let has_eq = params.keys().any(|k| {
        let kl = k.to_lowercase();
        ["freq", "gain", "band"].iter().any(|kw| kl.contains(kw))
    });
    if !has_eq {
        return;
    }

    let mut band_nums: Vec<u32> = params.keys().filter_map(|k| band_number(k)).collect();
    band_nums.sort_unstable();
    band_nums.dedup();

    for num in band_nums {
        let mut band = EQBand::default();
        let num_str = num.to_string();
        for (key, &value) in &params {
            let kl = key.to_lowercase();
            if !kl.contains(&num_str) {
                continue;
            }
            if kl.contains("freq") {
                band.frequency = value;
            } else if kl.contains("gain") {
                band.gain = value;
            } else if kl.contains('q') || kl.contains("width") {
                band.q = value;
            }
        }
        if band.frequency != 1000.0 || band.gain != 0.0 {
            plugin.eq_bands.push(band);
        }
    }
}

/// Band index from names like "band 2 gain", "Band2", "eq 3 freq".
fn band_number(key: &str) -> Option<u32> {
    let kl = key.to_lowercase();
    for prefix in ["band", "eq"] {
        let Some(at) = kl.find(prefix) else { continue };
        let rest = kl[at + prefix.len()..].trim_start();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return digits.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_vector_with_unset() {
        let values = parse_vector("1.5 * -3 bogus 0");
        assert_eq!(
            values,
            vec![Some(1.5), None, Some(-3.0), None, Some(0.0)]
        );
    }

    #[test]
    fn test_channel_eq_vector() {
        let mut plugin = PluginInstance::named("SSLEQ");
        // band 1 enabled shelf at 80 Hz +2 dB, band 4 disabled with no gain
        let mut values = vec![None; 20];
        values[0] = Some(1.0);
        values[1] = Some(0.0);
        values[2] = Some(80.0);
        values[4] = Some(2.0);
        values[8] = Some(-1.5);
        values[19] = Some(0.5);
        interpret_vector(&mut plugin, "SSLEQ", &values, "");
        // band 1 (enabled), band 2 (gain), band 3 always enabled; band 4
        // disabled with zero gain is dropped
        assert_eq!(plugin.eq_bands.len(), 3);
        assert_eq!(plugin.eq_bands[0].shape, BandShape::LowShelf);
        assert_eq!(plugin.eq_bands[0].frequency, 80.0);
        assert_eq!(plugin.eq_bands[0].gain, 2.0);
        assert_eq!(plugin.eq_bands[1].gain, -1.5);
        assert_eq!(plugin.parameters["Output Trim"], 0.5);
    }

    #[test]
    fn test_channel_strip_vector_needs_long_vector_for_eq() {
        let mut plugin = PluginInstance::named("SSLChannel");
        let mut values = vec![Some(0.0); 10];
        values[0] = Some(-18.0);
        values[3] = Some(0.3);
        interpret_vector(&mut plugin, "SSLChannel", &values, "");
        assert!(plugin.eq_bands.is_empty());
        let comp = plugin.compressor.as_ref().unwrap();
        assert_eq!(comp.threshold, -18.0);
        assert_eq!(comp.release, 0.3);
    }

    #[test]
    fn test_channel_strip_vector_with_eq() {
        let mut plugin = PluginInstance::named("SSLChannel");
        let mut values = vec![Some(0.0); 26];
        values[15] = Some(100.0);
        values[16] = Some(3.0);
        values[18] = Some(2.0); // kHz
        values[19] = Some(-2.0);
        interpret_vector(&mut plugin, "SSLChannel", &values, "");
        assert_eq!(plugin.eq_bands.len(), 2);
        assert_eq!(plugin.eq_bands[1].frequency, 2000.0);
        // threshold 0 is not engaged
        assert!(plugin.compressor.is_none());
    }

    #[test]
    fn test_fet_compressor_vector() {
        let mut plugin = PluginInstance::named("CLA-76");
        let values = parse_vector("4 -2 3 7");
        interpret_vector(&mut plugin, "CLA-76", &values, "All Buttons");
        let comp = plugin.compressor.as_ref().unwrap();
        assert_eq!(comp.input_gain, 4.0);
        assert_eq!(comp.output_gain, -2.0);
        assert_eq!(comp.attack, 3.0);
        assert_eq!(comp.release, 7.0);
        assert_eq!(comp.ratio, 4.0);
        assert!(plugin.parameters.contains_key("Preset"));
    }

    #[test]
    fn test_band_compressor_vector_indices() {
        let mut plugin = PluginInstance::named("C1Comp");
        let mut values = vec![None; 19];
        values[0] = Some(0.5);
        values[17] = Some(-24.0);
        values[18] = Some(3.0);
        interpret_vector(&mut plugin, "C1Comp", &values, "");
        let comp = plugin.compressor.as_ref().unwrap();
        assert_eq!(comp.threshold, -24.0);
        assert_eq!(comp.ratio, 3.0);
        assert_eq!(comp.attack, 0.5);
    }

    #[test]
    fn test_unknown_vector_stores_generic_params() {
        let mut plugin = PluginInstance::named("MysteryVerb");
        let values = parse_vector("0.1 * 0.3");
        interpret_vector(&mut plugin, "MysteryVerb", &values, "");
        assert_eq!(plugin.parameters.len(), 2);
        assert_eq!(plugin.parameters["Param_0"], 0.1);
        assert_eq!(plugin.parameters["Param_2"], 0.3);
        assert!(plugin.compressor.is_none());
    }

    #[test]
    fn test_strip_named_keys() {
        let mut plugin = PluginInstance::named("SSL Native Channel Strip 2");
        plugin.parameters.insert("LF Gain".into(), 2.5);
        plugin.parameters.insert("LF Freq".into(), 80.0);
        plugin.parameters.insert("Comp Threshold".into(), -12.0);
        plugin.parameters.insert("Comp Ratio".into(), 4.0);
        interpret_named(&mut plugin);
        assert_eq!(plugin.eq_bands.len(), 1);
        assert_eq!(plugin.eq_bands[0].shape, BandShape::LowShelf);
        let comp = plugin.compressor.as_ref().unwrap();
        assert_eq!(comp.threshold, -12.0);
        assert_eq!(comp.ratio, 4.0);
        assert!(comp.raw.contains_key("Comp Threshold"));
    }

    #[test]
    fn test_numbered_bands_named_keys() {
        let mut plugin = PluginInstance::named("Pro-Q 3");
        plugin.parameters.insert("Band 1 Freq".into(), 120.0);
        plugin.parameters.insert("Band 1 Gain".into(), -3.0);
        plugin.parameters.insert("Band 1 Shape".into(), 2.0);
        plugin.parameters.insert("Band 2 Freq".into(), 5000.0);
        plugin.parameters.insert("Band 2 Gain".into(), 1.5);
        interpret_named(&mut plugin);
        assert_eq!(plugin.eq_bands.len(), 2);
        assert_eq!(plugin.eq_bands[0].shape, BandShape::LowCut);
        assert_eq!(plugin.eq_bands[1].frequency, 5000.0);
    }

    #[test]
    fn test_generic_compressor_keywords() {
        let mut plugin = PluginInstance::named("Some Dynamics Tool");
        plugin.parameters.insert("Thresh dB".into(), -20.0);
        plugin.parameters.insert("Ratio".into(), 2.0);
        plugin.parameters.insert("Makeup".into(), 3.0);
        interpret_named(&mut plugin);
        let comp = plugin.compressor.as_ref().unwrap();
        assert_eq!(comp.threshold, -20.0);
        assert_eq!(comp.ratio, 2.0);
        assert_eq!(comp.makeup_gain, 3.0);
    }

    #[test]
    fn test_generic_eq_numbered() {
        let mut plugin = PluginInstance::named("Some EQ");
        plugin.parameters.insert("band 1 freq".into(), 250.0);
        plugin.parameters.insert("band 1 gain".into(), -2.0);
        interpret_named(&mut plugin);
        assert_eq!(plugin.eq_bands.len(), 1);
        assert_eq!(plugin.eq_bands[0].frequency, 250.0);
    }

    #[test]
    fn test_band_number_parsing() {
        assert_eq!(band_number("Band 3 Gain"), Some(3));
        assert_eq!(band_number("eq2 freq"), Some(2));
        assert_eq!(band_number("bandwidth"), None);
        assert_eq!(band_number("Attack"), None);
    }
}
