//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use log::{info, warn};
use walkdir::WalkDir;

use crate::decode::decode_file;
use crate::error::{CprError, Result};
use crate::model::Project;

/// Decode one file and print a human-readable summary.
pub fn inspect(path: &Path) -> Result<()> {
    info!("Decoding project: {}", path.display());
    let project = decode_file(path)?;

    println!("Project: {}", project.name);
    if !project.version.is_empty() {
        println!("Version: {}", project.version);
    }
    println!("Sample rate: {} Hz", project.sample_rate);
    println!("Tempo: {} BPM", project.tempo);
    println!("File size: {} bytes", project.file_size);
    println!(
        "Tracks: {} ({} audio), plugins: {}",
        project.track_count(),
        project.audio_track_count(),
        project.plugin_count()
    );
    for track in &project.tracks {
        let bus = track
            .output_bus
            .as_deref()
            .map(|b| format!(" -> {b}"))
            .unwrap_or_default();
        println!(
            "  [{:>2}] {:?} {}{}",
            track.index, track.track_type, track.name, bus
        );
        for plugin in &track.plugins {
            println!("       {}. {}", plugin.slot_index + 1, plugin.name);
        }
        for send in &track.sends {
            println!("       send -> {} ({} dB)", send.target, send.level_db);
        }
    }
    if !project.markers.is_empty() {
        println!("Markers: {}", project.markers.len());
    }
    if !project.referenced_audio.is_empty() {
        println!("Referenced audio files: {}", project.referenced_audio.len());
    }

    Ok(())
}

/// Decode one file and serialize the model to JSON.
pub fn export(path: &Path, output: Option<&Path>) -> Result<()> {
    info!("Exporting project: {}", path.display());
    let project = decode_file(path)?;
    let json = serde_json::to_string_pretty(&project)?;

    match output {
        Some(out) => {
            fs::write(out, json).map_err(|source| CprError::WriteFailed {
                path: out.to_path_buf(),
                source,
            })?;
            println!("Exported to {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Decode every .cpr file under a directory tree. A file that cannot be
/// read is skipped with a warning; the batch continues.
pub fn scan(root: &Path) -> Result<()> {
    info!("Scanning for projects under: {}", root.display());
    let mut decoded: Vec<Project> = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_cpr = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cpr"));
        if !is_cpr {
            continue;
        }
        match decode_file(entry.path()) {
            Ok(project) => {
                println!(
                    "{}: {} tracks, {} plugins, {} BPM",
                    entry.path().display(),
                    project.track_count(),
                    project.plugin_count(),
                    project.tempo
                );
                decoded.push(project);
            }
            Err(err) => {
                warn!("skipping {}: {err}", entry.path().display());
                skipped += 1;
            }
        }
    }

    println!("Decoded {} projects ({} skipped)", decoded.len(), skipped);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_inspect_missing_file_reports_path() {
        let missing = PathBuf::from("/definitely/not/here.cpr");
        let err = inspect(&missing).unwrap_err();
        assert!(err.to_string().contains("not/here.cpr"));
    }

    #[test]
    fn test_scan_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan(dir.path()).is_ok());
    }

    #[test]
    fn test_scan_survives_undecodable_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.cpr"), b"\x00\x00\x00\x00").unwrap();
        fs::write(dir.path().join("ignored.txt"), b"not a project").unwrap();
        assert!(scan(dir.path()).is_ok());
    }
}
