//! Routing and send resolution
//!
//! Routing targets are stored as numeric bus identifiers, not names. A
//! first pass builds the identifier table from bus-definition records;
//! each track's output bus and send slots are then resolved inside its
//! data region: [strip offset, next strip offset), bounded by
//! [`TRACK_REGION_LIMIT`].

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};

use crate::model::SendSlot;
use crate::scan::{self, Pattern};

use super::{LocatedTrack, BUS_RECORD_REGION, MAX_SENDS, SEND_REGION, TRACK_REGION_LIMIT};

const BUS_RECORD_MARKER: &[u8] = b"OwnInputBus\x00";
/// `Bus UID` field header: tag, type byte pair, four zero bytes, BE u32.
const BUS_UID_HEADER: &[u8] = b"Bus UID\x00\x00\x01\x00\x00\x00\x00";
const OUTPUT_BUS_MARKER: &[u8] = b"OutputBus";
/// Identifier value header inside routing and send fields.
const UID_VALUE_HEADER: &[u8] = b"Value\x00\x00\x01\x00\x00\x00\x00";
/// Volume value header: an 8-byte BE double follows.
const VOLUME_VALUE_HEADER: &[u8] = b"Value\x00\x00\x04";
const SEND_SECTION_MARKER: &[u8] = b"SendFolder\x00";
const SEND_VOLUME_MARKER: &[u8] = b"Volume\x00";
const SEND_OUTPUT_MARKER: &[u8] = b"Output\x00";

/// Bytes after an `OutputBus` marker searched for the identifier field.
const OUTPUT_VALUE_WINDOW: usize = 200;
/// Bytes after a volume/output marker searched for its value field.
const SEND_FIELD_WINDOW: usize = 40;

/// Raw send volumes are stored relative to this full-scale constant.
const SEND_VOLUME_FULL_SCALE: f64 = 25856.0;

/// Build the bus-identifier lookup table from bus-definition records.
/// Identifier 0 is invalid and excluded.
pub fn bus_table(data: &[u8]) -> BTreeMap<u32, String> {
    let name_pattern = Pattern::lit(b"Name\x00")
        .gap(12)
        .printable(2, 50)
        .then_lit(b"\x00");
    let uid_pattern = Pattern::lit(BUS_UID_HEADER).raw(4);

    let mut table = BTreeMap::new();
    for pos in scan::find_all(data, BUS_RECORD_MARKER) {
        let region = &data[pos..(pos + BUS_RECORD_REGION).min(data.len())];
        let Some(name_hit) = name_pattern.find_first(region) else {
            continue;
        };
        let name = String::from_utf8_lossy(name_hit.cap(region, 0))
            .trim()
            .to_string();
        let Some(uid_hit) = uid_pattern.find_first(region) else {
            continue;
        };
        let uid = BigEndian::read_u32(uid_hit.cap(region, 0));
        if uid != 0 {
            table.insert(uid, name);
        }
    }
    table
}

/// Search region for track `i`: from its strip to the next strip, capped.
fn track_region(data: &[u8], located: &[LocatedTrack], i: usize) -> std::ops::Range<usize> {
    let start = located[i].offset;
    let next = located
        .get(i + 1)
        .map(|t| t.offset)
        .unwrap_or(start + TRACK_REGION_LIMIT);
    let end = next.min(start + TRACK_REGION_LIMIT).min(data.len());
    start..end.max(start)
}

/// Resolve each track's output bus: the first `OutputBus` occurrence in
/// its region whose identifier field resolves in the table.
pub fn resolve_outputs(data: &[u8], buses: &BTreeMap<u32, String>, located: &mut [LocatedTrack]) {
    let uid_pattern = Pattern::lit(UID_VALUE_HEADER).raw(4);
    for i in 0..located.len() {
        let region = &data[track_region(data, located, i)];
        for pos in scan::find_all(region, OUTPUT_BUS_MARKER) {
            let after = &region[pos..(pos + OUTPUT_VALUE_WINDOW).min(region.len())];
            if let Some(hit) = uid_pattern.find_first(after) {
                let uid = BigEndian::read_u32(hit.cap(after, 0));
                if let Some(name) = buses.get(&uid) {
                    located[i].track.output_bus = Some(name.clone());
                }
                break;
            }
        }
    }
}

/// Resolve each track's send slots from its send section: volume values
/// paired with the next output identifier after them. Slots that resolve
/// to identifier 0 or an unknown identifier are discarded.
pub fn resolve_sends(data: &[u8], buses: &BTreeMap<u32, String>, located: &mut [LocatedTrack]) {
    let volume_pattern = Pattern::lit(VOLUME_VALUE_HEADER).raw(8);
    let uid_pattern = Pattern::lit(UID_VALUE_HEADER).raw(4);

    for i in 0..located.len() {
        let region = &data[track_region(data, located, i)];
        let Some(section) = scan::find_first(region, SEND_SECTION_MARKER) else {
            continue;
        };
        let send_region = &region[section..(section + SEND_REGION).min(region.len())];

        let volume_positions: Vec<usize> = scan::find_all(send_region, SEND_VOLUME_MARKER).collect();
        let output_positions: Vec<usize> = scan::find_all(send_region, SEND_OUTPUT_MARKER).collect();

        for &vol_pos in &volume_positions {
            let vol_area = &send_region[vol_pos..(vol_pos + SEND_FIELD_WINDOW).min(send_region.len())];
            let Some(vol_hit) = volume_pattern.find_first(vol_area) else {
                continue;
            };
            let volume = BigEndian::read_f64(vol_hit.cap(vol_area, 0));
            let level_db = if volume > 0.0 {
                let db = 20.0 * (volume / SEND_VOLUME_FULL_SCALE).log10();
                (db * 10.0).round() / 10.0
            } else {
                0.0
            };

            // pair with the next output identifier after this volume
            let uid = output_positions
                .iter()
                .find(|&&p| p > vol_pos)
                .and_then(|&p| {
                    let area = &send_region[p..(p + SEND_FIELD_WINDOW).min(send_region.len())];
                    uid_pattern
                        .find_first(area)
                        .map(|hit| BigEndian::read_u32(hit.cap(area, 0)))
                })
                .unwrap_or(0);

            let Some(target) = (uid != 0).then(|| buses.get(&uid)).flatten() else {
                continue;
            };
            located[i].track.sends.push(SendSlot {
                target: target.clone(),
                level_db,
                enabled: true,
            });
            if located[i].track.sends.len() >= MAX_SENDS {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;
    use pretty_assertions::assert_eq;

    fn bus_record(name: &str, uid: u32) -> Vec<u8> {
        let mut rec = Vec::new();
        rec.extend_from_slice(BUS_RECORD_MARKER);
        rec.extend_from_slice(b"\x01\x02Name\x00\x03\x04");
        rec.extend_from_slice(name.as_bytes());
        rec.push(0);
        rec.extend_from_slice(BUS_UID_HEADER);
        rec.extend_from_slice(&uid.to_be_bytes());
        rec
    }

    fn located_at(offset: usize) -> LocatedTrack {
        LocatedTrack {
            track: Track::default(),
            offset,
        }
    }

    #[test]
    fn test_bus_table() {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&bus_record("FX Bus", 7));
        data.resize(700, 0);
        data.extend_from_slice(&bus_record("Stereo Out", 1));
        data.resize(1500, 0);
        let table = bus_table(&data);
        assert_eq!(table.len(), 2);
        assert_eq!(table[&7], "FX Bus");
        assert_eq!(table[&1], "Stereo Out");
    }

    #[test]
    fn test_bus_table_excludes_zero_uid() {
        let mut data = bus_record("Broken", 0);
        data.resize(600, 0);
        assert!(bus_table(&data).is_empty());
    }

    #[test]
    fn test_output_bus_resolution() {
        let mut buses = BTreeMap::new();
        buses.insert(3u32, "Drum Bus".to_string());
        let mut data = vec![0u8; 32];
        data.extend_from_slice(OUTPUT_BUS_MARKER);
        data.extend_from_slice(b"\x01\x01");
        data.extend_from_slice(UID_VALUE_HEADER);
        data.extend_from_slice(&3u32.to_be_bytes());
        data.resize(400, 0);
        let mut located = vec![located_at(0)];
        resolve_outputs(&data, &buses, &mut located);
        assert_eq!(located[0].track.output_bus.as_deref(), Some("Drum Bus"));
    }

    #[test]
    fn test_output_bus_unknown_uid_unset() {
        let buses = BTreeMap::new();
        let mut data = vec![0u8; 8];
        data.extend_from_slice(OUTPUT_BUS_MARKER);
        data.extend_from_slice(UID_VALUE_HEADER);
        data.extend_from_slice(&9u32.to_be_bytes());
        data.resize(400, 0);
        let mut located = vec![located_at(0)];
        resolve_outputs(&data, &buses, &mut located);
        assert!(located[0].track.output_bus.is_none());
    }

    fn send_slot_bytes(volume: f64, uid: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SEND_VOLUME_MARKER);
        bytes.extend_from_slice(b"\x01");
        bytes.extend_from_slice(VOLUME_VALUE_HEADER);
        bytes.extend_from_slice(&volume.to_be_bytes());
        bytes.extend_from_slice(SEND_OUTPUT_MARKER);
        bytes.extend_from_slice(b"\x01");
        bytes.extend_from_slice(UID_VALUE_HEADER);
        bytes.extend_from_slice(&uid.to_be_bytes());
        bytes
    }

    #[test]
    fn test_send_resolution_with_level() {
        let mut buses = BTreeMap::new();
        buses.insert(5u32, "Verb".to_string());
        let mut data = vec![0u8; 16];
        data.extend_from_slice(SEND_SECTION_MARKER);
        // unity send: volume == full scale -> 0.0 dB
        data.extend_from_slice(&send_slot_bytes(25856.0, 5));
        // -6 dB-ish send
        data.extend_from_slice(&send_slot_bytes(12928.0, 5));
        data.resize(2000, 0);
        let mut located = vec![located_at(0)];
        resolve_sends(&data, &buses, &mut located);
        let sends = &located[0].track.sends;
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].target, "Verb");
        assert_eq!(sends[0].level_db, 0.0);
        assert_eq!(sends[1].level_db, -6.0);
        assert!(sends.iter().all(|s| s.enabled));
    }

    #[test]
    fn test_send_with_unknown_uid_discarded() {
        let buses = BTreeMap::new();
        let mut data = vec![0u8; 4];
        data.extend_from_slice(SEND_SECTION_MARKER);
        data.extend_from_slice(&send_slot_bytes(25856.0, 42));
        data.resize(1000, 0);
        let mut located = vec![located_at(0)];
        resolve_sends(&data, &buses, &mut located);
        assert!(located[0].track.sends.is_empty());
    }

    #[test]
    fn test_sends_capped_at_max() {
        let mut buses = BTreeMap::new();
        buses.insert(5u32, "Verb".to_string());
        let mut data = vec![0u8; 4];
        data.extend_from_slice(SEND_SECTION_MARKER);
        for _ in 0..10 {
            data.extend_from_slice(&send_slot_bytes(25856.0, 5));
        }
        data.resize(4000, 0);
        let mut located = vec![located_at(0)];
        resolve_sends(&data, &buses, &mut located);
        assert_eq!(located[0].track.sends.len(), MAX_SENDS);
    }

    #[test]
    fn test_region_bounded_by_next_track() {
        let mut buses = BTreeMap::new();
        buses.insert(3u32, "Bus".to_string());
        let mut data = vec![0u8; 500];
        // output field sits in the second track's region
        data.extend_from_slice(OUTPUT_BUS_MARKER);
        data.extend_from_slice(UID_VALUE_HEADER);
        data.extend_from_slice(&3u32.to_be_bytes());
        data.resize(2000, 0);
        let mut located = vec![located_at(0), located_at(400)];
        resolve_outputs(&data, &buses, &mut located);
        assert!(located[0].track.output_bus.is_none());
        assert_eq!(located[1].track.output_bus.as_deref(), Some("Bus"));
    }
}
