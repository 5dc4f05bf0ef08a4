//! Cycle marker extraction
//!
//! Marker events carry a UTF-16LE name nearby; positions are not reliably
//! recoverable from the flat layout and stay at 0.0 beats.

use crate::model::{Marker, Project};
use crate::scan;

use super::wide_name_near;

const MARKER_EVENT: &[u8] = b"MMarkerEvent";

pub fn extract(data: &[u8], project: &mut Project) {
    for pos in scan::find_all(data, MARKER_EVENT) {
        let id = project.markers.len() + 1;
        let name = wide_name_near(data, pos).unwrap_or_else(|| format!("Marker {id}"));
        project.markers.push(Marker {
            name,
            position: 0.0,
            id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_sequential_ids() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(MARKER_EVENT);
        data.resize(600, 0);
        data.extend_from_slice(MARKER_EVENT);
        data.resize(1200, 0);
        let mut project = Project::new("p");
        extract(&data, &mut project);
        assert_eq!(project.markers.len(), 2);
        assert_eq!(project.markers[0].id, 1);
        assert_eq!(project.markers[1].id, 2);
        assert_eq!(project.markers[0].name, "Marker 1");
        assert_eq!(project.markers[0].position, 0.0);
    }

    #[test]
    fn test_marker_wide_name() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(MARKER_EVENT);
        data.push(1);
        for &c in b"Chorus 2" {
            data.push(c);
            data.push(0);
        }
        data.push(1);
        data.resize(700, 0);
        let mut project = Project::new("p");
        extract(&data, &mut project);
        assert_eq!(project.markers[0].name, "Chorus 2");
    }
}
