//! Byte scanner
//!
//! The .cpr container has no reliable top-level index, so every extractor
//! works by scanning the raw buffer for byte patterns. This module is the
//! primitive layer everything else is built on: literal substring search,
//! bounded-gap patterns (a field marker, up to N filler bytes, a printable
//! run, another marker), and UTF-16LE "wide string" runs.
//!
//! Absent patterns yield empty iterators, never errors.

use std::ops::Range;

/// Printable ASCII, the byte class used for inline name captures.
pub fn is_printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

/// First occurrence of `needle` in `data`, if any.
pub fn find_first(data: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > data.len() {
        return None;
    }
    data.windows(needle.len()).position(|w| w == needle)
}

/// Lazy iterator over ascending, non-overlapping match offsets.
pub fn find_all<'d, 'n>(data: &'d [u8], needle: &'n [u8]) -> FindAll<'d, 'n> {
    FindAll {
        data,
        needle,
        pos: 0,
        nocase: false,
    }
}

/// ASCII case-insensitive variant of [`find_all`].
pub fn find_all_nocase<'d, 'n>(data: &'d [u8], needle: &'n [u8]) -> FindAll<'d, 'n> {
    FindAll {
        data,
        needle,
        pos: 0,
        nocase: true,
    }
}

pub struct FindAll<'d, 'n> {
    data: &'d [u8],
    needle: &'n [u8],
    pos: usize,
    nocase: bool,
}

impl Iterator for FindAll<'_, '_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let n = self.needle.len();
        if n == 0 {
            return None;
        }
        while self.pos + n <= self.data.len() {
            let at = self.pos;
            let window = &self.data[at..at + n];
            let hit = if self.nocase {
                window.eq_ignore_ascii_case(self.needle)
            } else {
                window == self.needle
            };
            if hit {
                self.pos = at + n;
                return Some(at);
            }
            self.pos += 1;
        }
        None
    }
}

/// Length of the printable-ASCII run starting at `pos`.
pub fn printable_run_len(data: &[u8], pos: usize) -> usize {
    data[pos.min(data.len())..]
        .iter()
        .take_while(|&&b| is_printable(b))
        .count()
}

/// One segment of a bounded-gap pattern.
#[derive(Debug, Clone)]
enum Segment {
    /// Fixed byte literal
    Lit(Vec<u8>),
    /// 0..=max filler bytes, shortest alternative first
    Gap(usize),
    /// Captured printable-ASCII run of min..=max bytes
    Printable { min: usize, max: usize },
    /// Captured fixed-width raw field
    Raw(usize),
}

/// A bounded-gap byte pattern: alternating fixed and wildcard segments with
/// capture groups, matched shortest-gap-first the way the original record
/// layouts require.
///
/// The first segment must be a literal; it anchors the search.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    segments: Vec<Segment>,
}

/// A successful pattern match: the anchor offset, the end of the matched
/// span, and the captured byte ranges in segment order.
#[derive(Debug, Clone)]
pub struct Hit {
    pub start: usize,
    pub end: usize,
    pub caps: Vec<Range<usize>>,
}

impl Hit {
    /// Slice of the n-th capture within `data`.
    pub fn cap<'d>(&self, data: &'d [u8], n: usize) -> &'d [u8] {
        &data[self.caps[n].clone()]
    }
}

impl Pattern {
    /// Start a pattern at a literal anchor.
    pub fn lit(needle: &[u8]) -> Self {
        Pattern {
            segments: vec![Segment::Lit(needle.to_vec())],
        }
    }

    /// Append a further literal segment.
    pub fn then_lit(mut self, needle: &[u8]) -> Self {
        self.segments.push(Segment::Lit(needle.to_vec()));
        self
    }

    /// Allow up to `max` filler bytes before the next segment.
    pub fn gap(mut self, max: usize) -> Self {
        self.segments.push(Segment::Gap(max));
        self
    }

    /// Capture a printable-ASCII run of `min..=max` bytes.
    pub fn printable(mut self, min: usize, max: usize) -> Self {
        self.segments.push(Segment::Printable { min, max });
        self
    }

    /// Capture a fixed-width raw field of `len` bytes.
    pub fn raw(mut self, len: usize) -> Self {
        self.segments.push(Segment::Raw(len));
        self
    }

    /// Lazy iterator over non-overlapping hits in ascending offset order.
    pub fn find_iter<'d, 'p>(&'p self, data: &'d [u8]) -> Hits<'d, 'p> {
        Hits {
            data,
            pattern: self,
            pos: 0,
        }
    }

    /// First hit at or after offset 0.
    pub fn find_first(&self, data: &[u8]) -> Option<Hit> {
        self.find_iter(data).next()
    }

    fn anchor(&self) -> &[u8] {
        match self.segments.first() {
            Some(Segment::Lit(lit)) => lit,
            _ => &[],
        }
    }

    /// Try to match the non-anchor segments at `pos`, filling `caps`.
    /// Returns the end offset of the whole match. Gap segments backtrack
    /// shortest-first; captures are truncated on backtrack.
    fn match_rest(&self, data: &[u8], pos: usize, idx: usize, caps: &mut Vec<Range<usize>>) -> Option<usize> {
        let Some(seg) = self.segments.get(idx) else {
            return Some(pos);
        };
        match seg {
            Segment::Lit(lit) => {
                if data.len() - pos >= lit.len() && &data[pos..pos + lit.len()] == lit.as_slice() {
                    self.match_rest(data, pos + lit.len(), idx + 1, caps)
                } else {
                    None
                }
            }
            Segment::Gap(max) => {
                for g in 0..=*max {
                    if pos + g > data.len() {
                        break;
                    }
                    let depth = caps.len();
                    if let Some(end) = self.match_rest(data, pos + g, idx + 1, caps) {
                        return Some(end);
                    }
                    caps.truncate(depth);
                }
                None
            }
            Segment::Printable { min, max } => {
                let run = printable_run_len(data, pos);
                if run < *min {
                    return None;
                }
                let take = run.min(*max);
                caps.push(pos..pos + take);
                let depth = caps.len();
                if let Some(end) = self.match_rest(data, pos + take, idx + 1, caps) {
                    return Some(end);
                }
                caps.truncate(depth - 1);
                None
            }
            Segment::Raw(len) => {
                if data.len() - pos < *len {
                    return None;
                }
                caps.push(pos..pos + len);
                let depth = caps.len();
                if let Some(end) = self.match_rest(data, pos + len, idx + 1, caps) {
                    return Some(end);
                }
                caps.truncate(depth - 1);
                None
            }
        }
    }
}

pub struct Hits<'d, 'p> {
    data: &'d [u8],
    pattern: &'p Pattern,
    pos: usize,
}

impl Iterator for Hits<'_, '_> {
    type Item = Hit;

    fn next(&mut self) -> Option<Hit> {
        let anchor = self.pattern.anchor();
        if anchor.is_empty() {
            return None;
        }
        while self.pos + anchor.len() <= self.data.len() {
            let at = self.pos;
            if &self.data[at..at + anchor.len()] != anchor {
                self.pos += 1;
                continue;
            }
            let mut caps = Vec::new();
            match self
                .pattern
                .match_rest(self.data, at + anchor.len(), 1, &mut caps)
            {
                Some(end) => {
                    self.pos = end.max(at + 1);
                    return Some(Hit {
                        start: at,
                        end,
                        caps,
                    });
                }
                None => self.pos += 1,
            }
        }
        None
    }
}

/// A decoded UTF-16LE candidate run: offset of the first byte plus the text.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRun {
    pub offset: usize,
    pub text: String,
}

/// Scan for UTF-16LE "wide string" runs: sequences of (low byte, 0x00)
/// pairs where the low byte satisfies `accept`. Runs shorter than
/// `min_pairs` are skipped; longer runs are truncated to `max_pairs`.
pub fn wide_runs<F>(data: &[u8], min_pairs: usize, max_pairs: usize, accept: F) -> Vec<WideRun>
where
    F: Fn(u8) -> bool,
{
    let mut runs = Vec::new();
    let mut i = 0;
    while i + 1 < data.len() {
        if !(accept(data[i]) && data[i + 1] == 0x00) {
            i += 1;
            continue;
        }
        let start = i;
        let mut pairs = 0;
        while i + 1 < data.len() && accept(data[i]) && data[i + 1] == 0x00 && pairs < max_pairs {
            pairs += 1;
            i += 2;
        }
        if pairs >= min_pairs {
            let text: String = data[start..start + pairs * 2]
                .chunks_exact(2)
                .map(|pair| pair[0] as char)
                .collect();
            runs.push(WideRun {
                offset: start,
                text,
            });
        }
        // Skip the remainder of an overlong run so it is not re-captured
        while i + 1 < data.len() && accept(data[i]) && data[i + 1] == 0x00 {
            i += 2;
        }
        i += 1;
    }
    runs
}

/// Byte class for UTF-16LE track and marker names: anything non-control.
pub fn is_wide_name_byte(b: u8) -> bool {
    b >= 0x20
}

/// Byte class for filename characters in audio references.
pub fn is_filename_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_all_basic() {
        let data = b"abcXabcXabc";
        let hits: Vec<usize> = find_all(data, b"abc").collect();
        assert_eq!(hits, vec![0, 4, 8]);
    }

    #[test]
    fn test_find_all_absent_is_empty() {
        let hits: Vec<usize> = find_all(b"aaaa", b"zz").collect();
        assert!(hits.is_empty());
        let hits: Vec<usize> = find_all(b"", b"zz").collect();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_find_all_nocase() {
        let hits: Vec<usize> = find_all_nocase(b"a.WAV b.wav", b".wav").collect();
        assert_eq!(hits, vec![1, 7]);
    }

    #[test]
    fn test_pattern_gap_then_literal() {
        // marker, up to 4 filler bytes, second marker
        let pat = Pattern::lit(b"AB").gap(4).then_lit(b"CD");
        let data = b"..AB\x01\x02CD..";
        let hit = pat.find_first(data).unwrap();
        assert_eq!(hit.start, 2);
        assert_eq!(hit.end, 8);
        assert!(pat.find_first(b"AB\x01\x02\x03\x04\x05CD").is_none());
    }

    #[test]
    fn test_pattern_printable_capture() {
        let pat = Pattern::lit(b"Name\x00").gap(4).printable(2, 50).then_lit(b"\x00");
        let data = b"\x00Name\x00\x01\x01Lead Vocal\x00rest";
        let hit = pat.find_first(data).unwrap();
        assert_eq!(hit.cap(data, 0), b"Lead Vocal");
    }

    #[test]
    fn test_pattern_backtracks_into_long_run() {
        // A 6-byte printable run with max 4: the gap absorbs the first two
        // bytes so the capture can end at the NUL.
        let pat = Pattern::lit(b"K\x00").gap(2).printable(2, 4).then_lit(b"\x00");
        let data = b"K\x00abcdef\x00";
        let hit = pat.find_first(data).unwrap();
        assert_eq!(hit.cap(data, 0), b"cdef");
    }

    #[test]
    fn test_pattern_raw_capture() {
        let pat = Pattern::lit(b"UID\x00").raw(4);
        let data = b"xxUID\x00\xde\xad\xbe\xefyy";
        let hit = pat.find_first(data).unwrap();
        assert_eq!(hit.cap(data, 0), b"\xde\xad\xbe\xef");
    }

    #[test]
    fn test_pattern_min_run_rejected() {
        let pat = Pattern::lit(b"X\x00").printable(3, 10);
        assert!(pat.find_first(b"X\x00ab\x00").is_none());
    }

    #[test]
    fn test_wide_runs_decode() {
        let mut data = vec![0u8; 4];
        for &c in b"Drums" {
            data.push(c);
            data.push(0);
        }
        data.extend_from_slice(&[0x01, 0x01]);
        let runs = wide_runs(&data, 3, 50, is_wide_name_byte);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "Drums");
        assert_eq!(runs[0].offset, 4);
    }

    #[test]
    fn test_wide_runs_min_pairs() {
        let data = [b'a', 0, b'b', 0];
        assert!(wide_runs(&data, 3, 50, is_wide_name_byte).is_empty());
    }

    #[test]
    fn test_wide_runs_truncates_overlong() {
        let mut data = Vec::new();
        for _ in 0..60 {
            data.push(b'x');
            data.push(0);
        }
        let runs = wide_runs(&data, 3, 50, is_wide_name_byte);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text.len(), 50);
    }
}
