//! Known-function symbol list parsing for the optional `-f` file.
//! Tolerant of whatever precedes the address on a line (a nm-style
//! column, an index, a comment marker); only the `0x...` token on
//! each line is taken, and only as far as the next run of
//! whitespace.

use crate::poi::{PoiKind, PoiList};

/// Parses one address per line and records each as a `Function` POI.
/// Lines carrying no `0x` marker are skipped rather than rejected.
pub fn parse(contents: &str, poi_list: &mut PoiList) {
    for line in contents.lines() {
        if let Some(address) = parse_line(line) {
            poi_list.add_unique(address, 1, PoiKind::Function);
        }
    }
}

fn parse_line(line: &str) -> Option<u64> {
    let marker = line.find("0x")?;
    let hex_start = marker + 2;
    let rest = &line[hex_start..];
    let hex_end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let hex = &rest[..hex_end];
    if hex.is_empty() {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}
