use anyhow::{bail, Result};

/// Trim whitespace, a leading BOM, and outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Some(cleaned)` unless the cell is blank.
pub fn non_empty(raw: &str) -> Option<String> {
    let s = clean_str(raw);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Lowercase for keyword matching. Arabic has no case, so this only
/// affects Latin tokens.
pub fn fold(s: &str) -> String {
    s.to_lowercase()
}

/// Folded words of a cell or file name. Anything that is not a letter or
/// digit separates words, so `_`, `-` and `.` split file names too.
pub fn words(s: &str) -> Vec<String> {
    fold(s)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when `phrase` occurs in `haystack` as a run of whole words.
pub fn contains_phrase(haystack: &[String], phrase: &str) -> bool {
    let needle = words(phrase);
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Decode an export into text: UTF-8 (BOM optional), then UTF-16 by BOM
/// or by NUL-byte pattern. Anything else is undecodable.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return match std::str::from_utf8(rest) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => bail!("invalid UTF-8 after BOM: {}", e),
        };
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, true);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, false);
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        if !looks_like_utf16(bytes) {
            return Ok(s.to_string());
        }
    }
    if looks_like_utf16(bytes) {
        // NULs at odd offsets → little endian (ASCII-heavy headers)
        let odd_nuls = bytes.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
        let even_nuls = bytes.iter().step_by(2).filter(|b| **b == 0).count();
        return decode_utf16(bytes, odd_nuls >= even_nuls);
    }
    bail!("bytes are neither UTF-8 nor UTF-16")
}

fn looks_like_utf16(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(512)];
    if sample.len() < 4 {
        return false;
    }
    let nuls = sample.iter().filter(|b| **b == 0).count();
    nuls * 4 >= sample.len()
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Result<String> {
    if bytes.len() % 2 != 0 {
        bail!("odd byte count for UTF-16 text");
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| {
            if little_endian {
                u16::from_le_bytes([c[0], c[1]])
            } else {
                u16::from_be_bytes([c[0], c[1]])
            }
        })
        .collect();
    match String::from_utf16(&units) {
        Ok(s) => Ok(s),
        Err(e) => bail!("invalid UTF-16: {}", e),
    }
}
