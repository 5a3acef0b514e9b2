//! Turns raw document bytes into text, following the byte order mark or the
//! `encoding` pseudo-attribute of the XML declaration.

use crate::error::DomError;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

/// The character encoding a byte stream was found to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detected {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

/// Sniffs a byte order mark, or the UTF-16/32 layout of a leading `<`.
/// Returns the encoding and the length of the mark to skip.
pub fn detect(bytes: &[u8]) -> (Detected, usize) {
    match bytes {
        [0xFF, 0xFE, 0x00, 0x00, ..] => (Detected::Utf32Le, 4),
        [0x00, 0x00, 0xFE, 0xFF, ..] => (Detected::Utf32Be, 4),
        [0xEF, 0xBB, 0xBF, ..] => (Detected::Utf8, 3),
        [0xFE, 0xFF, ..] => (Detected::Utf16Be, 2),
        [0xFF, 0xFE, ..] => (Detected::Utf16Le, 2),
        [b'<', 0x00, 0x00, 0x00, ..] => (Detected::Utf32Le, 0),
        [0x00, 0x00, 0x00, b'<', ..] => (Detected::Utf32Be, 0),
        [b'<', 0x00, ..] => (Detected::Utf16Le, 0),
        [0x00, b'<', ..] => (Detected::Utf16Be, 0),
        _ => (Detected::Utf8, 0),
    }
}

/// Decodes a document. Without a byte order mark the declared encoding is
/// honoured, defaulting to UTF-8.
pub fn decode(bytes: &[u8]) -> Result<String, DomError> {
    let (detected, skip) = detect(bytes);
    let content = &bytes[skip..];
    match detected {
        Detected::Utf32Le => decode_utf32(content, u32::from_le_bytes),
        Detected::Utf32Be => decode_utf32(content, u32::from_be_bytes),
        Detected::Utf16Le => transcode(content, UTF_16LE),
        Detected::Utf16Be => transcode(content, UTF_16BE),
        Detected::Utf8 if skip > 0 => transcode(content, UTF_8),
        Detected::Utf8 => match declared_encoding(content) {
            Some(label) => {
                let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                    DomError::Encoding(format!("unsupported encoding '{}'", label))
                })?;
                log::trace!("Decoding document as declared encoding {}", encoding.name());
                transcode(content, encoding)
            }
            None => transcode(content, UTF_8),
        },
    }
}

/// Decodes with an encoding named by the caller, such as `UTF-16LE` or
/// `windows-1252`. A byte order mark still wins over the label.
pub fn decode_with_label(bytes: &[u8], label: &str) -> Result<String, DomError> {
    let (detected, skip) = detect(bytes);
    if skip > 0 {
        return decode(bytes);
    }
    match label.trim().to_ascii_lowercase().as_str() {
        "utf-32" | "utf-32le" => return decode_utf32(&bytes[skip..], u32::from_le_bytes),
        "utf-32be" => return decode_utf32(&bytes[skip..], u32::from_be_bytes),
        _ => {}
    }
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| DomError::Encoding(format!("unsupported encoding '{}'", label)))?;
    log::trace!(
        "Decoding {} byte(s) as {} (sniffed {:?})",
        bytes.len(),
        encoding.name(),
        detected
    );
    transcode(bytes, encoding)
}

fn transcode(bytes: &[u8], encoding: &'static Encoding) -> Result<String, DomError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(DomError::Encoding(format!(
            "malformed byte sequence for encoding {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

fn decode_utf32(bytes: &[u8], read: fn([u8; 4]) -> u32) -> Result<String, DomError> {
    if bytes.len() % 4 != 0 {
        return Err(DomError::Encoding(
            "truncated UTF-32 byte sequence".to_string(),
        ));
    }
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let unit = read([chunk[0], chunk[1], chunk[2], chunk[3]]);
            char::from_u32(unit).ok_or_else(|| {
                DomError::Encoding(format!("invalid UTF-32 code point {:#x}", unit))
            })
        })
        .collect()
}

/// Reads `encoding="..."` from an ASCII-compatible XML declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(value[..value.find(quote)?].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str, bom: bool) -> Vec<u8> {
        let mut out = if bom { vec![0xFF, 0xFE] } else { vec![] };
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_detects_byte_order_marks() {
        assert_eq!(detect(&[0xEF, 0xBB, 0xBF, b'<']), (Detected::Utf8, 3));
        assert_eq!(detect(&[0xFF, 0xFE, b'<', 0]), (Detected::Utf16Le, 2));
        assert_eq!(detect(&[0xFF, 0xFE, 0, 0]), (Detected::Utf32Le, 4));
        assert_eq!(detect(&[0, 0, 0xFE, 0xFF]), (Detected::Utf32Be, 4));
        assert_eq!(detect(b"<a/>"), (Detected::Utf8, 0));
    }

    #[test]
    fn test_decodes_utf16_with_and_without_bom() {
        assert_eq!(decode(&utf16le("<a>é</a>", true)).unwrap(), "<a>é</a>");
        assert_eq!(decode(&utf16le("<a>é</a>", false)).unwrap(), "<a>é</a>");
    }

    #[test]
    fn test_decodes_utf32_big_endian() {
        let mut bytes = vec![0, 0, 0xFE, 0xFF];
        for c in "<x>€</x>".chars() {
            bytes.extend_from_slice(&(c as u32).to_be_bytes());
        }
        assert_eq!(decode(&bytes).unwrap(), "<x>€</x>");
    }

    #[test]
    fn test_honours_declared_encoding() {
        let mut bytes = b"<?xml version='1.0' encoding='ISO-8859-1'?><a>".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</a>");
        assert!(decode(&bytes).unwrap().ends_with("<a>é</a>"));
    }

    #[test]
    fn test_decodes_with_explicit_label() {
        assert_eq!(decode_with_label(&[b'<', b'a', b'>', 0xE9, b'<', b'/', b'a', b'>'], "latin1").unwrap(), "<a>é</a>");
        assert_eq!(decode_with_label(&utf16le("<b/>", false), "UTF-16LE").unwrap(), "<b/>");
        assert!(decode_with_label(b"<a/>", "klingon").is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(decode(b"<?xml version=\"1.0\" encoding=\"nope\"?><a/>").is_err());
        assert!(decode(&[b'<', b'a', 0xFF, b'>']).is_err());
    }
}
