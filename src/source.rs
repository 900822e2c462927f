//! Turns the raw bytes of a source file into text.

use std::fmt::Display;

const CODING_TAG: &[u8] = b"//@coding=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    /// No byte order mark and no coding tag.
    Ansi,
}

impl Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Utf32Le => "UTF-32LE",
            Encoding::Utf32Be => "UTF-32BE",
            Encoding::Ansi => "ANSI",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {encoding} sequence at byte {offset}")]
pub struct DecodeError {
    pub encoding: Encoding,
    pub offset: usize,
}

/// Detects the encoding from the byte order mark, falling back to the
/// coding tag. Returns the encoding and the bytes after the mark.
pub fn sniff(bytes: &[u8]) -> (Encoding, &[u8]) {
    if bytes.len() % 4 == 0 {
        if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
            return (Encoding::Utf32Le, &bytes[4..]);
        }
        if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
            return (Encoding::Utf32Be, &bytes[4..]);
        }
    }
    if bytes.len() % 2 == 0 {
        if bytes.starts_with(&[0xFF, 0xFE]) {
            return (Encoding::Utf16Le, &bytes[2..]);
        }
        if bytes.starts_with(&[0xFE, 0xFF]) {
            return (Encoding::Utf16Be, &bytes[2..]);
        }
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return (Encoding::Utf8, &bytes[3..]);
    }
    if bytes.starts_with(CODING_TAG) {
        return (Encoding::Utf8, bytes);
    }
    (Encoding::Ansi, bytes)
}

pub fn decode(bytes: &[u8]) -> Result<String, DecodeError> {
    let (encoding, body) = sniff(bytes);
    let bom_len = bytes.len() - body.len();
    let invalid = |offset: usize| DecodeError {
        encoding,
        offset: bom_len + offset,
    };

    match encoding {
        Encoding::Utf8 => std::str::from_utf8(body)
            .map(str::to_string)
            .map_err(|err| invalid(err.valid_up_to())),
        // Valid UTF-8 is taken as is; anything else is read as Latin-1.
        Encoding::Ansi => Ok(match std::str::from_utf8(body) {
            Ok(text) => text.to_string(),
            Err(_) => body.iter().map(|&b| char::from(b)).collect(),
        }),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            if body.len() % 2 != 0 {
                return Err(invalid(body.len() - 1));
            }
            let units = body.chunks_exact(2).map(|pair| {
                let pair = [pair[0], pair[1]];
                if encoding == Encoding::Utf16Le {
                    u16::from_le_bytes(pair)
                } else {
                    u16::from_be_bytes(pair)
                }
            });
            let mut text = String::with_capacity(body.len() / 2);
            let mut offset = 0;
            for c in char::decode_utf16(units) {
                let c = c.map_err(|_| invalid(offset))?;
                offset += c.len_utf16() * 2;
                text.push(c);
            }
            Ok(text)
        }
        Encoding::Utf32Le | Encoding::Utf32Be => {
            if body.len() % 4 != 0 {
                return Err(invalid(body.len() - body.len() % 4));
            }
            body.chunks_exact(4)
                .enumerate()
                .map(|(i, quad)| {
                    let quad = [quad[0], quad[1], quad[2], quad[3]];
                    let code = if encoding == Encoding::Utf32Le {
                        u32::from_le_bytes(quad)
                    } else {
                        u32::from_be_bytes(quad)
                    };
                    char::from_u32(code).ok_or_else(|| invalid(i * 4))
                })
                .collect()
        }
    }
}
