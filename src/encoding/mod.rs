//! Decoders that convert the bytes of an entity into UTF-8 text, and the registry
//! that maps encoding names to them.
//!
//! Every decoder consumes as much input as it can. A character that is cut off at the
//! end of the input is left unread unless `finish` is set, so chunked input can be
//! decoded incrementally.

mod iso_8859;
mod us_ascii;
mod utf16;

use std::{
    borrow::Cow,
    collections::BTreeMap,
    str::from_utf8,
    sync::{LazyLock, RwLock},
};

pub use crate::encoding::{
    iso_8859::{ISO_8859_1_NAME, ISO8859_1Decoder},
    us_ascii::{US_ASCII_NAME, USASCIIDecoder},
    utf16::{UTF16_NAME, UTF16BE_NAME, UTF16BEDecoder, UTF16Decoder, UTF16LE_NAME, UTF16LEDecoder},
};

pub trait Decoder {
    fn name(&self) -> &'static str;
    /// Decode `src` and append the result to `dst`.
    ///
    /// If no error occurs, return `Ok((read_bytes, write_bytes))`.  
    /// On [`DecodeError::Malformed`], everything before the malformed sequence has
    /// already been written to `dst`.
    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Malformed byte sequence is found.  
    ///
    /// The input and output buffer have consumed `read` and `write` bytes respectively.  
    /// Malformed sequence occurs `input[read..read+length]`.  
    #[error("malformed byte sequence of length {length} at input offset {read}")]
    Malformed {
        read: usize,
        write: usize,
        length: usize,
    },
    /// Other errors.
    #[error("{msg}")]
    Other { msg: Cow<'static, str> },
}

pub const UTF8_NAME: &str = "UTF-8";

pub struct UTF8Decoder;
impl Decoder for UTF8Decoder {
    fn name(&self) -> &'static str {
        UTF8_NAME
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        match from_utf8(src) {
            Ok(s) => {
                dst.push_str(s);
                Ok((src.len(), src.len()))
            }
            Err(err) => {
                let up_to = err.valid_up_to();
                if let Ok(valid) = from_utf8(&src[..up_to]) {
                    dst.push_str(valid);
                }
                match err.error_len() {
                    Some(length) => Err(DecodeError::Malformed {
                        read: up_to,
                        write: up_to,
                        length,
                    }),
                    None if finish => Err(DecodeError::Malformed {
                        read: up_to,
                        write: up_to,
                        length: src.len() - up_to,
                    }),
                    // the last character may be completed by the next input
                    None => Ok((up_to, up_to)),
                }
            }
        }
    }
}

/// Supported encodings.  
///
/// Encoding names are listed in lexical order.
pub const DEFAULT_SUPPORTED_ENCODINGS: &[&str] = &[
    ISO_8859_1_NAME,
    US_ASCII_NAME,
    UTF16_NAME,
    UTF16BE_NAME,
    UTF16LE_NAME,
    UTF8_NAME,
];

/// Manage aliases for encoding names.
///
/// Keys and values are stored in upper case because encoding names are matched
/// case-insensitively.
pub static ENCODING_ALIASES: LazyLock<RwLock<BTreeMap<Cow<'static, str>, Cow<'static, str>>>> =
    LazyLock::new(|| {
        RwLock::new(
            [
                ("UTF8", UTF8_NAME),
                ("UTF16", UTF16_NAME),
                ("UTF16BE", UTF16BE_NAME),
                ("UTF16LE", UTF16LE_NAME),
                ("ISO-10646-UCS-2", UTF16_NAME),
                ("ISO-IR-100", ISO_8859_1_NAME),
                ("ISO_8859-1", ISO_8859_1_NAME),
                ("ISO_8859-1:1987", ISO_8859_1_NAME),
                ("ISO8859-1", ISO_8859_1_NAME),
                ("LATIN1", ISO_8859_1_NAME),
                ("L1", ISO_8859_1_NAME),
                ("IBM819", ISO_8859_1_NAME),
                ("CP819", ISO_8859_1_NAME),
                ("ISOLATIN1", ISO_8859_1_NAME),
                ("ASCII", US_ASCII_NAME),
                ("US", US_ASCII_NAME),
                ("ISO646-US", US_ASCII_NAME),
                ("ANSI_X3.4-1968", US_ASCII_NAME),
                ("IBM367", US_ASCII_NAME),
                ("CP367", US_ASCII_NAME),
            ]
            .into_iter()
            .map(|(alias, real)| (Cow::Borrowed(alias), Cow::Borrowed(real)))
            .collect(),
        )
    });

fn normalize_name(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| b.is_ascii_lowercase()) {
        Cow::Owned(name.to_ascii_uppercase())
    } else {
        Cow::Borrowed(name)
    }
}

/// Register `alias` as an alias for the encoding name `real`.  \
/// If `alias` is already an alias for another encoding name, overwrite it and return
/// the encoding name before the overwrite.
///
/// Since aliases do not redirect multiple times, `real` must be the name registered
/// with the decoder.
pub fn register_encoding_alias(alias: &str, real: &str) -> Option<String> {
    ENCODING_ALIASES
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(
            Cow::Owned(alias.to_ascii_uppercase()),
            Cow::Owned(real.to_ascii_uppercase()),
        )
        .map(Cow::into_owned)
}
/// Unregister `alias` if it is registerd as an alias for an encoding name.  \
/// If successfully removed, return the real name.
pub fn unregister_encoding_alias(alias: &str) -> Option<String> {
    ENCODING_ALIASES
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(normalize_name(alias).as_ref())
        .map(Cow::into_owned)
}

pub type DecoderFactory = fn() -> Box<dyn Decoder>;
pub static DECODER_TABLE: LazyLock<RwLock<BTreeMap<Cow<'static, str>, DecoderFactory>>> =
    LazyLock::new(|| {
        let mut map = BTreeMap::<Cow<'static, str>, DecoderFactory>::new();
        map.insert(Cow::Borrowed(UTF8_NAME), || Box::new(UTF8Decoder));
        map.insert(Cow::Borrowed(UTF16_NAME), || Box::new(UTF16Decoder::default()));
        map.insert(Cow::Borrowed(UTF16BE_NAME), || Box::new(UTF16BEDecoder));
        map.insert(Cow::Borrowed(UTF16LE_NAME), || Box::new(UTF16LEDecoder));
        map.insert(Cow::Borrowed(ISO_8859_1_NAME), || Box::new(ISO8859_1Decoder));
        map.insert(Cow::Borrowed(US_ASCII_NAME), || Box::new(USASCIIDecoder));
        RwLock::new(map)
    });
/// Find a decoder by its name or by one of its aliases.
///
/// Names are matched case-insensitively.
pub fn find_decoder(encoding_name: &str) -> Option<Box<dyn Decoder>> {
    let name = normalize_name(encoding_name);
    let table = DECODER_TABLE
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(factory) = table.get(name.as_ref()) {
        return Some(factory());
    }

    let aliases = ENCODING_ALIASES
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let alias = aliases.get(name.as_ref())?;
    table.get(alias.as_ref()).map(|f| f())
}
/// Register a decoder for `encoding_name`.  \
/// If a decoder has already been registered for the name, it is replaced and returned.
pub fn register_decoder(encoding_name: &str, factory: DecoderFactory) -> Option<DecoderFactory> {
    DECODER_TABLE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(Cow::Owned(encoding_name.to_ascii_uppercase()), factory)
}
pub fn unregister_decoder(encoding_name: &str) -> Option<DecoderFactory> {
    DECODER_TABLE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(normalize_name(encoding_name).as_ref())
}

/// Check if `name` is one of the names of UTF-16 family.
pub(crate) fn is_utf16_name(name: &str) -> bool {
    let name = normalize_name(name);
    matches!(
        name.as_ref(),
        UTF16_NAME | UTF16BE_NAME | UTF16LE_NAME | "UTF16" | "UTF16BE" | "UTF16LE" | "ISO-10646-UCS-2"
    )
}
