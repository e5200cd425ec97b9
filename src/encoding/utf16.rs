use crate::encoding::{DecodeError, Decoder};

pub const UTF16_NAME: &str = "UTF-16";
pub const UTF16BE_NAME: &str = "UTF-16BE";
pub const UTF16LE_NAME: &str = "UTF-16LE";

fn decode_utf16(
    src: &[u8],
    dst: &mut String,
    finish: bool,
    unit: fn([u8; 2]) -> u16,
) -> Result<(usize, usize), DecodeError> {
    let mut read = 0;
    let mut write = 0;
    while read + 2 <= src.len() {
        let high = unit([src[read], src[read + 1]]);
        let c = match high {
            0xD800..=0xDBFF => {
                if read + 4 > src.len() {
                    // the low surrogate may arrive with the next input
                    break;
                }
                let low = unit([src[read + 2], src[read + 3]]);
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(DecodeError::Malformed {
                        read,
                        write,
                        length: 2,
                    });
                }
                let code = 0x10000 + (((high as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00);
                char::from_u32(code).map(|c| (c, 4))
            }
            0xDC00..=0xDFFF => None,
            _ => char::from_u32(high as u32).map(|c| (c, 2)),
        };
        let Some((c, len)) = c else {
            return Err(DecodeError::Malformed {
                read,
                write,
                length: 2,
            });
        };
        dst.push(c);
        read += len;
        write += c.len_utf8();
    }

    if finish && read < src.len() {
        return Err(DecodeError::Malformed {
            read,
            write,
            length: src.len() - read,
        });
    }
    Ok((read, write))
}

/// UTF-16 decoder that detects the byte order from a leading BOM.
///
/// If no BOM is found, the input is treated as big endian.
#[derive(Debug, Default)]
pub struct UTF16Decoder {
    be: Option<bool>,
}
impl Decoder for UTF16Decoder {
    fn name(&self) -> &'static str {
        UTF16_NAME
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        let mut base = 0;
        if self.be.is_none() {
            match src {
                [0xFF, 0xFE, ..] => {
                    self.be = Some(false);
                    base = 2;
                }
                [0xFE, 0xFF, ..] => {
                    self.be = Some(true);
                    base = 2;
                }
                [_, _, ..] => self.be = Some(true),
                _ if !finish => return Ok((0, 0)),
                _ => self.be = Some(true),
            }
        }

        let (read, write) = if self.be == Some(false) {
            UTF16LEDecoder.decode(&src[base..], dst, finish)
        } else {
            UTF16BEDecoder.decode(&src[base..], dst, finish)
        }
        .map_err(|err| match err {
            DecodeError::Malformed {
                read,
                write,
                length,
            } => DecodeError::Malformed {
                read: read + base,
                write,
                length,
            },
            err => err,
        })?;
        Ok((read + base, write))
    }
}

pub struct UTF16BEDecoder;
impl Decoder for UTF16BEDecoder {
    fn name(&self) -> &'static str {
        UTF16BE_NAME
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        decode_utf16(src, dst, finish, u16::from_be_bytes)
    }
}

pub struct UTF16LEDecoder;
impl Decoder for UTF16LEDecoder {
    fn name(&self) -> &'static str {
        UTF16LE_NAME
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        decode_utf16(src, dst, finish, u16::from_le_bytes)
    }
}
