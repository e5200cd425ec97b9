use crate::encoding::{DecodeError, Decoder};

pub const US_ASCII_NAME: &str = "US-ASCII";

pub struct USASCIIDecoder;
impl Decoder for USASCIIDecoder {
    fn name(&self) -> &'static str {
        US_ASCII_NAME
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        _finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        let len = src.iter().position(|b| !b.is_ascii()).unwrap_or(src.len());
        dst.extend(src[..len].iter().map(|&b| b as char));
        if len < src.len() {
            return Err(DecodeError::Malformed {
                read: len,
                write: len,
                length: 1,
            });
        }
        Ok((len, len))
    }
}
