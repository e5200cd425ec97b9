use crate::encoding::{DecodeError, Decoder};

pub const ISO_8859_1_NAME: &str = "ISO-8859-1";

/// ISO-8859-1 maps every byte to the code point with the same value.
pub struct ISO8859_1Decoder;
impl Decoder for ISO8859_1Decoder {
    fn name(&self) -> &'static str {
        ISO_8859_1_NAME
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        _finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        let old = dst.len();
        dst.extend(src.iter().map(|&b| b as char));
        Ok((src.len(), dst.len() - old))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_high_half() {
        let mut dst = String::new();
        let (read, write) = ISO8859_1Decoder
            .decode(b"caf\xE9", &mut dst, true)
            .unwrap();
        assert_eq!((read, write), (4, 5));
        assert_eq!(dst, "café");
    }
}
