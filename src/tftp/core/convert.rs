use super::packet::PacketError;

/// Byte-level helpers shared by the packet codec.
pub struct Convert;

impl Convert {
    /// Reads a big-endian `u16` at `offset`.
    pub fn to_u16(buf: &[u8], offset: usize) -> Option<u16> {
        let bytes = buf.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a NUL-terminated UTF-8 string starting at `offset`.
    ///
    /// Returns the string without its terminator and the offset just past the
    /// terminator. `None` if no terminator exists or the bytes are not UTF-8.
    pub fn to_string(buf: &[u8], offset: usize) -> Option<(String, usize)> {
        let rest = buf.get(offset..)?;
        let end = rest.iter().position(|&b| b == 0)?;
        let value = std::str::from_utf8(&rest[..end]).ok()?;

        Some((value.to_string(), offset + end + 1))
    }

    /// Appends `value` followed by a NUL terminator.
    pub fn push_string(buf: &mut Vec<u8>, value: &str) {
        buf.extend_from_slice(value.as_bytes());
        buf.push(0);
    }

    /// Like [`Convert::to_string`] but rejects empty values, mapping failures
    /// to [`PacketError::InvalidRequest`].
    pub fn to_request_field(
        buf: &[u8],
        offset: usize,
        field: &'static str,
    ) -> Result<(String, usize), PacketError> {
        let (value, next) = Self::to_string(buf, offset)
            .ok_or_else(|| PacketError::InvalidRequest(format!("unterminated {}", field)))?;
        if value.is_empty() {
            return Err(PacketError::InvalidRequest(format!("empty {}", field)));
        }

        Ok((value, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_u16() {
        assert_eq!(Convert::to_u16(&[0x01, 0x02, 0x03], 1), Some(0x0203));
        assert_eq!(Convert::to_u16(&[0x01], 0), None);
    }

    #[test]
    fn reads_terminated_strings() {
        let buf = b"abc\0de\0";
        assert_eq!(Convert::to_string(buf, 0), Some(("abc".to_string(), 4)));
        assert_eq!(Convert::to_string(buf, 4), Some(("de".to_string(), 7)));
        assert_eq!(Convert::to_string(buf, 7), None);
    }

    #[test]
    fn missing_terminator_is_none() {
        assert_eq!(Convert::to_string(b"abc", 0), None);
    }

    #[test]
    fn invalid_utf8_is_none() {
        assert_eq!(Convert::to_string(&[0xff, 0xfe, 0x00], 0), None);
    }

    #[test]
    fn request_field_rejects_empty() {
        let err = Convert::to_request_field(b"\0octet\0", 0, "filename").unwrap_err();
        assert!(matches!(err, PacketError::InvalidRequest(_)));
    }
}
