//! Codec for the session cookie value.
//!
//! The value is a two-entry associative structure in the length-prefixed serialization already
//! issued to clients by earlier deployments:
//!
//! ```text
//! a:2:{s:6:"expire";i:<EXPIRE>;s:4:"data";s:<LEN>:"<DATA>";}
//! ```
//!
//! `<LEN>` counts bytes, not characters. Decoding is strict: keys, key order, entry count and
//! lengths must match exactly and nothing may follow the closing brace.

use crate::error::{Error, Result};

/// Decoded contents of a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Unix timestamp after which the payload is stale. `0` means it lives as long as the
    /// browser session.
    pub expire: i64,
    pub data: String,
}

impl Payload {
    pub fn new(expire: i64, data: impl Into<String>) -> Self {
        Self {
            expire,
            data: data.into(),
        }
    }

    /// Whether the payload is past its `expire` timestamp at `now` (unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expire != 0 && self.expire < now
    }
}

/// Encode a [`Payload`] into the cookie value.
pub fn encode_payload(payload: &Payload) -> String {
    format!(
        "a:2:{{s:6:\"expire\";i:{};s:4:\"data\";s:{}:\"{}\";}}",
        payload.expire,
        payload.data.len(),
        payload.data
    )
}

/// Decode a cookie value into a [`Payload`].
pub fn decode_payload(value: &str) -> Result<Payload> {
    let mut cursor = Cursor::new(value.as_bytes());

    cursor.literal("a:2:{")?;
    cursor.key("expire")?;
    cursor.literal("i:")?;
    let expire = cursor.integer(b';')?;
    cursor.key("data")?;
    let data = cursor.string()?;
    cursor.literal("}")?;
    cursor.finish()?;

    Ok(Payload { expire, data })
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, what: &str) -> Error {
        Error::Decode(format!("expected {what} at byte {}", self.pos))
    }

    fn literal(&mut self, lit: &str) -> Result<()> {
        let end = self.pos + lit.len();
        if self.input.get(self.pos..end) != Some(lit.as_bytes()) {
            return Err(self.error(&format!("`{lit}`")));
        }
        self.pos = end;
        Ok(())
    }

    /// Reads a signed decimal integer followed by `terminator`.
    fn integer(&mut self, terminator: u8) -> Result<i64> {
        let start = self.pos;
        let input = self.input;
        let rest = &input[start..];
        let len = rest
            .iter()
            .position(|&b| b == terminator)
            .ok_or_else(|| self.error("integer"))?;
        let digits = std::str::from_utf8(&rest[..len]).map_err(|_| self.error("integer"))?;
        let n = digits.parse::<i64>().map_err(|_| self.error("integer"))?;
        self.pos = start + len + 1;
        Ok(n)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error(&format!("{len} bytes")))?;
        let input = self.input;
        let bytes = &input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// `s:<LEN>:"<DATA>";`
    fn string(&mut self) -> Result<String> {
        self.literal("s:")?;
        let len = self.integer(b':')?;
        let len = usize::try_from(len).map_err(|_| self.error("string length"))?;
        self.literal("\"")?;
        let bytes = self.take(len)?;
        self.literal("\";")?;
        String::from_utf8(bytes.to_vec()).map_err(|err| Error::Decode(err.to_string()))
    }

    fn key(&mut self, name: &str) -> Result<()> {
        let key = self.string()?;
        if key != name {
            return Err(Error::Decode(format!("expected key `{name}`, found `{key}`")));
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.input.len() {
            return Err(self.error("end of input"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_session_lifetime_payload() {
        let value = encode_payload(&Payload::new(0, "mydata"));
        assert_eq!(value, r#"a:2:{s:6:"expire";i:0;s:4:"data";s:6:"mydata";}"#);
    }

    #[test]
    fn encodes_byte_length_of_multibyte_data() {
        let value = encode_payload(&Payload::new(1700000000, "héllo"));
        assert_eq!(
            value,
            r#"a:2:{s:6:"expire";i:1700000000;s:4:"data";s:6:"héllo";}"#
        );
    }

    #[test]
    fn decodes_existing_cookie() {
        let payload = decode_payload(r#"a:2:{s:6:"expire";i:0;s:4:"data";s:6:"mydata";}"#)
            .expect("cookie payload decodes successfully");
        assert_eq!(payload, Payload::new(0, "mydata"));
    }

    #[test]
    fn decodes_data_containing_delimiters() {
        let data = r#"x";}a:2:{"#;
        let value = encode_payload(&Payload::new(-1, data));
        let payload = decode_payload(&value).expect("cookie payload decodes successfully");
        assert_eq!(payload.expire, -1);
        assert_eq!(payload.data, data);
    }

    #[test]
    fn decodes_empty_data() {
        let payload = decode_payload(r#"a:2:{s:6:"expire";i:0;s:4:"data";s:0:"";}"#)
            .expect("cookie payload decodes successfully");
        assert_eq!(payload.data, "");
    }

    #[test]
    fn rejects_malformed_values() {
        let bad = [
            "",
            "bogus",
            r#"a:1:{s:6:"expire";i:0;}"#,
            r#"a:2:{s:4:"data";s:6:"mydata";s:6:"expire";i:0;}"#,
            r#"a:2:{s:6:"expire";i:zero;s:4:"data";s:6:"mydata";}"#,
            r#"a:2:{s:6:"expire";i:0;s:4:"data";s:7:"mydata";}"#,
            r#"a:2:{s:6:"expire";i:0;s:4:"data";s:5:"mydata";}"#,
            r#"a:2:{s:6:"expire";i:0;s:4:"data";s:-1:"";}"#,
            r#"a:2:{s:6:"expire";i:0;s:4:"data";s:6:"mydata";}extra"#,
            r#"a:2:{s:6:"expire";i:0;s:4:"data";s:99999999999999999999:"x";}"#,
        ];

        for value in bad {
            assert!(
                matches!(decode_payload(value), Err(Error::Decode(_))),
                "accepted {value:?}"
            );
        }
    }

    #[test]
    fn rejects_length_splitting_a_character() {
        assert!(decode_payload(r#"a:2:{s:6:"expire";i:0;s:4:"data";s:1:"é";}"#).is_err());
    }

    #[test]
    fn expiry_check() {
        assert!(!Payload::new(0, "").is_expired_at(i64::MAX));
        assert!(Payload::new(10, "").is_expired_at(11));
        assert!(!Payload::new(10, "").is_expired_at(10));
    }
}
