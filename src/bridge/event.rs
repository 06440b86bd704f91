//! Owned header events.

use std::borrow::Cow;

use super::context::RegistrationId;

/// One header block delivered by the node, copied out of the node's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEvent {
    registration: RegistrationId,
    bytes: Vec<u8>,
}

impl HeaderEvent {
    pub fn new(registration: RegistrationId, bytes: Vec<u8>) -> Self {
        Self { registration, bytes }
    }

    /// The context registration this event was delivered through.
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lossy UTF-8 view of the raw bytes.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// `Name: value` pairs, one per line. Lines without a colon or with
    /// invalid UTF-8 are skipped.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bytes
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter_map(|line| std::str::from_utf8(line).ok())
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim(), value.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(bytes: &[u8]) -> HeaderEvent {
        HeaderEvent::new(RegistrationId(1), bytes.to_vec())
    }

    #[test]
    fn fields_split_on_crlf_and_lf() {
        let e = event(b"Host: example.com\r\nX-Test: 1\nAccept:  */* ");
        let fields: Vec<_> = e.fields().collect();
        assert_eq!(
            fields,
            vec![("Host", "example.com"), ("X-Test", "1"), ("Accept", "*/*")]
        );
    }

    #[test]
    fn fields_skip_garbage() {
        let e = event(b"no colon here\r\n\xff\xfe: bad\r\nOk: yes");
        let fields: Vec<_> = e.fields().collect();
        assert_eq!(fields, vec![("Ok", "yes")]);
    }

    #[test]
    fn text_is_lossy() {
        let e = event(b"X-Test: \xff");
        assert_eq!(e.text(), "X-Test: \u{fffd}");
        assert_eq!(e.len(), 9);
    }

    #[test]
    fn into_bytes_hands_back_the_copy() {
        let e = event(b"X-Test: 1");
        assert_eq!(e.registration(), RegistrationId(1));
        assert_eq!(e.into_bytes(), b"X-Test: 1".to_vec());
    }
}
