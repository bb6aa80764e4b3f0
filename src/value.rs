/// Document is an opaque value in the ledger's self-describing binary
/// encoding. The driver never interprets document contents; it only moves
/// the serialized bytes between the caller and the transport and hashes
/// them for the commit digest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document(Vec<u8>);

impl Document {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// as_text returns the document content as a string for transports that
    /// surface plain text documents (the convenience listings rely on this).
    /// Returns None when the bytes are not valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<Vec<u8>> for Document {
    fn from(bytes: Vec<u8>) -> Self {
        Document(bytes)
    }
}

impl From<&[u8]> for Document {
    fn from(bytes: &[u8]) -> Self {
        Document(bytes.to_vec())
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Document(text.as_bytes().to_vec())
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Document(text.into_bytes())
    }
}
