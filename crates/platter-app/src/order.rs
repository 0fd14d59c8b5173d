use platter_core::error::{DecodingErrorKind, ErrorKind, Result};

/// Longest encoded line accepted or produced by the codec.
const MAX_LINE: usize = 512;

/// An order placed by a client: an id and a free-form item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Client-chosen order identifier.
    pub id: u64,
    /// Space-separated item list; must not contain a newline.
    pub items: String,
}

/// The kitchen's answer to an [`Order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Identifier of the order being answered.
    pub id: u64,
    /// Simulated service latency in milliseconds.
    pub latency_ms: u32,
    /// Echo of the ordered items.
    pub items: String,
}

fn first_line(bytes: &[u8], kind: DecodingErrorKind) -> Result<&str> {
    let text =
        std::str::from_utf8(bytes).map_err(|_| ErrorKind::DecodingError(kind))?;
    let end = text.find('\n').unwrap_or(text.len());
    Ok(&text[..end])
}

impl Order {
    /// Encodes as `ORDER <id> <items>\n`.
    ///
    /// Fails when the item list embeds a newline (which would forge a
    /// second line) or the encoded line exceeds the codec bound.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.items.contains('\n') {
            return Err(ErrorKind::DecodingError(DecodingErrorKind::Order));
        }
        let line = format!("ORDER {} {}\n", self.id, self.items);
        if line.len() > MAX_LINE {
            return Err(ErrorKind::MessageTooLarge { len: line.len(), max: MAX_LINE });
        }
        Ok(line.into_bytes())
    }

    /// Parses an `ORDER <id> <items>` line, trimming at the first newline.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let malformed = || ErrorKind::DecodingError(DecodingErrorKind::Order);
        let line = first_line(bytes, DecodingErrorKind::Order)?;
        let rest = line.strip_prefix("ORDER ").ok_or_else(malformed)?;
        let (id, items) = rest.split_once(' ').ok_or_else(malformed)?;
        let id = id.parse().map_err(|_| malformed())?;
        Ok(Order { id, items: items.to_string() })
    }
}

impl Reply {
    /// Encodes as `REPLY <id> <latency_ms> <items>\n`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.items.contains('\n') {
            return Err(ErrorKind::DecodingError(DecodingErrorKind::Reply));
        }
        let line = format!("REPLY {} {} {}\n", self.id, self.latency_ms, self.items);
        if line.len() > MAX_LINE {
            return Err(ErrorKind::MessageTooLarge { len: line.len(), max: MAX_LINE });
        }
        Ok(line.into_bytes())
    }

    /// Parses a `REPLY <id> <latency_ms> <items>` line.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let malformed = || ErrorKind::DecodingError(DecodingErrorKind::Reply);
        let line = first_line(bytes, DecodingErrorKind::Reply)?;
        let rest = line.strip_prefix("REPLY ").ok_or_else(malformed)?;
        let (id, rest) = rest.split_once(' ').ok_or_else(malformed)?;
        let (latency, items) = rest.split_once(' ').ok_or_else(malformed)?;
        let id = id.parse().map_err(|_| malformed())?;
        let latency_ms = latency.parse().map_err(|_| malformed())?;
        Ok(Reply { id, latency_ms, items: items.to_string() })
    }
}
