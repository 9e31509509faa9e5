use std::io::BufRead;

/// Kind tag written at the front of every canonical object encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
        }
    }

    /// Consume the `<type> <size>\0` header and return the type and declared size
    pub fn parse_header(data_reader: &mut impl BufRead) -> anyhow::Result<(ObjectType, usize)> {
        let mut object_type = Vec::new();
        data_reader.read_until(b' ', &mut object_type)?;
        let object_type = String::from_utf8(object_type)?;
        let object_type = ObjectType::try_from(object_type.trim())?;

        let mut size = Vec::new();
        data_reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            anyhow::bail!("Invalid object header: missing size terminator");
        }
        let size = String::from_utf8(size)?
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("Invalid object header: bad size"))?;

        Ok((object_type, size))
    }

    /// Prefix the content with its canonical header
    pub fn encode(&self, content: &[u8]) -> Vec<u8> {
        let mut encoded = format!("{} {}\0", self.as_str(), content.len()).into_bytes();
        encoded.extend_from_slice(content);
        encoded
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            _ => Err(anyhow::anyhow!("Invalid object type: {}", value)),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_is_parsed_back() {
        let encoded = ObjectType::Tree.encode(b"abc");
        let mut reader = Cursor::new(encoded);

        let (object_type, size) = ObjectType::parse_header(&mut reader).unwrap();
        pretty_assertions::assert_eq!((object_type, size), (ObjectType::Tree, 3));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut reader = Cursor::new(b"tag 3\0abc".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }
}
