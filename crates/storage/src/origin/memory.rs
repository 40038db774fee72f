use crate::error::Result;
use crate::origin::{BoxRead, Origin};
use crate::{OriginKind, Stat};
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Arc;

/// Raw bytes supplied by the caller.
///
/// Always predictable, never writable, and has no natural file name.
#[derive(Clone, Debug)]
pub struct MemoryOrigin {
    data: Arc<[u8]>,
    locator: String,
}

impl MemoryOrigin {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Arc<[u8]> = data.into().into();
        let locator = format!("memory:{}", blake3::hash(&data).to_hex());
        Self { data, locator }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl Origin for MemoryOrigin {
    fn kind(&self) -> OriginKind {
        OriginKind::Memory
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn default_archive_path(&self) -> Option<String> {
        None
    }

    async fn stat(&self) -> Result<Stat> {
        Ok(Stat::sized(self.data.len() as u64))
    }

    async fn reader(&self) -> Result<BoxRead> {
        Ok(Box::pin(Cursor::new(Arc::clone(&self.data))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_locator_is_content_addressed() {
        let first = MemoryOrigin::new("same");
        let second = MemoryOrigin::new(b"same".to_vec());
        let other = MemoryOrigin::new("different");
        assert_eq!(first.locator(), second.locator());
        assert_ne!(first.locator(), other.locator());
        assert!(first.locator().starts_with("memory:"));
        assert_eq!(first.default_archive_path(), None);
    }

    #[tokio::test]
    async fn test_memory_origin_is_not_writable() {
        let origin = MemoryOrigin::new("");
        assert!(origin.is_empty());
        assert_eq!(origin.stat().await.unwrap().size, Some(0));
        let err = origin.writer().await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotWritable(_)));
    }
}
