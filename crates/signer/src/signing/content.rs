use std::fmt;
use std::io;

use bytes::{Buf, Bytes};
use futures::Stream;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Input to be signed.
///
/// In-memory data is written in one piece; readers and streams are pumped
/// chunk by chunk until end-of-stream.
pub enum Content {
    Bytes(Bytes),
    Reader(BoxedReader),
}

impl Content {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Content::Reader(Box::new(reader))
    }

    /// Adapts a stream of chunks. An `Err` item aborts the signing call.
    pub fn from_stream<S, B>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<B>> + Send + Unpin + 'static,
        B: Buf + Send + Unpin + 'static,
    {
        Content::from_reader(StreamReader::new(stream))
    }

    /// Only in-memory content can be known to be empty up front.
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Content::Bytes(bytes) => bytes.is_empty(),
            Content::Reader(_) => false,
        }
    }

    pub(crate) fn into_reader(self) -> BoxedReader {
        match self {
            Content::Bytes(bytes) => Box::new(io::Cursor::new(bytes)),
            Content::Reader(reader) => reader,
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Content::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Bytes(Bytes::from(text))
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Bytes(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<&[u8]> for Content {
    fn from(bytes: &[u8]) -> Self {
        Content::Bytes(Bytes::copy_from_slice(bytes))
    }
}
