//! `multipart/form-data` body encoder for Bot API file uploads.
//!
//! Text fields are written first, followed by a single file part whose
//! contents are streamed from any [`AsyncRead`] in fixed-size chunks, so the
//! file never has to be held in memory.

use bytes::{BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Read size for the streamed file part.
pub const CHUNK_SIZE: usize = 4096;

const CRLF: &[u8] = b"\r\n";

/// A form body with ordered text fields and one trailing file part.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    fields: Vec<(String, String)>,
    file_field: String,
    file_name: String,
}

impl MultipartBody {
    /// New body with a random boundary.
    ///
    /// `file_name` is sent as given, except that `"` and `\` are
    /// backslash-escaped and CR/LF are percent-encoded so the header line
    /// stays intact.
    pub fn new(file_field: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::with_boundary(random_boundary(), file_field, file_name)
    }

    pub fn with_boundary(
        boundary: impl Into<String>,
        file_field: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            boundary: boundary.into(),
            fields: Vec::new(),
            file_field: file_field.into(),
            file_name: file_name.into(),
        }
    }

    /// Append a plain text field. Fields are emitted in insertion order.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact encoded length for a file of `file_len` bytes.
    pub fn encoded_len(&self, file_len: u64) -> u64 {
        (self.head().len() + self.tail().len()) as u64 + file_len
    }

    /// Everything preceding the file bytes.
    fn head(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for (name, value) in &self.fields {
            self.put_delimiter(&mut buf);
            buf.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"",
                    escape_quoted(name)
                )
                .as_bytes(),
            );
            buf.put_slice(CRLF);
            buf.put_slice(CRLF);
            buf.put_slice(value.as_bytes());
            buf.put_slice(CRLF);
        }

        self.put_delimiter(&mut buf);
        buf.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                escape_quoted(&self.file_field),
                escape_quoted(&self.file_name)
            )
            .as_bytes(),
        );
        buf.put_slice(CRLF);
        buf.put_slice(b"Content-Type: application/octet-stream");
        buf.put_slice(CRLF);
        buf.put_slice(CRLF);
        buf.freeze()
    }

    /// File part terminator and closing delimiter.
    fn tail(&self) -> Bytes {
        Bytes::from(format!("\r\n--{}--\r\n", self.boundary))
    }

    fn put_delimiter(&self, buf: &mut BytesMut) {
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(CRLF);
    }

    /// Encode the body, pulling the file part from `reader`.
    pub fn into_stream<R>(self, reader: R) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static
    where
        R: AsyncRead + Send + 'static,
    {
        let head = self.head();
        let tail = self.tail();

        stream::iter([Ok(head)])
            .chain(ReaderStream::with_capacity(reader, CHUNK_SIZE))
            .chain(stream::iter([Ok(tail)]))
    }
}

fn random_boundary() -> String {
    format!("---{}---", Uuid::new_v4().simple())
}

/// Escape the characters that would break a quoted header parameter.
fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
