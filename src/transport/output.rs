/// Append-only accumulator for a child's standard output.
///
/// Chunks are kept as raw bytes so a multi-byte character split across two
/// reads is decoded correctly; decoding and trimming happen once, in
/// [`OutputBuffer::finish`].
#[derive(Debug, Default)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
    chunks: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        self.chunks += 1;
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn finish(self) -> String {
        String::from_utf8_lossy(&self.bytes).trim().to_string()
    }
}
