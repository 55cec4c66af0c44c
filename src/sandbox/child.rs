// ! Framed transport over a plugin child process
// !
// ! Messages travel on the child's stdin/stdout as 8-byte little-endian
// ! length prefixes followed by a JSON payload; stderr carries the plugin's
// ! free-form output bytes. The framing lives here with the transport, not
// ! in the codec: the codec's messages are self-delimiting, and reader and
// ! writer must never interleave partial payloads.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};

use crate::core::error::{HostError, HostResult};

/// Upper bound on a single frame; a larger header is treated as corruption
const MAX_FRAME_BYTES: u64 = 64 * 1024 * 1024;

/// Writes length-prefixed frames to an async sink
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write one frame and flush it
    pub async fn write_frame(&mut self, payload: &[u8]) -> HostResult<()> {
        let header = (payload.len() as u64).to_le_bytes();
        self.inner
            .write_all(&header)
            .await
            .map_err(|e| HostError::running(format!("failed to write frame header: {e}")))?;
        self.inner
            .write_all(payload)
            .await
            .map_err(|e| HostError::running(format!("failed to write frame payload: {e}")))?;
        self.inner
            .flush()
            .await
            .map_err(|e| HostError::running(format!("failed to flush frame: {e}")))?;
        Ok(())
    }

    /// Shut down the underlying sink, signalling end-of-input to the child
    pub async fn shutdown(&mut self) -> HostResult<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| HostError::running(format!("failed to close plugin input: {e}")))
    }
}

/// Reads length-prefixed frames from an async source
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a source
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read one frame; `None` on clean end-of-stream
    ///
    /// End-of-stream inside a frame body is an error: the peer promised
    /// `len` bytes and went away.
    pub async fn read_frame(&mut self) -> HostResult<Option<Vec<u8>>> {
        let mut header = [0u8; 8];
        match self.inner.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(HostError::running(format!(
                    "failed to read frame header: {e}"
                )));
            }
        }

        let length = u64::from_le_bytes(header);
        if length > MAX_FRAME_BYTES {
            return Err(HostError::running(format!(
                "frame of {length} bytes exceeds the {MAX_FRAME_BYTES}-byte limit"
            )));
        }

        let mut payload = vec![0u8; length as usize];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(|e| HostError::running(format!("failed to read frame payload: {e}")))?;
        Ok(Some(payload))
    }
}

/// Handle on the spawned plugin process itself
#[derive(Debug)]
pub struct ChildProcess {
    inner: Child,
}

impl ChildProcess {
    /// Wait for the child to exit and return its exit code
    ///
    /// Termination by signal maps to `-1`, which callers report as a dirty
    /// exit.
    pub async fn wait(&mut self) -> HostResult<i32> {
        let status = self
            .inner
            .wait()
            .await
            .map_err(|e| HostError::running(format!("failed to wait for plugin: {e}")))?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Kill the child immediately
    pub async fn kill(&mut self) {
        let _ = self.inner.kill().await;
    }
}

/// A spawned plugin with its transport endpoints
///
/// The session owns the parent ends of the child's stdio; the child owns
/// its own descriptors and they close when it exits.
#[derive(Debug)]
pub struct PluginChild {
    pub(crate) child: Child,
}

impl PluginChild {
    /// Split the child into transport endpoints and a process handle
    ///
    /// Fails if any stdio handle was not piped, which would mean the
    /// launcher was bypassed.
    pub fn split(
        mut self,
    ) -> HostResult<(
        FrameWriter<BufWriter<ChildStdin>>,
        FrameReader<BufReader<ChildStdout>>,
        ChildStderr,
        ChildProcess,
    )> {
        let stdin = self
            .child
            .stdin
            .take()
            .ok_or_else(|| HostError::running("failed to get plugin stdin handle"))?;
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| HostError::running("failed to get plugin stdout handle"))?;
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or_else(|| HostError::running("failed to get plugin stderr handle"))?;

        Ok((
            FrameWriter::new(BufWriter::new(stdin)),
            FrameReader::new(BufReader::new(stdout)),
            stderr,
            ChildProcess { inner: self.child },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.write_frame(b"{\"a\":1}").await.unwrap();
        writer.write_frame(b"").await.unwrap();
        drop(writer);

        assert_eq!(reader.read_frame().await.unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert_eq!(reader.read_frame().await.unwrap(), Some(Vec::new()));
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_payload_is_an_error() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        // Header promises 100 bytes, stream ends after 3.
        client.write_all(&100u64.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let result = reader.read_frame().await;
        assert!(matches!(result, Err(HostError::RunningPluginFailed(_))));
    }

    #[tokio::test]
    async fn test_oversized_header_is_rejected() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);

        client.write_all(&u64::MAX.to_le_bytes()).await.unwrap();
        drop(client);

        let result = reader.read_frame().await;
        assert!(matches!(result, Err(HostError::RunningPluginFailed(_))));
    }
}
