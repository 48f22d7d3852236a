use crate::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest payload a two byte length prefix can carry.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Framed transport over a byte stream.
///
/// Every frame is a big endian two byte length prefix followed by that many
/// payload bytes. This is the only place that touches the port; framing
/// failures are fatal to the connection owning the port.
pub struct FrameTransport<Source> {
    pub source: Source,
}

impl<S> FrameTransport<S>
where
    S: AsyncReadExt + Unpin + Send,
{
    /// Reads one frame from the ITU.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, Error> {
        let mut header = [0; 2];
        self.source.read_exact(&mut header).await?;
        let len = u16::from_be_bytes(header) as usize;
        if len < 2 {
            return Err(Error::InvalidFrameLength(len));
        }
        let mut frame = vec![0; len];
        self.source.read_exact(&mut frame).await?;
        log::debug!("Read {}", hex::encode(&frame));
        Ok(frame)
    }
}

impl<S> FrameTransport<S>
where
    S: AsyncWriteExt + Unpin + Send,
{
    /// Writes one frame to the ITU and flushes the port.
    pub async fn write_frame(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() || data.len() > MAX_FRAME_LEN {
            return Err(Error::InvalidFrameLength(data.len()));
        }
        log::debug!("Write {}", hex::encode(data));
        self.source
            .write_all(&(data.len() as u16).to_be_bytes())
            .await?;
        self.source.write_all(data).await?;
        self.source.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_read_one() {
        let mut port = FrameTransport {
            source: b"\x00\x0512345" as &[u8],
        };
        assert_eq!(port.read_frame().await.unwrap(), b"12345");
    }

    #[tokio::test]
    async fn test_read_two() {
        let mut port = FrameTransport {
            source: b"\x00\x0512345\x00\x06123456" as &[u8],
        };
        assert_eq!(port.read_frame().await.unwrap(), b"12345");
        assert_eq!(port.read_frame().await.unwrap(), b"123456");
    }

    #[tokio::test]
    async fn test_read_end_of_file() {
        let mut port = FrameTransport {
            source: b"" as &[u8],
        };
        assert_eq!(port.read_frame().await, Err(Error::EndOfStream));
    }

    #[tokio::test]
    async fn test_read_truncated_header() {
        let mut port = FrameTransport {
            source: b"a" as &[u8],
        };
        assert_eq!(port.read_frame().await, Err(Error::EndOfStream));
    }

    #[tokio::test]
    async fn test_read_truncated_body() {
        let mut port = FrameTransport {
            source: b"\x00\x09trunca" as &[u8],
        };
        assert_eq!(port.read_frame().await, Err(Error::EndOfStream));
    }

    #[tokio::test]
    async fn test_read_undersize_length() {
        let mut port = FrameTransport {
            source: b"\x00\x01x" as &[u8],
        };
        assert_eq!(port.read_frame().await, Err(Error::InvalidFrameLength(1)));
    }

    #[tokio::test]
    async fn test_write_one() {
        let mut port = FrameTransport { source: Vec::new() };
        port.write_frame(b"hello world").await.unwrap();
        assert_eq!(port.source, b"\x00\x0bhello world");
    }

    #[tokio::test]
    async fn test_write_two() {
        let mut port = FrameTransport { source: Vec::new() };
        port.write_frame(b"12345").await.unwrap();
        port.write_frame(b"123456").await.unwrap();
        assert_eq!(port.source, b"\x00\x0512345\x00\x06123456");
    }

    #[tokio::test]
    async fn test_write_too_much() {
        let mut port = FrameTransport { source: Vec::new() };
        let oversize = vec![b'x'; MAX_FRAME_LEN + 1];
        assert_eq!(
            port.write_frame(&oversize).await,
            Err(Error::InvalidFrameLength(MAX_FRAME_LEN + 1))
        );
        assert!(port.source.is_empty());
    }
}
