//! Merging of a container's stdout and stderr into one stream

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CHUNK_SIZE: usize = 4096;

/// Copy both inputs into `sink` as data arrives until both reach EOF
///
/// Chunks are written whole, so lines are only interleaved at chunk
/// boundaries. Fails as soon as `sink` stops accepting data.
pub async fn merge<A, B, W>(mut stdout: A, mut stderr: B, mut sink: W) -> std::io::Result<()>
where
    A: AsyncRead + Unpin,
    B: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut out_buf = [0u8; CHUNK_SIZE];
    let mut err_buf = [0u8; CHUNK_SIZE];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => match read? {
                0 => out_open = false,
                n => sink.write_all(&out_buf[..n]).await?,
            },
            read = stderr.read(&mut err_buf), if err_open => match read? {
                0 => err_open = false,
                n => sink.write_all(&err_buf[..n]).await?,
            },
        }
    }

    sink.shutdown().await
}
