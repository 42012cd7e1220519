use bytes::Bytes;
use chunkvault_common::{ChunkIndex, FileDigestAccumulator, Sha256Digest};
use tokio::io::{AsyncRead, AsyncReadExt};

/// One fixed-size slice of an upload, already hashed (§3 invariant 4).
#[derive(Clone, Debug)]
pub struct ChunkPayload {
    pub index: ChunkIndex,
    pub bytes: Bytes,
    pub digest: Sha256Digest,
}

pub struct SplitFile {
    pub size: u64,
    pub digest: Sha256Digest,
    pub chunks: Vec<ChunkPayload>,
}

/// Reads `reader` to completion, splitting it into `chunk_size`-byte pieces
/// (the final piece may be shorter, never longer) and hashing each as it is
/// read — the whole-file digest is accumulated incrementally rather than by
/// rehashing the concatenation afterward (§4.1 step 1).
pub async fn split_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    chunk_size: u64,
) -> std::io::Result<SplitFile> {
    let chunk_size = chunk_size.max(1) as usize;
    let mut chunks = Vec::new();
    let mut accumulator = FileDigestAccumulator::new();
    let mut total: u64 = 0;
    let mut index: ChunkIndex = 0;

    loop {
        let mut buf = vec![0u8; chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        buf.truncate(filled);
        accumulator.update(&buf);
        total += filled as u64;
        let digest = Sha256Digest::compute(&buf);
        chunks.push(ChunkPayload {
            index,
            bytes: Bytes::from(buf),
            digest,
        });
        index += 1;

        if filled < chunk_size {
            break;
        }
    }

    Ok(SplitFile {
        size: total,
        digest: accumulator.finish(),
        chunks,
    })
}
