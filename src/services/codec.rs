//! Payload compression codecs
//!
//! Streaming encode/decode for the supported payload formats. Decoding
//! wraps the reader side, encoding drives the writer side to completion,
//! so a re-encode pipes through without buffering whole payloads.

use crate::error::{NarkeepError, NarkeepResult};
use crate::store::narinfo::CompressionFormat;
use std::io::{self, Read, Write};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;
use zstd::stream::read::Decoder as ZstdDecoder;
use zstd::stream::write::Encoder as ZstdEncoder;

/// Codec seam for payload re-encoding
pub trait NarCodec: Send + Sync {
    /// Wrap `src` so reads yield the decompressed stream
    fn decode<'a>(
        &self,
        format: CompressionFormat,
        src: Box<dyn Read + 'a>,
    ) -> NarkeepResult<Box<dyn Read + 'a>>;

    /// Compress `src` into `dst`, returning the uncompressed bytes consumed
    fn encode(
        &self,
        format: CompressionFormat,
        src: &mut dyn Read,
        dst: &mut dyn Write,
    ) -> NarkeepResult<u64>;
}

/// xz2/zstd backed codec
pub struct StreamCodec {
    pub xz_level: u32,
    pub zstd_level: i32,
}

impl Default for StreamCodec {
    fn default() -> Self {
        Self {
            xz_level: 6,
            zstd_level: 3,
        }
    }
}

impl NarCodec for StreamCodec {
    fn decode<'a>(
        &self,
        format: CompressionFormat,
        src: Box<dyn Read + 'a>,
    ) -> NarkeepResult<Box<dyn Read + 'a>> {
        match format {
            CompressionFormat::None => Ok(src),
            CompressionFormat::Xz => Ok(Box::new(XzDecoder::new(src))),
            CompressionFormat::Zstd => {
                let decoder = ZstdDecoder::new(src)
                    .map_err(|e| NarkeepError::io("starting zstd decoder", e))?;
                Ok(Box::new(decoder))
            }
        }
    }

    fn encode(
        &self,
        format: CompressionFormat,
        src: &mut dyn Read,
        dst: &mut dyn Write,
    ) -> NarkeepResult<u64> {
        let copied = match format {
            CompressionFormat::None => io::copy(src, dst)
                .map_err(|e| NarkeepError::io("copying uncompressed stream", e))?,
            CompressionFormat::Xz => {
                let mut encoder = XzEncoder::new(dst, self.xz_level);
                let copied = io::copy(src, &mut encoder)
                    .map_err(|e| NarkeepError::io("compressing xz stream", e))?;
                encoder
                    .finish()
                    .map_err(|e| NarkeepError::io("finishing xz stream", e))?;
                copied
            }
            CompressionFormat::Zstd => {
                let mut encoder = ZstdEncoder::new(dst, self.zstd_level)
                    .map_err(|e| NarkeepError::io("starting zstd encoder", e))?;
                let copied = io::copy(src, &mut encoder)
                    .map_err(|e| NarkeepError::io("compressing zstd stream", e))?;
                encoder
                    .finish()
                    .map_err(|e| NarkeepError::io("finishing zstd stream", e))?;
                copied
            }
        };
        Ok(copied)
    }
}
