//! Certificate decompression (RFC 8879) for the algorithms a profile advertises.
//!
//! A client never compresses, so only the decompress side is implemented.

use rama_boring::ssl::{CertificateCompressionAlgorithm, CertificateCompressor};
use std::io::{self, Write};

fn compress_unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "client does not compress certificates")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BrotliCertificateDecompressor;

impl CertificateCompressor for BrotliCertificateDecompressor {
    const ALGORITHM: CertificateCompressionAlgorithm = CertificateCompressionAlgorithm::BROTLI;
    const CAN_COMPRESS: bool = false;
    const CAN_DECOMPRESS: bool = true;

    fn compress<W>(&self, _input: &[u8], _output: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        Err(compress_unsupported())
    }

    fn decompress<W>(&self, input: &[u8], output: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        brotli::BrotliDecompress(&mut io::Cursor::new(input), output)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibCertificateDecompressor;

impl CertificateCompressor for ZlibCertificateDecompressor {
    const ALGORITHM: CertificateCompressionAlgorithm = CertificateCompressionAlgorithm::ZLIB;
    const CAN_COMPRESS: bool = false;
    const CAN_DECOMPRESS: bool = true;

    fn compress<W>(&self, _input: &[u8], _output: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        Err(compress_unsupported())
    }

    fn decompress<W>(&self, input: &[u8], output: &mut W) -> io::Result<()>
    where
        W: Write,
    {
        let mut decoder = flate2::write::ZlibDecoder::new(output);
        decoder.write_all(input)?;
        decoder.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_decompresses() -> io::Result<()> {
        let original = b"certificate bytes ".repeat(20);
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&original)?;
        let compressed = encoder.finish()?;

        let mut out = Vec::new();
        ZlibCertificateDecompressor.decompress(&compressed, &mut out)?;
        assert_eq!(out, original);
        Ok(())
    }

    #[test]
    fn brotli_decompresses() -> io::Result<()> {
        let original = b"certificate bytes ".repeat(20);
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(&original)?;
        }

        let mut out = Vec::new();
        BrotliCertificateDecompressor.decompress(&compressed, &mut out)?;
        assert_eq!(out, original);
        Ok(())
    }

    #[test]
    fn compression_is_refused() {
        let mut out = Vec::new();
        assert!(BrotliCertificateDecompressor.compress(b"x", &mut out).is_err());
        assert!(ZlibCertificateDecompressor.compress(b"x", &mut out).is_err());
    }
}
