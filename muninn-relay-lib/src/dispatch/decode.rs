//! Undo `content-encoding` on a fully read response body.

use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use http::HeaderMap;
use std::io::{self, Read};

const BROTLI_BUFFER_SIZE: usize = 4096;

fn decode_one(encoding: &str, input: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len().saturating_mul(4));
    match encoding {
        "gzip" | "x-gzip" => {
            flate2::read::GzDecoder::new(input).read_to_end(&mut out)?;
        }
        "deflate" => {
            // servers send both zlib-wrapped and raw deflate under this name
            if flate2::read::ZlibDecoder::new(input).read_to_end(&mut out).is_err() {
                out.clear();
                flate2::read::DeflateDecoder::new(input).read_to_end(&mut out)?;
            }
        }
        "br" => {
            brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE).read_to_end(&mut out)?;
        }
        "identity" => out.extend_from_slice(input),
        other => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported content-encoding '{other}'"),
            ))
        }
    }
    Ok(out)
}

/// Decode `body` according to its `content-encoding` header.
///
/// Codings are undone in reverse order of application. On success the
/// `content-encoding` and `content-length` headers are removed since they no
/// longer describe the body. Without the header the body is returned as is.
/// On error the headers are left untouched.
pub fn decode_body(headers: &mut HeaderMap, body: Bytes) -> io::Result<Bytes> {
    let codings: Vec<String> = headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if codings.is_empty() || body.is_empty() {
        return Ok(body);
    }

    let mut decoded = body.to_vec();
    for coding in codings.iter().rev() {
        decoded = decode_one(coding, &decoded)?;
    }
    headers.remove(CONTENT_ENCODING);
    headers.remove(CONTENT_LENGTH);
    Ok(Bytes::from(decoded))
}
