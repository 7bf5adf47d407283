use serde::Serialize;
use std::fmt::Write as _;

use crate::profile::registry::is_grease;
use crate::profile::{Extension, FingerprintProfile};

/// Placeholder every GREASE value is normalised to, so that two hellos with
/// different random GREASE values but the same positions compare equal.
pub const GREASE_PLACEHOLDER: u16 = 0x0a0a;

const HANDSHAKE_RECORD: u8 = 0x16;
const CLIENT_HELLO: u8 = 0x01;
const PADDING: u16 = 21;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientHelloError {
    #[error("not a TLS handshake record (content type {0:#04x})")]
    NotHandshake(u8),
    #[error("handshake message is not a ClientHello (type {0:#04x})")]
    NotClientHello(u8),
    #[error("ClientHello truncated while reading {0}")]
    Truncated(&'static str),
}

/// The fields of a ClientHello that make up its fingerprint, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientHelloShape {
    pub legacy_version: u16,
    pub cipher_suites: Vec<u16>,
    pub extensions: Vec<u16>,
    pub alpn: Vec<String>,
    pub supported_groups: Vec<u16>,
    pub signature_algorithms: Vec<u16>,
    pub supported_versions: Vec<u16>,
    pub ec_point_formats: Vec<u8>,
    pub server_name: Option<String>,
}

impl ClientHelloShape {
    /// The shape a profile is configured to produce, without GREASE values.
    ///
    /// `padding` is included when the profile lists it; the TLS stack only
    /// emits it for some hello sizes, so compare through [`Self::structure`].
    pub fn expected(profile: &FingerprintProfile, server_name: Option<&str>) -> Self {
        let supported_versions = if profile.has_extension(43) {
            let mut versions: Vec<u16> = profile.tls_versions().iter().map(|v| v.code()).collect();
            versions.sort_unstable_by(|a, b| b.cmp(a));
            versions
        } else {
            Vec::new()
        };
        let ec_point_formats = if profile.has_extension(11) { vec![0] } else { Vec::new() };
        let alpn = if profile.has_extension(16) { profile.alpn().to_vec() } else { Vec::new() };
        let server_name = if profile.has_extension(0) {
            server_name.map(str::to_string)
        } else {
            None
        };

        Self {
            legacy_version: 0x0303,
            cipher_suites: profile.cipher_suites().to_vec(),
            extensions: profile.extensions().iter().map(Extension::id).collect(),
            alpn,
            supported_groups: profile.supported_groups().iter().map(|g| g.code()).collect(),
            signature_algorithms: profile.signature_algorithms().iter().map(|s| s.code()).collect(),
            supported_versions,
            ec_point_formats,
            server_name,
        }
    }

    /// Parse a TLS record carrying a ClientHello.
    ///
    /// The handshake message must fit in the first record; larger hellos are
    /// reported as truncated.
    pub fn parse(record: &[u8]) -> Result<Self, ClientHelloError> {
        let mut rec = Reader::new(record);
        let content_type = rec.u8("record header")?;
        if content_type != HANDSHAKE_RECORD {
            return Err(ClientHelloError::NotHandshake(content_type));
        }
        rec.u16("record header")?;
        let record_len = rec.u16("record header")?;
        let mut body = Reader::new(rec.take(usize::from(record_len), "record body")?);

        let msg_type = body.u8("handshake header")?;
        if msg_type != CLIENT_HELLO {
            return Err(ClientHelloError::NotClientHello(msg_type));
        }
        let hello_len = body.u24("handshake header")?;
        let mut hello = Reader::new(body.take(hello_len, "handshake body")?);

        let mut shape = Self { legacy_version: hello.u16("client version")?, ..Self::default() };
        hello.take(32, "random")?;
        let session_len = hello.u8("session id")?;
        hello.take(usize::from(session_len), "session id")?;

        let suites_len = hello.u16("cipher suites")?;
        let mut suites = Reader::new(hello.take(usize::from(suites_len), "cipher suites")?);
        while !suites.is_empty() {
            shape.cipher_suites.push(suites.u16("cipher suites")?);
        }

        let compression_len = hello.u8("compression methods")?;
        hello.take(usize::from(compression_len), "compression methods")?;

        if hello.is_empty() {
            return Ok(shape);
        }
        let extensions_len = hello.u16("extensions")?;
        let mut exts = Reader::new(hello.take(usize::from(extensions_len), "extensions")?);
        while !exts.is_empty() {
            let ext_type = exts.u16("extension header")?;
            let ext_len = exts.u16("extension header")?;
            let data = exts.take(usize::from(ext_len), "extension body")?;
            shape.extensions.push(ext_type);
            shape.parse_extension(ext_type, data)?;
        }
        Ok(shape)
    }

    fn parse_extension(&mut self, ext_type: u16, data: &[u8]) -> Result<(), ClientHelloError> {
        let mut r = Reader::new(data);
        match ext_type {
            0 => {
                let list_len = r.u16("server_name")?;
                let mut list = Reader::new(r.take(usize::from(list_len), "server_name")?);
                while !list.is_empty() {
                    let name_type = list.u8("server_name")?;
                    let name_len = list.u16("server_name")?;
                    let name = list.take(usize::from(name_len), "server_name")?;
                    if name_type == 0 && self.server_name.is_none() {
                        self.server_name = Some(String::from_utf8_lossy(name).into_owned());
                    }
                }
            }
            10 => {
                let len = r.u16("supported_groups")?;
                let mut list = Reader::new(r.take(usize::from(len), "supported_groups")?);
                while !list.is_empty() {
                    self.supported_groups.push(list.u16("supported_groups")?);
                }
            }
            11 => {
                let len = r.u8("ec_point_formats")?;
                self.ec_point_formats = r.take(usize::from(len), "ec_point_formats")?.to_vec();
            }
            13 => {
                let len = r.u16("signature_algorithms")?;
                let mut list = Reader::new(r.take(usize::from(len), "signature_algorithms")?);
                while !list.is_empty() {
                    self.signature_algorithms.push(list.u16("signature_algorithms")?);
                }
            }
            16 => {
                let len = r.u16("alpn")?;
                let mut list = Reader::new(r.take(usize::from(len), "alpn")?);
                while !list.is_empty() {
                    let proto_len = list.u8("alpn")?;
                    let proto = list.take(usize::from(proto_len), "alpn")?;
                    self.alpn.push(String::from_utf8_lossy(proto).into_owned());
                }
            }
            43 => {
                let len = r.u8("supported_versions")?;
                let mut list = Reader::new(r.take(usize::from(len), "supported_versions")?);
                while !list.is_empty() {
                    self.supported_versions.push(list.u16("supported_versions")?);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Replace every GREASE value with [`GREASE_PLACEHOLDER`], keeping positions.
    pub fn normalize_grease(&self) -> Self {
        let norm = |list: &[u16]| -> Vec<u16> {
            list.iter()
                .map(|&v| if is_grease(v) { GREASE_PLACEHOLDER } else { v })
                .collect()
        };
        Self {
            cipher_suites: norm(&self.cipher_suites),
            extensions: norm(&self.extensions),
            supported_groups: norm(&self.supported_groups),
            signature_algorithms: norm(&self.signature_algorithms),
            supported_versions: norm(&self.supported_versions),
            ..self.clone()
        }
    }

    /// Drop GREASE values and the size-dependent padding extension.
    pub fn structure(&self) -> Self {
        let strip = |list: &[u16]| -> Vec<u16> {
            list.iter().copied().filter(|v| !is_grease(*v)).collect()
        };
        let mut extensions = strip(&self.extensions);
        extensions.retain(|&e| e != PADDING);
        Self {
            cipher_suites: strip(&self.cipher_suites),
            extensions,
            supported_groups: strip(&self.supported_groups),
            signature_algorithms: strip(&self.signature_algorithms),
            supported_versions: strip(&self.supported_versions),
            ..self.clone()
        }
    }

    /// JA3 string: `version,ciphers,extensions,groups,point_formats`, GREASE removed.
    pub fn ja3_string(&self) -> String {
        fn join<T: std::fmt::Display>(values: impl Iterator<Item = T>) -> String {
            let mut out = String::new();
            for (i, v) in values.enumerate() {
                if i > 0 {
                    out.push('-');
                }
                let _ = write!(out, "{v}");
            }
            out
        }
        let no_grease = |list: &[u16]| join(list.iter().filter(|v| !is_grease(**v)));
        format!(
            "{},{},{},{},{}",
            self.legacy_version,
            no_grease(&self.cipher_suites),
            no_grease(&self.extensions),
            no_grease(&self.supported_groups),
            join(self.ec_point_formats.iter())
        )
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ClientHelloError> {
        if self.buf.len() < n {
            return Err(ClientHelloError::Truncated(what));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, ClientHelloError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, ClientHelloError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self, what: &'static str) -> Result<usize, ClientHelloError> {
        let b = self.take(3, what)?;
        Ok(usize::from(b[0]) << 16 | usize::from(b[1]) << 8 | usize::from(b[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16s(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    fn ext(ext_type: u16, data: &[u8]) -> Vec<u8> {
        let mut out = ext_type.to_be_bytes().to_vec();
        out.extend_from_slice(&(data.len() as u16).to_be_bytes());
        out.extend_from_slice(data);
        out
    }

    /// A hand-built hello: GREASE cipher first, SNI, groups, ALPN, versions, padding.
    fn sample_record() -> Vec<u8> {
        let mut exts = Vec::new();
        exts.extend(ext(0x3a3a, &[]));
        let host = b"example.com";
        let mut sni = ((host.len() + 3) as u16).to_be_bytes().to_vec();
        sni.push(0);
        sni.extend_from_slice(&(host.len() as u16).to_be_bytes());
        sni.extend_from_slice(host);
        exts.extend(ext(0, &sni));
        let groups = u16s(&[0x5a5a, 0x001d, 0x0017]);
        let mut groups_ext = (groups.len() as u16).to_be_bytes().to_vec();
        groups_ext.extend(groups);
        exts.extend(ext(10, &groups_ext));
        exts.extend(ext(11, &[1, 0]));
        let alpn = b"\x02h2\x08http/1.1";
        let mut alpn_ext = (alpn.len() as u16).to_be_bytes().to_vec();
        alpn_ext.extend_from_slice(alpn);
        exts.extend(ext(16, &alpn_ext));
        let versions = u16s(&[0x0304, 0x0303]);
        let mut versions_ext = vec![versions.len() as u8];
        versions_ext.extend(versions);
        exts.extend(ext(43, &versions_ext));
        exts.extend(ext(21, &[0; 7]));

        let mut hello = u16s(&[0x0303]);
        hello.extend_from_slice(&[7; 32]);
        hello.push(32);
        hello.extend_from_slice(&[9; 32]);
        let suites = u16s(&[0x2a2a, 0x1301, 0xc02f]);
        hello.extend_from_slice(&(suites.len() as u16).to_be_bytes());
        hello.extend(suites);
        hello.extend_from_slice(&[1, 0]);
        hello.extend_from_slice(&(exts.len() as u16).to_be_bytes());
        hello.extend(exts);

        let mut handshake = vec![CLIENT_HELLO];
        handshake.extend_from_slice(&(hello.len() as u32).to_be_bytes()[1..]);
        handshake.extend(hello);

        let mut record = vec![HANDSHAKE_RECORD, 0x03, 0x01];
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend(handshake);
        record
    }

    #[test]
    fn parses_hand_built_hello() -> Result<(), ClientHelloError> {
        let shape = ClientHelloShape::parse(&sample_record())?;
        assert_eq!(shape.legacy_version, 0x0303);
        assert_eq!(shape.cipher_suites, vec![0x2a2a, 0x1301, 0xc02f]);
        assert_eq!(shape.extensions, vec![0x3a3a, 0, 10, 11, 16, 43, 21]);
        assert_eq!(shape.server_name.as_deref(), Some("example.com"));
        assert_eq!(shape.alpn, vec!["h2".to_string(), "http/1.1".to_string()]);
        assert_eq!(shape.supported_groups, vec![0x5a5a, 0x001d, 0x0017]);
        assert_eq!(shape.supported_versions, vec![0x0304, 0x0303]);
        assert_eq!(shape.ec_point_formats, vec![0]);
        Ok(())
    }

    #[test]
    fn grease_normalisation_keeps_positions() -> Result<(), ClientHelloError> {
        let shape = ClientHelloShape::parse(&sample_record())?.normalize_grease();
        assert_eq!(shape.cipher_suites[0], GREASE_PLACEHOLDER);
        assert_eq!(shape.extensions[0], GREASE_PLACEHOLDER);

        let structure = ClientHelloShape::parse(&sample_record())?.structure();
        assert_eq!(structure.cipher_suites, vec![0x1301, 0xc02f]);
        assert_eq!(structure.extensions, vec![0, 10, 11, 16, 43]);
        Ok(())
    }

    #[test]
    fn ja3_skips_grease() -> Result<(), ClientHelloError> {
        let shape = ClientHelloShape::parse(&sample_record())?;
        assert_eq!(shape.ja3_string(), "771,4865-49199,0-10-11-16-43-21,29-23,0");
        Ok(())
    }

    #[test]
    fn rejects_non_handshake_record() {
        let mut record = sample_record();
        record[0] = 0x17;
        assert_eq!(ClientHelloShape::parse(&record), Err(ClientHelloError::NotHandshake(0x17)));
    }

    #[test]
    fn rejects_truncated_record() {
        let record = sample_record();
        let cut = &record[..record.len() - 10];
        assert!(matches!(ClientHelloShape::parse(cut), Err(ClientHelloError::Truncated(_))));
    }

    #[test]
    fn rejects_other_handshake_messages() {
        let mut record = sample_record();
        record[5] = 0x02;
        assert_eq!(ClientHelloShape::parse(&record), Err(ClientHelloError::NotClientHello(0x02)));
    }
}
