use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use std::borrow::Cow;
use std::time::Duration;

/// The upstream answer to a [`RelayRequest`](super::RelayRequest).
///
/// Headers keep the order they arrived in. The body has been fully read.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub(super) status: StatusCode,
    pub(super) version: Version,
    pub(super) headers: HeaderMap,
    pub(super) body: Bytes,
    pub(super) elapsed: Duration,
    pub(super) profile: String,
    pub(super) attempts: u32,
}

impl RelayResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Wall time from dispatch to the last body byte, retries included.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Id of the profile whose fingerprint carried the request.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// 1, or 2 when the first attempt failed in transport and was retried.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}
