//! # Header Bag
//!
//! Ordered, case-insensitive key/value headers shared by external messages and
//! signals, plus typed accessors for the header contract of the gateway.

use crate::acknowledgement::AckLabel;
use crate::errors::HeaderError;
use crate::signal::Channel;
use std::fmt;
use std::time::Duration;

/// Header names understood by the pipeline.
pub mod keys {
    pub const CORRELATION_ID: &str = "correlation-id";
    pub const REQUESTED_ACKS: &str = "requested-acks";
    pub const RESPONSE_REQUIRED: &str = "response-required";
    pub const TIMEOUT: &str = "timeout";
    pub const REPLY_TARGET: &str = "reply-target";
    pub const CHANNEL: &str = "channel";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const READ_SUBJECTS: &str = "read-subjects";
    pub const DIVERT_RESPONSE_TO_CONNECTION: &str = "divert-response-to-connection";
    pub const DIVERT_EXPECTED_RESPONSE_TYPES: &str = "divert-expected-response-types";
    pub const DIVERTED_RESPONSE_FROM_CONNECTION: &str = "diverted-response-from-connection";
    pub const INBOUND_PAYLOAD_MAPPER: &str = "inbound-payload-mapper";
}

/// Ordered header bag with case-insensitive keys.
///
/// Keys keep the spelling of their first insertion. Replacing a value keeps
/// the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a header value by case-insensitive key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace a header.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(pos).1)
    }

    /// Copy-on-write insert: returns a new bag with the header set.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.insert(key, value);
        copy
    }

    /// Copy-on-write removal.
    #[must_use]
    pub fn without(&self, key: &str) -> Self {
        let mut copy = self.clone();
        copy.remove(key);
        copy
    }

    /// Merge `other` into a copy of this bag; `other` wins on conflicts.
    #[must_use]
    pub fn merged(&self, other: &Headers) -> Self {
        let mut copy = self.clone();
        for (k, v) in other.iter() {
            copy.insert(k, v);
        }
        copy
    }

    /// Iterate over headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // =========================================================================
    // TYPED ACCESSORS
    // =========================================================================

    pub fn correlation_id(&self) -> Option<&str> {
        self.get(keys::CORRELATION_ID)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(keys::CONTENT_TYPE)
    }

    /// Requested acknowledgement labels (comma separated).
    pub fn requested_acks(&self) -> Result<Vec<AckLabel>, HeaderError> {
        let Some(raw) = self.get(keys::REQUESTED_ACKS) else {
            return Ok(Vec::new());
        };
        let mut labels = Vec::new();
        for part in split_list(raw) {
            let label = AckLabel::parse(part).map_err(|e| {
                HeaderError::invalid(keys::REQUESTED_ACKS, raw, e.to_string())
            })?;
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        Ok(labels)
    }

    /// Write requested acknowledgement labels, removing the header when empty.
    #[must_use]
    pub fn with_requested_acks(&self, labels: &[AckLabel]) -> Self {
        if labels.is_empty() {
            return self.without(keys::REQUESTED_ACKS);
        }
        let joined = labels
            .iter()
            .map(AckLabel::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.with(keys::REQUESTED_ACKS, joined)
    }

    pub fn response_required(&self) -> Result<Option<bool>, HeaderError> {
        self.get(keys::RESPONSE_REQUIRED)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(HeaderError::invalid(
                    keys::RESPONSE_REQUIRED,
                    raw,
                    "expected true or false",
                )),
            })
            .transpose()
    }

    /// Timeout header: `<n>ms`, `<n>s`, `<n>m` or a bare number of seconds.
    pub fn timeout(&self) -> Result<Option<Duration>, HeaderError> {
        self.get(keys::TIMEOUT)
            .map(|raw| {
                parse_duration(raw)
                    .ok_or_else(|| HeaderError::invalid(keys::TIMEOUT, raw, "not a duration"))
            })
            .transpose()
    }

    pub fn reply_target(&self) -> Result<Option<usize>, HeaderError> {
        self.get(keys::REPLY_TARGET)
            .map(|raw| {
                raw.trim().parse::<usize>().map_err(|_| {
                    HeaderError::invalid(keys::REPLY_TARGET, raw, "expected an index")
                })
            })
            .transpose()
    }

    pub fn channel(&self) -> Result<Option<Channel>, HeaderError> {
        self.get(keys::CHANNEL)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "twin" => Ok(Channel::Twin),
                "live" => Ok(Channel::Live),
                _ => Err(HeaderError::invalid(keys::CHANNEL, raw, "expected twin or live")),
            })
            .transpose()
    }

    /// Subjects allowed to read the signal; `None` means unrestricted.
    pub fn read_subjects(&self) -> Option<Vec<&str>> {
        self.get(keys::READ_SUBJECTS)
            .map(|raw| split_list(raw).collect())
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Split a comma separated header list, skipping empty items.
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let headers: Headers = [("Content-Type", "application/json")].into_iter().collect();
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.content_type(), Some("application/json"));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut headers: Headers = [("a", "1"), ("b", "2")].into_iter().collect();
        headers.insert("A", "3");
        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_with_is_copy_on_write() {
        let original: Headers = [("a", "1")].into_iter().collect();
        let derived = original.with("b", "2");
        assert_eq!(original.len(), 1);
        assert_eq!(derived.len(), 2);
    }

    #[test]
    fn test_requested_acks_parsing() {
        let headers: Headers = [(keys::REQUESTED_ACKS, "twin-persisted, conn:custom,twin-persisted")]
            .into_iter()
            .collect();
        let labels = headers.requested_acks().unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[1].as_str(), "conn:custom");
    }

    #[test]
    fn test_requested_acks_invalid_label() {
        let headers: Headers = [(keys::REQUESTED_ACKS, "ok-label,a")].into_iter().collect();
        assert!(headers.requested_acks().is_err());
    }

    #[test]
    fn test_timeout_formats() {
        let parse = |v: &str| {
            let headers: Headers = [(keys::TIMEOUT, v)].into_iter().collect();
            headers.timeout()
        };
        assert_eq!(parse("250ms").unwrap(), Some(Duration::from_millis(250)));
        assert_eq!(parse("10s").unwrap(), Some(Duration::from_secs(10)));
        assert_eq!(parse("2m").unwrap(), Some(Duration::from_secs(120)));
        assert_eq!(parse("7").unwrap(), Some(Duration::from_secs(7)));
        assert!(parse("soon").is_err());
    }

    #[test]
    fn test_response_required_and_channel() {
        let headers: Headers = [(keys::RESPONSE_REQUIRED, "FALSE"), (keys::CHANNEL, "live")]
            .into_iter()
            .collect();
        assert_eq!(headers.response_required().unwrap(), Some(false));
        assert_eq!(headers.channel().unwrap(), Some(Channel::Live));
        assert!(headers.with(keys::CHANNEL, "shadow").channel().is_err());
    }

    proptest! {
        #[test]
        fn prop_insert_then_get_any_case(key in "[a-z][a-z-]{0,15}", value in ".{0,20}") {
            let mut headers = Headers::new();
            headers.insert(key.clone(), value.clone());
            prop_assert_eq!(headers.get(&key.to_ascii_uppercase()), Some(value.as_str()));
            prop_assert_eq!(headers.len(), 1);
        }
    }
}
