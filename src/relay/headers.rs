//! Extra headers for the upgrade request, collected from repeated `-H` flags

use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue};

use super::error::RelayError;

/// Header name to values, in the order they were given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `Name: value` strings. The split happens at the first `:`, so
    /// values may contain further colons.
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Self, RelayError> {
        let mut set = Self::new();
        for header in raw {
            let header = header.as_ref();
            let (name, value) = header.split_once(':').ok_or_else(|| RelayError::InvalidHeader {
                header: header.to_string(),
                reason: "expected \"Name: value\"".to_string(),
            })?;

            let name = name.trim();
            if name.is_empty() {
                return Err(RelayError::InvalidHeader {
                    header: header.to_string(),
                    reason: "empty header name".to_string(),
                });
            }

            set.add(name, value.trim());
        }
        Ok(set)
    }

    /// Append a value; names compare case-insensitively
    pub fn add(&mut self, name: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, values)) => values.push(value.to_string()),
            None => self
                .entries
                .push((name.to_string(), vec![value.to_string()])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Append every value onto an upgrade request's header map
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), RelayError> {
        for (name, values) in self.iter() {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| RelayError::InvalidHeader {
                    header: name.to_string(),
                    reason: e.to_string(),
                })?;

            for value in values {
                let header_value =
                    HeaderValue::from_str(value).map_err(|e| RelayError::InvalidHeader {
                        header: format!("{}: {}", name, value),
                        reason: e.to_string(),
                    })?;
                headers.append(header_name.clone(), header_value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_keeps_order() {
        let set = HeaderSet::parse_all(&[
            "Sample-Header-1: foo",
            "  Authorization :Bearer abc ",
            "Sample-Header-2: bar",
        ])
        .unwrap();

        let names: Vec<&str> = set.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["Sample-Header-1", "Authorization", "Sample-Header-2"]
        );
        assert_eq!(set.get("authorization").unwrap(), ["Bearer abc"]);
    }

    #[test]
    fn test_repeated_names_collect_values() {
        let set = HeaderSet::parse_all(&["X-Tag: a", "x-tag: b", "X-TAG: c"]).unwrap();
        assert_eq!(set.iter().count(), 1);
        assert_eq!(set.get("X-Tag").unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_value_may_contain_colons() {
        let set = HeaderSet::parse_all(&["X-Forwarded-Host: example.com:8443"]).unwrap();
        assert_eq!(set.get("X-Forwarded-Host").unwrap(), ["example.com:8443"]);
    }

    #[test]
    fn test_missing_colon_is_rejected() {
        let err = HeaderSet::parse_all(&["NoColonHere"]).unwrap_err();
        assert!(matches!(err, RelayError::InvalidHeader { .. }));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = HeaderSet::parse_all(&[": value"]).unwrap_err();
        assert!(matches!(err, RelayError::InvalidHeader { .. }));
    }

    #[test]
    fn test_apply_appends_all_values() {
        let set = HeaderSet::parse_all(&["X-Tag: a", "X-Tag: b", "X-Other: c"]).unwrap();
        let mut headers = HeaderMap::new();
        set.apply(&mut headers).unwrap();

        let tags: Vec<&str> = headers
            .get_all("x-tag")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert_eq!(headers.get("x-other").unwrap(), "c");
    }

    #[test]
    fn test_apply_rejects_invalid_name() {
        let set = HeaderSet::parse_all(&["Bad Name: v"]).unwrap();
        let mut headers = HeaderMap::new();
        assert!(matches!(
            set.apply(&mut headers),
            Err(RelayError::InvalidHeader { .. })
        ));
    }
}
