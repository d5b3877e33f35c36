//! Header block of a request or response
//!
//! Fields stay in arrival order so a verbose trace prints them as they went
//! over the wire. Names compare ASCII case-insensitively.

use super::{Error, Result, MAX_HEADERS};

#[derive(Debug, Clone)]
struct Field {
    name: String,
    value: String,
}

impl Field {
    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; an existing one with the same name is kept
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if self.fields.len() == MAX_HEADERS {
            log::warn!("more than {} header fields, ignoring the rest", MAX_HEADERS);
            return;
        }
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Drop every field called `name`, then append one
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.insert(name, value);
    }

    fn values(&self, name: &'static str) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .iter()
            .filter(move |f| f.is(name))
            .map(|f| f.value.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.is(name)).map(|f| f.value.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is(name))
            .map(|f| f.value.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is(name))
    }

    /// Returns the number of fields removed
    pub fn remove(&mut self, name: &str) -> usize {
        let count = self.fields.len();
        self.fields.retain(|f| !f.is(name));
        count - self.fields.len()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.value.as_str()))
    }

    /// Declared body length. Repeated fields must agree.
    pub fn content_length(&self) -> Result<Option<usize>> {
        self.values("Content-Length").try_fold(None, |seen, raw| {
            let length: usize = raw
                .trim()
                .parse()
                .map_err(|_| Error::Parse(format!("Content-Length is not a number: {}", raw)))?;
            match seen {
                Some(previous) if previous != length => Err(Error::Protocol(format!(
                    "Content-Length given as both {} and {}",
                    previous, length
                ))),
                _ => Ok(Some(length)),
            }
        })
    }

    /// True when `chunked` is the final transfer coding
    pub fn is_chunked(&self) -> bool {
        match self.values("Transfer-Encoding").last() {
            Some(codings) => codings
                .rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked")),
            None => false,
        }
    }

    /// Split a `Name: value` line; the name may not be empty or padded
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::InvalidHeader(format!("missing ':' in {:?}", line)));
        };
        if name.is_empty() || name.trim() != name {
            return Err(Error::InvalidHeader(format!("bad field name in {:?}", line)));
        }
        Ok((name.to_string(), value.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");

        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert!(headers.contains("Content-type"));
        assert_eq!(headers.get("Server"), None);
    }

    #[test]
    fn test_set_collapses_duplicates() {
        let mut headers = Headers::new();
        headers.insert("Accept", "text/html");
        headers.insert("accept", "text/plain");
        headers.set("Accept", "*/*");

        assert_eq!(headers.get_all("Accept"), vec!["*/*"]);
        assert_eq!(headers.remove("ACCEPT"), 1);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_arrival_order() {
        let mut headers = Headers::new();
        headers.insert("Host", "nginx:8443");
        headers.insert("User-Agent", "tls-harness");
        headers.insert("Accept", "*/*");

        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Host", "User-Agent", "Accept"]);
    }

    #[test]
    fn test_content_length() {
        let mut headers = Headers::new();
        assert_eq!(headers.content_length().unwrap(), None);

        headers.insert("Content-Length", "42");
        headers.insert("content-length", " 42");
        assert_eq!(headers.content_length().unwrap(), Some(42));

        headers.insert("Content-Length", "7");
        assert!(matches!(headers.content_length(), Err(Error::Protocol(_))));

        let mut bogus = Headers::new();
        bogus.insert("Content-Length", "-1");
        assert!(matches!(bogus.content_length(), Err(Error::Parse(_))));
    }

    #[test]
    fn test_chunked_only_when_last() {
        let mut headers = Headers::new();
        assert!(!headers.is_chunked());

        headers.insert("Transfer-Encoding", "gzip, Chunked");
        assert!(headers.is_chunked());

        headers.set("Transfer-Encoding", "chunked, gzip");
        assert!(!headers.is_chunked());
    }

    #[test]
    fn test_parse_header_line() {
        let (name, value) = Headers::parse_header_line("Server: nginx/1.25.3").unwrap();
        assert_eq!(name, "Server");
        assert_eq!(value, "nginx/1.25.3");

        let (_, value) = Headers::parse_header_line("X-Empty:").unwrap();
        assert_eq!(value, "");

        // Only the first colon splits.
        let (_, value) = Headers::parse_header_line("Location: https://nginx:8443/").unwrap();
        assert_eq!(value, "https://nginx:8443/");

        assert!(Headers::parse_header_line("no colon here").is_err());
        assert!(Headers::parse_header_line(": value").is_err());
        assert!(Headers::parse_header_line("Bad Name : value").is_err());
    }

    #[test]
    fn test_field_limit() {
        let mut headers = Headers::new();
        for i in 0..MAX_HEADERS + 5 {
            headers.insert(format!("X-{}", i), "v");
        }
        assert_eq!(headers.len(), MAX_HEADERS);
    }
}
