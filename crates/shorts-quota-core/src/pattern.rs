//! Site match patterns of the form `scheme://host/path`.
//!
//! - scheme `*` matches `http` and `https`
//! - host `*.example.com` matches `example.com` and any subdomain
//! - path is a glob where `*` matches any run of characters

use std::str::FromStr;

use url::Url;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    scheme: String,
    host: HostPattern,
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Any,
    Exact(String),
    WithSubdomains(String),
}

impl FromStr for UrlPattern {
    type Err = ParseError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidPattern(pattern.to_string());
        let (scheme, rest) = pattern.split_once("://").ok_or_else(invalid)?;
        let (host, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => return Err(invalid()),
        };
        if scheme.is_empty() || host.is_empty() {
            return Err(invalid());
        }

        let host = if host == "*" {
            HostPattern::Any
        } else if let Some(domain) = host.strip_prefix("*.") {
            HostPattern::WithSubdomains(domain.to_ascii_lowercase())
        } else if host.contains('*') {
            return Err(invalid());
        } else {
            HostPattern::Exact(host.to_ascii_lowercase())
        };

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host,
            path: path.to_string(),
        })
    }
}

impl UrlPattern {
    pub fn matches(&self, raw: &str) -> bool {
        let Ok(url) = Url::parse(raw) else {
            return false;
        };

        let scheme_ok = match self.scheme.as_str() {
            "*" => matches!(url.scheme(), "http" | "https"),
            s => url.scheme() == s,
        };
        if !scheme_ok {
            return false;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        let host_ok = match &self.host {
            HostPattern::Any => true,
            HostPattern::Exact(h) => host == h.as_str(),
            HostPattern::WithSubdomains(domain) => {
                host == domain.as_str() || host.ends_with(&format!(".{domain}"))
            }
        };
        if !host_ok {
            return false;
        }

        let mut target = url.path().to_string();
        if let Some(q) = url.query() {
            target.push('?');
            target.push_str(q);
        }
        glob_match(&self.path, &target)
    }
}

/// `*`-only glob, iterative with single-star backtracking.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
