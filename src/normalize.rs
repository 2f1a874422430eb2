//! Lexical normalization of candidate domains.
//!
//! Turns a raw SAN entry into the pieces the scorer works on: the
//! wildcard-stripped domain, its public-suffix split, the confusable-folded
//! "body" (everything left of the public suffix) and the body's word tokens.

use crate::confusables;
use regex::Regex;
use std::sync::LazyLock;

static WORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("word separator regex is valid"));

const WILDCARD_PREFIX: &str = "*.";

/// Result of splitting a domain along the public suffix list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrableSplit {
    /// The domain ends in a known public suffix.
    Parsed {
        /// Labels left of the registrable domain, dot-joined. May be empty.
        subdomain: String,
        /// The single label directly left of the suffix (`example` in `example.co.uk`).
        registrable: String,
        /// The public suffix (`co.uk`).
        suffix: String,
    },
    /// No known public suffix; the whole domain is used as the body.
    Fallback,
}

/// A candidate domain ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDomain {
    /// Lower-cased input, before wildcard stripping.
    pub original: String,
    /// Lower-cased input with any leading `*.` removed.
    pub domain: String,
    pub split: RegistrableSplit,
    /// Subdomain and registrable label with confusables folded to ASCII.
    pub body: String,
    /// Word-like segments of `body`, split on runs of non-word characters.
    pub tokens: Vec<String>,
}

impl NormalizedDomain {
    /// Returns `true` if the public suffix split succeeded.
    pub fn is_fully_parsed(&self) -> bool {
        matches!(self.split, RegistrableSplit::Parsed { .. })
    }

    /// The public suffix, if the split succeeded.
    pub fn suffix(&self) -> Option<&str> {
        match &self.split {
            RegistrableSplit::Parsed { suffix, .. } => Some(suffix),
            RegistrableSplit::Fallback => None,
        }
    }
}

/// Normalizes a raw domain. Never fails: an unparseable domain degrades to
/// `RegistrableSplit::Fallback` with the full domain as its body.
pub fn normalize(raw: &str) -> NormalizedDomain {
    let original = raw.trim().to_lowercase();
    let domain = strip_wildcard(&original).to_string();
    let split = split_registrable(&domain);

    let unfolded_body = match &split {
        RegistrableSplit::Parsed {
            subdomain,
            registrable,
            ..
        } => {
            if subdomain.is_empty() {
                registrable.clone()
            } else {
                format!("{subdomain}.{registrable}")
            }
        }
        RegistrableSplit::Fallback => domain.clone(),
    };

    let body = confusables::fold(&unfolded_body);
    let tokens = tokenize(&body);

    NormalizedDomain {
        original,
        domain,
        split,
        body,
        tokens,
    }
}

/// Removes a single leading `*.` wildcard marker.
pub fn strip_wildcard(domain: &str) -> &str {
    domain.strip_prefix(WILDCARD_PREFIX).unwrap_or(domain)
}

/// Splits a lower-cased domain into subdomain, registrable label and public
/// suffix.
pub fn split_registrable(domain: &str) -> RegistrableSplit {
    let Some(parsed) = psl::domain(domain.as_bytes()) else {
        return RegistrableSplit::Fallback;
    };
    let suffix = parsed.suffix();
    if !suffix.is_known() {
        return RegistrableSplit::Fallback;
    }

    let (Ok(registrable_domain), Ok(suffix)) = (
        std::str::from_utf8(parsed.as_bytes()),
        std::str::from_utf8(suffix.as_bytes()),
    ) else {
        return RegistrableSplit::Fallback;
    };

    let Some(registrable) = registrable_domain
        .strip_suffix(suffix)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return RegistrableSplit::Fallback;
    };

    let subdomain = match domain.strip_suffix(registrable_domain) {
        Some("") => "",
        Some(rest) => match rest.strip_suffix('.') {
            Some(sub) => sub,
            None => return RegistrableSplit::Fallback,
        },
        None => return RegistrableSplit::Fallback,
    };

    RegistrableSplit::Parsed {
        subdomain: subdomain.to_string(),
        registrable: registrable.to_string(),
        suffix: suffix.to_string(),
    }
}

/// Splits `body` into word-like tokens, dropping empty segments.
pub fn tokenize(body: &str) -> Vec<String> {
    WORD_SEPARATOR
        .split(body)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
