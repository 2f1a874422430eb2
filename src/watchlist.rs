//! Brand and whitelist sets.
//!
//! Both are loaded once at startup from YAML documents and stay immutable for
//! the lifetime of the process.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchlistError {
    #[error("brand list is empty")]
    EmptyBrandSet,
}

/// An ordered, non-empty list of lower-cased brand names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandSet {
    brands: Vec<String>,
}

impl BrandSet {
    /// Builds a brand set, lower-casing and trimming every entry and dropping
    /// blank ones.
    pub fn new<I, S>(brands: I) -> Result<Self, WatchlistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let brands: Vec<String> = brands
            .into_iter()
            .map(|b| b.as_ref().trim().to_lowercase())
            .filter(|b| !b.is_empty())
            .collect();

        if brands.is_empty() {
            return Err(WatchlistError::EmptyBrandSet);
        }
        Ok(Self { brands })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.brands.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.brands.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }
}

/// Domains and domain suffixes exempt from scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: Vec<String>,
}

impl Whitelist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<String> = entries
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        entries.sort();
        entries.dedup();
        Self { entries }
    }

    /// A domain is whitelisted if it equals an entry or ends with one.
    ///
    /// The suffix test is a plain string suffix, so `google.com` also covers
    /// `notgoogle.com`.
    pub fn is_whitelisted(&self, domain: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| domain == entry || domain.ends_with(entry.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct BrandsFile {
    #[serde(default)]
    brands: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WhitelistFile {
    #[serde(default)]
    whitelist: Vec<String>,
}

/// Loads the brand set from a YAML file of the form `brands: [..]`.
pub fn load_brands(path: &Path) -> Result<BrandSet> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read brands file: {}", path.display()))?;
    let file: BrandsFile = serde_yml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML from brands file: {}", path.display()))?;
    let brands = BrandSet::new(file.brands)
        .with_context(|| format!("No usable brands in {}", path.display()))?;
    Ok(brands)
}

/// Loads the whitelist from a YAML file of the form `whitelist: [..]`.
pub fn load_whitelist(path: &Path) -> Result<Whitelist> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read whitelist file: {}", path.display()))?;
    let file: WhitelistFile = serde_yml::from_str(&content).with_context(|| {
        format!("Failed to parse YAML from whitelist file: {}", path.display())
    })?;
    Ok(Whitelist::new(file.whitelist))
}
