//! The capability registry.
//!
//! Capabilities are declared one per line as `name(version)=value`,
//! either registered programmatically or loaded from every regular file
//! in a configuration directory. The registry renders them as
//! `X-Client-Capability` request headers for the caller to merge into
//! an outgoing request.

use std::fs;
use std::path::Path;

use http::header::{HeaderName, HeaderValue};
use tracing::{debug, trace};

use crate::error::CapsError;

/// Header under which each capability is advertised.
pub const CAPABILITY_HEADER: HeaderName = HeaderName::from_static("x-client-capability");

/// One advertised capability: a version and a value, both opaque
/// strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub version: String,
    pub value: String,
}

/// An ordered name-to-capability registry with an explicit lifecycle.
///
/// Iteration and header rendering preserve insertion order;
/// re-registering a name overwrites its capability in place.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: Vec<(String, Capability)>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability, replacing any existing one of the same
    /// name.
    pub fn register(&mut self, name: &str, capability: Capability) {
        trace!(name, ?capability, "capability registered");
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = capability,
            None => self.entries.push((name.to_string(), capability)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Capability)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Loads capability declarations from every regular file in `dir`,
    /// returning how many were registered. Subdirectories and files
    /// that cannot be read are skipped; a malformed declaration fails
    /// the whole load.
    ///
    /// Lines are trimmed; empty lines and lines starting with `#` are
    /// ignored.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, CapsError> {
        let mut loaded = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                debug!(path = %path.display(), "skipping unreadable capability file");
                continue;
            };

            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let (name, capability) = parse_capability(line)?;
                self.register(name, capability);
                loaded += 1;
            }
            debug!(path = %path.display(), "capability file loaded");
        }
        Ok(loaded)
    }

    /// Renders every capability as an `X-Client-Capability` header
    /// pair, in registration order.
    pub fn header_entries(&self) -> Result<Vec<(HeaderName, HeaderValue)>, CapsError> {
        self.entries
            .iter()
            .map(|(name, cap)| {
                let value = HeaderValue::from_str(&format!(
                    "{name}({version})={value}",
                    version = cap.version,
                    value = cap.value
                ))?;
                Ok((CAPABILITY_HEADER, value))
            })
            .collect()
    }
}

/// Parses one `name(version)=value` declaration.
fn parse_capability(line: &str) -> Result<(&str, Capability), CapsError> {
    let (left, value) = line.split_once('=').ok_or_else(|| CapsError::invalid_capability(line))?;
    let (name, version) = left
        .trim()
        .strip_suffix(')')
        .and_then(|l| l.split_once('('))
        .ok_or_else(|| CapsError::invalid_capability(line))?;
    if name.is_empty() {
        return Err(CapsError::invalid_capability(line));
    }
    Ok((name, Capability { version: version.to_string(), value: value.trim().to_string() }))
}
