//! Benchmark corpora for the `jd` diff and patch engines.
//!
//! Each [`Corpus`] embeds a before/after document pair large enough to
//! exercise the list LCS, object recursion, and rendering paths.
//!
//! # Examples
//!
//! ```
//! use jd_core::DiffOptions;
//!
//! let corpus = jd_benches::available_corpora()[0];
//! let dataset = corpus.load().unwrap();
//! let diff = dataset.diff(&DiffOptions::default());
//! assert!(!diff.is_empty());
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

use anyhow::{Context, Result};
use jd_core::{Diff, DiffOptions, Node};

const CONFIG_BEFORE: &str = include_str!("../fixtures/config_before.json");
const CONFIG_AFTER: &str = include_str!("../fixtures/config_after.json");
const INVENTORY_BEFORE: &str = include_str!("../fixtures/inventory_before.json");
const INVENTORY_AFTER: &str = include_str!("../fixtures/inventory_after.json");

/// A named before/after fixture pair.
#[derive(Clone, Copy, Debug)]
pub struct Corpus {
    name: &'static str,
    before: &'static str,
    after: &'static str,
}

impl Corpus {
    /// Returns the corpus name used as the benchmark parameter.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the combined size of both fixtures in bytes.
    #[must_use]
    pub fn fixture_bytes(&self) -> usize {
        self.before.len() + self.after.len()
    }

    /// Canonicalizes both fixtures into a [`Dataset`].
    pub fn load(&self) -> Result<Dataset> {
        let before = Node::from_json_str(self.before)
            .with_context(|| format!("failed to canonicalize {} before fixture", self.name))?;
        let after = Node::from_json_str(self.after)
            .with_context(|| format!("failed to canonicalize {} after fixture", self.name))?;
        Ok(Dataset { before, after })
    }
}

/// A canonicalized before/after document pair.
#[derive(Clone, Debug)]
pub struct Dataset {
    before: Node,
    after: Node,
}

impl Dataset {
    /// Returns the canonicalized before document.
    #[must_use]
    pub fn before(&self) -> &Node {
        &self.before
    }

    /// Returns the canonicalized after document.
    #[must_use]
    pub fn after(&self) -> &Node {
        &self.after
    }

    /// Diffs the before document against the after document.
    #[must_use]
    pub fn diff(&self, options: &DiffOptions) -> Diff {
        self.before.diff(&self.after, options)
    }
}

/// Returns the corpora available to the benchmark harness.
#[must_use]
pub fn available_corpora() -> &'static [Corpus] {
    &[
        Corpus { name: "config", before: CONFIG_BEFORE, after: CONFIG_AFTER },
        Corpus { name: "inventory", before: INVENTORY_BEFORE, after: INVENTORY_AFTER },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_corpus_loads_and_diffs() {
        for corpus in available_corpora() {
            let dataset = corpus.load().unwrap();
            let diff = dataset.diff(&DiffOptions::default());
            assert!(!diff.is_empty(), "{} fixtures should differ", corpus.name());
            let patched = dataset.before().apply_patch(&diff).unwrap();
            assert_eq!(&patched, dataset.after());
        }
    }
}
