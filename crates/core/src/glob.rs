//! Wildcard matching over object listings
//!
//! A pattern such as `root/a*/b.csv` is split into the listable literal root
//! (`root/`) and a suffix (`a*/b.csv`) matched against keys relative to it.
//! `*` matches any run of characters except `/`.

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};
use crate::path::{ResourcePath, WILDCARD};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled glob over the key space of one container
#[derive(Debug, Clone)]
pub struct GlobPattern {
    literal_root: String,
    suffix: String,
    matcher: Pattern,
}

impl GlobPattern {
    /// Compile the key of `pattern`
    pub fn compile(pattern: &ResourcePath) -> Result<Self> {
        let key = pattern.key_path.as_str();
        let Some(first) = key.find(WILDCARD) else {
            return Err(Error::NoWildcard(pattern.to_url()));
        };
        let root_end = match key[..first].rfind('/') {
            Some(pos) if pos > 0 => pos + 1,
            _ => return Err(Error::RootWildcard(pattern.to_url())),
        };

        let suffix = collapse_wildcards(&key[root_end..]);
        let source = suffix
            .split(WILDCARD)
            .map(Pattern::escape)
            .collect::<Vec<_>>()
            .join("*");
        let matcher = Pattern::new(&source)
            .map_err(|e| Error::MalformedPath(format!("{}: {e}", pattern.to_url())))?;

        Ok(Self {
            literal_root: key[..root_end].to_string(),
            suffix,
            matcher,
        })
    }

    /// Wildcard-free prefix ending with `/`
    pub fn literal_root(&self) -> &str {
        &self.literal_root
    }

    /// Pattern part below the literal root
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Match a key relative to the literal root
    pub fn matches(&self, relative_key: &str) -> bool {
        self.matcher.matches_with(relative_key, MATCH_OPTIONS)
    }

    /// Keep matching keys (relative to the literal root) and re-prefix them
    ///
    /// Listing order is preserved.
    pub fn filter<S: AsRef<str>>(&self, listing: &[S]) -> Vec<String> {
        listing
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| self.matches(key))
            .map(|key| format!("{}{key}", self.literal_root))
            .collect()
    }
}

fn collapse_wildcards(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_wildcard = false;
    for c in s.chars() {
        let is_wildcard = c == WILDCARD;
        if !(is_wildcard && previous_wildcard) {
            out.push(c);
        }
        previous_wildcard = is_wildcard;
    }
    out
}
