//! Profile folder name matching.
//!
//! Profile folders are named `<random>.<profile name>`, so a pattern is
//! matched as the shell glob `*.<pattern>` against folder names.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use regex::{Regex, escape as regex_escape};

#[derive(Debug, Clone)]
pub struct ProfilePattern {
    pattern: String,
    regex: Regex,
}

impl ProfilePattern {
    /// Compiles a profile pattern. `*` matches any run of characters and `?`
    /// matches exactly one; everything else is literal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cache2_profile::ProfilePattern;
    ///
    /// let pattern = ProfilePattern::new("default*").unwrap();
    /// assert!(pattern.matches("x2k4rz1a.default-release"));
    /// assert!(!pattern.matches("Crash Reports"));
    /// ```
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() || pattern.contains(['/', '\\', '\0']) {
            exn::bail!(ErrorKind::InvalidPattern(pattern.to_string()));
        }
        let mut source = String::from(r"^.*\.");
        for c in pattern.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                c => source.push_str(&regex_escape(c.encode_utf8(&mut [0; 4]))),
            }
        }
        source.push('$');
        let regex = Regex::new(&source).or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?;
        Ok(Self { pattern: pattern.to_string(), regex })
    }

    /// Hidden (dot-prefixed) names never match, as with shell globs.
    pub fn matches(&self, name: &str) -> bool {
        !name.starts_with('.') && self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}
