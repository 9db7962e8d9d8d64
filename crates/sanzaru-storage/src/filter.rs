//! Listing filters shared by every backend, so callers see identical
//! `list_files` results wherever the files live.
//!
//! Patterns use shell glob syntax (`*`, `?`, `[seq]`, `[!seq]`) matched
//! case-sensitively against the basename.

use crate::traits::{StorageError, StorageResult};
use regex::Regex;
use sanzaru_core::file_extension;
use std::collections::HashSet;

/// Translate a shell glob into an anchored regular expression.
fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    // Unterminated class matches a literal bracket.
                    out.push_str("\\[");
                    continue;
                }

                let mut class: &[char] = &chars[i..j];
                out.push('[');
                if class.first() == Some(&'!') {
                    out.push('^');
                    class = &class[1..];
                }
                for &member in class {
                    if member != '-' && member.is_ascii_punctuation() {
                        out.push('\\');
                    }
                    out.push(member);
                }
                out.push(']');
                i = j + 1;
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}

/// Basename filter: glob pattern ANDed with an optional extension set.
#[derive(Debug, Clone)]
pub struct FileFilter {
    pattern: Option<Regex>,
    extensions: Option<HashSet<String>>,
}

impl FileFilter {
    /// Build a filter. `"*"` matches everything; an empty extension set means
    /// no extension filtering. Extensions are compared lowercased with a
    /// leading dot, so `"PNG"` and `".png"` are equivalent.
    pub fn new(pattern: &str, extensions: Option<&HashSet<String>>) -> StorageResult<Self> {
        let pattern = if pattern.is_empty() || pattern == "*" {
            None
        } else {
            let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
                StorageError::InvalidArgument(format!("Invalid glob pattern {:?}: {}", pattern, e))
            })?;
            Some(regex)
        };

        let extensions = extensions.filter(|set| !set.is_empty()).map(|set| {
            set.iter()
                .map(|ext| {
                    let ext = ext.trim().to_lowercase();
                    if ext.starts_with('.') {
                        ext
                    } else {
                        format!(".{}", ext)
                    }
                })
                .collect()
        });

        Ok(Self {
            pattern,
            extensions,
        })
    }

    pub fn matches_extension(&self, name: &str) -> bool {
        self.extensions
            .as_ref()
            .map_or(true, |set| set.contains(&file_extension(name)))
    }

    pub fn matches_pattern(&self, name: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| re.is_match(name))
    }

    /// Extension first, then pattern, the order both backends apply.
    pub fn matches(&self, name: &str) -> bool {
        self.matches_extension(name) && self.matches_pattern(name)
    }
}
