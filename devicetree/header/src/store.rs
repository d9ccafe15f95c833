// Licensed under the Apache-2.0 license

//! The ordered macro store.
//!
//! Every `#define` of the header becomes one [`MacroEntry`], kept in file
//! order. Symbols are split on `_` into segments when they are parsed, and all
//! keyword matching compares whole segments: `UART_1` matches
//! `SYSTEM_UART_1_IO_CTRL` but not `SYSTEM_UART_10_IO_CTRL`, and `RAM` never
//! matches `FRAME`.
//!
//! When a symbol is defined more than once, lookups return the last
//! definition.

use std::collections::HashMap;

use log::warn;

/// A macro symbol split into its `_`-separated segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    raw: String,
    segments: Vec<String>,
}

impl Symbol {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: segments(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the segments of `keyword` appear as a contiguous run.
    pub fn contains(&self, keyword: &str) -> bool {
        let needle = segments(keyword);
        !needle.is_empty()
            && self
                .segments
                .windows(needle.len())
                .any(|window| window == needle.as_slice())
    }

    /// True when the symbol ends with the segments of `keyword`.
    pub fn ends_with(&self, keyword: &str) -> bool {
        let needle = segments(keyword);
        !needle.is_empty() && self.segments.ends_with(&needle)
    }

    /// True when the symbol starts with the segments of `keyword`.
    pub fn starts_with(&self, keyword: &str) -> bool {
        let needle = segments(keyword);
        !needle.is_empty() && self.segments.starts_with(&needle)
    }

    /// True when any segment equals `segment`.
    pub fn has_segment(&self, segment: &str) -> bool {
        self.segments.iter().any(|s| s == segment)
    }
}

fn segments(name: &str) -> Vec<String> {
    name.split('_')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One `(symbol, value)` pair of the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroEntry {
    pub symbol: Symbol,
    pub value: String,
    /// 1-based line number in the source text.
    pub line: usize,
}

/// How [`MacroStore::value_for`] compares the name against candidate symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Match {
    /// The symbol contains the name as a segment run.
    Contains,
    /// The symbol is exactly the name.
    Exact,
    /// Candidates containing the name are dropped; the last remaining
    /// candidate is returned.
    Exclude,
}

/// The parsed header, in file order.
#[derive(Clone, Debug, Default)]
pub struct MacroStore {
    entries: Vec<MacroEntry>,
    conflicts: Vec<String>,
}

impl MacroStore {
    /// Parses header text.
    ///
    /// Each line is split on whitespace: the second token is the symbol and
    /// the last token is the value. Lines with fewer than two tokens, comment
    /// lines and preprocessor directives other than `#define` are skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 || is_skipped(tokens[0]) {
                continue;
            }
            entries.push(MacroEntry {
                symbol: Symbol::new(tokens[1]),
                value: tokens[tokens.len() - 1].to_string(),
                line: idx + 1,
            });
        }
        let conflicts = find_conflicts(&entries);
        Self { entries, conflicts }
    }

    pub fn entries(&self) -> &[MacroEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbols defined more than once with different values.
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    /// All entries whose symbol contains `keyword`, in file order.
    pub fn properties_for<'a, 'k>(
        &'a self,
        keyword: &'k str,
    ) -> impl Iterator<Item = &'a MacroEntry> + 'k
    where
        'a: 'k,
    {
        self.entries
            .iter()
            .filter(move |entry| entry.symbol.contains(keyword))
    }

    /// Like [`MacroStore::properties_for`], without entries whose symbol
    /// contains `excluded`.
    pub fn properties_for_excluding<'a, 'k>(
        &'a self,
        keyword: &'k str,
        excluded: &'k str,
    ) -> impl Iterator<Item = &'a MacroEntry> + 'k
    where
        'a: 'k,
    {
        self.properties_for(keyword)
            .filter(move |entry| !entry.symbol.contains(excluded))
    }

    /// Value of the last entry matching `name` among the entries for `keyword`.
    pub fn value_for<'a>(&'a self, keyword: &str, name: &str, mode: Match) -> Option<&'a str> {
        let candidates = self.properties_for(keyword);
        let found = match mode {
            Match::Contains => candidates
                .filter(|entry| entry.symbol.contains(name))
                .last(),
            Match::Exact => candidates
                .filter(|entry| entry.symbol.as_str() == name)
                .last(),
            Match::Exclude => candidates
                .filter(|entry| !entry.symbol.contains(name))
                .last(),
        };
        found.map(|entry| entry.value.as_str())
    }

    /// Value of the last definition of exactly `symbol`.
    pub fn value(&self, symbol: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.symbol.as_str() == symbol)
            .map(|entry| entry.value.as_str())
    }

    /// Value of the last entry whose symbol ends with `keyword`.
    pub fn last_ending_with(&self, keyword: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.symbol.ends_with(keyword))
            .map(|entry| entry.value.as_str())
    }

    /// Number of entries whose symbol ends with `keyword`.
    pub fn count_ending_with(&self, keyword: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.symbol.ends_with(keyword))
            .count()
    }

    /// Treats `symbol` as a macro name and returns its value, or `"0"` when
    /// it is not defined.
    pub fn dereference(&self, symbol: &str) -> &str {
        self.value(symbol).unwrap_or("0")
    }
}

fn is_skipped(token: &str) -> bool {
    token.starts_with("//")
        || token.starts_with("/*")
        || token.starts_with('*')
        || (token.starts_with('#') && token != "#define")
}

fn find_conflicts(entries: &[MacroEntry]) -> Vec<String> {
    let mut seen: HashMap<&str, &MacroEntry> = HashMap::new();
    let mut conflicts = Vec::new();
    for entry in entries {
        let symbol = entry.symbol.as_str();
        match seen.get(symbol) {
            Some(first) if first.value != entry.value => {
                if !conflicts.iter().any(|c| c == symbol) {
                    warn!(
                        "{} redefined (line {}: {}, line {}: {}), the last definition wins",
                        symbol, first.line, first.value, entry.line, entry.value
                    );
                    conflicts.push(symbol.to_string());
                }
            }
            Some(_) => {}
            None => {
                seen.insert(symbol, entry);
            }
        }
    }
    conflicts
}
