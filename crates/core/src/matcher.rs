//! Ordered pattern → value matching
//!
//! Rule tables are kept as ordered sequences so that the first rule whose
//! pattern matches a candidate always wins, no matter how the configuration
//! was written. Patterns are compiled once, when the run configuration is
//! built, so a malformed pattern is reported before any file is touched.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// `*` and `?` cross `/` so a single pattern can target files at any depth.
const GLOB_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// How pattern keys in rule tables are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Regular expression search: the pattern may match any substring
    #[default]
    Regex,
    /// Shell glob over the whole candidate string
    Glob,
}

impl FromStr for MatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regex" | "regexp" => Ok(MatchMode::Regex),
            "glob" => Ok(MatchMode::Glob),
            other => Err(Error::Config(format!(
                "Unknown match mode '{other}'. Expected 'regex' or 'glob'"
            ))),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Regex => f.write_str("regex"),
            MatchMode::Glob => f.write_str("glob"),
        }
    }
}

/// A compiled pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches every candidate (scalar settings)
    Any,
    /// Matches nothing (empty glob)
    Never,
    /// Regular expression, search semantics
    Regex(regex::Regex),
    /// Glob, whole-string semantics
    Glob(glob::Pattern),
}

impl Pattern {
    /// Compile `raw` according to `mode`
    ///
    /// An empty regex matches everywhere, while an empty glob never matches.
    pub fn compile(raw: &str, mode: MatchMode) -> Result<Self> {
        match mode {
            MatchMode::Regex => regex::Regex::new(raw)
                .map(Pattern::Regex)
                .map_err(|e| Error::invalid_pattern(raw, e)),
            MatchMode::Glob if raw.is_empty() => Ok(Pattern::Never),
            MatchMode::Glob => glob::Pattern::new(raw)
                .map(Pattern::Glob)
                .map_err(|e| Error::invalid_pattern(raw, e)),
        }
    }

    /// Test a candidate string
    pub fn is_match(&self, candidate: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Never => false,
            Pattern::Regex(re) => re.is_match(candidate),
            Pattern::Glob(pattern) => pattern.matches_with(candidate, GLOB_OPTIONS),
        }
    }

    /// Source text of the pattern
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Any => "*",
            Pattern::Never => "",
            Pattern::Regex(re) => re.as_str(),
            Pattern::Glob(pattern) => pattern.as_str(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pattern → value pairs in the order they were configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable<V> {
    entries: Vec<(String, V)>,
}

impl<V> RuleTable<V> {
    /// Build a table from ordered pairs
    pub fn new(entries: Vec<(String, V)>) -> Self {
        Self { entries }
    }

    /// Ordered entries
    pub fn entries(&self) -> &[(String, V)] {
        &self.entries
    }
}

impl<V> Default for RuleTable<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> FromIterator<(String, V)> for RuleTable<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// Maps are read entry by entry so document order survives deserialization.
impl<'de, V: Deserialize<'de>> Deserialize<'de> for RuleTable<V> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for TableVisitor<V> {
            type Value = RuleTable<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of pattern to value")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((pattern, value)) = map.next_entry::<String, V>()? {
                    entries.push((pattern, value));
                }
                Ok(RuleTable { entries })
            }
        }

        deserializer.deserialize_map(TableVisitor(PhantomData))
    }
}

/// A rule setting as written in configuration: either a table of patterns,
/// or a single value that applies to every file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleSetting<V> {
    Table(RuleTable<V>),
    Scalar(V),
}

impl RuleSetting<String> {
    /// Parse a flag value: a JSON object of pattern → value, or a plain value
    pub fn from_flag(value: &str) -> Self {
        serde_json::from_str(value).unwrap_or_else(|_| RuleSetting::Scalar(value.to_string()))
    }
}

impl RuleSetting<BTreeMap<String, String>> {
    /// Parse a metadata flag: a JSON object of pattern → map, or a single map
    pub fn from_json(value: &str) -> Result<Self> {
        Ok(serde_json::from_str(value)?)
    }
}

/// One compiled rule
#[derive(Debug, Clone)]
pub struct Rule<V> {
    pub pattern: Pattern,
    pub value: V,
}

/// Compiled, ordered rule list
#[derive(Debug, Clone)]
pub struct Rules<V> {
    rules: Vec<Rule<V>>,
}

impl<V> Default for Rules<V> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<V: Clone> Rules<V> {
    /// Compile a setting; `None` yields an empty rule list
    pub fn compile(setting: Option<&RuleSetting<V>>, mode: MatchMode) -> Result<Self> {
        let rules = match setting {
            None => Vec::new(),
            Some(RuleSetting::Scalar(value)) => vec![Rule {
                pattern: Pattern::Any,
                value: value.clone(),
            }],
            Some(RuleSetting::Table(table)) => table
                .entries()
                .iter()
                .map(|(raw, value)| {
                    Ok(Rule {
                        pattern: Pattern::compile(raw, mode)?,
                        value: value.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(Self { rules })
    }
}

impl<V> Rules<V> {
    /// Value of the first rule matching `candidate`
    pub fn first_match(&self, candidate: &str) -> Option<&V> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(candidate))
            .map(|rule| &rule.value)
    }
}
