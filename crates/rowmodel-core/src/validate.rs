//! Validation rules and set-time value filters.
//!
//! A [`RuleSet`] holds per-field rules and filters for one model. `check`
//! validates exactly the named-value set it is handed (a save's working
//! change-set), so untouched fields are never re-validated. Filters run when
//! a value is written through `Record::set`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use regex::Regex;

use crate::error::{RuleKind, ValidationError};
use crate::field::ValueTransform;
use crate::value::Value;

/// Thread-safe cache of compiled regex patterns.
///
/// Patterns are compiled lazily on first use and cached for the lifetime of
/// the program, so repeated validation of the same field is cheap.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Option<Regex> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Some(regex.clone());
            }
        }

        match Regex::new(pattern) {
            Ok(regex) => {
                let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
                cache.insert(pattern.to_string(), regex.clone());
                Some(regex)
            }
            Err(e) => {
                tracing::warn!(
                    pattern = pattern,
                    error = %e,
                    "invalid regex pattern in validation rule, treating as non-match"
                );
                None
            }
        }
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern, using the shared cache.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    regex_cache()
        .get_or_compile(pattern)
        .is_some_and(|regex| regex.is_match(value))
}

/// A single validation rule.
#[derive(Clone)]
pub enum Rule {
    /// The value must not be empty (NULL, false, zero, `""`, `"0"`, `[]`).
    Required,
    /// Numeric value must be at least this.
    Min(f64),
    /// Numeric value must be at most this.
    Max(f64),
    /// Text must have at least this many characters.
    MinLength(usize),
    /// Text must have at most this many characters.
    MaxLength(usize),
    /// Text must match this regex pattern.
    Pattern(String),
    /// Named custom predicate; failing the predicate fails the rule.
    Custom(&'static str, Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl Rule {
    /// The kind identifier reported on failure.
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::Required => RuleKind::Required,
            Rule::Min(_) => RuleKind::Min,
            Rule::Max(_) => RuleKind::Max,
            Rule::MinLength(_) => RuleKind::MinLength,
            Rule::MaxLength(_) => RuleKind::MaxLength,
            Rule::Pattern(_) => RuleKind::Pattern,
            Rule::Custom(..) => RuleKind::Custom,
        }
    }

    fn check(&self, value: &Value) -> Option<String> {
        match self {
            Rule::Required => value.is_empty().then(|| "must not be empty".to_string()),
            Rule::Min(min) => value
                .as_f64()
                .filter(|v| v < min)
                .map(|v| format!("must be at least {min}, got {v}")),
            Rule::Max(max) => value
                .as_f64()
                .filter(|v| v > max)
                .map(|v| format!("must be at most {max}, got {v}")),
            Rule::MinLength(min) => value.as_str().and_then(|s| {
                let len = s.chars().count();
                (len < *min).then(|| format!("must be at least {min} characters, got {len}"))
            }),
            Rule::MaxLength(max) => value.as_str().and_then(|s| {
                let len = s.chars().count();
                (len > *max).then(|| format!("must be at most {max} characters, got {len}"))
            }),
            Rule::Pattern(pattern) => {
                let matched = value.as_str().is_some_and(|s| matches_pattern(s, pattern));
                (!matched).then(|| format!("does not match pattern {pattern}"))
            }
            Rule::Custom(name, check) => (!check(value)).then(|| format!("failed rule {name}")),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "Required"),
            Rule::Min(v) => write!(f, "Min({v})"),
            Rule::Max(v) => write!(f, "Max({v})"),
            Rule::MinLength(v) => write!(f, "MinLength({v})"),
            Rule::MaxLength(v) => write!(f, "MaxLength({v})"),
            Rule::Pattern(p) => write!(f, "Pattern({p:?})"),
            Rule::Custom(name, _) => write!(f, "Custom({name:?})"),
        }
    }
}

/// Per-field validation rules and write filters for one model.
#[derive(Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, Vec<Rule>>,
    filters: HashMap<String, ValueTransform>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for a field.
    pub fn rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.rules.entry(field.into()).or_default().push(rule);
        self
    }

    /// Add a write filter for a field, applied on `Record::set`.
    pub fn filter(mut self, field: impl Into<String>, transform: ValueTransform) -> Self {
        self.filters.insert(field.into(), transform);
        self
    }

    /// Whether any rules or filters are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.filters.is_empty()
    }

    /// Apply the field's filter to a value, if one is registered.
    pub fn apply_filter(&self, field: &str, value: Value) -> Value {
        match self.filters.get(field) {
            Some(f) => f(&value),
            None => value,
        }
    }

    /// Validate a named-value set.
    ///
    /// Only fields present in `data` are checked. Returns the full set of
    /// failures, not just the first.
    pub fn check(&self, data: &HashMap<String, Value>) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        for (field, rules) in &self.rules {
            let Some(value) = data.get(field) else {
                continue;
            };
            for rule in rules {
                if let Some(message) = rule.check(value) {
                    errors.add(field.clone(), rule.kind(), message);
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rules)
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}
