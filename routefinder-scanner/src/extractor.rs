// Lexical route extraction from script and markup text

use regex::Regex;
use std::sync::LazyLock;

const MAX_ROUTE_LEN: usize = 200;

static QUOTED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]((?:/|\.\./|\./)[^'"]+)['"]"#).expect("quoted path pattern")
});

static BARE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[a-zA-Z0-9_?&=/\-#.]*").expect("bare path pattern"));

static ROUTE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)routes?\s*[:=]\s*['"]([^'"]+)['"]"#).expect("route key pattern")
});

static PATH_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)path\s*[:=]\s*['"]([^'"]+)['"]"#).expect("path key pattern")
});

/// A single extraction heuristic. Rules push raw candidates; validation
/// happens in [`PathExtractor`].
pub trait ExtractionRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn candidates<'a>(&self, content: &'a str, out: &mut Vec<&'a str>);
}

/// Takes the first capture group of each match, or the whole match when the
/// group is missing or empty.
pub struct CaptureRule {
    name: &'static str,
    regex: &'static Regex,
}

impl CaptureRule {
    pub fn new(name: &'static str, regex: &'static Regex) -> Self {
        Self { name, regex }
    }
}

impl ExtractionRule for CaptureRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn candidates<'a>(&self, content: &'a str, out: &mut Vec<&'a str>) {
        for caps in self.regex.captures_iter(content) {
            let candidate = caps
                .get(1)
                .filter(|m| !m.is_empty())
                .or_else(|| caps.get(0));
            if let Some(m) = candidate {
                out.push(m.as_str());
            }
        }
    }
}

/// Accepts a match only when it sits directly between two delimiter bytes.
/// The delimiters are not part of the match, so a closing quote may also
/// open the next candidate.
pub struct DelimitedRule {
    name: &'static str,
    regex: &'static Regex,
    delimiters: &'static [u8],
}

impl DelimitedRule {
    pub fn new(name: &'static str, regex: &'static Regex, delimiters: &'static [u8]) -> Self {
        Self {
            name,
            regex,
            delimiters,
        }
    }
}

impl ExtractionRule for DelimitedRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn candidates<'a>(&self, content: &'a str, out: &mut Vec<&'a str>) {
        let bytes = content.as_bytes();
        for m in self.regex.find_iter(content) {
            let opened = m.start() > 0 && self.delimiters.contains(&bytes[m.start() - 1]);
            let closed = bytes
                .get(m.end())
                .is_some_and(|b| self.delimiters.contains(b));
            if opened && closed {
                out.push(m.as_str());
            }
        }
    }
}

pub fn quoted_path_rule() -> CaptureRule {
    CaptureRule::new("quoted-path", &QUOTED_PATH)
}

pub fn bare_path_rule() -> DelimitedRule {
    DelimitedRule::new("bare-path", &BARE_PATH, b"\"'`")
}

pub fn route_key_rule() -> CaptureRule {
    CaptureRule::new("route-key", &ROUTE_KEY)
}

pub fn path_key_rule() -> CaptureRule {
    CaptureRule::new("path-key", &PATH_KEY)
}

/// Returns true when `path` looks like a client-side route.
pub fn is_valid_path(path: &str) -> bool {
    (path.starts_with('/') || path.starts_with("./") || path.starts_with("../"))
        && !path.contains(' ')
        && path.bytes().all(|b| (0x20..=0x7e).contains(&b))
        && path.len() > 1
        && path.len() < MAX_ROUTE_LEN
}

/// Ordered list of extraction rules plus the validity filter.
pub struct PathExtractor {
    rules: Vec<Box<dyn ExtractionRule>>,
}

impl PathExtractor {
    /// The four standard rules used for script content.
    pub fn new() -> Self {
        Self::empty()
            .with_rule(quoted_path_rule())
            .with_rule(bare_path_rule())
            .with_rule(route_key_rule())
            .with_rule(path_key_rule())
    }

    /// Bare-path rule only, used against rendered page markup.
    pub fn for_markup() -> Self {
        Self::empty().with_rule(bare_path_rule())
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: impl ExtractionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Valid candidates in rule order then match order. May contain
    /// duplicates.
    pub fn extract(&self, content: &str) -> Vec<String> {
        let mut raw = Vec::new();
        for rule in &self.rules {
            rule.candidates(content, &mut raw);
        }
        raw.into_iter()
            .filter(|candidate| is_valid_path(candidate))
            .map(str::to_string)
            .collect()
    }
}

impl Default for PathExtractor {
    fn default() -> Self {
        Self::new()
    }
}
