//! Severity classification for captured events
//!
//! A caller-supplied severity always wins. Otherwise the lower-cased message
//! and serialized context are matched against keyword families in precedence
//! order; the first family that matches decides. Nothing matching means
//! `Error`.

use super::types::{Context, EventSource, Severity};
use once_cell::sync::Lazy;
use regex::Regex;

static CRITICAL_TOKENS: Lazy<Option<Regex>> = Lazy::new(|| {
    keyword_family(&["crash*", "fatal*", "critical*", "panic*", "out of memory", "oom", "corrupt*"])
});

static AUTH_VALIDATION_TOKENS: Lazy<Option<Regex>> = Lazy::new(|| {
    keyword_family(&[
        "unauth*",
        "auth*",
        "forbidden",
        "permission*",
        "validat*",
        "invalid*",
        "401",
        "403",
    ])
});

static ERROR_TOKENS: Lazy<Option<Regex>> = Lazy::new(|| {
    keyword_family(&[
        "timeout*",
        "timed out",
        "network*",
        "unhandled*",
        "exception*",
        "fail*",
        "econnrefused",
        "econnreset",
    ])
});

static DEGRADATION_TOKENS: Lazy<Option<Regex>> = Lazy::new(|| {
    keyword_family(&["poor*", "slow*", "lag", "laggy", "lagging", "degrad*", "needs-improvement"])
});

/// Build a case-insensitive alternation anchored at word starts. A trailing
/// `*` lets the word continue, so `crash*` covers "crashes" and "crashed".
fn keyword_family(words: &[&str]) -> Option<Regex> {
    let alternation = words
        .iter()
        .map(|w| match w.strip_suffix('*') {
            Some(stem) => format!(r"{}\w*", regex::escape(stem)),
            None => format!(r"{}\b", regex::escape(w)),
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})", alternation)).ok()
}

fn hits(family: &Lazy<Option<Regex>>, haystack: &str) -> bool {
    family.as_ref().map(|re| re.is_match(haystack)).unwrap_or(false)
}

/// What the classifier looks at
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyInput<'a> {
    pub message: &'a str,
    pub context: Option<&'a Context>,
    pub source: EventSource,
    pub severity_hint: Option<Severity>,
}

impl<'a> ClassifyInput<'a> {
    pub fn new(message: &'a str, source: EventSource) -> Self {
        Self {
            message,
            source,
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: Option<&'a Context>) -> Self {
        self.context = context;
        self
    }

    pub fn with_hint(mut self, hint: Option<Severity>) -> Self {
        self.severity_hint = hint;
        self
    }
}

/// Decide the severity of an event
pub fn classify(input: &ClassifyInput<'_>) -> Severity {
    if let Some(severity) = input.severity_hint {
        return severity;
    }

    let mut haystack = input.message.to_lowercase();
    if let Some(context) = input.context.filter(|c| !c.is_empty()) {
        if let Ok(serialized) = serde_json::to_string(context) {
            haystack.push(' ');
            haystack.push_str(&serialized.to_lowercase());
        }
    }

    if hits(&CRITICAL_TOKENS, &haystack) {
        Severity::Critical
    } else if hits(&AUTH_VALIDATION_TOKENS, &haystack) {
        if input.source == EventSource::Api {
            Severity::Warning
        } else {
            Severity::Error
        }
    } else if hits(&ERROR_TOKENS, &haystack) {
        Severity::Error
    } else if hits(&DEGRADATION_TOKENS, &haystack) {
        Severity::Warning
    } else {
        Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn severity_of(message: &str, source: EventSource) -> Severity {
        classify(&ClassifyInput::new(message, source))
    }

    #[test]
    fn test_hint_always_wins() {
        let input = ClassifyInput::new("fatal crash in renderer", EventSource::Client)
            .with_hint(Some(Severity::Info));
        assert_eq!(classify(&input), Severity::Info);
    }

    #[test]
    fn test_precedence_order() {
        assert_eq!(severity_of("Fatal crash while saving", EventSource::Server), Severity::Critical);
        // critical beats auth
        assert_eq!(severity_of("panic: invalid state", EventSource::Api), Severity::Critical);
        // auth/validation beats the generic "failed"
        assert_eq!(severity_of("Validation failed for field 3", EventSource::Api), Severity::Warning);
        assert_eq!(severity_of("Validation failed for field 3", EventSource::Client), Severity::Error);
        assert_eq!(severity_of("Request timed out after 3000ms", EventSource::Api), Severity::Error);
        assert_eq!(severity_of("Poor LCP on today page", EventSource::Client), Severity::Warning);
    }

    #[test]
    fn test_default_is_error() {
        assert_eq!(severity_of("something odd happened", EventSource::Server), Severity::Error);
        assert_eq!(severity_of("", EventSource::Client), Severity::Error);
    }

    #[test]
    fn test_inflected_tokens_match() {
        assert_eq!(severity_of("App crashes on load", EventSource::Client), Severity::Critical);
        assert_eq!(severity_of("Authentication failed", EventSource::Api), Severity::Warning);
        assert_eq!(severity_of("Authorization header missing", EventSource::Api), Severity::Warning);
        assert_eq!(severity_of("Authorization header missing", EventSource::Server), Severity::Error);
        assert_eq!(severity_of("NetworkError when attempting to fetch resource", EventSource::Client), Severity::Error);
        assert_eq!(severity_of("Request timeouts exceeded", EventSource::Server), Severity::Error);
        assert_eq!(severity_of("Search degrading under load", EventSource::Server), Severity::Warning);

        assert!(hits(&ERROR_TOKENS, "networkerror when attempting to fetch resource"));
        assert!(hits(&ERROR_TOKENS, "request timeouts exceeded"));
        assert!(hits(&AUTH_VALIDATION_TOKENS, "unauthenticated session"));
    }

    #[test]
    fn test_tokens_anchor_at_word_starts() {
        // "catalog" and "reauthor" do not start a lag or auth token
        assert_eq!(severity_of("catalog reauthored", EventSource::Api), Severity::Error);
        assert_eq!(severity_of("dialog lag on open", EventSource::Client), Severity::Warning);
    }

    #[test]
    fn test_context_is_inspected() {
        let context = json!({"status": 403}).as_object().cloned().unwrap();
        let input = ClassifyInput::new("request rejected", EventSource::Api).with_context(Some(&context));
        assert_eq!(classify(&input), Severity::Warning);
    }

    #[test]
    fn test_keyword_families_compile() {
        for family in [&CRITICAL_TOKENS, &AUTH_VALIDATION_TOKENS, &ERROR_TOKENS, &DEGRADATION_TOKENS] {
            assert!(family.is_some());
        }
    }
}
