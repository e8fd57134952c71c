//! Pattern matching for namespace identities and host headers.

use regex::Regex;

/// How a namespace identity (or host header) may be matched.
///
/// `Any` is the wildcard used as the default host policy. `Never` expresses
/// a host policy under which no header maps to the main identity.
#[derive(Debug, Clone)]
pub enum NsPattern {
    /// Whole-string equality.
    Exact(String),
    /// Standard leftmost regex match.
    Regex(Regex),
    /// Matches any candidate at offset 0.
    Any,
    /// Matches nothing.
    Never,
}

/// Metadata for a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsMatch {
    /// The matched substring.
    pub matched: String,
    /// Byte offset of the match within the input.
    pub offset: usize,
    /// The full candidate string.
    pub input: String,
}

impl NsMatch {
    /// A match covering the whole input.
    pub fn whole(input: &str) -> Self {
        Self {
            matched: input.to_string(),
            offset: 0,
            input: input.to_string(),
        }
    }
}

impl NsPattern {
    pub fn matches(&self, candidate: &str) -> Option<NsMatch> {
        match self {
            Self::Exact(s) if s == candidate => Some(NsMatch::whole(candidate)),
            Self::Exact(_) => None,
            Self::Regex(re) => re.find(candidate).map(|m| NsMatch {
                matched: m.as_str().to_string(),
                offset: m.start(),
                input: candidate.to_string(),
            }),
            Self::Any => Some(NsMatch::whole(candidate)),
            Self::Never => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches_whole_string_only() {
        let p = NsPattern::Exact("/chat".into());
        let m = p.matches("/chat").unwrap();
        assert_eq!(m.matched, "/chat");
        assert_eq!(m.offset, 0);
        assert!(p.matches("/chatroom").is_none());
        assert!(p.matches("x/chat").is_none());
    }

    #[test]
    fn regex_returns_leftmost_match() {
        let p = NsPattern::Regex(Regex::new(r"ch.t").unwrap());
        let m = p.matches("/chat/chit").unwrap();
        assert_eq!(m.matched, "chat");
        assert_eq!(m.offset, 1);
        assert_eq!(m.input, "/chat/chit");
    }

    #[test]
    fn regex_failure_is_none() {
        let p = NsPattern::Regex(Regex::new(r"^/admin$").unwrap());
        assert!(p.matches("/user").is_none());
    }

    #[test]
    fn any_matches_everything_at_offset_zero() {
        let m = NsPattern::Any.matches("whatever").unwrap();
        assert_eq!(m.offset, 0);
        assert_eq!(m.matched, "whatever");
        assert!(NsPattern::Any.matches("").is_some());
    }

    #[test]
    fn never_matches_nothing() {
        assert!(NsPattern::Never.matches("").is_none());
        assert!(NsPattern::Never.matches("/").is_none());
        assert!(NsPattern::Never.matches("a.com").is_none());
    }
}
