//! Identifier Classifier.
//!
//! Maps a raw token onto exactly one [`IdentifierKind`] using
//! priority-ordered shape rules. The first matching rule wins, so a token
//! like `HERT BBU V1/2` is a HERT version even though it contains `/`.

use serde::{Deserialize, Serialize};

/// Length of a full commit-style node id.
pub const CANONICAL_NODE_ID_LEN: usize = 40;

/// Shortest token accepted as a node id unless configured otherwise.
pub const DEFAULT_NODE_ID_MIN_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    NodeId,
    BranchName,
    HertVersion,
    SpcVersion,
    MultimodeVersion,
    EngineeringVersion,
    MajorVersion,
    Unknown,
}

impl IdentifierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NodeId => "node_id",
            Self::BranchName => "branch_name",
            Self::HertVersion => "hert_version",
            Self::SpcVersion => "spc_version",
            Self::MultimodeVersion => "multimode_version",
            Self::EngineeringVersion => "engineering_version",
            Self::MajorVersion => "major_version",
            Self::Unknown => "unknown",
        }
    }
}

/// A classified token. `raw` is the trimmed input, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub raw: String,
}

impl Identifier {
    pub fn new(kind: IdentifierKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    /// Whether this identifier can key a lookup (everything except the
    /// major version and unclassifiable tokens).
    pub fn is_search_key(&self) -> bool {
        !matches!(
            self.kind,
            IdentifierKind::MajorVersion | IdentifierKind::Unknown
        )
    }

    /// Non-fatal shape issues worth surfacing in logs and traces.
    pub fn validation_warning(&self) -> Option<String> {
        if self.kind == IdentifierKind::NodeId && self.raw.len() != CANONICAL_NODE_ID_LEN {
            return Some(format!(
                "node id \"{}\" has {} characters, expected {}",
                self.raw,
                self.raw.len(),
                CANONICAL_NODE_ID_LEN
            ));
        }
        None
    }
}

/// Shape-based classifier. Pure and total: every input maps to exactly one
/// kind and the same input always maps to the same kind.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    node_id_min_len: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            node_id_min_len: DEFAULT_NODE_ID_MIN_LEN,
        }
    }
}

impl Classifier {
    pub fn new(node_id_min_len: usize) -> Self {
        Self {
            node_id_min_len: node_id_min_len.max(1),
        }
    }

    pub fn classify(&self, token: &str) -> Identifier {
        let raw = token.trim();
        Identifier::new(self.kind_of(raw), raw)
    }

    fn kind_of(&self, s: &str) -> IdentifierKind {
        if is_major_version(s) {
            IdentifierKind::MajorVersion
        } else if s.starts_with("HERT BBU") {
            IdentifierKind::HertVersion
        } else if s.starts_with("SPC") {
            IdentifierKind::SpcVersion
        } else if s.starts_with("BTS3900") {
            IdentifierKind::MultimodeVersion
        } else if is_engineering_version(s) {
            IdentifierKind::EngineeringVersion
        } else if s.contains('/') || s.starts_with("hert_bugfix") {
            IdentifierKind::BranchName
        } else if self.is_node_id(s) {
            IdentifierKind::NodeId
        } else {
            IdentifierKind::Unknown
        }
    }

    fn is_node_id(&self, s: &str) -> bool {
        s.len() >= self.node_id_min_len
            && s.bytes().all(|b| b.is_ascii_alphanumeric())
            && s.bytes().any(|b| b.is_ascii_digit())
    }
}

/// Classify with the default node-id length policy.
pub fn classify(token: &str) -> Identifier {
    Classifier::default().classify(token)
}

/// Two ASCII digits followed by one lowercase ASCII letter, nothing else.
pub fn is_major_version(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 3 && b[0].is_ascii_digit() && b[1].is_ascii_digit() && b[2].is_ascii_lowercase()
}

fn is_engineering_version(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('V') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: &str = "36ff94e91b0ac3bc17513d9aa2a7799a6d771763";

    #[test]
    fn every_two_digit_letter_token_is_a_major_version() {
        for a in b'0'..=b'9' {
            for b in b'0'..=b'9' {
                for c in b'a'..=b'z' {
                    let token = String::from_utf8(vec![a, b, c]).unwrap();
                    let id = classify(&token);
                    assert_eq!(id.kind, IdentifierKind::MajorVersion, "{token}");
                    assert_ne!(id.kind, IdentifierKind::BranchName);
                }
            }
        }
    }

    #[test]
    fn near_major_versions_are_not_major() {
        for token in ["24A", "2a", "240a", "24ab", "a24"] {
            assert_ne!(classify(token).kind, IdentifierKind::MajorVersion, "{token}");
        }
    }

    #[test]
    fn hert_prefix_wins_over_slash() {
        for token in [
            "HERT BBU V500R015C00SPC1508002",
            "HERT BBU V1/2",
            "HERT BBU feature/x",
        ] {
            assert_eq!(classify(token).kind, IdentifierKind::HertVersion, "{token}");
        }
    }

    #[test]
    fn slash_means_branch() {
        for token in ["foo/bar", "release/24a", "a/b/c", "x/"] {
            assert_eq!(classify(token).kind, IdentifierKind::BranchName, "{token}");
        }
    }

    #[test]
    fn version_prefixes_rank_above_slash() {
        assert_eq!(classify("SPC100/x").kind, IdentifierKind::SpcVersion);
        assert_eq!(classify("BTS3900/x").kind, IdentifierKind::MultimodeVersion);
        assert_eq!(classify("V1/x").kind, IdentifierKind::EngineeringVersion);
        assert_eq!(classify("v1/x").kind, IdentifierKind::BranchName);
    }

    #[test]
    fn hert_bugfix_prefix_means_branch() {
        assert_eq!(
            classify("hert_bugfix_2026").kind,
            IdentifierKind::BranchName
        );
    }

    #[test]
    fn bare_hert_tokens_are_unknown() {
        assert_eq!(classify("hert_feature_abc").kind, IdentifierKind::Unknown);
        assert_eq!(classify("hert").kind, IdentifierKind::Unknown);
    }

    #[test]
    fn version_families() {
        assert_eq!(classify("SPC050").kind, IdentifierKind::SpcVersion);
        assert_eq!(
            classify("BTS3900 V100R017C10SPC200").kind,
            IdentifierKind::MultimodeVersion
        );
        assert_eq!(
            classify("V500R015C00SPC1508002").kind,
            IdentifierKind::EngineeringVersion
        );
        assert_eq!(classify("Version").kind, IdentifierKind::Unknown);
    }

    #[test]
    fn node_ids() {
        let full = classify(NODE);
        assert_eq!(full.kind, IdentifierKind::NodeId);
        assert!(full.validation_warning().is_none());

        let short = classify(&NODE[..20]);
        assert_eq!(short.kind, IdentifierKind::NodeId);
        assert!(short.validation_warning().is_some());

        assert_eq!(classify(&NODE[..8]).kind, IdentifierKind::Unknown);
        assert_eq!(
            classify("internationalization").kind,
            IdentifierKind::Unknown,
            "letters only is not a node id"
        );
    }

    #[test]
    fn configured_min_len_is_honored() {
        let c = Classifier::new(8);
        assert_eq!(c.classify(&NODE[..8]).kind, IdentifierKind::NodeId);
    }

    #[test]
    fn classification_is_deterministic_and_trims() {
        let a = classify("  foo/bar ");
        let b = classify("foo/bar");
        assert_eq!(a, b);
        assert_eq!(a.raw, "foo/bar");
    }

    #[test]
    fn search_key_capability() {
        assert!(classify("foo/bar").is_search_key());
        assert!(!classify("24a").is_search_key());
        assert!(!classify("whatever").is_search_key());
    }
}
