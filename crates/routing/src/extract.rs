//! Deterministic extraction of identifiers, entities and intents from one
//! turn of free text (English or Chinese).
//!
//! Multi-word shapes (URLs, `HERT BBU …`, `BTS3900 …`) are captured first.
//! The rest is split into ASCII and CJK runs; label keywords such as
//! `branch`/`分支` bind an adjacent ASCII token to a slot.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::entity::{lookup, validate_entity, EntityKind, EntityRejection};
use crate::identifier::{Classifier, Identifier, IdentifierKind};

/// Question types that select among the version-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BasicInfo,
    CommercialStatus,
    Mirror,
    PushStatus,
    TrunkBuild,
    RnNodes,
    MergeStatus,
    MergeBetween,
}

/// Everything one turn supplied. Within a turn the first mention wins.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnSlots {
    pub major_version: Option<String>,
    /// Search-key-capable identifiers in order of appearance.
    pub identifiers: Vec<Identifier>,
    pub components: Vec<String>,
    pub products: Vec<String>,
    pub mr_url: Option<String>,
    /// Named entities that are in neither enumeration.
    pub unrecognized: Vec<EntityRejection>,
    /// Tokens that look like a search key but fit no shape (bare `hert…`).
    pub ambiguous: Vec<String>,
    pub intents: BTreeSet<Intent>,
    pub warnings: Vec<String>,
}

impl TurnSlots {
    pub fn search_key(&self) -> Option<&Identifier> {
        self.identifiers.first()
    }

    pub fn has_intent(&self, intent: Intent) -> bool {
        self.intents.contains(&intent)
    }

    /// Identifiers usable as the two ends of a merge-between query.
    pub fn version_like(&self) -> impl Iterator<Item = &Identifier> {
        self.identifiers.iter().filter(|id| {
            matches!(
                id.kind,
                IdentifierKind::EngineeringVersion
                    | IdentifierKind::SpcVersion
                    | IdentifierKind::HertVersion
                    | IdentifierKind::NodeId
                    | IdentifierKind::MultimodeVersion
            )
        })
    }

    pub fn is_empty(&self) -> bool {
        self.major_version.is_none()
            && self.identifiers.is_empty()
            && self.components.is_empty()
            && self.products.is_empty()
            && self.mr_url.is_none()
            && self.unrecognized.is_empty()
            && self.ambiguous.is_empty()
    }

    fn push_identifier(&mut self, id: Identifier) {
        if let Some(warning) = id.validation_warning() {
            self.warnings.push(warning);
        }
        if !self.identifiers.contains(&id) {
            self.identifiers.push(id);
        }
    }

    fn push_entity(&mut self, kind: EntityKind, name: String) {
        let list = match kind {
            EntityKind::Component => &mut self.components,
            EntityKind::Product => &mut self.products,
        };
        if !list.contains(&name) {
            list.push(name);
        }
    }
}

// ── tokens ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Branch,
    Node,
    Entity(EntityKind),
}

#[derive(Debug)]
enum Token {
    Url(String),
    Shaped(Identifier),
    Ascii(String),
    Cjk(String),
}

impl Token {
    fn ascii(&self) -> Option<&str> {
        match self {
            Token::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

const ENGLISH_LABELS: &[(&str, Label)] = &[
    ("branch", Label::Branch),
    ("node", Label::Node),
    ("component", Label::Entity(EntityKind::Component)),
    ("components", Label::Entity(EntityKind::Component)),
    ("product", Label::Entity(EntityKind::Product)),
    ("products", Label::Entity(EntityKind::Product)),
];

const CJK_LABELS: &[(&str, Label)] = &[
    ("分支", Label::Branch),
    ("节点", Label::Node),
    ("组件", Label::Entity(EntityKind::Component)),
    ("产品", Label::Entity(EntityKind::Product)),
];

const ENGLISH_INTENTS: &[(&str, Intent)] = &[
    ("basic", Intent::BasicInfo),
    ("commercial", Intent::CommercialStatus),
    ("mirror", Intent::Mirror),
    ("image", Intent::Mirror),
    ("push", Intent::PushStatus),
    ("pushed", Intent::PushStatus),
    ("smartci", Intent::TrunkBuild),
    ("rn", Intent::RnNodes),
    ("merge", Intent::MergeStatus),
    ("merged", Intent::MergeStatus),
    ("between", Intent::MergeBetween),
    ("diff", Intent::MergeBetween),
];

const CJK_INTENTS: &[(&str, Intent)] = &[
    ("基本信息", Intent::BasicInfo),
    ("详细信息", Intent::BasicInfo),
    ("商用", Intent::CommercialStatus),
    ("镜像", Intent::Mirror),
    ("推送", Intent::PushStatus),
    ("构建状态", Intent::TrunkBuild),
    ("主干构建", Intent::TrunkBuild),
    ("合入", Intent::MergeStatus),
    ("之间", Intent::MergeBetween),
    ("差异", Intent::MergeBetween),
];

/// Words an English label must never bind to.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "at", "for", "from", "in", "info", "is", "of", "on", "the", "to", "version",
    "versions", "what", "which", "with",
];

fn is_ascii_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

fn is_cjk_word_char(c: char) -> bool {
    !c.is_ascii() && c.is_alphanumeric()
}

/// A token an English label may bind to without looking like prose.
fn looks_like_value(token: &str, label: Label) -> bool {
    match label {
        Label::Entity(kind) => {
            validate_entity(token, kind).is_ok()
                || token.contains(|c: char| c == '_' || c.is_ascii_digit())
        }
        Label::Branch => token.contains(|c: char| matches!(c, '_' | '/' | '-' | '.')),
        Label::Node => token.bytes().any(|b| b.is_ascii_digit()),
    }
}

// ── extractor ───────────────────────────────────────────────────────

pub struct Extractor {
    classifier: Classifier,
    url: Regex,
    hert: Regex,
    multimode: Regex,
}

impl Extractor {
    pub fn new(classifier: Classifier) -> Result<Self, regex::Error> {
        Ok(Self {
            classifier,
            url: Regex::new(r"https?://[^\s\p{Han}，。；！？、）)\]>]+")?,
            hert: Regex::new(r"HERT BBU(?:\s+[A-Za-z0-9_.\-/]+)?")?,
            multimode: Regex::new(r"BTS3900[A-Za-z0-9_.\-]*(?:\s+V\d[A-Za-z0-9_.\-]*)?")?,
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn extract(&self, text: &str) -> TurnSlots {
        let tokens = self.tokenize(text);
        let mut slots = TurnSlots::default();
        let (labels, keywords) = bind_labels(&tokens, &mut slots);

        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Url(url) => {
                    slots.mr_url.get_or_insert_with(|| url.clone());
                }
                Token::Shaped(id) => slots.push_identifier(id.clone()),
                Token::Cjk(_) => {}
                Token::Ascii(_) if keywords.contains(&i) => {}
                Token::Ascii(word) => match labels.get(&i) {
                    Some(label) => self.labelled(word, *label, &mut slots),
                    None => self.unlabelled(word, &mut slots),
                },
            }
        }
        slots
    }

    fn labelled(&self, word: &str, label: Label, slots: &mut TurnSlots) {
        let id = self.classifier.classify(word);
        match label {
            Label::Branch if id.kind == IdentifierKind::MajorVersion => {
                slots.major_version.get_or_insert(id.raw);
            }
            Label::Branch => {
                slots.push_identifier(Identifier::new(IdentifierKind::BranchName, id.raw))
            }
            Label::Node if word.bytes().all(|b| b.is_ascii_alphanumeric()) => {
                slots.push_identifier(Identifier::new(IdentifierKind::NodeId, id.raw))
            }
            Label::Node => self.unlabelled(word, slots),
            Label::Entity(kind) => match validate_entity(word, kind) {
                Ok(entity) => slots.push_entity(entity.kind, entity.name),
                Err(rejection) => slots.unrecognized.push(rejection),
            },
        }
    }

    fn unlabelled(&self, word: &str, slots: &mut TurnSlots) {
        let id = self.classifier.classify(word);
        match id.kind {
            IdentifierKind::MajorVersion => {
                slots.major_version.get_or_insert(id.raw);
            }
            IdentifierKind::Unknown => {
                if let Some(entity) = lookup(word) {
                    slots.push_entity(entity.kind, entity.name);
                } else if word.to_ascii_lowercase().contains("hert") {
                    slots.ambiguous.push(word.to_owned());
                } else if word.contains('_') {
                    slots.unrecognized.push(EntityRejection::unclassified(word));
                }
            }
            _ => slots.push_identifier(id),
        }
    }

    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut spans: Vec<(usize, usize, Token)> = Vec::new();
        let taken = |start: usize, end: usize, spans: &[(usize, usize, Token)]| {
            spans.iter().any(|(s, e, _)| start < *e && *s < end)
        };
        for m in self.url.find_iter(text) {
            spans.push((m.start(), m.end(), Token::Url(m.as_str().to_owned())));
        }
        for m in self.hert.find_iter(text) {
            if !taken(m.start(), m.end(), &spans) {
                let id = Identifier::new(IdentifierKind::HertVersion, m.as_str().trim());
                spans.push((m.start(), m.end(), Token::Shaped(id)));
            }
        }
        for m in self.multimode.find_iter(text) {
            if !taken(m.start(), m.end(), &spans) {
                let id = Identifier::new(IdentifierKind::MultimodeVersion, m.as_str().trim());
                spans.push((m.start(), m.end(), Token::Shaped(id)));
            }
        }
        spans.sort_by_key(|(start, _, _)| *start);

        let mut tokens = Vec::new();
        let mut cursor = 0;
        for (start, end, token) in spans {
            split_words(&text[cursor..start], &mut tokens);
            tokens.push(token);
            cursor = end;
        }
        split_words(&text[cursor..], &mut tokens);
        tokens
    }
}

fn split_words(segment: &str, out: &mut Vec<Token>) {
    let mut current = String::new();
    let mut current_is_ascii = true;

    let flush = |current: &mut String, is_ascii: bool, out: &mut Vec<Token>| {
        if current.is_empty() {
            return;
        }
        if is_ascii {
            let trimmed = current.trim_matches(|c: char| c == '.' || c == '-');
            if !trimmed.is_empty() {
                out.push(Token::Ascii(trimmed.to_owned()));
            }
        } else {
            out.push(Token::Cjk(current.clone()));
        }
        current.clear();
    };

    for c in segment.chars() {
        let class = if is_ascii_word_char(c) {
            Some(true)
        } else if is_cjk_word_char(c) {
            Some(false)
        } else {
            None
        };
        match class {
            Some(is_ascii) if current.is_empty() || is_ascii == current_is_ascii => {
                current_is_ascii = is_ascii;
                current.push(c);
            }
            Some(is_ascii) => {
                flush(&mut current, current_is_ascii, out);
                current_is_ascii = is_ascii;
                current.push(c);
            }
            None => flush(&mut current, current_is_ascii, out),
        }
    }
    flush(&mut current, current_is_ascii, out);
}

/// Find label keywords and intents. Returns the label bound to each ASCII
/// token index and the indexes of ASCII tokens that are themselves keywords.
fn bind_labels(tokens: &[Token], slots: &mut TurnSlots) -> (HashMap<usize, Label>, BTreeSet<usize>) {
    let mut labels = HashMap::new();
    let mut keywords = BTreeSet::new();
    let ascii_at = |i: Option<usize>| i.and_then(|i| tokens.get(i)).and_then(Token::ascii);
    let mut saw_build = false;
    let mut saw_status = false;

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1);
        let next = Some(i + 1);
        match token {
            Token::Ascii(word) => {
                let lower = word.to_ascii_lowercase();
                if let Some((_, intent)) = ENGLISH_INTENTS.iter().find(|(kw, _)| *kw == lower) {
                    slots.intents.insert(*intent);
                }
                saw_build |= lower == "build";
                saw_status |= lower == "status";

                let Some((_, label)) = ENGLISH_LABELS.iter().find(|(kw, _)| *kw == lower) else {
                    continue;
                };
                keywords.insert(i);
                let target = [next, prev]
                    .into_iter()
                    .find(|&j| ascii_at(j).is_some_and(|w| looks_like_value(w, *label)))
                    .flatten()
                    .or_else(|| {
                        ascii_at(next)
                            .filter(|w| !STOPWORDS.contains(&w.to_ascii_lowercase().as_str()))
                            .and(next)
                    });
                if let Some(j) = target {
                    labels.entry(j).or_insert(*label);
                }
            }
            Token::Cjk(run) => {
                for (kw, intent) in CJK_INTENTS {
                    if run.contains(kw) {
                        slots.intents.insert(*intent);
                    }
                }
                for (kw, label) in CJK_LABELS {
                    if !run.contains(kw) {
                        continue;
                    }
                    let order = if run.ends_with(kw) {
                        [next, prev]
                    } else {
                        [prev, next]
                    };
                    let candidates: Vec<usize> = order
                        .into_iter()
                        .flatten()
                        .filter(|&j| ascii_at(Some(j)).is_some())
                        .collect();
                    let fits = |j: &usize| {
                        let w = ascii_at(Some(*j)).unwrap_or_default();
                        match (label, lookup(w)) {
                            (Label::Entity(kind), Some(e)) => e.kind == *kind,
                            (_, Some(_)) => false,
                            _ => true,
                        }
                    };
                    let target = candidates
                        .iter()
                        .find(|&&j| fits(&j))
                        .or(candidates.first())
                        .copied();
                    if let Some(j) = target {
                        labels.entry(j).or_insert(*label);
                    }
                }
            }
            Token::Url(_) | Token::Shaped(_) => {}
        }
    }
    if saw_build && saw_status {
        slots.intents.insert(Intent::TrunkBuild);
    }
    (labels, keywords)
}
