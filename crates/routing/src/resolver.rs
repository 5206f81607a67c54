//! Routing Resolver.
//!
//! Decides, for one turn, which catalogue operation to call and with which
//! parameters, or what to ask the user instead. The decision is a pure
//! function of the extracted turn, the session's slot memory and the
//! request context; the only side effect is writing the turn's supplied
//! slots into memory.

use serde::Serialize;

use crate::catalogue::{BoundSlots, Operation, Param};
use crate::entity::{Entity, EntityKind, EntityRejection};
use crate::extract::{Intent, TurnSlots};
use crate::identifier::{Identifier, IdentifierKind};
use crate::memory::{Slot, SlotMemory, SlotValue, SuppliedSlots};

/// Request-scoped inputs. Passed explicitly; nothing is read from ambient
/// state.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub turn_index: u32,
    /// Major version to fall back on when neither the turn nor memory has one.
    pub context_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    EntityNotRecognized(EntityRejection),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityNotRecognized(r) => write!(f, "{r}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        operation: Operation,
        bound: BoundSlots,
    },
    NeedsClarification {
        missing: Vec<Param>,
        known: BoundSlots,
        ambiguous: Vec<String>,
    },
    Rejected {
        reason: RejectReason,
    },
}

impl Resolution {
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Resolved { .. } => "resolved",
            Self::NeedsClarification { .. } => "needs_clarification",
            Self::Rejected { .. } => "rejected",
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Resolved { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

/// The slots a turn supplied, in the shape memory stores them.
pub fn supplied_slots(turn: &TurnSlots) -> SuppliedSlots {
    let mut supplied = SuppliedSlots::new();
    if let Some(v) = &turn.major_version {
        supplied.insert(Slot::MajorVersion, SlotValue::Text(v.clone()));
    }
    if let Some(key) = turn.search_key() {
        supplied.insert(Slot::SearchKey, SlotValue::Identifier(key.clone()));
    }
    if let Some(c) = turn.components.first() {
        supplied.insert(Slot::Component, SlotValue::Text(c.clone()));
    }
    if let Some(p) = turn.products.first() {
        supplied.insert(Slot::Product, SlotValue::Text(p.clone()));
    }
    supplied
}

/// Candidate operation and the parameters gathered for it.
#[derive(Default)]
struct Plan {
    operation: Option<Operation>,
    bound: BoundSlots,
    missing: Vec<Param>,
    ambiguous: Vec<String>,
}

impl Plan {
    fn op(operation: Operation) -> Self {
        Self {
            operation: Some(operation),
            ..Self::default()
        }
    }

    fn clarify() -> Self {
        Self::default()
    }

    fn require(mut self, param: Param, value: Option<&str>) -> Self {
        match value {
            Some(v) => {
                self.bound.insert(param, v.to_owned());
            }
            None => self.missing.push(param),
        }
        self
    }

    fn missing(mut self, param: Param) -> Self {
        self.missing.push(param);
        self
    }
}

enum EntityChoice {
    One(Entity),
    Both,
    None,
}

fn entity_choice(turn: &TurnSlots, memory: &SlotMemory) -> EntityChoice {
    match (turn.components.first(), turn.products.first()) {
        (Some(_), Some(_)) => EntityChoice::Both,
        (Some(c), None) => EntityChoice::One(Entity {
            kind: EntityKind::Component,
            name: c.clone(),
        }),
        (None, Some(p)) => EntityChoice::One(Entity {
            kind: EntityKind::Product,
            name: p.clone(),
        }),
        (None, None) => match memory.latest_entity() {
            Some(e) => EntityChoice::One(e),
            None if memory.resolve(Slot::Component).is_some() => EntityChoice::Both,
            None => EntityChoice::None,
        },
    }
}

fn detail_operation(key: IdentifierKind, entity: EntityKind) -> Option<(Operation, Param)> {
    use EntityKind::*;
    use IdentifierKind::*;
    Some(match (key, entity) {
        (NodeId, Component) => (Operation::QueryComponentByNode, Param::NodeId),
        (BranchName, Component) => (Operation::QueryComponentByBranch, Param::Branch),
        (HertVersion, Component) => (Operation::QueryComponentByHertVersion, Param::HertVersion),
        (NodeId, Product) => (Operation::QueryProductByNode, Param::NodeId),
        (BranchName, Product) => (Operation::QueryProductByBranch, Param::Branch),
        (HertVersion, Product) => (Operation::QueryProductByHertVersion, Param::HertVersion),
        _ => return None,
    })
}

/// Resolve one turn. Writes the turn's supplied slots into `memory` first.
pub fn resolve(turn: &TurnSlots, memory: &mut SlotMemory, ctx: &TurnContext) -> Resolution {
    memory.apply(ctx.turn_index, &supplied_slots(turn));

    let plan = plan(turn, memory, ctx);
    let rejection = turn.unrecognized.first().map(|r| Resolution::Rejected {
        reason: RejectReason::EntityNotRecognized(r.clone()),
    });

    match plan.operation {
        Some(operation) if plan.missing.is_empty() => {
            rejection.unwrap_or(Resolution::Resolved {
                operation,
                bound: plan.bound,
            })
        }
        _ => {
            // A bogus entity name outranks a request for the entity.
            let only_entity_missing =
                !plan.missing.is_empty() && plan.missing.iter().all(|p| p.is_entity());
            match rejection {
                Some(rejected) if only_entity_missing && plan.ambiguous.is_empty() => rejected,
                _ => Resolution::NeedsClarification {
                    missing: plan.missing,
                    known: plan.bound,
                    ambiguous: plan.ambiguous,
                },
            }
        }
    }
}

fn plan(turn: &TurnSlots, memory: &SlotMemory, ctx: &TurnContext) -> Plan {
    let major = turn
        .major_version
        .as_deref()
        .or(memory.major_version())
        .or(ctx.context_version.as_deref());
    let need_major = |plan: Plan| plan.require(Param::MajorVersion, major);

    if let Some(url) = &turn.mr_url {
        return Plan::op(Operation::QueryMrInfo).require(Param::MrUrl, Some(url));
    }

    if turn.has_intent(Intent::MergeBetween) {
        let mut versions = turn.version_like().map(|id| id.raw.as_str());
        let (start, end) = (versions.next(), versions.next());
        return need_major(Plan::op(Operation::QueryMergeInfoBetweenVersions))
            .require(Param::StartVersion, start)
            .require(Param::EndVersion, end);
    }

    // A turn that names both a detail key and an entity asks for that
    // detail; version-wide keywords in it must not drop those slots.
    let detail_request = turn.search_key().is_some_and(|key| {
        matches!(
            key.kind,
            IdentifierKind::NodeId | IdentifierKind::BranchName | IdentifierKind::HertVersion
        )
    }) && (!turn.components.is_empty() || !turn.products.is_empty());

    if !detail_request {
        for (intent, operation) in [
            (Intent::RnNodes, Operation::MenuHertNodeOnRn),
            (Intent::TrunkBuild, Operation::CheckTrunkBuildStatus),
            (Intent::PushStatus, Operation::QueryVersionPushStatus),
        ] {
            if turn.has_intent(intent) {
                return need_major(Plan::op(operation));
            }
        }

        if turn.has_intent(Intent::Mirror) {
            return match turn.search_key() {
                Some(key)
                    if key.kind == IdentifierKind::BranchName
                        && key.raw.starts_with("hert_bugfix") =>
                {
                    need_major(Plan::op(Operation::QueryBugfixBranchInfo))
                        .require(Param::Branch, Some(&key.raw))
                }
                _ => need_major(Plan::op(Operation::QueryTrunkMirrorInfo)),
            };
        }
    }

    // An unshaped hert-like token in this turn means the user named a key
    // we could not classify; do not silently fall back to memory.
    if turn.search_key().is_none() && !turn.ambiguous.is_empty() {
        let mut plan = Plan::clarify();
        if major.is_none() {
            plan = plan.missing(Param::MajorVersion);
        }
        plan = plan.missing(Param::SearchKey);
        plan.ambiguous = turn.ambiguous.clone();
        return plan;
    }

    let merge_status = turn.search_key().is_none()
        && turn.has_intent(Intent::MergeStatus)
        && (!turn.components.is_empty() || memory.search_key().is_none());
    if merge_status {
        let component = turn
            .components
            .first()
            .map(String::as_str)
            .or_else(|| match memory.latest_entity() {
                Some(e) if e.kind == EntityKind::Component => {
                    memory.resolve(Slot::Component).map(SlotValue::as_text)
                }
                _ => None,
            });
        return need_major(Plan::op(Operation::QueryComponentMergeStatus))
            .require(Param::Component, component);
    }

    let key: Option<&Identifier> = turn.search_key().or(memory.search_key());
    let Some(key) = key.filter(|k| k.is_search_key()) else {
        let mut plan = Plan::clarify();
        if major.is_none() {
            plan = plan.missing(Param::MajorVersion);
        }
        return plan.missing(Param::SearchKey);
    };

    match key.kind {
        IdentifierKind::MultimodeVersion => Plan::op(Operation::QueryVersionByMultimode)
            .require(Param::MultimodeVersion, Some(&key.raw)),
        IdentifierKind::SpcVersion if turn.has_intent(Intent::CommercialStatus) => {
            need_major(Plan::op(Operation::QuerySpcCommercialStatus))
                .require(Param::SpcVersion, Some(&key.raw))
        }
        IdentifierKind::SpcVersion | IdentifierKind::EngineeringVersion => {
            need_major(Plan::op(Operation::QueryVersionBasicInfo))
                .require(Param::SearchKey, Some(&key.raw))
        }
        kind => match entity_choice(turn, memory) {
            EntityChoice::One(entity) => match detail_operation(kind, entity.kind) {
                Some((operation, key_param)) => need_major(Plan::op(operation))
                    .require(key_param, Some(&key.raw))
                    .require(entity_param(entity.kind), Some(&entity.name)),
                None => need_major(Plan::clarify()).missing(Param::SearchKey),
            },
            EntityChoice::Both => need_major(Plan::clarify()).missing(Param::ComponentOrProduct),
            EntityChoice::None
                if kind == IdentifierKind::NodeId || turn.has_intent(Intent::BasicInfo) =>
            {
                need_major(Plan::op(Operation::QueryVersionBasicInfo))
                    .require(Param::SearchKey, Some(&key.raw))
            }
            EntityChoice::None => need_major(Plan::clarify()).missing(Param::ComponentOrProduct),
        },
    }
}

fn entity_param(kind: EntityKind) -> Param {
    match kind {
        EntityKind::Component => Param::Component,
        EntityKind::Product => Param::Product,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extractor;
    use crate::identifier::Classifier;

    struct Session {
        extractor: Extractor,
        memory: SlotMemory,
        context_version: Option<String>,
    }

    impl Session {
        fn new() -> Self {
            Self {
                extractor: Extractor::new(Classifier::default()).unwrap(),
                memory: SlotMemory::new(),
                context_version: Some("29a".into()),
            }
        }

        fn without_context_version() -> Self {
            Self {
                context_version: None,
                ..Self::new()
            }
        }

        fn turn(&mut self, text: &str) -> Resolution {
            let ctx = TurnContext {
                turn_index: self.memory.next_turn_index(),
                context_version: self.context_version.clone(),
            };
            let slots = self.extractor.extract(text);
            resolve(&slots, &mut self.memory, &ctx)
        }
    }

    fn resolved(r: &Resolution) -> (Operation, &BoundSlots) {
        match r {
            Resolution::Resolved { operation, bound } => (*operation, bound),
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    fn missing(r: &Resolution) -> &[Param] {
        match r {
            Resolution::NeedsClarification { missing, .. } => missing,
            other => panic!("expected NeedsClarification, got {other:?}"),
        }
    }

    #[test]
    fn context_version_fills_major() {
        let mut s = Session::new();
        let r = s.turn("branch hert_bugfix_2026, component iware");
        let (_, bound) = resolved(&r);
        assert_eq!(bound[&Param::MajorVersion], "29a");
    }

    #[test]
    fn turn_major_beats_memory_beats_context() {
        let mut s = Session::new();
        s.turn("25b branch foo/bar component iware");
        let r = s.turn("component rtos");
        assert_eq!(resolved(&r).1[&Param::MajorVersion], "25b");
        let r = s.turn("24a component rtos");
        assert_eq!(resolved(&r).1[&Param::MajorVersion], "24a");
    }

    #[test]
    fn missing_major_is_reported_without_context() {
        let mut s = Session::without_context_version();
        let r = s.turn("branch foo/bar component iware");
        assert_eq!(missing(&r), &[Param::MajorVersion]);
    }

    #[test]
    fn product_by_node() {
        let mut s = Session::new();
        let r = s.turn("节点 36ff94e91b0ac3bc17513d9aa2a7799a6d771763 的 nodeb 产品");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryProductByNode);
        assert_eq!(bound[&Param::Product], "nodeb");
        assert_eq!(bound.len(), 3);
    }

    #[test]
    fn component_by_hert_version() {
        let mut s = Session::new();
        let r = s.turn("HERT BBU V500R015C00SPC1508002 里 rtos 的版本");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryComponentByHertVersion);
        assert_eq!(bound[&Param::HertVersion], "HERT BBU V500R015C00SPC1508002");
    }

    #[test]
    fn node_without_entity_is_basic_info() {
        let mut s = Session::new();
        let r = s.turn("node 36ff94e91b0ac3bc17513d9aa2a7799a6d771763");
        assert_eq!(resolved(&r).0, Operation::QueryVersionBasicInfo);
    }

    #[test]
    fn branch_without_entity_asks_for_one() {
        let mut s = Session::new();
        let r = s.turn("branch foo/bar");
        assert_eq!(missing(&r), &[Param::ComponentOrProduct]);
    }

    #[test]
    fn component_and_product_in_one_turn_is_ambiguous() {
        let mut s = Session::new();
        let r = s.turn("branch foo/bar component iware product nodeb");
        assert_eq!(missing(&r), &[Param::ComponentOrProduct]);
    }

    #[test]
    fn most_recent_entity_class_is_inherited() {
        let mut s = Session::new();
        s.turn("branch foo/bar component iware");
        s.turn("product nodeb");
        let r = s.turn("branch a/b");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryProductByBranch);
        assert_eq!(bound[&Param::Branch], "a/b");
        assert_eq!(bound[&Param::Product], "nodeb");
    }

    #[test]
    fn spc_routes_by_intent() {
        let mut s = Session::new();
        assert_eq!(
            resolved(&s.turn("SPC050 商用了吗")).0,
            Operation::QuerySpcCommercialStatus
        );
        assert_eq!(
            resolved(&s.turn("SPC050 basic info")).0,
            Operation::QueryVersionBasicInfo
        );
    }

    #[test]
    fn multimode_needs_no_major() {
        let mut s = Session::without_context_version();
        let r = s.turn("BTS3900 V100R017C10SPC200");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryVersionByMultimode);
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn version_only_intents() {
        let mut s = Session::new();
        assert_eq!(resolved(&s.turn("24a 推送状态")).0, Operation::QueryVersionPushStatus);
        assert_eq!(resolved(&s.turn("24a smartci")).0, Operation::CheckTrunkBuildStatus);
        assert_eq!(resolved(&s.turn("rn hert nodes")).0, Operation::MenuHertNodeOnRn);
        assert_eq!(resolved(&s.turn("24a 主干镜像")).0, Operation::QueryTrunkMirrorInfo);
        let r = s.turn("hert_bugfix_2026 的镜像");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryBugfixBranchInfo);
        assert_eq!(bound[&Param::Branch], "hert_bugfix_2026");
    }

    #[test]
    fn detail_key_and_entity_outrank_version_keywords() {
        for text in [
            "what is the push status of iware on branch foo/bar",
            "component iware on branch foo/bar in rn",
            "iware version on branch foo/bar image",
            "smartci build of iware on branch foo/bar",
        ] {
            let mut s = Session::new();
            let r = s.turn(text);
            let (op, bound) = resolved(&r);
            assert_eq!(op, Operation::QueryComponentByBranch, "{text}");
            assert_eq!(bound[&Param::Branch], "foo/bar", "{text}");
            assert_eq!(bound[&Param::Component], "iware", "{text}");
        }

        let mut s = Session::new();
        let r = s.turn("push status of nodeb at node 36ff94e91b0ac3bc17513d9aa2a7799a6d771763");
        assert_eq!(resolved(&r).0, Operation::QueryProductByNode);
    }

    #[test]
    fn version_keywords_still_route_without_an_entity() {
        let mut s = Session::new();
        s.turn("branch foo/bar component iware");
        // The entity comes from memory, not this turn.
        let r = s.turn("24a push status");
        assert_eq!(resolved(&r).0, Operation::QueryVersionPushStatus);
    }

    #[test]
    fn merge_between_needs_two_versions() {
        let mut s = Session::new();
        let r = s.turn("merges between V500R015C00 and V500R016C00");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryMergeInfoBetweenVersions);
        assert_eq!(bound[&Param::StartVersion], "V500R015C00");
        assert_eq!(bound[&Param::EndVersion], "V500R016C00");

        let r = s.turn("diff between V500R015C00 and ?");
        assert_eq!(missing(&r), &[Param::EndVersion]);
    }

    #[test]
    fn mr_url() {
        let mut s = Session::new();
        let r = s.turn("https://codehub.example.com/g/r/merge_requests/7");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryMrInfo);
        assert_eq!(bound[&Param::MrUrl], "https://codehub.example.com/g/r/merge_requests/7");
    }

    #[test]
    fn merge_status_without_key() {
        let mut s = Session::new();
        let r = s.turn("iware 合入了吗");
        let (op, bound) = resolved(&r);
        assert_eq!(op, Operation::QueryComponentMergeStatus);
        assert_eq!(bound[&Param::Component], "iware");
    }

    #[test]
    fn ambiguous_hert_token_asks_and_ignores_memory() {
        let mut s = Session::new();
        s.turn("branch foo/bar component iware");
        let r = s.turn("what about hert_feature_abc");
        match &r {
            Resolution::NeedsClarification {
                missing, ambiguous, ..
            } => {
                assert_eq!(missing, &[Param::SearchKey]);
                assert_eq!(ambiguous, &["hert_feature_abc"]);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn rejection_never_writes_the_bad_name() {
        let mut s = Session::new();
        s.turn("query nonexistent_widget on branch foo/bar");
        assert!(s.memory.resolve(Slot::Component).is_none());
        assert!(s.memory.resolve(Slot::Product).is_none());
    }

    #[test]
    fn rejection_beats_resolution_when_a_valid_entity_is_also_named() {
        let mut s = Session::new();
        let r = s.turn("branch foo/bar component iware and my_widget");
        assert!(matches!(r, Resolution::Rejected { .. }));
    }

    #[test]
    fn resolution_serializes_with_outcome_tag() {
        let mut s = Session::new();
        let r = s.turn("branch hert_bugfix_2026, component iware");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["outcome"], "resolved");
        assert_eq!(json["operation"], "query_component_by_branch");
        assert_eq!(json["bound"]["branch"], "hert_bugfix_2026");
    }
}
