//! Entity Validator: exact, case-sensitive membership in the two closed
//! enumerations. Names are never corrected or substituted.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const COMPONENTS: &[&str] = &[
    "tlbck",
    "ltrusteer",
    "compiler_cpu",
    "vpp",
    "license",
    "dopra_ssp",
    "hisec_ict",
    "cmscbb",
    "bbuapp",
    "nse_egn",
    "ERU",
    "ipclk",
    "airan",
    "iware",
    "visp",
    "rtos",
    "saie",
    "gndp",
    "dopra_dda",
    "hitss",
    "secure_c",
    "kme",
    "rnt",
    "central_repo",
    "bts3920",
];

pub const PRODUCTS: &[&str] = &[
    "besa", "marp_ru", "nfa", "hert_ue", "MRAT", "Atom_RRU", "bts", "ant_rcu", "gbts", "nodeb",
    "makelut", "SRU", "mbts_cmc",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Component,
    Product,
}

impl EntityKind {
    pub fn members(self) -> &'static [&'static str] {
        match self {
            Self::Component => COMPONENTS,
            Self::Product => PRODUCTS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated entity name. Only [`validate_entity`] and [`lookup`]
/// construct these, so `name` is always an enumeration member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
}

/// A name that is not a member of the list(s) it was checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("\"{name}\" is not a known {}", expected_lists(.expected))]
pub struct EntityRejection {
    pub name: String,
    pub expected: Vec<EntityKind>,
}

impl EntityRejection {
    /// Rejection for a name whose intended class is unknown.
    pub fn unclassified(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: vec![EntityKind::Component, EntityKind::Product],
        }
    }
}

fn expected_lists(kinds: &[EntityKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

pub fn validate_entity(name: &str, kind: EntityKind) -> Result<Entity, EntityRejection> {
    if kind.members().contains(&name) {
        Ok(Entity {
            kind,
            name: name.to_owned(),
        })
    } else {
        Err(EntityRejection {
            name: name.to_owned(),
            expected: vec![kind],
        })
    }
}

/// The class a known name belongs to. The two lists are disjoint.
pub fn lookup(name: &str) -> Option<Entity> {
    [EntityKind::Component, EntityKind::Product]
        .into_iter()
        .find_map(|kind| validate_entity(name, kind).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_are_disjoint() {
        for c in COMPONENTS {
            assert!(!PRODUCTS.contains(c), "{c} is in both lists");
        }
    }

    #[test]
    fn every_member_validates_idempotently() {
        for kind in [EntityKind::Component, EntityKind::Product] {
            for name in kind.members() {
                let first = validate_entity(name, kind).unwrap();
                let second = validate_entity(&first.name, kind).unwrap();
                assert_eq!(first, second);
                assert_eq!(first.name, *name);
            }
        }
    }

    #[test]
    fn casing_tricks_are_rejected() {
        for name in ["IWARE", "Iware", "eru", "mrat", "sru", " iware", "iware "] {
            assert!(lookup(name).is_none(), "{name:?}");
            assert!(validate_entity(name, EntityKind::Component).is_err());
            assert!(validate_entity(name, EntityKind::Product).is_err());
        }
    }

    #[test]
    fn wrong_class_is_rejected() {
        let err = validate_entity("nodeb", EntityKind::Component).unwrap_err();
        assert_eq!(err.expected, vec![EntityKind::Component]);
        assert_eq!(err.to_string(), "\"nodeb\" is not a known component");
    }

    #[test]
    fn unclassified_rejection_names_both_lists() {
        let err = EntityRejection::unclassified("nonexistent_widget");
        assert_eq!(
            err.to_string(),
            "\"nonexistent_widget\" is not a known component or product"
        );
    }

    #[test]
    fn lookup_finds_class() {
        assert_eq!(lookup("iware").map(|e| e.kind), Some(EntityKind::Component));
        assert_eq!(lookup("hert_ue").map(|e| e.kind), Some(EntityKind::Product));
    }
}
