//! The closed catalogue of data-service operations.
//!
//! | family            | operations |
//! |-------------------|------------|
//! | detail lookups    | `query_{component,product}_by_{node,branch,hert_version}` |
//! | version lookups   | basic info, multimode, SPC commercial status, merge-between |
//! | version-only      | RN hert nodes, trunk mirror, push status, trunk build |
//! | other             | bugfix branch, component merge status, MR info |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named operation parameter. Serialized in snake_case, which is also
/// the name reported in clarification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    MajorVersion,
    SearchKey,
    NodeId,
    Branch,
    HertVersion,
    SpcVersion,
    MultimodeVersion,
    StartVersion,
    EndVersion,
    MrUrl,
    Component,
    Product,
    /// Only ever reported as missing: an entity is needed but its class is
    /// not yet known.
    ComponentOrProduct,
}

impl Param {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MajorVersion => "major_version",
            Self::SearchKey => "search_key",
            Self::NodeId => "node_id",
            Self::Branch => "branch",
            Self::HertVersion => "hert_version",
            Self::SpcVersion => "spc_version",
            Self::MultimodeVersion => "multimode_version",
            Self::StartVersion => "start_version",
            Self::EndVersion => "end_version",
            Self::MrUrl => "mr_url",
            Self::Component => "component",
            Self::Product => "product",
            Self::ComponentOrProduct => "component_or_product",
        }
    }

    pub fn is_entity(self) -> bool {
        matches!(
            self,
            Self::Component | Self::Product | Self::ComponentOrProduct
        )
    }
}

/// Parameter values bound for one invocation, keyed by parameter.
pub type BoundSlots = BTreeMap<Param, String>;

/// Binds a parameter to the payload field the data service expects.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamBinding {
    pub param: Param,
    pub field: &'static str,
}

const fn bind(param: Param, field: &'static str) -> ParamBinding {
    ParamBinding { param, field }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    MenuHertNodeOnRn,
    QueryTrunkMirrorInfo,
    QueryBugfixBranchInfo,
    QueryVersionPushStatus,
    QueryComponentMergeStatus,
    QueryVersionBasicInfo,
    QueryVersionByMultimode,
    QuerySpcCommercialStatus,
    QueryMergeInfoBetweenVersions,
    QueryMrInfo,
    CheckTrunkBuildStatus,
    QueryComponentByNode,
    QueryComponentByBranch,
    QueryComponentByHertVersion,
    QueryProductByNode,
    QueryProductByBranch,
    QueryProductByHertVersion,
}

impl Operation {
    pub fn descriptor(self) -> &'static OperationDescriptor {
        &CATALOGUE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CATALOGUE.iter().find(|d| d.name == name).map(|d| d.operation)
    }
}

/// Static, immutable description of one backend operation.
#[derive(Debug, Serialize)]
pub struct OperationDescriptor {
    pub operation: Operation,
    pub name: &'static str,
    pub summary: &'static str,
    /// Path below the data-service base URL.
    pub endpoint: &'static str,
    pub params: &'static [ParamBinding],
}

impl OperationDescriptor {
    pub fn required(&self) -> impl Iterator<Item = Param> + '_ {
        self.params.iter().map(|b| b.param)
    }

    /// Build the JSON request body. Fails with the first parameter that
    /// has no bound value.
    pub fn payload(
        &self,
        bound: &BoundSlots,
    ) -> Result<serde_json::Map<String, serde_json::Value>, Param> {
        let mut body = serde_json::Map::new();
        for binding in self.params {
            let value = bound.get(&binding.param).ok_or(binding.param)?;
            body.insert(binding.field.to_owned(), value.clone().into());
        }
        Ok(body)
    }
}

use Param::*;

/// Indexed by `Operation as usize`.
pub static CATALOGUE: [OperationDescriptor; 17] = [
    OperationDescriptor {
        operation: Operation::MenuHertNodeOnRn,
        name: "menu_hert_node_on_rn",
        summary: "List the HERT nodes recorded in the release notes of a major version",
        endpoint: "read_file_rn",
        params: &[bind(MajorVersion, "int_ver")],
    },
    OperationDescriptor {
        operation: Operation::QueryTrunkMirrorInfo,
        name: "query_trunk_mirror_info",
        summary: "Mirror (image) information for the trunk of a major version",
        endpoint: "read_file_img",
        params: &[bind(MajorVersion, "int_ver")],
    },
    OperationDescriptor {
        operation: Operation::QueryBugfixBranchInfo,
        name: "query_bugfix_branch_info",
        summary: "Mirror information for a hert_bugfix branch",
        endpoint: "read_bugfix_info",
        params: &[bind(MajorVersion, "int_ver"), bind(Branch, "branch")],
    },
    OperationDescriptor {
        operation: Operation::QueryVersionPushStatus,
        name: "query_version_push_status",
        summary: "Push status of the versions of a major version",
        endpoint: "inquire_ver_push",
        params: &[bind(MajorVersion, "int_ver")],
    },
    OperationDescriptor {
        operation: Operation::QueryComponentMergeStatus,
        name: "query_component_merge_status",
        summary: "Where a component has been merged within a major version",
        endpoint: "inquire_components",
        params: &[bind(MajorVersion, "int_ver"), bind(Component, "search")],
    },
    OperationDescriptor {
        operation: Operation::QueryVersionBasicInfo,
        name: "query_version_basic_info",
        summary: "Basic build information for a node, HERT, SPC or engineering version",
        endpoint: "inquire_daily_ver",
        params: &[bind(MajorVersion, "int_ver"), bind(SearchKey, "search")],
    },
    OperationDescriptor {
        operation: Operation::QueryVersionByMultimode,
        name: "query_version_by_multimode",
        summary: "Versions matching a BTS3900 multimode version",
        endpoint: "inquire_mode_ver",
        params: &[bind(MultimodeVersion, "search")],
    },
    OperationDescriptor {
        operation: Operation::QuerySpcCommercialStatus,
        name: "query_spc_commercial_status",
        summary: "Commercial release status of an SPC version",
        endpoint: "inquire_spc_ver",
        params: &[bind(MajorVersion, "int_ver"), bind(SpcVersion, "spc_ver")],
    },
    OperationDescriptor {
        operation: Operation::QueryMergeInfoBetweenVersions,
        name: "query_merge_info_between_versions",
        summary: "Changes merged between two versions",
        endpoint: "inquire_ver_merge",
        params: &[
            bind(MajorVersion, "int_ver"),
            bind(StartVersion, "parameter_one"),
            bind(EndVersion, "parameter_two"),
        ],
    },
    OperationDescriptor {
        operation: Operation::QueryMrInfo,
        name: "query_mr_info",
        summary: "Details of a merge request",
        endpoint: "inquire_mr_info",
        params: &[bind(MrUrl, "mr")],
    },
    OperationDescriptor {
        operation: Operation::CheckTrunkBuildStatus,
        name: "check_trunk_build_status",
        summary: "SmartCI build status of the trunk of a major version",
        endpoint: "inquire_smartci_info",
        params: &[bind(MajorVersion, "int_ver")],
    },
    OperationDescriptor {
        operation: Operation::QueryComponentByNode,
        name: "query_component_by_node",
        summary: "Component version contained in a node",
        endpoint: "read_file_components",
        params: &[
            bind(MajorVersion, "int_ver"),
            bind(NodeId, "search"),
            bind(Component, "components"),
        ],
    },
    OperationDescriptor {
        operation: Operation::QueryComponentByBranch,
        name: "query_component_by_branch",
        summary: "Component version merged on a branch",
        endpoint: "read_file_components",
        params: &[
            bind(MajorVersion, "int_ver"),
            bind(Branch, "search"),
            bind(Component, "components"),
        ],
    },
    OperationDescriptor {
        operation: Operation::QueryComponentByHertVersion,
        name: "query_component_by_hert_version",
        summary: "Component version contained in a HERT BBU version",
        endpoint: "read_file_components",
        params: &[
            bind(MajorVersion, "int_ver"),
            bind(HertVersion, "search"),
            bind(Component, "components"),
        ],
    },
    OperationDescriptor {
        operation: Operation::QueryProductByNode,
        name: "query_product_by_node",
        summary: "Product version matching a node",
        endpoint: "read_file_matching",
        params: &[
            bind(MajorVersion, "int_ver"),
            bind(NodeId, "search"),
            bind(Product, "mode_ver"),
        ],
    },
    OperationDescriptor {
        operation: Operation::QueryProductByBranch,
        name: "query_product_by_branch",
        summary: "Product version matching a branch",
        endpoint: "read_file_matching",
        params: &[
            bind(MajorVersion, "int_ver"),
            bind(Branch, "search"),
            bind(Product, "mode_ver"),
        ],
    },
    OperationDescriptor {
        operation: Operation::QueryProductByHertVersion,
        name: "query_product_by_hert_version",
        summary: "Product version matching a HERT BBU version",
        endpoint: "read_file_matching",
        params: &[
            bind(MajorVersion, "int_ver"),
            bind(HertVersion, "search"),
            bind(Product, "mode_ver"),
        ],
    },
];
