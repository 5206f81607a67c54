//! User-facing text for every turn outcome. Deterministic: the same
//! outcome always renders the same text.

use serde_json::Value;

use pa_domain::error::Error;
use pa_routing::{BoundSlots, OperationDescriptor, Param, RejectReason};

fn describe(param: Param) -> &'static str {
    match param {
        Param::MajorVersion => "the major version (e.g. 24a)",
        Param::SearchKey => "what to look up: a node id, branch, HERT BBU version, SPC version or BTS3900 version",
        Param::NodeId => "the node id",
        Param::Branch => "the branch name",
        Param::HertVersion => "the HERT BBU version",
        Param::SpcVersion => "the SPC version",
        Param::MultimodeVersion => "the BTS3900 multimode version",
        Param::StartVersion => "the start version",
        Param::EndVersion => "the end version",
        Param::MrUrl => "the merge request URL",
        Param::Component => "the component name",
        Param::Product => "the product name",
        Param::ComponentOrProduct => "whether you mean a component or a product, and its name",
    }
}

/// Data-service result, headed by what was asked.
pub fn success(descriptor: &OperationDescriptor, bound: &BoundSlots, value: &Value) -> String {
    let subject = bound
        .iter()
        .map(|(param, v)| format!("{}={v}", param.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let body = match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    format!("{} ({subject}):\n{body}", descriptor.summary)
}

pub fn clarification(missing: &[Param], ambiguous: &[String]) -> String {
    let mut parts = Vec::new();
    for token in ambiguous {
        parts.push(format!(
            "\"{token}\" is ambiguous; say whether it is a branch (e.g. \"branch {token}\") or a HERT BBU version."
        ));
    }
    if !missing.is_empty() {
        let wanted = missing
            .iter()
            .map(|p| describe(*p))
            .collect::<Vec<_>>()
            .join("; ");
        parts.push(format!("Please provide {wanted}."));
    }
    if parts.is_empty() {
        parts.push("Please rephrase the question with a version, node id or branch.".into());
    }
    parts.join(" ")
}

pub fn rejection(reason: &RejectReason) -> String {
    match reason {
        RejectReason::EntityNotRecognized(r) => {
            let known = r
                .expected
                .iter()
                .map(|kind| format!("{kind}s: {}", kind.members().join(", ")))
                .collect::<Vec<_>>()
                .join("; ");
            format!("{r}. Known {known}.")
        }
    }
}

pub fn failure(err: &Error) -> String {
    match err {
        Error::UpstreamUnavailable { attempts, .. } => format!(
            "The data service is unavailable right now (gave up after {attempts} attempt(s)). Please try again later."
        ),
        Error::UpstreamRejected { status, body, .. } => {
            format!("The data service rejected the request ({status}): {body}")
        }
        other => format!("The query failed: {other}"),
    }
}
