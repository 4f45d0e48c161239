use itertools::Itertools;
use serde_json::Value;

use crate::record::{RawTrial, LIST_SEP};

/// Walk `path` through nested objects. Any missing key, non-object
/// intermediate, or JSON null yields `None`.
pub fn get_nested<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |node, key| node.as_object()?.get(*key))
        .filter(|v| !v.is_null())
}

/// Scalar as text. Containers are treated as absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn text_at(study: &Value, path: &[&str]) -> Option<String> {
    get_nested(study, path).and_then(scalar_text)
}

fn phases(study: &Value) -> Option<String> {
    match get_nested(study, &["protocolSection", "designModule", "phases"])? {
        Value::Array(items) => non_empty(items.iter().filter_map(Value::as_str).join(LIST_SEP)),
        other => scalar_text(other).and_then(non_empty),
    }
}

fn countries(study: &Value) -> Option<String> {
    let locations = get_nested(study, &["protocolSection", "contactsLocationsModule", "locations"])?
        .as_array()?;
    let joined = locations
        .iter()
        .filter_map(|loc| loc.get("country").and_then(Value::as_str))
        .filter(|c| !c.is_empty())
        .sorted()
        .dedup()
        .join(LIST_SEP);
    non_empty(joined)
}

/// Flatten one API study object into a raw trial row.
pub fn flatten_study(study: &Value) -> RawTrial {
    RawTrial {
        nct_id: text_at(study, &["protocolSection", "identificationModule", "nctId"]),
        brief_title: text_at(study, &["protocolSection", "identificationModule", "briefTitle"]),
        overall_status: text_at(study, &["protocolSection", "statusModule", "overallStatus"]),
        study_type: text_at(study, &["protocolSection", "designModule", "studyType"]),
        phase: phases(study),
        start_date: text_at(
            study,
            &["protocolSection", "statusModule", "startDateStruct", "date"],
        ),
        lead_sponsor: text_at(
            study,
            &["protocolSection", "sponsorCollaboratorsModule", "leadSponsor", "name"],
        ),
        countries: countries(study),
    }
}
