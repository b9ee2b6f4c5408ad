//! Priority extraction
//!
//! The project field wins when present; otherwise labels are scanned for
//! `priority:<level>`, bare level names, `p0`-`p3` shorthands, and the
//! colored-circle emoji some boards use. First match wins; everything
//! else is `none`.

use crate::types::{Priority, QueuedIssue};

/// Parse one priority token. Tolerates surrounding emoji and whitespace.
pub fn parse_priority(raw: &str) -> Option<Priority> {
    let token = raw.trim();

    if token.contains('\u{1F534}') {
        return Some(Priority::Critical); // red circle
    }
    if token.contains('\u{1F7E0}') {
        return Some(Priority::High); // orange circle
    }
    if token.contains('\u{1F7E1}') {
        return Some(Priority::Medium); // yellow circle
    }
    if token.contains('\u{1F7E2}') {
        return Some(Priority::Low); // green circle
    }

    match token.to_lowercase().as_str() {
        "critical" | "p0" => Some(Priority::Critical),
        "high" | "p1" => Some(Priority::High),
        "medium" | "p2" => Some(Priority::Medium),
        "low" | "p3" => Some(Priority::Low),
        "none" => Some(Priority::None),
        _ => None,
    }
}

/// Extract a priority from label text.
pub fn priority_from_labels(labels: &[String]) -> Priority {
    for label in labels {
        let candidate = match label.split_once(':') {
            Some((prefix, rest)) if prefix.trim().eq_ignore_ascii_case("priority") => rest,
            Some(_) => continue,
            None => label.as_str(),
        };
        if let Some(priority) = parse_priority(candidate) {
            return priority;
        }
    }
    Priority::None
}

/// Full extraction rule: project field first, then labels.
pub fn extract_priority(issue: &QueuedIssue) -> Priority {
    if let Some(project_priority) = &issue.project_priority {
        if let Some(priority) = parse_priority(project_priority) {
            return priority;
        }
    }
    priority_from_labels(&issue.labels)
}
