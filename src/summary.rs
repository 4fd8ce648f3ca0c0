//! One-line summaries scraped from the tool's human-readable output.

use std::sync::LazyLock;

use regex::Regex;

use crate::workflow::types::Action;

pub const NO_CHANGES: &str = "No changes. Infrastructure is up-to-date.";

static PLAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+) to add, ([0-9]+) to change, ([0-9]+) to destroy")
        .expect("plan summary regex is valid")
});

static APPLY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+) added, ([0-9]+) changed, ([0-9]+) destroyed")
        .expect("apply summary regex is valid")
});

/// Extract the summary line for `action` from raw tool output.
///
/// Returns an empty string when nothing recognizable is found.
pub fn summarize(action: Action, output: &str) -> String {
    match action {
        Action::Plan => {
            if output.contains(NO_CHANGES) {
                NO_CHANGES.to_string()
            } else {
                first_match(&PLAN_REGEX, output)
            }
        }
        Action::Apply => first_match(&APPLY_REGEX, output),
        Action::Init => String::new(),
    }
}

fn first_match(regex: &Regex, output: &str) -> String {
    regex
        .find(output)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_no_changes() {
        assert_eq!(
            summarize(Action::Plan, "No changes. Infrastructure is up-to-date."),
            "No changes. Infrastructure is up-to-date."
        );
    }

    #[test]
    fn test_plan_counts() {
        assert_eq!(
            summarize(Action::Plan, "Plan: 3 to add, 1 to change, 0 to destroy."),
            "3 to add, 1 to change, 0 to destroy"
        );
    }

    #[test]
    fn test_plan_unrelated_text() {
        assert_eq!(summarize(Action::Plan, "unrelated text"), "");
    }

    #[test]
    fn test_plan_no_changes_wins_over_counts() {
        let output = "Plan: 1 to add, 0 to change, 0 to destroy.\n\
                      No changes. Infrastructure is up-to-date.";
        assert_eq!(summarize(Action::Plan, output), NO_CHANGES);
    }

    #[test]
    fn test_first_match_is_taken() {
        let output = "module a\nPlan: 12 to add, 0 to change, 4 to destroy.\n\
                      module b\nPlan: 1 to add, 1 to change, 1 to destroy.\n";
        assert_eq!(
            summarize(Action::Plan, output),
            "12 to add, 0 to change, 4 to destroy"
        );
    }

    #[test]
    fn test_apply_counts() {
        assert_eq!(
            summarize(
                Action::Apply,
                "Apply complete! Resources: 2 added, 0 changed, 1 destroyed."
            ),
            "2 added, 0 changed, 1 destroyed"
        );
    }

    #[test]
    fn test_apply_ignores_plan_wording() {
        assert_eq!(
            summarize(Action::Apply, "Plan: 3 to add, 1 to change, 0 to destroy."),
            ""
        );
    }

    #[test]
    fn test_init_has_no_summary() {
        assert_eq!(summarize(Action::Init, "Terraform has been successfully initialized!"), "");
    }
}
