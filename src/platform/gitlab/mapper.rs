use serde::Deserialize;

use crate::platform::types;

/// Response of `GET /projects/:id/merge_requests/:iid/approval_state`.
#[derive(Debug, Deserialize)]
pub struct ApiApprovalState {
    #[serde(default)]
    pub rules: Vec<ApiApprovalRule>,
}

#[derive(Debug, Deserialize)]
pub struct ApiApprovalRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub approvals_required: u32,
    #[serde(default)]
    pub approved_by: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiMergeRequest {
    pub iid: u64,
    #[serde(default)]
    pub title: String,
}

/// Map a GitLab approval state to our platform rule list.
pub fn map_approval_rules(state: ApiApprovalState) -> Vec<types::ApprovalRule> {
    state.rules.into_iter().map(map_approval_rule).collect()
}

fn map_approval_rule(rule: ApiApprovalRule) -> types::ApprovalRule {
    types::ApprovalRule {
        name: rule.name,
        approvals_required: rule.approvals_required,
        approved_by: rule.approved_by.into_iter().map(|u| u.username).collect(),
    }
}

pub fn map_merge_request(mr: ApiMergeRequest) -> types::MergeRequest {
    types::MergeRequest {
        iid: mr.iid,
        title: mr.title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_approval_state() {
        let json = r#"{
            "approval_rules_overwritten": false,
            "rules": [
                {
                    "id": 1,
                    "name": "security",
                    "rule_type": "regular",
                    "approvals_required": 2,
                    "approved_by": [{"id": 5, "username": "alice"}],
                    "approved": false
                },
                {"id": 2, "name": "any", "approvals_required": 0}
            ]
        }"#;
        let state: ApiApprovalState = serde_json::from_str(json).unwrap();
        let rules = map_approval_rules(state);

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "security");
        assert_eq!(rules[0].approvals_required, 2);
        assert_eq!(rules[0].approved_by, vec!["alice".to_string()]);
        assert!(!rules[0].is_satisfied());
        assert!(rules[1].approved_by.is_empty());
        assert!(rules[1].is_satisfied());
    }

    #[test]
    fn test_map_approval_state_without_rules() {
        let state: ApiApprovalState = serde_json::from_str("{}").unwrap();
        assert!(map_approval_rules(state).is_empty());
    }
}
