//! Remote issue types

use serde::{Deserialize, Serialize};

/// Target repository, `owner/name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => anyhow::bail!("Invalid repository {s:?}, expected owner/name"),
        }
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Snapshot of a remote item: identifier, title and state at search time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub number: u64,
    pub title: String,
    pub state: IssueState,
}

/// Payload for creating an item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_parse() {
        let repo = RepoId::parse("acme/widgets").unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.to_string(), "acme/widgets");
    }

    #[test]
    fn repo_id_invalid() {
        assert!(RepoId::parse("widgets").is_err());
        assert!(RepoId::parse("/widgets").is_err());
        assert!(RepoId::parse("acme/").is_err());
        assert!(RepoId::parse("a/b/c").is_err());
    }

    #[test]
    fn new_issue_omits_empty_lists() {
        let issue = NewIssue {
            title: "T".into(),
            body: "B".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&issue).unwrap();
        assert_eq!(json, r#"{"title":"T","body":"B"}"#);
    }

    #[test]
    fn remote_issue_state_lowercase() {
        let json = r#"{"number": 5, "title": "x", "state": "closed"}"#;
        let issue: RemoteIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.state, IssueState::Closed);
    }
}
