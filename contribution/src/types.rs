//! Core types for contribution scoring.
//!
//! These mirror the records handed over by the host-API adapter. They are
//! read-only inside the pipeline: every stage produces new records instead of
//! mutating these.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable numeric identifier of a host account.
pub type UserId = u64;

/// Whether an account is operated by a person or by automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    /// A human account (`"User"` on the host)
    #[serde(alias = "User")]
    Human,
    /// Bots, organizations and anything else the host reports
    #[serde(alias = "Bot", other)]
    Bot,
}

/// An account that took part in an issue thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Host account id
    pub id: UserId,
    /// Login name
    pub login: String,
    /// Human or automated
    #[serde(alias = "type")]
    pub kind: ParticipantKind,
}

impl Participant {
    /// Create a human participant.
    pub fn human(id: UserId, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            kind: ParticipantKind::Human,
        }
    }

    /// Create a bot participant.
    pub fn bot(id: UserId, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            kind: ParticipantKind::Bot,
        }
    }

    /// Whether this account is a person.
    pub fn is_human(&self) -> bool {
        self.kind == ParticipantKind::Human
    }
}

/// An issue label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Owner and name of the repository an issue lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Organization or user owning the repository
    pub owner: String,
    /// Repository name
    pub name: String,
}

/// A closed issue as delivered by the host adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Host-wide issue id
    pub id: u64,
    /// Per-repository issue number
    #[serde(default)]
    pub number: u64,
    /// The specification text; `None` when the author left it empty
    #[serde(default)]
    pub body: Option<String>,
    /// Labels attached at close time
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Assignees; the host may report null entries
    #[serde(default)]
    pub assignees: Vec<Option<Participant>>,
    /// Issue author
    pub user: Participant,
    /// Repository the issue belongs to
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

impl Issue {
    /// The specification body, if it holds any non-whitespace text.
    pub fn specification(&self) -> Option<&str> {
        self.body.as_deref().filter(|body| !body.trim().is_empty())
    }

    /// Assignees with null entries dropped and duplicates removed by id.
    pub fn assignee_list(&self) -> Vec<Participant> {
        let mut seen = Vec::new();
        let mut assignees = Vec::new();
        for assignee in self.assignees.iter().flatten() {
            if !seen.contains(&assignee.id) {
                seen.push(assignee.id);
                assignees.push(assignee.clone());
            }
        }
        assignees
    }
}

/// A comment on either the issue or a linked pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Host comment id
    pub id: u64,
    /// Markdown body
    pub body: String,
    /// Author
    pub user: Participant,
}

impl Comment {
    pub fn new(id: u64, body: impl Into<String>, user: Participant) -> Self {
        Self {
            id,
            body: body.into(),
            user,
        }
    }

    /// Treat an issue body as a comment authored by the issuer.
    ///
    /// Returns `None` when the issue has no specification text.
    pub fn from_specification(issue: &Issue) -> Option<Self> {
        issue.specification().map(|body| Self {
            id: issue.id,
            body: body.to_string(),
            user: issue.user.clone(),
        })
    }
}

/// Shared filter applied before any comment reaches a scorer.
///
/// Slash commands and comments from automated accounts are never scored.
pub fn is_scorable_comment(comment: &Comment) -> bool {
    !comment.body.trim_start().starts_with('/') && comment.user.is_human()
}

/// Which thread a contribution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Surface {
    /// The issue thread itself
    Issue,
    /// A linked pull request
    Review,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Issue => "Issue",
            Surface::Review => "Review",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Privileged or residual role of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Issuer,
    Assignee,
    Collaborator,
    Contributor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Issuer => "Issuer",
            Role::Assignee => "Assignee",
            Role::Collaborator => "Collaborator",
            Role::Contributor => "Contributor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of work a contribution class rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Activity {
    Comment,
    Specification,
    Task,
    Approval,
    Rejection,
    Code,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Comment => "Comment",
            Activity::Specification => "Specification",
            Activity::Task => "Task",
            Activity::Approval => "Approval",
            Activity::Rejection => "Rejection",
            Activity::Code => "Code",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The contribution kinds that currently produce scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContributionKind {
    Comment,
    Specification,
    Task,
}

impl ContributionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionKind::Comment => "Comment",
            ContributionKind::Specification => "Specification",
            ContributionKind::Task => "Task",
        }
    }
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_kind_aliases() {
        let human: Participant =
            serde_json::from_str(r#"{"id": 1, "login": "alice", "type": "User"}"#).unwrap();
        assert!(human.is_human());

        let bot: Participant =
            serde_json::from_str(r#"{"id": 2, "login": "ci", "type": "Bot"}"#).unwrap();
        assert_eq!(bot.kind, ParticipantKind::Bot);

        let org: Participant =
            serde_json::from_str(r#"{"id": 3, "login": "acme", "type": "Organization"}"#).unwrap();
        assert!(!org.is_human());
    }

    #[test]
    fn test_scorable_filter() {
        let alice = Participant::human(1, "alice");
        let bot = Participant::bot(2, "ci");

        assert!(is_scorable_comment(&Comment::new(1, "Looks good", alice.clone())));
        assert!(!is_scorable_comment(&Comment::new(2, "/start", alice.clone())));
        assert!(!is_scorable_comment(&Comment::new(3, "  /help", alice)));
        assert!(!is_scorable_comment(&Comment::new(4, "Build passed", bot)));
    }

    #[test]
    fn test_assignee_list_drops_nulls_and_duplicates() {
        let bob = Participant::human(2, "bob");
        let issue = Issue {
            id: 10,
            number: 1,
            body: Some("spec".into()),
            labels: vec![],
            assignees: vec![Some(bob.clone()), None, Some(bob.clone())],
            user: Participant::human(1, "alice"),
            repository: None,
        };

        assert_eq!(issue.assignee_list(), vec![bob]);
    }

    #[test]
    fn test_blank_specification_is_missing() {
        let issue = Issue {
            id: 10,
            number: 1,
            body: Some("   \n".into()),
            labels: vec![],
            assignees: vec![],
            user: Participant::human(1, "alice"),
            repository: None,
        };

        assert!(issue.specification().is_none());
        assert!(Comment::from_specification(&issue).is_none());
    }
}
