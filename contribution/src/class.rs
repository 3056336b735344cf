//! The closed set of contribution classes.
//!
//! A class is a (surface, role, activity) triple. Extending the taxonomy means
//! adding a variant here; every `match` over the enum then has to handle it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Activity, Role, Surface};

/// A (surface × role × activity) bucket used to group participants and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContributionClass {
    IssueIssuerComment,
    IssueAssigneeComment,
    IssueCollaboratorComment,
    IssueContributorComment,
    IssueIssuerSpecification,
    IssueAssigneeTask,

    ReviewIssuerComment,
    ReviewAssigneeComment,
    ReviewCollaboratorComment,
    ReviewContributorComment,
    ReviewIssuerApproval,
    ReviewIssuerRejection,
    ReviewCollaboratorApproval,
    ReviewCollaboratorRejection,
    ReviewIssuerCode,
    ReviewAssigneeCode,
    ReviewCollaboratorCode,
}

impl ContributionClass {
    /// Every class, issue surface first.
    pub const ALL: [ContributionClass; 17] = [
        ContributionClass::IssueIssuerComment,
        ContributionClass::IssueAssigneeComment,
        ContributionClass::IssueCollaboratorComment,
        ContributionClass::IssueContributorComment,
        ContributionClass::IssueIssuerSpecification,
        ContributionClass::IssueAssigneeTask,
        ContributionClass::ReviewIssuerComment,
        ContributionClass::ReviewAssigneeComment,
        ContributionClass::ReviewCollaboratorComment,
        ContributionClass::ReviewContributorComment,
        ContributionClass::ReviewIssuerApproval,
        ContributionClass::ReviewIssuerRejection,
        ContributionClass::ReviewCollaboratorApproval,
        ContributionClass::ReviewCollaboratorRejection,
        ContributionClass::ReviewIssuerCode,
        ContributionClass::ReviewAssigneeCode,
        ContributionClass::ReviewCollaboratorCode,
    ];

    /// Decompose into the (surface, role, activity) triple.
    pub fn parts(&self) -> (Surface, Role, Activity) {
        use Activity as A;
        use ContributionClass as C;
        use Role as R;
        use Surface as S;

        match self {
            C::IssueIssuerComment => (S::Issue, R::Issuer, A::Comment),
            C::IssueAssigneeComment => (S::Issue, R::Assignee, A::Comment),
            C::IssueCollaboratorComment => (S::Issue, R::Collaborator, A::Comment),
            C::IssueContributorComment => (S::Issue, R::Contributor, A::Comment),
            C::IssueIssuerSpecification => (S::Issue, R::Issuer, A::Specification),
            C::IssueAssigneeTask => (S::Issue, R::Assignee, A::Task),
            C::ReviewIssuerComment => (S::Review, R::Issuer, A::Comment),
            C::ReviewAssigneeComment => (S::Review, R::Assignee, A::Comment),
            C::ReviewCollaboratorComment => (S::Review, R::Collaborator, A::Comment),
            C::ReviewContributorComment => (S::Review, R::Contributor, A::Comment),
            C::ReviewIssuerApproval => (S::Review, R::Issuer, A::Approval),
            C::ReviewIssuerRejection => (S::Review, R::Issuer, A::Rejection),
            C::ReviewCollaboratorApproval => (S::Review, R::Collaborator, A::Approval),
            C::ReviewCollaboratorRejection => (S::Review, R::Collaborator, A::Rejection),
            C::ReviewIssuerCode => (S::Review, R::Issuer, A::Code),
            C::ReviewAssigneeCode => (S::Review, R::Assignee, A::Code),
            C::ReviewCollaboratorCode => (S::Review, R::Collaborator, A::Code),
        }
    }

    pub fn surface(&self) -> Surface {
        self.parts().0
    }

    pub fn role(&self) -> Role {
        self.parts().1
    }

    pub fn activity(&self) -> Activity {
        self.parts().2
    }

    /// Classes on one surface, in declaration order.
    pub fn on_surface(surface: Surface) -> impl Iterator<Item = ContributionClass> {
        Self::ALL.into_iter().filter(move |class| class.surface() == surface)
    }

    /// The comment class for a role on a surface.
    pub fn comment(surface: Surface, role: Role) -> ContributionClass {
        use ContributionClass as C;

        match (surface, role) {
            (Surface::Issue, Role::Issuer) => C::IssueIssuerComment,
            (Surface::Issue, Role::Assignee) => C::IssueAssigneeComment,
            (Surface::Issue, Role::Collaborator) => C::IssueCollaboratorComment,
            (Surface::Issue, Role::Contributor) => C::IssueContributorComment,
            (Surface::Review, Role::Issuer) => C::ReviewIssuerComment,
            (Surface::Review, Role::Assignee) => C::ReviewAssigneeComment,
            (Surface::Review, Role::Collaborator) => C::ReviewCollaboratorComment,
            (Surface::Review, Role::Contributor) => C::ReviewContributorComment,
        }
    }

    /// Human-readable name, e.g. "Issue Issuer Comment".
    pub fn name(&self) -> String {
        let (surface, role, activity) = self.parts();
        format!("{} {} {}", surface, role, activity)
    }
}

impl fmt::Display for ContributionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
