//! Role and contribution classification.
//!
//! Participants are partitioned into Issuer / Assignees / Collaborators /
//! Contributors with a fixed precedence (issuer first, contributors last), so a
//! person holds exactly one role. Comments are then bucketed by the class their
//! author belongs to on the requested surface.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::class::ContributionClass;
use crate::error::{ContributionError, Result};
use crate::types::{Activity, Comment, Issue, Participant, Role, Surface, UserId};

/// Participants partitioned into mutually exclusive roles.
#[derive(Debug, Clone)]
pub struct ClassifiedParticipants {
    issuer: Participant,
    assignees: Vec<Participant>,
    collaborators: Vec<Participant>,
    contributors: Vec<Participant>,
}

impl ClassifiedParticipants {
    #[cfg(test)]
    fn from_parts(
        issuer: Participant,
        assignees: Vec<Participant>,
        collaborators: Vec<Participant>,
        contributors: Vec<Participant>,
    ) -> Self {
        Self {
            issuer,
            assignees,
            collaborators,
            contributors,
        }
    }

    pub fn issuer(&self) -> &Participant {
        &self.issuer
    }

    pub fn assignees(&self) -> &[Participant] {
        &self.assignees
    }

    pub fn collaborators(&self) -> &[Participant] {
        &self.collaborators
    }

    pub fn contributors(&self) -> &[Participant] {
        &self.contributors
    }

    /// Participants holding a role.
    pub fn with_role(&self, role: Role) -> &[Participant] {
        match role {
            Role::Issuer => std::slice::from_ref(&self.issuer),
            Role::Assignee => &self.assignees,
            Role::Collaborator => &self.collaborators,
            Role::Contributor => &self.contributors,
        }
    }

    /// Members of a contribution class. Single-member classes yield one entry.
    pub fn members(&self, class: ContributionClass) -> &[Participant] {
        self.with_role(class.role())
    }

    /// Verify that no user holds two roles. A collision is reported with the
    /// comment classes of `surface`.
    pub fn ensure_disjoint(&self, surface: Surface) -> Result<()> {
        let mut seen: BTreeMap<UserId, Role> = BTreeMap::new();
        for role in [Role::Issuer, Role::Assignee, Role::Collaborator, Role::Contributor] {
            let mut in_role = HashSet::new();
            for participant in self.with_role(role) {
                if !in_role.insert(participant.id) {
                    continue;
                }
                if let Some(first) = seen.insert(participant.id, role) {
                    return Err(ContributionError::InvariantViolation {
                        user_id: participant.id,
                        first: ContributionClass::comment(surface, first),
                        second: ContributionClass::comment(surface, role),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Partition the participants of an issue into roles.
///
/// Issuer is the issue author. Assignees come from the issue (nulls dropped).
/// Collaborators are the declared collaborators who hold no higher role.
/// Contributors are the remaining human comment authors, deduplicated by id.
pub fn classify_participants(
    issue: &Issue,
    comments: &[Comment],
    collaborators: &[Participant],
) -> ClassifiedParticipants {
    let issuer = issue.user.clone();

    let mut taken: HashSet<UserId> = HashSet::from([issuer.id]);

    let assignees: Vec<Participant> = issue
        .assignee_list()
        .into_iter()
        .filter(|assignee| taken.insert(assignee.id))
        .collect();

    let collaborators: Vec<Participant> = collaborators
        .iter()
        .filter(|collaborator| taken.insert(collaborator.id))
        .cloned()
        .collect();

    let contributors: Vec<Participant> = comments
        .iter()
        .map(|comment| &comment.user)
        .filter(|user| user.is_human())
        .filter(|user| taken.insert(user.id))
        .cloned()
        .collect();

    debug!(
        issuer = %issuer.login,
        assignees = assignees.len(),
        collaborators = collaborators.len(),
        contributors = contributors.len(),
        "Classified participants"
    );

    ClassifiedParticipants {
        issuer,
        assignees,
        collaborators,
        contributors,
    }
}

/// Comments bucketed by contribution class for one surface.
#[derive(Debug, Clone)]
pub struct ClassifiedComments {
    surface: Surface,
    buckets: BTreeMap<ContributionClass, Vec<Comment>>,
}

impl ClassifiedComments {
    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Comments in a class; empty for classes on the other surface.
    pub fn get(&self, class: ContributionClass) -> &[Comment] {
        self.buckets.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over every class of the surface with its comments.
    pub fn iter(&self) -> impl Iterator<Item = (ContributionClass, &[Comment])> {
        self.buckets
            .iter()
            .map(|(class, comments)| (*class, comments.as_slice()))
    }
}

/// Bucket comments by the class their author belongs to on `surface`.
///
/// Only comment classes receive comments; approvals, rejections and code are
/// separate activities. A comment whose author holds no role (a bot, a deleted
/// account) lands in no bucket.
pub fn classify_comments(
    participants: &ClassifiedParticipants,
    comments: &[Comment],
    surface: Surface,
) -> ClassifiedComments {
    let buckets = ContributionClass::on_surface(surface)
        .filter(|class| class.activity() == Activity::Comment)
        .map(|class| {
            let members = participants.members(class);
            let matching = comments
                .iter()
                .filter(|comment| members.iter().any(|m| m.id == comment.user.id))
                .cloned()
                .collect();
            (class, matching)
        })
        .collect();

    ClassifiedComments { surface, buckets }
}
