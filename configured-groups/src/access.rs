// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;

use crate::query::PolicyQuery;
use crate::store::GroupRecord;

/// Identity acting on groups, for example a logged-in member of the admin area.
pub trait Actor {
    /// Return `true` if the actor is a direct member of the given group.
    fn is_member_of(&self, group: &GroupRecord) -> bool;

    /// Return `true` if the actor may use the group administration area.
    fn has_admin_area_access(&self) -> bool;
}

/// Outcome of an access check.
///
/// `Abstain` is not a denial: the caller falls back to its own default rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
    Abstain,
}

impl AccessDecision {
    fn from_bool(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }

    /// Resolve the decision, using `default` when no opinion was given.
    pub fn or(self, default: bool) -> bool {
        match self {
            Self::Allow => true,
            Self::Deny => false,
            Self::Abstain => default,
        }
    }

    pub fn is_abstain(&self) -> bool {
        matches!(self, Self::Abstain)
    }
}

impl Display for AccessDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccessDecision::Allow => "allow",
            AccessDecision::Deny => "deny",
            AccessDecision::Abstain => "abstain",
        };

        write!(f, "{}", s)
    }
}

/// Create, view and delete decisions for groups, derived from the group configuration.
#[derive(Clone, Copy, Debug)]
pub struct AccessGate<'q, 'a> {
    query: &'q PolicyQuery<'a>,
}

impl<'q, 'a> AccessGate<'q, 'a> {
    pub fn new(query: &'q PolicyQuery<'a>) -> Self {
        Self { query }
    }

    /// New groups can not be created when groups are managed via configuration only, otherwise
    /// the actor needs access to the admin area.
    pub fn can_create<A: Actor>(&self, actor: Option<&A>) -> AccessDecision {
        if self.query.groups_only_mode() {
            return AccessDecision::Deny;
        }
        AccessDecision::from_bool(actor.is_some_and(|actor| actor.has_admin_area_access()))
    }

    /// Hidden configured groups are only visible to their own members.
    pub fn can_view<A: Actor>(&self, group: &GroupRecord, actor: Option<&A>) -> AccessDecision {
        if self.query.is_hidden(&group.code) {
            return AccessDecision::from_bool(actor.is_some_and(|actor| actor.is_member_of(group)));
        }
        AccessDecision::Abstain
    }

    /// Configured groups can never be deleted by hand.
    pub fn can_delete(&self, group: &GroupRecord) -> AccessDecision {
        if self.query.is_configured(&group.code) {
            return AccessDecision::Deny;
        }
        AccessDecision::Abstain
    }
}
