//! Transitive group membership.
//!
//! Groups nest inside groups through subgroup edges, and the raw graph may
//! loop back on itself. Resolution is a depth-first walk over an explicit
//! frame stack with a per-group [`VisitState`]:
//!
//! - a group is `InProgress` from the moment it is entered until all of its
//!   children have been handled;
//! - reaching a child that is `InProgress` means the walk closed a cycle, so
//!   that edge contributes nothing;
//! - a finished group is `Done` and its set is reused for every later parent.
//!
//! Finished sets are memoized as they are, so a set truncated by a cycle is
//! also what every later parent receives. The result therefore depends on
//! where the walk entered the cycle, both for groups on the cycle and for
//! groups outside it that reach it. With `a -> b`, `b -> a` and `c -> b`,
//! `b` finishes without `a`'s members and `c` inherits that.
//!
//! Groups are resolved in sorted id order, which makes the outcome the same
//! on every run over the same edges.

use crate::{models::*, store::RelationStore};
use ahash::AHashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub type UserSet = BTreeSet<String>;

static NOT_VISITED: VisitState = VisitState::NotVisited;

/// Which subgroup edges and direct edges a closure is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipFamily {
    Member,
    Manager,
}

impl MembershipFamily {
    pub fn direct_kind(&self) -> EdgeKind {
        match self {
            Self::Member => EdgeKind::GroupMember,
            Self::Manager => EdgeKind::GroupManager,
        }
    }

    pub fn subgroup_kind(&self) -> EdgeKind {
        match self {
            Self::Member => EdgeKind::GroupSubgroupMember,
            Self::Manager => EdgeKind::GroupSubgroupManager,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitState {
    NotVisited,
    InProgress,
    Done(UserSet),
}

/// Direct subjects of one family, keyed by group
#[derive(Debug, Clone, Default)]
pub struct DirectMembers {
    groups: AHashMap<String, UserSet>,
}

impl DirectMembers {
    pub fn from_store(store: &RelationStore, family: MembershipFamily) -> Self {
        let mut direct = Self::default();
        for edge in store.edges_of(family.direct_kind()) {
            direct.insert(&edge.object, &edge.subject);
        }
        direct
    }

    pub fn insert(&mut self, group: &str, user: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(user.to_string());
    }

    pub fn get(&self, group: &str) -> Option<&UserSet> {
        self.groups.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &String> + '_ {
        self.groups.keys()
    }
}

/// Effective (transitive) subjects per group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupClosure {
    sets: BTreeMap<String, UserSet>,
}

impl GroupClosure {
    pub fn get(&self, group: &str) -> Option<&UserSet> {
        self.sets.get(group)
    }

    pub fn contains(&self, group: &str, user: &str) -> bool {
        self.sets.get(group).is_some_and(|set| set.contains(user))
    }

    /// Resolved groups in id order
    pub fn groups(&self) -> impl Iterator<Item = &String> + '_ {
        self.sets.keys()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Members to credit for a group: its effective set when that is non-empty,
/// otherwise its direct subjects, otherwise nobody.
pub fn resolve_members<'a>(
    group: &str,
    closure: &'a GroupClosure,
    direct: &'a DirectMembers,
) -> Option<&'a UserSet> {
    closure
        .get(group)
        .filter(|set| !set.is_empty())
        .or_else(|| direct.get(group))
}

struct Frame {
    group: String,
    next_child: usize,
}

/// Computes a [`GroupClosure`] for one membership family
pub struct ClosureResolver<'a> {
    direct: &'a DirectMembers,
    /// parent -> children, children in first-seen order
    children: AHashMap<String, Vec<String>>,
    state: AHashMap<String, VisitState>,
}

impl<'a> ClosureResolver<'a> {
    pub fn new(direct: &'a DirectMembers) -> Self {
        Self {
            direct,
            children: AHashMap::new(),
            state: AHashMap::new(),
        }
    }

    /// Build a resolver from the store's subgroup edges of `family`
    pub fn from_store(
        store: &RelationStore,
        direct: &'a DirectMembers,
        family: MembershipFamily,
    ) -> Self {
        let mut resolver = Self::new(direct);
        for edge in store.edges_of(family.subgroup_kind()) {
            // subject is the nested (child) group, object the containing one
            resolver.add_subgroup(&edge.object, &edge.subject);
        }
        resolver
    }

    pub fn add_subgroup(&mut self, parent: &str, child: &str) {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
    }

    pub fn state_of(&self, group: &str) -> &VisitState {
        self.state.get(group).unwrap_or(&NOT_VISITED)
    }

    /// Resolve every group known from direct or subgroup edges
    pub fn resolve(mut self) -> GroupClosure {
        let mut groups: BTreeSet<String> = self.direct.groups().cloned().collect();
        for (parent, children) in &self.children {
            groups.insert(parent.clone());
            groups.extend(children.iter().cloned());
        }

        for group in &groups {
            self.resolve_group(group);
        }

        let sets: BTreeMap<String, UserSet> = self
            .state
            .into_iter()
            .filter_map(|(group, state)| match state {
                VisitState::Done(set) => Some((group, set)),
                _ => None,
            })
            .collect();

        debug!("Resolved closure for {} groups", sets.len());
        GroupClosure { sets }
    }

    /// Resolve one group (and everything it reaches), returning its effective set
    pub fn resolve_group(&mut self, root: &str) -> UserSet {
        if let VisitState::Done(set) = self.state_of(root) {
            return set.clone();
        }

        self.enter(root);
        let mut stack = vec![Frame {
            group: root.to_string(),
            next_child: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let child = self
                .children
                .get(&frame.group)
                .and_then(|children| children.get(frame.next_child))
                .cloned();

            match child {
                Some(child) => {
                    frame.next_child += 1;
                    if matches!(self.state_of(&child), VisitState::NotVisited) {
                        self.enter(&child);
                        stack.push(Frame {
                            group: child,
                            next_child: 0,
                        });
                    }
                }
                None => {
                    if let Some(done) = stack.pop() {
                        self.finish(&done.group);
                    }
                }
            }
        }

        match self.state_of(root) {
            VisitState::Done(set) => set.clone(),
            _ => UserSet::new(),
        }
    }

    fn enter(&mut self, group: &str) {
        self.state.insert(group.to_string(), VisitState::InProgress);
    }

    /// Union the direct subjects with every child that has finished.
    /// Children still in progress are ancestors on the current path.
    fn finish(&mut self, group: &str) {
        let mut set = self.direct.get(group).cloned().unwrap_or_default();

        if let Some(children) = self.children.get(group) {
            for child in children {
                if let Some(VisitState::Done(child_set)) = self.state.get(child) {
                    set.extend(child_set.iter().cloned());
                }
            }
        }

        self.state.insert(group.to_string(), VisitState::Done(set));
    }
}

/// Member and manager closures for one store
#[derive(Debug, Clone, Default)]
pub struct GroupClosures {
    pub direct_members: DirectMembers,
    pub direct_managers: DirectMembers,
    pub members: GroupClosure,
    pub managers: GroupClosure,
}

impl GroupClosures {
    pub fn resolve(store: &RelationStore) -> Self {
        let direct_members = DirectMembers::from_store(store, MembershipFamily::Member);
        let direct_managers = DirectMembers::from_store(store, MembershipFamily::Manager);

        let members =
            ClosureResolver::from_store(store, &direct_members, MembershipFamily::Member).resolve();
        let managers =
            ClosureResolver::from_store(store, &direct_managers, MembershipFamily::Manager).resolve();

        Self {
            direct_members,
            direct_managers,
            members,
            managers,
        }
    }

    /// Users credited with managing through `group`.
    ///
    /// Falls back to the group's direct members when it has no managers.
    pub fn managers_of(&self, group: &str) -> Option<&UserSet> {
        resolve_members(group, &self.managers, &self.direct_managers)
            .filter(|set| !set.is_empty())
            .or_else(|| self.direct_members.get(group))
    }

    pub fn members_of(&self, group: &str) -> Option<&UserSet> {
        resolve_members(group, &self.members, &self.direct_members)
    }
}
