//! Entity-tree aggregation
//!
//! Entities (wells, reservoirs, facilities, ...) form a directed acyclic
//! graph held in an arena. Each entity carries at most one [`Profile`] per
//! simulation case; each parent-child link carries the [`Fractions`] of the
//! child that flows to the parent.
//!
//! `aggregate(id, case)` returns:
//! - for an entity without children, a copy of its own profile for the case
//!   (empty when it has none);
//! - otherwise the sum of its children's aggregates, each scaled by its link
//!   fractions, on the union of their datelines, with uptimes rebuilt from
//!   the summed rates and potentials.
//!
//! Children are summed in the order they were linked.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

use crate::profile::Profile;
use crate::types::{EngineError, EngineResult, Fractions};

/// Arena index of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Field,
    Facility,
    Reservoir,
    Well,
    Group,
}

/// Directed edge from a parent to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChildLink {
    pub child: EntityId,
    pub fractions: Fractions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    profiles: BTreeMap<String, Profile>,
    children: Vec<ChildLink>,
}

impl Entity {
    pub fn profile(&self, case: &str) -> Option<&Profile> {
        self.profiles.get(case)
    }

    pub fn children(&self) -> &[ChildLink] {
        &self.children
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTree {
    entities: Vec<Entity>,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn add_entity(&mut self, name: impl Into<String>, kind: EntityKind) -> EntityId {
        self.entities.push(Entity {
            name: name.into(),
            kind,
            profiles: BTreeMap::new(),
            children: Vec::new(),
        });
        EntityId(self.entities.len() - 1)
    }

    pub fn entity(&self, id: EntityId) -> EngineResult<&Entity> {
        self.entities
            .get(id.0)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))
    }

    fn entity_mut(&mut self, id: EntityId) -> EngineResult<&mut Entity> {
        self.entities
            .get_mut(id.0)
            .ok_or_else(|| EngineError::UnknownEntity(id.to_string()))
    }

    /// First entity with `name`.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.entities.iter().position(|e| e.name == name).map(EntityId)
    }

    /// Entities that are nobody's child, in insertion order.
    pub fn roots(&self) -> Vec<EntityId> {
        let linked: BTreeSet<EntityId> = self
            .entities
            .iter()
            .flat_map(|e| e.children.iter().map(|l| l.child))
            .collect();
        (0..self.entities.len())
            .map(EntityId)
            .filter(|id| !linked.contains(id))
            .collect()
    }

    /// Every case name carried by any entity.
    pub fn cases(&self) -> BTreeSet<String> {
        self.entities
            .iter()
            .flat_map(|e| e.profiles.keys().cloned())
            .collect()
    }

    pub fn set_profile(&mut self, id: EntityId, case: impl Into<String>, profile: Profile) -> EngineResult<()> {
        self.entity_mut(id)?.profiles.insert(case.into(), profile);
        Ok(())
    }

    pub fn remove_profile(&mut self, id: EntityId, case: &str) -> EngineResult<Option<Profile>> {
        Ok(self.entity_mut(id)?.profiles.remove(case))
    }

    /// Attach `child` under `parent`. Rejects self-links, duplicate links,
    /// links that would close a cycle and invalid fractions.
    pub fn link(&mut self, parent: EntityId, child: EntityId, fractions: Fractions) -> EngineResult<()> {
        self.entity(parent)?;
        self.entity(child)?;
        if !fractions.is_valid() {
            return Err(EngineError::limit(format!(
                "link fractions must be finite and non-negative, got {:?}",
                fractions
            )));
        }
        if self.entities[parent.0].children.iter().any(|l| l.child == child) {
            return Err(EngineError::limit(format!("{} is already a child of {}", child, parent)));
        }
        if self.reaches(child, parent) {
            return Err(EngineError::limit(format!(
                "linking {} under {} would create a cycle",
                self.entities[child.0].name, self.entities[parent.0].name
            )));
        }
        self.entities[parent.0].children.push(ChildLink { child, fractions });
        Ok(())
    }

    /// Whether `to` is `from` or one of its descendants.
    fn reaches(&self, from: EntityId, to: EntityId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.entities[id.0].children.iter().map(|l| l.child));
            }
        }
        false
    }

    /// Aggregate profile of `id` for `case`.
    pub fn aggregate(&self, id: EntityId, case: &str) -> EngineResult<Profile> {
        let entity = self.entity(id)?;
        let profile = self.aggregate_inner(id, case)?;
        info!(
            entity = %entity.name,
            case = case,
            children = entity.children.len(),
            points = profile.len(),
            "Aggregation complete"
        );
        Ok(profile)
    }

    fn aggregate_inner(&self, id: EntityId, case: &str) -> EngineResult<Profile> {
        let entity = &self.entities[id.0];
        if entity.children.is_empty() {
            return Ok(entity.profile(case).cloned().unwrap_or_default());
        }

        let mut parts = Vec::with_capacity(entity.children.len());
        let mut fractions = Vec::with_capacity(entity.children.len());
        for link in &entity.children {
            let part = self.aggregate_inner(link.child, case)?;
            if part.is_empty() {
                continue;
            }
            parts.push(part);
            fractions.push(link.fractions);
        }
        if parts.is_empty() {
            return Ok(Profile::new());
        }

        let refs: Vec<&Profile> = parts.iter().collect();
        let total = Profile::merged(&refs, Some(&fractions))?;
        debug!(entity = %entity.name, contributors = refs.len(), "Summed children");
        Ok(total)
    }
}
