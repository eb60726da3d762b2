//! Vanity filters.
//!
//! A [`FilterSpec`] holds one prefix list per trait slot. Prefixes within a
//! slot are alternatives; every slot must be satisfied. An empty slot accepts
//! anything.

use crate::models::{Candidate, Traits};
use std::fmt;

/// The seven filterable trait categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitSlot {
    Hat,
    Glasses,
    Mouth,
    Clothing,
    Footwear,
    Tail,
    Misc,
}

impl TraitSlot {
    pub const ALL: [TraitSlot; 7] = [
        TraitSlot::Hat,
        TraitSlot::Glasses,
        TraitSlot::Mouth,
        TraitSlot::Clothing,
        TraitSlot::Footwear,
        TraitSlot::Tail,
        TraitSlot::Misc,
    ];

    /// The trait value this slot filters on.
    pub fn value<'a>(&self, traits: &'a Traits) -> &'a str {
        match self {
            TraitSlot::Hat => &traits.hat,
            TraitSlot::Glasses => &traits.glasses,
            TraitSlot::Mouth => &traits.mouth,
            TraitSlot::Clothing => &traits.shirt_pants,
            TraitSlot::Footwear => &traits.shoes,
            TraitSlot::Tail => &traits.tail,
            TraitSlot::Misc => &traits.misc,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraitSlot::Hat => "hat",
            TraitSlot::Glasses => "glasses",
            TraitSlot::Mouth => "mouth",
            TraitSlot::Clothing => "clothing",
            TraitSlot::Footwear => "footwear",
            TraitSlot::Tail => "tail",
            TraitSlot::Misc => "misc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub hat: Vec<String>,
    pub glasses: Vec<String>,
    pub mouth: Vec<String>,
    pub clothing: Vec<String>,
    pub footwear: Vec<String>,
    pub tail: Vec<String>,
    pub misc: Vec<String>,
}

impl FilterSpec {
    /// Builder used mostly by tests and the config layer.
    pub fn with<I, S>(mut self, slot: TraitSlot, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slot_mut(slot)
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn slot(&self, slot: TraitSlot) -> &[String] {
        match slot {
            TraitSlot::Hat => &self.hat,
            TraitSlot::Glasses => &self.glasses,
            TraitSlot::Mouth => &self.mouth,
            TraitSlot::Clothing => &self.clothing,
            TraitSlot::Footwear => &self.footwear,
            TraitSlot::Tail => &self.tail,
            TraitSlot::Misc => &self.misc,
        }
    }

    fn slot_mut(&mut self, slot: TraitSlot) -> &mut Vec<String> {
        match slot {
            TraitSlot::Hat => &mut self.hat,
            TraitSlot::Glasses => &mut self.glasses,
            TraitSlot::Mouth => &mut self.mouth,
            TraitSlot::Clothing => &mut self.clothing,
            TraitSlot::Footwear => &mut self.footwear,
            TraitSlot::Tail => &mut self.tail,
            TraitSlot::Misc => &mut self.misc,
        }
    }

    /// True when no slot constrains anything.
    pub fn is_empty(&self) -> bool {
        TraitSlot::ALL.iter().all(|slot| self.slot(*slot).is_empty())
    }

    /// Case-sensitive prefix match across all slots.
    pub fn matches(&self, traits: &Traits) -> bool {
        TraitSlot::ALL
            .iter()
            .all(|slot| matches_any(self.slot(*slot), slot.value(traits)))
    }

    /// Returns a copy with each slot reduced to its shortest covering prefixes.
    pub fn normalized(&self) -> Self {
        let mut spec = self.clone();
        for slot in TraitSlot::ALL {
            let reduced = normalize_prefixes(spec.slot(slot));
            *spec.slot_mut(slot) = reduced;
        }
        spec
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "accept-all");
        }
        let mut first = true;
        for slot in TraitSlot::ALL {
            let prefixes = self.slot(slot);
            if prefixes.is_empty() {
                continue;
            }
            if !first {
                write!(f, " AND ")?;
            }
            first = false;
            write!(f, "{}=[{}]", slot.name(), prefixes.join("|"))?;
        }
        Ok(())
    }
}

pub fn matches(candidate: &Candidate, spec: &FilterSpec) -> bool {
    spec.matches(&candidate.traits)
}

pub fn normalize(spec: &FilterSpec) -> FilterSpec {
    spec.normalized()
}

fn matches_any(prefixes: &[String], value: &str) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|prefix| value.starts_with(prefix.as_str()))
}

/// Sorts, then drops every entry that starts with the last retained entry.
fn normalize_prefixes(prefixes: &[String]) -> Vec<String> {
    let mut sorted = prefixes.to_vec();
    sorted.sort();

    let mut retained: Vec<String> = Vec::with_capacity(sorted.len());
    for prefix in sorted {
        if let Some(last) = retained.last() {
            if prefix.starts_with(last.as_str()) {
                continue;
            }
        }
        retained.push(prefix);
    }
    retained
}
