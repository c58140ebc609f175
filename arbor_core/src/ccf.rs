//! Common-cause failure groups.
//!
//! A group ties an ordered set of basic-event members to a dependency
//! model, a failure distribution, and leveled factors.
//! Applying the group expands the members into common-cause event
//! structures; the numeric factor algebra stays with the analysis engines.

use std::str::FromStr;

use itertools::Itertools;

use crate::element::{Element, ScopedElement};
use crate::error::Error;
use crate::event::{BasicEvent, BasicEventId, EventId, Formula, Gate, Operator};
use crate::expression::ExpressionId;
use crate::model::Model;

/// An indexing object for CCF groups in a model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CcfGroupId(pub(crate) u32);

impl CcfGroupId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Supported common-cause dependency models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcfModelKind {
    BetaFactor,
    Mgl,
    AlphaFactor,
    PhiFactor,
}

impl CcfModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CcfModelKind::BetaFactor => "beta-factor",
            CcfModelKind::Mgl => "MGL",
            CcfModelKind::AlphaFactor => "alpha-factor",
            CcfModelKind::PhiFactor => "phi-factor",
        }
    }

    /// The smallest factor level meaningful for the model.
    pub fn min_level(self) -> u32 {
        match self {
            CcfModelKind::BetaFactor | CcfModelKind::Mgl => 2,
            CcfModelKind::AlphaFactor | CcfModelKind::PhiFactor => 1,
        }
    }
}

impl FromStr for CcfModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "beta-factor" => Ok(CcfModelKind::BetaFactor),
            "MGL" => Ok(CcfModelKind::Mgl),
            "alpha-factor" => Ok(CcfModelKind::AlphaFactor),
            "phi-factor" => Ok(CcfModelKind::PhiFactor),
            _ => Err(Error::Validation(format!("invalid CCF model `{s}`"))),
        }
    }
}

/// A leveled factor of a CCF group.
#[derive(Debug, Clone, Copy)]
pub struct CcfFactor {
    pub level: u32,
    pub expression: ExpressionId,
}

/// A set of basic events failing together under a dependency model.
#[derive(Debug, Clone)]
pub struct CcfGroup {
    scoped: ScopedElement,
    kind: CcfModelKind,
    members: Vec<BasicEventId>,
    member_names: Vec<String>,
    distribution: Option<ExpressionId>,
    factors: Vec<CcfFactor>,
}

impl CcfGroup {
    pub fn new(scoped: ScopedElement, kind: CcfModelKind) -> Self {
        Self {
            scoped,
            kind,
            members: Vec::new(),
            member_names: Vec::new(),
            distribution: None,
            factors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.scoped.name()
    }

    pub fn scoped(&self) -> &ScopedElement {
        &self.scoped
    }

    pub fn kind(&self) -> CcfModelKind {
        self.kind
    }

    pub fn members(&self) -> &[BasicEventId] {
        &self.members
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.member_names.iter().any(|n| n == name)
    }

    /// Appends a member.
    /// Member names are unique within the group.
    pub fn add_member(&mut self, member: BasicEventId, name: &str) -> Result<(), Error> {
        if self.has_member(name) {
            return Err(Error::DuplicateArgument(format!(
                "duplicate member {name} in CCF group {}",
                self.name()
            )));
        }
        self.members.push(member);
        self.member_names.push(name.to_owned());
        Ok(())
    }

    pub fn distribution(&self) -> Option<ExpressionId> {
        self.distribution
    }

    pub fn set_distribution(&mut self, distribution: ExpressionId) {
        self.distribution = Some(distribution);
    }

    pub fn factors(&self) -> &[CcfFactor] {
        &self.factors
    }

    /// Appends a factor.
    /// A missing level defaults to one past the previous factor's level,
    /// starting at the model's minimum level;
    /// consistency is checked by [`CcfGroup::validate`].
    pub fn add_factor(&mut self, expression: ExpressionId, level: Option<u32>) {
        let level = level.unwrap_or_else(|| {
            self.factors
                .last()
                .map_or(self.kind.min_level(), |f| f.level + 1)
        });
        self.factors.push(CcfFactor { level, expression });
    }

    /// The largest member combination size the group expands to.
    pub fn max_level(&self) -> u32 {
        match self.kind {
            // Beta factor splits failures into independent and total only.
            CcfModelKind::BetaFactor => self.members.len() as u32,
            _ => self
                .factors
                .last()
                .map_or(self.kind.min_level(), |f| f.level),
        }
    }

    /// Structural consistency of members, distribution, and factors.
    pub fn validate(&self) -> Result<(), Error> {
        let name = self.name();
        if self.members.len() < 2 {
            return Err(Error::Validation(format!(
                "CCF group {name} must have at least two members"
            )));
        }
        if self.distribution.is_none() {
            return Err(Error::Validation(format!(
                "CCF group {name} has no distribution"
            )));
        }
        if self.factors.is_empty() {
            return Err(Error::Validation(format!(
                "CCF group {name} has no factors"
            )));
        }
        if self.kind == CcfModelKind::BetaFactor && self.factors.len() > 1 {
            return Err(Error::Validation(format!(
                "beta-factor CCF group {name} takes a single factor, got {}",
                self.factors.len()
            )));
        }
        let group_size = self.members.len() as u32;
        let mut expected = self.kind.min_level();
        for factor in &self.factors {
            if factor.level != expected {
                return Err(Error::Validation(format!(
                    "CCF group {name}: expected factor level {expected}, got {}",
                    factor.level
                )));
            }
            if factor.level > group_size {
                return Err(Error::Validation(format!(
                    "CCF group {name}: factor level {} exceeds the group size {group_size}",
                    factor.level
                )));
            }
            expected += 1;
        }
        Ok(())
    }
}

impl Model {
    /// Expands the members of every CCF group
    /// into common-cause event structures.
    ///
    /// One CCF event is materialized per member combination up to the
    /// group's maximum level, and each member receives a substitute
    /// OR gate over the combinations that contain it.
    /// Attaching factor-derived probabilities to the materialized events
    /// is left to the analysis engines.
    pub fn apply_ccf_models(&mut self) -> Result<(), Error> {
        for index in 0..self.ccf_group_count() {
            self.apply_ccf_model(CcfGroupId(index as u32))?;
        }
        Ok(())
    }

    fn apply_ccf_model(&mut self, group_id: CcfGroupId) -> Result<(), Error> {
        let group = self.ccf_group(group_id);
        let members = group.members().to_vec();
        let max_level = (group.max_level() as usize).min(members.len());
        let base_path = group.scoped().base_path().to_owned();
        let role = group.scoped().role();
        let names: Vec<String> = members
            .iter()
            .map(|member| self.basic_event(*member).name().to_owned())
            .collect();

        let mut combinations: Vec<(Vec<usize>, BasicEventId)> = Vec::new();
        for size in 1..=max_level {
            for combination in (0..members.len()).combinations(size) {
                let display = format!(
                    "[{}]",
                    combination.iter().map(|i| names[*i].as_str()).join(" ")
                );
                let scoped =
                    ScopedElement::new(Element::new(display), base_path.clone(), role);
                let selected = combination.iter().map(|i| members[*i]).collect();
                let event = self.add_ccf_event(BasicEvent::new_ccf(scoped, group_id, selected));
                combinations.push((combination, event));
            }
        }

        for (index, member) in members.iter().enumerate() {
            let containing: Vec<BasicEventId> = combinations
                .iter()
                .filter(|(combination, _)| combination.contains(&index))
                .map(|(_, event)| *event)
                .collect();
            let operator = if containing.len() > 1 {
                Operator::Or
            } else {
                Operator::Null
            };
            let mut formula = Formula::new(operator);
            for event in containing {
                formula.add_event(EventId::Basic(event), &names[index])?;
            }
            let scoped = ScopedElement::new(
                Element::new(format!("{}.ccf", names[index])),
                base_path.clone(),
                role,
            );
            let mut gate = Gate::new(scoped);
            gate.set_formula(formula);
            let gate_id = self.add_ccf_gate(gate);
            self.basic_event_mut(*member).set_ccf_gate(gate_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Role;

    fn group(kind: CcfModelKind, members: u32, factors: u32) -> CcfGroup {
        let scoped = ScopedElement::new(Element::new("pumps"), "", Role::Public);
        let mut group = CcfGroup::new(scoped, kind);
        for i in 0..members {
            group
                .add_member(BasicEventId(i), &format!("pump-{i}"))
                .unwrap();
        }
        group.set_distribution(ExpressionId(0));
        for i in 0..factors {
            group.add_factor(ExpressionId(i + 1), None);
        }
        group
    }

    #[test]
    fn beta_factor_takes_a_single_factor() {
        assert!(group(CcfModelKind::BetaFactor, 3, 1).validate().is_ok());
        let err = group(CcfModelKind::BetaFactor, 3, 4).validate().unwrap_err();
        assert!(err.to_string().contains("single factor"));
    }

    #[test]
    fn factor_levels_are_sequential_and_bounded() {
        assert!(group(CcfModelKind::Mgl, 4, 3).validate().is_ok());

        let mut skipped = group(CcfModelKind::AlphaFactor, 3, 0);
        skipped.add_factor(ExpressionId(1), Some(2));
        assert!(skipped.validate().is_err());

        // Defaulted levels 2..=5 exceed a group of 4.
        let oversized = group(CcfModelKind::Mgl, 4, 4);
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn duplicate_member() {
        let mut group = group(CcfModelKind::Mgl, 2, 1);
        let err = group.add_member(BasicEventId(9), "pump-0").unwrap_err();
        assert!(matches!(err, Error::DuplicateArgument(_)));
    }

    #[test]
    fn missing_distribution() {
        let scoped = ScopedElement::new(Element::new("pumps"), "", Role::Public);
        let mut group = CcfGroup::new(scoped, CcfModelKind::Mgl);
        group.add_member(BasicEventId(0), "a").unwrap();
        group.add_member(BasicEventId(1), "b").unwrap();
        group.add_factor(ExpressionId(0), None);
        assert!(group.validate().is_err());
    }
}
