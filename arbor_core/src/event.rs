//! Events of fault trees: basic events, house events, and gates,
//! together with the Boolean formulas connecting them.

use crate::ccf::CcfGroupId;
use crate::element::ScopedElement;
use crate::error::Error;
use crate::expression::ExpressionId;

/// An indexing object for basic events in a model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BasicEventId(pub(crate) u32);

impl BasicEventId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An indexing object for house events in a model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct HouseEventId(pub(crate) u32);

impl HouseEventId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An indexing object for gates in a model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct GateId(pub(crate) u32);

impl GateId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A handle to an event of any kind.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum EventId {
    Basic(BasicEventId),
    House(HouseEventId),
    Gate(GateId),
}

/// The lowest-level failure event,
/// optionally carrying a probability expression.
#[derive(Debug, Clone)]
pub struct BasicEvent {
    scoped: ScopedElement,
    expression: Option<ExpressionId>,
    /// The substitute gate installed when a CCF group expands this member.
    ccf_gate: Option<GateId>,
    /// For materialized CCF events: the originating group
    /// and the member combination the event represents.
    ccf_origin: Option<(CcfGroupId, Vec<BasicEventId>)>,
}

impl BasicEvent {
    pub fn new(scoped: ScopedElement) -> Self {
        Self {
            scoped,
            expression: None,
            ccf_gate: None,
            ccf_origin: None,
        }
    }

    pub(crate) fn new_ccf(
        scoped: ScopedElement,
        group: CcfGroupId,
        members: Vec<BasicEventId>,
    ) -> Self {
        Self {
            scoped,
            expression: None,
            ccf_gate: None,
            ccf_origin: Some((group, members)),
        }
    }

    pub fn name(&self) -> &str {
        self.scoped.name()
    }

    pub fn scoped(&self) -> &ScopedElement {
        &self.scoped
    }

    pub fn base_path(&self) -> &str {
        self.scoped.base_path()
    }

    pub fn expression(&self) -> Option<ExpressionId> {
        self.expression
    }

    pub fn set_expression(&mut self, expression: ExpressionId) {
        self.expression = Some(expression);
    }

    pub fn ccf_gate(&self) -> Option<GateId> {
        self.ccf_gate
    }

    pub(crate) fn set_ccf_gate(&mut self, gate: GateId) {
        self.ccf_gate = Some(gate);
    }

    /// The CCF group and member combination behind a materialized CCF event.
    pub fn ccf_origin(&self) -> Option<(CcfGroupId, &[BasicEventId])> {
        self.ccf_origin
            .as_ref()
            .map(|(group, members)| (*group, members.as_slice()))
    }
}

/// An event with a fixed Boolean state, `false` by default.
#[derive(Debug, Clone)]
pub struct HouseEvent {
    scoped: ScopedElement,
    state: bool,
}

impl HouseEvent {
    pub fn new(scoped: ScopedElement) -> Self {
        Self {
            scoped,
            state: false,
        }
    }

    pub fn name(&self) -> &str {
        self.scoped.name()
    }

    pub fn scoped(&self) -> &ScopedElement {
        &self.scoped
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn set_state(&mut self, state: bool) {
        self.state = state;
    }
}

/// Boolean connectives for formulas.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    /// k-of-n combination, requiring a vote number.
    Atleast,
    Xor,
    Not,
    Nand,
    Nor,
    /// Single-argument pass-through.
    Null,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Atleast => "atleast",
            Operator::Xor => "xor",
            Operator::Not => "not",
            Operator::Nand => "nand",
            Operator::Nor => "nor",
            Operator::Null => "null",
        }
    }
}

/// An argument of a formula: an event reference or a nested formula.
///
/// Nested formulas are anonymous and strictly tree-shaped,
/// so they are owned inline; only gate references can form cycles.
#[derive(Debug, Clone)]
pub enum FormulaArg {
    Event(EventId),
    Formula(Box<Formula>),
}

/// A Boolean formula over events and nested formulas.
#[derive(Debug, Clone)]
pub struct Formula {
    operator: Operator,
    vote_number: Option<u32>,
    args: Vec<FormulaArg>,
}

impl Formula {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            vote_number: None,
            args: Vec::new(),
        }
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn vote_number(&self) -> Option<u32> {
        self.vote_number
    }

    pub fn set_vote_number(&mut self, k: u32) {
        self.vote_number = Some(k);
    }

    pub fn args(&self) -> &[FormulaArg] {
        &self.args
    }

    /// Adds an event argument.
    /// The same event may appear only once per formula;
    /// `name` identifies the event in the duplicate report.
    pub fn add_event(&mut self, event: EventId, name: &str) -> Result<(), Error> {
        if self
            .args
            .iter()
            .any(|arg| matches!(arg, FormulaArg::Event(e) if *e == event))
        {
            return Err(Error::DuplicateArgument(format!(
                "duplicate argument {name} in a formula"
            )));
        }
        self.args.push(FormulaArg::Event(event));
        Ok(())
    }

    pub fn add_formula(&mut self, formula: Formula) {
        self.args.push(FormulaArg::Formula(Box::new(formula)));
    }

    /// Operator-specific arity and vote-number checks.
    pub fn validate(&self) -> Result<(), Error> {
        let n = self.args.len();
        match self.operator {
            Operator::Null | Operator::Not => {
                if n != 1 {
                    return Err(Error::Validation(format!(
                        "`{}` formula takes a single argument, got {n}",
                        self.operator.as_str()
                    )));
                }
            }
            Operator::Xor => {
                if n != 2 {
                    return Err(Error::Validation(format!(
                        "`xor` formula takes exactly two arguments, got {n}"
                    )));
                }
            }
            Operator::And | Operator::Or | Operator::Nand | Operator::Nor => {
                if n < 2 {
                    return Err(Error::Validation(format!(
                        "`{}` formula takes at least two arguments, got {n}",
                        self.operator.as_str()
                    )));
                }
            }
            Operator::Atleast => {
                let k = self.vote_number.ok_or_else(|| {
                    Error::Validation("`atleast` formula requires a vote number".to_owned())
                })?;
                if n < 2 {
                    return Err(Error::Validation(format!(
                        "`atleast` formula takes at least two arguments, got {n}"
                    )));
                }
                if k < 1 || k as usize >= n {
                    return Err(Error::Validation(format!(
                        "vote number {k} must be in [1, {}]",
                        n - 1
                    )));
                }
            }
        }
        Ok(())
    }

    /// Collects the gates referenced by this formula,
    /// descending into nested formulas.
    pub fn gates(&self, out: &mut Vec<GateId>) {
        for arg in &self.args {
            match arg {
                FormulaArg::Event(EventId::Gate(gate)) => out.push(*gate),
                FormulaArg::Formula(nested) => nested.gates(out),
                FormulaArg::Event(_) => {}
            }
        }
    }
}

/// A logic element owning exactly one formula once defined.
#[derive(Debug, Clone)]
pub struct Gate {
    scoped: ScopedElement,
    formula: Option<Formula>,
}

impl Gate {
    pub fn new(scoped: ScopedElement) -> Self {
        Self {
            scoped,
            formula: None,
        }
    }

    pub fn name(&self) -> &str {
        self.scoped.name()
    }

    pub fn scoped(&self) -> &ScopedElement {
        &self.scoped
    }

    pub fn base_path(&self) -> &str {
        self.scoped.base_path()
    }

    pub fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    pub fn set_formula(&mut self, formula: Formula) {
        self.formula = Some(formula);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_arity() {
        let mut and = Formula::new(Operator::And);
        and.add_event(EventId::Basic(BasicEventId(0)), "a").unwrap();
        assert!(and.validate().is_err());
        and.add_event(EventId::Basic(BasicEventId(1)), "b").unwrap();
        assert!(and.validate().is_ok());

        let mut not = Formula::new(Operator::Not);
        not.add_event(EventId::Basic(BasicEventId(0)), "a").unwrap();
        assert!(not.validate().is_ok());
        not.add_event(EventId::Basic(BasicEventId(1)), "b").unwrap();
        assert!(not.validate().is_err());

        let mut xor = Formula::new(Operator::Xor);
        xor.add_event(EventId::Basic(BasicEventId(0)), "a").unwrap();
        xor.add_event(EventId::Basic(BasicEventId(1)), "b").unwrap();
        assert!(xor.validate().is_ok());
    }

    #[test]
    fn vote_number_bounds() {
        let mut vote = Formula::new(Operator::Atleast);
        for i in 0..3 {
            vote.add_event(EventId::Basic(BasicEventId(i)), "x").unwrap();
        }
        assert!(vote.validate().is_err()); // No vote number.
        vote.set_vote_number(2);
        assert!(vote.validate().is_ok());
        vote.set_vote_number(0);
        assert!(vote.validate().is_err());
        vote.set_vote_number(3);
        assert!(vote.validate().is_err());
    }

    #[test]
    fn duplicate_event_argument() {
        let mut formula = Formula::new(Operator::Or);
        let event = EventId::Gate(GateId(7));
        formula.add_event(event, "motor").unwrap();
        let err = formula.add_event(event, "motor").unwrap_err();
        assert!(matches!(err, Error::DuplicateArgument(_)));
    }
}
