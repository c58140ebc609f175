//! Event trees: functional events, sequences, branches, and forks.

use std::collections::HashMap;

use crate::element::{Element, ScopedElement};
use crate::error::Error;
use crate::expression::ExpressionId;

/// An indexing object for event trees in a model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventTreeId(pub(crate) u32);

impl EventTreeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An indexing object for sequences in a model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceId(pub(crate) u32);

impl SequenceId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An indexing object for functional events within one event tree.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FunctionalEventId(pub(crate) u32);

/// An indexing object for named branches within one event tree.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NamedBranchId(pub(crate) u32);

impl NamedBranchId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An indexing object for anonymous forks within one event tree.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForkId(pub(crate) u32);

impl ForkId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A decision point labeling the columns of an event tree.
#[derive(Debug, Clone)]
pub struct FunctionalEvent {
    element: Element,
}

impl FunctionalEvent {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }
}

/// Semantics attached to branches and sequences.
#[derive(Debug, Clone)]
pub enum Instruction {
    CollectExpression(ExpressionId),
}

/// A terminal outcome of an event tree.
#[derive(Debug, Clone)]
pub struct Sequence {
    scoped: ScopedElement,
    instructions: Vec<Instruction>,
}

impl Sequence {
    pub fn new(scoped: ScopedElement) -> Self {
        Self {
            scoped,
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.scoped.name()
    }

    pub fn scoped(&self) -> &ScopedElement {
        &self.scoped
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn set_instructions(&mut self, instructions: Vec<Instruction>) {
        self.instructions = instructions;
    }
}

/// Where a branch hands control after its instructions.
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Branch(NamedBranchId),
    Sequence(SequenceId),
    Fork(ForkId),
}

/// Ordered instructions plus a target.
#[derive(Debug, Clone)]
pub struct Branch {
    instructions: Vec<Instruction>,
    target: Target,
}

impl Branch {
    pub fn new(instructions: Vec<Instruction>, target: Target) -> Self {
        Self {
            instructions,
            target,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn target(&self) -> Target {
        self.target
    }
}

/// One state-keyed alternative of a fork.
#[derive(Debug, Clone)]
pub struct Path {
    pub state: String,
    pub branch: Branch,
}

/// State-keyed alternatives at a functional event.
#[derive(Debug, Clone)]
pub struct Fork {
    functional_event: FunctionalEventId,
    paths: Vec<Path>,
}

impl Fork {
    pub fn new(functional_event: FunctionalEventId, paths: Vec<Path>) -> Self {
        Self {
            functional_event,
            paths,
        }
    }

    pub fn functional_event(&self) -> FunctionalEventId {
        self.functional_event
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }
}

/// A reusable, named sub-tree of an event tree.
/// The branch body is bound in the definition pass.
#[derive(Debug, Clone)]
pub struct NamedBranch {
    element: Element,
    branch: Option<Branch>,
}

impl NamedBranch {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            branch: None,
        }
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn branch(&self) -> Option<&Branch> {
        self.branch.as_ref()
    }
}

/// An event tree with its functional events, sequences, named branches,
/// anonymous forks, and initial state.
#[derive(Debug, Clone)]
pub struct EventTree {
    element: Element,
    functional_events: Vec<FunctionalEvent>,
    functional_event_index: HashMap<String, FunctionalEventId>,
    branches: Vec<NamedBranch>,
    branch_index: HashMap<String, NamedBranchId>,
    sequences: Vec<SequenceId>,
    forks: Vec<Fork>,
    initial_state: Option<Branch>,
}

impl EventTree {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            functional_events: Vec::new(),
            functional_event_index: HashMap::new(),
            branches: Vec::new(),
            branch_index: HashMap::new(),
            sequences: Vec::new(),
            forks: Vec::new(),
            initial_state: None,
        }
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn add_functional_event(
        &mut self,
        functional_event: FunctionalEvent,
    ) -> Result<FunctionalEventId, Error> {
        let name = functional_event.name().to_owned();
        if self.functional_event_index.contains_key(&name) {
            return Err(Error::Validation(format!(
                "redefinition of functional event {name} in event tree {}",
                self.name()
            )));
        }
        let id = FunctionalEventId(self.functional_events.len() as u32);
        self.functional_events.push(functional_event);
        self.functional_event_index.insert(name, id);
        Ok(id)
    }

    pub fn functional_event(&self, name: &str) -> Option<FunctionalEventId> {
        self.functional_event_index.get(name).copied()
    }

    pub fn functional_event_at(&self, id: FunctionalEventId) -> &FunctionalEvent {
        &self.functional_events[id.0 as usize]
    }

    pub fn functional_events(&self) -> &[FunctionalEvent] {
        &self.functional_events
    }

    pub fn add_branch(&mut self, branch: NamedBranch) -> Result<NamedBranchId, Error> {
        let name = branch.name().to_owned();
        if self.branch_index.contains_key(&name) {
            return Err(Error::Validation(format!(
                "redefinition of branch {name} in event tree {}",
                self.name()
            )));
        }
        let id = NamedBranchId(self.branches.len() as u32);
        self.branches.push(branch);
        self.branch_index.insert(name, id);
        Ok(id)
    }

    pub fn branch(&self, name: &str) -> Option<NamedBranchId> {
        self.branch_index.get(name).copied()
    }

    pub fn branches(&self) -> impl Iterator<Item = (NamedBranchId, &NamedBranch)> {
        self.branches
            .iter()
            .enumerate()
            .map(|(i, branch)| (NamedBranchId(i as u32), branch))
    }

    pub fn named_branch(&self, id: NamedBranchId) -> &NamedBranch {
        &self.branches[id.index()]
    }

    pub fn define_branch(&mut self, id: NamedBranchId, branch: Branch) {
        self.branches[id.index()].branch = Some(branch);
    }

    pub fn add_sequence(&mut self, sequence: SequenceId) {
        self.sequences.push(sequence);
    }

    pub fn sequences(&self) -> &[SequenceId] {
        &self.sequences
    }

    pub fn add_fork(&mut self, fork: Fork) -> ForkId {
        let id = ForkId(self.forks.len() as u32);
        self.forks.push(fork);
        id
    }

    pub fn fork(&self, id: ForkId) -> &Fork {
        &self.forks[id.index()]
    }

    pub fn initial_state(&self) -> Option<&Branch> {
        self.initial_state.as_ref()
    }

    pub fn set_initial_state(&mut self, branch: Branch) {
        self.initial_state = Some(branch);
    }
}
