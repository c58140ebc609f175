//! The root container of analysis constructs.
//!
//! The [`Model`] owns one arena per element kind;
//! every cross-reference between elements is an index handle into those
//! arenas, resolved through per-kind name tables.
//! Public elements are keyed by their bare name,
//! private elements by their dotted full path,
//! which realizes the scoped resolution rule:
//! try the most qualified candidate first,
//! strip the innermost scope segment,
//! and fall back to the model scope where only public names live.

use std::collections::HashMap;

use log::trace;

use crate::ccf::{CcfGroup, CcfGroupId};
use crate::element::{Element, Role, ScopedElement};
use crate::error::Error;
use crate::event::{
    BasicEvent, BasicEventId, EventId, Gate, GateId, HouseEvent, HouseEventId,
};
use crate::event_tree::{EventTree, EventTreeId, Sequence, SequenceId};
use crate::expression::{Expression, ExpressionId, Value};
use crate::fault_tree::{FaultTree, FaultTreeId};
use crate::parameter::{MissionTime, Parameter, ParameterId};

/// Expression singletons and reserved arena slots.
const RESERVED_EXPRESSIONS: usize = 3;
const RESERVED_HOUSE_EVENTS: usize = 2;

/// The root container owning all model elements.
#[derive(Debug)]
pub struct Model {
    element: Element,
    mission_time: MissionTime,
    // Arenas.
    basic_events: Vec<BasicEvent>,
    house_events: Vec<HouseEvent>,
    gates: Vec<Gate>,
    parameters: Vec<Parameter>,
    expressions: Vec<Expression>,
    ccf_groups: Vec<CcfGroup>,
    fault_trees: Vec<FaultTree>,
    event_trees: Vec<EventTree>,
    sequences: Vec<Sequence>,
    // Name tables.
    events: HashMap<String, EventId>,
    gate_table: HashMap<String, GateId>,
    basic_event_table: HashMap<String, BasicEventId>,
    house_event_table: HashMap<String, HouseEventId>,
    parameter_table: HashMap<String, ParameterId>,
    ccf_group_table: HashMap<String, CcfGroupId>,
    fault_tree_table: HashMap<String, FaultTreeId>,
    event_tree_table: HashMap<String, EventTreeId>,
    sequence_table: HashMap<String, SequenceId>,
}

impl Model {
    /// The constant `0` expression (also the Boolean `false` literal).
    pub const ZERO: ExpressionId = ExpressionId(0);
    /// The constant `1` expression (also the Boolean `true` literal).
    pub const ONE: ExpressionId = ExpressionId(1);
    /// The constant pi expression.
    pub const PI: ExpressionId = ExpressionId(2);
    /// The canonical `true` house event for formula literals.
    pub const TRUE_EVENT: HouseEventId = HouseEventId(0);
    /// The canonical `false` house event for formula literals.
    pub const FALSE_EVENT: HouseEventId = HouseEventId(1);

    /// Creates an empty model with its singletons pre-allocated.
    pub fn new(name: impl Into<String>) -> Self {
        let mut model = Self {
            element: Element::new(name),
            mission_time: MissionTime::default(),
            basic_events: Vec::new(),
            house_events: Vec::new(),
            gates: Vec::new(),
            parameters: Vec::new(),
            expressions: Vec::new(),
            ccf_groups: Vec::new(),
            fault_trees: Vec::new(),
            event_trees: Vec::new(),
            sequences: Vec::new(),
            events: HashMap::new(),
            gate_table: HashMap::new(),
            basic_event_table: HashMap::new(),
            house_event_table: HashMap::new(),
            parameter_table: HashMap::new(),
            ccf_group_table: HashMap::new(),
            fault_tree_table: HashMap::new(),
            event_tree_table: HashMap::new(),
            sequence_table: HashMap::new(),
        };
        // Singletons stay out of the name tables and the iterators.
        model.expressions.push(Expression::Constant(Value::Int(0)));
        model.expressions.push(Expression::Constant(Value::Int(1)));
        model
            .expressions
            .push(Expression::Constant(Value::Float(std::f64::consts::PI)));
        let mut true_event = HouseEvent::new(ScopedElement::new(
            Element::new("true"),
            "",
            Role::Private,
        ));
        true_event.set_state(true);
        model.house_events.push(true_event);
        model.house_events.push(HouseEvent::new(ScopedElement::new(
            Element::new("false"),
            "",
            Role::Private,
        )));
        model
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut Element {
        &mut self.element
    }

    pub fn mission_time(&self) -> &MissionTime {
        &self.mission_time
    }

    pub fn mission_time_mut(&mut self) -> &mut MissionTime {
        &mut self.mission_time
    }

    fn ensure_new_event(&self, key: &str) -> Result<(), Error> {
        if self.events.contains_key(key) {
            return Err(Error::Validation(format!("redefinition of event {key}")));
        }
        Ok(())
    }

    /// Registers a gate shell.
    pub fn add_gate(&mut self, gate: Gate) -> Result<GateId, Error> {
        let key = gate.scoped().index_key();
        self.ensure_new_event(&key)?;
        let id = GateId(self.gates.len() as u32);
        trace!("registering gate {key}");
        self.events.insert(key.clone(), EventId::Gate(id));
        self.gate_table.insert(key, id);
        self.gates.push(gate);
        Ok(id)
    }

    /// Registers a basic-event shell.
    pub fn add_basic_event(&mut self, event: BasicEvent) -> Result<BasicEventId, Error> {
        let key = event.scoped().index_key();
        self.ensure_new_event(&key)?;
        let id = BasicEventId(self.basic_events.len() as u32);
        trace!("registering basic event {key}");
        self.events.insert(key.clone(), EventId::Basic(id));
        self.basic_event_table.insert(key, id);
        self.basic_events.push(event);
        Ok(id)
    }

    /// Registers a house-event shell.
    pub fn add_house_event(&mut self, event: HouseEvent) -> Result<HouseEventId, Error> {
        let key = event.scoped().index_key();
        self.ensure_new_event(&key)?;
        let id = HouseEventId(self.house_events.len() as u32);
        trace!("registering house event {key}");
        self.events.insert(key.clone(), EventId::House(id));
        self.house_event_table.insert(key, id);
        self.house_events.push(event);
        Ok(id)
    }

    /// Registers a parameter shell.
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<ParameterId, Error> {
        let key = parameter.scoped().index_key();
        if self.parameter_table.contains_key(&key) {
            return Err(Error::Validation(format!("redefinition of parameter {key}")));
        }
        let id = ParameterId(self.parameters.len() as u32);
        trace!("registering parameter {key}");
        self.parameter_table.insert(key, id);
        self.parameters.push(parameter);
        Ok(id)
    }

    /// Registers a CCF group shell.
    pub fn add_ccf_group(&mut self, group: CcfGroup) -> Result<CcfGroupId, Error> {
        let key = group.scoped().index_key();
        if self.ccf_group_table.contains_key(&key) {
            return Err(Error::Validation(format!("redefinition of CCF group {key}")));
        }
        let id = CcfGroupId(self.ccf_groups.len() as u32);
        trace!("registering CCF group {key}");
        self.ccf_group_table.insert(key, id);
        self.ccf_groups.push(group);
        Ok(id)
    }

    /// Registers a fault tree.
    pub fn add_fault_tree(&mut self, fault_tree: FaultTree) -> Result<FaultTreeId, Error> {
        let key = fault_tree.name().to_owned();
        if self.fault_tree_table.contains_key(&key) {
            return Err(Error::Validation(format!(
                "redefinition of fault tree {key}"
            )));
        }
        let id = FaultTreeId(self.fault_trees.len() as u32);
        self.fault_tree_table.insert(key, id);
        self.fault_trees.push(fault_tree);
        Ok(id)
    }

    /// Registers an event tree.
    pub fn add_event_tree(&mut self, event_tree: EventTree) -> Result<EventTreeId, Error> {
        let key = event_tree.name().to_owned();
        if self.event_tree_table.contains_key(&key) {
            return Err(Error::Validation(format!(
                "redefinition of event tree {key}"
            )));
        }
        let id = EventTreeId(self.event_trees.len() as u32);
        self.event_tree_table.insert(key, id);
        self.event_trees.push(event_tree);
        Ok(id)
    }

    /// Registers a sequence shell.
    pub fn add_sequence(&mut self, sequence: Sequence) -> Result<SequenceId, Error> {
        let key = sequence.scoped().index_key();
        if self.sequence_table.contains_key(&key) {
            return Err(Error::Validation(format!("redefinition of sequence {key}")));
        }
        let id = SequenceId(self.sequences.len() as u32);
        self.sequence_table.insert(key, id);
        self.sequences.push(sequence);
        Ok(id)
    }

    /// Stores an expression, returning its handle.
    pub fn add_expression(&mut self, expression: Expression) -> ExpressionId {
        let id = ExpressionId(self.expressions.len() as u32);
        self.expressions.push(expression);
        id
    }

    /// Stores a materialized CCF event outside the name tables.
    pub(crate) fn add_ccf_event(&mut self, event: BasicEvent) -> BasicEventId {
        let id = BasicEventId(self.basic_events.len() as u32);
        self.basic_events.push(event);
        id
    }

    /// Stores a CCF substitute gate outside the name tables.
    pub(crate) fn add_ccf_gate(&mut self, gate: Gate) -> GateId {
        let id = GateId(self.gates.len() as u32);
        self.gates.push(gate);
        id
    }

    /// Candidate lookup keys for `(name, base_path)`,
    /// from the most qualified scope down to the bare name.
    fn candidates(name: &str, base_path: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut path = base_path;
        while !path.is_empty() {
            out.push(format!("{path}.{name}"));
            path = match path.rfind('.') {
                Some(i) => &path[..i],
                None => "",
            };
        }
        out.push(name.to_owned());
        out
    }

    /// Resolves an event of any kind visible from `base_path`.
    pub fn get_event(&self, name: &str, base_path: &str) -> Option<EventId> {
        Self::candidates(name, base_path)
            .iter()
            .find_map(|key| self.events.get(key).copied())
    }

    /// Resolves a gate visible from `base_path`.
    pub fn get_gate(&self, name: &str, base_path: &str) -> Option<GateId> {
        Self::candidates(name, base_path)
            .iter()
            .find_map(|key| self.gate_table.get(key).copied())
    }

    /// Resolves a basic event visible from `base_path`.
    pub fn get_basic_event(&self, name: &str, base_path: &str) -> Option<BasicEventId> {
        Self::candidates(name, base_path)
            .iter()
            .find_map(|key| self.basic_event_table.get(key).copied())
    }

    /// Resolves a house event visible from `base_path`.
    pub fn get_house_event(&self, name: &str, base_path: &str) -> Option<HouseEventId> {
        Self::candidates(name, base_path)
            .iter()
            .find_map(|key| self.house_event_table.get(key).copied())
    }

    /// Resolves a parameter visible from `base_path`,
    /// clearing its unused flag.
    pub fn get_parameter(&mut self, name: &str, base_path: &str) -> Option<ParameterId> {
        let id = Self::candidates(name, base_path)
            .iter()
            .find_map(|key| self.parameter_table.get(key).copied())?;
        self.parameters[id.index()].mark_used();
        Some(id)
    }

    /// Resolves a sequence by its public name.
    pub fn get_sequence(&self, name: &str) -> Option<SequenceId> {
        self.sequence_table.get(name).copied()
    }

    /// Resolves a fault tree by name.
    pub fn get_fault_tree(&self, name: &str) -> Option<FaultTreeId> {
        self.fault_tree_table.get(name).copied()
    }

    /// Resolves an event tree by name.
    pub fn get_event_tree(&self, name: &str) -> Option<EventTreeId> {
        self.event_tree_table.get(name).copied()
    }

    // Arena accessors.

    pub fn gate(&self, id: GateId) -> &Gate {
        &self.gates[id.index()]
    }

    pub fn gate_mut(&mut self, id: GateId) -> &mut Gate {
        &mut self.gates[id.index()]
    }

    pub fn basic_event(&self, id: BasicEventId) -> &BasicEvent {
        &self.basic_events[id.index()]
    }

    pub fn basic_event_mut(&mut self, id: BasicEventId) -> &mut BasicEvent {
        &mut self.basic_events[id.index()]
    }

    pub fn house_event(&self, id: HouseEventId) -> &HouseEvent {
        &self.house_events[id.index()]
    }

    pub fn house_event_mut(&mut self, id: HouseEventId) -> &mut HouseEvent {
        &mut self.house_events[id.index()]
    }

    pub fn parameter(&self, id: ParameterId) -> &Parameter {
        &self.parameters[id.index()]
    }

    pub fn parameter_mut(&mut self, id: ParameterId) -> &mut Parameter {
        &mut self.parameters[id.index()]
    }

    pub fn expression(&self, id: ExpressionId) -> &Expression {
        &self.expressions[id.index()]
    }

    pub fn ccf_group(&self, id: CcfGroupId) -> &CcfGroup {
        &self.ccf_groups[id.index()]
    }

    pub fn ccf_group_mut(&mut self, id: CcfGroupId) -> &mut CcfGroup {
        &mut self.ccf_groups[id.index()]
    }

    pub fn fault_tree(&self, id: FaultTreeId) -> &FaultTree {
        &self.fault_trees[id.index()]
    }

    pub fn event_tree(&self, id: EventTreeId) -> &EventTree {
        &self.event_trees[id.index()]
    }

    pub fn event_tree_mut(&mut self, id: EventTreeId) -> &mut EventTree {
        &mut self.event_trees[id.index()]
    }

    pub fn sequence(&self, id: SequenceId) -> &Sequence {
        &self.sequences[id.index()]
    }

    pub fn sequence_mut(&mut self, id: SequenceId) -> &mut Sequence {
        &mut self.sequences[id.index()]
    }

    // Iteration over each kind, singletons excluded.

    pub fn gates(&self) -> impl Iterator<Item = (GateId, &Gate)> {
        self.gates
            .iter()
            .enumerate()
            .map(|(i, gate)| (GateId(i as u32), gate))
    }

    pub fn basic_events(&self) -> impl Iterator<Item = (BasicEventId, &BasicEvent)> {
        self.basic_events
            .iter()
            .enumerate()
            .map(|(i, event)| (BasicEventId(i as u32), event))
    }

    pub fn house_events(&self) -> impl Iterator<Item = (HouseEventId, &HouseEvent)> {
        self.house_events
            .iter()
            .enumerate()
            .skip(RESERVED_HOUSE_EVENTS)
            .map(|(i, event)| (HouseEventId(i as u32), event))
    }

    pub fn parameters(&self) -> impl Iterator<Item = (ParameterId, &Parameter)> {
        self.parameters
            .iter()
            .enumerate()
            .map(|(i, parameter)| (ParameterId(i as u32), parameter))
    }

    pub fn ccf_groups(&self) -> impl Iterator<Item = (CcfGroupId, &CcfGroup)> {
        self.ccf_groups
            .iter()
            .enumerate()
            .map(|(i, group)| (CcfGroupId(i as u32), group))
    }

    pub fn fault_trees(&self) -> impl Iterator<Item = (FaultTreeId, &FaultTree)> {
        self.fault_trees
            .iter()
            .enumerate()
            .map(|(i, tree)| (FaultTreeId(i as u32), tree))
    }

    pub fn event_trees(&self) -> impl Iterator<Item = (EventTreeId, &EventTree)> {
        self.event_trees
            .iter()
            .enumerate()
            .map(|(i, tree)| (EventTreeId(i as u32), tree))
    }

    pub fn sequences(&self) -> impl Iterator<Item = (SequenceId, &Sequence)> {
        self.sequences
            .iter()
            .enumerate()
            .map(|(i, sequence)| (SequenceId(i as u32), sequence))
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn basic_event_count(&self) -> usize {
        self.basic_events.len()
    }

    pub fn ccf_group_count(&self) -> usize {
        self.ccf_groups.len()
    }

    /// The number of expressions in the arena, singletons excluded.
    pub fn expression_count(&self) -> usize {
        self.expressions.len() - RESERVED_EXPRESSIONS
    }

    /// Recomputes the top events of every fault tree:
    /// the gates of a tree that no other gate of the same tree
    /// uses as an argument.
    pub fn collect_top_events(&mut self) {
        for index in 0..self.fault_trees.len() {
            let mut tree_gates = Vec::new();
            self.fault_trees[index].component().gather_gates(&mut tree_gates);
            let mut referenced = std::collections::HashSet::new();
            for gate in &tree_gates {
                if let Some(formula) = self.gates[gate.index()].formula() {
                    let mut used = Vec::new();
                    formula.gates(&mut used);
                    referenced.extend(used);
                }
            }
            let top = tree_gates
                .iter()
                .copied()
                .filter(|gate| !referenced.contains(gate))
                .collect();
            self.fault_trees[index].set_top_events(top);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Role, ScopedElement};

    fn basic_event(name: &str, base_path: &str, role: Role) -> BasicEvent {
        BasicEvent::new(ScopedElement::new(Element::new(name), base_path, role))
    }

    #[test]
    fn public_resolution_from_any_scope() {
        let mut model = Model::new("plant");
        let declared = model
            .add_basic_event(basic_event("pump", "cooling", Role::Public))
            .unwrap();
        // Reference from a nested scope of another tree.
        assert_eq!(
            model.get_basic_event("pump", "heating.loop"),
            Some(declared)
        );
        assert_eq!(model.get_basic_event("pump", ""), Some(declared));
    }

    #[test]
    fn private_resolution_is_scoped() {
        let mut model = Model::new("plant");
        let declared = model
            .add_basic_event(basic_event("pump", "cooling", Role::Private))
            .unwrap();
        // Visible from the declaring scope and below.
        assert_eq!(model.get_basic_event("pump", "cooling"), Some(declared));
        assert_eq!(
            model.get_basic_event("pump", "cooling.subsystem"),
            Some(declared)
        );
        // Not from a sibling scope or the model scope.
        assert_eq!(model.get_basic_event("pump", "heating"), None);
        assert_eq!(model.get_basic_event("pump", ""), None);
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut model = Model::new("plant");
        let outer = model
            .add_basic_event(basic_event("pump", "", Role::Public))
            .unwrap();
        let inner = model
            .add_basic_event(basic_event("pump", "cooling", Role::Private))
            .unwrap();
        assert_eq!(model.get_basic_event("pump", "cooling"), Some(inner));
        assert_eq!(model.get_basic_event("pump", "heating"), Some(outer));
    }

    #[test]
    fn event_namespace_is_shared() {
        let mut model = Model::new("plant");
        model
            .add_basic_event(basic_event("pump", "", Role::Public))
            .unwrap();
        let gate = Gate::new(ScopedElement::new(Element::new("pump"), "", Role::Public));
        let err = model.add_gate(gate).unwrap_err();
        assert!(err.to_string().contains("redefinition"));
    }

    #[test]
    fn parameter_reference_clears_unused() {
        let mut model = Model::new("plant");
        let id = model
            .add_parameter(Parameter::new(ScopedElement::new(
                Element::new("lambda"),
                "",
                Role::Public,
            )))
            .unwrap();
        assert!(model.parameter(id).is_unused());
        assert_eq!(model.get_parameter("lambda", "cooling"), Some(id));
        assert!(!model.parameter(id).is_unused());
    }

    #[test]
    fn singletons_are_not_iterated() {
        let model = Model::new("plant");
        assert_eq!(model.house_events().count(), 0);
        assert_eq!(model.expression_count(), 0);
        assert!(model.house_event(Model::TRUE_EVENT).state());
        assert!(!model.house_event(Model::FALSE_EVENT).state());
    }
}
