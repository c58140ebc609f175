//! Two-pass construction of analysis models from MEF input files.
//!
//! The first pass registers shells for every named construct,
//! indexing them in the model's symbol tables;
//! constructs with a body (gate formulas, expressions, CCF factors,
//! sequence instructions, event-tree branches) are queued on a TBD list
//! together with their XML nodes.
//! The second pass walks the TBD list and binds the bodies,
//! by which time the symbol tables are complete,
//! so references may point forward or across files.
//! Validation then rules out cycles and checks invariants,
//! and the setup pass prepares derived analysis data.

mod expression;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use itertools::Itertools;
use log::{debug, info, warn};

use arbor_core::cycle::{self, BranchGraph, GateGraph, ParameterGraph};
use arbor_core::{
    Attribute, BasicEvent, BasicEventId, Branch, CcfGroup, CcfGroupId, CcfModelKind, Component,
    Element, Error, EventId, EventTree, EventTreeId, ExpressionId, FaultTree, Fork, Formula,
    FunctionalEvent, Gate, GateId, HouseEvent, HouseEventId, Instruction, Model, NamedBranch,
    Operator, Parameter, ParameterId, Path as ForkPath, Role, ScopedElement, Sequence, SequenceId,
    Settings, Target, Units,
};

use crate::schema;
use crate::vocabulary::*;
use crate::xml::{NodeId, XmlDocument, XmlElement};

/// A shell element awaiting its body definition in the second pass.
#[derive(Debug, Clone, Copy)]
enum Tbd {
    Gate(GateId),
    BasicEvent(BasicEventId),
    Parameter(ParameterId),
    CcfGroup(CcfGroupId),
    Sequence(SequenceId),
    EventTree(EventTreeId),
}

/// The location of an XML node within the set of parsed documents.
#[derive(Debug, Clone, Copy)]
struct NodeRef {
    doc: usize,
    node: NodeId,
}

/// Builds a validated, analysis-ready [`Model`] from MEF input files.
pub struct Initializer {
    settings: Settings,
    model: Model,
    /// Parsed documents, retained until initialization completes.
    documents: Vec<(PathBuf, Rc<XmlDocument>)>,
    tbd: Vec<(Tbd, NodeRef)>,
    /// Expressions awaiting bulk validation once cycles are ruled out.
    expressions: Vec<(ExpressionId, NodeRef)>,
}

impl Initializer {
    /// Processes the input files into an analysis-ready model.
    ///
    /// Fails on missing or duplicate files, schema violations,
    /// undefined or cyclic references, and invariant violations;
    /// no model is delivered on failure.
    pub fn process(xml_files: &[PathBuf], settings: Settings) -> Result<Model, Error> {
        if !(settings.mission_time > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "mission time must be positive: {}",
                settings.mission_time
            )));
        }
        let mut init = Initializer {
            settings,
            model: Model::new("model"),
            documents: Vec::new(),
            tbd: Vec::new(),
            expressions: Vec::new(),
        };
        init.model.mission_time_mut().set_value(settings.mission_time);
        init.process_input_files(xml_files)?;
        Ok(init.model)
    }

    fn process_input_files(&mut self, xml_files: &[PathBuf]) -> Result<(), Error> {
        info!("processing input files");
        check_file_existence(xml_files)?;
        check_duplicate_files(xml_files)?;
        for xml_file in xml_files {
            self.process_input_file(xml_file)
                .map_err(|err| err.prepend(&in_file(xml_file)))?;
        }
        debug!("defining TBD elements");
        self.define_tbd_elements()?;
        info!("validating the initialization");
        self.validate()?;
        info!("setting up for the analysis");
        self.setup()
    }

    fn process_input_file(&mut self, xml_file: &Path) -> Result<(), Error> {
        debug!("parsing {}", xml_file.display());
        let document = XmlDocument::parse(xml_file)
            .map_err(|err| Error::Validation(format!("Document failed schema validation:\n{err}")))?;
        let document = Rc::new(document);
        schema::validate(&document)?;
        let doc = self.documents.len();
        self.documents
            .push((xml_file.to_path_buf(), Rc::clone(&document)));

        let root = document.root();
        if doc == 0 {
            // One model for all files; named by the first document.
            if let Some(name) = root.attribute(ATTR_NAME) {
                if !name.is_empty() {
                    self.model.element_mut().set_name(name);
                }
            }
            let mut element = Element::new(self.model.name());
            attach_label_and_attributes(&mut element, root)?;
            *self.model.element_mut() = element;
        }

        for node in root.children() {
            match node.name() {
                TAG_DEFINE_EVENT_TREE => self.register_event_tree(doc, node)?,
                TAG_DEFINE_FAULT_TREE => self.register_fault_tree(doc, node)?,
                TAG_DEFINE_CCF_GROUP => {
                    self.register_ccf_group(doc, node, "", Role::Public)?;
                }
                TAG_MODEL_DATA => self.process_model_data(doc, node)?,
                _ => {}
            }
        }
        Ok(())
    }

    // Pass 1: shell registration.

    fn register_gate(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
        role: Role,
    ) -> Result<GateId, Error> {
        let scoped = construct_scoped(node, base_path, role)?;
        let id = self
            .model
            .add_gate(Gate::new(scoped))
            .map_err(|err| err.prepend(&at_line(node)))?;
        self.tbd.push((Tbd::Gate(id), node_ref(doc, node)));
        Ok(id)
    }

    fn register_basic_event(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
        role: Role,
    ) -> Result<BasicEventId, Error> {
        let scoped = construct_scoped(node, base_path, role)?;
        let id = self
            .model
            .add_basic_event(BasicEvent::new(scoped))
            .map_err(|err| err.prepend(&at_line(node)))?;
        self.tbd.push((Tbd::BasicEvent(id), node_ref(doc, node)));
        Ok(id)
    }

    fn register_house_event(
        &mut self,
        node: XmlElement<'_>,
        base_path: &str,
        role: Role,
    ) -> Result<HouseEventId, Error> {
        let scoped = construct_scoped(node, base_path, role)?;
        let id = self
            .model
            .add_house_event(HouseEvent::new(scoped))
            .map_err(|err| err.prepend(&at_line(node)))?;
        // The only allowed body is a Boolean constant; consumed right away.
        if let Some(constant) = node.child(TAG_CONSTANT) {
            let value = required_attribute(constant, ATTR_VALUE)?;
            self.model.house_event_mut(id).set_state(value == "true");
        }
        Ok(id)
    }

    fn register_parameter(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
        role: Role,
    ) -> Result<ParameterId, Error> {
        let scoped = construct_scoped(node, base_path, role)?;
        let mut parameter = Parameter::new(scoped);
        if let Some(unit) = node.attribute(ATTR_UNIT) {
            let unit: Units = unit
                .parse()
                .map_err(|err: Error| err.prepend(&at_line(node)))?;
            parameter.set_unit(unit);
        }
        let id = self
            .model
            .add_parameter(parameter)
            .map_err(|err| err.prepend(&at_line(node)))?;
        self.tbd.push((Tbd::Parameter(id), node_ref(doc, node)));
        Ok(id)
    }

    fn register_ccf_group(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
        role: Role,
    ) -> Result<CcfGroupId, Error> {
        let kind: CcfModelKind = required_attribute(node, ATTR_MODEL)?
            .parse()
            .map_err(|err: Error| err.prepend(&at_line(node)))?;
        let scoped = construct_scoped(node, base_path, role)?;
        let id = self
            .model
            .add_ccf_group(CcfGroup::new(scoped, kind))
            .map_err(|err| err.prepend(&at_line(node)))?;
        if let Some(members) = node.child(TAG_MEMBERS) {
            self.process_ccf_members(members, id)?;
        }
        self.tbd.push((Tbd::CcfGroup(id), node_ref(doc, node)));
        Ok(id)
    }

    fn process_ccf_members(
        &mut self,
        members_node: XmlElement<'_>,
        group: CcfGroupId,
    ) -> Result<(), Error> {
        for event_node in members_node.children() {
            let name = required_attribute(event_node, ATTR_NAME)?;
            // The member-duplicate check precedes model registration.
            if self.model.ccf_group(group).has_member(name) {
                return Err(Error::DuplicateArgument(format!(
                    "{}duplicate member {name} in CCF group {}",
                    at_line(event_node),
                    self.model.ccf_group(group).name()
                )));
            }
            let scoped = ScopedElement::new(
                Element::new(name),
                self.model.ccf_group(group).scoped().base_path(),
                self.model.ccf_group(group).scoped().role(),
            );
            let id = self
                .model
                .add_basic_event(BasicEvent::new(scoped))
                .map_err(|err| err.prepend(&at_line(event_node)))?;
            self.model
                .ccf_group_mut(group)
                .add_member(id, name)
                .map_err(|err| err.prepend(&at_line(event_node)))?;
        }
        Ok(())
    }

    fn register_sequence(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
    ) -> Result<SequenceId, Error> {
        let element = construct_element(node)?;
        let scoped = ScopedElement::new(element, base_path, Role::Public);
        let id = self
            .model
            .add_sequence(Sequence::new(scoped))
            .map_err(|err| err.prepend(&at_line(node)))?;
        self.tbd.push((Tbd::Sequence(id), node_ref(doc, node)));
        Ok(id)
    }

    fn register_event_tree(&mut self, doc: usize, node: XmlElement<'_>) -> Result<(), Error> {
        let element = construct_element(node)?;
        let mut tree = EventTree::new(element);
        for fe_node in node.children().filter(|n| n.name() == TAG_DEFINE_FUNCTIONAL_EVENT) {
            let functional_event = FunctionalEvent::new(construct_element(fe_node)?);
            tree.add_functional_event(functional_event)
                .map_err(|err| err.prepend(&at_line(fe_node)))?;
        }
        let tree_name = tree.name().to_owned();
        for seq_node in node.children().filter(|n| n.name() == TAG_DEFINE_SEQUENCE) {
            let sequence = self.register_sequence(doc, seq_node, &tree_name)?;
            tree.add_sequence(sequence);
        }
        for br_node in node.children().filter(|n| n.name() == TAG_DEFINE_BRANCH) {
            tree.add_branch(NamedBranch::new(construct_element(br_node)?))
                .map_err(|err| err.prepend(&at_line(br_node)))?;
        }
        let id = self
            .model
            .add_event_tree(tree)
            .map_err(|err| err.prepend(&at_line(node)))?;
        // Queued only after the tree registers successfully.
        self.tbd.push((Tbd::EventTree(id), node_ref(doc, node)));
        Ok(())
    }

    fn register_fault_tree(&mut self, doc: usize, node: XmlElement<'_>) -> Result<(), Error> {
        let scoped = construct_scoped(node, "", Role::Public)?;
        let mut component = Component::new(scoped);
        let base_path = component.name().to_owned();
        self.register_fault_tree_data(doc, node, &base_path, &mut component)?;
        self.model
            .add_fault_tree(FaultTree::new(component))
            .map_err(|err| err.prepend(&at_line(node)))?;
        Ok(())
    }

    fn register_component(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
        role: Role,
    ) -> Result<Component, Error> {
        let scoped = construct_scoped(node, base_path, role)?;
        let mut component = Component::new(scoped);
        let path = component.full_path();
        self.register_fault_tree_data(doc, node, &path, &mut component)?;
        Ok(component)
    }

    fn register_fault_tree_data(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
        component: &mut Component,
    ) -> Result<(), Error> {
        let role = component.role();
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_HOUSE_EVENT) {
            component.add_house_event(self.register_house_event(child, base_path, role)?);
        }
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_BASIC_EVENT) {
            component.add_basic_event(self.register_basic_event(doc, child, base_path, role)?);
        }
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_PARAMETER) {
            component.add_parameter(self.register_parameter(doc, child, base_path, role)?);
        }
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_GATE) {
            component.add_gate(self.register_gate(doc, child, base_path, role)?);
        }
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_CCF_GROUP) {
            component.add_ccf_group(self.register_ccf_group(doc, child, base_path, role)?);
        }
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_COMPONENT) {
            let sub = self.register_component(doc, child, base_path, role)?;
            component
                .add_component(sub)
                .map_err(|err| err.prepend(&at_line(child)))?;
        }
        Ok(())
    }

    fn process_model_data(&mut self, doc: usize, node: XmlElement<'_>) -> Result<(), Error> {
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_HOUSE_EVENT) {
            self.register_house_event(child, "", Role::Public)?;
        }
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_BASIC_EVENT) {
            self.register_basic_event(doc, child, "", Role::Public)?;
        }
        for child in node.children().filter(|n| n.name() == TAG_DEFINE_PARAMETER) {
            self.register_parameter(doc, child, "", Role::Public)?;
        }
        Ok(())
    }

    // Pass 2: body definition.

    fn define_tbd_elements(&mut self) -> Result<(), Error> {
        for index in 0..self.tbd.len() {
            let (tbd, node_ref) = self.tbd[index];
            let (path, document) = &self.documents[node_ref.doc];
            let path = path.clone();
            let document = Rc::clone(document);
            let node = document.element(node_ref.node);
            let result = match tbd {
                Tbd::Gate(id) => self.define_gate(node_ref.doc, node, id),
                Tbd::BasicEvent(id) => self.define_basic_event(node_ref.doc, node, id),
                Tbd::Parameter(id) => self.define_parameter(node_ref.doc, node, id),
                Tbd::CcfGroup(id) => self.define_ccf_group(node_ref.doc, node, id),
                Tbd::Sequence(id) => self.define_sequence(node_ref.doc, node, id),
                Tbd::EventTree(id) => self.define_event_tree(node_ref.doc, node, id),
            };
            result.map_err(|err| err.prepend(&in_file(&path)))?;
        }
        Ok(())
    }

    fn define_gate(&mut self, doc: usize, node: XmlElement<'_>, id: GateId) -> Result<(), Error> {
        let children = body_children(node);
        let formula_node = children.first().copied().ok_or_else(|| {
            Error::Validation(format!(
                "{}gate {} has no formula",
                at_line(node),
                self.model.gate(id).name()
            ))
        })?;
        let base_path = self.model.gate(id).base_path().to_owned();
        let formula = self.build_formula(doc, formula_node, &base_path)?;
        self.model.gate_mut(id).set_formula(formula);
        Ok(())
    }

    fn define_basic_event(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        id: BasicEventId,
    ) -> Result<(), Error> {
        let children = body_children(node);
        if let Some(expr_node) = children.last() {
            let base_path = self.model.basic_event(id).base_path().to_owned();
            let expression = self.build_expression(doc, *expr_node, &base_path)?;
            self.model.basic_event_mut(id).set_expression(expression);
        }
        Ok(())
    }

    fn define_parameter(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        id: ParameterId,
    ) -> Result<(), Error> {
        let children = body_children(node);
        let expr_node = children.last().copied().ok_or_else(|| {
            Error::Validation(format!(
                "{}parameter {} has no expression",
                at_line(node),
                self.model.parameter(id).name()
            ))
        })?;
        let base_path = self.model.parameter(id).base_path().to_owned();
        let expression = self.build_expression(doc, expr_node, &base_path)?;
        self.model.parameter_mut(id).set_expression(expression);
        Ok(())
    }

    fn define_ccf_group(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        id: CcfGroupId,
    ) -> Result<(), Error> {
        let base_path = self.model.ccf_group(id).scoped().base_path().to_owned();
        for child in node.children() {
            match child.name() {
                TAG_DISTRIBUTION => {
                    let expr_node = child.children().next().ok_or_else(|| {
                        Error::Validation(format!(
                            "{}distribution has no expression",
                            at_line(child)
                        ))
                    })?;
                    let expression = self.build_expression(doc, expr_node, &base_path)?;
                    self.model.ccf_group_mut(id).set_distribution(expression);
                }
                TAG_FACTOR => self.define_ccf_factor(doc, child, id, &base_path)?,
                TAG_FACTORS => {
                    for factor_node in child.children() {
                        self.define_ccf_factor(doc, factor_node, id, &base_path)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn define_ccf_factor(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        group: CcfGroupId,
        base_path: &str,
    ) -> Result<(), Error> {
        let expr_node = node.children().next().ok_or_else(|| {
            Error::Validation(format!("{}factor has no expression", at_line(node)))
        })?;
        let expression = self.build_expression(doc, expr_node, base_path)?;
        let level = match node.attribute(ATTR_LEVEL) {
            Some(level) => Some(level.parse::<u32>().map_err(|_| {
                Error::Validation(format!(
                    "{}invalid `level` attribute: {level}",
                    at_line(node)
                ))
            })?),
            None => None,
        };
        self.model.ccf_group_mut(group).add_factor(expression, level);
        Ok(())
    }

    fn define_sequence(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        id: SequenceId,
    ) -> Result<(), Error> {
        let mut instructions = Vec::new();
        for child in body_children(node) {
            instructions.push(self.build_instruction(doc, child)?);
        }
        self.model.sequence_mut(id).set_instructions(instructions);
        Ok(())
    }

    fn define_event_tree(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        id: EventTreeId,
    ) -> Result<(), Error> {
        for br_node in node.children().filter(|n| n.name() == TAG_DEFINE_BRANCH) {
            let name = required_attribute(br_node, ATTR_NAME)?;
            let branch_id = self.model.event_tree(id).branch(name).ok_or_else(|| {
                Error::Validation(format!(
                    "{}Branch {name} is not defined in {}",
                    at_line(br_node),
                    self.model.event_tree(id).name()
                ))
            })?;
            let branch = self.build_branch(doc, br_node, body_children(br_node), id)?;
            self.model.event_tree_mut(id).define_branch(branch_id, branch);
        }
        let initial = node.child(TAG_INITIAL_STATE).ok_or_else(|| {
            Error::Validation(format!(
                "{}event tree {} has no initial state",
                at_line(node),
                self.model.event_tree(id).name()
            ))
        })?;
        let nodes = initial.children().collect();
        let branch = self.build_branch(doc, initial, nodes, id)?;
        self.model.event_tree_mut(id).set_initial_state(branch);
        Ok(())
    }

    fn build_branch(
        &mut self,
        doc: usize,
        parent: XmlElement<'_>,
        nodes: Vec<XmlElement<'_>>,
        tree: EventTreeId,
    ) -> Result<Branch, Error> {
        let target_node = nodes.last().copied().ok_or_else(|| {
            Error::Validation(format!("{}branch has no target", at_line(parent)))
        })?;
        let target = match target_node.name() {
            TAG_FORK => {
                let fe_name = required_attribute(target_node, ATTR_FUNCTIONAL_EVENT)?;
                let functional_event = self
                    .model
                    .event_tree(tree)
                    .functional_event(fe_name)
                    .ok_or_else(|| {
                        Error::Validation(format!(
                            "{}Functional event {fe_name} is not defined in {}",
                            at_line(target_node),
                            self.model.event_tree(tree).name()
                        ))
                    })?;
                let mut paths = Vec::new();
                for path_node in target_node.children().filter(|n| n.name() == TAG_PATH) {
                    let state = required_attribute(path_node, ATTR_STATE)?.to_owned();
                    let path_children = path_node.children().collect();
                    let branch = self.build_branch(doc, path_node, path_children, tree)?;
                    paths.push(ForkPath { state, branch });
                }
                if paths.is_empty() {
                    return Err(Error::Validation(format!(
                        "{}fork on {fe_name} has no paths",
                        at_line(target_node)
                    )));
                }
                let fork = Fork::new(functional_event, paths);
                Target::Fork(self.model.event_tree_mut(tree).add_fork(fork))
            }
            TAG_SEQUENCE => {
                let name = required_attribute(target_node, ATTR_NAME)?;
                Target::Sequence(self.model.get_sequence(name).ok_or_else(|| {
                    Error::Validation(format!(
                        "{}Sequence {name} is not defined in the model",
                        at_line(target_node)
                    ))
                })?)
            }
            TAG_BRANCH => {
                let name = required_attribute(target_node, ATTR_NAME)?;
                Target::Branch(self.model.event_tree(tree).branch(name).ok_or_else(|| {
                    Error::Validation(format!(
                        "{}Branch {name} is not defined in {}",
                        at_line(target_node),
                        self.model.event_tree(tree).name()
                    ))
                })?)
            }
            other => {
                return Err(Error::Validation(format!(
                    "{}unexpected branch target `{other}`",
                    at_line(target_node)
                )));
            }
        };
        let mut instructions = Vec::new();
        for instruction_node in &nodes[..nodes.len() - 1] {
            instructions.push(self.build_instruction(doc, *instruction_node)?);
        }
        Ok(Branch::new(instructions, target))
    }

    fn build_instruction(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
    ) -> Result<Instruction, Error> {
        if node.name() != TAG_COLLECT_EXPRESSION {
            return Err(Error::Validation(format!(
                "{}unsupported instruction `{}`",
                at_line(node),
                node.name()
            )));
        }
        let expr_node = node.children().next().ok_or_else(|| {
            Error::Validation(format!(
                "{}collect-expression has no expression",
                at_line(node)
            ))
        })?;
        // Instructions resolve names at the model scope.
        let expression = self.build_expression(doc, expr_node, "")?;
        Ok(Instruction::CollectExpression(expression))
    }

    fn build_formula(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        base_path: &str,
    ) -> Result<Formula, Error> {
        // A `constant` or a named leaf disguised as a formula passes through.
        let operator = if node.attribute(ATTR_NAME).is_some() || node.name() == TAG_CONSTANT {
            Operator::Null
        } else {
            parse_operator(node)?
        };
        let mut formula = Formula::new(operator);
        if operator == Operator::Atleast {
            let min = required_attribute(node, ATTR_MIN)?;
            let vote_number: u32 = min.parse().map_err(|_| {
                Error::Validation(format!("{}invalid `min` attribute: {min}", at_line(node)))
            })?;
            formula.set_vote_number(vote_number);
        }
        if operator == Operator::Null {
            self.add_formula_argument(doc, node, &mut formula, base_path)?;
        } else {
            for child in node.children() {
                self.add_formula_argument(doc, child, &mut formula, base_path)?;
            }
        }
        formula
            .validate()
            .map_err(|err| err.prepend(&at_line(node)))?;
        Ok(formula)
    }

    fn add_formula_argument(
        &mut self,
        doc: usize,
        node: XmlElement<'_>,
        formula: &mut Formula,
        base_path: &str,
    ) -> Result<(), Error> {
        if node.name() == TAG_CONSTANT {
            let value = required_attribute(node, ATTR_VALUE)?;
            let literal = if value == "true" {
                Model::TRUE_EVENT
            } else {
                Model::FALSE_EVENT
            };
            return formula
                .add_event(EventId::House(literal), value)
                .map_err(|err| err.prepend(&at_line(node)));
        }
        let Some(name) = node.attribute(ATTR_NAME) else {
            let nested = self.build_formula(doc, node, base_path)?;
            formula.add_formula(nested);
            return Ok(());
        };
        // A `type` attribute overrides the tag, for `<event name= type=/>`.
        let kind = node.attribute(ATTR_TYPE).unwrap_or_else(|| node.name());
        let event = match kind {
            TAG_EVENT => self.model.get_event(name, base_path),
            TAG_GATE => self.model.get_gate(name, base_path).map(EventId::Gate),
            TAG_BASIC_EVENT => self
                .model
                .get_basic_event(name, base_path)
                .map(EventId::Basic),
            TAG_HOUSE_EVENT => self
                .model
                .get_house_event(name, base_path)
                .map(EventId::House),
            other => {
                return Err(Error::Validation(format!(
                    "{}unexpected event type `{other}`",
                    at_line(node)
                )));
            }
        };
        let event = event.ok_or_else(|| {
            Error::Validation(format!(
                "{}Undefined {kind} {name} with base path {base_path}",
                at_line(node)
            ))
        })?;
        formula
            .add_event(event, name)
            .map_err(|err| err.prepend(&at_line(node)))
    }

    // Validation and setup.

    fn validate(&mut self) -> Result<(), Error> {
        if let Some(chain) = cycle::detect_cycle(&GateGraph(&self.model)) {
            return Err(Error::Cycle(format!(
                "Detected a cycle in {} gate:\n{}",
                chain[0],
                cycle::print_cycle(&chain)
            )));
        }

        for (_, tree) in self.model.event_trees() {
            if let Some(chain) = cycle::detect_cycle(&BranchGraph(tree)) {
                return Err(Error::Cycle(format!(
                    "Detected a cycle in {} branch:\n{}",
                    chain[0],
                    cycle::print_cycle(&chain)
                )));
            }
        }

        if self.settings.probability_analysis {
            let missing = self
                .model
                .basic_events()
                .filter(|(_, event)| event.expression().is_none())
                .map(|(_, event)| event.name())
                .join("\n");
            if !missing.is_empty() {
                return Err(Error::Validation(format!(
                    "These basic events do not have expressions:\n{missing}"
                )));
            }
        }

        if let Some(chain) = cycle::detect_cycle(&ParameterGraph(&self.model)) {
            return Err(Error::Cycle(format!(
                "Detected a cycle in {} parameter:\n{}",
                chain[0],
                cycle::print_cycle(&chain)
            )));
        }

        // Deferred arity/range checks, now that recursion terminates.
        for (expression, node_ref) in &self.expressions {
            self.model.validate_expression(*expression).map_err(|err| {
                let (path, document) = &self.documents[node_ref.doc];
                let line = document.element(node_ref.node).line();
                Error::Validation(format!("{}Line {line}: {err}", in_file(path)))
            })?;
        }

        let ccf_failures = self
            .model
            .ccf_groups()
            .filter_map(|(_, group)| group.validate().err())
            .map(|err| err.to_string())
            .join("\n");
        if !ccf_failures.is_empty() {
            return Err(Error::Validation(format!(
                "Invalid distributions for CCF groups detected:\n{ccf_failures}"
            )));
        }

        let probability_failures = self
            .model
            .basic_events()
            .filter_map(|(_, event)| {
                let expression = event.expression()?;
                let probability = self.model.as_constant(expression)?;
                (!(0.0..=1.0).contains(&probability)).then(|| {
                    format!(
                        "Invalid probability {probability} for basic event {}",
                        event.name()
                    )
                })
            })
            .join("\n");
        if !probability_failures.is_empty() {
            return Err(Error::Validation(format!(
                "Invalid basic event probabilities detected:\n{probability_failures}"
            )));
        }

        let unused = self
            .model
            .parameters()
            .filter(|(_, parameter)| parameter.is_unused())
            .map(|(_, parameter)| parameter.name())
            .join(", ");
        if !unused.is_empty() {
            warn!("unused parameters: {unused}");
        }
        Ok(())
    }

    fn setup(&mut self) -> Result<(), Error> {
        debug!("collecting top events of fault trees");
        self.model.collect_top_events();
        debug!("applying CCF models");
        self.model.apply_ccf_models()
    }
}

// Element construction helpers.

fn at_line(node: XmlElement<'_>) -> String {
    format!("Line {}: ", node.line())
}

fn in_file(path: &Path) -> String {
    format!("In file '{}', ", path.display())
}

fn node_ref(doc: usize, node: XmlElement<'_>) -> NodeRef {
    NodeRef {
        doc,
        node: node.id(),
    }
}

fn required_attribute<'a>(node: XmlElement<'a>, name: &str) -> Result<&'a str, Error> {
    node.attribute(name).ok_or_else(|| {
        Error::Validation(format!(
            "{}`{}` requires a `{name}` attribute",
            at_line(node),
            node.name()
        ))
    })
}

/// The children carrying the element's body,
/// i.e. everything but the label and the attributes.
fn body_children(node: XmlElement<'_>) -> Vec<XmlElement<'_>> {
    node.children()
        .filter(|child| child.name() != TAG_LABEL && child.name() != TAG_ATTRIBUTES)
        .collect()
}

fn construct_element(node: XmlElement<'_>) -> Result<Element, Error> {
    let name = required_attribute(node, ATTR_NAME)?;
    if name.is_empty() {
        return Err(Error::Validation(format!(
            "{}empty `name` attribute",
            at_line(node)
        )));
    }
    let mut element = Element::new(name);
    attach_label_and_attributes(&mut element, node)?;
    Ok(element)
}

fn construct_scoped(
    node: XmlElement<'_>,
    base_path: &str,
    container_role: Role,
) -> Result<ScopedElement, Error> {
    let element = construct_element(node)?;
    let role = match node.attribute(ATTR_ROLE) {
        None | Some("") => container_role,
        Some(role) => role
            .parse()
            .map_err(|err: Error| err.prepend(&at_line(node)))?,
    };
    Ok(ScopedElement::new(element, base_path, role))
}

fn attach_label_and_attributes(
    element: &mut Element,
    node: XmlElement<'_>,
) -> Result<(), Error> {
    if let Some(label) = node.child(TAG_LABEL) {
        element.set_label(label.text());
    }
    if let Some(attributes) = node.child(TAG_ATTRIBUTES) {
        for attribute in attributes.children().filter(|n| n.name() == TAG_ATTRIBUTE) {
            let name = required_attribute(attribute, ATTR_NAME)?.to_owned();
            let value = required_attribute(attribute, ATTR_VALUE)?.to_owned();
            let kind = attribute.attribute(ATTR_TYPE).map(str::to_owned);
            element
                .add_attribute(Attribute { name, value, kind })
                .map_err(|err| err.prepend(&at_line(attribute)))?;
        }
    }
    Ok(())
}

fn parse_operator(node: XmlElement<'_>) -> Result<Operator, Error> {
    match node.name() {
        "and" => Ok(Operator::And),
        "or" => Ok(Operator::Or),
        "atleast" | "vote" => Ok(Operator::Atleast),
        "xor" => Ok(Operator::Xor),
        "not" => Ok(Operator::Not),
        "nand" => Ok(Operator::Nand),
        "nor" => Ok(Operator::Nor),
        other => Err(Error::Validation(format!(
            "{}unexpected formula `{other}`",
            at_line(node)
        ))),
    }
}

// Input file checks.

fn check_file_existence(xml_files: &[PathBuf]) -> Result<(), Error> {
    for xml_file in xml_files {
        if !xml_file.exists() {
            return Err(Error::Io(format!(
                "File doesn't exist: {}",
                xml_file.display()
            )));
        }
    }
    Ok(())
}

fn check_duplicate_files(xml_files: &[PathBuf]) -> Result<(), Error> {
    let mut canonical: Vec<(PathBuf, &PathBuf)> = xml_files
        .iter()
        .map(|xml_file| {
            std::fs::canonicalize(xml_file)
                .map(|resolved| (resolved, xml_file))
                .map_err(|err| Error::Io(format!("{}: {err}", xml_file.display())))
        })
        .collect::<Result<_, _>>()?;
    canonical.sort();
    if let Some(((resolved, first), (_, second))) = canonical
        .iter()
        .tuple_windows()
        .find(|(lhs, rhs)| lhs.0 == rhs.0)
    {
        return Err(Error::DuplicateArgument(format!(
            "Duplicate input files:\n    {}\n    {}\n  POSIX Path: {}",
            first.display(),
            second.display(),
            resolved.display()
        )));
    }
    Ok(())
}
