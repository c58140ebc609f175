//! Fault trees and their hierarchical components.

use crate::ccf::CcfGroupId;
use crate::element::{Role, ScopedElement};
use crate::error::Error;
use crate::event::{BasicEventId, GateId, HouseEventId};
use crate::parameter::ParameterId;

/// An indexing object for fault trees in a model.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FaultTreeId(pub(crate) u32);

impl FaultTreeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A hierarchical container of fault-tree constructs.
///
/// Members are registered in the model;
/// the component keeps handles to what it declared.
#[derive(Debug, Clone)]
pub struct Component {
    scoped: ScopedElement,
    gates: Vec<GateId>,
    basic_events: Vec<BasicEventId>,
    house_events: Vec<HouseEventId>,
    parameters: Vec<ParameterId>,
    ccf_groups: Vec<CcfGroupId>,
    components: Vec<Component>,
}

impl Component {
    pub fn new(scoped: ScopedElement) -> Self {
        Self {
            scoped,
            gates: Vec::new(),
            basic_events: Vec::new(),
            house_events: Vec::new(),
            parameters: Vec::new(),
            ccf_groups: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.scoped.name()
    }

    pub fn scoped(&self) -> &ScopedElement {
        &self.scoped
    }

    pub fn role(&self) -> Role {
        self.scoped.role()
    }

    pub fn full_path(&self) -> String {
        self.scoped.full_path()
    }

    pub fn add_gate(&mut self, gate: GateId) {
        self.gates.push(gate);
    }

    pub fn add_basic_event(&mut self, event: BasicEventId) {
        self.basic_events.push(event);
    }

    pub fn add_house_event(&mut self, event: HouseEventId) {
        self.house_events.push(event);
    }

    pub fn add_parameter(&mut self, parameter: ParameterId) {
        self.parameters.push(parameter);
    }

    pub fn add_ccf_group(&mut self, group: CcfGroupId) {
        self.ccf_groups.push(group);
    }

    /// Attaches a nested component.
    /// Component names are unique within their container.
    pub fn add_component(&mut self, component: Component) -> Result<(), Error> {
        if self.components.iter().any(|c| c.name() == component.name()) {
            return Err(Error::Validation(format!(
                "redefinition of component {} in {}",
                component.name(),
                self.name()
            )));
        }
        self.components.push(component);
        Ok(())
    }

    pub fn gates(&self) -> &[GateId] {
        &self.gates
    }

    pub fn basic_events(&self) -> &[BasicEventId] {
        &self.basic_events
    }

    pub fn house_events(&self) -> &[HouseEventId] {
        &self.house_events
    }

    pub fn parameters(&self) -> &[ParameterId] {
        &self.parameters
    }

    pub fn ccf_groups(&self) -> &[CcfGroupId] {
        &self.ccf_groups
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// All gates of this component and its nested components.
    pub fn gather_gates(&self, out: &mut Vec<GateId>) {
        out.extend_from_slice(&self.gates);
        for component in &self.components {
            component.gather_gates(out);
        }
    }
}

/// A top-level component whose name roots the base path of its members.
///
/// After setup, the tree knows its top events:
/// gates no other gate of the tree uses as an argument.
#[derive(Debug, Clone)]
pub struct FaultTree {
    component: Component,
    top_events: Vec<GateId>,
}

impl FaultTree {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            top_events: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    pub fn top_events(&self) -> &[GateId] {
        &self.top_events
    }

    pub(crate) fn set_top_events(&mut self, top_events: Vec<GateId>) {
        self.top_events = top_events;
    }
}
