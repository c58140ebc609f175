use std::str::FromStr;

use crate::error::Error;

/// Visibility of a role-bearing element.
///
/// Public names are also resolvable at the model scope by their bare name;
/// private names only within their declaring container.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Public,
    Private,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Public => "public",
            Role::Private => "private",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "public" => Ok(Role::Public),
            "private" => Ok(Role::Private),
            _ => Err(Error::Validation(format!("invalid role `{s}`"))),
        }
    }
}

/// An Open-PSA attribute triple attached to a model element.
///
/// These are not XML attributes but the format's arbitrary annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub kind: Option<String>,
}

/// Data common to every named model construct:
/// a name, an optional label, and a set of uniquely named attributes.
#[derive(Debug, Clone, Default)]
pub struct Element {
    name: String,
    label: Option<String>,
    attributes: Vec<Attribute>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attaches an attribute.
    /// Attribute names are unique per element.
    pub fn add_attribute(&mut self, attribute: Attribute) -> Result<(), Error> {
        if self.attributes.iter().any(|a| a.name == attribute.name) {
            return Err(Error::Validation(format!(
                "duplicate attribute `{}` on element {}",
                attribute.name, self.name
            )));
        }
        self.attributes.push(attribute);
        Ok(())
    }
}

/// An [`Element`] subject to scoped name resolution:
/// it carries a [`Role`] and the dotted path of its ancestor containers.
#[derive(Debug, Clone)]
pub struct ScopedElement {
    element: Element,
    role: Role,
    base_path: String,
}

impl ScopedElement {
    pub fn new(element: Element, base_path: impl Into<String>, role: Role) -> Self {
        Self {
            element,
            role,
            base_path: base_path.into(),
        }
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

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// The element's name qualified by its ancestor path.
    pub fn full_path(&self) -> String {
        if self.base_path.is_empty() {
            self.element.name().to_owned()
        } else {
            format!("{}.{}", self.base_path, self.element.name())
        }
    }

    /// The key under which the element is indexed:
    /// the bare name for public elements, the full path for private ones.
    pub fn index_key(&self) -> String {
        match self.role {
            Role::Public => self.element.name().to_owned(),
            Role::Private => self.full_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_path_and_index_key() {
        let element = Element::new("valve");
        let public = ScopedElement::new(element.clone(), "plant.cooling", Role::Public);
        assert_eq!(public.full_path(), "plant.cooling.valve");
        assert_eq!(public.index_key(), "valve");

        let private = ScopedElement::new(element, "plant.cooling", Role::Private);
        assert_eq!(private.index_key(), "plant.cooling.valve");

        let top = ScopedElement::new(Element::new("pump"), "", Role::Private);
        assert_eq!(top.full_path(), "pump");
    }

    #[test]
    fn duplicate_attribute() {
        let mut element = Element::new("pump");
        let attribute = Attribute {
            name: "flavor".to_owned(),
            value: "mono".to_owned(),
            kind: None,
        };
        element.add_attribute(attribute.clone()).unwrap();
        assert!(element.add_attribute(attribute).is_err());
    }

    #[test]
    fn role_parsing() {
        assert_eq!("public".parse::<Role>().unwrap(), Role::Public);
        assert_eq!("private".parse::<Role>().unwrap(), Role::Private);
        assert!("protected".parse::<Role>().is_err());
    }
}
