//! Structural envelope checks run before any semantic processing.
//!
//! The full RELAX NG grammar of the format is an external concern;
//! this gate verifies the document skeleton so the semantic passes can
//! rely on it: the root element, the recognized top-level constructs,
//! and the presence of `name` attributes on definitions.

use arbor_core::Error;

use crate::vocabulary::*;
use crate::xml::{XmlDocument, XmlElement};

pub(crate) fn validate(document: &XmlDocument) -> Result<(), Error> {
    let root = document.root();
    if root.name() != TAG_OPSA_MEF {
        return Err(Error::Validation(format!(
            "Document failed schema validation:\nunexpected root element `{}`",
            root.name()
        )));
    }
    for child in root.children() {
        match child.name() {
            TAG_DEFINE_EVENT_TREE | TAG_DEFINE_FAULT_TREE | TAG_DEFINE_CCF_GROUP => {
                require_name(child)?;
            }
            TAG_MODEL_DATA | TAG_LABEL | TAG_ATTRIBUTES => {}
            unknown => {
                return Err(Error::Validation(format!(
                    "Document failed schema validation:\nLine {}: unexpected element `{unknown}`",
                    child.line()
                )));
            }
        }
    }
    Ok(())
}

fn require_name(element: XmlElement<'_>) -> Result<(), Error> {
    match element.attribute(ATTR_NAME) {
        Some(name) if !name.is_empty() => Ok(()),
        _ => Err(Error::Validation(format!(
            "Document failed schema validation:\nLine {}: `{}` requires a `name` attribute",
            element.line(),
            element.name()
        ))),
    }
}
