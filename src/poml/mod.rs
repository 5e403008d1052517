//! POML markup: parsing, document model and variable substitution

pub mod document;
pub mod parser;
pub mod variables;

pub use document::{BuildContext, Document, DocumentRef, Example, Image, Section, Table};
pub use parser::{Element, Node, ROOT_TAG, check_root, parse};
pub use variables::{
    SubstitutionLog, Variables, VariablesOutcome, default_schema, parse_variables, substitute,
    substitute_str,
};
