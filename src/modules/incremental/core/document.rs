use std::collections::{BTreeSet, HashMap, HashSet};

use async_graphql::parser::types::{
    Directive, DocumentOperations, ExecutableDocument, FragmentDefinition, OperationDefinition,
    OperationType, Selection, SelectionSet, VariableDefinition,
};
use async_graphql::{Name, Pos, Positioned};
use async_graphql_value::Value;

pub const DEFER: &str = "defer";
pub const STREAM: &str = "stream";

pub type Fragments = HashMap<Name, Positioned<FragmentDefinition>>;

pub fn pos<A>(a: A) -> Positioned<A> {
    Positioned::new(a, Pos::default())
}

pub fn is_incremental(directive: &Directive) -> bool {
    matches!(directive.name.node.as_str(), DEFER | STREAM)
}

pub fn find_directive<'a>(
    directives: &'a [Positioned<Directive>],
    name: &str,
) -> Option<&'a Directive> {
    directives
        .iter()
        .map(|directive| &directive.node)
        .find(|directive| directive.name.node.as_str() == name)
}

pub fn argument<'a>(directive: &'a Directive, name: &str) -> Option<&'a Value> {
    directive
        .arguments
        .iter()
        .find(|(argument, _)| argument.node.as_str() == name)
        .map(|(_, value)| &value.node)
}

/// Removes every `@defer` and `@stream` below `selection_set` and returns how
/// many were removed.
pub fn strip_incremental(selection_set: &mut SelectionSet) -> usize {
    let mut removed = 0;
    for item in &mut selection_set.items {
        let directives = item.node.directives_mut();
        let before = directives.len();
        directives.retain(|directive| !is_incremental(&directive.node));
        removed += before - directives.len();

        removed += match &mut item.node {
            Selection::Field(field) => strip_incremental(&mut field.node.selection_set.node),
            Selection::InlineFragment(fragment) => {
                strip_incremental(&mut fragment.node.selection_set.node)
            }
            Selection::FragmentSpread(_) => 0,
        };
    }
    removed
}

/// Removes every `@defer` and `@stream` from all operations and fragments of
/// `document` and returns how many were removed.
pub fn strip_document(document: &mut ExecutableDocument) -> usize {
    let mut removed = 0;
    for definition in document.fragments.values_mut() {
        removed += strip_incremental(&mut definition.node.selection_set.node);
    }
    match &mut document.operations {
        DocumentOperations::Single(operation) => {
            removed += strip_incremental(&mut operation.node.selection_set.node);
        }
        DocumentOperations::Multiple(operations) => {
            for operation in operations.values_mut() {
                removed += strip_incremental(&mut operation.node.selection_set.node);
            }
        }
    }
    removed
}

#[derive(Debug, Default)]
pub struct References {
    pub variables: HashSet<Name>,
    pub fragments: BTreeSet<Name>,
}

/// Variables and fragments `selection_set` refers to, following fragment
/// spreads transitively.
pub fn collect_references(selection_set: &SelectionSet, fragments: &Fragments) -> References {
    let mut references = References::default();
    visit_selection_set(selection_set, fragments, &mut references);
    references
}

fn visit_selection_set(
    selection_set: &SelectionSet,
    fragments: &Fragments,
    references: &mut References,
) {
    for item in &selection_set.items {
        visit_directives(item.node.directives(), references);
        match &item.node {
            Selection::Field(field) => {
                for (_, value) in &field.node.arguments {
                    visit_value(&value.node, references);
                }
                visit_selection_set(&field.node.selection_set.node, fragments, references);
            }
            Selection::InlineFragment(fragment) => {
                visit_selection_set(&fragment.node.selection_set.node, fragments, references);
            }
            Selection::FragmentSpread(spread) => {
                let name = &spread.node.fragment_name.node;
                if !references.fragments.insert(name.clone()) {
                    continue;
                }
                if let Some(definition) = fragments.get(name) {
                    visit_directives(&definition.node.directives, references);
                    visit_selection_set(&definition.node.selection_set.node, fragments, references);
                }
            }
        }
    }
}

fn visit_directives(directives: &[Positioned<Directive>], references: &mut References) {
    for directive in directives {
        for (_, value) in &directive.node.arguments {
            visit_value(&value.node, references);
        }
    }
}

fn visit_value(value: &Value, references: &mut References) {
    match value {
        Value::Variable(name) => {
            references.variables.insert(name.clone());
        }
        Value::List(items) => items
            .iter()
            .for_each(|item| visit_value(item, references)),
        Value::Object(fields) => fields
            .values()
            .for_each(|field| visit_value(field, references)),
        _ => {}
    }
}

/// Builds an executable document with one anonymous operation selecting
/// `selection_set`. Only the variables and fragments the selection refers to
/// are declared, so the engine's unused-variable and unused-fragment rules hold.
pub fn single_operation_document(
    ty: OperationType,
    variable_definitions: &[Positioned<VariableDefinition>],
    selection_set: SelectionSet,
    fragments: &Fragments,
) -> ExecutableDocument {
    let references = collect_references(&selection_set, fragments);

    let variable_definitions = variable_definitions
        .iter()
        .filter(|definition| references.variables.contains(&definition.node.name.node))
        .cloned()
        .collect();
    let fragments = fragments
        .iter()
        .filter(|(name, _)| references.fragments.contains(*name))
        .map(|(name, definition)| (name.clone(), definition.clone()))
        .collect();

    ExecutableDocument {
        operations: DocumentOperations::Single(pos(OperationDefinition {
            ty,
            variable_definitions,
            directives: Vec::new(),
            selection_set: pos(selection_set),
        })),
        fragments,
    }
}
