use std::collections::HashSet;

use async_graphql::parser::parse_query;
use async_graphql::parser::types::{
    Directive, DocumentOperations, ExecutableDocument, Field, FragmentSpread, InlineFragment,
    OperationDefinition, OperationType, Selection, SelectionSet, VariableDefinition,
};
use async_graphql::{Name, Positioned, Request, Value as ConstValue, Variables};
use async_graphql_value::Value;

use crate::modules::incremental::core::document::{
    DEFER, Fragments, STREAM, argument, find_directive, is_incremental, pos,
    single_operation_document, strip_document, strip_incremental,
};

/// A root-level fragment whose fields are delivered after the initial payload.
#[derive(Debug, Clone)]
pub struct DeferredGroup {
    pub label: Option<String>,
    selection_set: SelectionSet,
}

/// A root list field whose items are delivered one payload at a time.
#[derive(Debug, Clone)]
pub struct StreamedField {
    pub label: Option<String>,
    pub response_key: String,
    pub initial_count: usize,
    field: Positioned<Field>,
}

/// How a query using `@defer` / `@stream` is split into requests the engine
/// can execute on its own.
///
/// Only the root selection set is split: deferred fragments and streamed fields
/// directly under the query root get their own requests, every other
/// occurrence of the directives is dropped and its content resolved eagerly.
#[derive(Debug)]
pub struct IncrementalPlan {
    query: String,
    operation_name: Option<String>,
    variables: Variables,
    variable_definitions: Vec<Positioned<VariableDefinition>>,
    collapsed: ExecutableDocument,
    initial: SelectionSet,
    deferred: Vec<DeferredGroup>,
    streamed: Vec<StreamedField>,
}

impl IncrementalPlan {
    /// Returns `None` when the request does not use incremental delivery or
    /// cannot be planned; such requests go to the engine untouched so it can
    /// answer (or reject) them itself.
    pub fn from_request(request: &Request, streamable: &HashSet<String>) -> Option<Self> {
        let document = parse_query(&request.query).ok()?;
        let operation = select_operation(&document.operations, request.operation_name.as_deref())?;
        if operation.ty != OperationType::Query {
            return None;
        }

        let mut collapsed = document.clone();
        if strip_document(&mut collapsed) == 0 {
            return None;
        }

        let mut planner = Planner {
            source: &document.fragments,
            stripped: &collapsed.fragments,
            streamable,
            conditions: Conditions {
                variables: &request.variables,
                definitions: &operation.variable_definitions,
            },
            visiting: Vec::new(),
            deferred: Vec::new(),
            streamed: Vec::new(),
        };
        let initial = planner.split(&operation.selection_set.node, false)?;
        let (deferred, streamed) = (planner.deferred, planner.streamed);

        Some(Self {
            query: request.query.clone(),
            operation_name: request.operation_name.clone(),
            variables: request.variables.clone(),
            variable_definitions: operation.variable_definitions.clone(),
            collapsed,
            initial,
            deferred,
            streamed,
        })
    }

    /// Whether anything is left to deliver after the initial payload.
    pub fn is_incremental(&self) -> bool {
        !self.deferred.is_empty() || !self.streamed.is_empty()
    }

    pub fn deferred(&self) -> &[DeferredGroup] {
        &self.deferred
    }

    pub fn streamed(&self) -> &[StreamedField] {
        &self.streamed
    }

    /// The fields resolved for the initial payload, or `None` when every root
    /// selection is deferred or streamed.
    pub fn initial_request(&self) -> Option<Request> {
        if self.initial.items.is_empty() {
            return None;
        }
        Some(self.request(OperationType::Query, self.initial.clone()))
    }

    /// The whole document with the incremental directives removed. Every
    /// operation, variable definition and fragment is kept, so the engine
    /// validates it exactly as the client wrote it.
    pub fn collapsed_request(&self) -> Request {
        let mut request = Request::new(self.query.clone()).variables(self.variables.clone());
        request.operation_name = self.operation_name.clone();
        request.set_parsed_query(self.collapsed.clone());
        request
    }

    pub fn deferred_request(&self, group: &DeferredGroup) -> Request {
        self.request(OperationType::Query, group.selection_set.clone())
    }

    /// A subscription selecting only the streamed field; each event carries
    /// one item under the field's response key.
    pub fn stream_request(&self, streamed: &StreamedField) -> Request {
        let selection_set = SelectionSet {
            items: vec![pos(Selection::Field(streamed.field.clone()))],
        };
        self.request(OperationType::Subscription, selection_set)
    }

    fn request(&self, ty: OperationType, selection_set: SelectionSet) -> Request {
        let mut request = Request::new(self.query.clone()).variables(self.variables.clone());
        request.set_parsed_query(single_operation_document(
            ty,
            &self.variable_definitions,
            selection_set,
            &self.collapsed.fragments,
        ));
        request
    }
}

fn select_operation<'a>(
    operations: &'a DocumentOperations,
    operation_name: Option<&str>,
) -> Option<&'a OperationDefinition> {
    match (operations, operation_name) {
        (DocumentOperations::Single(operation), _) => Some(&operation.node),
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .iter()
            .find(|(candidate, _)| candidate.as_str() == name)
            .map(|(_, operation)| &operation.node),
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => {
            operations.values().next().map(|operation| &operation.node)
        }
        _ => None,
    }
}

/// Evaluates directive arguments against the request variables, falling back
/// to the defaults declared by the operation.
struct Conditions<'a> {
    variables: &'a Variables,
    definitions: &'a [Positioned<VariableDefinition>],
}

impl Conditions<'_> {
    fn resolve(&self, value: &Value) -> Option<ConstValue> {
        match value {
            Value::Variable(name) => self.variable(name),
            Value::Boolean(flag) => Some(ConstValue::Boolean(*flag)),
            Value::Number(number) => Some(ConstValue::Number(number.clone())),
            Value::String(text) => Some(ConstValue::String(text.clone())),
            _ => None,
        }
    }

    fn variable(&self, name: &Name) -> Option<ConstValue> {
        if let Some(value) = self.variables.get(name.as_str()) {
            return Some(value.clone());
        }
        self.definitions
            .iter()
            .find(|definition| definition.node.name.node == *name)
            .and_then(|definition| definition.node.default_value.as_ref())
            .map(|default| default.node.clone())
    }

    fn boolean(&self, value: &Value) -> Option<bool> {
        match self.resolve(value)? {
            ConstValue::Boolean(flag) => Some(flag),
            _ => None,
        }
    }

    /// `if` of `@defer`/`@stream`; anything but an explicit `false` enables it.
    fn enabled(&self, directive: &Directive) -> bool {
        argument(directive, "if")
            .and_then(|value| self.boolean(value))
            .unwrap_or(true)
    }

    fn excluded(&self, directives: &[Positioned<Directive>]) -> bool {
        let skipped = find_directive(directives, "skip")
            .and_then(|directive| argument(directive, "if"))
            .and_then(|value| self.boolean(value))
            .unwrap_or(false);
        let included = find_directive(directives, "include")
            .and_then(|directive| argument(directive, "if"))
            .and_then(|value| self.boolean(value))
            .unwrap_or(true);
        skipped || !included
    }

    fn label(&self, directive: &Directive) -> Option<String> {
        match self.resolve(argument(directive, "label")?)? {
            ConstValue::String(label) => Some(label),
            _ => None,
        }
    }

    fn initial_count(&self, directive: &Directive) -> usize {
        argument(directive, "initialCount")
            .and_then(|value| self.resolve(value))
            .and_then(|value| match value {
                ConstValue::Number(number) => number.as_u64(),
                _ => None,
            })
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(0)
    }
}

struct Planner<'a> {
    source: &'a Fragments,
    stripped: &'a Fragments,
    streamable: &'a HashSet<String>,
    conditions: Conditions<'a>,
    visiting: Vec<Name>,
    deferred: Vec<DeferredGroup>,
    streamed: Vec<StreamedField>,
}

impl Planner<'_> {
    /// Returns the part of a root-level `selection_set` that belongs to the
    /// initial payload, recording deferred groups and streamed fields on the
    /// way. `excluded` is set under an enclosing `@skip`/`@include` that
    /// evaluates to "leave out".
    fn split(&mut self, selection_set: &SelectionSet, excluded: bool) -> Option<SelectionSet> {
        let mut initial = Vec::new();
        for item in &selection_set.items {
            match &item.node {
                Selection::Field(field) => {
                    if let Some(field) = self.field(field, excluded) {
                        initial.push(pos(Selection::Field(field)));
                    }
                }
                Selection::InlineFragment(fragment) => {
                    if let Some(fragment) = self.inline_fragment(&fragment.node, excluded)? {
                        initial.push(pos(Selection::InlineFragment(fragment)));
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if let Some(fragment) = self.fragment_spread(&spread.node, excluded)? {
                        initial.push(pos(Selection::InlineFragment(fragment)));
                    }
                }
            }
        }
        Some(SelectionSet { items: initial })
    }

    fn field(&mut self, field: &Positioned<Field>, excluded: bool) -> Option<Positioned<Field>> {
        let stream = find_directive(&field.node.directives, STREAM)
            .filter(|directive| self.conditions.enabled(directive));
        let streamable = self.streamable.contains(field.node.name.node.as_str());

        let mut stripped = field.clone();
        stripped
            .node
            .directives
            .retain(|directive| !is_incremental(&directive.node));
        strip_incremental(&mut stripped.node.selection_set.node);

        let Some(stream) = stream.filter(|_| streamable) else {
            return Some(stripped);
        };
        if !excluded && !self.conditions.excluded(&field.node.directives) {
            let response_key = stripped
                .node
                .alias
                .as_ref()
                .unwrap_or(&stripped.node.name)
                .node
                .to_string();
            stripped
                .node
                .directives
                .retain(|directive| !matches!(directive.node.name.node.as_str(), "skip" | "include"));
            self.streamed.push(StreamedField {
                label: self.conditions.label(stream),
                response_key,
                initial_count: self.conditions.initial_count(stream),
                field: stripped,
            });
        }
        None
    }

    fn inline_fragment(
        &mut self,
        fragment: &InlineFragment,
        excluded: bool,
    ) -> Option<Option<Positioned<InlineFragment>>> {
        if let Some(defer) = self.deferral(&fragment.directives) {
            if !excluded && !self.conditions.excluded(&fragment.directives) {
                let mut selection_set = fragment.selection_set.node.clone();
                strip_incremental(&mut selection_set);
                self.deferred.push(DeferredGroup {
                    label: self.conditions.label(defer),
                    selection_set,
                });
            }
            return Some(None);
        }

        let excluded = excluded || self.conditions.excluded(&fragment.directives);
        let selection_set = self.split(&fragment.selection_set.node, excluded)?;
        Some(non_empty_fragment(
            fragment.type_condition.clone(),
            &fragment.directives,
            selection_set,
        ))
    }

    fn fragment_spread(
        &mut self,
        spread: &FragmentSpread,
        excluded: bool,
    ) -> Option<Option<Positioned<InlineFragment>>> {
        let name = &spread.fragment_name.node;
        let definition = &self.source.get(name)?.node;

        if let Some(defer) = self.deferral(&spread.directives) {
            if !excluded && !self.conditions.excluded(&spread.directives) {
                let stripped = &self.stripped.get(name)?.node;
                self.deferred.push(DeferredGroup {
                    label: self.conditions.label(defer),
                    selection_set: stripped.selection_set.node.clone(),
                });
            }
            return Some(None);
        }

        if self.visiting.contains(name) {
            return None;
        }
        self.visiting.push(name.clone());
        let excluded = excluded
            || self.conditions.excluded(&spread.directives)
            || self.conditions.excluded(&definition.directives);
        let selection_set = self.split(&definition.selection_set.node, excluded);
        self.visiting.pop();

        Some(non_empty_fragment(
            Some(definition.type_condition.clone()),
            &spread.directives,
            selection_set?,
        ))
    }

    fn deferral<'d>(&self, directives: &'d [Positioned<Directive>]) -> Option<&'d Directive> {
        find_directive(directives, DEFER).filter(|directive| self.conditions.enabled(directive))
    }
}

fn non_empty_fragment(
    type_condition: Option<Positioned<async_graphql::parser::types::TypeCondition>>,
    directives: &[Positioned<Directive>],
    selection_set: SelectionSet,
) -> Option<Positioned<InlineFragment>> {
    if selection_set.items.is_empty() {
        return None;
    }
    Some(pos(InlineFragment {
        type_condition,
        directives: directives
            .iter()
            .filter(|directive| !is_incremental(&directive.node))
            .cloned()
            .collect(),
        selection_set: pos(selection_set),
    }))
}

#[cfg(test)]
mod incremental_plan_tests {
    use async_graphql::parser::types::{DocumentOperations, ExecutableDocument};
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    #[fixture]
    fn streamable() -> HashSet<String> {
        HashSet::from(["alphabet".to_string()])
    }

    fn root_field_names(request: &mut Request) -> Vec<String> {
        let document: &ExecutableDocument = request.parsed_query().unwrap();
        let DocumentOperations::Single(operation) = &document.operations else {
            panic!("expected a single operation");
        };
        let mut names = Vec::new();
        collect_field_names(&operation.node.selection_set.node, &mut names);
        names
    }

    fn collect_field_names(selection_set: &SelectionSet, names: &mut Vec<String>) {
        for item in &selection_set.items {
            match &item.node {
                Selection::Field(field) => names.push(field.node.name.node.to_string()),
                Selection::InlineFragment(fragment) => {
                    collect_field_names(&fragment.node.selection_set.node, names)
                }
                Selection::FragmentSpread(spread) => {
                    names.push(format!("...{}", spread.node.fragment_name.node))
                }
            }
        }
    }

    #[rstest]
    #[case("{ fastField slowField(waitFor: 10) }")]
    #[case("mutation { fastField @defer }")]
    #[case("{ fastField ")]
    #[case("query A { fastField ... @defer { slowField(waitFor: 1) } } query B { fastField }")]
    fn it_should_not_plan_requests_the_engine_handles_alone(
        streamable: HashSet<String>,
        #[case] query: &str,
    ) {
        assert!(IncrementalPlan::from_request(&Request::new(query), &streamable).is_none());
    }

    #[rstest]
    fn it_should_defer_a_root_inline_fragment(streamable: HashSet<String>) {
        let request =
            Request::new("{ fastField ... @defer(label: \"slow\") { slowField(waitFor: 250) } }");

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        assert!(plan.is_incremental());
        assert_eq!(plan.deferred().len(), 1);
        assert_eq!(plan.deferred()[0].label.as_deref(), Some("slow"));
        let mut initial = plan.initial_request().unwrap();
        assert_eq!(root_field_names(&mut initial), vec!["fastField"]);
        let mut deferred = plan.deferred_request(&plan.deferred()[0]);
        assert_eq!(root_field_names(&mut deferred), vec!["slowField"]);
    }

    #[rstest]
    fn it_should_defer_a_named_fragment_spread(streamable: HashSet<String>) {
        let request = Request::new(
            "query { fastField ...Slow @defer } fragment Slow on Query { slowField(waitFor: 1) }",
        );

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        assert_eq!(plan.deferred().len(), 1);
        let mut deferred = plan.deferred_request(&plan.deferred()[0]);
        assert_eq!(root_field_names(&mut deferred), vec!["slowField"]);
    }

    #[rstest]
    fn it_should_stream_a_streamable_root_field(streamable: HashSet<String>) {
        let request = Request::new(
            "{ letters: alphabet @stream(initialCount: 2, label: \"abc\") fastField }",
        );

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        assert_eq!(plan.streamed().len(), 1);
        let streamed = &plan.streamed()[0];
        assert_eq!(streamed.response_key, "letters");
        assert_eq!(streamed.initial_count, 2);
        assert_eq!(streamed.label.as_deref(), Some("abc"));
        let mut initial = plan.initial_request().unwrap();
        assert_eq!(root_field_names(&mut initial), vec!["fastField"]);
        let mut subscription = plan.stream_request(streamed);
        assert_eq!(root_field_names(&mut subscription), vec!["alphabet"]);
    }

    #[rstest]
    fn it_should_leave_nothing_for_the_initial_request_when_everything_is_deferred(
        streamable: HashSet<String>,
    ) {
        let request = Request::new("{ alphabet @stream }");

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        assert!(plan.initial_request().is_none());
        assert_eq!(plan.streamed()[0].initial_count, 0);
    }

    #[rstest]
    #[case("{ fastField ... @defer(if: false) { slowField(waitFor: 1) } }", json!({}))]
    #[case(
        "query($later: Boolean!) { fastField ... @defer(if: $later) { slowField(waitFor: 1) } }",
        json!({ "later": false })
    )]
    #[case(
        "query($later: Boolean = false) { fastField ... @defer(if: $later) { slowField(waitFor: 1) } }",
        json!({})
    )]
    #[case("{ fastField { __typename } slowField(waitFor: 1) @defer }", json!({}))]
    fn it_should_resolve_disabled_or_nested_directives_eagerly(
        streamable: HashSet<String>,
        #[case] query: &str,
        #[case] variables: serde_json::Value,
    ) {
        let request = Request::new(query).variables(Variables::from_json(variables));

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        assert!(!plan.is_incremental());
        let mut collapsed = plan.collapsed_request();
        assert!(root_field_names(&mut collapsed).contains(&"slowField".to_string()));
    }

    #[rstest]
    fn it_should_ignore_stream_on_fields_that_cannot_stream(streamable: HashSet<String>) {
        let request = Request::new("{ fastField @stream }");

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        assert!(!plan.is_incremental());
        let mut initial = plan.initial_request().unwrap();
        assert_eq!(root_field_names(&mut initial), vec!["fastField"]);
    }

    #[rstest]
    fn it_should_drop_deferred_groups_under_a_skipped_fragment(streamable: HashSet<String>) {
        let request = Request::new(
            "query($skip: Boolean!) { fastField ... @skip(if: $skip) { ... @defer { slowField(waitFor: 1) } } }",
        )
        .variables(Variables::from_json(json!({ "skip": true })));

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        assert!(plan.deferred().is_empty());
    }

    #[rstest]
    fn it_should_keep_every_definition_in_the_collapsed_request(streamable: HashSet<String>) {
        let request = Request::new(
            "query Main($unused: Int) { fastField ... @defer { slowField(waitFor: 1) } } query Other { fastField } fragment Bad on Query { nope }",
        )
        .operation_name("Main");

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        let mut collapsed = plan.collapsed_request();
        assert_eq!(collapsed.operation_name.as_deref(), Some("Main"));
        let document = collapsed.parsed_query().unwrap();
        let DocumentOperations::Multiple(operations) = &document.operations else {
            panic!("expected both operations");
        };
        assert_eq!(operations.len(), 2);
        assert_eq!(operations["Main"].node.variable_definitions.len(), 1);
        assert!(document.fragments.contains_key("Bad"));
    }

    #[rstest]
    fn it_should_declare_only_the_variables_each_request_uses(streamable: HashSet<String>) {
        let request = Request::new(
            "query($fast: Boolean!, $wait: Int!) { fastField @include(if: $fast) ... @defer { slowField(waitFor: $wait) } }",
        )
        .variables(Variables::from_json(json!({ "fast": true, "wait": 5 })));

        let plan = IncrementalPlan::from_request(&request, &streamable).unwrap();

        let mut initial = plan.initial_request().unwrap();
        let mut deferred = plan.deferred_request(&plan.deferred()[0]);
        for (request, expected) in [(&mut initial, "fast"), (&mut deferred, "wait")] {
            let DocumentOperations::Single(operation) =
                &request.parsed_query().unwrap().operations
            else {
                panic!("expected a single operation");
            };
            let declared: Vec<&str> = operation
                .node
                .variable_definitions
                .iter()
                .map(|definition| definition.node.name.node.as_str())
                .collect();
            assert_eq!(declared, vec![expected]);
        }
    }
}
