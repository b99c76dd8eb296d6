use async_graphql::{ServerError, Value};

use crate::modules::consumer::core::chunk::Frame;
use crate::modules::incremental::core::payload::{
    ExecutionPayload, IncrementalResult, InitialPayload, PathSegment, SubsequentPayload,
};

/// The response a client rebuilds from an incremental payload sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub data: Value,
    pub errors: Vec<ServerError>,
    pub has_next: bool,
}

impl ExecutionResult {
    pub fn from_initial(initial: InitialPayload) -> Self {
        Self {
            data: initial.data,
            errors: initial.errors,
            has_next: initial.has_next,
        }
    }

    /// Merges the incremental results of `payload` into the data.
    ///
    /// Results whose path does not exist in the data are dropped; their errors
    /// are kept.
    pub fn apply(&mut self, payload: SubsequentPayload) {
        for result in payload.incremental {
            match result {
                IncrementalResult::Defer(deferred) => {
                    if let Some(target) = value_at_path(&mut self.data, &deferred.path) {
                        deep_merge(target, deferred.data);
                    }
                    self.errors.extend(deferred.errors);
                }
                IncrementalResult::Stream(streamed) => {
                    if let Some((PathSegment::Index(start), parent)) = streamed.path.split_last()
                        && let Some(Value::List(list)) = value_at_path(&mut self.data, parent)
                    {
                        place_items(list, *start, streamed.items);
                    }
                    self.errors.extend(streamed.errors);
                }
            }
        }
        self.has_next = payload.has_next;
    }

    pub fn finalize(mut self) -> Self {
        self.has_next = false;
        self
    }
}

fn value_at_path<'a>(mut value: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    for segment in path {
        value = match (segment, value) {
            (PathSegment::Key(key), Value::Object(fields)) => fields.get_mut(key.as_str())?,
            (PathSegment::Index(index), Value::List(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(value)
}

fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::List(target), Value::List(source)) => {
            for (index, value) in source.into_iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => target.push(value),
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Writes `items` from `start` on. An item may replace an existing entry or
/// extend the list by one; items at any other index are skipped.
fn place_items(list: &mut Vec<Value>, start: usize, items: Vec<Value>) {
    for (offset, item) in items.into_iter().enumerate() {
        match start.checked_add(offset) {
            Some(index) if index < list.len() => list[index] = item,
            Some(index) if index == list.len() => list.push(item),
            index => {
                tracing::warn!(?index, len = list.len(), "streamed item outside the list, skipped");
            }
        }
    }
}

/// Folds decoded frames into one [`ExecutionResult`].
#[derive(Debug, Default)]
pub struct ResultCollector {
    result: Option<ExecutionResult>,
}

impl ResultCollector {
    pub fn accept(&mut self, frame: Frame) {
        let text = match frame {
            Frame::Complete => {
                self.result = self.result.take().map(ExecutionResult::finalize);
                return;
            }
            Frame::Payload(text) => text,
        };

        match serde_json::from_str::<ExecutionPayload>(&text) {
            Ok(ExecutionPayload::Initial(initial)) => {
                self.result = Some(ExecutionResult::from_initial(initial));
            }
            Ok(ExecutionPayload::Subsequent(subsequent)) => match self.result.as_mut() {
                Some(result) => result.apply(subsequent),
                None => {
                    tracing::warn!(payload = %text, "subsequent payload before the initial payload")
                }
            },
            Err(error) => {
                tracing::warn!(payload = %text, %error, "failed to parse payload");
            }
        }
    }

    /// The merged result, or `None` if no initial payload arrived.
    pub fn finish(self) -> Option<ExecutionResult> {
        self.result.map(ExecutionResult::finalize)
    }
}

#[cfg(test)]
mod result_tests {
    use async_graphql::value;

    use super::*;
    use crate::modules::incremental::core::payload::{DeferResult, StreamResult};

    fn initial(data: Value) -> ExecutionResult {
        ExecutionResult::from_initial(InitialPayload {
            data,
            errors: Vec::new(),
            has_next: true,
        })
    }

    fn letter(letter: &str, index: usize) -> SubsequentPayload {
        SubsequentPayload::pending(IncrementalResult::Stream(StreamResult {
            items: vec![Value::from(letter)],
            path: vec![PathSegment::Key("alphabet".into()), PathSegment::Index(index)],
            label: None,
            errors: Vec::new(),
        }))
    }

    #[test]
    fn it_should_merge_deferred_data_at_the_root() {
        let mut result = initial(value!({ "fastField": "I am speed" }));

        result.apply(SubsequentPayload::pending(IncrementalResult::Defer(
            DeferResult {
                data: value!({ "slowField": "I am slow" }),
                path: Vec::new(),
                label: None,
                errors: Vec::new(),
            },
        )));
        result.apply(SubsequentPayload::completed());

        assert_eq!(
            result,
            ExecutionResult {
                data: value!({ "fastField": "I am speed", "slowField": "I am slow" }),
                errors: Vec::new(),
                has_next: false,
            }
        );
    }

    #[test]
    fn it_should_deep_merge_deferred_data_below_a_path() {
        let mut result = initial(value!({ "viewer": { "profile": { "name": "a" } } }));

        result.apply(SubsequentPayload::pending(IncrementalResult::Defer(
            DeferResult {
                data: value!({ "profile": { "bio": "b" }, "age": 3 }),
                path: vec![PathSegment::Key("viewer".into())],
                label: None,
                errors: vec![ServerError::new("partial", None)],
            },
        )));

        assert_eq!(
            result.data,
            value!({ "viewer": { "profile": { "name": "a", "bio": "b" }, "age": 3 } })
        );
        assert_eq!(result.errors, vec![ServerError::new("partial", None)]);
        assert!(result.has_next);
    }

    #[test]
    fn it_should_place_streamed_items_at_their_index() {
        let mut result = initial(value!({ "alphabet": ["a", "b"] }));

        for (index, character) in ["c", "d", "e", "f", "g"].into_iter().enumerate() {
            result.apply(letter(character, index + 2));
        }

        assert_eq!(
            result.finalize().data,
            value!({ "alphabet": ["a", "b", "c", "d", "e", "f", "g"] })
        );
    }

    #[test]
    fn it_should_skip_streamed_items_that_would_leave_a_gap() {
        let mut result = initial(value!({ "alphabet": ["a"] }));

        result.apply(letter("z", 5));
        result.apply(letter("b", 1));

        assert_eq!(result.data, value!({ "alphabet": ["a", "b"] }));
    }

    #[test]
    fn it_should_skip_a_streamed_index_at_the_end_of_the_address_space() {
        let mut collector = ResultCollector::default();

        collector.accept(Frame::Payload("{\"data\":{\"alphabet\":[\"a\"]},\"hasNext\":true}".into()));
        collector.accept(Frame::Payload(format!(
            "{{\"incremental\":[{{\"items\":[\"b\",\"c\"],\"path\":[\"alphabet\",{}]}}],\"hasNext\":true}}",
            usize::MAX
        )));

        assert_eq!(
            collector.finish().map(|result| result.data),
            Some(value!({ "alphabet": ["a"] }))
        );
    }

    #[test]
    fn it_should_ignore_results_for_paths_missing_from_the_data() {
        let mut result = initial(value!({ "fastField": "I am speed" }));

        result.apply(letter("a", 0));

        assert_eq!(result.data, value!({ "fastField": "I am speed" }));
    }

    #[test]
    fn it_should_collect_frames_into_the_final_result() {
        let mut collector = ResultCollector::default();

        for frame in [
            Frame::Payload("{\"incremental\":[{\"items\":[\"z\"],\"path\":[\"alphabet\",0]}],\"hasNext\":true}".into()),
            Frame::Payload("{\"data\":{\"alphabet\":[]},\"hasNext\":true}".into()),
            Frame::Payload("not json".into()),
            Frame::Payload("{\"incremental\":[{\"items\":[\"a\"],\"path\":[\"alphabet\",0]}],\"hasNext\":true}".into()),
            Frame::Payload("{\"hasNext\":false}".into()),
            Frame::Complete,
        ] {
            collector.accept(frame);
        }

        assert_eq!(
            collector.finish(),
            Some(ExecutionResult {
                data: value!({ "alphabet": ["a"] }),
                errors: Vec::new(),
                has_next: false,
            })
        );
    }

    #[test]
    fn it_should_have_no_result_without_an_initial_payload() {
        let mut collector = ResultCollector::default();

        collector.accept(Frame::Payload("{\"hasNext\":false}".into()));
        collector.accept(Frame::Complete);

        assert_eq!(collector.finish(), None);
    }
}
