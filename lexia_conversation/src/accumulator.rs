use std::collections::BTreeMap;

use lexia_core::ToolCall;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Reassembles streamed tool-call fragments keyed by their index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
}

impl ToolCallAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: &str,
    ) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id {
            call.id = Some(id);
        }
        if let Some(name) = name {
            debug!("New function call initialized: {name}");
            call.name = Some(name);
        }
        call.arguments.push_str(arguments);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in index order. Fragments that never named a
    /// function are dropped.
    #[must_use]
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter_map(|(index, call)| {
                let Some(name) = call.name else {
                    warn!("Dropping tool call {index} without a function name");
                    return None;
                };
                Some(ToolCall {
                    id: call.id.unwrap_or_else(|| format!("call_{index}")),
                    name,
                    arguments: call.arguments,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_join_by_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(1, Some("b".into()), Some("second".into()), "{\"x\":");
        acc.push(0, Some("a".into()), Some("first".into()), "");
        acc.push(1, None, None, "1}");
        acc.push(0, None, None, "{}");

        let calls = acc.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "first");
        assert_eq!(calls[0].arguments, "{}");
        assert_eq!(calls[1].id, "b");
        assert_eq!(calls[1].arguments, "{\"x\":1}");
    }

    #[test]
    fn nameless_fragments_are_dropped() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, None, None, "{}");
        assert!(!acc.is_empty());
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn missing_id_gets_placeholder() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(3, None, Some("f".into()), "");
        assert_eq!(acc.finish()[0].id, "call_3");
    }
}
