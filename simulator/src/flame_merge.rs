use flame::{self, Span};
use std::fs::File;
use std::io;
use std::mem;

pub static FLAME_GRAPH_FILE: &str = "flame-graph.html";

/// Merged spans of the current thread.
///
/// flame keeps every span it records, so a long run folds them in here at checkpoints and
/// clears flame's buffer. Repeated spans are merged into one per call site.
#[derive(Default)]
pub struct FlameLog {
    spans: Vec<Span>,
}

impl FlameLog {
    /// Folds the spans recorded since the last checkpoint into the log and clears them from
    /// flame. Must not be called while a span is open.
    pub fn checkpoint(&mut self) {
        let mut spans = mem::take(&mut self.spans);
        spans.extend(flame::spans());
        self.spans = merge_spans(spans);
        flame::clear();
    }

    pub fn write(mut self) -> io::Result<()> {
        self.checkpoint();
        flame::dump_html_custom(&mut File::create(FLAME_GRAPH_FILE)?, &self.spans)
    }
}

/// Collapses sibling spans sharing a name and depth, summing their durations and pooling their
/// children.
fn merge_spans(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for mut span in spans {
        match merged
            .iter_mut()
            .find(|m| m.name == span.name && m.depth == span.depth)
        {
            Some(target) => {
                target.delta += span.delta;
                target.children.append(&mut span.children);
            }
            None => merged.push(span),
        }
    }

    for span in &mut merged {
        let children = mem::take(&mut span.children);
        span.children = merge_spans(children);
    }
    merged
}
