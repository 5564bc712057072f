//! Accumulates streamed assistant text for a single run.

use agui_stream::Event;

#[derive(Debug, Default)]
pub struct Transcript {
    text: String,
    fragments: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the delta of a content event; other events are ignored.
    pub fn push(&mut self, event: &Event) {
        if let Some(delta) = event.delta() {
            self.text.push_str(delta);
            self.fragments += 1;
        }
    }

    /// Discards everything accumulated so far.
    pub fn reset(&mut self) {
        self.text.clear();
        self.fragments = 0;
    }

    /// Returns the accumulated text and leaves the transcript empty.
    pub fn take(&mut self) -> String {
        self.fragments = 0;
        std::mem::take(&mut self.text)
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }
}
