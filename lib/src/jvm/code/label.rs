use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Opaque label
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct SynLabel(usize);

impl SynLabel {
    /// Label for the first block in the method
    pub const START: SynLabel = SynLabel(0);

    /// Get the next fresh label
    pub fn next(&self) -> SynLabel {
        SynLabel(self.0 + 1)
    }
}

impl fmt::Debug for SynLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "l{}", self.0)
    }
}

/// Label generator for [`SynLabel`]
///
/// Cloning does not split the generator source - the cloned generator will produce the same
/// sequence of labels as the original.
#[derive(Clone, Debug)]
pub struct SynLabelGenerator(SynLabel);

impl SynLabelGenerator {
    pub fn new(start: SynLabel) -> SynLabelGenerator {
        SynLabelGenerator(start)
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> SynLabel {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }
}

/// Identity of one instruction stream (one method body under construction)
///
/// Labels are only unique within a stream, so anything that remembers a label across calls also
/// needs to remember which stream the label belongs to.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct StreamId(usize);

impl StreamId {
    /// Fresh identifier, distinct from every other one handed out in this process
    pub fn fresh() -> StreamId {
        static NEXT_STREAM: AtomicUsize = AtomicUsize::new(0);
        StreamId(NEXT_STREAM.fetch_add(1, Ordering::Relaxed))
    }
}

/// Marker for a point in an instruction stream
///
/// Obtained from [`super::CodeBuilder::mark_position`]. Positions are plain values: holding one
/// does not keep anything alive and nothing ever moves it.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Position {
    pub stream: StreamId,
    pub label: SynLabel,
}
