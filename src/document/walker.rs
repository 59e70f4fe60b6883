/*!
 * Structural address computation.
 *
 * `AddressWalker` is fed the element events of one XML part in document
 * order and keeps an explicit stack of the addressed elements it is inside
 * (shapes, table rows and cells, paragraphs, runs). Each addressed frame
 * counts its own addressed children, so sibling indices are stable and the
 * address of a text slot is simply the steps currently on the stack.
 */

use super::unit::{Scope, Step, StructuralAddress};

/// Addressed element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Shape,
    Row,
    Cell,
    Paragraph,
    Run,
    /// Field runs hold generated text (slide numbers, dates); not addressed
    Field,
}

impl Kind {
    fn classify(local_name: &[u8]) -> Option<Self> {
        match local_name {
            b"sp" | b"grpSp" | b"graphicFrame" | b"pic" | b"cxnSp" => Some(Kind::Shape),
            b"tr" => Some(Kind::Row),
            b"tc" => Some(Kind::Cell),
            b"p" => Some(Kind::Paragraph),
            b"r" => Some(Kind::Run),
            b"fld" => Some(Kind::Field),
            _ => None,
        }
    }

    fn step(self, index: usize) -> Option<Step> {
        match self {
            Kind::Shape => Some(Step::Shape(index)),
            Kind::Row => Some(Step::Row(index)),
            Kind::Cell => Some(Step::Cell(index)),
            Kind::Paragraph => Some(Step::Paragraph(index)),
            Kind::Run => Some(Step::Run(index)),
            Kind::Field => None,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    shapes: usize,
    rows: usize,
    cells: usize,
    paragraphs: usize,
    runs: usize,
}

impl Counters {
    fn next(&mut self, kind: Kind) -> usize {
        let counter = match kind {
            Kind::Shape => &mut self.shapes,
            Kind::Row => &mut self.rows,
            Kind::Cell => &mut self.cells,
            Kind::Paragraph => &mut self.paragraphs,
            Kind::Run => &mut self.runs,
            Kind::Field => return 0,
        };
        let index = *counter;
        *counter += 1;
        index
    }
}

#[derive(Debug)]
struct Frame {
    depth: usize,
    kind: Kind,
    step: Option<Step>,
    counters: Counters,
}

/// What the element just entered means for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// A new text run begins
    RunStart,
    /// The `a:t` of a run: its content is a text slot
    TextSlot,
    /// The `a:rPr` of a run
    RunProperties,
    /// Anything else
    Other,
}

/// Stack-based walker over the elements of one part
#[derive(Debug)]
pub struct AddressWalker {
    slide: usize,
    scope: Scope,
    depth: usize,
    frames: Vec<Frame>,
    root: Counters,
}

impl AddressWalker {
    pub fn new(slide: usize, scope: Scope) -> Self {
        Self {
            slide,
            scope,
            depth: 0,
            frames: Vec::new(),
            root: Counters::default(),
        }
    }

    /// An opening tag
    pub fn start(&mut self, local_name: &[u8]) -> Position {
        let position = self.position_of(local_name);
        self.depth += 1;

        if let Some(kind) = Kind::classify(local_name) {
            let index = self.counters_mut().next(kind);
            self.frames.push(Frame {
                depth: self.depth,
                kind,
                step: kind.step(index),
                counters: Counters::default(),
            });
            if kind == Kind::Run {
                return Position::RunStart;
            }
        }

        position
    }

    /// A self-closing tag: consumes a sibling index but opens nothing
    pub fn empty(&mut self, local_name: &[u8]) -> Position {
        let position = self.position_of(local_name);
        if let Some(kind) = Kind::classify(local_name) {
            self.counters_mut().next(kind);
        }
        position
    }

    /// A closing tag
    pub fn end(&mut self) {
        if self.frames.last().is_some_and(|f| f.depth == self.depth) {
            self.frames.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Number of elements currently open
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the innermost addressed element is a run
    pub fn inside_run(&self) -> bool {
        self.frames.last().is_some_and(|f| f.kind == Kind::Run)
    }

    /// Address of the current position
    pub fn address(&self) -> StructuralAddress {
        StructuralAddress::new(
            self.slide,
            self.scope,
            self.frames.iter().filter_map(|f| f.step).collect(),
        )
    }

    fn position_of(&self, local_name: &[u8]) -> Position {
        match self.frames.last() {
            Some(frame) if frame.kind == Kind::Run && frame.depth == self.depth => match local_name {
                b"t" => Position::TextSlot,
                b"rPr" => Position::RunProperties,
                _ => Position::Other,
            },
            _ => Position::Other,
        }
    }

    fn counters_mut(&mut self) -> &mut Counters {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.counters,
            None => &mut self.root,
        }
    }
}
