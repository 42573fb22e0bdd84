use serde::{Deserialize, Serialize};

/// Structural kind of a content block. Drives the cost model; never styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading1,
    Heading2,
    /// `###` and deeper.
    Heading3,
    Paragraph,
    ListItem,
    Quote,
    CodeFence,
    ImageRef,
    Blank,
}

impl BlockKind {
    /// True for kinds whose lines may be wrapped into visual-line pieces when a
    /// block has to be split below source-line granularity.
    pub fn wraps(self) -> bool {
        matches!(
            self,
            BlockKind::Paragraph | BlockKind::ListItem | BlockKind::Quote
        )
    }
}

/// Returns true for a line shaped like a ``` or ~~~ fence, opening or closing.
pub fn is_fence_delimiter(line: &str) -> bool {
    Fence::parse(line).is_some()
}

/// An opening code fence: a run of three or more backticks or tildes, plus
/// the info string after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence<'a> {
    pub marker: char,
    pub width: usize,
    pub info: &'a str,
}

impl<'a> Fence<'a> {
    /// Parses a fence line (without terminator). Backtick fences may not carry
    /// a backtick in their info string.
    pub fn parse(line: &'a str) -> Option<Self> {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|&c| matches!(c, '`' | '~'))?;
        let width = trimmed.chars().take_while(|&c| c == marker).count();
        if width < 3 {
            return None;
        }
        let info = trimmed[width..].trim();
        if marker == '`' && info.contains('`') {
            return None;
        }
        Some(Self {
            marker,
            width,
            info,
        })
    }

    /// True when `line` ends this fence: same marker, at least as wide, and
    /// nothing after the run.
    pub fn is_closed_by(&self, line: &str) -> bool {
        Fence::parse(line).is_some_and(|close| {
            close.marker == self.marker && close.width >= self.width && close.info.is_empty()
        })
    }

    /// Line that reopens this fence, info string included.
    pub fn opener(&self) -> String {
        let mut line = self.closer();
        line.push_str(self.info);
        line
    }

    /// Line that closes this fence.
    pub fn closer(&self) -> String {
        std::iter::repeat(self.marker).take(self.width).collect()
    }
}

/// Line-by-line fenced code state. Every scanner of a segment goes through
/// this so they agree on where code starts and ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct FenceTracker<'a> {
    open: Option<Fence<'a>>,
}

impl<'a> FenceTracker<'a> {
    /// The fence enclosing the next line, if any.
    pub fn open(&self) -> Option<Fence<'a>> {
        self.open
    }

    /// Advances past one line (without terminator). Returns true when the line
    /// opened or closed a fence.
    pub fn advance(&mut self, line: &'a str) -> bool {
        match self.open {
            Some(fence) if fence.is_closed_by(line) => {
                self.open = None;
                true
            }
            Some(_) => false,
            None => {
                self.open = Fence::parse(line);
                self.open.is_some()
            }
        }
    }
}

/// The fence still open at byte `offset` of `text`, counting only lines that
/// start before `offset`.
pub fn open_fence_at(text: &str, offset: usize) -> Option<Fence<'_>> {
    let mut fences = FenceTracker::default();
    let mut position = 0usize;
    for line in text.split_inclusive('\n') {
        if position >= offset {
            break;
        }
        position += line.len();
        fences.advance(line.trim_end_matches(['\n', '\r']));
    }
    fences.open()
}

/// A typed span of a segment's source text.
///
/// `text` borrows from the segment and includes its trailing line terminator(s),
/// so the blocks of a segment concatenate back to the segment byte-for-byte.
/// `start` is the byte offset of `text` within the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub start: usize,
    pub text: &'a str,
}

impl<'a> Block<'a> {
    /// Source lines of the block without their terminators.
    pub fn lines(&self) -> impl Iterator<Item = &'a str> {
        self.text.lines()
    }
}
