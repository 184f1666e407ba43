use std::fmt;

use crate::{CompileError, CompileResult};

/// The number of capture slots. Slot 0 is the whole match and slots 1
/// through 9 are the parenthesized groups.
pub const NSUBEXP: usize = 10;

/// An index into a program's instruction arena.
pub type InstId = usize;

/// A set of bytes, used by bracket expressions.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ByteSet {
    bits: [u64; 4],
}

impl ByteSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, byte: u8) {
        self.bits[usize::from(byte >> 6)] |= 1 << (byte & 63);
    }

    /// Insert every byte in `lo..=hi`.
    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for byte in lo..=hi {
            self.insert(byte);
        }
    }

    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.bits[usize::from(byte >> 6)] & (1 << (byte & 63)) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&word| word == 0)
    }

    /// Iterate over the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&byte| self.contains(byte))
    }
}

impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteSet(\"")?;
        for byte in self.iter() {
            write!(f, "{}", byte.escape_ascii())?;
        }
        write!(f, "\")")
    }
}

/// The operation performed by a single instruction.
///
/// `Branch`, `Star` and `Plus` carry the index of their operand. For a
/// `Branch`, the operand is the body of one alternative and `next` on the
/// instruction leads to the following alternative. For `Star` and `Plus` the
/// operand is a single one-byte-wide instruction that is repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// End of program.
    End,
    /// Match at the start of the subject.
    Bol,
    /// Match at the end of the subject.
    Eol,
    /// Match any byte except a newline.
    Any,
    /// Match any byte in the set.
    AnyOf(ByteSet),
    /// Match any byte not in the set.
    AnyBut(ByteSet),
    /// Match this alternative, or the next one.
    Branch(InstId),
    /// No-op whose `next` points backwards to close a loop.
    Back,
    /// Match this literal.
    Exactly(Box<[u8]>),
    /// Match the empty string.
    Nothing,
    /// Match the operand 0 or more times.
    Star(InstId),
    /// Match the operand 1 or more times.
    Plus(InstId),
    /// Capture group `n` starts here.
    Open(u8),
    /// Capture group `n` ends here.
    Close(u8),
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match *self {
            Op::End => OpKind::End,
            Op::Bol => OpKind::Bol,
            Op::Eol => OpKind::Eol,
            Op::Any => OpKind::Any,
            Op::AnyOf(_) => OpKind::AnyOf,
            Op::AnyBut(_) => OpKind::AnyBut,
            Op::Branch(_) => OpKind::Branch,
            Op::Back => OpKind::Back,
            Op::Exactly(_) => OpKind::Exactly,
            Op::Nothing => OpKind::Nothing,
            Op::Star(_) => OpKind::Star,
            Op::Plus(_) => OpKind::Plus,
            Op::Open(_) => OpKind::Open,
            Op::Close(_) => OpKind::Close,
        }
    }

    /// Returns true if this instruction always consumes exactly one byte,
    /// which is what `Star` and `Plus` require of their operand.
    pub fn is_simple(&self) -> bool {
        match self {
            Op::Any | Op::AnyOf(_) | Op::AnyBut(_) => true,
            Op::Exactly(lit) => lit.len() == 1,
            _ => false,
        }
    }

    fn operand(&self) -> Option<InstId> {
        match *self {
            Op::Branch(body) | Op::Star(body) | Op::Plus(body) => Some(body),
            _ => None,
        }
    }
}

/// The opcode tag of an instruction, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    End,
    Bol,
    Eol,
    Any,
    AnyOf,
    AnyBut,
    Branch,
    Back,
    Exactly,
    Nothing,
    Star,
    Plus,
    Open,
    Close,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::End => "END",
            OpKind::Bol => "BOL",
            OpKind::Eol => "EOL",
            OpKind::Any => "ANY",
            OpKind::AnyOf => "ANYOF",
            OpKind::AnyBut => "ANYBUT",
            OpKind::Branch => "BRANCH",
            OpKind::Back => "BACK",
            OpKind::Exactly => "EXACTLY",
            OpKind::Nothing => "NOTHING",
            OpKind::Star => "STAR",
            OpKind::Plus => "PLUS",
            OpKind::Open => "OPEN",
            OpKind::Close => "CLOSE",
        }
    }
}

/// A single instruction in a compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub op: Op,
    /// The instruction that follows this one. Only `End` has none.
    pub next: Option<InstId>,
}

/// A read-only view of one instruction, as handed out by
/// [`Program::parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part<'a> {
    /// Index of the instruction in the program.
    pub location: InstId,
    pub kind: OpKind,
    pub next: Option<InstId>,
    /// The operand index of a `Branch`, `Star` or `Plus`, or the group
    /// number of an `Open` or `Close`.
    pub cmd: Option<usize>,
    /// The literal of an `Exactly`.
    pub literal: Option<&'a [u8]>,
    /// The set of an `AnyOf` or `AnyBut`.
    pub set: Option<&'a ByteSet>,
}

/// A compiled pattern.
///
/// A program is immutable once built. Capture state is kept outside of it,
/// in [`Captures`](crate::Captures), so one program can be shared freely
/// between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    insts: Vec<Inst>,
    start: InstId,
    groups: usize,
    first_byte: Option<u8>,
    anchored: bool,
    must: Option<Box<[u8]>>,
}

impl Program {
    pub(crate) fn new(
        insts: Vec<Inst>,
        start: InstId,
        groups: usize,
        first_byte: Option<u8>,
        anchored: bool,
        must: Option<Box<[u8]>>,
    ) -> Self {
        debug_assert!(must.as_ref().map_or(true, |lit| !lit.is_empty()));
        Self { insts, start, groups, first_byte, anchored, must }
    }

    /// All instructions, in emission order.
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// The instruction where matching begins.
    pub fn start(&self) -> InstId {
        self.start
    }

    /// The number of parenthesized groups, not counting the whole match.
    pub fn group_count(&self) -> usize {
        self.groups
    }

    /// The byte every match must begin with, if known.
    pub fn first_byte(&self) -> Option<u8> {
        self.first_byte
    }

    /// Returns true if the pattern can only match at the start of a subject.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// A literal that occurs in every match, if one is known.
    pub fn must(&self) -> Option<&[u8]> {
        self.must.as_deref()
    }

    /// The length of [`Program::must`], or 0 if there is none.
    pub fn must_len(&self) -> usize {
        self.must.as_ref().map_or(0, |lit| lit.len())
    }

    /// The instruction following `id`, if any.
    #[inline]
    pub fn next(&self, id: InstId) -> Option<InstId> {
        self.insts.get(id).and_then(|inst| inst.next)
    }

    /// Decompose the program into one [`Part`] per instruction.
    pub fn parts(&self) -> impl Iterator<Item = Part<'_>> + '_ {
        self.insts.iter().enumerate().map(|(location, inst)| {
            let cmd = match inst.op {
                Op::Open(n) | Op::Close(n) => Some(usize::from(n)),
                ref op => op.operand(),
            };
            let (literal, set) = match &inst.op {
                Op::Exactly(lit) => (Some(&lit[..]), None),
                Op::AnyOf(set) | Op::AnyBut(set) => (None, Some(set)),
                _ => (None, None),
            };
            Part { location, kind: inst.op.kind(), next: inst.next, cmd, literal, set }
        })
    }

    /// Verify the structural invariants the matcher relies on: every link
    /// is in bounds, only `End` terminates a chain, repeat operands are one
    /// byte wide and group numbers are in range.
    pub fn check(&self) -> CompileResult<()> {
        let fault = |id: InstId, what: &str| {
            Err(CompileError::InternalAssemblyFault(format!("instruction {}: {}", id, what)))
        };
        if self.start >= self.insts.len() {
            return fault(self.start, "entry point out of bounds");
        }
        for (id, inst) in self.insts.iter().enumerate() {
            match (&inst.op, inst.next) {
                (Op::End, Some(_)) => return fault(id, "END has a successor"),
                (Op::End, None) => {}
                (_, None) => return fault(id, "dangling chain"),
                (_, Some(next)) if next >= self.insts.len() => {
                    return fault(id, "successor out of bounds")
                }
                _ => {}
            }
            if let Some(body) = inst.op.operand() {
                if body >= self.insts.len() {
                    return fault(id, "operand out of bounds");
                }
            }
            match &inst.op {
                Op::Star(body) | Op::Plus(body) if !self.insts[*body].op.is_simple() => {
                    return fault(id, "repeat operand is not one byte wide")
                }
                Op::Open(n) | Op::Close(n) if *n == 0 || usize::from(*n) > self.groups => {
                    return fault(id, "group number out of range")
                }
                Op::Exactly(lit) if lit.is_empty() => return fault(id, "empty literal"),
                _ => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in self.parts() {
            write!(f, "{:>3}:{}", part.location, part.kind.name())?;
            match part.next {
                Some(next) => write!(f, "({})", next)?,
                None => write!(f, "(-)")?,
            }
            if let Some(cmd) = part.cmd {
                write!(f, "[{}]", cmd)?;
            }
            if let Some(lit) = part.literal {
                write!(f, "{}", lit.escape_ascii())?;
            }
            if let Some(set) = part.set {
                for byte in set.iter() {
                    write!(f, "{}", byte.escape_ascii())?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "entry {}", self.start)?;
        if let Some(byte) = self.first_byte {
            write!(f, " start `{}'", byte.escape_ascii())?;
        }
        if self.anchored {
            write!(f, " anchored")?;
        }
        if let Some(must) = &self.must {
            write!(f, " must have \"{}\"", must.escape_ascii())?;
        }
        Ok(())
    }
}
