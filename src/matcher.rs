use std::ops::Range;

use crate::{
    builder::Reporter,
    literal,
    program::{Inst, InstId, Op, Program, NSUBEXP},
    substitute::{substitute, substitute_with, SubstituteError},
};

/// Counters describing the work done by the last [`Matcher::exec`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Start offsets at which the program was run.
    pub attempts: usize,
    /// Instructions visited, counting revisits after backtracking.
    pub steps: usize,
}

/// The capture groups of the most recent match.
///
/// Slot 0 holds the whole match and slots 1 through 9 the parenthesized
/// groups. The captures borrow the subject they were produced from, so they
/// can never outlive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures<'s> {
    subject: &'s [u8],
    slots: [Option<(usize, usize)>; NSUBEXP],
    matched: bool,
}

impl<'s> Captures<'s> {
    /// Empty captures, holding no match.
    pub fn new() -> Self {
        Self { subject: &[], slots: [None; NSUBEXP], matched: false }
    }

    /// Returns true if these captures hold a successful match.
    pub fn is_match(&self) -> bool {
        self.matched
    }

    /// The subject of the last match attempt.
    pub fn subject(&self) -> &'s [u8] {
        self.subject
    }

    /// The offsets of group `i` in the subject, or `None` if there is no
    /// match or the group did not participate in it.
    pub fn range(&self, i: usize) -> Option<Range<usize>> {
        if !self.matched {
            return None;
        }
        self.slots.get(i).copied().flatten().map(|(start, end)| start..end)
    }

    /// The text of group `i`. See [`Captures::range`].
    pub fn get(&self, i: usize) -> Option<&'s [u8]> {
        let subject = self.subject;
        self.range(i).map(|range| &subject[range])
    }

    /// The text of every slot, in order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&'s [u8]>> + '_ {
        (0..NSUBEXP).map(move |i| self.get(i))
    }

    /// Append `template` to `out`, expanding `&` and `\0`-`\9` from these
    /// captures. See [`substitute`](crate::substitute).
    pub fn substitute(&self, template: &[u8], out: &mut Vec<u8>) -> Result<(), SubstituteError> {
        substitute(self, template, out)
    }

    /// Like [`Captures::substitute`], but also sends the message of any
    /// error to `reporter`.
    pub fn substitute_with(
        &self,
        template: &[u8],
        out: &mut Vec<u8>,
        reporter: &mut dyn Reporter,
    ) -> Result<(), SubstituteError> {
        substitute_with(self, template, out, reporter)
    }
}

impl Default for Captures<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a [`Program`] against subjects, keeping statistics about the last
/// run.
#[derive(Debug)]
pub struct Matcher<'p> {
    prog: &'p Program,
    stats: Stats,
}

impl<'p> Matcher<'p> {
    /// Create a new matcher for the given program.
    pub fn new(prog: &'p Program) -> Self {
        Self { prog, stats: Stats::default() }
    }

    /// Statistics for the last call to [`Matcher::exec`].
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Search `subject` for the leftmost match, recording its groups in
    /// `caps`. Returns false, and invalidates `caps`, if there is none.
    pub fn exec<'s, S>(&mut self, subject: &'s S, caps: &mut Captures<'s>) -> bool
    where
        S: AsRef<[u8]> + ?Sized,
    {
        let subject = subject.as_ref();
        self.stats = Stats::default();
        *caps = Captures { subject, ..Captures::new() };

        if let Some(must) = self.prog.must() {
            if literal::find(subject, must).is_none() {
                trace!("rejected without search: {:?} does not occur", must.escape_ascii().to_string());
                return false;
            }
        }

        let mut search = Search::new(self.prog, subject);
        let found = if self.prog.is_anchored() {
            search.try_at(0)
        } else if let Some(byte) = self.prog.first_byte() {
            literal::positions(byte, subject).find_map(|at| search.try_at(at))
        } else {
            (0..=subject.len()).find_map(|at| search.try_at(at))
        };
        self.stats = search.stats;

        match found {
            Some(slots) => {
                trace!("matched {:?} after {} attempts", slots[0], self.stats.attempts);
                caps.slots = slots;
                caps.matched = true;
                true
            }
            None => false,
        }
    }
}

impl Program {
    /// Empty captures to pass to [`Program::exec`].
    pub fn new_captures<'s>(&self) -> Captures<'s> {
        Captures::new()
    }

    /// Search `subject` for the leftmost match, recording its groups in
    /// `caps`.
    pub fn exec<'s, S>(&self, subject: &'s S, caps: &mut Captures<'s>) -> bool
    where
        S: AsRef<[u8]> + ?Sized,
    {
        Matcher::new(self).exec(subject, caps)
    }

    /// Returns true if the program matches anywhere in `subject`.
    pub fn is_match<S: AsRef<[u8]> + ?Sized>(&self, subject: &S) -> bool {
        let mut caps = Captures::new();
        self.exec(subject, &mut caps)
    }

    /// The captures of the leftmost match in `subject`, if any.
    pub fn captures<'s, S>(&self, subject: &'s S) -> Option<Captures<'s>>
    where
        S: AsRef<[u8]> + ?Sized,
    {
        let mut caps = Captures::new();
        if self.exec(subject, &mut caps) {
            Some(caps)
        } else {
            None
        }
    }
}

/// A choice left untried, or a group boundary to undo, on the backtracking
/// stack.
#[derive(Debug, Clone, Copy)]
enum Frame {
    /// Try the body of the BRANCH `branch` from `at`.
    Alternative { branch: InstId, at: usize },
    /// Continue at `next` after a STAR or PLUS that matched its operand at
    /// most `count` times from `at`.
    Repeat { next: InstId, at: usize, min: usize, count: usize },
    RestoreStart { slot: usize, old: Option<usize> },
    RestoreEnd { slot: usize, old: Option<usize> },
}

/// Backtracking state for one subject.
///
/// Choice points live on a heap stack, so the depth of a search is bounded
/// by memory rather than by the thread's stack. Group boundaries are written
/// as they are passed and restored when the path that wrote them is
/// abandoned, so a failed alternative never leaves anything behind.
struct Search<'a> {
    insts: &'a [Inst],
    entry: InstId,
    subject: &'a [u8],
    starts: [Option<usize>; NSUBEXP],
    ends: [Option<usize>; NSUBEXP],
    end: usize,
    stack: Vec<Frame>,
    stats: Stats,
}

impl<'a> Search<'a> {
    fn new(prog: &'a Program, subject: &'a [u8]) -> Self {
        Self {
            insts: prog.insts(),
            entry: prog.start(),
            subject,
            starts: [None; NSUBEXP],
            ends: [None; NSUBEXP],
            end: 0,
            stack: Vec::new(),
            stats: Stats::default(),
        }
    }

    /// Run the program with the match beginning at `at`.
    fn try_at(&mut self, at: usize) -> Option<[Option<(usize, usize)>; NSUBEXP]> {
        self.stats.attempts += 1;
        self.starts = [None; NSUBEXP];
        self.ends = [None; NSUBEXP];
        self.stack.clear();
        if !self.backtrack(self.entry, at) {
            return None;
        }
        self.starts[0] = Some(at);
        self.ends[0] = Some(self.end);
        Some(std::array::from_fn(|i| self.starts[i].zip(self.ends[i])))
    }

    fn follow(&self, pc: InstId, next: Option<InstId>) -> InstId {
        match next {
            Some(next) => next,
            None => panic!("corrupted program: instruction {} has no successor", pc),
        }
    }

    fn is_branch(&self, id: Option<InstId>) -> bool {
        id.map_or(false, |id| matches!(self.insts[id].op, Op::Branch(_)))
    }

    /// Returns true if some path from `pc` at `at` reaches END. Choices
    /// are retried newest first.
    fn backtrack(&mut self, pc: InstId, at: usize) -> bool {
        let mut resume = Some((pc, at));
        loop {
            if let Some((pc, at)) = resume.take() {
                if self.step(pc, at) {
                    return true;
                }
            }
            match self.stack.pop() {
                None => return false,
                Some(Frame::Alternative { branch, at }) => {
                    resume = Some((self.enter(branch, at), at));
                }
                Some(Frame::Repeat { next, at, min, count }) => {
                    resume = self.back_off(next, at, min, count).map(|at| (next, at));
                }
                Some(Frame::RestoreStart { slot, old }) => self.starts[slot] = old,
                Some(Frame::RestoreEnd { slot, old }) => self.ends[slot] = old,
            }
        }
    }

    /// Follow the chain from `pc` until END or a mismatch, pushing a frame
    /// for every choice passed over.
    fn step(&mut self, mut pc: InstId, mut at: usize) -> bool {
        let insts = self.insts;
        loop {
            self.stats.steps += 1;
            let inst = &insts[pc];
            match &inst.op {
                Op::End => {
                    self.end = at;
                    return true;
                }
                Op::Bol => {
                    if at != 0 {
                        return false;
                    }
                }
                Op::Eol => {
                    if at != self.subject.len() {
                        return false;
                    }
                }
                Op::Any => match self.subject.get(at) {
                    Some(&byte) if byte != b'\n' => at += 1,
                    _ => return false,
                },
                Op::AnyOf(set) => match self.subject.get(at) {
                    Some(&byte) if set.contains(byte) => at += 1,
                    _ => return false,
                },
                Op::AnyBut(set) => match self.subject.get(at) {
                    Some(&byte) if !set.contains(byte) => at += 1,
                    _ => return false,
                },
                Op::Exactly(lit) => {
                    if !self.subject[at..].starts_with(lit) {
                        return false;
                    }
                    at += lit.len();
                }
                Op::Nothing | Op::Back => {}
                Op::Open(n) => {
                    let slot = usize::from(*n);
                    self.stack.push(Frame::RestoreStart { slot, old: self.starts[slot] });
                    self.starts[slot] = Some(at);
                }
                Op::Close(n) => {
                    let slot = usize::from(*n);
                    self.stack.push(Frame::RestoreEnd { slot, old: self.ends[slot] });
                    self.ends[slot] = Some(at);
                }
                Op::Branch(_) => {
                    pc = self.enter(pc, at);
                    continue;
                }
                Op::Star(body) | Op::Plus(body) => {
                    let min = usize::from(matches!(inst.op, Op::Plus(_)));
                    let next = self.follow(pc, inst.next);
                    let count = self.repeat(*body, at);
                    match self.back_off(next, at, min, count) {
                        Some(resume) => {
                            pc = next;
                            at = resume;
                            continue;
                        }
                        None => return false,
                    }
                }
            }
            pc = self.follow(pc, inst.next);
        }
    }

    /// Take the alternative at `branch`, queueing the one after it, and
    /// return the body to run.
    fn enter(&mut self, branch: InstId, at: usize) -> InstId {
        let insts = self.insts;
        let inst = &insts[branch];
        // A lone BRANCH is a plain sequence.
        if let Some(next) = inst.next.filter(|&id| self.is_branch(Some(id))) {
            self.stack.push(Frame::Alternative { branch: next, at });
        }
        match inst.op {
            Op::Branch(body) => body,
            _ => panic!("corrupted program: instruction {} is not a BRANCH", branch),
        }
    }

    /// Pick the largest repeat count no greater than `count` after which
    /// the rest of the program could match, queue the smaller ones, and
    /// return the offset to continue from.
    fn back_off(&mut self, next: InstId, at: usize, min: usize, mut count: usize) -> Option<usize> {
        let lookahead = match &self.insts[next].op {
            Op::Exactly(lit) => lit.first().copied(),
            _ => None,
        };
        while count >= min {
            let resume = at + count;
            if lookahead.map_or(true, |byte| self.subject.get(resume) == Some(&byte)) {
                if count > min {
                    self.stack.push(Frame::Repeat { next, at, min, count: count - 1 });
                }
                return Some(resume);
            }
            if count == 0 {
                break;
            }
            count -= 1;
        }
        None
    }

    /// Count how many times the one-byte-wide instruction `body` matches
    /// consecutively from `at`.
    fn repeat(&self, body: InstId, at: usize) -> usize {
        let rest = &self.subject[at..];
        match &self.insts[body].op {
            Op::Any => rest.iter().take_while(|&&byte| byte != b'\n').count(),
            Op::Exactly(lit) if lit.len() == 1 => {
                rest.iter().take_while(|&&byte| byte == lit[0]).count()
            }
            Op::AnyOf(set) => rest.iter().take_while(|&&byte| set.contains(byte)).count(),
            Op::AnyBut(set) => rest.iter().take_while(|&&byte| !set.contains(byte)).count(),
            op => panic!("corrupted program: {} cannot be repeated", op.kind().name()),
        }
    }
}
