use crate::{
    program::{ByteSet, Inst, InstId, Op, Program, NSUBEXP},
    CompileError, CompileResult,
};

/// Bytes that end a literal run.
fn is_meta(byte: u8) -> bool {
    matches!(byte, b'^' | b'$' | b'.' | b'[' | b'(' | b')' | b'|' | b'*' | b'+' | b'\\')
}

fn is_repeat(byte: u8) -> bool {
    byte == b'*' || byte == b'+'
}

/// What the parser knows about an emitted fragment.
#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    /// The fragment never matches the empty string.
    has_width: bool,
    /// The fragment is a single instruction consuming exactly one byte.
    simple: bool,
}

/// The entry point of an emitted fragment. Its exit is found by walking
/// `next` links to the end of the chain.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    start: InstId,
    flags: Flags,
}

/// The payload of a node while its source text is being parsed. It is
/// consumed when the node is emitted.
#[derive(Debug)]
enum Assembly {
    Literal(Vec<u8>),
    Set { set: ByteSet, negated: bool },
}

impl Assembly {
    fn into_op(self) -> Op {
        match self {
            Assembly::Literal(bytes) => Op::Exactly(bytes.into_boxed_slice()),
            Assembly::Set { set, negated: false } => Op::AnyOf(set),
            Assembly::Set { set, negated: true } => Op::AnyBut(set),
        }
    }
}

/// Recursive descent compiler from pattern text to a [`Program`].
#[derive(Debug)]
pub(crate) struct Compiler<'p> {
    pattern: &'p [u8],
    pos: usize,
    insts: Vec<Inst>,
    groups: usize,
    size_limit: usize,
}

impl<'p> Compiler<'p> {
    pub(crate) fn new(pattern: &'p [u8], size_limit: usize) -> Self {
        Self { pattern, pos: 0, insts: Vec::new(), groups: 0, size_limit }
    }

    /// Compile the whole pattern.
    pub(crate) fn compile(mut self) -> CompileResult<Program> {
        if self.pattern.len() > self.size_limit {
            return Err(CompileError::PatternTooLong {
                len: self.pattern.len(),
                limit: self.size_limit,
            });
        }

        let fragment = self.compile_alternation(None)?;
        if self.pos < self.pattern.len() {
            // Alternations only stop early at a ')'.
            return Err(CompileError::UnmatchedParenthesis { offset: self.pos });
        }

        let (first_byte, anchored, must) = self.optimize(fragment.start);
        let program =
            Program::new(self.insts, fragment.start, self.groups, first_byte, anchored, must);
        program.check()?;
        debug!(
            "compiled {:?}: {} instructions, {} groups, start {:?}, anchored {}, must {:?}",
            self.pattern.escape_ascii().to_string(),
            program.insts().len(),
            program.group_count(),
            program.first_byte(),
            program.is_anchored(),
            program.must().map(|lit| lit.escape_ascii().to_string()),
        );
        Ok(program)
    }

    fn peek(&self) -> Option<u8> {
        self.pattern.get(self.pos).copied()
    }

    fn emit(&mut self, op: Op) -> InstId {
        let id = self.insts.len();
        self.insts.push(Inst { op, next: None });
        id
    }

    fn emit_assembly(&mut self, assembly: Assembly) -> InstId {
        self.emit(assembly.into_op())
    }

    /// Find the last instruction of the chain starting at `id`.
    fn tail(&self, mut id: InstId) -> CompileResult<InstId> {
        for _ in 0..=self.insts.len() {
            match self.insts[id].next {
                Some(next) => id = next,
                None => return Ok(id),
            }
        }
        Err(CompileError::InternalAssemblyFault(format!("chain through {} does not end", id)))
    }

    /// Append `to` to the end of the chain starting at `from`.
    fn connect(&mut self, from: InstId, to: InstId) -> CompileResult<()> {
        let tail = self.tail(from)?;
        self.insts[tail].next = Some(to);
        Ok(())
    }

    /// Compile `branch ('|' branch)*`, either the whole pattern or the
    /// inside of the group `group`, whose '(' is at `offset`.
    fn compile_alternation(&mut self, group: Option<(u8, usize)>) -> CompileResult<Fragment> {
        let open = group.map(|(n, _)| self.emit(Op::Open(n)));
        let mut branches: Vec<InstId> = Vec::new();
        let mut has_width = true;

        loop {
            let offset = self.pos;
            let (branch, flags, empty) = self.compile_branch()?;
            if empty && (!branches.is_empty() || self.peek() == Some(b'|')) {
                return Err(CompileError::EmptyAlternative { offset });
            }
            has_width &= flags.has_width;
            if let Some(&prev) = branches.last() {
                self.insts[prev].next = Some(branch);
            }
            branches.push(branch);

            if self.peek() == Some(b'|') {
                self.pos += 1;
            } else {
                break;
            }
        }

        let ender = self.emit(match group {
            Some((n, _)) => Op::Close(n),
            None => Op::End,
        });
        let (first, last) = match (branches.first(), branches.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(CompileError::InternalAssemblyFault("alternation without branches".into())),
        };
        self.insts[last].next = Some(ender);
        if let Some(open) = open {
            self.insts[open].next = Some(first);
        }
        for &branch in &branches {
            if let Op::Branch(body) = self.insts[branch].op {
                self.connect(body, ender)?;
            }
        }

        if let Some((_, offset)) = group {
            if self.peek() != Some(b')') {
                return Err(CompileError::UnmatchedParenthesis { offset });
            }
            self.pos += 1;
        }

        Ok(Fragment { start: open.unwrap_or(first), flags: Flags { has_width, simple: false } })
    }

    /// Compile `piece*` up to the next '|', ')' or the end of the pattern.
    /// Returns the BRANCH introducing it and whether it was empty.
    fn compile_branch(&mut self) -> CompileResult<(InstId, Flags, bool)> {
        // The operand is patched once the body has been emitted.
        let branch = self.emit(Op::Branch(InstId::MAX));
        let mut flags = Flags::default();
        let mut first = None;
        let mut chain = None;

        while let Some(byte) = self.peek() {
            if byte == b'|' || byte == b')' {
                break;
            }
            let piece = self.compile_piece()?;
            flags.has_width |= piece.flags.has_width;
            match chain {
                Some(prev) => self.connect(prev, piece.start)?,
                None => first = Some(piece.start),
            }
            chain = Some(piece.start);
        }

        let body = match first {
            Some(body) => body,
            None => self.emit(Op::Nothing),
        };
        self.insts[branch].op = Op::Branch(body);
        Ok((branch, flags, first.is_none()))
    }

    /// Compile an atom followed by an optional '*' or '+'.
    fn compile_piece(&mut self) -> CompileResult<Fragment> {
        let atom = self.compile_atom()?;
        let op = match self.peek() {
            Some(byte) if is_repeat(byte) => byte,
            _ => return Ok(atom),
        };
        let offset = self.pos;
        if !atom.flags.has_width {
            return Err(CompileError::EmptyRepeat { op: op as char, offset });
        }
        self.pos += 1;

        let start = if atom.flags.simple {
            self.compile_simple_repeat(atom.start, op)
        } else if op == b'*' {
            self.compile_star(atom.start)?
        } else {
            self.compile_plus(atom.start)?
        };

        if let Some(byte) = self.peek().filter(|&byte| is_repeat(byte)) {
            return Err(CompileError::DanglingOperator { op: byte as char, offset: self.pos });
        }

        Ok(Fragment { start, flags: Flags { has_width: op == b'+', simple: false } })
    }

    /// STAR or PLUS around a one-byte-wide operand.
    fn compile_simple_repeat(&mut self, operand: InstId, op: u8) -> InstId {
        let node = self.emit(if op == b'*' { Op::Star(operand) } else { Op::Plus(operand) });
        // The operand is never followed during matching; point it back at
        // its repeat so every chain in the program is closed.
        self.insts[operand].next = Some(node);
        node
    }

    /// `x*` as `BRANCH(x BACK->loop) | BRANCH(NOTHING)`.
    fn compile_star(&mut self, operand: InstId) -> CompileResult<InstId> {
        let looping = self.emit(Op::Branch(operand));
        let back = self.emit(Op::Back);
        self.connect(operand, back)?;
        self.insts[back].next = Some(looping);

        let nothing = self.emit(Op::Nothing);
        let exit = self.emit(Op::Branch(nothing));
        self.insts[looping].next = Some(exit);
        self.insts[exit].next = Some(nothing);
        Ok(looping)
    }

    /// `x+` as `x BRANCH(BACK->x) | BRANCH(NOTHING)`.
    fn compile_plus(&mut self, operand: InstId) -> CompileResult<InstId> {
        let back = self.emit(Op::Back);
        self.insts[back].next = Some(operand);
        let looping = self.emit(Op::Branch(back));
        self.connect(operand, looping)?;

        let nothing = self.emit(Op::Nothing);
        let exit = self.emit(Op::Branch(nothing));
        self.insts[looping].next = Some(exit);
        self.insts[exit].next = Some(nothing);
        Ok(operand)
    }

    fn compile_atom(&mut self) -> CompileResult<Fragment> {
        let offset = self.pos;
        let byte = match self.peek() {
            Some(byte) => byte,
            None => return Err(CompileError::InternalAssemblyFault("atom at end of pattern".into())),
        };
        let width = Flags { has_width: true, simple: true };

        match byte {
            b'^' => {
                self.pos += 1;
                Ok(Fragment { start: self.emit(Op::Bol), flags: Flags::default() })
            }
            b'$' => {
                self.pos += 1;
                Ok(Fragment { start: self.emit(Op::Eol), flags: Flags::default() })
            }
            b'.' => {
                self.pos += 1;
                Ok(Fragment { start: self.emit(Op::Any), flags: width })
            }
            b'[' => {
                self.pos += 1;
                let assembly = self.compile_bracket(offset)?;
                Ok(Fragment { start: self.emit_assembly(assembly), flags: width })
            }
            b'(' => {
                if self.groups >= NSUBEXP - 1 {
                    return Err(CompileError::TooManyGroups { offset });
                }
                self.pos += 1;
                self.groups += 1;
                let group = self.groups as u8;
                let inner = self.compile_alternation(Some((group, offset)))?;
                let flags = Flags { has_width: inner.flags.has_width, simple: false };
                Ok(Fragment { start: inner.start, flags })
            }
            b'*' | b'+' => Err(CompileError::DanglingOperator { op: byte as char, offset }),
            b'|' | b')' => Err(CompileError::InternalAssemblyFault(format!(
                "unexpected {} at offset {}",
                byte as char, offset
            ))),
            _ => self.compile_literal(),
        }
    }

    /// Compile a run of ordinary and escaped bytes into one EXACTLY.
    fn compile_literal(&mut self) -> CompileResult<Fragment> {
        let mut bytes = Vec::new();
        let mut last_start = self.pos;

        while let Some(byte) = self.peek() {
            if is_meta(byte) && byte != b'\\' {
                break;
            }
            last_start = self.pos;
            if byte == b'\\' {
                match self.pattern.get(self.pos + 1) {
                    Some(&escaped) => bytes.push(escaped),
                    None => return Err(CompileError::TrailingBackslash { offset: self.pos }),
                }
                self.pos += 2;
            } else {
                bytes.push(byte);
                self.pos += 1;
            }
        }

        // A repeat binds to the last byte only, so leave it for the next
        // piece.
        if bytes.len() > 1 && self.peek().map_or(false, is_repeat) {
            bytes.pop();
            self.pos = last_start;
        }

        let simple = bytes.len() == 1;
        let start = self.emit_assembly(Assembly::Literal(bytes));
        Ok(Fragment { start, flags: Flags { has_width: true, simple } })
    }

    /// Compile the inside of a bracket expression whose '[' is at `offset`.
    fn compile_bracket(&mut self, offset: usize) -> CompileResult<Assembly> {
        let negated = self.peek() == Some(b'^');
        if negated {
            self.pos += 1;
        }

        let mut set = ByteSet::new();
        if let Some(byte @ (b']' | b'-')) = self.peek() {
            set.insert(byte);
            self.pos += 1;
        }

        loop {
            match self.peek() {
                None => return Err(CompileError::UnterminatedBracket { offset }),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b'-') => {
                    self.pos += 1;
                    match self.peek() {
                        None | Some(b']') => set.insert(b'-'),
                        Some(end) => {
                            let start = self.pattern[self.pos - 2];
                            if start > end {
                                return Err(CompileError::InvalidRange {
                                    start,
                                    end,
                                    offset: self.pos - 2,
                                });
                            }
                            set.insert_range(start, end);
                            self.pos += 1;
                        }
                    }
                }
                Some(byte) => {
                    set.insert(byte);
                    self.pos += 1;
                }
            }
        }

        Ok(Assembly::Set { set, negated })
    }

    fn is_branch(&self, id: Option<InstId>) -> bool {
        id.map_or(false, |id| matches!(self.insts[id].op, Op::Branch(_)))
    }

    /// Walk the chain every match must pass through, from `entry` to END,
    /// and derive the anchoring flag, the first byte and the longest
    /// mandatory literal. Single-alternative branches are entered while
    /// alternations and repeats are stepped over.
    fn optimize(&self, entry: InstId) -> (Option<u8>, bool, Option<Box<[u8]>>) {
        let mut first_byte = None;
        let mut anchored = false;
        let mut consumed = false;
        let mut must: Option<&[u8]> = None;

        let mut id = Some(entry);
        while let Some(current) = id {
            let inst = &self.insts[current];
            match &inst.op {
                Op::Branch(body) => {
                    if !self.is_branch(inst.next) {
                        id = Some(*body);
                        continue;
                    }
                    // Nothing inside an alternation is mandatory. Skip to
                    // the node its last branch leads to.
                    consumed = true;
                    let mut last = current;
                    while let Some(next) = self.insts[last].next.filter(|&n| self.is_branch(Some(n))) {
                        last = next;
                    }
                    id = self.insts[last].next;
                    continue;
                }
                Op::Bol => anchored |= !consumed,
                Op::Exactly(lit) => {
                    if !consumed {
                        first_byte = lit.first().copied();
                    }
                    consumed = true;
                    if lit.len() > must.map_or(0, |m| m.len()) {
                        must = Some(&lit[..]);
                    }
                }
                Op::End => break,
                Op::Eol | Op::Open(_) | Op::Close(_) | Op::Nothing | Op::Back => {}
                Op::Any | Op::AnyOf(_) | Op::AnyBut(_) | Op::Star(_) | Op::Plus(_) => {
                    consumed = true
                }
            }
            id = inst.next;
        }

        (first_byte, anchored, must.map(Box::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::OpKind;

    fn compile(pattern: &str) -> CompileResult<Program> {
        Compiler::new(pattern.as_bytes(), 1 << 15).compile()
    }

    fn kinds(prog: &Program) -> Vec<OpKind> {
        prog.insts().iter().map(|inst| inst.op.kind()).collect()
    }

    #[test]
    fn test_literal_run() {
        let prog = compile("abc").unwrap();
        assert_eq!(kinds(&prog), vec![OpKind::Branch, OpKind::Exactly, OpKind::End]);
        assert_eq!(prog.insts()[1].op, Op::Exactly(b"abc".to_vec().into()));
        assert_eq!(prog.start(), 0);
        assert_eq!(prog.first_byte(), Some(b'a'));
        assert_eq!(prog.must(), Some(&b"abc"[..]));
        assert!(!prog.is_anchored());
    }

    #[test]
    fn test_repeat_splits_literal_run() {
        let prog = compile("abc*").unwrap();
        let literals: Vec<_> = prog
            .parts()
            .filter_map(|part| part.literal.map(|lit| lit.to_vec()))
            .collect();
        assert_eq!(literals, vec![b"ab".to_vec(), b"c".to_vec()]);
        assert!(prog.parts().any(|part| part.kind == OpKind::Star));
    }

    #[test]
    fn test_escapes_join_literal_run() {
        let prog = compile(r"a\.b\*").unwrap();
        assert_eq!(prog.insts()[1].op, Op::Exactly(b"a.b*".to_vec().into()));
    }

    #[test]
    fn test_question_mark_is_literal() {
        let prog = compile("a?").unwrap();
        assert_eq!(prog.insts()[1].op, Op::Exactly(b"a?".to_vec().into()));
    }

    #[test]
    fn test_bracket_sets() {
        let prog = compile("[a-c]").unwrap();
        let set = prog.parts().find_map(|part| part.set.copied()).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), b"abc".to_vec());
        assert_eq!(prog.insts()[1].op.kind(), OpKind::AnyOf);

        let prog = compile("[^]-]").unwrap();
        assert_eq!(prog.insts()[1].op.kind(), OpKind::AnyBut);
        let set = prog.parts().find_map(|part| part.set.copied()).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), b"-]".to_vec());
    }

    #[test]
    fn test_bracket_leading_dash_and_trailing_dash() {
        let prog = compile("[-a-]").unwrap();
        let set = prog.parts().find_map(|part| part.set.copied()).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), b"-a".to_vec());
    }

    #[test]
    fn test_group_numbering() {
        let prog = compile("(a(b))(c)").unwrap();
        assert_eq!(prog.group_count(), 3);
        let opens: Vec<_> = prog
            .parts()
            .filter(|part| part.kind == OpKind::Open)
            .map(|part| part.cmd.unwrap())
            .collect();
        assert_eq!(opens, vec![1, 2, 3]);
    }

    #[test]
    fn test_complex_star_uses_branch_loop() {
        let prog = compile("(ab)*").unwrap();
        assert!(prog.parts().any(|part| part.kind == OpKind::Back));
        assert!(!prog.parts().any(|part| part.kind == OpKind::Star));
    }

    #[test]
    fn test_anchoring() {
        assert!(compile("^abc").unwrap().is_anchored());
        assert!(compile("(^abc)").unwrap().is_anchored());
        assert!(!compile("^a|b").unwrap().is_anchored());
        assert!(!compile("a^").unwrap().is_anchored());
    }

    #[test]
    fn test_first_byte() {
        assert_eq!(compile("^abc").unwrap().first_byte(), Some(b'a'));
        assert_eq!(compile("(xy)z").unwrap().first_byte(), Some(b'x'));
        assert_eq!(compile("a*b").unwrap().first_byte(), None);
        assert_eq!(compile(".b").unwrap().first_byte(), None);
        assert_eq!(compile("a|b").unwrap().first_byte(), None);
    }

    #[test]
    fn test_must() {
        let prog = compile("xyz.*MUST").unwrap();
        assert_eq!(prog.must(), Some(&b"MUST"[..]));
        assert_eq!(prog.must_len(), 4);

        // Ties keep the first literal.
        assert_eq!(compile("ab.*cd").unwrap().must(), Some(&b"ab"[..]));
        // Alternations are not mandatory.
        assert_eq!(compile("a|bcd").unwrap().must(), None);
        assert_eq!(compile("x(abc|d)").unwrap().must(), Some(&b"x"[..]));
        assert_eq!(compile("(abcd)*x").unwrap().must(), Some(&b"x"[..]));
        assert_eq!(compile("").unwrap().must_len(), 0);
    }

    #[test]
    fn test_errors() {
        let cases = [
            ("[abc", CompileError::UnterminatedBracket { offset: 0 }),
            ("x[^", CompileError::UnterminatedBracket { offset: 1 }),
            ("*a", CompileError::DanglingOperator { op: '*', offset: 0 }),
            ("a|+b", CompileError::DanglingOperator { op: '+', offset: 2 }),
            ("a**", CompileError::DanglingOperator { op: '*', offset: 2 }),
            ("(a", CompileError::UnmatchedParenthesis { offset: 0 }),
            ("a)", CompileError::UnmatchedParenthesis { offset: 1 }),
            ("a|", CompileError::EmptyAlternative { offset: 2 }),
            ("|a", CompileError::EmptyAlternative { offset: 0 }),
            ("(a||b)", CompileError::EmptyAlternative { offset: 3 }),
            ("(((((((((())))))))))", CompileError::TooManyGroups { offset: 9 }),
            ("ab\\", CompileError::TrailingBackslash { offset: 2 }),
            ("[z-a]", CompileError::InvalidRange { start: b'z', end: b'a', offset: 1 }),
            ("()*", CompileError::EmptyRepeat { op: '*', offset: 2 }),
            ("^+", CompileError::EmptyRepeat { op: '+', offset: 1 }),
        ];
        for (pattern, expected) in cases {
            assert_eq!(compile(pattern).unwrap_err(), expected, "pattern {:?}", pattern);
        }
    }

    #[test]
    fn test_nine_groups_is_fine() {
        assert_eq!(compile("(((((((((a)))))))))").unwrap().group_count(), 9);
    }

    #[test]
    fn test_pattern_too_long() {
        let err = Compiler::new(b"abcdef", 5).compile().unwrap_err();
        assert_eq!(err, CompileError::PatternTooLong { len: 6, limit: 5 });
    }

    #[test]
    fn test_every_program_checks() {
        for pattern in ["", "()", "a|b|c", "(a|b)+c", "((a)*b)+", "[^x]*$", "^(.)(.)(.)"] {
            let prog = compile(pattern).unwrap();
            assert_eq!(prog.check(), Ok(()), "pattern {:?}\n{}", pattern, prog);
        }
    }
}
