/*!
Classic V8-style regular expressions, executed by a backtracking matcher.

This crate compiles a pattern into a small linked program, runs that program
against a subject with up to nine capture groups, and expands substitution
templates from the captures of the most recent match.

# Example

```
let prog = regexp::compile("(a+)(b+)").unwrap();
let mut caps = prog.new_captures();
assert!(prog.exec("xaaabbb", &mut caps));
assert_eq!(caps.get(0), Some(&b"aaabbb"[..]));
assert_eq!(caps.get(1), Some(&b"aaa"[..]));
assert_eq!(caps.get(2), Some(&b"bbb"[..]));

let mut out = Vec::new();
caps.substitute(br"\2-\1", &mut out).unwrap();
assert_eq!(out, b"bbb-aaa");
```

# Syntax

| Pattern  | Meaning                                                    |
|----------|------------------------------------------------------------|
| `c`      | the byte `c`                                               |
| `\c`     | the byte `c`, even if it is special                        |
| `.`      | any byte except `\n`                                       |
| `[abc]`  | any of the listed bytes; `a-z` is a range                  |
| `[^abc]` | any byte not listed                                        |
| `^`, `$` | the start and the end of the subject                       |
| `(re)`   | a capture group, numbered by its opening parenthesis      |
| `x*`     | zero or more `x`, greedy                                   |
| `x+`     | one or more `x`, greedy                                    |
| `x\|y`   | `x`, or else `y`                                           |

Matching is leftmost with alternatives tried in order, not POSIX
leftmost-longest. There are no lazy or possessive quantifiers and `?` is an
ordinary byte.

# Substitution

In a template, `&` stands for the whole match and `\1` through `\9` for the
groups (`\0` is also the whole match). `\&` and `\\` produce a literal `&`
and `\`.

# Inspecting programs

A [`Program`] prints as a listing of its instructions. [`Program::parts`]
yields one read-only [`Part`] per instruction, [`Program::next`] follows the
successor links, and [`Program::check`] verifies that every link stays in
bounds and every chain reaches END. Successor links never enter the body of
a BRANCH, so walking them from [`Program::start`] visits one BRANCH per
alternative:

```
use regexp::OpKind;

let prog = regexp::compile("ab|c").unwrap();
let mut chain = Vec::new();
let mut id = Some(prog.start());
while let Some(current) = id {
    chain.push(prog.insts()[current].op.kind());
    id = prog.next(current);
}
assert_eq!(chain, [OpKind::Branch, OpKind::Branch, OpKind::End]);
assert_eq!(prog.check(), Ok(()));
```

# Crate features

* **std** - Enabled by default. Required for now.
* **perf** - Enables all performance features. Currently that is only
  **perf-literal**, which uses `memchr` to scan for the first byte and the
  mandatory literal of a pattern.
* **logging** - Emits `log` messages describing compiled programs and
  pre-rejected subjects.
*/

#![deny(missing_debug_implementations)]

#[macro_use]
mod macros;

mod builder;
mod compiler;
mod literal;
mod matcher;
mod program;
mod substitute;

pub use builder::{Builder, Reporter};
pub use matcher::{Captures, Matcher, Stats};
pub use program::{ByteSet, Inst, InstId, Op, OpKind, Part, Program, NSUBEXP};
pub use substitute::{substitute, substitute_with, SubstituteError};

/// The result of compiling a pattern.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors that can occur during compilation.
///
/// Offsets are byte offsets into the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A `[` without its closing `]`.
    UnterminatedBracket { offset: usize },
    /// A `*` or `+` with nothing to repeat, or following another one.
    DanglingOperator { op: char, offset: usize },
    /// A `(` without `)`, or a `)` without `(`.
    UnmatchedParenthesis { offset: usize },
    /// One side of a `|` is empty.
    EmptyAlternative { offset: usize },
    /// More than nine capture groups.
    TooManyGroups { offset: usize },
    /// The pattern is longer than the configured limit.
    PatternTooLong { len: usize, limit: usize },
    /// A `\` at the very end of the pattern.
    TrailingBackslash { offset: usize },
    /// A bracket range whose end is below its start.
    InvalidRange { start: u8, end: u8, offset: usize },
    /// A `*` or `+` applied to something that can match the empty string.
    EmptyRepeat { op: char, offset: usize },
    /// The code generator produced an inconsistent program.
    InternalAssemblyFault(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnterminatedBracket { offset } => {
                write!(f, "unmatched [] at offset {}", offset)
            }
            CompileError::DanglingOperator { op, offset } => {
                write!(f, "{} follows nothing at offset {}", op, offset)
            }
            CompileError::UnmatchedParenthesis { offset } => {
                write!(f, "unmatched () at offset {}", offset)
            }
            CompileError::EmptyAlternative { offset } => {
                write!(f, "empty alternative at offset {}", offset)
            }
            CompileError::TooManyGroups { offset } => {
                write!(f, "too many () at offset {}, at most {} allowed", offset, NSUBEXP - 1)
            }
            CompileError::PatternTooLong { len, limit } => {
                write!(f, "regexp too big: {} bytes exceeds the limit of {}", len, limit)
            }
            CompileError::TrailingBackslash { offset } => {
                write!(f, "trailing \\ at offset {}", offset)
            }
            CompileError::InvalidRange { start, end, offset } => write!(
                f,
                "invalid [] range {}-{} at offset {}",
                start.escape_ascii(),
                end.escape_ascii(),
                offset
            ),
            CompileError::EmptyRepeat { op, offset } => {
                write!(f, "{} operand could be empty at offset {}", op, offset)
            }
            CompileError::InternalAssemblyFault(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compile `pattern` with the default configuration.
///
/// Use a [`Builder`] to change limits or to receive diagnostics through a
/// [`Reporter`].
pub fn compile(pattern: &str) -> CompileResult<Program> {
    Builder::new().build(pattern)
}

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
