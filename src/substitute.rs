use crate::{builder::Reporter, matcher::Captures};

/// Errors that can occur while expanding a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstituteError {
    /// The captures do not hold a successful match.
    NoMatch,
}

impl std::fmt::Display for SubstituteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubstituteError::NoMatch => write!(f, "no match to substitute from"),
        }
    }
}

impl std::error::Error for SubstituteError {}

/// Append `template` to `out`, replacing `&` with the whole match and `\0`
/// through `\9` with the corresponding group of `caps`.
///
/// A group that did not participate in the match expands to nothing. `\&`
/// and `\\` produce a literal `&` and `\`; every other byte, including a
/// `\` before anything else, is copied as is.
///
/// Nothing is written if `caps` holds no match.
///
/// ```
/// let prog = regexp::compile("c.").unwrap();
/// let caps = prog.captures("xcdy").unwrap();
/// let mut out = Vec::new();
/// regexp::substitute(&caps, b"prefix-&-suffix", &mut out).unwrap();
/// assert_eq!(out, b"prefix-cd-suffix");
/// ```
pub fn substitute(caps: &Captures<'_>, template: &[u8], out: &mut Vec<u8>) -> Result<(), SubstituteError> {
    if !caps.is_match() {
        debug!("substitution requested without a match");
        return Err(SubstituteError::NoMatch);
    }

    let mut bytes = template.iter().copied();
    while let Some(byte) = bytes.next() {
        let group = match byte {
            b'&' => Some(0),
            b'\\' => match bytes.clone().next() {
                Some(digit @ b'0'..=b'9') => {
                    bytes.next();
                    Some(usize::from(digit - b'0'))
                }
                Some(escaped @ (b'\\' | b'&')) => {
                    bytes.next();
                    out.push(escaped);
                    continue;
                }
                _ => None,
            },
            _ => None,
        };
        match group {
            Some(i) => out.extend_from_slice(caps.get(i).unwrap_or_default()),
            None => out.push(byte),
        }
    }
    Ok(())
}

/// Like [`substitute`], but also sends the message of any error to
/// `reporter` before returning it.
pub fn substitute_with(
    caps: &Captures<'_>,
    template: &[u8],
    out: &mut Vec<u8>,
    reporter: &mut dyn Reporter,
) -> Result<(), SubstituteError> {
    substitute(caps, template, out).map_err(|err| {
        reporter.report(&err.to_string());
        err
    })
}
