use anyhow::Result;
use regexp::{compile, substitute, Captures, SubstituteError};

use crate::init;

fn expand(pattern: &str, subject: &str, template: &[u8]) -> Result<Vec<u8>> {
    init();
    let prog = compile(pattern)?;
    let caps = prog.captures(subject).ok_or_else(|| anyhow::anyhow!("{:?} did not match", pattern))?;
    let mut out = Vec::new();
    substitute(&caps, template, &mut out)?;
    Ok(out)
}

#[test]
fn whole_match() -> Result<()> {
    assert_eq!(expand("c.", "xcdy", b"prefix-&-suffix")?, b"prefix-cd-suffix");
    Ok(())
}

#[test]
fn numbered_groups() -> Result<()> {
    assert_eq!(expand("([a-z]+)=([0-9]+)", "set x=42;", br"\2:\1")?, b"42:x");
    assert_eq!(expand("(a)(b)(c)(d)(e)(f)(g)(h)(i)", "abcdefghi", br"\9\8\1")?, b"iha");
    Ok(())
}

#[test]
fn missing_groups_expand_to_nothing() -> Result<()> {
    assert_eq!(expand("(x)*y", "y", br"<\1>")?, b"<>");
    assert_eq!(expand("y", "y", br"<\5>")?, b"<>");
    Ok(())
}

#[test]
fn literal_markers() -> Result<()> {
    assert_eq!(expand("b", "abc", br"\&=&, \\=\\")?, br"&=b, \=\");
    assert_eq!(expand("b", "abc", br"\t\x")?, br"\t\x");
    Ok(())
}

#[test]
fn requires_a_match() {
    init();
    let prog = compile("q").expect("valid pattern");
    let mut caps = Captures::new();
    let mut out = Vec::new();
    assert_eq!(substitute(&caps, b"&", &mut out), Err(SubstituteError::NoMatch));

    assert!(prog.exec("aqa", &mut caps));
    caps.substitute(b"[&]", &mut out).expect("valid captures");
    assert_eq!(out, b"[q]");

    assert!(!prog.exec("aaa", &mut caps));
    assert_eq!(caps.substitute(b"[&]", &mut out), Err(SubstituteError::NoMatch));
    assert_eq!(out, b"[q]");
    assert_eq!(SubstituteError::NoMatch.to_string(), "no match to substitute from");
}
