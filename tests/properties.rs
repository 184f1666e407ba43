use quickcheck::{quickcheck, TestResult};
use regexp::{compile, Captures, Matcher, Program};

use crate::init;

const PATTERNS: &[&str] = &[
    "a+b*",
    "(a|b)*c",
    "([a-c]+)([^a-c]*)$",
    "^(.)(.)",
    "x(y|yz)(z*)",
    "((a)|(b))+",
];

fn programs() -> Vec<Program> {
    PATTERNS.iter().map(|pattern| compile(pattern).expect("valid pattern")).collect()
}

fn escape(text: &str) -> String {
    text.chars().flat_map(|ch| ['\\', ch]).collect()
}

#[test]
fn repeated_exec_is_identical() {
    fn prop(subject: String) -> bool {
        programs().iter().all(|prog| prog.captures(&subject) == prog.captures(&subject))
    }
    init();
    quickcheck(prop as fn(String) -> bool);
}

#[test]
fn groups_lie_within_the_match() {
    fn prop(subject: String) -> bool {
        programs().iter().all(|prog| {
            let Some(caps) = prog.captures(&subject) else {
                return true;
            };
            let Some(whole) = caps.range(0) else {
                return false;
            };
            (1..regexp::NSUBEXP).filter_map(|i| caps.range(i)).all(|group| {
                group.start <= group.end && whole.start <= group.start && group.end <= whole.end
            })
        })
    }
    init();
    quickcheck(prop as fn(String) -> bool);
}

#[test]
fn anchored_matches_only_at_start() {
    fn prop(subject: String) -> bool {
        let prog = compile("^a").expect("valid pattern");
        match prog.captures(&subject) {
            Some(caps) => caps.range(0) == Some(0..1),
            None => !subject.starts_with('a'),
        }
    }
    init();
    quickcheck(prop as fn(String) -> bool);
}

#[test]
fn escaped_literal_finds_first_occurrence() {
    fn prop(needle: String, haystack: String) -> TestResult {
        let Ok(prog) = compile(&escape(&needle)) else {
            return TestResult::failed();
        };
        let subject = format!("{}{}", haystack, needle);
        let expected = subject.find(&needle).map(|at| at..at + needle.len());
        TestResult::from_bool(prog.captures(&subject).and_then(|caps| caps.range(0)) == expected)
    }
    init();
    quickcheck(prop as fn(String, String) -> TestResult);
}

#[test]
fn missing_literal_never_enters_the_matcher() {
    fn prop(subject: String) -> TestResult {
        if subject.contains("MUST") {
            return TestResult::discard();
        }
        let prog = compile("xyz.*MUST").expect("valid pattern");
        let mut matcher = Matcher::new(&prog);
        let mut caps = Captures::new();
        let matched = matcher.exec(&subject, &mut caps);
        TestResult::from_bool(!matched && matcher.stats().steps == 0)
    }
    init();
    quickcheck(prop as fn(String) -> TestResult);
}
