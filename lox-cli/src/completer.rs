use std::borrow::Cow;
use std::cell::RefCell;

use rustyline::Context;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline_derive::{Helper, Hinter, Validator};

use lox::{KEYWORDS, is_identifier_char};

const KEYWORD_COLOR: &str = "\x1b[35m";
const GLOBAL_COLOR: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Rustyline helper completing keywords and the session's globals.
#[derive(Helper, Hinter, Validator)]
pub struct LoxHelper {
    globals: RefCell<Vec<String>>,
}

impl LoxHelper {
    pub fn new(globals: Vec<String>) -> Self {
        Self {
            globals: RefCell::new(globals),
        }
    }

    pub fn set_globals(&self, globals: Vec<String>) {
        *self.globals.borrow_mut() = globals;
    }

    /// Find the start position of the current word being typed
    fn find_word_start(line: &str, pos: usize) -> usize {
        line[..pos]
            .char_indices()
            .rev()
            .find(|&(_, c)| !is_identifier_char(c))
            .map_or(0, |(i, c)| i + c.len_utf8())
    }

    fn get_completions(prefix: &str, globals: &[String]) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }

        let mut completions: Vec<String> = KEYWORDS
            .keys()
            .map(|keyword| (*keyword).to_string())
            .chain(globals.iter().cloned())
            .filter(|candidate| candidate.starts_with(prefix))
            .collect();
        completions.sort();
        completions.dedup();
        completions
    }

    /// Colors keywords and known globals. String literals and comments are
    /// left alone.
    pub fn highlight_line(line: &str, globals: &[String]) -> String {
        let mut result = String::with_capacity(line.len());
        let mut word_start = None;
        let mut in_string = false;

        let flush = |result: &mut String, word: &str| {
            if KEYWORDS.contains_key(word) {
                result.push_str(KEYWORD_COLOR);
                result.push_str(word);
                result.push_str(RESET);
            } else if globals.iter().any(|g| g == word) {
                result.push_str(GLOBAL_COLOR);
                result.push_str(word);
                result.push_str(RESET);
            } else {
                result.push_str(word);
            }
        };

        for (i, c) in line.char_indices() {
            if in_string {
                result.push(c);
                in_string = c != '"';
                continue;
            }
            if is_identifier_char(c) {
                word_start.get_or_insert(i);
                continue;
            }
            if let Some(start) = word_start.take() {
                flush(&mut result, &line[start..i]);
            }
            if c == '/' && line[i..].starts_with("//") {
                result.push_str(&line[i..]);
                return result;
            }
            in_string = c == '"';
            result.push(c);
        }
        if let Some(start) = word_start {
            flush(&mut result, &line[start..]);
        }

        result
    }
}

impl Highlighter for LoxHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let globals = self.globals.borrow();
        Cow::Owned(Self::highlight_line(line, &globals))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

impl Completer for LoxHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = Self::find_word_start(line, pos);
        let prefix = &line[start..pos];
        let globals = self.globals.borrow();

        let pairs = Self::get_completions(prefix, &globals)
            .into_iter()
            .map(|s| Pair {
                display: s.clone(),
                replacement: s,
            })
            .collect();

        Ok((start, pairs))
    }
}
