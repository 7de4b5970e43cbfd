use lox::{KEYWORDS, TokenType};

/// Accumulates REPL lines until braces balance.
pub struct ReplState {
    buffer: String,
    brace_depth: usize,
}

impl ReplState {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            brace_depth: 0,
        }
    }

    pub fn prompt(&self) -> String {
        if self.brace_depth == 0 {
            "> ".to_string()
        } else {
            format!("..{} ", self.brace_depth)
        }
    }

    /// Returns true if ready to execute (braces balanced)
    pub fn process_line(&mut self, line: &str) -> bool {
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => self.brace_depth = self.brace_depth.saturating_sub(1),
                _ => {}
            }
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        self.brace_depth == 0
    }

    pub fn take_buffer(&mut self) -> String {
        self.brace_depth = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn cancel(&mut self) {
        self.buffer.clear();
        self.brace_depth = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// A bare expression typed without its semicolon, e.g. `1 + 2`.
    pub fn needs_semicolon(input: &str) -> bool {
        let code = strip_trailing_comments(input.trim());

        if code.is_empty() || code.ends_with(';') || code.ends_with('}') {
            return false;
        }

        // Statements missing their semicolon are left for the parser to report
        !starts_with_statement_keyword(code)
    }

    pub fn complete_statement(input: &str) -> String {
        format!("{};", strip_trailing_comments(input.trim()))
    }
}

fn strip_trailing_comments(code: &str) -> &str {
    let code = match code.find("//") {
        Some(idx) => code[..idx].trim(),
        None => code,
    };

    match code.rfind("/*") {
        Some(start) if code.ends_with("*/") => code[..start].trim(),
        _ => code,
    }
}

fn starts_with_statement_keyword(code: &str) -> bool {
    KEYWORDS.entries().any(|(keyword, token_type)| {
        let is_expression = matches!(
            token_type,
            TokenType::True | TokenType::False | TokenType::Nil | TokenType::This
        );
        !is_expression
            && code.strip_prefix(keyword).is_some_and(|rest| {
                rest.is_empty() || !rest.starts_with(lox::is_identifier_char)
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_empty_state() {
        let state = ReplState::new();
        assert!(state.is_empty());
        assert_eq!(state.brace_depth, 0);
    }

    #[test]
    fn prompt_shows_depth_when_in_block() {
        let mut state = ReplState::new();
        assert_eq!(state.prompt(), "> ");

        state.process_line("{");
        assert_eq!(state.prompt(), "..1 ");

        state.process_line("fun f() {");
        assert_eq!(state.prompt(), "..2 ");
    }

    #[test]
    fn process_line_ready_when_braces_balanced() {
        let mut state = ReplState::new();
        assert!(state.process_line("print 1;"));
    }

    #[test]
    fn process_line_waits_for_block_to_close() {
        let mut state = ReplState::new();
        assert!(!state.process_line("while (true) {"));
        assert!(!state.process_line("{"));
        assert!(!state.process_line("}"));
        assert!(state.process_line("}"));
    }

    #[test]
    fn take_buffer_returns_lines_and_resets() {
        let mut state = ReplState::new();
        state.process_line("{");
        state.process_line("print 1;");
        state.process_line("}");

        assert_eq!(state.take_buffer(), "{\nprint 1;\n}\n");
        assert!(state.is_empty());
    }

    #[test]
    fn cancel_clears_buffer_and_depth() {
        let mut state = ReplState::new();
        state.process_line("{");
        state.process_line("print 1;");
        state.cancel();

        assert!(state.is_empty());
        assert_eq!(state.prompt(), "> ");
    }

    #[test]
    fn handles_unmatched_closing_brace() {
        let mut state = ReplState::new();
        assert!(state.process_line("}"));
        assert_eq!(state.brace_depth, 0);
    }

    #[test]
    fn bare_expressions_need_semicolon() {
        assert!(ReplState::needs_semicolon("1 + 2"));
        assert!(ReplState::needs_semicolon("\"text\""));
        assert!(ReplState::needs_semicolon("counter()"));
        assert!(ReplState::needs_semicolon("true"));
        assert!(ReplState::needs_semicolon("nil"));
        assert!(ReplState::needs_semicolon("classes"));
        assert!(ReplState::needs_semicolon("x // trailing note"));
    }

    #[test]
    fn complete_input_is_left_alone() {
        assert!(!ReplState::needs_semicolon("print 1;"));
        assert!(!ReplState::needs_semicolon("1 + 2;"));
        assert!(!ReplState::needs_semicolon("{ print 1; }"));
        assert!(!ReplState::needs_semicolon(""));
        assert!(!ReplState::needs_semicolon("   \n"));
    }

    #[test]
    fn comments_alone_need_nothing() {
        assert!(!ReplState::needs_semicolon("// note"));
        assert!(!ReplState::needs_semicolon("/* block */"));
        assert!(!ReplState::needs_semicolon("/* a */ // b"));
        assert!(!ReplState::needs_semicolon("print 1; // done"));
    }

    #[test]
    fn statements_missing_semicolon_go_to_the_parser() {
        assert!(!ReplState::needs_semicolon("print a"));
        assert!(!ReplState::needs_semicolon("var x = 1"));
        assert!(!ReplState::needs_semicolon("return x"));
        assert!(!ReplState::needs_semicolon("break"));
    }

    #[test]
    fn complete_statement_appends_semicolon() {
        assert_eq!(ReplState::complete_statement("a"), "a;");
        assert_eq!(ReplState::complete_statement(" 1 + 2 \n"), "1 + 2;");
        assert_eq!(ReplState::complete_statement("x // note"), "x;");
    }
}
