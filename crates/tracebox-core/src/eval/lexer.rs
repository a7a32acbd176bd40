//! Tokenizer with indentation tracking.

use std::rc::Rc;

use super::Fault;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(Rc<str>),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    FStr(Vec<FPiece>),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// Raw piece of an f-string; field sources are parsed by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum FPiece {
    Literal(String),
    Field {
        source: String,
        repr: bool,
        spec: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

/// A syntax or indentation error, positioned on a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFault {
    pub kind: &'static str,
    pub message: String,
    pub line: usize,
}

impl SyntaxFault {
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        Self {
            kind: "SyntaxError",
            message: message.into(),
            line,
        }
    }

    pub fn indentation(message: impl Into<String>, line: usize) -> Self {
        Self {
            kind: "IndentationError",
            message: message.into(),
            line,
        }
    }
}

impl From<SyntaxFault> for Fault {
    fn from(err: SyntaxFault) -> Self {
        Fault::new(err.kind, format!("{} (line {})", err.message, err.line))
    }
}

/// Longest operators first so prefix matching picks `**=` over `**` over `*`.
const OPERATORS: &[&str] = &[
    "**=", "//=", "->", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "+",
    "-", "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxFault> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    indents: Vec<usize>,
    brackets: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            indents: vec![0],
            brackets: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn push(&mut self, tok: Tok, line: usize) {
        self.tokens.push(Token { tok, line });
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxFault> {
        loop {
            if self.at_line_start && self.brackets == 0 {
                if !self.indentation()? {
                    break;
                }
                continue;
            }

            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.bump();
                    if self.brackets == 0 {
                        self.push(Tok::Newline, self.line);
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\\' if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') => {
                    self.pos += 3;
                    self.line += 1;
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    self.number()?
                }
                c if c.is_alphabetic() || c == '_' => self.word()?,
                '"' | '\'' => {
                    let line = self.line;
                    let tok = self.string(false, false)?;
                    self.push(tok, line);
                }
                _ => self.operator()?,
            }
        }

        if self.brackets > 0 {
            return Err(SyntaxFault::syntax("unexpected EOF in bracketed expression", self.line));
        }
        if let Some(last) = self.tokens.last() {
            if !matches!(last.tok, Tok::Newline | Tok::Dedent) {
                self.push(Tok::Newline, self.line);
            }
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent, self.line);
        }
        self.push(Tok::Eof, self.line);
        Ok(self.tokens)
    }

    /// Measure the indentation of a logical line and emit INDENT/DEDENT.
    /// Blank and comment-only lines are skipped. Returns false at EOF.
    fn indentation(&mut self) -> Result<bool, SyntaxFault> {
        let mut width = 0usize;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                _ => break,
            }
            self.bump();
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n') => {
                self.bump();
                self.line += 1;
                return Ok(true);
            }
            Some('\r') => {
                self.bump();
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                return Ok(true);
            }
            Some(_) => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(Tok::Indent, self.line);
        } else {
            while width < *self.indents.last().unwrap_or(&0) {
                self.indents.pop();
                self.push(Tok::Dedent, self.line);
            }
            if width != *self.indents.last().unwrap_or(&0) {
                return Err(SyntaxFault::indentation(
                    "unindent does not match any outer indentation level",
                    self.line,
                ));
            }
        }
        self.at_line_start = false;
        Ok(true)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn number(&mut self) -> Result<(), SyntaxFault> {
        let line = self.line;

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c == '_' {
                        self.bump();
                    } else if c.is_digit(radix) {
                        digits.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                let value = i64::from_str_radix(&digits, radix)
                    .map_err(|_| SyntaxFault::syntax("invalid integer literal", line))?;
                self.push(Tok::Int(value), line);
                return Ok(());
            }
        }

        let mut text = String::new();
        let mut is_float = false;
        self.digits(&mut text);
        if self.peek() == Some('.') && !self.peek_at(1).is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            is_float = true;
            text.push('.');
            self.bump();
            self.digits(&mut text);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_at(1);
            let has_digits = match sign {
                Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if has_digits {
                is_float = true;
                text.push('e');
                self.bump();
                if let Some(s @ ('+' | '-')) = self.peek() {
                    text.push(s);
                    self.bump();
                }
                self.digits(&mut text);
            }
        }
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(SyntaxFault::syntax("invalid decimal literal", line));
        }

        let tok = if is_float {
            Tok::Float(
                text.parse::<f64>()
                    .map_err(|_| SyntaxFault::syntax("invalid decimal literal", line))?,
            )
        } else {
            Tok::Int(
                text.parse::<i64>()
                    .map_err(|_| SyntaxFault::syntax("integer literal is too large", line))?,
            )
        };
        self.push(tok, line);
        Ok(())
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c != '_' {
                break;
            }
            self.bump();
        }
    }

    fn word(&mut self) -> Result<(), SyntaxFault> {
        let line = self.line;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(), Some('"' | '\'')) {
            let lower = word.to_ascii_lowercase();
            let prefix = match lower.as_str() {
                "r" => Some((true, false)),
                "f" => Some((false, true)),
                "rf" | "fr" => Some((true, true)),
                "u" => Some((false, false)),
                "b" | "br" | "rb" => {
                    return Err(SyntaxFault::syntax("bytes literals are not supported", line))
                }
                _ => None,
            };
            if let Some((raw, format)) = prefix {
                let tok = self.string(raw, format)?;
                self.push(tok, line);
                return Ok(());
            }
        }

        self.push(Tok::Name(Rc::from(word)), line);
        Ok(())
    }

    fn string(&mut self, raw: bool, format: bool) -> Result<Tok, SyntaxFault> {
        let start_line = self.line;
        let quote = self.bump().unwrap_or('"');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut text = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(SyntaxFault::syntax("unterminated string literal", start_line));
            };
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    break;
                }
                text.push(c);
                continue;
            }
            if c == '\n' {
                if !triple {
                    return Err(SyntaxFault::syntax("unterminated string literal", start_line));
                }
                self.line += 1;
                text.push(c);
                continue;
            }
            if c != '\\' {
                text.push(c);
                continue;
            }

            let Some(escaped) = self.bump() else {
                return Err(SyntaxFault::syntax("unterminated string literal", start_line));
            };
            if escaped == '\n' {
                self.line += 1;
                if raw {
                    text.push('\\');
                    text.push('\n');
                }
                continue;
            }
            if raw {
                text.push('\\');
                text.push(escaped);
                continue;
            }
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '0' => text.push('\0'),
                '\\' => text.push('\\'),
                '\'' => text.push('\''),
                '"' => text.push('"'),
                'x' => text.push(self.hex_escape(2, start_line)?),
                'u' => text.push(self.hex_escape(4, start_line)?),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
        }

        if format {
            Ok(Tok::FStr(split_fstring(&text, start_line)?))
        } else {
            Ok(Tok::Str(Rc::from(text)))
        }
    }

    fn hex_escape(&mut self, len: usize, line: usize) -> Result<char, SyntaxFault> {
        let mut digits = String::new();
        for _ in 0..len {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(SyntaxFault::syntax("truncated escape sequence", line)),
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxFault::syntax("invalid escape sequence", line))
    }

    fn operator(&mut self) -> Result<(), SyntaxFault> {
        let line = self.line;
        for op in OPERATORS {
            let matches = op
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if !matches {
                continue;
            }
            self.pos += op.chars().count();
            match *op {
                "(" | "[" | "{" => self.brackets += 1,
                ")" | "]" | "}" => {
                    if self.brackets == 0 {
                        return Err(SyntaxFault::syntax(format!("unmatched '{op}'"), line));
                    }
                    self.brackets -= 1;
                }
                _ => {}
            }
            self.push(Tok::Op(op), line);
            return Ok(());
        }
        let c = self.peek().unwrap_or(' ');
        Err(SyntaxFault::syntax(format!("invalid character '{c}'"), line))
    }
}

/// Split the body of an f-string into literal text and `{field}` sources.
fn split_fstring(text: &str, line: usize) -> Result<Vec<FPiece>, SyntaxFault> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '}' {
            if chars.get(i + 1) == Some(&'}') {
                literal.push('}');
                i += 2;
                continue;
            }
            return Err(SyntaxFault::syntax("f-string: single '}' is not allowed", line));
        }
        if c != '{' {
            literal.push(c);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'{') {
            literal.push('{');
            i += 2;
            continue;
        }

        if !literal.is_empty() {
            pieces.push(FPiece::Literal(std::mem::take(&mut literal)));
        }
        i += 1;
        let start = i;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        loop {
            let Some(&ch) = chars.get(i) else {
                return Err(SyntaxFault::syntax("f-string: expecting '}'", line));
            };
            if let Some(q) = quote {
                if ch == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            match ch {
                '\'' | '"' => quote = Some(ch),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '}' if depth > 0 => depth -= 1,
                '}' => break,
                '!' if depth == 0 && chars.get(i + 1) != Some(&'=') => break,
                ':' if depth == 0 => break,
                _ => {}
            }
            i += 1;
        }

        let source: String = chars[start..i].iter().collect();
        if source.trim().is_empty() {
            return Err(SyntaxFault::syntax(
                "f-string: empty expression not allowed",
                line,
            ));
        }

        let mut repr = false;
        if chars.get(i) == Some(&'!') {
            match chars.get(i + 1) {
                Some('r') => repr = true,
                Some('s') => repr = false,
                _ => {
                    return Err(SyntaxFault::syntax(
                        "f-string: invalid conversion character",
                        line,
                    ))
                }
            }
            i += 2;
        }

        let mut spec = None;
        if chars.get(i) == Some(&':') {
            i += 1;
            let spec_start = i;
            while i < chars.len() && chars[i] != '}' {
                i += 1;
            }
            spec = Some(chars[spec_start..i].iter().collect());
        }

        if chars.get(i) != Some(&'}') {
            return Err(SyntaxFault::syntax("f-string: expecting '}'", line));
        }
        i += 1;
        pieces.push(FPiece::Field { source, repr, spec });
    }

    if !literal.is_empty() {
        pieces.push(FPiece::Literal(literal));
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    fn name(s: &str) -> Tok {
        Tok::Name(Rc::from(s))
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            kinds("x = 1\n"),
            vec![name("x"), Tok::Op("="), Tok::Int(1), Tok::Newline, Tok::Eof]
        );
    }

    #[test]
    fn test_missing_trailing_newline_is_added() {
        assert_eq!(kinds("x"), vec![name("x"), Tok::Newline, Tok::Eof]);
    }

    #[test]
    fn test_indent_and_dedent() {
        let toks = kinds("if x:\n    y\nz\n");
        assert!(toks.contains(&Tok::Indent));
        assert!(toks.contains(&Tok::Dedent));
        let indent = toks.iter().position(|t| *t == Tok::Indent).unwrap();
        let dedent = toks.iter().position(|t| *t == Tok::Dedent).unwrap();
        assert!(indent < dedent);
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        let tokens = tokenize("x = 1\n\n   # note\ny = 2\n").unwrap();
        let y = tokens.iter().find(|t| t.tok == name("y")).unwrap();
        assert_eq!(y.line, 4);
        assert!(!tokens.iter().any(|t| t.tok == Tok::Indent));
    }

    #[test]
    fn test_bad_dedent_is_indentation_error() {
        let err = tokenize("if x:\n    y\n  z\n").unwrap_err();
        assert_eq!(err.kind, "IndentationError");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_brackets_join_lines() {
        let toks = kinds("x = [1,\n  2]\n");
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1_000")[0], Tok::Int(1000));
        assert_eq!(kinds("2.5")[0], Tok::Float(2.5));
        assert_eq!(kinds("1e3")[0], Tok::Float(1000.0));
        assert_eq!(kinds("0xff")[0], Tok::Int(255));
        assert_eq!(kinds(".5")[0], Tok::Float(0.5));
    }

    #[test]
    fn test_integer_literal_too_large() {
        let err = tokenize("99999999999999999999").unwrap_err();
        assert_eq!(err.kind, "SyntaxError");
    }

    #[test]
    fn test_string_escapes_and_raw() {
        assert_eq!(kinds(r#""a\nb""#)[0], Tok::Str(Rc::from("a\nb")));
        assert_eq!(kinds(r#"r"a\nb""#)[0], Tok::Str(Rc::from("a\\nb")));
        assert_eq!(kinds("'it\\'s'")[0], Tok::Str(Rc::from("it's")));
    }

    #[test]
    fn test_triple_quoted_string_counts_lines() {
        let tokens = tokenize("s = \"\"\"a\nb\"\"\"\nt = 1\n").unwrap();
        let t = tokens.iter().find(|t| t.tok == name("t")).unwrap();
        assert_eq!(t.line, 3);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'abc\n").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_fstring_pieces() {
        let toks = kinds("f'x={x!r} y={y:.2f} {{lit}}'");
        match &toks[0] {
            Tok::FStr(pieces) => {
                assert_eq!(pieces.len(), 5);
                assert_eq!(pieces[0], FPiece::Literal("x=".into()));
                assert_eq!(
                    pieces[1],
                    FPiece::Field {
                        source: "x".into(),
                        repr: true,
                        spec: None
                    }
                );
                assert_eq!(
                    pieces[3],
                    FPiece::Field {
                        source: "y".into(),
                        repr: false,
                        spec: Some(".2f".into())
                    }
                );
                assert_eq!(pieces[4], FPiece::Literal(" {lit}".into()));
            }
            other => panic!("expected f-string, got {other:?}"),
        }
    }

    #[test]
    fn test_fstring_not_equal_inside_field() {
        match &kinds("f'{a != b}'")[0] {
            Tok::FStr(pieces) => assert_eq!(
                pieces[0],
                FPiece::Field {
                    source: "a != b".into(),
                    repr: false,
                    spec: None
                }
            ),
            other => panic!("expected f-string, got {other:?}"),
        }
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            kinds("a **= 2")[..3],
            [name("a"), Tok::Op("**="), Tok::Int(2)]
        );
        assert_eq!(kinds("a // b")[1], Tok::Op("//"));
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("x = $").unwrap_err();
        assert!(err.message.contains("invalid character"));
    }

    #[test]
    fn test_syntax_fault_into_fault() {
        let fault: Fault = SyntaxFault::syntax("invalid syntax", 3).into();
        assert_eq!(fault.to_string(), "SyntaxError: invalid syntax (line 3)");
    }
}
