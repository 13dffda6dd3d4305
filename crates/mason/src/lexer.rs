use std::path::Path;

use crate::diagnostics::{BuildError, Location, ResultExt};

/// The closed set of lexeme kinds a Buildfile can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    Identifier,
    /// A `<Name>` qualifier preceding a dictionary binding.
    DictQualifier,
    Add,
    Equals,
    BlockStart,
    BlockEnd,
    ListStart,
    ListEnd,
    FnStart,
    FnEnd,
    String,
    Delimiter,
    ScopeResolver,
    Newline,
    EndOfFile,
}

/// A single lexeme: its kind, literal payload (possibly empty), and the
/// location of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub value: String,
    pub loc: Location,
}

impl Lexeme {
    pub fn new(kind: LexemeKind, value: impl Into<String>, loc: Location) -> Self {
        Self {
            kind,
            value: value.into(),
            loc,
        }
    }
}

const STRING_QUOTE: u8 = b'"';
const QUALIFIER_START: u8 = b'<';
const QUALIFIER_END: u8 = b'>';
const SCOPE_RESOLVER: u8 = b':';
const COMMENT: u8 = b'#';
const NEWLINE: u8 = b'\n';

// Rule names double as file names, so '.' is part of the identifier
// alphabet alongside the usual alphanumerics.
fn is_identifier_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

/// Single-character lexemes that map directly from one byte.
fn direct_mapping(c: u8) -> Option<LexemeKind> {
    match c {
        b'{' => Some(LexemeKind::BlockStart),
        b'}' => Some(LexemeKind::BlockEnd),
        b'[' => Some(LexemeKind::ListStart),
        b']' => Some(LexemeKind::ListEnd),
        b'(' => Some(LexemeKind::FnStart),
        b')' => Some(LexemeKind::FnEnd),
        b',' => Some(LexemeKind::Delimiter),
        b'=' => Some(LexemeKind::Equals),
        b'+' => Some(LexemeKind::Add),
        _ => None,
    }
}

/// Converts Buildfile source into a stream of [`Lexeme`]s terminated by
/// [`LexemeKind::EndOfFile`].
#[derive(Debug)]
pub struct Lexer {
    src: Vec<u8>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            src: source.into().into_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Slurp `path` and construct a lexer over its contents. The file handle
    /// is closed before lexing starts.
    pub fn from_path(path: &Path) -> Result<Self, BuildError> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| BuildError::io(format!("Failed to read '{}': {err}", path.display())))?;
        Ok(Self::new(source))
    }

    pub fn lex(&mut self) -> Result<Vec<Lexeme>, BuildError> {
        let result = self.lex_all();
        let loc = self.location();
        result.during("Lexing").at(loc)
    }

    fn lex_all(&mut self) -> Result<Vec<Lexeme>, BuildError> {
        let mut lexemes = Vec::new();

        while !self.at_end() {
            let start = self.location();
            let c = self.peek();

            if let Some(kind) = direct_mapping(c) {
                self.consume();
                lexemes.push(Lexeme::new(kind, (c as char).to_string(), start));
                continue;
            }

            match c {
                NEWLINE => {
                    self.consume();
                    lexemes.push(Lexeme::new(LexemeKind::Newline, "", start));
                }
                c if c.is_ascii_whitespace() => {
                    self.consume();
                }
                COMMENT => self.consume_line(),
                SCOPE_RESOLVER => {
                    self.consume();
                    if self.at_end() || self.peek() != SCOPE_RESOLVER {
                        return Err(BuildError::syntax("Expected '::' scope resolver").at(start));
                    }
                    self.consume();
                    lexemes.push(Lexeme::new(LexemeKind::ScopeResolver, "::", start));
                }
                STRING_QUOTE => lexemes.push(self.lex_string(start)?),
                QUALIFIER_START => lexemes.push(self.lex_qualifier(start)?),
                c if is_identifier_char(c) => lexemes.push(self.lex_identifier(start)),
                other => {
                    return Err(BuildError::syntax(format!(
                        "Unexpected char '{}'",
                        other as char
                    ))
                    .at(start))
                }
            }
        }

        lexemes.push(Lexeme::new(LexemeKind::EndOfFile, "", self.location()));

        Ok(lexemes)
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.col, self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> u8 {
        self.src[self.pos]
    }

    fn consume(&mut self) -> u8 {
        let c = self.src[self.pos];
        self.pos += 1;
        if c == NEWLINE {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    /// Advance up to, but not including, the next newline.
    fn consume_line(&mut self) {
        while !self.at_end() && self.peek() != NEWLINE {
            self.consume();
        }
    }

    fn lex_string(&mut self, start: Location) -> Result<Lexeme, BuildError> {
        self.consume();
        let mut value = Vec::new();
        while !self.at_end() && self.peek() != STRING_QUOTE {
            value.push(self.consume());
        }
        if self.at_end() {
            return Err(BuildError::syntax("Unterminated string")
                .at(start)
                .during("Lexing string"));
        }
        self.consume();
        Ok(Lexeme::new(
            LexemeKind::String,
            String::from_utf8_lossy(&value).into_owned(),
            start,
        ))
    }

    fn lex_qualifier(&mut self, start: Location) -> Result<Lexeme, BuildError> {
        self.consume();
        let mut value = Vec::new();
        while !self.at_end() && self.peek() != QUALIFIER_END {
            let loc = self.location();
            let c = self.consume();
            if !is_identifier_char(c) {
                return Err(BuildError::syntax(format!(
                    "Unexpected character '{}' in rule qualifier",
                    c as char
                ))
                .at(loc)
                .during("Lexing rule qualifier"));
            }
            value.push(c);
        }
        if self.at_end() {
            return Err(BuildError::syntax("Unclosed rule qualifier")
                .at(start)
                .during("Lexing rule qualifier"));
        }
        self.consume();
        Ok(Lexeme::new(
            LexemeKind::DictQualifier,
            String::from_utf8_lossy(&value).into_owned(),
            start,
        ))
    }

    fn lex_identifier(&mut self, start: Location) -> Lexeme {
        let mut value = Vec::new();
        while !self.at_end() && is_identifier_char(self.peek()) {
            value.push(self.consume());
        }
        Lexeme::new(
            LexemeKind::Identifier,
            String::from_utf8_lossy(&value).into_owned(),
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::diagnostics::ErrorKind;

    fn lex(source: &str) -> Vec<Lexeme> {
        Lexer::new(source).lex().unwrap()
    }

    fn kinds(source: &str) -> Vec<LexemeKind> {
        lex(source).into_iter().map(|l| l.kind).collect()
    }

    #[test]
    fn empty_source() {
        let lexemes = lex("");
        assert_eq!(lexemes.len(), 1);
        assert_eq!(lexemes[0].kind, LexemeKind::EndOfFile);
    }

    #[test]
    fn comments_and_whitespace_only() {
        assert_eq!(
            kinds("# a comment with = and \" inside"),
            [LexemeKind::EndOfFile]
        );
        assert_eq!(kinds("   \t  "), [LexemeKind::EndOfFile]);
    }

    #[test]
    fn comment_does_not_eat_newline() {
        assert_eq!(
            kinds("# note\n"),
            [LexemeKind::Newline, LexemeKind::EndOfFile]
        );
    }

    #[test]
    fn simple_binding() {
        use LexemeKind::*;
        let lexemes = lex("flags = [\"-O2\", \"-Wall\"]\n");
        let expected = [
            Identifier, Equals, ListStart, String, Delimiter, String, ListEnd, Newline, EndOfFile,
        ];
        assert_eq!(
            lexemes.iter().map(|l| l.kind).collect::<Vec<_>>(),
            expected
        );
        assert_eq!(lexemes[0].value, "flags");
        assert_eq!(lexemes[3].value, "-O2");
        assert_eq!(lexemes[5].value, "-Wall");
    }

    #[test]
    fn qualified_dictionary() {
        use LexemeKind::*;
        let lexemes = lex("<Rule> app {\n}\n");
        assert_eq!(
            lexemes.iter().map(|l| l.kind).collect::<Vec<_>>(),
            [
                DictQualifier,
                Identifier,
                BlockStart,
                Newline,
                BlockEnd,
                Newline,
                EndOfFile
            ]
        );
        assert_eq!(lexemes[0].value, "Rule");
        assert_eq!(lexemes[1].value, "app");
    }

    #[test]
    fn scoped_enum() {
        use LexemeKind::*;
        let lexemes = lex("step = Step::LINK");
        assert_eq!(
            lexemes.iter().map(|l| l.kind).collect::<Vec<_>>(),
            [
                Identifier,
                Equals,
                Identifier,
                ScopeResolver,
                Identifier,
                EndOfFile
            ]
        );
        assert_eq!(lexemes[4].value, "LINK");
    }

    #[test]
    fn locations_are_one_based_and_monotonic() {
        let lexemes = lex("a = \"x\"\nbb = cc\n");
        assert!(lexemes.iter().all(|l| l.loc.line >= 1 && l.loc.col >= 1));
        let offsets: Vec<_> = lexemes.iter().map(|l| l.loc.offset).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));

        // `bb` starts line 2, column 1, offset 8.
        assert_eq!(lexemes[4].value, "bb");
        assert_eq!(lexemes[4].loc, Location::new(2, 1, 8));
        // `cc` sits at column 6 of line 2.
        assert_eq!(lexemes[6].loc, Location::new(2, 6, 13));
    }

    #[test]
    fn string_location_points_at_opening_quote() {
        let lexemes = lex("x = \"hello\"");
        assert_eq!(lexemes[2].kind, LexemeKind::String);
        assert_eq!(lexemes[2].loc, Location::new(1, 5, 4));
    }

    #[test]
    fn unterminated_string() {
        let err = Lexer::new("x = \"abc").lex().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.location(), Some(Location::new(1, 5, 4)));
        assert!(err.context_frames().contains(&"Lexing string".to_string()));
        assert!(err.context_frames().contains(&"Lexing".to_string()));
    }

    #[test]
    fn bad_qualifier_char() {
        let err = Lexer::new("<Ru le> x {}").lex().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.message().contains("' '"));
    }

    #[test]
    fn lone_colon() {
        let err = Lexer::new("x = Step:LINK").lex().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test_case("$", '$'; "dollar")]
    #[test_case("x = a & b", '&'; "ampersand")]
    fn unexpected_char(source: &str, bad: char) {
        let err = Lexer::new(source).lex().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.message().contains(bad));
    }

    #[test]
    fn brackets_are_not_balanced_by_the_lexer() {
        // Balance is the parser's concern; the lexer reports what it sees.
        use LexemeKind::*;
        assert_eq!(
            kinds("[[{"),
            [ListStart, ListStart, BlockStart, EndOfFile]
        );
    }

    #[test]
    fn relexing_reconstructed_source_preserves_kinds() {
        // Whitespace is not preserved, but a space-joined rendering of the
        // lexeme payloads lexes back to the same kind sequence.
        let source = "<Config> cfg {\n  compiler = \"g++\"\n  flags = [\"-O2\", \"-Wall\"]\n}\n\
                      names = file_names([\"a.cpp\"]) + extra\n\
                      step = Step::LINK\n";
        let original = lex(source);

        let reconstructed: String = original
            .iter()
            .map(|lexeme| match lexeme.kind {
                LexemeKind::String => format!("\"{}\" ", lexeme.value),
                LexemeKind::DictQualifier => format!("<{}> ", lexeme.value),
                LexemeKind::Newline => "\n".to_string(),
                LexemeKind::EndOfFile => String::new(),
                _ => format!("{} ", lexeme.value),
            })
            .collect();

        let relexed = lex(&reconstructed);
        assert_eq!(
            original.iter().map(|l| l.kind).collect::<Vec<_>>(),
            relexed.iter().map(|l| l.kind).collect::<Vec<_>>()
        );
        assert_eq!(
            original.iter().map(|l| &l.value).collect::<Vec<_>>(),
            relexed.iter().map(|l| &l.value).collect::<Vec<_>>()
        );
    }

    #[test]
    fn identifiers_may_contain_dots() {
        let lexemes = lex("main.o = \"x\"");
        assert_eq!(lexemes[0].kind, LexemeKind::Identifier);
        assert_eq!(lexemes[0].value, "main.o");
    }

    #[test]
    fn missing_file() {
        let err = Lexer::from_path(Path::new("no/such/Buildfile")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
