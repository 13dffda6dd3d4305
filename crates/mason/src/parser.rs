use crate::diagnostics::{BuildError, Location, ResultExt};
use crate::expr::{BinaryOp, Expr};
use crate::lexer::{Lexeme, LexemeKind};

/// What a top-level binding declares, derived from its `<Qualifier>` (or the
/// lack of one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarCategory {
    Regular,
    SingleRule,
    MultiRule,
    Clean,
    Config,
}

/// A top-level binding with its expression still unevaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVariable {
    pub identifier: String,
    pub expr: Expr,
    pub category: VarCategory,
    pub loc: Location,
}

/// One segmented binding from the first pass: the lexemes of its body, ready
/// to be re-driven through the expression grammar.
struct VarLexemes {
    identifier: String,
    lexemes: Vec<Lexeme>,
    category: VarCategory,
    loc: Location,
}

const VARIABLE_STARTS: [LexemeKind; 5] = [
    LexemeKind::Identifier,
    LexemeKind::ListStart,
    LexemeKind::FnStart,
    LexemeKind::String,
    LexemeKind::BlockStart,
];

/// Recursive-descent parser over the lexeme stream. Parsing is two-pass:
/// the first pass segments top-level bindings, the second re-drives the
/// parser over each segment to build its expression tree. `parse` is single
/// use; the lexeme source is swapped out during the second pass.
pub struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
}

impl Parser {
    pub fn new(lexemes: Vec<Lexeme>) -> Self {
        Self { lexemes, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Vec<ParsedVariable>, BuildError> {
        let result = self.parse_all();
        let loc = self.current_location();
        result.during("Parsing").at(loc)
    }

    fn parse_all(&mut self) -> Result<Vec<ParsedVariable>, BuildError> {
        let mut segments = Vec::new();

        while !self.at_end() {
            match self.kind() {
                Some(LexemeKind::Identifier) => {
                    let id = self.consume_kind(LexemeKind::Identifier)?;
                    self.consume_kind(LexemeKind::Equals)?;
                    segments.push(VarLexemes {
                        identifier: id.value,
                        lexemes: self.consume_var_lexemes()?,
                        category: VarCategory::Regular,
                        loc: id.loc,
                    });
                }
                Some(LexemeKind::DictQualifier) => {
                    let qualifier = self.consume_kind(LexemeKind::DictQualifier)?;
                    let category = categorise(&qualifier)?;
                    let id = self.consume_kind(LexemeKind::Identifier)?;
                    segments.push(VarLexemes {
                        identifier: id.value,
                        lexemes: self.consume_dict_lexemes()?,
                        category,
                        loc: id.loc,
                    });
                }
                _ => {
                    self.advance();
                }
            }
        }

        let mut variables = Vec::with_capacity(segments.len());
        for segment in segments {
            self.change_source(segment.lexemes);
            variables.push(ParsedVariable {
                identifier: segment.identifier,
                expr: self.parse_expr()?,
                category: segment.category,
                loc: segment.loc,
            });
        }

        Ok(variables)
    }

    /// Swap the lexeme source and rewind; used to re-drive the parser over a
    /// segmented binding body.
    fn change_source(&mut self, lexemes: Vec<Lexeme>) {
        self.lexemes = lexemes;
        self.pos = 0;
    }

    /// The terminating `EndOfFile` lexeme counts as the end of input.
    fn at_end(&self) -> bool {
        self.lexemes
            .get(self.pos)
            .map_or(true, |lexeme| lexeme.kind == LexemeKind::EndOfFile)
    }

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn kind(&self) -> Option<LexemeKind> {
        self.peek().map(|lexeme| lexeme.kind)
    }

    fn matches(&self, kind: LexemeKind) -> bool {
        self.kind() == Some(kind)
    }

    fn current_location(&self) -> Location {
        self.peek().map_or(Location::EOF, |lexeme| lexeme.loc)
    }

    fn advance(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn consume_kind(&mut self, kind: LexemeKind) -> Result<Lexeme, BuildError> {
        match self.peek() {
            Some(lexeme) if lexeme.kind == kind => Ok(self.advance().unwrap()),
            Some(lexeme) if lexeme.kind != LexemeKind::EndOfFile => Err(BuildError::syntax(
                format!("Unexpected token '{}'", lexeme.value),
            )
            .at(lexeme.loc)),
            _ => Err(BuildError::syntax("Unexpected end of input").at(self.current_location())),
        }
    }

    /// Slurp the body of a regular `identifier = …` binding: either a whole
    /// dictionary block or everything up to the next newline.
    fn consume_var_lexemes(&mut self) -> Result<Vec<Lexeme>, BuildError> {
        self.consume_var_lexemes_inner()
            .during("Consuming variable lexemes")
    }

    fn consume_var_lexemes_inner(&mut self) -> Result<Vec<Lexeme>, BuildError> {
        match self.peek() {
            Some(lexeme) if VARIABLE_STARTS.contains(&lexeme.kind) => {}
            Some(lexeme) => {
                return Err(BuildError::syntax(format!(
                    "Unexpected token '{}'",
                    lexeme.value
                ))
                .at(lexeme.loc))
            }
            None => return Err(BuildError::syntax("Unexpected end of input").at(Location::EOF)),
        }

        if self.matches(LexemeKind::BlockStart) {
            return self.consume_dict_lexemes();
        }

        let mut body = Vec::new();
        while !self.at_end() && !self.matches(LexemeKind::Newline) {
            body.push(self.advance().unwrap());
        }
        Ok(body)
    }

    /// Slurp a `{ … }` block, tracking nesting so inner dictionaries stay in
    /// the segment.
    fn consume_dict_lexemes(&mut self) -> Result<Vec<Lexeme>, BuildError> {
        self.consume_dict_lexemes_inner()
            .during("Consuming dictionary lexemes")
    }

    fn consume_dict_lexemes_inner(&mut self) -> Result<Vec<Lexeme>, BuildError> {
        let open = self.consume_kind(LexemeKind::BlockStart)?;
        let mut open_locs = vec![open.loc];
        let mut body = vec![open];

        while !open_locs.is_empty() && !self.at_end() {
            match self.kind() {
                Some(LexemeKind::BlockStart) => open_locs.push(self.current_location()),
                Some(LexemeKind::BlockEnd) => {
                    open_locs.pop();
                }
                _ => {}
            }
            body.push(self.advance().unwrap());
        }

        if let Some(earliest) = open_locs.first() {
            return Err(BuildError::syntax("Unclosed dictionary block").at(*earliest));
        }

        Ok(body)
    }

    fn parse_expr(&mut self) -> Result<Expr, BuildError> {
        let left = self.parse_term().during("Parsing expression")?;
        if self.matches(LexemeKind::Add) {
            self.advance();
            let right = self.parse_expr()?;
            return Ok(Expr::BinaryOp {
                op: BinaryOp::Add,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, BuildError> {
        match self.kind() {
            Some(LexemeKind::String) => {
                let lexeme = self.advance().unwrap();
                Ok(Expr::StringLit(lexeme.value))
            }
            Some(LexemeKind::BlockStart) => self.parse_dictionary().during("Parsing dictionary"),
            Some(LexemeKind::ListStart) => self.parse_list().during("Parsing list"),
            Some(LexemeKind::Identifier) => {
                let identifier = self.advance().unwrap();
                match self.kind() {
                    Some(LexemeKind::FnStart) => self
                        .parse_fn(identifier.value)
                        .during("Parsing function"),
                    Some(LexemeKind::ScopeResolver) => {
                        self.advance();
                        let name = self.consume_kind(LexemeKind::Identifier)?;
                        Ok(Expr::EnumLit {
                            scope: identifier.value,
                            name: name.value,
                        })
                    }
                    _ => Ok(Expr::VarRef(identifier.value)),
                }
            }
            Some(_) => {
                let lexeme = self.peek().unwrap();
                Err(BuildError::syntax(format!(
                    "Unexpected token '{}'",
                    lexeme.value
                ))
                .at(lexeme.loc)
                .during("Parsing term"))
            }
            None => Err(BuildError::syntax("Unexpected end of input")
                .at(Location::EOF)
                .during("Parsing term")),
        }
    }

    fn parse_fn(&mut self, name: String) -> Result<Expr, BuildError> {
        let open = self.consume_kind(LexemeKind::FnStart)?;
        let mut args = Vec::new();

        if !self.at_end() && !self.matches(LexemeKind::FnEnd) {
            args.push(self.parse_expr()?);
            while self.matches(LexemeKind::Delimiter) {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }

        if self.at_end() {
            return Err(
                BuildError::syntax(format!("Unclosed bracket for function '{name}'")).at(open.loc),
            );
        }
        self.consume_kind(LexemeKind::FnEnd)?;

        Ok(Expr::FnCall { name, args })
    }

    fn parse_list(&mut self) -> Result<Expr, BuildError> {
        let open = self.consume_kind(LexemeKind::ListStart)?;
        let mut elements = Vec::new();

        loop {
            if self.at_end() {
                return Err(BuildError::syntax("Unterminated list").at(open.loc));
            }
            if self.matches(LexemeKind::ListEnd) {
                self.advance();
                break;
            }

            elements.push(self.parse_expr()?);

            if self.matches(LexemeKind::Delimiter) {
                self.advance();
                continue;
            }
            if self.matches(LexemeKind::ListEnd) {
                self.advance();
                break;
            }
            if self.at_end() {
                return Err(BuildError::syntax("Unterminated list").at(open.loc));
            }
            let lexeme = self.peek().unwrap();
            return Err(BuildError::syntax(format!(
                "Unexpected token '{}'",
                lexeme.value
            ))
            .at(lexeme.loc));
        }

        Ok(Expr::ListLit(elements))
    }

    /// Entries are `identifier = expr`, separated by newlines, commas, or any
    /// run of the two; the closing brace may follow the last entry directly.
    fn parse_dictionary(&mut self) -> Result<Expr, BuildError> {
        let open = self.consume_kind(LexemeKind::BlockStart)?;
        let mut fields = Vec::new();

        self.skip_separators();
        loop {
            if self.at_end() {
                return Err(BuildError::syntax("Unterminated dictionary").at(open.loc));
            }
            if self.matches(LexemeKind::BlockEnd) {
                self.advance();
                break;
            }

            let key = self.consume_kind(LexemeKind::Identifier)?;
            self.consume_kind(LexemeKind::Equals)?;
            fields.push((key.value, self.parse_expr()?));

            if self.matches(LexemeKind::Newline) || self.matches(LexemeKind::Delimiter) {
                self.skip_separators();
            } else if !self.matches(LexemeKind::BlockEnd) && !self.at_end() {
                let lexeme = self.peek().unwrap();
                return Err(BuildError::syntax(format!(
                    "Unexpected token '{}'",
                    lexeme.value
                ))
                .at(lexeme.loc));
            }
        }

        Ok(Expr::DictLit(fields))
    }

    fn skip_separators(&mut self) {
        while self.matches(LexemeKind::Newline) || self.matches(LexemeKind::Delimiter) {
            self.advance();
        }
    }
}

fn categorise(qualifier: &Lexeme) -> Result<VarCategory, BuildError> {
    match qualifier.value.as_str() {
        "Rule" => Ok(VarCategory::SingleRule),
        "MultiRule" => Ok(VarCategory::MultiRule),
        "Clean" => Ok(VarCategory::Clean),
        "Config" => Ok(VarCategory::Config),
        other => Err(BuildError::syntax(format!(
            "Unknown dictionary qualifier '{other}'"
        ))
        .at(qualifier.loc)),
    }
}
