//! Parser for directive text.
//!
//! Grammar:
//!
//! ```text
//! directive := keyword clause*
//! clause    := name | name "(" args ")"
//! args      := range | mapping | name_list | expression
//! range     := name "=" expr ":" expr [":" expr]
//! mapping   := var_list ":" var_list
//! var_list  := name ("/" name)? ("," name ("/" name)?)*
//! ```
//!
//! Clause order is irrelevant; the clause inventory depends on the
//! directive kind.

use crate::directive::ast::{
    Directive, DirectiveKind, MappingClause, MappingVar, RangeClause,
};
use crate::directive::lexer::Lexer;
use crate::directive::token::{Token, TokenKind};
use crate::utils::errors::{DirectiveError, DirectiveErrorKind};
use std::collections::HashSet;

/// Parse one directive's text (pragma prefix already stripped).
pub fn parse(text: &str, line: u32) -> Result<Directive, DirectiveError> {
    let tokens = Lexer::new(text)
        .tokenize()
        .map_err(|e| e.with_line(line))?;
    Parser::new(tokens, line).parse_directive()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    line: u32,
}

impl Parser {
    fn new(tokens: Vec<Token>, line: u32) -> Self {
        Self {
            tokens,
            pos: 0,
            line,
        }
    }

    fn current(&self) -> &Token {
        // The token stream always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, context: &str) -> Result<Token, DirectiveError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(
                DirectiveErrorKind::UnexpectedToken,
                format!(
                    "expected {} {}, found {}",
                    kind,
                    context,
                    self.current().kind
                ),
            ))
        }
    }

    fn error(&self, kind: DirectiveErrorKind, message: impl Into<String>) -> DirectiveError {
        DirectiveError::new(kind, message, self.line)
    }

    fn parse_directive(&mut self) -> Result<Directive, DirectiveError> {
        let keyword = self.consume(TokenKind::Name, "as directive keyword")?;
        let kind = DirectiveKind::from_keyword(&keyword.lexeme).ok_or_else(|| {
            self.error(
                DirectiveErrorKind::UnknownDirective,
                format!("unknown directive '{}'", keyword.lexeme),
            )
        })?;
        let mut directive = Directive::new(kind, self.line);

        if kind == DirectiveKind::End {
            let target = self.consume(TokenKind::Name, "after 'end'")?;
            directive.end_target =
                Some(DirectiveKind::from_keyword(&target.lexeme).ok_or_else(|| {
                    self.error(
                        DirectiveErrorKind::UnknownDirective,
                        format!("unknown directive '{}' after 'end'", target.lexeme),
                    )
                })?);
            self.expect_eof()?;
            return Ok(directive);
        }

        // Interchange takes a bare parenthesized induction list.
        if kind == DirectiveKind::LoopInterchange && self.check(TokenKind::LeftParen) {
            self.advance();
            directive.names = self.parse_name_list()?;
            self.consume(TokenKind::RightParen, "after induction list")?;
        }

        while !self.current().is_eof() {
            let clause = self.consume(TokenKind::Name, "as clause name")?;
            self.parse_clause(&mut directive, kind, &clause.lexeme)?;
        }

        self.validate(&directive)?;
        Ok(directive)
    }

    fn parse_clause(
        &mut self,
        directive: &mut Directive,
        kind: DirectiveKind,
        clause: &str,
    ) -> Result<(), DirectiveError> {
        match (kind, clause) {
            (DirectiveKind::LoopExtract, "range") => {
                if directive.range.is_some() {
                    return Err(self.duplicate_clause(clause));
                }
                directive.range = Some(self.parse_range()?);
            }
            (DirectiveKind::LoopExtract, "map") => {
                let mapping = self.parse_mapping()?;
                directive.mappings.push(mapping);
            }
            (DirectiveKind::LoopExtract, "fusion") => {
                directive.fusion = true;
            }
            (DirectiveKind::LoopExtract | DirectiveKind::LoopFusion, "group") => {
                if directive.group.is_some() {
                    return Err(self.duplicate_clause(clause));
                }
                self.consume(TokenKind::LeftParen, "after 'group'")?;
                let label = self.consume(TokenKind::Name, "as group label")?;
                self.consume(TokenKind::RightParen, "after group label")?;
                directive.group = Some(label.lexeme);
            }
            (DirectiveKind::LoopExtract, "parallel") => {
                directive.parallel = true;
            }
            (DirectiveKind::LoopExtract | DirectiveKind::Parallelize, "acc") => {
                if directive.acc.is_some() {
                    return Err(self.duplicate_clause(clause));
                }
                directive.acc = Some(self.parse_acc_option()?);
            }
            _ => {
                return Err(self.error(
                    DirectiveErrorKind::UnknownClause,
                    format!("unknown clause '{}' for directive '{}'", clause, kind),
                ));
            }
        }
        Ok(())
    }

    /// `range(i=lower:upper[:step])`
    fn parse_range(&mut self) -> Result<RangeClause, DirectiveError> {
        self.consume(TokenKind::LeftParen, "after 'range'")?;
        let induction = self.consume(TokenKind::Name, "as induction variable")?;
        self.consume(TokenKind::Equal, "after induction variable")?;
        let lower = self.expression_text(&[TokenKind::Colon])?;
        self.consume(TokenKind::Colon, "after lower bound")?;
        let upper = self.expression_text(&[TokenKind::Colon, TokenKind::RightParen])?;
        let step = if self.match_token(TokenKind::Colon) {
            self.expression_text(&[TokenKind::RightParen])?
        } else {
            "1".to_string()
        };
        self.consume(TokenKind::RightParen, "after range")?;
        Ok(RangeClause {
            induction: induction.lexeme,
            lower,
            upper,
            step,
        })
    }

    /// `map(a,b/p:i,j)`
    fn parse_mapping(&mut self) -> Result<MappingClause, DirectiveError> {
        self.consume(TokenKind::LeftParen, "after 'map'")?;
        let mapped = self.parse_var_list()?;
        self.consume(TokenKind::Colon, "between mapped and mapping variables")?;
        let mapping = self.parse_var_list()?;
        self.consume(TokenKind::RightParen, "after mapping")?;
        Ok(MappingClause { mapped, mapping })
    }

    fn parse_var_list(&mut self) -> Result<Vec<MappingVar>, DirectiveError> {
        let mut vars = Vec::new();
        loop {
            let arg = self.consume(TokenKind::Name, "in variable list")?;
            let var = if self.match_token(TokenKind::Slash) {
                let fct = self.consume(TokenKind::Name, "after '/'")?;
                MappingVar::pair(arg.lexeme, fct.lexeme)
            } else {
                MappingVar::same(arg.lexeme)
            };
            vars.push(var);
            if !self.match_token(TokenKind::Comma) {
                return Ok(vars);
            }
        }
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>, DirectiveError> {
        let mut names = Vec::new();
        loop {
            let name = self.consume(TokenKind::Name, "in name list")?;
            names.push(name.lexeme);
            if !self.match_token(TokenKind::Comma) {
                return Ok(names);
            }
        }
    }

    /// `acc(<option text>)` — either a string literal or raw tokens.
    ///
    /// Adjacent words keep a separating space so the option can be emitted
    /// verbatim into an accelerator pragma.
    fn parse_acc_option(&mut self) -> Result<String, DirectiveError> {
        self.consume(TokenKind::LeftParen, "after 'acc'")?;
        if self.check(TokenKind::String) {
            let text = self.advance().lexeme;
            self.consume(TokenKind::RightParen, "after accelerator option")?;
            return Ok(text);
        }
        let mut text = String::new();
        let mut prev_word = false;
        let mut depth = 0usize;
        loop {
            let current = self.current().kind;
            if current == TokenKind::Eof {
                return Err(self.error(
                    DirectiveErrorKind::UnexpectedEnd,
                    "directive ended inside an accelerator option",
                ));
            }
            if depth == 0 && current == TokenKind::RightParen {
                if text.is_empty() {
                    return Err(self.error(
                        DirectiveErrorKind::MalformedClause,
                        "empty accelerator option",
                    ));
                }
                self.advance();
                return Ok(text);
            }
            match current {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => depth -= 1,
                _ => {}
            }
            let word = matches!(current, TokenKind::Name | TokenKind::Integer);
            if word && prev_word {
                text.push(' ');
            }
            prev_word = word;
            text.push_str(&self.advance().lexeme);
        }
    }

    /// Concatenated lexemes up to one of the stop tokens at paren depth 0.
    fn expression_text(&mut self, stops: &[TokenKind]) -> Result<String, DirectiveError> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            let current = self.current().kind;
            if current == TokenKind::Eof {
                return Err(self.error(
                    DirectiveErrorKind::UnexpectedEnd,
                    "directive ended inside an expression",
                ));
            }
            if depth == 0 && stops.contains(&current) {
                if text.is_empty() {
                    return Err(self.error(
                        DirectiveErrorKind::MalformedClause,
                        "empty expression in clause",
                    ));
                }
                return Ok(text);
            }
            match current {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    if depth == 0 {
                        return Err(self.error(
                            DirectiveErrorKind::MalformedClause,
                            "unbalanced parentheses in expression",
                        ));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            text.push_str(&self.advance().lexeme);
        }
    }

    fn expect_eof(&mut self) -> Result<(), DirectiveError> {
        if self.current().is_eof() {
            Ok(())
        } else {
            Err(self.error(
                DirectiveErrorKind::UnexpectedToken,
                format!("unexpected '{}' after directive", self.current().lexeme),
            ))
        }
    }

    fn duplicate_clause(&self, clause: &str) -> DirectiveError {
        self.error(
            DirectiveErrorKind::MalformedClause,
            format!("clause '{}' given more than once", clause),
        )
    }

    fn validate(&self, directive: &Directive) -> Result<(), DirectiveError> {
        if directive.kind == Some(DirectiveKind::LoopExtract) && directive.range.is_none() {
            return Err(self.error(
                DirectiveErrorKind::MissingClause,
                "loop-extract requires a range clause",
            ));
        }

        // A mapped or mapping variable may appear only once across all
        // mapping clauses, on either side of the pairing.
        let mut arg_side = HashSet::new();
        let mut fct_side = HashSet::new();
        for clause in &directive.mappings {
            for var in &clause.mapped {
                if !arg_side.insert(var.arg.clone()) {
                    return Err(self.error(
                        DirectiveErrorKind::DuplicateMapping,
                        format!("{} appears more than once in the mapping", var),
                    ));
                }
                if !fct_side.insert(var.fct.clone()) {
                    return Err(self.error(
                        DirectiveErrorKind::DuplicateMapping,
                        format!("{} appears more than once in the mapping", var),
                    ));
                }
            }
        }
        Ok(())
    }
}
