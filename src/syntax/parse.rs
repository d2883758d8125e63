use crate::{
    config::Limits,
    syntax::ast::{
        BinaryOperator, BooleanOperator, ComparisonOperator, Syntax,
        UnaryOperator,
    },
};
use smol_str::SmolStr;
use std::{iter::Peekable, ops::Range};

/// Parse some text into its generic [`Syntax`] tree.
pub fn parse(s: &str) -> Result<Syntax, ParseError> { Parser::new(s).parse() }

/// A simple recursive descent parser (`LL(1)`) for converting a string into a
/// [`Syntax`] tree.
///
/// The grammar:
///
/// ```text
/// statements     := statement (";" statement)* ";"?
///
/// statement      := IDENTIFIER "=" expression
///                 | expression
///
/// expression     := conjunction ("or" conjunction)*
///
/// conjunction    := inversion ("and" inversion)*
///
/// inversion      := "not" inversion
///                 | comparison
///
/// comparison     := sum (COMPARISON sum)*
///
/// sum            := term (("+" | "-") term)*
///
/// term           := factor (("*" | "/" | "//" | "%") factor)*
///
/// factor         := ("+" | "-") factor
///                 | power
///
/// power          := atom ("**" factor)?
///
/// atom           := variable_or_function_call
///                 | "(" expression ")"
///                 | NUMBER
///
/// variable_or_function_call = IDENTIFIER "(" arguments? ")"
///                           | IDENTIFIER
///
/// arguments      := expression ("," expression)*
/// ```
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    tokens: Peekable<Tokens<'a>>,
    limits: Limits,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Parser {
            tokens: Tokens::new(src).peekable(),
            limits: Limits::default(),
            depth: 0,
        }
    }

    pub fn with_limits(self, limits: Limits) -> Self {
        Parser { limits, ..self }
    }

    pub fn parse(mut self) -> Result<Syntax, ParseError> {
        let syntax = self.statements()?;

        match self.tokens.next() {
            None => Ok(syntax),
            Some(Ok(token)) => Err(ParseError::UnconsumedInput {
                found: token.kind,
                span: token.span,
            }),
            Some(Err(e)) => Err(e),
        }
    }

    fn peek(&mut self) -> Option<TokenKind> {
        self.tokens
            .peek()
            .and_then(|result| result.as_ref().ok())
            .map(|tok| tok.kind)
    }

    fn peek_keyword(&mut self, keyword: &str) -> bool {
        match self.tokens.peek() {
            Some(Ok(token)) => {
                token.kind == TokenKind::Identifier && token.text == keyword
            },
            _ => false,
        }
    }

    fn advance(&mut self) -> Result<Token<'a>, ParseError> {
        match self.tokens.next() {
            Some(result) => result,
            None => Err(ParseError::UnexpectedEndOfInput),
        }
    }

    /// Run `parse` one level deeper, bailing out if we've gone past the
    /// nesting limit.
    fn nested<F>(&mut self, parse: F) -> Result<Syntax, ParseError>
    where
        F: FnOnce(&mut Parser<'a>) -> Result<Syntax, ParseError>,
    {
        if self.depth >= self.limits.max_nesting {
            return Err(ParseError::TooDeep {
                limit: self.limits.max_nesting,
            });
        }

        self.depth += 1;
        let got = parse(self);
        self.depth -= 1;

        got
    }

    /// Each fold in a chain like `a + b + c` makes the tree one level deeper,
    /// so a chain with `max_depth` folds can never become a valid tree.
    fn fold(&self, folds: &mut usize) -> Result<(), ParseError> {
        *folds += 1;

        if *folds >= self.limits.max_depth {
            Err(ParseError::TooDeep {
                limit: self.limits.max_depth,
            })
        } else {
            Ok(())
        }
    }

    fn statements(&mut self) -> Result<Syntax, ParseError> {
        let mut statements = vec![self.statement()?];

        while self.peek() == Some(TokenKind::Semicolon) {
            let _ = self.advance()?;

            if self.tokens.peek().is_none() {
                break;
            }
            statements.push(self.statement()?);
        }

        if statements.len() == 1 {
            Ok(statements.remove(0))
        } else {
            Ok(Syntax::Statements(statements))
        }
    }

    fn statement(&mut self) -> Result<Syntax, ParseError> {
        let expr = self.expression()?;

        if self.peek() != Some(TokenKind::Equals) {
            return Ok(expr);
        }

        let equals = self.advance()?;

        let target = match &expr {
            Syntax::Identifier(target) => target.clone(),
            _ => {
                return Err(ParseError::UnexpectedToken {
                    found: equals.kind,
                    span: equals.span,
                    expected: &[],
                })
            },
        };
        let value = self.expression()?;

        Ok(Syntax::Assign {
            target,
            value: Box::new(value),
        })
    }

    fn expression(&mut self) -> Result<Syntax, ParseError> {
        self.nested(|p| {
            let mut left = p.conjunction()?;
            let mut folds = 0;

            while p.peek_keyword("or") {
                p.fold(&mut folds)?;
                let _ = p.advance()?;
                let right = p.conjunction()?;
                left = Syntax::BoolOp {
                    op: BooleanOperator::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            }

            Ok(left)
        })
    }

    fn conjunction(&mut self) -> Result<Syntax, ParseError> {
        let mut left = self.inversion()?;
        let mut folds = 0;

        while self.peek_keyword("and") {
            self.fold(&mut folds)?;
            let _ = self.advance()?;
            let right = self.inversion()?;
            left = Syntax::BoolOp {
                op: BooleanOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn inversion(&mut self) -> Result<Syntax, ParseError> {
        if self.peek_keyword("not") {
            let _ = self.advance()?;
            let operand = self.nested(|p| p.inversion())?;
            return Ok(Syntax::unary(UnaryOperator::Not, operand));
        }

        self.comparison()
    }

    fn comparison(&mut self) -> Result<Syntax, ParseError> {
        let mut left = self.sum()?;
        let mut folds = 0;

        while let Some(op) = self.peek().and_then(TokenKind::as_comparison) {
            self.fold(&mut folds)?;
            let _ = self.advance()?;
            let right = self.sum()?;
            left = Syntax::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn sum(&mut self) -> Result<Syntax, ParseError> {
        let left = self.term()?;

        self.then_right_part_of_binary_ops(
            left,
            &[TokenKind::Plus, TokenKind::Minus],
            |p| p.term(),
        )
    }

    fn term(&mut self) -> Result<Syntax, ParseError> {
        let left = self.factor()?;

        self.then_right_part_of_binary_ops(
            left,
            &[
                TokenKind::Times,
                TokenKind::Divide,
                TokenKind::FloorDivide,
                TokenKind::Percent,
            ],
            |p| p.factor(),
        )
    }

    /// Keep folding `left <op> right` while the next token is one of the
    /// `expected` operators, so the operators are left-associative.
    fn then_right_part_of_binary_ops<F>(
        &mut self,
        mut left: Syntax,
        expected: &[TokenKind],
        mut then: F,
    ) -> Result<Syntax, ParseError>
    where
        F: FnMut(&mut Parser<'a>) -> Result<Syntax, ParseError>,
    {
        let mut folds = 0;

        while let Some(kind) = self.peek() {
            if !expected.contains(&kind) {
                break;
            }
            self.fold(&mut folds)?;

            // skip past the operator
            let _ = self.advance()?;
            // and parse the second bit
            let right = then(self)?;

            left = Syntax::binary(kind.as_binary_op(), left, right);
        }

        Ok(left)
    }

    fn factor(&mut self) -> Result<Syntax, ParseError> {
        let op = match self.peek() {
            Some(TokenKind::Minus) => UnaryOperator::Minus,
            Some(TokenKind::Plus) => UnaryOperator::Plus,
            _ => return self.power(),
        };

        let _ = self.advance()?;
        let operand = self.nested(|p| p.factor())?;

        Ok(Syntax::unary(op, operand))
    }

    fn power(&mut self) -> Result<Syntax, ParseError> {
        let base = self.atom()?;

        if self.peek() != Some(TokenKind::Power) {
            return Ok(base);
        }

        let _ = self.advance()?;
        // "**" is right-associative and binds tighter than a sign on its
        // left, but not on its right (i.e. "-2**-1" is "-(2**(-1))")
        let exponent = self.nested(|p| p.factor())?;

        Ok(Syntax::binary(BinaryOperator::Pow, base, exponent))
    }

    fn atom(&mut self) -> Result<Syntax, ParseError> {
        let expected = &[
            TokenKind::Number,
            TokenKind::Identifier,
            TokenKind::OpenParen,
            TokenKind::Minus,
            TokenKind::Plus,
        ];

        match self.peek() {
            Some(TokenKind::Number) => {
                return self.number();
            },
            Some(TokenKind::Identifier) => {
                return self.variable_or_function_call()
            },
            Some(TokenKind::OpenParen) => {
                let _ = self.advance()?;
                let expr = self.expression()?;
                self.expect(TokenKind::CloseParen)?;
                return Ok(expr);
            },
            _ => {},
        }

        // we couldn't parse the atom, return a nice error
        match self.tokens.next() {
            Some(Ok(Token { span, kind, .. })) => {
                Err(ParseError::UnexpectedToken {
                    found: kind,
                    expected,
                    span,
                })
            },
            Some(Err(e)) => Err(e),
            None => Err(ParseError::UnexpectedEndOfInput),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>, ParseError> {
        let token = self.advance()?;

        if token.kind == kind {
            Ok(token)
        } else {
            Err(ParseError::UnexpectedToken {
                found: token.kind,
                span: token.span,
                expected: kind.as_slice(),
            })
        }
    }

    fn variable_or_function_call(&mut self) -> Result<Syntax, ParseError> {
        let ident = self.advance()?;
        debug_assert_eq!(ident.kind, TokenKind::Identifier);

        if self.peek() == Some(TokenKind::OpenParen) {
            self.function_call(ident)
        } else {
            Ok(Syntax::Identifier(ident.text.into()))
        }
    }

    fn function_call(
        &mut self,
        identifier: Token<'a>,
    ) -> Result<Syntax, ParseError> {
        let open_paren = self.advance()?;
        debug_assert_eq!(open_paren.kind, TokenKind::OpenParen);

        let mut arguments = Vec::new();

        if self.peek() != Some(TokenKind::CloseParen) {
            arguments.push(self.expression()?);

            while self.peek() == Some(TokenKind::Comma) {
                let _ = self.advance()?;
                arguments.push(self.expression()?);
            }
        }

        let Token { kind, span, .. } = self.advance()?;

        if kind == TokenKind::CloseParen {
            Ok(Syntax::Call {
                name: identifier.text.into(),
                arguments,
            })
        } else {
            Err(ParseError::UnexpectedToken {
                found: kind,
                span,
                expected: &[TokenKind::Comma, TokenKind::CloseParen],
            })
        }
    }

    fn number(&mut self) -> Result<Syntax, ParseError> {
        let token = self.advance()?;
        debug_assert_eq!(token.kind, TokenKind::Number);

        token.text.parse().map(Syntax::Literal).map_err(|_| {
            ParseError::InvalidNumber {
                text: token.text.into(),
                span: token.span.clone(),
            }
        })
    }
}

/// Possible errors that may occur while parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid character {character:?} at index {index}")]
    InvalidCharacter { character: char, index: usize },
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("found {found:?} at {span:?}, expected one of {expected:?}")]
    UnexpectedToken {
        found: TokenKind,
        span: Range<usize>,
        expected: &'static [TokenKind],
    },
    #[error("found {found:?} at {span:?} after the end of the expression")]
    UnconsumedInput { found: TokenKind, span: Range<usize> },
    #[error("\"{text}\" at {span:?} isn't a valid number")]
    InvalidNumber { text: SmolStr, span: Range<usize> },
    #[error("the expression is nested more than {limit} levels deep")]
    TooDeep { limit: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct Tokens<'a> {
    src: &'a str,
    cursor: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str) -> Self { Tokens { src, cursor: 0 } }

    fn rest(&self) -> &'a str { &self.src[self.cursor..] }

    fn peek(&self) -> Option<char> { self.rest().chars().next() }

    fn peek_nth(&self, n: usize) -> Option<char> { self.rest().chars().nth(n) }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    fn chomp(
        &mut self,
        kind: TokenKind,
    ) -> Option<Result<Token<'a>, ParseError>> {
        self.chomp_n(kind, 1)
    }

    /// Turn the next `chars` characters into a single token.
    fn chomp_n(
        &mut self,
        kind: TokenKind,
        chars: usize,
    ) -> Option<Result<Token<'a>, ParseError>> {
        let start = self.cursor;
        for _ in 0..chars {
            self.advance()?;
        }
        let end = self.cursor;

        Some(Ok(Token::from_text(self.src, start..end, kind)))
    }

    /// Chomp a two-character operator if the second character matches,
    /// otherwise fall back to the single-character one.
    fn chomp_either(
        &mut self,
        second: char,
        double: TokenKind,
        single: TokenKind,
    ) -> Option<Result<Token<'a>, ParseError>> {
        if self.peek_nth(1) == Some(second) {
            self.chomp_n(double, 2)
        } else {
            self.chomp(single)
        }
    }

    fn take_while<P>(
        &mut self,
        mut predicate: P,
    ) -> Option<(&'a str, Range<usize>)>
    where
        P: FnMut(char) -> bool,
    {
        let start = self.cursor;

        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }

            self.advance();
        }

        let end = self.cursor;

        if start != end {
            let text = &self.src[start..end];
            Some((text, start..end))
        } else {
            None
        }
    }

    fn chomp_integer(&mut self) { self.take_while(|c| c.is_ascii_digit()); }

    fn chomp_number(&mut self) -> Token<'a> {
        let start = self.cursor;
        self.chomp_integer();

        if self.peek() == Some('.') {
            // skip past the decimal
            self.advance();
            self.chomp_integer();
        }

        // only treat the "e" as an exponent when digits follow it
        if let Some('e') | Some('E') = self.peek() {
            let exponent_follows = match self.peek_nth(1) {
                Some('+') | Some('-') => {
                    self.peek_nth(2).map_or(false, |c| c.is_ascii_digit())
                },
                Some(c) => c.is_ascii_digit(),
                None => false,
            };

            if exponent_follows {
                self.advance();
                if let Some('+') | Some('-') = self.peek() {
                    self.advance();
                }
                self.chomp_integer();
            }
        }

        let end = self.cursor;

        Token::from_text(self.src, start..end, TokenKind::Number)
    }

    fn chomp_identifier(&mut self) -> Option<Token<'a>> {
        let mut seen_first_character = false;

        let (_, span) = self.take_while(|c| {
            if seen_first_character {
                c.is_alphanumeric() || c == '_'
            } else {
                seen_first_character = true;
                c.is_alphabetic() || c == '_'
            }
        })?;

        Some(Token::from_text(self.src, span, TokenKind::Identifier))
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match self.peek()? {
                space if space.is_whitespace() => {
                    self.advance();
                    continue;
                },
                '(' => self.chomp(TokenKind::OpenParen),
                ')' => self.chomp(TokenKind::CloseParen),
                ',' => self.chomp(TokenKind::Comma),
                ';' => self.chomp(TokenKind::Semicolon),
                '+' => self.chomp(TokenKind::Plus),
                '-' => self.chomp(TokenKind::Minus),
                '%' => self.chomp(TokenKind::Percent),
                '*' => {
                    self.chomp_either('*', TokenKind::Power, TokenKind::Times)
                },
                '/' => self.chomp_either(
                    '/',
                    TokenKind::FloorDivide,
                    TokenKind::Divide,
                ),
                '=' => self.chomp_either(
                    '=',
                    TokenKind::EqualEqual,
                    TokenKind::Equals,
                ),
                '<' => self.chomp_either(
                    '=',
                    TokenKind::LessEqual,
                    TokenKind::Less,
                ),
                '>' => self.chomp_either(
                    '=',
                    TokenKind::GreaterEqual,
                    TokenKind::Greater,
                ),
                '!' if self.peek_nth(1) == Some('=') => {
                    self.chomp_n(TokenKind::NotEqual, 2)
                },
                '.' if self.peek_nth(1).map_or(false, |c| {
                    c.is_ascii_digit()
                }) =>
                {
                    Some(Ok(self.chomp_number()))
                },
                '0'..='9' => Some(Ok(self.chomp_number())),
                c if c == '_' || c.is_alphabetic() => {
                    self.chomp_identifier().map(Ok)
                },
                other => {
                    let index = self.cursor;
                    self.advance();
                    Some(Err(ParseError::InvalidCharacter {
                        character: other,
                        index,
                    }))
                },
            };
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token<'a> {
    text: &'a str,
    span: Range<usize>,
    kind: TokenKind,
}

impl<'a> Token<'a> {
    fn from_text(
        src: &'a str,
        span: Range<usize>,
        kind: TokenKind,
    ) -> Self {
        Token {
            text: &src[span.clone()],
            span,
            kind,
        }
    }
}

/// The kinds of token that can appear in an expression's text form.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Plus,
    Minus,
    Times,
    Divide,
    FloorDivide,
    Percent,
    Power,
    Equals,
    EqualEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl TokenKind {
    fn as_binary_op(self) -> BinaryOperator {
        match self {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Times => BinaryOperator::Mul,
            TokenKind::Divide => BinaryOperator::Div,
            TokenKind::FloorDivide => BinaryOperator::FloorDiv,
            TokenKind::Percent => BinaryOperator::Mod,
            TokenKind::Power => BinaryOperator::Pow,
            other => unreachable!("{:?} is not a binary op", other),
        }
    }

    fn as_comparison(self) -> Option<ComparisonOperator> {
        match self {
            TokenKind::EqualEqual => Some(ComparisonOperator::Equal),
            TokenKind::NotEqual => Some(ComparisonOperator::NotEqual),
            TokenKind::Less => Some(ComparisonOperator::Less),
            TokenKind::LessEqual => Some(ComparisonOperator::LessEqual),
            TokenKind::Greater => Some(ComparisonOperator::Greater),
            TokenKind::GreaterEqual => Some(ComparisonOperator::GreaterEqual),
            _ => None,
        }
    }

    fn as_slice(self) -> &'static [TokenKind] {
        match self {
            TokenKind::CloseParen => &[TokenKind::CloseParen],
            TokenKind::Comma => &[TokenKind::Comma],
            _ => &[],
        }
    }
}
