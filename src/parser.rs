use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::{
        AssignTarget, Block, Chunk, ElseBranch, Expression, Function, IfStatement, Literal,
        Statement,
    },
    operator::{BinaryOperator, UnaryOperator, HIGHEST_BINARY_PRIORITY, LOWEST_BINARY_PRIORITY},
    span::Position,
    tokenizer::{Token, TokenType, TokenizeError, Tokenizer},
};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Syntax(#[from] ParseErrorWithContext),
}

impl ParseError {
    pub fn module(&self) -> &str {
        match self {
            ParseError::Tokenize(err) => &err.module,
            ParseError::Syntax(err) => &err.module,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            ParseError::Tokenize(err) => err.position,
            ParseError::Syntax(err) => err.token.position,
        }
    }
}

#[derive(Debug)]
pub struct ParseErrorWithContext {
    pub error: ParseErrorKind,
    pub token: Token,
    pub module: String,
    context: Vec<&'static str>,
}

impl std::error::Error for ParseErrorWithContext {}

impl std::fmt::Display for ParseErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "While parsing {}", self.context.join(" > "))?;
        write!(
            f,
            "{} in module {} {} but found \"{}\"",
            self.error, self.module, self.token.position, self.token.token_type
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("Expected \"{0}\"")]
    Expected(TokenType),
    #[error("Expected an identifier")]
    ExpectedIdentifier,
    #[error("Expected an expression")]
    ExpectedExpression,
    #[error("Not a left value")]
    NotALeftValue,
    #[error("\"break\" outside of a loop")]
    BreakOutsideLoop,
    #[error("Unexpected \"{0}\"")]
    Unexpected(TokenType),
}

#[derive(Debug, Clone, Default)]
struct ParseContext {
    stack: Rc<RefCell<Vec<&'static str>>>,
}

impl ParseContext {
    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard {
            stack: Rc::clone(&self.stack),
        }
    }

    fn snapshot(&self) -> Vec<&'static str> {
        self.stack.borrow().clone()
    }
}

struct ParseContextGuard {
    stack: Rc<RefCell<Vec<&'static str>>>,
}

impl Drop for ParseContextGuard {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

fn literal(token_type: TokenType) -> Option<Literal> {
    let literal = match token_type {
        TokenType::Nil => Literal::Nil,
        TokenType::Bool(b) => Literal::Bool(b),
        TokenType::Int(i) => Literal::Int(i),
        TokenType::Float(x) => Literal::Float(x),
        TokenType::String(s) => Literal::String(s),
        _ => return None,
    };
    Some(literal)
}

/// Recursive descent parser with one token of lookahead.
pub struct Parser<I: Iterator<Item = char>> {
    tokenizer: Tokenizer<I>,
    lookahead: Option<Token>,
    context: ParseContext,
    in_loop: bool,
}

impl<I: Iterator<Item = char>> Parser<I> {
    pub fn new(tokenizer: Tokenizer<I>) -> Self {
        Self {
            tokenizer,
            lookahead: None,
            context: ParseContext::default(),
            in_loop: false,
        }
    }

    pub fn parse(mut self) -> Result<Chunk, ParseError> {
        let _guard = self.context.push("chunk");
        let block = self.statements()?;
        let token = self.next()?;
        if token.token_type != TokenType::Eof {
            return Err(self.error(ParseErrorKind::Unexpected(token.token_type.clone()), token));
        }
        Ok(Chunk(block))
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.tokenizer.token()?,
        };
        Ok(self.lookahead.insert(token))
    }

    fn peek_type(&mut self) -> Result<TokenType, ParseError> {
        Ok(self.peek()?.token_type.clone())
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => Ok(self.tokenizer.token()?),
        }
    }

    fn check(&mut self, token_type: &TokenType) -> Result<bool, ParseError> {
        Ok(&self.peek()?.token_type == token_type)
    }

    fn matches(&mut self, token_type: &TokenType) -> Result<bool, ParseError> {
        let matched = self.check(token_type)?;
        if matched {
            self.next()?;
        }
        Ok(matched)
    }

    fn expect(&mut self, token_type: TokenType) -> Result<Token, ParseError> {
        let token = self.next()?;
        if token.token_type == token_type {
            Ok(token)
        } else {
            Err(self.error(ParseErrorKind::Expected(token_type), token))
        }
    }

    fn error(&self, error: ParseErrorKind, token: Token) -> ParseError {
        ParseError::Syntax(ParseErrorWithContext {
            error,
            token,
            module: self.tokenizer.module().to_string(),
            context: self.context.snapshot(),
        })
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Identifier(name) => Ok(name),
            _ => Err(self.error(ParseErrorKind::ExpectedIdentifier, token)),
        }
    }

    fn with_loop_flag<T>(
        &mut self,
        in_loop: bool,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.in_loop, in_loop);
        let result = f(self);
        self.in_loop = saved;
        result
    }

    fn statements(&mut self) -> Result<Block, ParseError> {
        let mut statements = Vec::new();
        loop {
            while self.matches(&TokenType::Semicolon)? {}
            if matches!(
                self.peek()?.token_type,
                TokenType::RightBrace | TokenType::Eof
            ) {
                break;
            }
            statements.push(self.statement()?);
        }
        Ok(Block(statements))
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        self.expect(TokenType::LeftBrace)?;
        let block = self.statements()?;
        self.expect(TokenType::RightBrace)?;
        Ok(block)
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("statement");
        match self.peek_type()? {
            TokenType::Var => self.var_declaration(),
            TokenType::If => {
                self.next()?;
                Ok(Statement::If(self.if_statement()?))
            }
            TokenType::While => self.while_statement(),
            TokenType::For => self.for_statement(),
            TokenType::Break => self.break_statement(),
            TokenType::Func => self.function_statement(),
            TokenType::Return => self.return_statement(),
            TokenType::LeftBrace => Ok(Statement::Block(self.block()?)),
            TokenType::Identifier(_) | TokenType::LeftParen => self.expression_statement(),
            _ => {
                let token = self.next()?;
                Err(self.error(ParseErrorKind::ExpectedIdentifier, token))
            }
        }
    }

    fn var_declaration(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("var");
        self.expect(TokenType::Var)?;
        let names = self.names()?;
        let exprs = if self.matches(&TokenType::Equal)? {
            self.expressions()?
        } else {
            Vec::new()
        };
        Ok(Statement::VarDeclaration(names, exprs))
    }

    // `if` has already been consumed.
    fn if_statement(&mut self) -> Result<IfStatement, ParseError> {
        let _guard = self.context.push("if");
        self.expect(TokenType::LeftParen)?;
        let condition = self.expression()?;
        self.expect(TokenType::RightParen)?;
        let then_branch = self.block()?;
        let else_branch = if self.matches(&TokenType::Else)? {
            if self.matches(&TokenType::If)? {
                Some(ElseBranch::If(Box::new(self.if_statement()?)))
            } else {
                Some(ElseBranch::Else(self.block()?))
            }
        } else {
            None
        };
        Ok(IfStatement {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("while");
        self.expect(TokenType::While)?;
        self.expect(TokenType::LeftParen)?;
        let condition = self.expression()?;
        self.expect(TokenType::RightParen)?;
        let body = self.with_loop_flag(true, Self::block)?;
        Ok(Statement::While(condition, body))
    }

    fn for_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("for");
        self.expect(TokenType::For)?;
        self.expect(TokenType::LeftParen)?;
        let names = self.names()?;
        self.expect(TokenType::In)?;
        let iterable = self.expression()?;
        self.expect(TokenType::RightParen)?;
        let body = self.with_loop_flag(true, Self::block)?;
        Ok(Statement::For(names, iterable, body))
    }

    fn break_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.expect(TokenType::Break)?;
        if !self.in_loop {
            return Err(self.error(ParseErrorKind::BreakOutsideLoop, token));
        }
        Ok(Statement::Break)
    }

    fn function_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("function");
        self.expect(TokenType::Func)?;
        let name = self.identifier()?;
        Ok(Statement::Function(self.function(Some(name))?))
    }

    // Parameters and body, after the optional name.
    fn function(&mut self, name: Option<String>) -> Result<Rc<Function>, ParseError> {
        self.expect(TokenType::LeftParen)?;
        let params = if self.check(&TokenType::RightParen)? {
            Vec::new()
        } else {
            self.names()?
        };
        self.expect(TokenType::RightParen)?;
        let body = self.with_loop_flag(false, Self::block)?;
        Ok(Rc::new(Function { name, params, body }))
    }

    fn return_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("return");
        self.expect(TokenType::Return)?;
        let exprs = match self.peek()?.token_type {
            TokenType::RightBrace | TokenType::Semicolon | TokenType::Eof => Vec::new(),
            _ => self.expressions()?,
        };
        Ok(Statement::Return(exprs))
    }

    fn expression_statement(&mut self) -> Result<Statement, ParseError> {
        let _guard = self.context.push("expression statement");
        let first = self.expression()?;
        if !matches!(
            self.peek()?.token_type,
            TokenType::Comma | TokenType::Equal
        ) {
            return Ok(Statement::Expression(first));
        }

        let mut targets = vec![first];
        while self.matches(&TokenType::Comma)? {
            targets.push(self.expression()?);
        }
        let equal = self.expect(TokenType::Equal)?;
        let exprs = self.expressions()?;

        let targets = targets
            .into_iter()
            .map(Expression::into_assign_target)
            .collect::<Result<Vec<AssignTarget>, _>>()
            .map_err(|_| self.error(ParseErrorKind::NotALeftValue, equal))?;
        Ok(Statement::Assignment(targets, exprs))
    }

    fn names(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = vec![self.identifier()?];
        while self.matches(&TokenType::Comma)? {
            names.push(self.identifier()?);
        }
        Ok(names)
    }

    fn expressions(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut exprs = vec![self.expression()?];
        while self.matches(&TokenType::Comma)? {
            exprs.push(self.expression()?);
        }
        Ok(exprs)
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        match self.peek()?.token_type {
            TokenType::If => {
                self.next()?;
                let if_statement = self.with_loop_flag(false, Self::if_statement)?;
                Ok(Expression::If(Box::new(if_statement)))
            }
            TokenType::Func => {
                let _guard = self.context.push("function");
                self.next()?;
                let name = match self.peek_type()? {
                    TokenType::Identifier(_) => Some(self.identifier()?),
                    _ => None,
                };
                Ok(Expression::Function(self.function(name)?))
            }
            TokenType::LeftBracket => self.array(),
            TokenType::LeftBrace => self.map(),
            _ => self.binary(),
        }
    }

    fn array(&mut self) -> Result<Expression, ParseError> {
        let _guard = self.context.push("array");
        self.expect(TokenType::LeftBracket)?;
        if self.matches(&TokenType::RightBracket)? {
            return Ok(Expression::Array(Vec::new()));
        }
        let items = self.expressions()?;
        self.expect(TokenType::RightBracket)?;
        Ok(Expression::Array(items))
    }

    fn map(&mut self) -> Result<Expression, ParseError> {
        let _guard = self.context.push("map");
        self.expect(TokenType::LeftBrace)?;
        let mut entries = Vec::new();
        loop {
            if self.matches(&TokenType::RightBrace)? {
                break;
            }
            let key = if self.matches(&TokenType::LeftBracket)? {
                let key = self.expression()?;
                self.expect(TokenType::RightBracket)?;
                key
            } else {
                Expression::Literal(Literal::String(self.identifier()?))
            };
            self.expect(TokenType::Equal)?;
            entries.push((key, self.expression()?));
            if !self.matches(&TokenType::Comma)? {
                self.expect(TokenType::RightBrace)?;
                break;
            }
        }
        Ok(Expression::Map(entries))
    }

    /// Reads a flat `single (op single)*` sequence, then folds it one
    /// priority level at a time, tightest first, leftmost first.
    fn binary(&mut self) -> Result<Expression, ParseError> {
        let mut operands = vec![self.single()?];
        let mut operators = Vec::new();
        while let Some(op) = BinaryOperator::from_token(&self.peek()?.token_type) {
            self.next()?;
            operators.push(op);
            operands.push(self.single()?);
        }

        for priority in LOWEST_BINARY_PRIORITY..=HIGHEST_BINARY_PRIORITY {
            let mut i = 0;
            while i < operators.len() {
                if operators[i].priority() != priority {
                    i += 1;
                    continue;
                }
                let op = operators.remove(i);
                let right = operands.remove(i + 1);
                let left = std::mem::replace(&mut operands[i], Expression::Literal(Literal::Nil));
                operands[i] = Expression::Binary(Box::new(left), op, Box::new(right));
            }
        }

        debug_assert_eq!(operands.len(), 1);
        Ok(operands.swap_remove(0))
    }

    fn single(&mut self) -> Result<Expression, ParseError> {
        let token_type = self.peek_type()?;
        if let Some(op) = UnaryOperator::from_token(&token_type) {
            self.next()?;
            return Ok(Expression::Unary(op, Box::new(self.single()?)));
        }
        if token_type.is_literal() {
            let token = self.next()?;
            return match literal(token.token_type.clone()) {
                Some(literal) => Ok(Expression::Literal(literal)),
                None => Err(self.error(ParseErrorKind::ExpectedExpression, token)),
            };
        }
        match token_type {
            TokenType::Identifier(_) | TokenType::LeftParen => self.postfix(),
            _ => {
                let token = self.next()?;
                Err(self.error(ParseErrorKind::ExpectedExpression, token))
            }
        }
    }

    fn postfix(&mut self) -> Result<Expression, ParseError> {
        let token = self.next()?;
        let mut expr = match token.token_type {
            TokenType::Identifier(name) => Expression::Identifier(name),
            TokenType::LeftParen => {
                let expr = self.expression()?;
                self.expect(TokenType::RightParen)?;
                expr
            }
            _ => return Err(self.error(ParseErrorKind::ExpectedExpression, token)),
        };

        loop {
            match self.peek()?.token_type {
                TokenType::LeftParen => {
                    self.next()?;
                    let args = if self.matches(&TokenType::RightParen)? {
                        Vec::new()
                    } else {
                        let args = self.expressions()?;
                        self.expect(TokenType::RightParen)?;
                        args
                    };
                    expr = Expression::Call(Box::new(expr), args);
                }
                TokenType::LeftBracket => {
                    self.next()?;
                    let key = self.expression()?;
                    self.expect(TokenType::RightBracket)?;
                    expr = Expression::index(expr, key);
                }
                TokenType::Dot => {
                    self.next()?;
                    let name = self.identifier()?;
                    expr = Expression::index(expr, Expression::Literal(Literal::String(name)));
                }
                _ => break,
            }
        }
        Ok(expr)
    }
}

pub fn parse(source: &str, module: &str) -> Result<Chunk, ParseError> {
    Parser::new(Tokenizer::from_source(source, module)).parse()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn statements(source: &str) -> Vec<String> {
        parse(source, "<test>")
            .unwrap()
            .0
             .0
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn syntax_error(source: &str) -> ParseErrorKind {
        match parse(source, "<test>") {
            Err(ParseError::Syntax(err)) => err.error,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        assert_eq!(statements("x = 1 + 2 * 3"), vec!["x = (1 + (2 * 3));"]);
    }

    #[test]
    fn test_same_priority_is_left_associative() {
        assert_eq!(statements("x = 1 - 2 - 3"), vec!["x = ((1 - 2) - 3);"]);
        assert_eq!(statements("x = 8 / 4 % 3"), vec!["x = ((8 / 4) % 3);"]);
    }

    #[test]
    fn test_logical_and_bitwise_priorities() {
        assert_eq!(
            statements("x = a || b && c == d"),
            vec!["x = (a || (b && (c == d)));"]
        );
        assert_eq!(
            statements("x = a | b ^ c & d"),
            vec!["x = (a | (b ^ (c & d)));"]
        );
        assert_eq!(
            statements("x = a < b == c >= d"),
            vec!["x = ((a < b) == (c >= d));"]
        );
    }

    #[test]
    fn test_unary_binds_tightest() {
        assert_eq!(statements("x = -a * !b"), vec!["x = (-a * !b);"]);
        assert_eq!(statements("x = -(a + b)"), vec!["x = -((a + b));"]);
    }

    #[test]
    fn test_member_access_desugars_to_index() {
        assert_eq!(statements("a.b.c = 1"), vec![r#"a["b"]["c"] = 1;"#]);
        assert_eq!(statements("math.sqrt(4)"), vec![r#"math["sqrt"](4);"#]);
    }

    #[test]
    fn test_multiple_assignment() {
        assert_eq!(
            statements("a, b[1] = f()"),
            vec!["a, b[1] = f();"]
        );
        assert_eq!(statements("var a, b = 1, 2"), vec!["var a, b = 1, 2;"]);
        assert_eq!(statements("var a"), vec!["var a;"]);
    }

    #[test]
    fn test_map_literal() {
        assert_eq!(
            statements("m = { a = 1, [2] = 'two', }"),
            vec![r#"m = {["a"] = 1, [2] = "two"};"#]
        );
        assert_eq!(statements("m = {}"), vec!["m = {};"]);
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(statements("a = [1, [2], {}]"), vec!["a = [1, [2], {}];"]);
        assert_eq!(statements("a = []"), vec!["a = [];"]);
    }

    #[test]
    fn test_function_forms() {
        assert_eq!(
            statements("func add(a, b) { return a + b }"),
            vec!["func add(a, b) {\nreturn (a + b);\n}"]
        );
        assert_eq!(
            statements("f = func() { return }"),
            vec!["f = func() {\nreturn;\n};"]
        );
    }

    #[test]
    fn test_if_as_expression() {
        assert_eq!(
            statements("x = if (a) { return 1 } else { return 2 }"),
            vec!["x = if (a) {\nreturn 1;\n} else {\nreturn 2;\n};"]
        );
    }

    #[test]
    fn test_else_if_chain() {
        assert_eq!(
            statements("if (a) { } else if (b) { } else { }"),
            vec!["if (a) {\n} else if (b) {\n} else {\n}"]
        );
    }

    #[test]
    fn test_for_statement() {
        assert_eq!(
            statements("for (k, v in m) { print(k) }"),
            vec!["for (k, v in m) {\nprint(k);\n}"]
        );
    }

    #[test]
    fn test_semicolons_are_optional() {
        assert_eq!(statements("a = 1; b = 2;; c = 3"), vec!["a = 1;", "b = 2;", "c = 3;"]);
    }

    #[test]
    fn test_parenthesized_postfix() {
        assert_eq!(statements("(func() { })()"), vec!["(func() {\n})();"]);
        assert_eq!(statements(r#"x = ("abc")[0]"#), vec![r#"x = ("abc")[0];"#]);
    }

    #[test]
    fn test_display_reparses_to_same_text() {
        let source = r#"
            func fib(n) { if (n < 2) { return n } return fib(n - 1) + fib(n - 2) }
            var t = { name = "x", [1] = [1, 2.5, -3] }
            for (i in range(10)) { if (i > 5) { break } t[i] = i * 2 }
            while (!done) { done = true }
        "#;
        let once = parse(source, "<test>").unwrap().to_string();
        let twice = parse(&once, "<test>").unwrap().to_string();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_not_a_left_value() {
        assert_eq!(syntax_error("f() = 1"), ParseErrorKind::NotALeftValue);
        assert_eq!(syntax_error("a, b + c = 1, 2"), ParseErrorKind::NotALeftValue);
    }

    #[test]
    fn test_statement_must_start_with_identifier() {
        assert_eq!(syntax_error("1 + 2"), ParseErrorKind::ExpectedIdentifier);
        assert_eq!(syntax_error("func () { }"), ParseErrorKind::ExpectedIdentifier);
    }

    #[test]
    fn test_break_placement() {
        assert!(parse("while (true) { if (x) { break } }", "<test>").is_ok());
        assert!(parse("for (x in a) { { break } }", "<test>").is_ok());
        assert_eq!(syntax_error("break"), ParseErrorKind::BreakOutsideLoop);
        assert_eq!(
            syntax_error("while (true) { f = func() { break } }"),
            ParseErrorKind::BreakOutsideLoop
        );
        assert_eq!(
            syntax_error("while (true) { x = if (a) { break } }"),
            ParseErrorKind::BreakOutsideLoop
        );
    }

    #[test]
    fn test_missing_tokens() {
        assert_eq!(
            syntax_error("if (a { }"),
            ParseErrorKind::Expected(TokenType::RightParen)
        );
        assert_eq!(syntax_error("x = "), ParseErrorKind::ExpectedExpression);
        assert_eq!(
            syntax_error("x = 1 }"),
            ParseErrorKind::Unexpected(TokenType::RightBrace)
        );
    }

    #[test]
    fn test_error_message_has_context_and_position() {
        let err = parse("while (x) {\n  if (a { }\n}", "main.sno").unwrap_err();
        assert_eq!(err.module(), "main.sno");
        assert_eq!(err.position(), Position::new(2, 9));
        assert_eq!(
            err.to_string(),
            "While parsing chunk > statement > while > statement > if\n\
             Expected \")\" in module main.sno line 2 column 9 but found \"{\""
        );
    }

    #[test]
    fn test_tokenize_error_is_surfaced() {
        assert!(matches!(
            parse("x = 'abc", "<test>"),
            Err(ParseError::Tokenize(_))
        ));
    }
}
