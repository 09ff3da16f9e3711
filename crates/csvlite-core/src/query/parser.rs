/// Parser for SQL-like queries
///
/// Converts a stream of tokens into an Abstract Syntax Tree (AST).
use super::ast::*;
use super::lexer::{Keyword, Lexer, Token};
use crate::error::{Error, Result};
use crate::ternary::Ternary;
use crate::value::{ComparisonOperator, NullPosition, SortDirection};

const AGGREGATE_FUNCTIONS: &[&str] = &["COUNT", "MAX", "MIN", "SUM", "AVG", "MEDIAN"];

/// Parser for SQL-like queries
pub struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    /// Create a new parser from SQL text
    pub fn new(input: &str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse a single statement, optionally terminated by `;`
    pub fn parse(&mut self) -> Result<Statement> {
        let statement = self.parse_statement()?;
        if self.current_token() == &Token::Semicolon {
            self.advance();
        }
        self.expect_token(Token::Eof)?;
        Ok(statement)
    }

    /// Parse a `;`-separated batch of statements
    pub fn parse_statements(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            while self.current_token() == &Token::Semicolon {
                self.advance();
            }
            if self.current_token() == &Token::Eof {
                break;
            }
            statements.push(self.parse_statement()?);
            if self.current_token() != &Token::Eof {
                self.expect_token(Token::Semicolon)?;
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        Ok(Statement::Select(self.parse_select_query()?))
    }

    fn parse_select_query(&mut self) -> Result<SelectQuery> {
        let with = self.parse_with()?;
        let body = self.parse_set_expression()?;
        let order_by = self.parse_order_by()?;

        let mut offset = None;
        let mut limit = None;
        loop {
            if offset.is_none() && self.is_keyword(Keyword::Offset) {
                self.advance();
                offset = Some(self.parse_expression()?);
                if self.is_word("ROW") || self.is_word("ROWS") {
                    self.advance();
                }
            } else if limit.is_none() && self.is_keyword(Keyword::Limit) {
                limit = Some(self.parse_limit()?);
            } else {
                break;
            }
        }

        Ok(SelectQuery {
            with,
            body,
            order_by,
            offset,
            limit,
        })
    }

    fn parse_with(&mut self) -> Result<Option<WithClause>> {
        if !self.is_keyword(Keyword::With) {
            return Ok(None);
        }
        self.advance();

        let recursive = if self.is_keyword(Keyword::Recursive) {
            self.advance();
            true
        } else {
            false
        };

        let mut tables = Vec::new();
        loop {
            let name = self.expect_identifier("inline table name")?;
            let columns = if self.current_token() == &Token::LeftParen {
                self.parse_identifier_list()?
            } else {
                Vec::new()
            };
            self.expect_keyword(Keyword::As)?;
            self.expect_token(Token::LeftParen)?;
            let query = self.parse_select_query()?;
            self.expect_token(Token::RightParen)?;
            tables.push(InlineTableDefinition {
                name,
                columns,
                query,
            });

            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(Some(WithClause { recursive, tables }))
    }

    fn parse_set_expression(&mut self) -> Result<SelectBody> {
        let mut left = self.parse_intersect_term()?;

        loop {
            let operator = if self.is_keyword(Keyword::Union) {
                SetOperator::Union
            } else if self.is_keyword(Keyword::Except) {
                SetOperator::Except
            } else {
                break;
            };
            self.advance();
            let all = self.parse_set_quantifier();
            let right = self.parse_intersect_term()?;
            left = SelectBody::SetOperation {
                left: Box::new(left),
                operator,
                all,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_intersect_term(&mut self) -> Result<SelectBody> {
        let mut left = self.parse_set_primary()?;

        while self.is_keyword(Keyword::Intersect) {
            self.advance();
            let all = self.parse_set_quantifier();
            let right = self.parse_set_primary()?;
            left = SelectBody::SetOperation {
                left: Box::new(left),
                operator: SetOperator::Intersect,
                all,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_set_quantifier(&mut self) -> bool {
        if self.is_keyword(Keyword::All) {
            self.advance();
            true
        } else {
            if self.is_keyword(Keyword::Distinct) {
                self.advance();
            }
            false
        }
    }

    fn parse_set_primary(&mut self) -> Result<SelectBody> {
        if self.current_token() == &Token::LeftParen {
            self.advance();
            let query = self.parse_select_query()?;
            self.expect_token(Token::RightParen)?;
            return Ok(SelectBody::Query(Box::new(query)));
        }
        Ok(SelectBody::Entity(Box::new(self.parse_select_entity()?)))
    }

    fn parse_select_entity(&mut self) -> Result<SelectEntity> {
        self.expect_keyword(Keyword::Select)?;

        let distinct = if self.is_keyword(Keyword::Distinct) {
            self.advance();
            true
        } else {
            if self.is_keyword(Keyword::All) {
                self.advance();
            }
            false
        };

        let mut fields = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let alias = self.parse_alias()?;
            fields.push(Field { expr, alias });

            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        let from = self.parse_from()?;
        let where_clause = self.parse_optional_clause(Keyword::Where)?;
        let group_by = self.parse_group_by()?;
        let having = self.parse_optional_clause(Keyword::Having)?;

        Ok(SelectEntity {
            distinct,
            fields,
            from,
            where_clause,
            group_by,
            having,
        })
    }

    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.is_keyword(Keyword::As) {
            self.advance();
            return self.expect_identifier("alias").map(Some);
        }
        match self.current_token().clone() {
            Token::Identifier(name) | Token::QuotedIdentifier(name) => {
                self.advance();
                Ok(Some(name))
            }
            _ => Ok(None),
        }
    }

    fn parse_optional_clause(&mut self, keyword: Keyword) -> Result<Option<Expression>> {
        if !self.is_keyword(keyword) {
            return Ok(None);
        }
        self.advance();
        self.parse_expression().map(Some)
    }

    fn parse_from(&mut self) -> Result<Vec<Table>> {
        if !self.is_keyword(Keyword::From) {
            return Ok(Vec::new());
        }
        self.advance();

        let mut tables = Vec::new();
        loop {
            tables.push(self.parse_joined_table()?);
            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(tables)
    }

    fn parse_joined_table(&mut self) -> Result<Table> {
        let mut left = self.parse_table_primary()?;

        loop {
            let (join_type, natural) = if self.is_keyword(Keyword::Cross) {
                self.advance();
                (JoinType::Cross, false)
            } else {
                let natural = if self.is_keyword(Keyword::Natural) {
                    self.advance();
                    true
                } else {
                    false
                };
                let join_type = match self.current_token() {
                    Token::Keyword(Keyword::Inner) => {
                        self.advance();
                        JoinType::Inner
                    }
                    Token::Keyword(Keyword::Left) => {
                        self.advance();
                        self.skip_outer();
                        JoinType::Left
                    }
                    Token::Keyword(Keyword::Right) => {
                        self.advance();
                        self.skip_outer();
                        JoinType::Right
                    }
                    Token::Keyword(Keyword::Full) => {
                        self.advance();
                        self.skip_outer();
                        JoinType::Full
                    }
                    Token::Keyword(Keyword::Join) => JoinType::Inner,
                    _ if natural => {
                        return Err(self.unexpected("JOIN"));
                    }
                    _ => break,
                };
                (join_type, natural)
            };
            self.expect_keyword(Keyword::Join)?;

            let right = self.parse_table_primary()?;

            let condition = if join_type == JoinType::Cross || natural {
                None
            } else if self.is_keyword(Keyword::On) {
                self.advance();
                Some(JoinCondition::On(self.parse_expression()?))
            } else if self.is_keyword(Keyword::Using) {
                self.advance();
                Some(JoinCondition::Using(self.parse_identifier_list()?))
            } else if join_type == JoinType::Inner {
                None
            } else {
                return Err(self.unexpected("ON or USING"));
            };

            left = Table {
                object: TableObject::Join(Box::new(Join {
                    left,
                    right,
                    join_type,
                    natural,
                    condition,
                })),
                alias: None,
                columns: Vec::new(),
            };
        }

        Ok(left)
    }

    fn skip_outer(&mut self) {
        if self.is_keyword(Keyword::Outer) {
            self.advance();
        }
    }

    fn parse_table_primary(&mut self) -> Result<Table> {
        let object = match self.current_token().clone() {
            Token::Keyword(Keyword::Dual) => {
                self.advance();
                TableObject::Dual
            }
            Token::Keyword(Keyword::Stdin) => {
                self.advance();
                TableObject::Stdin
            }
            Token::Keyword(Keyword::Values) => TableObject::Values(self.parse_values()?),
            Token::LeftParen => {
                self.advance();
                let object = if self.is_keyword(Keyword::Values) {
                    TableObject::Values(self.parse_values()?)
                } else if self.is_keyword(Keyword::Select)
                    || self.is_keyword(Keyword::With)
                    || self.current_token() == &Token::LeftParen
                {
                    TableObject::Subquery(Box::new(self.parse_select_query()?))
                } else {
                    // a parenthesized join
                    let inner = self.parse_joined_table()?;
                    self.expect_token(Token::RightParen)?;
                    return Ok(inner);
                };
                self.expect_token(Token::RightParen)?;
                object
            }
            Token::Identifier(_) | Token::QuotedIdentifier(_) => {
                let mut name = self.expect_identifier("table name")?;
                while self.current_token() == &Token::Dot {
                    self.advance();
                    name.push('.');
                    name.push_str(&self.expect_identifier("table name")?);
                }
                TableObject::Identifier(name)
            }
            _ => return Err(self.unexpected("table")),
        };

        let alias = if self.is_keyword(Keyword::As) {
            self.advance();
            Some(self.expect_identifier("table alias")?)
        } else {
            match self.current_token().clone() {
                Token::Identifier(name) | Token::QuotedIdentifier(name) => {
                    self.advance();
                    Some(name)
                }
                _ => None,
            }
        };

        let columns = if alias.is_some()
            && matches!(object, TableObject::Values(_) | TableObject::Subquery(_))
            && self.current_token() == &Token::LeftParen
        {
            self.parse_identifier_list()?
        } else {
            Vec::new()
        };

        Ok(Table {
            object,
            alias,
            columns,
        })
    }

    fn parse_values(&mut self) -> Result<Vec<Vec<Expression>>> {
        self.expect_keyword(Keyword::Values)?;
        let mut rows = Vec::new();
        loop {
            self.expect_token(Token::LeftParen)?;
            rows.push(self.parse_expression_list()?);
            self.expect_token(Token::RightParen)?;
            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(rows)
    }

    fn parse_group_by(&mut self) -> Result<Vec<Expression>> {
        if !self.is_keyword(Keyword::Group) {
            return Ok(Vec::new());
        }
        self.advance();
        self.expect_keyword(Keyword::By)?;
        self.parse_expression_list()
    }

    fn parse_order_by(&mut self) -> Result<Option<OrderByClause>> {
        if !self.is_keyword(Keyword::Order) {
            return Ok(None);
        }
        self.advance();
        self.expect_keyword(Keyword::By)?;

        let mut items = Vec::new();
        loop {
            let expr = self.parse_expression()?;

            let direction = match self.current_token() {
                Token::Keyword(Keyword::Asc) => {
                    self.advance();
                    Some(SortDirection::Asc)
                }
                Token::Keyword(Keyword::Desc) => {
                    self.advance();
                    Some(SortDirection::Desc)
                }
                _ => None,
            };

            let nulls = if self.is_word("NULLS") {
                self.advance();
                if self.is_word("FIRST") {
                    self.advance();
                    Some(NullPosition::First)
                } else if self.is_word("LAST") {
                    self.advance();
                    Some(NullPosition::Last)
                } else {
                    return Err(self.unexpected("FIRST or LAST"));
                }
            } else {
                None
            };

            items.push(OrderItem {
                expr,
                direction,
                nulls,
            });

            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(Some(OrderByClause { items }))
    }

    fn parse_limit(&mut self) -> Result<LimitClause> {
        self.expect_keyword(Keyword::Limit)?;
        let value = self.parse_expression()?;

        let percent = if self.is_word("PERCENT") {
            self.advance();
            true
        } else {
            false
        };

        let with_ties = if self.is_keyword(Keyword::With) && self.peek_is_word("TIES") {
            self.advance();
            self.advance();
            true
        } else {
            false
        };

        Ok(LimitClause {
            value,
            percent,
            with_ties,
        })
    }

    /// Parses one expression and leaves the tokens after it unread.
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_logical_or()
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expression>> {
        let mut items = vec![self.parse_expression()?];
        while self.current_token() == &Token::Comma {
            self.advance();
            items.push(self.parse_expression()?);
        }
        Ok(items)
    }

    fn parse_logical_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_logical_and()?;

        while self.is_keyword(Keyword::Or) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expression::Logic {
                left: Box::new(left),
                op: LogicalOperator::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_not()?;

        while self.is_keyword(Keyword::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expression::Logic {
                left: Box::new(left),
                op: LogicalOperator::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression> {
        if self.is_keyword(Keyword::Not) {
            self.advance();
            let expr = self.parse_not()?;
            return Ok(Expression::Not(Box::new(expr)));
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let left = self.parse_concat()?;

        if self.is_keyword(Keyword::Is) {
            self.advance();
            let negated = if self.is_keyword(Keyword::Not) {
                self.advance();
                true
            } else {
                false
            };
            let value = match self.current_token() {
                Token::Keyword(Keyword::Null) => Literal::Null,
                Token::Keyword(Keyword::True) => Literal::Ternary(Ternary::True),
                Token::Keyword(Keyword::False) => Literal::Ternary(Ternary::False),
                Token::Keyword(Keyword::Unknown) => Literal::Ternary(Ternary::Unknown),
                _ => return Err(self.unexpected("NULL, TRUE, FALSE or UNKNOWN")),
            };
            self.advance();
            return Ok(Expression::Is {
                expr: Box::new(left),
                value: Box::new(Expression::Literal(value)),
                negated,
            });
        }

        let negated = if self.is_keyword(Keyword::Not)
            && matches!(
                self.peek_token(),
                Token::Keyword(Keyword::Between) | Token::Keyword(Keyword::Like) | Token::Keyword(Keyword::In)
            ) {
            self.advance();
            true
        } else {
            false
        };

        match self.current_token() {
            Token::Keyword(Keyword::Between) => {
                self.advance();
                let low = self.parse_concat()?;
                self.expect_keyword(Keyword::And)?;
                let high = self.parse_concat()?;
                return Ok(Expression::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                });
            }
            Token::Keyword(Keyword::Like) => {
                self.advance();
                let pattern = self.parse_concat()?;
                return Ok(Expression::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated,
                });
            }
            Token::Keyword(Keyword::In) => {
                self.advance();
                let values = self.parse_value_source()?;
                return Ok(Expression::In {
                    expr: Box::new(left),
                    values: Box::new(values),
                    negated,
                });
            }
            _ => {}
        }

        let op = match self.current_token() {
            Token::Eq => ComparisonOperator::Equal,
            Token::Ne => ComparisonOperator::NotEqual,
            Token::Lt => ComparisonOperator::Less,
            Token::Le => ComparisonOperator::LessOrEqual,
            Token::Gt => ComparisonOperator::Greater,
            Token::Ge => ComparisonOperator::GreaterOrEqual,
            _ => return Ok(left),
        };
        self.advance();

        match self.current_token() {
            Token::Keyword(Keyword::Any) | Token::Keyword(Keyword::Some) => {
                self.advance();
                let values = self.parse_value_source()?;
                Ok(Expression::Any {
                    expr: Box::new(left),
                    op,
                    values: Box::new(values),
                })
            }
            Token::Keyword(Keyword::All) => {
                self.advance();
                let values = self.parse_value_source()?;
                Ok(Expression::All {
                    expr: Box::new(left),
                    op,
                    values: Box::new(values),
                })
            }
            _ => {
                let right = self.parse_concat()?;
                Ok(Expression::Comparison {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            }
        }
    }

    /// The parenthesized list or subquery after IN, ANY and ALL
    fn parse_value_source(&mut self) -> Result<Expression> {
        self.expect_token(Token::LeftParen)?;
        let source = if self.is_keyword(Keyword::Select) || self.is_keyword(Keyword::With) {
            Expression::Subquery(Box::new(self.parse_select_query()?))
        } else {
            Expression::ValueList(self.parse_expression_list()?)
        };
        self.expect_token(Token::RightParen)?;
        Ok(source)
    }

    fn parse_concat(&mut self) -> Result<Expression> {
        let first = self.parse_additive()?;
        if self.current_token() != &Token::Concat {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.current_token() == &Token::Concat {
            self.advance();
            items.push(self.parse_additive()?);
        }
        Ok(Expression::Concat(items))
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => ArithmeticOperator::Add,
                Token::Minus => ArithmeticOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::Arithmetic {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Asterisk => ArithmeticOperator::Multiply,
                Token::Slash => ArithmeticOperator::Divide,
                Token::Percent => ArithmeticOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::Arithmetic {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let op = match self.current_token() {
            Token::Minus => UnaryOperator::Minus,
            Token::Plus => UnaryOperator::Plus,
            _ => return self.parse_primary(),
        };
        self.advance();

        // fold signed numeric literals
        match (op, self.current_token().clone()) {
            (UnaryOperator::Minus, Token::Integer(i)) => {
                self.advance();
                Ok(Expression::Literal(Literal::Integer(i.wrapping_neg())))
            }
            (UnaryOperator::Minus, Token::Float(f)) => {
                self.advance();
                Ok(Expression::Literal(Literal::Float(-f)))
            }
            _ => {
                let operand = self.parse_unary()?;
                Ok(Expression::UnaryArithmetic {
                    op,
                    operand: Box::new(operand),
                })
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        match self.current_token().clone() {
            Token::Integer(i) => {
                self.advance();
                Ok(Expression::Literal(Literal::Integer(i)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expression::Literal(Literal::Float(f)))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expression::Literal(Literal::String(s)))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::Literal(Literal::Ternary(Ternary::True)))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::Literal(Literal::Ternary(Ternary::False)))
            }
            Token::Keyword(Keyword::Unknown) => {
                self.advance();
                Ok(Expression::Literal(Literal::Ternary(Ternary::Unknown)))
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expression::Literal(Literal::Null))
            }
            Token::Asterisk => {
                self.advance();
                Ok(Expression::AllColumns)
            }
            Token::Variable(name) => {
                self.advance();
                if self.current_token() == &Token::Assign {
                    self.advance();
                    let value = self.parse_expression()?;
                    return Ok(Expression::VariableSubstitution {
                        name,
                        value: Box::new(value),
                    });
                }
                Ok(Expression::Variable(name))
            }
            Token::Keyword(Keyword::Exists) => {
                self.advance();
                self.expect_token(Token::LeftParen)?;
                let query = self.parse_select_query()?;
                self.expect_token(Token::RightParen)?;
                Ok(Expression::Exists(Box::new(query)))
            }
            Token::Keyword(Keyword::Case) => self.parse_case(),
            Token::LeftParen => {
                self.advance();
                if self.is_keyword(Keyword::Select) || self.is_keyword(Keyword::With) {
                    let query = self.parse_select_query()?;
                    self.expect_token(Token::RightParen)?;
                    return Ok(Expression::Subquery(Box::new(query)));
                }
                let mut items = self.parse_expression_list()?;
                self.expect_token(Token::RightParen)?;
                if items.len() == 1 {
                    Ok(Expression::Parentheses(Box::new(items.remove(0))))
                } else {
                    Ok(Expression::RowValue(items))
                }
            }
            Token::Identifier(name) => {
                self.advance();
                if self.current_token() == &Token::LeftParen {
                    return self.parse_function_call(name);
                }
                self.parse_column_reference(name)
            }
            Token::QuotedIdentifier(name) => {
                self.advance();
                self.parse_column_reference(name)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_column_reference(&mut self, first: String) -> Result<Expression> {
        if self.current_token() != &Token::Dot {
            return Ok(Expression::Column {
                table: None,
                name: first,
            });
        }
        self.advance();
        if self.current_token() == &Token::Asterisk {
            self.advance();
            return Ok(Expression::TableColumns(first));
        }
        let name = self.expect_identifier("column name")?;
        Ok(Expression::Column {
            table: Some(first),
            name,
        })
    }

    fn parse_case(&mut self) -> Result<Expression> {
        self.expect_keyword(Keyword::Case)?;

        let operand = if self.is_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        let mut branches = Vec::new();
        while self.is_keyword(Keyword::When) {
            self.advance();
            let when = self.parse_expression()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expression()?;
            branches.push((when, then));
        }
        if branches.is_empty() {
            return Err(self.unexpected("WHEN"));
        }

        let else_result = if self.is_keyword(Keyword::Else) {
            self.advance();
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;

        Ok(Expression::Case {
            operand,
            branches,
            else_result,
        })
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expression> {
        let name = name.to_uppercase();
        self.expect_token(Token::LeftParen)?;

        let distinct = if self.is_keyword(Keyword::Distinct) {
            self.advance();
            true
        } else {
            false
        };

        let mut args = Vec::new();
        let mut order_by = None;
        if self.current_token() != &Token::RightParen {
            args = self.parse_expression_list()?;
        }

        if name == "GROUP_CONCAT" {
            order_by = self.parse_order_by()?;
            if self.is_word("SEPARATOR") {
                self.advance();
                match self.current_token().clone() {
                    Token::String(sep) => {
                        self.advance();
                        args.push(Expression::Literal(Literal::String(sep)));
                    }
                    _ => return Err(self.unexpected("separator string")),
                }
            }
        }
        self.expect_token(Token::RightParen)?;

        if name == "LISTAGG" && self.is_word("WITHIN") {
            self.advance();
            self.expect_keyword(Keyword::Group)?;
            self.expect_token(Token::LeftParen)?;
            order_by = self.parse_order_by()?;
            self.expect_token(Token::RightParen)?;
        }

        if self.is_word("OVER") {
            self.advance();
            return self.parse_over(name, distinct, args);
        }

        if name == "LISTAGG" || name == "GROUP_CONCAT" {
            return Ok(Expression::ListAggregate {
                name,
                distinct,
                args,
                order_by,
            });
        }

        if distinct || AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
            return Ok(Expression::Aggregate {
                name,
                distinct,
                args,
            });
        }

        Ok(Expression::Function { name, args })
    }

    fn parse_over(
        &mut self,
        name: String,
        distinct: bool,
        args: Vec<Expression>,
    ) -> Result<Expression> {
        self.expect_token(Token::LeftParen)?;

        let partition_by = if self.is_word("PARTITION") {
            self.advance();
            self.expect_keyword(Keyword::By)?;
            self.parse_expression_list()?
        } else {
            Vec::new()
        };
        let order_by = self.parse_order_by()?;
        self.expect_token(Token::RightParen)?;

        Ok(Expression::Analytic {
            name,
            distinct,
            args,
            partition_by,
            order_by,
        })
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        self.expect_token(Token::LeftParen)?;
        let mut names = vec![self.expect_identifier("column name")?];
        while self.current_token() == &Token::Comma {
            self.advance();
            names.push(self.expect_identifier("column name")?);
        }
        self.expect_token(Token::RightParen)?;
        Ok(names)
    }

    fn current_token(&self) -> &Token {
        self.tokens
            .get(self.position)
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn peek_token(&self) -> &Token {
        self.tokens
            .get(self.position + 1)
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn current_position(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|(_, p)| *p)
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_keyword(&self, keyword: Keyword) -> bool {
        self.current_token() == &Token::Keyword(keyword)
    }

    /// Contextual words such as NULLS or PARTITION are plain identifiers.
    fn is_word(&self, word: &str) -> bool {
        matches!(self.current_token(), Token::Identifier(id) if id.eq_ignore_ascii_case(word))
    }

    fn peek_is_word(&self, word: &str) -> bool {
        matches!(self.peek_token(), Token::Identifier(id) if id.eq_ignore_ascii_case(word))
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::syntax(
            format!("expected {}, found {}", expected, self.current_token()),
            self.current_position(),
        )
    }

    fn expect_token(&mut self, expected: Token) -> Result<()> {
        if self.current_token() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        self.expect_token(Token::Keyword(keyword))
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String> {
        match self.current_token().clone() {
            Token::Identifier(name) | Token::QuotedIdentifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }
}

/// Parse a single statement
pub fn parse(sql: &str) -> Result<Statement> {
    Parser::new(sql)?.parse()
}

/// Parse a `;`-separated batch of statements
pub fn parse_statements(sql: &str) -> Result<Vec<Statement>> {
    Parser::new(sql)?.parse_statements()
}
