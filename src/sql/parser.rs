use super::lexer::{SqlLexer, Token};
use super::statement::{Column, Condition, Criteria, Criterion, Statement, StatementKind};
use crate::error::{DbError, DbResult};

/// Turns statement text into a [`Statement`]
pub trait StatementParser: Send + Sync {
    fn parse(&self, sql: &str) -> DbResult<Statement>;
}

/// Parser for the SELECT/INSERT/UPDATE/DELETE subset the executors run
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlStatementParser;

impl StatementParser for SqlStatementParser {
    fn parse(&self, sql: &str) -> DbResult<Statement> {
        SqlParser::new(sql)?.parse()
    }
}

/// SQL Parser
pub struct SqlParser {
    tokens: Vec<Token>,
    position: usize,
}

impl SqlParser {
    pub fn new(input: &str) -> DbResult<Self> {
        let mut lexer = SqlLexer::new(input);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn unexpected(&self, expected: &str) -> DbError {
        match self.current_token() {
            Token::Unsupported(word) => DbError::ParseError(format!("{} is not supported", word)),
            other => DbError::ParseError(format!("Expected {}, found {:?}", expected, other)),
        }
    }

    fn expect(&mut self, expected: Token) -> DbResult<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn expect_identifier(&mut self) -> DbResult<String> {
        match self.current_token().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// `name` or `qualifier.name`
    fn parse_column_name(&mut self) -> DbResult<String> {
        let mut name = self.expect_identifier()?;
        while *self.current_token() == Token::Dot {
            self.advance();
            name = format!("{}.{}", name, self.expect_identifier()?);
        }
        Ok(name)
    }

    pub fn parse(&mut self) -> DbResult<Statement> {
        let statement = match self.current_token() {
            Token::Select => self.parse_select()?,
            Token::Insert => self.parse_insert()?,
            Token::Update => self.parse_update()?,
            Token::Delete => self.parse_delete()?,
            _ => return Err(self.unexpected("SELECT, INSERT, UPDATE or DELETE")),
        };

        // Optional semicolon at end
        if *self.current_token() == Token::Semicolon {
            self.advance();
        }
        if *self.current_token() != Token::Eof {
            return Err(self.unexpected("end of statement"));
        }

        Ok(statement)
    }

    fn placeholder_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| **t == Token::Placeholder)
            .count()
    }

    fn build(&self, kind: StatementKind, table: String, columns: Vec<Column>, criteria: Criteria) -> Statement {
        Statement {
            kind,
            table,
            columns,
            criteria,
            placeholder_count: self.placeholder_count(),
        }
    }

    fn parse_where(&mut self) -> DbResult<Criteria> {
        if *self.current_token() == Token::Where {
            self.advance();
            self.parse_criteria()
        } else {
            Ok(Criteria::default())
        }
    }

    fn parse_select(&mut self) -> DbResult<Statement> {
        self.expect(Token::Select)?;

        // `*` selects every field, declared columns stay empty
        let columns = if *self.current_token() == Token::Star {
            self.advance();
            Vec::new()
        } else {
            self.parse_select_columns()?
        };

        self.expect(Token::From)?;
        let table = self.expect_identifier()?;
        let criteria = self.parse_where()?;

        Ok(self.build(StatementKind::Select, table, columns, criteria))
    }

    fn parse_select_columns(&mut self) -> DbResult<Vec<Column>> {
        let mut columns = Vec::new();

        loop {
            let name = self.parse_column_name()?;
            let column = match self.parse_optional_alias()? {
                Some(alias) => Column::aliased(&name, &alias),
                None => Column::new(&name),
            };
            columns.push(column);

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_optional_alias(&mut self) -> DbResult<Option<String>> {
        match self.current_token() {
            Token::As => {
                self.advance();
                Ok(Some(self.expect_identifier()?))
            }
            Token::Identifier(_) => Ok(Some(self.expect_identifier()?)),
            _ => Ok(None),
        }
    }

    fn parse_insert(&mut self) -> DbResult<Statement> {
        self.expect(Token::Insert)?;
        self.expect(Token::Into)?;

        let table = self.expect_identifier()?;

        self.expect(Token::LeftParen)?;
        let mut names = vec![self.parse_column_name()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            names.push(self.parse_column_name()?);
        }
        self.expect(Token::RightParen)?;

        self.expect(Token::Values)?;
        self.expect(Token::LeftParen)?;
        let values = self.parse_operand_list()?;
        self.expect(Token::RightParen)?;

        if *self.current_token() == Token::Comma {
            return Err(DbError::ParseError(
                "Multi-row VALUES is not supported".to_string(),
            ));
        }
        if names.len() != values.len() {
            return Err(DbError::ParseError(format!(
                "INSERT into {} has {} columns but {} values",
                table,
                names.len(),
                values.len()
            )));
        }

        let columns = names
            .iter()
            .zip(values.iter())
            .map(|(name, value)| Column::assigned(name, value))
            .collect();

        Ok(self.build(StatementKind::Insert, table, columns, Criteria::default()))
    }

    fn parse_update(&mut self) -> DbResult<Statement> {
        self.expect(Token::Update)?;

        let table = self.expect_identifier()?;

        self.expect(Token::Set)?;

        let mut columns = Vec::new();
        loop {
            let name = self.parse_column_name()?;
            self.expect(Token::Equal)?;
            let value = self.parse_operand()?;
            columns.push(Column::assigned(&name, &value));

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        let criteria = self.parse_where()?;

        Ok(self.build(StatementKind::Update, table, columns, criteria))
    }

    fn parse_delete(&mut self) -> DbResult<Statement> {
        self.expect(Token::Delete)?;
        self.expect(Token::From)?;

        let table = self.expect_identifier()?;
        let criteria = self.parse_where()?;

        Ok(self.build(StatementKind::Delete, table, Vec::new(), criteria))
    }

    /// OR of AND groups
    fn parse_criteria(&mut self) -> DbResult<Criteria> {
        let first = self.parse_and_criteria()?;
        if *self.current_token() != Token::Or {
            return Ok(first);
        }

        let mut criteria = vec![into_criterion(first)];
        while *self.current_token() == Token::Or {
            self.advance();
            criteria.push(into_criterion(self.parse_and_criteria()?));
        }

        Ok(Criteria {
            criteria,
            logical_operator: Some("OR".to_string()),
        })
    }

    fn parse_and_criteria(&mut self) -> DbResult<Criteria> {
        let mut criteria = vec![self.parse_unary_criterion()?];
        while *self.current_token() == Token::And {
            self.advance();
            criteria.push(self.parse_unary_criterion()?);
        }

        Ok(Criteria {
            criteria,
            logical_operator: Some("AND".to_string()),
        })
    }

    fn parse_unary_criterion(&mut self) -> DbResult<Criterion> {
        match self.current_token() {
            Token::Not => {
                self.advance();
                match self.parse_unary_criterion()? {
                    Criterion::Condition(condition) => Ok(Criterion::Condition(condition.negated())),
                    Criterion::Group(_) => Err(DbError::ParseError(
                        "NOT applied to a group of conditions is not supported".to_string(),
                    )),
                }
            }
            Token::LeftParen => {
                self.advance();
                let criteria = self.parse_criteria()?;
                self.expect(Token::RightParen)?;
                Ok(into_criterion(criteria))
            }
            _ => self.parse_condition(),
        }
    }

    fn parse_condition(&mut self) -> DbResult<Criterion> {
        let left = self.parse_operand()?;

        let (operator, inverse) = match self.current_token() {
            Token::Not => {
                self.advance();
                if *self.current_token() != Token::In {
                    return Err(self.unexpected("IN after NOT"));
                }
                ("IN", true)
            }
            Token::In => ("IN", false),
            Token::Equal => ("=", false),
            Token::NotEqual => ("!=", false),
            Token::LessThan => ("<", false),
            Token::LessThanEq => ("<=", false),
            Token::GreaterThan => (">", false),
            Token::GreaterThanEq => (">=", false),
            _ => return Err(self.unexpected("comparison operator")),
        };
        self.advance();

        let right = if operator == "IN" {
            self.expect(Token::LeftParen)?;
            let items = self.parse_operand_list()?;
            self.expect(Token::RightParen)?;
            items.join(", ")
        } else {
            self.parse_operand()?
        };

        let mut condition = Condition::new(&left, operator, &right);
        condition.inverse = inverse;
        Ok(Criterion::Condition(condition))
    }

    fn parse_operand_list(&mut self) -> DbResult<Vec<String>> {
        let mut items = vec![self.parse_operand()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            items.push(self.parse_operand()?);
        }
        Ok(items)
    }

    /// Operand rendered back to SQL text: field name, `?`, number, `'text'`
    /// or boolean.
    fn parse_operand(&mut self) -> DbResult<String> {
        match self.current_token().clone() {
            Token::Identifier(_) => self.parse_column_name(),
            Token::Placeholder => {
                self.advance();
                Ok("?".to_string())
            }
            Token::Number(number) => {
                self.advance();
                Ok(number)
            }
            Token::Minus => {
                self.advance();
                match self.current_token().clone() {
                    Token::Number(number) => {
                        self.advance();
                        Ok(format!("-{}", number))
                    }
                    _ => Err(self.unexpected("number after '-'")),
                }
            }
            Token::String(text) => {
                self.advance();
                Ok(format!("'{}'", text.replace('\'', "''")))
            }
            Token::True => {
                self.advance();
                Ok("true".to_string())
            }
            Token::False => {
                self.advance();
                Ok("false".to_string())
            }
            _ => Err(self.unexpected("operand")),
        }
    }
}

fn into_criterion(mut criteria: Criteria) -> Criterion {
    if criteria.criteria.len() == 1 {
        criteria.criteria.remove(0)
    } else {
        Criterion::Group(criteria)
    }
}
