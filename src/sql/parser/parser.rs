use crate::common::Result;
use crate::errinput;
use crate::query::{FieldRef, Predicate, SortKey, SortOrder, TableValue, Term, TermOperand};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::sql::parser::statement::{
    CreateTableStmt, DeleteStmt, InsertStmt, SelectStmt, Statement, UpdateStmt,
};
use crate::types::{Constant, FieldType};

/// Recursive-descent parser over the token stream of a single statement.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn parse(input: &str) -> Result<Statement> {
        let mut parser = Parser {
            tokens: Lexer::tokens(input)?,
            pos: 0,
        };
        let statement = parser.parse_statement()?;
        parser.skip(&Token::Semicolon);
        if let Some(extra) = parser.peek() {
            return errinput!("unexpected trailing token {extra}");
        }
        Ok(statement)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token> {
        let Some(token) = self.tokens.get(self.pos) else {
            return errinput!("unexpected end of statement");
        };
        self.pos += 1;
        Ok(token.clone())
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.next()?;
        if token != expected {
            return errinput!("expected {expected}, found {token}");
        }
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        self.expect(Token::Keyword(keyword))
    }

    /// Consumes the token if it is next, reporting whether it was.
    fn skip(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn skip_keyword(&mut self, keyword: Keyword) -> bool {
        self.skip(&Token::Keyword(keyword))
    }

    fn ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            token => errinput!("expected identifier, found {token}"),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.next()? {
            Token::Keyword(Keyword::Create) => self.parse_create_table(),
            Token::Keyword(Keyword::Insert) => self.parse_insert(),
            Token::Keyword(Keyword::Select) => self.parse_select(),
            Token::Keyword(Keyword::Update) => self.parse_update(),
            Token::Keyword(Keyword::Delete) => self.parse_delete(),
            token => errinput!("unexpected token {token} at start of statement"),
        }
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Table)?;
        let table = self.ident()?;
        self.expect(Token::LeftParen)?;

        let mut columns = Vec::new();
        loop {
            let name = self.ident()?;
            let field_type = self.parse_column_type()?;
            columns.push((name, field_type));
            if !self.skip(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RightParen)?;
        Ok(Statement::CreateTable(CreateTableStmt { table, columns }))
    }

    fn parse_column_type(&mut self) -> Result<FieldType> {
        match self.next()? {
            Token::Keyword(Keyword::Int) => Ok(FieldType::Int),
            Token::Keyword(Keyword::Varchar) => {
                // the length bound is declarative; storage is self-describing
                if self.skip(&Token::LeftParen) {
                    self.parse_number()?;
                    self.expect(Token::RightParen)?;
                }
                Ok(FieldType::VarChar)
            }
            Token::Keyword(Keyword::Char) => {
                self.expect(Token::LeftParen)?;
                let len = self.parse_number()?;
                self.expect(Token::RightParen)?;
                Ok(FieldType::FixedChar(len as u16))
            }
            token => errinput!("expected column type, found {token}"),
        }
    }

    fn parse_number(&mut self) -> Result<i32> {
        match self.next()? {
            Token::Number(n) => Ok(n),
            token => errinput!("expected number, found {token}"),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Into)?;
        let table = self.ident()?;

        let mut columns = None;
        if self.skip(&Token::LeftParen) {
            let mut names = Vec::new();
            loop {
                names.push(self.ident()?);
                if !self.skip(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RightParen)?;
            columns = Some(names);
        }

        self.expect_keyword(Keyword::Values)?;
        let mut rows = Vec::new();
        loop {
            self.expect(Token::LeftParen)?;
            let mut row = Vec::new();
            loop {
                row.push(self.parse_literal()?);
                if !self.skip(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RightParen)?;
            rows.push(row);
            if !self.skip(&Token::Comma) {
                break;
            }
        }
        Ok(Statement::Insert(InsertStmt {
            table,
            columns,
            rows,
        }))
    }

    fn parse_literal(&mut self) -> Result<Constant> {
        match self.next()? {
            Token::Number(n) => Ok(Constant::Num(n)),
            Token::Str(s) => Ok(Constant::Str(s)),
            token => errinput!("expected literal, found {token}"),
        }
    }

    fn parse_select(&mut self) -> Result<Statement> {
        let mut fields = Vec::new();
        let star = self.skip(&Token::Star);
        if !star {
            loop {
                fields.push(self.parse_field_ref()?);
                if !self.skip(&Token::Comma) {
                    break;
                }
            }
        }

        self.expect_keyword(Keyword::From)?;
        let mut tables = vec![self.ident()?];
        let mut predicate: Option<Predicate> = None;

        // JOIN lowers to a cartesian product plus its ON condition
        while self.skip_keyword(Keyword::Join) {
            tables.push(self.ident()?);
            self.expect_keyword(Keyword::On)?;
            let condition = self.parse_predicate()?;
            predicate = Some(merge_and(predicate, condition));
        }

        if self.skip_keyword(Keyword::Where) {
            let filter = self.parse_predicate()?;
            predicate = Some(merge_and(predicate, filter));
        }

        let mut order_by = None;
        if self.skip_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            let field = self.parse_field_ref()?;
            let order = if self.skip_keyword(Keyword::Desc) {
                SortOrder::Descending
            } else {
                self.skip_keyword(Keyword::Asc);
                SortOrder::Ascending
            };
            order_by = Some(SortKey { field, order });
        }

        Ok(Statement::Select(SelectStmt {
            fields,
            star,
            tables,
            predicate,
            order_by,
        }))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        let table = self.ident()?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = Vec::new();
        loop {
            let target = self.parse_field_ref()?;
            self.expect(Token::Equal)?;
            let value = self.parse_table_value()?;
            assignments.push((target, value));
            if !self.skip(&Token::Comma) {
                break;
            }
        }

        let mut predicate = None;
        if self.skip_keyword(Keyword::Where) {
            predicate = Some(self.parse_predicate()?);
        }
        Ok(Statement::Update(UpdateStmt {
            table,
            assignments,
            predicate,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::From)?;
        let table = self.ident()?;

        let mut predicate = None;
        if self.skip_keyword(Keyword::Where) {
            predicate = Some(self.parse_predicate()?);
        }
        Ok(Statement::Delete(DeleteStmt { table, predicate }))
    }

    /// predicate := conjunction (OR conjunction)*
    fn parse_predicate(&mut self) -> Result<Predicate> {
        let mut lhs = self.parse_conjunction()?;
        while self.skip_keyword(Keyword::Or) {
            let rhs = self.parse_conjunction()?;
            lhs = Predicate::or(lhs, rhs);
        }
        Ok(lhs)
    }

    /// conjunction := factor (AND factor)*
    fn parse_conjunction(&mut self) -> Result<Predicate> {
        let mut lhs = self.parse_predicate_factor()?;
        while self.skip_keyword(Keyword::And) {
            let rhs = self.parse_predicate_factor()?;
            lhs = Predicate::and(lhs, rhs);
        }
        Ok(lhs)
    }

    /// factor := ( predicate ) | term
    fn parse_predicate_factor(&mut self) -> Result<Predicate> {
        if self.skip(&Token::LeftParen) {
            let inner = self.parse_predicate()?;
            self.expect(Token::RightParen)?;
            return Ok(inner);
        }
        Ok(Predicate::Term(self.parse_term()?))
    }

    /// term := value op value
    fn parse_term(&mut self) -> Result<Term> {
        let lhs = self.parse_table_value()?;
        let op = match self.next()? {
            Token::Equal => TermOperand::Equal,
            Token::NotEqual => TermOperand::NotEqual,
            Token::Greater => TermOperand::Greater,
            Token::GreaterEqual => TermOperand::GreaterEqual,
            Token::Less => TermOperand::Less,
            Token::LessEqual => TermOperand::LessEqual,
            token => return errinput!("expected comparison operator, found {token}"),
        };
        let rhs = self.parse_table_value()?;
        Ok(Term { op, lhs, rhs })
    }

    fn parse_table_value(&mut self) -> Result<TableValue> {
        match self.peek() {
            Some(Token::Ident(_)) => Ok(TableValue::Field(self.parse_field_ref()?)),
            _ => Ok(TableValue::Constant(self.parse_literal()?)),
        }
    }

    fn parse_field_ref(&mut self) -> Result<FieldRef> {
        let first = self.ident()?;
        if self.skip(&Token::Dot) {
            let name = self.ident()?;
            return Ok(FieldRef::new(first, name));
        }
        Ok(FieldRef::bare(first))
    }
}

fn merge_and(lhs: Option<Predicate>, rhs: Predicate) -> Predicate {
    match lhs {
        Some(lhs) => Predicate::and(lhs, rhs),
        None => rhs,
    }
}
