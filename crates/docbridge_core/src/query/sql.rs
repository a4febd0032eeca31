//! SQL subset parser.
//!
//! Supported statements:
//!
//! ```text
//! SELECT * | COUNT(*) | field[, ...] FROM ns [WHERE cond]
//!        [ORDER BY field [ASC|DESC][, ...]] [LIMIT n] [OFFSET n]
//! UPDATE ns SET field = literal[, ...] [WHERE cond]
//! UPDATE ns DROP field[, ...] [WHERE cond]
//! DELETE FROM ns [WHERE cond]
//! ```
//!
//! Keywords are case-insensitive. A double-quoted token is an identifier
//! where a field is expected and a string where a literal is expected.

use super::{Condition, CondOp, Projection, Query, SortEntry, Statement, UpdateAction, UpdateQuery};
use crate::error::{CoreError, CoreResult};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Quoted(String),
    Str(String),
    Int(i64),
    Float(f64),
    Star,
    Comma,
    LParen,
    RParen,
    Semicolon,
    Op(CondOp),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '+')
}

fn tokenize(sql: &str) -> CoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let tok = match c {
            '*' => {
                chars.next();
                Tok::Star
            }
            ',' => {
                chars.next();
                Tok::Comma
            }
            '(' => {
                chars.next();
                Tok::LParen
            }
            ')' => {
                chars.next();
                Tok::RParen
            }
            ';' => {
                chars.next();
                Tok::Semicolon
            }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                }
                Tok::Op(CondOp::Eq)
            }
            '!' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => Tok::Op(CondOp::Ne),
                    _ => return Err(CoreError::query_parse(pos, "expected '=' after '!'")),
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some((_, '=')) => {
                        chars.next();
                        Tok::Op(CondOp::Le)
                    }
                    Some((_, '>')) => {
                        chars.next();
                        Tok::Op(CondOp::Ne)
                    }
                    _ => Tok::Op(CondOp::Lt),
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    Tok::Op(CondOp::Ge)
                } else {
                    Tok::Op(CondOp::Gt)
                }
            }
            '\'' | '"' => {
                chars.next();
                let quote = c;
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    if ch == quote {
                        // A doubled quote stands for itself.
                        if matches!(chars.peek(), Some((_, next)) if *next == quote) {
                            chars.next();
                            text.push(quote);
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    text.push(ch);
                }
                if !closed {
                    return Err(CoreError::query_parse(pos, "unterminated quoted text"));
                }
                if quote == '\'' {
                    Tok::Str(text)
                } else {
                    Tok::Quoted(text)
                }
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut end = pos + c.len_utf8();
                chars.next();
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E') {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else if matches!(ch, '+' | '-')
                        && matches!(sql[..i].chars().last(), Some('e' | 'E'))
                    {
                        end = i + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                number_token(&sql[pos..end], pos)?
            }
            c if is_ident_start(c) => {
                let mut end = pos;
                while let Some(&(i, ch)) = chars.peek() {
                    if is_ident_char(ch) {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                Tok::Ident(sql[pos..end].to_owned())
            }
            other => {
                return Err(CoreError::query_parse(
                    pos,
                    format!("unexpected character {other:?}"),
                ))
            }
        };
        tokens.push(Token { tok, pos });
    }

    Ok(tokens)
}

fn number_token(text: &str, pos: usize) -> CoreResult<Tok> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Tok::Int(i));
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Tok::Float(f)),
        _ => Err(CoreError::query_parse(pos, format!("invalid number {text:?}"))),
    }
}

/// Deepest nesting of parentheses, `NOT` and tuple literals.
pub const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
}

/// Compiles a SQL statement.
pub fn parse(sql: &str) -> CoreResult<Statement> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
        end: sql.len(),
        depth: 0,
    };
    let statement = parser.statement()?;
    parser.eat(&Tok::Semicolon);
    if let Some(token) = parser.peek() {
        return Err(CoreError::query_parse(
            token.pos,
            "unexpected token after end of statement",
        ));
    }
    Ok(statement)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.pos)
    }

    fn error<T>(&self, message: impl Into<String>) -> CoreResult<T> {
        Err(CoreError::query_parse(self.position(), message))
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek().is_some_and(|t| &t.tok == tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> CoreResult<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            self.error(format!("expected {what}"))
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> CoreResult<T>) -> CoreResult<T> {
        if self.depth >= MAX_NESTING {
            return self.error(format!("nesting deeper than {MAX_NESTING} levels"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token { tok: Tok::Ident(word), .. }) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> CoreResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.error(format!("expected {keyword}"))
        }
    }

    fn statement(&mut self) -> CoreResult<Statement> {
        if self.eat_keyword("SELECT") {
            self.select().map(Statement::Select)
        } else if self.eat_keyword("UPDATE") {
            self.update().map(Statement::Update)
        } else if self.eat_keyword("DELETE") {
            self.delete().map(Statement::Delete)
        } else {
            self.error("expected SELECT, UPDATE or DELETE")
        }
    }

    fn select(&mut self) -> CoreResult<Query> {
        let projection = if self.eat(&Tok::Star) {
            Projection::All
        } else if self.peek_keyword("COUNT")
            && matches!(self.tokens.get(self.pos + 1), Some(Token { tok: Tok::LParen, .. }))
        {
            self.pos += 2;
            self.expect(&Tok::Star, "'*' in COUNT(*)")?;
            self.expect(&Tok::RParen, "')'")?;
            Projection::Count
        } else {
            Projection::Fields(self.field_list()?)
        };

        self.expect_keyword("FROM")?;
        let mut query = Query::new(self.namespace()?);
        query.projection = projection;
        query.filter = self.where_clause()?;

        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let field = self.field()?;
                let desc = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                query.sort.push(SortEntry { field, desc });
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }

        loop {
            if self.eat_keyword("LIMIT") {
                query.limit = Some(self.unsigned("LIMIT")?);
            } else if self.eat_keyword("OFFSET") {
                query.offset = self.unsigned("OFFSET")?;
            } else {
                break;
            }
        }

        Ok(query)
    }

    fn update(&mut self) -> CoreResult<UpdateQuery> {
        let namespace = self.namespace()?;
        let action = if self.eat_keyword("SET") {
            let mut assignments = Vec::new();
            loop {
                let field = self.field()?;
                self.expect(&Tok::Op(CondOp::Eq), "'='")?;
                let value = self.literal()?;
                assignments.push((field, value));
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            UpdateAction::Set(assignments)
        } else if self.eat_keyword("DROP") {
            UpdateAction::Drop(self.field_list()?)
        } else {
            return self.error("expected SET or DROP");
        };
        let filter = self.where_clause()?;
        Ok(UpdateQuery {
            namespace,
            action,
            filter,
        })
    }

    fn delete(&mut self) -> CoreResult<Query> {
        self.expect_keyword("FROM")?;
        let mut query = Query::new(self.namespace()?);
        query.filter = self.where_clause()?;
        Ok(query)
    }

    fn where_clause(&mut self) -> CoreResult<Option<Condition>> {
        if self.eat_keyword("WHERE") {
            self.or_condition().map(Some)
        } else {
            Ok(None)
        }
    }

    fn namespace(&mut self) -> CoreResult<String> {
        match self.peek() {
            Some(Token {
                tok: Tok::Ident(name) | Tok::Quoted(name),
                ..
            }) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => self.error("expected namespace name"),
        }
    }

    fn field(&mut self) -> CoreResult<String> {
        match self.peek() {
            Some(Token {
                tok: Tok::Ident(name) | Tok::Quoted(name),
                ..
            }) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => self.error("expected field name"),
        }
    }

    fn field_list(&mut self) -> CoreResult<Vec<String>> {
        let mut fields = vec![self.field()?];
        while self.eat(&Tok::Comma) {
            fields.push(self.field()?);
        }
        Ok(fields)
    }

    fn unsigned(&mut self, clause: &str) -> CoreResult<usize> {
        match self.peek() {
            Some(Token { tok: Tok::Int(n), .. }) if *n >= 0 => {
                let n = usize::try_from(*n).unwrap_or(usize::MAX);
                self.pos += 1;
                Ok(n)
            }
            _ => self.error(format!("expected non-negative integer after {clause}")),
        }
    }

    fn or_condition(&mut self) -> CoreResult<Condition> {
        let mut condition = self.and_condition()?;
        while self.eat_keyword("OR") {
            condition = condition.or(self.and_condition()?);
        }
        Ok(condition)
    }

    fn and_condition(&mut self) -> CoreResult<Condition> {
        let mut condition = self.not_condition()?;
        while self.eat_keyword("AND") {
            condition = condition.and(self.not_condition()?);
        }
        Ok(condition)
    }

    fn not_condition(&mut self) -> CoreResult<Condition> {
        if self.eat_keyword("NOT") {
            return self.nested(|p| Ok(p.not_condition()?.not()));
        }
        if self.eat(&Tok::LParen) {
            return self.nested(|p| {
                let condition = p.or_condition()?;
                p.expect(&Tok::RParen, "')'")?;
                Ok(condition)
            });
        }
        self.predicate()
    }

    fn predicate(&mut self) -> CoreResult<Condition> {
        let field = self.field()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Condition::is_null(field, negated));
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("IN") {
            self.expect(&Tok::LParen, "'(' after IN")?;
            let mut values = Vec::new();
            if !self.eat(&Tok::RParen) {
                loop {
                    values.push(self.literal()?);
                    if self.eat(&Tok::Comma) {
                        continue;
                    }
                    self.expect(&Tok::RParen, "')'")?;
                    break;
                }
            }
            let condition = Condition::in_list(field, values);
            return Ok(if negated { condition.not() } else { condition });
        }
        if negated {
            return self.error("expected IN after NOT");
        }

        match self.peek() {
            Some(Token { tok: Tok::Op(op), .. }) => {
                let op = *op;
                self.pos += 1;
                let value = self.literal()?;
                Ok(Condition::compare(field, op, value))
            }
            _ => self.error("expected comparison operator"),
        }
    }

    fn literal(&mut self) -> CoreResult<Value> {
        let Some(token) = self.next() else {
            return self.error("expected literal");
        };
        match token.tok {
            Tok::Int(i) => Ok(Value::from(i)),
            Tok::Float(f) => Ok(Value::from(f)),
            Tok::Str(s) | Tok::Quoted(s) => Ok(Value::String(s)),
            Tok::Ident(word) if word.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Tok::Ident(word) if word.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            Tok::Ident(word) if word.eq_ignore_ascii_case("null") => Ok(Value::Null),
            Tok::LParen => self.nested(|p| {
                let mut parts = vec![p.literal()?];
                while p.eat(&Tok::Comma) {
                    parts.push(p.literal()?);
                }
                p.expect(&Tok::RParen, "')'")?;
                Ok(Value::Array(parts))
            }),
            _ => Err(CoreError::query_parse(token.pos, "expected literal")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn select(sql: &str) -> Query {
        match parse(sql).unwrap() {
            Statement::Select(query) => query,
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn select_star() {
        let query = select("select * from items");
        assert_eq!(query, Query::new("items"));
    }

    #[test]
    fn select_full() {
        let query = select(
            "SELECT id, name FROM items WHERE age >= 18 AND name != 'bob' \
             ORDER BY age DESC, name LIMIT 5 OFFSET 10;",
        );
        assert_eq!(
            query.projection,
            Projection::Fields(vec!["id".into(), "name".into()])
        );
        assert_eq!(
            query.filter,
            Some(
                Condition::compare("age", CondOp::Ge, json!(18))
                    .and(Condition::compare("name", CondOp::Ne, json!("bob")))
            )
        );
        assert_eq!(
            query.sort,
            vec![
                SortEntry {
                    field: "age".into(),
                    desc: true
                },
                SortEntry {
                    field: "name".into(),
                    desc: false
                },
            ]
        );
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, 10);
    }

    #[test]
    fn count_star() {
        assert_eq!(select("SELECT COUNT(*) FROM items").projection, Projection::Count);
        // a field called count is still a field
        assert_eq!(
            select("SELECT count FROM items").projection,
            Projection::Fields(vec!["count".into()])
        );
    }

    #[test]
    fn precedence_and_not() {
        let query = select("SELECT * FROM t WHERE a = 1 OR b = 2 AND NOT (c < 3.5)");
        let expected = Condition::eq("a", json!(1)).or(Condition::eq("b", json!(2))
            .and(Condition::compare("c", CondOp::Lt, json!(3.5)).not()));
        assert_eq!(query.filter, Some(expected));
    }

    #[test]
    fn in_and_null_predicates() {
        let query = select("SELECT * FROM t WHERE id IN (1, 2, -3) AND x IS NOT NULL AND y NOT IN ('a')");
        let expected = Condition::in_list("id", vec![json!(1), json!(2), json!(-3)])
            .and(Condition::is_null("x", true))
            .and(Condition::in_list("y", vec![json!("a")]).not());
        assert_eq!(query.filter, Some(expected));
    }

    #[test]
    fn quoted_identifiers_and_tuples() {
        let query = select(r#"SELECT * FROM items WHERE "id+fk_id" = (1, "x") AND flag == true"#);
        let expected = Condition::eq("id+fk_id", json!([1, "x"]))
            .and(Condition::eq("flag", json!(true)));
        assert_eq!(query.filter, Some(expected));
    }

    #[test]
    fn escaped_quotes() {
        let query = select("SELECT * FROM t WHERE name = 'it''s'");
        assert_eq!(query.filter, Some(Condition::eq("name", json!("it's"))));
    }

    #[test]
    fn update_statements() {
        match parse("UPDATE items SET name = 'x', meta.n = 2 WHERE id = 1").unwrap() {
            Statement::Update(update) => {
                assert_eq!(update.namespace, "items");
                assert_eq!(
                    update.action,
                    UpdateAction::Set(vec![
                        ("name".into(), json!("x")),
                        ("meta.n".into(), json!(2))
                    ])
                );
                assert_eq!(update.filter, Some(Condition::eq("id", json!(1))));
            }
            other => panic!("unexpected {other:?}"),
        }

        match parse("update items drop a, b").unwrap() {
            Statement::Update(update) => {
                assert_eq!(update.action, UpdateAction::Drop(vec!["a".into(), "b".into()]));
                assert_eq!(update.filter, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn delete_statement() {
        match parse("DELETE FROM items WHERE id > 3").unwrap() {
            Statement::Delete(query) => {
                assert_eq!(query.namespace, "items");
                assert_eq!(
                    query.filter,
                    Some(Condition::compare("id", CondOp::Gt, json!(3)))
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn errors_carry_positions() {
        let cases = [
            ("SELEC * FROM t", 0),
            ("SELECT * FROM", 13),
            ("SELECT * FROM t WHERE", 21),
            ("SELECT * FROM t WHERE a ~ 1", 24),
            ("SELECT * FROM t LIMIT -1", 22),
            ("SELECT * FROM t WHERE a = 'x", 26),
            ("SELECT * FROM t extra", 16),
        ];
        for (sql, position) in cases {
            match parse(sql) {
                Err(CoreError::QueryParse { position: got, .. }) => {
                    assert_eq!(got, position, "{sql}");
                }
                other => panic!("{sql}: unexpected {other:?}"),
            }
        }
    }

    fn nested_parens(depth: usize) -> String {
        format!(
            "SELECT * FROM t WHERE {}a = 1{}",
            "(".repeat(depth),
            ")".repeat(depth)
        )
    }

    #[test]
    fn nesting_up_to_the_limit_parses() {
        assert_eq!(
            select(&nested_parens(MAX_NESTING)).filter,
            Some(Condition::eq("a", json!(1)))
        );
        let nots = "NOT ".repeat(MAX_NESTING);
        assert!(parse(&format!("SELECT * FROM t WHERE {nots}a = 1")).is_ok());
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let deep_not = format!("SELECT * FROM t WHERE {}a = 1", "NOT ".repeat(100_000));
        let deep_tuple = format!(
            "SELECT * FROM t WHERE a = {}1{}",
            "(".repeat(100_000),
            ")".repeat(100_000)
        );
        for sql in [nested_parens(MAX_NESTING + 1), nested_parens(100_000), deep_not, deep_tuple] {
            assert!(
                matches!(parse(&sql), Err(CoreError::QueryParse { .. })),
                "{}",
                &sql[..40]
            );
        }
    }

    #[test]
    fn long_chains_stay_flat() {
        let terms: Vec<String> = (0..50_000).map(|i| format!("a = {i}")).collect();
        let query = select(&format!("SELECT * FROM t WHERE {}", terms.join(" OR ")));
        match query.filter {
            Some(Condition::Or(terms)) => assert_eq!(terms.len(), 50_000),
            other => panic!("unexpected {other:?}"),
        }
        let query = select(&format!("SELECT * FROM t WHERE {}", terms.join(" AND ")));
        assert!(matches!(query.filter, Some(Condition::And(ref terms)) if terms.len() == 50_000));
    }

    proptest! {
        #[test]
        fn never_panics(sql in "\\PC{0,64}") {
            let _ = parse(&sql);
        }

        #[test]
        fn integer_literals_round_trip(n in any::<i64>()) {
            let query = select(&format!("SELECT * FROM t WHERE a = {n}"));
            prop_assert_eq!(query.filter, Some(Condition::eq("a", json!(n))));
        }
    }
}
