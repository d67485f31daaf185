//! Arithmetic calculator.
//!
//! Expressions are tokenised and parsed by a small recursive-descent parser.
//! Only numbers, parentheses, `+ - * /`, `^` (or `**`) and unary minus are
//! accepted; nothing is ever handed to a general evaluator.

use agent_core::tools::{Tool, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_EXPRESSION_LEN: usize = 1024;
const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let current = chars[index];
        match current {
            c if c.is_whitespace() => index += 1,
            '0'..='9' | '.' => {
                let start = index;
                while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
                    index += 1;
                }
                let literal: String = chars[start..index].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| {
                    ToolError::InvalidExpression(format!("invalid number '{literal}'"))
                })?;
                tokens.push(Token::Number(value));
            }
            '+' => {
                tokens.push(Token::Plus);
                index += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                index += 1;
            }
            '*' if chars.get(index + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                index += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                index += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                index += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                index += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                index += 1;
            }
            other => {
                return Err(ToolError::InvalidExpression(format!(
                    "unsupported character '{other}'"
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

// expr    := term (('+' | '-') term)*
// term    := unary (('*' | '/') unary)*
// unary   := '-' unary | power
// power   := primary ('^' unary)?
// primary := number | '(' expr ')'
impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        self.position += 1;
        token
    }

    fn descend(&mut self) -> Result<(), ToolError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ToolError::InvalidExpression(format!(
                "expression nests deeper than {MAX_NESTING} levels"
            )));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        while let Some(token @ (Token::Plus | Token::Minus)) = self.peek() {
            self.advance();
            let rhs = self.term()?;
            value = if token == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.unary()?;
        while let Some(token @ (Token::Star | Token::Slash)) = self.peek() {
            self.advance();
            let rhs = self.unary()?;
            value = if token == Token::Star {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(ToolError::DivisionByZero);
                }
                value / rhs
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, ToolError> {
        self.descend()?;
        let value = if self.peek() == Some(Token::Minus) {
            self.advance();
            self.unary().map(|value| -value)
        } else {
            self.power()
        };
        self.depth -= 1;
        value
    }

    fn power(&mut self) -> Result<f64, ToolError> {
        let base = self.primary()?;
        if self.peek() != Some(Token::Caret) {
            return Ok(base);
        }
        self.advance();
        let exponent = self.unary()?;
        if base == 0.0 && exponent < 0.0 {
            return Err(ToolError::DivisionByZero);
        }
        Ok(base.powf(exponent))
    }

    fn primary(&mut self) -> Result<f64, ToolError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                self.descend()?;
                let value = self.expression()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ToolError::InvalidExpression("missing ')'".to_string())),
                }
            }
            Some(token) => Err(ToolError::InvalidExpression(format!(
                "unexpected token {token:?}"
            ))),
            None => Err(ToolError::InvalidExpression(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, ToolError> {
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(ToolError::InvalidExpression(format!(
            "expression longer than {MAX_EXPRESSION_LEN} characters"
        )));
    }

    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ToolError::InvalidExpression("empty expression".to_string()));
    }

    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
    };
    let value = parser.expression()?;

    if parser.position < parser.tokens.len() {
        return Err(ToolError::InvalidExpression(format!(
            "unexpected trailing input in '{expression}'"
        )));
    }
    if !value.is_finite() {
        return Err(ToolError::InvalidExpression(format!(
            "'{expression}' does not evaluate to a finite number"
        )));
    }

    Ok(value)
}

#[derive(Debug, Deserialize)]
struct CalculateArgs {
    expression: String,
}

pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports +, -, *, /, ^ (power), parentheses and unary minus."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Expression to evaluate, e.g. \"2 + 2\" or \"(3 ^ 2) / 4\""
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: CalculateArgs = serde_json::from_value(args)
            .map_err(|error| ToolError::InvalidArguments(error.to_string()))?;

        let result = evaluate(&args.expression)?;
        Ok(json!({
            "expression": args.expression,
            "result": result,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_basic_arithmetic() {
        assert_eq!(evaluate("2 + 2"), Ok(4.0));
        assert_eq!(evaluate("10 * 5 - 3"), Ok(47.0));
        assert_eq!(evaluate("10 / 2"), Ok(5.0));
        assert_eq!(evaluate("2 ^ 3"), Ok(8.0));
        assert_eq!(evaluate("2 ** 3"), Ok(8.0));
    }

    #[test]
    fn respects_precedence_and_associativity() {
        assert_eq!(evaluate("2 + 3 * 4"), Ok(14.0));
        assert_eq!(evaluate("(2 + 3) * 4"), Ok(20.0));
        assert_eq!(evaluate("2 ^ 3 ^ 2"), Ok(512.0));
        assert_eq!(evaluate("-2 ^ 2"), Ok(-4.0));
        assert_eq!(evaluate("2 ^ -1"), Ok(0.5));
        assert_eq!(evaluate("10 - 4 - 3"), Ok(3.0));
        assert_eq!(evaluate("--3"), Ok(3.0));
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(evaluate("5 / 0"), Err(ToolError::DivisionByZero));
        assert_eq!(evaluate("0 ^ -1"), Err(ToolError::DivisionByZero));
    }

    #[test]
    fn rejects_malformed_expressions() {
        for input in ["2 +", "", "(1 + 2", "1 2", "abs(2)", "1.2.3", "2 % 3", "+2"] {
            assert!(
                matches!(evaluate(input), Err(ToolError::InvalidExpression(_))),
                "expected InvalidExpression for {input:?}"
            );
        }
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let nested = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(evaluate(&nested), Err(ToolError::InvalidExpression(_))));

        let negations = format!("{}1", "-".repeat(500));
        assert!(matches!(evaluate(&negations), Err(ToolError::InvalidExpression(_))));

        let too_deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(evaluate(&too_deep), Err(ToolError::InvalidExpression(_))));
    }

    #[test]
    fn moderate_nesting_still_evaluates() {
        let nested = format!("{}2{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(evaluate(&nested), Ok(2.0));
        assert_eq!(evaluate(&format!("{}3", "-".repeat(10))), Ok(3.0));
    }

    #[tokio::test]
    async fn nested_input_through_the_tool_is_an_error() {
        let expression = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let error = CalculatorTool::new()
            .execute(json!({ "expression": expression }))
            .await
            .unwrap_err();

        assert!(matches!(error, ToolError::InvalidExpression(_)));
    }

    #[tokio::test]
    async fn tool_echoes_expression() {
        let output = CalculatorTool::new()
            .execute(json!({"expression": "2 + 2"}))
            .await
            .unwrap();

        assert_eq!(output, json!({"expression": "2 + 2", "result": 4.0}));
    }
}
