use crate::traits::{DynamicalSystem, Scalar};
use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while turning text into bytecode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquationError {
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },
    #[error("Invalid number literal: {0}")]
    InvalidNumber(String),
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Expected ')'")]
    UnclosedParen,
    #[error("Unknown variable or parameter: {0}")]
    UnknownSymbol(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Expected {expected} values for {what}, got {got}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Built-in one-argument functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    /// Natural logarithm; `ln` and `log` are aliases.
    Ln,
    Sqrt,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            _ => return None,
        })
    }

    fn apply<T: Scalar>(self, a: T) -> T {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Sqrt => a.sqrt(),
            Function::Abs => a.abs(),
        }
    }
}

/// OpCodes for the stack-based virtual machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    LoadConst(f64),
    /// State variable by index, in declaration order.
    LoadVar(usize),
    LoadParam(usize),
    /// Current time `t`.
    LoadTime,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Call(Function),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stateless evaluator; the caller owns the stack buffer so repeated
/// evaluation does not allocate.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(
        bytecode: &Bytecode,
        t: T,
        vars: &[T],
        params: &[T],
        stack: &mut Vec<T>,
    ) -> T {
        stack.clear();
        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(T::from_f64(val).unwrap_or_else(T::nan)),
                OpCode::LoadVar(idx) => stack.push(vars[idx]),
                OpCode::LoadParam(idx) => stack.push(params[idx]),
                OpCode::LoadTime => stack.push(t),
                OpCode::Neg => {
                    let a = pop(stack);
                    stack.push(-a);
                }
                OpCode::Call(func) => {
                    let a = pop(stack);
                    stack.push(func.apply(a));
                }
                binary => {
                    let b = pop(stack);
                    let a = pop(stack);
                    stack.push(match binary {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a.powf(b),
                    });
                }
            }
        }
        pop(stack)
    }
}

// Compiled bytecode is always balanced; NaN marks a malformed program.
fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
    stack.pop().unwrap_or_else(T::nan)
}

// --- AST & Parser ---

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>), // + - * / ^
    Neg(Box<Expr>),
    Call(String, Box<Expr>),
}

/// Resolves names to indices. `t` refers to time unless it is declared as a
/// variable or parameter.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String], param_names: &[String]) -> Self {
        let index = |names: &[String]| -> HashMap<String, usize> {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect()
        };
        Self {
            var_map: index(var_names),
            param_map: index(param_names),
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, EquationError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), EquationError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                let op = if let Some(&idx) = self.var_map.get(name) {
                    OpCode::LoadVar(idx)
                } else if let Some(&idx) = self.param_map.get(name) {
                    OpCode::LoadParam(idx)
                } else if name == "t" {
                    OpCode::LoadTime
                } else {
                    return Err(EquationError::UnknownSymbol(name.clone()));
                };
                ops.push(op);
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    other => return Err(EquationError::UnexpectedToken(other.to_string())),
                });
            }
            Expr::Neg(operand) => {
                self.compile_recursive(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(func, arg) => {
                let function = Function::from_name(func)
                    .ok_or_else(|| EquationError::UnknownFunction(func.clone()))?;
                self.compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(function));
            }
        }
        Ok(())
    }
}

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr, EquationError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.consume() {
        None => Ok(expr),
        Some(token) => Err(EquationError::UnexpectedToken(format!("{token:?}"))),
    }
}

/// Parses and compiles in one go.
pub fn compile_expression(
    input: &str,
    var_names: &[String],
    param_names: &[String],
) -> Result<Bytecode, EquationError> {
    let expr = parse(input)?;
    Compiler::new(var_names, param_names).compile(&expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EquationError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            while let Some(&(_, d)) = chars.peek() {
                let exponent_sign = (d == '+' || d == '-') && literal.ends_with(['e', 'E']);
                if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                    literal.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = literal
                .parse()
                .map_err(|_| EquationError::InvalidNumber(literal.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => return Err(EquationError::UnexpectedCharacter { ch: c, pos }),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_rparen(&mut self) -> Result<(), EquationError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(EquationError::UnclosedParen),
        }
    }

    // expression := term (('+' | '-') term)*
    fn parse_expression(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => '+',
                Some(Token::Minus) => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // term := unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => '*',
                Some(Token::Slash) => '/',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // unary := '-' unary | power
    fn parse_unary(&mut self) -> Result<Expr, EquationError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power := primary ('^' unary)?, right associative
    fn parse_power(&mut self) -> Result<Expr, EquationError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, EquationError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_expression()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(token) => Err(EquationError::UnexpectedToken(format!("{token:?}"))),
            None => Err(EquationError::UnexpectedEnd),
        }
    }
}

// --- EquationSystem ---

/// `DynamicalSystem` backed by one compiled expression per state variable.
pub struct EquationSystem<T: Scalar> {
    pub equations: Vec<Bytecode>,
    pub params: Vec<T>,
    // Reused VM stack; makes the system !Sync.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> EquationSystem<T> {
    pub fn new(equations: Vec<Bytecode>, params: Vec<T>) -> Self {
        Self {
            equations,
            params,
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }

    /// Compiles `equations[i]` as the derivative of `var_names[i]`.
    pub fn from_strings(
        equations: &[String],
        var_names: &[String],
        param_names: &[String],
        params: Vec<T>,
    ) -> Result<Self, EquationError> {
        if equations.len() != var_names.len() {
            return Err(EquationError::CountMismatch {
                what: "equations",
                expected: var_names.len(),
                got: equations.len(),
            });
        }
        if params.len() != param_names.len() {
            return Err(EquationError::CountMismatch {
                what: "parameters",
                expected: param_names.len(),
                got: params.len(),
            });
        }
        let compiler = Compiler::new(var_names, param_names);
        let bytecodes = equations
            .iter()
            .map(|eq| parse(eq).and_then(|expr| compiler.compile(&expr)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(bytecodes, params))
    }
}

impl<T: Scalar> DynamicalSystem<T> for EquationSystem<T> {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        let mut stack = self.stack.borrow_mut();
        for (i, eq) in self.equations.iter().enumerate() {
            out[i] = VM::execute(eq, t, x, &self.params, &mut stack);
        }
    }
}
