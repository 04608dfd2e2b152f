use crate::ast::*;
use crate::env::Environment;
use crate::error::{MicroError, Result};
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use tracing::{debug, info};

/// Runtime value. Comparisons and logical operators produce `Int(0)` / `Int(1)`;
/// only boolean literals produce `Bool`. Both compare by their integer form.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn as_int(self) -> i64 {
        match self {
            Value::Int(n) => n,
            Value::Bool(b) => b as i64,
        }
    }

    /// Any non-zero value is true
    pub fn to_bool(self) -> bool {
        self.as_int() != 0
    }

    fn from_bool(b: bool) -> Self {
        Value::Int(b as i64)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.as_int() == other.as_int()
    }
}

impl Eq for Value {}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        self.as_int() == *other
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Outcome of executing a statement. `Return` travels up through blocks and
/// loops untouched and is only consumed by `call_function`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlFlow {
    Normal,
    Return(Value),
}

/// Tree-walking evaluator. `print` output goes to `W`.
pub struct Interpreter<W: Write = io::Stdout> {
    pub functions: HashMap<String, Rc<FunDecl>>,
    env: Environment<Value>,
    out: W,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(out: W) -> Self {
        Interpreter {
            functions: HashMap::new(),
            env: Environment::new(),
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Global variables and their current values, sorted by name.
    pub fn globals(&self) -> Vec<(&str, Value)> {
        self.env
            .bindings(self.env.global())
            .into_iter()
            .map(|(name, value)| (name, *value))
            .collect()
    }

    /// Register functions, then evaluate global initializers in order.
    pub fn load(&mut self, program: &Program) -> Result<()> {
        for func in program.functions() {
            self.functions
                .insert(func.name.clone(), Rc::new(func.clone()));
        }
        for var in program.globals() {
            self.declare(var)?;
        }
        Ok(())
    }

    pub fn run(&mut self, program: &Program) -> Result<Value> {
        self.load(program)?;
        info!(functions = self.functions.len(), "running main");
        let result = self.call_function("main", vec![])?;
        info!(%result, "main returned");
        Ok(result)
    }

    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let func = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| MicroError::UndefinedFunction(name.to_string()))?;
        if args.len() != func.params.len() {
            return Err(MicroError::ArgumentCount {
                name: name.to_string(),
                expected: func.params.len(),
                got: args.len(),
            });
        }
        debug!(function = name, args = args.len(), "call");

        // Callees see globals, never the caller's locals
        let scope = self.env.enter(self.env.global());
        for (param, value) in func.params.iter().zip(args) {
            self.env.set(&param.name, value);
        }
        let flow = self.exec_stmts(&func.body.statements);
        self.env.leave(scope);

        match flow? {
            ControlFlow::Return(value) => Ok(value),
            ControlFlow::Normal => Ok(Value::Int(0)),
        }
    }

    fn declare(&mut self, var: &VarDecl) -> Result<()> {
        let value = match &var.init {
            Some(expr) => self.eval_expr(expr)?,
            None => Value::Int(0),
        };
        self.env.set(&var.name, value);
        Ok(())
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<ControlFlow> {
        for stmt in stmts {
            if let ControlFlow::Return(v) = self.exec_stmt(stmt)? {
                return Ok(ControlFlow::Return(v));
            }
        }
        Ok(ControlFlow::Normal)
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt) -> Result<ControlFlow> {
        match stmt {
            Stmt::VarDecl(var) => {
                self.declare(var)?;
                Ok(ControlFlow::Normal)
            }
            Stmt::Block(block) => {
                let scope = self.env.enter_child();
                let flow = self.exec_stmts(&block.statements);
                self.env.leave(scope);
                flow
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(ControlFlow::Normal)
            }
            Stmt::If(cond, then_branch, else_branch) => {
                if self.eval_expr(cond)?.to_bool() {
                    self.exec_stmt(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }
            Stmt::While(cond, body) => {
                while self.eval_expr(cond)?.to_bool() {
                    if let ControlFlow::Return(v) = self.exec_stmt(body)? {
                        return Ok(ControlFlow::Return(v));
                    }
                }
                Ok(ControlFlow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Int(0),
                };
                Ok(ControlFlow::Return(value))
            }
        }
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::IntLit(n) => Ok(Value::Int(*n)),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => self.env.get(name).copied(),
            Expr::Assign(name, value_expr) => {
                let value = self.eval_expr(value_expr)?;
                self.env.update(name, value)?;
                Ok(value)
            }
            Expr::BinOp(left, op, right) => {
                // Both sides are evaluated, && and || included
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                eval_binop(l, *op, r)
            }
            Expr::UnaryOp(op, operand) => {
                let v = self.eval_expr(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Int(v.as_int().wrapping_neg()),
                    UnaryOp::Plus => Value::Int(v.as_int()),
                    UnaryOp::Not => Value::from_bool(!v.to_bool()),
                })
            }
            Expr::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| self.eval_expr(a))
                    .collect::<Result<Vec<_>>>()?;
                self.call_function(name, values)
            }
            Expr::Print(inner) => {
                let value = self.eval_expr(inner)?;
                writeln!(self.out, "{}", value)?;
                Ok(value)
            }
        }
    }
}

/// Integer division rounding toward negative infinity.
fn floor_div(l: i64, r: i64) -> Result<i64> {
    if r == 0 {
        return Err(MicroError::DivisionByZero);
    }
    let q = l.wrapping_div(r);
    if l.wrapping_rem(r) != 0 && ((l < 0) != (r < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn eval_binop(left: Value, op: BinOp, right: Value) -> Result<Value> {
    let l = left.as_int();
    let r = right.as_int();

    match op {
        BinOp::Add => Ok(Value::Int(l.wrapping_add(r))),
        BinOp::Sub => Ok(Value::Int(l.wrapping_sub(r))),
        BinOp::Mul => Ok(Value::Int(l.wrapping_mul(r))),
        BinOp::Div => floor_div(l, r).map(Value::Int),
        BinOp::Eq => Ok(Value::from_bool(l == r)),
        BinOp::Ne => Ok(Value::from_bool(l != r)),
        BinOp::Lt => Ok(Value::from_bool(l < r)),
        BinOp::Gt => Ok(Value::from_bool(l > r)),
        BinOp::Le => Ok(Value::from_bool(l <= r)),
        BinOp::Ge => Ok(Value::from_bool(l >= r)),
        BinOp::And => Ok(Value::from_bool(left.to_bool() && right.to_bool())),
        BinOp::Or => Ok(Value::from_bool(left.to_bool() || right.to_bool())),
    }
}

/// Evaluate `program` from `main`, printing to stdout.
pub fn run_program(program: &Program) -> Result<Value> {
    Interpreter::new().run(program)
}
