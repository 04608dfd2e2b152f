use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    Void, // Only legal as a function return type
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    IntLit(i64),
    BoolLit(bool),

    // Variable access
    Var(String),

    // name = value, yields the assigned value
    Assign(String, Box<Expr>),

    BinOp(Box<Expr>, BinOp, Box<Expr>),
    UnaryOp(UnaryOp, Box<Expr>),

    Call(String, Vec<Expr>),

    // Built-in print, an expression yielding its argument
    Print(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: Type,
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    // Local variable declaration with optional initializer
    VarDecl(VarDecl),

    Block(Block),

    // Expression statement (assignment, call, print, ...)
    Expr(Expr),

    // Control flow
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDecl {
    pub return_type: Type,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Var(VarDecl),
    Fun(FunDecl),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub declarations: Vec<Decl>,
}

impl Program {
    pub fn functions(&self) -> impl Iterator<Item = &FunDecl> {
        self.declarations.iter().filter_map(|decl| match decl {
            Decl::Fun(func) => Some(func),
            Decl::Var(_) => None,
        })
    }

    pub fn globals(&self) -> impl Iterator<Item = &VarDecl> {
        self.declarations.iter().filter_map(|decl| match decl {
            Decl::Var(var) => Some(var),
            Decl::Fun(_) => None,
        })
    }
}

/// Indented tree dump of a program, used by `--ast`.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program:")?;
        for decl in &self.declarations {
            match decl {
                Decl::Var(var) => write!(f, "\n  {}", var_decl_line(var))?,
                Decl::Fun(func) => {
                    let params: Vec<String> = func
                        .params
                        .iter()
                        .map(|p| format!("{} {}", p.ty, p.name))
                        .collect();
                    write!(
                        f,
                        "\n  FunDecl({} {}({}))",
                        func.return_type,
                        func.name,
                        params.join(", ")
                    )?;
                    write_block(f, &func.body, 2)?;
                }
            }
        }
        Ok(())
    }
}

fn var_decl_line(var: &VarDecl) -> String {
    match &var.init {
        Some(init) => format!("VarDecl({} {} = {})", var.ty, var.name, init),
        None => format!("VarDecl({} {})", var.ty, var.name),
    }
}

fn indent(f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
    write!(f, "\n{}", "  ".repeat(level))
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block, level: usize) -> fmt::Result {
    indent(f, level)?;
    write!(f, "Block:")?;
    for stmt in &block.statements {
        write_stmt(f, stmt, level + 1)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, level: usize) -> fmt::Result {
    match stmt {
        Stmt::VarDecl(var) => {
            indent(f, level)?;
            write!(f, "{}", var_decl_line(var))
        }
        Stmt::Block(block) => write_block(f, block, level),
        Stmt::Expr(expr) => {
            indent(f, level)?;
            write!(f, "ExprStmt({})", expr)
        }
        Stmt::If(cond, then_branch, else_branch) => {
            indent(f, level)?;
            write!(f, "IfStmt({})", cond)?;
            indent(f, level + 1)?;
            write!(f, "Then:")?;
            write_stmt(f, then_branch, level + 2)?;
            if let Some(else_branch) = else_branch {
                indent(f, level + 1)?;
                write!(f, "Else:")?;
                write_stmt(f, else_branch, level + 2)?;
            }
            Ok(())
        }
        Stmt::While(cond, body) => {
            indent(f, level)?;
            write!(f, "WhileStmt({})", cond)?;
            write_stmt(f, body, level + 1)
        }
        Stmt::Return(Some(expr)) => {
            indent(f, level)?;
            write!(f, "ReturnStmt({})", expr)
        }
        Stmt::Return(None) => {
            indent(f, level)?;
            write!(f, "ReturnStmt()")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntLit(n) => write!(f, "IntLiteral({})", n),
            Expr::BoolLit(b) => write!(f, "BoolLiteral({})", b),
            Expr::Var(name) => write!(f, "Variable({})", name),
            Expr::Assign(name, value) => write!(f, "Assignment({} = {})", name, value),
            Expr::BinOp(left, op, right) => write!(f, "BinaryOp({} {} {})", left, op, right),
            Expr::UnaryOp(op, operand) => write!(f, "UnaryOp({} {})", op, operand),
            Expr::Call(name, args) => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "FunctionCall({}({}))", name, args.join(", "))
            }
            Expr::Print(expr) => write!(f, "PrintCall({})", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_program;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_indented_tree() {
        let program = parse_program(
            "int g; int main() { if (g < 1) return print(g); else { g = 2; } while (true) return; }",
        )
        .unwrap();
        let expected = "\
Program:
  VarDecl(int g)
  FunDecl(int main())
    Block:
      IfStmt(BinaryOp(Variable(g) < IntLiteral(1)))
        Then:
          ReturnStmt(PrintCall(Variable(g)))
        Else:
          Block:
            ExprStmt(Assignment(g = IntLiteral(2)))
      WhileStmt(BoolLiteral(true))
        ReturnStmt()";
        assert_eq!(program.to_string(), expected);
    }
}
