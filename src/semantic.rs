use crate::ast::*;
use crate::env::Environment;
use crate::error::{MicroError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Declared shape of a function as seen by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub return_type: Type,
    pub params: Vec<Type>,
}

/// Static checker: declarations, scoping, types and return paths.
///
/// A single depth-first pass. Functions become callable from the point of
/// their declaration onward (which includes their own body), so mutual
/// recursion needs the callee declared first.
pub struct Analyzer {
    env: Environment<Type>,
    functions: HashMap<String, Signature>,
    return_type: Option<Type>,
    has_return: bool,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            env: Environment::new(),
            functions: HashMap::new(),
            return_type: None,
            has_return: false,
        }
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name)
    }

    pub fn analyze(&mut self, program: &Program) -> Result<()> {
        for decl in &program.declarations {
            match decl {
                Decl::Var(var) => self.check_var_decl(var)?,
                Decl::Fun(func) => self.check_function(func)?,
            }
        }
        Ok(())
    }

    fn check_var_decl(&mut self, var: &VarDecl) -> Result<()> {
        if self.env.is_declared_locally(&var.name) {
            return Err(MicroError::semantic(format!(
                "Variable '{}' is already declared in this scope",
                var.name
            )));
        }
        if var.ty == Type::Void {
            return Err(MicroError::semantic(format!(
                "Variable '{}' cannot have type void",
                var.name
            )));
        }
        self.env.set(&var.name, var.ty);
        if let Some(init) = &var.init {
            expect_type(var.ty, self.check_expr(init)?)?;
        }
        Ok(())
    }

    fn check_function(&mut self, func: &FunDecl) -> Result<()> {
        if self.functions.contains_key(&func.name) {
            return Err(MicroError::semantic(format!(
                "Function '{}' is already declared",
                func.name
            )));
        }
        debug!(function = %func.name, "checking function");
        self.functions.insert(
            func.name.clone(),
            Signature {
                return_type: func.return_type,
                params: func.params.iter().map(|p| p.ty).collect(),
            },
        );

        let scope = self.env.enter_child();
        let prev_return = self.return_type.replace(func.return_type);
        let prev_has_return = std::mem::replace(&mut self.has_return, false);

        let result = self.check_function_body(func);

        self.return_type = prev_return;
        self.has_return = prev_has_return;
        self.env.leave(scope);
        result
    }

    fn check_function_body(&mut self, func: &FunDecl) -> Result<()> {
        for param in &func.params {
            if param.ty == Type::Void {
                return Err(MicroError::semantic(format!(
                    "Parameter '{}' of '{}' cannot have type void",
                    param.name, func.name
                )));
            }
            if self.env.is_declared_locally(&param.name) {
                return Err(MicroError::semantic(format!(
                    "Parameter '{}' of '{}' is declared twice",
                    param.name, func.name
                )));
            }
            self.env.set(&param.name, param.ty);
        }

        self.check_block(&func.body)?;

        if func.return_type != Type::Void && !self.has_return {
            return Err(MicroError::semantic(format!(
                "Function '{}' must return a value of type {}",
                func.name, func.return_type
            )));
        }
        Ok(())
    }

    fn check_block(&mut self, block: &Block) -> Result<()> {
        let scope = self.env.enter_child();
        let result = block
            .statements
            .iter()
            .try_for_each(|stmt| self.check_stmt(stmt));
        self.env.leave(scope);
        result
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl(var) => self.check_var_decl(var),
            Stmt::Block(block) => self.check_block(block),
            Stmt::Expr(expr) => self.check_expr(expr).map(|_| ()),
            Stmt::If(cond, then_branch, else_branch) => {
                expect_type(Type::Bool, self.check_expr(cond)?)?;
                self.check_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While(cond, body) => {
                expect_type(Type::Bool, self.check_expr(cond)?)?;
                self.check_stmt(body)
            }
            Stmt::Return(value) => {
                self.has_return = true;
                let expected = self
                    .return_type
                    .ok_or_else(|| MicroError::semantic("'return' outside of a function"))?;
                match value {
                    Some(expr) => expect_type(expected, self.check_expr(expr)?),
                    None => expect_type(expected, Type::Void),
                }
            }
        }
    }

    /// Infer the static type of `expr`.
    pub fn check_expr(&mut self, expr: &Expr) -> Result<Type> {
        match expr {
            Expr::IntLit(_) => Ok(Type::Int),
            Expr::BoolLit(_) => Ok(Type::Bool),
            Expr::Var(name) => self.env.get(name).copied(),
            Expr::Assign(name, value) => {
                let var_type = *self.env.get(name)?;
                expect_type(var_type, self.check_expr(value)?)?;
                Ok(var_type)
            }
            Expr::BinOp(left, op, right) => {
                let l = self.check_expr(left)?;
                let r = self.check_expr(right)?;
                binop_type(*op, l, r)
            }
            Expr::UnaryOp(op, operand) => {
                let t = self.check_expr(operand)?;
                match (op, t) {
                    (UnaryOp::Not, Type::Bool) => Ok(Type::Bool),
                    (UnaryOp::Neg | UnaryOp::Plus, Type::Int) => Ok(Type::Int),
                    (UnaryOp::Not, _) => Err(MicroError::semantic(format!(
                        "Operator '{}' requires a bool operand, got {}",
                        op, t
                    ))),
                    (UnaryOp::Neg | UnaryOp::Plus, _) => Err(MicroError::semantic(format!(
                        "Operator '{}' requires an int operand, got {}",
                        op, t
                    ))),
                }
            }
            Expr::Call(name, args) => {
                let sig = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| MicroError::UndefinedFunction(name.clone()))?;
                if args.len() != sig.params.len() {
                    return Err(MicroError::ArgumentCount {
                        name: name.clone(),
                        expected: sig.params.len(),
                        got: args.len(),
                    });
                }
                for (arg, expected) in args.iter().zip(&sig.params) {
                    expect_type(*expected, self.check_expr(arg)?)?;
                }
                Ok(sig.return_type)
            }
            Expr::Print(inner) => self.check_expr(inner),
        }
    }
}

fn expect_type(expected: Type, got: Type) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(MicroError::TypeMismatch { expected, got })
    }
}

fn binop_type(op: BinOp, left: Type, right: Type) -> Result<Type> {
    let (operand, result, kind) = match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => (Type::Int, Type::Int, "arithmetic"),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            (Type::Int, Type::Bool, "relational")
        }
        BinOp::And | BinOp::Or => (Type::Bool, Type::Bool, "logical"),
    };
    if left == operand && right == operand {
        Ok(result)
    } else {
        Err(MicroError::semantic(format!(
            "Operator '{}' is {} and requires {} operands, got {} and {}",
            op, kind, operand, left, right
        )))
    }
}

/// Run a fresh analyzer over `program`.
pub fn analyze_program(program: &Program) -> Result<()> {
    Analyzer::new().analyze(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn check(source: &str) -> Result<()> {
        analyze_program(&parse_program(source).unwrap())
    }

    #[test]
    fn accepts_well_typed_program() {
        let source = r#"
            int total;
            int add(int a, int b) { return a + b; }
            bool positive(int n) { return n > 0; }
            void bump() { total = total + 1; }
            int main() {
                int x = add(1, 2);
                if (positive(x) && !false) { bump(); }
                while (x > 0) { x = x - 1; }
                print(x);
                return total;
            }
        "#;
        check(source).unwrap();
    }

    #[test]
    fn initializer_type_must_match() {
        let err = check("int main() { int x = true; return x; }").unwrap_err();
        assert!(matches!(
            err,
            MicroError::TypeMismatch { expected: Type::Int, got: Type::Bool }
        ));
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        let err = check("int main() { int x; int x; return 0; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("'x'")));
    }

    #[test]
    fn shadowing_in_inner_block_is_allowed() {
        check("int main() { int x = 1; { bool x = true; } return x; }").unwrap();
    }

    #[test]
    fn duplicate_function_is_rejected() {
        let err = check("int f() { return 1; } int f() { return 2; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("'f'")));
    }

    #[test]
    fn non_void_function_needs_a_return() {
        let err = check("int main() { int x = 1; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("main")));
        check("void main() { print(1); }").unwrap();
    }

    #[test]
    fn return_flag_does_not_leak_between_functions() {
        let err = check("int a() { return 1; } int b() { print(2); }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("'b'")));
    }

    #[test]
    fn return_type_is_checked() {
        let err = check("bool f() { return 1; }").unwrap_err();
        assert!(matches!(
            err,
            MicroError::TypeMismatch { expected: Type::Bool, got: Type::Int }
        ));
        let err = check("int f() { return; }").unwrap_err();
        assert!(matches!(
            err,
            MicroError::TypeMismatch { expected: Type::Int, got: Type::Void }
        ));
    }

    #[test]
    fn conditions_must_be_bool() {
        let err = check("int main() { if (1) return 1; return 0; }").unwrap_err();
        assert!(matches!(
            err,
            MicroError::TypeMismatch { expected: Type::Bool, got: Type::Int }
        ));
        let err = check("int main() { while (0) { } return 0; }").unwrap_err();
        assert!(matches!(err, MicroError::TypeMismatch { .. }));
    }

    #[test]
    fn operators_check_operand_types() {
        let err = check("int main() { return 1 + true; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("'+'")));
        let err = check("int main() { if (1 && 2) return 1; return 0; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("'&&'")));
        let err = check("int main() { return -true; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("'-'")));
        let err = check("int main() { return !1; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("'!'")));
    }

    #[test]
    fn calls_are_checked() {
        let err = check("int main() { return missing(); }").unwrap_err();
        assert!(matches!(err, MicroError::UndefinedFunction(ref n) if n == "missing"));

        let err = check("int f(int a) { return a; } int main() { return f(); }").unwrap_err();
        assert!(matches!(
            err,
            MicroError::ArgumentCount { ref name, expected: 1, got: 0 } if name == "f"
        ));

        let err = check("int f(int a) { return a; } int main() { return f(true); }").unwrap_err();
        assert!(matches!(
            err,
            MicroError::TypeMismatch { expected: Type::Int, got: Type::Bool }
        ));
    }

    #[test]
    fn recursion_sees_own_signature() {
        check("int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); }").unwrap();
    }

    #[test]
    fn block_locals_are_out_of_scope_afterwards() {
        let err = check("int main() { { int x; x = 10; } return x; }").unwrap_err();
        assert!(matches!(err, MicroError::UndefinedVariable(ref n) if n == "x"));
    }

    #[test]
    fn assignment_requires_declared_name_and_matching_type() {
        let err = check("int main() { y = 1; return 0; }").unwrap_err();
        assert!(matches!(err, MicroError::UndefinedVariable(ref n) if n == "y"));
        let err = check("int main() { int y; y = false; return 0; }").unwrap_err();
        assert!(matches!(err, MicroError::TypeMismatch { .. }));
    }

    #[test]
    fn void_variables_are_rejected() {
        let err = check("void v; int main() { return 0; }").unwrap_err();
        assert!(matches!(err, MicroError::Semantic(ref m) if m.contains("void")));
    }

    #[test]
    fn print_is_type_transparent() {
        check("bool main() { return print(true); }").unwrap();
        let err = check("int main() { return print(true); }").unwrap_err();
        assert!(matches!(err, MicroError::TypeMismatch { .. }));
    }

    #[test]
    fn analysis_is_repeatable() {
        let program = parse_program("int main() { return undefined; }").unwrap();
        let first = analyze_program(&program).unwrap_err().to_string();
        let second = analyze_program(&program).unwrap_err().to_string();
        assert_eq!(first, second);

        let program = parse_program("int main() { return 1; }").unwrap();
        assert!(analyze_program(&program).is_ok());
        assert!(analyze_program(&program).is_ok());
    }

    #[test]
    fn records_function_signatures() {
        let program = parse_program("int add(int a, int b) { return a + b; } void noop() { }").unwrap();
        let mut analyzer = Analyzer::new();
        analyzer.analyze(&program).unwrap();
        assert_eq!(
            analyzer.signature("add"),
            Some(&Signature { return_type: Type::Int, params: vec![Type::Int, Type::Int] })
        );
        assert_eq!(
            analyzer.signature("noop"),
            Some(&Signature { return_type: Type::Void, params: vec![] })
        );
        assert_eq!(analyzer.signature("missing"), None);
    }

    #[test]
    fn self_referencing_initializer_passes_analysis() {
        // The name is bound before its initializer is checked; the evaluator
        // binds after evaluating and reports the read as undefined.
        let program = parse_program("int main() { int x = x; return x; }").unwrap();
        analyze_program(&program).unwrap();

        let mut interpreter = crate::Interpreter::with_output(Vec::new());
        let err = interpreter.run(&program).unwrap_err();
        assert!(matches!(err, MicroError::UndefinedVariable(ref n) if n == "x"));
    }
}
