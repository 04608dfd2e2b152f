use crate::ast::{Decl, Expr, Stmt};
use crate::error::MicroError;
use crate::interpreter::{ControlFlow, Interpreter, Value};
use crate::lexer::Token;
use crate::parser::parse_program;
use logos::Logos;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::fs;
use std::io::Write;

const BANNER: &str = r#"
  __  __ _                 ____
 |  \/  (_) ___ _ __ ___  / ___|
 | |\/| | |/ __| '__/ _ \| |
 | |  | | | (__| | | (_) | |___
 |_|  |_|_|\___|_|  \___/ \____|
"#;

pub fn run_repl() {
    println!("{}", BANNER);
    println!("MicroC REPL v{}", crate::VERSION);
    println!("Type .help for commands, .exit to quit.");
    println!("Use arrow keys for history.\n");

    if let Err(e) = repl_loop() {
        eprintln!("REPL error: {}", e);
    }
}

fn repl_loop() -> RlResult<()> {
    let mut rl = DefaultEditor::new()?;
    let mut interpreter = Interpreter::new();
    let mut input_buffer = String::new();
    let mut brace_depth: i32 = 0;
    let mut in_multiline = false;

    let history_path = dirs_history_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = if in_multiline { "...> " } else { "microc> " };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                // REPL commands only outside multi-line input
                if !in_multiline && trimmed.starts_with('.') {
                    rl.add_history_entry(&line)?;
                    if handle_command(trimmed, &mut interpreter) {
                        break;
                    }
                    continue;
                }

                for c in line.chars() {
                    match c {
                        '{' => brace_depth += 1,
                        '}' => brace_depth = brace_depth.saturating_sub(1),
                        _ => {}
                    }
                }

                input_buffer.push_str(&line);
                input_buffer.push('\n');

                if brace_depth > 0 {
                    in_multiline = true;
                    continue;
                }

                in_multiline = false;
                let input = input_buffer.trim();
                if !input.is_empty() {
                    rl.add_history_entry(input)?;
                    execute_input(&mut interpreter, input);
                }

                input_buffer.clear();
                brace_depth = 0;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C drops the pending input
                println!("^C");
                input_buffer.clear();
                brace_depth = 0;
                in_multiline = false;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

fn dirs_history_path() -> Option<String> {
    dirs::home_dir().map(|mut path| {
        path.push(".microc_history");
        path.to_string_lossy().to_string()
    })
}

/// Handle a REPL command. Returns true if the REPL should exit.
fn handle_command(cmd: &str, interpreter: &mut Interpreter) -> bool {
    let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
    let command = parts[0];
    let arg = parts.get(1).map(|s| s.trim());

    match command {
        ".exit" | ".quit" | ".q" => {
            println!("Goodbye!");
            return true;
        }
        ".help" | ".h" => print_repl_help(),
        ".clear" => {
            *interpreter = Interpreter::new();
            println!("State cleared.");
        }
        ".vars" => print_variables(interpreter),
        ".load" => match arg {
            Some(filename) => load_file(interpreter, filename),
            None => eprintln!("Usage: .load <filename>"),
        },
        ".run" => run_function(interpreter, arg.unwrap_or("main")),
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Type .help for available commands.");
        }
    }

    false
}

fn load_file(interpreter: &mut Interpreter, filename: &str) {
    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", filename, e);
            return;
        }
    };

    let program = match parse_program(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return;
        }
    };

    if let Err(e) = interpreter.load(&program) {
        eprintln!("Runtime error: {}", e);
        return;
    }

    let names: Vec<_> = program.functions().map(|f| f.name.as_str()).collect();
    if !names.is_empty() {
        println!("Loaded: {}", names.join(", "));
    }
    if interpreter.functions.contains_key("main") {
        run_function(interpreter, "main");
    }
}

fn run_function(interpreter: &mut Interpreter, name: &str) {
    match interpreter.call_function(name, vec![]) {
        Ok(value) => println!("=> {}", value),
        Err(e) => eprintln!("Runtime error: {}", e),
    }
}

fn execute_input<W: Write>(interpreter: &mut Interpreter<W>, input: &str) {
    if looks_like_function(input) {
        match parse_program(input) {
            Ok(program) => {
                for decl in &program.declarations {
                    if let Decl::Fun(func) = decl {
                        println!("Defined function: {}", func.name);
                    }
                }
                if let Err(e) = interpreter.load(&program) {
                    eprintln!("Runtime error: {}", e);
                }
            }
            Err(e) => eprintln!("Parse error: {}", e),
        }
        return;
    }

    // Statements run directly in the global frame
    let wrapped = format!("void __repl__() {{ {} }}", input);
    let program = match parse_program(&wrapped) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return;
        }
    };

    let Some(func) = program.functions().next() else {
        return;
    };
    for stmt in &func.body.statements {
        match execute_stmt(interpreter, stmt) {
            Ok(Some(value)) => println!("=> {}", value),
            Ok(None) => {}
            Err(e) => {
                eprintln!("Runtime error: {}", e);
                break;
            }
        }
    }
}

fn looks_like_function(input: &str) -> bool {
    let tokens: Vec<Token> = Token::lexer(input)
        .filter_map(|t| t.ok())
        .take(3)
        .collect();

    matches!(
        tokens.as_slice(),
        [ty, Token::Identifier(_), Token::LParen] if ty.is_type()
    )
}

fn execute_stmt<W: Write>(interpreter: &mut Interpreter<W>, stmt: &Stmt) -> Result<Option<Value>, MicroError> {
    match stmt {
        // Echo the value of calls and plain expressions, not of assignments or prints
        Stmt::Expr(Expr::Assign(..) | Expr::Print(_)) => {
            interpreter.exec_stmt(stmt)?;
            Ok(None)
        }
        Stmt::Expr(expr) => interpreter.eval_expr(expr).map(Some),
        _ => match interpreter.exec_stmt(stmt)? {
            ControlFlow::Return(v) => Ok(Some(v)),
            ControlFlow::Normal => Ok(None),
        },
    }
}

fn print_repl_help() {
    println!(
        r#"
REPL Commands:
    .help, .h          Show this help message
    .exit, .quit, .q   Exit the REPL
    .clear             Clear all variables and functions
    .vars              Show global variables and functions
    .load <file>       Load a .mc file and run its main()
    .run [func]        Call a zero-argument function (default: main)

Navigation:
    Up/Down arrows     Navigate command history
    Ctrl-C             Cancel current input
    Ctrl-D             Exit REPL

Examples:
    int x = 5;         Declare a global
    x = x * 2;         Assign
    print(x);          Print value

    int add(int a, int b) {{ return a + b; }}
                       Define a function
    add(3, 4);         Call it

Tips:
    - Multi-line input: open braces are auto-detected
    - Variables persist across inputs
    - History is saved to ~/.microc_history
    - The REPL evaluates without static checks; use `microc -s` on files
"#
    );
}

fn print_variables(interpreter: &Interpreter) {
    let globals = interpreter.globals();
    let mut functions: Vec<_> = interpreter.functions.values().collect();
    functions.sort_by(|a, b| a.name.cmp(&b.name));

    if globals.is_empty() && functions.is_empty() {
        println!("No variables or functions defined.");
        return;
    }

    if !globals.is_empty() {
        println!("Variables:");
        for (name, value) in &globals {
            println!("  {} = {}", name, value);
        }
    }

    if !functions.is_empty() {
        if !globals.is_empty() {
            println!();
        }
        println!("Functions:");
        for func in functions {
            let params: Vec<String> = func
                .params
                .iter()
                .map(|p| format!("{} {}", p.ty, p.name))
                .collect();
            println!("  {} {}({})", func.return_type, func.name, params.join(", "));
        }
    }
}
