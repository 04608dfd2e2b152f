use microc::lexer::Token;
use microc::parser::tokenize;
use microc::{analyze_program, check_and_run, parse_program, repl, AnalysisPolicy, Interpreter, Program, VERSION};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"microc - The MicroC Interpreter v{}

MicroC is a small C-like language with int and bool values, functions,
if/else, while and a print() expression. Programs start at main().

USAGE:
    microc                    Start the REPL (interactive mode)
    microc <file.mc>          Check and run a MicroC program
    microc -e "code"          Run statements inside an implicit main()
    microc -                  Read and run code from stdin
    microc [OPTIONS] <file.mc>

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version information
    -i, --repl          Start the REPL (interactive mode)
    -e <code>           Execute statements directly
    -t, --ast           Print the abstract syntax tree and exit
    -l, --lex           Print the token stream and exit
    -s, --sem           Run semantic analysis only
    --advisory          Report semantic errors but run the program anyway
    --unchecked         Skip semantic analysis
    -v                  More log output (repeat for debug / trace)

Set RUST_LOG to override the log filter.

EXAMPLE:
    microc -e "int x = 5; print(x * 2);"

    int square(int n) {{ return n * n; }}
    int main() {{
        int i = 1;
        while (i <= 3) {{ print(square(i)); i = i + 1; }}
        return 0;
    }}
"#,
        VERSION
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Ast,
    Lex,
    Sem,
}

#[derive(Debug, Clone, Copy)]
struct Options {
    mode: Mode,
    policy: AnalysisPolicy,
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_file(filename: &str) -> String {
    match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", filename, e);
            process::exit(1);
        }
    }
}

fn parse_or_exit(source: &str) -> Program {
    match parse_program(source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            process::exit(1);
        }
    }
}

fn print_tokens(source: &str) {
    match tokenize(source) {
        Ok(tokens) => {
            for (token, line) in tokens {
                println!("{:>4} {}: {}", line, token.kind(), token);
            }
        }
        Err(e) => {
            eprintln!("Parse error: {}", e);
            process::exit(1);
        }
    }
}

fn run_source(source: &str, options: Options) {
    match options.mode {
        Mode::Lex => print_tokens(source),
        Mode::Ast => println!("{}", parse_or_exit(source)),
        Mode::Sem => match analyze_program(&parse_or_exit(source)) {
            Ok(()) => println!("Semantic analysis completed successfully."),
            Err(e) => {
                eprintln!("Semantic error: {}", e);
                process::exit(1);
            }
        },
        Mode::Run => {
            let program = parse_or_exit(source);
            let mut interpreter = Interpreter::new();
            match check_and_run(&program, options.policy, &mut interpreter) {
                Ok(result) => println!("{}", result),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
    }
}

fn wrap_statements(code: &str) -> String {
    format!("int main() {{\n{}\nreturn 0;\n}}", code)
}

fn looks_like_program(source: &str) -> bool {
    let tokens: Vec<Token> = tokenize(source)
        .map(|tokens| tokens.into_iter().map(|(token, _)| token).collect())
        .unwrap_or_default();
    tokens
        .windows(3)
        .any(|w| matches!(w, [ty, Token::Identifier(name), Token::LParen] if ty.is_type() && name == "main"))
}

fn run_stdin(options: Options) {
    let mut source = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut source) {
        eprintln!("Error reading stdin: {}", e);
        process::exit(1);
    }

    if looks_like_program(&source) {
        run_source(&source, options);
    } else {
        run_source(&wrap_statements(&source), options);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Flags may appear anywhere; collect them and keep the rest positional
    let mut options = Options {
        mode: Mode::Run,
        policy: AnalysisPolicy::Strict,
        verbose: 0,
    };
    let mut rest: Vec<String> = Vec::new();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-t" | "--ast" => options.mode = Mode::Ast,
            "-l" | "--lex" => options.mode = Mode::Lex,
            "-s" | "--sem" => options.mode = Mode::Sem,
            "--advisory" => options.policy = AnalysisPolicy::Advisory,
            "--unchecked" => options.policy = AnalysisPolicy::Off,
            flag if flag.len() > 1 && flag.starts_with('-') && flag[1..].chars().all(|c| c == 'v') => {
                options.verbose = options.verbose.saturating_add((flag.len() - 1) as u8);
            }
            _ => rest.push(arg.clone()),
        }
    }

    setup_logging(options.verbose);

    if rest.is_empty() {
        repl::run_repl();
        return;
    }

    match rest[0].as_str() {
        "-h" | "--help" => print_help(),
        "-V" | "--version" => println!("microc {}", VERSION),
        "-i" | "--repl" => repl::run_repl(),
        "-e" => {
            if rest.len() < 2 {
                eprintln!("Error: -e requires code argument");
                eprintln!("Usage: microc -e \"int x = 5; print(x);\"");
                process::exit(1);
            }
            run_source(&wrap_statements(&rest[1]), options);
        }
        "-" => run_stdin(options),
        filename => {
            let source = read_file(filename);
            run_source(&source, options);
        }
    }
}
