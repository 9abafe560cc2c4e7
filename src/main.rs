use clap::{Parser, Subcommand};
use inline_calc::{Lexer, Limits};
use miette::{IntoDiagnostic, Report, WrapErr};
use std::io::{self, Write};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Longest accepted expression, in bytes.
    #[arg(long, global = true, default_value_t = Limits::DEFAULT_MAX_LEN)]
    max_len: usize,

    /// Deepest accepted nesting of sub-expressions.
    #[arg(long, global = true, default_value_t = Limits::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the tokens of an expression, one per line.
    Tokenize { expression: String },
    /// Print the parsed expression as an S-expression.
    Parse { expression: String },
    /// Evaluate an expression.
    Eval { expression: String },
    /// Run the quick alphabet check on an expression.
    Check { expression: String },
    /// Read and evaluate expressions interactively.
    Calc,
}

fn main() -> miette::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let limits = Limits {
        max_len: cli.max_len,
        max_depth: cli.max_depth,
    };

    match cli.command {
        Commands::Tokenize { expression } => {
            for token in Lexer::new(&expression) {
                let token = token.map_err(|e| with_source(e.into(), &expression))?;
                println!("{:?} {:?} @{}", token.kind, token.slice, token.offset);
            }
        }
        Commands::Parse { expression } => {
            let expr = inline_calc::parse(&expression, &limits)
                .map_err(|e| with_source(e, &expression))?;
            println!("{expr}");
        }
        Commands::Eval { expression } => {
            let value = inline_calc::evaluate_with(&expression, &limits)
                .map_err(|e| with_source(e, &expression))?;
            println!("{value}");
        }
        Commands::Check { expression } => {
            println!("{}", inline_calc::is_valid(&expression));
        }
        Commands::Calc => loop {
            print!("calc> ");
            io::stdout()
                .flush()
                .into_diagnostic()
                .wrap_err("flushing stdout failed")?;

            let mut input = String::new();
            let read = io::stdin()
                .read_line(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin failed")?;
            if read == 0 {
                break;
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("exit") {
                break;
            }

            match inline_calc::evaluate_with(input, &limits) {
                Ok(value) => println!("{value}"),
                Err(err) => eprintln!("{:?}", with_source(err, input)),
            }
        },
    }

    Ok(())
}

fn with_source(err: inline_calc::EvalError, source: &str) -> Report {
    Report::new(err).with_source_code(source.to_string())
}
