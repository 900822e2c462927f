use std::{
    io::Write,
    path::{Path, PathBuf},
};

use clap::Parser;
use snow::{parser, tokenizer, Environment, LoadError, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "snow", about = "The Snow scripting language")]
struct Cli {
    /// Evaluate this code instead of a file
    #[arg(short, long)]
    eval: Option<String>,

    /// Source file to run; with --eval this is the first chunk argument
    file: Option<PathBuf>,

    /// Arguments passed to the chunk as strings
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Print the token stream instead of running
    #[arg(long, conflicts_with = "ast")]
    tokens: bool,

    /// Print the parsed program instead of running
    #[arg(long)]
    ast: bool,

    /// Directory `import` resolves module names against
    #[arg(long, default_value = ".")]
    module_root: PathBuf,
}

impl Cli {
    fn chunk_args(&self) -> Vec<Value> {
        let leading = match (&self.eval, &self.file) {
            (Some(_), Some(path)) => Some(path.display().to_string()),
            _ => None,
        };
        leading
            .into_iter()
            .chain(self.args.iter().cloned())
            .map(Value::from)
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Snow(#[from] snow::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Tokenize(#[from] tokenizer::TokenizeError),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snow=warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let mut env = Environment::default().with_module_root(cli.module_root.clone());

    let result = match (&cli.eval, &cli.file) {
        (Some(code), _) => run_string(&cli, &mut env, code),
        (None, Some(path)) => run_file(&cli, &mut env, path),
        (None, None) => {
            repl_command(&mut env);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

/// Handles `--tokens` and `--ast`; returns false when the code should run.
fn inspect(cli: &Cli, code: &str, module: &str) -> Result<bool, RunError> {
    if cli.tokens {
        dump_tokens(code, module)?;
        return Ok(true);
    }
    if cli.ast {
        println!("{}", parser::parse(code, module)?);
        return Ok(true);
    }
    Ok(false)
}

fn run_string(cli: &Cli, env: &mut Environment, code: &str) -> Result<(), RunError> {
    if inspect(cli, code, "<string>")? {
        return Ok(());
    }
    let results = env.do_string(code, cli.chunk_args())?;
    tracing::debug!(results = results.len(), "entry point returned");
    Ok(())
}

fn run_file(cli: &Cli, env: &mut Environment, path: &Path) -> Result<(), RunError> {
    if cli.tokens || cli.ast {
        let code = Environment::read_source(path)?;
        inspect(cli, &code, &path.display().to_string())?;
        return Ok(());
    }
    let results = env.do_file(path, cli.chunk_args())?;
    tracing::debug!(results = results.len(), "entry point returned");
    Ok(())
}

fn dump_tokens(code: &str, module: &str) -> Result<(), RunError> {
    let mut line = 0;
    for token in tokenizer::tokens(code, module)? {
        if token.position.line != line {
            print!("{:4} ", token.position.line);
            line = token.position.line;
        } else {
            print!("   | ");
        }
        println!("{:<4} {}", token.position.column, token.token_type());
    }
    Ok(())
}

fn repl_command(env: &mut Environment) {
    println!("Snow REPL. End a line with ':' to continue it, 'quit' or EOF to exit.");

    let mut entry = String::new();
    loop {
        print!("{}", if entry.is_empty() { "> " } else { ">> " });
        if std::io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(continued) = line.strip_suffix(':') {
            entry.push_str(continued);
            entry.push('\n');
            continue;
        }
        entry.push_str(line);

        let code = std::mem::take(&mut entry);
        match code.trim() {
            "" => continue,
            "quit" => break,
            _ => {}
        }
        if let Err(e) = env.do_string(&code, Vec::new()) {
            println!("{e}");
        }
    }
}
