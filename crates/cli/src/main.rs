use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use stormcache_collection::Timeout;
use stormcache_common::{DEFAULT_PROMPT, DEFAULT_TIMEOUT_MS, StormResult};

mod command;
mod parse;
mod reply;
mod shell;

use reply::Reply;
use shell::{Settings, Shell};

#[derive(Parser, Debug)]
#[command(
    name = "stormcache-cli",
    about = "StormCache: shell interativo sobre um mapa com expiração"
)]
struct Args {
    /// Timeout em ms para chaves criadas por ADD/ENSURE sem timeout (0 = permanente)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS, allow_negative_numbers = true)]
    default_ttl: i64,

    /// Leituras não renovam o timer das chaves
    #[arg(long)]
    no_sliding: bool,

    /// Comando para executar diretamente (modo não interativo)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            default_timeout: Timeout::millis(self.default_ttl),
            sliding: !self.no_sliding,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stormcache_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = args.settings();
    info!(?settings, "shell iniciado");

    let shell = Shell::open(settings)?;

    // Modo comando único (via argumentos)
    if !args.command.is_empty() {
        println!("{}", run_line(&shell, args.command));
        return Ok(());
    }

    repl(&shell).await?;
    Ok(())
}

/// Loop interativo sobre stdin até EOF, `quit` ou `exit`.
async fn repl(shell: &Shell) -> StormResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{DEFAULT_PROMPT}");
        std::io::stdout().flush()?;

        let Some(input) = lines.next_line().await? else {
            break; // EOF
        };

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }

        println!("{}", run_line(shell, tokens));
    }

    Ok(())
}

fn run_line(shell: &Shell, tokens: Vec<String>) -> Reply {
    shell
        .dispatch(tokens)
        .unwrap_or_else(|e| Reply::Error(format!("ERR {e}")))
}

/// Tokeniza a linha de input com suporte a strings quoted.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut quote_char = '"';
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            if c == quote_char {
                in_quote = false;
            } else if c == '\\' {
                match chars.peek() {
                    Some('n') => {
                        current.push('\n');
                        chars.next();
                    }
                    Some('t') => {
                        current.push('\t');
                        chars.next();
                    }
                    Some(&(next @ ('\\' | '"' | '\''))) => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push(c),
                }
            } else {
                current.push(c);
            }
        } else if c == '"' || c == '\'' {
            in_quote = true;
            quote_char = c;
        } else if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
