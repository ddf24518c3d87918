//! Interactive line-oriented shell over a [`PositionalTrie`] of strings.
//!
//! Every added key is stored with itself as the value. Built only with the
//! `runner` feature: `cargo run --features runner`.

use std::io::{self, BufRead, Write};

use clap::Parser;
use positional_trie::{PositionalTrie, SearchResult};
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "dump,quit,add,search,delete,avg,num: ";

#[derive(Parser, Debug)]
#[command(name = "trie-runner", version, about = "Interactive shell over a positional trie")]
struct Args {
    /// Fold keys to upper case before storing or comparing them
    #[arg(long, env = "TRIE_CASE_INSENSITIVE")]
    case_insensitive: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Average,
    NodeCount,
    Dump,
    Search(&'a str),
    Delete(&'a str),
    Add(&'a str),
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        match line {
            "" => Command::Empty,
            "avg" => Command::Average,
            "num" => Command::NodeCount,
            "dump" => Command::Dump,
            "quit" => Command::Quit,
            _ => {
                if let Some(key) = line.strip_prefix("search ") {
                    Command::Search(key)
                } else if let Some(key) = line.strip_prefix("delete ") {
                    Command::Delete(key)
                } else if let Some(key) = line.strip_prefix("add ") {
                    Command::Add(key)
                } else {
                    Command::Unknown(line)
                }
            }
        }
    }
}

/// Runs the command loop until `quit` or end of input.
fn run<R: BufRead, W: Write>(trie: &mut PositionalTrie<String>, input: R, out: &mut W) -> io::Result<()> {
    let mut lines = input.lines();
    loop {
        writeln!(out, "\nTrie contains {} elements", trie.count())?;
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            return Ok(());
        };
        let line = line?;

        match Command::parse(line.trim_end_matches('\r')) {
            Command::Empty => {}
            Command::Average => writeln!(out, "\nAverage clash: {}\n", trie.average_depth())?,
            Command::NodeCount => writeln!(out, "\nTotal number of tries: {}\n", trie.node_count())?,
            Command::Dump => {
                writeln!(out, "\nDUMPING:\n--------")?;
                trie.dump(out)?;
            }
            Command::Search(key) => {
                writeln!(out, "Searching for {key}...")?;
                match trie.search(key) {
                    SearchResult::Found(value) => writeln!(out, "Found. Value is {value}")?,
                    SearchResult::Ambiguous(matches) => writeln!(out, "{matches}")?,
                    SearchResult::NotFound => writeln!(out, "Not found")?,
                }
            }
            Command::Delete(key) => {
                writeln!(out, "Deleting {key}...")?;
                match trie.remove(key) {
                    Ok(Some(_)) => {}
                    Ok(None) => tracing::debug!(key, "slot holds a different key; nothing removed"),
                    Err(e) => writeln!(out, "{e}")?,
                }
            }
            Command::Add(key) => {
                writeln!(out, "Inserting {key}...")?;
                if let Err(e) = trie.insert(key, key.to_owned()) {
                    writeln!(out, "{e}")?;
                }
            }
            Command::Quit => return Ok(()),
            Command::Unknown(line) => writeln!(out, "Unknown command '{line}'")?,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("positional_trie=info".parse()?))
        .with_writer(io::stderr)
        .init();

    let mut trie = PositionalTrie::with_case_sensitivity(!args.case_insensitive);
    tracing::info!(case_sensitive = trie.is_case_sensitive(), "starting trie runner");

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&mut trie, stdin.lock(), &mut stdout.lock())?;
    Ok(())
}
