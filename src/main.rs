use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use simple_logger::SimpleLogger;

use fpcalc::driver::{self, LineOutcome};
use fpcalc::{Expr, evaluate, parse, pretty_print, render};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Print the syntax tree and infix notation of every expression.
  #[arg(long)]
  ast: bool,

  /// Compile the expressions in this file (one per line) instead of starting a REPL.
  #[arg(short, long)]
  input: Option<PathBuf>,

  /// Assembly output; also names the object file and executable.
  #[arg(short, long, requires = "input")]
  output: Option<PathBuf>,

  /// Stop after writing the assembly; do not run nasm and gcc.
  #[arg(long)]
  no_link: bool,
}

fn main() -> Result<()> {
  SimpleLogger::new()
    .with_level(LevelFilter::Warn)
    .env()
    .init()?;

  let cli = Cli::parse();

  match &cli.input {
    Some(input) => {
      let output = output_path(input, cli.output.as_deref());
      if let Err(err) = compile_file(&cli, input, &output) {
        eprintln!("{err:#}");
        process::exit(1);
      }
      Ok(())
    }
    None => repl(&cli),
  }
}

/// Default to `<input>.asm`; make sure an explicit name ends in `.asm`.
fn output_path(input: &Path, output: Option<&Path>) -> PathBuf {
  match output {
    None => input.with_extension("asm"),
    Some(path) if path.extension().is_some_and(|ext| ext == "asm") => path.to_path_buf(),
    Some(path) => {
      let mut name = path.as_os_str().to_owned();
      name.push(".asm");
      PathBuf::from(name)
    }
  }
}

fn show_ast(cli: &Cli, expr: &Expr) {
  if cli.ast {
    println!("  AST:");
    print!("{}", pretty_print(expr, "    "));
    println!("  Infix notation: {}", render(expr));
  }
}

fn repl(cli: &Cli) -> Result<()> {
  println!("Basic Arithmetic Parser REPL");
  println!("Enter expressions to evaluate or type 'exit' to quit.");

  let mut editor = DefaultEditor::new()?;
  loop {
    let line = match editor.readline("> ") {
      Ok(line) => line,
      Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
      Err(err) => return Err(err.into()),
    };

    let input = line.trim();
    if input == "exit" {
      break;
    }
    if input.is_empty() {
      continue;
    }
    editor.add_history_entry(input)?;

    let expr = match parse(input) {
      Ok(expr) => expr,
      Err(err) => {
        eprintln!("{}", fpcalc::CompileError::from(err).with_source(input));
        continue;
      }
    };

    show_ast(cli, &expr);
    match evaluate(&expr) {
      Ok(value) => println!("Result = '{value}'"),
      Err(err) => println!("  {err}"),
    }
  }
  Ok(())
}

fn report_line(cli: &Cli, outcome: &LineOutcome) {
  let prefix = format!("L{}: ", outcome.line);
  println!("{prefix}'{}'", outcome.source);
  match &outcome.result {
    Ok(compiled) => {
      show_ast(cli, &compiled.expr);
      if let Err(err) = compiled.value {
        println!("  {prefix}warning: {err}");
      }
    }
    Err(err) => {
      for line in err.with_source(&outcome.source).lines() {
        println!("  {line}");
      }
      println!("  {prefix}Skipping line due to {} error.", err.stage());
    }
  }
}

fn compile_file(cli: &Cli, input: &Path, output: &Path) -> Result<()> {
  let source = fs::read_to_string(input)
    .with_context(|| format!("Error opening input file '{}'", input.display()))?;
  println!("Processing input file: {}", input.display());

  let batch = driver::process_lines(source.lines());
  for outcome in &batch.outcomes {
    report_line(cli, outcome);
  }

  let Some(program) = batch.program else {
    println!("No valid expressions found in the input file. No assembly generated.");
    return Ok(());
  };

  println!(
    "Generating assembly for {} expression(s)...",
    batch.outcomes.iter().filter(|o| o.result.is_ok()).count()
  );
  fs::write(output, program.to_string())
    .with_context(|| format!("Error writing assembly to file '{}'", output.display()))?;
  println!("Assembly written to '{}'.", output.display());

  if cli.no_link {
    return Ok(());
  }
  assemble_and_link(output)
}

/// Run `nasm` then `gcc` on the written assembly, next to it on disk.
fn assemble_and_link(asm_path: &Path) -> Result<()> {
  let object = asm_path.with_extension("o");
  let executable = asm_path.with_extension("");

  run_tool(
    "nasm",
    &[
      OsStr::new("-f"),
      OsStr::new("elf64"),
      asm_path.as_os_str(),
      OsStr::new("-o"),
      object.as_os_str(),
    ],
  )?;
  run_tool(
    "gcc",
    &[
      object.as_os_str(),
      OsStr::new("-no-pie"),
      OsStr::new("-o"),
      executable.as_os_str(),
    ],
  )?;
  println!("Executable written to '{}'.", executable.display());
  Ok(())
}

fn run_tool(tool: &str, args: &[&OsStr]) -> Result<()> {
  info!("running {tool} {args:?}");
  let output = Command::new(tool)
    .args(args)
    .output()
    .with_context(|| format!("failed to run {tool}; is it installed and on PATH?"))?;

  let stdout = String::from_utf8_lossy(&output.stdout);
  let stderr = String::from_utf8_lossy(&output.stderr);
  if !output.status.success() {
    bail!("{tool} failed ({}):\n{stdout}{stderr}", output.status);
  }
  if !stdout.is_empty() || !stderr.is_empty() {
    println!("{tool} output:\n{stdout}{stderr}");
  }
  println!("{tool} completed successfully.");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn output_defaults_next_to_input() {
    assert_eq!(
      output_path(Path::new("dir/exprs.txt"), None),
      PathBuf::from("dir/exprs.asm")
    );
  }

  #[test]
  fn output_gets_asm_extension() {
    assert_eq!(
      output_path(Path::new("in.txt"), Some(Path::new("out"))),
      PathBuf::from("out.asm")
    );
    assert_eq!(
      output_path(Path::new("in.txt"), Some(Path::new("out.asm"))),
      PathBuf::from("out.asm")
    );
  }

  #[test]
  fn cli_parses_flags() {
    let cli = Cli::try_parse_from(["fpcalc", "--ast", "-i", "x.txt", "-o", "y", "--no-link"]).unwrap();
    assert!(cli.ast && cli.no_link);
    assert_eq!(cli.input, Some(PathBuf::from("x.txt")));
    assert!(Cli::try_parse_from(["fpcalc", "-o", "y"]).is_err());
  }
}
