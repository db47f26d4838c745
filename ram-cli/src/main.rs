use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, ValueEnum};
use ram_core::fail::Symbol;
use ram_core::ram::{self, Instruction};
use ram_core::vm::{Register, register};
use ram_core::{
    CancellationToken, Event, Interpreter, Language, MachineConfig, StopReason, compiler, fail,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Lang {
    Ram,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Ast,
    Ram,
    None,
}

/// Assemble, compile and run programs for the RAM register machine.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file; standard input when absent
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the emitted text; standard output when absent
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language (defaults from the file extension)
    #[arg(long, value_enum)]
    lang: Option<Lang>,

    /// What to write: tokens, ast, ram or none (ram unless --run is given)
    #[arg(long, value_enum)]
    emit: Option<Emit>,

    #[arg(long, help = "Run the program on the interpreter")]
    run: bool,

    #[arg(long, default_value_t = MachineConfig::default().registers, help = "Number of general registers")]
    registers: u32,

    #[arg(long, value_name = "HZ", default_value_t = MachineConfig::default().speed, help = "Instructions per second when clocked")]
    speed: f64,

    #[arg(long, help = "Run without waiting for clock ticks")]
    real_time: bool,

    #[arg(long, value_name = "MS", help = "Cancel the run after this many milliseconds")]
    timeout_ms: Option<u64>,

    #[arg(long, help = "Print every executed instruction and register change")]
    trace: bool,

    #[arg(short, long, action = ArgAction::Count, help = "Raise the log level (repeatable)")]
    verbose: u8,
}

/// A program ready to load, with what is needed to report on it.
struct Program {
    scope: ram::Scope,
    registers: u32,
    symbols: Vec<Symbol>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    register::check_count(cli.registers).context("invalid --registers")?;
    let source = match &cli.input {
        Some(path) => compiler::load_source(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read standard input")?;
            buffer
        }
    };
    let lang = cli.lang.unwrap_or_else(|| match cli.input.as_deref().map(Language::from_path) {
        Some(Language::Fail) => Lang::Fail,
        _ => Lang::Ram,
    });
    let emit = cli
        .emit
        .unwrap_or(if cli.run { Emit::None } else { Emit::Ram });
    tracing::debug!(?lang, ?emit, "processing source");

    let (text, program) = match lang {
        Lang::Ram => prepare_ram(&source, emit, cli.registers)?,
        Lang::Fail => prepare_fail(&source, emit, cli.registers)?,
    };
    if let Some(text) = text {
        write_output(cli.output.as_deref(), &text)?;
    }

    if cli.run {
        let config = MachineConfig {
            registers: program.registers,
            speed: cli.speed,
            real_time: cli.real_time,
        };
        run(program, config, cli.timeout_ms, cli.trace)?;
    }
    Ok(())
}

fn prepare_ram(source: &str, emit: Emit, registers: u32) -> Result<(Option<String>, Program)> {
    let scope = compiler::assemble(source, registers).context("failed to assemble RAM source")?;
    let text = match emit {
        Emit::Tokens => {
            let tokens = ram::tokenize(source).context("failed to tokenize RAM source")?;
            Some(lines(&tokens))
        }
        Emit::Ast => Some(listing(&scope, true)),
        Emit::Ram => Some(listing(&scope, false)),
        Emit::None => None,
    };
    let program = Program {
        scope,
        registers,
        symbols: Vec::new(),
    };
    Ok((text, program))
}

fn prepare_fail(source: &str, emit: Emit, registers: u32) -> Result<(Option<String>, Program)> {
    let (compilation, scope) = compiler::build(source).context("failed to compile FAIL source")?;
    let text = match emit {
        Emit::Tokens => {
            let tokens = fail::tokenize(source).context("failed to tokenize FAIL source")?;
            Some(lines(&tokens))
        }
        Emit::Ast => Some(compilation.ast.to_string()),
        Emit::Ram => Some(compilation.emission.assembly.clone()),
        Emit::None => None,
    };
    let program = Program {
        scope,
        registers: compilation.emission.register_count.max(registers),
        symbols: compilation.emission.symbols,
    };
    Ok((text, program))
}

fn lines<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|item| format!("{item}\n")).collect()
}

/// Labels and instructions in memory order, optionally with addresses.
fn listing(scope: &ram::Scope, addresses: bool) -> String {
    let mut out = String::new();
    for (address, instruction) in scope.instructions.iter().enumerate() {
        for label in scope
            .labels
            .iter()
            .filter(|label| label.instruction_address as usize == address)
        {
            out.push_str(&format!("{}:\n", label.name));
        }
        if addresses {
            out.push_str(&format!("{address:>4}  {instruction}\n"));
        } else {
            out.push_str(&format!("{instruction}\n"));
        }
    }
    let end = scope.instructions.len();
    for label in scope
        .labels
        .iter()
        .filter(|label| label.instruction_address as usize >= end)
    {
        out.push_str(&format!("{}:\n", label.name));
    }
    out
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    let Some(path) = path else {
        print!("{text}");
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, text)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

fn run(program: Program, config: MachineConfig, timeout_ms: Option<u64>, trace: bool) -> Result<()> {
    let mut interpreter = Interpreter::with_config(config).context("invalid machine settings")?;
    interpreter
        .load_program(program.scope, program.registers)
        .context("failed to load program")?;
    let memory: Vec<Instruction> = interpreter.memory().to_vec();
    let names: Vec<String> = interpreter
        .registers()
        .iter()
        .map(|register| register.name.clone())
        .collect();
    let events = trace.then(|| interpreter.subscribe());

    let token = CancellationToken::new();
    if let Some(timeout_ms) = timeout_ms {
        let watchdog = token.clone();
        thread::spawn(move || {
            if !watchdog.wait_timeout(Duration::from_millis(timeout_ms)) {
                tracing::info!(timeout_ms, "timeout reached, cancelling run");
                watchdog.cancel();
            }
        });
    }

    let handle = interpreter.spawn(token.clone());
    if let Some(events) = events {
        print_trace(&events, &memory, &names);
    }
    let interpreter = handle
        .join()
        .map_err(|_| anyhow!("interpreter thread panicked"))?;
    // Releases the watchdog.
    token.cancel();

    let reason = interpreter
        .last_stop()
        .ok_or_else(|| anyhow!("interpreter stopped without a reason"))?;
    println!("stopped: {reason}");
    print_registers(interpreter.registers(), &program.symbols);

    match reason {
        StopReason::End | StopReason::EndOfProgram => Ok(()),
        StopReason::Cancelled => Err(anyhow!("run cancelled before the program finished")),
        other => Err(anyhow!("program stopped: {other}")),
    }
}

fn print_trace(events: &Receiver<Event>, memory: &[Instruction], names: &[String]) {
    for event in events.iter() {
        match event {
            Event::Started => {}
            Event::Stepped { program_counter } => {
                if let Some(instruction) = memory.get(program_counter as usize) {
                    println!("{program_counter:>4}  {instruction}");
                }
            }
            Event::RegisterChanged { index, value } => {
                let name = names.get(index).map_or("?", String::as_str);
                println!("      {name} <- {value}");
            }
            Event::Stopped { .. } => break,
        }
    }
}

fn print_registers(registers: &[Register], symbols: &[Symbol]) {
    for register in registers {
        println!("{register}");
    }
    for symbol in symbols {
        let Some(register) = registers.get(symbol.register as usize) else {
            continue;
        };
        if symbol.width > 1 {
            let end = (symbol.register + symbol.width) as usize;
            let values: Vec<String> = registers
                .get(symbol.register as usize..end.min(registers.len()))
                .unwrap_or_default()
                .iter()
                .map(|register| register.value.to_string())
                .collect();
            println!("{} = [{}] ({}..)", symbol.name, values.join(", "), register.name);
        } else {
            println!("{} = {} ({})", symbol.name, register.value, register.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    fn ram_cli() -> Command {
        Command::cargo_bin("ram-cli").expect("binary exists")
    }

    #[test]
    fn compiles_fail_to_ram_assembly() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.fail");
        fs::write(&input_path, "int x = 5;").expect("write input");
        let output_path = dir.path().join("out/input.ram");

        ram_cli()
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        let assembly = fs::read_to_string(&output_path).expect("read assembly");
        assert!(assembly.contains("LOAD #5\nSTORE 1\nEND"), "{assembly}");
    }

    #[test]
    fn runs_fail_factorial() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("factorial.fail");
        fs::write(
            &input_path,
            "int x = 5; int y = 1; while (x > 1) { y = y * x; x = x - 1; }",
        )
        .expect("write input");

        ram_cli()
            .arg("--input")
            .arg(&input_path)
            .arg("--run")
            .arg("--real-time")
            .assert()
            .success()
            .stdout(predicate::str::contains("stopped: END executed"))
            .stdout(predicate::str::contains("y = 120 (R2)"))
            .stdout(predicate::str::contains("x = 1 (R1)"));
    }

    #[test]
    fn runs_ram_from_stdin() {
        ram_cli()
            .arg("--run")
            .arg("--real-time")
            .write_stdin("LOAD #3\nADD #4\nSTORE 1\nEND\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("R1: 7"));
    }

    #[test]
    fn clocked_runs_honour_the_speed() {
        ram_cli()
            .args(["--run", "--speed", "200"])
            .write_stdin("LOAD #1\nSTORE 1\nEND\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("R1: 1"));
    }

    #[test]
    fn emits_fail_tokens_and_ast() {
        ram_cli()
            .args(["--lang", "fail", "--emit", "tokens"])
            .write_stdin("int x = 1;")
            .assert()
            .success()
            .stdout(predicate::str::contains("Keyword(Int) `int` at 1:1"));

        ram_cli()
            .args(["--lang", "fail", "--emit", "ast"])
            .write_stdin("var x = 2 + 3;")
            .assert()
            .success()
            .stdout(predicate::str::contains("int x = (2 + 3);"));
    }

    #[test]
    fn lists_ram_programs_with_labels() {
        ram_cli()
            .args(["--emit", "ast"])
            .write_stdin("start: LOAD #1\nJNZERO start\nEND")
            .assert()
            .success()
            .stdout(predicate::str::contains("START:\n   0  LOAD #1\n   1  JNZERO START"));
    }

    #[test]
    fn reports_compile_errors() {
        ram_cli()
            .args(["--lang", "fail"])
            .write_stdin("int x = 1;\nif (x) { x = 2; }")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Type Error (E1016)"));
    }

    #[test]
    fn reports_registers_out_of_bounds() {
        ram_cli()
            .args(["--registers", "2"])
            .write_stdin("LOAD 3\nEND")
            .assert()
            .failure()
            .stderr(predicate::str::contains("register 3 out of bounds"));
    }

    #[test]
    fn rejects_oversized_register_banks() {
        for lang in ["ram", "fail"] {
            ram_cli()
                .args(["--lang", lang, "--registers", "4294967295"])
                .write_stdin("")
                .assert()
                .failure()
                .stderr(predicate::str::contains("invalid --registers"))
                .stderr(predicate::str::contains("invalid register count 4294967295"));
        }
    }

    #[test]
    fn reports_division_by_zero() {
        ram_cli()
            .args(["--run", "--real-time"])
            .write_stdin("LOAD #4\nDIV #0\nEND")
            .assert()
            .failure()
            .stderr(predicate::str::contains("division by zero"));
    }

    #[test]
    fn timeout_cancels_endless_programs() {
        ram_cli()
            .args(["--run", "--real-time", "--timeout-ms", "100"])
            .write_stdin("loop: GOTO loop")
            .assert()
            .failure()
            .stdout(predicate::str::contains("stopped: cancelled"))
            .stderr(predicate::str::contains("run cancelled"));
    }

    #[test]
    fn rejects_invalid_speeds() {
        ram_cli()
            .args(["--run", "--speed", "0"])
            .write_stdin("END")
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid clock speed"));
    }

    #[test]
    fn traces_every_step() {
        ram_cli()
            .args(["--run", "--real-time", "--trace"])
            .write_stdin("LOAD #2\nSTORE 1\nEND")
            .assert()
            .success()
            .stdout(predicate::str::contains("   1  STORE 1\n      R1 <- 2"));
    }

    #[test]
    fn listing_places_trailing_labels_last() {
        let scope = compiler::assemble("GOTO done\ndone:", 1).expect("assemble");
        assert_eq!(listing(&scope, false), "GOTO DONE\nDONE:\n");
    }
}
