//! Atai CLI - コマンドラインインターフェース
//!
//! 取り得る値の格子を組み立てて調べるためのREPLと、
//! デモ用のデバッグ情報パーサを動かすインターフェース

use anyhow::Result;
use atai_core::{
    Command, CustomDebugInfoParser, DebugFunctionInfo, DebugInfo, ParserRegistry, ValueSpec,
};
use atai_target::{Architecture, BinaryView, DwarfArchitecture, Type};
use atai_value::{PossibleValueSet, ValueFormatter};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Atai - possible value lattice explorer
#[derive(Parser)]
#[command(name = "atai")]
#[command(version = "0.1.0")]
#[command(about = "Build, inspect and encode possible-value lattice elements", long_about = None)]
struct Cli {
    /// Architecture used to name entry-value registers (x86, x86_64, arm, aarch64, riscv)
    #[arg(long, global = true)]
    arch: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Start the interactive shell (default)
    Repl,

    /// Run a single shell command and exit
    Eval {
        /// Command words, e.g. `urange 0:5 7:10`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        words: Vec<String>,
    },
}

/// REPLの状態
struct Session {
    current: PossibleValueSet,
    formatter: ValueFormatter,
    arch: Option<DwarfArchitecture>,
    registry: ParserRegistry,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let arch = match cli.arch.as_deref() {
        Some(name) => Some(
            DwarfArchitecture::from_name(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown architecture '{}'", name))?,
        ),
        None => None,
    };
    let mut session = Session {
        current: PossibleValueSet::undetermined(),
        formatter: ValueFormatter::default(),
        arch,
        registry: demo_registry()?,
    };

    match cli.command.unwrap_or(Mode::Repl) {
        Mode::Repl => run_repl(&mut session)?,
        Mode::Eval { words } => {
            if !handle_command(&mut session, &words.join(" "))? {
                anyhow::bail!("Unknown command: {}", words.join(" "));
            }
        }
    }

    Ok(())
}

/// RUST_LOG が無ければ --log-level をフィルタとして使う
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// REPLループを実行する
fn run_repl(session: &mut Session) -> Result<()> {
    println!("Atai - possible value lattice explorer");
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(atai) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(session, line) {
                    Ok(true) => {}
                    Ok(false) => {
                        println!("Unknown command: {}", line);
                        println!("Type 'help' for available commands.");
                    }
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// コマンドを実行する（解釈できなければ `false`）
fn handle_command(session: &mut Session, line: &str) -> Result<bool> {
    let Some(command) = Command::parse(line) else {
        return Ok(false);
    };

    match command {
        Command::Value(spec) => handle_value(session, &spec)?,
        Command::Contains(value) => match session.current.contains(value) {
            Ok(found) => println!(
                "{} contains {}: {}",
                session.formatter.format_value_set(&session.current),
                hex_operand(value),
                found
            ),
            Err(e) => println!("{}", e),
        },
        Command::Raw => handle_raw(session)?,
        Command::Arch(None) => match &session.arch {
            Some(arch) => println!("Architecture: {}", arch.name()),
            None => println!("Architecture: none (entry registers stay numeric)"),
        },
        Command::Arch(Some(name)) => {
            let arch = DwarfArchitecture::from_name(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown architecture '{}'", name))?;
            println!("Architecture set to {}", arch.name());
            session.arch = Some(arch);
        }
        Command::Parsers => handle_parsers(session),
        Command::Parse(view_type) => handle_parse(session, &view_type),
        Command::Help => print_help(),
        Command::Quit => handle_quit(),
    }

    Ok(true)
}

/// 所属判定の値を符号付き16進で表示する
fn hex_operand(value: i128) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{:#x}", value)
    }
}

/// Quitコマンドを処理する
fn handle_quit() {
    println!("Goodbye!");
    std::process::exit(0);
}

/// 値を作り、エンジンとの往復で変わらないことを確かめてから現在値にする
fn handle_value(session: &mut Session, spec: &ValueSpec) -> Result<()> {
    let value = spec.build()?;
    let arch = session.arch.as_ref().map(|a| a as &dyn Architecture);
    let raw = value.encode(arch)?;
    let decoded = PossibleValueSet::decode(&raw, arch)?;
    debug!(kind = %value.kind(), "built value");
    println!("{}", session.formatter.format_value_set(&decoded));
    session.current = decoded;
    Ok(())
}

/// Rawコマンドを処理する
fn handle_raw(session: &Session) -> Result<()> {
    let arch = session.arch.as_ref().map(|a| a as &dyn Architecture);
    let raw = session.current.encode(arch)?;
    println!("state: {} ({})", raw.state, session.current.kind());
    println!("value: {:#x}", raw.value);
    println!("count: {}", raw.count);
    for range in &raw.ranges {
        println!("  range: {:#018x} {:#018x} step {:#x}", range.start, range.end, range.step);
    }
    for entry in &raw.table {
        println!("  entry: {:?} -> {:#x}", entry.from_values, entry.to_value);
    }
    if !raw.value_set.is_empty() {
        println!("  values: {:?}", raw.value_set);
    }
    Ok(())
}

/// Parsersコマンドを処理する
fn handle_parsers(session: &Session) {
    let parsers = session.registry.list();
    println!("Debug-info parsers ({} registered):", parsers.len());
    for (i, parser) in parsers.iter().enumerate() {
        println!("  {}. {}", i + 1, parser.name());
    }
}

/// Parseコマンドを処理する
fn handle_parse(session: &Session, view_type: &str) {
    let mut view = BinaryView::new("demo", view_type);
    if let Some(arch) = session.arch {
        view = view.with_architecture(arch.core());
    }

    let debug_info = session.registry.parse_debug_info(&view, None);
    let types = debug_info.types();
    let functions = debug_info.functions();
    let data_variables = debug_info.data_variables();
    info!(view = view_type, parsers = ?debug_info.parser_names(), "parsed demo view");

    println!("Types ({}):", types.len());
    for t in &types {
        println!("  {}: {}", t.name, t.ty);
    }
    println!("Functions ({}):", functions.len());
    for f in &functions {
        println!("  {} ({})", f, f.full_name().unwrap_or("?"));
    }
    println!("Data variables ({}):", data_variables.len());
    for v in &data_variables {
        println!("  {}", v);
    }
}

/// ELFビューに型・関数・データ変数を追加するデモパーサ
struct DemoElfParser;

impl CustomDebugInfoParser for DemoElfParser {
    fn is_valid(&self, view: &BinaryView) -> Result<bool> {
        Ok(view.view_type() == "ELF")
    }

    fn parse_info(&self, debug_info: &DebugInfo, _view: &BinaryView) -> Result<()> {
        let size_t = Type::int(8, false);
        debug_info.add_type("size_t", &size_t)?;
        debug_info.add_function(
            &DebugFunctionInfo::new(0x401000)
                .with_raw_name("_ZN4demo4main17h0123456789abcdefE")
                .with_return_type(Type::void()),
        )?;
        debug_info.add_function(
            &DebugFunctionInfo::new(0x401100)
                .with_raw_name("_ZN4demo6lookup17h0123456789abcdefE")
                .with_return_type(Type::int(4, true))
                .with_parameter("key", size_t.clone()),
        )?;
        debug_info.add_data_variable(0x404000, &size_t, Some("TABLE_LEN"))?;
        Ok(())
    }
}

/// 適用判定で必ず失敗するデモパーサ（失敗が隔離されることを見せる）
struct DemoBrokenParser;

impl CustomDebugInfoParser for DemoBrokenParser {
    fn is_valid(&self, view: &BinaryView) -> Result<bool> {
        anyhow::bail!("cannot read the header of {}", view.file_name())
    }

    fn parse_info(&self, _debug_info: &DebugInfo, _view: &BinaryView) -> Result<()> {
        Ok(())
    }
}

fn demo_registry() -> Result<ParserRegistry> {
    let registry = ParserRegistry::new();
    registry.register("demo-elf", DemoElfParser)?;
    registry.register("demo-broken", DemoBrokenParser)?;
    Ok(registry)
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help                 - Show this help message");
    println!("  quit/exit/q          - Exit");
    println!();
    println!("Value commands (replace the current value):");
    println!("  undetermined         - Nothing is known");
    println!("  const <n>            - Constant");
    println!("  ptr <n>              - Constant pointer");
    println!("  stack <n>            - Stack frame offset");
    println!("  entry <reg|n>        - Register value at function entry (name or raw index)");
    println!("  retaddr              - Return address");
    println!("  import <n>           - Imported address");
    println!("  srange <a:b[:s]>...  - Signed ranges");
    println!("  urange <a:b[:s]>...  - Unsigned ranges");
    println!("  table <x,y=z>...     - Lookup table");
    println!("  in <n>...            - In set of values");
    println!("  notin <n>...         - Not in set of values");
    println!();
    println!("Inspection commands:");
    println!("  contains <n>         - Test membership in the current value");
    println!("  raw                  - Show the engine encoding of the current value");
    println!("  arch [name]          - Show or set the register naming architecture");
    println!();
    println!("Debug-info commands:");
    println!("  parsers              - List registered debug-info parsers");
    println!("  parse <view type>    - Run applicable parsers on a demo view (ELF, PE)");
    println!();
    println!("Examples:");
    println!("  urange 0:5 7:10");
    println!("  contains 8");
    println!("  srange -0x10:0:4");
    println!("  table 1,2=5 3=6");
    println!("  parse ELF");
}
