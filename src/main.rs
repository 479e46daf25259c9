use std::path::PathBuf;

use lexir::{
    config::{ConfigError, TranslatorConfig},
    frontend::ast::{builder::ProgramBuilder, BinaryOperator, Program},
    midend::linearizer::{translate, Severity, TranslationError},
};
use thiserror::Error;

mod trace;

#[derive(Debug)]
enum TraceLocation {
    NoTrace,
    Stdout,
    File,
}

#[derive(Debug)]
struct DriverArguments {
    trace_location: TraceLocation,
    trace_level: tracing::Level,
    config: Option<PathBuf>,
    json: bool,
    input: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("Couldn't read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("Couldn't create trace file: {0}")]
    TraceFile(std::io::Error),
}

fn parse_arguments(args: impl Iterator<Item = String>) -> DriverArguments {
    let mut arguments = DriverArguments {
        trace_location: TraceLocation::NoTrace,
        trace_level: tracing::Level::WARN,
        config: None,
        json: false,
        input: None,
    };

    for argument in args {
        match argument.as_str() {
            "trace_file" => arguments.trace_location = TraceLocation::File,
            "trace_stdout" => arguments.trace_location = TraceLocation::Stdout,
            "trace_level_trace" => arguments.trace_level = tracing::Level::TRACE,
            "trace_level_debug" => arguments.trace_level = tracing::Level::DEBUG,
            "trace_level_info" => arguments.trace_level = tracing::Level::INFO,
            "trace_level_warn" => arguments.trace_level = tracing::Level::WARN,
            "trace_level_error" => arguments.trace_level = tracing::Level::ERROR,
            "json" => arguments.json = true,
            other => match other.strip_prefix("config=") {
                Some(path) => arguments.config = Some(path.into()),
                None => arguments.input = Some(other.into()),
            },
        }
    }
    arguments
}

fn install_tracing(arguments: &DriverArguments) -> Result<(), DriverError> {
    match arguments.trace_location {
        TraceLocation::NoTrace => (),
        TraceLocation::Stdout => {
            tracing_subscriber::fmt()
                .pretty()
                .with_writer(std::io::stdout)
                .with_max_level(arguments.trace_level)
                .init();
        }
        TraceLocation::File => {
            let outfile = std::fs::File::create("most_recent").map_err(DriverError::TraceFile)?;
            let writer = tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::sync::Mutex::new(outfile));
            tracing_subscriber::fmt()
                .with_writer(writer)
                .with_ansi(false)
                .with_max_level(arguments.trace_level)
                .init();
        }
    }
    Ok(())
}

/// `make(n)` returns a counter closure over `n`; the script calls it once.
fn demo_program() -> Program {
    let mut builder = ProgramBuilder::new();
    let n = builder.var("n");
    let one = builder.int(1);
    let bumped = builder.binary(BinaryOperator::Add, n, one);
    let update = builder.assign_var("n", bumped);
    let n = builder.var("n");
    let return_ = builder.return_(Some(n));
    let counter_body = builder.block(vec![update, return_]);
    let counter = builder.function_entity("counter", &[], counter_body);
    let function = builder.function(counter);
    let make_body = builder.return_(Some(function));
    let make = builder.function_entity("make", &["n"], make_body);

    let statement = builder.function_stmt(make);
    let zero = builder.int(0);
    let call = builder.call_var("make", vec![zero]);
    let counted = builder.assign_var("next", call);
    let body = builder.block(vec![statement, counted]);
    builder.script("demo", body);
    builder.finish()
}

fn run(arguments: &DriverArguments) -> Result<(), DriverError> {
    let config = match &arguments.config {
        Some(path) => TranslatorConfig::load(path)?,
        None => TranslatorConfig::default(),
    };

    let program = match &arguments.input {
        Some(path) => {
            let _span = trace::span_auto!(tracing::Level::DEBUG, "read program", path = %path.display());
            let text = std::fs::read_to_string(path).map_err(|source| DriverError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str::<Program>(&text)?
        }
        None => {
            trace::debug!("no input given, translating the demo program");
            demo_program()
        }
    };

    let translation = translate(&program, &config)?;
    for diagnostic in &translation.diagnostics {
        match diagnostic.severity {
            Severity::Info => tracing::info!("{}", diagnostic),
            Severity::Warning => trace::warning!("{}", diagnostic),
            Severity::Error => trace::error!("{}", diagnostic),
        }
    }

    if arguments.json {
        println!("{}", serde_json::to_string_pretty(&translation)?);
    } else {
        print!("{}", translation);
    }
    Ok(())
}

fn main() {
    let arguments = parse_arguments(std::env::args().skip(1));

    if let Err(error) = install_tracing(&arguments) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
    trace::debug!("{:?}", arguments);

    if let Err(error) = run(&arguments) {
        trace::error!("{}", error);
        eprintln!("{}", error);
        std::process::exit(1);
    }
}
