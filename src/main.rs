mod cli;
mod compiler;
mod diagnostics;
mod literal;
mod position;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use crate::cli::Cli;
use crate::compiler::archive::Archive;
use crate::compiler::ast::{Arena, SyntaxKind};
use crate::compiler::emitter::Emitter;
use crate::compiler::image::RunningFile;
use crate::compiler::lexer::{Lexer, LexerOptions};
use crate::diagnostics::DiagnosticSink;
use crate::position::Position;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(&cli);

    let result = if let Some(patterns) = &cli.emit_archive {
        run_emit_archive(&cli, patterns)
    } else if cli.run_existing() {
        run_existing_image(&cli)
    } else {
        compile_and_maybe_run(&cli)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn init_logger(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
}

fn run_emit_archive(_cli: &Cli, patterns: &[String]) -> Result<(), String> {
    let archive = Archive::create(patterns).map_err(|e| e.to_string())?;
    log::info!("bundled {} runtime function(s)", archive.len());
    std::fs::write("rt.oar", archive.save()).map_err(|e| e.to_string())?;
    Ok(())
}

fn compile_and_maybe_run(cli: &Cli) -> Result<(), String> {
    let sink = DiagnosticSink::global();
    let mut arena = Arena::new();
    let root = arena.create(SyntaxKind::Root, Position::new("<program>"));

    for input in &cli.inputs {
        let source = std::fs::read_to_string(input).map_err(|e| format!("{}: {e}", input.display()))?;
        let options = LexerOptions {
            extended_escape_sequences: cli.extended_escapes,
            extended_operators: cli.extended_operators,
            octal: cli.octal,
        };
        let filename = input.to_string_lossy().to_string();
        let mut lexer = Lexer::new(&source, filename, options, sink);
        // Parsing is out of scope: every token is recorded as a standalone
        // statement under the root so the flattener has something to walk.
        loop {
            let token = lexer.get_next_token(true);
            if token.kind == SyntaxKind::Eof {
                break;
            }
            let node = arena.create(token.kind, token.position);
            match token.payload {
                crate::compiler::ast::Payload::Integer(v) => arena.set_integer(node, v),
                crate::compiler::ast::Payload::Float(v) => arena.set_float(node, v),
                crate::compiler::ast::Payload::String(s) => arena.set_string(node, s),
                crate::compiler::ast::Payload::None => {}
            }
            arena.append_child(root, node);
        }
    }

    if sink.error_count() > 0 {
        return Err(format!("compilation failed with {} error(s)", sink.error_count()));
    }

    let rt_dir = cli.rt_archive.as_deref().and_then(Path::parent_or_self).unwrap_or_else(|| PathBuf::from("."));
    let mut emitter = Emitter::new(rt_dir);
    let bytes = emitter.output(root, &arena, sink).map_err(|e| e.to_string())?;
    std::fs::write(&cli.out, &bytes).map_err(|e| e.to_string())?;
    log::info!("wrote image to {}", cli.out.display());

    if cli.run {
        run_image(&cli.out, &cli.print_vars)?;
    }
    Ok(())
}

fn run_existing_image(cli: &Cli) -> Result<(), String> {
    run_image(&cli.out, &cli.print_vars)
}

fn run_image(path: &Path, print_vars: &[String]) -> Result<(), String> {
    let mut image = RunningFile::load(path).map_err(|e| e.to_string())?;
    let result = image.run().map_err(|e| e.to_string())?;
    println!("{result}");
    for name in print_vars {
        match image.get_integer(name).map(|v| v.to_string()).or_else(|| image.get_float(name).map(|v| v.to_string())).or_else(|| image.get_string(name)) {
            Some(value) => println!("{name} = {value}"),
            None => log::warn!("no such variable `{name}`"),
        }
    }
    Ok(())
}

/// Small local helper: `path.parent()`, or the path itself when it names a
/// bare directory with no file component (e.g. `--rt-archive libs`).
trait ParentOrSelf {
    fn parent_or_self(&self) -> Option<PathBuf>;
}

impl ParentOrSelf for Path {
    fn parent_or_self(&self) -> Option<PathBuf> {
        if self.is_dir() {
            Some(self.to_path_buf())
        } else {
            self.parent().map(|p| p.to_path_buf())
        }
    }
}
