use std::path::PathBuf;

use clap::Parser;

/// A small ahead-of-time compiler: source in, a self-contained x86-64
/// image (or a runtime-function archive) out.
#[derive(Parser)]
#[command(name = "njsc")]
#[command(version)]
#[command(about = "Compiles source files into a runnable native image", long_about = None)]
pub struct Cli {
    /// Source files to compile. May be omitted with `--run` to execute
    /// the image already sitting at `--out`.
    pub inputs: Vec<PathBuf>,

    /// Where to write the compiled image.
    #[arg(long = "out", short = 'o', default_value = "a.out")]
    pub out: PathBuf,

    /// Path to the runtime-function archive (`rt.oar`) used for ops like
    /// `Power` that call into precompiled helpers.
    #[arg(long = "rt-archive")]
    pub rt_archive: Option<PathBuf>,

    /// Allow `\U######`, `\e`, and octal escape sequences in string literals.
    #[arg(long = "extended-escapes")]
    pub extended_escapes: bool,

    /// Bitmask enabling non-default operators: bit 0 allows `<>`/`:=`,
    /// bit 1 disables plain `=`.
    #[arg(long = "extended-operators", default_value_t = 0)]
    pub extended_operators: u8,

    /// Accept legacy leading-zero octal integer literals.
    #[arg(long = "octal")]
    pub octal: bool,

    /// Build a runtime-function archive from the given file patterns
    /// instead of compiling an image.
    #[arg(long = "emit-archive", num_args = 1.., value_name = "PATTERN")]
    pub emit_archive: Option<Vec<String>>,

    /// Load and run the image immediately after compiling it (or, with no
    /// inputs, the image already at `--out`).
    #[arg(long = "run")]
    pub run: bool,

    /// After `--run`, print the named variable's value.
    #[arg(long = "print-var", value_name = "NAME")]
    pub print_vars: Vec<String>,

    /// Increase log verbosity (stacks: `-v` is info-ish, `-vv` is debug).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all but error-level log output.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// `--run` with no source inputs means "run the image already sitting
    /// at `--out`" rather than "compile nothing".
    pub fn run_existing(&self) -> bool {
        self.inputs.is_empty() && self.run
    }
}
