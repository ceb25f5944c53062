use std::env;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use memtool::cli::normalize_args;
use memtool::config::{init_logging, DEFAULT_DEVICE, DEVICE_ENV, VERBOSE_ENV};
use memtool::{execute, Applet, Arch, Config, MemtoolError, Result};

const BIN_NAME: &str = "memtool";

#[derive(Debug, Parser)]
#[command(name = BIN_NAME)]
#[command(about = "Display or modify physical memory through a single-page device mapping")]
#[command(after_help = "Applets:\n  \
    md.[b|w|l|q] <addr> [count]        dump <count> objects (default 64) starting at <addr>\n  \
    mw.[b|w|l|q] <addr> <val> [count]  write <val> to <count> objects (default 1)\n\n\
    <addr> and <val> are hex, <count> is decimal. Without a suffix the width is the\n\
    platform word size. A symlink named after an applet runs it directly.")]
struct Cli {
    /// Physical-memory device to map.
    #[arg(long, env = DEVICE_ENV, default_value = DEFAULT_DEVICE, value_name = "PATH")]
    device: PathBuf,

    /// Log debug events to stderr (RUST_LOG takes precedence).
    #[arg(short, long, env = VERBOSE_ENV)]
    verbose: bool,

    /// Applet to run: md[.b|.w|.l|.q] or mw[.b|.w|.l|.q].
    applet: Applet,

    /// Applet arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            device: self.device.clone(),
            verbose: self.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse_from(normalize_args(env::args_os().collect(), BIN_NAME));
    let config = cli.config();
    init_logging(&config);

    let code = match run(&cli, &config) {
        Ok(()) => 0,
        Err(MemtoolError::InvalidArgumentCount { op }) => {
            println!("Usage: {}", op.usage());
            0
        }
        Err(err) => {
            eprintln!("{err}");
            tracing::debug!(error = ?err, "operation failed");
            err.exit_code()
        }
    };
    process::exit(code);
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    let invocation = cli.applet.invocation(&cli.args, Arch::host())?;
    tracing::debug!(applet = cli.applet.name(), ?invocation, device = %config.device.display());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    execute(&invocation, config, &mut out)
}
