mod car;
mod demo;
mod observer;

use anyhow::{Result, bail};
use demo::DemoSettings;

#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn help_string() -> String {
    format!(
        "{version}

Walks a Car through the lifecycle of a shared pointer,
printing each control block and handle event along the way.

USAGE:
    tally [FLAGS] [OPTIONS]

FLAGS:
    -r, --raw         Adopt a boxed Car through a raw pointer instead of using make_shared
    -q, --quiet       Don't print lifecycle events
    -V, --version     Prints version information
    -h, --help        Prints help information

OPTIONS:
    -v, --value N     The Car's value (default: 50)
    -c, --copies N    The number of handles to clone before teardown (default: 0)
",
        version = version_string()
    )
}

fn version_string() -> String {
    format!("Tally {}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Default)]
struct TallyArgs {
    help: bool,
    version: bool,
    settings: DemoSettings,
}

fn parse_arguments() -> Result<TallyArgs> {
    let mut args = pico_args::Arguments::from_env();

    let help = args.contains(["-h", "--help"]);
    let version = args.contains(["-V", "--version"]);

    let defaults = DemoSettings::default();
    let settings = DemoSettings {
        raw: args.contains(["-r", "--raw"]),
        quiet: args.contains(["-q", "--quiet"]),
        value: args
            .opt_value_from_str(["-v", "--value"])?
            .unwrap_or(defaults.value),
        copies: args
            .opt_value_from_str(["-c", "--copies"])?
            .unwrap_or(defaults.copies),
    };

    let remaining = args.finish();
    if let Some(unused) = remaining.first() {
        bail!("Unsupported argument: {}", unused.to_string_lossy());
    }

    Ok(TallyArgs {
        help,
        version,
        settings,
    })
}

fn main() -> Result<()> {
    let args = match parse_arguments() {
        Ok(args) => args,
        Err(error) => {
            bail!("{}\n\n{}", help_string(), error);
        }
    };

    if args.help {
        println!("{}", help_string());
        return Ok(());
    }

    if args.version {
        println!("{}", version_string());
        return Ok(());
    }

    demo::run(&args.settings)
}
