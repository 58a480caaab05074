//! termbridge - terminal probe
//!
//! Reports what the terminal facade sees for a set of descriptors: whether
//! each is a tty, its name, its line discipline and its window size (or,
//! on Windows, the console mode and screen buffer).
//!
//! # Quick Start
//!
//! ```text
//! termbridge                 # Probe stdin, stdout and stderr
//! termbridge --fd 3          # Probe descriptor 3 only
//! termbridge --config x.toml # Use an explicit configuration file
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use termbridge::config::{BridgeConfig, LogConfig};
use termbridge::managed::{ObjectRef, Runtime, Value};
use termbridge::{configured_facade, DescriptorBridge, TerminalFacade};

/// Command line options
#[derive(Debug, Default)]
struct Options {
    /// Descriptors to probe; stdin, stdout and stderr when empty
    fds: Vec<i32>,
    /// Explicit configuration file
    config: Option<PathBuf>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("termbridge {}", VERSION);
}

fn print_help() {
    eprintln!("termbridge {} - terminal and console probe", VERSION);
    eprintln!();
    eprintln!("Usage: termbridge [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --fd <N>              Probe descriptor N (repeatable; default 0, 1, 2)");
    eprintln!("  --config <PATH>       Configuration file (default ~/.termbridge/config.toml)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Logging honours RUST_LOG, then [log] level in the configuration.");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--fd" => {
                i += 1;
                let value = args.get(i).ok_or("Missing descriptor argument")?;
                let fd = value
                    .parse()
                    .map_err(|_| format!("Invalid descriptor: {}", value))?;
                options.fds.push(fd);
            }
            "--config" => {
                i += 1;
                let value = args.get(i).ok_or("Missing config path")?;
                options.config = Some(PathBuf::from(value));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    if options.fds.is_empty() {
        options.fds = vec![0, 1, 2];
    }
    Ok(options)
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(log.max_level()).into())
    });

    let file = log.file.as_ref().and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let result = match file {
        Some(file) => tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .finish(),
        ),
        None => tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    };
    let _ = result;
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let config = match &options.config {
        Some(path) => BridgeConfig::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BridgeConfig::load(),
    };

    init_logging(&config.log);
    info!("termbridge {} starting", VERSION);

    let runtime = Arc::new(Runtime::with_standard_classes());
    let bridge = DescriptorBridge::new(runtime.clone(), &config.descriptor)
        .context("Descriptor types are not available")?;
    let facade = configured_facade(runtime.clone(), &config);

    for &fd in &options.fds {
        if let Err(e) = probe(facade.as_ref(), &bridge, &runtime, fd) {
            error!("Probe of fd {} failed: {}", fd, e);
            eprintln!("fd {}: {}", fd, e);
        }
    }

    Ok(())
}

fn probe(
    facade: &dyn TerminalFacade,
    bridge: &DescriptorBridge,
    runtime: &Runtime,
    fd: i32,
) -> anyhow::Result<()> {
    let descriptor = bridge.wrap_descriptor(fd)?;
    println!(
        "fd {} ({}): tty={}",
        bridge.raw_descriptor(&descriptor)?,
        descriptor.class().name(),
        facade.is_tty(fd)
    );

    #[cfg(unix)]
    if let Some(posix) = facade.as_posix() {
        probe_posix(posix, runtime, fd)?;
    }

    #[cfg(windows)]
    if let Some(windows) = facade.as_windows() {
        probe_windows(windows, runtime, fd)?;
    }

    Ok(())
}

fn field(obj: &ObjectRef, name: &str) -> String {
    match obj.field(name) {
        Some(Value::Short(v)) => v.to_string(),
        Some(Value::Int(v)) => format!("{:#x}", v),
        Some(Value::Long(v)) => format!("{:#x}", v),
        Some(Value::Object(Some(nested))) => {
            let parts: Vec<String> = nested
                .class()
                .fields()
                .iter()
                .map(|decl| field(&nested, decl.name()))
                .collect();
            format!("({})", parts.join(","))
        }
        other => format!("{:?}", other),
    }
}

#[cfg(unix)]
fn probe_posix(
    posix: &termbridge::facade::PosixFacade,
    runtime: &Runtime,
    fd: i32,
) -> anyhow::Result<()> {
    use termbridge::managed::types;

    if let Some(name) = posix.tty_name(fd) {
        println!("  name: {}", name);
    }

    let attrs = runtime.new_object(types::TERMIOS)?;
    if posix.get_attributes(fd, Some(&*attrs))? == 0 {
        println!(
            "  termios: iflag={} oflag={} cflag={} lflag={} ispeed={} ospeed={}",
            field(&attrs, "c_iflag"),
            field(&attrs, "c_oflag"),
            field(&attrs, "c_cflag"),
            field(&attrs, "c_lflag"),
            field(&attrs, "c_ispeed"),
            field(&attrs, "c_ospeed"),
        );
    }

    let ws = runtime.new_object(types::WIN_SIZE)?;
    if posix.get_window_size(fd, Some(&*ws))? == 0 {
        println!("  size: {}x{}", field(&ws, "ws_col"), field(&ws, "ws_row"));
    }
    Ok(())
}

#[cfg(windows)]
fn probe_windows(
    windows: &termbridge::facade::WindowsFacade,
    runtime: &Runtime,
    fd: i32,
) -> anyhow::Result<()> {
    use termbridge::managed::{types, Array};
    use termbridge::native::console::{
        ConsoleAttributes, STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
    };

    let std_handle = match fd {
        0 => STD_INPUT_HANDLE,
        1 => STD_OUTPUT_HANDLE,
        2 => STD_ERROR_HANDLE,
        _ => return Ok(()),
    };
    let handle = windows.get_std_handle(std_handle);

    let mode = Array::zeroed::<i32>(1);
    if windows.get_console_mode(handle, Some(&mode))? != 0 {
        println!("  mode: {:#x}", mode.to_vec::<i32>()?[0]);
    }

    let info = runtime.new_object(types::CONSOLE_SCREEN_BUFFER_INFO)?;
    if windows.get_screen_buffer_info(handle, Some(&*info))? != 0 {
        println!(
            "  buffer: size={} cursor={} window={}",
            field(&info, "size"),
            field(&info, "cursorPosition"),
            field(&info, "window"),
        );
        if let Some(Value::Short(bits)) = info.field("attributes") {
            println!(
                "  attributes: {:?}",
                ConsoleAttributes::from_bits_truncate(bits as u16)
            );
        }
    }

    if fd == 0 {
        let count = Array::zeroed::<i32>(1);
        if windows.get_number_of_console_input_events(handle, Some(&count))? != 0 {
            println!(
                "  pending input: {} (batch {})",
                count.to_vec::<i32>()?[0],
                windows.input_batch()
            );
        }
    }
    println!("  output code page: {}", windows.get_console_output_cp());
    Ok(())
}
