/* 📖 # What does the sharekit binary do?

It hosts the share screen on a terminal. The storage root (default: the
current directory) is treated as the device: `data/cache` is the private
cache, `storage/Download` the public downloads folder and `.media` the media
index. One click is simulated for the configured identifier, or for the one
given on the command line, and the resulting share intent is printed.

Exit codes:
- 0: the share was launched
- 1: setup failed, or the identifier could not be resolved
*/

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use sharekit_base::tracing::init_tracing;
use sharekit_base::{FilePath, PalHandle, RealPal, ShareResult};
use sharekit_engine::{
    FileResolver, ResolverWorker, ShareIntent, ShareLauncher, ShareScreen, ShareState, load_config,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory emulating the device storage
    #[arg(long)]
    root: Option<PathBuf>,
    /// Configuration file, relative to the root
    #[arg(long, default_value = "sharekit.toml")]
    config: String,
    /// Platform level to emulate
    #[arg(long)]
    sdk: Option<u32>,
    /// Content handle or private path to share instead of the configured one
    identifier: Option<String>,
}

struct PrintingLauncher;

impl ShareLauncher for PrintingLauncher {
    fn launch(&mut self, intent: &ShareIntent) -> ShareResult<()> {
        println!("Sharing {} as {}", intent.stream, intent.mime_type);
        Ok(())
    }
}

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Error: Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let cli = Cli::parse();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().unwrap_or_else(|e| {
            eprintln!("Error: Failed to get current directory: {}", e);
            process::exit(1);
        }),
    };

    debug!(root = %root.display(), "using storage root");
    let mut real_pal = RealPal::new(root);
    if let Some(level) = cli.sdk {
        real_pal = real_pal.with_sdk_level(level);
    }
    let pal = PalHandle::new(real_pal);

    let config = match load_config(&pal, &FilePath::from(cli.config.as_str())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config from {}: {}", cli.config, e);
            process::exit(1);
        }
    };

    let resolver = match FileResolver::new(pal, config.clone()) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("Error: Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    println!("Public storage: {}", resolver.storage_name());

    let worker = match ResolverWorker::start(resolver) {
        Ok(worker) => worker,
        Err(e) => {
            eprintln!("Error: Failed to start resolver worker: {}", e);
            process::exit(1);
        }
    };

    let mut screen = ShareScreen::new(worker, &config, PrintingLauncher);
    if let Some(identifier) = cli.identifier {
        screen = screen.with_identifier(identifier);
    }

    println!("Sharing {}", screen.identifier());
    screen.click();
    while screen.poll() == &ShareState::Resolving {
        std::thread::sleep(POLL_INTERVAL);
    }

    match screen.state() {
        ShareState::Shared(_) => process::exit(0),
        _ => {
            if let Some(status) = screen.status() {
                eprintln!("Error: {}", status);
            }
            process::exit(1);
        }
    }
}
