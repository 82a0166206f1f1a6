//! Racewatch CLI - demo driver for the concurrency monitor

use clap::Parser;
use racewatch_core::{Racewatch, RacewatchConfig};
use racewatch_registry::{GuardName, Resolution};
use std::sync::{Arc, Barrier};

#[derive(Parser)]
#[command(name = "racewatch")]
#[command(about = "Racewatch - Concurrent-access detection for tracked objects")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a scripted two-thread conflict and print the violation report
    Demo {
        /// Skip stack capture for terser output
        #[arg(long)]
        no_stacks: bool,
    },
    /// Show how a sample guarded policy classifies its methods
    Classify,
    /// Show monitor status
    Status,
}

struct Account;

fn run_demo(no_stacks: bool) -> anyhow::Result<()> {
    let mut config = RacewatchConfig::default();
    config.tracking.capture_stacks = !no_stacks;

    let watch = Racewatch::new(config);
    watch.declare_safe::<Account>(false);
    watch.enable();

    let account = watch.track(Account);
    let acquired = Arc::new(Barrier::new(2));
    let observed = Arc::new(Barrier::new(2));

    let holder = {
        let account = account.clone();
        let acquired = Arc::clone(&acquired);
        let observed = Arc::clone(&observed);
        std::thread::spawn(move || {
            let span = account.enter("read").expect("first access cannot conflict");
            acquired.wait();
            observed.wait();
            drop(span);
        })
    };

    acquired.wait();
    match account.enter("value") {
        Ok(_span) => println!("no conflict detected (unexpected)"),
        Err(violation) => {
            println!("{}", violation.report());
        }
    }
    observed.wait();

    holder.join().expect("holder thread panicked");
    Ok(())
}

fn run_classify() {
    struct RingBuffer;

    let watch = Racewatch::new(RacewatchConfig::default());
    watch.declare_guarded::<RingBuffer, _>(|method| match method {
        "read" | "peek" => Resolution::Guard(GuardName::new("readable")),
        "write" => Resolution::Guard(GuardName::new("writable")),
        "len" => Resolution::Skip,
        _ => Resolution::Exclusive,
    });

    for method in ["read", "peek", "write", "len", "clear"] {
        println!(
            "RingBuffer::{method:<6} -> {}",
            watch.classification_of::<RingBuffer>(method)
        );
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Some(Commands::Demo { no_stacks }) => {
            run_demo(no_stacks)?;
        }
        Some(Commands::Classify) => {
            run_classify();
        }
        Some(Commands::Status) => {
            let watch = Racewatch::new(RacewatchConfig::default());
            println!(
                "racewatch v{}: enabled={}, tracked={}",
                env!("CARGO_PKG_VERSION"),
                watch.is_enabled(),
                watch.monitor().tracked_count()
            );
        }
        None => {
            println!("Racewatch v0.1.0 - Use --help for commands");
        }
    }

    Ok(())
}
