use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use xshell::{cmd, Shell};

const PROBLEMS: [&str; 6] = [
    "buffer",
    "dining",
    "barber",
    "readers-writers",
    "smokers",
    "charging",
];

const STRATEGIES: [&str; 4] = ["lock", "semaphore", "condition", "monitor"];

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "SyncLab development tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole workspace test suite
    Test,
    /// Run one problem under one strategy with logging enabled
    Demo {
        #[arg(long, default_value = "dining")]
        problem: String,

        #[arg(long, default_value = "semaphore")]
        strategy: String,

        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Run every problem under every strategy for a short, sped-up session
    Matrix {
        #[arg(long, default_value_t = 2)]
        seconds: u64,

        #[arg(long, default_value_t = 0.05)]
        scale: f64,
    },
    /// Clean build artifacts
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    // Ensure we are in the project root
    let project_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .context("xtask is not inside the workspace")?;
    sh.change_dir(project_root);

    match cli.command {
        Commands::Test => {
            cmd!(sh, "cargo test --workspace").run()?;
        }
        Commands::Demo {
            problem,
            strategy,
            seconds,
        } => {
            let seconds = seconds.to_string();
            let _log = sh.push_env("RUST_LOG", "info");
            cmd!(
                sh,
                "cargo run -p synclab-cli -- run --problem {problem} --strategy {strategy} --seconds {seconds} --graph"
            )
            .run()?;
        }
        Commands::Matrix { seconds, scale } => {
            cmd!(sh, "cargo build -p synclab-cli").run()?;

            let seconds = seconds.to_string();
            let scale = scale.to_string();
            let mut failures = Vec::new();
            for problem in PROBLEMS {
                for strategy in STRATEGIES {
                    println!("==> {} / {}", problem, strategy);
                    let output = cmd!(
                        sh,
                        "cargo run -q -p synclab-cli -- run --problem {problem} --strategy {strategy} --seconds {seconds} --scale {scale}"
                    )
                    .ignore_status()
                    .output()?;

                    let stdout = String::from_utf8_lossy(&output.stdout);
                    print!("{}", stdout);
                    if !output.status.success() || stdout.contains("faulted") {
                        failures.push(format!("{}/{}", problem, strategy));
                    }
                }
            }

            if !failures.is_empty() {
                return Err(anyhow::anyhow!("failing runs: {}", failures.join(", ")));
            }
            println!("All {} runs finished cleanly", PROBLEMS.len() * STRATEGIES.len());
        }
        Commands::Clean => {
            cmd!(sh, "cargo clean").run()?;
        }
    }

    Ok(())
}
