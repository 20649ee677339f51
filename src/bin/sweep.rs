use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use qdwconv::cases::{default_cases, load_cases};

#[derive(Parser, Debug)]
#[command(name = "sweep", about = "Check thread-count invariance of every case against the reference")]
struct Args {
    /// Largest worker count to try
    #[arg(long, default_value_t = 8)]
    max_threads: usize,

    /// JSON file with an array of cases (defaults to the built-in cases)
    #[arg(long)]
    cases: Option<std::path::PathBuf>,

    /// Seed for the generated tensors
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cases = match &args.cases {
        Some(p) => load_cases(p)?,
        None => default_cases(),
    };
    let max_threads = args.max_threads.max(1);

    let pb = ProgressBar::new((cases.len() * max_threads) as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?);

    let mut failures = 0usize;
    for case in &cases {
        let data = case.generate(args.seed)?;
        let expected = data.reference(case);
        for threads in 1..=max_threads {
            pb.set_message(format!("{} x{}", case.name, threads));
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().context("build thread pool")?;
            let mut out = vec![0u8; expected.len()];
            pool.install(|| data.run(case, &mut out, threads))?;
            if out != expected {
                let bad = out.iter().zip(&expected).filter(|(a, b)| a != b).count();
                warn!("{} with {} workers: {} outputs differ", case.name, threads, bad);
                failures += 1;
            }
            pb.inc(1);
        }
    }
    pb.finish_with_message("done");

    if failures > 0 {
        bail!("{} case/thread combinations differ from the reference", failures);
    }
    info!("{} cases x {} thread counts identical to the reference", cases.len(), max_threads);
    println!("ok: {} cases, 1..={} workers", cases.len(), max_threads);
    Ok(())
}
