use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use qdwconv::cases::{default_cases, find_case, load_cases, ConvCase};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run and time quantized 3x3 depthwise convolutions", long_about = None)]
struct Args {
    /// Built-in case name (see --list); runs every built-in case when omitted
    #[arg(long)]
    case: Option<String>,

    /// JSON file with an array of cases (overrides --case)
    #[arg(long)]
    cases: Option<PathBuf>,

    /// Number of workers the output is partitioned into
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Timed iterations per case
    #[arg(long, default_value_t = 20)]
    iters: usize,

    /// Seed for the generated tensors
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Compare against the nested-loop reference
    #[arg(long)]
    verify: bool,

    /// List built-in cases and exit
    #[arg(long)]
    list: bool,
}

fn select_cases(args: &Args) -> Result<Vec<ConvCase>> {
    if let Some(path) = &args.cases {
        return load_cases(path);
    }
    match args.case.as_deref() {
        Some(name) => find_case(name)
            .map(|c| vec![c])
            .with_context(|| format!("unknown case '{}' (try --list)", name)),
        None => Ok(default_cases()),
    }
}

fn run_case(case: &ConvCase, args: &Args, pool: &rayon::ThreadPool) -> Result<()> {
    let data = case.generate(args.seed)?;
    let mut out = vec![0u8; case.shape().output_len()];

    // warm-up
    pool.install(|| data.run(case, &mut out, args.threads))?;

    let t0 = Instant::now();
    for _ in 0..args.iters {
        pool.install(|| data.run(case, &mut out, args.threads))?;
    }
    let dt = t0.elapsed().as_secs_f64() / args.iters.max(1) as f64;
    let gops = if dt > 0.0 { case.ops() as f64 / dt / 1e9 } else { 0.0 };
    println!("{:<28} threads={} time={:.3}ms gops={:.2}", case.name, args.threads, dt * 1e3, gops);

    if args.verify {
        let expected = data.reference(case);
        let mismatches = out.iter().zip(&expected).filter(|(a, b)| a != b).count();
        if mismatches > 0 {
            bail!("{}: {} of {} outputs differ from the reference", case.name, mismatches, out.len());
        }
        info!("{}: matches reference", case.name);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        for c in default_cases() {
            println!(
                "{:<28} N={} H={} W={} K={} stride={}x{}",
                c.name, c.batch, c.height, c.width, c.channels, c.stride_h, c.stride_w
            );
        }
        return Ok(());
    }
    if args.threads == 0 {
        bail!("--threads must be at least 1");
    }

    let cases = select_cases(&args)?;
    let pool = rayon::ThreadPoolBuilder::new().num_threads(args.threads).build().context("build thread pool")?;
    info!("running {} case(s) with {} worker(s)", cases.len(), args.threads);
    for case in &cases {
        run_case(case, &args, &pool)?;
    }
    Ok(())
}
