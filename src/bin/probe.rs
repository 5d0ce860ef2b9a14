use std::collections::HashMap;
use std::env;
use std::time::Instant;

use markov_dp::hmm::{empirical_marginals, ffbs_ensemble, forward_backward_model, viterbi_model};
use markov_dp::problems::cake_eating::CakeEating;
use markov_dp::problems::shortest_path::ShortestPathGraph;
use markov_dp::{
    solve_bellman, solve_continuous, BellmanOptions, ContinuousOptions, HiddenMarkovModel,
    RecursionMode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sysinfo::{get_current_pid, ProcessRefreshKind, System};

fn main() {
    let options = match Options::parse(env::args().skip(1)) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("probe: {err}");
            Options::print_help();
            std::process::exit(2);
        }
    };

    eprintln!("\n{}", "=".repeat(80));
    eprintln!("markov-dp probe: timing, memory and correctness");
    eprintln!("{}", "=".repeat(80));
    eprintln!();
    eprintln!("Each scenario runs at increasing sizes. Up to --verify-limit the result is");
    eprintln!("checked against an independent baseline:");
    eprintln!("  • forward_backward: log-domain vs termwise log-likelihood");
    eprintln!("  • viterbi: classic delta/backpointer recursion");
    eprintln!("  • ffbs_ensemble: empirical marginals vs smoothed marginals");
    eprintln!("  • value_iteration: Bellman-Ford relaxation");
    eprintln!("  • cake_eating: value function monotone on the grid");
    eprintln!();

    let mut sys = System::new();
    let mut measurements = Vec::new();

    eprintln!("[1/5] forward-backward");
    measurements.extend(run_forward_backward(&options, &mut sys));
    eprintln!("[2/5] viterbi");
    measurements.extend(run_viterbi(&options, &mut sys));
    eprintln!("[3/5] ffbs ensemble");
    measurements.extend(run_ffbs(&options, &mut sys));
    eprintln!("[4/5] value iteration on random graphs");
    measurements.extend(run_value_iteration(&options, &mut sys));
    eprintln!("[5/5] cake eating");
    measurements.extend(run_cake_eating(&options, &mut sys));
    eprintln!();

    print_summary(&measurements, &options);

    if let Err(err) = options.format.write(&measurements) {
        eprintln!("probe output error: {err}");
        std::process::exit(1);
    }
}

struct Options {
    format: OutputFormat,
    verify_limit: usize,
    seed: u64,
}

impl Options {
    fn parse<I, T>(mut args: I) -> Result<Self, String>
    where
        I: Iterator<Item = T>,
        T: Into<String>,
    {
        let mut format = OutputFormat::Csv;
        let mut verify_limit = 512usize;
        let mut seed = 7u64;

        while let Some(arg) = args.next() {
            let arg = arg.into();
            if arg == "--help" || arg == "-h" {
                Options::print_help();
                std::process::exit(0);
            } else if let Some(value) = arg.strip_prefix("--format=") {
                format = OutputFormat::from_str(value)?;
            } else if arg == "--format" {
                let value = next_value(&mut args, "--format")?;
                format = OutputFormat::from_str(&value)?;
            } else if let Some(value) = arg.strip_prefix("--verify-limit=") {
                verify_limit = parse_number(value, "verify limit")?;
            } else if arg == "--verify-limit" {
                let value = next_value(&mut args, "--verify-limit")?;
                verify_limit = parse_number(&value, "verify limit")?;
            } else if let Some(value) = arg.strip_prefix("--seed=") {
                seed = parse_number(value, "seed")?;
            } else if arg == "--seed" {
                let value = next_value(&mut args, "--seed")?;
                seed = parse_number(&value, "seed")?;
            } else {
                return Err(format!("unrecognized argument '{arg}'"));
            }
        }

        Ok(Self {
            format,
            verify_limit,
            seed,
        })
    }

    fn print_help() {
        println!(
            "\
Usage: cargo run --bin probe [-- <options>]

Options:
  --format <csv|table|json>     Output format (default: csv)
  --verify-limit <N>            Largest size checked against a baseline (default: 512)
  --seed <N>                    Seed for generated models and graphs (default: 7)
  -h, --help                    Print this help message

Examples:
  cargo run --bin probe
  cargo run --release --features parallel --bin probe -- --format table
"
        );
    }
}

fn next_value<I, T>(args: &mut I, flag: &str) -> Result<String, String>
where
    I: Iterator<Item = T>,
    T: Into<String>,
{
    args.next()
        .map(Into::into)
        .ok_or_else(|| format!("missing value after {flag}"))
}

fn parse_number<N: std::str::FromStr>(value: &str, what: &str) -> Result<N, String> {
    value
        .parse::<N>()
        .map_err(|_| format!("{what} must be a non-negative integer"))
}

#[derive(Copy, Clone)]
enum OutputFormat {
    Csv,
    Table,
    Json,
}

impl OutputFormat {
    fn from_str(value: &str) -> Result<Self, String> {
        match value {
            "csv" => Ok(Self::Csv),
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}'")),
        }
    }

    fn write(self, measurements: &[Measurement]) -> Result<(), String> {
        match self {
            OutputFormat::Csv => write_csv(measurements),
            OutputFormat::Table => write_table(measurements),
            OutputFormat::Json => write_json(measurements),
        }
    }
}

#[derive(Clone)]
struct Measurement {
    scenario: &'static str,
    size_desc: String,
    wall_s: f64,
    rss_delta_kib: u64,
    verification_status: VerificationStatus,
    verification_detail: Option<String>,
}

#[derive(Clone, Copy)]
enum VerificationStatus {
    NotChecked,
    Passed,
    Failed,
}

impl VerificationStatus {
    fn label(&self) -> &'static str {
        match self {
            VerificationStatus::NotChecked => "not_checked",
            VerificationStatus::Passed => "passed",
            VerificationStatus::Failed => "failed",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            VerificationStatus::Passed => "✓",
            VerificationStatus::Failed => "✗",
            VerificationStatus::NotChecked => "○",
        }
    }
}

type Verification = (VerificationStatus, Option<String>);

fn check(passed: bool, detail: impl FnOnce() -> String) -> Verification {
    if passed {
        (VerificationStatus::Passed, None)
    } else {
        (VerificationStatus::Failed, Some(detail()))
    }
}

fn failure(err: impl std::fmt::Display) -> Verification {
    (VerificationStatus::Failed, Some(err.to_string()))
}

fn report(m: &Measurement, extra: &str) {
    eprintln!(
        "      {} {} {}, time={:.3}s, status={}",
        m.verification_status.icon(),
        m.size_desc,
        extra,
        m.wall_s,
        m.verification_status.label()
    );
}

fn run_forward_backward(options: &Options, sys: &mut System) -> Vec<Measurement> {
    const LENGTHS: &[usize] = &[64, 256, 512, 1024, 4096, 16384, 65536];
    let model = demo_hmm();
    let mut rng = StdRng::seed_from_u64(options.seed);

    LENGTHS
        .iter()
        .map(|&len| {
            let obs = sample_observations(&model, len, &mut rng);
            let mut loglik = f64::NAN;
            let m = measure("forward_backward", format!("obs_len={len}"), sys, || {
                let post = match forward_backward_model(&model, &obs, RecursionMode::LogDomain) {
                    Ok(post) => post,
                    Err(err) => return failure(err),
                };
                loglik = post.log_likelihood;
                if len > options.verify_limit {
                    return (VerificationStatus::NotChecked, None);
                }
                match forward_backward_model(&model, &obs, RecursionMode::Termwise) {
                    Ok(lin) => check(
                        lin.warnings.is_empty() && (lin.log_likelihood - loglik).abs() <= 1e-8,
                        || {
                            format!(
                                "termwise loglik={:.6}, log-domain={loglik:.6}, warnings={}",
                                lin.log_likelihood,
                                lin.warnings.len()
                            )
                        },
                    ),
                    Err(err) => failure(err),
                }
            });
            report(&m, &format!("loglik={loglik:.3}"));
            m
        })
        .collect()
}

fn run_viterbi(options: &Options, sys: &mut System) -> Vec<Measurement> {
    const LENGTHS: &[usize] = &[64, 256, 512, 1024, 4096, 16384, 65536];
    let model = demo_hmm();
    let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(1));

    LENGTHS
        .iter()
        .map(|&len| {
            let obs = sample_observations(&model, len, &mut rng);
            let mut logp = f64::NAN;
            let m = measure("viterbi", format!("obs_len={len}"), sys, || {
                let path = match viterbi_model(&model, &obs) {
                    Ok(path) => path,
                    Err(err) => return failure(err),
                };
                logp = path.log_probability;
                if len > options.verify_limit {
                    return (VerificationStatus::NotChecked, None);
                }
                let baseline = viterbi_baseline(&model, &obs);
                check((baseline - logp).abs() <= 1e-6, || {
                    format!("baseline logp={baseline:.6}, got={logp:.6}")
                })
            });
            report(&m, &format!("logp={logp:.3}"));
            m
        })
        .collect()
}

fn run_ffbs(options: &Options, sys: &mut System) -> Vec<Measurement> {
    const CONFIGS: &[(usize, usize)] = &[(32, 2_000), (128, 2_000), (512, 5_000), (4096, 1_000)];
    let model = demo_hmm();
    let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(2));

    CONFIGS
        .iter()
        .map(|&(len, draws)| {
            let obs = sample_observations(&model, len, &mut rng);
            let mut max_dev = f64::NAN;
            let m = measure("ffbs_ensemble", format!("obs_len={len},draws={draws}"), sys, || {
                let post = match forward_backward_model(&model, &obs, RecursionMode::LogDomain) {
                    Ok(post) => post,
                    Err(err) => return failure(err),
                };
                let paths = match ffbs_ensemble(&post, model.chain(), options.seed, draws) {
                    Ok(paths) => paths,
                    Err(err) => return failure(err),
                };
                if len > options.verify_limit {
                    return (VerificationStatus::NotChecked, None);
                }
                let empirical = match empirical_marginals(&paths, 2) {
                    Ok(empirical) => empirical,
                    Err(err) => return failure(err),
                };
                max_dev = empirical
                    .iter()
                    .flatten()
                    .zip(post.smoothed.iter().flatten())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max);
                // loose bound: many marginals, few thousand draws
                check(max_dev <= 0.06, || format!("max marginal deviation {max_dev:.4}"))
            });
            report(&m, &format!("max_dev={max_dev:.4}"));
            m
        })
        .collect()
}

fn run_value_iteration(options: &Options, sys: &mut System) -> Vec<Measurement> {
    const CONFIGS: &[(usize, usize)] = &[(64, 4), (256, 4), (1024, 6), (4096, 8), (16384, 8)];
    let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(3));

    CONFIGS
        .iter()
        .map(|&(n, degree)| {
            let adjacency = random_graph(n, degree, &mut rng);
            let mut iterations = 0;
            let m = measure("value_iteration", format!("vertices={n},degree={degree}"), sys, || {
                let graph = match ShortestPathGraph::from_adjacency(adjacency.clone(), 0) {
                    Ok(graph) => graph,
                    Err(err) => return failure(err),
                };
                let opts = BellmanOptions::default().with_max_iterations(n + 1);
                let sol = match solve_bellman(&graph, &opts) {
                    Ok(sol) => sol,
                    Err(err) => return failure(err),
                };
                iterations = sol.iterations;
                if n > options.verify_limit {
                    return (VerificationStatus::NotChecked, None);
                }
                let baseline = bellman_ford(&adjacency, 0);
                let mismatch = sol
                    .values
                    .iter()
                    .zip(&baseline)
                    .position(|(a, b)| a != b && (a - b).abs() > 1e-9);
                check(mismatch.is_none(), || {
                    let v = mismatch.unwrap_or_default();
                    format!("vertex {v}: baseline={}, got={}", baseline[v], sol.values[v])
                })
            });
            report(&m, &format!("iterations={iterations}"));
            m
        })
        .collect()
}

fn run_cake_eating(options: &Options, sys: &mut System) -> Vec<Measurement> {
    const GRID_SIZES: &[usize] = &[25, 50, 100, 200];
    let cake = match CakeEating::new(0.9, 0.5) {
        Ok(cake) => cake,
        Err(err) => {
            eprintln!("      cake eating setup failed: {err}");
            return Vec::new();
        }
    };

    GRID_SIZES
        .iter()
        .map(|&points| {
            let grid: Vec<f64> = (0..points)
                .map(|i| 2.5 * i as f64 / (points - 1) as f64)
                .collect();
            let mut iterations = 0;
            let m = measure("cake_eating", format!("grid={points}"), sys, || {
                let sol = match solve_continuous(&cake, &grid, &ContinuousOptions::default()) {
                    Ok(sol) => sol,
                    Err(err) => return failure(err),
                };
                iterations = sol.iterations;
                if points > options.verify_limit {
                    return (VerificationStatus::NotChecked, None);
                }
                let drop = sol.values.windows(2).position(|w| w[1] < w[0] - 1e-9);
                check(drop.is_none(), || {
                    format!("value decreases after grid point {}", drop.unwrap_or_default())
                })
            });
            report(&m, &format!("iterations={iterations}"));
            m
        })
        .collect()
}

fn print_summary(measurements: &[Measurement], options: &Options) {
    eprintln!("{}", "=".repeat(80));
    eprintln!("Summary");
    eprintln!("{}", "=".repeat(80));

    let mut passed = 0;
    let mut failed = 0;
    let mut not_checked = 0;
    for m in measurements {
        match m.verification_status {
            VerificationStatus::Passed => passed += 1,
            VerificationStatus::Failed => failed += 1,
            VerificationStatus::NotChecked => not_checked += 1,
        }
    }
    let total = measurements.len().max(1) as f64;
    eprintln!("  ✓ Passed: {passed} ({:.1}%)", 100.0 * passed as f64 / total);
    eprintln!("  ✗ Failed: {failed} ({:.1}%)", 100.0 * failed as f64 / total);
    eprintln!(
        "  ○ Not checked (size > {}): {not_checked} ({:.1}%)",
        options.verify_limit,
        100.0 * not_checked as f64 / total
    );
    eprintln!();

    if failed > 0 {
        eprintln!("Failed:");
        for m in measurements {
            if matches!(m.verification_status, VerificationStatus::Failed) {
                eprintln!("  ✗ {} ({})", m.scenario, m.size_desc);
                if let Some(ref detail) = m.verification_detail {
                    eprintln!("     {detail}");
                }
            }
        }
        eprintln!();
    }

    let mut by_scenario: HashMap<&str, Vec<&Measurement>> = HashMap::new();
    for m in measurements {
        by_scenario.entry(m.scenario).or_default().push(m);
    }
    let mut scenarios: Vec<_> = by_scenario.into_iter().collect();
    scenarios.sort_by_key(|(name, _)| *name);
    for (scenario, ms) in scenarios {
        let max_time = ms.iter().map(|m| m.wall_s).fold(0.0, f64::max);
        let max_mem = ms.iter().map(|m| m.rss_delta_kib).max().unwrap_or(0);
        eprintln!(
            "  {scenario}: runs={}, max_time={max_time:.3}s, max_rss_delta={max_mem} KiB",
            ms.len()
        );
    }
    eprintln!("{}", "=".repeat(80));
    eprintln!();
}

fn measure<F>(
    scenario: &'static str,
    size_desc: String,
    sys: &mut System,
    compute: F,
) -> Measurement
where
    F: FnOnce() -> Verification,
{
    let before = rss_kib(sys);
    let start = Instant::now();
    let (status, detail) = compute();
    let duration = start.elapsed();
    let after = rss_kib(sys);

    Measurement {
        scenario,
        size_desc,
        wall_s: duration.as_secs_f64(),
        rss_delta_kib: after.saturating_sub(before),
        verification_status: status,
        verification_detail: detail,
    }
}

fn write_csv(measurements: &[Measurement]) -> Result<(), String> {
    println!("scenario,size_desc,wall_s,rss_delta_kib,verification_status,verification_detail");
    for m in measurements {
        let detail = m
            .verification_detail
            .as_ref()
            .map(|s| s.replace('"', "'"))
            .unwrap_or_default();
        println!(
            "{},\"{}\",{:.3},{},{},\"{}\"",
            m.scenario,
            m.size_desc,
            m.wall_s,
            m.rss_delta_kib,
            m.verification_status.label(),
            detail
        );
    }
    Ok(())
}

fn write_table(measurements: &[Measurement]) -> Result<(), String> {
    let col1 = measurements
        .iter()
        .map(|m| m.scenario.len())
        .fold("scenario".len(), usize::max);
    let col2 = measurements
        .iter()
        .map(|m| m.size_desc.len())
        .fold("size".len(), usize::max);

    println!(
        "{:<col1$}  {:<col2$}  {:>12}  {:>14}  {:>12}  detail",
        "scenario", "size", "wall_s", "rss_delta_kib", "status",
    );
    println!(
        "{:-<col1$}  {:-<col2$}  {:-<12}  {:-<14}  {:-<12}  {:-<12}",
        "", "", "", "", "", "",
    );
    for m in measurements {
        println!(
            "{:<col1$}  {:<col2$}  {:>12.3}  {:>14}  {:>12}  {}",
            m.scenario,
            m.size_desc,
            m.wall_s,
            m.rss_delta_kib,
            m.verification_status.label(),
            m.verification_detail.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

fn write_json(measurements: &[Measurement]) -> Result<(), String> {
    println!("[");
    for (idx, m) in measurements.iter().enumerate() {
        let detail = match m.verification_detail {
            Some(ref d) => format!("\"{}\"", d.replace('"', "'")),
            None => "null".to_string(),
        };
        println!(
            "  {{\"scenario\":\"{}\",\"size\":\"{}\",\"wall_s\":{:.3},\"rss_delta_kib\":{},\"verification\":{{\"status\":\"{}\",\"detail\":{}}}}}{}",
            m.scenario,
            m.size_desc,
            m.wall_s,
            m.rss_delta_kib,
            m.verification_status.label(),
            detail,
            if idx + 1 == measurements.len() { "" } else { "," }
        );
    }
    println!("]");
    Ok(())
}

fn rss_kib(sys: &mut System) -> u64 {
    sys.refresh_processes_specifics(ProcessRefreshKind::new());
    if let Some(process) = get_current_pid().ok().and_then(|pid| sys.process(pid)) {
        process.memory() / 1024
    } else {
        0
    }
}

fn demo_hmm() -> HiddenMarkovModel {
    HiddenMarkovModel::from_matrices(
        vec![vec![0.9, 0.1], vec![0.2, 0.8]],
        vec![vec![0.8, 0.2], vec![0.3, 0.7]],
        None,
    )
    .unwrap_or_else(|err| {
        eprintln!("probe: demo model rejected: {err}");
        std::process::exit(1);
    })
}

fn sample_observations(model: &HiddenMarkovModel, len: usize, rng: &mut StdRng) -> Vec<usize> {
    match model.sample(len, rng) {
        Ok((_, obs)) => obs,
        Err(err) => {
            eprintln!("probe: sampling failed: {err}");
            std::process::exit(1);
        }
    }
}

/// Classic forward Viterbi with back-pointers; returns the best log-probability.
fn viterbi_baseline(model: &HiddenMarkovModel, obs: &[usize]) -> f64 {
    let log_p = model.chain().log_matrix();
    let log_e = model.emission().log_matrix();
    let log_pi = model.initial().log_probabilities();
    let n = log_p.len();

    let mut delta: Vec<f64> = (0..n).map(|s| log_pi[s] + log_e[s][obs[0]]).collect();
    for &y in &obs[1..] {
        delta = (0..n)
            .map(|to| {
                let best = (0..n)
                    .map(|from| delta[from] + log_p[from][to])
                    .fold(f64::NEG_INFINITY, f64::max);
                best + log_e[to][y]
            })
            .collect();
    }
    delta.into_iter().fold(f64::NEG_INFINITY, f64::max)
}

/// Random graph whose edges all point towards lower indices, so vertex 0 is
/// reachable from every vertex through edge `v -> v - 1`.
fn random_graph(n: usize, degree: usize, rng: &mut StdRng) -> Vec<Vec<(usize, f64)>> {
    (0..n)
        .map(|v| {
            if v == 0 {
                return Vec::new();
            }
            let mut edges = vec![(v - 1, rng.gen_range(1.0..10.0))];
            for _ in 1..degree {
                edges.push((rng.gen_range(0..v), rng.gen_range(1.0..10.0)));
            }
            edges
        })
        .collect()
}

fn bellman_ford(adjacency: &[Vec<(usize, f64)>], terminal: usize) -> Vec<f64> {
    let n = adjacency.len();
    let mut dist = vec![f64::INFINITY; n];
    dist[terminal] = 0.0;
    for _ in 0..n {
        let mut changed = false;
        for (u, edges) in adjacency.iter().enumerate() {
            if u == terminal {
                continue;
            }
            for &(v, cost) in edges {
                let cand = cost + dist[v];
                if cand < dist[u] {
                    dist[u] = cand;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    dist
}
