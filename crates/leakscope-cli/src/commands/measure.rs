use leakscope_core::{
    Analyzer, BasicStats, CacheAnalysis, PowerAnalysis, RsaAnalysis, TimingAnalysis,
};

pub struct MeasureCommandConfig<'a> {
    pub kind: &'a str,
    pub sessions: usize,
    pub rounds: u64,
    pub key_size: u64,
    pub seed: Option<u64>,
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: MeasureCommandConfig<'_>) {
    let kind = super::parse_kind(cfg.kind);
    let recorder = super::make_recorder(cfg.seed);

    println!(
        "Recording {} simulated {kind} session(s), {} round(s) each [{}]...\n",
        cfg.sessions,
        cfg.rounds,
        recorder.source_name()
    );
    super::record_workload(&recorder, kind, cfg.sessions, cfg.rounds, cfg.key_size);

    let analyzer = Analyzer::new(recorder.store());
    let metrics = analyzer.research_metrics(kind);

    print_timing(metrics.timing.as_ref());
    print_cache(metrics.cache.as_ref());
    print_power(metrics.power.as_ref());
    if kind.is_rsa() {
        print_rsa(metrics.rsa.as_ref());
    }

    if let Some(path) = cfg.output_path {
        match super::write_json(path, &metrics) {
            Ok(()) => println!("\nMetrics written to {path}"),
            Err(e) => {
                eprintln!("\nFailed to write {path}: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_timing(timing: Option<&TimingAnalysis>) {
    let t = match timing {
        Some(t) => t,
        None => {
            println!("Timing: no closed sessions");
            return;
        }
    };

    println!("Timing ({} session(s))", t.sessions_analyzed);
    print_stats_line("execution", &t.execution, "ns");
    if let Some(interval) = &t.round_interval {
        print_stats_line("round interval", interval, "ns");
    }
    println!(
        "  {:<16} variable timing {} · consistency {:.3} · outliers {:.1}%",
        "risk",
        yes_no(t.risk.variable_timing),
        t.risk.consistency_score,
        t.risk.outlier_ratio * 100.0
    );
    if let Some(period) = t.execution_series.dominant_period {
        println!("  {:<16} dominant period at lag {period}", "periodicity");
    }
}

fn print_cache(cache: Option<&CacheAnalysis>) {
    let c = match cache {
        Some(c) => c,
        None => {
            println!("Cache: no closed sessions");
            return;
        }
    };

    println!("Cache ({} session(s))", c.sessions_analyzed);
    println!(
        "  {:<16} mean {:.4} · max {:.4}",
        "l1 miss rate", c.l1_miss_rate.mean, c.l1_miss_rate.max
    );
    println!(
        "  {:<16} l2 mean {:.1} · l3 mean {:.1}",
        "level misses", c.l2_misses.mean, c.l3_misses.mean
    );
    println!(
        "  {:<16} {} motif(s), {} burst(s) → {} risk",
        "patterns",
        c.patterns.motifs.len(),
        c.patterns.bursts.len(),
        c.patterns.risk
    );
}

fn print_power(power: Option<&PowerAnalysis>) {
    let p = match power {
        Some(p) => p,
        None => {
            println!("Power: no closed sessions");
            return;
        }
    };

    println!("Power ({} session(s))", p.sessions_analyzed);
    print_stats_line("energy delta", &p.energy_delta, "J");
    println!(
        "  {:<16} score {:.3} · {} anomalous peak(s)",
        "dpa",
        p.dpa.vulnerability_score,
        p.dpa.anomalous_peaks.len()
    );
}

fn print_rsa(rsa: Option<&RsaAnalysis>) {
    let r = match rsa {
        Some(r) => r,
        None => {
            println!("RSA: no closed sessions");
            return;
        }
    };

    let mut sizes = r.modulus_sizes.clone();
    sizes.sort_unstable();
    sizes.dedup();

    println!("RSA ({} session(s))", r.sessions_analyzed);
    println!("  {:<16} {sizes:?} bits", "modulus sizes");
    if let Some(interval) = &r.modexp_interval {
        print_stats_line("modexp interval", interval, "ns");
    }
    println!(
        "  {:<16} key {:.1} · modulus {:.1}",
        "mean load misses",
        r.cache_behavior.mean_key_misses,
        r.cache_behavior.mean_modulus_misses
    );
}

fn print_stats_line(label: &str, stats: &BasicStats, unit: &str) {
    println!(
        "  {:<16} mean {:.1} {unit} · sd {:.1} · cv {} · range [{:.1}, {:.1}]",
        label,
        stats.mean,
        stats.std_dev,
        fmt_cv(stats.coefficient_of_variation),
        stats.min,
        stats.max
    );
}

fn fmt_cv(cv: Option<f64>) -> String {
    match cv {
        Some(cv) => format!("{cv:.2}%"),
        None => "unbounded".to_string(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
