use leakscope_core::{Analyzer, Report};

pub struct ReportCommandConfig<'a> {
    pub kind: &'a str,
    pub sessions: usize,
    pub rounds: u64,
    pub key_size: u64,
    pub seed: Option<u64>,
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: ReportCommandConfig<'_>) {
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
    // Run every family analysis first; the report only reads cached results.
    analyzer.research_metrics(kind);
    let report = analyzer.build_report(kind);

    print_report(&report);

    if let Some(path) = cfg.output_path {
        match super::write_json(path, &report) {
            Ok(()) => println!("\nReport written to {path}"),
            Err(e) => {
                eprintln!("\nFailed to write {path}: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_report(report: &Report) {
    println!("Report {} · {} · v{}", report.id, report.kind, report.version);
    println!("  overall risk     {}", report.overall_risk);
    println!(
        "  families         timing {} · cache {} · power {} · rsa {}",
        present(report.timing.is_some()),
        present(report.cache.is_some()),
        present(report.power.is_some()),
        if report.kind.is_rsa() {
            present(report.rsa.is_some())
        } else {
            "n/a"
        },
    );

    if !report.missing_families.is_empty() {
        let names: Vec<String> = report
            .missing_families
            .iter()
            .map(|f| f.to_string())
            .collect();
        println!("  missing          {}", names.join(", "));
    }

    if report.recommendations.is_empty() {
        println!("  recommendations  none");
    } else {
        println!("  recommendations");
        for mitigation in &report.recommendations {
            println!("    - {mitigation}: {}", mitigation.description());
        }
    }
}

fn present(flag: bool) -> &'static str {
    if flag { "✓" } else { "✗" }
}
