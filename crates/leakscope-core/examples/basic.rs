//! Basic measurement example.
//!
//! Records a batch of simulated RSA decryptions, runs every analysis
//! family, and prints the leakage report.
//!
//! Run: `cargo run --example basic`

use leakscope_core::{Analyzer, OperationKind, Recorder, SessionParams};

fn main() {
    // Recorder over the simulated counter source
    let recorder = Recorder::simulated();
    let kind = OperationKind::RsaDecrypt;

    // 32 sessions, 10 modular-exponentiation rounds each
    for _ in 0..32 {
        let handle = recorder.begin(kind, SessionParams::with_key_size(2048));
        for round in 0..10 {
            recorder.mark_round(&handle, round);
        }
        recorder.end(&handle);
    }

    let analyzer = Analyzer::new(recorder.store());
    let metrics = analyzer.research_metrics(kind);

    if let Some(timing) = &metrics.timing {
        println!(
            "Execution: mean {:.0} ns over {} sessions",
            timing.execution.mean, timing.sessions_analyzed
        );
        println!("Variable timing: {}", timing.risk.variable_timing);
    }

    // The report reads everything research_metrics just cached
    let report = analyzer.build_report(kind);
    println!("\nOverall risk: {}", report.overall_risk);
    for mitigation in &report.recommendations {
        println!("  - {mitigation}: {}", mitigation.description());
    }
}
