pub mod kinds;
pub mod measure;
pub mod report;

use leakscope_core::{OperationKind, Recorder, SessionParams};

/// Parse a wire name into an [`OperationKind`], or exit listing the valid
/// names. Unknown names are an argument error here; the core itself never
/// substitutes a default kind.
pub fn parse_kind(name: &str) -> OperationKind {
    match name.parse::<OperationKind>() {
        Ok(kind) => kind,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("Valid kinds:");
            for kind in OperationKind::ALL {
                eprintln!("  {kind}");
            }
            std::process::exit(2);
        }
    }
}

/// Build a recorder over the simulated counter source, seeded when requested
/// so a run can be reproduced.
pub fn make_recorder(seed: Option<u64>) -> Recorder {
    match seed {
        Some(seed) => Recorder::simulated_with_seed(seed),
        None => Recorder::simulated(),
    }
}

/// Record `sessions` simulated sessions of `kind`, each with `rounds` round
/// marks, all closed.
pub fn record_workload(
    recorder: &Recorder,
    kind: OperationKind,
    sessions: usize,
    rounds: u64,
    key_size: u64,
) {
    let params = SessionParams::with_key_size(key_size);
    for _ in 0..sessions {
        let handle = recorder.begin(kind, params);
        for round in 0..rounds {
            recorder.mark_round(&handle, round);
        }
        recorder.end(&handle);
    }
}

/// Serialize `value` as pretty JSON and write it to `path`.
pub fn write_json<T: serde::Serialize>(path: &str, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leakscope_core::{Analyzer, Report};

    // -----------------------------------------------------------------------
    // parse_kind tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_kind_accepts_wire_names() {
        assert_eq!(parse_kind("AES_ENCRYPT"), OperationKind::AesEncrypt);
        assert_eq!(parse_kind("RSA_DECRYPT"), OperationKind::RsaDecrypt);
        assert_eq!(parse_kind("KEY_DERIVATION"), OperationKind::KeyDerivation);
    }

    // -----------------------------------------------------------------------
    // record_workload tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_record_workload_closes_every_session() {
        let recorder = make_recorder(Some(1));
        record_workload(&recorder, OperationKind::AesEncrypt, 5, 3, 128);

        let store = recorder.store();
        assert_eq!(store.count(OperationKind::AesEncrypt), 5);
        let sessions = store.snapshot(OperationKind::AesEncrypt);
        assert!(sessions.iter().all(|s| !s.is_open()));
        assert!(sessions.iter().all(|s| s.round_marks.len() == 3));
    }

    #[test]
    fn test_record_workload_stamps_key_size() {
        let recorder = make_recorder(Some(2));
        record_workload(&recorder, OperationKind::RsaEncrypt, 2, 1, 4096);

        let sessions = recorder.store().snapshot(OperationKind::RsaEncrypt);
        assert!(sessions.iter().all(|s| s.params.key_size == Some(4096)));
    }

    // -----------------------------------------------------------------------
    // write_json tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_write_json_round_trips_a_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let recorder = make_recorder(Some(7));
        record_workload(&recorder, OperationKind::RsaDecrypt, 6, 4, 2048);
        let analyzer = Analyzer::new(recorder.store());
        analyzer.research_metrics(OperationKind::RsaDecrypt);
        let report = analyzer.build_report(OperationKind::RsaDecrypt);

        write_json(path.to_str().unwrap(), &report).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Report = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.id, report.id);
        assert_eq!(parsed.kind, report.kind);
        assert_eq!(parsed.overall_risk, report.overall_risk);
        assert_eq!(parsed.recommendations, report.recommendations);
    }

    #[test]
    fn test_write_json_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");

        let err = write_json(path.to_str().unwrap(), &serde_json::json!({"ok": true}));
        assert!(err.is_err());
    }
}
