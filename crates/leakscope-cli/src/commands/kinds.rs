use leakscope_core::OperationKind;

pub fn run() {
    println!(
        "{} operation kind(s) accepted by `measure --kind` / `report --kind`:\n",
        OperationKind::ALL.len()
    );

    for kind in OperationKind::ALL {
        let families = if kind.is_rsa() {
            "timing, cache, power, rsa"
        } else {
            "timing, cache, power"
        };
        println!("  {:<16} {}", kind.as_str(), families);
    }
}
