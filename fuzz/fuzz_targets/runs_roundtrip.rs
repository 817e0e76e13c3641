use honggfuzz::fuzz;
use hod::{assemble, extract_bytes, Registry};

fn main() {
    let registry = Registry::builtin();
    loop {
        fuzz!(|data: &[u8]| {
            let runs = extract_bytes(data);
            assert_eq!(assemble(&runs).unwrap(), data);
            for name in registry.strategy_names() {
                let strategy = registry.strategy(name).unwrap();
                assert_eq!(strategy.decode(&strategy.encode(&runs)).unwrap(), runs);
            }
        });
    }
}
