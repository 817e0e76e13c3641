use honggfuzz::fuzz;
use hod::{Config, Pipeline, Registry};

fn main() {
    let config = Config {
        max_output_bytes: 1 << 20,
        ..Config::default()
    };
    let pipeline = Pipeline::new(Registry::builtin(), config);
    loop {
        fuzz!(|data: &[u8]| {
            let Ok(text) = std::str::from_utf8(data) else { return };
            for format in pipeline.registry().formats() {
                if let Ok(keymap) = format.deserialize(text) {
                    let _ = pipeline.decode_keymap(&keymap, None);
                }
            }
        });
    }
}
