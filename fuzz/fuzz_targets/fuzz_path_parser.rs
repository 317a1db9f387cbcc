#![no_main]

use databind_model::Path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(path) = Path::parse(source) {
        let canonical = path.to_string();
        let reparsed = Path::parse(&canonical).expect("canonical form must parse");
        assert_eq!(path, reparsed);
    }
});
