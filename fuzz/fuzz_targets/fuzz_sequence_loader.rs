#![no_main]

use std::path::Path;
use std::time::Duration;

use cadence::config::Sequence;
use cadence::config::loader::ConfigLoader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(yaml_str) = std::str::from_utf8(data) else {
        return;
    };

    let loader = ConfigLoader::with_defaults();
    let Ok(loaded) = loader.load_from_str(yaml_str, Path::new("<fuzz>")) else {
        return;
    };

    // Anything that validates must compile and survive a short virtual run.
    let Ok(sequence) = Sequence::compile_with_limits(&loaded.config, loader.limits()) else {
        return;
    };
    if let Ok((mut guard, _)) = sequence.mount() {
        guard.advance_to(Duration::from_secs(5));
        let report = guard.unmount();
        assert_eq!(report.pending_after, 0);
    }
});
