#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let options = kage_parser::CompileOptions {
        texture_count: 2,
        ..Default::default()
    };
    // Errors from any stage are fine; panics are not.
    if let Ok(program) = kage_parser::compile(source, &options) {
        let _ = kage_backend_glsl::emit(&program, Default::default());
        let _ = kage_backend_hlsl::emit(&program);
        let _ = kage_backend_msl::emit(&program);
    }
});
