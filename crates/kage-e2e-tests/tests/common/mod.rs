use kage_backend_core::{Backend, BackendOptions, BackendOutput, BackendRegistry, GlslVersion};
use kage_ir::Program;
use kage_parser::CompileOptions;

/// Compile Kage source with default entry names and `textures` textures.
#[allow(dead_code)]
pub fn compile(source: &str, textures: usize) -> Program {
    let options = CompileOptions {
        texture_count: textures,
        ..CompileOptions::default()
    };
    kage_parser::compile(source, &options).unwrap_or_else(|e| panic!("compile failed:\n{e}"))
}

/// Compile Kage source that is expected to fail and return the message.
#[allow(dead_code)]
pub fn compile_err(source: &str) -> String {
    match kage_parser::compile(source, &CompileOptions::default()) {
        Ok(_) => panic!("expected a compile error"),
        Err(err) => err.to_string(),
    }
}

/// A registry holding every shader backend.
#[allow(dead_code)]
pub fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(kage_backend_glsl::GlslBackend));
    registry.register(Box::new(kage_backend_hlsl::HlslBackend));
    registry.register(Box::new(kage_backend_msl::MslBackend));
    registry
}

/// Run one backend over a program.
#[allow(dead_code)]
pub fn emit(program: &Program, backend: &dyn Backend) -> BackendOutput {
    backend
        .compile(
            program,
            &BackendOptions {
                glsl_version: GlslVersion::Default,
            },
        )
        .unwrap_or_else(|e| panic!("{} backend failed: {e}", backend.name()))
}

/// Text of a named output file.
#[allow(dead_code)]
pub fn text<'a>(output: &'a BackendOutput, name: &str) -> &'a str {
    output
        .text(name)
        .unwrap_or_else(|| panic!("missing output file {name}"))
}

/// MSB-first bit writer for synthesizing MP3 frames.
#[derive(Default)]
#[allow(dead_code)]
pub struct BitWriter {
    bytes: Vec<u8>,
    len: usize,
}

#[allow(dead_code)]
impl BitWriter {
    pub fn put(&mut self, value: u32, bits: u32) {
        for i in (0..bits).rev() {
            if self.len % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                *self.bytes.last_mut().unwrap() |= 0x80 >> (self.len % 8);
            }
            self.len += 1;
        }
    }

    pub fn padded(mut self, size: usize) -> Vec<u8> {
        assert!(self.bytes.len() <= size);
        self.bytes.resize(size, 0);
        self.bytes
    }
}

/// A 417-byte joint-stereo frame (128 kbit/s, 44.1 kHz) whose channels
/// carry one coded line each: `left` in the left channel and `right` in
/// the right, both as table-1 magnitudes with the given sign.
#[allow(dead_code)]
pub fn stereo_frame(mode_extension: u8, left: Option<bool>, right: Option<bool>) -> Vec<u8> {
    let mut out = vec![0xff, 0xfb, 0x90, 0x40 | (mode_extension << 4)];
    let mut side = BitWriter::default();
    let mut main = BitWriter::default();
    side.put(0, 9 + 3 + 8);
    for _ in 0..2 {
        for line in [left, right] {
            let (length, big_values, table) = if line.is_some() { (3, 1, 1) } else { (0, 0, 0) };
            side.put(length, 12);
            side.put(big_values, 9);
            side.put(210, 8);
            side.put(0, 4 + 1);
            side.put(table, 5);
            side.put(0, 10 + 4 + 3 + 3);
            if let Some(negative) = line {
                main.put(0b010 | u32::from(negative), 3);
            }
        }
    }
    out.extend(side.padded(32));
    out.extend(main.padded(417 - 36));
    out
}
