use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use miette::{Context, IntoDiagnostic};

use kage_backend_core::{BackendOptions, BackendRegistry, GlslVersion};
use kage_parser::CompileOptions;

/// Kage shader compiler and MP3 decoder
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate a Kage shader to GLSL, HLSL, MSL or an IR dump
    Compile {
        /// Input Kage source file
        input: PathBuf,

        /// Target backend
        #[arg(short, long, default_value = "glsl")]
        target: String,

        /// Output path (default: stdout); a directory when the target
        /// produces several files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name of the vertex entry point
        #[arg(long, default_value = "Vertex")]
        vertex: String,

        /// Name of the fragment entry point
        #[arg(long, default_value = "Fragment")]
        fragment: String,

        /// Number of source textures
        #[arg(long, default_value_t = 0)]
        textures: usize,

        /// GLSL dialect: default or es300
        #[arg(long, default_value = "default", value_parser = parse_glsl_version)]
        glsl_version: GlslVersion,

        /// Dump IR to stderr before backend compilation
        #[arg(long)]
        emit_ir: bool,

        /// Check the shader without producing output
        #[arg(long)]
        dry_run: bool,
    },
    /// Decode an MP3 file to raw 16-bit little-endian stereo PCM
    Decode {
        /// Input MP3 file
        input: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_glsl_version(s: &str) -> Result<GlslVersion, String> {
    match s {
        "default" => Ok(GlslVersion::Default),
        "es300" => Ok(GlslVersion::Es300),
        _ => Err(format!(
            "invalid GLSL version '{s}', expected default or es300"
        )),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Command::Compile {
            input,
            target,
            output,
            vertex,
            fragment,
            textures,
            glsl_version,
            emit_ir,
            dry_run,
        } => compile(CompileArgs {
            input,
            target,
            output,
            options: CompileOptions {
                vertex_entry: vertex,
                fragment_entry: fragment,
                texture_count: textures,
            },
            glsl_version,
            emit_ir,
            dry_run,
        }),
        Command::Decode { input, output } => decode(&input, output.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

struct CompileArgs {
    input: PathBuf,
    target: String,
    output: Option<PathBuf>,
    options: CompileOptions,
    glsl_version: GlslVersion,
    emit_ir: bool,
    dry_run: bool,
}

fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(kage_backend_glsl::GlslBackend));
    registry.register(Box::new(kage_backend_hlsl::HlslBackend));
    registry.register(Box::new(kage_backend_msl::MslBackend));
    registry
}

fn compile(args: CompileArgs) -> miette::Result<()> {
    // 1. Read source file.
    let source = std::fs::read_to_string(&args.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", args.input.display()))?;

    // 2. Resolve the backend before doing any work.
    let registry = registry();
    let backend = registry.find(&args.target).ok_or_else(|| {
        let available = registry.list_targets().join(", ");
        miette::miette!("unknown target '{}' (available: {})", args.target, available)
    })?;

    // 3. Parse and check the shader.
    let program = kage_parser::compile(&source, &args.options)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err_with(|| format!("failed to compile {}", args.input.display()))?;

    // 4. Optionally dump IR to stderr.
    if args.emit_ir {
        eprintln!("{}", kage_ir::dump_program(&program));
    }

    // 5. Dry-run: stop here.
    if args.dry_run {
        return Ok(());
    }

    // 6. Emit.
    let opts = BackendOptions {
        glsl_version: args.glsl_version,
    };
    let output = backend
        .compile(&program, &opts)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err_with(|| format!("{} backend failed", backend.name()))?;

    // 7. Print diagnostics.
    for diag in &output.diagnostics {
        eprintln!("note: {diag}");
    }

    // 8. Write output.
    let several = output.files.len() > 1;
    if several {
        if let Some(dir) = &args.output {
            std::fs::create_dir_all(dir)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
        }
    }
    for file in &output.files {
        let path = match &args.output {
            Some(path) if several => Some(path.join(&file.name)),
            other => other.clone(),
        };
        match path {
            Some(path) => write_file(&path, file.content.as_bytes())?,
            None => {
                if several {
                    println!("// {}", file.name);
                }
                print!("{}", file.content);
            }
        }
    }

    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> miette::Result<()> {
    std::fs::write(path, data)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to write {}", path.display()))
}

fn decode(input: &Path, output: Option<&Path>) -> miette::Result<()> {
    let file = File::open(input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to open {}", input.display()))?;
    let mut decoder = kage_mp3::Decoder::new_seekable(BufReader::new(file))
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to decode {}", input.display()))?;

    let written = match output {
        Some(path) => {
            let out = File::create(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(out);
            let n = io::copy(&mut decoder, &mut out).into_diagnostic();
            out.flush().into_diagnostic()?;
            n
        }
        None => io::copy(&mut decoder, &mut io::stdout().lock()).into_diagnostic(),
    }
    .wrap_err_with(|| format!("failed to decode {}", input.display()))?;
    info!(
        "decoded {} bytes of PCM at {} Hz",
        written,
        decoder.sample_rate()
    );
    Ok(())
}
