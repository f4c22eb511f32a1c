// src/bin/validate.rs
// ============================================================================
// VRMA VALIDATOR - Comprueba contenedores .vrma
// ============================================================================
//
// Valida:
//   - Framing GLB (magic, versión, longitudes, relleno de chunks)
//   - bufferViews alineados a 4, accessors dentro de rango
//   - Canales → nodos existentes, eje de tiempo creciente desde 0
//   - Cuaterniones unitarios, mapa humanoide
//
// Uso:
//   vrma-validate a.vrma b.vrma [-v]
//
// ============================================================================

use std::path::PathBuf;

use clap::Parser;

use vrma_convert::validate_container;

#[derive(Parser)]
#[command(name = "vrma-validate")]
#[command(about = "Validate VRM animation (.vrma) containers")]
struct Args {
    /// Files to validate
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Show container details
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    env_logger::init();

    let mut failed = 0usize;

    for path in &args.files {
        println!("\n{}", "=".repeat(72));
        println!("  {}", path.display());
        println!("{}", "=".repeat(72));

        let data = match std::fs::read(path) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Error leyendo archivo: {}", e);
                failed += 1;
                continue;
            }
        };

        let report = validate_container(&data);

        if args.verbose {
            let info = &report.info;
            println!("  Versión:      {}", info.version);
            println!("  Tamaño:       {} bytes (JSON {}, BIN {})", info.total_size, info.json_size, info.bin_size);
            println!("  XXH3:         0x{:016X}", info.fingerprint);
            println!("  Animación:    {}", info.animation_name.as_deref().unwrap_or("-"));
            println!("  Frames:       {} ({:.3}s)", info.frames, info.duration);
            println!("  Pistas:       {} rotation, {} translation", info.rotation_tracks, info.translation_tracks);
            println!("  Huesos:       {}", info.bones.len());
        }

        for warning in &report.warnings {
            println!("  ⚠ {}", warning);
        }
        for error in &report.errors {
            println!("  ✗ {}", error);
        }

        if report.valid {
            println!("✓ VALIDACIÓN EXITOSA");
        } else {
            println!("✗ VALIDACIÓN FALLIDA");
            failed += 1;
        }
    }

    println!("\n{}", "=".repeat(72));
    println!("  {}/{} válidos", args.files.len() - failed, args.files.len());
    println!("{}\n", "=".repeat(72));

    std::process::exit(if failed == 0 { 0 } else { 1 });
}
