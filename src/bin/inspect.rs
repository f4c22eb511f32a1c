// src/bin/inspect.rs
// ============================================================================
// VRMA INSPECTOR - Inspecciona estructura de archivos .vrma (GLB)
// ============================================================================
//
// Uso: vrma-inspect archivo.vrma [--json]
//
// ============================================================================

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use vrma_convert::glb::document::{Document, TargetPath};
use vrma_convert::glb::{BinaryContainer, EXTENSION_NAME};

#[derive(Parser)]
#[command(name = "vrma-inspect")]
#[command(about = "Inspect VRM animation (.vrma) file structure")]
struct Args {
    /// File to inspect
    file: PathBuf,

    /// Dump the JSON chunk
    #[arg(long)]
    json: bool,
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::init();

    let data = std::fs::read(&args.file).with_context(|| format!("Cannot open {}", args.file.display()))?;
    let container = BinaryContainer::parse(&data).with_context(|| format!("Cannot parse {}", args.file.display()))?;
    let doc = container.document().context("JSON chunk does not parse")?;

    println!();
    println!("════════════════════════════════════════════════════════════════════════════════");
    println!("  VRMA INSPECTOR");
    println!("════════════════════════════════════════════════════════════════════════════════");
    println!("  Archivo:      {}", args.file.display());
    println!("  Tamaño real:  {}", format_size(data.len() as u64));
    println!("  XXH3:         0x{:016X}", container.fingerprint());
    println!();

    // ═══════════════════════════════════════════════════════════════
    // HEADER + CHUNKS
    // ═══════════════════════════════════════════════════════════════
    let header = container.header();
    println!("┌──────────────────────────────────────────────────────────────────────────────┐");
    println!("│ HEADER (12 bytes)                                                            │");
    println!("├──────────────────────────────────────────────────────────────────────────────┤");
    println!("│  Magic:          0x{:08X} (glTF)", header.magic);
    println!("│  Versión:        {}", header.version);
    println!("│  Longitud:       {}", format_size(header.length as u64));
    println!("│  Chunk JSON:     {}", format_size(container.json_chunk().len() as u64));
    println!("│  Chunk BIN:      {}", format_size(container.bin_chunk().len() as u64));
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();

    print_animation(&doc);
    print_humanoid(&doc);

    if args.json {
        let value: serde_json::Value = serde_json::from_slice(container.json_chunk())?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    Ok(())
}

fn print_animation(doc: &Document) {
    println!("┌──────────────────────────────────────────────────────────────────────────────┐");
    println!("│ ANIMATION                                                                    │");
    println!("├──────────────────────────────────────────────────────────────────────────────┤");

    if let Some(generator) = &doc.asset.generator {
        println!("│  Generator:      {}", generator);
    }
    if let Some(text) = doc.asset.extras.as_ref().and_then(|e| e.text.as_deref()) {
        println!("│  Texto:          {}", text.replace('\n', " / "));
    }

    for animation in &doc.animations {
        let frames = animation
            .samplers
            .first()
            .and_then(|s| doc.accessors.get(s.input));
        println!("│  Nombre:         {}", animation.name.as_deref().unwrap_or("(sin nombre)"));
        if let Some(time) = frames {
            let duration = time.max.as_ref().and_then(|m| m.first()).copied().unwrap_or(0.0);
            println!("│  Frames:         {}", time.count);
            println!("│  Duración:       {:.3}s", duration);
        }
        let rotations = animation.channels.iter().filter(|c| c.target.path == TargetPath::Rotation).count();
        let translations = animation.channels.len() - rotations;
        println!("│  Canales:        {} rotation, {} translation", rotations, translations);
    }
    println!("│  Nodos:          {}", doc.nodes.len());
    println!("│  Accessors:      {}", doc.accessors.len());
    println!("│  BufferViews:    {}", doc.buffer_views.len());
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();
}

fn print_humanoid(doc: &Document) {
    println!("┌──────────────────────────────────────────────────────────────────────────────┐");
    println!("│ {} humanoid", EXTENSION_NAME);
    println!("├──────────────────────────────────────────────────────────────────────────────┤");

    match doc.human_bones() {
        Some(bones) if !bones.is_empty() => {
            let mut by_node: Vec<_> = bones.iter().map(|(name, b)| (b.node, name)).collect();
            by_node.sort();
            for (node, name) in by_node {
                let children = doc.nodes.get(node).map(|n| n.children.len()).unwrap_or(0);
                println!("│  node {:3}  {:16} children: {}", node, name, children);
            }
        }
        _ => println!("│  (sin mapa humanoide)"),
    }
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();
}
