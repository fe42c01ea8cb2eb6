// Songmaking melody generator: CLI entry point.
//
// Draws a harmonic frame from the seed, generates one melody with the chosen
// method, and writes `<method>_<seed>.mid` plus a matching `.json` metadata
// record. The pipeline: frame -> engine (generator, structure, constraint
// loop) -> MIDI + metadata.
//
// Usage:
//   cargo run -p songmaking --bin generate -- [--method random|scored|markov]
//     [--seed N] [--bars N] [--tonic NAME] [--scale NAME] [--candidates N]
//     [--ngram-order N] [--repeat-unit BEATS] [--vary] [--target-mean PITCH]
//     [--tolerance SEMITONES] [--max-attempts N] [--config FILE]
//     [--model FILE] [--output-dir DIR]
//
// Set RUST_LOG=debug to see per-attempt and per-candidate detail.

use songmaking::context::{HarmonicContext, HarmonyOptions};
use songmaking::generator::Method;
use songmaking::markov::MarkovModel;
use songmaking::metadata::MelodyMetadata;
use songmaking::midi::write_midi;
use songmaking::scale::{ScaleKind, parse_note_name};
use songmaking::{GenerationConfig, GenerationRequest, MelodyEngine, PitchConstraint, StructureSpec};
use std::path::{Path, PathBuf};

/// Seed used when `--seed` is not given, so a bare run is reproducible.
const DEFAULT_SEED: u64 = 42;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let method: Method = parse_flag::<String>(args, "--method")
        .unwrap_or_else(|| "random".to_string())
        .parse()?;
    let seed: u64 = parse_flag(args, "--seed").unwrap_or(DEFAULT_SEED);
    let output_dir: PathBuf =
        parse_flag(args, "--output-dir").unwrap_or_else(|| PathBuf::from("."));

    let mut config = match parse_flag::<PathBuf>(args, "--config") {
        Some(path) => GenerationConfig::load(&path)?,
        None => GenerationConfig::default(),
    };
    if let Some(n) = parse_flag(args, "--candidates") {
        config.candidate_count = n;
    }
    if let Some(n) = parse_flag(args, "--ngram-order") {
        config.ngram_order = n;
    }

    let options = HarmonyOptions {
        bars: parse_flag(args, "--bars"),
        ..HarmonyOptions::default()
    };
    let mut context = HarmonicContext::choose(seed, &options)?;
    if let Some(name) = parse_flag::<String>(args, "--tonic") {
        context.tonic = parse_note_name(&name)?;
    }
    if let Some(name) = parse_flag::<String>(args, "--scale") {
        context.scale_intervals = name.parse::<ScaleKind>()?.intervals().to_vec();
    }

    println!("=== Songmaking Melody Generator ===");
    println!("Method: {}", method);
    println!("Seed: {}", seed);
    println!(
        "Key: {} {:?}, {}/{} at {} BPM, {} bars, pitches {}..={}",
        context.tonic_name(),
        context.scale_intervals,
        context.meter.beats_per_bar,
        context.meter.beat_unit,
        context.tempo_bpm,
        context.bars,
        context.low,
        context.high,
    );
    println!();

    println!("[1/3] Preparing engine...");
    let engine = match parse_flag::<PathBuf>(args, "--model") {
        Some(path) => {
            let model = MarkovModel::load(&path)?;
            println!("  Loaded order-{} model from {}.", model.order(), path.display());
            MelodyEngine::with_model(&config, model)?
        }
        None => MelodyEngine::new(&config)?,
    };

    let mut request = GenerationRequest::new(context, method, seed);
    if let Some(unit) = parse_flag::<f64>(args, "--repeat-unit") {
        request = request.with_structure(StructureSpec::repeating(
            unit,
            args.iter().any(|a| a == "--vary"),
            StructureSpec::default().variation_probability,
        ));
    }
    if let Some(target) = parse_flag::<f64>(args, "--target-mean") {
        request = request.with_constraint(PitchConstraint::new(
            target,
            parse_flag(args, "--tolerance").unwrap_or(2.0),
            parse_flag(args, "--max-attempts").unwrap_or(100),
        ));
    }

    println!("[2/3] Generating...");
    let output = engine.generate(&request)?;
    let melody = &output.candidate.melody;
    println!(
        "  {} events, {} beats",
        melody.len(),
        output.candidate.diagnostics.total_beats
    );
    println!("  {}", melody.summary(request.context.meter.quarter_beats_per_bar()));
    if let Some(score) = &output.score {
        println!("  Score: {:.3}", score.total);
    }
    if let Some(info) = &output.constraint {
        println!(
            "  Constraint: {} after {} attempt(s), mean {:?}",
            if info.success { "met" } else { "NOT met" },
            info.attempts_used,
            info.achieved_mean,
        );
    }

    println!("[3/3] Writing output to {}...", output_dir.display());
    std::fs::create_dir_all(&output_dir)?;
    let stem = format!("{}_{}", method, seed);
    let midi_path = output_dir.join(format!("{stem}.mid"));
    let meta_path = output_dir.join(format!("{stem}.json"));
    write_midi(melody, &request.context, &midi_path)?;
    MelodyMetadata::new(&request, &output).write(&meta_path)?;
    log::info!("wrote {} and {}", midi_path.display(), meta_path.display());

    let seconds = request.context.total_beats() / request.context.tempo_bpm as f64 * 60.0;
    println!("  Done! Duration: {:.0}s ({})", seconds, display_name(&midi_path));
    Ok(())
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
