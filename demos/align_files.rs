//! Example: Align renditions against a reference recording
//!
//! Usage:
//!   cargo run --release --example align_files -- [--json] [--windowed] [--config cfg.json] <reference> <rendition> ...
//!
//! Notes:
//! - Files are decoded with symphonia and downmixed to mono.
//! - The configured sample rate follows the reference; renditions at another
//!   rate are reported as degraded (no resampling here).
//! - File names of the form `choir+song+part.ext` are shown by part id.

use std::env;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

use rendition_sync::{
    align_all, AlignmentConfig, AlignmentResult, AudioBuffer, ConsensusStrategy, PartKey,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decode a file to mono f32 samples
fn decode_audio_file(path: &str) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or("No supported audio tracks found")?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or("Unknown sample rate")?;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("{}: skipping undecodable packet: {}", path, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let channels = decoded.spec().channels.count().max(1);
        if sample_buf.as_ref().map_or(true, |b| b.capacity() < decoded.capacity()) {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, *decoded.spec()));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            mono.extend(
                buf.samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    Ok((mono, sample_rate))
}

fn display_name(id: &str) -> String {
    let file_name = Path::new(id)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(id);
    match PartKey::parse(file_name) {
        Ok(key) => format!("{} ({})", key.part_id, file_name),
        Err(_) => file_name.to_string(),
    }
}

fn print_result(result: &AlignmentResult) {
    println!(
        "{:<40} {:>8} ms  error {:.6}  {}",
        display_name(&result.rendition_id),
        result.offset_ms,
        result.error,
        result.status.name()
    );
    for warning in &result.metadata.warnings {
        println!("    warning: {}", warning);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut json = false;
    let mut windowed = false;
    let mut config_path: Option<String> = None;
    let mut paths: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--windowed" => windowed = true,
            "--config" => config_path = Some(args.next().ok_or("--config needs a path")?),
            _ => paths.push(arg),
        }
    }

    if paths.len() < 2 {
        eprintln!("Usage: align_files [--json] [--windowed] [--config cfg.json] <reference> <rendition> ...");
        std::process::exit(1);
    }

    let mut config: AlignmentConfig = match config_path {
        Some(p) => serde_json::from_reader(File::open(p)?)?,
        None => AlignmentConfig::default(),
    };
    if windowed {
        config.consensus = ConsensusStrategy::WindowedClusters;
    }

    let decode_start = Instant::now();
    let (reference_samples, reference_rate) = decode_audio_file(&paths[0])?;
    config.sample_rate = reference_rate;
    let reference = AudioBuffer::new(reference_samples, reference_rate).with_id(paths[0].as_str());

    let mut renditions = Vec::new();
    for path in &paths[1..] {
        match decode_audio_file(path) {
            Ok((samples, rate)) => {
                renditions.push(AudioBuffer::new(samples, rate).with_id(path.as_str()))
            }
            Err(e) => eprintln!("{}: decode failed: {}", path, e),
        }
    }
    log::info!(
        "Decoded {} files in {:.2}s",
        renditions.len() + 1,
        decode_start.elapsed().as_secs_f32()
    );

    let align_start = Instant::now();
    let results = align_all(&reference, &renditions, &config)?;
    log::info!(
        "Aligned {} renditions in {:.2}s",
        results.len(),
        align_start.elapsed().as_secs_f32()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!(
            "Reference: {} ({:.1}s)",
            display_name(reference.id()),
            reference.duration_seconds()
        );
        for result in &results {
            print_result(result);
        }
    }

    Ok(())
}
