//! parkctl: headless runner for the parking guidance core.
//!
//! Reads tracking frames as JSON lines (from a file or stdin), drives the
//! core one tick per frame, and writes one snapshot JSON object per tick to
//! stdout. Exit notices and admission verdicts go to stderr so they don't
//! interfere with the snapshot stream.
//!
//! ## Input lines
//!
//! A tracking frame maps track ids to camera positions:
//!
//! ```text
//! {"3": [1050.0, 70.0], "4": [640.0, 300.0]}
//! ```
//!
//! A kiosk admission request carries a plate:
//!
//! ```text
//! {"plate": "1234"}
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{bail, Context, Result};

use simulation::allocation::TrackingFrame;
use simulation::geometry::Point;
use simulation::lot::{demo_lot, LotLayout};
use simulation::runtime::{LotRuntime, RuntimeConfig};
use simulation::zones::VehicleId;

struct Options {
    layout: Option<PathBuf>,
    frames: Option<PathBuf>,
    warmup: usize,
}

fn usage() -> &'static str {
    "usage: parkctl [--layout lot.json] [--frames frames.jsonl] [--warmup N]\n\
     \n\
     Without --layout the built-in demo lot is used; without --frames the\n\
     frame stream is read from stdin."
}

fn parse_options() -> Result<Options> {
    let mut options = Options { layout: None, frames: None, warmup: 0 };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--layout" => {
                options.layout = Some(args.next().context("--layout needs a path")?.into());
            }
            "--frames" => {
                options.frames = Some(args.next().context("--frames needs a path")?.into());
            }
            "--warmup" => {
                options.warmup = args
                    .next()
                    .context("--warmup needs a count")?
                    .parse()
                    .context("--warmup needs a number")?;
            }
            "--help" | "-h" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other => bail!("unknown argument {other:?}\n{}", usage()),
        }
    }
    Ok(options)
}

fn parse_line(line: &str) -> Result<ParsedLine> {
    let value: serde_json::Value = serde_json::from_str(line).context("invalid JSON line")?;
    if let Some(plate) = value.get("plate").and_then(|v| v.as_str()) {
        return Ok(ParsedLine::Plate(plate.to_string()));
    }
    let object = value.as_object().context("expected a JSON object")?;
    let mut frame = BTreeMap::new();
    for (key, position) in object {
        let id: u32 = key.parse().with_context(|| format!("bad track id {key:?}"))?;
        let coords = position.as_array().context("position must be [x, y]")?;
        if coords.len() != 2 {
            bail!("position must be [x, y]");
        }
        let x = coords[0].as_f64().context("x must be a number")?;
        let y = coords[1].as_f64().context("y must be a number")?;
        frame.insert(VehicleId(id), Point::new(x, y));
    }
    Ok(ParsedLine::Frame(TrackingFrame(frame)))
}

enum ParsedLine {
    Frame(TrackingFrame),
    Plate(String),
}

fn main() -> Result<()> {
    let options = parse_options()?;

    let layout = match &options.layout {
        Some(path) => LotLayout::load(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?,
        None => demo_lot(),
    };

    let config = RuntimeConfig {
        warmup_frames: options.warmup,
        install_logger: true,
        ..Default::default()
    };
    let (worker, handles) = LotRuntime::spawn(&layout, config).context("invalid lot layout")?;

    // Snapshots to stdout, one JSON object per tick.
    let snapshots = handles.snapshots;
    let printer = std::thread::spawn(move || {
        for snapshot in snapshots.iter() {
            match serde_json::to_string(&*snapshot) {
                Ok(json) => println!("{json}"),
                Err(err) => eprintln!("snapshot serialization failed: {err}"),
            }
        }
    });

    let exits = handles.exits;
    let exit_logger = std::thread::spawn(move || {
        for notice in exits.iter() {
            eprintln!("vehicle {} (plate {}) exited", notice.vehicle.0, notice.plate);
        }
    });

    // Admission requests block for the verdict, so they get their own thread.
    let (plate_tx, plate_rx) = mpsc::channel::<String>();
    let mut admission = handles.admission;
    let kiosk = std::thread::spawn(move || {
        for plate in plate_rx.iter() {
            match admission.request(&plate) {
                Ok(true) => eprintln!("plate {plate}: admitted"),
                Ok(false) => eprintln!("plate {plate}: rejected, lot full"),
                Err(err) => eprintln!("plate {plate}: {err}"),
            }
        }
    });

    let reader: Box<dyn BufRead> = match &options.frames {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(std::io::stdin().lock()),
    };

    let frames = handles.frames;
    for line in reader.lines() {
        let line = line.context("failed to read frame stream")?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(&line) {
            Ok(ParsedLine::Frame(frame)) => {
                if frames.send(frame).is_err() {
                    break;
                }
            }
            Ok(ParsedLine::Plate(plate)) => {
                if plate_tx.send(plate).is_err() {
                    break;
                }
            }
            Err(err) => eprintln!("skipping line: {err:#}"),
        }
    }

    // Closing the feed stops the core; the outbound channels drain and the
    // helper threads follow.
    drop(frames);
    drop(plate_tx);
    let _ = worker.join();
    let _ = printer.join();
    let _ = exit_logger.join();
    let _ = kiosk.join();
    Ok(())
}
