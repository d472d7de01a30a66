//! Draw characters in the air in front of a webcam.
//!
//! Pinch thumb and index finger to put the pen down, release to lift it. Commands are read from
//! stdin, one per line:
//!
//! * `p`: recognize the drawing
//! * `c`: clear the canvas
//! * `s`: save the canvas as a PNG
//! * `q`: quit

use std::{
    env,
    io::{self, BufRead},
    path::PathBuf,
};

use anyhow::Context;

use airglyph::classifier::{InputLayout, OnnxClassifier};
use airglyph::config::Config;
use airglyph::hand::OnnxHandLandmarker;
use airglyph::recognize::{Outcome, RecognizeError, Recognizer};
use airglyph::session::SessionStopped;
use airglyph::resolution::Resolution;
use airglyph::session::CaptureSession;
use airglyph::video::webcam::{ParamPreference, Webcam, WebcamOptions};

const ENV_VAR_HAND_MODEL: &str = "AIRGLYPH_HAND_MODEL";
const ENV_VAR_CLASSIFIER_MODEL: &str = "AIRGLYPH_CLASSIFIER_MODEL";

fn model_path(var: &str) -> anyhow::Result<PathBuf> {
    env::var_os(var)
        .map(PathBuf::from)
        .with_context(|| format!("`{var}` must be set to the path of an ONNX model"))
}

fn main() -> anyhow::Result<()> {
    airglyph::init_logger!();

    let config = Config::from_env()?;
    let detector = OnnxHandLandmarker::load(model_path(ENV_VAR_HAND_MODEL)?, &config)?;
    let classifier =
        OnnxClassifier::load(model_path(ENV_VAR_CLASSIFIER_MODEL)?, InputLayout::Nhwc)?;

    let mut recognizer = Recognizer::new(classifier, &config);
    let mut session = CaptureSession::start(
        || {
            Webcam::open(
                WebcamOptions::default()
                    .resolution(Resolution::RES_480P)
                    .fps(30)
                    .prefer(ParamPreference::Framerate),
            )
        },
        detector,
        &config,
    )?;

    eprintln!("pinch to draw; p = recognize, c = clear, s = save, q = quit");
    let mut saved = 0;
    for line in io::stdin().lock().lines() {
        let line = line?;
        let result = match line.trim() {
            // Capture keeps running while this thread classifies.
            "p" => report(session.recognize(&mut recognizer)),
            "c" => session.reset(),
            "s" => session.snapshot().map(|snapshot| {
                saved += 1;
                let path = format!("airglyph-{saved}.png");
                match snapshot.save(&path) {
                    Ok(()) => eprintln!("saved {path}"),
                    Err(e) => log::error!("failed to save {path}: {e:#}"),
                }
            }),
            "q" => break,
            "" => Ok(()),
            other => {
                eprintln!("unknown command '{other}'");
                Ok(())
            }
        };
        if result.is_err() {
            break;
        }
    }

    session.stop()?;
    Ok(())
}

fn report(result: Result<Outcome, RecognizeError>) -> Result<(), SessionStopped> {
    match result {
        Ok(Outcome::Recognized(recognition)) => {
            println!("{recognition}");
            for candidate in recognition.ranking() {
                log::debug!("{}: {}", candidate.kind, candidate.prediction);
            }
        }
        Ok(outcome) => println!("{outcome}"),
        Err(RecognizeError::Snapshot(stopped)) => return Err(stopped),
        Err(e) => log::error!("recognition failed: {e}"),
    }
    Ok(())
}
