use airglyph::{
    canvas::{CanvasSnapshot, StrokeCanvas},
    classifier::{ClassifierInput, Prediction, INPUT_SIZE},
    config::Config,
    ensemble,
    gesture::PinchDetector,
    landmark::{HandLandmarks, Landmark},
    recognize::{Outcome, Recognizer},
    resolution::Resolution,
    roi::RoiExtractor,
    variant::{VariantGenerator, VariantKind},
};
use image::{Rgb, RgbImage};
use nalgebra::Point2;

/// Width and height of the ink in a classifier input.
fn ink_extent(input: &ClassifierInput) -> (u32, u32) {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            if input.get(x, y) > 0.5 {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }
    assert!(min_x <= max_x, "input has no ink");
    (max_x - min_x + 1, max_y - min_y + 1)
}

/// Calls anything wider than tall a dash, with high confidence, and everything else a bar.
fn dash_or_bar(input: &ClassifierInput) -> anyhow::Result<Prediction> {
    let (w, h) = ink_extent(input);
    Ok(if w > h {
        Prediction::new('-', 0.9)
    } else {
        Prediction::new('|', 0.2)
    })
}

fn draw(path: &[(f32, f32)], thickness: u32) -> CanvasSnapshot {
    let res = Resolution::new(400, 400);
    let mut canvas = StrokeCanvas::new(res, thickness);
    for &(x, y) in path {
        canvas.append(Point2::new(x, y), res, true);
        canvas.render();
    }
    canvas.snapshot()
}

#[test]
fn rotated_variant_wins() {
    let snapshot = draw(&[(200.0, 50.0), (200.0, 350.0)], 15);
    let mut recognizer = Recognizer::new(dash_or_bar, &Config::default());
    let recognition = recognizer
        .recognize(&snapshot)
        .unwrap()
        .into_recognition()
        .unwrap();

    assert_eq!(recognition.label(), '-');
    assert_eq!(recognition.variant(), VariantKind::Rotated90);
    assert!(recognition.is_accepted());

    let ranking = recognition.ranking();
    assert_eq!(ranking.len(), 4);
    assert_eq!(ranking[0].kind, VariantKind::Rotated90);
    // Equal confidences stay in priority order.
    let rest = ranking[1..].iter().map(|c| c.kind).collect::<Vec<_>>();
    assert_eq!(
        rest,
        [VariantKind::Identity, VariantKind::Dilated, VariantKind::Eroded]
    );
}

#[test]
fn final_confidence_is_a_variant_confidence() {
    let snapshot = draw(&[(80.0, 80.0), (300.0, 120.0), (150.0, 320.0), (320.0, 330.0)], 5);
    let by_coverage = |input: &ClassifierInput| -> anyhow::Result<Prediction> {
        Ok(Prediction::new('Z', input.coverage()))
    };
    let mut recognizer = Recognizer::new(by_coverage, &Config::default());
    let recognition = recognizer
        .recognize(&snapshot)
        .unwrap()
        .into_recognition()
        .unwrap();

    let confidences = recognition
        .ranking()
        .iter()
        .map(|c| c.prediction.confidence())
        .collect::<Vec<_>>();
    assert!(confidences.contains(&recognition.confidence()));
    assert!(confidences
        .iter()
        .all(|&c| c <= recognition.confidence()));
}

#[test]
fn blank_and_cleared_canvases() {
    let mut recognizer = Recognizer::new(dash_or_bar, &Config::default());
    let blank = CanvasSnapshot::from_image(RgbImage::from_pixel(400, 400, Rgb([0, 0, 0])));
    assert!(matches!(
        recognizer.recognize(&blank).unwrap(),
        Outcome::NoDrawingDetected
    ));

    let res = Resolution::new(400, 400);
    let mut canvas = StrokeCanvas::new(res, 5);
    canvas.append(Point2::new(10.0, 10.0), res, true);
    canvas.append(Point2::new(90.0, 90.0), res, true);
    canvas.render();
    canvas.clear();
    assert!(matches!(
        recognizer.recognize(&canvas.snapshot()).unwrap(),
        Outcome::NoDrawingDetected
    ));
}

#[test]
fn gesture_drives_canvas() {
    // Pinch, draw a stroke, release, move away: only the pinched part ends up on the canvas.
    let frame = Resolution::new(400, 400);
    let mut gesture = PinchDetector::from_config(&Config::default().cooldown_frames(0));
    let mut canvas = StrokeCanvas::new(Resolution::new(400, 400), 5);

    let frames = [
        (0.25, 0.25, true),
        (0.25, 0.5, true),
        (0.5, 0.5, true),
        (0.75, 0.75, false),
        (0.75, 0.25, false),
    ];
    for (x, y, pinched) in frames {
        let thumb_offset = if pinched { 0.01 } else { 0.3 };
        let hand = HandLandmarks::from_tips(Landmark::new(x, y), Landmark::new(x, y + thumb_offset));
        let pinch = hand.pinch_points(frame);
        let drawing = gesture.update(Some(pinch));
        assert_eq!(drawing, pinched);
        canvas.append(pinch.index_tip, frame, drawing);
        canvas.render();
    }

    let points = canvas
        .points()
        .iter()
        .map(|p| (p.x, p.y))
        .collect::<Vec<_>>();
    assert_eq!(points, [(100, 100), (100, 200), (200, 200)]);
    assert_eq!(*canvas.raster().get_pixel(100, 150), Rgb([255, 255, 255]));
    assert_eq!(*canvas.raster().get_pixel(300, 300), Rgb([0, 0, 0]));
}

#[test]
fn roi_and_variants_from_canvas() {
    let snapshot = draw(&[(120.0, 100.0), (120.0, 300.0), (260.0, 300.0)], 15);
    let config = Config::default();
    let roi = RoiExtractor::from_config(&config)
        .extract(snapshot.image())
        .unwrap();

    let bounds = roi.bounds();
    // The stroke starts around x = 113 and y = 100, and is padded by 30.
    assert!((80..=86).contains(&bounds.x), "{bounds:?}");
    assert!((65..=70).contains(&bounds.y), "{bounds:?}");
    assert_eq!(roi.square().width(), bounds.longer_side());

    let variants = VariantGenerator::from_config(&config).generate(&roi);
    for variant in &variants {
        let input = ClassifierInput::from_light_background(variant.image());
        let coverage = input.coverage();
        assert!(coverage > 0.0 && coverage < 0.5, "{variant:?}: {coverage}");
    }
}

#[test]
fn ensemble_ranking_is_pure() {
    let make = |confs: [f32; 4]| {
        VariantKind::ALL
            .iter()
            .zip(confs)
            .map(|(&kind, conf)| ensemble::Candidate::new(kind, Prediction::new('k', conf)))
            .collect::<Vec<_>>()
    };
    let a = ensemble::rank(make([0.2, 0.91, 0.4, 0.3]));
    let b = ensemble::rank(make([0.2, 0.91, 0.4, 0.3]));
    assert_eq!(a, b);
    assert_eq!(a[0].kind, VariantKind::Rotated90);
    assert_eq!(
        a.iter().map(|c| c.kind).collect::<Vec<_>>(),
        [
            VariantKind::Rotated90,
            VariantKind::Dilated,
            VariantKind::Eroded,
            VariantKind::Identity
        ]
    );
}
