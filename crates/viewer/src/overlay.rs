use opencv::core::{Mat, Point, Rect, Scalar};
use opencv::imgproc;
use segment::{BoundingBox, DetectionSnapshot};

/// Draws bounding boxes, labels and the frame banner onto a frame whose
/// number matched the detector's output. The caller decides whether a
/// frame qualifies; frames without a match are shown untouched.
pub fn draw_overlays(frame: &mut Mat, snapshot: &DetectionSnapshot) -> opencv::Result<()> {
    for bbox in &snapshot.detections {
        draw_detection(frame, bbox)?;
    }
    draw_frame_banner(frame, snapshot.frame_number, snapshot.detections.len())
}

fn draw_detection(frame: &mut Mat, bbox: &BoundingBox) -> opencv::Result<()> {
    let green = Scalar::new(0.0, 255.0, 0.0, 0.0);

    imgproc::rectangle(
        frame,
        Rect::new(bbox.x, bbox.y, bbox.width, bbox.height),
        green,
        2,
        imgproc::LINE_8,
        0,
    )?;

    let label = format!("Person: {:.2}", bbox.confidence);
    let mut baseline = 0;
    let label_size = imgproc::get_text_size(
        &label,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        2,
        &mut baseline,
    )?;

    // The label block hangs above the box but never above row 0, so
    // boxes near the top edge keep a visible label. Horizontal overflow
    // is left to OpenCV's own clipping.
    let anchor_y = bbox.y.max(label_size.height + 10);

    imgproc::rectangle(
        frame,
        Rect::new(
            bbox.x,
            anchor_y - label_size.height - 10,
            label_size.width,
            label_size.height + 10,
        ),
        green,
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;

    imgproc::put_text(
        frame,
        &label,
        Point::new(bbox.x, anchor_y - 5),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
        2,
        imgproc::LINE_8,
        false,
    )
}

fn draw_frame_banner(frame: &mut Mat, frame_number: i32, detections: usize) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        &format!("Frame: {} | Detections: {}", frame_number, detections),
        Point::new(10, 30),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        Scalar::new(255.0, 255.0, 255.0, 0.0),
        2,
        imgproc::LINE_8,
        false,
    )
}
