/// Two-stage face landmark model using ONNX Runtime via `ort`.
///
/// Stage 1 finds face boxes with a YOLO face model (letterbox, confidence
/// filter, NMS). Stage 2 runs a 468-point face-mesh model on a square crop
/// around each box and maps the points back to frame-normalised
/// coordinates.
use std::path::Path;

use ndarray::Array4;

use crate::detection::domain::face_mesh::FaceMesh;
use crate::detection::domain::landmark_model::LandmarkModel;
use crate::shared::constants::MESH_POINT_COUNT;
use crate::shared::frame::Frame;

use super::onnx_session::{input_dims, load_session};

/// Fallback YOLO input resolution when the model input is dynamic.
const DEFAULT_DETECTOR_INPUT: u32 = 640;

/// Fallback face-mesh input resolution when the model input is dynamic.
const DEFAULT_MESH_INPUT: u32 = 192;

const NMS_IOU_THRESH: f64 = 0.45;

/// Mesh crops are this many times the longer side of the face box, so the
/// chin and forehead stay inside the crop.
const CROP_SCALE: f64 = 1.5;

/// Landmark values per mesh point (x, y, z).
const MESH_POINT_STRIDE: usize = 3;

pub struct OnnxFaceMeshModel {
    detector: ort::session::Session,
    mesh: ort::session::Session,
    confidence: f64,
    detector_input: u32,
    mesh_input: u32,
    mesh_channels_first: bool,
}

impl OnnxFaceMeshModel {
    /// Load both models. Input sizes are read from the models where they
    /// are static.
    pub fn new(
        detector_path: &Path,
        mesh_path: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = load_session(detector_path)?;
        let mesh = load_session(mesh_path)?;

        let detector_input = input_dims(&detector)
            .map(|(size, _)| size)
            .unwrap_or(DEFAULT_DETECTOR_INPUT);
        let (mesh_input, mesh_channels_first) =
            input_dims(&mesh).unwrap_or((DEFAULT_MESH_INPUT, false));

        log::debug!(
            "Landmark models loaded (detector {detector_input}px, mesh {mesh_input}px {})",
            if mesh_channels_first { "NCHW" } else { "NHWC" }
        );

        Ok(Self {
            detector,
            mesh,
            confidence,
            detector_input,
            mesh_input,
            mesh_channels_first,
        })
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.detector_input);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.detector.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face detector produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data: Vec<f32> = tensor.iter().copied().collect();

        let mut boxes = parse_face_boxes(&data, &shape, self.confidence, scale, pad_x, pad_y)?;
        Ok(nms(&mut boxes, NMS_IOU_THRESH))
    }

    fn run_mesh(
        &mut self,
        frame: &Frame,
        window: &CropWindow,
    ) -> Result<Vec<(f32, f32)>, Box<dyn std::error::Error>> {
        let input_tensor = crop_tensor(frame, window, self.mesh_input, self.mesh_channels_first);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.mesh.run(ort::inputs![input_value])?;

        // Mesh exports disagree on output order; take the first output large
        // enough to hold every point.
        for i in 0..outputs.len() {
            let tensor = outputs[i].try_extract_array::<f32>()?;
            if tensor.len() >= MESH_POINT_COUNT * MESH_POINT_STRIDE {
                let raw: Vec<f32> = tensor.iter().copied().collect();
                return Ok(mesh_points(
                    &raw,
                    window,
                    self.mesh_input,
                    frame.width(),
                    frame.height(),
                ));
            }
        }
        Err("face-mesh model produced no landmark output".into())
    }
}

impl LandmarkModel for OnnxFaceMeshModel {
    fn detect(
        &mut self,
        frame: &Frame,
        max_faces: usize,
    ) -> Result<Vec<FaceMesh>, Box<dyn std::error::Error>> {
        // NMS output is already sorted by descending confidence.
        let faces = self.detect_faces(frame)?;
        Ok(mesh_faces(&faces, max_faces, |face| {
            let window = CropWindow::around(face, frame.width(), frame.height());
            self.run_mesh(frame, &window)
        }))
    }
}

/// Runs `run_mesh` on up to `max_faces` boxes. A face whose mesh fails is
/// dropped; the others are kept.
fn mesh_faces<F>(faces: &[FaceBox], max_faces: usize, mut run_mesh: F) -> Vec<FaceMesh>
where
    F: FnMut(&FaceBox) -> Result<Vec<(f32, f32)>, Box<dyn std::error::Error>>,
{
    let mut meshes = Vec::with_capacity(faces.len().min(max_faces));
    for face in faces.iter().take(max_faces) {
        match run_mesh(face) {
            Ok(points) => meshes.push(FaceMesh::new(points, face.confidence as f32)),
            Err(e) => log::debug!("Face mesh failed, face skipped: {e}"),
        }
    }
    meshes
}

// ---------------------------------------------------------------------------
// Stage 1: face boxes
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
struct FaceBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // YOLO pads with 114 gray.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Decode raw YOLO output rows `[cx, cy, w, h, conf, ...]` into frame boxes.
///
/// Accepts both `[1, features, detections]` and `[1, detections, features]`
/// layouts.
fn parse_face_boxes(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected face detector output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("Face detector output too small: {shape:?}").into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        let i = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[i] as f64
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        boxes.push(FaceBox {
            x1: ((cx - w / 2.0) - pad_x as f64) / scale,
            y1: ((cy - h / 2.0) - pad_y as f64) / scale,
            x2: ((cx + w / 2.0) - pad_x as f64) / scale,
            y2: ((cy + h / 2.0) - pad_y as f64) / scale,
            confidence: conf,
        });
    }
    Ok(boxes)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(boxes: &mut [FaceBox], iou_thresh: f64) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes.iter() {
        if keep.iter().all(|kept| bbox_iou(kept, candidate) <= iou_thresh) {
            keep.push(candidate.clone());
        }
    }
    keep
}

fn bbox_iou(a: &FaceBox, b: &FaceBox) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Stage 2: mesh on a square crop
// ---------------------------------------------------------------------------

/// Square crop in frame pixels. May extend past the frame edges; pixels
/// outside the frame read as black.
#[derive(Clone, Debug, PartialEq)]
struct CropWindow {
    x0: f64,
    y0: f64,
    size: f64,
}

impl CropWindow {
    fn around(face: &FaceBox, frame_w: u32, frame_h: u32) -> Self {
        let cx = (face.x1 + face.x2) / 2.0;
        let cy = (face.y1 + face.y2) / 2.0;
        let side = (face.x2 - face.x1).max(face.y2 - face.y1) * CROP_SCALE;
        // A degenerate box still gets a crop at least one pixel wide.
        let size = side.max(1.0).min(frame_w.max(frame_h) as f64 * 2.0);
        Self {
            x0: cx - size / 2.0,
            y0: cy - size / 2.0,
            size,
        }
    }
}

/// Nearest-neighbour resample of `window` into a `[0, 1]` float tensor.
fn crop_tensor(frame: &Frame, window: &CropWindow, input_size: u32, channels_first: bool) -> Array4<f32> {
    let n = input_size as usize;
    let shape = if channels_first { (1, 3, n, n) } else { (1, n, n, 3) };
    let mut tensor = Array4::<f32>::zeros(shape);

    let src = frame.as_ndarray();
    let src_w = frame.width() as f64;
    let src_h = frame.height() as f64;
    let step = window.size / input_size as f64;

    for y in 0..n {
        let sy = window.y0 + (y as f64 + 0.5) * step;
        if sy < 0.0 || sy >= src_h {
            continue;
        }
        for x in 0..n {
            let sx = window.x0 + (x as f64 + 0.5) * step;
            if sx < 0.0 || sx >= src_w {
                continue;
            }
            for c in 0..3 {
                let v = src[[sy as usize, sx as usize, c]] as f32 / 255.0;
                if channels_first {
                    tensor[[0, c, y, x]] = v;
                } else {
                    tensor[[0, y, x, c]] = v;
                }
            }
        }
    }
    tensor
}

/// Map mesh output (input-pixel `x, y, z` triples) to frame-normalised points.
fn mesh_points(
    raw: &[f32],
    window: &CropWindow,
    input_size: u32,
    frame_w: u32,
    frame_h: u32,
) -> Vec<(f32, f32)> {
    let to_frame = window.size / input_size as f64;
    raw.chunks_exact(MESH_POINT_STRIDE)
        .take(MESH_POINT_COUNT)
        .map(|p| {
            let x = window.x0 + p[0] as f64 * to_frame;
            let y = window.y0 + p[1] as f64 * to_frame;
            ((x / frame_w as f64) as f32, (y / frame_h as f64) as f32)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
