pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// 468-point face mesh. Not downloadable; must be placed in the model cache
/// directory or passed explicitly.
pub const MESH_MODEL_NAME: &str = "face_landmark.onnx";

/// Points in the face mesh topology.
pub const MESH_POINT_COUNT: usize = 468;

/// Face-mesh indices tracing the inner lip ring, in polygon order.
pub const INNER_LIPS: [usize; 20] = [
    78, 191, 80, 81, 82, 13, 312, 311, 310, 415, 308, 324, 318, 402, 317, 14, 87, 178, 88, 95,
];

/// Mid-line points of the upper and lower inner lip.
pub const UPPER_INNER_LIP: usize = 13;
pub const LOWER_INNER_LIP: usize = 14;

/// Smallest polygon the mouth mask is built from.
pub const MIN_MOUTH_POLYGON_POINTS: usize = 6;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
