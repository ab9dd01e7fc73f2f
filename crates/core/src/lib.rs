pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
}

pub mod capture {
    pub mod domain {
        pub mod camera_candidate;
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod ffmpeg_camera;
        pub mod image_sequence_source;
        pub mod mirrored_source;
    }
}

pub mod detection {
    pub mod domain {
        pub mod face_mesh;
        pub mod landmark_model;
        pub mod subject_locator;
    }
    pub mod infrastructure {
        pub mod onnx_face_mesh_model;
        pub mod onnx_session;
    }
}

pub mod gesture {
    pub mod domain {
        pub mod direction;
        pub mod hsv;
        pub mod segmenter;
    }
}

pub mod presence {
    pub mod domain {
        pub mod hold_timer;
        pub mod slot_assigner;
        pub mod slot_state;
    }
}

pub mod detector {
    pub mod config;
    pub mod frame_processor;
    pub mod gesture_switch;
    pub mod overlay;
    pub mod snapshot;
    pub mod worker;
    pub mod worker_logger;
}
