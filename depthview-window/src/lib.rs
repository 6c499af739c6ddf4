mod app;
mod camera;

pub use app::{RenderContext, RenderDelegate, init_tracing, run_with_delegate};
pub use camera::{
    ANGLE_DIVISOR, CameraPose, ORBIT_RADIUS, ORBIT_STEP, OrbitController, Projection,
};
