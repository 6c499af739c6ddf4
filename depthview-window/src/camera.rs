use glam::{Mat4, Vec3};

/// Distance from the eye to the look-at target, in meters.
pub const ORBIT_RADIUS: f32 = 4.0;
/// Phase added per frame.
pub const ORBIT_STEP: f64 = 0.08;
/// Orbit angle is `sin(phase) / ANGLE_DIVISOR` radians.
pub const ANGLE_DIVISOR: f64 = 1.2;

/// Where the camera is and what it looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    pub up: Vec3,
}

impl CameraPose {
    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}

/// Swings the eye back and forth on a circle around a target in front of the
/// sensor.
///
/// The pose depends only on how many times [`advance`](Self::advance) has been
/// called: call `n` uses the angle `sin(n * step) / 1.2`.
#[derive(Debug, Clone)]
pub struct OrbitController {
    radius: f32,
    step: f64,
    phase: f64,
}

impl OrbitController {
    pub fn new() -> Self {
        Self {
            radius: ORBIT_RADIUS,
            step: ORBIT_STEP,
            phase: 0.0,
        }
    }

    /// Use a different phase step per frame.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Pose for this frame; moves the phase on by one step.
    pub fn advance(&mut self) -> CameraPose {
        let angle = (self.phase.sin() / ANGLE_DIVISOR) as f32;
        self.phase += self.step;

        let r = self.radius;
        CameraPose {
            eye: Vec3::new(r * angle.sin(), 0.0, r * (1.0 - angle.cos()) - r / 2.0),
            target: Vec3::new(0.0, 0.0, r / 2.0),
            up: Vec3::Y,
        }
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new()
    }
}

/// Projection matrix configuration.
pub struct Projection {
    width: u32,
    height: u32,
    fov: f32,
    near: f32,
    far: f32,
}

impl Projection {
    pub const FOV_DEGREES: f32 = 45.0;
    pub const NEAR: f32 = 0.1;
    pub const FAR: f32 = 1000.0;

    /// Viewport-sized projection with the default lens.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fov: Self::FOV_DEGREES.to_radians(),
            near: Self::NEAR,
            far: Self::FAR,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Get the projection matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect(), self.near, self.far)
    }

    /// Update the projection size. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
    }
}
