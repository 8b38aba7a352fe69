//! Orbit camera and per-frame view state
//!
//! The camera is a Z-up orbit camera. Each frame the host turns it into a
//! [`ViewState`], which carries everything screen/world conversion needs.

use glam::{DMat4, DVec3, DVec4, Mat4, Vec3};
use pathlens_core::Bounds;

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,   // radians
    pub pitch: f32, // radians
    pub fov: f32,   // degrees
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 100.0,
            yaw: -45.0f32.to_radians(),
            pitch: 45.0f32.to_radians(),
            fov: 45.0,
            aspect_ratio: 1.0,
            near: 0.1,
            far: 1000.0,
            min_distance: 1.0,
            max_distance: 10000.0,
        }
    }
}

impl Camera {
    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            distance,
            ..Default::default()
        }
    }

    pub fn update_aspect_ratio(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect_ratio = width / height;
        }
    }

    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch += delta_pitch;

        // Keep away from the poles to avoid flipping
        let limit = 89.0f32.to_radians();
        self.pitch = self.pitch.clamp(-limit, limit);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance -= delta;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
    }

    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let forward = -self.offset_dir();
        let right = forward.cross(up_for(forward)).normalize();
        let up = right.cross(forward).normalize();

        let scale = self.distance * 0.001;
        self.target -= right * delta_x * scale;
        self.target += up * delta_y * scale;
    }

    fn offset_dir(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * cos_yaw, cos_pitch * sin_yaw, sin_pitch).normalize()
    }

    pub fn eye_position(&self) -> Vec3 {
        self.target + self.offset_dir() * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.eye_position();
        let forward = (self.target - eye).normalize();
        Mat4::look_at_rh(eye, self.target, up_for(forward))
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        )
    }

    pub fn set_view(&mut self, yaw_deg: f32, pitch_deg: f32) {
        self.yaw = yaw_deg.to_radians();
        self.pitch = pitch_deg.to_radians();
    }

    /// Center on the toolpath and back off far enough to see all of it.
    pub fn fit_to_bounds(&mut self, bounds: &Bounds) {
        if !bounds.is_valid() {
            return;
        }
        let center = bounds.center();
        let size = bounds.size();
        let max_dim = (size.max_element() as f32).max(1.0);

        self.target = Vec3::new(center.x as f32, center.y as f32, center.z as f32);

        // tan(fov/2) = (size/2) / distance, with 20% margin
        let fov_rad = self.fov.to_radians();
        let distance = (max_dim * 1.2) / (fov_rad / 2.0).tan();
        self.distance = distance.clamp(self.min_distance, self.max_distance);
        self.far = self.far.max(self.distance + max_dim * 4.0);
    }

    pub fn view_state(&self, viewport: ViewportRect) -> ViewState {
        ViewState {
            view: self.view_matrix(),
            projection: self.projection_matrix(),
            viewport,
            eye: self.eye_position(),
        }
    }
}

fn up_for(forward: Vec3) -> Vec3 {
    // Looking straight up or down, Y becomes screen up
    if forward.cross(Vec3::Z).length_squared() < 0.001 {
        Vec3::Y
    } else {
        Vec3::Z
    }
}

/// Viewport rectangle in screen pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn contains(&self, sx: f64, sy: f64) -> bool {
        sx >= self.x && sx <= self.x + self.width && sy >= self.y && sy <= self.y + self.height
    }
}

/// A world-space ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    /// Unit length
    pub direction: DVec3,
}

impl Ray {
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the nearest hit on a sphere, if any.
    pub fn intersect_sphere(&self, center: DVec3, radius: f64) -> Option<f64> {
        let oc = self.origin - center;
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t_near = -b - sqrt_disc;
        if t_near >= 0.0 {
            return Some(t_near);
        }
        // Origin inside the sphere
        let t_far = -b + sqrt_disc;
        (t_far >= 0.0).then_some(0.0)
    }
}

/// View and projection supplied by the host for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub view: Mat4,
    pub projection: Mat4,
    pub viewport: ViewportRect,
    pub eye: Vec3,
}

impl ViewState {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn eye_dvec3(&self) -> DVec3 {
        self.eye.as_dvec3()
    }

    /// Screen pixel to normalized device coordinates, `None` outside the viewport.
    pub fn screen_to_ndc(&self, sx: f64, sy: f64) -> Option<(f64, f64)> {
        let vp = &self.viewport;
        if vp.is_empty() || !sx.is_finite() || !sy.is_finite() || !vp.contains(sx, sy) {
            return None;
        }
        let nx = (sx - vp.x) / vp.width * 2.0 - 1.0;
        let ny = 1.0 - (sy - vp.y) / vp.height * 2.0;
        Some((nx, ny))
    }

    /// Ray through a point in normalized device coordinates.
    pub fn ray_from_ndc(&self, nx: f64, ny: f64) -> Option<Ray> {
        let inverse: DMat4 = self.view_projection().as_dmat4().inverse();
        let near = inverse.project_point3(DVec3::new(nx, ny, 0.0));
        let far = inverse.project_point3(DVec3::new(nx, ny, 0.5));
        let direction = (far - near).normalize_or_zero();
        if !near.is_finite() || direction == DVec3::ZERO || !direction.is_finite() {
            return None;
        }
        Some(Ray {
            origin: near,
            direction,
        })
    }

    pub fn ray_from_screen(&self, sx: f64, sy: f64) -> Option<Ray> {
        let (nx, ny) = self.screen_to_ndc(sx, sy)?;
        self.ray_from_ndc(nx, ny)
    }

    /// Project a world point to screen pixels, `None` behind the camera.
    pub fn world_to_screen(&self, p: DVec3) -> Option<(f64, f64)> {
        let clip = self.view_projection().as_dmat4() * DVec4::new(p.x, p.y, p.z, 1.0);
        if clip.w <= f64::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let vp = &self.viewport;
        Some((
            vp.x + (ndc.x + 1.0) * 0.5 * vp.width,
            vp.y + (1.0 - ndc.y) * 0.5 * vp.height,
        ))
    }
}
