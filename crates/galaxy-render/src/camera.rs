//! Perspective camera with a layer visibility mask.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::layer::LayerMask;

/// Camera data uploaded once per scene render.
///
/// `right` and `up` are the camera basis, used to expand sprite billboards.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub right: [f32; 4],
    pub up: [f32; 4],
}

/// A look-at perspective camera.
///
/// `layers` is the visibility mask the compositor rewrites before every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub layers: LayerMask,
}

impl Camera {
    /// Create a camera looking from `position` at `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Self::default()
        }
    }

    /// Compute the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Compute the projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.near, self.far)
    }

    /// Compute the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Unit vector from the camera toward its target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    /// Camera-space right vector in world space.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }

    /// Camera-space up vector in world space (orthogonal to forward).
    pub fn billboard_up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize_or(Vec3::Y)
    }

    /// Update the aspect ratio from viewport dimensions.
    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) {
        self.aspect_ratio = width / height.max(1.0);
    }

    /// Convert the camera to a uniform suitable for GPU upload.
    pub fn to_uniform(&self) -> CameraUniform {
        let right = self.right();
        let up = self.billboard_up();
        CameraUniform {
            view_proj: self.view_projection_matrix().to_cols_array_2d(),
            right: [right.x, right.y, right.z, 0.0],
            up: [up.x, up.y, up.z, 0.0],
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60.0_f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
            far: 5_000_000.0,
            layers: LayerMask::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_points_at_target() {
        let camera = Camera::looking_at(Vec3::new(0.0, 500.0, 500.0), Vec3::ZERO);
        let expected = Vec3::new(0.0, -1.0, -1.0).normalize();
        assert!((camera.forward() - expected).length() < 1e-5);
    }

    #[test]
    fn test_billboard_basis_is_orthonormal() {
        let camera = Camera::looking_at(Vec3::new(10.0, 40.0, -25.0), Vec3::new(1.0, 2.0, 3.0));
        let (r, u, f) = (camera.right(), camera.billboard_up(), camera.forward());
        assert!((r.length() - 1.0).abs() < 1e-5);
        assert!((u.length() - 1.0).abs() < 1e-5);
        assert!(r.dot(u).abs() < 1e-5);
        assert!(r.dot(f).abs() < 1e-5);
        assert!(u.dot(f).abs() < 1e-5);
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::looking_at(Vec3::new(0.0, 500.0, 500.0), Vec3::ZERO);
        let clip = camera.view_projection_matrix() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(clip.w > 0.0, "target should be in front of the camera");
    }

    #[test]
    fn test_set_aspect_ratio_guards_zero_height() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(1920.0, 0.0);
        assert!(camera.aspect_ratio.is_finite());
        camera.set_aspect_ratio(1920.0, 1080.0);
        assert!((camera.aspect_ratio - 16.0 / 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_camera_uniform_size() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 96);
    }
}
