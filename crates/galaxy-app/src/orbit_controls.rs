//! Damped orbit camera around a target point.
//!
//! Spherical angles follow the usual convention for a Y-up world: `phi` is
//! the polar angle from +Y, `theta` the azimuth around Y measured from +Z.

use galaxy_config::CameraConfig;
use galaxy_input::PointerFrame;
use galaxy_render::Camera;
use glam::Vec3;

/// Keeps the camera off the pole, where the look-at basis degenerates.
const MIN_POLAR_ANGLE: f32 = 1e-4;

/// Below this the remaining motion is treated as settled.
const SETTLED_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Spherical {
    radius: f32,
    theta: f32,
    phi: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius,
                theta: 0.0,
                phi: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

/// Orbit, pan and zoom limits plus input sensitivity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitSettings {
    /// Fraction of the pending motion applied each frame. Values outside
    /// `(0, 1)` disable damping.
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub max_polar_angle: f32,
    /// Radians per pixel of drag.
    pub rotate_speed: f32,
    /// Distance multiplier per wheel line.
    pub zoom_speed: f32,
    /// World units per pixel of drag, per unit of orbit distance.
    pub pan_speed: f32,
}

impl From<&CameraConfig> for OrbitSettings {
    fn from(config: &CameraConfig) -> Self {
        let min_distance = config.min_distance.max(0.0);
        Self {
            damping_factor: config.damping_factor,
            min_distance,
            max_distance: config.max_distance.max(min_distance),
            max_polar_angle: config
                .max_polar_angle
                .clamp(MIN_POLAR_ANGLE, std::f32::consts::PI - MIN_POLAR_ANGLE),
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
        }
    }
}

/// Orbit camera controller with inertia.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    settings: OrbitSettings,
    target: Vec3,
    spherical: Spherical,
    delta_theta: f32,
    delta_phi: f32,
    pan_offset: Vec3,
}

impl OrbitControls {
    /// Start orbiting from the camera's current placement.
    pub fn from_camera(camera: &Camera, settings: OrbitSettings) -> Self {
        let mut controls = Self {
            settings,
            target: camera.target,
            spherical: Spherical::from_offset(camera.position - camera.target),
            delta_theta: 0.0,
            delta_phi: 0.0,
            pan_offset: Vec3::ZERO,
        };
        controls.clamp();
        controls
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.spherical.radius
    }

    /// Whether damped motion is still pending.
    fn is_moving(&self) -> bool {
        self.delta_theta.abs() > SETTLED_EPSILON
            || self.delta_phi.abs() > SETTLED_EPSILON
            || self.pan_offset.length_squared() > SETTLED_EPSILON * SETTLED_EPSILON
    }

    /// Fold this frame's pointer gestures in, advance the damped motion by one
    /// step and write the result to `camera`.
    ///
    /// Returns `false` when there was neither input nor pending motion, so the
    /// camera is where the previous call left it.
    pub fn update(&mut self, camera: &mut Camera, input: PointerFrame) -> bool {
        let s = self.settings;
        let moved = !input.is_idle() || self.is_moving();

        self.delta_theta -= input.rotate.x * s.rotate_speed;
        self.delta_phi -= input.rotate.y * s.rotate_speed;

        if input.zoom != 0.0 && s.zoom_speed > 0.0 {
            self.spherical.radius *= s.zoom_speed.powf(input.zoom);
        }

        if input.pan.x != 0.0 || input.pan.y != 0.0 {
            let scale = self.spherical.radius * s.pan_speed;
            self.pan_offset +=
                (camera.billboard_up() * input.pan.y - camera.right() * input.pan.x) * scale;
        }

        let step = if s.damping_factor > 0.0 && s.damping_factor < 1.0 {
            s.damping_factor
        } else {
            1.0
        };

        self.spherical.theta += self.delta_theta * step;
        self.spherical.phi += self.delta_phi * step;
        self.target += self.pan_offset * step;
        self.clamp();

        self.delta_theta *= 1.0 - step;
        self.delta_phi *= 1.0 - step;
        self.pan_offset *= 1.0 - step;
        if !self.is_moving() {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }

        camera.target = self.target;
        camera.position = self.target + self.spherical.to_offset();
        moved
    }

    fn clamp(&mut self) {
        let s = self.settings;
        self.spherical.phi = self.spherical.phi.clamp(MIN_POLAR_ANGLE, s.max_polar_angle);
        self.spherical.radius = self.spherical.radius.clamp(s.min_distance, s.max_distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn settings(damping_factor: f32) -> OrbitSettings {
        OrbitSettings {
            damping_factor,
            ..OrbitSettings::from(&CameraConfig::default())
        }
    }

    fn camera() -> Camera {
        Camera::looking_at(Vec3::new(0.0, 500.0, 500.0), Vec3::ZERO)
    }

    #[test]
    fn test_idle_update_keeps_camera() {
        let mut cam = camera();
        let mut controls = OrbitControls::from_camera(&cam, settings(0.05));
        assert!(!controls.update(&mut cam, PointerFrame::default()));
        assert!((cam.position - Vec3::new(0.0, 500.0, 500.0)).length() < 1e-3);
        assert_eq!(cam.target, Vec3::ZERO);
        assert!(!controls.is_moving());
    }

    #[test]
    fn test_update_reports_motion_until_settled() {
        let mut cam = camera();
        let mut controls = OrbitControls::from_camera(&cam, settings(0.25));
        let drag = PointerFrame {
            rotate: Vec2::new(40.0, 0.0),
            ..Default::default()
        };
        assert!(controls.update(&mut cam, drag));
        // Damping keeps the camera moving after the gesture ends
        assert!(controls.update(&mut cam, PointerFrame::default()));

        let mut frames = 0;
        while controls.update(&mut cam, PointerFrame::default()) {
            frames += 1;
            assert!(frames < 500, "damped motion never settled");
        }
        let settled = cam.position;
        assert!(!controls.update(&mut cam, PointerFrame::default()));
        assert_eq!(cam.position, settled);
    }

    #[test]
    fn test_rotate_preserves_distance() {
        let mut cam = camera();
        let mut controls = OrbitControls::from_camera(&cam, settings(0.0));
        let input = PointerFrame {
            rotate: Vec2::new(100.0, 0.0),
            ..Default::default()
        };
        controls.update(&mut cam, input);
        let distance = cam.position.length();
        assert!((distance - 500.0 * 2f32.sqrt()).abs() < 1e-2);
        assert!(cam.position.x.abs() > 1.0, "azimuth should have changed");
        assert!((cam.position.y - 500.0).abs() < 1e-2, "polar unchanged");
    }

    #[test]
    fn test_damping_spreads_motion_over_frames() {
        let mut damped_cam = camera();
        let mut damped = OrbitControls::from_camera(&damped_cam, settings(0.25));
        let mut instant_cam = camera();
        let mut instant = OrbitControls::from_camera(&instant_cam, settings(0.0));

        let input = PointerFrame {
            rotate: Vec2::new(50.0, 0.0),
            ..Default::default()
        };
        damped.update(&mut damped_cam, input);
        instant.update(&mut instant_cam, input);
        assert!(damped.is_moving());
        assert!(!instant.is_moving());
        assert!((damped_cam.position - instant_cam.position).length() > 1.0);

        for _ in 0..200 {
            damped.update(&mut damped_cam, PointerFrame::default());
        }
        assert!(!damped.is_moving());
        assert!((damped_cam.position - instant_cam.position).length() < 1e-2);
    }

    #[test]
    fn test_zoom_scales_and_clamps_distance() {
        let mut cam = camera();
        let mut controls = OrbitControls::from_camera(&cam, settings(0.05));
        let start = controls.distance();
        controls.update(
            &mut cam,
            PointerFrame {
                zoom: 1.0,
                ..Default::default()
            },
        );
        assert!((controls.distance() - start * 0.95).abs() < 1e-2);

        controls.update(
            &mut cam,
            PointerFrame {
                zoom: 1000.0,
                ..Default::default()
            },
        );
        assert_eq!(controls.distance(), 1.0);

        controls.update(
            &mut cam,
            PointerFrame {
                zoom: -5000.0,
                ..Default::default()
            },
        );
        assert_eq!(controls.distance(), 16384.0);
    }

    #[test]
    fn test_polar_angle_clamped() {
        let mut cam = camera();
        let s = settings(0.0);
        let mut controls = OrbitControls::from_camera(&cam, s);
        // drag far downward: camera wants to swing under the target
        controls.update(
            &mut cam,
            PointerFrame {
                rotate: Vec2::new(0.0, -10_000.0),
                ..Default::default()
            },
        );
        assert_eq!(controls.spherical.phi, s.max_polar_angle);
        assert!(cam.position.y > 0.0);

        controls.update(
            &mut cam,
            PointerFrame {
                rotate: Vec2::new(0.0, 10_000.0),
                ..Default::default()
            },
        );
        assert_eq!(controls.spherical.phi, MIN_POLAR_ANGLE);
    }

    #[test]
    fn test_pan_moves_target_and_camera_together() {
        let mut cam = camera();
        let mut controls = OrbitControls::from_camera(&cam, settings(0.0));
        let offset_before = cam.position - cam.target;
        controls.update(
            &mut cam,
            PointerFrame {
                pan: Vec2::new(100.0, 0.0),
                ..Default::default()
            },
        );
        assert!(controls.target().length() > 1.0);
        assert_eq!(cam.target, controls.target());
        assert!(((cam.position - cam.target) - offset_before).length() < 1e-2);
        // dragging right moves the target left
        assert!(controls.target().x < 0.0);
    }

    #[test]
    fn test_spherical_roundtrip() {
        let offset = Vec3::new(120.0, -40.0, 75.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).length() < 1e-3);
    }
}
