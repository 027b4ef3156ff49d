//! Level-space camera. Level space is Z-up; an unrotated camera looks down +X.

use glam::{Mat4, Quat, Vec3};

const FOV_Y_DEG: f32 = 60.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 8192.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub rotation: Quat,
}

impl Camera {
    pub fn new(eye: Vec3, rotation: Quat) -> Self {
        Self { eye, rotation }
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Combined projection * view for a target of the given aspect ratio.
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let proj = Mat4::perspective_rh(FOV_Y_DEG.to_radians(), aspect.max(1e-3), Z_NEAR, Z_FAR);
        let view = Mat4::look_to_rh(self.eye, self.forward(), self.up());
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{EulerRot, Vec4};

    fn clip(cam: &Camera, p: Vec3) -> Vec4 {
        cam.view_proj(16.0 / 9.0) * p.extend(1.0)
    }

    #[test]
    fn point_ahead_lands_mid_screen() {
        let cam = Camera::new(Vec3::new(10.0, 20.0, 32.0), Quat::IDENTITY);
        let c = clip(&cam, Vec3::new(110.0, 20.0, 32.0));
        assert!(c.w > 0.0);
        let ndc = c.truncate() / c.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);

        assert!(clip(&cam, Vec3::new(-90.0, 20.0, 32.0)).w < 0.0);
    }

    #[test]
    fn level_up_is_screen_up() {
        let cam = Camera::new(Vec3::ZERO, Quat::IDENTITY);
        let c = clip(&cam, Vec3::new(100.0, 0.0, 10.0));
        assert!(c.y / c.w > 0.0);
        // +Y is to the left when looking down +X with Z up.
        let c = clip(&cam, Vec3::new(100.0, 10.0, 0.0));
        assert!(c.x / c.w < 0.0);
    }

    #[test]
    fn yaw_turns_view() {
        let yaw = Quat::from_euler(EulerRot::ZYX, std::f32::consts::FRAC_PI_2, 0.0, 0.0);
        let cam = Camera::new(Vec3::ZERO, yaw);
        assert!((cam.forward() - Vec3::Y).length() < 1e-5);
        let c = clip(&cam, Vec3::new(0.0, 100.0, 0.0));
        assert!(c.w > 0.0 && (c.x / c.w).abs() < 1e-4);
    }
}
