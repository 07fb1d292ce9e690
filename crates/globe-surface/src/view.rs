//! What the surface needs to know about the camera.
//!
//! The scheduler only asks three questions of a view: is a tile visible, how
//! far is it, and how many pixels of error does a given geometric error make
//! at that distance. Hosts answer them from their own camera and frustum.

use glam::DVec3;

use crate::tiling::{Rectangle, WGS84_RADIUS_M};

/// Camera-dependent answers the traversal needs.
pub trait SurfaceView {
    /// Whether any part of `rectangle` may be on screen.
    fn is_visible(&self, rectangle: &Rectangle) -> bool;

    /// Distance in meters from the camera to the nearest point of `rectangle`.
    fn distance(&self, rectangle: &Rectangle) -> f64;

    /// Pixels covered by `geometric_error` meters at `distance` meters.
    fn screen_space_error(&self, geometric_error: f64, distance: f64) -> f64;
}

/// Per-frame input to the surface.
#[derive(Clone, Copy)]
pub struct FrameState<'a> {
    pub view: &'a dyn SurfaceView,
}

impl<'a> FrameState<'a> {
    #[must_use]
    pub fn new(view: &'a dyn SurfaceView) -> Self {
        Self { view }
    }
}

/// Point on the reference sphere at `height` meters, longitude and latitude
/// in radians.
#[must_use]
pub fn cartographic_to_cartesian(lon: f64, lat: f64, height: f64) -> DVec3 {
    let r = WGS84_RADIUS_M + height;
    DVec3::new(
        r * lat.cos() * lon.cos(),
        r * lat.cos() * lon.sin(),
        r * lat.sin(),
    )
}

/// A camera looking straight down at a geographic rectangle.
///
/// Tiles that intersect the target rectangle are visible; everything else is
/// culled. Useful for headless loading and tests.
#[derive(Debug, Clone, Copy)]
pub struct RectangleView {
    target: Rectangle,
    camera: DVec3,
    /// Pixels per meter at distance 1.
    pixels_per_meter: f64,
}

impl RectangleView {
    /// Default vertical field of view in radians.
    pub const DEFAULT_FOV_Y: f64 = std::f64::consts::FRAC_PI_3;

    /// Frame `target` on a screen `screen_height` pixels tall.
    #[must_use]
    pub fn framing(target: Rectangle, screen_height: f64) -> Self {
        Self::framing_with_fov(target, screen_height, Self::DEFAULT_FOV_Y)
    }

    /// Frame `target` with the given vertical field of view.
    #[must_use]
    pub fn framing_with_fov(target: Rectangle, screen_height: f64, fov_y: f64) -> Self {
        let half_tan = (fov_y / 2.0).tan();
        let (lon, lat) = target.center();
        let extent = target.width().max(target.height()) * WGS84_RADIUS_M;
        let height = (extent / 2.0) / half_tan;
        Self {
            target,
            camera: cartographic_to_cartesian(lon, lat, height),
            pixels_per_meter: screen_height / (2.0 * half_tan),
        }
    }

    #[must_use]
    pub fn target(&self) -> Rectangle {
        self.target
    }

    #[must_use]
    pub fn camera_position(&self) -> DVec3 {
        self.camera
    }
}

impl SurfaceView for RectangleView {
    fn is_visible(&self, rectangle: &Rectangle) -> bool {
        !rectangle.is_degenerate() && rectangle.intersects(&self.target)
    }

    fn distance(&self, rectangle: &Rectangle) -> f64 {
        let camera_lon = self.camera.y.atan2(self.camera.x);
        let camera_lat = (self.camera.z / self.camera.length()).asin();
        let (lon, lat) = rectangle.clamp(camera_lon, camera_lat);
        self.camera.distance(cartographic_to_cartesian(lon, lat, 0.0))
    }

    fn screen_space_error(&self, geometric_error: f64, distance: f64) -> f64 {
        if distance <= 0.0 {
            return f64::INFINITY;
        }
        geometric_error * self.pixels_per_meter / distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::TilingScheme;

    #[test]
    fn test_culls_outside_target() {
        let view = RectangleView::framing(Rectangle::from_degrees(10.0, 10.0, 20.0, 20.0), 1080.0);
        assert!(view.is_visible(&Rectangle::from_degrees(0.0, 0.0, 15.0, 15.0)));
        assert!(!view.is_visible(&Rectangle::from_degrees(-50.0, -50.0, -40.0, -40.0)));
    }

    #[test]
    fn test_nearer_tile_is_closer() {
        let view = RectangleView::framing(Rectangle::from_degrees(10.0, 10.0, 20.0, 20.0), 1080.0);
        let under = view.distance(&Rectangle::from_degrees(12.0, 12.0, 18.0, 18.0));
        let beside = view.distance(&Rectangle::from_degrees(40.0, 12.0, 50.0, 18.0));
        assert!(under < beside);
        assert!(under > 0.0);
    }

    #[test]
    fn test_error_shrinks_with_level() {
        let scheme = TilingScheme::geographic();
        let view = RectangleView::framing(Rectangle::from_degrees(10.0, 10.0, 11.0, 11.0), 1080.0);
        let d = view.distance(&Rectangle::from_degrees(10.0, 10.0, 11.0, 11.0));
        let coarse = view.screen_space_error(scheme.geometric_error(2), d);
        let fine = view.screen_space_error(scheme.geometric_error(12), d);
        assert!(coarse > 2.0);
        assert!(fine < coarse);
        assert!(view.screen_space_error(1.0, 0.0).is_infinite());
    }
}
