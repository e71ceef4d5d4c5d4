//! Render surface provisioning.
//!
//! The canvas has two independent sizes: the CSS size decides how large it
//! looks, the backing-store size decides the render resolution. Both are set
//! here before the runtime is instantiated.

use tracing::debug;

use embed_supervisor_common::CanvasConfig;

use crate::surface::{Canvas, Container, Document, Size};

/// Backing-store dimensions in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Device class deciding the sizing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    /// Size comes from the stylesheet.
    Mobile,
    /// Canvas stretched to the full viewport via CSS.
    Desktop,
}

impl DeviceClass {
    /// Classify a user agent against the configured mobile tokens
    /// (case-insensitive).
    pub fn from_user_agent(user_agent: &str, mobile_tokens: &[String]) -> Self {
        let user_agent = user_agent.to_lowercase();
        let mobile = mobile_tokens
            .iter()
            .any(|token| user_agent.contains(&token.to_lowercase()));

        if mobile { Self::Mobile } else { Self::Desktop }
    }
}

/// Compute backing-store dimensions.
///
/// Each axis falls back to the viewport when the container axis is
/// degenerate (not laid out yet), then is floored at the configured minimum.
pub fn compute_dimensions(container: Size, viewport: Size, config: &CanvasConfig) -> Dimensions {
    Dimensions {
        width: axis(container.width, viewport.width, config.min_width),
        height: axis(container.height, viewport.height, config.min_height),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis(container: f64, viewport: f64, floor: u32) -> u32 {
    let usable = |v: f64| v.is_finite() && v > 0.0;

    let value = if usable(container) {
        container
    } else if usable(viewport) {
        viewport
    } else {
        0.0
    };

    // Saturating float-to-int cast; fractional pixels are dropped.
    (value.floor() as u32).max(floor)
}

/// Apply sizing and styling to an attached canvas.
pub fn provision(
    canvas: &dyn Canvas,
    container: &dyn Container,
    document: &dyn Document,
    config: &CanvasConfig,
) -> (Dimensions, DeviceClass) {
    canvas.make_focusable();

    let device = DeviceClass::from_user_agent(&document.user_agent(), &config.mobile_tokens);
    match device {
        DeviceClass::Mobile => {
            container.set_class(&config.mobile_class);
            canvas.set_class(&config.mobile_class);
        }
        DeviceClass::Desktop => {
            container.set_class(&config.desktop_class);
            canvas.set_css_size("100vw", "100vh");
        }
    }

    let dims = compute_dimensions(container.bounding_size(), document.viewport(), config);
    canvas.set_backing_size(dims.width, dims.height);

    debug!(
        width = dims.width,
        height = dims.height,
        device = ?device,
        "Canvas provisioned"
    );

    (dims, device)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Size = Size::new(1280.0, 800.0);

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn test_zero_container_uses_viewport() {
        let config = CanvasConfig::default();
        let result = compute_dimensions(Size::new(0.0, 0.0), VIEWPORT, &config);
        assert_eq!(result, dims(1280, 800));
    }

    #[test]
    fn test_zero_container_and_viewport_floor() {
        let config = CanvasConfig::default();
        let result = compute_dimensions(Size::new(0.0, 0.0), Size::new(0.0, 0.0), &config);
        assert_eq!(result, dims(320, 240));
    }

    #[test]
    fn test_small_container_floors() {
        let config = CanvasConfig::default();
        let result = compute_dimensions(Size::new(150.0, 100.0), VIEWPORT, &config);
        assert_eq!(result, dims(320, 240));
    }

    #[test]
    fn test_large_container_kept() {
        let config = CanvasConfig::default();
        let result = compute_dimensions(Size::new(1024.0, 768.0), VIEWPORT, &config);
        assert_eq!(result, dims(1024, 768));
    }

    #[test]
    fn test_per_axis_fallback() {
        let config = CanvasConfig::default();
        let result = compute_dimensions(Size::new(900.0, 0.0), VIEWPORT, &config);
        assert_eq!(result, dims(900, 800));
    }

    #[test]
    fn test_non_finite_container() {
        let config = CanvasConfig::default();
        let result = compute_dimensions(Size::new(f64::NAN, f64::INFINITY), VIEWPORT, &config);
        assert_eq!(result, dims(1280, 800));
    }

    #[test]
    fn test_device_class() {
        let tokens = CanvasConfig::default().mobile_tokens;

        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        let android = "Mozilla/5.0 (Linux; android 14; Pixel 8)";
        let desktop = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

        assert_eq!(DeviceClass::from_user_agent(iphone, &tokens), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(android, &tokens), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(desktop, &tokens), DeviceClass::Desktop);
    }
}
