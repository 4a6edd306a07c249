//! Per-request view state.
//!
//! A [`ViewSpec`] accumulates everything the pipeline needs to know about
//! the requested output: the viewport (as ratios of the full image), the
//! requested output size, rotation/flip, colourspace, and the processing
//! knobs. It also owns the geometry decisions: which pyramid resolution
//! serves a request, and the viewport in pixels at that resolution.

use crate::error::ProtocolError;
use crate::protocol::{Flip, OutputColour, Region, Rotation, SizeParam};

/// View state for one request.
#[derive(Debug, Clone)]
pub struct ViewSpec {
    /// Full-resolution image width
    image_width: u32,

    /// Full-resolution image height
    image_height: u32,

    /// Viewport as ratios of the full image
    view_left: f32,
    view_top: f32,
    view_width: f32,
    view_height: f32,
    viewport_set: bool,

    /// Requested output size in pixels
    request_width: u32,
    request_height: u32,

    /// Keep the output within the requested size, preserving aspect
    pub maintain_aspect: bool,

    /// Allow scaling beyond the native resolution
    pub allow_upscaling: bool,

    /// Maximum output dimension; 0 means unrestricted
    pub max_size: u32,

    pub rotation: Rotation,
    pub flip: Flip,
    pub colourspace: OutputColour,

    /// Histogram equalization requested
    pub equalization: bool,

    /// Contrast scale; -1.0 is the auto-stretch sentinel resolved before
    /// the float pipeline runs
    pub contrast: f32,

    /// Gamma exponent; 1.0 is a no-op
    pub gamma: f32,

    /// Invert normalized values
    pub inverted: bool,
}

impl ViewSpec {
    /// Create a view covering the full image at native size.
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_width,
            image_height,
            view_left: 0.0,
            view_top: 0.0,
            view_width: 1.0,
            view_height: 1.0,
            viewport_set: false,
            request_width: image_width,
            request_height: image_height,
            maintain_aspect: true,
            allow_upscaling: false,
            max_size: 0,
            rotation: Rotation::None,
            flip: Flip::None,
            colourspace: OutputColour::Color,
            equalization: false,
            contrast: 1.0,
            gamma: 1.0,
            inverted: false,
        }
    }

    /// Whether an explicit viewport was set.
    pub fn viewport_set(&self) -> bool {
        self.viewport_set
    }

    /// Requested output width in pixels.
    pub fn request_width(&self) -> u32 {
        self.request_width
    }

    /// Requested output height in pixels.
    pub fn request_height(&self) -> u32 {
        self.request_height
    }

    /// Set the requested output size directly.
    pub fn set_request_size(&mut self, width: u32, height: u32) {
        self.request_width = width;
        self.request_height = height;
    }

    /// Set the viewport from ratios of the full image.
    pub fn set_viewport(&mut self, left: f32, top: f32, width: f32, height: f32) {
        self.view_left = left.clamp(0.0, 1.0);
        self.view_top = top.clamp(0.0, 1.0);
        self.view_width = width.clamp(0.0, 1.0 - self.view_left);
        self.view_height = height.clamp(0.0, 1.0 - self.view_top);
        self.viewport_set = true;
    }

    /// Viewport in pixels at the given level dimensions.
    ///
    /// Rounds to the nearest pixel so that ratios that came from exact
    /// pixel coordinates survive the float round trip tile-aligned.
    pub fn viewport_pixels(&self, level_width: u32, level_height: u32) -> (u32, u32, u32, u32) {
        let left = (self.view_left * level_width as f32).round() as u32;
        let top = (self.view_top * level_height as f32).round() as u32;
        let width = (self.view_width * level_width as f32).round() as u32;
        let height = (self.view_height * level_height as f32).round() as u32;
        (left, top, width, height)
    }

    /// Apply an IIIF region parameter.
    pub fn apply_region(&mut self, region: &Region) -> Result<(), ProtocolError> {
        match region {
            Region::Full => {}
            Region::Square => {
                // Centered crop of the shorter dimension
                if self.image_height > self.image_width {
                    let h = self.image_width as f32 / self.image_height as f32;
                    self.set_viewport(0.0, (1.0 - h) / 2.0, 1.0, h);
                } else if self.image_width > self.image_height {
                    let w = self.image_height as f32 / self.image_width as f32;
                    self.set_viewport((1.0 - w) / 2.0, 0.0, w, 1.0);
                }
                // Already square: nothing to crop
            }
            Region::Pixels { x, y, w, h } => {
                if *w <= 0.0 || *h <= 0.0 {
                    return Err(ProtocolError::InvalidRegion(format!(
                        "zero-sized region {w}x{h}"
                    )));
                }
                let wd = self.image_width as f32;
                let hd = self.image_height as f32;
                self.set_viewport(x / wd, y / hd, w / wd, h / hd);
            }
            Region::Percent { x, y, w, h } => {
                if *w <= 0.0 || *h <= 0.0 {
                    return Err(ProtocolError::InvalidRegion(format!(
                        "zero-sized region {w}x{h}"
                    )));
                }
                self.set_viewport(x / 100.0, y / 100.0, w / 100.0, h / 100.0);
            }
        }

        // Default output size follows the region
        let (_, _, w, h) = self.viewport_pixels(self.image_width, self.image_height);
        self.request_width = w;
        self.request_height = h;

        Ok(())
    }

    /// Apply an IIIF size parameter. Must run after [`Self::apply_region`].
    pub fn apply_size(&mut self, size: &SizeParam) -> Result<(), ProtocolError> {
        let ratio = self.request_width as f32 / self.request_height.max(1) as f32;

        match size {
            SizeParam::Max => {}
            SizeParam::Percent(scale) => {
                self.request_width =
                    (self.request_width as f32 * scale / 100.0).round() as u32;
                self.request_height =
                    (self.request_height as f32 * scale / 100.0).round() as u32;
            }
            SizeParam::Width(w) => {
                self.request_width = *w;
                self.request_height = (*w as f32 / ratio).round() as u32;
                self.maintain_aspect = true;
            }
            SizeParam::Height(h) => {
                self.request_height = *h;
                self.request_width = (*h as f32 * ratio).round() as u32;
                self.maintain_aspect = true;
            }
            SizeParam::Exact { w, h } => {
                self.request_width = *w;
                self.request_height = *h;
                self.maintain_aspect = false;
            }
            SizeParam::FitWithin { w, h } => {
                self.request_width = *w;
                self.request_height = *h;
                self.maintain_aspect = true;
            }
        }

        if self.request_width == 0 || self.request_height == 0 {
            return Err(ProtocolError::InvalidSize(
                "requested size yields a zero dimension".into(),
            ));
        }

        // Keep the output within the configured maximum
        if self.max_size > 0
            && (self.request_width > self.max_size || self.request_height > self.max_size)
        {
            if self.maintain_aspect {
                let scale = (self.max_size as f32 / self.request_width as f32)
                    .min(self.max_size as f32 / self.request_height as f32);
                self.request_width =
                    ((self.request_width as f32 * scale).round() as u32).max(1);
                self.request_height =
                    ((self.request_height as f32 * scale).round() as u32).max(1);
            } else {
                self.request_width = self.request_width.min(self.max_size);
                self.request_height = self.request_height.min(self.max_size);
            }
        }

        Ok(())
    }

    /// Choose the best resolution for the requested output size.
    ///
    /// `level_dims` is indexed by request resolution (0 = smallest). Picks
    /// the smallest resolution whose viewport still covers the requested
    /// output; falls back to the full resolution for oversized requests.
    pub fn best_resolution(&self, level_dims: &[(u32, u32)]) -> u32 {
        for (r, &(w, h)) in level_dims.iter().enumerate() {
            let vw = (self.view_width * w as f32).ceil() as u32;
            let vh = (self.view_height * h as f32).ceil() as u32;
            if vw >= self.request_width && vh >= self.request_height {
                return r as u32;
            }
        }
        level_dims.len().saturating_sub(1) as u32
    }

    /// Whether any float-pipeline adjustment beyond normalization is active.
    pub fn float_processing(&self) -> bool {
        self.contrast != 1.0 || self.gamma != 1.0 || self.inverted
    }

    /// Whether a downstream stage needs the channel histogram.
    pub fn require_histogram(&self) -> bool {
        self.equalization || self.colourspace == OutputColour::Binary || self.contrast == -1.0
    }
}
