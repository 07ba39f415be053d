//! Label visualization for manual dataset validation.
//!
//! Draws a sample's grayscale image with the vehicle's two visible faces
//! overlaid as quadrilaterals built from the three sticks, colored by the
//! face ratios, and a caption band with the frame number and track id.
//! Figures are written as PNG files using the plotters bitmap backend.

use std::path::{Path, PathBuf};

use log::info;
use ndarray::Array2;
use plotters::coord::Shift;
use plotters::drawing::DrawingArea;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::VisualizationConfig;
use crate::core::binary::{AttributeArray, TrackId};
use crate::core::descriptor::Attribute;
use crate::core::loaders::SingleFrameDataset;
use crate::processors::clustering::MultiFrameDataset;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid sample: {0}")]
    InvalidSample(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

pub const BACK_FACE_COLOR: RGBColor = RGBColor(0, 0, 255); // blue
pub const FRONT_FACE_COLOR: RGBColor = RGBColor(255, 0, 0); // red
pub const LEFT_FACE_COLOR: RGBColor = RGBColor(0, 128, 0); // green
pub const RIGHT_FACE_COLOR: RGBColor = RGBColor(255, 255, 0); // yellow

/// Caption band color (orange, drawn half transparent).
const CAPTION_COLOR: RGBColor = RGBColor(255, 165, 0);

/// Number of stick coordinates per sample.
pub const STICK_VALUES: usize = 9;

/// Number of face ratios per sample.
pub const RATIO_VALUES: usize = 4;

/// Vehicle faces in the order of the ratios array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Back,
    Front,
    Left,
    Right,
}

impl Face {
    pub const ALL: [Face; 4] = [Face::Back, Face::Front, Face::Left, Face::Right];

    /// Position of the face in the ratios array.
    pub const fn index(self) -> usize {
        match self {
            Face::Back => 0,
            Face::Front => 1,
            Face::Left => 2,
            Face::Right => 3,
        }
    }

    pub const fn color(self) -> RGBColor {
        match self {
            Face::Back => BACK_FACE_COLOR,
            Face::Front => FRONT_FACE_COLOR,
            Face::Left => LEFT_FACE_COLOR,
            Face::Right => RIGHT_FACE_COLOR,
        }
    }
}

/// How the left and right face patches are painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchColors {
    /// Unfilled patches with a neutral outline.
    Outline,
    /// Filled patches in the colors of the given faces.
    Filled { left: Face, right: Face },
}

/// Choose the patch colors from the face ratios.
///
/// Faces with a strictly positive ratio are visible. One visible face colors
/// both patches. With more, the first two in ratios order go to the left and
/// right patch, except that back/left and front/right are listed in the
/// opposite order to how they appear on screen, so those sets are reversed.
/// Missing ratios, or none positive, give unfilled outlines.
pub fn face_patch_colors(ratios: Option<&[f64; RATIO_VALUES]>) -> PatchColors {
    let Some(ratios) = ratios else {
        return PatchColors::Outline;
    };

    let mut visible: Vec<Face> = Face::ALL
        .into_iter()
        .filter(|face| ratios[face.index()] > 0.0)
        .collect();

    match visible.as_slice() {
        [] => PatchColors::Outline,
        [face] => PatchColors::Filled {
            left: *face,
            right: *face,
        },
        _ => {
            let has = |face: Face| visible.contains(&face);
            if (has(Face::Left) && has(Face::Back)) || (has(Face::Front) && has(Face::Right)) {
                visible.reverse();
            }
            PatchColors::Filled {
                left: visible[0],
                right: visible[1],
            }
        }
    }
}

/// One vertical face boundary marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stick {
    pub x: f64,
    pub y_bottom: f64,
    pub y_top: f64,
}

/// The three sticks of a sample, left to right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sticks(pub [Stick; 3]);

impl Sticks {
    /// Build from `[s1_x, s1_y_bottom, s1_y_top, s2_x, ..., s3_y_top]`.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() != STICK_VALUES {
            return None;
        }
        let stick = |i: usize| Stick {
            x: values[3 * i],
            y_bottom: values[3 * i + 1],
            y_top: values[3 * i + 2],
        };
        Some(Sticks([stick(0), stick(1), stick(2)]))
    }

    /// Convert from the centered [-1, 1] system to pixel units with the
    /// origin at the bottom-left corner.
    pub fn to_pixels(&self, image_size: f64) -> Sticks {
        let half = image_size / 2.0;
        let convert = |v: f64| half + half * v;
        Sticks(self.0.map(|s| Stick {
            x: convert(s.x),
            y_bottom: convert(s.y_bottom),
            y_top: convert(s.y_top),
        }))
    }

    /// Corners of the left (sticks 1-2) and right (sticks 2-3) face patches.
    pub fn face_polygons(&self) -> ([(f64, f64); 4], [(f64, f64); 4]) {
        let quad = |a: Stick, b: Stick| {
            [
                (a.x, a.y_top),
                (a.x, a.y_bottom),
                (b.x, b.y_bottom),
                (b.x, b.y_top),
            ]
        };
        let [s1, s2, s3] = self.0;
        (quad(s1, s2), quad(s2, s3))
    }
}

/// Everything drawn for one frame of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    /// Grayscale image, row 0 at the bottom.
    pub image: Array2<f64>,
    /// Sticks in the centered [-1, 1] coordinate system.
    pub sticks: Sticks,
    pub id: TrackId,
    pub frame: f64,
    pub ratios: Option<[f64; RATIO_VALUES]>,
}

impl LabeledSample {
    /// Extract sample `index` of a single-frame dataset.
    pub fn from_single_frame(
        dataset: &SingleFrameDataset,
        index: usize,
        with_ratios: bool,
    ) -> Result<Self> {
        let len = dataset.num_samples();
        if index >= len {
            return Err(VisualizationError::IndexOutOfRange { index, len });
        }

        let id = scalar(dataset.ids(), index, 0, 1, Attribute::Ids)?;
        let id = integral_id(id)?;

        Self::from_frame(
            |attribute| Some(dataset.get(attribute)),
            index,
            0,
            1,
            id,
            with_ratios,
        )
    }

    /// Extract frame `slot` of clustered row `row` (slot 0 is the current frame).
    pub fn from_multi_frame(
        dataset: &MultiFrameDataset,
        row: usize,
        slot: usize,
        with_ratios: bool,
    ) -> Result<Self> {
        let window = dataset
            .windows()
            .get(row)
            .ok_or(VisualizationError::IndexOutOfRange {
                index: row,
                len: dataset.num_rows(),
            })?;

        let slots = dataset.frames_per_row();
        if slot >= slots {
            return Err(VisualizationError::IndexOutOfRange {
                index: slot,
                len: slots,
            });
        }

        Self::from_frame(
            |attribute| dataset.get(attribute),
            row,
            slot,
            slots,
            window.track_id(),
            with_ratios,
        )
    }

    fn from_frame<'a, F>(
        get: F,
        index: usize,
        slot: usize,
        slots: usize,
        id: TrackId,
        with_ratios: bool,
    ) -> Result<Self>
    where
        F: Fn(Attribute) -> Option<&'a AttributeArray>,
    {
        let get = |attribute: Attribute| {
            get(attribute).ok_or_else(|| {
                VisualizationError::InvalidSample(format!("{} is not available", attribute))
            })
        };

        let images = get(Attribute::Images)?;
        let (_, height, width, channels) = images.dim();
        let per_slot = channels / slots.max(1);
        let values = frame(images, index, slot, slots, Attribute::Images)?;
        if per_slot == 0 {
            return Err(VisualizationError::InvalidSample(
                "images have no channels".to_string(),
            ));
        }
        // First channel of the slot
        let pixels: Vec<f64> = values.into_iter().step_by(per_slot).collect();
        let image = Array2::from_shape_vec((height, width), pixels)
            .map_err(|e| VisualizationError::InvalidSample(e.to_string()))?;

        let stick_values = frame(get(Attribute::Sticks)?, index, slot, slots, Attribute::Sticks)?;
        let sticks = Sticks::from_values(&stick_values).ok_or_else(|| {
            VisualizationError::InvalidSample(format!(
                "expected {} stick values, found {}",
                STICK_VALUES,
                stick_values.len()
            ))
        })?;

        let frame_number = scalar(get(Attribute::Frames)?, index, slot, slots, Attribute::Frames)?;

        let ratios = if with_ratios {
            let values = frame(get(Attribute::Ratios)?, index, slot, slots, Attribute::Ratios)?;
            let ratios: [f64; RATIO_VALUES] = values.as_slice().try_into().map_err(|_| {
                VisualizationError::InvalidSample(format!(
                    "expected {} ratio values, found {}",
                    RATIO_VALUES,
                    values.len()
                ))
            })?;
            Some(ratios)
        } else {
            None
        };

        Ok(Self {
            image,
            sticks,
            id,
            frame: frame_number,
            ratios,
        })
    }

    /// Caption shown under the image.
    pub fn caption(&self) -> String {
        format!("frame: {}, id: {}", self.frame, self.id)
    }
}

fn frame(
    array: &AttributeArray,
    index: usize,
    slot: usize,
    slots: usize,
    attribute: Attribute,
) -> Result<Vec<f64>> {
    array.frame_values(index, slot, slots).ok_or_else(|| {
        VisualizationError::InvalidSample(format!(
            "{} has no frame slot {} of {} at index {} (shape {:?})",
            attribute,
            slot,
            slots,
            index,
            array.dim()
        ))
    })
}

fn scalar(
    array: &AttributeArray,
    index: usize,
    slot: usize,
    slots: usize,
    attribute: Attribute,
) -> Result<f64> {
    frame(array, index, slot, slots, attribute)?
        .first()
        .copied()
        .ok_or_else(|| VisualizationError::InvalidSample(format!("{} is empty", attribute)))
}

fn integral_id(value: f64) -> Result<TrackId> {
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value as TrackId)
    } else {
        Err(VisualizationError::InvalidSample(format!(
            "id {} is not integral",
            value
        )))
    }
}

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Map an intensity to a gray level, scaling `[lo, hi]` onto `[0, 255]`.
fn gray_level(value: f64, lo: f64, hi: f64) -> u8 {
    if hi - lo <= f64::EPSILON {
        return 0;
    }
    (((value - lo) / (hi - lo)).clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(feature = "caption-text")]
fn draw_caption_text(area: &DrawingArea<BitMapBackend<'_>, Shift>, caption: &str) -> Result<()> {
    use plotters::style::text_anchor::{HPos, Pos, VPos};

    let (width, height) = area.dim_in_pixel();
    let style = TextStyle::from(("sans-serif", 16).into_font())
        .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw_text(caption, &style, ((width / 2) as i32, (height / 2) as i32))
        .map_err(plotting_error)
}

#[cfg(not(feature = "caption-text"))]
fn draw_caption_text(_area: &DrawingArea<BitMapBackend<'_>, Shift>, caption: &str) -> Result<()> {
    log::debug!("Caption text rendering disabled, caption: {}", caption);
    Ok(())
}

/// Render a labeled sample and save it as a PNG.
///
/// The image is drawn with its first row at the bottom. Sticks are converted
/// to pixel units using the image height as the image size.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `sample` - Image and labels to draw
/// * `config` - Figure scale, face opacity and outline color
pub fn plot_image_with_labels(
    output_path: &Path,
    sample: &LabeledSample,
    config: &VisualizationConfig,
) -> Result<()> {
    let (height, width) = sample.image.dim();
    if height == 0 || width == 0 {
        return Err(VisualizationError::InvalidSample("empty image".to_string()));
    }

    let scale = config.pixel_scale.max(1);
    let image_height_px = height as u32 * scale;
    let image_width_px = width as u32 * scale;

    let root = BitMapBackend::new(
        output_path,
        (image_width_px, image_height_px + config.caption_height),
    )
    .into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    let (image_area, caption_area) = root.split_vertically(image_height_px);

    // Pixel centers sit on integer coordinates
    let mut chart = ChartBuilder::on(&image_area)
        .margin(0)
        .build_cartesian_2d(-0.5..(width as f64 - 0.5), -0.5..(height as f64 - 0.5))
        .map_err(plotting_error)?;

    let (lo, hi) = sample
        .image
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    chart
        .draw_series(sample.image.indexed_iter().map(|((row, col), &value)| {
            let level = gray_level(value, lo, hi);
            let (x, y) = (col as f64, row as f64);
            Rectangle::new(
                [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                RGBColor(level, level, level).filled(),
            )
        }))
        .map_err(plotting_error)?;

    let sticks = sample.sticks.to_pixels(height as f64);
    let (left_face, right_face) = sticks.face_polygons();

    match face_patch_colors(sample.ratios.as_ref()) {
        PatchColors::Outline => {
            let [r, g, b] = config.outline_color;
            let style = RGBColor(r, g, b).stroke_width(2);
            for corners in [left_face, right_face] {
                let mut path = corners.to_vec();
                path.push(corners[0]);
                chart
                    .draw_series(std::iter::once(PathElement::new(path, style)))
                    .map_err(plotting_error)?;
            }
        }
        PatchColors::Filled { left, right } => {
            let alpha = config.face_alpha.clamp(0.0, 1.0);
            for (corners, face) in [(left_face, left), (right_face, right)] {
                let style = face.color().mix(alpha).filled();
                chart
                    .draw_series(std::iter::once(Polygon::new(corners.to_vec(), style)))
                    .map_err(plotting_error)?;
            }
        }
    }

    let caption = sample.caption();
    caption_area
        .fill(&CAPTION_COLOR.mix(0.5))
        .map_err(plotting_error)?;
    draw_caption_text(&caption_area, &caption)?;

    root.present().map_err(plotting_error)?;

    info!("{} -> {}", caption, output_path.display());
    Ok(())
}

/// Render every frame slot of one clustered row into `output_dir`.
///
/// Files are named `row<row>_slot<slot>.png`; slot 0 is the current frame.
/// Returns the written paths in slot order.
pub fn plot_multi_frame_row(
    output_dir: &Path,
    dataset: &MultiFrameDataset,
    row: usize,
    with_ratios: bool,
    config: &VisualizationConfig,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(dataset.frames_per_row());

    for slot in 0..dataset.frames_per_row() {
        let sample = LabeledSample::from_multi_frame(dataset, row, slot, with_ratios)?;
        let path = output_dir.join(format!("row{}_slot{}.png", row, slot));
        plot_image_with_labels(&path, &sample, config)?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::fixtures;
    use crate::processors::clustering::cluster_dataset;
    use crate::processors::pairing::{pair_track_ids, GroupOrder};
    use tempfile::tempdir;

    fn filled(left: Face, right: Face) -> PatchColors {
        PatchColors::Filled { left, right }
    }

    fn create_dataset() -> SingleFrameDataset {
        SingleFrameDataset::from_arrays(
            fixtures::images(5),
            fixtures::sticks(5),
            fixtures::frames(5),
            fixtures::ratios(5),
            fixtures::ids(&[5, 5, 5, 7, 7]),
        )
        .unwrap()
    }

    #[test]
    fn test_colors_without_ratios() {
        assert_eq!(face_patch_colors(None), PatchColors::Outline);
        assert_eq!(face_patch_colors(Some(&[0.0; 4])), PatchColors::Outline);
    }

    #[test]
    fn test_colors_single_face() {
        let colors = face_patch_colors(Some(&[1.0, 0.0, 0.0, 0.0]));
        assert_eq!(colors, filled(Face::Back, Face::Back));
        assert_eq!(Face::Back.color(), RGBColor(0, 0, 255));
    }

    #[test]
    fn test_colors_two_faces_ascending() {
        let colors = face_patch_colors(Some(&[0.0, 0.0, 1.0, 1.0]));
        assert_eq!(colors, filled(Face::Left, Face::Right));

        let colors = face_patch_colors(Some(&[0.0, 0.6, 0.4, 0.0]));
        assert_eq!(colors, filled(Face::Front, Face::Left));
    }

    #[test]
    fn test_colors_reversed_pairs() {
        // back + left
        let colors = face_patch_colors(Some(&[1.0, 0.0, 1.0, 0.0]));
        assert_eq!(colors, filled(Face::Left, Face::Back));

        // front + right
        let colors = face_patch_colors(Some(&[0.0, 0.3, 0.0, 0.7]));
        assert_eq!(colors, filled(Face::Right, Face::Front));
    }

    #[test]
    fn test_colors_negative_ratio_is_hidden() {
        let colors = face_patch_colors(Some(&[-0.2, 0.0, 0.0, 0.9]));
        assert_eq!(colors, filled(Face::Right, Face::Right));
    }

    #[test]
    fn test_sticks_to_pixels() {
        let sticks = Sticks::from_values(&[-1.0, -0.5, 0.5, 0.0, -1.0, 1.0, 1.0, 0.0, 0.25]).unwrap();

        let pixels = sticks.to_pixels(80.0);

        assert_eq!(pixels.0[0], Stick { x: 0.0, y_bottom: 20.0, y_top: 60.0 });
        assert_eq!(pixels.0[1], Stick { x: 40.0, y_bottom: 0.0, y_top: 80.0 });
        assert_eq!(pixels.0[2], Stick { x: 80.0, y_bottom: 40.0, y_top: 50.0 });
        assert!(Sticks::from_values(&[0.0; 8]).is_none());
    }

    #[test]
    fn test_face_polygons() {
        let sticks = Sticks::from_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]).unwrap();

        let (left, right) = sticks.face_polygons();

        assert_eq!(left, [(1.0, 3.0), (1.0, 2.0), (4.0, 5.0), (4.0, 6.0)]);
        assert_eq!(right, [(4.0, 6.0), (4.0, 5.0), (7.0, 8.0), (7.0, 9.0)]);
    }

    #[test]
    fn test_sample_from_single_frame() {
        let dataset = create_dataset();

        let sample = LabeledSample::from_single_frame(&dataset, 3, true).unwrap();

        assert_eq!(sample.image.dim(), (4, 4));
        assert_eq!(sample.image[[1, 2]], (3 * 16 + 4 + 2) as f64);
        assert_eq!(sample.id, 7);
        assert_eq!(sample.frame, 103.0);
        assert_eq!(sample.ratios, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(sample.caption(), "frame: 103, id: 7");

        let without = LabeledSample::from_single_frame(&dataset, 3, false).unwrap();
        assert!(without.ratios.is_none());
    }

    #[test]
    fn test_sample_index_out_of_range() {
        let dataset = create_dataset();

        let result = LabeledSample::from_single_frame(&dataset, 5, true);

        assert!(matches!(
            result,
            Err(VisualizationError::IndexOutOfRange { index: 5, len: 5 })
        ));
    }

    #[test]
    fn test_sample_from_multi_frame() {
        let dataset = create_dataset();
        let windows = pair_track_ids(&[5, 5, 5, 7, 7], 1, GroupOrder::AscendingId).unwrap();
        let multi = cluster_dataset(&dataset, windows).unwrap();

        let current = LabeledSample::from_multi_frame(&multi, 2, 0, true).unwrap();
        let previous = LabeledSample::from_multi_frame(&multi, 2, 1, true).unwrap();

        assert_eq!(current, LabeledSample::from_single_frame(&dataset, 4, true).unwrap());
        assert_eq!(previous, LabeledSample::from_single_frame(&dataset, 3, true).unwrap());
        assert!(matches!(
            LabeledSample::from_multi_frame(&multi, 0, 2, true),
            Err(VisualizationError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_gray_level() {
        assert_eq!(gray_level(0.0, 0.0, 10.0), 0);
        assert_eq!(gray_level(10.0, 0.0, 10.0), 255);
        assert_eq!(gray_level(5.0, 5.0, 5.0), 0);
    }

    #[test]
    fn test_plot_image_with_labels() {
        let dir = tempdir().unwrap();
        let dataset = create_dataset();
        let config = VisualizationConfig::default();

        for (index, with_ratios) in [(0, true), (1, false)] {
            let sample = LabeledSample::from_single_frame(&dataset, index, with_ratios).unwrap();
            let path = dir.path().join(format!("sample_{}.png", index));

            plot_image_with_labels(&path, &sample, &config).unwrap();

            assert!(path.exists());
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn test_plot_multi_frame_row() {
        let dir = tempdir().unwrap();
        let dataset = create_dataset();
        let windows = pair_track_ids(&[5, 5, 5, 7, 7], 1, GroupOrder::AscendingId).unwrap();
        let multi = cluster_dataset(&dataset, windows).unwrap();

        let written =
            plot_multi_frame_row(dir.path(), &multi, 1, true, &VisualizationConfig::default())
                .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(written[0], dir.path().join("row1_slot0.png"));
        assert!(written.iter().all(|p| p.exists()));
    }
}
