use std::sync::Arc;

use jxl_bitstream::Bitstream;
use jxl_frame::{Frame, FrameContext};
use jxl_grid::SimpleGrid;
use jxl_image::{ImageHeader, ImageMetadata};
use jxl_threadpool::JxlThreadPool;

use crate::{inner, region::Region, state::RenderCache, IndexedFrame, Result};
use crate::region::ImageWithRegion;

/// A previously rendered frame, as seen by a frame that references it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reference<'a> {
    pub frame: &'a IndexedFrame,
    pub image: &'a ImageWithRegion,
}

/// Reference frames visible while rendering a single frame: the separately coded LF frame, if
/// any, and up to four save-as-reference slots.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReferenceFrames<'a> {
    pub lf: Option<Reference<'a>>,
    pub refs: [Option<Reference<'a>>; 4],
}

/// Indices of the frames a frame needs rendered before it can be rendered itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameDependence {
    pub lf: usize,
    pub ref_slots: [usize; 4],
}

impl FrameDependence {
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.lf)
            .chain(self.ref_slots)
            .filter(|&idx| idx != usize::MAX)
    }
}

/// Tracks loaded frames and the dependency graph needed to render them.
#[derive(Debug)]
pub(crate) struct ContextInner {
    image_header: Arc<ImageHeader>,
    pool: JxlThreadPool,
    pub(crate) frames: Vec<IndexedFrame>,
    pub(crate) keyframes: Vec<usize>,
    pub(crate) keyframe_in_progress: Option<usize>,
    pub(crate) loading_frame: Option<Frame>,
    pub(crate) frame_deps: Vec<FrameDependence>,
    pub(crate) lf_frame: [usize; 4],
    // Index of the frame currently occupying each save_as_reference slot, or usize::MAX if empty.
    ref_slots: [usize; 4],
}

impl ContextInner {
    pub fn new(image_header: Arc<ImageHeader>) -> Self {
        Self {
            image_header,
            pool: JxlThreadPool::default(),
            frames: Vec::new(),
            keyframes: Vec::new(),
            keyframe_in_progress: None,
            loading_frame: None,
            frame_deps: Vec::new(),
            lf_frame: [usize::MAX; 4],
            ref_slots: [usize::MAX; 4],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image_header.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image_header.size.height
    }

    #[inline]
    pub fn metadata(&self) -> &ImageMetadata {
        &self.image_header.metadata
    }

    #[inline]
    pub fn loaded_keyframes(&self) -> usize {
        self.keyframes.len()
    }

    pub fn keyframe(&self, keyframe_idx: usize) -> Option<&IndexedFrame> {
        let idx = *self.keyframes.get(keyframe_idx)?;
        Some(&self.frames[idx])
    }

    /// Parses the next frame header and TOC from the bitstream, and marks it as currently
    /// loading. The frame is not added to `frames` until [`Self::preserve_current_frame`] is
    /// called.
    pub fn load_single(&mut self, bitstream: &mut Bitstream) -> Result<&Frame> {
        let ctx = FrameContext {
            image_header: Arc::clone(&self.image_header),
            tracker: None,
            pool: self.pool.clone(),
        };
        let frame = Frame::parse(bitstream, ctx)?;
        self.loading_frame = Some(frame);
        Ok(self.loading_frame.as_ref().unwrap())
    }

    /// Commits the frame currently being loaded into the frame list, computing its dependencies
    /// on previously rendered frames.
    pub fn preserve_current_frame(&mut self) {
        let Some(frame) = self.loading_frame.take() else {
            return;
        };

        let idx = self.frames.len();
        let header = frame.header();

        let lf = if header.flags.use_lf_frame() {
            self.lf_frame[header.lf_level as usize]
        } else {
            usize::MAX
        };

        let mut ref_slots = [usize::MAX; 4];
        if !header.resets_canvas {
            let mut record_source = |source: u32| {
                let source = source as usize;
                ref_slots[source] = self.ref_slots[source];
            };
            record_source(header.blending_info.source);
            for ec_blending_info in &header.ec_blending_info {
                record_source(ec_blending_info.source);
            }
        }

        self.frame_deps.push(FrameDependence { lf, ref_slots });

        if header.frame_type == jxl_frame::header::FrameType::LfFrame {
            self.lf_frame[header.lf_level as usize] = idx;
        }
        if header.save_as_reference != 0 {
            self.ref_slots[header.save_as_reference as usize] = idx;
        }
        if header.is_keyframe() {
            self.keyframes.push(idx);
            self.keyframe_in_progress = None;
        } else if header.frame_type.is_normal_frame() {
            self.keyframe_in_progress = Some(idx);
        }

        self.frames.push(IndexedFrame::new(frame, idx));
    }

    pub fn render_frame(
        &self,
        frame: &IndexedFrame,
        reference_frames: ReferenceFrames,
        cache: &mut RenderCache,
        region: Region,
    ) -> Result<ImageWithRegion> {
        inner::render_frame(
            frame,
            reference_frames,
            cache,
            Some(region),
            self.pool.clone(),
            (0, 0),
        )
    }

    pub fn convert_color(&self, grid: &mut [SimpleGrid<f32>]) {
        inner::convert_color_for_record(&self.image_header, false, grid);
    }
}
