use jxl_color::{ColourEncoding, EnumColourEncoding};
use jxl_frame::{data::*, header::Encoding};
use jxl_grid::SimpleGrid;
use jxl_image::ImageHeader;
use jxl_threadpool::JxlThreadPool;

use crate::{
    blend, filter, modular,
    region::{ImageWithRegion, Region},
    state::RenderCache,
    vardct, IndexedFrame, ReferenceFrames, Result,
};

pub(crate) fn render_frame(
    frame: &IndexedFrame,
    reference_frames: ReferenceFrames,
    cache: &mut RenderCache,
    image_region: Option<Region>,
    pool: JxlThreadPool,
    _frame_visibility: (usize, usize),
) -> Result<ImageWithRegion> {
    let image_header = frame.image_header();
    let frame_header = frame.header();
    let full_frame_region = Region::with_size(
        frame_header.color_sample_width(),
        frame_header.color_sample_height(),
    );
    let frame_region = image_region.unwrap_or(full_frame_region);
    let frame_region = if frame_header.lf_level != 0 {
        // Lower level frames might be padded, so apply padding to LF frames
        frame_region.pad(4 * frame_header.lf_level + 32)
    } else {
        frame_region
    };

    let mut color_padded_region = frame_region;
    if frame_header.do_ycbcr {
        // Chroma upsampling references adjacent samples.
        color_padded_region = color_padded_region.pad(1).downsample(2).upsample(2);
    }
    color_padded_region = color_padded_region.intersection(full_frame_region);

    let (mut fb, gmodular) = match frame_header.encoding {
        Encoding::Modular => {
            let (grid, gmodular) =
                modular::render_modular(frame, cache, color_padded_region, &pool)?;
            (grid, Some(gmodular))
        }
        Encoding::VarDct => {
            // Frames referencing a separately coded LF frame are rejected during header
            // validation, so `reference_frames.lf` is always `None` here.
            let (grid, gmodular) = vardct::render_vardct(
                frame,
                reference_frames.lf.as_ref(),
                cache,
                color_padded_region,
                &pool,
            )?;
            (grid, Some(gmodular))
        }
    };
    if fb.region().intersection(full_frame_region) != fb.region() {
        let mut new_fb = fb.clone_intersection(full_frame_region)?;
        std::mem::swap(&mut fb, &mut new_fb);
    }

    let [a, b, c] = fb.buffer_mut() else { panic!() };
    if frame.header().do_ycbcr {
        filter::apply_jpeg_upsampling([a, b, c], frame_header.jpeg_upsampling);
    }
    // Restoration filters (Gabor-like, edge-preserving filter) and sample upsampling
    // are parsed but never applied: frames requesting them are rejected during
    // header validation, so every frame reaching this point has them disabled.

    if let Some(gmodular) = gmodular {
        append_extra_channels(frame, &mut fb, gmodular, frame_region)?;
    }

    // save_before_ct is always false if is_last = true
    if !frame_header.save_before_ct && !frame_header.is_last {
        convert_color_for_record(image_header, frame_header.do_ycbcr, fb.buffer_mut());
    }

    Ok(
        if !frame_header.frame_type.is_normal_frame() || frame_header.resets_canvas {
            fb
        } else {
            let reference_grids =
                reference_frames
                    .refs
                    .map(|r| r.map(|r| r.image.buffer()));
            let left = fb.region().left;
            let top = fb.region().top;
            let ct_done = fb.ct_done();
            let blended = blend::blend(image_header, reference_grids, frame, fb.buffer());
            ImageWithRegion::from_buffer(blended, left, top, ct_done)
        },
    )
}

fn append_extra_channels(
    frame: &IndexedFrame,
    fb: &mut ImageWithRegion,
    gmodular: GlobalModular,
    original_region: Region,
) -> Result<()> {
    let fb_region = fb.region();
    let image_header = frame.image_header();
    let tracker = frame.alloc_tracker();

    let extra_channel_from = gmodular.extra_channel_from();
    let Some(gmodular) = gmodular.modular.into_image() else {
        return Ok(());
    };
    let mut channel_data = gmodular.into_image_channels();
    let channel_data = channel_data.drain(extra_channel_from..);

    for (idx, g) in channel_data.enumerate() {
        tracing::debug!(ec_idx = idx, "Attaching extra channels");

        let ec_info = &image_header.metadata.ec_info[idx];
        let bit_depth = ec_info.bit_depth;

        let width = original_region.width as usize;
        let height = original_region.height as usize;
        let mut out = SimpleGrid::with_alloc_tracker(width, height, tracker)?;
        modular::copy_modular_groups(&g, &mut out, original_region, bit_depth, false);

        let out = ImageWithRegion::from_buffer(
            vec![out],
            original_region.left,
            original_region.top,
            false,
        );
        let cropped = fb.add_channel()?;
        out.clone_region_channel(fb_region, 0, cropped);
    }

    Ok(())
}

pub(crate) fn convert_color_for_record(
    image_header: &ImageHeader,
    do_ycbcr: bool,
    grid: &mut [SimpleGrid<f32>],
) {
    // save_before_ct = false

    let metadata = &image_header.metadata;
    if do_ycbcr {
        // xyb_encoded = false
        let [cb, y, cr, ..] = grid else { panic!() };
        jxl_color::ycbcr_to_rgb([cb, y, cr]);
    } else if metadata.xyb_encoded {
        // want_icc = false
        let [x, y, b, ..] = grid else { panic!() };
        tracing::trace_span!("XYB to target colorspace").in_scope(|| {
            tracing::trace!(colour_encoding = ?metadata.colour_encoding);
            let transform = jxl_color::ColorTransform::new(
                &jxl_color::ColorEncodingWithProfile::new(ColourEncoding::Enum(EnumColourEncoding::xyb())),
                &jxl_color::ColorEncodingWithProfile::new(metadata.colour_encoding.clone()),
                &metadata.opsin_inverse_matrix,
                metadata.tone_mapping.intensity_target,
            );
            transform.run(
                &mut [x.buf_mut(), y.buf_mut(), b.buf_mut()],
                &jxl_color::NullCms,
            ).unwrap();
        });
    }
}
