use std::{
    fs::File,
    io::Read,
    path::Path,
    sync::Arc,
};

use jxl_bitstream::{Bitstream, Bundle, ContainerDetectingReader};
use jxl_color::ColourEncoding;
use jxl_frame::{Frame, FrameContext};
use jxl_image::ImageHeader;
use jxl_render::{FrameBuffer, Region, RenderContext};
use jxl_threadpool::JxlThreadPool;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// A parsed JPEG XL image, holding the image header and the undecoded frame data.
#[derive(Debug)]
pub struct JxlImage {
    image_header: Arc<ImageHeader>,
    icc: Vec<u8>,
    buf: Vec<u8>,
    bits_consumed: usize,
}

impl JxlImage {
    /// Reads an image from the given reader, parsing the image header and decoding the ICC
    /// profile (or synthesizing one). The codestream is fully buffered; frames are decoded on
    /// demand through [`renderer`][Self::renderer].
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut reader = ContainerDetectingReader::new(reader);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;

        let mut bitstream = Bitstream::new(&buf);
        let image_header = ImageHeader::parse(&mut bitstream, ())?;

        let icc = if image_header.metadata.colour_encoding.want_icc() {
            tracing::debug!("Image has ICC profile");
            let icc = jxl_color::icc::read_icc(&mut bitstream)?;
            jxl_color::icc::decode_icc(&icc)?
        } else {
            match &image_header.metadata.colour_encoding {
                ColourEncoding::Enum(enc) => jxl_color::icc::colour_encoding_to_icc(enc),
                _ => Vec::new(),
            }
        };

        let image_header = Arc::new(image_header);

        if image_header.metadata.preview.is_some() {
            tracing::debug!("Skipping preview frame");
            bitstream.zero_pad_to_byte()?;

            let ctx = FrameContext {
                image_header: Arc::clone(&image_header),
                tracker: None,
                pool: JxlThreadPool::none(),
            };
            let frame = Frame::parse(&mut bitstream, ctx)?;
            let toc = frame.toc();
            let bookmark = toc.bookmark() + (toc.total_byte_size() * 8);
            bitstream.skip_to_bookmark(bookmark)?;
        }

        let bits_consumed = bitstream.num_read_bits();

        Ok(Self {
            image_header,
            icc,
            buf,
            bits_consumed,
        })
    }

    #[inline]
    pub fn image_header(&self) -> &ImageHeader {
        &self.image_header
    }

    #[inline]
    pub fn desired_icc(&self) -> &[u8] {
        &self.icc
    }

    /// Creates a renderer that decodes the remaining frames one at a time.
    #[inline]
    pub fn renderer(&mut self) -> JxlRenderer<'_> {
        let ctx = RenderContext::new(Arc::clone(&self.image_header));
        JxlRenderer {
            image: self,
            ctx,
            crop_region: None,
            done: false,
        }
    }
}

impl JxlImage {
    #[inline]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

/// Decodes successive frames of a [`JxlImage`].
#[derive(Debug)]
pub struct JxlRenderer<'img> {
    image: &'img mut JxlImage,
    ctx: RenderContext,
    crop_region: Option<CropInfo>,
    done: bool,
}

impl JxlRenderer<'_> {
    #[inline]
    pub fn set_crop_region(&mut self, crop_region: Option<CropInfo>) -> &mut Self {
        self.crop_region = crop_region;
        self
    }

    #[inline]
    pub fn crop_region(&self) -> Option<CropInfo> {
        self.crop_region
    }

    fn crop_region_as_region(&self) -> Option<Region> {
        self.crop_region.map(|info| Region {
            left: info.left as i32,
            top: info.top as i32,
            width: info.width,
            height: info.height,
        })
    }

    /// Decodes the next frame, or reports that the image is exhausted.
    pub fn render_next_frame(&mut self) -> Result<RenderResult> {
        if self.done {
            return Ok(RenderResult::NoMoreFrames);
        }

        let mut bitstream = Bitstream::new(&self.image.buf);
        bitstream.skip_bits(self.image.bits_consumed)?;
        self.ctx.load_until_keyframe(&mut bitstream)?;
        self.image.bits_consumed = bitstream.num_read_bits();

        let keyframe_idx = self.ctx.loaded_keyframes() - 1;
        let region = self.crop_region_as_region();
        let grid = self.ctx.render_keyframe(keyframe_idx, region)?;

        let frame = self.ctx.keyframe(keyframe_idx).expect("just rendered");
        if frame.header().is_last {
            self.done = true;
        }

        let orientation = self.image.image_header.metadata.orientation;
        let (color_channels, extra_channels) = grid.buffer().split_at(
            if self.image.image_header.metadata.grayscale() { 1 } else { 3 },
        );
        let fb = FrameBuffer::from_grids(color_channels, orientation)?;
        let extra_frames = extra_channels
            .iter()
            .map(|g| g.try_clone())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(RenderResult::Done(Render {
            index: frame.index(),
            fb,
            extra_frames,
        }))
    }
}

#[derive(Debug)]
pub enum RenderResult {
    Done(Render),
    NoMoreFrames,
}

/// A single decoded frame: the color channels assembled into a [`FrameBuffer`], plus any extra
/// channels (alpha and similar) left as raw planes.
#[derive(Debug)]
pub struct Render {
    index: usize,
    fb: FrameBuffer,
    extra_frames: Vec<jxl_grid::SimpleGrid<f32>>,
}

impl Render {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn image(&self) -> &FrameBuffer {
        &self.fb
    }

    #[inline]
    pub fn extra_channels(&self) -> &[jxl_grid::SimpleGrid<f32>] {
        &self.extra_frames
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CropInfo {
    pub width: u32,
    pub height: u32,
    pub left: u32,
    pub top: u32,
}
