use crate::{MaskError, Rect, Scalar, utils::clamp};
use bytemuck::Pod;
use std::{fmt, io::Write};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Width of the image
    pub width: usize,
    /// Height of the image
    pub height: usize,
    /// How many elements we need to skip to get to the next row.
    pub row_stride: usize,
    /// How many elements we need to skip to get to the next column.
    pub col_stride: usize,
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shape({}x{} stride:{},{})",
            self.width, self.height, self.row_stride, self.col_stride
        )
    }
}

impl Shape {
    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> usize {
        row * self.row_stride + col * self.col_stride
    }

    #[inline]
    pub fn nth(&self, n: usize) -> Option<(usize, usize)> {
        if self.width == 0 {
            return None;
        }
        let row = n / self.width;
        let col = n - row * self.width;
        (row < self.height).then_some((row, col))
    }

    /// Rectangle covering the whole image
    pub fn rect(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Sub-shape of the `rect` (which must lie inside the shape) and offset of its first element
    fn view(&self, rect: Rect) -> (Shape, usize) {
        let shape = Shape {
            width: rect.width as usize,
            height: rect.height as usize,
            ..*self
        };
        (shape, self.offset(rect.y as usize, rect.x as usize))
    }

    /// Number of elements the data slice must hold
    fn data_len(&self) -> usize {
        if self.width == 0 || self.height == 0 {
            0
        } else {
            self.offset(self.height - 1, self.width - 1) + 1
        }
    }
}

pub trait Image {
    type Pixel;

    fn data(&self) -> &[Self::Pixel];

    fn shape(&self) -> Shape;

    fn width(&self) -> usize {
        self.shape().width
    }

    fn height(&self) -> usize {
        self.shape().height
    }

    fn get(&self, row: usize, col: usize) -> Option<&Self::Pixel> {
        let shape = self.shape();
        if row >= shape.height || col >= shape.width {
            return None;
        }
        self.data().get(shape.offset(row, col))
    }

    /// View of the region of the image, region is clipped by the image bounds
    fn view(&self, rect: Rect) -> Option<ImageRef<'_, Self::Pixel>> {
        let shape = self.shape();
        let rect = rect.intersect(shape.rect())?;
        let (shape, offset) = shape.view(rect);
        Some(ImageRef {
            shape,
            data: &self.data()[offset..offset + shape.data_len()],
        })
    }

    fn iter(&self) -> ImageIter<'_, Self::Pixel> {
        ImageIter {
            index: 0,
            shape: self.shape(),
            data: self.data(),
        }
    }
}

pub struct ImageIter<'a, P> {
    index: usize,
    shape: Shape,
    data: &'a [P],
}

impl<'a, P> Iterator for ImageIter<'a, P> {
    type Item = &'a P;

    fn next(&mut self) -> Option<Self::Item> {
        self.nth(0)
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.index += n + 1;
        let (row, col) = self.shape.nth(self.index - 1)?;
        self.data.get(self.shape.offset(row, col))
    }
}

pub trait ImageMut: Image {
    fn data_mut(&mut self) -> &mut [Self::Pixel];

    fn as_mut(&mut self) -> ImageMutRef<'_, Self::Pixel> {
        ImageMutRef {
            shape: self.shape(),
            data: self.data_mut(),
        }
    }

    /// Mutable view of the region of the image, region is clipped by the image bounds
    fn view_mut(&mut self, rect: Rect) -> Option<ImageMutRef<'_, Self::Pixel>> {
        let shape = self.shape();
        let rect = rect.intersect(shape.rect())?;
        let (shape, offset) = shape.view(rect);
        Some(ImageMutRef {
            shape,
            data: &mut self.data_mut()[offset..offset + shape.data_len()],
        })
    }

    /// Set every pixel of the image to the value
    fn fill(&mut self, value: Self::Pixel)
    where
        Self::Pixel: Copy,
    {
        let shape = self.shape();
        let data = self.data_mut();
        for row in 0..shape.height {
            for col in 0..shape.width {
                data[shape.offset(row, col)] = value;
            }
        }
    }
}

#[derive(Clone)]
pub struct ImageOwned<P> {
    shape: Shape,
    data: Vec<P>,
}

impl<P: fmt::Debug> fmt::Debug for ImageOwned<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageOwned")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl<P> ImageOwned<P> {
    pub fn new(shape: Shape, data: Vec<P>) -> Self {
        Self { shape, data }
    }

    pub fn new_default(height: usize, width: usize) -> Self
    where
        P: Default,
    {
        Self::new_with(height, width, |_, _| Default::default())
    }

    pub fn new_with<F>(height: usize, width: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> P,
    {
        let mut data = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col))
            }
        }
        Self {
            shape: Shape {
                width,
                height,
                row_stride: width,
                col_stride: 1,
            },
            data,
        }
    }

    pub fn to_vec(self) -> Vec<P> {
        self.data
    }
}

impl<P> Image for ImageOwned<P> {
    type Pixel = P;

    fn shape(&self) -> Shape {
        self.shape
    }

    fn data(&self) -> &[Self::Pixel] {
        &self.data
    }
}

impl<P> ImageMut for ImageOwned<P> {
    fn data_mut(&mut self) -> &mut [Self::Pixel] {
        &mut self.data
    }
}

#[derive(Clone)]
pub struct ImageRef<'a, P> {
    shape: Shape,
    data: &'a [P],
}

impl<P> Image for ImageRef<'_, P> {
    type Pixel = P;

    fn shape(&self) -> Shape {
        self.shape
    }

    fn data(&self) -> &[Self::Pixel] {
        self.data
    }
}

pub struct ImageMutRef<'a, P> {
    shape: Shape,
    data: &'a mut [P],
}

impl<P> Image for ImageMutRef<'_, P> {
    type Pixel = P;

    fn shape(&self) -> Shape {
        self.shape
    }

    fn data(&self) -> &[Self::Pixel] {
        self.data
    }
}

impl<P> ImageMut for ImageMutRef<'_, P> {
    fn data_mut(&mut self) -> &mut [Self::Pixel] {
        self.data
    }
}

impl<I> Image for &I
where
    I: Image + ?Sized,
{
    type Pixel = I::Pixel;

    fn shape(&self) -> Shape {
        (*self).shape()
    }

    fn data(&self) -> &[Self::Pixel] {
        (*self).data()
    }
}

impl<I> Image for &mut I
where
    I: Image + ?Sized,
{
    type Pixel = I::Pixel;

    fn shape(&self) -> Shape {
        (**self).shape()
    }

    fn data(&self) -> &[Self::Pixel] {
        (**self).data()
    }
}

impl<I> ImageMut for &mut I
where
    I: ImageMut + ?Sized,
{
    fn data_mut(&mut self) -> &mut [Self::Pixel] {
        (**self).data_mut()
    }
}

/// Storage format of a single coverage sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SampleFormat {
    /// `0..=255` integer coverage
    U8,
    /// `[0, 1]` floating point coverage
    F32,
}

impl SampleFormat {
    /// Whether samples lose precision compared to `Scalar`
    pub fn is_quantized(self) -> bool {
        matches!(self, SampleFormat::U8)
    }
}

/// Single channel coverage sample
///
/// Every sample represents coverage in `[0, 1]`, integer samples are scaled by `255`.
pub trait Coverage: Pod + Default + PartialEq + fmt::Debug {
    const FORMAT: SampleFormat;
    const ZERO: Self;
    const ONE: Self;

    fn to_scalar(self) -> Scalar;

    /// Convert from scalar coverage, value is clamped to `[0, 1]`
    fn from_scalar(value: Scalar) -> Self;

    fn to_u8(self) -> u8 {
        (clamp(self.to_scalar(), 0.0, 1.0) * 255.0 + 0.5) as u8
    }
}

impl Coverage for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;
    const ZERO: Self = 0;
    const ONE: Self = 255;

    #[inline]
    fn to_scalar(self) -> Scalar {
        self as Scalar / 255.0
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        (clamp(value, 0.0, 1.0) * 255.0 + 0.5) as u8
    }

    #[inline]
    fn to_u8(self) -> u8 {
        self
    }
}

impl Coverage for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline]
    fn to_scalar(self) -> Scalar {
        self as Scalar
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        clamp(value, 0.0, 1.0) as f32
    }
}

/// Owned single channel coverage grid
pub type CoverageBuffer<P = u8> = ImageOwned<P>;

impl<P: Coverage> ImageOwned<P> {
    /// Create fully transparent buffer, both dimensions must be positive
    pub fn try_new(width: usize, height: usize) -> Result<Self, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::InvalidSize { width, height });
        }
        Ok(Self::new_default(height, width))
    }

    /// Create buffer from row-major samples
    pub fn from_vec(width: usize, height: usize, data: Vec<P>) -> Result<Self, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::InvalidSize { width, height });
        }
        if data.len() != width * height {
            return Err(MaskError::DataSize {
                expected: width * height,
                actual: data.len(),
            });
        }
        let shape = Shape {
            width,
            height,
            row_stride: width,
            col_stride: 1,
        };
        Ok(Self::new(shape, data))
    }

    /// Raw bytes of the samples in native endianness
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

/// Description of a coverage buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub sample: SampleFormat,
}

/// Region based access to a coverage buffer
///
/// Regions are addressed in buffer coordinates, pixels outside of the buffer
/// read as zero coverage and writes to them are dropped.
pub trait MaskBuffer {
    type Sample: Coverage;

    fn format(&self) -> Format;

    /// Rectangle covering the whole buffer
    fn extent(&self) -> Rect {
        let format = self.format();
        Rect::from_size(format.width, format.height)
    }

    /// Read coverage of the region in row-major order
    fn read_rect(&self, rect: Rect) -> Vec<Scalar>;

    /// Write as a binary PGM (P5) image
    fn write_pgm(&self, out: impl Write) -> Result<(), MaskError>;

    /// Write as a grayscale PNG image
    #[cfg(feature = "png")]
    fn write_png(&self, out: impl Write) -> Result<(), MaskError>;
}

pub trait MaskBufferMut: MaskBuffer {
    /// Write row-major coverage values into the region
    fn write_rect(&mut self, rect: Rect, values: &[Scalar]) -> Result<(), MaskError>;

    /// Mutable view of the region clipped by the buffer bounds, `None` if nothing is left
    fn read_write_rect(&mut self, rect: Rect) -> Option<ImageMutRef<'_, Self::Sample>>;
}

impl<I> MaskBuffer for I
where
    I: Image,
    I::Pixel: Coverage,
{
    type Sample = I::Pixel;

    fn format(&self) -> Format {
        let shape = self.shape();
        Format {
            width: shape.width,
            height: shape.height,
            channels: 1,
            sample: <I::Pixel as Coverage>::FORMAT,
        }
    }

    fn read_rect(&self, rect: Rect) -> Vec<Scalar> {
        let mut values = vec![0.0; rect.area()];
        let Some(clip) = rect.intersect(self.shape().rect()) else {
            return values;
        };
        let stride = rect.width as usize;
        for y in clip.y..clip.y1() {
            let row = y.abs_diff(rect.y) as usize * stride;
            for x in clip.x..clip.x1() {
                if let Some(value) = self.get(y as usize, x as usize) {
                    values[row + x.abs_diff(rect.x) as usize] = value.to_scalar();
                }
            }
        }
        values
    }

    fn write_pgm(&self, mut out: impl Write) -> Result<(), MaskError> {
        let shape = self.shape();
        write!(out, "P5\n{} {}\n255\n", shape.width, shape.height)?;
        out.write_all(&gray_bytes(self))?;
        Ok(())
    }

    #[cfg(feature = "png")]
    fn write_png(&self, out: impl Write) -> Result<(), MaskError> {
        let shape = self.shape();
        let mut encoder = png::Encoder::new(out, shape.width as u32, shape.height as u32);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&gray_bytes(self))?;
        Ok(())
    }
}

impl<I> MaskBufferMut for I
where
    I: ImageMut,
    I::Pixel: Coverage,
{
    fn write_rect(&mut self, rect: Rect, values: &[Scalar]) -> Result<(), MaskError> {
        if values.len() != rect.area() {
            return Err(MaskError::DataSize {
                expected: rect.area(),
                actual: values.len(),
            });
        }
        let Some(clip) = rect.intersect(self.shape().rect()) else {
            return Ok(());
        };
        let stride = rect.width as usize;
        let shape = self.shape();
        let data = self.data_mut();
        for y in clip.y..clip.y1() {
            let row = y.abs_diff(rect.y) as usize * stride;
            for x in clip.x..clip.x1() {
                let value = values[row + x.abs_diff(rect.x) as usize];
                data[shape.offset(y as usize, x as usize)] = <I::Pixel as Coverage>::from_scalar(value);
            }
        }
        Ok(())
    }

    fn read_write_rect(&mut self, rect: Rect) -> Option<ImageMutRef<'_, Self::Sample>> {
        self.view_mut(rect)
    }
}

/// Row-major 8-bit gray levels of the image
fn gray_bytes<I>(image: &I) -> Vec<u8>
where
    I: Image + ?Sized,
    I::Pixel: Coverage,
{
    let shape = image.shape();
    if <I::Pixel as Coverage>::FORMAT == SampleFormat::U8 && shape.col_stride == 1 && shape.row_stride == shape.width
    {
        let data = &image.data()[..shape.data_len()];
        return bytemuck::cast_slice(data).to_vec();
    }
    image.iter().map(|value| value.to_u8()).collect()
}
