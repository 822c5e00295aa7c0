use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::ExportError;

/// Float samples in `[0, 1]`, row-major, channels interleaved.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBuffer {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub samples: Vec<f32>,
}

impl RawBuffer {
    /// Buffer of zeros with checked metadata.
    pub fn zeroed(width: u32, height: u32, channels: u8) -> Result<Self, ExportError> {
        check_layout(width, height, channels)?;
        let n = width as usize * height as usize * channels as usize;
        Ok(Self {
            width,
            height,
            channels,
            samples: vec![0.0; n],
        })
    }

    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Checks channel count, dimensions and sample count.
    pub fn validate(&self) -> Result<(), ExportError> {
        check_layout(self.width, self.height, self.channels)?;
        if self.samples.len() != self.expected_len() {
            return Err(ExportError::SizeMismatch {
                expected: self.expected_len(),
                actual: self.samples.len(),
            });
        }
        Ok(())
    }

    /// Bytes held while the buffer is being exported: the float input plus the
    /// 8-bit output.
    pub fn estimated_export_cost(&self) -> u64 {
        let n = self.expected_len() as u64;
        n * size_of::<f32>() as u64 + n
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, channel: u8, value: f32) {
        if x < self.width && y < self.height && channel < self.channels {
            let i = (y as usize * self.width as usize + x as usize) * self.channels as usize
                + channel as usize;
            self.samples[i] = value;
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32, channel: u8) -> Option<f32> {
        if x >= self.width || y >= self.height || channel >= self.channels {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * self.channels as usize
            + channel as usize;
        self.samples.get(i).copied()
    }
}

fn check_layout(width: u32, height: u32, channels: u8) -> Result<(), ExportError> {
    if !(1..=4).contains(&channels) {
        return Err(ExportError::InvalidChannels(channels));
    }
    if width == 0 || height == 0 {
        return Err(ExportError::EmptyImage { width, height });
    }
    Ok(())
}

/// One unit of export work.
#[derive(Clone, Debug)]
pub struct ExportTask {
    pub label: String,
    pub buffer: RawBuffer,
    pub estimated_cost: u64,
}

impl ExportTask {
    pub fn new(label: impl Into<String>, buffer: RawBuffer) -> Self {
        let estimated_cost = buffer.estimated_export_cost();
        Self {
            label: label.into(),
            buffer,
            estimated_cost,
        }
    }

    pub fn run(&self) -> Result<Image, ExportError> {
        let mut img = to_image(&self.buffer)?;
        img.label = self.label.clone();
        Ok(img)
    }
}

/// 8-bit output image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Image {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl Image {
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Quantizes samples to 8 bits: clamped to `[0, 1]`, scaled by 255 and rounded.
/// NaN samples become 0.
pub fn to_image(buf: &RawBuffer) -> Result<Image, ExportError> {
    buf.validate()?;
    let data = buf
        .samples
        .iter()
        .map(|&s| {
            if s.is_nan() {
                0
            } else {
                (s.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        })
        .collect();
    Ok(Image {
        label: String::new(),
        width: buf.width,
        height: buf.height,
        channels: buf.channels,
        data,
    })
}

fn color_type(channels: u8) -> Result<ExtendedColorType, ExportError> {
    match channels {
        1 => Ok(ExtendedColorType::L8),
        2 => Ok(ExtendedColorType::La8),
        3 => Ok(ExtendedColorType::Rgb8),
        4 => Ok(ExtendedColorType::Rgba8),
        c => Err(ExportError::InvalidChannels(c)),
    }
}

pub fn encode_png(img: &Image) -> Result<Vec<u8>, ExportError> {
    let color = color_type(img.channels)?;
    let expected = img.width as usize * img.height as usize * img.channels as usize;
    if img.data.len() != expected {
        return Err(ExportError::SizeMismatch {
            expected,
            actual: img.data.len(),
        });
    }
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(&img.data, img.width, img.height, color)?;
    Ok(out)
}

pub fn save_png(img: &Image, path: &Path) -> Result<(), ExportError> {
    let bytes = encode_png(img)?;
    std::fs::write(path, bytes)?;
    log::debug!(target: "export", "wrote {} ({}x{})", path.display(), img.width, img.height);
    Ok(())
}
