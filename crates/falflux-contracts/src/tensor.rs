/// Host image tensor: `height x width x 3` RGB samples in `[0.0, 1.0]`,
/// stored row-major with channels interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    pub const CHANNELS: usize = 3;

    pub fn from_rgb8(width: u32, height: u32, pixels: &[u8]) -> Option<Self> {
        let (width, height) = (width as usize, height as usize);
        if pixels.len() != width * height * Self::CHANNELS {
            return None;
        }
        Some(Self {
            height,
            width,
            data: pixels
                .iter()
                .map(|sample| f32::from(*sample) / 255.0)
                .collect(),
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, Self::CHANNELS]
    }

    pub fn get(&self, y: usize, x: usize, channel: usize) -> Option<f32> {
        if y >= self.height || x >= self.width || channel >= Self::CHANNELS {
            return None;
        }
        self.data
            .get((y * self.width + x) * Self::CHANNELS + channel)
            .copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice()
    }
}
