use crate::dtype::DType;

/// Convolution padding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Padding {
    /// No implicit padding; the output shrinks by `kernel - 1`.
    Valid,
    /// Zero padding so that the output is `ceil(input / stride)`. An odd
    /// padding pixel goes to the right/bottom edge.
    #[default]
    Same,
}

/// Which backend runs the inner loops of a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConvMode {
    /// Portable, bit-reproducible reference loops.
    #[default]
    Portable,
    /// SIMD kernels. Falls back to [`ConvMode::Portable`] on CPUs without
    /// the required instruction set.
    Accelerated,
}

/// Parameters of the fused mobilenet block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConvConfig {
    pub stride_x: usize,
    pub stride_y: usize,
    pub padding: Padding,
    pub mode: ConvMode,
    /// Representation of the block input.
    pub input_type: DType,
}

impl ConvConfig {
    pub fn new(stride_x: usize, stride_y: usize, padding: Padding) -> Self {
        ConvConfig {
            stride_x,
            stride_y,
            padding,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ConvMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_input_type(mut self, input_type: DType) -> Self {
        self.input_type = input_type;
        self
    }
}

impl Default for ConvConfig {
    fn default() -> Self {
        ConvConfig {
            stride_x: 1,
            stride_y: 1,
            padding: Padding::Same,
            mode: ConvMode::Portable,
            input_type: DType::F32,
        }
    }
}
