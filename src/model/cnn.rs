//! CNN Regression Architecture
//!
//! This module implements the convolutional network that maps a 3x14x14
//! weather grid to a single non-negative energy prediction. Three conv
//! blocks extract spatial features, adaptive average pooling reduces them
//! to a fixed 3x3 map, and a small fully connected head regresses the
//! energy value through a softplus output.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::model::config::ModelConfig;

/// A CNN block with Conv2d, BatchNorm and ReLU
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        Self {
            conv,
            bn,
            relu: Relu::new(),
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        self.relu.forward(x)
    }
}

/// Energy Output Regressor CNN
///
/// Architecture:
/// - 3 convolutional blocks with doubling filter counts (no pooling between
///   them; the grids are only 14x14)
/// - Adaptive average pooling to a 3x3 feature map
/// - Two fully connected layers
/// - Softplus output, so predictions are always non-negative
#[derive(Module, Debug)]
pub struct EnergyRegressor<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,

    pub pool: AdaptiveAvgPool2d,

    pub fc1: Linear<B>,
    pub fc2: Linear<B>,

    softplus_beta: f64,
}

impl<B: Backend> EnergyRegressor<B> {
    /// Create a new regressor from configuration
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        let conv1 = ConvBlock::new(config.input_channels, base, config.kernel_size, device);
        let conv2 = ConvBlock::new(base, base * 2, config.kernel_size, device);
        let conv3 = ConvBlock::new(base * 2, base * 4, config.kernel_size, device);

        let pool = AdaptiveAvgPool2dConfig::new([config.pool_output, config.pool_output]).init();

        let fc1 = LinearConfig::new(config.flattened_features(), config.fc_units).init(device);
        let fc2 = LinearConfig::new(config.fc_units, 1).init(device);

        Self {
            conv1,
            conv2,
            conv3,
            pool,
            fc1,
            fc2,
            softplus_beta: config.softplus_beta,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, channels, height, width]
    ///
    /// # Returns
    /// * Predictions tensor of shape [batch_size, 1], all values >= 0
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);

        // Pool to a fixed map: [B, C, H, W] -> [B, C, P, P]
        let x = self.pool.forward(x);

        // Flatten: [B, C, P, P] -> [B, C * P * P]
        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.fc2.forward(x);

        burn::tensor::activation::softplus(x, self.softplus_beta)
    }
}
