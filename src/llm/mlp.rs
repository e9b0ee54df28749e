use crate::llm::activation::Activation;
use crate::llm::layer::Layer;
use crate::llm::linear::LinearLayer;
use candle_core::Result as CandleResult;
use candle_core::Tensor;
use candle_nn::VarBuilder;

pub struct MlpLayer {
    c_fc: LinearLayer,
    c_proj: LinearLayer,
    activation: Activation,
}

impl MlpLayer {
    pub fn new(
        vb: &VarBuilder,
        prefix: &str,
        hidden_size: usize,
        inner_size: usize,
        activation: Activation,
    ) -> CandleResult<Self> {
        let c_fc = LinearLayer::new(vb, &format!("{}.c_fc", prefix), hidden_size, inner_size)?;
        let c_proj = LinearLayer::new(vb, &format!("{}.c_proj", prefix), inner_size, hidden_size)?;
        Ok(Self {
            c_fc,
            c_proj,
            activation,
        })
    }
}

impl Layer for MlpLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let hidden = self.c_fc.forward(input)?;
        let activated = self.activation.apply(&hidden)?;
        self.c_proj.forward(&activated)
    }
}
