use candle_core::{Result as CandleResult, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// tanh approximation, what GPT-2 checkpoints call `gelu_new`
    GeluNew,
    /// exact erf form
    Gelu,
    Relu,
    Silu,
}

impl Activation {
    pub fn from_name(name: &str) -> CandleResult<Self> {
        match name {
            "gelu_new" | "gelu_pytorch_tanh" | "gelu_fast" => Ok(Activation::GeluNew),
            "gelu" => Ok(Activation::Gelu),
            "relu" => Ok(Activation::Relu),
            "silu" | "swish" => Ok(Activation::Silu),
            _ => Err(candle_core::Error::msg(format!(
                "unsupported activation function: {}",
                name
            ))),
        }
    }

    pub fn apply(&self, input: &Tensor) -> CandleResult<Tensor> {
        match self {
            Activation::GeluNew => input.gelu(),
            Activation::Gelu => input.gelu_erf(),
            Activation::Relu => input.relu(),
            Activation::Silu => input.silu(),
        }
    }
}
