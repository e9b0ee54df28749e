use candle_core::Tensor;
use candle_core::Result as CandleResult;

/// A stateless piece of the graph: one tensor in, one tensor out.
pub trait Layer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor>;
}
