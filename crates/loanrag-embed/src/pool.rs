use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Attention-masked mean over the token axis, then L2 normalisation.
///
/// `hidden` is `[batch, tokens, width]`, `attention_mask` is `[batch, tokens]`
/// with 1 for real tokens and 0 for padding. Returns `[batch, width]`.
pub fn mean_pool_normalized(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, width) = hidden.dims3()?;
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    ensure!(mask.dims2()? == (batch, tokens), "mask {:?} does not match hidden {:?}", mask.dims(), hidden.dims());

    let weights = mask.unsqueeze(2)?.broadcast_as((batch, tokens, width))?;
    let summed = (hidden * &weights)?.sum(1)?;
    let eps_val = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], hidden.device())?.to_dtype(hidden.dtype())?;
    let counts = mask.sum_keepdim(1)?.broadcast_add(&eps)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    Ok(mean.broadcast_div(&norms)?)
}
