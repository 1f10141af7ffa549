use anyhow::{Context, Result};

use super::decode::Waveform;

/// Bring a waveform to `target_rate`, returning it unchanged when already there.
pub fn resample_to(wave: &Waveform, target_rate: u32) -> Result<Waveform> {
    if wave.sample_rate == target_rate || wave.samples.is_empty() {
        return Ok(Waveform::new(wave.samples.clone(), target_rate));
    }
    let resampled = resample_mono(&wave.samples, wave.sample_rate, target_rate)?;
    log::debug!(
        "Resampled {} samples @ {}Hz -> {} samples @ {}Hz",
        wave.samples.len(),
        wave.sample_rate,
        resampled.len(),
        target_rate
    );
    Ok(Waveform::new(resampled, target_rate))
}

/// Resample mono f32 audio from `from_rate` to `to_rate` using rubato.
fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .context("Failed to create resampler")?;

    let output = resampler
        .process(&[samples.to_vec()], None)
        .context("Resampling failed")?;

    Ok(output.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let wave = Waveform::new(vec![0.1, -0.2, 0.3], 44100);
        let out = resample_to(&wave, 44100).unwrap();
        assert_eq!(out.samples, wave.samples);
        assert_eq!(out.sample_rate, 44100);
    }

    #[test]
    fn doubling_rate_roughly_doubles_length() {
        let samples: Vec<f32> = (0..22050)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 22050.0).sin())
            .collect();
        let wave = Waveform::new(samples, 22050);
        let out = resample_to(&wave, 44100).unwrap();
        assert_eq!(out.sample_rate, 44100);
        let expected = 44100.0;
        assert!((out.samples.len() as f64 - expected).abs() / expected < 0.05);
    }
}
