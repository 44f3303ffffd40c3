//! ALSA PCM device wrappers for the capture and playback threads.
//!
//! The call pipeline is mono S16LE end to end, so the open helpers fix the
//! channel count and format and only negotiate rate and period size.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct DeviceParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Period size in frames (mono: one frame = one sample)
    pub period_size: usize,
}

/// Open a PCM device for microphone capture.
pub fn open_capture(device: &str, sample_rate: u32) -> Result<(PCM, DeviceParams)> {
    open_pcm(device, Direction::Capture, sample_rate, None, "capture")
}

/// Open a PCM device for playback with a requested period size.
pub fn open_playback(
    device: &str,
    sample_rate: u32,
    period_size: usize,
) -> Result<(PCM, DeviceParams)> {
    let period = if period_size > 0 { Some(period_size) } else { None };
    open_pcm(device, Direction::Playback, sample_rate, period, "playback")
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    period_size: Option<usize>,
    dir_name: &str,
) -> Result<(PCM, DeviceParams)> {
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open PCM device '{}' for {}", device, dir_name))?;

    {
        let hwp = HwParams::any(&pcm).with_context(|| "Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(1)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        if let Some(ps) = period_size {
            hwp.set_period_size_near(ps as alsa::pcm::Frames, ValueOr::Nearest)?;
        }
        pcm.hw_params(&hwp)?;
    }

    // Read back what the hardware actually agreed to
    let (actual_rate, actual_period) = {
        let hwp = pcm.hw_params_current()?;
        (hwp.get_rate()?, hwp.get_period_size()? as usize)
    };

    let params = DeviceParams {
        sample_rate: actual_rate,
        period_size: actual_period,
    };

    log::info!(
        "ALSA {}: device={}, rate={}, period_size={}",
        dir_name,
        device,
        actual_rate,
        actual_period,
    );

    Ok((pcm, params))
}
