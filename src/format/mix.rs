//! Gain matrix for routing source channels onto device channels.

use crate::format::convert::db_to_amplitude;
use crate::AudioError;

/// An `inputs × outputs` mixing matrix over interleaved frames.
///
/// Every output sample is
/// `out_gain[o] * Σ_i in[i] * in_gain[i] * cross_point[i][o]`.
/// Gains are set in decibels; `f32::NEG_INFINITY` switches a cross point off.
#[derive(Debug, Clone)]
pub struct GainMatrix {
    inputs: usize,
    outputs: usize,
    /// Linear cross-point gains, row-major by input.
    cross_points: Vec<f32>,
    input_gains: Vec<f32>,
    output_gains: Vec<f32>,
}

impl GainMatrix {
    /// Creates a matrix with every cross point off and unity channel gains.
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs,
            outputs,
            cross_points: vec![0.0; inputs * outputs],
            input_gains: vec![1.0; inputs],
            output_gains: vec![1.0; outputs],
        }
    }

    /// Builds the routing used to fit a source onto a device.
    ///
    /// Matching channels pass straight through, a mono source feeds every
    /// output, and source channels beyond the device's count are dropped.
    pub fn for_channels(inputs: usize, outputs: usize) -> Self {
        let mut matrix = Self::new(inputs, outputs);
        if inputs == 1 {
            matrix.cross_points.fill(1.0);
        } else {
            for ch in 0..inputs.min(outputs) {
                matrix.cross_points[ch * outputs + ch] = 1.0;
            }
        }
        matrix
    }

    /// Number of input channels.
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Number of output channels.
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    /// Returns `true` if the matrix is a unity pass-through.
    pub fn is_identity(&self) -> bool {
        self.inputs == self.outputs
            && self.input_gains.iter().all(|&g| g == 1.0)
            && self.output_gains.iter().all(|&g| g == 1.0)
            && (0..self.inputs).all(|i| {
                (0..self.outputs).all(|o| {
                    let expected = if i == o { 1.0 } else { 0.0 };
                    self.cross_points[i * self.outputs + o] == expected
                })
            })
    }

    /// Sets the gain from input `input` to output `output`.
    pub fn set_cross_point_gain(
        &mut self,
        input: usize,
        output: usize,
        gain_db: f32,
    ) -> Result<(), AudioError> {
        check_index(input, self.inputs)?;
        check_index(output, self.outputs)?;
        self.cross_points[input * self.outputs + output] = db_to_amplitude(gain_db);
        Ok(())
    }

    /// Sets the gain applied to one input channel.
    pub fn set_input_gain(&mut self, input: usize, gain_db: f32) -> Result<(), AudioError> {
        check_index(input, self.inputs)?;
        self.input_gains[input] = db_to_amplitude(gain_db);
        Ok(())
    }

    /// Sets the gain applied to one output channel.
    pub fn set_output_gain(&mut self, output: usize, gain_db: f32) -> Result<(), AudioError> {
        check_index(output, self.outputs)?;
        self.output_gains[output] = db_to_amplitude(gain_db);
        Ok(())
    }

    /// Mixes `frames` interleaved frames from `src` into `dst`.
    ///
    /// `src` must hold `frames * inputs` samples and `dst` `frames * outputs`;
    /// frames beyond either slice are left untouched.
    pub fn mix_interleaved(&self, src: &[f32], dst: &mut [f32], frames: usize) {
        if self.inputs == 0 || self.outputs == 0 {
            return;
        }
        let in_frames = src.chunks_exact(self.inputs);
        let out_frames = dst.chunks_exact_mut(self.outputs);
        for (input, output) in in_frames.zip(out_frames).take(frames) {
            for (o, out) in output.iter_mut().enumerate() {
                let sum: f32 = input
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| s * self.input_gains[i] * self.cross_points[i * self.outputs + o])
                    .sum();
                *out = sum * self.output_gains[o];
            }
        }
    }
}

fn check_index(index: usize, count: usize) -> Result<(), AudioError> {
    if index >= count {
        return Err(AudioError::ChannelOutOfRange { index, count });
    }
    Ok(())
}
