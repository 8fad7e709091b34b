//! Builds the `-filter_complex` audio graph described in §4.8: one `adelay`/
//! `volume`/`afade` chain per element, combined with a single `amix`.

use std::path::PathBuf;

/// One audio-bearing input to the mix: an audio-track element, or a video
/// element's own (unmuted) audio stream.
#[derive(Debug, Clone)]
pub struct AudioElement {
    pub file: PathBuf,
    pub start_time: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub duration: f64,
    pub volume: f32,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl AudioElement {
    fn trimmed_duration(&self) -> f64 {
        (self.duration - self.trim_end - self.trim_start).max(0.0)
    }
}

pub struct AudioMixer;

impl AudioMixer {
    /// Builds the full `-filter_complex` expression for mixing `elements` into
    /// one output labeled `[mixout]`, along with the matching `-i` input args
    /// (trim applied at the input, per element).
    ///
    /// `base_input_index` is the ffmpeg input index of the first audio
    /// element: 0 when audio is its own standalone invocation (Mode D), or
    /// `1 + <overlay input count>` when these inputs are appended after a
    /// base video and its overlays in one combined command (Mode C).
    pub fn build_filter_complex(elements: &[AudioElement], base_input_index: usize) -> (String, Vec<Vec<String>>) {
        let mut input_args = Vec::with_capacity(elements.len());
        let mut chain_parts = Vec::with_capacity(elements.len());
        let mut labels = Vec::with_capacity(elements.len());

        for (i, element) in elements.iter().enumerate() {
            input_args.push(vec![
                "-ss".to_string(),
                element.trim_start.to_string(),
                "-t".to_string(),
                element.trimmed_duration().to_string(),
                "-i".to_string(),
                element.file.to_string_lossy().into_owned(),
            ]);

            let input_index = base_input_index + i;
            let label = format!("a{i}");
            let delay_ms = element.start_time * 1000.0;
            let fade_out_start = element.start_time + element.duration - element.fade_out;

            chain_parts.push(format!(
                "[{input_index}:a]adelay={delay}|{delay},volume={volume},afade=t=in:st={start}:d={fade_in},afade=t=out:st={fade_out_start}:d={fade_out}[{label}]",
                delay = delay_ms,
                volume = element.volume,
                start = element.start_time,
                fade_in = element.fade_in,
                fade_out_start = fade_out_start,
                fade_out = element.fade_out,
                label = label,
            ));
            labels.push(format!("[{label}]"));
        }

        if elements.is_empty() {
            return (String::new(), input_args);
        }

        let mix = format!(
            "{}amix=inputs={}:duration=longest:normalize=0[mixout]",
            labels.join(""),
            elements.len(),
        );
        chain_parts.push(mix);

        (chain_parts.join(";"), input_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(file: &str, start: f64) -> AudioElement {
        AudioElement {
            file: PathBuf::from(file),
            start_time: start,
            trim_start: 0.0,
            trim_end: 0.0,
            duration: 4.0,
            volume: 1.0,
            fade_in: 0.5,
            fade_out: 0.5,
        }
    }

    #[test]
    fn empty_input_yields_empty_graph() {
        let (graph, inputs) = AudioMixer::build_filter_complex(&[], 0);
        assert!(graph.is_empty());
        assert!(inputs.is_empty());
    }

    #[test]
    fn single_element_chain_has_delay_volume_and_fades() {
        let (graph, inputs) = AudioMixer::build_filter_complex(&[element("a.wav", 2.0)], 0);
        assert!(graph.contains("[0:a]adelay=2000|2000"));
        assert!(graph.contains("volume=1"));
        assert!(graph.contains("afade=t=in:st=2:d=0.5"));
        assert!(graph.contains("amix=inputs=1:duration=longest:normalize=0[mixout]"));
        assert_eq!(inputs.len(), 1);
    }

    #[test]
    fn multiple_elements_are_all_fed_into_one_amix() {
        let elements = vec![element("a.wav", 0.0), element("b.wav", 3.0)];
        let (graph, inputs) = AudioMixer::build_filter_complex(&elements, 0);
        assert!(graph.contains("[a0][a1]amix=inputs=2"));
        assert_eq!(inputs.len(), 2);
    }

    #[test]
    fn trim_is_applied_at_the_input_not_the_filter() {
        let mut e = element("a.wav", 0.0);
        e.trim_start = 1.0;
        e.trim_end = 0.5;
        let (_, inputs) = AudioMixer::build_filter_complex(&[e], 0);
        assert_eq!(inputs[0], vec!["-ss", "1", "-t", "2.5", "-i", "a.wav"]);
    }

    #[test]
    fn base_input_index_offsets_every_audio_input_label() {
        let elements = vec![element("a.wav", 0.0), element("b.wav", 3.0)];
        let (graph, _) = AudioMixer::build_filter_complex(&elements, 2);
        assert!(graph.contains("[2:a]"));
        assert!(graph.contains("[3:a]"));
        assert!(!graph.contains("[0:a]"));
    }
}
