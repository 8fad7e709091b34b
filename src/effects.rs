//! Effect-parameter-to-filter-expression compiler (§4.7). A pure function:
//! no I/O, no subprocess, deterministic for a given input.

use crate::error::{EffectError, Result};
use crate::timeline::{EffectBinding, EffectParam};

fn expr(param: EffectParam) -> Result<String> {
    match param {
        EffectParam::Brightness(b) => {
            check_range("brightness", b, -100.0, 100.0)?;
            Ok(format!("eq=brightness={}", b / 100.0))
        }
        EffectParam::Contrast(c) => {
            check_range("contrast", c, -100.0, 100.0)?;
            Ok(format!("eq=contrast={}", 1.0 + c / 100.0))
        }
        EffectParam::Saturation(s) => {
            check_range("saturation", s, -100.0, 200.0)?;
            Ok(format!("eq=saturation={}", 1.0 + s / 100.0))
        }
        EffectParam::Hue(h) => {
            check_range("hue", h, 0.0, 360.0)?;
            Ok(format!("hue=h={h}"))
        }
        EffectParam::Blur(r) => {
            check_range("blur", r, 0.0, 20.0)?;
            Ok(format!("boxblur={r}:1"))
        }
        EffectParam::Grayscale(g) => {
            check_range("grayscale", g, 0.0, 100.0)?;
            Ok(format!("hue=s={}", 1.0 - g / 100.0))
        }
    }
}

fn check_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value < min || value > max {
        return Err(EffectError::OutOfRange {
            param: name,
            value,
            range: range_str(name),
        }
        .into());
    }
    Ok(())
}

fn range_str(name: &str) -> &'static str {
    match name {
        "brightness" => "[-100, 100]",
        "contrast" => "[-100, 100]",
        "saturation" => "[-100, 200]",
        "hue" => "[0, 360]",
        "blur" => "[0, 20]",
        "grayscale" => "[0, 100]",
        _ => unreachable!(),
    }
}

/// Compiles a binding's parameters, in stored composition order, into a
/// comma-joined `-vf` filter chain. An empty binding yields the empty string.
pub fn compile(binding: &EffectBinding) -> Result<String> {
    binding
        .params
        .iter()
        .map(|&p| expr(p))
        .collect::<Result<Vec<_>>>()
        .map(|parts| parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_binding_yields_empty_string() {
        let binding = EffectBinding {
            id: "e".into(),
            params: vec![],
        };
        assert_eq!(compile(&binding).unwrap(), "");
    }

    #[test]
    fn single_brightness_param() {
        let binding = EffectBinding {
            id: "e".into(),
            params: vec![EffectParam::Brightness(50.0)],
        };
        assert_eq!(compile(&binding).unwrap(), "eq=brightness=0.5");
    }

    #[test]
    fn composes_in_stored_order_not_sorted_order() {
        let binding = EffectBinding {
            id: "e".into(),
            params: vec![EffectParam::Blur(4.0), EffectParam::Brightness(-20.0)],
        };
        assert_eq!(compile(&binding).unwrap(), "boxblur=4:1,eq=brightness=-0.2");
    }

    #[test]
    fn grayscale_maps_to_hue_saturation_zero() {
        let binding = EffectBinding {
            id: "e".into(),
            params: vec![EffectParam::Grayscale(100.0)],
        };
        assert_eq!(compile(&binding).unwrap(), "hue=s=0");
    }

    #[test]
    fn contrast_and_saturation_are_baseline_one() {
        let binding = EffectBinding {
            id: "e".into(),
            params: vec![EffectParam::Contrast(0.0), EffectParam::Saturation(0.0)],
        };
        assert_eq!(compile(&binding).unwrap(), "eq=contrast=1,eq=saturation=1");
    }

    #[test]
    fn out_of_range_hue_is_rejected() {
        let binding = EffectBinding {
            id: "e".into(),
            params: vec![EffectParam::Hue(400.0)],
        };
        assert!(compile(&binding).is_err());
    }

    #[test]
    fn compile_is_deterministic() {
        let binding = EffectBinding {
            id: "e".into(),
            params: vec![EffectParam::Hue(180.0), EffectParam::Blur(2.0)],
        };
        assert_eq!(compile(&binding).unwrap(), compile(&binding).unwrap());
    }
}
