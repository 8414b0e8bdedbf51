//! Bot identity generation: names, colors and body shapes

use rand::seq::SliceRandom;
use rand::Rng;

use crate::entity::agent::{Appearance, BodyShape};

const ONSETS: [&str; 16] = [
    "b", "d", "f", "g", "k", "l", "m", "n", "p", "r", "s", "t", "v", "z", "br", "th",
];
const VOWELS: [&str; 8] = ["a", "e", "i", "o", "u", "ai", "ea", "ou"];
const CODAS: [&str; 8] = ["", "n", "r", "s", "l", "x", "th", "m"];

/// Palette tuned to stay readable on a green ground plane
pub const PALETTE: [&str; 12] = [
    "#e76f51", "#f4a261", "#e9c46a", "#2a9d8f", "#264653", "#8ab17d",
    "#b5838d", "#6d597a", "#ffb4a2", "#48cae4", "#ef476f", "#06d6a0",
];

/// Two- or three-syllable pronounceable name
pub fn generate_name<R: Rng>(rng: &mut R) -> String {
    let syllables = rng.gen_range(2..=3);
    let mut name = String::new();
    for i in 0..syllables {
        name.push_str(ONSETS.choose(rng).copied().unwrap_or("b"));
        name.push_str(VOWELS.choose(rng).copied().unwrap_or("a"));
        if i == syllables - 1 {
            name.push_str(CODAS.choose(rng).copied().unwrap_or(""));
        }
    }
    capitalize(&name)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Random display attributes
pub fn generate_appearance<R: Rng>(rng: &mut R) -> Appearance {
    let shape = BodyShape::ALL.choose(rng).copied().unwrap_or(BodyShape::Capsule);
    let (width, height) = match shape {
        BodyShape::Capsule => (rng.gen_range(0.5..0.7), rng.gen_range(1.4..1.9)),
        BodyShape::Cube => {
            let side = rng.gen_range(0.7..1.0);
            (side, side)
        }
        BodyShape::Cone => (rng.gen_range(0.6..0.9), rng.gen_range(1.2..1.6)),
        BodyShape::Sphere => {
            let d = rng.gen_range(0.7..1.1);
            (d, d)
        }
    };
    Appearance {
        name: generate_name(rng),
        color: PALETTE.choose(rng).copied().unwrap_or(PALETTE[0]).to_string(),
        shape,
        width,
        height,
    }
}

/// Child looks like a blend of its parents: one parent's color, the
/// other's shape, at a smaller size
pub fn inherit_appearance<R: Rng>(rng: &mut R, a: &Appearance, b: &Appearance) -> Appearance {
    let (color_from, shape_from) = if rng.gen_bool(0.5) { (a, b) } else { (b, a) };
    Appearance {
        name: generate_name(rng),
        color: color_from.color.clone(),
        shape: shape_from.shape,
        width: shape_from.width * 0.8,
        height: shape_from.height * 0.8,
    }
}
