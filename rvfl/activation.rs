//! Elementwise activation functions applied to the projected enhancement features.
//!
//! Every function here is pure: it reads one scalar and returns one scalar. A model
//! resolves its `Activation` to one of these functions once, at construction.

use crate::config::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// The supported enhancement-node nonlinearities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Activation {
    Sigmoid,
    Sine,
    Hardlim,
    Tribas,
    Radbas,
    Sign,
    Relu,
    LeakyRelu,
}

impl Activation {
    /// All variants, in the order their names are listed in error messages.
    pub const ALL: [Activation; 8] = [
        Activation::Sigmoid,
        Activation::Sine,
        Activation::Hardlim,
        Activation::Tribas,
        Activation::Radbas,
        Activation::Sign,
        Activation::Relu,
        Activation::LeakyRelu,
    ];

    /// The canonical lowercase name used in configuration files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Sine => "sine",
            Activation::Hardlim => "hardlim",
            Activation::Tribas => "tribas",
            Activation::Radbas => "radbas",
            Activation::Sign => "sign",
            Activation::Relu => "relu",
            Activation::LeakyRelu => "leaky_relu",
        }
    }

    /// Resolves the variant to the scalar function it names.
    pub fn resolve(self) -> fn(f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid,
            Activation::Sine => sine,
            Activation::Hardlim => hardlim,
            Activation::Tribas => tribas,
            Activation::Radbas => radbas,
            Activation::Sign => sign,
            Activation::Relu => relu,
            Activation::LeakyRelu => leaky_relu,
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Activation::ALL
            .into_iter()
            .find(|activation| activation.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownActivation(s.to_string()))
    }
}

impl TryFrom<String> for Activation {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn sine(x: f64) -> f64 {
    x.sin()
}

/// Hard limit: `(sign(x) + 1) / 2`, so zero maps to one half.
pub fn hardlim(x: f64) -> f64 {
    (sign(x) + 1.0) / 2.0
}

/// Triangular basis: `max(1 - |x|, 0)`.
pub fn tribas(x: f64) -> f64 {
    (1.0 - x.abs()).max(0.0)
}

/// Radial basis: `exp(-x^2)`.
pub fn radbas(x: f64) -> f64 {
    (-(x * x)).exp()
}

/// Three-valued sign. Unlike `f64::signum`, zero maps to zero.
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else if x.is_nan() {
        f64::NAN
    } else {
        0.0
    }
}

pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Identity for non-negative inputs, slope 1/10 below zero.
pub fn leaky_relu(x: f64) -> f64 {
    if x >= 0.0 { x } else { x / 10.0 }
}
